//! 라이브 스트림 세션 상태 머신
//!
//! 상태 전이: live ⇄ paused → ended (ended는 흡수 상태)
//! 수락된 진행자 명령은 중계 전에 반드시 행동 로그에 기록된다.

use crate::error::SessionError;
use crate::protocol::{ModeratorActionKind, ModeratorActionRecord, StreamSnapshot, StreamStatus};

/// 수락된 명령이 방에 미치는 효과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEffect {
    /// 상태 변화 없음, 중계만 (mute/unmute)
    Relay,
    /// 스트림 상태 변경
    StatusChanged(StreamStatus),
    /// 대상 사용자 강제 퇴장
    Kick(String),
}

/// 스트림 방과 1:1로 묶이는 세션 상태
pub struct LiveStreamSession {
    moderator: String,
    status: StreamStatus,
    /// append-only 행동 로그
    actions: Vec<ModeratorActionRecord>,
}

impl LiveStreamSession {
    pub fn new(moderator: impl Into<String>) -> Self {
        Self {
            moderator: moderator.into(),
            status: StreamStatus::Live,
            actions: Vec::new(),
        }
    }

    pub fn moderator(&self) -> &str {
        &self.moderator
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn actions(&self) -> &[ModeratorActionRecord] {
        &self.actions
    }

    pub fn is_terminal(&self) -> bool {
        self.status == StreamStatus::Ended
    }

    /// 진행자 명령 적용
    ///
    /// 진행자 본인 확인과 상태 검증을 통과한 명령만 로그에 남는다.
    pub fn apply(
        &mut self,
        actor: &str,
        action: ModeratorActionKind,
        target: Option<String>,
        timestamp: u64,
    ) -> Result<(ModeratorActionRecord, StreamEffect), SessionError> {
        if actor != self.moderator {
            return Err(SessionError::NotModerator);
        }
        if self.status == StreamStatus::Ended {
            return Err(SessionError::StreamEnded);
        }
        if action.requires_target() && target.is_none() {
            return Err(SessionError::TargetRequired(action.as_str().to_string()));
        }

        let effect = match action {
            ModeratorActionKind::PauseStream => {
                if self.status == StreamStatus::Paused {
                    return Err(SessionError::StreamAlready("paused"));
                }
                self.status = StreamStatus::Paused;
                StreamEffect::StatusChanged(self.status)
            }
            ModeratorActionKind::ResumeStream => {
                if self.status == StreamStatus::Live {
                    return Err(SessionError::StreamAlready("live"));
                }
                self.status = StreamStatus::Live;
                StreamEffect::StatusChanged(self.status)
            }
            ModeratorActionKind::EndStream => {
                self.status = StreamStatus::Ended;
                StreamEffect::StatusChanged(self.status)
            }
            ModeratorActionKind::Mute | ModeratorActionKind::Unmute => StreamEffect::Relay,
            ModeratorActionKind::Kick => {
                // requires_target 검증을 통과했으므로 target 존재
                StreamEffect::Kick(target.clone().unwrap_or_default())
            }
        };

        let record = ModeratorActionRecord {
            action,
            target,
            timestamp,
        };
        self.actions.push(record.clone());

        Ok((record, effect))
    }

    pub fn snapshot(&self, viewer_count: usize) -> StreamSnapshot {
        StreamSnapshot {
            status: self.status,
            moderator: self.moderator.clone(),
            viewer_count,
            actions: self.actions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_and_resume_toggle() {
        let mut s = LiveStreamSession::new("mod");
        let (_, effect) = s
            .apply("mod", ModeratorActionKind::PauseStream, None, 1)
            .unwrap();
        assert_eq!(effect, StreamEffect::StatusChanged(StreamStatus::Paused));
        assert_eq!(s.status(), StreamStatus::Paused);

        let (_, effect) = s
            .apply("mod", ModeratorActionKind::ResumeStream, None, 2)
            .unwrap();
        assert_eq!(effect, StreamEffect::StatusChanged(StreamStatus::Live));
        assert_eq!(s.status(), StreamStatus::Live);
    }

    #[test]
    fn redundant_toggle_is_rejected_and_not_logged() {
        let mut s = LiveStreamSession::new("mod");
        assert_eq!(
            s.apply("mod", ModeratorActionKind::ResumeStream, None, 1),
            Err(SessionError::StreamAlready("live"))
        );
        assert!(s.actions().is_empty());
    }

    #[test]
    fn ended_is_absorbing() {
        let mut s = LiveStreamSession::new("mod");
        s.apply("mod", ModeratorActionKind::PauseStream, None, 1)
            .unwrap();
        s.apply("mod", ModeratorActionKind::ResumeStream, None, 2)
            .unwrap();
        s.apply("mod", ModeratorActionKind::EndStream, None, 3)
            .unwrap();

        assert!(s.is_terminal());
        assert_eq!(
            s.apply("mod", ModeratorActionKind::ResumeStream, None, 4),
            Err(SessionError::StreamEnded)
        );
        assert_eq!(
            s.apply("mod", ModeratorActionKind::PauseStream, None, 5),
            Err(SessionError::StreamEnded)
        );
        assert_eq!(s.actions().len(), 3);
    }

    #[test]
    fn non_moderator_commands_are_rejected_without_state_change() {
        let mut s = LiveStreamSession::new("mod");
        assert_eq!(
            s.apply("viewer", ModeratorActionKind::PauseStream, None, 1),
            Err(SessionError::NotModerator)
        );
        assert_eq!(s.status(), StreamStatus::Live);
        assert!(s.actions().is_empty());
    }

    #[test]
    fn kick_requires_target() {
        let mut s = LiveStreamSession::new("mod");
        assert_eq!(
            s.apply("mod", ModeratorActionKind::Kick, None, 1),
            Err(SessionError::TargetRequired("kick".to_string()))
        );

        let (record, effect) = s
            .apply("mod", ModeratorActionKind::Kick, Some("troll".to_string()), 2)
            .unwrap();
        assert_eq!(effect, StreamEffect::Kick("troll".to_string()));
        assert_eq!(record.target.as_deref(), Some("troll"));
    }

    #[test]
    fn action_log_preserves_order() {
        let mut s = LiveStreamSession::new("mod");
        s.apply("mod", ModeratorActionKind::Mute, Some("u1".into()), 1)
            .unwrap();
        s.apply("mod", ModeratorActionKind::PauseStream, None, 2)
            .unwrap();
        s.apply("mod", ModeratorActionKind::ResumeStream, None, 3)
            .unwrap();
        s.apply("mod", ModeratorActionKind::Unmute, Some("u1".into()), 4)
            .unwrap();

        let kinds: Vec<_> = s.actions().iter().map(|a| a.action).collect();
        assert_eq!(
            kinds,
            vec![
                ModeratorActionKind::Mute,
                ModeratorActionKind::PauseStream,
                ModeratorActionKind::ResumeStream,
                ModeratorActionKind::Unmute,
            ]
        );
    }

    #[test]
    fn snapshot_replays_log_for_late_joiners() {
        let mut s = LiveStreamSession::new("mod");
        s.apply("mod", ModeratorActionKind::PauseStream, None, 1)
            .unwrap();
        let snap = s.snapshot(7);
        assert_eq!(snap.status, StreamStatus::Paused);
        assert_eq!(snap.moderator, "mod");
        assert_eq!(snap.viewer_count, 7);
        assert_eq!(snap.actions.len(), 1);
    }
}
