//! 클라이언트-서버 메시지 프로토콜 정의

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// 방 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    Debate,
    Stream,
}

/// 토론 진행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    Opening,
    Turns,
    Voting,
    Freeform,
    Concluded,
}

impl DebatePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebatePhase::Opening => "opening",
            DebatePhase::Turns => "turns",
            DebatePhase::Voting => "voting",
            DebatePhase::Freeform => "freeform",
            DebatePhase::Concluded => "concluded",
        }
    }
}

/// 스트림 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Live,
    Paused,
    Ended,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Live => "live",
            StreamStatus::Paused => "paused",
            StreamStatus::Ended => "ended",
        }
    }
}

/// 즉석 찬반 투표 (집계 없음, 중계 전용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrawVote {
    For,
    Against,
    Neutral,
}

/// 토론 종료 시 제출하는 구조화 평가
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateVote {
    /// 논리력 점수 (1-5)
    pub logical_reasoning: u8,
    /// 매너 점수 (1-5)
    pub politeness: u8,
    /// 열린 자세 점수 (1-5)
    pub openness: u8,
    /// 자유 토론 계속 의사
    pub wants_to_continue: bool,
}

impl DebateVote {
    /// 점수 범위 검증 (1-5)
    pub fn validate(&self) -> Result<(), SessionError> {
        for score in [self.logical_reasoning, self.politeness, self.openness] {
            if !(1..=5).contains(&score) {
                return Err(SessionError::ScoreOutOfRange(score));
            }
        }
        Ok(())
    }
}

/// 진행자 명령 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeratorActionKind {
    Mute,
    Unmute,
    Kick,
    PauseStream,
    ResumeStream,
    EndStream,
}

impl ModeratorActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeratorActionKind::Mute => "mute",
            ModeratorActionKind::Unmute => "unmute",
            ModeratorActionKind::Kick => "kick",
            ModeratorActionKind::PauseStream => "pause_stream",
            ModeratorActionKind::ResumeStream => "resume_stream",
            ModeratorActionKind::EndStream => "end_stream",
        }
    }

    /// 대상 사용자가 필수인 명령인지
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            ModeratorActionKind::Mute | ModeratorActionKind::Unmute | ModeratorActionKind::Kick
        )
    }
}

/// 진행자 행동 로그 항목 (append-only, 늦게 합류한 시청자에게 재생)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeratorActionRecord {
    pub action: ModeratorActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub timestamp: u64,
}

/// 참가자별 발언 횟수
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantTurns {
    pub user_id: String,
    pub turns: u8,
}

/// 토론 방 스냅샷 (합류 응답 및 조회 API에 실림)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateSnapshot {
    pub phase: DebatePhase,
    pub turns: Vec<ParticipantTurns>,
}

/// 스트림 방 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub status: StreamStatus,
    pub moderator: String,
    pub viewer_count: usize,
    pub actions: Vec<ModeratorActionRecord>,
}

/// 제출된 평가 (양쪽 클라이언트 모두에게 공개)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedVote {
    pub user_id: String,
    pub vote: DebateVote,
}

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Room Management
    JoinRoom {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        kind: Option<RoomKind>,
        #[serde(default)]
        as_moderator: bool,
    },
    LeaveRoom,

    // Debate / Chat
    ChatMessage {
        room_id: String,
        content: String,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    LiveVote {
        room_id: String,
        vote: StrawVote,
    },
    SubmitVote {
        room_id: String,
        vote: DebateVote,
    },

    // Live Stream
    ModeratorAction {
        room_id: String,
        action: ModeratorActionKind,
        #[serde(default)]
        target: Option<String>,
    },
}

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    // Connection
    Connected {
        connection_id: String,
        user_id: String,
    },
    HeartbeatAck,
    Error {
        code: String,
        message: String,
    },

    // Room Events
    RoomJoined {
        room_id: String,
        participant_count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        debate: Option<DebateSnapshot>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stream: Option<StreamSnapshot>,
    },
    UserJoined {
        user_id: String,
        participant_count: usize,
    },
    UserLeft {
        user_id: String,
        participant_count: usize,
    },
    RoomMembers {
        users: Vec<String>,
    },

    // Debate
    ChatMessage {
        room_id: String,
        user_id: String,
        content: String,
        timestamp: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn: Option<u8>,
    },
    LiveVote {
        room_id: String,
        user_id: String,
        vote: StrawVote,
    },
    VotingStarted {
        room_id: String,
    },
    VoteRecorded {
        room_id: String,
    },
    DebateResult {
        room_id: String,
        continued: bool,
        votes: Vec<SubmittedVote>,
    },

    // Live Stream
    ModeratorAction {
        room_id: String,
        action: ModeratorActionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        timestamp: u64,
    },
    StreamUpdate {
        room_id: String,
        status: StreamStatus,
        viewer_count: usize,
    },
    Kicked {
        room_id: String,
    },
}

impl ServerMessage {
    /// 오류를 발신자 전용 오류 엔벨로프로 변환
    pub fn from_error(err: &SessionError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_wire_format_uses_snake_case_type() {
        let json = r#"{"type":"join_room","payload":{"room_id":"r1","kind":"debate"}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::JoinRoom {
                room_id,
                kind,
                as_moderator,
                user_id,
            } => {
                assert_eq!(room_id, "r1");
                assert_eq!(kind, Some(RoomKind::Debate));
                assert!(!as_moderator);
                assert!(user_id.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let json = r#"{"type":"teleport","payload":{}}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn straw_vote_serializes_reserved_word() {
        let json = serde_json::to_string(&StrawVote::For).unwrap();
        assert_eq!(json, r#""for""#);
    }

    #[test]
    fn vote_score_range_is_enforced() {
        let vote = DebateVote {
            logical_reasoning: 6,
            politeness: 3,
            openness: 3,
            wants_to_continue: true,
        };
        assert_eq!(vote.validate(), Err(SessionError::ScoreOutOfRange(6)));

        let vote = DebateVote {
            logical_reasoning: 5,
            politeness: 1,
            openness: 3,
            wants_to_continue: false,
        };
        assert!(vote.validate().is_ok());
    }
}
