//! 세션 어댑터
//!
//! 서버 브로드캐스트를 UI 레이어가 구독하는 방 상태 캐시로 환원한다.
//! 서버가 유일한 권위이고 이 캐시는 브로드캐스트로만 무효화/갱신된다.

use crate::protocol::{DebatePhase, ServerMessage, StreamStatus};
use tokio::sync::watch;

use super::connection::ConnectionState;

/// UI가 구독하는 방 상태 스냅샷
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomSnapshot {
    pub connection_state: ConnectionState,
    pub room_id: Option<String>,
    pub participant_count: usize,
    pub members: Vec<String>,
    /// 토론 방일 때만 Some
    pub phase: Option<DebatePhase>,
    /// 내 발언 횟수 (서버 echo 기준)
    pub my_turns: u8,
    /// 스트림 방일 때만 Some
    pub stream_status: Option<StreamStatus>,
    pub viewer_count: usize,
    /// 마지막으로 반영한 서버 이벤트의 타임스탬프 (ms)
    pub last_event_ms: u64,
}

/// 브로드캐스트 수신부와 UI 구독부를 잇는 어댑터
pub struct RoomStateAdapter {
    user_id: String,
    snapshot: RoomSnapshot,
    tx: watch::Sender<RoomSnapshot>,
}

impl RoomStateAdapter {
    pub fn new(user_id: impl Into<String>) -> (Self, watch::Receiver<RoomSnapshot>) {
        let snapshot = RoomSnapshot::default();
        let (tx, rx) = watch::channel(snapshot.clone());
        (
            Self {
                user_id: user_id.into(),
                snapshot,
                tx,
            },
            rx,
        )
    }

    pub fn snapshot(&self) -> &RoomSnapshot {
        &self.snapshot
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.snapshot.connection_state = state;
        self.publish();
    }

    /// 서버 메시지를 스냅샷에 반영
    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::RoomJoined {
                room_id,
                participant_count,
                debate,
                stream,
            } => {
                self.snapshot.room_id = Some(room_id.clone());
                self.snapshot.participant_count = *participant_count;
                self.snapshot.phase = debate.as_ref().map(|d| d.phase);
                self.snapshot.my_turns = debate
                    .as_ref()
                    .and_then(|d| {
                        d.turns
                            .iter()
                            .find(|t| t.user_id == self.user_id)
                            .map(|t| t.turns)
                    })
                    .unwrap_or(0);
                self.snapshot.stream_status = stream.as_ref().map(|s| s.status);
                self.snapshot.viewer_count =
                    stream.as_ref().map(|s| s.viewer_count).unwrap_or(0);
            }
            ServerMessage::UserJoined {
                participant_count, ..
            }
            | ServerMessage::UserLeft {
                participant_count, ..
            } => {
                self.snapshot.participant_count = *participant_count;
            }
            ServerMessage::RoomMembers { users } => {
                self.snapshot.members = users.clone();
            }
            ServerMessage::ChatMessage {
                user_id,
                timestamp,
                turn,
                ..
            } => {
                self.snapshot.last_event_ms = *timestamp;
                if let Some(turn) = turn {
                    if user_id == &self.user_id {
                        self.snapshot.my_turns = *turn;
                    }
                }
            }
            ServerMessage::VotingStarted { .. } => {
                self.snapshot.phase = Some(DebatePhase::Voting);
            }
            ServerMessage::DebateResult { continued, .. } => {
                self.snapshot.phase = Some(if *continued {
                    DebatePhase::Freeform
                } else {
                    DebatePhase::Concluded
                });
            }
            ServerMessage::ModeratorAction { timestamp, .. } => {
                self.snapshot.last_event_ms = *timestamp;
            }
            ServerMessage::StreamUpdate {
                status,
                viewer_count,
                ..
            } => {
                self.snapshot.stream_status = Some(*status);
                self.snapshot.viewer_count = *viewer_count;
            }
            ServerMessage::Kicked { .. } => {
                self.reset_room();
            }
            ServerMessage::Connected { .. }
            | ServerMessage::HeartbeatAck
            | ServerMessage::Error { .. }
            | ServerMessage::LiveVote { .. }
            | ServerMessage::VoteRecorded { .. } => {}
        }
        self.publish();
    }

    /// 방에서 나갔을 때 방 관련 상태 초기화
    pub fn reset_room(&mut self) {
        self.snapshot.room_id = None;
        self.snapshot.participant_count = 0;
        self.snapshot.members.clear();
        self.snapshot.phase = None;
        self.snapshot.my_turns = 0;
        self.snapshot.stream_status = None;
        self.snapshot.viewer_count = 0;
        self.publish();
    }

    fn publish(&self) {
        let _ = self.tx.send(self.snapshot.clone());
    }
}
