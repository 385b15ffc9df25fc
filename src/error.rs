//! 세션 레이어 오류 타입 정의

use thiserror::Error;

/// 세션 레이어에서 발신자에게 반환되는 오류
///
/// 네 가지 분류: 프로토콜 오류, 상태 오류, 용량 오류, 전송 오류.
/// 전송 오류만 연결 종료로 이어지고 나머지는 오류 엔벨로프로 응답한다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    // 프로토콜 오류
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    #[error("no active session for room '{0}'")]
    SessionNotFound(String),
    #[error("user id mismatch: envelope says '{0}'")]
    IdentityMismatch(String),
    #[error("room kind required to create room '{0}'")]
    KindRequired(String),
    #[error("room '{0}' is not a {1} room")]
    KindMismatch(String, &'static str),
    #[error("score {0} out of range (1-5)")]
    ScoreOutOfRange(u8),
    #[error("moderator action '{0}' requires a target")]
    TargetRequired(String),

    // 상태 오류
    #[error("turn limit reached")]
    TurnLimitReached,
    #[error("debate already concluded")]
    DebateConcluded,
    #[error("action not allowed in phase '{0}'")]
    OutOfPhase(&'static str),
    #[error("not a debate participant")]
    NotAParticipant,
    #[error("votes are frozen")]
    VotesFrozen,
    #[error("only the moderator can issue this command")]
    NotModerator,
    #[error("stream already ended")]
    StreamEnded,
    #[error("stream is already {0}")]
    StreamAlready(&'static str),
    #[error("target user '{0}' is not in the room")]
    TargetNotInRoom(String),

    // 용량 오류
    #[error("room '{0}' is full")]
    RoomFull(String),
}

impl SessionError {
    /// 와이어 오류 코드 (클라이언트 분기용, 안정적으로 유지)
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Malformed(_) => "protocol_error",
            SessionError::RoomNotFound(_) => "room_not_found",
            SessionError::SessionNotFound(_) => "session_not_found",
            SessionError::IdentityMismatch(_) => "identity_mismatch",
            SessionError::KindRequired(_) => "kind_required",
            SessionError::KindMismatch(_, _) => "kind_mismatch",
            SessionError::ScoreOutOfRange(_) => "score_out_of_range",
            SessionError::TargetRequired(_) => "target_required",
            SessionError::TurnLimitReached => "turn_limit_reached",
            SessionError::DebateConcluded => "debate_concluded",
            SessionError::OutOfPhase(_) => "out_of_phase",
            SessionError::NotAParticipant => "not_a_participant",
            SessionError::VotesFrozen => "votes_frozen",
            SessionError::NotModerator => "not_moderator",
            SessionError::StreamEnded => "stream_ended",
            SessionError::StreamAlready(_) => "invalid_stream_state",
            SessionError::TargetNotInRoom(_) => "target_not_in_room",
            SessionError::RoomFull(_) => "room_full",
        }
    }
}
