//! 외부 협력자 연동 지점 (세션 보관 / 감사 로그)
//!
//! 영속 저장과 감사 기록은 실시간 경로 밖의 협력자가 담당한다.
//! 여기서는 그 경계만 trait으로 고정하고, 단독 실행과 테스트를 위한
//! 프로세스 내 구현을 함께 둔다.

use std::sync::Mutex;

use crate::protocol::ModeratorActionRecord;
use crate::session::DebateOutcome;

/// 종료된 세션 기록 보관 협력자
pub trait SessionArchive: Send + Sync {
    /// 투표 집계가 끝난 토론 결과 보관
    fn archive_debate(&self, room_id: &str, outcome: &DebateOutcome);
    /// 종료된 스트림의 행동 로그 보관
    fn archive_stream(&self, room_id: &str, actions: &[ModeratorActionRecord]);
}

/// 감사 로그 항목
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub room_id: String,
    pub actor: String,
    pub action: String,
    pub target: Option<String>,
    /// 권한 검증 통과 여부 (거부된 시도도 기록)
    pub allowed: bool,
    pub timestamp: u64,
}

/// 감사 로그 협력자
pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// 프로세스 내 보관 구현
#[derive(Default)]
pub struct InMemoryArchive {
    pub debates: Mutex<Vec<(String, DebateOutcome)>>,
    pub streams: Mutex<Vec<(String, Vec<ModeratorActionRecord>)>>,
}

impl SessionArchive for InMemoryArchive {
    fn archive_debate(&self, room_id: &str, outcome: &DebateOutcome) {
        if let Ok(mut debates) = self.debates.lock() {
            debates.push((room_id.to_string(), outcome.clone()));
        }
        tracing::info!(room_id = %room_id, continued = outcome.continued, "Debate archived");
    }

    fn archive_stream(&self, room_id: &str, actions: &[ModeratorActionRecord]) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.push((room_id.to_string(), actions.to_vec()));
        }
        tracing::info!(room_id = %room_id, actions = actions.len(), "Stream log archived");
    }
}

/// tracing 기반 감사 로그 구현
#[derive(Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            room_id = %entry.room_id,
            actor = %entry.actor,
            action = %entry.action,
            action_target = ?entry.target,
            allowed = entry.allowed,
            timestamp = entry.timestamp,
            "Moderator action audited"
        );
    }
}

/// 감사 항목을 메모리에 쌓는 구현 (테스트용)
#[derive(Default)]
pub struct InMemoryAuditLog {
    pub entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
