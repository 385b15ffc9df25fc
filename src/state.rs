//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::protocol::{RoomKind, ServerMessage};
use crate::session::{DebateSession, LiveStreamSession};
use crate::storage::{AuditLog, InMemoryArchive, SessionArchive, TracingAuditLog};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, Mutex, RwLock};

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 정보 (room_id -> Room)
    pub rooms: DashMap<String, Arc<Room>>,
    /// 피어 세션 (connection_id -> PeerSession)
    pub peers: DashMap<String, PeerSession>,
    /// 설정
    pub config: Arc<Config>,
    /// 종료 세션 보관 협력자
    pub archive: Arc<dyn SessionArchive>,
    /// 감사 로그 협력자
    pub audit: Arc<dyn AuditLog>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryArchive::default()),
            Arc::new(TracingAuditLog),
        )
    }

    /// 보관/감사 협력자를 주입하는 생성자 (테스트에서 사용)
    pub fn with_collaborators(
        config: Config,
        archive: Arc<dyn SessionArchive>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            peers: DashMap::new(),
            config: Arc::new(config),
            archive,
            audit,
        }
    }
}

/// 방 단위 세션 상태 (방 종류에 따라 하나만 존재)
pub enum RoomSession {
    Debate(DebateSession),
    Stream(LiveStreamSession),
}

impl RoomSession {
    /// 종료 상태인지 (비어 있는 방 회수 판단에 사용)
    pub fn is_terminal(&self) -> bool {
        match self {
            RoomSession::Debate(s) => s.is_terminal(),
            RoomSession::Stream(s) => s.is_terminal(),
        }
    }
}

/// 방 정보
///
/// 멤버 집합은 connection_id -> user_id 매핑만 보관한다.
/// 연결 자체는 Connection Manager가 소유하고 여기서는 조회만 한다.
pub struct Room {
    pub id: String,
    pub kind: RoomKind,
    pub members: RwLock<HashMap<String, String>>,
    /// 세션 변이는 모두 이 락을 거쳐 직렬화된다
    pub session: Mutex<RoomSession>,
    pub created_at: Instant,
    pub last_activity: RwLock<Instant>,
}

impl Room {
    pub fn new_debate(id: String, max_turns: u8) -> Self {
        Self::new(
            id,
            RoomKind::Debate,
            RoomSession::Debate(DebateSession::new(max_turns)),
        )
    }

    pub fn new_stream(id: String, moderator: String) -> Self {
        Self::new(
            id,
            RoomKind::Stream,
            RoomSession::Stream(LiveStreamSession::new(moderator)),
        )
    }

    fn new(id: String, kind: RoomKind, session: RoomSession) -> Self {
        Self {
            id,
            kind,
            members: RwLock::new(HashMap::new()),
            session: Mutex::new(session),
            created_at: Instant::now(),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    /// 서로 다른 사용자 수 (재접속으로 연결이 겹쳐도 1명으로 센다)
    pub async fn distinct_user_count(&self) -> usize {
        let members = self.members.read().await;
        let mut users: Vec<&String> = members.values().collect();
        users.sort();
        users.dedup();
        users.len()
    }

    /// 정렬된 사용자 목록 (중복 제거)
    pub async fn member_users(&self) -> Vec<String> {
        let members = self.members.read().await;
        let mut users: Vec<String> = members.values().cloned().collect();
        users.sort();
        users.dedup();
        users
    }

    /// 특정 사용자의 연결 id 목록
    pub async fn connections_of(&self, user_id: &str) -> Vec<String> {
        let members = self.members.read().await;
        members
            .iter()
            .filter(|(_, uid)| uid.as_str() == user_id)
            .map(|(cid, _)| cid.clone())
            .collect()
    }

    /// 마지막 활동 시각 갱신
    pub async fn touch(&self) {
        *self.last_activity.write().await = Instant::now();
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    #[allow(dead_code)]
    pub id: String,
    /// 인증 협력자가 공급한 사용자 id
    pub user_id: String,
    pub room_id: RwLock<Option<String>>,
    pub sender: UnboundedSender<ServerMessage>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}
