//! 연결 핸들러

use crate::protocol::ServerMessage;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use uuid::Uuid;

/// 새 연결 처리
///
/// 인증 협력자가 공급한 사용자 id를 연결에 묶고 connected로 응답한다.
pub async fn handle_connection(
    state: Arc<AppState>,
    user_id: String,
    sender: UnboundedSender<ServerMessage>,
) -> String {
    let connection_id = Uuid::new_v4().to_string();

    let session = PeerSession {
        id: connection_id.clone(),
        user_id: user_id.clone(),
        room_id: RwLock::new(None),
        sender: sender.clone(),
        connected_at: Instant::now(),
    };

    state.peers.insert(connection_id.clone(), session);

    let _ = sender.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
        user_id: user_id.clone(),
    });

    tracing::info!(connection_id = %connection_id, user_id = %user_id, "New connection established");
    connection_id
}

/// 연결 해제 처리
///
/// 방에 남아 있던 멤버십을 정리해 user_left가 브로드캐스트되도록 한다.
pub async fn handle_disconnect(state: Arc<AppState>, connection_id: &str) {
    if let Some((_, session)) = state.peers.remove(connection_id) {
        let room_id = session.room_id.read().await.clone();
        if let Some(room_id) = room_id {
            crate::handlers::room::leave_room_internal(
                &state,
                connection_id,
                &session.user_id,
                &room_id,
            )
            .await;
        }
    }
    tracing::info!(connection_id = %connection_id, "Connection closed");
}

/// Heartbeat 처리
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}
