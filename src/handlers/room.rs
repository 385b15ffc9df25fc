//! 방 관리 핸들러

use crate::error::SessionError;
use crate::protocol::{RoomKind, ServerMessage};
use crate::session::Registration;
use crate::state::{AppState, Room, RoomSession};
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 방 참여 처리
///
/// 방이 없으면 요청의 종류대로 원자적으로 생성한다. 토론 방은 서로 다른
/// 두 참가자까지만 받고, 기존 참가자의 재합류는 멱등하게 연결만 다시 붙인다.
pub async fn handle_join_room(
    state: Arc<AppState>,
    connection_id: &str,
    room_id: &str,
    kind: Option<RoomKind>,
    as_moderator: bool,
) {
    let room_id = room_id.trim().to_string();

    let user_id = match state.peers.get(connection_id) {
        Some(session) => session.user_id.clone(),
        None => return,
    };

    tracing::info!(connection_id = %connection_id, user_id = %user_id, room_id = %room_id, "handle_join_room started");

    // 연결은 한 번에 한 방에만 속한다: 기존 방에서 먼저 나간다
    let previous_room = match state.peers.get(connection_id) {
        Some(session) => session.room_id.read().await.clone(),
        None => None,
    };
    if let Some(previous) = previous_room {
        if previous != room_id {
            leave_room_internal(&state, connection_id, &user_id, &previous).await;
        }
    }

    // 방 가져오기 또는 생성 (entry API로 중복 생성 경쟁 차단)
    let room = match state.rooms.entry(room_id.clone()) {
        Entry::Occupied(entry) => entry.get().clone(),
        Entry::Vacant(entry) => {
            let room = match kind {
                Some(RoomKind::Debate) => Arc::new(Room::new_debate(
                    room_id.clone(),
                    state.config.debate.max_turns,
                )),
                Some(RoomKind::Stream) if as_moderator => {
                    Arc::new(Room::new_stream(room_id.clone(), user_id.clone()))
                }
                Some(RoomKind::Stream) => {
                    // 스트림 방은 진행자가 만든다; 시청자는 세션 없는 방에 못 들어옴
                    reject(
                        &state,
                        connection_id,
                        &SessionError::SessionNotFound(room_id.clone()),
                    );
                    return;
                }
                None => {
                    reject(
                        &state,
                        connection_id,
                        &SessionError::KindRequired(room_id.clone()),
                    );
                    return;
                }
            };
            entry.insert(room.clone());
            tracing::info!(room_id = %room_id, kind = ?room.kind, "Room created");
            room
        }
    };

    // 요청한 종류가 기존 방과 어긋나면 거부
    if let Some(requested) = kind {
        if requested != room.kind {
            let expected = match room.kind {
                RoomKind::Debate => "debate",
                RoomKind::Stream => "stream",
            };
            reject(
                &state,
                connection_id,
                &SessionError::KindMismatch(room_id.clone(), expected),
            );
            return;
        }
    }

    // 토론 방: 세션에 참가자 등록 (세 번째 사용자는 용량 초과)
    if room.kind == RoomKind::Debate {
        let registration = {
            let mut session = room.session.lock().await;
            match &mut *session {
                RoomSession::Debate(debate) => debate.register_participant(&user_id),
                RoomSession::Stream(_) => Registration::Rejoined,
            }
        };
        if registration == Registration::Full {
            reject(&state, connection_id, &SessionError::RoomFull(room_id.clone()));
            tracing::warn!(room_id = %room_id, user_id = %user_id, "Room full, rejected join");
            return;
        }
    }

    // 멤버십 갱신 (같은 사용자의 재합류는 새 참여로 세지 않음)
    let newly_joined_user = {
        let mut members = room.members.write().await;
        let already_present = members.values().any(|u| u == &user_id);
        members.insert(connection_id.to_string(), user_id.clone());
        !already_present
    };

    if let Some(session) = state.peers.get(connection_id) {
        *session.room_id.write().await = Some(room_id.clone());
    }
    room.touch().await;

    let participant_count = room.distinct_user_count().await;

    // 합류 응답: 토론 단계/발언 현황 또는 스트림 상태/행동 로그 재생
    let (debate_snapshot, stream_snapshot) = {
        let session = room.session.lock().await;
        match &*session {
            RoomSession::Debate(debate) => (Some(debate.snapshot()), None),
            RoomSession::Stream(stream) => {
                let viewers = viewer_count(&room, stream.moderator()).await;
                (None, Some(stream.snapshot(viewers)))
            }
        }
    };

    if let Some(session) = state.peers.get(connection_id) {
        let _ = session.sender.send(ServerMessage::RoomJoined {
            room_id: room_id.clone(),
            participant_count,
            debate: debate_snapshot,
            stream: stream_snapshot,
        });
    }

    // 다른 멤버들에게 새 사용자 알림 (재합류는 조용히 연결만 재부착)
    if newly_joined_user {
        broadcast_to_room_except(
            &state,
            &room_id,
            connection_id,
            ServerMessage::UserJoined {
                user_id: user_id.clone(),
                participant_count,
            },
        )
        .await;

        let users = room.member_users().await;
        broadcast_to_room(&state, &room_id, ServerMessage::RoomMembers { users }).await;
    }

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        room_id = %room_id,
        participant_count = participant_count,
        "User joined room"
    );
}

/// 방 나가기 내부 로직
///
/// 세션은 종료 상태에 이르기 전까지 멤버가 없어도 유지된다.
pub async fn leave_room_internal(
    state: &AppState,
    connection_id: &str,
    user_id: &str,
    room_id: &str,
) {
    let room = match state.rooms.get(room_id) {
        Some(room) => room.clone(),
        None => return,
    };

    let user_still_present = {
        let mut members = room.members.write().await;
        members.remove(connection_id);
        members.values().any(|u| u == user_id)
    };

    let remaining = room.distinct_user_count().await;

    // 같은 사용자의 다른 연결이 남아 있으면 user_left를 보내지 않는다
    if !user_still_present {
        broadcast_to_room(
            state,
            room_id,
            ServerMessage::UserLeft {
                user_id: user_id.to_string(),
                participant_count: remaining,
            },
        )
        .await;

        if remaining > 0 {
            let users = room.member_users().await;
            broadcast_to_room(state, room_id, ServerMessage::RoomMembers { users }).await;
        }
    }
    room.touch().await;

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user_id,
        room_id = %room_id,
        remaining = remaining,
        "User left room"
    );

    // 비어 있고 세션이 종료 상태인 방만 즉시 회수
    let empty = room.members.read().await.is_empty();
    if empty && room.session.lock().await.is_terminal() {
        state.rooms.remove(room_id);
        tracing::info!(room_id = %room_id, "Room deleted");
    }
}

/// 방 나가기 처리
pub async fn handle_leave_room(state: Arc<AppState>, connection_id: &str) {
    let (user_id, room_id) = match state.peers.get(connection_id) {
        Some(session) => (
            session.user_id.clone(),
            session.room_id.read().await.clone(),
        ),
        None => return,
    };

    if let Some(room_id) = room_id {
        leave_room_internal(&state, connection_id, &user_id, &room_id).await;
        if let Some(session) = state.peers.get(connection_id) {
            *session.room_id.write().await = None;
        }
    }
}

/// 방에 메시지 브로드캐스트
pub async fn broadcast_to_room(state: &AppState, room_id: &str, message: ServerMessage) {
    if let Some(room) = state.rooms.get(room_id) {
        let members = room.members.read().await;
        for connection_id in members.keys() {
            if let Some(session) = state.peers.get(connection_id) {
                let _ = session.sender.send(message.clone());
            }
        }
    }
}

/// 방의 특정 연결을 제외하고 브로드캐스트
pub async fn broadcast_to_room_except(
    state: &AppState,
    room_id: &str,
    except_connection_id: &str,
    message: ServerMessage,
) {
    if let Some(room) = state.rooms.get(room_id) {
        let members = room.members.read().await;
        for connection_id in members.keys() {
            if connection_id != except_connection_id {
                if let Some(session) = state.peers.get(connection_id) {
                    let _ = session.sender.send(message.clone());
                }
            }
        }
    }
}

/// 특정 연결에 메시지 전송
pub fn send_to_connection(state: &AppState, connection_id: &str, message: ServerMessage) {
    if let Some(session) = state.peers.get(connection_id) {
        let _ = session.sender.send(message);
    }
}

/// 발신자 전용 오류 엔벨로프 응답
pub fn reject(state: &AppState, connection_id: &str, err: &SessionError) {
    send_to_connection(state, connection_id, ServerMessage::from_error(err));
    tracing::warn!(connection_id = %connection_id, code = err.code(), "Request rejected: {}", err);
}

/// 진행자를 제외한 시청자 수
pub async fn viewer_count(room: &Room, moderator: &str) -> usize {
    room.member_users()
        .await
        .iter()
        .filter(|u| u.as_str() != moderator)
        .count()
}

/// 유휴 방 회수
///
/// 비어 있는 방 중 세션이 종료 상태이거나 설정된 시간 이상 활동이 없는
/// 방을 제거한다. freeform처럼 스스로 끝나지 않는 세션도 여기서 회수된다.
pub async fn cleanup_idle_rooms(state: Arc<AppState>) {
    let timeout = Duration::from_millis(state.config.room.idle_timeout_ms);
    let now = Instant::now();
    let mut deleted = 0;

    let candidates: Vec<(String, Arc<Room>)> = state
        .rooms
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();

    for (room_id, room) in candidates {
        if !room.members.read().await.is_empty() {
            continue;
        }
        let terminal = room.session.lock().await.is_terminal();
        let idle = now.duration_since(*room.last_activity.read().await) > timeout;
        if terminal || idle {
            state.rooms.remove(&room_id);
            deleted += 1;
            tracing::info!(room_id = %room_id, terminal = terminal, "Idle room reclaimed");
        }
    }

    if deleted > 0 {
        tracing::info!(deleted_rooms = deleted, "Cleanup completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::connection::handle_connection;
    use crate::protocol::DebatePhase;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    async fn connect(
        state: &Arc<AppState>,
        user_id: &str,
    ) -> (String, UnboundedReceiver<ServerMessage>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = handle_connection(state.clone(), user_id.to_string(), tx).await;
        // connected 응답 소비
        match rx.recv().await {
            Some(ServerMessage::Connected { .. }) => {}
            other => panic!("expected connected, got {:?}", other),
        }
        (connection_id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn new_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::from_env()))
    }

    #[tokio::test]
    async fn debate_room_rejects_third_distinct_participant() {
        let state = new_state();
        let (a, mut rx_a) = connect(&state, "alice").await;
        let (b, _rx_b) = connect(&state, "bob").await;
        let (c, mut rx_c) = connect(&state, "carol").await;

        handle_join_room(state.clone(), &a, "r1", Some(RoomKind::Debate), false).await;
        handle_join_room(state.clone(), &b, "r1", Some(RoomKind::Debate), false).await;
        drain(&mut rx_a);

        handle_join_room(state.clone(), &c, "r1", Some(RoomKind::Debate), false).await;

        let msgs = drain(&mut rx_c);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::Error { code, .. }] if code == "room_full"
        ));

        let room = state.rooms.get("r1").map(|r| r.clone()).unwrap();
        assert_eq!(room.distinct_user_count().await, 2);
        // 기존 멤버에게 user_joined가 나가지 않았는지
        assert!(drain(&mut rx_a).is_empty());
    }

    #[tokio::test]
    async fn rejoin_is_idempotent_for_existing_participant() {
        let state = new_state();
        let (a, _rx_a) = connect(&state, "alice").await;
        let (b, mut rx_b) = connect(&state, "bob").await;

        handle_join_room(state.clone(), &a, "r1", Some(RoomKind::Debate), false).await;
        handle_join_room(state.clone(), &b, "r1", Some(RoomKind::Debate), false).await;
        drain(&mut rx_b);

        // alice가 재접속해 같은 방에 다시 합류
        let (a2, mut rx_a2) = connect(&state, "alice").await;
        handle_join_room(state.clone(), &a2, "r1", Some(RoomKind::Debate), false).await;

        let room = state.rooms.get("r1").map(|r| r.clone()).unwrap();
        assert_eq!(room.distinct_user_count().await, 2);

        // 재합류자는 스냅샷을 받고, 기존 멤버는 user_joined를 받지 않는다
        let msgs = drain(&mut rx_a2);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::RoomJoined {
                participant_count: 2,
                debate: Some(_),
                ..
            }]
        ));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn join_without_kind_on_missing_room_is_rejected() {
        let state = new_state();
        let (a, mut rx_a) = connect(&state, "alice").await;

        handle_join_room(state.clone(), &a, "r9", None, false).await;

        let msgs = drain(&mut rx_a);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::Error { code, .. }] if code == "kind_required"
        ));
        assert!(state.rooms.get("r9").is_none());
    }

    #[tokio::test]
    async fn viewer_cannot_create_stream_room() {
        let state = new_state();
        let (a, mut rx_a) = connect(&state, "viewer").await;

        handle_join_room(state.clone(), &a, "s1", Some(RoomKind::Stream), false).await;

        let msgs = drain(&mut rx_a);
        assert!(matches!(
            msgs.as_slice(),
            [ServerMessage::Error { code, .. }] if code == "session_not_found"
        ));
        assert!(state.rooms.get("s1").is_none());
    }

    #[tokio::test]
    async fn joining_second_room_leaves_the_first() {
        let state = new_state();
        let (a, _rx_a) = connect(&state, "alice").await;
        let (b, mut rx_b) = connect(&state, "bob").await;

        handle_join_room(state.clone(), &a, "r1", Some(RoomKind::Debate), false).await;
        handle_join_room(state.clone(), &b, "r1", Some(RoomKind::Debate), false).await;
        drain(&mut rx_b);

        handle_join_room(state.clone(), &a, "r2", Some(RoomKind::Debate), false).await;

        let r1 = state.rooms.get("r1").map(|r| r.clone()).unwrap();
        assert_eq!(r1.distinct_user_count().await, 1);

        let msgs = drain(&mut rx_b);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMessage::UserLeft { user_id, participant_count: 1 } if user_id == "alice"
        )));
    }

    #[tokio::test]
    async fn empty_room_with_live_session_is_kept_for_return() {
        let state = new_state();
        let (a, _rx_a) = connect(&state, "alice").await;

        handle_join_room(state.clone(), &a, "r1", Some(RoomKind::Debate), false).await;
        handle_leave_room(state.clone(), &a).await;

        // 세션이 종료 상태가 아니면 방은 유지된다
        let room = state.rooms.get("r1").map(|r| r.clone()).unwrap();
        assert_eq!(room.distinct_user_count().await, 0);
        let session = room.session.lock().await;
        match &*session {
            RoomSession::Debate(debate) => assert_eq!(debate.phase(), DebatePhase::Opening),
            _ => panic!("expected debate session"),
        }
    }
}
