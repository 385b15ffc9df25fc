//! 라이브 스트림 핸들러
//!
//! 진행자 명령을 검증해 세션 상태 머신에 적용하고, 수락된 행동을
//! 로그 기록 → 중계 순서로 방에 전파한다. 모든 시도는 감사 로그에 남는다.

use crate::error::SessionError;
use crate::protocol::{ModeratorActionKind, RoomKind, ServerMessage, StreamStatus};
use crate::session::StreamEffect;
use crate::state::{AppState, RoomSession};
use crate::storage::AuditEntry;
use crate::time::unix_ms;
use std::sync::Arc;

use super::room::{
    broadcast_to_room, leave_room_internal, reject, send_to_connection, viewer_count,
};

/// 진행자 명령 처리
pub async fn handle_moderator_action(
    state: Arc<AppState>,
    connection_id: &str,
    room_id: &str,
    action: ModeratorActionKind,
    target: Option<String>,
) {
    let user_id = match state.peers.get(connection_id) {
        Some(session) => session.user_id.clone(),
        None => return,
    };

    let room = match state.rooms.get(room_id) {
        Some(room) => room.clone(),
        None => {
            reject(
                &state,
                connection_id,
                &SessionError::RoomNotFound(room_id.to_string()),
            );
            return;
        }
    };

    if room.kind != RoomKind::Stream {
        reject(
            &state,
            connection_id,
            &SessionError::KindMismatch(room_id.to_string(), "stream"),
        );
        return;
    }

    let timestamp = unix_ms();

    // 대상이 필요한 명령은 대상이 방에 있어야 한다
    if action.requires_target() {
        if let Some(target_user) = target.as_deref() {
            if room.connections_of(target_user).await.is_empty() {
                audit(&state, room_id, &user_id, action, &target, false, timestamp);
                reject(
                    &state,
                    connection_id,
                    &SessionError::TargetNotInRoom(target_user.to_string()),
                );
                return;
            }
        }
    }

    let applied = {
        let mut session = room.session.lock().await;
        match &mut *session {
            RoomSession::Stream(stream) => {
                let result = stream.apply(&user_id, action, target.clone(), timestamp);
                // 스트림 종료 시 보관용 로그를 락 안에서 복사
                let ended_log = match &result {
                    Ok((_, StreamEffect::StatusChanged(StreamStatus::Ended))) => {
                        Some(stream.actions().to_vec())
                    }
                    _ => None,
                };
                Some((result, ended_log, stream.moderator().to_string()))
            }
            RoomSession::Debate(_) => None,
        }
    };
    let Some((result, ended_log, moderator)) = applied else {
        return;
    };

    match result {
        Err(err) => {
            audit(&state, room_id, &user_id, action, &target, false, timestamp);
            reject(&state, connection_id, &err);
        }
        Ok((record, effect)) => {
            audit(&state, room_id, &user_id, action, &target, true, timestamp);
            room.touch().await;

            // 로그 기록을 마친 행동만 방 전체에 중계
            broadcast_to_room(
                &state,
                room_id,
                ServerMessage::ModeratorAction {
                    room_id: room_id.to_string(),
                    action: record.action,
                    target: record.target.clone(),
                    timestamp: record.timestamp,
                },
            )
            .await;

            match effect {
                StreamEffect::Relay => {}
                StreamEffect::StatusChanged(status) => {
                    let viewers = viewer_count(&room, &moderator).await;
                    broadcast_to_room(
                        &state,
                        room_id,
                        ServerMessage::StreamUpdate {
                            room_id: room_id.to_string(),
                            status,
                            viewer_count: viewers,
                        },
                    )
                    .await;

                    if status == StreamStatus::Ended {
                        if let Some(actions) = ended_log {
                            state.archive.archive_stream(room_id, &actions);
                        }
                        tracing::info!(room_id = %room_id, "Stream ended");
                    }
                }
                StreamEffect::Kick(target_user) => {
                    kick_user(&state, room_id, &target_user).await;
                }
            }
        }
    }
}

/// 대상 사용자의 모든 연결을 방에서 강제 퇴장
async fn kick_user(state: &AppState, room_id: &str, target_user: &str) {
    let room = match state.rooms.get(room_id) {
        Some(room) => room.clone(),
        None => return,
    };

    for connection_id in room.connections_of(target_user).await {
        send_to_connection(
            state,
            &connection_id,
            ServerMessage::Kicked {
                room_id: room_id.to_string(),
            },
        );
        leave_room_internal(state, &connection_id, target_user, room_id).await;
        if let Some(session) = state.peers.get(&connection_id) {
            *session.room_id.write().await = None;
        }
    }

    tracing::info!(room_id = %room_id, target = %target_user, "User kicked from stream");
}

fn audit(
    state: &AppState,
    room_id: &str,
    actor: &str,
    action: ModeratorActionKind,
    target: &Option<String>,
    allowed: bool,
    timestamp: u64,
) {
    state.audit.record(AuditEntry {
        room_id: room_id.to_string(),
        actor: actor.to_string(),
        action: action.as_str().to_string(),
        target: target.clone(),
        allowed,
        timestamp,
    });
}
