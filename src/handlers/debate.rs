//! 토론 핸들러
//!
//! 채팅 발언 집계, 즉석 찬반 중계, 구조화 평가 수집을 담당한다.
//! 세션 변이는 전부 방의 세션 락 안에서 일어난다.

use crate::error::SessionError;
use crate::protocol::{DebateVote, RoomKind, ServerMessage, StrawVote};
use crate::session::TurnOutcome;
use crate::state::{AppState, Room, RoomSession};
use crate::time::unix_ms;
use std::sync::Arc;

use super::room::{broadcast_to_room, broadcast_to_room_except, reject, send_to_connection};

/// 채팅 메시지 처리
///
/// 토론 방에서는 발언 횟수를 집계하고, 스트림 방에서는 그대로 중계한다.
/// 차례 힌트는 발언 순서를 안내할 뿐 임의 채팅 자체를 막지 않는다.
pub async fn handle_chat_message(
    state: Arc<AppState>,
    connection_id: &str,
    room_id: &str,
    content: &str,
    client_timestamp: Option<u64>,
) {
    let Some((user_id, room)) = resolve_member(&state, connection_id, room_id) else {
        return;
    };
    if !is_member(&room, connection_id).await {
        reject(&state, connection_id, &SessionError::NotAParticipant);
        return;
    }

    let timestamp = client_timestamp.unwrap_or_else(unix_ms);
    room.touch().await;

    match room.kind {
        RoomKind::Stream => {
            // 스트림 채팅은 상태 머신 개입 없이 중계
            broadcast_to_room_except(
                &state,
                room_id,
                connection_id,
                ServerMessage::ChatMessage {
                    room_id: room_id.to_string(),
                    user_id,
                    content: content.to_string(),
                    timestamp,
                    turn: None,
                },
            )
            .await;
        }
        RoomKind::Debate => {
            let outcome = {
                let mut session = room.session.lock().await;
                match &mut *session {
                    RoomSession::Debate(debate) => debate.accept_turn(&user_id),
                    RoomSession::Stream(_) => return,
                }
            };

            match outcome {
                Ok(TurnOutcome::Counted {
                    turn,
                    voting_started,
                }) => {
                    broadcast_to_room(
                        &state,
                        room_id,
                        ServerMessage::ChatMessage {
                            room_id: room_id.to_string(),
                            user_id: user_id.clone(),
                            content: content.to_string(),
                            timestamp,
                            turn: Some(turn),
                        },
                    )
                    .await;

                    if voting_started {
                        broadcast_to_room(
                            &state,
                            room_id,
                            ServerMessage::VotingStarted {
                                room_id: room_id.to_string(),
                            },
                        )
                        .await;
                        tracing::info!(room_id = %room_id, "Debate entered voting phase");
                    }
                }
                Ok(TurnOutcome::Freeform) => {
                    broadcast_to_room(
                        &state,
                        room_id,
                        ServerMessage::ChatMessage {
                            room_id: room_id.to_string(),
                            user_id: user_id.clone(),
                            content: content.to_string(),
                            timestamp,
                            turn: None,
                        },
                    )
                    .await;
                }
                Err(err) => {
                    reject(&state, connection_id, &err);
                }
            }
        }
    }
}

/// 즉석 찬반 투표 중계
///
/// 단계 전이에 관여하지 않는 비공식 신호로, 집계 없이 중계만 한다.
pub async fn handle_live_vote(
    state: Arc<AppState>,
    connection_id: &str,
    room_id: &str,
    vote: StrawVote,
) {
    let Some((user_id, room)) = resolve_member(&state, connection_id, room_id) else {
        return;
    };

    if room.kind != RoomKind::Debate {
        reject(
            &state,
            connection_id,
            &SessionError::KindMismatch(room_id.to_string(), "debate"),
        );
        return;
    }
    if !is_member(&room, connection_id).await {
        reject(&state, connection_id, &SessionError::NotAParticipant);
        return;
    }

    room.touch().await;
    broadcast_to_room_except(
        &state,
        room_id,
        connection_id,
        ServerMessage::LiveVote {
            room_id: room_id.to_string(),
            user_id,
            vote,
        },
    )
    .await;
}

/// 구조화 평가 제출 처리
///
/// 두 표가 모두 모이면 AND 정책으로 결과를 계산해 양쪽에 공개하고,
/// 종료된 토론은 보관 협력자에 넘긴다.
pub async fn handle_submit_vote(
    state: Arc<AppState>,
    connection_id: &str,
    room_id: &str,
    vote: DebateVote,
) {
    if let Err(err) = vote.validate() {
        reject(&state, connection_id, &err);
        return;
    }

    let Some((user_id, room)) = resolve_member(&state, connection_id, room_id) else {
        return;
    };

    if room.kind != RoomKind::Debate {
        reject(
            &state,
            connection_id,
            &SessionError::KindMismatch(room_id.to_string(), "debate"),
        );
        return;
    }
    if !is_member(&room, connection_id).await {
        reject(&state, connection_id, &SessionError::NotAParticipant);
        return;
    }

    let result = {
        let mut session = room.session.lock().await;
        match &mut *session {
            RoomSession::Debate(debate) => debate.submit_vote(&user_id, vote),
            RoomSession::Stream(_) => return,
        }
    };
    room.touch().await;

    match result {
        Ok(None) => {
            send_to_connection(
                &state,
                connection_id,
                ServerMessage::VoteRecorded {
                    room_id: room_id.to_string(),
                },
            );
            tracing::info!(room_id = %room_id, user_id = %user_id, "Vote recorded, waiting for peer");
        }
        Ok(Some(outcome)) => {
            broadcast_to_room(
                &state,
                room_id,
                ServerMessage::DebateResult {
                    room_id: room_id.to_string(),
                    continued: outcome.continued,
                    votes: outcome.votes.clone(),
                },
            )
            .await;

            if !outcome.continued {
                state.archive.archive_debate(room_id, &outcome);
            }
            tracing::info!(
                room_id = %room_id,
                continued = outcome.continued,
                "Debate votes resolved"
            );
        }
        Err(err) => {
            reject(&state, connection_id, &err);
        }
    }
}

/// 방 조회 + 발신자 신원 해석 (없는 방은 room_not_found로 거부)
fn resolve_member(
    state: &AppState,
    connection_id: &str,
    room_id: &str,
) -> Option<(String, Arc<Room>)> {
    let user_id = state.peers.get(connection_id)?.user_id.clone();
    match state.rooms.get(room_id) {
        Some(room) => Some((user_id, room.clone())),
        None => {
            reject(
                state,
                connection_id,
                &SessionError::RoomNotFound(room_id.to_string()),
            );
            None
        }
    }
}

async fn is_member(room: &Room, connection_id: &str) -> bool {
    room.members.read().await.contains_key(connection_id)
}
