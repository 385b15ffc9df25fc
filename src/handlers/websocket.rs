//! WebSocket 업그레이드와 메시지 라우팅

use crate::error::SessionError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 업그레이드 쿼리 (인증 협력자가 채워 주는 사용자 신원)
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = query.user_id.trim().to_string();
    if user_id.is_empty() {
        tracing::warn!("Rejected connection without user identity");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let connection_id =
        crate::handlers::connection::handle_connection(state.clone(), user_id, tx.clone()).await;

    // 송신 태스크
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => route_client_message(&state, &connection_id, msg).await,
                Err(e) => {
                    // 알 수 없는 타입이나 깨진 프레임은 연결을 끊지 않고 거부만
                    tracing::warn!(
                        connection_id = %connection_id,
                        error = %e,
                        "Dropped malformed message"
                    );
                    let err = SessionError::Malformed(e.to_string());
                    let _ = tx.send(ServerMessage::from_error(&err));
                }
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // 연결 해제
    crate::handlers::connection::handle_disconnect(state, &connection_id).await;
    send_task.abort();
}

/// 메시지 타입별 라우팅 (컴파일 타임에 전수 검사되는 match)
pub async fn route_client_message(
    state: &Arc<AppState>,
    connection_id: &str,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            if let Some(session) = state.peers.get(connection_id) {
                crate::handlers::connection::handle_heartbeat(&session.sender);
            }
        }
        ClientMessage::JoinRoom {
            room_id,
            user_id,
            kind,
            as_moderator,
        } => {
            // 엔벨로프의 사용자 id는 연결 인증 신원과 일치해야 한다
            if let Some(claimed) = user_id {
                let authenticated = state
                    .peers
                    .get(connection_id)
                    .map(|session| session.user_id.clone());
                if authenticated.as_deref() != Some(claimed.as_str()) {
                    crate::handlers::room::reject(
                        state,
                        connection_id,
                        &SessionError::IdentityMismatch(claimed),
                    );
                    return;
                }
            }
            crate::handlers::room::handle_join_room(
                state.clone(),
                connection_id,
                &room_id,
                kind,
                as_moderator,
            )
            .await;
        }
        ClientMessage::LeaveRoom => {
            crate::handlers::room::handle_leave_room(state.clone(), connection_id).await;
        }
        ClientMessage::ChatMessage {
            room_id,
            content,
            timestamp,
        } => {
            crate::handlers::debate::handle_chat_message(
                state.clone(),
                connection_id,
                &room_id,
                &content,
                timestamp,
            )
            .await;
        }
        ClientMessage::LiveVote { room_id, vote } => {
            crate::handlers::debate::handle_live_vote(state.clone(), connection_id, &room_id, vote)
                .await;
        }
        ClientMessage::SubmitVote { room_id, vote } => {
            crate::handlers::debate::handle_submit_vote(
                state.clone(),
                connection_id,
                &room_id,
                vote,
            )
            .await;
        }
        ClientMessage::ModeratorAction {
            room_id,
            action,
            target,
        } => {
            crate::handlers::stream::handle_moderator_action(
                state.clone(),
                connection_id,
                &room_id,
                action,
                target,
            )
            .await;
        }
    }
}
