//! 조회용 HTTP 엔드포인트
//!
//! 제외된 UI/알림 레이어가 폴링하는 방 상태 스냅샷을 제공한다.

use crate::state::{AppState, RoomSession};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn index_handler() -> Html<&'static str> {
    Html("<h1>Agora Realtime Session Server</h1><p>WebSocket endpoint: /ws</p>")
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "server": "agora-realtime-rs",
        "timestamp": crate::time::unix_secs()
    }))
}

/// 방 목록 스냅샷
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<Value>> {
    let rooms: Vec<_> = state
        .rooms
        .iter()
        .map(|entry| entry.value().clone())
        .collect();

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        summaries.push(room_summary(&room).await);
    }
    Json(summaries)
}

/// 단일 방 스냅샷
pub async fn room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let room = state
        .rooms
        .get(&room_id)
        .map(|r| r.clone())
        .ok_or(StatusCode::NOT_FOUND)?;

    let mut value = room_summary(&room).await;
    if let Value::Object(map) = &mut value {
        map.insert("members".to_string(), json!(room.member_users().await));
    }
    Ok(Json(value))
}

async fn room_summary(room: &crate::state::Room) -> Value {
    let participant_count = room.distinct_user_count().await;
    let idle_secs = room.last_activity.read().await.elapsed().as_secs();

    let session = room.session.lock().await;
    match &*session {
        RoomSession::Debate(debate) => json!({
            "room_id": room.id,
            "kind": "debate",
            "participant_count": participant_count,
            "idle_secs": idle_secs,
            "debate": debate.snapshot(),
        }),
        RoomSession::Stream(stream) => {
            let viewers = super::room::viewer_count(room, stream.moderator()).await;
            json!({
                "room_id": room.id,
                "kind": "stream",
                "participant_count": participant_count,
                "idle_secs": idle_secs,
                "stream": {
                    "status": stream.status().as_str(),
                    "moderator": stream.moderator(),
                    "viewer_count": viewers,
                },
            })
        }
    }
}
