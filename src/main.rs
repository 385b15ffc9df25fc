//! Agora 실시간 세션 서버

use agora_realtime::config::Config;
use agora_realtime::handlers;
use agora_realtime::state::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));

    // 유휴 방 회수 스케줄러
    let cleanup_state = state.clone();
    let reaper_interval = config.room.reaper_interval_secs;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(reaper_interval));
        loop {
            interval.tick().await;
            handlers::cleanup_idle_rooms(cleanup_state.clone()).await;
        }
    });

    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let app = Router::new()
        .route("/", get(handlers::http::index_handler))
        .route("/health", get(handlers::http::health_handler))
        .route("/rooms", get(handlers::http::list_rooms))
        .route("/rooms/:room_id", get(handlers::http::room_detail))
        .route("/ws", get(handlers::ws_handler))
        .layer(cors)
        .with_state(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Agora Realtime Session Server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
