//! Agora 실시간 세션 레이어
//!
//! 토론(debate) 방과 라이브 스트림(stream) 방을 하나의 WebSocket 전송 위에
//! 멀티플렉싱하는 서버/클라이언트 코어.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod protocol;
pub mod session;
pub mod state;
pub mod storage;
pub mod time;
