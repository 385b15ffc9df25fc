//! 클라이언트 모듈
//!
//! 서버의 연결 관리자와 짝을 이루는 재접속 로직과, 제외된 UI 레이어에
//! 방 상태를 노출하는 세션 어댑터.

pub mod adapter;
pub mod connection;
pub mod session;

pub use adapter::*;
pub use connection::*;
pub use session::*;
