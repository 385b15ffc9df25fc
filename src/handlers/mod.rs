//! 핸들러 모듈

pub mod connection;
pub mod debate;
pub mod http;
pub mod room;
pub mod stream;
pub mod websocket;

pub use connection::*;
pub use debate::*;
pub use http::*;
pub use room::*;
pub use stream::*;
pub use websocket::*;
