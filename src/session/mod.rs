//! 세션 상태 머신 모듈

pub mod debate;
pub mod stream;

pub use debate::*;
pub use stream::*;
