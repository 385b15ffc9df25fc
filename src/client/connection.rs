//! 클라이언트 연결 수명주기와 재접속 정책

use crate::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

/// 연결 수명주기 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    #[default]
    Closed,
    /// 재접속 상한 초과 — 자동 재시도 없이 UI에 표면화
    Error,
}

/// 재접속하지 않는 종료 코드: 정상 종료(1000), 정책 위반(1008)
///
/// 둘 다 의도된 종료 혹은 거부이므로 일시 장애로 취급하지 않는다.
pub fn is_terminal_close(code: u16) -> bool {
    matches!(code, 1000 | 1008)
}

/// 지수 백오프 재접속 정책
///
/// n번째 시도는 직전 실패로부터 base * 2^(n-1) 이상 기다린 뒤 잡힌다.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_interval_ms),
            max_attempts: config.max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// n번째 시도(1부터) 전 최소 대기 시간, 상한을 넘으면 None
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some(self.base * 2u32.saturating_pow(attempt - 1))
    }

    /// 최소 대기 시간에 0-10% 지터를 더한 실제 대기값 (앞당기지는 않음)
    pub fn jittered_delay(&self, attempt: u32) -> Option<Duration> {
        let delay = self.delay_for_attempt(attempt)?;
        let jitter = rand::thread_rng().gen_range(0.0..0.1f64);
        Some(delay.mul_f64(1.0 + jitter))
    }
}
