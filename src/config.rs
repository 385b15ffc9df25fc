//! 환경 변수 기반 설정 관리

use std::env;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    #[allow(dead_code)]
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub debate: DebateConfig,
    pub reconnect: ReconnectConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 토론 방 최대 참가자 수 (서로 다른 사용자 기준)
    pub debate_capacity: usize,
    /// 유휴 방 회수 기준 (ms)
    pub idle_timeout_ms: u64,
    /// 유휴 방 회수 주기 (초)
    pub reaper_interval_secs: u64,
}

/// 토론 설정
#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// 투표 전 참가자별 최대 발언 횟수
    pub max_turns: u8,
}

/// 클라이언트 재접속 설정
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub base_interval_ms: u64,
    pub max_attempts: u32,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5610".to_string())
                .parse()
                .unwrap_or(5610),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            room: RoomConfig {
                debate_capacity: env::var("DEBATE_ROOM_CAPACITY")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                idle_timeout_ms: env::var("ROOM_TIMEOUT")
                    .unwrap_or_else(|_| "3600000".to_string())
                    .parse()
                    .unwrap_or(3600000),
                reaper_interval_secs: env::var("ROOM_REAPER_INTERVAL")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            },
            debate: DebateConfig {
                max_turns: env::var("DEBATE_MAX_TURNS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
            },
            reconnect: ReconnectConfig {
                base_interval_ms: env::var("RECONNECT_BASE_INTERVAL")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
                max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}
