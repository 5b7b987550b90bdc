use dotenvy::dotenv;
use std::{env, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct AppEnv {
    pub app_port: u16,
    pub db_uri: DbUri,
    pub jwt: JwtConfig,
    pub message_encryption_key: String,
    pub bcrypt_cost: u32,
    pub flood: FloodConfig,
    pub rooms: RoomPolicy,
    pub audit_queue_capacity: usize,
    pub stop_recording_on_last_leave: bool,
    pub http_rate_limit_per_second: usize,
}

#[derive(Debug, Clone)]
pub struct DbUri(pub String);

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub jwt_token: String,
    pub room_token: String,
    pub room_token_expires_in_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct FloodConfig {
    pub max_messages: usize,
    pub window_seconds: u64,
}

/// Limits applied when rooms are created.
#[derive(Debug, Clone)]
pub struct RoomPolicy {
    pub max_active_rooms_per_user: i64,
    pub min_participants: i32,
    pub max_participants: i32,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            max_active_rooms_per_user: 5,
            min_participants: 2,
            max_participants: 100,
        }
    }
}

impl AppEnv {
    pub fn new() -> Result<Self, EnvError> {
        dotenv().ok();

        let flood = FloodConfig {
            max_messages: Self::get_env("FLOOD_MAX_MESSAGES", 30),
            window_seconds: Self::get_env("FLOOD_WINDOW_SECONDS", 60),
        };
        if flood.max_messages == 0 || flood.window_seconds == 0 {
            return Err(EnvError::Invalid(
                "FLOOD_MAX_MESSAGES/FLOOD_WINDOW_SECONDS",
                "must be greater than zero".to_string(),
            ));
        }

        let rooms = RoomPolicy {
            max_active_rooms_per_user: Self::get_env("MAX_ACTIVE_ROOMS_PER_USER", 5),
            min_participants: Self::get_env("ROOM_MIN_PARTICIPANTS", 2),
            max_participants: Self::get_env("ROOM_MAX_PARTICIPANTS", 100),
        };
        if rooms.min_participants < 1 || rooms.min_participants > rooms.max_participants {
            return Err(EnvError::Invalid(
                "ROOM_MIN_PARTICIPANTS/ROOM_MAX_PARTICIPANTS",
                format!("{}..={}", rooms.min_participants, rooms.max_participants),
            ));
        }

        let room_token_expires_in_seconds = Self::get_env("ROOM_TOKEN_EXPIRES_IN", 300); // 5 minutes
        if room_token_expires_in_seconds <= 0 {
            return Err(EnvError::Invalid(
                "ROOM_TOKEN_EXPIRES_IN",
                room_token_expires_in_seconds.to_string(),
            ));
        }

        Ok(Self {
            app_port: Self::get_env("APP_PORT", 3000),
            db_uri: DbUri(Self::require("DATABASE_URL")?),
            jwt: JwtConfig {
                jwt_token: Self::require("AUTH_JWT_SECRET")?,
                room_token: Self::require("ROOM_TOKEN_SECRET")?,
                room_token_expires_in_seconds,
            },
            message_encryption_key: Self::require("MESSAGE_ENCRYPTION_KEY")?,
            bcrypt_cost: Self::get_env("BCRYPT_COST", bcrypt::DEFAULT_COST),
            flood,
            rooms,
            audit_queue_capacity: Self::get_env("AUDIT_QUEUE_CAPACITY", 1024),
            stop_recording_on_last_leave: env::var("RECORDING_STOP_ON_LAST_LEAVE")
                .unwrap_or_else(|_| "true".into())
                .to_lowercase()
                == "true",
            http_rate_limit_per_second: Self::get_env("HTTP_RATE_LIMIT_PER_SECOND", 200),
        })
    }

    fn require(var: &'static str) -> Result<String, EnvError> {
        env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(EnvError::Missing(var))
    }

    fn get_env<T: FromStr>(var: &str, default: T) -> T {
        env::var(var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
