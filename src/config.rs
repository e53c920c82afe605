use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub seed_demo_data: bool,
    pub worker: WorkerConfig,
    pub lex: LexEnvConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub daily_maintenance_cron: String,
    pub weekly_maintenance_cron: String,
}

#[derive(Debug, Clone)]
pub struct LexEnvConfig {
    pub session_size: usize,
    pub time_bonus_secs: u32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("cors_origin", &self.cors_origin)
            .field("seed_demo_data", &self.seed_demo_data)
            .field("worker", &self.worker)
            .field("lex", &self.lex)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/lex.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            seed_demo_data: env_or_bool("SEED_DEMO_DATA", false),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                daily_maintenance_cron: env_or("DAILY_MAINTENANCE_CRON", "0 0 1 * * *"),
                weekly_maintenance_cron: env_or("WEEKLY_MAINTENANCE_CRON", "0 30 6 * * 1"),
            },
            lex: LexEnvConfig {
                session_size: env_or_parse("LEX_SESSION_SIZE", 20_usize),
                time_bonus_secs: env_or_parse("LEX_TIME_BONUS_SECS", 30_u32),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
