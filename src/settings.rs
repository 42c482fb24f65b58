use dotenvy::dotenv;
use std::env;

pub const DEFAULT_RUN_NOW_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_RETENTION_MAX_AGE_SECS: u64 = 604_800; // 7 days
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Runtime configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Shared wait budget for manual runs, in seconds.
    pub run_now_timeout_secs: u64,
    /// Default age bound for execution-history cleanup, in seconds.
    pub retention_max_age_secs: u64,
    /// chrono format string used when presenting timestamps to operators.
    pub datetime_format: String,
}

impl Settings {
    /// Reads settings from the environment (and `.env` if present).
    pub fn from_env() -> Settings {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        Settings {
            database_url,
            run_now_timeout_secs: parse_var(
                "RUN_NOW_TIMEOUT_SECONDS",
                DEFAULT_RUN_NOW_TIMEOUT_SECS,
            ),
            retention_max_age_secs: parse_var(
                "RETENTION_MAX_AGE_SECONDS",
                DEFAULT_RETENTION_MAX_AGE_SECS,
            ),
            datetime_format: env::var("DATETIME_FORMAT")
                .unwrap_or_else(|_| DEFAULT_DATETIME_FORMAT.to_string()),
        }
    }
}

fn parse_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {} value {:?}.", name, value);
            default
        }),
        Err(_) => default,
    }
}
