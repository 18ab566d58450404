use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};

use crate::jobs::Schedule;

/// Private half of the VAPID key pair used to sign push requests.
#[derive(Clone, Debug)]
pub enum VapidPrivateKey {
    /// Raw 32 byte P-256 scalar, base64url encoded
    Base64(String),
    /// PEM encoded key on disk
    PemPath(PathBuf),
}

/// The sender identity presented to push services.
#[derive(Clone, Debug)]
pub struct VapidConfig {
    /// `mailto:` or `https:` contact URI sent as the `sub` claim
    pub subject: String,
    /// base64url public key browsers pass as `applicationServerKey`
    pub public_key: String,
    pub private_key: VapidPrivateKey,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: String,
    pub db_path: String,
    // Empty means any origin is allowed
    pub allowed_origins: Vec<String>,
    pub vapid: VapidConfig,
    pub send_timeout: Duration,
    pub push_ttl: u32,
    pub max_concurrency: Option<usize>,
    // `None` disables the periodic countdown broadcast
    pub countdown_schedule: Option<Schedule>,
    pub countdown_start: NaiveDateTime,
    pub countdown_target: NaiveDateTime,
}

const DEFAULT_DB_PATH: &str = "./pushd.sqlite";

/// Location of the subscription store. Admin commands only need this
/// much of the configuration.
pub fn db_path() -> String {
    env::var("PUSHD_DB_PATH")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value source. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).with_context(|| format!("Missing env var {}", key));

        let private_key = match (var("PUSHD_VAPID_PRIVATE_KEY"), var("PUSHD_VAPID_KEY_PATH")) {
            (Some(key), _) => VapidPrivateKey::Base64(key),
            (None, Some(path)) => VapidPrivateKey::PemPath(PathBuf::from(path)),
            (None, None) => {
                return Err(anyhow!(
                    "Missing env var PUSHD_VAPID_PRIVATE_KEY or PUSHD_VAPID_KEY_PATH"
                ));
            }
        };
        let vapid = VapidConfig {
            subject: required("PUSHD_VAPID_SUBJECT")?,
            public_key: required("PUSHD_VAPID_PUBLIC_KEY")?,
            private_key,
        };

        let allowed_origins = var("PUSHD_ALLOWED_ORIGINS")
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let send_timeout = var("PUSHD_SEND_TIMEOUT_SECS")
            .map(|s| s.parse::<u64>())
            .transpose()
            .context("Invalid PUSHD_SEND_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let push_ttl = var("PUSHD_PUSH_TTL_SECS")
            .map(|s| s.parse::<u32>())
            .transpose()
            .context("Invalid PUSHD_PUSH_TTL_SECS")?
            .unwrap_or(60 * 60 * 24);

        let max_concurrency = var("PUSHD_MAX_CONCURRENCY")
            .map(|s| s.parse::<usize>())
            .transpose()
            .context("Invalid PUSHD_MAX_CONCURRENCY")?
            .filter(|n| *n > 0);

        let countdown_schedule = match var("PUSHD_COUNTDOWN_SCHEDULE") {
            Some(s) if s.eq_ignore_ascii_case("off") => None,
            Some(s) => Some(
                s.parse::<Schedule>()
                    .context("Invalid PUSHD_COUNTDOWN_SCHEDULE")?,
            ),
            None => Some(Schedule::default()),
        };

        let countdown_start = var("PUSHD_COUNTDOWN_START")
            .map(|s| parse_datetime(&s))
            .transpose()
            .context("Invalid PUSHD_COUNTDOWN_START")?
            .unwrap_or_else(|| midnight(2025, 7, 4));
        let countdown_target = var("PUSHD_COUNTDOWN_TARGET")
            .map(|s| parse_datetime(&s))
            .transpose()
            .context("Invalid PUSHD_COUNTDOWN_TARGET")?
            .unwrap_or_else(|| midnight(2026, 7, 4));

        Ok(Self {
            host: var("PUSHD_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("PUSHD_PORT").unwrap_or_else(|| "4000".to_string()),
            db_path: var("PUSHD_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            allowed_origins,
            vapid,
            send_timeout,
            push_ttl,
            max_concurrency,
            countdown_schedule,
            countdown_start,
            countdown_target,
        })
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(str::to_string)
        .collect()
}

/// Accepts a bare date (midnight local time), a naive date time, or a
/// full RFC 3339 timestamp converted to local time.
fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    let dt = chrono::DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Unrecognized date {}", value))?;
    Ok(dt.with_timezone(&chrono::Local).naive_local())
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}
