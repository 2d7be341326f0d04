//! Environment-driven settings.
//!
//! Values come from the process environment (after `dotenvy` has loaded any
//! `.env` file). Optional values that are unset are logged at `info`; values
//! that fail to parse are logged at `warn` and replaced by the default.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use chrono::FixedOffset;
use chrono::format::{Item, StrftimeItems};
use tracing::{info, warn};

pub const DEFAULT_LOG_FILE_PATH: &str = "logs/roll_tracker.log";

/// `chrono` format strings used for every human-facing date label.
///
/// Defaults mirror en-US `toLocaleDateString` / `toLocaleString` output,
/// e.g. `1/2/2024` and `1/2/2024, 8:05:00 AM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleFormat {
    pub date: String,
    pub datetime: String,
}

impl Default for LocaleFormat {
    fn default() -> Self {
        Self {
            date: "%-m/%-d/%Y".to_string(),
            datetime: "%-m/%-d/%Y, %-I:%M:%S %p".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_url: Option<String>,
    pub store_key: Option<String>,
    pub access_token: Option<String>,
    pub utc_offset_minutes: Option<i32>,
    pub locale: LocaleFormat,
    pub log_file_path: String,
}

impl Settings {
    pub fn load() -> Self {
        let defaults = LocaleFormat::default();
        let store_key = optional("ROLL_TRACKER_STORE_KEY");

        Self {
            store_url: optional("ROLL_TRACKER_STORE_URL"),
            access_token: optional("ROLL_TRACKER_ACCESS_TOKEN").or_else(|| store_key.clone()),
            store_key,
            utc_offset_minutes: optional("ROLL_TRACKER_UTC_OFFSET_MINUTES")
                .and_then(|raw| parse_or_warn("ROLL_TRACKER_UTC_OFFSET_MINUTES", &raw)),
            locale: LocaleFormat {
                date: format_or_default("ROLL_TRACKER_DATE_FORMAT", defaults.date),
                datetime: format_or_default("ROLL_TRACKER_DATETIME_FORMAT", defaults.datetime),
            },
            log_file_path: log_file_path(),
        }
    }

    /// The fixed offset to aggregate in, or `None` to use the host's local zone.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        let minutes = self.utc_offset_minutes?;
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt);
        if offset.is_none() {
            warn!(minutes, "UTC offset out of range, using local time zone");
        }
        offset
    }
}

/// Read before tracing is initialised, so it does not log.
pub fn log_file_path() -> String {
    env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE_PATH.to_string())
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            info!("{key} not set");
            None
        }
    }
}

fn format_or_default(key: &str, default: String) -> String {
    match optional(key) {
        Some(fmt) if is_valid_format(&fmt) => fmt,
        Some(fmt) => {
            warn!("Invalid {key} format {fmt:?}, using default: {default}");
            default
        }
        None => default,
    }
}

/// Rejects strings that would make `chrono` fail at formatting time.
fn is_valid_format(fmt: &str) -> bool {
    !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T>
where
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| {
            warn!("Invalid {key} value {raw:?}: {e}");
        })
        .ok()
}
