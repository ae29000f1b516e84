use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use chrono::{Duration, FixedOffset, Offset, Utc};

use crate::catalog::SlotCatalog;

pub const DATA_FILE_NAME: &str = "agendamentos.json";
const DEFAULT_HOLD_HOURS: i64 = 24;
const DEFAULT_MAX_UPLOAD_MB: u64 = 4;
const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub admin_user: String,
    pub admin_password: String,
    pub utc_offset_hours: i32,
    pub booking_days: u32,
    pub slots: Vec<String>,
    pub hold_hours: i64,
    pub max_upload_mb: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let admin_password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
        if admin_password == "admin" {
            log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
        }

        let slots = env::var("BOOKING_SLOTS")
            .ok()
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|slot| !slot.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|slots| !slots.is_empty())
            .unwrap_or_else(SlotCatalog::default_slots);

        Self {
            port: parsed("PORT", 4000),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()).into(),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()).into(),
            admin_user: env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string()),
            admin_password,
            utc_offset_hours: parsed("UTC_OFFSET_HOURS", -3),
            booking_days: parsed("BOOKING_DAYS", 10),
            slots,
            hold_hours: hold_hours_or_default(parsed("HOLD_HOURS", DEFAULT_HOLD_HOURS)),
            max_upload_mb: upload_mb_or_default(parsed("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)),
        }
    }

    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            port: 0,
            data_dir: root.join("data"),
            upload_dir: root.join("uploads"),
            admin_user: "admin".to_string(),
            admin_password: "secret".to_string(),
            utc_offset_hours: -3,
            booking_days: 10,
            slots: SlotCatalog::default_slots(),
            hold_hours: 24,
            max_upload_mb: 1,
        }
    }

    pub fn data_file(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE_NAME)
    }

    pub fn hold(&self) -> Duration {
        Duration::try_hours(hold_hours_or_default(self.hold_hours))
            .unwrap_or(Duration::hours(DEFAULT_HOLD_HOURS))
    }

    pub fn max_upload_bytes(&self) -> u64 {
        upload_mb_or_default(self.max_upload_mb) * BYTES_PER_MB
    }

    pub fn catalog(&self) -> SlotCatalog {
        let offset = FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| {
            log::warn!("UTC_OFFSET_HOURS={} is out of range, using UTC", self.utc_offset_hours);
            Utc.fix()
        });
        SlotCatalog::new(offset, self.booking_days, self.slots.clone())
    }
}

fn parsed<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|err| {
            log::warn!("Invalid {key} value {value:?}: {err}. Using default {default}");
            default
        }),
        Err(_) => default,
    }
}

/// Holds must be positive and fit in a `chrono::Duration`.
fn hold_hours_or_default(hours: i64) -> i64 {
    if hours > 0 && Duration::try_hours(hours).is_some() {
        hours
    } else {
        log::warn!("HOLD_HOURS={hours} is out of range. Using default {DEFAULT_HOLD_HOURS}");
        DEFAULT_HOLD_HOURS
    }
}

fn upload_mb_or_default(megabytes: u64) -> u64 {
    if megabytes > 0 && megabytes.checked_mul(BYTES_PER_MB).is_some() {
        megabytes
    } else {
        log::warn!("MAX_UPLOAD_MB={megabytes} is out of range. Using default {DEFAULT_MAX_UPLOAD_MB}");
        DEFAULT_MAX_UPLOAD_MB
    }
}
