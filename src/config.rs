use std::env;

use anyhow::Context;
use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
    /// Local reference frame used to turn "now" and appointment timestamps
    /// into calendar dates.
    pub clinic_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);

        let offset_minutes = match env::var("CLINIC_UTC_OFFSET_MINUTES") {
            Ok(s) => s
                .trim()
                .parse::<i32>()
                .with_context(|| format!("CLINIC_UTC_OFFSET_MINUTES is not a number: {s}"))?,
            Err(_) => 0,
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
            clinic_offset: clinic_offset(offset_minutes)?,
        })
    }
}

pub fn clinic_offset(minutes: i32) -> anyhow::Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .with_context(|| format!("clinic UTC offset out of range: {minutes} minutes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clinic_offset_bounds() {
        assert_eq!(clinic_offset(0).unwrap().local_minus_utc(), 0);
        assert_eq!(clinic_offset(-300).unwrap().local_minus_utc(), -18_000);
        assert_eq!(clinic_offset(330).unwrap().local_minus_utc(), 19_800);

        assert!(clinic_offset(24 * 60).is_err());
        assert!(clinic_offset(-24 * 60).is_err());
        assert!(clinic_offset(i32::MAX).is_err());
    }
}
