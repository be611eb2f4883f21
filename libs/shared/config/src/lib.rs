use std::env;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

/// Default clinic civil timezone: UTC+2, expressed in minutes.
/// The clinic operates in a single fixed-offset zone with no DST.
pub const DEFAULT_CLINIC_UTC_OFFSET_MINUTES: i32 = 120;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_anon_key: String,
    pub jwt_secret: String,
    pub clinic_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_URL not set, using empty value");
                    String::new()
                }),
            store_anon_key: env::var("STORE_ANON_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_ANON_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!(
                        "CLINIC_UTC_OFFSET_MINUTES not set, using default +{} minutes",
                        DEFAULT_CLINIC_UTC_OFFSET_MINUTES
                    );
                    DEFAULT_CLINIC_UTC_OFFSET_MINUTES
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_anon_key.is_empty() && !self.jwt_secret.is_empty()
    }

    /// The clinic's civil timezone as a fixed offset. All slot math is
    /// anchored to this offset; there is no DST handling.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60)
            .or_else(|| FixedOffset::east_opt(DEFAULT_CLINIC_UTC_OFFSET_MINUTES * 60))
            .unwrap_or_else(|| Utc.fix())
    }
}
