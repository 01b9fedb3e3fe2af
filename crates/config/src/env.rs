//! Environment variable overrides.
//!
//! The environment always wins over the config file. Empty values are
//! treated as unset so `ICLOUD_CALDAV_URL=` does not mask a file value.

use secrecy::Secret;

use crate::{
    error::{Error, Result},
    schema::GatewayConfig,
};

pub const ENV_EMAIL: &str = "ICLOUD_EMAIL";
pub const ENV_PASSWORD: &str = "ICLOUD_PASSWORD";
pub const ENV_CALDAV_URL: &str = "ICLOUD_CALDAV_URL";
pub const ENV_CALENDAR_URL: &str = "ICLOUD_CALENDAR_URL";
pub const ENV_REMINDERS_URL: &str = "ICLOUD_REMINDERS_URL";
pub const ENV_TIMEOUT_SECS: &str = "DAVGATE_TIMEOUT_SECS";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: GatewayConfig) -> Result<GatewayConfig> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply overrides using a custom lookup function.
///
/// Separate from [`apply_env_overrides`] so tests never mutate the process
/// environment.
pub fn apply_env_overrides_with(
    mut config: GatewayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<GatewayConfig> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(email) = get(ENV_EMAIL) {
        config.account.email = Some(email);
    }
    if let Some(password) = get(ENV_PASSWORD) {
        config.account.password = Some(Secret::new(password));
    }
    if let Some(url) = get(ENV_CALDAV_URL) {
        config.caldav.url = Some(url);
    }
    if let Some(url) = get(ENV_CALENDAR_URL) {
        config.caldav.calendar_url = Some(url);
    }
    if let Some(url) = get(ENV_REMINDERS_URL) {
        config.caldav.reminders_url = Some(url);
    }
    if let Some(raw) = get(ENV_TIMEOUT_SECS) {
        config.network.timeout_secs = raw
            .trim()
            .parse()
            .map_err(|e| Error::invalid(ENV_TIMEOUT_SECS, format!("'{raw}': {e}")))?;
    }

    Ok(config)
}
