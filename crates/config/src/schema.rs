//! Gateway configuration types.

use std::{fmt, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{
    env::{ENV_EMAIL, ENV_PASSWORD, ENV_TIMEOUT_SECS},
    error::{Error, Result},
};

/// Well-known scheduling service root for iCloud.
pub const ICLOUD_CALDAV_URL: &str = "https://caldav.icloud.com/";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Root configuration, built once at startup and shared by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub account: AccountConfig,
    pub caldav: CalDavConfig,
    pub network: NetworkConfig,
}

/// Account identity and app-specific password.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub email: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Scheduling protocol endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavConfig {
    /// Explicit service root. Also the fallback collection for listings.
    pub url: Option<String>,
    /// Specific calendar collection.
    pub calendar_url: Option<String>,
    /// Specific reminders collection.
    pub reminders_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout applied to every protocol transport.
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Resolved account credentials handed to the protocol adapters.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
        }
    }
}

impl GatewayConfig {
    /// Account credentials, or a configuration error naming the missing variable.
    pub fn credentials(&self) -> Result<Credentials> {
        let username = non_empty(self.account.email.as_deref()).ok_or(Error::MissingVar(ENV_EMAIL))?;
        let password = self
            .account
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or(Error::MissingVar(ENV_PASSWORD))?;
        Ok(Credentials {
            username: username.to_string(),
            password: password.clone(),
        })
    }

    /// Scheduling service root, defaulting to the iCloud address.
    #[must_use]
    pub fn service_root(&self) -> &str {
        non_empty(self.caldav.url.as_deref()).unwrap_or(ICLOUD_CALDAV_URL)
    }

    /// Collection to list events from: the dedicated calendar collection,
    /// else an explicitly configured service URL.
    #[must_use]
    pub fn calendar_endpoint(&self) -> Option<&str> {
        self.calendar_collection()
            .or_else(|| non_empty(self.caldav.url.as_deref()))
    }

    /// Collection to list reminders from: the dedicated reminders collection,
    /// else an explicitly configured service URL.
    #[must_use]
    pub fn reminders_endpoint(&self) -> Option<&str> {
        self.reminders_collection()
            .or_else(|| non_empty(self.caldav.url.as_deref()))
    }

    /// Dedicated calendar collection, used as the upload target for new events.
    #[must_use]
    pub fn calendar_collection(&self) -> Option<&str> {
        non_empty(self.caldav.calendar_url.as_deref())
    }

    /// Dedicated reminders collection, used as the upload target for new to-dos.
    #[must_use]
    pub fn reminders_collection(&self) -> Option<&str> {
        non_empty(self.caldav.reminders_url.as_deref())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    /// Reject values that would only fail later inside a protocol call.
    pub fn validate(&self) -> Result<()> {
        if self.network.timeout_secs == 0 {
            return Err(Error::invalid(ENV_TIMEOUT_SECS, "must be greater than zero"));
        }
        let urls = [
            ("caldav.url", &self.caldav.url),
            ("caldav.calendar_url", &self.caldav.calendar_url),
            ("caldav.reminders_url", &self.caldav.reminders_url),
        ];
        for (name, url) in urls {
            if let Some(url) = non_empty(url.as_deref())
                && !(url.starts_with("https://") || url.starts_with("http://"))
            {
                return Err(Error::invalid(name, format!("'{url}' is not an http(s) URL")));
            }
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
