//! Configuration loading and env overrides.
//!
//! Config files: `davgate.toml`, `davgate.yaml`, or `davgate.json`
//! Searched in `./` then `~/.config/davgate/`.
//!
//! Supports `${ENV_VAR}` substitution in file contents. `ICLOUD_*` environment
//! variables override file values. The resolved [`GatewayConfig`] is passed
//! explicitly to every adapter; nothing below this crate reads the
//! environment.

pub mod env;
pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    env::{apply_env_overrides, apply_env_overrides_with},
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config, resolve},
    schema::{
        AccountConfig, CalDavConfig, Credentials, GatewayConfig, ICLOUD_CALDAV_URL, NetworkConfig,
    },
};
