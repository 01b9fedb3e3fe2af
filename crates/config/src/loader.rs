use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    env::apply_env_overrides,
    env_subst::substitute_env,
    error::{Error, Result},
    schema::GatewayConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "davgate.toml",
    "davgate.yaml",
    "davgate.yml",
    "davgate.json",
];

/// Build the gateway configuration once at startup.
///
/// An explicit `path` must load; a discovered file that fails to parse is
/// logged and skipped. Environment overrides are applied last, then the
/// result is validated.
pub fn resolve(path: Option<&Path>) -> Result<GatewayConfig> {
    let base = match path {
        Some(path) => load_config(path)?,
        None => discover_and_load(),
    };
    let config = apply_env_overrides(base)?;
    config.validate()?;
    info!(
        account = config.account.email.as_deref().unwrap_or("<unset>"),
        service_root = config.service_root(),
        calendar = config.calendar_endpoint().unwrap_or("<unset>"),
        reminders = config.reminders_endpoint().unwrap_or("<unset>"),
        "configuration resolved"
    );
    Ok(config)
}

/// Load config from the given path (TOML, YAML or JSON by extension).
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./davgate.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/davgate/davgate.{toml,yaml,yml,json}` (user-global)
///
/// Returns `GatewayConfig::default()` if no usable config file is found.
pub fn discover_and_load() -> GatewayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using environment only");
    }
    GatewayConfig::default()
}

/// Returns the user-global config directory (`~/.config/davgate/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "davgate").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<GatewayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| Error::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}
