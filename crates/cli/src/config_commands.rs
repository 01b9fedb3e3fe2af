use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    secrecy::Secret,
};

use davgate_config::GatewayConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration as TOML, with the password redacted.
    Show,
    /// Check that credentials and collection endpoints are usable.
    Check,
}

pub fn handle_config(action: &ConfigAction, path: Option<&Path>) -> Result<()> {
    let config = davgate_config::resolve(path)?;
    match action {
        ConfigAction::Show => show(config),
        ConfigAction::Check => check(&config),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn show(mut config: GatewayConfig) -> Result<()> {
    if config.account.password.is_some() {
        config.account.password = Some(Secret::new("[REDACTED]".into()));
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn check(config: &GatewayConfig) -> Result<()> {
    let mut errors = 0;
    let mut warnings = 0;

    match config.credentials() {
        Ok(credentials) => eprintln!("  {BOLD}{GREEN}ok{RESET} account {}", credentials.username),
        Err(e) => {
            eprintln!("  {BOLD}{RED}error{RESET} {e}");
            errors += 1;
        },
    }

    eprintln!("  {BOLD}{GREEN}ok{RESET} service root {}", config.service_root());

    let collections = [
        ("calendar", config.calendar_endpoint(), "list_calendar_events"),
        ("reminders", config.reminders_endpoint(), "list_reminders"),
    ];
    for (label, endpoint, tool) in collections {
        match endpoint {
            Some(url) => eprintln!("  {BOLD}{GREEN}ok{RESET} {label} collection {url}"),
            None => {
                eprintln!("  {BOLD}{YELLOW}warning{RESET} no {label} collection, {tool} is disabled");
                warnings += 1;
            },
        }
    }
    if config.calendar_collection().is_none() {
        eprintln!(
            "  {BOLD}{YELLOW}warning{RESET} ICLOUD_CALENDAR_URL unset, new events are not uploaded"
        );
        warnings += 1;
    }
    if config.reminders_collection().is_none() {
        eprintln!(
            "  {BOLD}{YELLOW}warning{RESET} ICLOUD_REMINDERS_URL unset, new reminders are not uploaded"
        );
        warnings += 1;
    }

    eprintln!();
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
