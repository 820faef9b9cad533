//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{validate_prefix, Config, ConfigManager};
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "cache.root",
    "cache.prefix",
    "cache.completion_marker",
    "fetch.timeout_secs",
    "fetch.user_agent",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> PkgcacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, config, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> PkgcacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool) -> PkgcacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok_detail(
        &ctx,
        "Configuration initialized",
        &path.display().to_string(),
    );

    Ok(())
}

async fn set_value(
    manager: &ConfigManager,
    config: &Config,
    key: &str,
    value: &str,
) -> PkgcacheResult<()> {
    let ctx = UiContext::detect();
    let mut config = config.clone();

    apply(&mut config, key, value).inspect_err(|_| {
        ui::remark(&ctx, "Valid keys:");
        for key in VALID_KEYS {
            ui::remark(&ctx, &format!("  {}", key));
        }
    })?;

    manager.save(&config).await?;
    ui::step_ok(&ctx, &format!("Set {} = {}", key, value));

    Ok(())
}

/// Set one dot-separated key on `config`
fn apply(config: &mut Config, key: &str, value: &str) -> PkgcacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["cache", "root"] if value.is_empty() => config.cache.root = None,
        ["cache", "root"] => config.cache.root = Some(PathBuf::from(value)),
        ["cache", "prefix"] => config.cache.prefix = parse_prefix(value)?,
        ["cache", "completion_marker"] => config.cache.completion_marker = parse_bool(value)?,

        ["fetch", "timeout_secs"] => config.fetch.timeout_secs = parse_u64(value)?,
        ["fetch", "user_agent"] => config.fetch.user_agent = value.to_string(),

        _ => return Err(PkgcacheError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

fn parse_log_format(value: &str) -> PkgcacheResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(PkgcacheError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}

fn parse_prefix(value: &str) -> PkgcacheResult<String> {
    validate_prefix(value).map_err(PkgcacheError::User)?;
    Ok(value.to_string())
}

fn parse_bool(value: &str) -> PkgcacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(PkgcacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_u64(value: &str) -> PkgcacheResult<u64> {
    value
        .parse()
        .map_err(|_| PkgcacheError::User(format!("Invalid number: {}", value)))
}
