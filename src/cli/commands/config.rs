//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{StrataError, StrataResult};
use crate::ui::{self, Status, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const KEYS: &[&str] = &[
    "general.log_format",
    "repository.url",
    "repository.timeout_secs",
    "cache.work_dir",
    "cache.index_file",
    "cache.manifest_name",
    "pool.width",
    "pool.export_retries",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> StrataResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => set_value(manager, &key, &value).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> StrataResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> StrataResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step(
            &ctx,
            Status::Warn,
            &format!("Config already exists at {}", path.display()),
            Some("use --force to overwrite"),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step(
        &ctx,
        Status::Ok,
        "Configuration initialized",
        Some(&path.display().to_string()),
    );

    Ok(())
}

/// Update one key of the file on disk; command-line overrides are not saved
async fn set_value(manager: &ConfigManager, key: &str, value: &str) -> StrataResult<()> {
    let ctx = UiContext::detect();
    let mut config = manager.load().await?;

    apply(&mut config, key, value)?;
    manager.save(&config).await?;
    ui::step(&ctx, Status::Ok, &format!("Set {} = {}", key, value), None);

    Ok(())
}

/// Apply a dot-separated `key = value` to a config
fn apply(config: &mut Config, key: &str, value: &str) -> StrataResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(StrataError::User(format!(
                    "Invalid log format: {}. Use text/json",
                    value
                )))
            }
        },

        ["repository", "url"] => config.repository.url = value.to_string(),
        ["repository", "timeout_secs"] => config.repository.timeout_secs = parse_number(value)?,

        ["cache", "work_dir"] => {
            config.cache.work_dir = (!value.is_empty()).then(|| PathBuf::from(value))
        }
        ["cache", "index_file"] => config.cache.index_file = value.to_string(),
        ["cache", "manifest_name"] => config.cache.manifest_name = value.to_string(),

        ["pool", "width"] => {
            let width: usize = parse_number(value)?;
            if width == 0 {
                return Err(StrataError::User("pool.width must be at least 1".to_string()));
            }
            config.pool.width = width;
        }
        ["pool", "export_retries"] => config.pool.export_retries = parse_number(value)?,

        _ => {
            return Err(StrataError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(value: &str) -> StrataResult<T> {
    value
        .parse()
        .map_err(|_| StrataError::User(format!("Invalid number: {}", value)))
}
