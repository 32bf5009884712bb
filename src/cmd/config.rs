use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::config::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SINCE, StoredConfig, config_file_path,
};
use crate::error::{AppError, AppResult};

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored configuration (secrets masked).
    Show,
}

pub fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
    }
}

fn run_init() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuring commit-review.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("Secrets are stored in the local config file; protect your filesystem accordingly.");
    println!();

    apply_prompt(
        &format!("Model API base URL (default {DEFAULT_BASE_URL})"),
        &mut cfg.base_url,
        false,
    )?;
    apply_prompt("Model API key", &mut cfg.api_key, true)?;
    apply_prompt(
        &format!("Model name (default {DEFAULT_MODEL})"),
        &mut cfg.model,
        false,
    )?;

    let mut temperature = cfg.temperature.map(|t| t.to_string());
    apply_prompt("Sampling temperature (0.0 - 2.0)", &mut temperature, false)?;
    cfg.temperature = match temperature {
        Some(value) => Some(value.parse::<f32>().map_err(|_| {
            AppError::Configuration(format!("temperature must be a number, got '{value}'"))
        })?),
        None => None,
    };

    apply_prompt(
        &format!("Default history window (default \"{DEFAULT_SINCE}\")"),
        &mut cfg.default_since,
        false,
    )?;

    cfg.save()?;

    let path = config_file_path()?;
    println!("\nConfiguration saved to {}", path.display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let cfg = StoredConfig::load()?;
    let path = config_file_path()?;

    println!("Configuration file: {}", path.display());
    println!("Model API base URL: {}", display_value(&cfg.base_url));
    println!("Model API key: {}", mask_secret(&cfg.api_key));
    println!("Model name: {}", display_value(&cfg.model));
    println!(
        "Temperature: {}",
        display_value(&cfg.temperature.map(|t| t.to_string()))
    );
    println!("Default history window: {}", display_value(&cfg.default_since));
    println!("Environment overrides: COMMIT_REVIEW_API_KEY, COMMIT_REVIEW_BASE_URL, COMMIT_REVIEW_MODEL");

    Ok(())
}

fn apply_prompt(field: &str, target: &mut Option<String>, secret: bool) -> AppResult<()> {
    match prompt(field, target.as_deref(), secret)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => *target = Some(value),
    }
    Ok(())
}

fn prompt(field: &str, current: Option<&str>, secret: bool) -> AppResult<PromptAction> {
    let mut stdout = io::stdout();

    match (current, secret) {
        (Some(_), true) => write!(stdout, "{field} [****] (Enter to keep, '-' to clear): ")?,
        (Some(value), false) => {
            write!(stdout, "{field} [{value}] (Enter to keep, '-' to clear): ")?
        }
        (None, _) => write!(stdout, "{field} (Enter to skip): ")?,
    }
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();

    if trimmed.is_empty() {
        Ok(PromptAction::Keep)
    } else if trimmed == "-" {
        Ok(PromptAction::Clear)
    } else {
        Ok(PromptAction::Set(trimmed.to_string()))
    }
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(token) if token.chars().count() > 6 => {
            let chars = token.chars().collect::<Vec<_>>();
            let prefix = chars[..3].iter().collect::<String>();
            let suffix = chars[chars.len() - 3..].iter().collect::<String>();
            format!("{prefix}***{suffix}")
        }
        Some(token) if !token.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}

enum PromptAction {
    Keep,
    Clear,
    Set(String),
}
