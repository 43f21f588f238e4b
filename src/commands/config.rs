use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use tracing::info;

use http_input::config::{self, Config};

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %config_path.display(), "Loading configuration for display");

    let cfg = config::load_config(config_path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path = %config_path.display(), "Validating configuration file");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Interval: {}s", cfg.agent.interval_seconds);
    println!("  Inputs: {}", cfg.inputs.len());
    for (idx, input) in cfg.inputs.iter().enumerate() {
        println!(
            "    {}. {} {} URL(s), body encoding {}",
            idx + 1,
            input.method.cyan(),
            input.urls.len(),
            input.content_encoding
        );
    }

    info!("Configuration validation successful");
    Ok(())
}

/// Mask passwords and inline tokens for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();

    for input in &mut sanitized.inputs {
        input.password = input.password.as_deref().map(mask_secret);
        input.token = input.token.as_deref().map(mask_secret);
    }

    sanitized
}

/// Mask a secret for safe display
///
/// Shows first 4 and last 4 characters joined by `...`; short values become `***`
/// Example: "tok-1234567890abcdef" -> "tok-...cdef"
fn mask_secret(secret: &str) -> String {
    if secret.len() <= 11 || !secret.is_ascii() {
        return "***".to_string();
    }

    let prefix = &secret[..4];
    let suffix = &secret[secret.len() - 4..];

    format!("{}...{}", prefix, suffix)
}
