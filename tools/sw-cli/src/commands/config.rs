//! Configuration management commands.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use sw_core::WorkerConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::config::{self, generate_default_config};
use crate::context::Context;
use crate::output::format_duration_ms;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Get { key } => get_config(&key, ctx).await,
        ConfigCommand::Set { key, value } => set_config(&key, &value, ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match ctx.config_path {
        Some(ref path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let config = &ctx.config;
    ctx.output.info("");
    ctx.output.info("[worker]");
    ctx.output.kv("version", &config.version.to_string());
    ctx.output.kv("bucket", &sw_cache::bucket_name(config.version));
    ctx.output.kv(
        "ttl_ms",
        &format!("{} ({})", config.ttl_ms, format_duration_ms(config.ttl_ms)),
    );

    ctx.output.info("");
    ctx.output.info("[environment]");
    ctx.output.kv("name", &config.environment.name);
    ctx.output.kv("base_api_url", &config.environment.base_api_url);

    ctx.output.info("");
    ctx.output.info("Intercepted URL patterns:");
    for pattern in &config.intercept {
        ctx.output.list_item(pattern);
    }

    ctx.output.info("");
    ctx.output.info("Allowed control origins:");
    for origin in &config.allowed_origins {
        ctx.output.list_item(origin);
    }

    if !config.environments.is_empty() {
        ctx.output.info("");
        ctx.output.info("Environments:");
        for env in config.environments.keys() {
            ctx.output.list_item(env);
        }
    }

    Ok(())
}

async fn get_config(key: &str, ctx: &Context) -> Result<()> {
    let value = get_config_value(&ctx.config, key)?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "key": key, "value": value }));
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            other => println!("{}", other),
        }
    }

    Ok(())
}

async fn set_config(key: &str, value: &str, ctx: &Context) -> Result<()> {
    let Some(ref config_path) = ctx.config_path else {
        bail!("No config file found. Run `swc config init` to create one.");
    };

    // Edit the file as written, not the environment-resolved view.
    let mut file_config = config::load(config_path)?;
    set_config_value(&mut file_config, key, value)?;
    file_config
        .validate()
        .with_context(|| format!("Refusing to set {} = {}", key, value))?;

    fs::write(config_path, config::render(&file_config, config_path)?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    ctx.output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path: PathBuf = ctx.cwd.join("sw.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = lint(&ctx.config);

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Collect configuration errors and warnings.
fn lint(config: &WorkerConfig) -> (Vec<String>, Vec<String>) {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if let Err(e) = config.validate() {
        errors.push(e.to_string());
    }

    for name in config.environments.keys() {
        if let Err(e) = config.for_environment(name).and_then(|c| c.validate()) {
            errors.push(format!("environments.{}: {}", name, e));
        }
    }

    if config.intercept.is_empty() {
        warnings.push("intercept is empty; no requests will be cached".to_string());
    }

    if config.allowed_origins.is_empty() {
        warnings.push(
            "allowed_origins is empty; waiting workers only activate after every tab closes"
                .to_string(),
        );
    }

    for origin in &config.allowed_origins {
        if origin.ends_with('/') {
            warnings.push(format!(
                "allowed origin '{}' has a trailing slash and will never match",
                origin
            ));
        }
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            warnings.push(format!("allowed origin '{}' has no http(s) scheme", origin));
        }
    }

    (errors, warnings)
}

fn get_config_value(config: &WorkerConfig, key: &str) -> Result<serde_json::Value> {
    let parts: Vec<&str> = key.split('.').collect();

    let value = match parts.as_slice() {
        ["version"] => config.version.into(),
        ["ttl_ms"] => config.ttl_ms.into(),
        ["intercept"] => config.intercept.clone().into(),
        ["allowed_origins"] => config.allowed_origins.clone().into(),
        ["environment", "name"] => config.environment.name.clone().into(),
        ["environment", "base_api_url"] => config.environment.base_api_url.clone().into(),
        _ => bail!("Unknown config key: {}", key),
    };

    Ok(value)
}

fn set_config_value(config: &mut WorkerConfig, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["version"] => config.version = value.parse()?,
        ["ttl_ms"] => config.ttl_ms = value.parse()?,
        ["intercept"] => config.intercept = split_list(value),
        ["allowed_origins"] => config.allowed_origins = split_list(value),
        ["environment", "name"] => config.environment.name = value.to_string(),
        ["environment", "base_api_url"] => config.environment.base_api_url = value.to_string(),
        _ => bail!("Unknown or read-only config key: {}", key),
    }

    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lint_default_is_clean() {
        let (errors, warnings) = lint(&WorkerConfig::default());
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_lint_flags_trailing_slash_origin() {
        let config = WorkerConfig::new(1).with_allowed_origins(["http://localhost:3000/"]);

        let (errors, warnings) = lint(&config);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("trailing slash"));
    }

    #[test]
    fn test_lint_checks_environment_overrides() {
        let mut config = WorkerConfig::new(1);
        config.environments.insert(
            "staging".to_string(),
            sw_core::EnvironmentOverride {
                ttl_ms: Some(0),
                ..Default::default()
            },
        );

        let (errors, _) = lint(&config);
        assert_eq!(errors, vec!["environments.staging: ttl_ms must be greater than zero"]);
    }

    #[test]
    fn test_get_and_set_values() {
        let mut config = WorkerConfig::default();

        set_config_value(&mut config, "version", "9").unwrap();
        set_config_value(&mut config, "intercept", "/feed, /api/model.json").unwrap();

        assert_eq!(get_config_value(&config, "version").unwrap(), 9);
        assert_eq!(
            get_config_value(&config, "intercept").unwrap(),
            serde_json::json!(["/feed", "/api/model.json"])
        );
        assert!(set_config_value(&mut config, "version", "nine").is_err());
        assert!(get_config_value(&config, "bucket").is_err());
    }
}
