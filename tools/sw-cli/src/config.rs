//! Worker configuration files.

use std::path::Path;

use anyhow::{Context, Result};
use sw_core::WorkerConfig;

/// File names searched for, in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["sw.toml", ".sw.toml", "sw.json"];

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Load a worker configuration from TOML or JSON.
pub fn load(path: &Path) -> Result<WorkerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if is_json(path) {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

/// Render a configuration in the file's format.
pub fn render(config: &WorkerConfig, path: &Path) -> Result<String> {
    if is_json(path) {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(toml::to_string_pretty(config)?)
    }
}

/// Default sw.toml contents.
pub fn generate_default_config() -> String {
    r#"# API caching worker configuration

# Bump on every release; old cache buckets are removed when it activates.
version = 1

# Cached responses older than this are refetched (2 hours).
ttl_ms = 7200000

# Requests whose URL contains any of these substrings are cached.
intercept = ["/ap/v1/blogs", "/api/model.json"]

# Origins allowed to ask a waiting worker to activate.
allowed_origins = ["http://localhost:3000", "https://www.yourdomain.com"]

[environment]
name = "local"
base_api_url = "http://localhost:3000"

[environments.production]
base_api_url = "https://www.yourdomain.com"
"#
    .to_string()
}
