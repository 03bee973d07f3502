//! Inspection of how the worker treats a URL or origin.

use anyhow::{Context as _, Result};
use http::Method;
use serde::Serialize;
use sw_cache::{bucket_name, RequestKey};
use sw_core::{ApiRequest, WorkerConfig};
use sw_security::OriginAllowlist;
use sw_worker::InterceptSet;

use super::{CheckArgs, CheckCommand};
use crate::context::Context;

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    match args.command {
        CheckCommand::Url { url, method } => check_url(&url, &method, ctx),
        CheckCommand::Origin { origin } => check_origin(&origin, ctx),
    }
}

#[derive(Debug, Serialize)]
struct UrlReport {
    url: String,
    method: String,
    cacheable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket: Option<String>,
}

fn url_report(config: &WorkerConfig, url: &str, method: &str) -> Result<UrlReport> {
    let url = if url.contains("://") {
        url.to_string()
    } else {
        config.environment.url(url)
    };
    let method: Method = method
        .to_ascii_uppercase()
        .parse()
        .with_context(|| format!("Invalid method: {}", method))?;
    let request = ApiRequest::new(method, url);

    let intercept = InterceptSet::from_config(config);
    let pattern = intercept.matching(&request.url).map(str::to_string);
    let cacheable = pattern.is_some();

    Ok(UrlReport {
        key: cacheable.then(|| RequestKey::from_request(&request).to_string()),
        bucket: cacheable.then(|| bucket_name(config.version)),
        method: request.method.to_string(),
        url: request.url,
        cacheable,
        pattern,
    })
}

fn check_url(url: &str, method: &str, ctx: &Context) -> Result<()> {
    let report = url_report(&ctx.config, url, method)?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.kv("url", &report.url);
    ctx.output.kv("method", &report.method);
    match (&report.pattern, &report.key, &report.bucket) {
        (Some(pattern), Some(key), Some(bucket)) => {
            ctx.output.success(&format!("Cached (matches '{}')", pattern));
            ctx.output.kv("key", key);
            ctx.output.kv("bucket", bucket);
            ctx.output.kv("ttl_ms", &ctx.config.ttl_ms.to_string());
        }
        _ => ctx.output.info("Not intercepted; the request goes straight to the network"),
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct OriginReport {
    origin: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn origin_report(config: &WorkerConfig, origin: &str) -> OriginReport {
    let allowlist: OriginAllowlist = config.allowed_origins.iter().cloned().collect();
    let result = allowlist.check(origin);

    OriginReport {
        origin: origin.to_string(),
        allowed: result.is_ok(),
        reason: result.err().map(|e| e.to_string()),
    }
}

fn check_origin(origin: &str, ctx: &Context) -> Result<()> {
    let report = origin_report(&ctx.config, origin);

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    match report.reason {
        None => ctx
            .output
            .success(&format!("{} may activate a waiting worker", report.origin)),
        Some(reason) => ctx.output.warn(&reason),
    }

    Ok(())
}
