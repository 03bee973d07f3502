//! Scripted browsing session against an in-process worker.
//!
//! Time is simulated: the session clock starts at the current wall time
//! and jumps forward between requests, so hours of cache aging run
//! instantly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sw_cache::{CacheStatus, MemoryCacheStore};
use sw_client::{ClientCoordinator, PageReloader};
use sw_core::{ApiRequest, ApiResponse, ClientId, Clock, ManualClock, WorkerConfig};
use sw_net::ScriptedNetwork;
use sw_observability::MetricsSnapshot;
use sw_worker::{FetchEvent, WorkerHost, WorkerServices};

use super::SimulateArgs;
use crate::context::Context;
use crate::output::{format_duration_ms, status_badge};

/// Counts page reloads requested by the coordinator.
#[derive(Default)]
struct SimulatedPage {
    reloads: AtomicUsize,
}

impl PageReloader for SimulatedPage {
    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        tracing::info!("page reloaded");
    }
}

#[derive(Debug, Serialize)]
struct SessionStep {
    at: String,
    label: String,
    worker_version: Option<u32>,
    status: CacheStatus,
    network_calls: usize,
}

#[derive(Debug, Serialize)]
struct SessionReport {
    url: String,
    ttl_ms: u64,
    steps: Vec<SessionStep>,
    page_reloads: usize,
    metrics: MetricsSnapshot,
}

struct Session {
    host: WorkerHost,
    network: Arc<ScriptedNetwork>,
    clock: Arc<ManualClock>,
    steps: Vec<SessionStep>,
}

impl Session {
    async fn request(
        &mut self,
        label: &str,
        request: ApiRequest,
        client: Option<ClientId>,
    ) -> Result<()> {
        let mut event = FetchEvent::new(request);
        if let Some(client) = client {
            event = event.with_client(client);
        }

        let worker_version = self.host.controller().map(|w| w.version());
        let outcome = self.host.fetch(event).await.settle().await?;

        self.steps.push(SessionStep {
            at: timestamp(self.clock.now_millis()),
            label: label.to_string(),
            worker_version,
            status: outcome.status(),
            network_calls: self.network.call_count(),
        });
        Ok(())
    }
}

fn timestamp(millis: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

async fn simulate(
    config: &WorkerConfig,
    args: &SimulateArgs,
    start_millis: u64,
) -> Result<SessionReport> {
    let url = if args.path.contains("://") {
        args.path.clone()
    } else {
        config.environment.url(&args.path)
    };
    let origin = config.environment.base_api_url.trim_end_matches('/').to_string();

    let store = Arc::new(MemoryCacheStore::new());
    let network = Arc::new(ScriptedNetwork::new());
    network.respond(
        url.as_str(),
        ApiResponse::ok(format!("{{\"version\":{}}}", config.version)),
    );
    let clock = Arc::new(ManualClock::new(start_millis));
    let services = WorkerServices::new(store, network.clone()).with_clock(clock.clone());

    let mut host = WorkerHost::new(origin.as_str(), services);
    host.deploy(config.clone()).await?;

    let mut session = Session {
        host,
        network,
        clock,
        steps: Vec::new(),
    };

    let interval = Duration::from_secs(args.interval * 60);
    for i in 0..args.requests {
        if i > 0 {
            session.clock.advance(interval);
        }
        session
            .request(&format!("GET #{}", i + 1), ApiRequest::get(url.as_str()), None)
            .await?;
    }

    let page = Arc::new(SimulatedPage::default());
    if args.upgrade {
        let tabs: Vec<ClientId> = (0..args.tabs.max(1))
            .map(|_| session.host.clients().open())
            .collect();
        let mut coordinator = ClientCoordinator::new(
            session.host.registration().clone(),
            origin.as_str(),
            page.clone(),
        );
        coordinator.start();

        let mut next = config.clone();
        next.version = config
            .version
            .checked_add(1)
            .context("Cannot upgrade: version is already at its maximum")?;
        session.host.deploy(next).await?;

        // A lone tab navigating gets a reload; with several the old version keeps serving.
        session
            .request("navigate", ApiRequest::navigate(url.as_str()), tabs.first().copied())
            .await?;

        coordinator.poll();
        session.host.pump().await;
        coordinator.poll();

        session.request("GET after upgrade", ApiRequest::get(url.as_str()), None).await?;
    }

    Ok(SessionReport {
        url,
        ttl_ms: config.ttl_ms,
        metrics: session.host.metrics().snapshot(),
        page_reloads: page.reloads.load(Ordering::SeqCst),
        steps: session.steps,
    })
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let start = Utc::now().timestamp_millis().max(0) as u64;
    let report = simulate(&ctx.config, &args, start).await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.header("Simulated session");
    ctx.output.kv("url", &report.url);
    ctx.output.kv("ttl", &format_duration_ms(report.ttl_ms));
    ctx.output.kv("interval", &format_duration_ms(args.interval * 60 * 1000));
    ctx.output.info("");

    let widths = [19, 18, 6, 7, 7];
    ctx.output
        .table_row(&["TIME", "REQUEST", "WORKER", "STATUS", "NETWORK"], &widths);
    for step in &report.steps {
        let worker = step
            .worker_version
            .map(|v| format!("v{}", v))
            .unwrap_or_else(|| "-".to_string());
        let badge = status_badge(step.status);
        let calls = step.network_calls.to_string();
        ctx.output.table_row(
            &[
                step.at.as_str(),
                step.label.as_str(),
                worker.as_str(),
                badge.as_str(),
                calls.as_str(),
            ],
            &widths,
        );
    }

    let metrics = &report.metrics;
    ctx.output.header("Cache metrics");
    ctx.output.kv("served from cache", &metrics.served_from_cache().to_string());
    ctx.output.kv("network fetches", &metrics.network_fetches().to_string());
    if let Some(ratio) = metrics.hit_ratio() {
        ctx.output.kv("hit ratio", &format!("{:.0}%", ratio * 100.0));
    }
    ctx.output.kv("writes stored", &metrics.writes_stored.to_string());
    if args.upgrade {
        ctx.output.kv("buckets purged", &metrics.buckets_purged.to_string());
        ctx.output.kv("page reloads", &report.page_reloads.to_string());
    }

    Ok(())
}
