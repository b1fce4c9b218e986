// events2chart - durable event queue and cache-refresh pipeline
//
// Wiring only: constructs the backend, store, and pipeline components from
// RuntimeConfig and supervises them until shutdown. All behavior lives in
// the member crates.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use events2chart_analytics::{
    AnalyticsBackend, HttpAnalyticsClient, HttpBackendSettings, MemoryBackend,
};
use events2chart_cache::{CachePoller, ChartConsumer, PollSettings, StreamAssembler, StreamSettings};
use events2chart_config::{BackendKind, RuntimeConfig};
use events2chart_core::{AggregateFunction, ChartSeries, ChartStep, MetricSpec};
use events2chart_queue::{
    ClaimReaper, EventProducer, QueueWorker, ReaperSettings, WorkerSettings,
};
use events2chart_store::MemoryStore;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Initialize tracing from RUST_LOG, defaulting to info.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer());

    // Ignore error if a subscriber is already set (idempotent)
    let _ = tracing::subscriber::set_global_default(registry);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Watch channel flipped to true on Ctrl+C or SIGTERM.
pub fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

fn build_backend(config: &RuntimeConfig) -> Result<Arc<dyn AnalyticsBackend>> {
    match config.backend.kind {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new(
            config.backend.timestamp_field.clone(),
        ))),
        BackendKind::Http => {
            let settings = HttpBackendSettings {
                base_url: config
                    .backend
                    .base_url
                    .clone()
                    .context("backend.base_url is required")?,
                project_id: config
                    .backend
                    .project_id
                    .clone()
                    .context("backend.project_id is required")?,
                write_key: config
                    .backend
                    .write_key
                    .clone()
                    .context("backend.write_key is required")?,
                read_key: config
                    .backend
                    .read_key
                    .clone()
                    .context("backend.read_key is required")?,
                timeout: config.backend.request_timeout(),
            };
            let client = HttpAnalyticsClient::new(settings)
                .context("failed to construct analytics client")?;
            Ok(Arc::new(client))
        }
    }
}

fn worker_settings(config: &RuntimeConfig) -> WorkerSettings {
    WorkerSettings {
        max_attempts: config.queue.max_attempts,
        idle_backoff: config.queue.idle_backoff(),
        timestamp_field: config.backend.timestamp_field.clone(),
        ..WorkerSettings::default()
    }
}

fn reaper_settings(config: &RuntimeConfig) -> ReaperSettings {
    ReaperSettings {
        liveness_timeout: config.queue.liveness_timeout(),
        sweep_interval: config.queue.sweep_interval(),
        max_attempts: config.queue.max_attempts,
    }
}

fn stream_settings(config: &RuntimeConfig) -> StreamSettings {
    StreamSettings {
        history_size: config.stream.history_size,
        wait_backoff: config.stream.wait_backoff(),
    }
}

/// Run the full pipeline against the configured backend: one queue worker,
/// the claim reaper, and one cache poller per configured metric.
pub async fn run_pipeline(config: RuntimeConfig) -> Result<()> {
    let backend = build_backend(&config)?;
    let store = Arc::new(MemoryStore::new());
    let shutdown = shutdown_channel();

    info!(
        backend = %config.backend.kind,
        metrics = config.metrics.len(),
        "pipeline starting"
    );
    supervise(&config, backend, store, shutdown).await;
    info!("pipeline shutdown complete");
    Ok(())
}

async fn supervise(
    config: &RuntimeConfig,
    backend: Arc<dyn AnalyticsBackend>,
    store: Arc<MemoryStore>,
    shutdown: watch::Receiver<bool>,
) {
    let mut tasks = Vec::new();

    let worker = QueueWorker::new(
        Arc::clone(&store),
        Arc::clone(&backend),
        worker_settings(config),
    );
    let rx = shutdown.clone();
    tasks.push(tokio::spawn(async move { worker.run(rx).await }));

    let reaper = ClaimReaper::new(Arc::clone(&store), reaper_settings(config));
    let rx = shutdown.clone();
    tasks.push(tokio::spawn(async move { reaper.run(rx).await }));

    let poll_settings = PollSettings {
        interval: config.poller.interval(),
        ingestion_delay: config.poller.ingestion_delay(),
    };
    for metric in config.metrics.clone() {
        let mut poller = CachePoller::new(
            Arc::clone(&backend),
            Arc::clone(&store),
            metric,
            poll_settings.clone(),
        );
        let rx = shutdown.clone();
        tasks.push(tokio::spawn(async move { poller.run(rx).await }));
    }

    for task in tasks {
        if let Err(err) = task.await {
            error!(error = %err, "pipeline task panicked");
        }
    }
}

/// Chart consumer that logs primes and steps; stands in for a UI.
struct LogConsumer {
    metric: String,
}

impl ChartConsumer for LogConsumer {
    fn prime(&mut self, series: &[ChartSeries]) {
        for s in series {
            info!(
                metric = %self.metric,
                category = %s.category,
                points = s.points.len(),
                "chart primed"
            );
        }
    }

    fn push(&mut self, step: ChartStep) {
        info!(
            metric = %self.metric,
            timestamp = %step.timestamp.to_rfc3339(),
            values = ?step.values,
            "chart step"
        );
    }
}

fn demo_metric() -> MetricSpec {
    MetricSpec {
        name: "purchases_by_gender".to_string(),
        event_type: "Purchases".to_string(),
        function: AggregateFunction::Average,
        target_field: Some("cost".to_string()),
        group_by: "customer.gender".to_string(),
        categories: vec!["Female".to_string(), "Male".to_string()],
    }
}

/// Self-contained demo: synthetic purchase events flow through the queue
/// into the in-memory backend, pollers bucket them, and assemblers log the
/// resulting chart steps. Runs until Ctrl+C.
pub async fn run_demo(config: RuntimeConfig) -> Result<()> {
    // Demo pacing: short enough to watch, long enough for the simulated
    // ingestion lag to matter.
    let interval = Duration::from_secs(2);
    let ingestion_delay = Duration::from_secs(5);
    let ingestion_lag = chrono::Duration::seconds(1);

    let backend = Arc::new(
        MemoryBackend::new(config.backend.timestamp_field.clone()).with_ingestion_lag(ingestion_lag),
    );
    let store = Arc::new(MemoryStore::new());
    let shutdown = shutdown_channel();

    let metrics = if config.metrics.is_empty() {
        vec![demo_metric()]
    } else {
        config.metrics.clone()
    };
    info!(metrics = metrics.len(), "demo starting, press Ctrl+C to stop");

    let mut tasks = Vec::new();

    // Synthetic producer: one purchase every 300ms, alternating genders.
    let producer = EventProducer::new(Arc::clone(&store));
    let event_type = metrics[0].event_type.clone();
    let mut rx = shutdown.clone();
    tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(300));
        let mut n: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = rx.changed() => break,
            }
            let gender = if n % 2 == 0 { "Female" } else { "Male" };
            let cost = 40.0 + (n % 7) as f64 * 2.5;
            let payload = serde_json::json!({
                "customer": { "gender": gender },
                "cost": cost,
            });
            if let Err(err) = producer.publish(&event_type, payload).await {
                error!(error = %err, "demo producer failed to publish");
            }
            n += 1;
        }
    }));

    let worker = QueueWorker::new(
        Arc::clone(&store),
        Arc::clone(&backend) as Arc<dyn AnalyticsBackend>,
        worker_settings(&config),
    );
    let rx = shutdown.clone();
    tasks.push(tokio::spawn(async move { worker.run(rx).await }));

    let reaper = ClaimReaper::new(Arc::clone(&store), reaper_settings(&config));
    let rx = shutdown.clone();
    tasks.push(tokio::spawn(async move { reaper.run(rx).await }));

    for metric in &metrics {
        let mut poller = CachePoller::new(
            Arc::clone(&backend) as Arc<dyn AnalyticsBackend>,
            Arc::clone(&store),
            metric.clone(),
            PollSettings {
                interval,
                ingestion_delay,
            },
        );
        let rx = shutdown.clone();
        tasks.push(tokio::spawn(async move { poller.run(rx).await }));

        let assembler = StreamAssembler::new(
            Arc::clone(&store),
            metric.name.clone(),
            metric.categories.clone(),
            stream_settings(&config),
        );
        let metric_name = metric.name.clone();
        let rx = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            let mut consumer = LogConsumer {
                metric: metric_name,
            };
            if let Err(err) = assembler.run(&mut consumer, rx).await {
                error!(error = %err, "stream assembler failed");
            }
        }));
    }

    for task in tasks {
        if let Err(err) = task.await {
            error!(error = %err, "demo task panicked");
        }
    }
    info!("demo shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_settings_are_derived_from_config() {
        let mut config = RuntimeConfig::default();
        config.queue.max_attempts = 7;
        config.queue.idle_backoff_ms = 250;
        config.backend.timestamp_field = "recorded_at".to_string();
        config.stream.history_size = 12;
        config.stream.wait_backoff_secs = 3;

        let worker = worker_settings(&config);
        assert_eq!(worker.max_attempts, 7);
        assert_eq!(worker.idle_backoff, Duration::from_millis(250));
        assert_eq!(worker.timestamp_field, "recorded_at");

        let reaper = reaper_settings(&config);
        assert_eq!(reaper.max_attempts, 7);

        let stream = stream_settings(&config);
        assert_eq!(stream.history_size, 12);
        assert_eq!(stream.wait_backoff, Duration::from_secs(3));
    }
}
