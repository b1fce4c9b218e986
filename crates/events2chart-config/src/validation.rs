// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::{BackendConfig, BackendKind, PollerConfig, QueueConfig, RuntimeConfig, StreamConfig};
use anyhow::{bail, Result};
use events2chart_core::{AggregateFunction, MetricSpec};
use std::collections::HashSet;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_backend_config(&config.backend)?;
    validate_queue_config(&config.queue)?;
    validate_poller_config(&config.poller)?;
    validate_stream_config(&config.stream)?;
    validate_metrics(&config.metrics)?;
    Ok(())
}

fn validate_backend_config(config: &BackendConfig) -> Result<()> {
    if config.timestamp_field.is_empty() {
        bail!("backend.timestamp_field must not be empty");
    }

    if config.kind == BackendKind::Http {
        if config.base_url.as_deref().unwrap_or("").is_empty() {
            bail!("backend.base_url is required for the http backend");
        }
        if config.project_id.as_deref().unwrap_or("").is_empty() {
            bail!("backend.project_id is required for the http backend");
        }
        if config.write_key.as_deref().unwrap_or("").is_empty() {
            bail!("backend.write_key is required for the http backend");
        }
        if config.read_key.as_deref().unwrap_or("").is_empty() {
            bail!("backend.read_key is required for the http backend");
        }
    }

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<()> {
    if config.max_attempts == 0 {
        bail!("queue.max_attempts must be greater than 0");
    }
    if config.liveness_timeout_secs == 0 {
        bail!("queue.liveness_timeout_secs must be greater than 0");
    }
    if config.sweep_interval_secs >= config.liveness_timeout_secs {
        warn!(
            sweep_interval_secs = config.sweep_interval_secs,
            liveness_timeout_secs = config.liveness_timeout_secs,
            "queue.sweep_interval_secs is not shorter than the liveness timeout; stuck claims will be reclaimed late"
        );
    }
    Ok(())
}

fn validate_poller_config(config: &PollerConfig) -> Result<()> {
    if config.interval_secs == 0 {
        bail!("poller.interval_secs must be greater than 0");
    }
    if config.ingestion_delay_secs == 0 {
        bail!("poller.ingestion_delay_secs must be greater than 0");
    }
    if config.ingestion_delay_secs < config.interval_secs {
        warn!(
            ingestion_delay_secs = config.ingestion_delay_secs,
            interval_secs = config.interval_secs,
            "poller.ingestion_delay_secs is shorter than the poll interval; buckets may undercount late-arriving events"
        );
    }
    Ok(())
}

fn validate_stream_config(config: &StreamConfig) -> Result<()> {
    if config.history_size < 2 {
        bail!("stream.history_size must be at least 2");
    }
    Ok(())
}

fn validate_metrics(metrics: &[MetricSpec]) -> Result<()> {
    let mut names = HashSet::new();
    for metric in metrics {
        if metric.name.is_empty() {
            bail!("metrics entries must have a non-empty name");
        }
        if !names.insert(metric.name.as_str()) {
            bail!("duplicate metric name: {}", metric.name);
        }
        if metric.event_type.is_empty() {
            bail!("metric {}: event_type must not be empty", metric.name);
        }
        if metric.group_by.is_empty() {
            bail!("metric {}: group_by must not be empty", metric.name);
        }
        if metric.categories.is_empty() {
            bail!("metric {}: categories must not be empty", metric.name);
        }
        match metric.function {
            AggregateFunction::Sum | AggregateFunction::Average => {
                if metric.target_field.as_deref().unwrap_or("").is_empty() {
                    bail!(
                        "metric {}: {} requires a target_field",
                        metric.name,
                        metric.function
                    );
                }
            }
            AggregateFunction::Count => {}
        }
    }
    Ok(())
}
