// Environment variable overrides.
//
// Every override lives under the EVENTS2CHART_ prefix. Credentials are the
// usual case here; tuning knobs belong in the config file.

use crate::{BackendKind, RuntimeConfig};
use anyhow::{Context, Result};

pub const ENV_PREFIX: &str = "EVENTS2CHART_";

/// Abstraction over env var lookup so overrides are testable without
/// mutating process state.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

pub fn apply_env_overrides(config: &mut RuntimeConfig, env: &dyn EnvSource) -> Result<()> {
    if let Some(kind) = env.get("BACKEND_KIND") {
        config.backend.kind = kind
            .parse::<BackendKind>()
            .context("Invalid EVENTS2CHART_BACKEND_KIND")?;
    }
    if let Some(url) = env.get("BACKEND_BASE_URL") {
        config.backend.base_url = Some(url);
    }
    if let Some(project) = env.get("BACKEND_PROJECT_ID") {
        config.backend.project_id = Some(project);
    }
    if let Some(key) = env.get("BACKEND_WRITE_KEY") {
        config.backend.write_key = Some(key);
    }
    if let Some(key) = env.get("BACKEND_READ_KEY") {
        config.backend.read_key = Some(key);
    }

    if let Some(value) = env.get("POLL_INTERVAL_SECS") {
        config.poller.interval_secs = value
            .parse()
            .context("Invalid EVENTS2CHART_POLL_INTERVAL_SECS")?;
    }
    if let Some(value) = env.get("INGESTION_DELAY_SECS") {
        config.poller.ingestion_delay_secs = value
            .parse()
            .context("Invalid EVENTS2CHART_INGESTION_DELAY_SECS")?;
    }
    if let Some(value) = env.get("MAX_ATTEMPTS") {
        config.queue.max_attempts = value
            .parse()
            .context("Invalid EVENTS2CHART_MAX_ATTEMPTS")?;
    }

    Ok(())
}
