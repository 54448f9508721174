//! Feature flags.
//!
//! Flags arrive as a remote-config document (a `parameters` map whose entries carry a
//! `defaultValue.value` string). The document is read from a file at startup and re-read on an
//! interval; each successful read replaces the shared snapshot in one swap.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const ENABLE_SCHEDULE_MONTHLY: &str = "enable_schedule_monthly";
pub const ENABLE_SCHEDULE_ONCE: &str = "enable_schedule_once";
pub const TRANSFER_LIMIT: &str = "transfer_limit";

/// The remote-config document as stored on disk. It is served back unchanged by `/features`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub version: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(default)]
    pub default_value: DefaultValue,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub value_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub name: String,
    pub expression: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag_color: String,
}

/// One immutable view of the flags: the known switches decoded, plus the document they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFlags {
    pub enable_schedule_monthly: bool,
    pub enable_schedule_once: bool,
    pub transfer_limit: Option<String>,
    pub config: RemoteConfig,
}

impl FeatureFlags {
    pub fn from_remote_config(config: RemoteConfig) -> Self {
        // A flag is on only when its value is exactly `true`.
        let enabled = |name: &str| {
            config
                .parameters
                .get(name)
                .is_some_and(|p| p.default_value.value == "true")
        };
        Self {
            enable_schedule_monthly: enabled(ENABLE_SCHEDULE_MONTHLY),
            enable_schedule_once: enabled(ENABLE_SCHEDULE_ONCE),
            transfer_limit: config
                .parameters
                .get(TRANSFER_LIMIT)
                .map(|p| p.default_value.value.clone()),
            config,
        }
    }

    pub fn parse(json: &str) -> Result<Self> {
        let config: RemoteConfig =
            serde_json::from_str(json).context("Invalid feature flag document")?;
        Ok(Self::from_remote_config(config))
    }
}

/// Process-wide holder of the current flag snapshot. Readers clone the `Arc` and never block
/// a refresh for longer than that.
#[derive(Debug, Default)]
pub struct FeatureStore {
    current: RwLock<Arc<FeatureFlags>>,
}

impl FeatureStore {
    pub fn new(flags: FeatureFlags) -> Self {
        Self {
            current: RwLock::new(Arc::new(flags)),
        }
    }

    pub fn snapshot(&self) -> Arc<FeatureFlags> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, flags: FeatureFlags) {
        let flags = Arc::new(flags);
        match self.current.write() {
            Ok(mut guard) => *guard = flags,
            Err(poisoned) => *poisoned.into_inner() = flags,
        }
    }
}

pub async fn load_file(path: &Path) -> Result<FeatureFlags> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read feature flags from {}", path.display()))?;
    FeatureFlags::parse(&json)
}

/// Re-read `path` every `every` and swap the snapshot. A failed read keeps the previous flags.
pub fn spawn_refresh(store: Arc<FeatureStore>, path: PathBuf, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; startup has already loaded the file.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match load_file(&path).await {
                Ok(flags) => {
                    if *store.snapshot() != flags {
                        info!(parameters = flags.config.parameters.len(), "feature flags updated");
                    } else {
                        debug!("feature flags unchanged");
                    }
                    store.replace(flags);
                }
                Err(err) => warn!(error = %format!("{err:#}"), "feature flag refresh failed"),
            }
        }
    })
}
