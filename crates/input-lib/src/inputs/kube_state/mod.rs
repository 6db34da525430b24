//! Kubernetes cluster-state input
//!
//! Lists a fixed catalog of resource kinds from the API server, one task per
//! enabled kind, and flattens every object into records. A failing kind does
//! not stop the others.

mod client;
mod configmaps;
mod deployments;
mod helpers;
mod nodes;
mod persistent_volume_claims;
mod persistent_volumes;
mod pods;
mod statefulsets;

#[cfg(test)]
mod tests;

pub use client::KubeClient;
pub use helpers::{bool_int, parse_quantity, sanitize_label_name};

use super::{async_trait, parse_table, Input, InputInfo};
use crate::accumulator::Accumulator;
use crate::config::{deserialize_duration, deserialize_optional_duration};
use crate::error::{InputError, KindFailure, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PLUGIN_NAME: &str = "kube_state";

pub const INFO: InputInfo = InputInfo {
    name: PLUGIN_NAME,
    description: "Read metrics from the Kubernetes API",
    sample_config: SAMPLE_CONFIG,
};

const SAMPLE_CONFIG: &str = r#"
  ## URL for the kubelet or API server
  url = "https://1.1.1.1:10255"

  ## Namespace to use; empty for all namespaces
  # namespace = "default"

  ## Use bearer token for authorization
  # bearer_token = "/path/to/bearer/token"
  ## OR
  # bearer_token_string = "abc_123"

  ## Set response_timeout (default 5 seconds)
  # response_timeout = "5s"

  ## Optional resources to exclude from gathering
  ## Options: configmaps, deployments, nodes, persistentvolumes,
  ## persistentvolumeclaims, pods, statefulsets
  # resource_exclude = [ "deployments", "nodes", "statefulsets" ]

  ## After the first gather, only report configmaps younger than this
  # max_config_map_age = "1h"

  ## Optional TLS Config
  # tls_ca = "/path/to/cafile"
  # tls_cert = "/path/to/certfile"
  # tls_key = "/path/to/keyfile"
  ## Use TLS but skip chain & host verification
  # insecure_skip_verify = false
"#;

/// `[[inputs.kube_state]]` options
#[derive(Debug, Clone, Deserialize)]
pub struct KubeStateConfig {
    pub url: String,
    #[serde(default)]
    pub bearer_token: Option<PathBuf>,
    #[serde(default)]
    pub bearer_token_string: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(
        default = "default_response_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub response_timeout: Duration,
    #[serde(default)]
    pub resource_exclude: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub max_config_map_age: Option<Duration>,
    #[serde(default)]
    pub tls_ca: Option<PathBuf>,
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Resource kinds this input knows how to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    ConfigMaps,
    Deployments,
    Nodes,
    PersistentVolumes,
    PersistentVolumeClaims,
    Pods,
    StatefulSets,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::ConfigMaps,
        ResourceKind::Deployments,
        ResourceKind::Nodes,
        ResourceKind::PersistentVolumes,
        ResourceKind::PersistentVolumeClaims,
        ResourceKind::Pods,
        ResourceKind::StatefulSets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConfigMaps => "configmaps",
            ResourceKind::Deployments => "deployments",
            ResourceKind::Nodes => "nodes",
            ResourceKind::PersistentVolumes => "persistentvolumes",
            ResourceKind::PersistentVolumeClaims => "persistentvolumeclaims",
            ResourceKind::Pods => "pods",
            ResourceKind::StatefulSets => "statefulsets",
        }
    }

    /// List endpoint; an empty namespace lists across all namespaces
    pub fn api_path(&self, namespace: &str) -> String {
        let (group, namespaced) = match self {
            ResourceKind::Nodes | ResourceKind::PersistentVolumes => ("api/v1", false),
            ResourceKind::Deployments | ResourceKind::StatefulSets => ("apis/apps/v1", true),
            _ => ("api/v1", true),
        };

        if namespaced && !namespace.is_empty() {
            format!("/{}/namespaces/{}/{}", group, namespace, self.as_str())
        } else {
            format!("/{}/{}", group, self.as_str())
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| InputError::Config(format!("unknown resource kind: {}", s)))
    }
}

/// Per-gather state shared by every kind task
pub struct GatherContext {
    pub namespace: String,
    pub first_gather: bool,
    pub max_config_map_age: Option<Duration>,
    pub now: DateTime<Utc>,
}

/// Kubernetes cluster-state input plugin
pub struct KubeState {
    config: KubeStateConfig,
    enabled: BTreeSet<ResourceKind>,
    client: Option<Arc<KubeClient>>,
    first_gather: bool,
}

pub(crate) fn factory(table: serde_json::Value) -> Result<Box<dyn Input>> {
    Ok(Box::new(KubeState::new(parse_table(table)?)))
}

impl KubeState {
    pub fn new(config: KubeStateConfig) -> Self {
        let mut enabled: BTreeSet<ResourceKind> = ResourceKind::ALL.into_iter().collect();
        for name in &config.resource_exclude {
            match name.parse::<ResourceKind>() {
                Ok(kind) => {
                    enabled.remove(&kind);
                }
                Err(_) => warn!(resource = %name, "Ignoring unknown resource in resource_exclude"),
            }
        }

        Self {
            config,
            enabled,
            client: None,
            first_gather: false,
        }
    }

    pub fn enabled_kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.enabled.iter().copied()
    }

    pub fn is_first_gather(&self) -> bool {
        self.first_gather
    }

    fn client(&mut self) -> Result<Arc<KubeClient>> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }

        let client = Arc::new(KubeClient::new(&self.config)?);
        debug!(url = %client.base_url(), "Created Kubernetes client");
        self.client = Some(Arc::clone(&client));
        self.first_gather = true;
        Ok(client)
    }
}

#[async_trait]
impl Input for KubeState {
    fn name(&self) -> &'static str {
        INFO.name
    }

    fn description(&self) -> &'static str {
        INFO.description
    }

    fn sample_config(&self) -> &'static str {
        INFO.sample_config
    }

    async fn gather(&mut self, acc: &dyn Accumulator) -> Result<()> {
        let client = self.client()?;
        let ctx = GatherContext {
            namespace: self.config.namespace.clone(),
            first_gather: self.first_gather,
            max_config_map_age: self.config.max_config_map_age,
            now: Utc::now(),
        };

        let tasks = self.enabled.iter().map(|&kind| {
            let client = &client;
            let ctx = &ctx;
            async move { (kind, collect(kind, client, acc, ctx).await) }
        });
        let outcomes = futures::future::join_all(tasks).await;
        self.first_gather = false;

        let mut records = 0;
        let mut failures = Vec::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(count) => {
                    debug!(kind = %kind, records = count, "Gathered resource kind");
                    records += count;
                }
                Err(error) => {
                    warn!(kind = %kind, error = %error, "Failed to gather resource kind");
                    failures.push(KindFailure {
                        kind: kind.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            url = %self.config.url,
            kinds = self.enabled.len(),
            failed = failures.len(),
            records = records,
            "Gathered Kubernetes state"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(InputError::PartialGather(failures))
        }
    }
}

async fn collect(
    kind: ResourceKind,
    client: &KubeClient,
    acc: &dyn Accumulator,
    ctx: &GatherContext,
) -> Result<usize> {
    match kind {
        ResourceKind::ConfigMaps => configmaps::collect(client, acc, ctx).await,
        ResourceKind::Deployments => deployments::collect(client, acc, ctx).await,
        ResourceKind::Nodes => nodes::collect(client, acc, ctx).await,
        ResourceKind::PersistentVolumes => persistent_volumes::collect(client, acc, ctx).await,
        ResourceKind::PersistentVolumeClaims => {
            persistent_volume_claims::collect(client, acc, ctx).await
        }
        ResourceKind::Pods => pods::collect(client, acc, ctx).await,
        ResourceKind::StatefulSets => statefulsets::collect(client, acc, ctx).await,
    }
}
