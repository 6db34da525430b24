//! Liveness and readiness bookkeeping
//!
//! One component per configured input instance (`inputs.<name>.<index>`)
//! plus the `output` writer. Inputs report after every gather; the agent is
//! only considered down when its output is.

use crate::error::InputError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Some resource kinds failed, the rest were gathered
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Records submitted by the last gather
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(default)]
    pub consecutive_failures: u32,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            records: None,
            consecutive_failures: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    /// Health after a gather: a partial gather degrades, any other error fails
    pub fn from_gather(result: &Result<(), InputError>) -> Self {
        match result {
            Ok(()) => Self::healthy(),
            Err(e @ InputError::PartialGather(_)) => {
                Self::with_status(ComponentStatus::Degraded, Some(e.to_string()))
            }
            Err(e) => Self::unhealthy(e.to_string()),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across all components
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// True when the output writer has failed
    pub fn output_down(&self) -> bool {
        self.components
            .get(components::OUTPUT)
            .is_some_and(|h| !h.status.is_operational())
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub mod components {
    pub const OUTPUT: &str = "output";

    /// Component name of the `index`-th instance of an input
    pub fn input(name: &str, index: usize) -> String {
        format!("inputs.{}.{}", name, index)
    }
}

#[derive(Debug, Default)]
struct State {
    components: BTreeMap<String, ComponentHealth>,
    ready: bool,
}

/// Shared, cloneable view of every component's health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component as healthy
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), health);
    }

    /// Record the outcome of one gather, counting consecutive failures
    pub async fn record_gather(&self, name: &str, result: &Result<(), InputError>, records: usize) {
        let mut state = self.state.write().await;
        let failures = match (result, state.components.get(name)) {
            (Ok(()), _) => 0,
            (Err(_), Some(previous)) => previous.consecutive_failures + 1,
            (Err(_), None) => 1,
        };

        let mut health = ComponentHealth::from_gather(result);
        health.records = Some(records);
        health.consecutive_failures = failures;
        state.components.insert(name.to_string(), health);
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    /// Ready once started, for as long as the output writer works
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let output_failed = state
            .components
            .get(components::OUTPUT)
            .is_some_and(|h| !h.status.is_operational());

        let reason = if !state.ready {
            Some("Agent not yet initialized")
        } else if output_failed {
            Some("Output writer unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KindFailure;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_health_registry_component_registration() {
        let registry = HealthRegistry::new();
        let name = components::input("kube_state", 0);
        registry.register(&name).await;

        let health = registry.health().await;
        assert_eq!(name, "inputs.kube_state.0");
        assert_eq!(health.components[&name].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_partial_gather_degrades() {
        let registry = HealthRegistry::new();
        let result = Err(InputError::PartialGather(vec![KindFailure {
            kind: "pods".to_string(),
            error: InputError::Config("boom".to_string()),
        }]));

        registry
            .update("inputs.kube_state.0", ComponentHealth::from_gather(&result))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_failed_gather_is_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::OUTPUT).await;
        registry
            .update(
                "inputs.dellstoragecenter.0",
                ComponentHealth::from_gather(&Err(InputError::MissingCredentials)),
            )
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);

        // A failing input does not take the agent out of rotation
        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_record_gather_counts_consecutive_failures() {
        let registry = HealthRegistry::new();
        let name = components::input("dellstoragecenter", 0);
        registry.register(&name).await;

        registry
            .record_gather(&name, &Err(InputError::EmptyHistory("I/O usage")), 2)
            .await;
        registry
            .record_gather(&name, &Err(InputError::MissingCredentials), 0)
            .await;

        let health = registry.health().await;
        let component = &health.components[&name];
        assert_eq!(component.consecutive_failures, 2);
        assert_eq!(component.records, Some(0));
        assert_eq!(component.status, ComponentStatus::Unhealthy);

        registry.record_gather(&name, &Ok(()), 7).await;
        let health = registry.health().await;
        assert_eq!(health.components[&name].consecutive_failures, 0);
        assert_eq!(health.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_output_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::OUTPUT).await;
        registry.set_ready(true).await;
        registry.set_unhealthy(components::OUTPUT, "stdout closed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(registry.health().await.output_down());
    }
}
