//! Input plugins for the telemetry agent
//!
//! This crate provides:
//! - A Dell Storage Center volume statistics input
//! - A Kubernetes cluster-state input
//! - The accumulator, registry and gather loop the agent drives them with
//! - Health checks and observability

pub mod accumulator;
pub mod config;
pub mod error;
pub mod gather_loop;
pub mod health;
pub mod inputs;
pub mod models;
pub mod observability;

pub use accumulator::{Accumulator, ChannelAccumulator, MemoryAccumulator};
pub use config::{AgentConfig, AgentSection, InputSettings};
pub use error::{InputError, KindFailure, Result};
pub use gather_loop::{GatherConfig, GatherLoop, GatherLoopBuilder, GatherReport};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inputs::{Input, InputInfo, InputRegistry};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
