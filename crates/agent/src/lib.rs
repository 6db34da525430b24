//! Telemetry agent
//!
//! Schedules the configured inputs, writes their records as line protocol
//! and serves health and metrics over HTTP.

pub mod api;
pub mod output;
