//! Aggregated health check reporting.
//!
//! The orchestrator polls each component on a fixed interval and folds the
//! results into a single [`DaemonHealth`] report. The overall daemon status
//! is the worst status among all enabled components.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use hooklog_core::pipeline::HealthStatus;
use hooklog_pipeline::ReceiverSnapshot;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all components).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-component health reports.
    pub modules: Vec<ModuleHealth>,
    /// Receiver counters at the time of the report.
    pub receiver: ReceiverSnapshot,
    /// Records currently held in the ring buffer.
    pub buffer_size: usize,
    /// Live subscriber count.
    pub clients_connected: usize,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Component name (e.g., "log-pipeline").
    pub name: String,
    /// Whether the component is enabled in configuration.
    pub enabled: bool,
    /// Current health status of the component.
    pub status: HealthStatus,
}

/// Aggregate multiple component health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Only considers enabled components.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut degraded = Vec::new();
    let mut unhealthy = Vec::new();

    for module in modules.iter().filter(|m| m.enabled) {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                degraded.push(format!("{}: {}", module.name, reason));
                if !worst.is_unhealthy() {
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{}: {}", module.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(degraded.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(unhealthy.join("; ")),
    }
}
