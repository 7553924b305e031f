//! Aggregated health check reporting.
//!
//! The orchestrator periodically polls each plugin's `health_check()`
//! and logs a unified [`DaemonHealth`] report. The overall daemon status
//! is the worst status among all enabled plugins.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use sysgrok_core::pipeline::HealthStatus;
use sysgrok_core::plugin::PluginState;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all plugins).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-plugin health reports.
    pub modules: Vec<ModuleHealth>,
}

/// Health status for a single plugin.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Plugin name (e.g., "syslog-pipeline", "queue-publisher").
    pub name: String,
    /// Whether the plugin is expected to be running.
    pub enabled: bool,
    /// Current health status of the plugin.
    pub status: HealthStatus,
}

impl ModuleHealth {
    /// Build a report entry from a plugin registry health tuple.
    ///
    /// Plugins that were never started or already stopped are not
    /// counted against the daemon.
    pub fn from_plugin(name: String, state: PluginState, status: HealthStatus) -> Self {
        Self {
            name,
            enabled: state == PluginState::Running,
            status,
        }
    }
}

/// Aggregate multiple plugin health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
/// Only considers enabled plugins.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for module in modules.iter().filter(|m| m.enabled) {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                if !worst.is_unhealthy() {
                    reasons.push(format!("{}: {}", module.name, reason));
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", module.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}

/// Log an aggregated health report at a level matching its status.
pub fn log_health(health: &DaemonHealth) {
    match &health.status {
        HealthStatus::Healthy => {
            tracing::debug!(uptime_secs = health.uptime_secs, "daemon healthy");
        }
        HealthStatus::Degraded(reason) => {
            tracing::warn!(uptime_secs = health.uptime_secs, reason = %reason, "daemon degraded");
        }
        HealthStatus::Unhealthy(reason) => {
            tracing::error!(uptime_secs = health.uptime_secs, reason = %reason, "daemon unhealthy");
        }
    }
}
