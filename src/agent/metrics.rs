//! Metrics for agent turns and operation dispatch
//!
//! Recorded through the `metrics` facade. Nothing is exported unless a
//! recorder is installed; with the `prometheus` feature,
//! [`init_metrics_exporter`] installs one.
//!
//! # Metrics
//!
//! - `agent_turns_total`: Counter of finished turns by outcome
//! - `agent_turn_duration_seconds`: Histogram of turn duration by outcome
//! - `agent_rounds_per_turn`: Histogram of planner rounds used per turn
//! - `agent_operations_per_turn`: Histogram of operations dispatched per turn
//! - `agent_operations_total`: Counter of operations by name and status
//! - `agent_active_turns`: Gauge of turns in progress
//!
//! # Examples
//!
//! ```
//! use snow_agent::agent::metrics::TurnMetrics;
//!
//! let mut metrics = TurnMetrics::new();
//! metrics.record_finish("completed", 2, 3);
//! ```

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::time::Instant;

/// Metrics collection for a single user turn
///
/// Increments the active-turn gauge on creation. The gauge is decremented
/// exactly once, either by [`TurnMetrics::record_finish`] or on drop.
#[derive(Debug)]
pub struct TurnMetrics {
    start: Instant,
    recorded: bool,
}

impl TurnMetrics {
    /// Start tracking a turn
    pub fn new() -> Self {
        increment_counter!("agent_turns_started_total");
        increment_gauge!("agent_active_turns", 1.0);

        Self {
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Record the end of the turn
    ///
    /// Only the first call has any effect.
    ///
    /// # Arguments
    ///
    /// * `outcome` - Outcome label ("completed", "round_limit_exceeded", ...)
    /// * `rounds` - Planner invocations used
    /// * `operations` - Operations dispatched or rejected
    pub fn record_finish(&mut self, outcome: &str, rounds: usize, operations: usize) {
        if self.is_recorded() {
            return;
        }
        self.recorded = true;

        histogram!(
            "agent_turn_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "outcome" => outcome.to_string()
        );
        histogram!("agent_rounds_per_turn", rounds as f64);
        histogram!("agent_operations_per_turn", operations as f64);
        increment_counter!("agent_turns_total", "outcome" => outcome.to_string());

        decrement_gauge!("agent_active_turns", 1.0);
    }

    fn is_recorded(&self) -> bool {
        self.recorded
    }

    /// Elapsed time since the turn started
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for TurnMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TurnMetrics {
    fn drop(&mut self) {
        if !self.is_recorded() {
            decrement_gauge!("agent_active_turns", 1.0);
        }
    }
}

/// Count one dispatched (or rejected) operation
///
/// # Arguments
///
/// * `operation` - Operation name as requested
/// * `status` - "ok" or a failure kind label
pub fn record_operation(operation: &str, status: &str) {
    increment_counter!(
        "agent_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    );
}

/// Initializes the metrics exporter for Prometheus
///
/// Only has an effect when compiled with the `prometheus` feature; otherwise
/// it is a no-op and still safe to call.
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_metrics_record_finish() {
        let mut metrics = TurnMetrics::new();
        assert!(!metrics.is_recorded());
        metrics.record_finish("completed", 3, 4);
        assert!(metrics.is_recorded());
    }

    #[test]
    fn test_turn_metrics_double_record_prevention() {
        let mut metrics = TurnMetrics::new();
        metrics.record_finish("completed", 1, 0);
        metrics.record_finish("cancelled", 9, 9);
        assert!(metrics.is_recorded());
    }

    #[test]
    fn test_turn_metrics_drop_without_recording() {
        {
            let _metrics = TurnMetrics::new();
        }
    }

    #[test]
    fn test_turn_metrics_elapsed() {
        let metrics = TurnMetrics::new();
        assert!(metrics.elapsed().as_millis() < 1000);
    }

    #[test]
    fn test_record_operation_labels() {
        record_operation("get_record", "ok");
        record_operation("drop_table", "unknown_operation");
    }

    #[test]
    fn test_turn_metrics_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<TurnMetrics>();
    }

    #[test]
    fn test_init_metrics_exporter() {
        init_metrics_exporter();
    }
}
