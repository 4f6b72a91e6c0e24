//! Prometheus metrics for the lifecycle engine.
//!
//! Counters and histograms are recorded through the `metrics` facade and are
//! free when no recorder is installed. [`MetricsExporter`] installs the
//! Prometheus recorder and renders the scrape body; the server binary mounts
//! it at `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventday_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! let body = exporter.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use eventday_core::{LifecycleError, Operation, OtpPurpose};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the recorder cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a warning
    /// and leaves [`Self::render`] returning `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder was not installed by this exporter.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "eventday_transitions_total",
        "Lifecycle operations by operation and outcome"
    );
    describe_histogram!(
        "eventday_operation_duration_seconds",
        "Time taken by lifecycle operations, including collaborator calls"
    );
    describe_counter!(
        "eventday_otp_issued_total",
        "OTP codes delivered to customers"
    );
    describe_counter!(
        "eventday_otp_verifications_total",
        "OTP verification attempts by purpose and outcome"
    );
    describe_counter!("eventday_uploads_total", "Images stored, by folder");
    describe_counter!("eventday_events_created_total", "Events created");
}

/// Outcome label for an operation result.
#[must_use]
pub fn outcome<T>(result: &Result<T, LifecycleError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    }
}

/// Lifecycle metrics recorder.
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    /// Record a finished lifecycle operation.
    pub fn record_transition(operation: Operation, outcome: &'static str, duration: Duration) {
        counter!(
            "eventday_transitions_total",
            "operation" => operation.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!(
            "eventday_operation_duration_seconds",
            "operation" => operation.as_str()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a delivered code.
    pub fn record_otp_issued(purpose: OtpPurpose) {
        counter!("eventday_otp_issued_total", "purpose" => purpose.as_str()).increment(1);
    }

    /// Record a verification attempt.
    pub fn record_otp_verification(purpose: OtpPurpose, outcome: &'static str) {
        counter!(
            "eventday_otp_verifications_total",
            "purpose" => purpose.as_str(),
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Record stored images.
    pub fn record_uploads(folder: &'static str, count: usize) {
        counter!("eventday_uploads_total", "folder" => folder).increment(count as u64);
    }

    /// Record a created event.
    pub fn record_created() {
        counter!("eventday_events_created_total").increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_creation() {
        let exporter = MetricsExporter::new();
        assert!(exporter.handle().is_none());
        assert!(exporter.render().is_none());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome::<()>(&Ok(())), "ok");
        assert_eq!(outcome::<()>(&Err(LifecycleError::OtpExpired)), "OTP_EXPIRED");
    }

    #[tokio::test]
    async fn test_exporter_render() {
        let mut exporter = MetricsExporter::new();
        exporter.install().unwrap();

        LifecycleMetrics::record_transition(Operation::CheckIn, "ok", Duration::from_millis(40));
        LifecycleMetrics::record_otp_issued(OtpPurpose::Start);

        // If another test installed the recorder first, handle is None.
        if let Some(rendered) = exporter.render() {
            assert!(rendered.contains("eventday_transitions_total"));
            assert!(rendered.contains("eventday_otp_issued_total"));
        }
    }
}
