//! Build time metrics

use crate::record::BuildMetric;
use crate::store::RecordStore;
use assembly_line_core::{BuildOutcome, FailureKind};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Records build duration and outcome
///
/// Recording is best effort: a failing store is logged and never changes
/// the result of the build.
#[derive(Clone)]
pub struct MetricsRecorder {
    store: Arc<dyn RecordStore>,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn record_build(
        &self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        registry: &str,
        image_name: &str,
        outcome: BuildOutcome,
        error_kind: Option<FailureKind>,
    ) -> Option<BuildMetric> {
        let metric = BuildMetric::new(
            started_at,
            finished_at,
            registry,
            image_name,
            outcome,
            error_kind,
        );
        tracing::info!(
            outcome = %metric.outcome,
            error_kind = %metric.error_kind,
            duration_secs = metric.duration_secs,
            "Build finished"
        );

        let body = match serde_json::to_vec(&metric) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to serialize build metric: {}", e);
                return None;
            }
        };

        let key = metric.key();
        match self.store.put(&key, body).await {
            Ok(()) => {
                tracing::debug!("Recorded build metric {} in {}", key, self.store.location());
                Some(metric)
            }
            Err(e) => {
                tracing::warn!("Failed to record build metric {}: {}", key, e);
                None
            }
        }
    }
}
