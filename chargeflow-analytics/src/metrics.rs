//! Analytics service counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters exposed on the metrics endpoint
#[derive(Debug, Default)]
pub struct AnalyticsMetrics {
    pub classifications_total: AtomicU64,
    pub classification_errors: AtomicU64,
    pub observations_clustered: AtomicU64,
}

impl AnalyticsMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the counters in Prometheus exposition format
    pub fn render(&self) -> String {
        format!(
            "# HELP chargeflow_classifications_total Clustering requests served\n\
             # TYPE chargeflow_classifications_total counter\n\
             chargeflow_classifications_total {}\n\
             # HELP chargeflow_classification_errors_total Clustering requests rejected or failed\n\
             # TYPE chargeflow_classification_errors_total counter\n\
             chargeflow_classification_errors_total {}\n\
             # HELP chargeflow_observations_clustered_total Observations assigned to a cluster\n\
             # TYPE chargeflow_observations_clustered_total counter\n\
             chargeflow_observations_clustered_total {}\n",
            self.classifications_total.load(Ordering::Relaxed),
            self.classification_errors.load(Ordering::Relaxed),
            self.observations_clustered.load(Ordering::Relaxed),
        )
    }
}
