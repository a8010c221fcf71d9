//! Service counters exposed in Prometheus text format

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for the processor service
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Telemetry messages delivered by the broker
    pub messages_received: AtomicU64,
    /// Messages successfully written to storage
    pub messages_ingested: AtomicU64,
    /// Messages dropped (malformed payload or storage failure)
    pub messages_dropped: AtomicU64,
    /// Read API requests served
    pub reads_served: AtomicU64,
    /// Read operations that degraded to an empty result
    pub read_errors: AtomicU64,
}

impl ProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the counters in Prometheus exposition format
    pub fn render(&self) -> String {
        format!(
            "# HELP chargeflow_messages_received_total Telemetry messages delivered by the broker\n\
             # TYPE chargeflow_messages_received_total counter\n\
             chargeflow_messages_received_total {}\n\
             # HELP chargeflow_messages_ingested_total Telemetry messages written to storage\n\
             # TYPE chargeflow_messages_ingested_total counter\n\
             chargeflow_messages_ingested_total {}\n\
             # HELP chargeflow_messages_dropped_total Telemetry messages dropped\n\
             # TYPE chargeflow_messages_dropped_total counter\n\
             chargeflow_messages_dropped_total {}\n\
             # HELP chargeflow_reads_served_total Read API requests served\n\
             # TYPE chargeflow_reads_served_total counter\n\
             chargeflow_reads_served_total {}\n\
             # HELP chargeflow_read_errors_total Reads degraded to an empty result\n\
             # TYPE chargeflow_read_errors_total counter\n\
             chargeflow_read_errors_total {}\n",
            self.messages_received.load(Ordering::Relaxed),
            self.messages_ingested.load(Ordering::Relaxed),
            self.messages_dropped.load(Ordering::Relaxed),
            self.reads_served.load(Ordering::Relaxed),
            self.read_errors.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_all_counters() {
        let metrics = ProcessorMetrics::new();
        metrics.messages_received.fetch_add(3, Ordering::Relaxed);
        metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);

        let rendered = metrics.render();
        assert!(rendered.contains("chargeflow_messages_received_total 3"));
        assert!(rendered.contains("chargeflow_messages_dropped_total 1"));
        assert!(rendered.contains("chargeflow_reads_served_total 0"));
        assert!(rendered.contains("# TYPE chargeflow_messages_ingested_total counter"));
    }
}
