//! Deduplication phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct DedupeMetrics;

impl DedupeMetrics {
    pub fn record_dispatch(batch_size: usize, in_flight: usize) {
        ::metrics::counter!(phase_metric!(counter, "dedupe", "batches_dispatched")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "dedupe", "batch_size"))
            .record(batch_size as f64);
        ::metrics::gauge!(phase_metric!(gauge, "dedupe", "in_flight")).set(in_flight as f64);
    }

    pub fn record_resolved(unique: usize, duplicates: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "dedupe", "addresses_unique"))
            .increment(unique as u64);
        ::metrics::counter!(phase_metric!(counter, "dedupe", "addresses_duplicate"))
            .increment(duplicates as u64);
        ::metrics::histogram!(phase_metric!(histogram, "dedupe", "request_duration_seconds"))
            .record(duration_secs);
    }

    /// A batch dropped because the oracle call failed or answered nonsense
    pub fn record_failed(kind: &'static str, dropped: usize) {
        ::metrics::counter!(phase_metric!(counter, "dedupe", "batches_failed"), "kind" => kind)
            .increment(1);
        ::metrics::counter!(phase_metric!(counter, "dedupe", "addresses_dropped"))
            .increment(dropped as u64);
    }

    pub fn record_in_flight(in_flight: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "dedupe", "in_flight")).set(in_flight as f64);
    }
}

impl PhaseMetrics for DedupeMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "dedupe", "batches_dispatched"));
        let _ = counter!(phase_metric!(counter, "dedupe", "batches_failed"));
        let _ = counter!(phase_metric!(counter, "dedupe", "addresses_unique"));
        let _ = counter!(phase_metric!(counter, "dedupe", "addresses_duplicate"));
        let _ = counter!(phase_metric!(counter, "dedupe", "addresses_dropped"));
        let _ = histogram!(phase_metric!(histogram, "dedupe", "batch_size"));
        let _ = histogram!(phase_metric!(histogram, "dedupe", "request_duration_seconds"));
        let _ = gauge!(phase_metric!(gauge, "dedupe", "in_flight"));
    }

    fn phase_name() -> &'static str {
        "dedupe"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "dedupe", "batches_dispatched"),
                metric_type: MetricType::Counter,
                help: "Batches sent to the deduplication oracle",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "dedupe", "batches_failed"),
                metric_type: MetricType::Counter,
                help: "Batches dropped after a transport error or malformed response",
                labels: vec!["kind"],
            },
            MetricDoc {
                name: phase_metric!(counter, "dedupe", "addresses_unique"),
                metric_type: MetricType::Counter,
                help: "Addresses confirmed unique and forwarded with a guid",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "dedupe", "addresses_duplicate"),
                metric_type: MetricType::Counter,
                help: "Addresses the oracle marked as duplicates",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "dedupe", "addresses_dropped"),
                metric_type: MetricType::Counter,
                help: "Addresses discarded with a failed batch",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "dedupe", "batch_size"),
                metric_type: MetricType::Histogram,
                help: "Number of addresses per dispatched batch",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "dedupe", "request_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Round-trip time of successful oracle requests",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "dedupe", "in_flight"),
                metric_type: MetricType::Gauge,
                help: "Oracle requests currently outstanding",
                labels: vec![],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_documentation() {
        let docs = DedupeMetrics::metrics_documentation();
        assert_eq!(docs.len(), 8);
        for doc in docs {
            assert!(doc.name.starts_with("address_importer_dedupe_"));
        }
    }
}
