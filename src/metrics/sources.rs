//! Source adapter phase metrics
//!
//! Records filtered out, addresses produced by normalization, and addresses
//! dropped for unusable coordinates, labelled by source.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct SourcesMetrics;

impl SourcesMetrics {
    /// A raw record failed its source's filter predicate
    pub fn record_filtered(source: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "sources", "records_filtered"), "source" => source)
            .increment(1);
    }

    pub fn record_normalized(source: &'static str, addresses: usize) {
        ::metrics::counter!(phase_metric!(counter, "sources", "addresses_normalized"), "source" => source)
            .increment(addresses as u64);
    }

    pub fn record_invalid_coordinates(source: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "sources", "invalid_coordinates"), "source" => source)
            .increment(1);
    }

    /// A TIGER side whose house range is too large to interpolate
    pub fn record_oversized_range(source: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "sources", "oversized_ranges"), "source" => source)
            .increment(1);
    }

    /// Input line or row that could not be decoded
    pub fn record_decode_error(source: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "sources", "decode_errors"), "source" => source)
            .increment(1);
    }
}

impl PhaseMetrics for SourcesMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "sources", "records_filtered"));
        let _ = counter!(phase_metric!(counter, "sources", "addresses_normalized"));
        let _ = counter!(phase_metric!(counter, "sources", "invalid_coordinates"));
        let _ = counter!(phase_metric!(counter, "sources", "oversized_ranges"));
        let _ = counter!(phase_metric!(counter, "sources", "decode_errors"));
    }

    fn phase_name() -> &'static str {
        "sources"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "sources", "records_filtered"),
                metric_type: MetricType::Counter,
                help: "Raw records rejected by a source filter",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "addresses_normalized"),
                metric_type: MetricType::Counter,
                help: "Addresses produced by normalization, including interpolated points",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "invalid_coordinates"),
                metric_type: MetricType::Counter,
                help: "Addresses dropped for non-finite or out-of-range coordinates",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "oversized_ranges"),
                metric_type: MetricType::Counter,
                help: "TIGER sides skipped because their house range exceeds the interpolation limit",
                labels: vec!["source"],
            },
            MetricDoc {
                name: phase_metric!(counter, "sources", "decode_errors"),
                metric_type: MetricType::Counter,
                help: "Input lines or rows that failed to decode",
                labels: vec!["source"],
            },
        ]
    }
}
