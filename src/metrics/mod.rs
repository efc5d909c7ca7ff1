//! Metrics for the import pipeline
//!
//! Each pipeline phase defines its metrics in a dedicated submodule. Recording goes
//! through the `metrics` facade, so it is a no-op until a recorder is installed.

pub mod dedupe;
pub mod registry;
pub mod sources;

pub use dedupe::DedupeMetrics;
pub use sources::SourcesMetrics;

use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Install the Prometheus exporter if `IMPORTER_METRICS_ADDR` is set.
///
/// Idempotent. Registers every phase's metrics once the recorder is in place.
pub fn init_metrics() {
    INIT.call_once(|| {
        let addr_str = match std::env::var("IMPORTER_METRICS_ADDR") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return,
        };
        let addr = match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                warn!("Invalid IMPORTER_METRICS_ADDR '{}', metrics exporter disabled", addr_str);
                return;
            }
        };

        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => {
                info!("Prometheus exporter listening on http://{}/metrics", addr);
                registry::register_all_metrics();
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Implemented by each pipeline phase's metrics collection
pub trait PhaseMetrics {
    /// Pre-register metrics so they appear before first use
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    #[allow(dead_code)]
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names following address_importer_{phase}_{name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("address_importer_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("address_importer_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("address_importer_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_metric_naming() {
        assert_eq!(
            phase_metric!(counter, "dedupe", "batches_dispatched"),
            "address_importer_dedupe_batches_dispatched_total"
        );
        assert_eq!(
            phase_metric!(gauge, "dedupe", "in_flight"),
            "address_importer_dedupe_in_flight"
        );
    }

    #[test]
    fn test_init_without_address_is_noop() {
        std::env::remove_var("IMPORTER_METRICS_ADDR");
        init_metrics();
        init_metrics();
    }
}
