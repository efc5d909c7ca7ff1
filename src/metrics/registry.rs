//! Registers every phase's metrics and checks names for collisions.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::sources::SourcesMetrics>(&mut all_metrics);
    register_phase_metrics::<super::dedupe::DedupeMetrics>(&mut all_metrics);

    info!("Registered {} metrics across all phases", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();
    let phase_docs = T::metrics_documentation();
    debug!("Registering {} metrics for phase '{}'", phase_docs.len(), phase_name);

    for doc in phase_docs {
        if all_metrics.contains_key(doc.name) {
            warn!("Metric name conflict: '{}' redefined by phase '{}'", doc.name, phase_name);
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}
