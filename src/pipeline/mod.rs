// Import orchestration: unified source stream -> deduplication -> sink

pub mod document;
pub mod reporter;
pub mod sink;

pub use document::{CenterPoint, IndexDocument};
pub use reporter::ProgressReporter;
pub use sink::{AddressSink, JsonLinesSink, MemorySink, OutputFormat};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::config::ImporterConfig;
use crate::constants;
use crate::dedupe::{DedupeConfig, DedupeOracle, DedupeReport, DedupeStage};
use crate::domain::Address;
use crate::error::{ImporterError, Result};
use crate::sources::{AddressStream, SourceKind};

/// Addresses pulled from each source so far
#[derive(Debug, Default)]
pub struct SourceCounters {
    open_addresses: AtomicU64,
    osm: AtomicU64,
    tiger: AtomicU64,
}

impl SourceCounters {
    fn slot(&self, kind: SourceKind) -> &AtomicU64 {
        match kind {
            SourceKind::OpenAddresses => &self.open_addresses,
            SourceKind::Osm => &self.osm,
            SourceKind::Tiger => &self.tiger,
        }
    }

    pub fn get(&self, kind: SourceKind) -> u64 {
        self.slot(kind).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        SourceKind::PRIORITY
            .iter()
            .map(|kind| (kind.as_str().to_string(), self.get(*kind)))
            .collect()
    }
}

/// The per-source address streams configured for one run.
pub struct SourceSet {
    streams: HashMap<SourceKind, AddressStream>,
    counters: Arc<SourceCounters>,
}

impl Default for SourceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceSet {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
            counters: Arc::new(SourceCounters::default()),
        }
    }

    /// Replaces any stream already registered for `kind`.
    pub fn with(mut self, kind: SourceKind, stream: AddressStream) -> Self {
        self.insert(kind, stream);
        self
    }

    pub fn insert(&mut self, kind: SourceKind, stream: AddressStream) {
        if self.streams.insert(kind, stream).is_some() {
            warn!(source = kind.as_str(), "Replacing previously configured source");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Configured sources in concatenation order
    pub fn kinds(&self) -> Vec<SourceKind> {
        SourceKind::PRIORITY
            .into_iter()
            .filter(|kind| self.streams.contains_key(kind))
            .collect()
    }

    /// Counters updated while the unified stream is consumed
    pub fn counters(&self) -> Arc<SourceCounters> {
        Arc::clone(&self.counters)
    }
}

/// Concatenate the configured sources in priority order.
///
/// Each source is exhausted before the next one starts; nothing is filtered or
/// rewritten on the way through.
pub fn unified_stream(mut sources: SourceSet) -> AddressStream {
    let mut unified: AddressStream = Box::new(std::iter::empty());
    for kind in SourceKind::PRIORITY {
        if let Some(stream) = sources.streams.remove(&kind) {
            let tracked = Tracked {
                kind,
                inner: stream,
                counters: Arc::clone(&sources.counters),
                seen: 0,
                finished: false,
            };
            unified = Box::new(unified.chain(tracked));
        }
    }
    unified
}

struct Tracked {
    kind: SourceKind,
    inner: AddressStream,
    counters: Arc<SourceCounters>,
    seen: u64,
    finished: bool,
}

impl Iterator for Tracked {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(address) => {
                self.seen += 1;
                self.counters.slot(self.kind).fetch_add(1, Ordering::Relaxed);
                Some(address)
            }
            None => {
                self.finished = true;
                info!(source = self.kind.as_str(), count = self.seen, "Finished importing: {}", self.kind);
                None
            }
        }
    }
}

/// Outcome of one import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    /// Normalized addresses taken from each source
    pub normalized: BTreeMap<String, u64>,
    pub dedupe: DedupeReport,
    /// Addresses accepted by the sink
    pub imported: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ImportSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    pub fn normalized_total(&self) -> u64 {
        self.normalized.values().sum()
    }
}

/// Drives sources through deduplication into a sink.
pub struct ImportPipeline {
    stage: DedupeStage,
    channel_capacity: usize,
    progress_interval: Duration,
}

impl ImportPipeline {
    pub fn new(oracle: Arc<dyn DedupeOracle>, config: DedupeConfig) -> Self {
        let stage = DedupeStage::new(oracle, config);
        let channel_capacity = stage.config().batch_size;
        Self {
            stage,
            channel_capacity,
            progress_interval: Duration::from_secs(constants::DEFAULT_PROGRESS_INTERVAL_SECS),
        }
    }

    pub fn from_config(oracle: Arc<dyn DedupeOracle>, config: &ImporterConfig) -> Self {
        Self::new(oracle, DedupeConfig::from(&config.dedupe)).with_progress_interval(config.progress_interval())
    }

    pub fn with_progress_interval(mut self, every: Duration) -> Self {
        // tokio intervals panic on a zero period
        self.progress_interval = every.max(Duration::from_millis(1));
        self
    }

    /// Bound of the channel between the source producer and the stage
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Run every configured source through deduplication into `sink`.
    ///
    /// A sink failure is fatal, but only after the stage has drained so no batch
    /// task is left holding the output channel.
    pub async fn run<K: AddressSink>(&self, sources: SourceSet, sink: &mut K) -> Result<ImportSummary> {
        let started_at = Utc::now();
        let counters = sources.counters();
        info!(sources = ?sources.kinds(), config = ?self.stage.config(), "Starting import");

        let (input_tx, input_rx) = mpsc::channel(self.channel_capacity);
        let producer = tokio::task::spawn_blocking(move || {
            for address in unified_stream(sources) {
                // Blocks while the stage is not polling its input
                if input_tx.blocking_send(address).is_err() {
                    warn!("Deduplication input closed early; stopping source producer");
                    break;
                }
            }
        });

        let (output_tx, mut output_rx) = mpsc::channel(self.channel_capacity);
        let imported = Arc::new(AtomicU64::new(0));
        let reporter = ProgressReporter::start(Arc::clone(&imported), self.progress_interval);

        let dedupe = self.stage.run(ReceiverStream::new(input_rx), output_tx);
        let drain = async {
            let mut failure = None;
            while let Some(address) = output_rx.recv().await {
                if failure.is_some() {
                    continue;
                }
                match sink.write(&address).await {
                    Ok(()) => {
                        imported.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!(error = %e, "Sink write failed; discarding remaining addresses");
                        failure = Some(e);
                    }
                }
            }
            match failure {
                Some(e) => Err(e),
                None => sink.flush().await,
            }
        };

        let (report, written) = tokio::join!(dedupe, drain);
        producer
            .await
            .map_err(|e| ImporterError::Pipeline(format!("source producer failed: {}", e)))?;
        let imported = reporter.stop().await;
        written?;

        let summary = ImportSummary {
            normalized: counters.snapshot(),
            dedupe: report,
            imported,
            started_at,
            completed_at: Utc::now(),
        };
        info!(
            normalized = summary.normalized_total(),
            unique = summary.dedupe.unique,
            duplicates = summary.dedupe.duplicates,
            dropped = summary.dedupe.dropped,
            imported = summary.imported,
            elapsed_ms = summary.duration().num_milliseconds(),
            "Import complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(streets: &[&str]) -> AddressStream {
        let addresses: Vec<Address> = streets.iter().map(|s| Address::new(*s, 0.0, 0.0)).collect();
        Box::new(addresses.into_iter())
    }

    #[test]
    fn test_unified_stream_uses_priority_order() {
        let sources = SourceSet::new()
            .with(SourceKind::Tiger, stream_of(&["C1", "C2"]))
            .with(SourceKind::OpenAddresses, stream_of(&["A1"]))
            .with(SourceKind::Osm, stream_of(&["B1", "B2"]));
        let counters = sources.counters();

        let streets: Vec<String> = unified_stream(sources).map(|a| a.street).collect();
        assert_eq!(streets, vec!["A1", "B1", "B2", "C1", "C2"]);
        assert_eq!(counters.get(SourceKind::OpenAddresses), 1);
        assert_eq!(counters.get(SourceKind::Osm), 2);
        assert_eq!(counters.get(SourceKind::Tiger), 2);
    }

    #[test]
    fn test_absent_sources_are_omitted() {
        let sources = SourceSet::new().with(SourceKind::Tiger, stream_of(&["C1"]));
        assert_eq!(sources.kinds(), vec![SourceKind::Tiger]);
        let streets: Vec<String> = unified_stream(sources).map(|a| a.street).collect();
        assert_eq!(streets, vec!["C1"]);
    }

    #[test]
    fn test_empty_source_set() {
        let sources = SourceSet::new();
        assert!(sources.is_empty());
        assert_eq!(unified_stream(sources).count(), 0);
    }
}
