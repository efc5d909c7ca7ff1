//! Deduplication stage.
//!
//! Addresses are buffered into batches of `batch_size`; each sealed batch becomes
//! its own task that asks the oracle for a verdict per address and forwards the
//! unique ones, tagged with their guid. A semaphore of `max_in_flight` permits
//! gates intake: each batch takes its permit before its first address is read, so
//! once `max_in_flight` requests are outstanding the stage stops polling its input,
//! which in turn stalls whoever feeds that input.
//!
//! Batches resolve in whatever order the oracle answers, so output order across
//! batches is not the input order.

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::oracle::{DedupeDecision, DedupeOracle, OracleError};
use crate::config::DedupeSettings;
use crate::constants;
use crate::domain::Address;
use crate::metrics::DedupeMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupeConfig {
    /// Addresses buffered before a batch is sealed and dispatched
    pub batch_size: usize,
    /// Oracle requests allowed to be outstanding at once
    pub max_in_flight: usize,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_in_flight: constants::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl From<&DedupeSettings> for DedupeConfig {
    fn from(settings: &DedupeSettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            max_in_flight: settings.max_in_flight.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Idle,
    Accumulating,
    /// A sealed batch is waiting for (or has just taken) an in-flight slot
    Dispatching,
    /// Input ended and every dispatched batch resolved
    Drained,
}

/// Tallies for one run of the stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupeReport {
    pub received: usize,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    pub unique: usize,
    pub duplicates: usize,
    /// Addresses lost with a failed batch
    pub dropped: usize,
    pub peak_in_flight: usize,
    pub final_state: StageState,
}

impl Default for DedupeReport {
    fn default() -> Self {
        Self {
            received: 0,
            batches_dispatched: 0,
            batches_failed: 0,
            unique: 0,
            duplicates: 0,
            dropped: 0,
            peak_in_flight: 0,
            final_state: StageState::Idle,
        }
    }
}

impl DedupeReport {
    fn absorb(&mut self, outcome: BatchOutcome) {
        self.unique += outcome.unique;
        self.duplicates += outcome.duplicates;
        if outcome.failed {
            self.batches_failed += 1;
            self.dropped += outcome.dropped;
        }
    }
}

#[derive(Debug, Default)]
struct BatchOutcome {
    unique: usize,
    duplicates: usize,
    dropped: usize,
    failed: bool,
}

impl BatchOutcome {
    fn failed(dropped: usize) -> Self {
        Self { dropped, failed: true, ..Default::default() }
    }
}

pub struct DedupeStage {
    oracle: Arc<dyn DedupeOracle>,
    config: DedupeConfig,
}

impl DedupeStage {
    pub fn new(oracle: Arc<dyn DedupeOracle>, config: DedupeConfig) -> Self {
        let config = DedupeConfig {
            batch_size: config.batch_size.max(1),
            max_in_flight: config.max_in_flight.max(1),
        };
        Self { oracle, config }
    }

    pub fn config(&self) -> DedupeConfig {
        self.config
    }

    /// Consume `input` until it ends, forwarding unique addresses to `output`.
    ///
    /// Returns once end-of-input has been seen and every dispatched batch has
    /// resolved. If `output` is dropped early, forwarding becomes a no-op but the
    /// stage still drains.
    pub async fn run<S>(&self, mut input: S, output: mpsc::Sender<Address>) -> DedupeReport
    where
        S: Stream<Item = Address> + Unpin,
    {
        let batch_size = self.config.batch_size;
        let mut in_flight = InFlight::new(self.config.max_in_flight);
        let mut report = DedupeReport::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut state = StageState::Idle;
        let mut slot = None;

        loop {
            // The batch about to be accumulated claims its slot first, so input is
            // not polled at all while max_in_flight requests are outstanding
            if slot.is_none() {
                slot = Some(in_flight.reserve().await);
            }
            let address = match input.next().await {
                Some(address) => address,
                None => break,
            };
            report.received += 1;
            batch.push(address);
            transition(&mut state, StageState::Accumulating);

            if batch.len() >= batch_size {
                transition(&mut state, StageState::Dispatching);
                let sealed = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if let Some(permit) = slot.take() {
                    self.dispatch(sealed, permit, &mut in_flight, &output, &mut report);
                }
            }

            for outcome in in_flight.reap() {
                report.absorb(outcome);
            }
        }

        // End of input seals whatever is left, however short
        if !batch.is_empty() {
            transition(&mut state, StageState::Dispatching);
            if let Some(permit) = slot.take() {
                self.dispatch(batch, permit, &mut in_flight, &output, &mut report);
            }
        }
        // An unused reservation goes back before draining
        drop(slot);

        for outcome in in_flight.drain().await {
            report.absorb(outcome);
        }
        transition(&mut state, StageState::Drained);

        report.peak_in_flight = in_flight.peak;
        report.final_state = state;
        info!(
            received = report.received,
            batches = report.batches_dispatched,
            failed_batches = report.batches_failed,
            unique = report.unique,
            duplicates = report.duplicates,
            dropped = report.dropped,
            "Deduplication drained"
        );
        report
    }

    fn dispatch(
        &self,
        batch: Vec<Address>,
        slot: Slot,
        in_flight: &mut InFlight,
        output: &mpsc::Sender<Address>,
        report: &mut DedupeReport,
    ) {
        let batch_id = report.batches_dispatched;
        let size = batch.len();

        let permit = match slot {
            Ok(permit) => permit,
            Err(e) => {
                error!(batch_id, error = %e, "In-flight gate closed; dropping batch");
                report.batches_failed += 1;
                report.dropped += size;
                return;
            }
        };
        let current = in_flight.count.fetch_add(1, Ordering::SeqCst) + 1;
        in_flight.peak = in_flight.peak.max(current);
        report.batches_dispatched += 1;
        DedupeMetrics::record_dispatch(size, current);
        debug!(batch_id, size, in_flight = current, "Dispatching batch");

        let oracle = Arc::clone(&self.oracle);
        let output = output.clone();
        let count = Arc::clone(&in_flight.count);
        in_flight.tasks.spawn(async move {
            let outcome = resolve_batch(oracle.as_ref(), batch_id, batch, &output).await;
            release(permit, &count);
            outcome
        });
    }
}

type Slot = Result<OwnedSemaphorePermit, AcquireError>;

/// Outstanding batch tasks and the gate limiting them
struct InFlight {
    permits: Arc<Semaphore>,
    count: Arc<AtomicUsize>,
    tasks: JoinSet<BatchOutcome>,
    peak: usize,
}

impl InFlight {
    fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            count: Arc::new(AtomicUsize::new(0)),
            tasks: JoinSet::new(),
            peak: 0,
        }
    }

    /// Wait for a free in-flight slot
    async fn reserve(&self) -> Slot {
        Arc::clone(&self.permits).acquire_owned().await
    }

    /// Outcomes of batches that already finished, without waiting
    fn reap(&mut self) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::new();
        while let Some(joined) = self.tasks.try_join_next() {
            outcomes.extend(joined_outcome(joined));
        }
        outcomes
    }

    async fn drain(&mut self) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            outcomes.extend(joined_outcome(joined));
        }
        outcomes
    }
}

fn joined_outcome(joined: Result<BatchOutcome, tokio::task::JoinError>) -> Option<BatchOutcome> {
    match joined {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(error = %e, "Batch task aborted");
            None
        }
    }
}

fn release(permit: OwnedSemaphorePermit, count: &AtomicUsize) {
    // Count drops before the permit frees a slot, so it never exceeds the limit
    let remaining = count.fetch_sub(1, Ordering::SeqCst) - 1;
    DedupeMetrics::record_in_flight(remaining);
    drop(permit);
}

fn transition(state: &mut StageState, next: StageState) {
    let from = *state;
    if from != next {
        trace!(?from, to = ?next, "Dedupe stage transition");
        *state = next;
    }
}

/// Guid per address, `None` for duplicates. Rejects answers that cannot be
/// matched to the batch position by position.
fn verdicts(decisions: Vec<DedupeDecision>, expected: usize) -> Result<Vec<Option<String>>, String> {
    if decisions.len() != expected {
        return Err(format!(
            "expected {} decisions, oracle returned {}",
            expected,
            decisions.len()
        ));
    }
    decisions
        .into_iter()
        .enumerate()
        .map(|(position, decision)| match decision {
            DedupeDecision { dupe: true, .. } => Ok(None),
            DedupeDecision { dupe: false, guid: Some(guid) } if !guid.trim().is_empty() => Ok(Some(guid)),
            DedupeDecision { dupe: false, .. } => {
                Err(format!("unique address at position {} has no guid", position))
            }
        })
        .collect()
}

async fn resolve_batch(
    oracle: &dyn DedupeOracle,
    batch_id: usize,
    batch: Vec<Address>,
    output: &mpsc::Sender<Address>,
) -> BatchOutcome {
    let size = batch.len();
    let started = Instant::now();

    let decisions = match oracle.dedupe(&batch).await {
        Ok(decisions) => decisions,
        Err(OracleError::Malformed(reason)) => {
            error!(batch_id, size, %reason, "Data integrity error in oracle response; dropping batch");
            DedupeMetrics::record_failed("malformed", size);
            return BatchOutcome::failed(size);
        }
        Err(e) => {
            warn!(batch_id, size, kind = e.kind(), error = %e, "Dedupe request failed; dropping batch");
            DedupeMetrics::record_failed(e.kind(), size);
            return BatchOutcome::failed(size);
        }
    };

    let guids = match verdicts(decisions, size) {
        Ok(guids) => guids,
        Err(reason) => {
            error!(batch_id, size, %reason, "Data integrity error in oracle response; dropping batch");
            DedupeMetrics::record_failed("malformed", size);
            return BatchOutcome::failed(size);
        }
    };

    let mut outcome = BatchOutcome::default();
    let mut receiver_gone = false;
    for (address, guid) in batch.into_iter().zip(guids) {
        let guid = match guid {
            Some(guid) => guid,
            None => {
                outcome.duplicates += 1;
                continue;
            }
        };
        outcome.unique += 1;
        if !receiver_gone && output.send(address.with_guid(guid)).await.is_err() {
            debug!(batch_id, "Output closed; discarding remaining unique addresses");
            receiver_gone = true;
        }
    }

    DedupeMetrics::record_resolved(outcome.unique, outcome.duplicates, started.elapsed().as_secs_f64());
    debug!(
        batch_id,
        unique = outcome.unique,
        duplicates = outcome.duplicates,
        "Batch resolved"
    );
    outcome
}
