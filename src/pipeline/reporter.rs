use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Periodically logs how many addresses have been imported.
///
/// Owned by whoever started it; `stop` ends the timer and logs the final count.
/// Dropping the handle without calling `stop` also ends the timer.
pub struct ProgressReporter {
    counter: Arc<AtomicU64>,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Must be called from within a tokio runtime.
    pub fn start(counter: Arc<AtomicU64>, every: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let ticking = Arc::clone(&counter);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        info!("Number of addresses imported: {}", ticking.load(Ordering::Relaxed));
                    }
                }
            }
        });
        Self {
            counter,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Stop the timer and return the final count.
    pub async fn stop(mut self) -> u64 {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        let total = self.count();
        info!("Number of addresses imported: {} (final)", total);
        total
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_returns_final_count() {
        let counter = Arc::new(AtomicU64::new(0));
        let reporter = ProgressReporter::start(Arc::clone(&counter), Duration::from_millis(5));
        counter.fetch_add(42, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reporter.stop().await, 42);
    }
}
