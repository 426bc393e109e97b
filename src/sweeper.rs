//! Background task that cancels pending bookings whose payment deadline
//! has passed, then compacts the journal once enough churn has built up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::model::CancelActor;
use crate::observability;

/// Cancellation reason recorded on every swept booking.
pub const EXPIRED_REASON: &str = "Booking expired - payment not completed within time limit";

pub struct Sweeper {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Sweeper {
    /// Spawn the sweep loop. Every `interval` it cancels expired holds and,
    /// if the journal has accumulated `compact_threshold` events, compacts.
    pub fn spawn(engine: Arc<Engine>, interval: Duration, compact_threshold: u64) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = token.cancelled() => {
                        info!("sweeper stopping");
                        return;
                    }
                }
                sweep_once(&engine).await;
                maybe_compact(&engine, compact_threshold).await;
            }
        });
        Self { handle, cancel }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// One sweep pass. Returns how many bookings were cancelled. A booking that
/// a concurrent confirm beat to the write lock is skipped, not an error.
pub async fn sweep_once(engine: &Engine) -> usize {
    let started = std::time::Instant::now();
    let now = Utc::now();
    let mut swept = 0usize;

    for id in engine.collect_expired(now) {
        match engine
            .cancel_booking(
                id,
                CancelActor::System,
                Some(EXPIRED_REASON.to_string()),
                None,
                None,
            )
            .await
        {
            Ok(_) => {
                info!("swept expired booking {id}");
                swept += 1;
            }
            Err(e) if e.is_retryable() => {
                debug!("sweep skip {id}: {e}");
            }
            Err(e) => {
                warn!("sweep failed for {id}: {e}");
            }
        }
    }

    metrics::counter!(observability::HOLDS_SWEPT_TOTAL).increment(swept as u64);
    metrics::histogram!(observability::SWEEP_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    swept
}

async fn maybe_compact(engine: &Engine, threshold: u64) {
    if engine.journal_appends_since_compact().await < threshold {
        return;
    }
    match engine.compact_journal().await {
        Ok(()) => info!("journal compacted"),
        Err(e) => warn!("journal compaction failed: {e}"),
    }
}
