//! Background reconciler. Periodically drains the retry log; entries
//! exceeding `sync_max_retries` transition to `failed` and are surfaced
//! to the normaliser.

use std::sync::Arc;
use std::time::Duration;

use memory_core::errors::CortexResult;
use memory_core::memory::SyncStatus;
use tracing::{info, warn};

use crate::coordinator::SyncCoordinator;

const DRAIN_BATCH_SIZE: usize = 100;

fn backoff_delay_secs(base_secs: u64, attempt: u32) -> u64 {
    const MAX_BACKOFF_SECS: u64 = 3600;
    base_secs.saturating_mul(1u64 << attempt.min(10)).min(MAX_BACKOFF_SECS)
}

/// Outcome of a single drain pass, for logging/metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub replayed: usize,
    pub rescheduled: usize,
    pub permanently_failed: usize,
}

/// Drain every currently-due retry-log entry once. Replays that succeed
/// mark the memory `synced`; replays that fail are rescheduled with
/// exponential backoff until `max_retries`, at which point the entry is
/// removed and the memory marked `failed`.
pub async fn reconcile_once(coordinator: &SyncCoordinator) -> CortexResult<ReconcileReport> {
    let now = chrono::Utc::now().timestamp();
    let due = coordinator.retry_log().due_entries(now, DRAIN_BATCH_SIZE)?;
    let mut report = ReconcileReport::default();

    for entry in due {
        match coordinator.replay(&entry.memory_id, &entry.payload).await {
            Ok(()) => {
                coordinator.retry_log().remove(&entry.memory_id)?;
                coordinator
                    .finalize_sync_status(entry.payload.variant(), &entry.memory_id, SyncStatus::Synced)
                    .await;
                report.replayed += 1;
            }
            Err(e) => {
                let next_attempts = entry.attempts + 1;
                if next_attempts >= coordinator.max_retries() {
                    warn!(
                        memory_id = %entry.memory_id,
                        attempts = next_attempts,
                        error = %e,
                        "retry log entry exceeded max_retries, marking failed"
                    );
                    coordinator.retry_log().remove(&entry.memory_id)?;
                    coordinator
                        .finalize_sync_status(entry.payload.variant(), &entry.memory_id, SyncStatus::Failed)
                        .await;
                    report.permanently_failed += 1;
                } else {
                    let delay = backoff_delay_secs(coordinator.base_retry_delay_secs(), next_attempts);
                    coordinator.retry_log().mark_attempt_failed(
                        &entry.memory_id,
                        &e.to_string(),
                        now + delay as i64,
                    )?;
                    report.rescheduled += 1;
                }
            }
        }
    }

    if report.replayed > 0 || report.permanently_failed > 0 {
        info!(
            replayed = report.replayed,
            rescheduled = report.rescheduled,
            permanently_failed = report.permanently_failed,
            "reconcile pass complete"
        );
    }
    Ok(report)
}

/// Spawn the reconciler as a periodic background task. The returned handle
/// can be aborted on shutdown; the task otherwise runs until then.
pub fn spawn_background(
    coordinator: Arc<SyncCoordinator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = reconcile_once(&coordinator).await {
                warn!(error = %e, "reconcile pass failed");
            }
        }
    })
}
