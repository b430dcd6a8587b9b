//! Certification side-effect outbox
//!
//! A certified view fans out to three independent writers: the watch
//! record, the view aggregate and the owner's token ledger. Each writer
//! drains its own unbounded channel on its own task, so dispatch never
//! blocks the engine and one failing writer never stalls another or the
//! countdown.
//!
//! Failures are logged and broadcast as `SideEffectFailed`; they are not
//! retried.

use crate::aggregator::ViewAggregator;
use crate::ledger::{DebitOutcome, DebitRejection, TokenLedger};
use crate::state::SharedState;
use crate::watch_records::WatchRecordStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vwatch_common::events::{SideEffectKind, WatchEvent, WatchedFrom};

/// One certified view, as handed to every writer
#[derive(Debug, Clone, PartialEq)]
pub struct CertifiedView {
    /// Shared by the three jobs of one certification
    pub job_id: Uuid,
    pub user_id: String,
    pub video_id: String,
    pub owner_id: String,
    pub duration_seconds: u32,
    pub watched_from: WatchedFrom,
    pub certified_at_ms: i64,
}

/// Dispatch side of the outbox
#[derive(Clone)]
pub struct Outbox {
    record_tx: mpsc::UnboundedSender<CertifiedView>,
    view_tx: mpsc::UnboundedSender<CertifiedView>,
    ledger_tx: mpsc::UnboundedSender<CertifiedView>,
}

impl Outbox {
    /// Queue all three jobs; never blocks
    pub fn dispatch(&self, view: CertifiedView) {
        debug!("Dispatching side effects for {} (job {})", view.video_id, view.job_id);

        for (kind, tx) in [
            (SideEffectKind::WatchRecord, &self.record_tx),
            (SideEffectKind::ViewCount, &self.view_tx),
            (SideEffectKind::TokenDebit, &self.ledger_tx),
        ] {
            if tx.send(view.clone()).is_err() {
                warn!("{} writer is gone; dropping job {} for {}", kind, view.job_id, view.video_id);
            }
        }
    }
}

/// Join handles of the writer tasks
pub struct OutboxWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl OutboxWorkers {
    /// Wait for every writer to drain its queue
    ///
    /// Writers exit once all `Outbox` clones are dropped.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Outbox writer task ended abnormally: {}", e);
            }
        }
    }
}

/// Spawn the three writers and return the dispatch handle
pub fn spawn_workers(
    store: WatchRecordStore,
    aggregator: ViewAggregator,
    ledger: TokenLedger,
    state: Arc<SharedState>,
) -> (Outbox, OutboxWorkers) {
    let (record_tx, record_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = mpsc::unbounded_channel();
    let (ledger_tx, ledger_rx) = mpsc::unbounded_channel();

    let handles = vec![
        tokio::spawn(record_writer(record_rx, store, Arc::clone(&state))),
        tokio::spawn(view_writer(view_rx, aggregator, Arc::clone(&state))),
        tokio::spawn(ledger_writer(ledger_rx, ledger, state)),
    ];
    info!("Outbox writers started");

    (
        Outbox {
            record_tx,
            view_tx,
            ledger_tx,
        },
        OutboxWorkers { handles },
    )
}

fn report_failure(state: &SharedState, kind: SideEffectKind, view: &CertifiedView, error: String) {
    warn!(
        "{} side effect failed for {} (job {}): {}",
        kind, view.video_id, view.job_id, error
    );
    state.broadcast_event(WatchEvent::SideEffectFailed {
        job_id: view.job_id,
        effect: kind,
        video_id: view.video_id.clone(),
        error,
        timestamp: Utc::now(),
    });
}

async fn record_writer(
    mut rx: mpsc::UnboundedReceiver<CertifiedView>,
    store: WatchRecordStore,
    state: Arc<SharedState>,
) {
    while let Some(view) = rx.recv().await {
        match store
            .record_certified(&view.user_id, &view.video_id, view.watched_from, view.certified_at_ms)
            .await
        {
            Ok(record) => debug!(
                "Watch record for {} now at count {}",
                view.video_id, record.watch_count
            ),
            Err(e) => report_failure(&state, SideEffectKind::WatchRecord, &view, e.to_string()),
        }
        state.resolve_pending(&view.video_id, view.job_id).await;
    }
    debug!("Watch record writer stopped");
}

async fn view_writer(
    mut rx: mpsc::UnboundedReceiver<CertifiedView>,
    aggregator: ViewAggregator,
    state: Arc<SharedState>,
) {
    while let Some(view) = rx.recv().await {
        match aggregator.increment(&view.video_id, &view.user_id).await {
            Ok(report) if report.replicas_failed.is_empty() => debug!(
                "View counted for {} ({} replicas)",
                view.video_id, report.replicas_updated
            ),
            Ok(report) => warn!(
                "View counted for {} but {} replica(s) missed it",
                view.video_id,
                report.replicas_failed.len()
            ),
            Err(e) => report_failure(&state, SideEffectKind::ViewCount, &view, e.to_string()),
        }
    }
    debug!("View count writer stopped");
}

async fn ledger_writer(mut rx: mpsc::UnboundedReceiver<CertifiedView>, ledger: TokenLedger, state: Arc<SharedState>) {
    while let Some(view) = rx.recv().await {
        match ledger.debit(&view.video_id, &view.owner_id, view.duration_seconds).await {
            Ok(DebitOutcome::Debited {
                tokens_deducted,
                remaining_balance,
            }) => {
                state.broadcast_event(WatchEvent::TokensDebited {
                    owner_id: view.owner_id.clone(),
                    video_id: view.video_id.clone(),
                    tokens_deducted,
                    remaining_balance,
                    timestamp: Utc::now(),
                });
            }
            Ok(DebitOutcome::Rejected {
                reason: DebitRejection::InsufficientBalance,
            }) => report_failure(
                &state,
                SideEffectKind::TokenDebit,
                &view,
                format!("insufficient balance for owner {}", view.owner_id),
            ),
            Err(e) => report_failure(&state, SideEffectKind::TokenDebit, &view, e.to_string()),
        }
    }
    debug!("Token ledger writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LinearCost;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    async fn pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        vwatch_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    fn view(video_id: &str, owner_id: &str, duration_seconds: u32) -> CertifiedView {
        CertifiedView {
            job_id: Uuid::new_v4(),
            user_id: "user".to_string(),
            video_id: video_id.to_string(),
            owner_id: owner_id.to_string(),
            duration_seconds,
            watched_from: WatchedFrom::Main,
            certified_at_ms: 1_700_000_000_000,
        }
    }

    fn spawn(pool: &Pool<Sqlite>, state: &Arc<SharedState>) -> (Outbox, OutboxWorkers) {
        spawn_workers(
            WatchRecordStore::new(pool.clone()),
            ViewAggregator::new(pool.clone(), 10),
            TokenLedger::new(pool.clone(), Arc::new(LinearCost::new(600.0))),
            Arc::clone(state),
        )
    }

    #[tokio::test]
    async fn test_all_writers_apply_view() {
        let pool = pool().await;
        crate::db::token_balances::set_balance(&pool, "owner", 10.0).await.unwrap();
        let state = Arc::new(SharedState::new(16, 5));
        let mut rx = state.subscribe_events();

        let (outbox, workers) = spawn(&pool, &state);
        outbox.dispatch(view("v", "owner", 300));
        drop(outbox);
        workers.join().await;

        let record = crate::db::watch_records::get(&pool, "user", "v").await.unwrap().unwrap();
        assert_eq!(record.watch_count, 1);
        let stats = crate::db::video_stats::fetch_batch(&pool, &["v".to_string()]).await.unwrap();
        assert_eq!(stats[0].total_views, 1);
        let balance = crate::db::token_balances::get_balance(&pool, "owner").await.unwrap();
        assert_eq!(balance, Some(9.5));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "TokensDebited");
    }

    #[tokio::test]
    async fn test_rejected_debit_does_not_block_other_writers() {
        let pool = pool().await;
        let state = Arc::new(SharedState::new(16, 5));
        let mut rx = state.subscribe_events();

        let (outbox, workers) = spawn(&pool, &state);
        let job = view("v", "broke-owner", 600);
        let job_id = job.job_id;
        outbox.dispatch(job);
        drop(outbox);
        workers.join().await;

        // Record and aggregate still written
        assert!(crate::db::watch_records::get(&pool, "user", "v").await.unwrap().is_some());
        let stats = crate::db::video_stats::fetch_batch(&pool, &["v".to_string()]).await.unwrap();
        assert_eq!(stats[0].total_views, 1);

        match rx.recv().await.unwrap() {
            WatchEvent::SideEffectFailed { job_id: failed, effect, .. } => {
                assert_eq!(failed, job_id);
                assert_eq!(effect, SideEffectKind::TokenDebit);
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_writer_clears_overlay() {
        let pool = pool().await;
        let state = Arc::new(SharedState::new(16, 5));
        let job = view("v", "owner", 30);
        state.add_pending("v", job.job_id, job.certified_at_ms).await;

        let (outbox, workers) = spawn(&pool, &state);
        outbox.dispatch(job);
        drop(outbox);
        workers.join().await;

        assert_eq!(state.pending_count("v").await, 0);
    }
}
