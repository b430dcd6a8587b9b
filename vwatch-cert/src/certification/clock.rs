//! Countdown clock
//!
//! A `SessionClock` owns the timer task of one countdown. Dropping the
//! clock aborts the task, so a session that ends for any reason cannot
//! leave a timer behind. Every fire carries the session identity; the
//! machine discards fires whose identity is no longer live, which covers
//! fires already queued when the clock was dropped.

use super::engine::EngineCommand;
use super::session::SessionIdentity;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::trace;

pub struct SessionClock {
    handle: JoinHandle<()>,
}

impl SessionClock {
    /// Fire `CountdownTick(identity)` `ticks` times, one `period` apart
    ///
    /// The first fire happens one full period after the call.
    pub fn start(
        identity: SessionIdentity,
        ticks: u32,
        period: Duration,
        tx: mpsc::UnboundedSender<EngineCommand>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            for fired in 1..=ticks {
                interval.tick().await;
                trace!(
                    "Countdown fire {}/{} for {} gen {}",
                    fired,
                    ticks,
                    identity.video_id,
                    identity.generation
                );
                if tx.send(EngineCommand::CountdownTick(identity.clone())).is_err() {
                    break;
                }
            }
        });

        Self { handle }
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            video_id: "v".to_string(),
            generation: 7,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _clock = SessionClock::start(identity(), 5, Duration::from_secs(1), tx);

        let started = Instant::now();
        for _ in 0..5 {
            match rx.recv().await {
                Some(EngineCommand::CountdownTick(id)) => assert_eq!(id, identity()),
                _ => panic!("Expected a countdown tick"),
            }
        }
        assert_eq!(started.elapsed(), Duration::from_secs(5));

        // Task exits after the last fire and drops its sender
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = SessionClock::start(identity(), 5, Duration::from_secs(1), tx);

        assert!(matches!(rx.recv().await, Some(EngineCommand::CountdownTick(_))));
        drop(clock);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
    }
}
