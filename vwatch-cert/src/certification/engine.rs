//! Certification engine
//!
//! Single task that owns the session machine, the playlist cursor and the
//! countdown clock. Player reports, navigation and timer fires all arrive
//! as `EngineCommand`s on one channel and are applied in order, so no two
//! transitions ever interleave.
//!
//! The engine performs only non-blocking work per command. Certification
//! side effects go to the outbox and are never awaited.

use super::clock::SessionClock;
use super::policy::{sanitize_duration, CertificationPolicy};
use super::session::{CountdownStep, PlaybackOutcome, SessionIdentity, SessionMachine, SessionSnapshot};
use crate::catalog::VideoRef;
use crate::config::EngineSettings;
use crate::error::{Error, Result};
use crate::outbox::{CertifiedView, Outbox};
use crate::playlist::PlaylistController;
use crate::rewatch::RewatchGate;
use crate::state::{PlaylistSnapshot, SharedState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vwatch_common::events::{NavigationDirection, PlayerState, ResetReason, WatchEvent, WatchedFrom};
use vwatch_common::time::now_millis;

/// Inputs to the engine task
#[derive(Debug)]
pub enum EngineCommand {
    /// Player loaded a video; duration may still be unresolved
    Ready {
        video_id: Option<String>,
        duration_seconds: f64,
    },
    /// Periodic position report
    Tick { video_id: String, elapsed_seconds: f64 },
    /// Player state transition
    StateChange { state: PlayerState },
    /// Playback reached the end
    End { video_id: String },
    /// External next/previous request
    Navigate {
        direction: NavigationDirection,
        reply: oneshot::Sender<Result<VideoRef>>,
    },
    /// Player closed; destroys the session
    Close,
    /// Countdown clock fire
    CountdownTick(SessionIdentity),
    /// Read the session as seen after all earlier commands
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    /// Close the session and stop the task
    Shutdown { reply: oneshot::Sender<()> },
}

/// Per-process engine parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub user_id: String,
    pub watched_from: WatchedFrom,
    pub policy: CertificationPolicy,
    pub countdown_seconds: u32,
    /// Time between countdown decrements
    pub countdown_period: Duration,
}

impl EngineConfig {
    pub fn new(user_id: impl Into<String>, watched_from: WatchedFrom, settings: &EngineSettings) -> Self {
        Self {
            user_id: user_id.into(),
            watched_from,
            policy: settings.policy,
            countdown_seconds: settings.countdown_seconds,
            countdown_period: Duration::from_secs(1),
        }
    }

    pub fn with_countdown_period(mut self, period: Duration) -> Self {
        self.countdown_period = period;
        self
    }
}

/// Cloneable sender side of the engine
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::Internal("Certification engine is not running".to_string()))
    }

    pub fn ready(&self, video_id: Option<String>, duration_seconds: f64) -> Result<()> {
        self.send(EngineCommand::Ready {
            video_id,
            duration_seconds,
        })
    }

    pub fn tick(&self, video_id: impl Into<String>, elapsed_seconds: f64) -> Result<()> {
        self.send(EngineCommand::Tick {
            video_id: video_id.into(),
            elapsed_seconds,
        })
    }

    pub fn set_player_state(&self, state: PlayerState) -> Result<()> {
        self.send(EngineCommand::StateChange { state })
    }

    pub fn end(&self, video_id: impl Into<String>) -> Result<()> {
        self.send(EngineCommand::End {
            video_id: video_id.into(),
        })
    }

    pub fn close(&self) -> Result<()> {
        self.send(EngineCommand::Close)
    }

    /// Move to the next video; `Error::Locked` while certifying
    pub async fn next(&self) -> Result<VideoRef> {
        self.navigate(NavigationDirection::Next).await
    }

    /// Move to the previous video; `Error::Locked` while certifying
    pub async fn previous(&self) -> Result<VideoRef> {
        self.navigate(NavigationDirection::Previous).await
    }

    pub async fn navigate(&self, direction: NavigationDirection) -> Result<VideoRef> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Navigate { direction, reply })?;
        rx.await
            .map_err(|_| Error::Internal("Certification engine dropped navigation reply".to_string()))?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot { reply })?;
        rx.await
            .map_err(|_| Error::Internal("Certification engine dropped snapshot reply".to_string()))
    }

    /// Stop the engine; resolves once the task has closed the session
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Shutdown { reply })?;
        rx.await
            .map_err(|_| Error::Internal("Certification engine stopped before acknowledging shutdown".to_string()))
    }
}

pub struct CertificationEngine {
    config: EngineConfig,
    machine: SessionMachine,
    playlist: PlaylistController,
    gate: RewatchGate,
    outbox: Outbox,
    state: Arc<SharedState>,
    /// Live countdown; replaced or dropped on every session exit
    clock: Option<SessionClock>,
    /// Handed to clocks; weak so the task stops once every handle is gone
    self_tx: mpsc::WeakUnboundedSender<EngineCommand>,
}

impl CertificationEngine {
    /// Start the engine task with a session on the playlist's first video
    pub fn spawn(
        config: EngineConfig,
        playlist: PlaylistController,
        gate: RewatchGate,
        outbox: Outbox,
        state: Arc<SharedState>,
    ) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            machine: SessionMachine::new(config.policy, config.countdown_seconds),
            config,
            playlist,
            gate,
            outbox,
            state,
            clock: None,
            self_tx: tx.downgrade(),
        };

        let task = tokio::spawn(engine.run(rx));
        (EngineHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineCommand>) {
        info!(
            "Certification engine started for user {} ({} videos, context {})",
            self.config.user_id,
            self.playlist.len(),
            self.config.watched_from
        );
        self.publish_playlist().await;
        self.start_session().await;

        while let Some(command) = rx.recv().await {
            match command {
                EngineCommand::Shutdown { reply } => {
                    self.close_session().await;
                    let _ = reply.send(());
                    break;
                }
                command => self.handle_command(command).await,
            }
        }

        info!("Certification engine stopped");
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Ready {
                video_id,
                duration_seconds,
            } => self.on_ready(video_id, duration_seconds).await,

            EngineCommand::Tick {
                video_id,
                elapsed_seconds,
            } => {
                if self.machine.tick_meets_threshold(&video_id, elapsed_seconds) {
                    self.recheck_eligibility().await;
                }
                let outcome = self.machine.tick(&video_id, elapsed_seconds);
                self.apply_outcome(outcome, &video_id).await;
            }

            EngineCommand::StateChange { state } => {
                self.machine.set_player_state(state);
                if state == PlayerState::Ended {
                    if let Some(video_id) = self.machine.identity().map(|id| id.video_id.clone()) {
                        if self.machine.end_meets_threshold(&video_id) {
                            self.recheck_eligibility().await;
                        }
                        let outcome = self.machine.end(&video_id);
                        self.apply_outcome(outcome, &video_id).await;
                        return;
                    }
                }
                self.publish_session().await;
            }

            EngineCommand::End { video_id } => {
                if self.machine.end_meets_threshold(&video_id) {
                    self.recheck_eligibility().await;
                }
                let outcome = self.machine.end(&video_id);
                self.apply_outcome(outcome, &video_id).await;
            }

            EngineCommand::Navigate { direction, reply } => {
                let result = self.navigate(direction).await;
                let _ = reply.send(result);
            }

            EngineCommand::Close => self.close_session().await,

            EngineCommand::CountdownTick(identity) => self.on_countdown_tick(identity).await,

            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.machine.snapshot());
            }

            EngineCommand::Shutdown { .. } => {}
        }
    }

    async fn on_ready(&mut self, video_id: Option<String>, raw_duration: f64) {
        let live = self.machine.identity().map(|id| id.video_id.clone());

        match video_id {
            Some(requested) if live.as_deref() != Some(requested.as_str()) => {
                let Some(index) = self.playlist.position_of(&requested) else {
                    warn!("Player reported unknown video {}; ignoring", requested);
                    return;
                };
                if let Err(e) = self.playlist.select(index) {
                    warn!("Could not select {}: {}", requested, e);
                    return;
                }
                self.publish_playlist().await;
                self.replace_session(ResetReason::VideoChanged).await;
            }
            None if live.is_none() => self.start_session().await,
            _ => {}
        }

        let Some(video_id) = self.machine.identity().map(|id| id.video_id.clone()) else {
            return;
        };

        let reported = sanitize_duration(raw_duration);
        let known = self.machine.session().map(|s| s.duration_seconds()).unwrap_or(0);
        if reported == 0 && known > 0 {
            debug!(
                "Player duration for {} unusable ({}); keeping {}s",
                video_id, raw_duration, known
            );
        } else if reported != known {
            debug!("Duration of {} resolved to {}s", video_id, reported);
            self.machine.resolve_duration(&video_id, reported);
            self.playlist.update_duration(&video_id, reported);
            self.publish_playlist().await;
        }
        self.publish_session().await;
    }

    async fn apply_outcome(&mut self, outcome: PlaybackOutcome, video_id: &str) {
        match outcome {
            PlaybackOutcome::Continue => {}
            PlaybackOutcome::Certify(trigger) => {
                let elapsed_seconds = trigger.elapsed_seconds;
                let identity = trigger.identity;
                self.certify(&identity, trigger.duration_seconds, elapsed_seconds).await;
            }
            PlaybackOutcome::Ignored(reason) => {
                debug!("Dropped player report for {}: {:?}", video_id, reason);
            }
        }
        self.publish_session().await;
    }

    async fn certify(&mut self, identity: &SessionIdentity, duration_seconds: u32, elapsed_seconds: f64) {
        // The live session always belongs to the playlist's current video
        let view = CertifiedView {
            job_id: Uuid::new_v4(),
            user_id: self.config.user_id.clone(),
            video_id: identity.video_id.clone(),
            owner_id: self.playlist.current().owner_id.clone(),
            duration_seconds,
            watched_from: self.config.watched_from,
            certified_at_ms: now_millis(),
        };

        info!(
            "Certified view of {} at {:.1}s of {}s (job {})",
            view.video_id, elapsed_seconds, duration_seconds, view.job_id
        );

        self.state
            .add_pending(&view.video_id, view.job_id, view.certified_at_ms)
            .await;
        self.outbox.dispatch(view);

        self.state.broadcast_event(WatchEvent::CertificationTriggered {
            video_id: identity.video_id.clone(),
            generation: identity.generation,
            elapsed_seconds,
            timestamp: Utc::now(),
        });

        if self.machine.begin_countdown(identity) {
            self.state.broadcast_event(WatchEvent::CountdownTick {
                video_id: identity.video_id.clone(),
                generation: identity.generation,
                remaining: self.config.countdown_seconds,
                timestamp: Utc::now(),
            });
            self.start_clock(identity.clone());
        }
    }

    fn start_clock(&mut self, identity: SessionIdentity) {
        match self.self_tx.upgrade() {
            Some(tx) => {
                self.clock = Some(SessionClock::start(
                    identity,
                    self.config.countdown_seconds,
                    self.config.countdown_period,
                    tx,
                ));
            }
            None => warn!("Engine is shutting down; countdown for {} not started", identity.video_id),
        }
    }

    async fn on_countdown_tick(&mut self, identity: SessionIdentity) {
        match self.machine.countdown_tick(&identity) {
            CountdownStep::Stale => {
                debug!(
                    "Discarding stale countdown fire for {} gen {}",
                    identity.video_id,
                    identity.generation
                );
            }
            CountdownStep::Remaining(remaining) => {
                self.state.broadcast_event(WatchEvent::CountdownTick {
                    video_id: identity.video_id,
                    generation: identity.generation,
                    remaining,
                    timestamp: Utc::now(),
                });
                self.publish_session().await;
            }
            CountdownStep::Finished => {
                self.clock = None;
                self.state.broadcast_event(WatchEvent::CountdownTick {
                    video_id: identity.video_id.clone(),
                    generation: identity.generation,
                    remaining: 0,
                    timestamp: Utc::now(),
                });
                self.state.broadcast_event(WatchEvent::SessionCertified {
                    video_id: identity.video_id,
                    generation: identity.generation,
                    timestamp: Utc::now(),
                });
                self.move_cursor(NavigationDirection::Next, ResetReason::Advanced).await;
            }
        }
    }

    async fn navigate(&mut self, direction: NavigationDirection) -> Result<VideoRef> {
        if self.machine.is_locked() {
            let stage = self.machine.snapshot().stage;
            debug!("Rejected {} navigation during {:?}", direction_name(direction), stage);
            self.state.broadcast_event(WatchEvent::NavigationRejected {
                direction,
                stage,
                timestamp: Utc::now(),
            });
            return Err(Error::Locked(format!(
                "Cannot go to {} video while certification is in progress",
                direction_name(direction)
            )));
        }

        Ok(self.move_cursor(direction, ResetReason::Navigated).await)
    }

    async fn move_cursor(&mut self, direction: NavigationDirection, reason: ResetReason) -> VideoRef {
        let from_video_id = self.playlist.current().video_id.clone();
        let to = match direction {
            NavigationDirection::Next => self.playlist.advance().clone(),
            NavigationDirection::Previous => self.playlist.previous().clone(),
        };

        info!(
            "Playlist moved {} from {} to {} (index {})",
            direction_name(direction),
            from_video_id,
            to.video_id,
            self.playlist.current_index()
        );
        self.state.broadcast_event(WatchEvent::PlaylistAdvanced {
            from_video_id,
            to_video_id: to.video_id.clone(),
            current_index: self.playlist.current_index(),
            timestamp: Utc::now(),
        });
        self.publish_playlist().await;
        self.replace_session(reason).await;
        to
    }

    /// Reset out of the live session (if any) into one for the current video
    async fn replace_session(&mut self, reason: ResetReason) {
        self.clock = None;
        if let Some(old) = self.machine.identity().cloned() {
            self.state.broadcast_event(WatchEvent::SessionReset {
                video_id: Some(old.video_id),
                generation: old.generation,
                reason,
                timestamp: Utc::now(),
            });
        }
        self.start_session().await;
    }

    /// Whether a play of `video_id` may be credited right now
    async fn is_creditable(&self, video_id: &str) -> bool {
        // A certification still in the outbox is not yet visible to the gate
        if self.gate.cooldown_ms() > 0 && self.state.pending_count(video_id).await > 0 {
            return false;
        }
        match self.gate.can_rewatch(video_id).await {
            Ok(eligible) => eligible,
            Err(e) => {
                warn!("Rewatch check failed for {}: {}; treating as eligible", video_id, e);
                true
            }
        }
    }

    /// Re-ask the gate for a session blocked at start by the cooldown
    async fn recheck_eligibility(&mut self) {
        let Some(session) = self.machine.session() else {
            return;
        };
        if session.is_eligible() {
            return;
        }
        let identity = session.identity().clone();
        if self.is_creditable(&identity.video_id).await && self.machine.mark_eligible(&identity) {
            info!(
                "Rewatch cooldown for {} has expired; this play can now be credited",
                identity.video_id
            );
        }
    }

    async fn start_session(&mut self) {
        self.clock = None;
        let video = self.playlist.current().clone();

        let eligible = self.is_creditable(&video.video_id).await;
        if !eligible {
            info!("{} is within its rewatch cooldown; this play will not be credited", video.video_id);
        }

        let identity = self.machine.start(&video.video_id, video.duration_seconds, eligible);
        debug!("Session started for {} (gen {})", identity.video_id, identity.generation);

        self.state.broadcast_event(WatchEvent::SessionStarted {
            video_id: identity.video_id,
            generation: identity.generation,
            duration_seconds: video.duration_seconds,
            eligible,
            timestamp: Utc::now(),
        });
        self.publish_session().await;
    }

    async fn close_session(&mut self) {
        self.clock = None;
        if let Some(old) = self.machine.close() {
            debug!("Session for {} closed", old.video_id);
            self.state.broadcast_event(WatchEvent::SessionReset {
                video_id: Some(old.video_id),
                generation: old.generation,
                reason: ResetReason::Closed,
                timestamp: Utc::now(),
            });
        }
        self.publish_session().await;
    }

    async fn publish_session(&self) {
        self.state.set_session(self.machine.snapshot()).await;
    }

    async fn publish_playlist(&self) {
        self.state
            .set_playlist(PlaylistSnapshot {
                videos: self.playlist.videos().to_vec(),
                current_index: self.playlist.current_index(),
            })
            .await;
    }
}

fn direction_name(direction: NavigationDirection) -> &'static str {
    match direction {
        NavigationDirection::Next => "next",
        NavigationDirection::Previous => "previous",
    }
}
