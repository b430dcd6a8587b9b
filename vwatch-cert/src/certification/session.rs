//! Watch session state machine
//!
//! Pure, synchronous transitions for one player's session. The async engine
//! owns a `SessionMachine` and performs the I/O each transition asks for;
//! nothing here touches the clock, the database or the event bus, so every
//! transition is deterministic and testable.
//!
//! Stage flow within one session:
//!
//! ```text
//! Watching --certify--> Certifying --begin_countdown--> Countdown --0--> Certified
//! ```
//!
//! A session is never moved backwards. Starting a new session (new video,
//! navigation, advance) bumps the generation, which invalidates any timer
//! or event tagged with the old identity.

use super::policy::CertificationPolicy;
use serde::{Deserialize, Serialize};
use vwatch_common::events::{PlayerState, WatchStage};

/// Identity a timer or event is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub video_id: String,
    pub generation: u64,
}

/// Live session for one video
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSession {
    identity: SessionIdentity,
    duration_seconds: u32,
    elapsed_seconds: f64,
    stage: WatchStage,
    countdown_remaining: u32,
    /// False when the rewatch cooldown blocks crediting this play
    eligible: bool,
    player_state: PlayerState,
}

impl WatchSession {
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn video_id(&self) -> &str {
        &self.identity.video_id
    }

    pub fn stage(&self) -> WatchStage {
        self.stage
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }
}

/// Presentation view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub video_id: Option<String>,
    pub generation: u64,
    pub stage: WatchStage,
    pub elapsed_seconds: f64,
    pub duration_seconds: u32,
    pub countdown_remaining: u32,
    pub is_locked: bool,
    pub eligible: bool,
    pub player_state: PlayerState,
}

impl SessionSnapshot {
    /// Snapshot with no active session
    pub fn idle(countdown_seconds: u32) -> Self {
        Self {
            video_id: None,
            generation: 0,
            stage: WatchStage::Watching,
            elapsed_seconds: 0.0,
            duration_seconds: 0,
            countdown_remaining: countdown_seconds,
            is_locked: false,
            eligible: true,
            player_state: PlayerState::Unstarted,
        }
    }
}

/// Data the engine needs to dispatch side effects
#[derive(Debug, Clone, PartialEq)]
pub struct CertificationTrigger {
    pub identity: SessionIdentity,
    pub duration_seconds: u32,
    pub elapsed_seconds: f64,
}

/// Why an input was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No session is active
    NoSession,
    /// Input names a video other than the live one
    StaleVideo,
    /// Elapsed time was negative, NaN or infinite
    Malformed,
}

/// Result of feeding a tick or end into the machine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// Input applied, nothing to do
    Continue,
    /// First certifiable input: stage is now `Certifying`
    Certify(CertificationTrigger),
    /// Input dropped
    Ignored(IgnoreReason),
}

/// Result of one countdown timer fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Timer belongs to a session that is no longer live
    Stale,
    /// Seconds left after this decrement
    Remaining(u32),
    /// Countdown hit zero: stage is now `Certified`
    Finished,
}

pub struct SessionMachine {
    policy: CertificationPolicy,
    countdown_seconds: u32,
    last_generation: u64,
    session: Option<WatchSession>,
}

impl SessionMachine {
    pub fn new(policy: CertificationPolicy, countdown_seconds: u32) -> Self {
        Self {
            policy,
            countdown_seconds: countdown_seconds.max(1),
            last_generation: 0,
            session: None,
        }
    }

    pub fn policy(&self) -> &CertificationPolicy {
        &self.policy
    }

    pub fn session(&self) -> Option<&WatchSession> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    /// Start a fresh session, replacing any live one
    ///
    /// This is the only way back to `Watching`.
    pub fn start(&mut self, video_id: impl Into<String>, duration_seconds: u32, eligible: bool) -> SessionIdentity {
        self.last_generation += 1;
        let identity = SessionIdentity {
            video_id: video_id.into(),
            generation: self.last_generation,
        };
        self.session = Some(WatchSession {
            identity: identity.clone(),
            duration_seconds,
            elapsed_seconds: 0.0,
            stage: WatchStage::Watching,
            countdown_remaining: self.countdown_seconds,
            eligible,
            player_state: PlayerState::Unstarted,
        });
        identity
    }

    /// Destroy the live session
    pub fn close(&mut self) -> Option<SessionIdentity> {
        self.session.take().map(|s| s.identity)
    }

    /// Record a duration that resolved after play started
    ///
    /// Returns false when `video_id` is not the live session.
    pub fn resolve_duration(&mut self, video_id: &str, duration_seconds: u32) -> bool {
        match self.session.as_mut() {
            Some(session) if session.identity.video_id == video_id => {
                session.duration_seconds = duration_seconds;
                true
            }
            _ => false,
        }
    }

    /// Lift a cooldown block on a session still in `Watching`
    ///
    /// Returns false for a stale identity or a session past `Watching`.
    pub fn mark_eligible(&mut self, identity: &SessionIdentity) -> bool {
        match self.session.as_mut() {
            Some(session) if session.identity == *identity && session.stage == WatchStage::Watching => {
                session.eligible = true;
                true
            }
            _ => false,
        }
    }

    /// Whether a tick would certify the live session if it were eligible
    pub fn tick_meets_threshold(&self, video_id: &str, elapsed_seconds: f64) -> bool {
        elapsed_seconds.is_finite()
            && elapsed_seconds >= 0.0
            && self
                .watching(video_id)
                .is_some_and(|s| self.policy.certifies_on_tick(s.duration_seconds, elapsed_seconds))
    }

    /// Whether an end report would certify the live session if it were eligible
    pub fn end_meets_threshold(&self, video_id: &str) -> bool {
        self.watching(video_id)
            .is_some_and(|s| self.policy.certifies_on_end(s.duration_seconds))
    }

    pub fn set_player_state(&mut self, state: PlayerState) {
        if let Some(session) = self.session.as_mut() {
            session.player_state = state;
        }
    }

    /// Apply a playback position report
    pub fn tick(&mut self, video_id: &str, elapsed_seconds: f64) -> PlaybackOutcome {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return PlaybackOutcome::Ignored(IgnoreReason::Malformed);
        }
        let policy = self.policy;
        let session = match self.live_session_mut(video_id) {
            Ok(session) => session,
            Err(reason) => return PlaybackOutcome::Ignored(reason),
        };

        session.elapsed_seconds = elapsed_seconds;

        if session.stage == WatchStage::Watching
            && session.eligible
            && policy.certifies_on_tick(session.duration_seconds, elapsed_seconds)
        {
            return PlaybackOutcome::Certify(Self::enter_certifying(session));
        }
        PlaybackOutcome::Continue
    }

    /// Apply an end-of-playback report
    pub fn end(&mut self, video_id: &str) -> PlaybackOutcome {
        let policy = self.policy;
        let session = match self.live_session_mut(video_id) {
            Ok(session) => session,
            Err(reason) => return PlaybackOutcome::Ignored(reason),
        };

        session.player_state = PlayerState::Ended;

        if session.stage == WatchStage::Watching
            && session.eligible
            && policy.certifies_on_end(session.duration_seconds)
        {
            return PlaybackOutcome::Certify(Self::enter_certifying(session));
        }
        PlaybackOutcome::Continue
    }

    /// `Certifying` → `Countdown`; false for a stale identity or wrong stage
    pub fn begin_countdown(&mut self, identity: &SessionIdentity) -> bool {
        match self.session.as_mut() {
            Some(session) if session.identity == *identity && session.stage == WatchStage::Certifying => {
                session.stage = WatchStage::Countdown;
                session.countdown_remaining = self.countdown_seconds;
                true
            }
            _ => false,
        }
    }

    /// Apply one timer fire
    pub fn countdown_tick(&mut self, identity: &SessionIdentity) -> CountdownStep {
        let session = match self.session.as_mut() {
            Some(session) if session.identity == *identity && session.stage == WatchStage::Countdown => session,
            _ => return CountdownStep::Stale,
        };

        session.countdown_remaining = session.countdown_remaining.saturating_sub(1);
        if session.countdown_remaining == 0 {
            session.stage = WatchStage::Certified;
            CountdownStep::Finished
        } else {
            CountdownStep::Remaining(session.countdown_remaining)
        }
    }

    pub fn is_locked(&self) -> bool {
        self.session.as_ref().map(|s| s.stage.is_locked()).unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(session) => SessionSnapshot {
                video_id: Some(session.identity.video_id.clone()),
                generation: session.identity.generation,
                stage: session.stage,
                elapsed_seconds: session.elapsed_seconds,
                duration_seconds: session.duration_seconds,
                countdown_remaining: session.countdown_remaining,
                is_locked: session.stage.is_locked(),
                eligible: session.eligible,
                player_state: session.player_state,
            },
            None => SessionSnapshot {
                generation: self.last_generation,
                ..SessionSnapshot::idle(self.countdown_seconds)
            },
        }
    }

    fn watching(&self, video_id: &str) -> Option<&WatchSession> {
        self.session
            .as_ref()
            .filter(|s| s.identity.video_id == video_id && s.stage == WatchStage::Watching)
    }

    fn live_session_mut(&mut self, video_id: &str) -> Result<&mut WatchSession, IgnoreReason> {
        match self.session.as_mut() {
            None => Err(IgnoreReason::NoSession),
            Some(session) if session.identity.video_id != video_id => Err(IgnoreReason::StaleVideo),
            Some(session) => Ok(session),
        }
    }

    fn enter_certifying(session: &mut WatchSession) -> CertificationTrigger {
        session.stage = WatchStage::Certifying;
        CertificationTrigger {
            identity: session.identity.clone(),
            duration_seconds: session.duration_seconds,
            elapsed_seconds: session.elapsed_seconds,
        }
    }
}
