//! View certification
//!
//! Decides when a play counts as a view and drives the post-certification
//! countdown that advances the playlist.

pub mod clock;
pub mod engine;
pub mod policy;
pub mod session;

pub use clock::SessionClock;
pub use engine::{CertificationEngine, EngineCommand, EngineConfig, EngineHandle};
pub use policy::{sanitize_duration, CertificationPolicy, VideoClass};
pub use session::{
    CertificationTrigger, CountdownStep, IgnoreReason, PlaybackOutcome, SessionIdentity, SessionMachine,
    SessionSnapshot, WatchSession,
};
