//! Certification thresholds
//!
//! Long-form videos certify on a tick once elapsed time reaches the lower
//! of the ratio threshold and the absolute cap. Short-form videos (and
//! videos whose duration is still unresolved) certify only on `end()`.

use serde::{Deserialize, Serialize};

/// Duration class of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoClass {
    LongForm,
    ShortForm,
}

/// Thresholds deciding when a play counts as a view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertificationPolicy {
    /// Durations at or above this many seconds are long-form
    pub long_form_threshold_seconds: u32,
    /// Fraction of a long-form video that certifies it
    pub long_form_ratio: f64,
    /// Elapsed seconds that certify any long-form video
    pub long_form_absolute_seconds: u32,
}

impl Default for CertificationPolicy {
    fn default() -> Self {
        Self {
            long_form_threshold_seconds: 181,
            long_form_ratio: 0.9,
            long_form_absolute_seconds: 180,
        }
    }
}

impl CertificationPolicy {
    /// Classify by duration; unresolved (`0`) is short-form
    pub fn classify(&self, duration_seconds: u32) -> VideoClass {
        if duration_seconds >= self.long_form_threshold_seconds {
            VideoClass::LongForm
        } else {
            VideoClass::ShortForm
        }
    }

    /// Elapsed seconds at which a tick certifies, `None` for short-form
    pub fn tick_threshold(&self, duration_seconds: u32) -> Option<f64> {
        match self.classify(duration_seconds) {
            VideoClass::LongForm => {
                let ratio_threshold = duration_seconds as f64 * self.long_form_ratio;
                Some(ratio_threshold.min(self.long_form_absolute_seconds as f64))
            }
            VideoClass::ShortForm => None,
        }
    }

    /// Whether a tick at `elapsed_seconds` certifies the play
    pub fn certifies_on_tick(&self, duration_seconds: u32, elapsed_seconds: f64) -> bool {
        self.tick_threshold(duration_seconds)
            .map(|threshold| elapsed_seconds >= threshold)
            .unwrap_or(false)
    }

    /// Whether the end of playback certifies the play
    pub fn certifies_on_end(&self, duration_seconds: u32) -> bool {
        self.classify(duration_seconds) == VideoClass::ShortForm
    }
}

/// Sanitize a player-reported duration
///
/// Negative, NaN and infinite values are unresolved and become `0`.
pub fn sanitize_duration(raw: f64) -> u32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    raw.floor().min(u32::MAX as f64) as u32
}
