//! Verification policy: code lifetime, code width, restart behavior.

use std::ops::RangeInclusive;
use std::time::Duration;

// ---------------------------------------------------------------------------
// RestartPolicy
// ---------------------------------------------------------------------------

/// What `start_verification` does when the identity already has a live
/// pending session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Replace the pending session with a fresh code. The old code stops
    /// matching immediately.
    #[default]
    Overwrite,

    /// Refuse with `AlreadyPending` until the old code is confirmed or
    /// expires.
    Reject,
}

// ---------------------------------------------------------------------------
// VerificationConfig
// ---------------------------------------------------------------------------

/// Configuration for the verification flow.
///
/// Construct with `VerificationConfig::default()` and override the fields
/// you care about.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// How long an issued code stays valid.
    ///
    /// Default: 10 minutes.
    pub code_expiration: Duration,

    /// Number of decimal digits in a code.
    ///
    /// Codes are drawn uniformly from `10^(w-1) ..= 10^w - 1`, so the
    /// default of 4 gives 1000–9999.
    pub code_digit_width: u32,

    /// Behavior when a verification is restarted while one is pending.
    pub restart_policy: RestartPolicy,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_expiration: Duration::from_secs(10 * 60),
            code_digit_width: 4,
            restart_policy: RestartPolicy::default(),
        }
    }
}

impl VerificationConfig {
    /// Smallest supported code width.
    pub const MIN_CODE_DIGIT_WIDTH: u32 = 1;
    /// Largest supported code width (the range must fit in a `u32`).
    pub const MAX_CODE_DIGIT_WIDTH: u32 = 9;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by `SessionManager::open`.
    pub fn validated(mut self) -> Self {
        let clamped = self
            .code_digit_width
            .clamp(Self::MIN_CODE_DIGIT_WIDTH, Self::MAX_CODE_DIGIT_WIDTH);
        if clamped != self.code_digit_width {
            tracing::warn!(
                width = self.code_digit_width,
                min = Self::MIN_CODE_DIGIT_WIDTH,
                max = Self::MAX_CODE_DIGIT_WIDTH,
                "code_digit_width out of range, clamping"
            );
            self.code_digit_width = clamped;
        }
        self
    }

    /// The range codes are drawn from. Assumes a validated width.
    pub fn code_range(&self) -> RangeInclusive<u32> {
        let low = 10u32.pow(self.code_digit_width - 1);
        let high = 10u32.pow(self.code_digit_width) - 1;
        low..=high
    }
}
