//! Admission control for outbound commands.

use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on a busy window; longer windows saturate to it.
const MAX_WINDOW: Duration = Duration::from_secs(86400 * 365 * 30);

/// Single-slot cooldown gate.
///
/// Tracks the instant until which the blaster is busy transmitting. A
/// command is admitted only once that instant has passed, and admitting it
/// pushes the instant forward by the command's busy window. There is no
/// queue: rejected attempts are simply refused.
#[derive(Debug, Clone)]
pub struct BusyGate {
    busy_until: Instant,
}

impl BusyGate {
    /// Create a gate that is busy up to and including `now`.
    pub fn new(now: Instant) -> Self {
        Self { busy_until: now }
    }

    /// Check and advance the gate in one step.
    ///
    /// Rejects (returns `false`, leaving the gate untouched) while
    /// `now <= busy_until`. Otherwise admits and sets
    /// `busy_until = now + per_unit * repeat`, saturating at roughly 30 years.
    pub fn try_acquire(&mut self, now: Instant, per_unit: Duration, repeat: u32) -> bool {
        if now <= self.busy_until {
            return false;
        }
        let window = per_unit
            .checked_mul(repeat)
            .map_or(MAX_WINDOW, |window| window.min(MAX_WINDOW));
        self.busy_until = now + window;
        true
    }

    pub fn busy_until(&self) -> Instant {
        self.busy_until
    }

    /// Whether a command issued at `now` would be rejected.
    pub fn is_busy(&self, now: Instant) -> bool {
        now <= self.busy_until
    }
}
