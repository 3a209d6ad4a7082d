//! Quiet-period endpointing for continuous capture

use std::time::{Duration, Instant};
use tracing::debug;

/// Default quiet period before a continuous capture is considered finished
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(2);

/// Single re-armable silence timer
///
/// Only the most recently armed timer is live: arming again replaces the
/// previous deadline, and disarming guarantees nothing fires afterwards.
#[derive(Clone, Debug)]
pub struct SilenceDebouncer {
    quiet_period: Duration,
    generation: u64,
    armed: Option<(u64, Instant)>,
}

impl Default for SilenceDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl SilenceDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            generation: 0,
            armed: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// (Re)start the quiet-period timer from `now`, returning its generation
    pub fn arm(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.armed = Some((self.generation, now + self.quiet_period));
        self.generation
    }

    pub fn disarm(&mut self) {
        if let Some((generation, _)) = self.armed.take() {
            debug!("Silence timer {} disarmed", generation);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    /// Fire the live timer if its deadline has passed
    ///
    /// Returns the generation that fired. A timer fires at most once.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        match self.armed {
            Some((generation, deadline)) if now >= deadline => {
                self.armed = None;
                debug!("Silence timer {} fired", generation);
                Some(generation)
            }
            _ => None,
        }
    }
}
