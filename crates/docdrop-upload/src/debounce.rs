//! Trailing-edge debounce with a maximum wait.
//!
//! The timer only computes deadlines; the coordinator's driver sleeps until
//! [`Debounce::deadline`] and then calls [`Debounce::fire`].

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debounce {
    quiet_period: Duration,
    max_wait: Duration,
    first_ping: Option<Instant>,
    last_ping: Option<Instant>,
}

impl Debounce {
    pub fn new(quiet_period: Duration, max_wait: Duration) -> Self {
        Self {
            quiet_period,
            max_wait: max_wait.max(quiet_period),
            first_ping: None,
            last_ping: None,
        }
    }

    /// Schedule the timer, or push it back by one quiet period if already
    /// scheduled. Never moves the deadline past `first ping + max_wait`.
    pub fn ping(&mut self, now: Instant) {
        if self.first_ping.is_none() {
            self.first_ping = Some(now);
        }
        self.last_ping = Some(now);
    }

    pub fn cancel(&mut self) {
        self.first_ping = None;
        self.last_ping = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.first_ping.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first_ping?;
        let last = self.last_ping.unwrap_or(first);
        Some((last + self.quiet_period).min(first + self.max_wait))
    }

    /// Consume the timer if its deadline has passed. Returns whether it fired.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if deadline <= now => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}
