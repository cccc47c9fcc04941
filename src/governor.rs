/// Upstream call pacing
///
/// Single shared governor deciding when the next upstream call may be
/// issued. Two rules, whichever fired most recently wins:
/// - minimum spacing between any two calls, regardless of outcome
/// - an extended backoff window entered after an upstream 429
///
/// The governor is injected (shared `Arc`) into the upstream client, the
/// tracker and the monitor; all state lives behind one mutex. Every public
/// operation has an `_at(now)` variant taking an explicit timestamp so tests
/// run against a deterministic clock.
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

use crate::config::GovernorConfig;

#[derive(Debug, Clone, Copy)]
struct GovernorState {
    next_allowed_call_at: DateTime<Utc>,
    backoff_until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct RateGovernor {
    min_spacing: Duration,
    backoff: Duration,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    pub fn new(config: &GovernorConfig) -> Self {
        Self {
            min_spacing: Duration::seconds(config.min_spacing_seconds as i64),
            backoff: Duration::seconds(config.backoff_seconds as i64),
            state: Mutex::new(GovernorState {
                next_allowed_call_at: DateTime::<Utc>::MIN_UTC,
                backoff_until: None,
            }),
        }
    }

    /// True when an upstream call may be issued right now
    pub fn can_call_now(&self) -> bool {
        self.can_call_at(Utc::now())
    }

    pub fn can_call_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.lock().unwrap();
        if let Some(until) = state.backoff_until {
            if now < until {
                return false;
            }
        }
        now >= state.next_allowed_call_at
    }

    /// Record that a call is being issued; starts the spacing window before
    /// the network round-trip so even failed calls consume it
    pub fn record_call_issued(&self) {
        self.record_call_issued_at(Utc::now());
    }

    pub fn record_call_issued_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.next_allowed_call_at = now + self.min_spacing;
    }

    /// Record an upstream 429; only a clock advance past the deadline lifts
    /// the resulting backoff
    pub fn record_rate_limited(&self) {
        self.record_rate_limited_at(Utc::now());
    }

    pub fn record_rate_limited_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.backoff_until = Some(now + self.backoff);
    }

    /// Record a successful call; no penalty beyond the spacing window, and an
    /// elapsed backoff marker is cleared
    pub fn record_success(&self) {
        self.record_success_at(Utc::now());
    }

    pub fn record_success_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        if let Some(until) = state.backoff_until {
            if now >= until {
                state.backoff_until = None;
            }
        }
    }

    /// Seconds until the next call becomes permissible, floored at 1.
    /// Used as the retry hint on unavailable responses.
    pub fn retry_after_secs(&self) -> i64 {
        self.retry_after_secs_at(Utc::now())
    }

    pub fn retry_after_secs_at(&self, now: DateTime<Utc>) -> i64 {
        let state = self.state.lock().unwrap();
        let mut next = state.next_allowed_call_at;
        if let Some(until) = state.backoff_until {
            if until > next {
                next = until;
            }
        }
        (next - now).num_seconds().max(1)
    }
}
