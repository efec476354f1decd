use std::time::Duration;
use tokio::time::Instant;

/// Longest a single round may wait, whatever the policy asks for.
const MAX_ROUND_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-hop timeout and retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Attempts allowed after the first one.
    pub max_retries: u8,
    /// Attempts sent back-to-back per round.
    pub fan_out: u8,
    /// Extra wait added for every retry round.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Total attempts a silent hop consumes.
    pub fn max_attempts(&self) -> u8 {
        self.max_retries.saturating_add(1)
    }
}

/// State of a hop's probing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HopState {
    /// First round sent, waiting for a reply.
    Waiting,
    /// A later round sent after a deadline expired.
    Retrying,
    /// A matching reply arrived.
    Answered,
    /// Every attempt expired without a reply.
    Exhausted,
}

/// A batch of attempts to transmit, and how long to wait for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Round {
    /// Attempt number of the first probe in the round, 1-based.
    pub first_attempt: u8,
    pub attempts: u8,
    pub deadline: Instant,
}

/// Drives one hop from its first attempt to `Answered` or `Exhausted`.
#[derive(Debug)]
pub struct RetryController {
    policy: RetryPolicy,
    state: HopState,
    attempts_used: u8,
    rounds: u32,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: HopState::Waiting,
            attempts_used: 0,
            rounds: 0,
        }
    }

    pub fn state(&self) -> HopState {
        self.state
    }

    pub fn attempts_used(&self) -> u8 {
        self.attempts_used
    }

    /// Starts the hop: the first round of attempts.
    pub fn begin(&mut self, now: Instant) -> Round {
        self.state = HopState::Waiting;
        self.attempts_used = 0;
        self.rounds = 0;
        self.next_round(now)
    }

    /// Records a matching reply. Later deadlines are ignored.
    pub fn answered(&mut self) {
        self.state = HopState::Answered;
    }

    /// Handles an expired deadline: either another round or exhaustion.
    pub fn expired(&mut self, now: Instant) -> Option<Round> {
        if self.state == HopState::Answered || self.state == HopState::Exhausted {
            return None;
        }
        if self.attempts_used < self.policy.max_attempts() {
            self.state = HopState::Retrying;
            Some(self.next_round(now))
        } else {
            self.state = HopState::Exhausted;
            None
        }
    }

    fn next_round(&mut self, now: Instant) -> Round {
        let remaining = self.policy.max_attempts() - self.attempts_used;
        let attempts = self.policy.fan_out.max(1).min(remaining);
        let first_attempt = self.attempts_used + 1;
        let wait = self
            .policy
            .backoff
            .checked_mul(self.rounds)
            .and_then(|extra| self.policy.timeout.checked_add(extra))
            .map_or(MAX_ROUND_WAIT, |wait| wait.min(MAX_ROUND_WAIT));
        self.attempts_used += attempts;
        self.rounds += 1;
        Round {
            first_attempt,
            attempts,
            deadline: now.checked_add(wait).unwrap_or(now),
        }
    }
}
