use std::time::Duration;

use tracing::debug;

use super::timer::{Timer, TimerToken};

/// How long the bot "types" before a reply shows up:
/// `min(max, base + per_char * chars)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub base: Duration,
    pub per_char: Duration,
    pub max: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(400),
            per_char: Duration::from_millis(20),
            max: Duration::from_millis(1800),
        }
    }
}

impl DelayPolicy {
    pub fn delay_for(&self, reply: &str) -> Duration {
        let chars = u32::try_from(reply.chars().count()).unwrap_or(u32::MAX);
        self.per_char
            .checked_mul(chars)
            .and_then(|typing| self.base.checked_add(typing))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

pub type DeliverFn = Box<dyn FnOnce(String) + Send>;

struct PendingReply {
    token: TimerToken,
    reply: String,
    on_deliver: DeliverFn,
}

/// Holds at most one reply waiting for its delay to elapse. Scheduling a new
/// reply cancels the waiting one; its callback is dropped without running.
pub struct ResponseScheduler<T> {
    timer: T,
    policy: DelayPolicy,
    pending: Option<PendingReply>,
}

impl<T: Timer> ResponseScheduler<T> {
    pub fn new(timer: T, policy: DelayPolicy) -> Self {
        Self {
            timer,
            policy,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, reply: String, on_deliver: F) -> Duration
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.cancel();

        let delay = self.policy.delay_for(&reply);
        let token = self.timer.start(delay);
        debug!("Reply scheduled in {:?} ({} chars)", delay, reply.chars().count());
        self.pending = Some(PendingReply {
            token,
            reply,
            on_deliver: Box::new(on_deliver),
        });
        delay
    }

    /// Drop the waiting reply, if any.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(old) => {
                self.timer.cancel(old.token);
                debug!("Cancelled pending reply {:?}", old.token);
                true
            }
            None => false,
        }
    }

    /// Deliver the waiting reply if `token` belongs to it. Tokens of replies
    /// that were already replaced are ignored. Returns whether a reply ran.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        match self.pending.take() {
            Some(pending) if pending.token == token => {
                (pending.on_deliver)(pending.reply);
                true
            }
            other => {
                self.pending = other;
                debug!("Ignoring stale timer {:?}", token);
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_reply(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.reply.as_str())
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
