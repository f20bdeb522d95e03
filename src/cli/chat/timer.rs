use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Identifies one started timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

/// Cancellable one-shot timers. Expired tokens are reported out of band
/// (a channel for [`TokioTimer`], [`ManualTimer::advance`] for tests) and fed
/// back to the scheduler by whoever owns it.
pub trait Timer {
    fn start(&mut self, delay: Duration) -> TimerToken;
    fn cancel(&mut self, token: TimerToken);
}

/// Timers backed by `tokio::time::sleep`, reporting expiry on an unbounded
/// channel.
pub struct TokioTimer {
    next: u64,
    running: HashMap<TimerToken, JoinHandle<()>>,
    expired: mpsc::UnboundedSender<TimerToken>,
}

impl TokioTimer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = Self {
            next: 0,
            running: HashMap::new(),
            expired: tx,
        };
        (timer, rx)
    }
}

impl Timer for TokioTimer {
    fn start(&mut self, delay: Duration) -> TimerToken {
        self.next += 1;
        let token = TimerToken(self.next);
        let expired = self.expired.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session ended; nothing left to notify.
            let _ = expired.send(token);
        });

        self.running.retain(|_, handle| !handle.is_finished());
        self.running.insert(token, handle);
        debug!("Started timer {:?} for {:?}", token, delay);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(handle) = self.running.remove(&token) {
            handle.abort();
            debug!("Cancelled timer {:?}", token);
        }
    }
}

/// Virtual-time timers for tests and hosts that drive their own clock.
#[derive(Debug, Default)]
pub struct ManualTimer {
    next: u64,
    now: Duration,
    running: Vec<(Duration, TimerToken)>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.running.len()
    }

    /// Move time forward and return the tokens that expired, earliest first.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerToken> {
        self.now += by;
        let now = self.now;
        let mut due: Vec<(Duration, TimerToken)> = Vec::new();
        self.running.retain(|&(deadline, token)| {
            if deadline <= now {
                due.push((deadline, token));
                false
            } else {
                true
            }
        });
        due.sort();
        due.into_iter().map(|(_, token)| token).collect()
    }
}

impl Timer for ManualTimer {
    fn start(&mut self, delay: Duration) -> TimerToken {
        self.next += 1;
        let token = TimerToken(self.next);
        self.running.push((self.now + delay, token));
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        self.running.retain(|&(_, t)| t != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn manual_timer_fires_in_deadline_order() {
        let mut timer = ManualTimer::new();
        let late = timer.start(ms(300));
        let early = timer.start(ms(100));

        assert!(timer.advance(ms(99)).is_empty());
        assert_eq!(timer.advance(ms(1)), vec![early]);
        assert_eq!(timer.advance(ms(500)), vec![late]);
        assert_eq!(timer.pending(), 0);
        assert_eq!(timer.elapsed(), ms(600));
    }

    #[test]
    fn manual_timer_cancel_prevents_expiry() {
        let mut timer = ManualTimer::new();
        let token = timer.start(ms(10));
        timer.cancel(token);
        assert!(timer.advance(ms(1_000)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timer_reports_expiry() {
        let (mut timer, mut expired) = TokioTimer::new();
        let token = timer.start(ms(400));

        assert_eq!(expired.recv().await, Some(token));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_timer_cancelled_token_never_arrives() {
        let (mut timer, mut expired) = TokioTimer::new();
        let stale = timer.start(ms(50));
        let fresh = timer.start(ms(100));
        timer.cancel(stale);

        assert_eq!(expired.recv().await, Some(fresh));
        tokio::time::sleep(ms(1_000)).await;
        assert!(expired.try_recv().is_err());
    }
}
