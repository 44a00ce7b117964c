//! Cooperative main-thread run loop
//!
//! A `mio::Poll` that owns the process-wide wake primitive plus a list of
//! timers. Each [`RunLoop::run_once`] blocks until the wake is signalled, a
//! timer is due, or the timeout passes, then reports what fired.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::{Events, Poll, Token, Waker};
use tracing::trace;

/// Token of the wake source signalled by the polling thread.
pub const WAKE_TOKEN: Token = Token(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    Source(Token),
    Timer(TimerId),
}

#[derive(Debug)]
struct Timer {
    id: TimerId,
    deadline: Instant,
    interval: Duration,
    repeats: bool,
}

pub struct RunLoop {
    poll: Poll,
    events: Events,
    waker: Arc<Waker>,
    timers: Vec<Timer>,
    next_timer: u64,
}

impl RunLoop {
    pub fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKE_TOKEN)?);
        Ok(Self {
            poll,
            events: Events::with_capacity(16),
            waker,
            timers: Vec::new(),
            next_timer: 0,
        })
    }

    /// Shared handle to the wake primitive. Safe to signal from any thread;
    /// redundant wakes coalesce.
    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub fn add_timer(&mut self, interval: Duration, repeats: bool) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        self.timers.push(Timer {
            id,
            deadline: Instant::now() + interval,
            interval,
            repeats,
        });
        id
    }

    pub fn invalidate_timer(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// False once a one-shot timer has fired or the timer was invalidated.
    pub fn is_timer_valid(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// One loop iteration. `None` waits until something fires.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Fired>> {
        let now = Instant::now();
        let until_timer = self
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now));
        let wait = match (timeout, until_timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match self.poll.poll(&mut self.events, wait) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }

        let mut fired: Vec<Fired> = self.events.iter().map(|e| Fired::Source(e.token())).collect();

        let now = Instant::now();
        for timer in self.timers.iter_mut().filter(|t| t.deadline <= now) {
            fired.push(Fired::Timer(timer.id));
            timer.deadline = now + timer.interval;
        }
        self.timers.retain(|t| t.repeats || !fired.contains(&Fired::Timer(t.id)));

        if !fired.is_empty() {
            trace!(count = fired.len(), "run loop iteration fired");
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_zero_timeout_returns_immediately() {
        let mut run_loop = RunLoop::new().unwrap();
        let start = Instant::now();
        assert!(run_loop.run_once(Some(Duration::ZERO)).unwrap().is_empty());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wake_from_other_thread() {
        let mut run_loop = RunLoop::new().unwrap();
        let waker = run_loop.waker();
        let handle = thread::spawn(move || {
            waker.wake().unwrap();
            waker.wake().unwrap();
        });
        handle.join().unwrap();
        let fired = run_loop.run_once(Some(Duration::from_secs(5))).unwrap();
        assert!(fired.contains(&Fired::Source(WAKE_TOKEN)));
    }

    #[test]
    fn test_one_shot_timer() {
        let mut run_loop = RunLoop::new().unwrap();
        let id = run_loop.add_timer(Duration::from_millis(10), false);
        let mut fired = Vec::new();
        while fired.is_empty() {
            fired = run_loop.run_once(Some(Duration::from_secs(5))).unwrap();
        }
        assert_eq!(fired, vec![Fired::Timer(id)]);
        assert!(!run_loop.has_timers());
    }

    #[test]
    fn test_repeating_timer_and_invalidate() {
        let mut run_loop = RunLoop::new().unwrap();
        let id = run_loop.add_timer(Duration::from_millis(5), true);
        let mut count = 0;
        while count < 2 {
            let fired = run_loop.run_once(Some(Duration::from_secs(5))).unwrap();
            count += fired.iter().filter(|f| **f == Fired::Timer(id)).count();
        }
        assert!(run_loop.has_timers());
        assert!(run_loop.invalidate_timer(id));
        assert!(!run_loop.invalidate_timer(id));
    }
}
