//! Background readiness wait on the server connection
//!
//! A dedicated thread blocks in `mio::Poll` on the connection's socket and
//! signals the run loop's waker whenever data arrives. It never reads from
//! the socket and never touches toolkit state; all decoding happens on the
//! main thread after the wake.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

const CONNECTION: Token = Token(0);
const CANCEL: Token = Token(1);

pub struct RawEventSource {
    cancelled: Arc<AtomicBool>,
    cancel_waker: Waker,
    thread: Option<JoinHandle<()>>,
}

impl RawEventSource {
    /// Start polling `fd`, signalling `wake` on every readiness edge.
    ///
    /// `fd` must stay open until [`cancel`](Self::cancel) returns.
    pub fn spawn(fd: RawFd, wake: Arc<Waker>) -> io::Result<Self> {
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut SourceFd(&fd), CONNECTION, Interest::READABLE)?;
        let cancel_waker = Waker::new(poll.registry(), CANCEL)?;
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = cancelled.clone();
        let thread = thread::Builder::new()
            .name("x11kit-poll".into())
            .spawn(move || poll_loop(poll, wake, flag))?;

        debug!(fd, "connection polling thread started");
        Ok(Self {
            cancelled,
            cancel_waker,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn cancel(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.cancelled.store(true, Ordering::Release);
        if let Err(err) = self.cancel_waker.wake() {
            warn!(%err, "could not interrupt polling thread");
        }
        if thread.join().is_err() {
            warn!("polling thread panicked");
        }
    }
}

impl Drop for RawEventSource {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn poll_loop(mut poll: Poll, wake: Arc<Waker>, cancelled: Arc<AtomicBool>) {
    let mut events = Events::with_capacity(4);
    loop {
        if let Err(err) = poll.poll(&mut events, None) {
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!(%err, "connection poll failed");
            return;
        }

        if cancelled.load(Ordering::Acquire) {
            info!("connection polling thread shutting down");
            return;
        }

        if events.iter().any(|e| e.token() == CONNECTION) {
            if let Err(err) = wake.wake() {
                warn!(%err, "failed to wake run loop");
            }
        }
    }
}
