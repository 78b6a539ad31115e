use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Binary semaphore: at most one pending permit, `set` on an already set
/// signal is a no-op.
#[derive(Default)]
pub struct ReadySignal {
    ready: Mutex<bool>,
    changed: Condvar,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let mut ready = self.ready.lock();
        *ready = true;
        self.changed.notify_all();
    }

    pub fn clear(&self) {
        *self.ready.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.ready.lock()
    }

    /// Wait up to `timeout` for the signal, then clear it. Returns `true`
    /// if the permit was taken. May return early without the permit after
    /// a `wake`.
    pub fn take_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.ready.lock();
        if !*ready {
            // A single wait, so `wake` can release the caller to recheck
            // its own stop flag.
            self.changed.wait_until(&mut ready, deadline);
        }
        std::mem::replace(&mut *ready, false)
    }

    /// Wake any waiter without granting the permit.
    pub fn wake(&self) {
        let _ready = self.ready.lock();
        self.changed.notify_all();
    }
}

/// Signal-only handle to another controller's `ReadySignal`. A peer can
/// hand the turn over but can never take or clear it.
#[derive(Clone)]
pub struct PeerGate {
    signal: Arc<ReadySignal>,
}

impl PeerGate {
    pub(crate) fn new(signal: Arc<ReadySignal>) -> Self {
        Self { signal }
    }

    /// Give the turn to the owner of the signal.
    pub fn release(&self) {
        self.signal.set();
    }
}

/// Strict ping-pong between two axes built from their two ready signals.
pub struct AlternationGate;

impl AlternationGate {
    /// Returns the gates to pass to `first.run` and `second.run`: each
    /// axis signals the other one at the end of its turn.
    pub fn link(
        first: &super::axis::AxisController,
        second: &super::axis::AxisController,
    ) -> (PeerGate, PeerGate) {
        (second.gate(), first.gate())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnWait {
    Acquired,
    Cancelled,
}

/// Block until `signal` grants the turn or `token` is cancelled. Waits in
/// slices of `poll` so cancellation is observed, and warns once when the
/// peer has been silent for longer than `stall_warning`.
pub(crate) fn wait_for_turn(
    signal: &ReadySignal,
    token: &CancellationToken,
    poll: Duration,
    stall_warning: Duration,
) -> TurnWait {
    let started = Instant::now();
    let mut warned = false;
    loop {
        if token.is_cancelled() {
            return TurnWait::Cancelled;
        }
        if signal.take_timeout(poll) {
            trace!("Got turn after {:?}.", started.elapsed());
            return TurnWait::Acquired;
        }
        if !warned && started.elapsed() >= stall_warning {
            warn!(
                "Peer axis has not released the turn for {:?}. Is it stopped?",
                started.elapsed()
            );
            warned = true;
        }
    }
}

/// Releases the peer when dropped, so the hand-over also happens when an
/// iteration fails or panics.
pub(crate) struct TurnGuard<'a> {
    peer: Option<&'a PeerGate>,
}

impl<'a> TurnGuard<'a> {
    pub(crate) fn new(alternate: bool, peer: Option<&'a PeerGate>) -> Self {
        Self {
            peer: if alternate { peer } else { None },
        }
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if let Some(peer) = self.peer {
            trace!("Releasing peer.");
            peer.release();
        }
    }
}

#[cfg(test)]
mod testing {
    use std::thread;

    use super::*;

    #[test]
    fn test_signal_is_a_single_permit() {
        let signal = ReadySignal::new();
        signal.set();
        signal.set();

        assert!(signal.take_timeout(Duration::from_millis(1)));
        assert!(!signal.is_set());
        assert!(!signal.take_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_take_waits_for_set_from_other_thread() {
        let signal = Arc::new(ReadySignal::new());
        let setter = {
            let signal = signal.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.set();
            })
        };

        assert!(signal.take_timeout(Duration::from_secs(5)));
        setter.join().expect("Setter panicked");
    }

    #[test]
    fn test_wait_for_turn_observes_cancel() {
        let signal = Arc::new(ReadySignal::new());
        let token = CancellationToken::new();
        let waiter = {
            let signal = signal.clone();
            let token = token.clone();
            thread::spawn(move || {
                wait_for_turn(
                    &signal,
                    &token,
                    Duration::from_secs(10),
                    Duration::from_secs(60),
                )
            })
        };

        thread::sleep(Duration::from_millis(30));
        token.cancel();
        signal.wake();

        assert_eq!(waiter.join().expect("Waiter panicked"), TurnWait::Cancelled);
        assert!(!signal.is_set());
    }

    #[test]
    fn test_guard_releases_peer_only_when_alternating() {
        let signal = Arc::new(ReadySignal::new());
        let peer = PeerGate::new(signal.clone());

        drop(TurnGuard::new(false, Some(&peer)));
        assert!(!signal.is_set());

        drop(TurnGuard::new(true, Some(&peer)));
        assert!(signal.is_set());
    }

    #[test]
    fn test_guard_releases_peer_on_panic() {
        let signal = Arc::new(ReadySignal::new());
        let peer = PeerGate::new(signal.clone());

        let result = thread::spawn(move || {
            let _guard = TurnGuard::new(true, Some(&peer));
            panic!("control step failed");
        })
        .join();

        assert!(result.is_err());
        assert!(signal.is_set());
    }
}
