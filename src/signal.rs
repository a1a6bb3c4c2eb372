//! # Multicast signal: ordered callback delivery with once/replay semantics.
//!
//! [`Signal`] is the event-registration primitive the exchange and socket
//! state machines are built on. One signal carries one event kind (a body
//! chunk, a close, an error) and delivers each emitted value to every
//! subscriber, synchronously, in registration order.
//!
//! ## Architecture
//! ```text
//! Producer (state machine):            Subscribers (application):
//!
//!   emit(value) ──► [ Signal ] ──────► callback 1 (&value)
//!                   phase, last ─────► callback 2 (&value)
//!                   opts {once,      ► callback N (&value)
//!                         replay}
//!                        │
//!   subscribe(f) ────────┘  (replay: f invoked immediately with last value)
//! ```
//!
//! ## Rules
//! - **Ordered, synchronous**: `emit` invokes subscribers on the calling
//!   thread, in the order they subscribed. No queueing, no spawning.
//! - **Once**: after the first `emit`, further emits are silent no-ops and
//!   the subscriber list is released.
//! - **Replay**: a subscriber added after an emit is invoked immediately
//!   with the last emitted value, so late observers are not starved.
//! - **Disable**: seals the signal; subsequent `subscribe`/`emit` calls are
//!   silent no-ops. Used to guarantee nothing fires after a terminal close.
//! - **Re-entrancy**: callbacks may subscribe, emit or disable the same
//!   signal; delivery works on a snapshot and re-checks `disable` between
//!   callbacks, so a disable performed mid-fire stops the remaining
//!   deliveries.
//!
//! Emitting on a disabled or exhausted signal is never an error: terminal
//! ordering races across backends are expected and must not crash callers.
//!
//! ## Example
//! ```
//! use gangway::{Signal, SignalOpts};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let signal: Signal<String> = Signal::new(SignalOpts::new().once(true).replay(true));
//!
//! let early = Arc::clone(&seen);
//! signal.subscribe(move |_msg| {
//!     early.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! signal.emit("ready".to_string());
//! signal.emit("ignored".to_string()); // exhausted, silent no-op
//!
//! let late = Arc::clone(&seen);
//! signal.subscribe(move |msg| {
//!     assert_eq!(msg, "ready"); // replayed at subscribe time
//!     late.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a callback panicked mid-update.
///
/// State behind these locks is kept consistent before callbacks run, so a
/// poisoned guard still holds usable bookkeeping.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Behavior flags for a [`Signal`], fixed at construction.
///
/// ### Properties
/// - **once**: the signal fires at most one time; later emits are no-ops.
/// - **replay**: the last emitted value is kept and handed to subscribers
///   that register after the fact.
///
/// # Example
/// ```
/// use gangway::SignalOpts;
///
/// let opts = SignalOpts::new().once(true).replay(true);
/// assert!(opts.is_once() && opts.is_replay());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignalOpts {
    once: bool,
    replay: bool,
}

impl SignalOpts {
    /// Creates the default flag set: multi-fire, no replay.
    pub const fn new() -> Self {
        Self {
            once: false,
            replay: false,
        }
    }

    /// Sets whether the signal is exhausted by its first emit.
    pub const fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Sets whether late subscribers receive the last emitted value.
    pub const fn replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    /// Returns the once flag.
    pub const fn is_once(&self) -> bool {
        self.once
    }

    /// Returns the replay flag.
    pub const fn is_replay(&self) -> bool {
        self.replay
    }
}

/// Delivery phase of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No emit has happened yet.
    Open,
    /// At least one emit happened (terminal for `once` signals).
    Fired,
    /// Sealed; nothing is delivered or registered anymore.
    Disabled,
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SignalState<T> {
    subscribers: Vec<Callback<T>>,
    phase: Phase,
    last: Option<T>,
}

/// Ordered multicast registry for one event kind.
///
/// See the [module docs](self) for delivery rules. The exchange and socket
/// state machines own one `Signal` per event kind (chunk, end, body, text,
/// binary, close, error) with flags matching that kind's semantics: close
/// and body are `once + replay`, chunk and error are plain multi-fire.
///
/// ### Properties
/// - **Synchronous**: `emit` returns after the last subscriber returned.
/// - **Lock-free delivery**: callbacks run outside the internal lock, so a
///   callback may call back into this signal without deadlocking.
/// - **Thread-safe bookkeeping**: the handle is `Send + Sync`; delivery
///   ordering across threads is the caller's contract, not this type's.
pub struct Signal<T> {
    opts: SignalOpts,
    state: Mutex<SignalState<T>>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Creates a signal with the given behavior flags.
    pub fn new(opts: SignalOpts) -> Self {
        Self {
            opts,
            state: Mutex::new(SignalState {
                subscribers: Vec::new(),
                phase: Phase::Open,
                last: None,
            }),
        }
    }

    /// Creates a plain multi-fire signal (no once, no replay).
    pub fn plain() -> Self {
        Self::new(SignalOpts::new())
    }

    /// Creates a `once + replay` signal: fires one time and latches the
    /// value for late subscribers. This is the shape terminal events use.
    pub fn latched() -> Self {
        Self::new(SignalOpts::new().once(true).replay(true))
    }

    /// Returns the behavior flags this signal was built with.
    pub fn opts(&self) -> SignalOpts {
        self.opts
    }

    /// Registers a subscriber.
    ///
    /// - Silently ignored when the signal is disabled.
    /// - With **replay**, if an emit already happened the subscriber is
    ///   invoked immediately (on this thread) with the last value.
    /// - With **once**, a subscriber arriving after the single emit is not
    ///   retained; it only sees the replayed value, if any.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(subscriber);
        let replayed = {
            let mut state = lock_unpoisoned(&self.state);
            if state.phase == Phase::Disabled {
                return;
            }
            let exhausted = self.opts.once && state.phase == Phase::Fired;
            if !exhausted {
                state.subscribers.push(Arc::clone(&callback));
            }
            if self.opts.replay && state.phase == Phase::Fired {
                state.last.clone()
            } else {
                None
            }
        };
        if let Some(value) = replayed {
            callback(&value);
        }
    }

    /// Emits a value to all current subscribers, in registration order.
    ///
    /// Silent no-op when the signal is disabled or already exhausted.
    /// Delivery stops early if a callback disables this signal mid-fire.
    pub fn emit(&self, value: T) {
        let snapshot = {
            let mut state = lock_unpoisoned(&self.state);
            match state.phase {
                Phase::Disabled => return,
                Phase::Fired if self.opts.once => return,
                _ => {}
            }
            state.phase = Phase::Fired;
            if self.opts.replay {
                state.last = Some(value.clone());
            }
            if self.opts.once {
                std::mem::take(&mut state.subscribers)
            } else {
                state.subscribers.clone()
            }
        };
        for callback in snapshot {
            if self.is_disabled() {
                break;
            }
            callback(&value);
        }
    }

    /// Seals the signal: drops subscribers and the replay slot, and turns
    /// every further `subscribe`/`emit` into a silent no-op.
    ///
    /// Terminal close sequencing relies on this: disabling the other
    /// signals before firing close guarantees close is the last delivery.
    pub fn disable(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.phase = Phase::Disabled;
        state.subscribers.clear();
        state.last = None;
    }

    /// Returns `true` once at least one emit has been delivered.
    pub fn has_fired(&self) -> bool {
        lock_unpoisoned(&self.state).phase == Phase::Fired
    }

    /// Returns `true` after [`disable`](Self::disable).
    pub fn is_disabled(&self) -> bool {
        lock_unpoisoned(&self.state).phase == Phase::Disabled
    }

    /// Number of currently retained subscribers.
    ///
    /// Drops to zero once a `once` signal fires or the signal is disabled.
    pub fn subscriber_count(&self) -> usize {
        lock_unpoisoned(&self.state).subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    /// Returns [`Signal::plain`].
    fn default() -> Self {
        Self::plain()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock_unpoisoned(&self.state);
        f.debug_struct("Signal")
            .field("opts", &self.opts)
            .field("phase", &state.phase)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        (hits, move |_: &u32| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_delivers_in_registration_order() {
        let signal: Signal<u32> = Signal::plain();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            signal.subscribe(move |_| order.lock().unwrap().push(tag));
        }
        signal.emit(7);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["first", "second", "third"],
            "subscribers must fire in registration order"
        );
    }

    #[test]
    fn test_plain_signal_fires_every_emit() {
        let signal: Signal<u32> = Signal::plain();
        let (hits, subscriber) = counter();
        signal.subscribe(subscriber);
        signal.emit(1);
        signal.emit(2);
        signal.emit(3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_once_signal_is_exhausted_after_first_emit() {
        let signal: Signal<u32> = Signal::new(SignalOpts::new().once(true));
        let (hits, subscriber) = counter();
        signal.subscribe(subscriber);
        signal.emit(1);
        signal.emit(2);
        assert_eq!(hits.load(Ordering::SeqCst), 1, "second emit must be a no-op");
        assert!(signal.has_fired());
        assert_eq!(signal.subscriber_count(), 0, "once signals release subscribers");
    }

    #[test]
    fn test_replay_invokes_late_subscriber_exactly_once() {
        let signal: Signal<u32> = Signal::latched();
        signal.emit(42);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        signal.subscribe(move |value| sink.lock().unwrap().push(*value));
        signal.emit(99); // exhausted: must not reach the late subscriber

        assert_eq!(*seen.lock().unwrap(), vec![42]);
    }

    #[test]
    fn test_replay_without_once_keeps_late_subscriber_registered() {
        let signal: Signal<u32> = Signal::new(SignalOpts::new().replay(true));
        signal.emit(1);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        signal.subscribe(move |value| sink.lock().unwrap().push(*value));
        signal.emit(2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![1, 2],
            "late subscriber gets the replayed value and future emits"
        );
    }

    #[test]
    fn test_disabled_signal_ignores_subscribe_and_emit() {
        let signal: Signal<u32> = Signal::plain();
        let (hits, subscriber) = counter();
        signal.subscribe(subscriber);
        signal.disable();

        signal.emit(1);
        let (late_hits, late) = counter();
        signal.subscribe(late);
        signal.emit(2);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert!(signal.is_disabled());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn test_disable_mid_fire_stops_remaining_deliveries() {
        let signal: Arc<Signal<u32>> = Arc::new(Signal::plain());
        let (hits, subscriber) = counter();

        let gate = Arc::clone(&signal);
        signal.subscribe(move |_| gate.disable());
        signal.subscribe(subscriber);

        signal.emit(5);
        assert_eq!(
            hits.load(Ordering::SeqCst),
            0,
            "subscribers after the disabling callback must not fire"
        );
    }

    #[test]
    fn test_reentrant_subscribe_from_callback_does_not_deadlock() {
        let signal: Arc<Signal<u32>> = Arc::new(Signal::plain());
        let registrar = Arc::clone(&signal);
        let (hits, subscriber) = counter();

        signal.subscribe(move |_| registrar.subscribe(|_| {}));
        signal.subscribe(subscriber);

        signal.emit(1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 3);
    }

    #[test]
    fn test_reentrant_emit_on_once_signal_is_noop() {
        let signal: Arc<Signal<u32>> = Arc::new(Signal::new(SignalOpts::new().once(true)));
        let reemitter = Arc::clone(&signal);
        let (hits, subscriber) = counter();

        signal.subscribe(move |_| reemitter.emit(999));
        signal.subscribe(subscriber);

        signal.emit(1);
        assert_eq!(
            hits.load(Ordering::SeqCst),
            1,
            "emit from inside the fire must see the signal already exhausted"
        );
    }

    #[test]
    fn test_replay_value_is_last_emitted() {
        let signal: Signal<u32> = Signal::new(SignalOpts::new().replay(true));
        signal.emit(1);
        signal.emit(2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        signal.subscribe(move |value| sink.lock().unwrap().push(*value));

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }
}
