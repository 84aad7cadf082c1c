//! Unidirectional store
//!
//! - Actions: what can happen ([`Action`], a closed sum type)
//! - State: what is true right now ([`StoreState`], swapped per dispatch)
//! - Reducer: `(State, Action) -> State`, followed by reconciliation
//! - Context: the read-only projection views consume ([`DerivedContext`])
//!
//! # Dispatch cycle
//!
//! `dispatch` enqueues the action. If no cycle is running on this store, the
//! caller drains the queue: each action is reduced, reconciliation queues any
//! follow-ups behind it, the new snapshot is swapped in, and listeners are
//! told about the context if it changed.
//!
//! A dispatch from a listener (the thread running the cycle) is queued and
//! drained by that cycle in FIFO order, so notification chains never recurse.
//! A dispatch from any other thread waits for the running cycle to end and
//! then drains whatever is left, so the action has been applied when
//! `dispatch` returns. A listener must therefore not block on another thread
//! that dispatches to the same store.
//!
//! # Example
//!
//! ```
//! use libviewstate::store::{Action, Store};
//!
//! let store = Store::default();
//! let _subscription = store.subscribe(|context| {
//!     println!("signed in: {}", context.signed_in);
//! });
//!
//! store.dispatch(Action::set_active_token(Some("t")));
//! assert!(store.context().signed_in);
//! ```

pub mod action;
pub mod context;
pub mod queue;
pub mod reducer;
pub mod state;

pub use action::{Action, ActionRecord, Resource};
pub use context::{derive, ContextDeriver, DerivedContext};
pub use queue::ActionQueue;
pub use reducer::{reconcile, reduce};
pub use state::StoreState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::service::events::{EventBus, EventReceiver, StoreEvent};

type Listener = Arc<dyn Fn(&DerivedContext) + Send + Sync>;

struct Core {
    state: Arc<StoreState>,
    queue: ActionQueue,
    deriver: ContextDeriver,
    /// Thread currently running a dispatch cycle.
    drainer: Option<ThreadId>,
}

struct Inner {
    core: Mutex<Core>,
    cycle_done: Condvar,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    events: EventBus,
}

/// Handle to a store. Clones share the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl Store {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_state(StoreState::default(), config)
    }

    /// Start from an existing state instead of the empty one.
    pub fn with_state(state: StoreState, config: &StoreConfig) -> Self {
        let deriver = ContextDeriver::new(&state);
        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(Core {
                    state: Arc::new(state),
                    queue: ActionQueue::new(config.history_limit),
                    deriver,
                    drainer: None,
                }),
                cycle_done: Condvar::new(),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                events: EventBus::new(config.event_capacity),
            }),
        }
    }

    /// Submit an action and return its sequence number.
    ///
    /// Unless called from a listener, the action and every follow-up it
    /// causes have been applied by the time this returns. From a listener
    /// the action is queued behind the running cycle.
    pub fn dispatch(&self, action: Action) -> u64 {
        let me = thread::current().id();
        let mut core = self.core();
        let seq = core.queue.submit(action);

        if core.drainer == Some(me) {
            trace!(seq, "Dispatch from listener, queued");
            return seq;
        }
        while core.drainer.is_some() {
            trace!(seq, "Waiting for cycle on another thread");
            core = self
                .inner
                .cycle_done
                .wait(core)
                .unwrap_or_else(PoisonError::into_inner);
        }
        core.drainer = Some(me);
        drop(core);

        let _cycle = Cycle { inner: &*self.inner };
        self.drain();
        seq
    }

    fn drain(&self) {
        loop {
            let (record, changed) = {
                let mut core = self.core();
                let Some(record) = core.queue.take_next() else {
                    return;
                };

                let next = reduce(StoreState::clone(&core.state), &record.action);
                for follow_up in reconcile(&next) {
                    let follow_seq = core.queue.submit(follow_up);
                    trace!(seq = record.seq, follow_seq, "Reconciliation queued follow-up");
                }
                core.state = Arc::new(next);
                let state = Arc::clone(&core.state);
                let changed = core.deriver.update(&state);
                core.queue.record_applied(record.clone());
                (record, changed)
            };

            debug!(
                seq = record.seq,
                kind = record.action.kind(),
                context_changed = changed.is_some(),
                "Applied action"
            );
            self.inner.events.emit(StoreEvent::ActionApplied { record });

            if let Some(context) = changed {
                self.notify(&context);
                self.inner.events.emit(StoreEvent::ContextChanged { context });
            }
        }
    }

    fn notify(&self, context: &DerivedContext) {
        // Listeners run without any store lock held so they may dispatch.
        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(context);
        }
    }

    /// Register a listener for context changes.
    ///
    /// The listener is called right away with the current context, then once
    /// per change. It stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DerivedContext) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let current = {
            let core = self.core();
            lock(&self.inner.listeners).push((id, Arc::clone(&listener)));
            core.deriver.current().clone()
        };
        listener(&current);

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Read-only snapshot of the current state.
    pub fn state(&self) -> Arc<StoreState> {
        Arc::clone(&self.core().state)
    }

    /// The context as of the last completed cycle.
    pub fn context(&self) -> DerivedContext {
        self.core().deriver.current().clone()
    }

    /// Applied actions, oldest first.
    pub fn history(&self) -> Vec<ActionRecord> {
        self.core().queue.history()
    }

    /// Receive [`StoreEvent`]s emitted after this call.
    pub fn events(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        lock(&self.inner.core)
    }
}

/// Ends the cycle on drop, including when a listener panics, and wakes
/// dispatchers waiting on other threads.
struct Cycle<'a> {
    inner: &'a Inner,
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        let mut core = lock(&self.inner.core);
        core.drainer = None;
        if thread::panicking() {
            warn!(queued = core.queue.pending_len(), "Listener panicked, dispatch cycle aborted");
        }
        drop(core);
        self.inner.cycle_done.notify_all();
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

// A panicking listener must not poison the store for later dispatches.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
