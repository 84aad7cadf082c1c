//! Keyed observable memoization
//!
//! [`ObservableCache::get`] hands out a [`SharedStream`] per key. The first
//! request for a key calls the factory; everyone else asking for that key
//! shares the same lazily-started upstream future and sees the same result.
//!
//! # Entry lifecycle
//!
//! - **In flight**: the cache holds only a weak handle. Each `SharedStream`
//!   is a strong one, so the subscriber count is the refcount. If every
//!   subscriber goes away before the fetch resolves, the upstream future is
//!   dropped (cancelled) and the next `get` starts over.
//! - **Resolved Ok**: the value is kept until [`invalidate`] or [`clear`].
//! - **Resolved Err**: the entry is removed, so the next `get` retries
//!   instead of replaying the failure.
//!
//! [`invalidate`]: ObservableCache::invalidate
//! [`clear`]: ObservableCache::clear

pub mod key;

pub use key::{AuthInfoKey, BlobKey, UserKey};

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::{self, BoxFuture, FutureExt, Shared, WeakShared};
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, trace};

use crate::error::FetchError;

type Upstream<T> = BoxFuture<'static, Result<T, FetchError>>;

/// What a subscriber observes: at most one `Loading`, then one `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission<T> {
    Loading,
    Done(Result<T, FetchError>),
}

/// Multicast handle on one cache entry's result.
///
/// Cloning adds a subscriber; dropping removes one.
pub struct SharedStream<T: Clone> {
    fetch: Shared<Upstream<T>>,
}

impl<T> Clone for SharedStream<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch.clone(),
        }
    }
}

impl<T> SharedStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_upstream(upstream: Upstream<T>) -> Self {
        Self {
            fetch: upstream.shared(),
        }
    }

    fn settled(result: Result<T, FetchError>) -> Self {
        let stream = Self::from_upstream(future::ready(result).boxed());
        // Poll the ready future once so `peek` sees the value immediately.
        let _ = stream.fetch.clone().now_or_never();
        stream
    }

    /// A stream that is already resolved to `value`.
    pub fn resolved(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// A stream that is already failed; never cached.
    pub fn failed(error: FetchError) -> Self {
        Self::settled(Err(error))
    }

    /// Wait for the terminal result.
    pub async fn value(&self) -> Result<T, FetchError> {
        self.fetch.clone().await
    }

    /// The terminal result, if it has arrived.
    pub fn peek(&self) -> Option<Result<T, FetchError>> {
        self.fetch.peek().cloned()
    }

    pub fn is_resolved(&self) -> bool {
        self.fetch.peek().is_some()
    }

    /// Observe as a stream: `Loading` (unless already resolved), then `Done`.
    pub fn into_stream(self) -> impl Stream<Item = Emission<T>> + Send {
        let loading = if self.is_resolved() {
            None
        } else {
            Some(Emission::Loading)
        };
        stream::iter(loading).chain(stream::once(self.fetch.map(Emission::Done)))
    }
}

impl<T> SharedStream<T>
where
    T: Clone,
{
    /// True when both handles observe the same upstream fetch.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.fetch.ptr_eq(&other.fetch)
    }
}

enum Slot<T: Clone> {
    InFlight {
        generation: u64,
        fetch: WeakShared<Upstream<T>>,
    },
    Resolved(T),
}

struct Entries<K, T: Clone> {
    slots: HashMap<K, Slot<T>>,
    next_generation: u64,
}

/// Map from key to shared, replaying fetch results.
pub struct ObservableCache<K, T: Clone> {
    name: &'static str,
    entries: Arc<Mutex<Entries<K, T>>>,
}

impl<K, T: Clone> Clone for ObservableCache<K, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, T> ObservableCache<K, T>
where
    K: Eq + Hash + Clone + Display + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// `name` only labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(Entries {
                slots: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Shared stream for `key`, calling `factory` only if no live entry exists.
    ///
    /// `factory` runs under the cache lock and must only build the future;
    /// the future itself does not start until a subscriber polls it.
    pub fn get<F, Fut>(&self, key: K, factory: F) -> SharedStream<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let mut entries = lock(&self.entries);

        match entries.slots.get(&key) {
            Some(Slot::Resolved(value)) => {
                trace!(cache = self.name, key = %key, "Cache hit");
                return SharedStream::resolved(value.clone());
            }
            Some(Slot::InFlight { fetch, .. }) => {
                if let Some(fetch) = fetch.upgrade() {
                    trace!(cache = self.name, key = %key, "Joined in-flight fetch");
                    return SharedStream { fetch };
                }
                debug!(cache = self.name, key = %key, "Previous fetch was abandoned, refetching");
            }
            None => {}
        }
        let pruned = prune_abandoned(&mut entries.slots);
        if pruned > 0 {
            trace!(cache = self.name, pruned, "Pruned abandoned fetches");
        }

        let generation = entries.next_generation;
        entries.next_generation += 1;
        debug!(cache = self.name, key = %key, generation, "Cache miss, starting fetch");

        let upstream = factory();
        let settle_to: Weak<Mutex<Entries<K, T>>> = Arc::downgrade(&self.entries);
        let settle_key = key.clone();
        let name = self.name;
        let fetch: Upstream<T> = async move {
            let result = upstream.await;
            if let Some(entries) = settle_to.upgrade() {
                settle(name, &entries, settle_key, generation, &result);
            }
            result
        }
        .boxed();

        let stream = SharedStream::from_upstream(fetch);
        if let Some(weak) = stream.fetch.downgrade() {
            entries.slots.insert(key, Slot::InFlight { generation, fetch: weak });
        }
        stream
    }

    /// Drop the entry for `key`. Subscribers already holding a stream keep it.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = lock(&self.entries).slots.remove(key).is_some();
        if removed {
            debug!(cache = self.name, key = %key, "Invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        lock(&self.entries).slots.clear();
    }

    /// Whether `key` has a resolved value or a fetch someone still waits on.
    pub fn contains(&self, key: &K) -> bool {
        match lock(&self.entries).slots.get(key) {
            Some(Slot::Resolved(_)) => true,
            Some(Slot::InFlight { fetch, .. }) => fetch.upgrade().is_some(),
            None => false,
        }
    }

    /// Live subscribers on an in-flight fetch for `key`.
    pub fn subscriber_count(&self, key: &K) -> usize {
        match lock(&self.entries).slots.get(key) {
            Some(Slot::InFlight { fetch, .. }) => fetch
                .upgrade()
                .and_then(|shared| shared.strong_count())
                // the upgrade itself holds one
                .map(|count| count.saturating_sub(1))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// The cached value for `key`, if resolved successfully.
    pub fn cached(&self, key: &K) -> Option<T> {
        match lock(&self.entries).slots.get(key) {
            Some(Slot::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut entries = lock(&self.entries);
        prune_abandoned(&mut entries.slots);
        entries.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop in-flight slots whose every subscriber has gone. Returns how many.
fn prune_abandoned<K, T>(slots: &mut HashMap<K, Slot<T>>) -> usize
where
    K: Eq + Hash,
    T: Clone,
{
    let before = slots.len();
    slots.retain(|_, slot| match slot {
        Slot::Resolved(_) => true,
        Slot::InFlight { fetch, .. } => fetch.upgrade().is_some(),
    });
    before - slots.len()
}

fn settle<K, T>(
    name: &'static str,
    entries: &Mutex<Entries<K, T>>,
    key: K,
    generation: u64,
    result: &Result<T, FetchError>,
) where
    K: Eq + Hash + Display,
    T: Clone,
{
    let mut entries = lock(entries);
    let current = matches!(
        entries.slots.get(&key),
        Some(Slot::InFlight { generation: g, .. }) if *g == generation
    );
    if !current {
        // invalidated or replaced while in flight
        trace!(cache = name, key = %key, generation, "Dropping result of superseded fetch");
        return;
    }

    match result {
        Ok(value) => {
            debug!(cache = name, key = %key, "Fetch resolved, caching");
            entries.slots.insert(key, Slot::Resolved(value.clone()));
        }
        Err(error) => {
            debug!(cache = name, key = %key, error = %error, "Fetch failed, evicting");
            entries.slots.remove(&key);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
