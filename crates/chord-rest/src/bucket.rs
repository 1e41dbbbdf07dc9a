//! Rate-limit buckets
//!
//! A bucket holds the platform's view of one rate limit (limit, remaining,
//! reset) plus the FIFO queue of requests waiting on it. Buckets start under a
//! provisional key derived from the route; when a response names the bucket
//! hash the table re-keys the bucket, merging queues if another provisional
//! bucket already resolved to the same hash.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::headers::RateLimitHeaders;
use crate::route::Route;

/// Whether the head of a bucket may run now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was reserved
    Ready,
    /// Exhausted until the window resets
    Wait(Duration),
}

/// Point-in-time view of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<Instant>,
    pub queued: usize,
    pub running: bool,
}

#[derive(Debug)]
struct BucketState<T> {
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    queue: VecDeque<T>,
    /// An executor task owns this bucket
    running: bool,
    last_used: Instant,
}

/// One rate-limit bucket and its pending queue
#[derive(Debug)]
pub struct Bucket<T> {
    key: String,
    state: Mutex<BucketState<T>>,
}

impl<T> Bucket<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Mutex::new(BucketState {
                limit: None,
                remaining: None,
                reset_at: None,
                queue: VecDeque::new(),
                running: false,
                last_used: Instant::now(),
            }),
        }
    }

    /// The key the bucket was created under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Queue at the back; `true` means no executor owns the bucket and the
    /// caller must start one
    pub fn push_back(&self, item: T) -> bool {
        let mut state = self.state.lock();
        state.queue.push_back(item);
        state.last_used = Instant::now();
        claim(&mut state)
    }

    /// Queue at the head, for replays; same return as [`Bucket::push_back`]
    pub fn push_front(&self, item: T) -> bool {
        let mut state = self.state.lock();
        state.queue.push_front(item);
        state.last_used = Instant::now();
        claim(&mut state)
    }

    /// Append several items keeping their order
    pub fn extend(&self, items: Vec<T>) -> bool {
        if items.is_empty() {
            return false;
        }
        let mut state = self.state.lock();
        state.queue.extend(items);
        state.last_used = Instant::now();
        claim(&mut state)
    }

    /// Next item for the executor; releases ownership when empty
    pub fn next(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = state.queue.pop_front();
        if item.is_none() {
            state.running = false;
        }
        item
    }

    /// Take every queued item
    pub fn drain(&self) -> Vec<T> {
        self.state.lock().queue.drain(..).collect()
    }

    /// Reserve a slot for the head request, or report how long to wait
    ///
    /// An unknown window admits the request as a probe.
    pub fn admit(&self, now: Instant) -> Admission {
        let mut state = self.state.lock();
        state.last_used = now;

        if state.reset_at.is_some_and(|reset| reset <= now) {
            state.remaining = state.limit;
            state.reset_at = None;
        }

        match (state.remaining, state.reset_at) {
            (Some(0), Some(reset)) => Admission::Wait(reset - now),
            (Some(remaining), _) if remaining > 0 => {
                state.remaining = Some(remaining - 1);
                Admission::Ready
            }
            _ => Admission::Ready,
        }
    }

    /// Take the platform's window as authoritative
    pub fn update(&self, headers: &RateLimitHeaders, now: Instant) {
        if !headers.has_window() {
            return;
        }
        let mut state = self.state.lock();
        if headers.limit.is_some() {
            state.limit = headers.limit;
        }
        state.remaining = headers.remaining;
        state.reset_at = headers.reset_after.map(|after| now + after);
        state.last_used = now;
    }

    /// Mark exhausted until `until`, after a 429
    pub fn exhaust(&self, until: Instant) {
        let mut state = self.state.lock();
        state.remaining = Some(0);
        state.reset_at = Some(state.reset_at.map_or(until, |reset| reset.max(until)));
    }

    /// Unused, empty and not owned by an executor for at least `idle`
    pub fn is_idle(&self, now: Instant, idle: Duration) -> bool {
        let state = self.state.lock();
        !state.running && state.queue.is_empty() && now.duration_since(state.last_used) >= idle
    }

    pub fn snapshot(&self) -> BucketSnapshot {
        let state = self.state.lock();
        BucketSnapshot {
            limit: state.limit,
            remaining: state.remaining,
            reset_at: state.reset_at,
            queued: state.queue.len(),
            running: state.running,
        }
    }
}

fn claim<T>(state: &mut BucketState<T>) -> bool {
    if state.running {
        false
    } else {
        state.running = true;
        true
    }
}

/// Where a request's bucket lives after reconciliation
#[derive(Debug)]
pub struct Reconciled<T> {
    pub bucket: Arc<Bucket<T>>,
    /// The bucket received queued work and has no executor
    pub needs_executor: bool,
}

/// Bucket key to bucket, plus learned route-to-hash mappings
#[derive(Debug)]
pub struct BucketTable<T> {
    buckets: DashMap<String, Arc<Bucket<T>>>,
    hashes: DashMap<String, String>,
}

impl<T> Default for BucketTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BucketTable<T> {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            hashes: DashMap::new(),
        }
    }

    /// Current key for a route: reconciled if its hash is known
    pub fn resolve_key(&self, route: &Route) -> String {
        match self.hashes.get(&route.bucket_route()) {
            Some(hash) => route.bucket_key(&hash),
            None => route.provisional_key(),
        }
    }

    /// Get or create the bucket for a key
    pub fn bucket(&self, key: &str) -> Arc<Bucket<T>> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(&bucket);
        }
        Arc::clone(
            &self
                .buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Bucket::new(key))),
        )
    }

    /// Queue an item on the bucket for `key`, creating it if needed
    ///
    /// The push happens under the map entry, so [`BucketTable::prune`] cannot
    /// drop the bucket between lookup and push. The flag has the meaning of
    /// [`Bucket::push_back`].
    pub fn enqueue(&self, key: &str, item: T) -> (Arc<Bucket<T>>, bool) {
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Bucket::new(key)));
        let claimed = entry.push_back(item);
        (Arc::clone(entry.value()), claimed)
    }

    /// Learn the bucket hash for a route and re-key `current`
    ///
    /// If the hashed key is free, `current` is registered under it. If another
    /// bucket already owns it, `current`'s queue moves there and `current`'s key
    /// is pointed at the owner. A request in flight on `current` finishes there.
    pub fn reconcile(&self, current: &Arc<Bucket<T>>, route: &Route, hash: &str) -> Reconciled<T> {
        let target_key = route.bucket_key(hash);
        self.hashes.insert(route.bucket_route(), hash.to_string());

        let owner = Arc::clone(
            &self
                .buckets
                .entry(target_key.clone())
                .or_insert_with(|| Arc::clone(current)),
        );

        if Arc::ptr_eq(&owner, current) {
            return Reconciled {
                bucket: owner,
                needs_executor: false,
            };
        }

        let moved = current.drain();
        let count = moved.len();
        let needs_executor = owner.extend(moved);
        self.buckets
            .insert(current.key().to_string(), Arc::clone(&owner));

        tracing::debug!(
            from = %current.key(),
            to = %target_key,
            moved = count,
            "Buckets coalesced"
        );

        Reconciled {
            bucket: owner,
            needs_executor,
        }
    }

    /// Remove buckets that have been idle for `idle`
    pub fn prune(&self, now: Instant, idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle(now, idle));
        before.saturating_sub(self.buckets.len())
    }

    /// Every distinct bucket
    pub fn buckets(&self) -> Vec<Arc<Bucket<T>>> {
        let mut all: Vec<Arc<Bucket<T>>> = Vec::new();
        for entry in &self.buckets {
            if !all.iter().any(|known| Arc::ptr_eq(known, entry.value())) {
                all.push(Arc::clone(entry.value()));
            }
        }
        all
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
