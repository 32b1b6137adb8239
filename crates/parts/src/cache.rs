//! Memoizing model cache that coalesces concurrent loads per key.
//!
//! Every key moves through `Pending -> Ready` or `Pending -> Failed`. Ready
//! entries live as long as the cache. Failed entries are retried by the next
//! request. While an entry is pending the loader's future is stored in the
//! entry and driven by the oldest waiter; when it settles every waiter is
//! resumed in the order it registered.
//!
//! Loads are never cancelled: dropping a request only detaches that caller.
//! If every caller goes away the load stays parked in its entry and the next
//! request for the key resumes it.

use std::{
    any::Any,
    borrow::Borrow,
    collections::{HashMap, VecDeque},
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll, Waker, ready},
};

use anyhow::anyhow;
use asset::Scene;
use futures_channel::oneshot;
use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::error::LoadError;

/// Opaque identifier of a fetchable model (path, URI, asset id...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Fetches and parses a model for a key.
///
/// `load` runs with the cache unlocked, so both it and the returned future
/// may call back into the cache.
pub trait ResourceLoader {
    fn load(&self, key: ResourceKey) -> BoxFuture<'static, anyhow::Result<Scene>>;
}

impl<F, Fut> ResourceLoader for F
where
    F: Fn(ResourceKey) -> Fut,
    Fut: Future<Output = anyhow::Result<Scene>> + Send + 'static,
{
    fn load(&self, key: ResourceKey) -> BoxFuture<'static, anyhow::Result<Scene>> {
        self(key).boxed()
    }
}

/// Externally visible state of a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Ready,
    Failed,
}

type LoadResult = Result<Arc<Scene>, LoadError>;
type Fetch = BoxFuture<'static, anyhow::Result<Scene>>;

enum Entry {
    Pending(InFlight),
    Ready(Arc<Scene>),
    Failed(LoadError),
}

impl Entry {
    fn state(&self) -> EntryState {
        match self {
            Entry::Pending(_) => EntryState::Pending,
            Entry::Ready(_) => EntryState::Ready,
            Entry::Failed(_) => EntryState::Failed,
        }
    }
}

/// A load in progress and the requesters waiting on it, oldest first.
struct InFlight {
    /// `None` while the loader is building it or the front waiter is polling it.
    fetch: Option<Fetch>,
    queue: VecDeque<Waiter>,
}

struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<LoadResult>,
    waker: Option<Waker>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<ResourceKey, Entry>>,
    tickets: AtomicU64,
}

/// Process-lifetime model cache. Construct once and share it behind an `Arc`.
#[derive(Default)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` to its parsed model, loading it with `loader` only when no
    /// ready or in-flight entry exists.
    ///
    /// The requester registers immediately; the returned future only has to be
    /// polled to receive the result. A ready entry resolves on the first poll.
    /// Waiters on a pending entry resume in the order they registered, and all
    /// of them observe the same `Arc<Scene>` (or the same error).
    pub fn request<L>(&self, key: impl Into<ResourceKey>, loader: &L) -> ResourceRequest
    where
        L: ResourceLoader + ?Sized,
    {
        let key = key.into();
        let ticket = self.inner.tickets.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            ticket,
            tx,
            waker: None,
        };

        let start = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(&key) {
                Some(Entry::Ready(scene)) => {
                    log::debug!("Cache hit for '{key}'");
                    return ResourceRequest::done(Ok(Arc::clone(scene)));
                }
                Some(Entry::Pending(flight)) => {
                    flight.queue.push_back(waiter);
                    log::debug!(
                        "Joining in-flight load of '{key}' ({} waiters)",
                        flight.queue.len()
                    );
                    false
                }
                Some(Entry::Failed(_)) | None => {
                    entries.insert(
                        key.clone(),
                        Entry::Pending(InFlight {
                            fetch: None,
                            queue: VecDeque::from([waiter]),
                        }),
                    );
                    true
                }
            }
        };
        if start {
            self.start_load(&key, loader);
        }

        ResourceRequest {
            state: RequestState::Waiting(Waiting {
                inner: Arc::clone(&self.inner),
                key,
                ticket,
                rx,
            }),
        }
    }

    fn start_load<L>(&self, key: &ResourceKey, loader: &L)
    where
        L: ResourceLoader + ?Sized,
    {
        log::info!("Loading '{key}'");
        let build = AssertUnwindSafe(|| loader.load(key.clone()));
        let fetch: Fetch = match panic::catch_unwind(build) {
            Ok(fetch) => AssertUnwindSafe(fetch)
                .catch_unwind()
                .map(|outcome| outcome.unwrap_or_else(|payload| Err(panicked(payload))))
                .boxed(),
            Err(payload) => future::ready(Err(panicked(payload))).boxed(),
        };
        if let Some(Entry::Pending(flight)) = self.inner.entries.lock().get_mut(key) {
            flight.fetch = Some(fetch);
        }
    }

    /// The cached model for `key`, if its load already succeeded.
    pub fn get(&self, key: &str) -> Option<Arc<Scene>> {
        match self.inner.entries.lock().get(key) {
            Some(Entry::Ready(scene)) => Some(Arc::clone(scene)),
            _ => None,
        }
    }

    pub fn state(&self, key: &str) -> Option<EntryState> {
        self.inner.entries.lock().get(key).map(Entry::state)
    }

    /// The error that moved `key` to `Failed`, until a retry replaces it.
    pub fn last_error(&self, key: &str) -> Option<LoadError> {
        match self.inner.entries.lock().get(key) {
            Some(Entry::Failed(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Live requesters attached to the pending load of `key`; zero once it settles.
    pub fn waiters(&self, key: &str) -> usize {
        match self.inner.entries.lock().get(key) {
            Some(Entry::Pending(flight)) => flight.queue.len(),
            _ => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.inner.entries.lock();
        f.debug_map()
            .entries(entries.iter().map(|(key, entry)| (key.as_str(), entry.state())))
            .finish()
    }
}

/// Future returned by [`ResourceCache::request`].
///
/// Dropping it detaches this requester without cancelling the load.
pub struct ResourceRequest {
    state: RequestState,
}

enum RequestState {
    Done(LoadResult),
    Waiting(Waiting),
}

struct Waiting {
    inner: Arc<Inner>,
    key: ResourceKey,
    ticket: u64,
    rx: oneshot::Receiver<LoadResult>,
}

impl ResourceRequest {
    fn done(result: LoadResult) -> Self {
        Self {
            state: RequestState::Done(result),
        }
    }
}

impl Future for ResourceRequest {
    type Output = LoadResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<LoadResult> {
        let result = match &mut self.state {
            RequestState::Done(result) => return Poll::Ready(result.clone()),
            RequestState::Waiting(waiting) => ready!(waiting.poll_result(cx)),
        };
        self.state = RequestState::Done(result.clone());
        Poll::Ready(result)
    }
}

impl Waiting {
    fn poll_result(&mut self, cx: &mut Context<'_>) -> Poll<LoadResult> {
        if let Poll::Ready(sent) = self.rx.poll_unpin(cx) {
            return Poll::Ready(sent.unwrap_or_else(|_| {
                Err(LoadError::new(
                    self.key.clone(),
                    anyhow!("load was dropped before it settled"),
                ))
            }));
        }

        let Some(mut fetch) = self.take_fetch(cx) else {
            return Poll::Pending;
        };
        match fetch.poll_unpin(cx) {
            Poll::Pending => {
                self.park_fetch(fetch);
                Poll::Pending
            }
            Poll::Ready(loaded) => {
                let result = loaded
                    .map(Arc::new)
                    .map_err(|cause| LoadError::new(self.key.clone(), cause));
                settle(&self.inner, &self.key, &result);
                Poll::Ready(result)
            }
        }
    }

    /// Record this waiter's waker and hand out the fetch if it is first in line.
    fn take_fetch(&self, cx: &Context<'_>) -> Option<Fetch> {
        let mut entries = self.inner.entries.lock();
        let Some(Entry::Pending(flight)) = entries.get_mut(&self.key) else {
            return None;
        };
        let position = flight.queue.iter().position(|w| w.ticket == self.ticket)?;
        flight.queue[position].waker = Some(cx.waker().clone());
        if position == 0 { flight.fetch.take() } else { None }
    }

    fn park_fetch(&self, fetch: Fetch) {
        if let Some(Entry::Pending(flight)) = self.inner.entries.lock().get_mut(&self.key) {
            flight.fetch = Some(fetch);
        }
    }
}

impl Drop for Waiting {
    fn drop(&mut self) {
        let next = {
            let mut entries = self.inner.entries.lock();
            let Some(Entry::Pending(flight)) = entries.get_mut(&self.key) else {
                return;
            };
            let Some(position) = flight.queue.iter().position(|w| w.ticket == self.ticket) else {
                return;
            };
            flight.queue.remove(position);
            log::debug!("Requester detached from '{}'", self.key);
            // The new front has to take over driving the load.
            match position {
                0 => flight.queue.front().and_then(|w| w.waker.clone()),
                _ => None,
            }
        };
        if let Some(waker) = next {
            waker.wake();
        }
    }
}

fn settle(inner: &Inner, key: &ResourceKey, result: &LoadResult) {
    let entry = match result {
        Ok(scene) => {
            log::info!(
                "Loaded '{key}': {} nodes, {} meshes, {} triangles",
                scene.node_count(),
                scene.mesh_count(),
                scene.triangle_count()
            );
            Entry::Ready(Arc::clone(scene))
        }
        Err(err) => {
            log::warn!("{err}");
            Entry::Failed(err.clone())
        }
    };
    let queue = match inner.entries.lock().insert(key.clone(), entry) {
        Some(Entry::Pending(flight)) => flight.queue,
        _ => VecDeque::new(),
    };
    for waiter in queue {
        // A closed receiver belongs to a requester that is being dropped.
        let _ = waiter.tx.send(result.clone());
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow!("loader panicked: {message}")
}
