//! Strictly bounded, route-keyed connection pool.
//!
//! # Invariants
//! - per route: `leased + available <= max_per_route(route)`
//! - globally: `sum(leased + available) <= max_total`
//! - an idle entry past its expiry is never handed out
//! - only entries this pool leased, and has not yet taken back, are accepted
//!   by `release`
//!
//! All bookkeeping lives behind one mutex; waiters park on a `Notify` and
//! re-check after every release or eviction.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::PoolError;
use crate::events::PoolListener;
use crate::observability::metrics;
use crate::pool::{LeaseGuard, PoolEntry, PoolStats, Route, RouteStats};

/// Entry ids are process-wide so an entry from another pool is never mistaken
/// for one of ours.
static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Per-route bookkeeping.
struct RoutePool<C> {
    /// Ids of entries currently out on lease.
    leased: HashSet<u64>,
    /// Most recently released first.
    available: VecDeque<PoolEntry<C>>,
}

impl<C> Default for RoutePool<C> {
    fn default() -> Self {
        Self {
            leased: HashSet::new(),
            available: VecDeque::new(),
        }
    }
}

impl<C> RoutePool<C> {
    fn allocated(&self) -> usize {
        self.leased.len() + self.available.len()
    }

    fn is_unused(&self) -> bool {
        self.leased.is_empty() && self.available.is_empty()
    }

    /// Drop idle entries matching `pred`, returning how many were removed.
    fn purge(&mut self, mut pred: impl FnMut(&PoolEntry<C>) -> bool) -> usize {
        let before = self.available.len();
        self.available.retain(|entry| !pred(entry));
        before - self.available.len()
    }
}

struct PoolState<C> {
    routes: HashMap<Route, RoutePool<C>>,
    max_per_route: HashMap<Route, usize>,
    leased: usize,
    available: usize,
    closed: bool,
}

impl<C> PoolState<C> {
    /// Evict the least recently used idle entry of any route other than
    /// `except`. Returns false if there is none.
    fn evict_lru_idle(&mut self, except: &Route) -> bool {
        let victim = self
            .routes
            .iter()
            .filter(|(route, _)| *route != except)
            .filter_map(|(route, pool)| pool.available.back().map(|e| (route, e.updated())))
            .min_by_key(|(_, updated)| *updated)
            .map(|(route, _)| route.clone());

        let Some(route) = victim else {
            return false;
        };
        if let Some(pool) = self.routes.get_mut(&route) {
            if let Some(entry) = pool.available.pop_back() {
                tracing::debug!(route = %route, entry_id = entry.id(), "Evicting idle entry to free global capacity");
                self.available -= 1;
            }
            if pool.is_unused() {
                self.routes.remove(&route);
            }
        }
        true
    }

    fn remove_if_unused(&mut self, route: &Route) {
        if self.routes.get(route).is_some_and(RoutePool::is_unused) {
            self.routes.remove(route);
        }
    }
}

struct PoolInner<C> {
    state: Mutex<PoolState<C>>,
    notify: Notify,
    pending: AtomicUsize,
    default_max_per_route: usize,
    max_total: usize,
    time_to_live: Option<Duration>,
    listener: Option<Arc<dyn PoolListener>>,
}

/// Connection pool with hard per-route and global limits.
///
/// Cloning yields another handle to the same pool.
pub struct StrictConnPool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for StrictConnPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for StrictConnPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrictConnPool")
            .field("default_max_per_route", &self.inner.default_max_per_route)
            .field("max_total", &self.inner.max_total)
            .field("time_to_live", &self.inner.time_to_live)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Decrements the pending counter when a waiting lease finishes or is dropped.
struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<C> StrictConnPool<C> {
    /// Create a pool. `time_to_live` of `None` means entries never expire.
    pub fn new(
        default_max_per_route: usize,
        max_total: usize,
        time_to_live: Option<Duration>,
        listener: Option<Arc<dyn PoolListener>>,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    routes: HashMap::new(),
                    max_per_route: HashMap::new(),
                    leased: 0,
                    available: 0,
                    closed: false,
                }),
                notify: Notify::new(),
                pending: AtomicUsize::new(0),
                default_max_per_route,
                max_total,
                time_to_live,
                listener,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<C>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capacity of routes without an override.
    pub fn default_max_per_route(&self) -> usize {
        self.inner.default_max_per_route
    }

    /// Capacity shared by all routes.
    pub fn max_total(&self) -> usize {
        self.inner.max_total
    }

    /// Lifetime of a connection from assignment. `None` never expires.
    pub fn time_to_live(&self) -> Option<Duration> {
        self.inner.time_to_live
    }

    /// Override the capacity of a single route.
    pub fn set_max_per_route(&self, route: &Route, max: usize) {
        self.lock().max_per_route.insert(route.clone(), max);
        self.inner.notify.notify_waiters();
    }

    /// Capacity of `route`, honouring any override.
    pub fn max_per_route(&self, route: &Route) -> usize {
        let state = self.lock();
        self.route_max(&state, route)
    }

    fn route_max(&self, state: &PoolState<C>, route: &Route) -> usize {
        state
            .max_per_route
            .get(route)
            .copied()
            .unwrap_or(self.inner.default_max_per_route)
    }

    /// Lease an entry for `route`, waiting up to `timeout` for capacity.
    ///
    /// The returned entry may or may not carry a connection; a new slot is
    /// handed out unconnected. A `timeout` too large to represent as a
    /// deadline waits until capacity frees up or the pool closes.
    pub async fn lease(&self, route: &Route, timeout: Duration) -> Result<PoolEntry<C>, PoolError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut waiting: Option<PendingGuard<'_>> = None;

        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(entry) = self.attempt(route)? {
                drop(waiting.take());
                return Ok(self.granted(route, entry));
            }

            if waiting.is_none() {
                self.inner.pending.fetch_add(1, Ordering::SeqCst);
                waiting = Some(PendingGuard(&self.inner.pending));
            }

            let timed_out = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, notified).await.is_err(),
                None => {
                    notified.await;
                    false
                }
            };
            if timed_out {
                // Capacity may have been freed right at the deadline.
                if let Some(entry) = self.attempt(route)? {
                    drop(waiting.take());
                    return Ok(self.granted(route, entry));
                }
                metrics::record_lease(route, "exhausted");
                tracing::debug!(route = %route, timeout = ?timeout, "Lease timed out waiting for capacity");
                return Err(PoolError::Exhausted {
                    route: route.clone(),
                    timeout,
                });
            }
        }
    }

    /// [`lease`](Self::lease), wrapped so the entry is released as
    /// non-reusable if the guard is dropped without an explicit release.
    pub async fn lease_guarded(
        &self,
        route: &Route,
        timeout: Duration,
    ) -> Result<LeaseGuard<C>, PoolError> {
        let entry = self.lease(route, timeout).await?;
        Ok(LeaseGuard::new(self.clone(), entry))
    }

    fn attempt(&self, route: &Route) -> Result<Option<PoolEntry<C>>, PoolError> {
        let mut state = self.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        Ok(self.try_lease(&mut state, route))
    }

    fn granted(&self, route: &Route, entry: PoolEntry<C>) -> PoolEntry<C> {
        let stats = self.stats();
        metrics::record_lease(route, if entry.has_connection() { "reused" } else { "new" });
        metrics::record_pool_stats(&stats);
        tracing::trace!(route = %route, entry_id = entry.id(), leased = stats.leased, "Lease granted");
        if let Some(listener) = &self.inner.listener {
            listener.on_lease(route, &stats);
        }
        entry
    }

    /// One non-blocking lease attempt under the lock.
    fn try_lease(&self, state: &mut PoolState<C>, route: &Route) -> Option<PoolEntry<C>> {
        let now = Instant::now();
        let max_route = self.route_max(state, route);
        let pool = state.routes.entry(route.clone()).or_default();

        let expired = pool.purge(|entry| entry.is_expired(now));
        if expired > 0 {
            tracing::debug!(route = %route, expired, "Discarded expired idle entries");
        }
        let reused = pool.available.pop_front();
        let route_allocated = pool.allocated();
        state.available -= expired;

        if let Some(mut entry) = reused {
            entry.touch(now);
            if let Some(pool) = state.routes.get_mut(route) {
                pool.leased.insert(entry.id());
            }
            state.available -= 1;
            state.leased += 1;
            return Some(entry);
        }

        if route_allocated >= max_route {
            state.remove_if_unused(route);
            return None;
        }
        if state.leased + state.available >= self.inner.max_total && !state.evict_lru_idle(route) {
            state.remove_if_unused(route);
            return None;
        }

        let id = NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed);
        if let Some(pool) = state.routes.get_mut(route) {
            pool.leased.insert(id);
        }
        state.leased += 1;
        Some(PoolEntry::new(id, route.clone(), self.inner.time_to_live))
    }

    /// Return a leased entry.
    ///
    /// The entry goes back to the idle set only if `reusable`, it still holds
    /// a connection, it has not expired and the pool is open. Otherwise it is
    /// dropped (closing its connection) and its capacity is freed.
    ///
    /// An entry this pool did not lease, or already took back, is dropped
    /// without touching the bookkeeping.
    pub fn release(&self, mut entry: PoolEntry<C>, reusable: bool) {
        let route = entry.route().clone();
        let now = Instant::now();
        let kept = {
            let mut state = self.lock();
            let owned = state
                .routes
                .get_mut(&route)
                .is_some_and(|pool| pool.leased.remove(&entry.id()));
            if !owned {
                tracing::warn!(route = %route, entry_id = entry.id(), "Released entry does not belong to this pool");
                return;
            }
            state.leased -= 1;

            let keep = reusable && !state.closed && entry.has_connection() && !entry.is_expired(now);
            if keep {
                entry.touch(now);
                if let Some(pool) = state.routes.get_mut(&route) {
                    pool.available.push_front(entry);
                }
                state.available += 1;
            } else {
                state.remove_if_unused(&route);
            }
            keep
        };

        self.inner.notify.notify_waiters();
        let stats = self.stats();
        metrics::record_pool_stats(&stats);
        tracing::trace!(route = %route, kept, leased = stats.leased, available = stats.available, "Entry released");
        if let Some(listener) = &self.inner.listener {
            listener.on_release(&route, kept, &stats);
        }
    }

    /// Drop every idle entry whose expiry has passed. Leased entries are untouched.
    pub fn close_expired(&self) -> usize {
        let now = Instant::now();
        self.close_matching(|entry| entry.is_expired(now))
    }

    /// Drop idle entries that have not been used for `idle_time`.
    pub fn close_idle(&self, idle_time: Duration) -> usize {
        let now = Instant::now();
        self.close_matching(|entry| now.saturating_duration_since(entry.updated()) >= idle_time)
    }

    fn close_matching(&self, mut pred: impl FnMut(&PoolEntry<C>) -> bool) -> usize {
        let removed = {
            let mut state = self.lock();
            let mut removed = 0;
            for pool in state.routes.values_mut() {
                removed += pool.purge(&mut pred);
            }
            state.available -= removed;
            state.routes.retain(|_, pool| !pool.is_unused());
            removed
        };
        if removed > 0 {
            tracing::debug!(removed, "Evicted idle entries");
            self.inner.notify.notify_waiters();
            metrics::record_pool_stats(&self.stats());
        }
        removed
    }

    /// Close the pool: idle entries are dropped, waiters fail with
    /// [`PoolError::Closed`] and entries released afterwards are discarded.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            for pool in state.routes.values_mut() {
                pool.available.clear();
            }
            state.available = 0;
            state.routes.retain(|_, pool| !pool.is_unused());
        }
        self.inner.notify.notify_waiters();
        tracing::debug!("Connection pool closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Snapshot of global usage.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            leased: state.leased,
            pending: self.inner.pending.load(Ordering::SeqCst),
            available: state.available,
            max: self.inner.max_total,
        }
    }

    /// Snapshot of usage for one route.
    pub fn route_stats(&self, route: &Route) -> RouteStats {
        let state = self.lock();
        let max = self.route_max(&state, route);
        state
            .routes
            .get(route)
            .map(|pool| RouteStats {
                leased: pool.leased.len(),
                available: pool.available.len(),
                max,
            })
            .unwrap_or(RouteStats { max, ..RouteStats::default() })
    }

    /// Routes that currently hold leased or idle entries.
    pub fn routes(&self) -> Vec<Route> {
        self.lock().routes.keys().cloned().collect()
    }
}
