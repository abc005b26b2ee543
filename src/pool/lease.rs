//! RAII wrapper around a leased pool entry.

use std::fmt;

use crate::pool::{PoolEntry, StrictConnPool};

/// A leased entry that goes back to its pool exactly once.
///
/// [`release`](Self::release) hands the entry back with the caller's reuse
/// decision. If the guard is dropped first (an error path, or the owning
/// future being cancelled mid-exchange) the entry is released as
/// non-reusable, closing its connection and freeing the slot.
pub struct LeaseGuard<C> {
    pool: StrictConnPool<C>,
    entry: Option<PoolEntry<C>>,
}

impl<C> LeaseGuard<C> {
    pub(crate) fn new(pool: StrictConnPool<C>, entry: PoolEntry<C>) -> Self {
        Self {
            pool,
            entry: Some(entry),
        }
    }

    /// Get the leased entry.
    pub fn entry(&self) -> &PoolEntry<C> {
        match self.entry.as_ref() {
            Some(entry) => entry,
            None => unreachable!("lease guard entry taken before drop"),
        }
    }

    /// Get the leased entry mutably.
    pub fn entry_mut(&mut self) -> &mut PoolEntry<C> {
        match self.entry.as_mut() {
            Some(entry) => entry,
            None => unreachable!("lease guard entry taken before drop"),
        }
    }

    /// Return the entry to the pool.
    pub fn release(mut self, reusable: bool) {
        if let Some(entry) = self.entry.take() {
            self.pool.release(entry, reusable);
        }
    }
}

impl<C> Drop for LeaseGuard<C> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            tracing::debug!(entry_id = entry.id(), route = %entry.route(), "Lease dropped without release");
            self.pool.release(entry, false);
        }
    }
}

impl<C> fmt::Debug for LeaseGuard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseGuard").field("entry", &self.entry).finish()
    }
}
