//! Pool entry: one slot of the pool, optionally holding a live connection.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::pool::Route;

/// A single pooled connection endpoint.
///
/// A freshly leased entry has no connection; the caller connects and calls
/// [`assign_connection`](Self::assign_connection). The entry counts against
/// route and global capacity from the moment it is leased, connected or not.
pub struct PoolEntry<C> {
    id: u64,
    route: Route,
    time_to_live: Option<Duration>,
    created: Instant,
    updated: Instant,
    expiry: Option<Instant>,
    connection: Option<C>,
}

impl<C> PoolEntry<C> {
    pub(crate) fn new(id: u64, route: Route, time_to_live: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            id,
            route,
            time_to_live,
            created: now,
            updated: now,
            expiry: None,
            connection: None,
        }
    }

    /// Identifier, unique across every pool in the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Route this entry was leased for.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// When the current connection was assigned.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Last time the entry was leased, released or had its expiry updated.
    pub fn updated(&self) -> Instant {
        self.updated
    }

    /// Point after which the idle entry is discarded. `None` never expires.
    pub fn expiry(&self) -> Option<Instant> {
        self.expiry
    }

    /// Whether a connection is attached.
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Get the attached connection, if any.
    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    /// Get the attached connection mutably, if any.
    pub fn connection_mut(&mut self) -> Option<&mut C> {
        self.connection.as_mut()
    }

    /// Attach a newly opened connection. Resets the age of the entry.
    ///
    /// A TTL too large to represent as an instant never expires.
    pub fn assign_connection(&mut self, connection: C) {
        let now = Instant::now();
        self.connection = Some(connection);
        self.created = now;
        self.updated = now;
        self.expiry = self.time_to_live.and_then(|ttl| now.checked_add(ttl));
    }

    /// Detach and return the connection, keeping the slot leased.
    pub fn discard_connection(&mut self) -> Option<C> {
        self.expiry = None;
        self.connection.take()
    }

    /// Shorten the expiry to `now + keep_alive`, never past `created + ttl`.
    ///
    /// `None` means the peer imposed no limit; only the TTL applies. Either
    /// bound past the representable range of [`Instant`] is ignored.
    pub fn update_expiry(&mut self, keep_alive: Option<Duration>) {
        let now = Instant::now();
        self.updated = now;
        let deadline = self.time_to_live.and_then(|ttl| self.created.checked_add(ttl));
        let requested = keep_alive.and_then(|ka| now.checked_add(ka));
        self.expiry = match (deadline, requested) {
            (Some(d), Some(r)) => Some(d.min(r)),
            (d, r) => d.or(r),
        };
    }

    /// Whether the expiry has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.updated = now;
    }
}

impl<C> fmt::Debug for PoolEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("route", &self.route)
            .field("connected", &self.connection.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Scheme;

    fn route() -> Route {
        Route::new(Scheme::Http, "localhost", 8080)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_counts_from_assignment() {
        let mut entry: PoolEntry<&str> = PoolEntry::new(1, route(), Some(Duration::from_millis(100)));
        assert!(entry.expiry().is_none());

        tokio::time::advance(Duration::from_millis(500)).await;
        entry.assign_connection("conn");
        assert!(!entry.is_expired(Instant::now()));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(entry.is_expired(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_never_extends_past_ttl() {
        let mut entry: PoolEntry<&str> = PoolEntry::new(1, route(), Some(Duration::from_secs(10)));
        entry.assign_connection("conn");
        let deadline = entry.expiry().unwrap();

        entry.update_expiry(Some(Duration::from_secs(60)));
        assert_eq!(entry.expiry(), Some(deadline));

        entry.update_expiry(Some(Duration::from_secs(2)));
        assert!(entry.expiry().unwrap() < deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ttl_never_expires() {
        let mut entry: PoolEntry<&str> = PoolEntry::new(1, route(), None);
        entry.assign_connection("conn");
        tokio::time::advance(Duration::from_secs(86_400)).await;
        assert!(!entry.is_expired(Instant::now()));

        assert_eq!(entry.discard_connection(), Some("conn"));
        assert!(!entry.has_connection());
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let mut entry: PoolEntry<&str> = PoolEntry::new(1, route(), Some(Duration::MAX));
        entry.assign_connection("conn");
        assert_eq!(entry.expiry(), None);

        entry.update_expiry(Some(Duration::from_secs(5)));
        assert!(entry.expiry().is_some());
        assert!(!entry.is_expired(Instant::now()));
    }

    #[tokio::test]
    async fn test_huge_keep_alive_keeps_ttl_deadline() {
        let mut entry: PoolEntry<&str> = PoolEntry::new(1, route(), Some(Duration::from_secs(10)));
        entry.assign_connection("conn");
        let deadline = entry.expiry();

        entry.update_expiry(Some(Duration::MAX));
        assert_eq!(entry.expiry(), deadline);

        let mut unbounded: PoolEntry<&str> = PoolEntry::new(2, route(), None);
        unbounded.assign_connection("conn");
        unbounded.update_expiry(Some(Duration::from_secs(u64::MAX)));
        assert_eq!(unbounded.expiry(), None);
    }
}
