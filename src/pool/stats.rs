//! Pool statistics snapshots.

/// Totals across all routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Entries currently leased out.
    pub leased: usize,
    /// Callers waiting for capacity.
    pub pending: usize,
    /// Idle entries ready for reuse.
    pub available: usize,
    /// Global capacity.
    pub max: usize,
}

impl PoolStats {
    /// Entries counted against capacity (busy + idle).
    pub fn allocated(&self) -> usize {
        self.leased + self.available
    }
}

/// Counts for a single route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    pub leased: usize,
    pub available: usize,
    /// Effective per-route capacity.
    pub max: usize,
}

impl RouteStats {
    pub fn allocated(&self) -> usize {
        self.leased + self.available
    }
}
