//! Periodic pool housekeeping.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lifecycle::ShutdownSignal;
use crate::pool::StrictConnPool;

/// Evict expired idle entries every `interval` until `signal` fires.
pub fn spawn_pool_maintenance<C>(
    pool: StrictConnPool<C>,
    interval: Duration,
    mut signal: ShutdownSignal,
) -> JoinHandle<()>
where
    C: Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = signal.recv() => break,
                _ = ticker.tick() => {
                    let closed = pool.close_expired();
                    if closed > 0 {
                        tracing::debug!(closed, "Evicted expired connections");
                    }
                }
            }
        }
        tracing::debug!("Pool maintenance stopped");
    })
}
