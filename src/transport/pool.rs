//! Bounded, keyed connection pool.
//!
//! A semaphore bounds how many connections may be on loan at once; callers past the bound
//! wait for a release. Idle connections are kept per `scheme://host:port` key, capped per
//! host and evicted once they have sat unused for longer than the idle timeout. A loaned
//! connection goes back to the idle list only through [`Pooled::release`]; dropping it
//! closes it instead.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Error;

/// A connection the pool can judge for reuse.
pub(crate) trait Poolable: Send + 'static {
    fn is_open(&self) -> bool;
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct PoolConfig {
    pub(crate) max_connections: usize,
    pub(crate) max_idle_per_host: usize,
    pub(crate) idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 64,
            max_idle_per_host: 16,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Snapshot of pool counters.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections opened since the pool was created.
    pub connections_created: u64,
    /// Checkouts served from the idle list.
    pub connections_reused: u64,
    /// Connections closed instead of being returned.
    pub connections_closed: u64,
    /// Connections currently idle.
    pub idle: usize,
    /// Connections currently on loan.
    pub in_use: usize,
}

struct Idle<C> {
    conn: C,
    since: Instant,
}

struct PoolInner<C> {
    config: PoolConfig,
    permits: Arc<Semaphore>,
    idle: Mutex<HashMap<String, Vec<Idle<C>>>>,
    created: AtomicU64,
    reused: AtomicU64,
    closed: AtomicU64,
    in_use: AtomicUsize,
}

pub(crate) struct Pool<C> {
    inner: Arc<PoolInner<C>>,
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Result of a checkout: either an idle connection or a reserved slot to fill.
pub(crate) enum Checkout<C: Poolable> {
    Reused(Pooled<C>),
    Vacant(Vacancy<C>),
}

impl<C: Poolable> Pool<C> {
    pub(crate) fn new(config: PoolConfig) -> Self {
        let max = config.max_connections.max(1);
        Self {
            inner: Arc::new(PoolInner {
                config,
                permits: Arc::new(Semaphore::new(max)),
                idle: Mutex::new(HashMap::new()),
                created: AtomicU64::new(0),
                reused: AtomicU64::new(0),
                closed: AtomicU64::new(0),
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits for a free slot, then hands out an idle connection for `key` if one is usable.
    pub(crate) async fn checkout(&self, key: &str) -> Result<Checkout<C>, Error> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::transport("connection pool closed", None))?;
        self.inner.in_use.fetch_add(1, Ordering::Relaxed);

        let lease = Lease {
            pool: Arc::clone(&self.inner),
            key: key.to_string(),
            state: LeaseState::Vacant,
            _permit: permit,
        };

        match self.take_idle(key) {
            Some(conn) => {
                self.inner.reused.fetch_add(1, Ordering::Relaxed);
                let mut lease = lease;
                lease.state = LeaseState::Open;
                Ok(Checkout::Reused(Pooled { conn, lease }))
            }
            None => Ok(Checkout::Vacant(Vacancy { lease })),
        }
    }

    fn take_idle(&self, key: &str) -> Option<C> {
        let mut evicted = Vec::new();
        let found = {
            let mut idle = self.inner.idle.lock();
            let list = idle.get_mut(key)?;
            let mut found = None;
            while let Some(entry) = list.pop() {
                if entry.since.elapsed() <= self.inner.config.idle_timeout && entry.conn.is_open()
                {
                    found = Some(entry.conn);
                    break;
                }
                evicted.push(entry.conn);
            }
            if list.is_empty() {
                idle.remove(key);
            }
            found
        };

        if !evicted.is_empty() {
            self.inner
                .closed
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(pool = key, evicted = evicted.len(), "evicted idle connections");
        }
        found
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let idle = self.inner.idle.lock().values().map(Vec::len).sum();
        PoolStats {
            connections_created: self.inner.created.load(Ordering::Relaxed),
            connections_reused: self.inner.reused.load(Ordering::Relaxed),
            connections_closed: self.inner.closed.load(Ordering::Relaxed),
            idle,
            in_use: self.inner.in_use.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LeaseState {
    Vacant,
    Open,
    Returned,
}

/// Accounting for one permit; settles the counters when dropped.
struct Lease<C> {
    pool: Arc<PoolInner<C>>,
    key: String,
    state: LeaseState,
    _permit: OwnedSemaphorePermit,
}

impl<C> Drop for Lease<C> {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(1, Ordering::Relaxed);
        if self.state == LeaseState::Open {
            self.pool.closed.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(pool = %self.key, "closing connection");
        }
    }
}

/// A reserved slot with no connection yet.
pub(crate) struct Vacancy<C: Poolable> {
    lease: Lease<C>,
}

impl<C: Poolable> Vacancy<C> {
    pub(crate) fn key(&self) -> &str {
        &self.lease.key
    }

    pub(crate) fn fill(mut self, conn: C) -> Pooled<C> {
        self.lease.pool.created.fetch_add(1, Ordering::Relaxed);
        self.lease.state = LeaseState::Open;
        Pooled {
            conn,
            lease: self.lease,
        }
    }
}

/// A connection on loan to one operation.
pub(crate) struct Pooled<C: Poolable> {
    conn: C,
    lease: Lease<C>,
}

impl<C: Poolable> Pooled<C> {
    pub(crate) fn get_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Returns the connection to the idle list, or closes it if it cannot be reused.
    pub(crate) fn release(self) {
        let Pooled { conn, mut lease } = self;
        if !conn.is_open() {
            return;
        }

        let pool = Arc::clone(&lease.pool);
        let mut idle = pool.idle.lock();
        let list = idle.entry(lease.key.clone()).or_default();
        if list.len() >= pool.config.max_idle_per_host {
            return;
        }
        list.push(Idle {
            conn,
            since: Instant::now(),
        });
        lease.state = LeaseState::Returned;
        #[cfg(feature = "tracing")]
        tracing::debug!(pool = %lease.key, idle = list.len(), "connection returned to pool");
    }
}
