//! Bounded SQLite connection pool

use chargeflow_core::{ChargeError, ChargeResult};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A bounded pool of SQLite connections.
///
/// At most `max_size` connections exist at once; `min_idle` of them are
/// opened eagerly so construction fails fast when the database is
/// unusable. Acquisition waits on a semaphore permit when the pool is
/// exhausted, bounded by the acquire timeout.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    path: PathBuf,
    busy_timeout: Duration,
    max_size: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    /// Open a pool against the database at `path`, creating the file if
    /// needed. Fails when the database cannot be opened or configured.
    pub fn open(
        path: &Path,
        min_idle: usize,
        max_size: usize,
        busy_timeout: Duration,
        acquire_timeout: Duration,
    ) -> ChargeResult<Self> {
        if min_idle == 0 || max_size == 0 || min_idle > max_size {
            return Err(ChargeError::pool(format!(
                "Invalid pool bounds: min_idle={}, max_size={}",
                min_idle, max_size
            )));
        }

        let inner = PoolInner {
            path: path.to_path_buf(),
            busy_timeout,
            max_size,
            permits: Arc::new(Semaphore::new(max_size)),
            idle: Mutex::new(Vec::with_capacity(max_size)),
            acquire_timeout,
        };

        {
            let mut idle = inner.idle.lock();
            for _ in 0..min_idle {
                idle.push(inner.open_connection()?);
            }
        }
        debug!(
            "Opened connection pool on {} (min_idle={}, max_size={})",
            path.display(),
            min_idle,
            max_size
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Acquire a connection, waiting for a free slot when the pool is
    /// exhausted. The returned guard puts the connection back on drop.
    pub async fn acquire(&self) -> ChargeResult<PooledConnection> {
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| ChargeError::Timeout {
            timeout_ms: self.inner.acquire_timeout.as_millis() as u64,
        })?
        .map_err(|_| ChargeError::pool("Connection pool is closed".to_string()))?;

        let reused = self.inner.idle.lock().pop();
        let connection = match reused {
            Some(conn) => conn,
            None => self.inner.open_connection()?,
        };

        Ok(PooledConnection {
            connection: Some(connection),
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    /// Connections currently available without waiting
    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Configured maximum pool size
    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }
}

impl PoolInner {
    fn open_connection(&self) -> ChargeResult<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| ChargeError::pool(format!("Failed to open {}: {}", self.path.display(), e)))?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }
}

/// RAII guard over a pooled connection. Dropping the guard returns the
/// connection to the idle set and releases the pool slot, on every exit
/// path.
#[derive(Debug)]
pub struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Some until Drop takes it; the guard cannot be used after drop
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.pool.idle.lock().push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(max_size: usize) -> (tempfile::TempDir, ConnectionPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(
            &dir.path().join("pool_test.db"),
            1,
            max_size,
            Duration::from_millis(500),
            Duration::from_millis(100),
        )
        .unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_acquire_and_release_restores_capacity() {
        let (_dir, pool) = test_pool(3);
        assert_eq!(pool.available_permits(), 3);

        let guard = pool.acquire().await.unwrap();
        assert_eq!(pool.available_permits(), 2);
        guard.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        drop(guard);

        assert_eq!(pool.available_permits(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out_until_released() {
        let (_dir, pool) = test_pool(2);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err.category(), "timeout");

        drop(first);
        let third = pool.acquire().await.unwrap();
        drop(third);
        drop(second);
        assert_eq!(pool.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_connection_returned_after_failed_query() {
        let (_dir, pool) = test_pool(1);

        {
            let guard = pool.acquire().await.unwrap();
            let result = guard.execute_batch("SELECT * FROM missing_table");
            assert!(result.is_err());
        }

        // The guard drop returned the slot even though the query failed
        let guard = pool.acquire().await.unwrap();
        drop(guard);
        assert_eq!(pool.available_permits(), 1);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounds.db");
        assert!(ConnectionPool::open(
            &path,
            0,
            5,
            Duration::from_millis(100),
            Duration::from_millis(100)
        )
        .is_err());
        assert!(ConnectionPool::open(
            &path,
            6,
            5,
            Duration::from_millis(100),
            Duration::from_millis(100)
        )
        .is_err());
    }
}
