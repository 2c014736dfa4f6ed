// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::Semaphore;
use tourcrm_core::{Clock, SystemClock};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::schema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub max_connections: usize,
    pub busy_timeout: Duration,
    pub password_iterations: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_millis(5_000),
            password_iterations: 100_000,
        }
    }
}

/// Handle on one SQLite database file with a bounded set of reusable
/// connections. Blocking work runs on the tokio blocking pool.
pub struct SqliteStore {
    path: PathBuf,
    cfg: StoreConfig,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
}

/// Execution context handed to store operations.
pub struct Ctx<'a> {
    pub clock: &'a dyn Clock,
    pub cfg: &'a StoreConfig,
}

impl SqliteStore {
    /// Opens (creating if needed) the database and applies pending migrations.
    pub fn open(path: &Path, cfg: StoreConfig) -> Result<Self, StoreError> {
        Self::open_with_clock(path, cfg, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: &Path,
        cfg: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        if cfg.max_connections == 0 {
            return Err(StoreError::Pool("max_connections must be > 0".to_string()));
        }
        let store = Self {
            path: path.to_path_buf(),
            permits: Arc::new(Semaphore::new(cfg.max_connections)),
            idle: Mutex::new(Vec::with_capacity(cfg.max_connections)),
            cfg,
            clock,
        };
        let mut conn = store.connect()?;
        let applied = schema::migrate(&mut conn, store.clock.as_ref())?;
        info!(path = %store.path.display(), applied, "store opened");
        store.checkin(conn);
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.cfg.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA synchronous=NORMAL; PRAGMA temp_store=MEMORY;",
        )?;
        conn.set_prepared_statement_cache_capacity(64);
        debug!(path = %self.path.display(), "sqlite connection opened");
        Ok(conn)
    }

    fn checkout(&self) -> Result<Connection, StoreError> {
        let pooled = self
            .idle
            .lock()
            .map_err(|_| StoreError::Pool("connection pool lock poisoned".to_string()))?
            .pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => self.connect(),
        }
    }

    fn checkin(&self, conn: Connection) {
        if !conn.is_autocommit() {
            warn!("dropping connection left inside a transaction");
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.cfg.max_connections {
                idle.push(conn);
            }
        }
    }

    /// Runs `op` on a pooled connection without leaving the calling thread.
    pub fn call_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection, &Ctx<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.checkout()?;
        let ctx = Ctx {
            clock: self.clock.as_ref(),
            cfg: &self.cfg,
        };
        let out = op(&mut conn, &ctx);
        self.checkin(conn);
        out
    }

    /// Runs `op` on the blocking pool, holding one of `max_connections` permits.
    pub async fn call<T, F>(self: &Arc<Self>, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &Ctx<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            store.call_blocking(op)
        })
        .await
        .map_err(|e| StoreError::Pool(format!("blocking task failed: {e}")))?
    }

    /// Runs `op` inside one transaction: every write it makes, audit rows
    /// included, commits together or not at all. Store operations nest as
    /// savepoints.
    pub fn transact_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection, &Ctx<'_>) -> Result<T, StoreError>,
    {
        self.call_blocking(|conn, ctx| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            let out = op(conn, ctx).and_then(|value| {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            });
            if out.is_err() && !conn.is_autocommit() {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    warn!(error = %e, "rollback failed");
                }
            }
            out
        })
    }

    /// [`SqliteStore::transact_blocking`] on the blocking pool.
    pub async fn transact<T, F>(self: &Arc<Self>, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &Ctx<'_>) -> Result<T, StoreError> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            store.transact_blocking(op)
        })
        .await
        .map_err(|e| StoreError::Pool(format!("blocking task failed: {e}")))?
    }

    /// Cheap liveness probe used by readiness checks.
    pub async fn ping(self: &Arc<Self>) -> Result<(), StoreError> {
        self.call(|conn, _| {
            conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
