//! Typed handles over the embedded DuckDB dataset file.
//!
//! The dataset lives through two phases with different access shapes:
//!
//! * bootstrap holds a single exclusive [`WriteHandle`] and closes it before
//!   serving starts;
//! * serving holds a [`ReadPool`] that opens the file read-only and hands a
//!   cheap [`ReadSession`] to each request.
//!
//! Sessions only expose query methods, so write statements cannot be issued
//! through the serving path at all, and the engine-level read-only mode
//! backs that up for anything smuggled through SQL text.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use duckdb::{AccessMode, Config as EngineConfig, Connection, Params, Row};
use tracing::debug;

use crate::error::QueryError;

/// Exclusive read-write handle used while (re)building the dataset.
///
/// There is no way to obtain one of these once serving has started; the
/// bootstrap phase owns the only instance and consumes it via [`close`].
///
/// [`close`]: WriteHandle::close
pub struct WriteHandle {
    conn: Connection,
}

impl WriteHandle {
    /// Opens (creating if absent) the dataset file for writing.
    pub fn open(path: &Path) -> duckdb::Result<WriteHandle> {
        let config = EngineConfig::default().access_mode(AccessMode::ReadWrite)?;
        let conn = Connection::open_with_flags(path, config)?;
        Ok(WriteHandle { conn })
    }

    /// Runs one or more `;`-separated statements.
    pub fn execute_batch(&self, sql: &str) -> duckdb::Result<()> {
        self.conn.execute_batch(sql)
    }

    /// Runs a query expected to yield exactly one row.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> duckdb::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> duckdb::Result<T>,
    {
        self.conn.query_row(sql, params, f)
    }

    /// Flushes and closes the handle. The file is safe for readers to open
    /// once this returns.
    pub fn close(self) -> duckdb::Result<()> {
        self.conn.close().map_err(|(_conn, e)| e)
    }
}

/// Read-only access to the dataset for the serving phase.
///
/// The underlying connection is opened lazily on the first session request
/// and retried on later requests if that open failed, so a server started
/// against a dataset that does not exist yet begins serving tiles as soon
/// as the file appears.
pub struct ReadPool {
    path: PathBuf,
    shared: Mutex<Option<Connection>>,
}

impl ReadPool {
    pub fn new(path: PathBuf) -> ReadPool {
        ReadPool {
            path,
            shared: Mutex::new(None),
        }
    }

    /// Checks out a session for one request.
    ///
    /// Sessions are independent clones of one shared read-only connection,
    /// so concurrent requests never contend on a single cursor.
    pub fn session(&self) -> Result<ReadSession, QueryError> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = match &mut *shared {
            Some(conn) => conn,
            empty => {
                debug!(path = %self.path.display(), "opening shared read-only connection");
                empty.insert(Self::open_shared(&self.path)?)
            }
        };
        let session = conn.try_clone()?;
        Ok(ReadSession { conn: session })
    }

    fn open_shared(path: &Path) -> Result<Connection, QueryError> {
        let config = EngineConfig::default().access_mode(AccessMode::ReadOnly)?;
        let conn =
            Connection::open_with_flags(path, config).map_err(|source| QueryError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
        // Spatial functions must be registered on every database instance;
        // loading an installed extension needs no write access.
        conn.execute_batch("LOAD spatial;")?;
        Ok(conn)
    }
}

/// A per-request view of the dataset. Only queries are reachable.
pub struct ReadSession {
    conn: Connection,
}

impl ReadSession {
    /// Runs a query expected to yield exactly one row.
    ///
    /// Returns [`duckdb::Error::QueryReturnedNoRows`] when the statement
    /// yields none, like the underlying engine does.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> duckdb::Result<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> duckdb::Result<T>,
    {
        self.conn.query_row(sql, params, f)
    }
}
