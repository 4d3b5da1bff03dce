//! SQLite storage layer for plenum

mod migrations;
mod parse;
mod resolutions;
mod sessions;
mod votes;

use std::path::Path;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::Result;

pub use resolutions::ResolutionStore;
pub use sessions::SessionStore;
pub use votes::VoteStore;

pub(crate) use parse::is_unique_violation;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get session store
    pub fn sessions(&self) -> SessionStore<'_> {
        SessionStore::new(&self.conn)
    }

    /// Get resolution store
    pub fn resolutions(&self) -> ResolutionStore<'_> {
        ResolutionStore::new(&self.conn)
    }

    /// Get vote store
    pub fn votes(&self) -> VoteStore<'_> {
        VoteStore::new(&self.conn)
    }

    /// Run `f` inside a single transaction.
    ///
    /// Commits when `f` returns Ok, rolls back when it errors. Stores built
    /// over the supplied connection all share the transaction.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
