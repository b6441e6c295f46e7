//! A persistent, keyed, expiring blob store for raw API response bodies,
//! backed by a single sqlite file. Exclusively owned by the [`crate::scan::Scanner`]
//! for the lifetime of the process.

use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::errors::ScanError;
use crate::request::Request;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS api_responses (
    id TEXT PRIMARY KEY,
    body BLOB NOT NULL,
    stored_at_epoch INTEGER NOT NULL,
    expires_at_epoch INTEGER NOT NULL
);
";

/// A response body retrieved from storage, with the timestamp it was written.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    /// Raw bytes exactly as persisted by a prior `store` call.
    pub body: Vec<u8>,
    /// Wall-clock time the entry was written.
    pub stored_at: OffsetDateTime,
}

/// Keyed, expiring persistence for raw API response bodies.
///
/// All operations are internally synchronized against a single exclusive
/// lock, so concurrent scanner workers never observe a torn row. `rusqlite`'s
/// `Connection` is `Send` but not `Sync`, so even reads take the lock.
pub trait ResponseStorage: Send + Sync {
    /// Upserts `body` for `request`, keyed by [`Request::identity`], replacing
    /// any prior value and recomputing `stored_at`/`expires_at` from `lifespan`.
    fn store(&self, request: &Request, body: &[u8], lifespan: Duration) -> Result<(), ScanError>;

    /// Looks up the response for `request`. Returns [`ScanError::NotFound`] when
    /// no entry exists, or when one exists but has expired (unless the storage
    /// was opened in no-expire/offline mode).
    fn get(&self, request: &Request) -> Result<StoredResponse, ScanError>;

    /// Removes all entries whose `expires_at` has passed, returning the count removed.
    fn clean(&self) -> Result<usize, ScanError>;
}

/// A sqlite-backed [`ResponseStorage`]. `:memory:` is a valid path for tests.
pub struct SqliteStorage {
    connection: Mutex<Connection>,
    no_expire: bool,
}

impl SqliteStorage {
    /// Opens (or creates) the sqlite file at `path`. When `no_expire` is set,
    /// [`ResponseStorage::get`] ignores `expires_at` entirely — the low-level
    /// switch offline mode composes into its caller-facing `offline` flag.
    pub fn open(path: &str, no_expire: bool) -> Result<Self, ScanError> {
        let connection = Connection::open(path)?;
        connection.execute_batch(INIT_SQL)?;
        Ok(Self {
            connection: Mutex::new(connection),
            no_expire,
        })
    }
}

impl ResponseStorage for SqliteStorage {
    fn store(&self, request: &Request, body: &[u8], lifespan: Duration) -> Result<(), ScanError> {
        let connection = self
            .connection
            .lock()
            .expect("sqlite storage lock poisoned");
        let stored_at = OffsetDateTime::now_utc();
        let expires_at = stored_at + lifespan;
        connection.execute(
            "INSERT OR REPLACE INTO api_responses (id, body, stored_at_epoch, expires_at_epoch) VALUES (?1, ?2, ?3, ?4)",
            params![
                request.identity(),
                body,
                stored_at.unix_timestamp(),
                expires_at.unix_timestamp(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, request: &Request) -> Result<StoredResponse, ScanError> {
        let connection = self
            .connection
            .lock()
            .expect("sqlite storage lock poisoned");
        let row: Option<(Vec<u8>, i64, i64)> = connection
            .query_row(
                "SELECT body, stored_at_epoch, expires_at_epoch FROM api_responses WHERE id = ?1",
                params![request.identity()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((body, stored_at_epoch, expires_at_epoch)) = row else {
            return Err(ScanError::NotFound);
        };

        if !self.no_expire && expires_at_epoch < OffsetDateTime::now_utc().unix_timestamp() {
            return Err(ScanError::NotFound);
        }

        let stored_at = OffsetDateTime::from_unix_timestamp(stored_at_epoch)
            .map_err(|e| ScanError::CorruptStoredResponse(e.to_string()))?;

        Ok(StoredResponse { body, stored_at })
    }

    fn clean(&self) -> Result<usize, ScanError> {
        let connection = self
            .connection
            .lock()
            .expect("sqlite storage lock poisoned");
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let removed = connection.execute(
            "DELETE FROM api_responses WHERE expires_at_epoch < ?1",
            params![now],
        )?;
        Ok(removed)
    }
}
