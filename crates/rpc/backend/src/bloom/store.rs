//! Key-value stores holding compressed bloom bit vectors.
//!
//! The local indexer writes one compressed vector per bloom bit for every
//! completed section, then advances the stored section count. The embedded
//! topology serves retrieval tasks straight from these stores.

use std::collections::HashMap;
use std::path::Path;

use alloy_primitives::{Bytes, B256};
use parking_lot::{Mutex, RwLock};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};

use super::bitutil::compress_bytes;
use super::generator::{SectionGenerator, BLOOM_BIT_LENGTH};
use super::key::bloom_bits_key;
use crate::error::{BackendError, BackendResult};

/// Storage for compressed bloom bit vectors.
///
/// Reads must be safe to issue concurrently from every retrieval worker.
pub trait BloomBitsStore: Send + Sync {
    /// Compressed vector stored under `key`, if any.
    fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>>;

    /// Number of fully indexed sections.
    fn stored_sections(&self) -> BackendResult<u64>;

    /// Write every vector of a section and set the section count in one step.
    fn put_section(&self, vectors: Vec<(Bytes, Vec<u8>)>, sections: u64) -> BackendResult<()>;
}

/// Compress the vectors of a completed section and commit them.
///
/// `head` is the hash of the section's last block; it is part of every key.
pub fn commit_section<S: BloomBitsStore + ?Sized>(
    store: &S,
    generator: &SectionGenerator,
    section: u64,
    head: B256,
) -> BackendResult<()> {
    let mut vectors = Vec::with_capacity(BLOOM_BIT_LENGTH);
    for bit in 0..BLOOM_BIT_LENGTH {
        let bitset = generator
            .bitset(bit)
            .map_err(|e| BackendError::Store(e.to_string()))?;
        vectors.push((bloom_bits_key(bit as u16, section, head), compress_bytes(bitset)));
    }

    let sections = store.stored_sections()?.max(section.saturating_add(1));
    store.put_section(vectors, sections)?;
    tracing::debug!(section, %head, sections, "Committed bloom section");
    Ok(())
}

/// Bloom bits store kept in process memory.
#[derive(Default)]
pub struct MemoryBloomStore {
    vectors: RwLock<HashMap<Bytes, Vec<u8>>>,
    sections: RwLock<u64>,
}

impl MemoryBloomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }
}

impl BloomBitsStore for MemoryBloomStore {
    fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        Ok(self.vectors.read().get(key).cloned())
    }

    fn stored_sections(&self) -> BackendResult<u64> {
        Ok(*self.sections.read())
    }

    fn put_section(&self, vectors: Vec<(Bytes, Vec<u8>)>, sections: u64) -> BackendResult<()> {
        let mut stored = self.vectors.write();
        stored.extend(vectors);
        *self.sections.write() = sections;
        Ok(())
    }
}

/// Bloom bits store backed by SQLite.
///
/// Uses a connection pool for concurrent reads and a dedicated writer
/// connection for section commits.
pub struct SqliteBloomStore {
    read_pool: Pool<SqliteConnectionManager>,
    writer: Mutex<Connection>,
}

fn configure_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;",
    )
}

impl SqliteBloomStore {
    /// Open or create an on-disk store.
    pub fn open(db_path: impl AsRef<Path>) -> BackendResult<Self> {
        let writer = Connection::open(&db_path)?;
        configure_connection(&writer)?;
        // Create the schema before read-only connections open the file.
        init_schema(&writer)?;

        let manager = SqliteConnectionManager::file(&db_path)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_init(|conn| configure_connection(conn));
        let read_pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| BackendError::Store(e.to_string()))?;

        Ok(Self {
            read_pool,
            writer: Mutex::new(writer),
        })
    }

    /// In-memory store shared by every pooled connection.
    pub fn in_memory() -> BackendResult<Self> {
        let uri = format!("file:bloombits_{}?mode=memory&cache=shared", unique_id());
        let writer = Connection::open(&uri)?;
        configure_connection(&writer)?;
        init_schema(&writer)?;

        let manager =
            SqliteConnectionManager::file(&uri).with_init(|conn| configure_connection(conn));
        let read_pool = Pool::builder()
            .max_size(2)
            .build(manager)
            .map_err(|e| BackendError::Store(e.to_string()))?;

        Ok(Self {
            read_pool,
            writer: Mutex::new(writer),
        })
    }

    fn read_conn(&self) -> BackendResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool
            .get()
            .map_err(|e| BackendError::Store(e.to_string()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bloom_bits (
             key BLOB PRIMARY KEY,
             data BLOB NOT NULL
         );

         CREATE TABLE IF NOT EXISTS metadata (
             key TEXT PRIMARY KEY,
             value INTEGER NOT NULL
         );",
    )
}

fn unique_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

impl BloomBitsStore for SqliteBloomStore {
    fn get(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        let conn = self.read_conn()?;
        let data = conn
            .query_row(
                "SELECT data FROM bloom_bits WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(data)
    }

    fn stored_sections(&self) -> BackendResult<u64> {
        let conn = self.read_conn()?;
        let sections = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'sections'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(sections.map(|n| n as u64).unwrap_or(0))
    }

    fn put_section(&self, vectors: Vec<(Bytes, Vec<u8>)>, sections: u64) -> BackendResult<()> {
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;
        {
            let mut insert =
                tx.prepare_cached("INSERT OR REPLACE INTO bloom_bits (key, data) VALUES (?1, ?2)")?;
            for (key, data) in &vectors {
                insert.execute(params![key.as_ref(), data])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('sections', ?1)",
            params![sections as i64],
        )?;
        tx.commit()?;
        Ok(())
    }
}
