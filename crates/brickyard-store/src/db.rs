//! Database handle and transaction plumbing.
//!
//! One table per entity kind, keyed by the entity id's string form, values
//! serialized with bincode. [`Db::view`] and [`Db::update`] wrap a whole
//! closure in one transaction; [`Db::read_tx`] and [`Db::write_tx`] hand the
//! transaction out for flows that must suspend while it is open (the
//! placement engine pulls from the allocator stream mid-transaction).

use std::path::Path;
use std::sync::Arc;

use brickyard_core::error::{Error, Result};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// The shape every entity table shares: id string to bincode bytes.
pub type EntityTable = TableDefinition<'static, &'static str, &'static [u8]>;

pub(crate) const CLUSTERS: EntityTable = TableDefinition::new("clusters");
pub(crate) const NODES: EntityTable = TableDefinition::new("nodes");
pub(crate) const DEVICES: EntityTable = TableDefinition::new("devices");
pub(crate) const BRICKS: EntityTable = TableDefinition::new("bricks");
pub(crate) const VOLUMES: EntityTable = TableDefinition::new("volumes");
pub(crate) const BLOCK_VOLUMES: EntityTable = TableDefinition::new("block_volumes");
pub(crate) const PENDING_OPS: EntityTable = TableDefinition::new("pending_ops");

const ALL_TABLES: [EntityTable; 7] =
    [CLUSTERS, NODES, DEVICES, BRICKS, VOLUMES, BLOCK_VOLUMES, PENDING_OPS];

/// Convert any error with Display to our Error type.
pub(crate) fn db_err(e: impl std::fmt::Display) -> Error {
    Error::Database(e.to_string())
}

/// Handle on the registry database. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Database>,
}

impl Db {
    /// Open or create the registry database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        debug!(?path, "opening registry database");
        let db = Database::create(path).map_err(db_err)?;
        Self::init(db)
    }

    /// Open an in-memory registry, used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(db_err)?;
        Self::init(db)
    }

    // Tables must exist before any read transaction touches them.
    fn init(db: Database) -> Result<Self> {
        let txn = db.begin_write().map_err(db_err)?;
        for table in ALL_TABLES {
            let _ = txn.open_table(table).map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;
        Ok(Self { inner: Arc::new(db) })
    }

    /// Begin a read-only view transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub fn read_tx(&self) -> Result<ReadTx> {
        Ok(ReadTx(self.inner.begin_read().map_err(db_err)?))
    }

    /// Begin a read-write transaction. Blocks while another writer is
    /// active; dropping the transaction without [`WriteTx::commit`] aborts
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub fn write_tx(&self) -> Result<WriteTx> {
        Ok(WriteTx(self.inner.begin_write().map_err(db_err)?))
    }

    /// Runs `f` inside a read-only view transaction.
    ///
    /// # Errors
    ///
    /// Propagates transaction setup failures and errors from `f`.
    pub fn view<T>(&self, f: impl FnOnce(&ReadTx) -> Result<T>) -> Result<T> {
        let tx = self.read_tx()?;
        f(&tx)
    }

    /// Runs `f` inside a write transaction, committing when `f` succeeds
    /// and aborting when it fails.
    ///
    /// # Errors
    ///
    /// Propagates transaction setup and commit failures and errors from `f`.
    pub fn update<T>(&self, f: impl FnOnce(&WriteTx) -> Result<T>) -> Result<T> {
        let tx = self.write_tx()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

/// Read access shared by view and update transactions.
///
/// Update transactions observe their own uncommitted writes, which the
/// replace-brick reconcile path relies on.
pub trait Reader {
    /// Fetches the raw value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn get_bytes(&self, table: EntityTable, key: &str) -> Result<Option<Vec<u8>>>;

    /// Lists every key of `table` in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn keys(&self, table: EntityTable) -> Result<Vec<String>>;

    /// Lists every `(key, value)` pair of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be read.
    fn entries(&self, table: EntityTable) -> Result<Vec<(String, Vec<u8>)>>;
}

/// A read-only view transaction.
pub struct ReadTx(ReadTransaction);

impl Reader for ReadTx {
    fn get_bytes(&self, table: EntityTable, key: &str) -> Result<Option<Vec<u8>>> {
        let table = self.0.open_table(table).map_err(db_err)?;
        let value = table.get(key).map_err(db_err)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn keys(&self, table: EntityTable) -> Result<Vec<String>> {
        let table = self.0.open_table(table).map_err(db_err)?;
        collect_keys(&table)
    }

    fn entries(&self, table: EntityTable) -> Result<Vec<(String, Vec<u8>)>> {
        let table = self.0.open_table(table).map_err(db_err)?;
        collect_entries(&table)
    }
}

/// A read-write transaction.
pub struct WriteTx(WriteTransaction);

impl WriteTx {
    pub(crate) fn put_bytes(&self, table: EntityTable, key: &str, value: &[u8]) -> Result<()> {
        let mut table = self.0.open_table(table).map_err(db_err)?;
        table.insert(key, value).map_err(db_err)?;
        Ok(())
    }

    pub(crate) fn remove(&self, table: EntityTable, key: &str) -> Result<()> {
        let mut table = self.0.open_table(table).map_err(db_err)?;
        table.remove(key).map_err(db_err)?;
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the transaction is rolled back.
    pub fn commit(self) -> Result<()> {
        self.0.commit().map_err(db_err)
    }
}

impl Reader for WriteTx {
    fn get_bytes(&self, table: EntityTable, key: &str) -> Result<Option<Vec<u8>>> {
        let table = self.0.open_table(table).map_err(db_err)?;
        let value = table.get(key).map_err(db_err)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn keys(&self, table: EntityTable) -> Result<Vec<String>> {
        let table = self.0.open_table(table).map_err(db_err)?;
        collect_keys(&table)
    }

    fn entries(&self, table: EntityTable) -> Result<Vec<(String, Vec<u8>)>> {
        let table = self.0.open_table(table).map_err(db_err)?;
        collect_entries(&table)
    }
}

fn collect_keys(table: &impl ReadableTable<&'static str, &'static [u8]>) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for item in table.iter().map_err(db_err)? {
        let (key, _) = item.map_err(db_err)?;
        out.push(key.value().to_string());
    }
    Ok(out)
}

fn collect_entries(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    for item in table.iter().map_err(db_err)? {
        let (key, value) = item.map_err(db_err)?;
        out.push((key.value().to_string(), value.value().to_vec()));
    }
    Ok(out)
}

/// Loads and decodes the entry stored under `key`, if any.
pub(crate) fn load_entry<T: DeserializeOwned>(
    tx: &impl Reader,
    table: EntityTable,
    key: &str,
) -> Result<Option<T>> {
    match tx.get_bytes(table, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(db_err)?)),
        None => Ok(None),
    }
}

/// Loads the entry stored under `key`, failing with `NotFound` when absent.
pub(crate) fn require_entry<T: DeserializeOwned>(
    tx: &impl Reader,
    table: EntityTable,
    key: &str,
) -> Result<T> {
    load_entry(tx, table, key)?.ok_or(Error::NotFound)
}

/// Encodes and stores `value` under `key`.
pub(crate) fn store_entry<T: Serialize>(
    tx: &WriteTx,
    table: EntityTable,
    key: &str,
    value: &T,
) -> Result<()> {
    let bytes = bincode::serialize(value).map_err(db_err)?;
    tx.put_bytes(table, key, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_commits_and_view_reads() {
        let db = Db::open_in_memory().unwrap();
        db.update(|tx| tx.put_bytes(CLUSTERS, "a", b"payload")).unwrap();

        let got = db.view(|tx| tx.get_bytes(CLUSTERS, "a")).unwrap();
        assert_eq!(got.as_deref(), Some(&b"payload"[..]));
    }

    #[test]
    fn test_failed_update_aborts() {
        let db = Db::open_in_memory().unwrap();
        let result: Result<()> = db.update(|tx| {
            tx.put_bytes(CLUSTERS, "a", b"payload")?;
            Err(Error::NoSpace)
        });
        assert!(matches!(result, Err(Error::NoSpace)));

        let got = db.view(|tx| tx.get_bytes(CLUSTERS, "a")).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_write_tx_reads_its_own_writes() {
        let db = Db::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        tx.put_bytes(BRICKS, "b", b"v").unwrap();
        assert_eq!(tx.get_bytes(BRICKS, "b").unwrap().as_deref(), Some(&b"v"[..]));
        tx.commit().unwrap();
    }

    #[test]
    fn test_keys_are_sorted() {
        let db = Db::open_in_memory().unwrap();
        db.update(|tx| {
            tx.put_bytes(NODES, "b", b"1")?;
            tx.put_bytes(NODES, "a", b"2")?;
            tx.put_bytes(NODES, "c", b"3")
        })
        .unwrap();
        let keys = db.view(|tx| tx.keys(NODES)).unwrap();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        {
            let db = Db::open(&path).unwrap();
            db.update(|tx| tx.put_bytes(VOLUMES, "v", b"1")).unwrap();
        }
        let db = Db::open(&path).unwrap();
        let got = db.view(|tx| tx.get_bytes(VOLUMES, "v")).unwrap();
        assert_eq!(got.as_deref(), Some(&b"1"[..]));
    }
}
