//! The durable, table-oriented local store.

use crate::backend::StorageBackend;
use crate::error::StoreResult;
use crate::file::FileBackend;
use crate::log::{encode_frame, replay, LogCommit, LogOp};
use crate::memory::InMemoryBackend;
use crate::table::TableId;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::Path;

type Image = BTreeMap<(TableId, [u8; 16]), Vec<u8>>;

/// A durable key-value store with logical tables.
///
/// The store keeps its full working set as an in-memory image and appends
/// every committed batch to a commit log before the image is updated. On
/// open, the image is rebuilt by replaying the log; a torn frame at the
/// tail (crash mid-append) is discarded.
///
/// # Atomicity
///
/// All writes go through [`LocalStore::transaction`]. A batch spanning any
/// number of tables is appended as a single log frame, so after a crash
/// either every operation of the batch is visible or none is. This is the
/// property the sync layer relies on to keep a record write and its queue
/// entry inseparable.
///
/// # Concurrency
///
/// Reads take a shared lock on the image; commits serialize on the backend
/// lock (single writer) and apply to the image before releasing it.
pub struct LocalStore {
    backend: Mutex<Box<dyn StorageBackend>>,
    image: RwLock<Image>,
    next_seq: Mutex<u64>,
}

impl LocalStore {
    /// Opens a store backed by a file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or locked, or the
    /// existing log is corrupted.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::with_backend(Box::new(backend))
    }

    /// Opens an ephemeral in-memory store.
    ///
    /// # Errors
    ///
    /// Never fails in practice; kept fallible for interface symmetry.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()))
    }

    /// Opens a store over an arbitrary backend, replaying its log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is corrupted or the backend fails.
    pub fn with_backend(mut backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let replayed = replay(backend.as_ref())?;

        // Drop a torn tail so future appends start on a frame boundary.
        if replayed.valid_len < backend.size()? {
            backend.truncate(replayed.valid_len)?;
        }

        let mut image = Image::new();
        let mut last_seq = 0;
        for commit in &replayed.commits {
            Self::apply_commit(&mut image, commit);
            last_seq = commit.seq;
        }

        Ok(Self {
            backend: Mutex::new(backend),
            image: RwLock::new(image),
            next_seq: Mutex::new(last_seq + 1),
        })
    }

    fn apply_commit(image: &mut Image, commit: &LogCommit) {
        for op in &commit.ops {
            match op {
                LogOp::Put { table, key, value } => {
                    image.insert((*table, *key), value.clone());
                }
                LogOp::Delete { table, key } => {
                    image.remove(&(*table, *key));
                }
            }
        }
    }

    /// Returns the value for a key, if present.
    #[must_use]
    pub fn get(&self, table: TableId, key: [u8; 16]) -> Option<Vec<u8>> {
        self.image.read().get(&(table, key)).cloned()
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, table: TableId, key: [u8; 16]) -> bool {
        self.image.read().contains_key(&(table, key))
    }

    /// Returns a snapshot of all rows in a table, ordered by key.
    ///
    /// The snapshot is not live: concurrent commits do not affect it.
    #[must_use]
    pub fn scan(&self, table: TableId) -> Vec<([u8; 16], Vec<u8>)> {
        self.image
            .read()
            .range((table, [0u8; 16])..=(table, [0xFFu8; 16]))
            .map(|((_, key), value)| (*key, value.clone()))
            .collect()
    }

    /// Returns the number of rows in a table.
    #[must_use]
    pub fn count(&self, table: TableId) -> usize {
        self.image
            .read()
            .range((table, [0u8; 16])..=(table, [0xFFu8; 16]))
            .count()
    }

    /// Executes a function within a write transaction.
    ///
    /// Operations buffered by the closure are committed as one atomic
    /// batch when it returns `Ok`, and discarded entirely when it returns
    /// `Err`. An empty batch commits nothing.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or a storage error if the commit
    /// itself cannot be appended and flushed (in which case no operation
    /// of the batch is applied).
    pub fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> StoreResult<T>,
    {
        let mut txn = StoreTxn {
            store: self,
            ops: Vec::new(),
        };

        let result = f(&mut txn)?;
        let ops = txn.ops;

        if !ops.is_empty() {
            self.commit(ops)?;
        }

        Ok(result)
    }

    /// Inserts or replaces a single value.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be made durable.
    pub fn put(&self, table: TableId, key: [u8; 16], value: Vec<u8>) -> StoreResult<()> {
        self.transaction(|txn| {
            txn.put(table, key, value.clone());
            Ok(())
        })
    }

    /// Removes a single value.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be made durable.
    pub fn delete(&self, table: TableId, key: [u8; 16]) -> StoreResult<()> {
        self.transaction(|txn| {
            txn.delete(table, key);
            Ok(())
        })
    }

    fn commit(&self, ops: Vec<LogOp>) -> StoreResult<()> {
        // Backend lock serializes commits: log order equals seq order.
        let mut backend = self.backend.lock();

        let seq = {
            let mut next = self.next_seq.lock();
            let seq = *next;
            *next += 1;
            seq
        };

        let commit = LogCommit { seq, ops };
        let frame = encode_frame(&commit)?;
        backend.append(&frame)?;
        backend.flush()?;

        let mut image = self.image.write();
        Self::apply_commit(&mut image, &commit);

        Ok(())
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("rows", &self.image.read().len())
            .finish_non_exhaustive()
    }
}

/// A buffered write transaction.
///
/// Reads observe the transaction's own uncommitted writes first, then the
/// committed image.
pub struct StoreTxn<'a> {
    store: &'a LocalStore,
    ops: Vec<LogOp>,
}

impl StoreTxn<'_> {
    /// Buffers an insert-or-replace.
    pub fn put(&mut self, table: TableId, key: [u8; 16], value: Vec<u8>) {
        self.ops.push(LogOp::Put { table, key, value });
    }

    /// Buffers a delete.
    pub fn delete(&mut self, table: TableId, key: [u8; 16]) {
        self.ops.push(LogOp::Delete { table, key });
    }

    /// Reads a key, observing this transaction's buffered writes.
    #[must_use]
    pub fn get(&self, table: TableId, key: [u8; 16]) -> Option<Vec<u8>> {
        for op in self.ops.iter().rev() {
            if op.table() == table && op.key() == key {
                return match op {
                    LogOp::Put { value, .. } => Some(value.clone()),
                    LogOp::Delete { .. } => None,
                };
            }
        }
        self.store.get(table, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use tempfile::tempdir;

    const ACCOUNTS: TableId = TableId::new(1);
    const NOTES: TableId = TableId::new(2);

    fn key(n: u8) -> [u8; 16] {
        [n; 16]
    }

    #[test]
    fn put_get_delete() {
        let store = LocalStore::open_in_memory().unwrap();

        store.put(ACCOUNTS, key(1), vec![10]).unwrap();
        assert_eq!(store.get(ACCOUNTS, key(1)), Some(vec![10]));
        assert!(store.contains(ACCOUNTS, key(1)));

        store.delete(ACCOUNTS, key(1)).unwrap();
        assert_eq!(store.get(ACCOUNTS, key(1)), None);
    }

    #[test]
    fn tables_are_disjoint() {
        let store = LocalStore::open_in_memory().unwrap();

        store.put(ACCOUNTS, key(1), vec![1]).unwrap();
        store.put(NOTES, key(1), vec![2]).unwrap();

        assert_eq!(store.get(ACCOUNTS, key(1)), Some(vec![1]));
        assert_eq!(store.get(NOTES, key(1)), Some(vec![2]));
        assert_eq!(store.count(ACCOUNTS), 1);
    }

    #[test]
    fn scan_is_ordered_and_snapshotted() {
        let store = LocalStore::open_in_memory().unwrap();

        store.put(ACCOUNTS, key(3), vec![3]).unwrap();
        store.put(ACCOUNTS, key(1), vec![1]).unwrap();
        store.put(ACCOUNTS, key(2), vec![2]).unwrap();

        let rows = store.scan(ACCOUNTS);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0, key(1));
        assert_eq!(rows[2].0, key(3));

        // Mutating after the scan does not affect the snapshot
        store.delete(ACCOUNTS, key(1)).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn transaction_commits_across_tables() {
        let store = LocalStore::open_in_memory().unwrap();

        store
            .transaction(|txn| {
                txn.put(ACCOUNTS, key(1), vec![1]);
                txn.put(NOTES, key(2), vec![2]);
                Ok(())
            })
            .unwrap();

        assert!(store.contains(ACCOUNTS, key(1)));
        assert!(store.contains(NOTES, key(2)));
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = LocalStore::open_in_memory().unwrap();

        let result: StoreResult<()> = store.transaction(|txn| {
            txn.put(ACCOUNTS, key(1), vec![1]);
            Err(StoreError::aborted("test"))
        });

        assert!(result.is_err());
        assert!(!store.contains(ACCOUNTS, key(1)));
    }

    #[test]
    fn transaction_reads_its_own_writes() {
        let store = LocalStore::open_in_memory().unwrap();
        store.put(ACCOUNTS, key(1), vec![1]).unwrap();

        store
            .transaction(|txn| {
                assert_eq!(txn.get(ACCOUNTS, key(1)), Some(vec![1]));

                txn.put(ACCOUNTS, key(1), vec![9]);
                assert_eq!(txn.get(ACCOUNTS, key(1)), Some(vec![9]));

                txn.delete(ACCOUNTS, key(1));
                assert_eq!(txn.get(ACCOUNTS, key(1)), None);
                Ok(())
            })
            .unwrap();

        assert_eq!(store.get(ACCOUNTS, key(1)), None);
    }

    #[test]
    fn empty_transaction_commits_nothing() {
        let store = LocalStore::open_in_memory().unwrap();
        store.transaction(|_| Ok(())).unwrap();
        assert_eq!(store.count(ACCOUNTS), 0);
    }

    #[test]
    fn reopen_replays_committed_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tally.tlog");

        {
            let store = LocalStore::open(&path).unwrap();
            store.put(ACCOUNTS, key(1), vec![1]).unwrap();
            store
                .transaction(|txn| {
                    txn.put(ACCOUNTS, key(2), vec![2]);
                    txn.delete(ACCOUNTS, key(1));
                    Ok(())
                })
                .unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.get(ACCOUNTS, key(1)), None);
        assert_eq!(store.get(ACCOUNTS, key(2)), Some(vec![2]));
    }

    #[test]
    fn reopen_discards_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tally.tlog");

        {
            let store = LocalStore::open(&path).unwrap();
            store.put(ACCOUNTS, key(1), vec![1]).unwrap();
            store.put(ACCOUNTS, key(2), vec![2]).unwrap();
        }

        // Simulate a crash mid-append by chopping bytes off the tail
        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap();
        file.set_len(len - 3).unwrap();
        drop(file);

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.get(ACCOUNTS, key(1)), Some(vec![1]));
        assert_eq!(store.get(ACCOUNTS, key(2)), None);

        // The torn tail was truncated away, so new commits replay cleanly
        store.put(ACCOUNTS, key(3), vec![3]).unwrap();
        drop(store);

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.get(ACCOUNTS, key(3)), Some(vec![3]));
    }

    #[test]
    fn commit_seq_resumes_after_reopen() {
        let backend = InMemoryBackend::new();
        let store = LocalStore::with_backend(Box::new(backend)).unwrap();
        store.put(ACCOUNTS, key(1), vec![1]).unwrap();
        store.put(ACCOUNTS, key(2), vec![2]).unwrap();

        // Rebuild a store over the same bytes
        let data = {
            let backend = store.backend.lock();
            let size = backend.size().unwrap();
            backend.read_at(0, size as usize).unwrap()
        };
        drop(store);

        let store = LocalStore::with_backend(Box::new(InMemoryBackend::with_data(data))).unwrap();
        assert_eq!(*store.next_seq.lock(), 3);
    }
}
