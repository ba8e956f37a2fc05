//! Test fixtures and harnesses.
//!
//! Provides convenience constructors for stores, records, and a wired
//! synchronizer-plus-remote pair, so tests across the workspace set up
//! the same way.

use std::path::PathBuf;
use std::sync::Arc;
use tally_core::{
    Budget, BudgetAllocation, Category, DayStamp, Goal, OwnerId, Preference, Record,
    RecurringRule, Transaction,
};
use tally_store::LocalStore;
use tally_sync::{MemoryRemote, Mutation, RemoteBackend, SyncConfig, Synchronizer};
use tempfile::TempDir;

/// A local store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Arc<LocalStore>,
    /// The backing file, if file-based.
    path: Option<PathBuf>,
    /// Kept alive so the directory outlives the store.
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory test store.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            store: Arc::new(LocalStore::open_in_memory().expect("open in-memory store")),
            path: None,
            _temp_dir: None,
        }
    }

    /// Creates a file-based test store in a temporary directory.
    #[must_use]
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("create temp directory");
        let path = temp_dir.path().join("tally.tlog");
        let store = Arc::new(LocalStore::open(&path).expect("open file store"));

        Self {
            store,
            path: Some(path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store path if file-based.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Simulates a restart: drops the store and reopens the same file.
    ///
    /// # Panics
    ///
    /// Panics on an in-memory store, or if other `Arc` clones of the
    /// store are still alive.
    #[must_use]
    pub fn reopen(self) -> Self {
        let path = self.path.clone().expect("reopen requires a file store");
        drop(
            Arc::try_unwrap(self.store)
                .expect("store still shared; drop other handles before reopen"),
        );

        Self {
            store: Arc::new(LocalStore::open(&path).expect("reopen file store")),
            path: Some(path),
            _temp_dir: self._temp_dir,
        }
    }
}

/// A synchronizer wired to an in-process remote, for end-to-end tests.
pub struct SyncHarness {
    /// The engine under test.
    pub sync: Synchronizer,
    /// The in-process remote backend, for fault injection and
    /// assertions.
    pub remote: Arc<MemoryRemote>,
    /// The owner everything is scoped to.
    pub owner: OwnerId,
    /// The local store underneath the engine.
    pub store: Arc<LocalStore>,
}

impl SyncHarness {
    /// Creates a harness over an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(
            LocalStore::open_in_memory().expect("open in-memory store"),
        ))
    }

    /// Creates a harness over the given store.
    #[must_use]
    pub fn with_store(store: Arc<LocalStore>) -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let owner = OwnerId::new();
        let sync = Synchronizer::new(
            Arc::clone(&store),
            Arc::clone(&remote) as Arc<dyn RemoteBackend>,
            SyncConfig::new(owner),
        );

        Self {
            sync,
            remote,
            owner,
            store,
        }
    }

    /// Creates a harness sharing this one's remote, as a second device
    /// of the same owner.
    #[must_use]
    pub fn second_device(&self) -> Self {
        let store = Arc::new(LocalStore::open_in_memory().expect("open in-memory store"));
        let sync = Synchronizer::new(
            Arc::clone(&store),
            Arc::clone(&self.remote) as Arc<dyn RemoteBackend>,
            SyncConfig::new(self.owner),
        );

        Self {
            sync,
            remote: Arc::clone(&self.remote),
            owner: self.owner,
            store,
        }
    }

    /// Creates a transaction record through the engine, returning it.
    ///
    /// # Panics
    ///
    /// Panics if the mutation fails.
    pub fn create_transaction(&self, amount_minor: i64) -> Record {
        self.sync
            .mutate(Mutation::create(Transaction::new(
                self.owner,
                amount_minor,
                DayStamp::from_days(20_000),
            )))
            .expect("mutate")
            .expect("create returns the record")
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample record builders, one per kind.
pub mod records {
    use super::*;

    /// A spending transaction.
    #[must_use]
    pub fn transaction(owner: OwnerId) -> Record {
        Transaction::new(owner, -1250, DayStamp::from_days(20_000))
            .with_memo("coffee")
            .into()
    }

    /// A category.
    #[must_use]
    pub fn category(owner: OwnerId) -> Record {
        Category::new(owner, "Groceries").into()
    }

    /// A monthly budget.
    #[must_use]
    pub fn budget(owner: OwnerId) -> Record {
        Budget::new(owner, "August", DayStamp::from_days(20_000), 31).into()
    }

    /// An allocation inside [`budget`] for [`category`].
    #[must_use]
    pub fn budget_allocation(owner: OwnerId) -> Record {
        BudgetAllocation::new(
            owner,
            tally_core::RecordId::new(),
            tally_core::RecordId::new(),
            40_000,
        )
        .into()
    }

    /// A savings goal.
    #[must_use]
    pub fn goal(owner: OwnerId) -> Record {
        Goal::new(owner, "Emergency fund", 500_000).into()
    }

    /// A monthly recurring rule.
    #[must_use]
    pub fn recurring_rule(owner: OwnerId) -> Record {
        RecurringRule::new(owner, -4999, 30, DayStamp::from_days(20_010)).into()
    }

    /// A currency preference.
    #[must_use]
    pub fn preference(owner: OwnerId) -> Record {
        Preference::new(owner, "currency", "EUR").into()
    }

    /// One record of every kind.
    #[must_use]
    pub fn one_of_each(owner: OwnerId) -> Vec<Record> {
        vec![
            transaction(owner),
            category(owner),
            budget(owner),
            budget_allocation(owner),
            goal(owner),
            recurring_rule(owner),
            preference(owner),
        ]
    }
}
