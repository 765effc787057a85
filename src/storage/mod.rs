//! Storage layer for local budgets
//!
//! Provides JSON file storage with atomic writes. Each budget directory is
//! opened as a [`Storage`], which holds every repository in memory.

pub mod accounts;
pub mod budget;
pub mod categories;
pub mod file_io;
pub mod init;
pub mod payees;
pub mod rules;
pub mod transactions;

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use accounts::{AccountData, AccountRepository};
pub use budget::{BudgetData, BudgetRepository};
pub use categories::{CategoryData, CategoryRepository};
pub use file_io::{read_json, read_json_required, write_json_atomic};
pub use init::{create_budget, install_snapshot};
pub use payees::{PayeeData, PayeeRepository};
pub use rules::{RuleData, RuleRepository};
pub use transactions::{TransactionData, TransactionRepository};

use crate::config::paths::BudgetPaths;
use crate::error::EnvelopeResult;
use crate::models::BudgetMetadata;

use file_io::{read_lock, write_lock};

/// The full contents of a budget, as exchanged with a sync server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub accounts: AccountData,
    pub transactions: TransactionData,
    pub categories: CategoryData,
    pub payees: PayeeData,
    pub rules: RuleData,
    pub budget: BudgetData,
}

/// Main storage coordinator that provides access to all repositories
///
/// Callers that may run concurrently go through [`Storage::read`] and
/// [`Storage::write`], so a change is never observed or saved half-applied.
pub struct Storage {
    paths: BudgetPaths,
    gate: RwLock<()>,
    metadata: RwLock<BudgetMetadata>,
    pub accounts: AccountRepository,
    pub transactions: TransactionRepository,
    pub categories: CategoryRepository,
    pub payees: PayeeRepository,
    pub rules: RuleRepository,
    pub budget: BudgetRepository,
}

impl Storage {
    /// Open an existing budget directory and load all data
    pub fn open(paths: BudgetPaths) -> EnvelopeResult<Self> {
        let metadata: BudgetMetadata = read_json_required(paths.metadata_file())?;

        let storage = Self {
            accounts: AccountRepository::new(paths.accounts_file()),
            transactions: TransactionRepository::new(paths.transactions_file()),
            categories: CategoryRepository::new(paths.categories_file()),
            payees: PayeeRepository::new(paths.payees_file()),
            rules: RuleRepository::new(paths.rules_file()),
            budget: BudgetRepository::new(paths.budget_file()),
            gate: RwLock::new(()),
            metadata: RwLock::new(metadata),
            paths,
        };
        storage.load_all()?;
        Ok(storage)
    }

    /// Get the paths of this budget
    pub fn paths(&self) -> &BudgetPaths {
        &self.paths
    }

    /// Get a copy of the budget metadata
    pub fn metadata(&self) -> EnvelopeResult<BudgetMetadata> {
        Ok(read_lock(&self.metadata)?.clone())
    }

    /// Modify the budget metadata and persist it
    pub fn update_metadata(&self, f: impl FnOnce(&mut BudgetMetadata)) -> EnvelopeResult<()> {
        let mut metadata = write_lock(&self.metadata)?;
        f(&mut metadata);
        write_json_atomic(self.paths.metadata_file(), &*metadata)
    }

    /// Run a read-only operation while no change is in progress
    pub fn read<T>(&self, f: impl FnOnce(&Self) -> EnvelopeResult<T>) -> EnvelopeResult<T> {
        let _gate = read_lock(&self.gate)?;
        f(self)
    }

    /// Run a change with exclusive access
    ///
    /// Changes save what they touch before returning, so on error the
    /// in-memory state is reloaded from disk and nothing of the failed
    /// change is kept.
    pub fn write<T>(&self, f: impl FnOnce(&Self) -> EnvelopeResult<T>) -> EnvelopeResult<T> {
        let _gate = write_lock(&self.gate)?;
        let result = f(self);
        if let Err(e) = &result {
            warn!(error = %e, "Change failed; reloading budget from disk");
            if let Err(reload) = self.load_all() {
                warn!(error = %reload, "Could not reload budget");
            }
        }
        result
    }

    /// Load all data from disk, discarding in-memory changes
    pub fn load_all(&self) -> EnvelopeResult<()> {
        self.accounts.load()?;
        self.transactions.load()?;
        self.categories.load()?;
        self.payees.load()?;
        self.rules.load()?;
        self.budget.load()?;
        Ok(())
    }

    /// Save all data to disk
    pub fn save_all(&self) -> EnvelopeResult<()> {
        self.accounts.save()?;
        self.transactions.save()?;
        self.categories.save()?;
        self.payees.save()?;
        self.rules.save()?;
        self.budget.save()?;
        Ok(())
    }

    /// Capture the full budget contents
    pub fn snapshot(&self) -> EnvelopeResult<BudgetSnapshot> {
        Ok(BudgetSnapshot {
            accounts: self.accounts.snapshot()?,
            transactions: self.transactions.snapshot()?,
            categories: self.categories.snapshot()?,
            payees: self.payees.snapshot()?,
            rules: self.rules.snapshot()?,
            budget: self.budget.snapshot()?,
        })
    }
}
