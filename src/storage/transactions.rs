//! Transaction repository for JSON storage
//!
//! Manages loading and saving transactions to transactions.json, with
//! in-memory indexes by account and by category.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeResult;
use crate::models::{AccountId, CategoryId, Transaction, TransactionId};

use super::file_io::{read_json, read_lock, write_json_atomic, write_lock};

/// Serializable transaction data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionData {
    pub transactions: Vec<Transaction>,
}

#[derive(Default)]
struct Indexed {
    data: HashMap<TransactionId, Transaction>,
    by_account: HashMap<AccountId, Vec<TransactionId>>,
    by_category: HashMap<CategoryId, Vec<TransactionId>>,
}

impl Indexed {
    fn index(&mut self, txn: &Transaction) {
        self.by_account.entry(txn.account_id).or_default().push(txn.id);
        for category_id in txn.category_ids() {
            self.by_category.entry(category_id).or_default().push(txn.id);
        }
    }

    fn unindex(&mut self, txn: &Transaction) {
        if let Some(ids) = self.by_account.get_mut(&txn.account_id) {
            ids.retain(|&id| id != txn.id);
        }
        for category_id in txn.category_ids() {
            if let Some(ids) = self.by_category.get_mut(&category_id) {
                ids.retain(|&id| id != txn.id);
            }
        }
    }

    fn collect(&self, ids: Option<&Vec<TransactionId>>) -> Vec<Transaction> {
        let mut transactions: Vec<_> = ids
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.data.get(id).cloned())
            .collect();
        sort_newest_first(&mut transactions);
        transactions
    }
}

fn sort_newest_first(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
}

/// Repository for transaction persistence with indexing
pub struct TransactionRepository {
    path: PathBuf,
    inner: RwLock<Indexed>,
}

impl TransactionRepository {
    /// Create a new transaction repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            inner: RwLock::new(Indexed::default()),
        }
    }

    /// Load transactions from disk and build indexes
    pub fn load(&self) -> EnvelopeResult<()> {
        let file_data: TransactionData = read_json(&self.path)?;
        self.replace_all(file_data)
    }

    /// Save transactions to disk
    pub fn save(&self) -> EnvelopeResult<()> {
        write_json_atomic(&self.path, &self.snapshot()?)
    }

    /// Current contents, newest first
    pub fn snapshot(&self) -> EnvelopeResult<TransactionData> {
        Ok(TransactionData {
            transactions: self.get_all()?,
        })
    }

    /// Replace the in-memory contents and rebuild indexes
    pub fn replace_all(&self, file_data: TransactionData) -> EnvelopeResult<()> {
        let mut inner = write_lock(&self.inner)?;
        *inner = Indexed::default();
        for txn in file_data.transactions {
            inner.index(&txn);
            inner.data.insert(txn.id, txn);
        }
        Ok(())
    }

    /// Get a transaction by ID
    pub fn get(&self, id: TransactionId) -> EnvelopeResult<Option<Transaction>> {
        Ok(read_lock(&self.inner)?.data.get(&id).cloned())
    }

    /// Get all transactions, newest first
    pub fn get_all(&self) -> EnvelopeResult<Vec<Transaction>> {
        let inner = read_lock(&self.inner)?;
        let mut transactions: Vec<_> = inner.data.values().cloned().collect();
        sort_newest_first(&mut transactions);
        Ok(transactions)
    }

    /// Get transactions for an account, newest first
    pub fn get_by_account(&self, account_id: AccountId) -> EnvelopeResult<Vec<Transaction>> {
        let inner = read_lock(&self.inner)?;
        Ok(inner.collect(inner.by_account.get(&account_id)))
    }

    /// Get transactions touching a category (directly or through a split)
    pub fn get_by_category(&self, category_id: CategoryId) -> EnvelopeResult<Vec<Transaction>> {
        let inner = read_lock(&self.inner)?;
        Ok(inner.collect(inner.by_category.get(&category_id)))
    }

    /// Find a transaction in an account by its import id
    pub fn find_by_imported_id(
        &self,
        account_id: AccountId,
        imported_id: &str,
    ) -> EnvelopeResult<Option<Transaction>> {
        let inner = read_lock(&self.inner)?;
        let ids = inner.by_account.get(&account_id);
        Ok(ids
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| inner.data.get(id))
            .find(|t| t.imported_id.as_deref() == Some(imported_id))
            .cloned())
    }

    /// Insert or update a transaction
    pub fn upsert(&self, txn: Transaction) -> EnvelopeResult<()> {
        let mut inner = write_lock(&self.inner)?;
        if let Some(old) = inner.data.remove(&txn.id) {
            inner.unindex(&old);
        }
        inner.index(&txn);
        inner.data.insert(txn.id, txn);
        Ok(())
    }

    /// Delete a transaction, returning it if it existed
    pub fn delete(&self, id: TransactionId) -> EnvelopeResult<Option<Transaction>> {
        let mut inner = write_lock(&self.inner)?;
        let removed = inner.data.remove(&id);
        if let Some(txn) = &removed {
            inner.unindex(txn);
        }
        Ok(removed)
    }

    /// Count transactions
    pub fn count(&self) -> EnvelopeResult<usize> {
        Ok(read_lock(&self.inner)?.data.len())
    }
}
