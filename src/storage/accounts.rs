//! Account repository for JSON storage
//!
//! Manages loading and saving accounts to accounts.json

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeResult;
use crate::models::{Account, AccountId};

use super::file_io::{read_json, read_lock, write_json_atomic, write_lock};

/// Serializable account data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountData {
    pub accounts: Vec<Account>,
}

/// Repository for account persistence
pub struct AccountRepository {
    path: PathBuf,
    data: RwLock<HashMap<AccountId, Account>>,
}

impl AccountRepository {
    /// Create a new account repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Load accounts from disk
    pub fn load(&self) -> EnvelopeResult<()> {
        let file_data: AccountData = read_json(&self.path)?;
        self.replace_all(file_data)
    }

    /// Save accounts to disk
    pub fn save(&self) -> EnvelopeResult<()> {
        write_json_atomic(&self.path, &self.snapshot()?)
    }

    /// Current contents in file order
    pub fn snapshot(&self) -> EnvelopeResult<AccountData> {
        Ok(AccountData {
            accounts: self.get_all()?,
        })
    }

    /// Replace the in-memory contents
    pub fn replace_all(&self, file_data: AccountData) -> EnvelopeResult<()> {
        let mut data = write_lock(&self.data)?;
        data.clear();
        for account in file_data.accounts {
            data.insert(account.id, account);
        }
        Ok(())
    }

    /// Get an account by ID
    pub fn get(&self, id: AccountId) -> EnvelopeResult<Option<Account>> {
        Ok(read_lock(&self.data)?.get(&id).cloned())
    }

    /// Get all accounts, ordered by sort order then name
    pub fn get_all(&self) -> EnvelopeResult<Vec<Account>> {
        let data = read_lock(&self.data)?;
        let mut accounts: Vec<_> = data.values().cloned().collect();
        accounts.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(accounts)
    }

    /// Insert or update an account
    pub fn upsert(&self, account: Account) -> EnvelopeResult<()> {
        write_lock(&self.data)?.insert(account.id, account);
        Ok(())
    }

    /// Delete an account
    pub fn delete(&self, id: AccountId) -> EnvelopeResult<bool> {
        Ok(write_lock(&self.data)?.remove(&id).is_some())
    }

    /// Check if an account name is already taken (case-insensitive)
    pub fn name_exists(&self, name: &str, exclude_id: Option<AccountId>) -> EnvelopeResult<bool> {
        let data = read_lock(&self.data)?;
        let name_lower = name.trim().to_lowercase();
        Ok(data
            .values()
            .any(|a| a.name.to_lowercase() == name_lower && Some(a.id) != exclude_id))
    }

    /// Next sort order slot
    pub fn next_sort_order(&self) -> EnvelopeResult<i32> {
        let data = read_lock(&self.data)?;
        Ok(data.values().map(|a| a.sort_order + 1).max().unwrap_or(0))
    }

    /// Count accounts
    pub fn count(&self) -> EnvelopeResult<usize> {
        Ok(read_lock(&self.data)?.len())
    }
}
