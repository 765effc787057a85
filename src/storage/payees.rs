//! Payee repository for JSON storage
//!
//! Manages loading and saving payees to payees.json. Transfer payees share
//! their account's name, so only regular payees are indexed by name.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeResult;
use crate::models::{AccountId, Payee, PayeeId};

use super::file_io::{read_json, read_lock, write_json_atomic, write_lock};

/// Serializable payee data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayeeData {
    pub payees: Vec<Payee>,
}

#[derive(Default)]
struct Indexed {
    data: HashMap<PayeeId, Payee>,
    /// normalized name -> payee id
    by_name: HashMap<String, PayeeId>,
}

impl Indexed {
    fn insert(&mut self, payee: Payee) {
        if let Some(old) = self.data.remove(&payee.id) {
            self.by_name.remove(&Payee::normalize_name(&old.name));
        }
        if !payee.is_transfer() {
            self.by_name
                .insert(Payee::normalize_name(&payee.name), payee.id);
        }
        self.data.insert(payee.id, payee);
    }
}

/// Repository for payee persistence
pub struct PayeeRepository {
    path: PathBuf,
    inner: RwLock<Indexed>,
}

impl PayeeRepository {
    /// Create a new payee repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            inner: RwLock::new(Indexed::default()),
        }
    }

    /// Load payees from disk
    pub fn load(&self) -> EnvelopeResult<()> {
        let file_data: PayeeData = read_json(&self.path)?;
        self.replace_all(file_data)
    }

    /// Save payees to disk
    pub fn save(&self) -> EnvelopeResult<()> {
        write_json_atomic(&self.path, &self.snapshot()?)
    }

    /// Current contents ordered by name
    pub fn snapshot(&self) -> EnvelopeResult<PayeeData> {
        Ok(PayeeData {
            payees: self.get_all()?,
        })
    }

    /// Replace the in-memory contents
    pub fn replace_all(&self, file_data: PayeeData) -> EnvelopeResult<()> {
        let mut inner = write_lock(&self.inner)?;
        *inner = Indexed::default();
        for payee in file_data.payees {
            inner.insert(payee);
        }
        Ok(())
    }

    /// Get a payee by ID
    pub fn get(&self, id: PayeeId) -> EnvelopeResult<Option<Payee>> {
        Ok(read_lock(&self.inner)?.data.get(&id).cloned())
    }

    /// Get all payees ordered by name (case-insensitive)
    pub fn get_all(&self) -> EnvelopeResult<Vec<Payee>> {
        let inner = read_lock(&self.inner)?;
        let mut payees: Vec<_> = inner.data.values().cloned().collect();
        payees.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        Ok(payees)
    }

    /// Get a regular payee by name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> EnvelopeResult<Option<Payee>> {
        let inner = read_lock(&self.inner)?;
        Ok(inner
            .by_name
            .get(&Payee::normalize_name(name))
            .and_then(|id| inner.data.get(id))
            .cloned())
    }

    /// Get the transfer payee that points at an account
    pub fn get_transfer_payee(&self, account_id: AccountId) -> EnvelopeResult<Option<Payee>> {
        Ok(read_lock(&self.inner)?
            .data
            .values()
            .find(|p| p.transfer_account_id == Some(account_id))
            .cloned())
    }

    /// Get or create a regular payee by name
    pub fn get_or_create(&self, name: &str) -> EnvelopeResult<Payee> {
        if let Some(payee) = self.get_by_name(name)? {
            return Ok(payee);
        }
        let payee = Payee::new(name.trim());
        self.upsert(payee.clone())?;
        Ok(payee)
    }

    /// Insert or update a payee
    pub fn upsert(&self, payee: Payee) -> EnvelopeResult<()> {
        write_lock(&self.inner)?.insert(payee);
        Ok(())
    }

    /// Delete a payee
    pub fn delete(&self, id: PayeeId) -> EnvelopeResult<bool> {
        let mut inner = write_lock(&self.inner)?;
        match inner.data.remove(&id) {
            Some(payee) => {
                let key = Payee::normalize_name(&payee.name);
                if inner.by_name.get(&key) == Some(&id) {
                    inner.by_name.remove(&key);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
