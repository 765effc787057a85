//! Payee service
//!
//! Provides business logic for payee management including default
//! categories and merging duplicate payees.

use tracing::info;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{CategoryId, Payee, PayeeId};
use crate::storage::Storage;

/// Service for payee management
pub struct PayeeService<'a> {
    storage: &'a Storage,
}

impl<'a> PayeeService<'a> {
    /// Create a new payee service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn require(&self, id: PayeeId) -> EnvelopeResult<Payee> {
        self.storage
            .payees
            .get(id)?
            .ok_or_else(|| EnvelopeError::payee_not_found(id.to_string()))
    }

    fn check_category(&self, category_id: Option<CategoryId>) -> EnvelopeResult<()> {
        if let Some(id) = category_id {
            self.storage
                .categories
                .get_category(id)?
                .ok_or_else(|| EnvelopeError::category_not_found(id.to_string()))?;
        }
        Ok(())
    }

    /// Get all payees, including transfer payees
    pub fn list(&self) -> EnvelopeResult<Vec<Payee>> {
        self.storage.payees.get_all()
    }

    /// Create a new payee with an optional default category
    pub fn create(&self, name: &str, category_id: Option<CategoryId>) -> EnvelopeResult<Payee> {
        let name = name.trim();
        if self.storage.payees.get_by_name(name)?.is_some() {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Payee",
                identifier: name.to_string(),
            });
        }
        self.check_category(category_id)?;

        let mut payee = Payee::new(name);
        payee.set_default_category(category_id);
        payee
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.payees.upsert(payee.clone())?;
        self.storage.payees.save()?;
        Ok(payee)
    }

    /// Rename a payee and/or change its default category
    pub fn update(
        &self,
        id: PayeeId,
        name: Option<&str>,
        category_id: Option<Option<CategoryId>>,
    ) -> EnvelopeResult<Payee> {
        let mut payee = self.require(id)?;

        if let Some(name) = name {
            let name = name.trim();
            if payee.is_transfer() {
                return Err(EnvelopeError::Validation(
                    "Transfer payees are renamed through their account".into(),
                ));
            }
            if let Some(existing) = self.storage.payees.get_by_name(name)? {
                if existing.id != id {
                    return Err(EnvelopeError::Duplicate {
                        entity_type: "Payee",
                        identifier: name.to_string(),
                    });
                }
            }
            payee.name = name.to_string();
        }
        if let Some(category_id) = category_id {
            self.check_category(category_id)?;
            payee.set_default_category(category_id);
        }

        payee
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        payee.updated_at = chrono::Utc::now();

        self.storage.payees.upsert(payee.clone())?;
        self.storage.payees.save()?;
        Ok(payee)
    }

    /// Delete a payee; its transactions keep their data but lose the payee
    pub fn delete(&self, id: PayeeId) -> EnvelopeResult<()> {
        let payee = self.require(id)?;
        if payee.is_transfer() {
            return Err(EnvelopeError::Validation(
                "Transfer payees are deleted with their account".into(),
            ));
        }

        for mut txn in self.storage.transactions.get_all()? {
            if txn.payee_id == Some(id) {
                txn.payee_id = None;
                self.storage.transactions.upsert(txn)?;
            }
        }
        self.storage.payees.delete(id)?;

        self.storage.transactions.save()?;
        self.storage.payees.save()?;
        Ok(())
    }

    /// Merge payees into `target`
    ///
    /// Transactions and rules pointing at a merged payee are moved to the
    /// target, which also absorbs their category history. The target id is
    /// ignored if it appears among `merge_ids`.
    pub fn merge(&self, target: PayeeId, merge_ids: &[PayeeId]) -> EnvelopeResult<Payee> {
        let mut target_payee = self.require(target)?;
        if target_payee.is_transfer() {
            return Err(EnvelopeError::Validation(
                "Cannot merge into a transfer payee".into(),
            ));
        }

        let mut merged = Vec::new();
        for &id in merge_ids.iter().filter(|&&id| id != target) {
            let payee = self.require(id)?;
            if payee.is_transfer() {
                return Err(EnvelopeError::Validation(format!(
                    "Cannot merge transfer payee '{}'",
                    payee.name
                )));
            }
            merged.push(payee);
        }

        let target_str = target.to_string();
        for payee in &merged {
            for mut txn in self.storage.transactions.get_all()? {
                if txn.payee_id == Some(payee.id) {
                    txn.payee_id = Some(target);
                    self.storage.transactions.upsert(txn)?;
                }
            }

            let from = payee.id.to_string();
            for mut rule in self.storage.rules.get_all()? {
                if rule.replace_payee(&from, &target_str) {
                    self.storage.rules.upsert(rule)?;
                }
            }

            target_payee.absorb_history(payee);
            self.storage.payees.delete(payee.id)?;
        }
        self.storage.payees.upsert(target_payee.clone())?;

        self.storage.transactions.save()?;
        self.storage.rules.save()?;
        self.storage.payees.save()?;

        info!(target = %target, merged = merged.len(), "Merged payees");
        Ok(target_payee)
    }
}
