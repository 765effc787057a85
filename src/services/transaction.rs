//! Transaction service
//!
//! Provides business logic for transactions: date-range listing, batch
//! creation with payee resolution and category learning, transfers between
//! accounts, updates and deletion.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    Account, AccountId, CategoryId, Money, Payee, PayeeId, Split, Transaction, TransactionId,
    TransactionStatus,
};
use crate::storage::Storage;

use super::rule::RuleService;

/// A transaction to be created, with ids already resolved
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub date: NaiveDate,
    pub amount: Money,
    pub payee_id: Option<PayeeId>,
    pub payee_name: Option<String>,
    pub imported_payee: Option<String>,
    pub category_id: Option<CategoryId>,
    pub notes: Option<String>,
    pub imported_id: Option<String>,
    pub cleared: bool,
    pub splits: Vec<Split>,
}

impl TransactionDraft {
    pub fn new(date: NaiveDate, amount: Money) -> Self {
        Self {
            date,
            amount,
            payee_id: None,
            payee_name: None,
            imported_payee: None,
            category_id: None,
            notes: None,
            imported_id: None,
            cleared: false,
            splits: Vec::new(),
        }
    }
}

/// A draft's payee, resolved once the whole batch has been checked
struct PayeeRef {
    id: Option<PayeeId>,
    name: Option<String>,
}

/// Field changes for an existing transaction; the outer `Option` means "leave as is"
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub date: Option<NaiveDate>,
    pub amount: Option<Money>,
    pub payee_id: Option<Option<PayeeId>>,
    pub category_id: Option<Option<CategoryId>>,
    pub notes: Option<Option<String>>,
    pub cleared: Option<bool>,
    pub reconciled: Option<bool>,
}

/// Options for batch creation
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Fill missing categories from payee history and record usage
    pub learn_categories: bool,
    /// Create the mirrored side of transactions whose payee is a transfer payee
    pub run_transfers: bool,
    /// Run transaction rules on each new transaction
    pub run_rules: bool,
}

/// Service for transaction management
pub struct TransactionService<'a> {
    storage: &'a Storage,
}

impl<'a> TransactionService<'a> {
    /// Create a new transaction service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn require_account(&self, id: AccountId) -> EnvelopeResult<Account> {
        self.storage
            .accounts
            .get(id)?
            .ok_or_else(|| EnvelopeError::account_not_found(id.to_string()))
    }

    /// Get a transaction by ID
    pub fn get(&self, id: TransactionId) -> EnvelopeResult<Transaction> {
        self.storage
            .transactions
            .get(id)?
            .ok_or_else(|| EnvelopeError::transaction_not_found(id.to_string()))
    }

    /// List an account's transactions within an inclusive date range, newest first
    pub fn list_range(
        &self,
        account_id: AccountId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EnvelopeResult<Vec<Transaction>> {
        self.require_account(account_id)?;
        Ok(self
            .storage
            .transactions
            .get_by_account(account_id)?
            .into_iter()
            .filter(|t| t.date >= start && t.date <= end)
            .collect())
    }

    /// Resolve a payee id or name into a stored payee
    pub(crate) fn resolve_payee(
        &self,
        payee_id: Option<PayeeId>,
        payee_name: Option<&str>,
    ) -> EnvelopeResult<Option<Payee>> {
        if let Some(id) = payee_id {
            let payee = self
                .storage
                .payees
                .get(id)?
                .ok_or_else(|| EnvelopeError::payee_not_found(id.to_string()))?;
            return Ok(Some(payee));
        }
        match payee_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Ok(Some(self.storage.payees.get_or_create(name)?)),
            None => Ok(None),
        }
    }

    fn check_category(&self, category_id: Option<CategoryId>) -> EnvelopeResult<()> {
        if let Some(id) = category_id {
            if self.storage.categories.get_category(id)?.is_none() {
                return Err(EnvelopeError::category_not_found(id.to_string()));
            }
        }
        Ok(())
    }

    /// Check a draft and turn it into a transaction with its payee unresolved
    ///
    /// Nothing is stored, so a draft rejected here leaves no trace.
    fn prepare(
        &self,
        account_id: AccountId,
        draft: TransactionDraft,
    ) -> EnvelopeResult<(Transaction, PayeeRef)> {
        self.check_category(draft.category_id)?;
        for split in &draft.splits {
            self.check_category(split.category_id)?;
        }
        if let Some(id) = draft.payee_id {
            if self.storage.payees.get(id)?.is_none() {
                return Err(EnvelopeError::payee_not_found(id.to_string()));
            }
        }

        let mut txn = Transaction::new(account_id, draft.date, draft.amount);
        txn.imported_payee = draft.imported_payee;
        txn.category_id = draft.category_id;
        txn.notes = draft.notes.unwrap_or_default();
        txn.imported_id = draft.imported_id;
        txn.splits = draft.splits;
        if draft.cleared {
            txn.status = TransactionStatus::Cleared;
        }
        if txn.is_split() {
            txn.category_id = None;
        }

        txn.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        let payee = PayeeRef {
            id: draft.payee_id,
            name: draft.payee_name,
        };
        Ok((txn, payee))
    }

    /// Resolve a prepared transaction's payee, creating it by name if needed
    fn attach_payee(
        &self,
        txn: &mut Transaction,
        payee: PayeeRef,
        learn_categories: bool,
    ) -> EnvelopeResult<Option<Payee>> {
        let payee = self.resolve_payee(payee.id, payee.name.as_deref())?;
        txn.payee_id = payee.as_ref().map(|p| p.id);

        if learn_categories && !txn.is_split() && txn.category_id.is_none() {
            if let Some(payee) = payee.as_ref().filter(|p| !p.is_transfer()) {
                txn.category_id = payee.suggested_category();
            }
        }
        Ok(payee)
    }

    /// Build (but do not store) a transaction from a draft
    pub(crate) fn build(
        &self,
        account_id: AccountId,
        draft: TransactionDraft,
        learn_categories: bool,
    ) -> EnvelopeResult<(Transaction, Option<Payee>)> {
        let (mut txn, payee) = self.prepare(account_id, draft)?;
        let payee = self.attach_payee(&mut txn, payee, learn_categories)?;
        Ok((txn, payee))
    }

    /// Record category usage on the transaction's payee
    pub(crate) fn learn(&self, txn: &Transaction) -> EnvelopeResult<()> {
        let (Some(payee_id), Some(category_id)) = (txn.payee_id, txn.category_id) else {
            return Ok(());
        };
        if let Some(mut payee) = self.storage.payees.get(payee_id)? {
            if !payee.is_transfer() {
                payee.record_category_usage(category_id);
                self.storage.payees.upsert(payee)?;
            }
        }
        Ok(())
    }

    /// Create transactions in an account, returning the new ids in input order
    pub fn create_many(
        &self,
        account_id: AccountId,
        drafts: Vec<TransactionDraft>,
        options: CreateOptions,
    ) -> EnvelopeResult<Vec<TransactionId>> {
        self.require_account(account_id)?;

        // Every draft is checked before any payee is created by name
        let mut prepared = Vec::with_capacity(drafts.len());
        for draft in drafts {
            prepared.push(self.prepare(account_id, draft)?);
        }

        let rules = RuleService::new(self.storage);
        let mut ids = Vec::with_capacity(prepared.len());
        for (mut txn, payee) in prepared {
            let payee = self.attach_payee(&mut txn, payee, options.learn_categories)?;
            if options.run_rules {
                rules.apply(&mut txn)?;
            }
            if options.learn_categories {
                self.learn(&txn)?;
            }
            ids.push(txn.id);

            let transfer_target = payee.and_then(|p| p.transfer_account_id);
            match transfer_target {
                Some(target) if options.run_transfers && target != account_id => {
                    self.link_transfer(&mut txn, target)?;
                }
                _ => self.storage.transactions.upsert(txn)?,
            }
        }

        self.storage.transactions.save()?;
        self.storage.payees.save()?;
        debug!(account = %account_id, count = ids.len(), "Added transactions");
        Ok(ids)
    }

    /// Create the mirrored transaction for `txn` in `target` and store both
    fn link_transfer(&self, txn: &mut Transaction, target: AccountId) -> EnvelopeResult<()> {
        let source = self.require_account(txn.account_id)?;
        let target_account = self.require_account(target)?;
        let source_payee = self.transfer_payee(source.id)?;

        let mut mirror = Transaction::new(target, txn.date, opposite(txn.amount)?);
        mirror.payee_id = Some(source_payee.id);
        mirror.notes = txn.notes.clone();
        mirror.transfer_transaction_id = Some(txn.id);
        txn.transfer_transaction_id = Some(mirror.id);

        // Transfers inside the budget move no money between envelopes
        if source.on_budget == target_account.on_budget {
            txn.category_id = None;
            txn.splits.clear();
        }

        self.storage.transactions.upsert(txn.clone())?;
        self.storage.transactions.upsert(mirror)?;
        Ok(())
    }

    /// The transfer payee for an account
    pub(crate) fn transfer_payee(&self, account_id: AccountId) -> EnvelopeResult<Payee> {
        self.storage
            .payees
            .get_transfer_payee(account_id)?
            .ok_or_else(|| {
                EnvelopeError::Storage(format!("Account {} has no transfer payee", account_id))
            })
    }

    /// Move money between two accounts with a linked pair of transactions
    ///
    /// `amount` is taken out of `from`. Does not save.
    pub fn create_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Money,
        date: NaiveDate,
        category_id: Option<CategoryId>,
    ) -> EnvelopeResult<(TransactionId, TransactionId)> {
        if from == to {
            return Err(EnvelopeError::Validation(
                "Cannot transfer to the same account".into(),
            ));
        }
        self.check_category(category_id)?;
        let to_payee = self.transfer_payee(to)?;

        let mut txn = Transaction::new(from, date, opposite(amount)?);
        txn.payee_id = Some(to_payee.id);
        self.link_transfer(&mut txn, to)?;

        // An explicit category survives only for transfers that leave the budget
        if txn.category_id.is_none() && category_id.is_some() {
            let source = self.require_account(from)?;
            let target = self.require_account(to)?;
            if source.on_budget != target.on_budget {
                txn.category_id = category_id;
                self.storage.transactions.upsert(txn.clone())?;
            }
        }

        let mirror = txn.transfer_transaction_id.ok_or_else(|| {
            EnvelopeError::Storage("Transfer was not linked".into())
        })?;
        Ok((txn.id, mirror))
    }

    /// Apply field changes to a transaction, keeping a linked transfer in step
    pub fn update(&self, id: TransactionId, patch: TransactionPatch) -> EnvelopeResult<Transaction> {
        let mut txn = self.get(id)?;

        if let Some(date) = patch.date {
            txn.date = date;
        }
        if let Some(amount) = patch.amount {
            if txn.is_split() && amount != txn.amount {
                return Err(EnvelopeError::Validation(
                    "Cannot change the amount of a split transaction".into(),
                ));
            }
            txn.amount = amount;
        }
        if let Some(category_id) = patch.category_id {
            self.check_category(category_id)?;
            txn.set_category(category_id);
        }
        if let Some(notes) = patch.notes {
            txn.notes = notes.unwrap_or_default();
        }
        if patch.reconciled == Some(true) {
            txn.set_status(TransactionStatus::Reconciled);
        } else if let Some(cleared) = patch.cleared {
            txn.set_status(if cleared {
                TransactionStatus::Cleared
            } else {
                TransactionStatus::Pending
            });
        } else if patch.reconciled == Some(false) && txn.status == TransactionStatus::Reconciled {
            txn.set_status(TransactionStatus::Cleared);
        }

        let old_payee = txn.payee_id;
        if let Some(payee_id) = patch.payee_id {
            if let Some(pid) = payee_id {
                self.resolve_payee(Some(pid), None)?;
            }
            txn.payee_id = payee_id;
        }

        txn.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        txn.updated_at = Utc::now();

        if txn.payee_id != old_payee {
            // The old link no longer applies
            if let Some(mirror_id) = txn.transfer_transaction_id.take() {
                self.storage.transactions.delete(mirror_id)?;
            }
            let target = match txn.payee_id {
                Some(pid) => self
                    .storage
                    .payees
                    .get(pid)?
                    .and_then(|p| p.transfer_account_id),
                None => None,
            };
            match target {
                Some(target) if target != txn.account_id => self.link_transfer(&mut txn, target)?,
                _ => self.storage.transactions.upsert(txn.clone())?,
            }
        } else {
            if let Some(mirror_id) = txn.transfer_transaction_id {
                if let Some(mut mirror) = self.storage.transactions.get(mirror_id)? {
                    mirror.date = txn.date;
                    mirror.amount = opposite(txn.amount)?;
                    mirror.updated_at = Utc::now();
                    self.storage.transactions.upsert(mirror)?;
                }
            }
            self.storage.transactions.upsert(txn.clone())?;
        }

        self.storage.transactions.save()?;
        Ok(txn)
    }

    /// Delete a transaction and, for transfers, its linked counterpart
    pub fn delete(&self, id: TransactionId) -> EnvelopeResult<()> {
        let txn = self
            .storage
            .transactions
            .delete(id)?
            .ok_or_else(|| EnvelopeError::transaction_not_found(id.to_string()))?;
        if let Some(mirror_id) = txn.transfer_transaction_id {
            self.storage.transactions.delete(mirror_id)?;
        }
        self.storage.transactions.save()
    }
}

/// The amount seen from the other side of a transfer
fn opposite(amount: Money) -> EnvelopeResult<Money> {
    amount
        .checked_neg()
        .ok_or_else(|| EnvelopeError::amount_overflow("a transfer"))
}
