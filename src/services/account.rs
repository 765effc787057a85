//! Account service
//!
//! Provides business logic for account management: creation with a transfer
//! payee, renaming, closing (with balance transfer), reopening, deletion and
//! balance calculation.

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Account, AccountId, CategoryId, Money, Payee};
use crate::storage::Storage;

use super::transaction::TransactionService;

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

impl<'a> AccountService<'a> {
    /// Create a new account service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn require(&self, id: AccountId) -> EnvelopeResult<Account> {
        self.storage
            .accounts
            .get(id)?
            .ok_or_else(|| EnvelopeError::account_not_found(id.to_string()))
    }

    /// Get all accounts
    pub fn list(&self) -> EnvelopeResult<Vec<Account>> {
        self.storage.accounts.get_all()
    }

    /// Create a new account together with its transfer payee
    pub fn create(
        &self,
        name: &str,
        on_budget: bool,
        starting_balance: Money,
    ) -> EnvelopeResult<Account> {
        let name = name.trim();
        if self.storage.accounts.name_exists(name, None)? {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Account",
                identifier: name.to_string(),
            });
        }

        let mut account = Account::with_starting_balance(name, starting_balance);
        account.on_budget = on_budget;
        account.sort_order = self.storage.accounts.next_sort_order()?;
        account
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.accounts.upsert(account.clone())?;
        self.storage
            .payees
            .upsert(Payee::transfer_to(account.id, &account.name))?;
        self.storage.accounts.save()?;
        self.storage.payees.save()?;

        info!(account = %account.id, name = %account.name, "Created account");
        Ok(account)
    }

    /// Rename an account and/or move it on or off budget
    pub fn update(
        &self,
        id: AccountId,
        name: Option<&str>,
        on_budget: Option<bool>,
    ) -> EnvelopeResult<Account> {
        let mut account = self.require(id)?;

        if let Some(name) = name {
            let name = name.trim();
            if self.storage.accounts.name_exists(name, Some(id))? {
                return Err(EnvelopeError::Duplicate {
                    entity_type: "Account",
                    identifier: name.to_string(),
                });
            }
            account.rename(name);
            if let Some(mut payee) = self.storage.payees.get_transfer_payee(id)? {
                payee.name = account.name.clone();
                self.storage.payees.upsert(payee)?;
            }
        }
        if let Some(on_budget) = on_budget {
            account.set_on_budget(on_budget);
        }

        account
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.accounts.upsert(account.clone())?;
        self.storage.accounts.save()?;
        self.storage.payees.save()?;
        Ok(account)
    }

    /// Close an account
    ///
    /// A non-zero balance must be moved to `transfer_to` first. The category is
    /// applied to the transfer when it leaves the budget.
    pub fn close(
        &self,
        id: AccountId,
        transfer_to: Option<AccountId>,
        category_id: Option<CategoryId>,
    ) -> EnvelopeResult<Account> {
        let mut account = self.require(id)?;
        if account.closed {
            return Err(EnvelopeError::Validation(format!(
                "Account '{}' is already closed",
                account.name
            )));
        }

        let balance = self.balance(id, None)?;
        if !balance.is_zero() {
            let target = transfer_to.ok_or_else(|| {
                EnvelopeError::Validation(format!(
                    "Account '{}' has a balance of {}; a transfer account is required to close it",
                    account.name, balance
                ))
            })?;
            let target_account = self.require(target)?;
            if target_account.closed {
                return Err(EnvelopeError::Validation(format!(
                    "Cannot transfer to closed account '{}'",
                    target_account.name
                )));
            }

            TransactionService::new(self.storage).create_transfer(
                id,
                target,
                balance,
                Local::now().date_naive(),
                category_id,
            )?;
            self.storage.transactions.save()?;
        }

        account.close();
        self.storage.accounts.upsert(account.clone())?;
        self.storage.accounts.save()?;

        info!(account = %id, "Closed account");
        Ok(account)
    }

    /// Reopen a closed account
    pub fn reopen(&self, id: AccountId) -> EnvelopeResult<Account> {
        let mut account = self.require(id)?;
        account.reopen();
        self.storage.accounts.upsert(account.clone())?;
        self.storage.accounts.save()?;
        Ok(account)
    }

    /// Delete an account, its transactions and its transfer payee
    ///
    /// Transfers into other accounts keep their side, unlinked and without payee.
    pub fn delete(&self, id: AccountId) -> EnvelopeResult<()> {
        self.require(id)?;
        let transfer_payee = self.storage.payees.get_transfer_payee(id)?;

        for txn in self.storage.transactions.get_by_account(id)? {
            self.storage.transactions.delete(txn.id)?;
        }

        if let Some(payee) = transfer_payee {
            for mut txn in self.storage.transactions.get_all()? {
                if txn.payee_id == Some(payee.id) {
                    txn.payee_id = None;
                    txn.transfer_transaction_id = None;
                    self.storage.transactions.upsert(txn)?;
                }
            }
            self.storage.payees.delete(payee.id)?;
        }

        self.storage.accounts.delete(id)?;
        self.storage.transactions.save()?;
        self.storage.payees.save()?;
        self.storage.accounts.save()?;

        info!(account = %id, "Deleted account");
        Ok(())
    }

    /// Starting balance plus every transaction dated on or before `cutoff`
    pub fn balance(&self, id: AccountId, cutoff: Option<NaiveDate>) -> EnvelopeResult<Money> {
        let account = self.require(id)?;
        let transactions = self.storage.transactions.get_by_account(id)?;
        let amounts = transactions
            .iter()
            .filter(|t| cutoff.map_or(true, |c| t.date <= c))
            .map(|t| t.amount);
        Money::checked_sum(std::iter::once(account.starting_balance).chain(amounts))
            .ok_or_else(|| EnvelopeError::amount_overflow("the account balance"))
    }
}
