//! Account model
//!
//! Represents financial accounts (checking, savings, credit cards, etc.)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AccountId;
use super::money::Money;

/// A financial account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,

    /// Account name (e.g., "Chase Checking")
    pub name: String,

    /// Whether this account is included in the budget
    /// Off-budget accounts (like investments) don't affect the money to budget
    pub on_budget: bool,

    /// Whether this account is closed
    #[serde(default)]
    pub closed: bool,

    /// Opening balance when the account was created
    pub starting_balance: Money,

    /// Notes about this account
    #[serde(default)]
    pub notes: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,

    /// Sort order for display
    #[serde(default)]
    pub sort_order: i32,
}

impl Account {
    /// Create a new on-budget account
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            name: name.into(),
            on_budget: true,
            closed: false,
            starting_balance: Money::zero(),
            notes: String::new(),
            created_at: now,
            updated_at: now,
            sort_order: 0,
        }
    }

    /// Create a new account with a starting balance
    pub fn with_starting_balance(name: impl Into<String>, starting_balance: Money) -> Self {
        let mut account = Self::new(name);
        account.starting_balance = starting_balance;
        account
    }

    /// Mark this account as closed
    pub fn close(&mut self) {
        self.closed = true;
        self.updated_at = Utc::now();
    }

    /// Reopen this account
    pub fn reopen(&mut self) {
        self.closed = false;
        self.updated_at = Utc::now();
    }

    /// Rename the account
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Utc::now();
    }

    /// Set whether this account is on-budget
    pub fn set_on_budget(&mut self, on_budget: bool) {
        self.on_budget = on_budget;
        self.updated_at = Utc::now();
    }

    /// Validate the account
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(AccountValidationError::NameTooLong(self.name.len()));
        }

        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.on_budget {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} (off budget)", self.name)
        }
    }
}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    NameTooLong(usize),
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Account name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Account name too long ({} chars, max 100)", len)
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account() {
        let account = Account::new("Checking");
        assert_eq!(account.name, "Checking");
        assert!(account.on_budget);
        assert!(!account.closed);
        assert_eq!(account.starting_balance, Money::zero());
    }

    #[test]
    fn test_close_and_reopen() {
        let mut account = Account::with_starting_balance("Savings", Money::from_cents(100000));
        assert_eq!(account.starting_balance.cents(), 100000);

        account.close();
        assert!(account.closed);

        account.reopen();
        assert!(!account.closed);
    }

    #[test]
    fn test_validation() {
        let mut account = Account::new("Valid Name");
        assert!(account.validate().is_ok());

        account.name = "   ".into();
        assert_eq!(account.validate(), Err(AccountValidationError::EmptyName));

        account.name = "a".repeat(101);
        assert!(matches!(
            account.validate(),
            Err(AccountValidationError::NameTooLong(101))
        ));
    }

    #[test]
    fn test_display() {
        let mut account = Account::new("Brokerage");
        assert_eq!(account.to_string(), "Brokerage");
        account.set_on_budget(false);
        assert_eq!(account.to_string(), "Brokerage (off budget)");
    }
}
