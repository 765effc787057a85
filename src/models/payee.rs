//! Payee model
//!
//! Tracks payees and their learned default categories. Every account owns a
//! transfer payee; assigning it to a transaction makes that transaction a
//! transfer into (or out of) the account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::ids::{AccountId, CategoryId, PayeeId};

/// A payee with auto-categorization history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payee {
    /// Unique identifier
    pub id: PayeeId,

    /// Payee name
    pub name: String,

    /// Default category for new transactions with this payee
    pub default_category_id: Option<CategoryId>,

    /// Category usage frequency for learning (category_id -> count)
    #[serde(default)]
    pub category_frequency: HashMap<CategoryId, u32>,

    /// Whether the default category was set explicitly rather than learned
    #[serde(default)]
    pub manual: bool,

    /// The account this payee transfers to, for transfer payees
    #[serde(default)]
    pub transfer_account_id: Option<AccountId>,

    /// When the payee was created
    pub created_at: DateTime<Utc>,

    /// When the payee was last modified
    pub updated_at: DateTime<Utc>,
}

impl Payee {
    /// Create a new payee
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PayeeId::new(),
            name: name.into(),
            default_category_id: None,
            category_frequency: HashMap::new(),
            manual: false,
            transfer_account_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create the transfer payee for an account
    pub fn transfer_to(account_id: AccountId, account_name: &str) -> Self {
        let mut payee = Self::new(account_name);
        payee.transfer_account_id = Some(account_id);
        payee
    }

    /// Whether this payee represents a transfer to another account
    pub fn is_transfer(&self) -> bool {
        self.transfer_account_id.is_some()
    }

    /// Record a category usage for learning
    pub fn record_category_usage(&mut self, category_id: CategoryId) {
        *self.category_frequency.entry(category_id).or_insert(0) += 1;
        self.updated_at = Utc::now();

        // Auto-update default category if not manually set
        if !self.manual {
            self.update_default_from_frequency();
        }
    }

    /// Update the default category based on frequency
    fn update_default_from_frequency(&mut self) {
        if let Some((&most_used_category, _)) = self
            .category_frequency
            .iter()
            .max_by_key(|(id, count)| (**count, **id))
        {
            self.default_category_id = Some(most_used_category);
        }
    }

    /// Get the suggested category (default or most frequent)
    pub fn suggested_category(&self) -> Option<CategoryId> {
        self.default_category_id.or_else(|| {
            self.category_frequency
                .iter()
                .max_by_key(|(id, count)| (**count, **id))
                .map(|(&category_id, _)| category_id)
        })
    }

    /// Set or clear the default category manually
    pub fn set_default_category(&mut self, category_id: Option<CategoryId>) {
        self.default_category_id = category_id;
        self.manual = category_id.is_some();
        self.updated_at = Utc::now();
    }

    /// Fold another payee's learning history into this one
    pub fn absorb_history(&mut self, other: &Payee) {
        for (category_id, count) in &other.category_frequency {
            *self.category_frequency.entry(*category_id).or_insert(0) += count;
        }
        if !self.manual {
            self.update_default_from_frequency();
        }
        self.updated_at = Utc::now();
    }

    /// Forget a category (e.g. after it was deleted)
    pub fn forget_category(&mut self, category_id: CategoryId) {
        self.category_frequency.remove(&category_id);
        if self.default_category_id == Some(category_id) {
            self.default_category_id = None;
            self.manual = false;
            self.update_default_from_frequency();
        }
    }

    /// Validate the payee
    pub fn validate(&self) -> Result<(), PayeeValidationError> {
        if self.name.trim().is_empty() {
            return Err(PayeeValidationError::EmptyName);
        }

        if self.name.len() > 100 {
            return Err(PayeeValidationError::NameTooLong(self.name.len()));
        }

        Ok(())
    }

    /// Normalize a payee name for matching
    pub fn normalize_name(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

impl fmt::Display for Payee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Validation errors for payees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayeeValidationError {
    EmptyName,
    NameTooLong(usize),
}

impl fmt::Display for PayeeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Payee name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Payee name too long ({} chars, max 100)", len)
            }
        }
    }
}

impl std::error::Error for PayeeValidationError {}
