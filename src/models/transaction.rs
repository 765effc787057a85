//! Transaction model
//!
//! Represents financial transactions with support for splits, transfers,
//! and various statuses (pending, cleared, reconciled).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, CategoryId, PayeeId, TransactionId};
use super::money::Money;

/// Status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Transaction has not yet cleared the bank
    #[default]
    Pending,
    /// Transaction has cleared the bank
    Cleared,
    /// Transaction has been reconciled
    Reconciled,
}

impl TransactionStatus {
    /// Cleared or reconciled
    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared | Self::Reconciled)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Cleared => write!(f, "Cleared"),
            Self::Reconciled => write!(f, "Reconciled"),
        }
    }
}

/// A split portion of a transaction assigned to a specific category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    /// The category for this split portion
    pub category_id: Option<CategoryId>,

    /// The amount for this split (same sign as parent transaction)
    pub amount: Money,

    /// Optional notes for this split
    #[serde(default)]
    pub notes: String,
}

impl Split {
    /// Create a new split
    pub fn new(category_id: Option<CategoryId>, amount: Money) -> Self {
        Self {
            category_id,
            amount,
            notes: String::new(),
        }
    }
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,

    /// The account this transaction belongs to
    pub account_id: AccountId,

    /// Transaction date
    pub date: NaiveDate,

    /// Amount (positive for inflow, negative for outflow)
    pub amount: Money,

    /// Payee ID (optional)
    pub payee_id: Option<PayeeId>,

    /// Payee name as reported by the bank or importer
    #[serde(default)]
    pub imported_payee: Option<String>,

    /// Category ID (None if this is a split transaction or transfer)
    pub category_id: Option<CategoryId>,

    /// Split transactions - if non-empty, category_id should be None
    #[serde(default)]
    pub splits: Vec<Split>,

    /// Notes
    #[serde(default)]
    pub notes: String,

    /// Transaction status
    #[serde(default)]
    pub status: TransactionStatus,

    /// If this is a transfer, the ID of the linked transaction in the other account
    pub transfer_transaction_id: Option<TransactionId>,

    /// Import ID for duplicate detection during import
    pub imported_id: Option<String>,

    /// When the transaction was created
    pub created_at: DateTime<Utc>,

    /// When the transaction was last modified
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(account_id: AccountId, date: NaiveDate, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            account_id,
            date,
            amount,
            payee_id: None,
            imported_payee: None,
            category_id: None,
            splits: Vec::new(),
            notes: String::new(),
            status: TransactionStatus::Pending,
            transfer_transaction_id: None,
            imported_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if this is a split transaction
    pub fn is_split(&self) -> bool {
        !self.splits.is_empty()
    }

    /// Check if this is a transfer
    pub fn is_transfer(&self) -> bool {
        self.transfer_transaction_id.is_some()
    }

    /// Set the status
    pub fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Clear all splits and set a single category
    pub fn set_category(&mut self, category_id: Option<CategoryId>) {
        self.splits.clear();
        self.category_id = category_id;
        self.updated_at = Utc::now();
    }

    /// Get the total of all splits (should equal transaction amount)
    ///
    /// `None` when the splits do not sum within range.
    pub fn splits_total(&self) -> Option<Money> {
        Money::checked_sum(self.splits.iter().map(|s| s.amount))
    }

    /// Every category this transaction touches
    pub fn category_ids(&self) -> Vec<CategoryId> {
        if self.is_split() {
            let mut ids: Vec<_> = self.splits.iter().filter_map(|s| s.category_id).collect();
            ids.sort();
            ids.dedup();
            ids
        } else {
            self.category_id.into_iter().collect()
        }
    }

    /// Replace one category with another everywhere in this transaction
    pub fn replace_category(&mut self, from: CategoryId, to: Option<CategoryId>) -> bool {
        let mut changed = false;
        if self.category_id == Some(from) {
            self.category_id = to;
            changed = true;
        }
        for split in &mut self.splits {
            if split.category_id == Some(from) {
                split.category_id = to;
                changed = true;
            }
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// Validate the transaction
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        // If split, splits total must equal transaction amount
        if self.is_split() {
            let splits_total = self
                .splits_total()
                .ok_or(TransactionValidationError::SplitsOverflow)?;
            if splits_total != self.amount {
                return Err(TransactionValidationError::SplitsMismatch {
                    transaction_amount: self.amount,
                    splits_total,
                });
            }
        }

        // Can't have both category_id and splits
        if self.category_id.is_some() && !self.splits.is_empty() {
            return Err(TransactionValidationError::CategoryAndSplits);
        }

        Ok(())
    }

    /// Fingerprint for duplicate detection when no imported id is given
    pub fn fingerprint(date: NaiveDate, amount: Money, payee: &str) -> String {
        // FNV-1a; the output is persisted and must not change between builds
        let key = format!("{}|{}|{}", date, amount.cents(), payee.trim().to_lowercase());
        let hash = key.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        });
        format!("imp-{:016x}", hash)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date.format("%Y-%m-%d"),
            self.imported_payee.as_deref().unwrap_or(""),
            self.amount
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    SplitsMismatch {
        transaction_amount: Money,
        splits_total: Money,
    },
    SplitsOverflow,
    CategoryAndSplits,
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SplitsMismatch {
                transaction_amount,
                splits_total,
            } => write!(
                f,
                "Split totals ({}) do not match transaction amount ({})",
                splits_total, transaction_amount
            ),
            Self::SplitsOverflow => write!(f, "Split amounts are out of range"),
            Self::CategoryAndSplits => {
                write!(f, "Transaction cannot have both a category and splits")
            }
        }
    }
}

impl std::error::Error for TransactionValidationError {}
