//! Budget allocation model
//!
//! Tracks how much money is assigned to each category per month, whether a
//! category's negative balance rolls over, and how much of "to budget" is
//! held back for the following month.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CategoryId;
use super::money::Money;
use super::period::MonthKey;

/// A budget allocation for a specific category in a specific month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAllocation {
    /// The category this allocation is for
    pub category_id: CategoryId,

    /// The budget month
    pub month: MonthKey,

    /// Amount budgeted/assigned to this category this month
    pub budgeted: Money,

    /// Whether a negative balance at month end rolls into next month
    /// (instead of being taken out of next month's money to budget)
    #[serde(default)]
    pub carryover: bool,

    /// When this allocation was created
    pub created_at: DateTime<Utc>,

    /// When this allocation was last modified
    pub updated_at: DateTime<Utc>,
}

impl BudgetAllocation {
    /// Create a new, empty budget allocation
    pub fn new(category_id: CategoryId, month: MonthKey) -> Self {
        let now = Utc::now();
        Self {
            category_id,
            month,
            budgeted: Money::zero(),
            carryover: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the budgeted amount
    pub fn set_budgeted(&mut self, amount: Money) {
        self.budgeted = amount;
        self.updated_at = Utc::now();
    }

    /// Set the carryover flag
    pub fn set_carryover(&mut self, carryover: bool) {
        self.carryover = carryover;
        self.updated_at = Utc::now();
    }

    /// An allocation with nothing budgeted and no flag carries no information
    pub fn is_empty(&self) -> bool {
        self.budgeted.is_zero() && !self.carryover
    }
}

impl fmt::Display for BudgetAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} budgeted: {}", self.month, self.budgeted)?;
        if self.carryover {
            write!(f, " (carryover)")?;
        }
        Ok(())
    }
}

/// Money held back from a month's "to budget" for the next month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthHold {
    pub month: MonthKey,
    pub amount: Money,
}

impl MonthHold {
    pub fn new(month: MonthKey, amount: Money) -> Self {
        Self { month, amount }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month() -> MonthKey {
        MonthKey::new(2025, 1).unwrap()
    }

    #[test]
    fn test_new_allocation() {
        let alloc = BudgetAllocation::new(CategoryId::new(), month());
        assert_eq!(alloc.budgeted, Money::zero());
        assert!(!alloc.carryover);
        assert!(alloc.is_empty());
    }

    #[test]
    fn test_set_fields() {
        let mut alloc = BudgetAllocation::new(CategoryId::new(), month());
        alloc.set_budgeted(Money::from_cents(50000));
        alloc.set_carryover(true);
        assert_eq!(alloc.budgeted.cents(), 50000);
        assert!(!alloc.is_empty());
        assert_eq!(alloc.to_string(), "2025-01 budgeted: $500.00 (carryover)");
    }

    #[test]
    fn test_serialization() {
        let alloc = BudgetAllocation::new(CategoryId::new(), month());
        let json = serde_json::to_value(&alloc).unwrap();
        assert_eq!(json["month"], "2025-01");
        let back: BudgetAllocation = serde_json::from_value(json).unwrap();
        assert_eq!(back.category_id, alloc.category_id);
    }
}
