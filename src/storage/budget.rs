//! Budget allocation repository for JSON storage
//!
//! Manages loading and saving per-month category allocations and month holds
//! to budget.json

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeResult;
use crate::models::{BudgetAllocation, CategoryId, Money, MonthHold, MonthKey};

use super::file_io::{read_json, read_lock, write_json_atomic, write_lock};

/// Serializable budget data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetData {
    #[serde(default)]
    pub allocations: Vec<BudgetAllocation>,
    #[serde(default)]
    pub holds: Vec<MonthHold>,
}

/// Composite key for budget allocations
type AllocationKey = (CategoryId, MonthKey);

/// Repository for budget allocation persistence
pub struct BudgetRepository {
    path: PathBuf,
    allocations: RwLock<HashMap<AllocationKey, BudgetAllocation>>,
    holds: RwLock<HashMap<MonthKey, Money>>,
}

impl BudgetRepository {
    /// Create a new budget repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            allocations: RwLock::new(HashMap::new()),
            holds: RwLock::new(HashMap::new()),
        }
    }

    /// Load allocations and holds from disk
    pub fn load(&self) -> EnvelopeResult<()> {
        let file_data: BudgetData = read_json(&self.path)?;
        self.replace_all(file_data)
    }

    /// Save allocations and holds to disk
    pub fn save(&self) -> EnvelopeResult<()> {
        write_json_atomic(&self.path, &self.snapshot()?)
    }

    /// Current contents ordered by month
    pub fn snapshot(&self) -> EnvelopeResult<BudgetData> {
        let mut allocations: Vec<_> = read_lock(&self.allocations)?
            .values()
            .filter(|a| !a.is_empty())
            .cloned()
            .collect();
        allocations.sort_by(|a, b| {
            a.month
                .cmp(&b.month)
                .then(a.category_id.cmp(&b.category_id))
        });

        let mut holds: Vec<_> = read_lock(&self.holds)?
            .iter()
            .map(|(month, amount)| MonthHold::new(*month, *amount))
            .collect();
        holds.sort_by(|a, b| a.month.cmp(&b.month));

        Ok(BudgetData { allocations, holds })
    }

    /// Replace the in-memory contents
    pub fn replace_all(&self, file_data: BudgetData) -> EnvelopeResult<()> {
        let mut allocations = write_lock(&self.allocations)?;
        let mut holds = write_lock(&self.holds)?;

        allocations.clear();
        holds.clear();
        for alloc in file_data.allocations {
            allocations.insert((alloc.category_id, alloc.month), alloc);
        }
        for hold in file_data.holds {
            if hold.amount.is_positive() {
                holds.insert(hold.month, hold.amount);
            }
        }
        Ok(())
    }

    /// Get an allocation
    pub fn get(&self, category_id: CategoryId, month: MonthKey) -> EnvelopeResult<Option<BudgetAllocation>> {
        Ok(read_lock(&self.allocations)?
            .get(&(category_id, month))
            .cloned())
    }

    /// Get an allocation, or an empty one if none has been stored
    pub fn get_or_default(&self, category_id: CategoryId, month: MonthKey) -> EnvelopeResult<BudgetAllocation> {
        Ok(self
            .get(category_id, month)?
            .unwrap_or_else(|| BudgetAllocation::new(category_id, month)))
    }

    /// Insert or update an allocation
    pub fn upsert(&self, allocation: BudgetAllocation) -> EnvelopeResult<()> {
        write_lock(&self.allocations)?.insert((allocation.category_id, allocation.month), allocation);
        Ok(())
    }

    /// Get every allocation for a month
    pub fn get_for_month(&self, month: MonthKey) -> EnvelopeResult<Vec<BudgetAllocation>> {
        Ok(read_lock(&self.allocations)?
            .values()
            .filter(|a| a.month == month)
            .cloned()
            .collect())
    }

    /// Get every allocation for a category, oldest first
    pub fn get_for_category(&self, category_id: CategoryId) -> EnvelopeResult<Vec<BudgetAllocation>> {
        let mut list: Vec<_> = read_lock(&self.allocations)?
            .values()
            .filter(|a| a.category_id == category_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(list)
    }

    /// Remove every allocation for a category
    pub fn delete_for_category(&self, category_id: CategoryId) -> EnvelopeResult<usize> {
        let mut allocations = write_lock(&self.allocations)?;
        let before = allocations.len();
        allocations.retain(|(id, _), _| *id != category_id);
        Ok(before - allocations.len())
    }

    /// Earliest month with any allocation or hold
    pub fn earliest_month(&self) -> EnvelopeResult<Option<MonthKey>> {
        let from_allocations = read_lock(&self.allocations)?.keys().map(|(_, m)| *m).min();
        let from_holds = read_lock(&self.holds)?.keys().copied().min();
        Ok(from_allocations.into_iter().chain(from_holds).min())
    }

    /// Amount held from a month for the next one
    pub fn get_hold(&self, month: MonthKey) -> EnvelopeResult<Money> {
        Ok(read_lock(&self.holds)?
            .get(&month)
            .copied()
            .unwrap_or_default())
    }

    /// Set the hold for a month; a non-positive amount clears it
    pub fn set_hold(&self, month: MonthKey, amount: Money) -> EnvelopeResult<()> {
        let mut holds = write_lock(&self.holds)?;
        if amount.is_positive() {
            holds.insert(month, amount);
        } else {
            holds.remove(&month);
        }
        Ok(())
    }
}
