//! Budget service
//!
//! Envelope arithmetic over months. For each expense category:
//!
//! ```text
//! balance = carried in + budgeted + activity
//! ```
//!
//! Positive balances always carry into the next month. Negative balances carry
//! only when the month's carryover flag is set; otherwise they count as
//! overspending and are taken out of next month's "to budget":
//!
//! ```text
//! to budget = income + from last month + last month overspent - budgeted - hold
//! ```
//!
//! Income is everything received by income categories, uncategorized inflows
//! and the starting balances of on-budget accounts.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::{debug, warn};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Category, CategoryGroup, CategoryId, Money, MonthKey};
use crate::storage::Storage;

/// One category's figures for a month
#[derive(Debug, Clone)]
pub struct CategoryMonth {
    pub category: Category,
    pub budgeted: Money,
    pub spent: Money,
    pub balance: Money,
    pub carryover: bool,
    /// Amount received, for income categories
    pub received: Money,
}

/// One group's figures for a month
#[derive(Debug, Clone)]
pub struct GroupMonth {
    pub group: CategoryGroup,
    pub categories: Vec<CategoryMonth>,
    pub budgeted: Money,
    pub spent: Money,
    pub balance: Money,
    pub received: Money,
}

impl GroupMonth {
    fn new(group: CategoryGroup, categories: Vec<CategoryMonth>) -> EnvelopeResult<Self> {
        let total = |field: fn(&CategoryMonth) -> Money| {
            sum(categories.iter().map(field), "group totals")
        };
        Ok(Self {
            budgeted: total(|c| c.budgeted)?,
            spent: total(|c| c.spent)?,
            balance: total(|c| c.balance)?,
            received: total(|c| c.received)?,
            group,
            categories,
        })
    }
}

fn sum<I: IntoIterator<Item = Money>>(amounts: I, context: &str) -> EnvelopeResult<Money> {
    Money::checked_sum(amounts).ok_or_else(|| EnvelopeError::amount_overflow(context))
}

fn add_to<K: Eq + Hash>(map: &mut HashMap<K, Money>, key: K, amount: Money) -> EnvelopeResult<()> {
    let entry = map.entry(key).or_default();
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| EnvelopeError::amount_overflow("monthly activity"))?;
    Ok(())
}

/// The budget for one month
#[derive(Debug, Clone)]
pub struct MonthSummary {
    pub month: MonthKey,
    pub income_available: Money,
    pub last_month_overspent: Money,
    pub for_next_month: Money,
    pub total_budgeted: Money,
    pub to_budget: Money,
    pub from_last_month: Money,
    pub total_income: Money,
    pub total_spent: Money,
    pub total_balance: Money,
    pub groups: Vec<GroupMonth>,
}

/// A single budget change, as applied by [`BudgetService::apply_batch`]
#[derive(Debug, Clone)]
pub enum BudgetOp {
    SetAmount {
        month: MonthKey,
        category_id: CategoryId,
        amount: Money,
    },
    SetCarryover {
        month: MonthKey,
        category_id: CategoryId,
        flag: bool,
    },
    Hold {
        month: MonthKey,
        amount: Money,
    },
    ResetHold {
        month: MonthKey,
    },
}

/// Per-month activity derived from transactions and accounts
#[derive(Default)]
struct Ledger {
    activity: HashMap<(CategoryId, MonthKey), Money>,
    /// Uncategorized inflows and starting balances
    other_income: HashMap<MonthKey, Money>,
    first: Option<MonthKey>,
    last: Option<MonthKey>,
}

impl Ledger {
    fn touch(&mut self, month: MonthKey) {
        self.first = Some(self.first.map_or(month, |m| m.min(month)));
        self.last = Some(self.last.map_or(month, |m| m.max(month)));
    }

    fn activity(&self, category_id: CategoryId, month: MonthKey) -> Money {
        self.activity
            .get(&(category_id, month))
            .copied()
            .unwrap_or_default()
    }
}

/// Service for budget management
pub struct BudgetService<'a> {
    storage: &'a Storage,
}

impl<'a> BudgetService<'a> {
    /// Create a new budget service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn ledger(&self) -> EnvelopeResult<Ledger> {
        let accounts: Vec<_> = self
            .storage
            .accounts
            .get_all()?
            .into_iter()
            .filter(|a| a.on_budget)
            .collect();

        let mut ledger = Ledger::default();
        for account in &accounts {
            let month = MonthKey::from_date(account.created_at.date_naive());
            add_to(&mut ledger.other_income, month, account.starting_balance)?;
            ledger.touch(month);
        }
        let on_budget_ids: HashSet<_> = accounts.iter().map(|a| a.id).collect();

        for txn in self.storage.transactions.get_all()? {
            if !on_budget_ids.contains(&txn.account_id) {
                continue;
            }
            let month = MonthKey::from_date(txn.date);
            ledger.touch(month);

            if txn.is_split() {
                for split in &txn.splits {
                    match split.category_id {
                        Some(id) => add_to(&mut ledger.activity, (id, month), split.amount)?,
                        None if split.amount.is_positive() => {
                            add_to(&mut ledger.other_income, month, split.amount)?
                        }
                        None => {}
                    }
                }
            } else if let Some(id) = txn.category_id {
                add_to(&mut ledger.activity, (id, month), txn.amount)?;
            } else if !txn.is_transfer() && txn.amount.is_positive() {
                add_to(&mut ledger.other_income, month, txn.amount)?;
            }
        }

        if let Some(month) = self.storage.budget.earliest_month()? {
            ledger.touch(month);
        }
        Ok(ledger)
    }

    /// Every month that has budget data, through at least the current month
    pub fn months(&self) -> EnvelopeResult<Vec<MonthKey>> {
        let ledger = self.ledger()?;
        let current = MonthKey::current();
        let latest = self
            .storage
            .budget
            .snapshot()?
            .allocations
            .iter()
            .map(|a| a.month)
            .chain(ledger.last)
            .max()
            .map_or(current, |m| m.max(current));
        let first = ledger.first.map_or(current, |m| m.min(current));
        Ok(first.range_to(latest))
    }

    /// Compute the budget for a month
    pub fn month_summary(&self, month: MonthKey) -> EnvelopeResult<MonthSummary> {
        let ledger = self.ledger()?;
        let groups = self.storage.categories.get_all_groups()?;
        let mut layout = Vec::with_capacity(groups.len());
        for group in groups {
            let categories = self.storage.categories.get_categories_in_group(group.id)?;
            layout.push((group, categories));
        }

        let start = ledger.first.map_or(month, |m| m.min(month));
        let mut carried: HashMap<CategoryId, Money> = HashMap::new();
        let mut prev_to_budget = Money::zero();
        let mut prev_hold = Money::zero();
        let mut prev_overspent = Money::zero();

        let mut summary = None;
        for current in start.range_to(month) {
            let allocations: HashMap<_, _> = self
                .storage
                .budget
                .get_for_month(current)?
                .into_iter()
                .map(|a| (a.category_id, a))
                .collect();

            let mut overspent = Money::zero();
            let mut group_months = Vec::with_capacity(layout.len());
            for (group, categories) in &layout {
                let mut category_months = Vec::with_capacity(categories.len());
                for category in categories {
                    let activity = ledger.activity(category.id, current);
                    let allocation = allocations.get(&category.id);
                    let carryover = allocation.is_some_and(|a| a.carryover);

                    if category.is_income {
                        category_months.push(CategoryMonth {
                            category: category.clone(),
                            budgeted: Money::zero(),
                            spent: Money::zero(),
                            balance: Money::zero(),
                            carryover: false,
                            received: activity,
                        });
                        continue;
                    }

                    let budgeted = allocation.map(|a| a.budgeted).unwrap_or_default();
                    let carried_in = carried.get(&category.id).copied().unwrap_or_default();
                    let balance = sum([carried_in, budgeted, activity], "a category balance")?;
                    let next = if balance.is_negative() && !carryover {
                        overspent = sum([overspent, balance], "overspending")?;
                        Money::zero()
                    } else {
                        balance
                    };
                    carried.insert(category.id, next);

                    category_months.push(CategoryMonth {
                        category: category.clone(),
                        budgeted,
                        spent: activity,
                        balance,
                        carryover,
                        received: Money::zero(),
                    });
                }
                group_months.push(GroupMonth::new(group.clone(), category_months)?);
            }

            let expense = || group_months.iter().filter(|g| !g.group.is_income);
            let total_budgeted = sum(expense().map(|g| g.budgeted), "total budgeted")?;
            let total_spent = sum(expense().map(|g| g.spent), "total spent")?;
            let total_balance = sum(expense().map(|g| g.balance), "total balance")?;
            let other_income = ledger.other_income.get(&current).copied().unwrap_or_default();
            let total_income = sum(
                group_months.iter().map(|g| g.received).chain([other_income]),
                "total income",
            )?;

            let hold = self.storage.budget.get_hold(current)?;
            let from_last_month = sum([prev_to_budget, prev_hold], "carried budget")?;
            let income_available = sum([total_income, from_last_month], "income available")?;
            let to_budget = sum([income_available, prev_overspent], "to budget")?
                .checked_sub(total_budgeted)
                .and_then(|m| m.checked_sub(hold))
                .ok_or_else(|| EnvelopeError::amount_overflow("to budget"))?;

            summary = Some(MonthSummary {
                month: current,
                income_available,
                last_month_overspent: prev_overspent,
                for_next_month: hold,
                total_budgeted,
                to_budget,
                from_last_month,
                total_income,
                total_spent,
                total_balance,
                groups: group_months,
            });

            prev_to_budget = to_budget;
            prev_hold = hold;
            prev_overspent = overspent;
        }

        summary.ok_or_else(|| EnvelopeError::Budget(format!("No budget data for {}", month)))
    }

    fn require_expense_category(&self, category_id: CategoryId) -> EnvelopeResult<Category> {
        let category = self
            .storage
            .categories
            .get_category(category_id)?
            .ok_or_else(|| EnvelopeError::category_not_found(category_id.to_string()))?;
        if category.is_income {
            return Err(EnvelopeError::Validation(format!(
                "'{}' is an income category and cannot be budgeted",
                category.name
            )));
        }
        Ok(category)
    }

    /// Set the amount budgeted for a category in a month
    pub fn set_amount(&self, month: MonthKey, category_id: CategoryId, amount: Money) -> EnvelopeResult<()> {
        self.apply(BudgetOp::SetAmount {
            month,
            category_id,
            amount,
        })?;
        self.storage.budget.save()
    }

    /// Set whether a category's overspending carries into the next month
    pub fn set_carryover(&self, month: MonthKey, category_id: CategoryId, flag: bool) -> EnvelopeResult<()> {
        self.apply(BudgetOp::SetCarryover {
            month,
            category_id,
            flag,
        })?;
        self.storage.budget.save()
    }

    /// Hold part of a month's "to budget" for the next month
    ///
    /// The hold is capped at what is available; returns the amount held.
    pub fn hold_for_next_month(&self, month: MonthKey, amount: Money) -> EnvelopeResult<Money> {
        let held = self.hold(month, amount)?;
        self.storage.budget.save()?;
        Ok(held)
    }

    /// Release a month's hold
    pub fn reset_hold(&self, month: MonthKey) -> EnvelopeResult<()> {
        self.apply(BudgetOp::ResetHold { month })?;
        self.storage.budget.save()
    }

    /// Apply several changes; if any fails none of them are kept
    pub fn apply_batch(&self, ops: Vec<BudgetOp>) -> EnvelopeResult<()> {
        let count = ops.len();
        let before = self.storage.budget.snapshot()?;
        for op in ops {
            if let Err(e) = self.apply(op) {
                warn!(error = %e, "Budget batch failed; discarding changes");
                self.storage.budget.replace_all(before)?;
                return Err(e);
            }
        }
        self.storage.budget.save()?;
        debug!(count, "Applied budget batch");
        Ok(())
    }

    /// Apply one change in memory
    fn apply(&self, op: BudgetOp) -> EnvelopeResult<()> {
        match op {
            BudgetOp::SetAmount {
                month,
                category_id,
                amount,
            } => {
                self.require_expense_category(category_id)?;
                let mut allocation = self.storage.budget.get_or_default(category_id, month)?;
                allocation.set_budgeted(amount);
                self.storage.budget.upsert(allocation)
            }
            BudgetOp::SetCarryover {
                month,
                category_id,
                flag,
            } => {
                self.require_expense_category(category_id)?;
                let mut allocation = self.storage.budget.get_or_default(category_id, month)?;
                allocation.set_carryover(flag);
                self.storage.budget.upsert(allocation)
            }
            BudgetOp::Hold { month, amount } => self.hold(month, amount).map(|_| ()),
            BudgetOp::ResetHold { month } => self.storage.budget.set_hold(month, Money::zero()),
        }
    }

    fn hold(&self, month: MonthKey, amount: Money) -> EnvelopeResult<Money> {
        if amount.is_negative() {
            return Err(EnvelopeError::Validation(
                "Hold amount cannot be negative".into(),
            ));
        }
        let summary = self.month_summary(month)?;
        let available =
            sum([summary.to_budget, summary.for_next_month], "the amount available")?.max(Money::zero());
        let held = amount.min(available);
        self.storage.budget.set_hold(month, held)?;
        Ok(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::EnvelopePaths;
    use crate::services::transaction::{CreateOptions, TransactionDraft, TransactionService};
    use crate::services::AccountService;
    use crate::storage::create_budget;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let root = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = create_budget(&root, "Test").unwrap();
        (temp_dir, storage)
    }

    fn category(storage: &Storage, name: &str) -> CategoryId {
        storage
            .categories
            .get_all_categories()
            .unwrap()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
            .id
    }

    fn find<'s>(summary: &'s MonthSummary, id: CategoryId) -> &'s CategoryMonth {
        summary
            .groups
            .iter()
            .flat_map(|g| &g.categories)
            .find(|c| c.category.id == id)
            .unwrap()
    }

    fn spend(storage: &Storage, account: crate::models::AccountId, month: MonthKey, category: CategoryId, cents: i64) {
        let mut draft = TransactionDraft::new(month.start_date(), Money::from_cents(cents));
        draft.category_id = Some(category);
        TransactionService::new(storage)
            .create_many(account, vec![draft], CreateOptions::default())
            .unwrap();
    }

    #[test]
    fn test_income_and_to_budget() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        let month = MonthKey::current();
        let account = AccountService::new(&storage)
            .create("Checking", true, Money::from_cents(100_000))
            .unwrap();
        let groceries = category(&storage, "Groceries");
        let income = category(&storage, "Income");

        spend(&storage, account.id, month, income, 50_000);
        spend(&storage, account.id, month, groceries, -12_000);
        service.set_amount(month, groceries, Money::from_cents(20_000)).unwrap();

        let summary = service.month_summary(month).unwrap();
        assert_eq!(summary.total_income.cents(), 150_000);
        assert_eq!(summary.total_budgeted.cents(), 20_000);
        assert_eq!(summary.total_spent.cents(), -12_000);
        assert_eq!(summary.to_budget.cents(), 130_000);
        assert_eq!(find(&summary, groceries).balance.cents(), 8_000);
        assert_eq!(find(&summary, income).received.cents(), 50_000);
    }

    #[test]
    fn test_rollover_and_overspending() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        let jan = MonthKey::new(2025, 1).unwrap();
        let feb = jan.next();
        let account = AccountService::new(&storage)
            .create("Checking", true, Money::zero())
            .unwrap();
        let groceries = category(&storage, "Groceries");
        let dining = category(&storage, "Dining Out");

        service.set_amount(jan, groceries, Money::from_cents(10_000)).unwrap();
        spend(&storage, account.id, jan, groceries, -4_000);
        spend(&storage, account.id, jan, dining, -3_000);

        let summary = service.month_summary(feb).unwrap();
        // Surplus rolls over, overspending does not
        assert_eq!(find(&summary, groceries).balance.cents(), 6_000);
        assert_eq!(find(&summary, dining).balance.cents(), 0);
        assert_eq!(summary.last_month_overspent.cents(), -3_000);
        assert_eq!(summary.from_last_month.cents(), -10_000);

        service.set_carryover(jan, dining, true).unwrap();
        let summary = service.month_summary(feb).unwrap();
        assert_eq!(find(&summary, dining).balance.cents(), -3_000);
        assert_eq!(summary.last_month_overspent.cents(), 0);
    }

    #[test]
    fn test_hold_is_capped() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        let month = MonthKey::current();
        AccountService::new(&storage)
            .create("Checking", true, Money::from_cents(5_000))
            .unwrap();

        let held = service.hold_for_next_month(month, Money::from_cents(8_000)).unwrap();
        assert_eq!(held.cents(), 5_000);

        let summary = service.month_summary(month).unwrap();
        assert_eq!(summary.for_next_month.cents(), 5_000);
        assert_eq!(summary.to_budget.cents(), 0);
        assert_eq!(service.month_summary(month.next()).unwrap().from_last_month.cents(), 5_000);

        service.reset_hold(month).unwrap();
        assert_eq!(service.month_summary(month).unwrap().to_budget.cents(), 5_000);
    }

    #[test]
    fn test_income_category_cannot_be_budgeted() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        let income = category(&storage, "Income");
        assert!(service
            .set_amount(MonthKey::current(), income, Money::from_cents(100))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_batch_rolls_back_on_error() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        let month = MonthKey::current();
        let groceries = category(&storage, "Groceries");

        let result = service.apply_batch(vec![
            BudgetOp::SetAmount {
                month,
                category_id: groceries,
                amount: Money::from_cents(500),
            },
            BudgetOp::SetAmount {
                month,
                category_id: CategoryId::new(),
                amount: Money::from_cents(500),
            },
        ]);
        assert!(result.unwrap_err().is_not_found());
        assert!(storage.budget.get(groceries, month).unwrap().is_none());

        service
            .apply_batch(vec![BudgetOp::SetAmount {
                month,
                category_id: groceries,
                amount: Money::from_cents(500),
            }])
            .unwrap();
        assert_eq!(
            storage.budget.get(groceries, month).unwrap().unwrap().budgeted.cents(),
            500
        );
    }

    #[test]
    fn test_months_without_data_is_current_month() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        assert_eq!(service.months().unwrap(), vec![MonthKey::current()]);
    }

    #[test]
    fn test_summary_overflow_is_an_error() {
        let (_temp_dir, storage) = setup();
        let service = BudgetService::new(&storage);
        let month = MonthKey::current();
        let account = AccountService::new(&storage)
            .create("Checking", true, Money::from_cents(i64::MAX))
            .unwrap();
        let groceries = category(&storage, "Groceries");

        service.set_amount(month, groceries, Money::from_cents(i64::MIN)).unwrap();
        assert!(matches!(
            service.month_summary(month),
            Err(EnvelopeError::Validation(_))
        ));

        service.set_amount(month, groceries, Money::zero()).unwrap();
        assert_eq!(service.month_summary(month).unwrap().total_income.cents(), i64::MAX);

        TransactionService::new(&storage)
            .create_many(
                account.id,
                vec![TransactionDraft::new(month.start_date(), Money::from_cents(5))],
                CreateOptions::default(),
            )
            .unwrap();
        assert!(matches!(
            service.month_summary(month),
            Err(EnvelopeError::Validation(_))
        ));
    }
}
