//! Wire types exchanged through the `BudgetClient` interface
//!
//! These are the JSON shapes served over HTTP. Amounts are integers in minor
//! units (cents), dates are `YYYY-MM-DD`, months are `YYYY-MM`, and ids are
//! opaque strings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{ConditionsOp, MonthKey, RuleAction, RuleCondition, RuleStage};

/// Distinguish an absent field from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Workspaces
// ============================================================================

/// Where a budget file lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetFileState {
    /// Only on this machine
    Local,
    /// Only on the sync server
    Remote,
    /// On both
    Synced,
}

/// A budget (workspace) that can be loaded or downloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetFile {
    /// Local id, present when the budget exists on disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub name: String,
    pub state: BudgetFileState,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub offbudget: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(default)]
    pub offbudget: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub offbudget: Option<bool>,
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTransaction {
    pub id: String,
    pub amount: i64,
    pub category: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub payee: Option<String>,
    pub imported_payee: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub imported_id: Option<String>,
    pub transfer_id: Option<String>,
    pub cleared: bool,
    pub reconciled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtransactions: Vec<SubTransaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSubTransaction {
    pub amount: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A transaction to add or import
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount: i64,
    /// Existing payee id
    #[serde(default)]
    pub payee: Option<String>,
    /// Payee name, matched case-insensitively or created
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub imported_payee: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub imported_id: Option<String>,
    #[serde(default)]
    pub cleared: Option<bool>,
    #[serde(default)]
    pub subtransactions: Vec<NewSubTransaction>,
}

impl NewTransaction {
    pub fn new(date: NaiveDate, amount: i64) -> Self {
        Self {
            date,
            amount,
            payee: None,
            payee_name: None,
            imported_payee: None,
            category: None,
            notes: None,
            imported_id: None,
            cleared: None,
            subtransactions: Vec::new(),
        }
    }
}

/// Fields to change on a transaction; `null` clears an optional field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionUpdate {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub payee: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub cleared: Option<bool>,
    #[serde(default)]
    pub reconciled: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    pub learn_categories: bool,
    pub run_transfers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportError {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub errors: Vec<ImportError>,
    pub added: Vec<String>,
    pub updated: Vec<String>,
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub group_id: String,
    pub is_income: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub group_id: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub id: String,
    pub name: String,
    pub is_income: bool,
    pub hidden: bool,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategoryGroup {
    pub name: String,
    #[serde(default)]
    pub is_income: bool,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryGroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

// ============================================================================
// Payees
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    pub id: String,
    pub name: String,
    /// Default category
    pub category: Option<String>,
    /// Account id, for transfer payees
    pub transfer_acct: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPayee {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayeeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub stage: RuleStage,
    pub conditions_op: ConditionsOp,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

/// Rule contents for create and update
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    #[serde(default)]
    pub stage: RuleStage,
    #[serde(default)]
    pub conditions_op: ConditionsOp,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

// ============================================================================
// Budget months
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMonthCategory {
    pub id: String,
    pub name: String,
    pub group_id: String,
    pub is_income: bool,
    pub hidden: bool,
    pub budgeted: i64,
    /// Activity this month (negative for spending)
    pub spent: i64,
    pub balance: i64,
    pub carryover: bool,
    /// Money received, for income categories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetMonthGroup {
    pub id: String,
    pub name: String,
    pub is_income: bool,
    pub hidden: bool,
    pub budgeted: i64,
    pub spent: i64,
    pub balance: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<i64>,
    pub categories: Vec<BudgetMonthCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetMonth {
    pub month: MonthKey,
    pub income_available: i64,
    pub last_month_overspent: i64,
    pub for_next_month: i64,
    pub total_budgeted: i64,
    pub to_budget: i64,
    pub from_last_month: i64,
    pub total_income: i64,
    pub total_spent: i64,
    pub total_balance: i64,
    pub category_groups: Vec<BudgetMonthGroup>,
}

/// One operation of a batch budget update
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BudgetUpdate {
    SetAmount {
        month: MonthKey,
        #[serde(rename = "categoryId")]
        category_id: String,
        amount: i64,
    },
    SetCarryover {
        month: MonthKey,
        #[serde(rename = "categoryId")]
        category_id: String,
        flag: bool,
    },
    Hold {
        month: MonthKey,
        amount: i64,
    },
    ResetHold {
        month: MonthKey,
    },
}

// ============================================================================
// Query
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// `"date"` or `{"date": "desc"}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OrderBy {
    Field(String),
    Directed(BTreeMap<String, SortDirection>),
}

/// A query over one table of wire entities
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub table: String,
    #[serde(default)]
    pub filter: serde_json::Map<String, Value>,
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}
