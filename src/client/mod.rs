//! The budgeting client capability
//!
//! The HTTP layer depends only on [`BudgetClient`] and [`Connector`]. The
//! file-backed implementation lives in [`local`]; [`remote`] talks to an
//! optional sync server on its behalf.

pub mod local;
pub mod query;
pub mod remote;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::EnvelopeResult;
use crate::models::MonthKey;

pub use local::{LocalClient, LocalConnector};
use types::*;

/// One method per budgeting operation. Ids are opaque strings.
#[async_trait]
pub trait BudgetClient: Send + Sync {
    // Lifecycle

    /// Flush state and release the loaded workspace
    async fn shutdown(&self) -> EnvelopeResult<()>;

    // Workspaces

    async fn get_budgets(&self) -> EnvelopeResult<Vec<BudgetFile>>;

    /// Create a new local workspace and load it, returning its id
    async fn create_budget(&self, name: &str) -> EnvelopeResult<String>;

    async fn load_budget(&self, budget_id: &str) -> EnvelopeResult<()>;

    async fn download_budget(&self, cloud_file_id: &str, password: Option<&str>)
        -> EnvelopeResult<()>;

    async fn sync(&self) -> EnvelopeResult<()>;

    async fn run_bank_sync(&self, account_id: Option<&str>) -> EnvelopeResult<()>;

    // Accounts

    async fn get_accounts(&self) -> EnvelopeResult<Vec<Account>>;

    async fn create_account(&self, account: NewAccount, initial_balance: i64)
        -> EnvelopeResult<String>;

    async fn update_account(&self, id: &str, fields: AccountUpdate) -> EnvelopeResult<()>;

    async fn close_account(
        &self,
        id: &str,
        transfer_account_id: Option<&str>,
        transfer_category_id: Option<&str>,
    ) -> EnvelopeResult<()>;

    async fn reopen_account(&self, id: &str) -> EnvelopeResult<()>;

    async fn delete_account(&self, id: &str) -> EnvelopeResult<()>;

    async fn get_account_balance(&self, id: &str, cutoff: Option<NaiveDate>)
        -> EnvelopeResult<i64>;

    // Transactions

    async fn get_transactions(
        &self,
        account_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> EnvelopeResult<Vec<Transaction>>;

    async fn add_transactions(
        &self,
        account_id: &str,
        transactions: Vec<NewTransaction>,
        options: AddOptions,
    ) -> EnvelopeResult<Vec<String>>;

    async fn import_transactions(
        &self,
        account_id: &str,
        transactions: Vec<NewTransaction>,
    ) -> EnvelopeResult<ImportResult>;

    async fn update_transaction(&self, id: &str, fields: TransactionUpdate) -> EnvelopeResult<()>;

    async fn delete_transaction(&self, id: &str) -> EnvelopeResult<()>;

    // Categories

    async fn get_categories(&self) -> EnvelopeResult<Vec<Category>>;

    async fn create_category(&self, category: NewCategory) -> EnvelopeResult<String>;

    async fn update_category(&self, id: &str, fields: CategoryUpdate) -> EnvelopeResult<()>;

    async fn delete_category(&self, id: &str, transfer_category_id: Option<&str>)
        -> EnvelopeResult<()>;

    // Category groups

    async fn get_category_groups(&self) -> EnvelopeResult<Vec<CategoryGroup>>;

    async fn create_category_group(&self, group: NewCategoryGroup) -> EnvelopeResult<String>;

    async fn update_category_group(&self, id: &str, fields: CategoryGroupUpdate)
        -> EnvelopeResult<()>;

    async fn delete_category_group(&self, id: &str, transfer_category_id: Option<&str>)
        -> EnvelopeResult<()>;

    // Payees

    async fn get_payees(&self) -> EnvelopeResult<Vec<Payee>>;

    async fn create_payee(&self, payee: NewPayee) -> EnvelopeResult<String>;

    async fn update_payee(&self, id: &str, fields: PayeeUpdate) -> EnvelopeResult<()>;

    async fn delete_payee(&self, id: &str) -> EnvelopeResult<()>;

    async fn merge_payees(&self, target_id: &str, merge_ids: &[String]) -> EnvelopeResult<()>;

    // Rules

    async fn get_rules(&self) -> EnvelopeResult<Vec<Rule>>;

    async fn get_payee_rules(&self, payee_id: &str) -> EnvelopeResult<Vec<Rule>>;

    async fn create_rule(&self, rule: NewRule) -> EnvelopeResult<Rule>;

    async fn update_rule(&self, id: &str, rule: NewRule) -> EnvelopeResult<Rule>;

    async fn delete_rule(&self, id: &str) -> EnvelopeResult<()>;

    // Budget

    async fn get_budget_months(&self) -> EnvelopeResult<Vec<String>>;

    async fn get_budget_month(&self, month: MonthKey) -> EnvelopeResult<BudgetMonth>;

    async fn set_budget_amount(&self, month: MonthKey, category_id: &str, amount: i64)
        -> EnvelopeResult<()>;

    async fn set_budget_carryover(&self, month: MonthKey, category_id: &str, flag: bool)
        -> EnvelopeResult<()>;

    async fn hold_budget_for_next_month(&self, month: MonthKey, amount: i64)
        -> EnvelopeResult<()>;

    async fn reset_budget_hold(&self, month: MonthKey) -> EnvelopeResult<()>;

    // Misc

    async fn run_query(&self, query: Query) -> EnvelopeResult<Value>;

    async fn batch_budget_updates(&self, updates: Vec<BudgetUpdate>) -> EnvelopeResult<()>;
}

/// Starts a client from configuration
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ClientConfig) -> EnvelopeResult<Arc<dyn BudgetClient>>;
}
