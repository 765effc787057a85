//! Core data models for the budgeting client
//!
//! This module contains the data structures persisted for a local budget:
//! accounts, transactions, categories, payees, rules and budget allocations.
//! The HTTP wire shapes live in `client::types`.

pub mod account;
pub mod budget;
pub mod category;
pub mod ids;
pub mod metadata;
pub mod money;
pub mod payee;
pub mod period;
pub mod rule;
pub mod transaction;

pub use account::Account;
pub use budget::{BudgetAllocation, MonthHold};
pub use category::{Category, CategoryGroup, DefaultCategoryGroup};
pub use ids::{AccountId, CategoryGroupId, CategoryId, PayeeId, RuleId, TransactionId};
pub use metadata::BudgetMetadata;
pub use money::Money;
pub use payee::Payee;
pub use period::MonthKey;
pub use rule::{
    ActionField, ConditionField, ConditionOp, ConditionsOp, Rule, RuleAction, RuleCondition,
    RuleStage, TransactionFacts,
};
pub use transaction::{Split, Transaction, TransactionStatus};
