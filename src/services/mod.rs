//! Service layer for the local budgeting engine
//!
//! The service layer provides business logic on top of the storage layer,
//! handling validation, computed fields, and cross-entity operations.

pub mod account;
pub mod budget;
pub mod category;
pub mod import;
pub mod payee;
pub mod rule;
pub mod transaction;

pub use account::AccountService;
pub use budget::{BudgetOp, BudgetService, MonthSummary};
pub use category::CategoryService;
pub use import::{ImportService, ImportSummary};
pub use payee::PayeeService;
pub use rule::{RuleDefinition, RuleService};
pub use transaction::{CreateOptions, TransactionDraft, TransactionPatch, TransactionService};
