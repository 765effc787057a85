//! File-backed budgeting client
//!
//! Each budget lives in its own directory under the data directory. At most
//! one budget is loaded at a time; operations that need one fail with
//! [`EnvelopeError::NoBudgetLoaded`] until `load_budget`, `create_budget` or
//! `download_budget` succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::paths::EnvelopePaths;
use crate::config::ClientConfig;
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    self, AccountId, BudgetMetadata, CategoryGroupId, CategoryId, Money, MonthKey, PayeeId,
    RuleId, Split, TransactionId, TransactionStatus,
};
use crate::services::{
    AccountService, BudgetOp, BudgetService, CategoryService, CreateOptions, ImportService,
    MonthSummary, PayeeService, RuleDefinition, RuleService, TransactionDraft, TransactionPatch,
    TransactionService,
};
use crate::storage::{self, read_json_required, Storage};

use super::query;
use super::remote::SyncServer;
use super::types::*;
use super::{BudgetClient, Connector};

macro_rules! id_parser {
    ($fn_name:ident, $id:ty, $not_found:ident) => {
        fn $fn_name(raw: &str) -> EnvelopeResult<$id> {
            <$id>::parse(raw).map_err(|_| EnvelopeError::$not_found(raw))
        }
    };
}

id_parser!(account_id, AccountId, account_not_found);
id_parser!(transaction_id, TransactionId, transaction_not_found);
id_parser!(category_id, CategoryId, category_not_found);
id_parser!(group_id, CategoryGroupId, category_group_not_found);
id_parser!(payee_id, PayeeId, payee_not_found);
id_parser!(rule_id, RuleId, rule_not_found);

fn optional<T>(raw: Option<&str>, parse: fn(&str) -> EnvelopeResult<T>) -> EnvelopeResult<Option<T>> {
    raw.map(parse).transpose()
}

/// Budgeting client over local JSON files, optionally mirrored to a sync server
pub struct LocalClient {
    root: EnvelopePaths,
    server: Option<SyncServer>,
    current: RwLock<Option<Arc<Storage>>>,
}

impl LocalClient {
    /// Create a client rooted at the configured data directory
    pub fn new(config: &ClientConfig) -> EnvelopeResult<Self> {
        let root = config.paths();
        root.ensure_directories()?;
        let server = config
            .server_url
            .as_deref()
            .map(|url| SyncServer::new(url, config.password.clone()))
            .transpose()?;
        Ok(Self {
            root,
            server,
            current: RwLock::new(None),
        })
    }

    /// The loaded budget
    async fn storage(&self) -> EnvelopeResult<Arc<Storage>> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(EnvelopeError::NoBudgetLoaded)
    }

    /// Run a read-only operation on the loaded budget
    async fn read<T, F>(&self, f: F) -> EnvelopeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> EnvelopeResult<T> + Send + 'static,
    {
        let storage = self.storage().await?;
        blocking(move || storage.read(f)).await
    }

    /// Run a change on the loaded budget; a failed change keeps nothing
    async fn write<T, F>(&self, f: F) -> EnvelopeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> EnvelopeResult<T> + Send + 'static,
    {
        let storage = self.storage().await?;
        blocking(move || storage.write(f)).await
    }

    async fn set_current(&self, storage: Storage) -> EnvelopeResult<String> {
        let metadata = storage.metadata()?;
        *self.current.write().await = Some(Arc::new(storage));
        info!(budget = %metadata.id, name = %metadata.name, "Budget loaded");
        Ok(metadata.id)
    }

    fn server(&self) -> EnvelopeResult<&SyncServer> {
        self.server
            .as_ref()
            .ok_or_else(|| EnvelopeError::Config("No sync server configured".into()))
    }

    async fn local_budgets(&self) -> EnvelopeResult<Vec<BudgetMetadata>> {
        let root = self.root.clone();
        blocking(move || {
            let mut budgets = Vec::new();
            for paths in root.budget_dirs()? {
                match read_json_required::<BudgetMetadata, _>(paths.metadata_file()) {
                    Ok(metadata) => budgets.push(metadata),
                    Err(e) => warn!(dir = %paths.dir().display(), error = %e, "Skipping unreadable budget"),
                }
            }
            Ok(budgets)
        })
        .await
    }
}

/// Run file-bound work off the async workers
async fn blocking<T, F>(f: F) -> EnvelopeResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> EnvelopeResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EnvelopeError::Storage(format!("Storage task failed: {}", e)))?
}

// ============================================================================
// Model to wire conversions
// ============================================================================

fn account(a: models::Account) -> Account {
    Account {
        id: a.id.to_string(),
        name: a.name,
        offbudget: !a.on_budget,
        closed: a.closed,
    }
}

fn transaction(t: models::Transaction) -> Transaction {
    let subtransactions = t
        .splits
        .into_iter()
        .enumerate()
        .map(|(i, s)| SubTransaction {
            id: format!("{}/{}", t.id, i),
            amount: s.amount.cents(),
            category: s.category_id.map(|c| c.to_string()),
            notes: Some(s.notes).filter(|n| !n.is_empty()),
        })
        .collect();
    Transaction {
        id: t.id.to_string(),
        account: t.account_id.to_string(),
        date: t.date,
        amount: t.amount.cents(),
        payee: t.payee_id.map(|p| p.to_string()),
        imported_payee: t.imported_payee,
        category: t.category_id.map(|c| c.to_string()),
        notes: Some(t.notes).filter(|n| !n.is_empty()),
        imported_id: t.imported_id,
        transfer_id: t.transfer_transaction_id.map(|id| id.to_string()),
        cleared: t.status.is_cleared(),
        reconciled: t.status == TransactionStatus::Reconciled,
        subtransactions,
    }
}

fn category(c: models::Category) -> Category {
    Category {
        id: c.id.to_string(),
        name: c.name,
        group_id: c.group_id.to_string(),
        is_income: c.is_income,
        hidden: c.hidden,
    }
}

fn payee(p: models::Payee) -> Payee {
    Payee {
        id: p.id.to_string(),
        name: p.name,
        category: p.default_category_id.map(|c| c.to_string()),
        transfer_acct: p.transfer_account_id.map(|a| a.to_string()),
    }
}

fn rule(r: models::Rule) -> Rule {
    Rule {
        id: r.id.to_string(),
        stage: r.stage,
        conditions_op: r.conditions_op,
        conditions: r.conditions,
        actions: r.actions,
    }
}

fn rule_definition(r: NewRule) -> RuleDefinition {
    RuleDefinition {
        stage: r.stage,
        conditions_op: r.conditions_op,
        conditions: r.conditions,
        actions: r.actions,
    }
}

fn budget_month(summary: MonthSummary) -> BudgetMonth {
    let category_groups = summary
        .groups
        .into_iter()
        .map(|g| {
            let is_income = g.group.is_income;
            BudgetMonthGroup {
                id: g.group.id.to_string(),
                name: g.group.name,
                is_income,
                hidden: g.group.hidden,
                budgeted: g.budgeted.cents(),
                spent: g.spent.cents(),
                balance: g.balance.cents(),
                received: is_income.then(|| g.received.cents()),
                categories: g
                    .categories
                    .into_iter()
                    .map(|c| BudgetMonthCategory {
                        id: c.category.id.to_string(),
                        name: c.category.name,
                        group_id: c.category.group_id.to_string(),
                        is_income: c.category.is_income,
                        hidden: c.category.hidden,
                        budgeted: c.budgeted.cents(),
                        spent: c.spent.cents(),
                        balance: c.balance.cents(),
                        carryover: c.carryover,
                        received: c.category.is_income.then(|| c.received.cents()),
                    })
                    .collect(),
            }
        })
        .collect();

    BudgetMonth {
        month: summary.month,
        income_available: summary.income_available.cents(),
        last_month_overspent: summary.last_month_overspent.cents(),
        for_next_month: summary.for_next_month.cents(),
        total_budgeted: summary.total_budgeted.cents(),
        to_budget: summary.to_budget.cents(),
        from_last_month: summary.from_last_month.cents(),
        total_income: summary.total_income.cents(),
        total_spent: summary.total_spent.cents(),
        total_balance: summary.total_balance.cents(),
        category_groups,
    }
}

fn draft(t: NewTransaction) -> EnvelopeResult<TransactionDraft> {
    let splits = t
        .subtransactions
        .into_iter()
        .map(|s| {
            Ok(Split {
                category_id: optional(s.category.as_deref(), category_id)?,
                amount: Money::from_cents(s.amount),
                notes: s.notes.unwrap_or_default(),
            })
        })
        .collect::<EnvelopeResult<Vec<_>>>()?;

    let mut draft = TransactionDraft::new(t.date, Money::from_cents(t.amount));
    draft.payee_id = optional(t.payee.as_deref(), payee_id)?;
    draft.payee_name = t.payee_name;
    draft.imported_payee = t.imported_payee;
    draft.category_id = optional(t.category.as_deref(), category_id)?;
    draft.notes = t.notes;
    draft.imported_id = t.imported_id;
    draft.cleared = t.cleared.unwrap_or(false);
    draft.splits = splits;
    Ok(draft)
}

fn budget_op(update: BudgetUpdate) -> EnvelopeResult<BudgetOp> {
    Ok(match update {
        BudgetUpdate::SetAmount {
            month,
            category_id: id,
            amount,
        } => BudgetOp::SetAmount {
            month,
            category_id: category_id(&id)?,
            amount: Money::from_cents(amount),
        },
        BudgetUpdate::SetCarryover {
            month,
            category_id: id,
            flag,
        } => BudgetOp::SetCarryover {
            month,
            category_id: category_id(&id)?,
            flag,
        },
        BudgetUpdate::Hold { month, amount } => BudgetOp::Hold {
            month,
            amount: Money::from_cents(amount),
        },
        BudgetUpdate::ResetHold { month } => BudgetOp::ResetHold { month },
    })
}

fn to_rows<T: Serialize>(items: Vec<T>) -> EnvelopeResult<Vec<Value>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(EnvelopeError::from))
        .collect()
}

#[async_trait]
impl BudgetClient for LocalClient {
    async fn shutdown(&self) -> EnvelopeResult<()> {
        if let Some(storage) = self.current.write().await.take() {
            let id = blocking(move || {
                storage.write(|s| s.save_all())?;
                Ok(storage.metadata()?.id)
            })
            .await?;
            info!(budget = %id, "Budget closed");
        }
        Ok(())
    }

    // Workspaces

    async fn get_budgets(&self) -> EnvelopeResult<Vec<BudgetFile>> {
        let local = self.local_budgets().await?;
        let remote = match &self.server {
            Some(server) => match server.list_files().await {
                Ok(files) => files,
                Err(e) => {
                    warn!(error = %e, "Could not list remote budgets");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut budgets: Vec<BudgetFile> = local
            .iter()
            .map(|m| {
                let synced = m
                    .cloud_file_id
                    .as_deref()
                    .is_some_and(|id| remote.iter().any(|f| f.file_id == id));
                BudgetFile {
                    id: Some(m.id.clone()),
                    cloud_file_id: m.cloud_file_id.clone(),
                    group_id: m.group_id.clone(),
                    name: m.name.clone(),
                    state: if synced {
                        BudgetFileState::Synced
                    } else {
                        BudgetFileState::Local
                    },
                }
            })
            .collect();

        budgets.extend(
            remote
                .into_iter()
                .filter(|f| !local.iter().any(|m| m.cloud_file_id.as_deref() == Some(&f.file_id)))
                .map(|f| BudgetFile {
                    id: None,
                    cloud_file_id: Some(f.file_id),
                    group_id: f.group_id,
                    name: f.name,
                    state: BudgetFileState::Remote,
                }),
        );
        Ok(budgets)
    }

    async fn create_budget(&self, name: &str) -> EnvelopeResult<String> {
        let root = self.root.clone();
        let name = name.to_string();
        let storage = blocking(move || storage::create_budget(&root, &name)).await?;
        self.set_current(storage).await
    }

    async fn load_budget(&self, budget_id: &str) -> EnvelopeResult<()> {
        let is_dir_name = !budget_id.is_empty()
            && !budget_id.contains(['/', '\\'])
            && budget_id != "."
            && budget_id != "..";
        let paths = if is_dir_name && self.root.budget(budget_id).is_initialized() {
            self.root.budget(budget_id)
        } else {
            // A sync file id also identifies a downloaded budget
            let metadata = self
                .local_budgets()
                .await?
                .into_iter()
                .find(|m| m.cloud_file_id.as_deref() == Some(budget_id))
                .ok_or_else(|| EnvelopeError::budget_not_found(budget_id))?;
            self.root.budget(&metadata.id)
        };
        let storage = blocking(move || Storage::open(paths)).await?;
        self.set_current(storage).await.map(|_| ())
    }

    async fn download_budget(&self, cloud_file_id: &str, password: Option<&str>) -> EnvelopeResult<()> {
        let remote = self.server()?.download(cloud_file_id, password).await?;

        let mut metadata = self
            .local_budgets()
            .await?
            .into_iter()
            .find(|m| m.cloud_file_id.as_deref() == Some(cloud_file_id))
            .unwrap_or_else(|| {
                BudgetMetadata::from_remote(&remote.name, cloud_file_id, remote.group_id.clone())
            });
        metadata.name = remote.name;
        metadata.group_id = remote.group_id.or(metadata.group_id);
        metadata.mark_synced();

        let paths = self.root.budget(&metadata.id);
        let snapshot = remote.snapshot;
        let storage = blocking(move || storage::install_snapshot(paths, metadata, snapshot)).await?;
        self.set_current(storage).await.map(|_| ())
    }

    async fn sync(&self) -> EnvelopeResult<()> {
        let storage = self.storage().await?;
        let Some(server) = &self.server else {
            debug!("No sync server configured; nothing to sync");
            return Ok(());
        };

        let (metadata, snapshot) = self
            .read(|s| Ok((s.metadata()?, s.snapshot()?)))
            .await?;
        let file_id = metadata
            .cloud_file_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let group_id = server
            .upload(&file_id, &metadata.name, metadata.group_id.as_deref(), &snapshot)
            .await?;

        let cloud_file_id = file_id.clone();
        blocking(move || {
            storage.update_metadata(|m| {
                m.cloud_file_id = Some(cloud_file_id);
                m.group_id = group_id;
                m.mark_synced();
            })
        })
        .await?;
        info!(budget = %metadata.id, file = %file_id, "Budget synced");
        Ok(())
    }

    async fn run_bank_sync(&self, account: Option<&str>) -> EnvelopeResult<()> {
        let storage = self.storage().await?;
        match account {
            Some(raw) => {
                let id = account_id(raw)?;
                let raw = raw.to_string();
                let account = blocking(move || {
                    storage
                        .read(|s| s.accounts.get(id))?
                        .ok_or_else(|| EnvelopeError::account_not_found(raw))
                })
                .await?;
                Err(EnvelopeError::Validation(format!(
                    "Account '{}' is not linked to a bank",
                    account.name
                )))
            }
            None => {
                debug!("No bank-linked accounts to sync");
                Ok(())
            }
        }
    }

    // Accounts

    async fn get_accounts(&self) -> EnvelopeResult<Vec<Account>> {
        let accounts = self.read(|s| AccountService::new(s).list()).await?;
        Ok(accounts.into_iter().map(account).collect())
    }

    async fn create_account(&self, new: NewAccount, initial_balance: i64) -> EnvelopeResult<String> {
        let created = self
            .write(move |s| {
                AccountService::new(s).create(&new.name, !new.offbudget, Money::from_cents(initial_balance))
            })
            .await?;
        Ok(created.id.to_string())
    }

    async fn update_account(&self, id: &str, fields: AccountUpdate) -> EnvelopeResult<()> {
        let id = account_id(id)?;
        self.write(move |s| {
            AccountService::new(s).update(id, fields.name.as_deref(), fields.offbudget.map(|off| !off))
        })
        .await?;
        Ok(())
    }

    async fn close_account(
        &self,
        id: &str,
        transfer_account_id: Option<&str>,
        transfer_category_id: Option<&str>,
    ) -> EnvelopeResult<()> {
        let id = account_id(id)?;
        let transfer_to = optional(transfer_account_id, account_id)?;
        let category = optional(transfer_category_id, category_id)?;
        self.write(move |s| AccountService::new(s).close(id, transfer_to, category))
            .await?;
        Ok(())
    }

    async fn reopen_account(&self, id: &str) -> EnvelopeResult<()> {
        let id = account_id(id)?;
        self.write(move |s| AccountService::new(s).reopen(id)).await?;
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> EnvelopeResult<()> {
        let id = account_id(id)?;
        self.write(move |s| AccountService::new(s).delete(id)).await
    }

    async fn get_account_balance(&self, id: &str, cutoff: Option<NaiveDate>) -> EnvelopeResult<i64> {
        let id = account_id(id)?;
        let balance = self
            .read(move |s| AccountService::new(s).balance(id, cutoff))
            .await?;
        Ok(balance.cents())
    }

    // Transactions

    async fn get_transactions(
        &self,
        account: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> EnvelopeResult<Vec<Transaction>> {
        let account = account_id(account)?;
        let transactions = self
            .read(move |s| TransactionService::new(s).list_range(account, start_date, end_date))
            .await?;
        Ok(transactions.into_iter().map(transaction).collect())
    }

    async fn add_transactions(
        &self,
        account: &str,
        transactions: Vec<NewTransaction>,
        options: AddOptions,
    ) -> EnvelopeResult<Vec<String>> {
        let account = account_id(account)?;
        let drafts = transactions
            .into_iter()
            .map(draft)
            .collect::<EnvelopeResult<Vec<_>>>()?;
        let options = CreateOptions {
            learn_categories: options.learn_categories,
            run_transfers: options.run_transfers,
            run_rules: false,
        };
        let ids = self
            .write(move |s| TransactionService::new(s).create_many(account, drafts, options))
            .await?;
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn import_transactions(
        &self,
        account: &str,
        transactions: Vec<NewTransaction>,
    ) -> EnvelopeResult<ImportResult> {
        let account = account_id(account)?;

        // Rows whose ids do not resolve are reported like any other bad row
        let mut errors = Vec::new();
        let mut drafts = Vec::with_capacity(transactions.len());
        for (index, t) in transactions.into_iter().enumerate() {
            match draft(t) {
                Ok(d) => drafts.push(d),
                Err(e) => errors.push(ImportError {
                    message: format!("Row {}: {}", index, e),
                }),
            }
        }

        let summary = self
            .write(move |s| ImportService::new(s).import(account, drafts))
            .await?;
        errors.extend(summary.errors.into_iter().map(|message| ImportError { message }));
        Ok(ImportResult {
            errors,
            added: summary.added.into_iter().map(|id| id.to_string()).collect(),
            updated: summary.updated.into_iter().map(|id| id.to_string()).collect(),
        })
    }

    async fn update_transaction(&self, id: &str, fields: TransactionUpdate) -> EnvelopeResult<()> {
        let id = transaction_id(id)?;
        let patch = TransactionPatch {
            date: fields.date,
            amount: fields.amount.map(Money::from_cents),
            payee_id: fields
                .payee
                .map(|p| optional(p.as_deref(), payee_id))
                .transpose()?,
            category_id: fields
                .category
                .map(|c| optional(c.as_deref(), category_id))
                .transpose()?,
            notes: fields.notes,
            cleared: fields.cleared,
            reconciled: fields.reconciled,
        };
        self.write(move |s| TransactionService::new(s).update(id, patch))
            .await?;
        Ok(())
    }

    async fn delete_transaction(&self, id: &str) -> EnvelopeResult<()> {
        let id = transaction_id(id)?;
        self.write(move |s| TransactionService::new(s).delete(id)).await
    }

    // Categories

    async fn get_categories(&self) -> EnvelopeResult<Vec<Category>> {
        let categories = self
            .read(|s| CategoryService::new(s).list_categories())
            .await?;
        Ok(categories.into_iter().map(category).collect())
    }

    async fn create_category(&self, new: NewCategory) -> EnvelopeResult<String> {
        let group = group_id(&new.group_id)?;
        let created = self
            .write(move |s| CategoryService::new(s).create_category(&new.name, group, new.hidden))
            .await?;
        Ok(created.id.to_string())
    }

    async fn update_category(&self, id: &str, fields: CategoryUpdate) -> EnvelopeResult<()> {
        let id = category_id(id)?;
        let group = optional(fields.group_id.as_deref(), group_id)?;
        self.write(move |s| {
            CategoryService::new(s).update_category(id, fields.name.as_deref(), group, fields.hidden)
        })
        .await?;
        Ok(())
    }

    async fn delete_category(&self, id: &str, transfer_category_id: Option<&str>) -> EnvelopeResult<()> {
        let id = category_id(id)?;
        let transfer_to = optional(transfer_category_id, category_id)?;
        self.write(move |s| CategoryService::new(s).delete_category(id, transfer_to))
            .await
    }

    // Category groups

    async fn get_category_groups(&self) -> EnvelopeResult<Vec<CategoryGroup>> {
        let groups = self.read(|s| CategoryService::new(s).list_groups()).await?;
        Ok(groups
            .into_iter()
            .map(|g| CategoryGroup {
                id: g.group.id.to_string(),
                name: g.group.name,
                is_income: g.group.is_income,
                hidden: g.group.hidden,
                categories: g.categories.into_iter().map(category).collect(),
            })
            .collect())
    }

    async fn create_category_group(&self, new: NewCategoryGroup) -> EnvelopeResult<String> {
        let created = self
            .write(move |s| CategoryService::new(s).create_group(&new.name, new.is_income, new.hidden))
            .await?;
        Ok(created.id.to_string())
    }

    async fn update_category_group(&self, id: &str, fields: CategoryGroupUpdate) -> EnvelopeResult<()> {
        let id = group_id(id)?;
        self.write(move |s| CategoryService::new(s).update_group(id, fields.name.as_deref(), fields.hidden))
            .await?;
        Ok(())
    }

    async fn delete_category_group(&self, id: &str, transfer_category_id: Option<&str>) -> EnvelopeResult<()> {
        let id = group_id(id)?;
        let transfer_to = optional(transfer_category_id, category_id)?;
        self.write(move |s| CategoryService::new(s).delete_group(id, transfer_to))
            .await
    }

    // Payees

    async fn get_payees(&self) -> EnvelopeResult<Vec<Payee>> {
        let payees = self.read(|s| PayeeService::new(s).list()).await?;
        Ok(payees.into_iter().map(payee).collect())
    }

    async fn create_payee(&self, new: NewPayee) -> EnvelopeResult<String> {
        let category = optional(new.category.as_deref(), category_id)?;
        let created = self
            .write(move |s| PayeeService::new(s).create(&new.name, category))
            .await?;
        Ok(created.id.to_string())
    }

    async fn update_payee(&self, id: &str, fields: PayeeUpdate) -> EnvelopeResult<()> {
        let id = payee_id(id)?;
        let category = fields
            .category
            .map(|c| optional(c.as_deref(), category_id))
            .transpose()?;
        self.write(move |s| PayeeService::new(s).update(id, fields.name.as_deref(), category))
            .await?;
        Ok(())
    }

    async fn delete_payee(&self, id: &str) -> EnvelopeResult<()> {
        let id = payee_id(id)?;
        self.write(move |s| PayeeService::new(s).delete(id)).await
    }

    async fn merge_payees(&self, target_id: &str, merge_ids: &[String]) -> EnvelopeResult<()> {
        let target = payee_id(target_id)?;
        let merge_ids = merge_ids
            .iter()
            .map(|id| payee_id(id))
            .collect::<EnvelopeResult<Vec<_>>>()?;
        self.write(move |s| PayeeService::new(s).merge(target, &merge_ids))
            .await?;
        Ok(())
    }

    // Rules

    async fn get_rules(&self) -> EnvelopeResult<Vec<Rule>> {
        let rules = self.read(|s| RuleService::new(s).list()).await?;
        Ok(rules.into_iter().map(rule).collect())
    }

    async fn get_payee_rules(&self, payee: &str) -> EnvelopeResult<Vec<Rule>> {
        let payee = payee_id(payee)?;
        let rules = self.read(move |s| RuleService::new(s).for_payee(payee)).await?;
        Ok(rules.into_iter().map(rule).collect())
    }

    async fn create_rule(&self, new: NewRule) -> EnvelopeResult<Rule> {
        let definition = rule_definition(new);
        let created = self
            .write(move |s| RuleService::new(s).create(definition))
            .await?;
        Ok(rule(created))
    }

    async fn update_rule(&self, id: &str, new: NewRule) -> EnvelopeResult<Rule> {
        let id = rule_id(id)?;
        let definition = rule_definition(new);
        let updated = self
            .write(move |s| RuleService::new(s).update(id, definition))
            .await?;
        Ok(rule(updated))
    }

    async fn delete_rule(&self, id: &str) -> EnvelopeResult<()> {
        let id = rule_id(id)?;
        self.write(move |s| RuleService::new(s).delete(id)).await
    }

    // Budget

    async fn get_budget_months(&self) -> EnvelopeResult<Vec<String>> {
        let months = self.read(|s| BudgetService::new(s).months()).await?;
        Ok(months.into_iter().map(|m| m.to_string()).collect())
    }

    async fn get_budget_month(&self, month: MonthKey) -> EnvelopeResult<BudgetMonth> {
        let summary = self
            .read(move |s| BudgetService::new(s).month_summary(month))
            .await?;
        Ok(budget_month(summary))
    }

    async fn set_budget_amount(&self, month: MonthKey, category: &str, amount: i64) -> EnvelopeResult<()> {
        let category = category_id(category)?;
        self.write(move |s| BudgetService::new(s).set_amount(month, category, Money::from_cents(amount)))
            .await
    }

    async fn set_budget_carryover(&self, month: MonthKey, category: &str, flag: bool) -> EnvelopeResult<()> {
        let category = category_id(category)?;
        self.write(move |s| BudgetService::new(s).set_carryover(month, category, flag))
            .await
    }

    async fn hold_budget_for_next_month(&self, month: MonthKey, amount: i64) -> EnvelopeResult<()> {
        let held = self
            .write(move |s| BudgetService::new(s).hold_for_next_month(month, Money::from_cents(amount)))
            .await?;
        debug!(%month, requested = amount, held = held.cents(), "Held budget for next month");
        Ok(())
    }

    async fn reset_budget_hold(&self, month: MonthKey) -> EnvelopeResult<()> {
        self.write(move |s| BudgetService::new(s).reset_hold(month)).await
    }

    // Misc

    async fn run_query(&self, q: Query) -> EnvelopeResult<Value> {
        let table = q.table.clone();
        let rows = self.read(move |s| table_rows(s, &table)).await?;
        Ok(json!({ "data": query::run(rows, &q)? }))
    }

    async fn batch_budget_updates(&self, updates: Vec<BudgetUpdate>) -> EnvelopeResult<()> {
        let ops = updates
            .into_iter()
            .map(budget_op)
            .collect::<EnvelopeResult<Vec<_>>>()?;
        self.write(move |s| BudgetService::new(s).apply_batch(ops)).await
    }
}

/// Every row of a queryable table, in wire form
fn table_rows(storage: &Storage, table: &str) -> EnvelopeResult<Vec<Value>> {
    match table {
        "accounts" => to_rows(storage.accounts.get_all()?.into_iter().map(account).collect()),
        "transactions" => to_rows(
            storage
                .transactions
                .get_all()?
                .into_iter()
                .map(transaction)
                .collect(),
        ),
        "categories" => to_rows(
            storage
                .categories
                .get_all_categories()?
                .into_iter()
                .map(category)
                .collect(),
        ),
        "category_groups" => to_rows(
            storage
                .categories
                .get_all_groups()?
                .into_iter()
                .map(|g| {
                    json!({
                        "id": g.id.to_string(),
                        "name": g.name,
                        "is_income": g.is_income,
                        "hidden": g.hidden,
                    })
                })
                .collect(),
        ),
        "payees" => to_rows(storage.payees.get_all()?.into_iter().map(payee).collect()),
        "rules" => to_rows(storage.rules.get_all()?.into_iter().map(rule).collect()),
        other => Err(EnvelopeError::Query(format!("Unknown table '{}'", other))),
    }
}

/// Starts a [`LocalClient`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalConnector;

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self, config: &ClientConfig) -> EnvelopeResult<Arc<dyn BudgetClient>> {
        let client = LocalClient::new(config)?;
        info!(
            data_dir = %config.data_dir.display(),
            server = config.server_url.as_deref().unwrap_or("none"),
            "Budget client started"
        );
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client() -> (TempDir, LocalClient) {
        let temp_dir = TempDir::new().unwrap();
        let client = LocalClient::new(&ClientConfig::local(temp_dir.path())).unwrap();
        (temp_dir, client)
    }

    #[tokio::test]
    async fn test_operations_require_a_loaded_budget() {
        let (_temp_dir, client) = client();
        assert!(matches!(
            client.get_accounts().await,
            Err(EnvelopeError::NoBudgetLoaded)
        ));
    }

    #[tokio::test]
    async fn test_create_and_reload_budget() {
        let (_temp_dir, client) = client();
        let id = client.create_budget("Household").await.unwrap();
        client
            .create_account(
                NewAccount {
                    name: "Checking".into(),
                    offbudget: false,
                },
                1000,
            )
            .await
            .unwrap();

        client.shutdown().await.unwrap();
        assert!(client.get_accounts().await.is_err());

        client.load_budget(&id).await.unwrap();
        let accounts = client.get_accounts().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "Checking");

        let budgets = client.get_budgets().await.unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].state, BudgetFileState::Local);
    }

    #[tokio::test]
    async fn test_bad_ids_are_not_found() {
        let (_temp_dir, client) = client();
        client.create_budget("Household").await.unwrap();

        let err = client.get_account_balance("missing", None).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(client.load_budget("../elsewhere").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_bank_sync_and_sync_without_server() {
        let (_temp_dir, client) = client();
        client.create_budget("Household").await.unwrap();
        let unnamed = client
            .create_account(NewAccount::default(), 0)
            .await
            .unwrap_err();
        assert!(unnamed.is_validation());

        let account = client
            .create_account(
                NewAccount {
                    name: "Checking".into(),
                    offbudget: false,
                },
                0,
            )
            .await
            .unwrap();
        assert!(client.run_bank_sync(None).await.is_ok());
        assert!(client.run_bank_sync(Some(&account)).await.unwrap_err().is_validation());
        assert!(client.sync().await.is_ok());
        assert!(matches!(
            client.download_budget("file-1", None).await,
            Err(EnvelopeError::Config(_))
        ));
    }
}
