//! Import service
//!
//! Reconciles a batch of bank transactions with an account. Each row is
//! identified by its `imported_id`, or by a fingerprint of date, amount and
//! payee when the bank supplies none. Known rows are updated in place; new
//! rows go through payee resolution, rules and category learning.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{AccountId, Transaction, TransactionId, TransactionStatus};
use crate::storage::Storage;

use super::rule::RuleService;
use super::transaction::{TransactionDraft, TransactionService};

/// Outcome of an import
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub added: Vec<TransactionId>,
    pub updated: Vec<TransactionId>,
    pub errors: Vec<String>,
}

/// Service for importing bank transactions
pub struct ImportService<'a> {
    storage: &'a Storage,
}

impl<'a> ImportService<'a> {
    /// Create a new import service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// The identity used to match a row against existing transactions
    fn import_key(draft: &TransactionDraft) -> String {
        draft.imported_id.clone().unwrap_or_else(|| {
            let payee = draft
                .payee_name
                .as_deref()
                .or(draft.imported_payee.as_deref())
                .unwrap_or("");
            Transaction::fingerprint(draft.date, draft.amount, payee)
        })
    }

    /// Import rows into an account; a failing row is reported and skipped
    pub fn import(&self, account_id: AccountId, drafts: Vec<TransactionDraft>) -> EnvelopeResult<ImportSummary> {
        if self.storage.accounts.get(account_id)?.is_none() {
            return Err(EnvelopeError::account_not_found(account_id.to_string()));
        }

        let mut summary = ImportSummary::default();
        for (index, draft) in drafts.into_iter().enumerate() {
            match self.import_one(account_id, draft) {
                Ok(Imported::Added(id)) => summary.added.push(id),
                Ok(Imported::Updated(id)) => summary.updated.push(id),
                Err(e) => {
                    warn!(row = index, error = %e, "Skipping import row");
                    summary.errors.push(format!("Row {}: {}", index, e));
                }
            }
        }

        self.storage.transactions.save()?;
        self.storage.payees.save()?;

        info!(
            account = %account_id,
            added = summary.added.len(),
            updated = summary.updated.len(),
            errors = summary.errors.len(),
            "Imported transactions"
        );
        Ok(summary)
    }

    fn import_one(&self, account_id: AccountId, mut draft: TransactionDraft) -> EnvelopeResult<Imported> {
        let key = Self::import_key(&draft);
        let transactions = TransactionService::new(self.storage);

        if let Some(mut existing) = self.storage.transactions.find_by_imported_id(account_id, &key)? {
            existing.date = draft.date;
            if !existing.is_split() {
                existing.amount = draft.amount;
            }
            if draft.imported_payee.is_some() {
                existing.imported_payee = draft.imported_payee;
            }
            if let Some(notes) = draft.notes {
                existing.notes = notes;
            }
            if existing.category_id.is_none() && !existing.is_split() && !existing.is_transfer() {
                existing.category_id = draft.category_id;
            }
            if draft.cleared && existing.status == TransactionStatus::Pending {
                existing.status = TransactionStatus::Cleared;
            }
            existing
                .validate()
                .map_err(|e| EnvelopeError::Import(e.to_string()))?;
            existing.updated_at = Utc::now();

            let id = existing.id;
            self.storage.transactions.upsert(existing)?;
            return Ok(Imported::Updated(id));
        }

        draft.imported_id = Some(key);
        let (mut txn, _) = transactions.build(account_id, draft, true)?;
        RuleService::new(self.storage).apply(&mut txn)?;
        transactions.learn(&txn)?;

        let id = txn.id;
        self.storage.transactions.upsert(txn)?;
        Ok(Imported::Added(id))
    }
}

enum Imported {
    Added(TransactionId),
    Updated(TransactionId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::EnvelopePaths;
    use crate::models::{ActionField, ConditionField, ConditionOp, Money, RuleAction, RuleCondition};
    use crate::services::rule::RuleDefinition;
    use crate::services::AccountService;
    use crate::storage::create_budget;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Storage, AccountId) {
        let temp_dir = TempDir::new().unwrap();
        let root = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = create_budget(&root, "Test").unwrap();
        let account = AccountService::new(&storage)
            .create("Checking", true, Money::zero())
            .unwrap();
        (temp_dir, storage, account.id)
    }

    fn row(day: u32, cents: i64, payee: &str) -> TransactionDraft {
        let mut draft = TransactionDraft::new(
            NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            Money::from_cents(cents),
        );
        draft.payee_name = Some(payee.to_string());
        draft
    }

    #[test]
    fn test_reimport_is_deduplicated() {
        let (_temp_dir, storage, account) = setup();
        let service = ImportService::new(&storage);

        let first = service
            .import(account, vec![row(1, -1000, "Cafe"), row(2, -2500, "Grocer")])
            .unwrap();
        assert_eq!(first.added.len(), 2);
        assert!(first.updated.is_empty());

        let second = service
            .import(account, vec![row(1, -1000, "cafe"), row(3, -700, "Bakery")])
            .unwrap();
        assert_eq!(second.added.len(), 1);
        assert_eq!(second.updated, vec![first.added[0]]);
        assert_eq!(storage.transactions.get_by_account(account).unwrap().len(), 3);
    }

    #[test]
    fn test_imported_id_match_updates_amount() {
        let (_temp_dir, storage, account) = setup();
        let service = ImportService::new(&storage);

        let mut original = row(1, -1000, "Cafe");
        original.imported_id = Some("bank-1".into());
        let added = service.import(account, vec![original]).unwrap().added;

        let mut corrected = row(2, -1200, "Cafe");
        corrected.imported_id = Some("bank-1".into());
        corrected.cleared = true;
        let summary = service.import(account, vec![corrected]).unwrap();
        assert_eq!(summary.updated, added);

        let txn = storage.transactions.get(added[0]).unwrap().unwrap();
        assert_eq!(txn.amount.cents(), -1200);
        assert_eq!(txn.status, TransactionStatus::Cleared);
    }

    #[test]
    fn test_rules_run_on_new_rows() {
        let (_temp_dir, storage, account) = setup();
        RuleService::new(&storage)
            .create(RuleDefinition {
                conditions: vec![RuleCondition::new(
                    ConditionField::Amount,
                    ConditionOp::Lt,
                    json!(-100_000),
                )],
                actions: vec![RuleAction::set(ActionField::Notes, json!("large"))],
                ..Default::default()
            })
            .unwrap();

        let summary = ImportService::new(&storage)
            .import(account, vec![row(5, -150_000, "Landlord"), row(6, -10, "Gum")])
            .unwrap();

        let large = storage.transactions.get(summary.added[0]).unwrap().unwrap();
        let small = storage.transactions.get(summary.added[1]).unwrap().unwrap();
        assert_eq!(large.notes, "large");
        assert!(small.notes.is_empty());
    }

    #[test]
    fn test_bad_rows_are_collected() {
        let (_temp_dir, storage, account) = setup();
        let mut bad = row(1, -100, "Cafe");
        bad.category_id = Some(crate::models::CategoryId::new());

        let summary = ImportService::new(&storage)
            .import(account, vec![bad, row(2, -200, "Cafe")])
            .unwrap();
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.added.len(), 1);
    }

    #[test]
    fn test_rejected_row_creates_no_payee() {
        let (_temp_dir, storage, account) = setup();
        let mut bad = row(1, -100, "Ghost");
        bad.splits = vec![crate::models::Split::new(None, Money::from_cents(-40))];

        let summary = ImportService::new(&storage).import(account, vec![bad]).unwrap();
        assert_eq!(summary.errors.len(), 1);
        assert!(storage.payees.get_by_name("Ghost").unwrap().is_none());
    }
}
