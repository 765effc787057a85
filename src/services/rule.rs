//! Rule service
//!
//! CRUD for transaction rules and rule application to new transactions.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{
    ActionField, CategoryId, ConditionsOp, PayeeId, Rule, RuleAction, RuleCondition, RuleId,
    RuleStage, Transaction, TransactionFacts, TransactionStatus,
};
use crate::storage::Storage;

/// Rule contents supplied on create and update
#[derive(Debug, Clone, Default)]
pub struct RuleDefinition {
    pub stage: RuleStage,
    pub conditions_op: ConditionsOp,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

/// Service for rule management
pub struct RuleService<'a> {
    storage: &'a Storage,
}

impl<'a> RuleService<'a> {
    /// Create a new rule service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// All rules in execution order
    pub fn list(&self) -> EnvelopeResult<Vec<Rule>> {
        self.storage.rules.get_all()
    }

    /// Rules with a condition on the given payee
    pub fn for_payee(&self, payee_id: PayeeId) -> EnvelopeResult<Vec<Rule>> {
        let id = payee_id.to_string();
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.references_payee(&id))
            .collect())
    }

    /// Create a rule
    pub fn create(&self, definition: RuleDefinition) -> EnvelopeResult<Rule> {
        let mut rule = Rule::new(definition.conditions, definition.actions);
        rule.stage = definition.stage;
        rule.conditions_op = definition.conditions_op;
        rule.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.rules.upsert(rule.clone())?;
        self.storage.rules.save()?;
        Ok(rule)
    }

    /// Replace a rule's contents
    pub fn update(&self, id: RuleId, definition: RuleDefinition) -> EnvelopeResult<Rule> {
        let mut rule = self
            .storage
            .rules
            .get(id)?
            .ok_or_else(|| EnvelopeError::rule_not_found(id.to_string()))?;

        rule.stage = definition.stage;
        rule.conditions_op = definition.conditions_op;
        rule.conditions = definition.conditions;
        rule.actions = definition.actions;
        rule.validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        rule.updated_at = Utc::now();

        self.storage.rules.upsert(rule.clone())?;
        self.storage.rules.save()?;
        Ok(rule)
    }

    /// Delete a rule
    pub fn delete(&self, id: RuleId) -> EnvelopeResult<()> {
        if !self.storage.rules.delete(id)? {
            return Err(EnvelopeError::rule_not_found(id.to_string()));
        }
        self.storage.rules.save()
    }

    /// Run every matching rule against a transaction, returning whether it changed
    ///
    /// Rules see the transaction as left by earlier rules. Action values that
    /// do not resolve to an existing entity are skipped.
    pub fn apply(&self, txn: &mut Transaction) -> EnvelopeResult<bool> {
        let mut changed = false;
        for rule in self.list()? {
            if !rule.matches(&facts_for(txn)) {
                continue;
            }
            for action in &rule.actions {
                changed |= self.apply_action(txn, action)?;
            }
            debug!(rule = %rule.id, transaction = %txn.id, "Rule matched");
        }
        if changed {
            txn.updated_at = Utc::now();
        }
        Ok(changed)
    }

    fn apply_action(&self, txn: &mut Transaction, action: &RuleAction) -> EnvelopeResult<bool> {
        match action.field {
            ActionField::Category => {
                if txn.is_split() || txn.is_transfer() {
                    return Ok(false);
                }
                let category = match &action.value {
                    Value::Null => None,
                    Value::String(s) => match CategoryId::parse(s) {
                        Ok(id) if self.storage.categories.get_category(id)?.is_some() => Some(id),
                        _ => return Ok(false),
                    },
                    _ => return Ok(false),
                };
                let changed = txn.category_id != category;
                txn.category_id = category;
                Ok(changed)
            }
            ActionField::Payee => {
                let payee = match &action.value {
                    Value::Null => None,
                    Value::String(s) => match PayeeId::parse(s) {
                        Ok(id) if self.storage.payees.get(id)?.is_some() => Some(id),
                        _ => return Ok(false),
                    },
                    _ => return Ok(false),
                };
                let changed = txn.payee_id != payee;
                txn.payee_id = payee;
                Ok(changed)
            }
            ActionField::Notes => {
                let notes = action.value.as_str().unwrap_or_default().to_string();
                let changed = txn.notes != notes;
                txn.notes = notes;
                Ok(changed)
            }
            ActionField::Cleared => {
                let Some(cleared) = action.value.as_bool() else {
                    return Ok(false);
                };
                if txn.status == TransactionStatus::Reconciled || txn.status.is_cleared() == cleared {
                    return Ok(false);
                }
                txn.status = if cleared {
                    TransactionStatus::Cleared
                } else {
                    TransactionStatus::Pending
                };
                Ok(true)
            }
        }
    }
}

fn facts_for(txn: &Transaction) -> TransactionFacts {
    TransactionFacts {
        payee: txn.payee_id.map(|id| id.to_string()),
        imported_payee: txn.imported_payee.clone(),
        notes: Some(txn.notes.clone()).filter(|n| !n.is_empty()),
        amount: txn.amount.cents(),
        account: Some(txn.account_id.to_string()),
        category: txn.category_id.map(|id| id.to_string()),
    }
}
