//! Transaction rule model
//!
//! A rule is a list of conditions over a transaction's fields, combined with
//! `and`/`or`, plus a list of `set` actions applied when the rule matches.
//! Rules run in stage order: `pre`, then default, then `post`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::ids::RuleId;

/// When a rule runs relative to other rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStage {
    Pre,
    #[default]
    Default,
    Post,
}

/// How conditions are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConditionsOp {
    #[default]
    And,
    Or,
}

/// Transaction field a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Payee,
    ImportedPayee,
    Notes,
    Amount,
    Account,
    Category,
}

impl ConditionField {
    fn is_text(&self) -> bool {
        matches!(self, Self::ImportedPayee | Self::Notes)
    }
}

/// Comparison performed by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOp {
    Is,
    IsNot,
    Contains,
    OneOf,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A single rule condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: ConditionField,
    pub op: ConditionOp,
    #[serde(default)]
    pub value: Value,
}

/// Transaction field an action writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionField {
    Category,
    Payee,
    Notes,
    Cleared,
}

/// Action kind; only `set` is supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ActionOp {
    #[default]
    Set,
}

/// A single rule action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    pub field: ActionField,
    #[serde(default)]
    pub op: ActionOp,
    #[serde(default)]
    pub value: Value,
}

/// A transaction rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier
    pub id: RuleId,

    #[serde(default)]
    pub stage: RuleStage,

    #[serde(default)]
    pub conditions_op: ConditionsOp,

    pub conditions: Vec<RuleCondition>,

    pub actions: Vec<RuleAction>,

    /// When the rule was created
    pub created_at: DateTime<Utc>,

    /// When the rule was last modified
    pub updated_at: DateTime<Utc>,
}

/// The view of a transaction that conditions are evaluated against
#[derive(Debug, Clone, Default)]
pub struct TransactionFacts {
    pub payee: Option<String>,
    pub imported_payee: Option<String>,
    pub notes: Option<String>,
    pub amount: i64,
    pub account: Option<String>,
    pub category: Option<String>,
}

impl TransactionFacts {
    fn text(&self, field: ConditionField) -> Option<&str> {
        match field {
            ConditionField::Payee => self.payee.as_deref(),
            ConditionField::ImportedPayee => self.imported_payee.as_deref(),
            ConditionField::Notes => self.notes.as_deref(),
            ConditionField::Account => self.account.as_deref(),
            ConditionField::Category => self.category.as_deref(),
            ConditionField::Amount => None,
        }
    }
}

impl Rule {
    /// Create a rule with the default stage and `and` combination
    pub fn new(conditions: Vec<RuleCondition>, actions: Vec<RuleAction>) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::new(),
            stage: RuleStage::Default,
            conditions_op: ConditionsOp::And,
            conditions,
            actions,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the rule matches a transaction
    ///
    /// A rule without conditions matches nothing.
    pub fn matches(&self, facts: &TransactionFacts) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        match self.conditions_op {
            ConditionsOp::And => self.conditions.iter().all(|c| c.matches(facts)),
            ConditionsOp::Or => self.conditions.iter().any(|c| c.matches(facts)),
        }
    }

    /// Whether any condition pins this rule to the given payee
    pub fn references_payee(&self, payee_id: &str) -> bool {
        self.conditions.iter().any(|c| {
            c.field == ConditionField::Payee
                && match (&c.op, &c.value) {
                    (ConditionOp::Is, Value::String(id)) => id == payee_id,
                    (ConditionOp::OneOf, Value::Array(ids)) => {
                        ids.iter().any(|v| v.as_str() == Some(payee_id))
                    }
                    _ => false,
                }
        })
    }

    /// Rewrite payee references from one id to another
    pub fn replace_payee(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for condition in &mut self.conditions {
            if condition.field != ConditionField::Payee {
                continue;
            }
            match &mut condition.value {
                Value::String(id) if id == from => {
                    *id = to.to_string();
                    changed = true;
                }
                Value::Array(ids) => {
                    for id in ids.iter_mut() {
                        if id.as_str() == Some(from) {
                            *id = Value::String(to.to_string());
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }

    /// Validate the rule's shape
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.actions.is_empty() {
            return Err(RuleValidationError::NoActions);
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        for action in &self.actions {
            if action.field == ActionField::Cleared && !action.value.is_boolean() {
                return Err(RuleValidationError::InvalidValue {
                    field: "cleared".into(),
                    expected: "a boolean",
                });
            }
        }
        Ok(())
    }
}

impl RuleCondition {
    pub fn new(field: ConditionField, op: ConditionOp, value: Value) -> Self {
        Self { field, op, value }
    }

    fn matches(&self, facts: &TransactionFacts) -> bool {
        match self.op {
            ConditionOp::Is => self.equals(facts),
            ConditionOp::IsNot => !self.equals(facts),
            ConditionOp::Contains => match (facts.text(self.field), self.value.as_str()) {
                (Some(actual), Some(needle)) if self.field.is_text() => {
                    actual.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            ConditionOp::OneOf => match &self.value {
                Value::Array(values) => values.iter().any(|v| self.equals_value(facts, v)),
                _ => false,
            },
            ConditionOp::Gt | ConditionOp::Gte | ConditionOp::Lt | ConditionOp::Lte => {
                if self.field != ConditionField::Amount {
                    return false;
                }
                let Some(limit) = self.value.as_i64() else {
                    return false;
                };
                let amount = facts.amount;
                match self.op {
                    ConditionOp::Gt => amount > limit,
                    ConditionOp::Gte => amount >= limit,
                    ConditionOp::Lt => amount < limit,
                    _ => amount <= limit,
                }
            }
        }
    }

    fn equals(&self, facts: &TransactionFacts) -> bool {
        self.equals_value(facts, &self.value)
    }

    fn equals_value(&self, facts: &TransactionFacts, expected: &Value) -> bool {
        if self.field == ConditionField::Amount {
            return expected.as_i64() == Some(facts.amount);
        }
        match (facts.text(self.field), expected) {
            (None, Value::Null) => true,
            (Some(actual), Value::String(expected)) if self.field.is_text() => {
                actual.trim().eq_ignore_ascii_case(expected.trim())
            }
            (Some(actual), Value::String(expected)) => actual == expected,
            _ => false,
        }
    }

    fn validate(&self) -> Result<(), RuleValidationError> {
        let field = serde_json::to_value(self.field)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        match self.op {
            ConditionOp::OneOf if !self.value.is_array() => Err(RuleValidationError::InvalidValue {
                field,
                expected: "an array",
            }),
            ConditionOp::Gt | ConditionOp::Gte | ConditionOp::Lt | ConditionOp::Lte
                if self.field != ConditionField::Amount || !self.value.is_i64() =>
            {
                Err(RuleValidationError::InvalidValue {
                    field,
                    expected: "an integer amount",
                })
            }
            ConditionOp::Contains if !self.field.is_text() || !self.value.is_string() => {
                Err(RuleValidationError::InvalidValue {
                    field,
                    expected: "a text value on a text field",
                })
            }
            _ => Ok(()),
        }
    }
}

impl RuleAction {
    pub fn set(field: ActionField, value: Value) -> Self {
        Self {
            field,
            op: ActionOp::Set,
            value,
        }
    }
}

/// Validation errors for rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    NoActions,
    InvalidValue { field: String, expected: &'static str },
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActions => write!(f, "Rule must have at least one action"),
            Self::InvalidValue { field, expected } => {
                write!(f, "Rule condition on '{}' expects {}", field, expected)
            }
        }
    }
}

impl std::error::Error for RuleValidationError {}
