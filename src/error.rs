//! Custom error types for EnvelopeAPI
//!
//! This module defines the error hierarchy for the budgeting client using
//! thiserror for ergonomic error definitions. HTTP-facing errors live in
//! `api::error` and wrap these.

use thiserror::Error;

/// The main error type for budgeting client operations
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Operation needs a loaded budget but none is open
    #[error("No budget loaded")]
    NoBudgetLoaded,

    /// Budget-related errors
    #[error("Budget error: {0}")]
    Budget(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Query errors
    #[error("Query error: {0}")]
    Query(String),

    /// Sync server errors
    #[error("Sync error: {0}")]
    Sync(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),
}

impl EnvelopeError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for categories
    pub fn category_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Category",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for category groups
    pub fn category_group_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Category group",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for payees
    pub fn payee_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Payee",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for rules
    pub fn rule_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Rule",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for budgets (workspaces)
    pub fn budget_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Budget",
            identifier: identifier.into(),
        }
    }

    /// A sum of amounts left the representable range
    pub fn amount_overflow(context: &str) -> Self {
        Self::Validation(format!("Amount out of range while computing {}", context))
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for EnvelopeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for EnvelopeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Sync(err.to_string())
    }
}

/// Result type alias for budgeting client operations
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
