//! Path management for EnvelopeAPI
//!
//! Every budget (workspace) lives in its own directory under the data
//! directory:
//!
//! ```text
//! <data_dir>/
//!   <budget-id>/
//!     metadata.json
//!     accounts.json
//!     transactions.json
//!     categories.json
//!     payees.json
//!     rules.json
//!     budget.json
//! ```

use std::path::{Path, PathBuf};

use crate::error::EnvelopeError;

/// Manages the data directory root
#[derive(Debug, Clone)]
pub struct EnvelopePaths {
    /// Base directory holding all budgets
    base_dir: PathBuf,
}

impl EnvelopePaths {
    /// Create EnvelopePaths rooted at the given data directory
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base (data) directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the paths for one budget
    pub fn budget(&self, budget_id: &str) -> BudgetPaths {
        BudgetPaths::new(self.base_dir.join(budget_id))
    }

    /// Ensure the data directory exists
    pub fn ensure_directories(&self) -> Result<(), EnvelopeError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| EnvelopeError::Io(format!("Failed to create data directory: {}", e)))
    }

    /// List the budget directories that contain a metadata file, sorted by name
    pub fn budget_dirs(&self) -> Result<Vec<BudgetPaths>, EnvelopeError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.base_dir)
            .map_err(|e| EnvelopeError::Io(format!("Failed to read data directory: {}", e)))?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            let budget = BudgetPaths::new(entry.path());
            if entry.path().is_dir() && budget.metadata_file().exists() {
                dirs.push(budget);
            }
        }
        dirs.sort_by(|a, b| a.dir().cmp(b.dir()));
        Ok(dirs)
    }
}

/// Paths for the files of a single budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPaths {
    dir: PathBuf,
}

impl BudgetPaths {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Get the budget directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the path to metadata.json (budget name, sync ids)
    pub fn metadata_file(&self) -> PathBuf {
        self.dir.join("metadata.json")
    }

    /// Get the path to accounts.json
    pub fn accounts_file(&self) -> PathBuf {
        self.dir.join("accounts.json")
    }

    /// Get the path to transactions.json
    pub fn transactions_file(&self) -> PathBuf {
        self.dir.join("transactions.json")
    }

    /// Get the path to categories.json (categories and groups)
    pub fn categories_file(&self) -> PathBuf {
        self.dir.join("categories.json")
    }

    /// Get the path to payees.json
    pub fn payees_file(&self) -> PathBuf {
        self.dir.join("payees.json")
    }

    /// Get the path to rules.json
    pub fn rules_file(&self) -> PathBuf {
        self.dir.join("rules.json")
    }

    /// Get the path to budget.json (allocations and holds per month)
    pub fn budget_file(&self) -> PathBuf {
        self.dir.join("budget.json")
    }

    /// Ensure the budget directory exists
    pub fn ensure_directory(&self) -> Result<(), EnvelopeError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| EnvelopeError::Io(format!("Failed to create budget directory: {}", e)))
    }

    /// Check if the budget has been created (metadata file exists)
    pub fn is_initialized(&self) -> bool {
        self.metadata_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.budget("abc").dir(), temp_dir.path().join("abc"));
    }

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());
        let budget = paths.budget("my-budget");

        assert_eq!(
            budget.accounts_file(),
            temp_dir.path().join("my-budget").join("accounts.json")
        );
        assert_eq!(
            budget.metadata_file(),
            temp_dir.path().join("my-budget").join("metadata.json")
        );
    }

    #[test]
    fn test_budget_dirs_only_lists_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp_dir.path().to_path_buf());

        let ready = paths.budget("ready");
        ready.ensure_directory().unwrap();
        std::fs::write(ready.metadata_file(), "{}").unwrap();

        paths.budget("empty").ensure_directory().unwrap();

        let dirs = paths.budget_dirs().unwrap();
        assert_eq!(dirs, vec![ready]);
    }

    #[test]
    fn test_budget_dirs_missing_base() {
        let temp_dir = TempDir::new().unwrap();
        let paths = EnvelopePaths::with_base_dir(temp_dir.path().join("nope"));
        assert!(paths.budget_dirs().unwrap().is_empty());
    }
}
