//! Budget creation
//!
//! Creates a new budget directory with metadata and the default category
//! layout, or installs a budget snapshot downloaded from a sync server.

use crate::config::paths::{BudgetPaths, EnvelopePaths};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{BudgetMetadata, Category, DefaultCategoryGroup};

use super::categories::CategoryData;
use super::file_io::write_json_atomic;
use super::{BudgetSnapshot, Storage};

/// Create a new local budget with default categories and open it
pub fn create_budget(root: &EnvelopePaths, name: &str) -> EnvelopeResult<Storage> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EnvelopeError::Validation(
            "Budget name cannot be empty".into(),
        ));
    }

    root.ensure_directories()?;
    let metadata = BudgetMetadata::new(name);
    let paths = root.budget(&metadata.id);
    if paths.is_initialized() {
        return Err(EnvelopeError::Duplicate {
            entity_type: "Budget",
            identifier: metadata.id,
        });
    }

    paths.ensure_directory()?;
    write_json_atomic(paths.categories_file(), &default_categories())?;
    write_json_atomic(paths.metadata_file(), &metadata)?;

    Storage::open(paths)
}

/// Write a downloaded snapshot into a budget directory and open it
///
/// Any existing files in the directory are overwritten.
pub fn install_snapshot(
    paths: BudgetPaths,
    metadata: BudgetMetadata,
    snapshot: BudgetSnapshot,
) -> EnvelopeResult<Storage> {
    paths.ensure_directory()?;
    write_json_atomic(paths.accounts_file(), &snapshot.accounts)?;
    write_json_atomic(paths.transactions_file(), &snapshot.transactions)?;
    write_json_atomic(paths.categories_file(), &snapshot.categories)?;
    write_json_atomic(paths.payees_file(), &snapshot.payees)?;
    write_json_atomic(paths.rules_file(), &snapshot.rules)?;
    write_json_atomic(paths.budget_file(), &snapshot.budget)?;
    write_json_atomic(paths.metadata_file(), &metadata)?;

    Storage::open(paths)
}

/// Default category groups with their starter categories
fn default_categories() -> CategoryData {
    let mut groups = Vec::new();
    let mut categories = Vec::new();

    for (i, default_group) in DefaultCategoryGroup::all().iter().enumerate() {
        let group = default_group.to_group(i as i32);
        for (j, name) in default_group.category_names().iter().enumerate() {
            let mut category = Category::with_sort_order(*name, group.id, j as i32);
            category.is_income = group.is_income;
            categories.push(category);
        }
        groups.push(group);
    }

    CategoryData { groups, categories }
}
