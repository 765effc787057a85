//! Category service
//!
//! Provides business logic for categories and category groups, including
//! deletion with an optional transfer category that inherits transactions
//! and budgeted amounts.

use tracing::info;

use crate::error::{EnvelopeError, EnvelopeResult};
use crate::models::{Category, CategoryGroup, CategoryGroupId, CategoryId};
use crate::storage::Storage;

/// A group together with its categories
#[derive(Debug, Clone)]
pub struct CategoryGroupWithCategories {
    pub group: CategoryGroup,
    pub categories: Vec<Category>,
}

/// Service for category management
pub struct CategoryService<'a> {
    storage: &'a Storage,
}

impl<'a> CategoryService<'a> {
    /// Create a new category service
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn require_group(&self, id: CategoryGroupId) -> EnvelopeResult<CategoryGroup> {
        self.storage
            .categories
            .get_group(id)?
            .ok_or_else(|| EnvelopeError::category_group_not_found(id.to_string()))
    }

    fn require_category(&self, id: CategoryId) -> EnvelopeResult<Category> {
        self.storage
            .categories
            .get_category(id)?
            .ok_or_else(|| EnvelopeError::category_not_found(id.to_string()))
    }

    // === Groups ===

    /// List all groups with their categories
    pub fn list_groups(&self) -> EnvelopeResult<Vec<CategoryGroupWithCategories>> {
        self.storage
            .categories
            .get_all_groups()?
            .into_iter()
            .map(|group| {
                let categories = self.storage.categories.get_categories_in_group(group.id)?;
                Ok(CategoryGroupWithCategories { group, categories })
            })
            .collect()
    }

    /// Create a new category group
    pub fn create_group(&self, name: &str, is_income: bool, hidden: bool) -> EnvelopeResult<CategoryGroup> {
        let name = name.trim();
        if self.storage.categories.group_name_exists(name, None)? {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Category group",
                identifier: name.to_string(),
            });
        }

        let mut group =
            CategoryGroup::with_sort_order(name, self.storage.categories.next_group_sort_order()?);
        group.is_income = is_income;
        group.hidden = hidden;
        group
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.categories.upsert_group(group.clone())?;
        self.storage.categories.save()?;
        Ok(group)
    }

    /// Rename and/or hide a group
    pub fn update_group(
        &self,
        id: CategoryGroupId,
        name: Option<&str>,
        hidden: Option<bool>,
    ) -> EnvelopeResult<CategoryGroup> {
        let mut group = self.require_group(id)?;

        if let Some(name) = name {
            let name = name.trim();
            if self.storage.categories.group_name_exists(name, Some(id))? {
                return Err(EnvelopeError::Duplicate {
                    entity_type: "Category group",
                    identifier: name.to_string(),
                });
            }
            group.name = name.to_string();
        }
        if let Some(hidden) = hidden {
            group.hidden = hidden;
        }
        group
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        group.updated_at = chrono::Utc::now();

        self.storage.categories.upsert_group(group.clone())?;
        self.storage.categories.save()?;
        Ok(group)
    }

    /// Delete a group and its categories
    pub fn delete_group(&self, id: CategoryGroupId, transfer_to: Option<CategoryId>) -> EnvelopeResult<()> {
        let group = self.require_group(id)?;
        if let Some(target) = transfer_to {
            if self.require_category(target)?.group_id == id {
                return Err(EnvelopeError::Validation(
                    "Transfer category must be outside the group being deleted".into(),
                ));
            }
        }

        for category in self.storage.categories.get_categories_in_group(id)? {
            self.remove_category(category.id, transfer_to)?;
        }
        self.storage.categories.delete_group(id)?;
        self.save_all()?;

        info!(group = %id, name = %group.name, "Deleted category group");
        Ok(())
    }

    // === Categories ===

    /// List all categories
    pub fn list_categories(&self) -> EnvelopeResult<Vec<Category>> {
        self.storage.categories.get_all_categories()
    }

    /// Create a new category in a group
    pub fn create_category(&self, name: &str, group_id: CategoryGroupId, hidden: bool) -> EnvelopeResult<Category> {
        let group = self.require_group(group_id)?;
        let name = name.trim();
        if self.storage.categories.category_name_exists(name, None)? {
            return Err(EnvelopeError::Duplicate {
                entity_type: "Category",
                identifier: name.to_string(),
            });
        }

        let mut category = Category::with_sort_order(
            name,
            group_id,
            self.storage.categories.next_category_sort_order(group_id)?,
        );
        category.is_income = group.is_income;
        category.hidden = hidden;
        category
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;

        self.storage.categories.upsert_category(category.clone())?;
        self.storage.categories.save()?;
        Ok(category)
    }

    /// Rename, move and/or hide a category
    pub fn update_category(
        &self,
        id: CategoryId,
        name: Option<&str>,
        group_id: Option<CategoryGroupId>,
        hidden: Option<bool>,
    ) -> EnvelopeResult<Category> {
        let mut category = self.require_category(id)?;

        if let Some(name) = name {
            let name = name.trim();
            if self.storage.categories.category_name_exists(name, Some(id))? {
                return Err(EnvelopeError::Duplicate {
                    entity_type: "Category",
                    identifier: name.to_string(),
                });
            }
            category.name = name.to_string();
        }
        if let Some(group_id) = group_id {
            let group = self.require_group(group_id)?;
            if group.is_income != category.is_income {
                return Err(EnvelopeError::Validation(
                    "Categories cannot move between income and expense groups".into(),
                ));
            }
            category.move_to_group(group_id);
        }
        if let Some(hidden) = hidden {
            category.hidden = hidden;
        }
        category
            .validate()
            .map_err(|e| EnvelopeError::Validation(e.to_string()))?;
        category.updated_at = chrono::Utc::now();

        self.storage.categories.upsert_category(category.clone())?;
        self.storage.categories.save()?;
        Ok(category)
    }

    /// Delete a category
    ///
    /// With `transfer_to`, transactions and budgeted amounts move to that
    /// category; without it, transactions become uncategorized.
    pub fn delete_category(&self, id: CategoryId, transfer_to: Option<CategoryId>) -> EnvelopeResult<()> {
        self.require_category(id)?;
        if let Some(target) = transfer_to {
            if target == id {
                return Err(EnvelopeError::Validation(
                    "Cannot transfer a category into itself".into(),
                ));
            }
            self.require_category(target)?;
        }

        self.remove_category(id, transfer_to)?;
        self.save_all()?;

        info!(category = %id, transfer_to = ?transfer_to.map(|c| c.to_string()), "Deleted category");
        Ok(())
    }

    /// Remove a category from every repository without saving
    fn remove_category(&self, id: CategoryId, transfer_to: Option<CategoryId>) -> EnvelopeResult<()> {
        for mut txn in self.storage.transactions.get_by_category(id)? {
            if txn.replace_category(id, transfer_to) {
                self.storage.transactions.upsert(txn)?;
            }
        }

        if let Some(target) = transfer_to {
            for alloc in self.storage.budget.get_for_category(id)? {
                let mut merged = self.storage.budget.get_or_default(target, alloc.month)?;
                let budgeted = merged
                    .budgeted
                    .checked_add(alloc.budgeted)
                    .ok_or_else(|| EnvelopeError::amount_overflow("merged budget amounts"))?;
                merged.set_budgeted(budgeted);
                self.storage.budget.upsert(merged)?;
            }
        }
        self.storage.budget.delete_for_category(id)?;

        for mut payee in self.storage.payees.get_all()? {
            let had_default = payee.default_category_id == Some(id);
            if had_default || payee.category_frequency.contains_key(&id) {
                payee.forget_category(id);
                if had_default && transfer_to.is_some() {
                    payee.set_default_category(transfer_to);
                }
                self.storage.payees.upsert(payee)?;
            }
        }

        self.storage.categories.delete_category(id)?;
        Ok(())
    }

    fn save_all(&self) -> EnvelopeResult<()> {
        self.storage.categories.save()?;
        self.storage.transactions.save()?;
        self.storage.budget.save()?;
        self.storage.payees.save()
    }
}
