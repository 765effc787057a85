//! Category and CategoryGroup repository for JSON storage
//!
//! Manages loading and saving categories and their groups to categories.json

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeResult;
use crate::models::{Category, CategoryGroup, CategoryGroupId, CategoryId};

use super::file_io::{read_json, read_lock, write_json_atomic, write_lock};

/// Serializable category data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryData {
    pub groups: Vec<CategoryGroup>,
    pub categories: Vec<Category>,
}

/// Repository for category and group persistence
pub struct CategoryRepository {
    path: PathBuf,
    groups: RwLock<HashMap<CategoryGroupId, CategoryGroup>>,
    categories: RwLock<HashMap<CategoryId, Category>>,
}

impl CategoryRepository {
    /// Create a new category repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            groups: RwLock::new(HashMap::new()),
            categories: RwLock::new(HashMap::new()),
        }
    }

    /// Load categories from disk
    pub fn load(&self) -> EnvelopeResult<()> {
        let file_data: CategoryData = read_json(&self.path)?;
        self.replace_all(file_data)
    }

    /// Save categories to disk
    pub fn save(&self) -> EnvelopeResult<()> {
        write_json_atomic(&self.path, &self.snapshot()?)
    }

    /// Current contents in display order
    pub fn snapshot(&self) -> EnvelopeResult<CategoryData> {
        Ok(CategoryData {
            groups: self.get_all_groups()?,
            categories: self.get_all_categories()?,
        })
    }

    /// Replace the in-memory contents
    pub fn replace_all(&self, file_data: CategoryData) -> EnvelopeResult<()> {
        let mut groups = write_lock(&self.groups)?;
        let mut categories = write_lock(&self.categories)?;

        groups.clear();
        categories.clear();
        for group in file_data.groups {
            groups.insert(group.id, group);
        }
        for category in file_data.categories {
            categories.insert(category.id, category);
        }
        Ok(())
    }

    /// Get a group by ID
    pub fn get_group(&self, id: CategoryGroupId) -> EnvelopeResult<Option<CategoryGroup>> {
        Ok(read_lock(&self.groups)?.get(&id).cloned())
    }

    /// Get all groups ordered by sort order
    pub fn get_all_groups(&self) -> EnvelopeResult<Vec<CategoryGroup>> {
        let groups = read_lock(&self.groups)?;
        let mut list: Vec<_> = groups.values().cloned().collect();
        list.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(list)
    }

    /// Get a category by ID
    pub fn get_category(&self, id: CategoryId) -> EnvelopeResult<Option<Category>> {
        Ok(read_lock(&self.categories)?.get(&id).cloned())
    }

    /// Get all categories, ordered by their group's order and then their own
    pub fn get_all_categories(&self) -> EnvelopeResult<Vec<Category>> {
        let group_order: HashMap<CategoryGroupId, i32> = read_lock(&self.groups)?
            .values()
            .map(|g| (g.id, g.sort_order))
            .collect();
        let categories = read_lock(&self.categories)?;

        let mut list: Vec<_> = categories.values().cloned().collect();
        list.sort_by(|a, b| {
            let ga = group_order.get(&a.group_id).copied().unwrap_or(i32::MAX);
            let gb = group_order.get(&b.group_id).copied().unwrap_or(i32::MAX);
            ga.cmp(&gb)
                .then(a.sort_order.cmp(&b.sort_order))
                .then(a.name.cmp(&b.name))
        });
        Ok(list)
    }

    /// Get categories in a group
    pub fn get_categories_in_group(&self, group_id: CategoryGroupId) -> EnvelopeResult<Vec<Category>> {
        let mut list: Vec<_> = read_lock(&self.categories)?
            .values()
            .filter(|c| c.group_id == group_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(list)
    }

    /// Insert or update a group
    pub fn upsert_group(&self, group: CategoryGroup) -> EnvelopeResult<()> {
        write_lock(&self.groups)?.insert(group.id, group);
        Ok(())
    }

    /// Insert or update a category
    pub fn upsert_category(&self, category: Category) -> EnvelopeResult<()> {
        write_lock(&self.categories)?.insert(category.id, category);
        Ok(())
    }

    /// Delete a group (categories must be handled by the caller)
    pub fn delete_group(&self, id: CategoryGroupId) -> EnvelopeResult<bool> {
        Ok(write_lock(&self.groups)?.remove(&id).is_some())
    }

    /// Delete a category
    pub fn delete_category(&self, id: CategoryId) -> EnvelopeResult<bool> {
        Ok(write_lock(&self.categories)?.remove(&id).is_some())
    }

    /// Check if a group name exists (case-insensitive)
    pub fn group_name_exists(&self, name: &str, exclude_id: Option<CategoryGroupId>) -> EnvelopeResult<bool> {
        let name_lower = name.trim().to_lowercase();
        Ok(read_lock(&self.groups)?
            .values()
            .any(|g| g.name.to_lowercase() == name_lower && Some(g.id) != exclude_id))
    }

    /// Check if a category name exists anywhere in the budget (case-insensitive)
    pub fn category_name_exists(&self, name: &str, exclude_id: Option<CategoryId>) -> EnvelopeResult<bool> {
        let name_lower = name.trim().to_lowercase();
        Ok(read_lock(&self.categories)?
            .values()
            .any(|c| c.name.to_lowercase() == name_lower && Some(c.id) != exclude_id))
    }

    /// Next group sort order slot
    pub fn next_group_sort_order(&self) -> EnvelopeResult<i32> {
        Ok(read_lock(&self.groups)?
            .values()
            .map(|g| g.sort_order + 1)
            .max()
            .unwrap_or(0))
    }

    /// Next sort order slot within a group
    pub fn next_category_sort_order(&self, group_id: CategoryGroupId) -> EnvelopeResult<i32> {
        Ok(read_lock(&self.categories)?
            .values()
            .filter(|c| c.group_id == group_id)
            .map(|c| c.sort_order + 1)
            .max()
            .unwrap_or(0))
    }
}
