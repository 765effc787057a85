//! Category and CategoryGroup models
//!
//! Categories are organized into groups. Income categories live in income
//! groups and receive inflows; every other category is an expense envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CategoryGroupId, CategoryId};

/// A group of related categories (e.g., "Bills", "Needs", "Wants")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    /// Unique identifier
    pub id: CategoryGroupId,

    /// Group name
    pub name: String,

    /// Whether this group holds income categories
    #[serde(default)]
    pub is_income: bool,

    /// Sort order for display
    pub sort_order: i32,

    /// Whether this group is hidden
    #[serde(default)]
    pub hidden: bool,

    /// When the group was created
    pub created_at: DateTime<Utc>,

    /// When the group was last modified
    pub updated_at: DateTime<Utc>,
}

impl CategoryGroup {
    /// Create a new expense category group
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryGroupId::new(),
            name: name.into(),
            is_income: false,
            sort_order: 0,
            hidden: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new group with a specific sort order
    pub fn with_sort_order(name: impl Into<String>, sort_order: i32) -> Self {
        let mut group = Self::new(name);
        group.sort_order = sort_order;
        group
    }

    /// Validate the group
    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        validate_name(&self.name)
    }
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A budget category within a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: CategoryId,

    /// Category name
    pub name: String,

    /// The group this category belongs to
    pub group_id: CategoryGroupId,

    /// Whether this is an income category
    #[serde(default)]
    pub is_income: bool,

    /// Sort order within the group
    pub sort_order: i32,

    /// Whether this category is hidden
    #[serde(default)]
    pub hidden: bool,

    /// When the category was created
    pub created_at: DateTime<Utc>,

    /// When the category was last modified
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Create a new category
    pub fn new(name: impl Into<String>, group_id: CategoryGroupId) -> Self {
        let now = Utc::now();
        Self {
            id: CategoryId::new(),
            name: name.into(),
            group_id,
            is_income: false,
            sort_order: 0,
            hidden: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new category with a specific sort order
    pub fn with_sort_order(
        name: impl Into<String>,
        group_id: CategoryGroupId,
        sort_order: i32,
    ) -> Self {
        let mut category = Self::new(name, group_id);
        category.sort_order = sort_order;
        category
    }

    /// Move to a different group
    pub fn move_to_group(&mut self, group_id: CategoryGroupId) {
        self.group_id = group_id;
        self.updated_at = Utc::now();
    }

    /// Validate the category
    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        validate_name(&self.name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn validate_name(name: &str) -> Result<(), CategoryValidationError> {
    if name.trim().is_empty() {
        return Err(CategoryValidationError::EmptyName);
    }

    if name.len() > 50 {
        return Err(CategoryValidationError::NameTooLong(name.len()));
    }

    Ok(())
}

/// Default category groups for new budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultCategoryGroup {
    Income,
    Bills,
    Needs,
    Wants,
    Savings,
}

impl DefaultCategoryGroup {
    /// Get all default groups in order
    pub fn all() -> &'static [Self] {
        &[
            Self::Income,
            Self::Bills,
            Self::Needs,
            Self::Wants,
            Self::Savings,
        ]
    }

    /// Get the name for this default group
    pub fn name(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Bills => "Bills",
            Self::Needs => "Needs",
            Self::Wants => "Wants",
            Self::Savings => "Savings",
        }
    }

    /// Starter categories created inside this group
    pub fn category_names(&self) -> &'static [&'static str] {
        match self {
            Self::Income => &["Income"],
            Self::Bills => &[
                "Rent/Mortgage",
                "Electric",
                "Water",
                "Internet",
                "Phone",
                "Insurance",
            ],
            Self::Needs => &["Groceries", "Transportation", "Medical", "Household"],
            Self::Wants => &["Dining Out", "Entertainment", "Shopping", "Subscriptions"],
            Self::Savings => &["Emergency Fund", "Vacation", "Large Purchases"],
        }
    }

    /// Create a CategoryGroup from this default
    pub fn to_group(&self, sort_order: i32) -> CategoryGroup {
        let mut group = CategoryGroup::with_sort_order(self.name(), sort_order);
        group.is_income = matches!(self, Self::Income);
        group
    }
}

/// Validation errors for categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryValidationError {
    EmptyName,
    NameTooLong(usize),
}

impl fmt::Display for CategoryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Category name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Category name too long ({} chars, max 50)", len)
            }
        }
    }
}

impl std::error::Error for CategoryValidationError {}
