use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const FALLBACK_CATEGORY: &str = "Other";

/// Seed list for a new database
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Food & Dining",
    "Groceries",
    "Shopping",
    "Transportation",
    "Travel",
    "Bills & Utilities",
    "Entertainment",
    "Health & Fitness",
    "Education",
    "Investments",
    "Transfers",
    "Income",
    "Other",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub name: String,
    pub is_active: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertCategoryRequest {
    pub name: String,
    pub is_active: Option<bool>,
}

pub fn default_category_names() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}
