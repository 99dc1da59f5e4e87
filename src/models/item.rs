//! List item model.

use serde::{Deserialize, Serialize};

/// An entry on a shopping list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub list_id: String,
    pub text: String,
    /// Free-text aisle label, matched case-insensitively against store sections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for quick-add: comma-separated item texts sharing one section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAddRequest {
    pub text: String,
    #[serde(default)]
    pub section: Option<String>,
}

/// Request body for updating an existing item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub checked: Option<bool>,
}

impl QuickAddRequest {
    /// Split the raw input on commas into trimmed, non-empty item texts.
    pub fn parts(&self) -> Vec<String> {
        self.text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The section shared by every added item; blank means none.
    pub fn normalized_section(&self) -> Option<String> {
        normalize_section(self.section.as_deref())
    }
}

/// Treat blank section labels as "no section".
pub fn normalize_section(section: Option<&str>) -> Option<String> {
    section
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
