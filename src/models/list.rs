//! Shopping list model.

use serde::{Deserialize, Serialize};

/// A named shopping list owning its items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    pub id: String,
    pub name: String,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
    /// Store layout used to order this list; may point at a deleted store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a new list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListRequest {
    pub name: String,
    #[serde(default)]
    pub store_id: Option<String>,
}

/// Request body for renaming a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub name: String,
}

/// Request body for assigning a store layout to a list.
///
/// `storeId: null` (or an empty string) clears the assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignStoreRequest {
    #[serde(default)]
    pub store_id: Option<String>,
}

impl AssignStoreRequest {
    /// The store id to persist, with blank ids treated as "no store".
    pub fn normalized(&self) -> Option<String> {
        self.store_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
