//! Store layout model.

use serde::{Deserialize, Serialize};

/// A named store layout; `sections` order is the aisle display order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sections: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a new store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<String>,
}

/// Request body for appending a section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSectionRequest {
    pub name: String,
}

/// Request body for replacing the whole section sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceSectionsRequest {
    pub sections: Vec<String>,
}
