//! Built-in list templates.

use serde::{Deserialize, Serialize};

/// A canned list of item texts that can seed a new list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub items: &'static [&'static str],
}

pub const BUILTIN_TEMPLATES: &[ListTemplate] = &[
    ListTemplate {
        id: "weekly-staples",
        name: "Weekly Staples",
        items: &["Milk", "Eggs", "Bread", "Bananas"],
    },
    ListTemplate {
        id: "costco-run",
        name: "Costco Run",
        items: &["Paper Towels", "Water", "Snacks", "Meat"],
    },
    ListTemplate {
        id: "pharmacy",
        name: "Pharmacy",
        items: &["Toothpaste", "Soap", "Vitamins"],
    },
];

/// Look up a built-in template by id.
pub fn find_template(id: &str) -> Option<&'static ListTemplate> {
    BUILTIN_TEMPLATES.iter().find(|t| t.id == id)
}

/// Request body for creating a list from a template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTemplateRequest {
    /// Name of the new list; defaults to the template name
    #[serde(default)]
    pub name: Option<String>,
}
