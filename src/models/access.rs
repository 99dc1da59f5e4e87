//! Allow-list and caller identity models.

use serde::{Deserialize, Serialize};

/// The set of user ids permitted to use the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedUsers {
    pub uids: Vec<String>,
}

impl AllowedUsers {
    pub fn contains(&self, uid: &str) -> bool {
        self.uids.iter().any(|u| u == uid)
    }
}

/// Request body for adding a user id to the allow-list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowUserRequest {
    pub uid: String,
}

/// The authenticated caller, as forwarded by the identity gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
}

/// Response for `GET /api/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub uid: String,
    pub allowed: bool,
}
