//! Completed-trip history model.

use serde::{Deserialize, Serialize};

/// An immutable record of one completed shopping trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub list_id: String,
    /// List name at completion time, not a live reference
    pub list_name: String,
    pub completed_at: String,
    pub completed_by: String,
    pub item_count: i64,
}

/// Snapshot of a purchased item, detached from the original item identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub text: String,
    pub note: String,
    pub checked_at: String,
}

/// A trip together with its history items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDetail {
    #[serde(flatten)]
    pub trip: Trip,
    pub items: Vec<HistoryItem>,
}

/// Outcome of completing a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripResult {
    pub trip_id: String,
    pub moved_count: i64,
}
