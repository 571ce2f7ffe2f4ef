//! Prayer commitment model.

use serde::{Deserialize, Serialize};

/// A visitor's one-time commitment to pray for an incident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrayerCommitment {
    pub visitor_id: String,
    pub incident_id: String,
    #[serde(default)]
    pub created_at: String,
}

/// Request body for recording a prayer commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrayerRequest {
    pub visitor_id: String,
    pub incident_id: String,
}
