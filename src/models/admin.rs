use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub consultation_id: Option<String>,
    pub recipient_id: String,
    pub message: String,
    pub status: String,
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainingLog {
    pub log_id: String,
    pub retrained_at: String,
    pub dataset_size: u64,
    pub accuracy: Option<f64>,
    pub model_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainingLogCreate {
    pub dataset_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub model_version: String,
}

// --- Dashboard statistics ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivityItem {
    pub kind: String,
    pub id: String,
    pub summary: String,
    pub at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_practitioners: u64,
    pub total_specialists: u64,
    pub total_consultations: u64,
    pub total_images: u64,
    pub total_patients: u64,
    pub pending_approvals: u64,
    #[serde(default)]
    pub recent_activity: Vec<RecentActivityItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerStats {
    pub my_reviews: u64,
    pub pending_consultations: u64,
    pub urgent_cases: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub my_scans: u64,
    pub my_consultations: u64,
    pub pending_results: u64,
    pub urgent_alerts: u64,
}
