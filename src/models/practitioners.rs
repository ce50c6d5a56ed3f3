use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PractitionerType {
    General,
    Specialist,
}

impl PractitionerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PractitionerType::General => "GENERAL",
            PractitionerType::Specialist => "SPECIALIST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Practitioner {
    pub practitioner_id: String,
    pub user_id: String,
    pub practitioner_type: PractitionerType,
    pub approval_status: ApprovalStatus,
    pub expertise: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub is_online: bool,
    pub created_at: String,
}

/// Entry in the "who can take a call right now" listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerAvailable {
    pub practitioner_id: String,
    pub user_id: String,
    pub name: String,
    pub practitioner_type: PractitionerType,
    pub expertise: Option<String>,
    pub is_online: bool,
    pub last_active: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PractitionerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expertise: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PractitionerStatusUpdate {
    pub is_online: bool,
}

/// Admin decision on a pending practitioner. Only the final states are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApprovalAction {
    pub approval_status: ApprovalStatus,
}

impl ApprovalAction {
    pub fn approve() -> Self {
        Self {
            approval_status: ApprovalStatus::Approved,
        }
    }

    pub fn reject() -> Self {
        Self {
            approval_status: ApprovalStatus::Rejected,
        }
    }
}

/// Filters for `GET /api/practitioners/available`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub practitioner_type: Option<PractitionerType>,
    pub online_only: Option<bool>,
}

impl AvailabilityQuery {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(kind) = self.practitioner_type {
            query.push(("practitioner_type".to_string(), kind.as_str().to_string()));
        }
        if let Some(online_only) = self.online_only {
            query.push(("online_only".to_string(), online_only.to_string()));
        }
        query
    }
}
