use serde::{Deserialize, Serialize};
use std::fmt;

// --- Patients ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub phone_number: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LinkPatientRequest<'a> {
    pub user_id: &'a str,
}

// --- Consultations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Open,
    InReview,
    Closed,
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsultationStatus::Open => "OPEN",
            ConsultationStatus::InReview => "IN_REVIEW",
            ConsultationStatus::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    Urgent,
    NonUrgent,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Urgent => f.write_str("URGENT"),
            Urgency::NonUrgent => f.write_str("NON_URGENT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub consultation_id: String,
    pub patient_id: String,
    pub created_by: String,
    pub final_predicted_condition: Option<String>,
    pub final_confidence: Option<f64>,
    pub urgency: Option<Urgency>,
    pub status: ConsultationStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationCreate {
    pub patient_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConsultationStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImagesConsentRequest {
    pub consent_to_reuse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ImagesConsentResult {
    pub updated: u64,
}

// --- Clinical reviews ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalReview {
    pub review_id: String,
    pub consultation_id: String,
    pub practitioner_id: String,
    pub diagnosis: String,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
    pub is_final: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalReviewCreate {
    pub consultation_id: String,
    pub diagnosis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
}

// --- Conditions ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub condition_id: String,
    pub condition_name: String,
    pub category: Option<String>,
    pub is_predefined: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionCreate {
    pub condition_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consultation_deserialization() {
        let json = r#"
            {
                "consultation_id": "c-1",
                "patient_id": "p-1",
                "created_by": "u-1",
                "final_predicted_condition": "melanoma",
                "final_confidence": 0.91,
                "urgency": "URGENT",
                "status": "IN_REVIEW",
                "created_at": "2024-05-01T10:00:00"
            }
        "#;

        let consultation: Consultation = serde_json::from_str(json).unwrap();
        assert_eq!(consultation.status, ConsultationStatus::InReview);
        assert_eq!(consultation.urgency, Some(Urgency::Urgent));
        assert_eq!(consultation.final_confidence, Some(0.91));
    }

    #[test]
    fn test_consultation_without_urgency() {
        let json = r#"
            {
                "consultation_id": "c-2",
                "patient_id": "p-1",
                "created_by": "u-1",
                "final_predicted_condition": null,
                "final_confidence": null,
                "urgency": null,
                "status": "OPEN",
                "created_at": "2024-05-01T10:00:00"
            }
        "#;

        let consultation: Consultation = serde_json::from_str(json).unwrap();
        assert_eq!(consultation.urgency, None);
        assert_eq!(consultation.status.to_string(), "OPEN");
    }

    #[test]
    fn test_update_omits_unset_fields() {
        let update = ConsultationUpdate::default();
        assert_eq!(serde_json::to_string(&update).unwrap(), "{}");

        let update = ConsultationUpdate {
            status: Some(ConsultationStatus::Closed),
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"status":"CLOSED"}"#
        );
    }
}
