use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teleconsultation {
    pub teleconsultation_id: String,
    pub consultation_id: Option<String>,
    pub practitioner_id: Option<String>,
    pub requested_by_user_id: String,
    pub specialist_id: Option<String>,
    pub livekit_room_name: String,
    pub status: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub created_at: String,
}

/// Room credentials issued by the backend for the managed video provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeleconsultationToken {
    pub token: String,
    pub room_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeleconsultationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<String>,
}

/// Message pushed on the specialists' real-time channel.
///
/// Only call requests carry a payload the client acts on; every other
/// `type` decodes to [`CallSignal::Other`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallSignal {
    TeleconsultationRequest { teleconsultation_id: String },
    #[serde(other)]
    Other,
}

impl CallSignal {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn teleconsultation_id(&self) -> Option<&str> {
        match self {
            CallSignal::TeleconsultationRequest {
                teleconsultation_id,
            } => Some(teleconsultation_id),
            CallSignal::Other => None,
        }
    }
}
