use super::segment;
use crate::client::{ApiClient, RequestDescriptor, Transport};
use crate::errors::ApiError;
use crate::models::{
    ClinicalReview, ClinicalReviewCreate, Condition, ConditionCreate, Consultation,
    ConsultationCreate, ConsultationUpdate, ImagesConsentRequest, ImagesConsentResult,
    LinkPatientRequest, Patient, PatientCreate, PatientUpdate,
};

// Patients
impl<T: Transport> ApiClient<T> {
    pub async fn create_patient(&self, patient: &PatientCreate) -> Result<Patient, ApiError> {
        self.request(RequestDescriptor::post("/api/patients/").json(patient)?)
            .await
    }

    pub async fn list_patients(&self) -> Result<Vec<Patient>, ApiError> {
        self.request(RequestDescriptor::get("/api/patients/")).await
    }

    pub async fn get_patient(&self, patient_id: &str) -> Result<Patient, ApiError> {
        let path = format!("/api/patients/{}", segment(patient_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        update: &PatientUpdate,
    ) -> Result<Patient, ApiError> {
        let path = format!("/api/patients/{}", segment(patient_id));
        self.request(RequestDescriptor::put(path).json(update)?).await
    }

    /// Links a patient record to a registered user account.
    pub async fn link_patient(&self, patient_id: &str, user_id: &str) -> Result<Patient, ApiError> {
        let path = format!("/api/patients/{}/link", segment(patient_id));
        let body = LinkPatientRequest { user_id };
        self.request(RequestDescriptor::post(path).json(&body)?).await
    }
}

// Consultations
impl<T: Transport> ApiClient<T> {
    pub async fn create_consultation(
        &self,
        consultation: &ConsultationCreate,
    ) -> Result<Consultation, ApiError> {
        self.request(RequestDescriptor::post("/api/consultations/").json(consultation)?)
            .await
    }

    pub async fn list_consultations(&self) -> Result<Vec<Consultation>, ApiError> {
        self.request(RequestDescriptor::get("/api/consultations/")).await
    }

    pub async fn get_consultation(&self, consultation_id: &str) -> Result<Consultation, ApiError> {
        let path = format!("/api/consultations/{}", segment(consultation_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn update_consultation(
        &self,
        consultation_id: &str,
        update: &ConsultationUpdate,
    ) -> Result<Consultation, ApiError> {
        let path = format!("/api/consultations/{}", segment(consultation_id));
        self.request(RequestDescriptor::put(path).json(update)?).await
    }

    /// Sets the reuse consent on every image of the consultation.
    pub async fn set_consultation_images_consent(
        &self,
        consultation_id: &str,
        consent_to_reuse: bool,
    ) -> Result<ImagesConsentResult, ApiError> {
        let path = format!("/api/consultations/{}/images-consent", segment(consultation_id));
        let body = ImagesConsentRequest { consent_to_reuse };
        self.request(RequestDescriptor::patch(path).json(&body)?).await
    }
}

// Clinical reviews
impl<T: Transport> ApiClient<T> {
    pub async fn create_review(&self, review: &ClinicalReviewCreate) -> Result<ClinicalReview, ApiError> {
        self.request(RequestDescriptor::post("/api/clinical-reviews/").json(review)?)
            .await
    }

    pub async fn list_reviews_for_consultation(
        &self,
        consultation_id: &str,
    ) -> Result<Vec<ClinicalReview>, ApiError> {
        let path = format!("/api/clinical-reviews/consultation/{}", segment(consultation_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn get_review(&self, review_id: &str) -> Result<ClinicalReview, ApiError> {
        let path = format!("/api/clinical-reviews/{}", segment(review_id));
        self.request(RequestDescriptor::get(path)).await
    }
}

// Conditions
impl<T: Transport> ApiClient<T> {
    pub async fn list_conditions(&self) -> Result<Vec<Condition>, ApiError> {
        self.request(RequestDescriptor::get("/api/conditions/")).await
    }

    pub async fn create_condition(&self, condition: &ConditionCreate) -> Result<Condition, ApiError> {
        self.request(RequestDescriptor::post("/api/conditions/").json(condition)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::testing::ScriptedTransport;
    use crate::client::{ApiClient, RequestBody};
    use crate::models::{ConsultationStatus, ConsultationUpdate, PatientCreate};
    use crate::token_storage::MemoryTokenStore;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn client(body: serde_json::Value) -> ApiClient<ScriptedTransport> {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("a-1"), Some("r-1")));
        ApiClient::new(ScriptedTransport::ok(body), tokens)
    }

    fn consultation_json() -> serde_json::Value {
        json!({
            "consultation_id": "c-1",
            "patient_id": "p-1",
            "created_by": "u-1",
            "final_predicted_condition": null,
            "final_confidence": null,
            "urgency": null,
            "status": "CLOSED",
            "created_at": "2024-05-01T10:00:00"
        })
    }

    #[tokio::test]
    async fn test_create_patient_posts_json() {
        let client = client(json!({
            "patient_id": "p-1",
            "user_id": null,
            "name": "Kofi",
            "phone_number": "+233200000000",
            "created_at": "2024-05-01T10:00:00"
        }));
        let patient = client
            .create_patient(&PatientCreate {
                name: "Kofi".to_string(),
                phone_number: Some("+233200000000".to_string()),
                user_id: None,
            })
            .await
            .unwrap();

        assert_eq!(patient.patient_id, "p-1");
        let call = client.transport().last_call();
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.path, "/api/patients/");
        assert_eq!(
            call.body,
            RequestBody::Json(json!({"name": "Kofi", "phone_number": "+233200000000"}))
        );
    }

    #[tokio::test]
    async fn test_close_consultation() {
        let client = client(consultation_json());
        let consultation = client
            .update_consultation(
                "c-1",
                &ConsultationUpdate {
                    status: Some(ConsultationStatus::Closed),
                },
            )
            .await
            .unwrap();

        assert_eq!(consultation.status, ConsultationStatus::Closed);
        let call = client.transport().last_call();
        assert_eq!(call.method, Method::PUT);
        assert_eq!(call.path, "/api/consultations/c-1");
        assert_eq!(call.body, RequestBody::Json(json!({"status": "CLOSED"})));
    }

    #[tokio::test]
    async fn test_images_consent_uses_patch() {
        let client = client(json!({"updated": 3}));
        let result = client
            .set_consultation_images_consent("c-1", true)
            .await
            .unwrap();

        assert_eq!(result.updated, 3);
        let call = client.transport().last_call();
        assert_eq!(call.method, Method::PATCH);
        assert_eq!(call.path, "/api/consultations/c-1/images-consent");
        assert_eq!(call.body, RequestBody::Json(json!({"consent_to_reuse": true})));
    }

    #[tokio::test]
    async fn test_reviews_for_consultation_path() {
        let client = client(json!([]));
        let reviews = client.list_reviews_for_consultation("c-9").await.unwrap();

        assert!(reviews.is_empty());
        assert_eq!(
            client.transport().last_call().path,
            "/api/clinical-reviews/consultation/c-9"
        );
    }
}
