use super::segment;
use crate::client::{ApiClient, RequestDescriptor, Transport};
use crate::errors::ApiError;
use crate::models::{Teleconsultation, TeleconsultationRequest, TeleconsultationToken};

impl<T: Transport> ApiClient<T> {
    /// Call requests addressed to the signed-in specialist.
    pub async fn incoming_teleconsultations(&self) -> Result<Vec<Teleconsultation>, ApiError> {
        self.request(RequestDescriptor::get("/api/teleconsultations/incoming"))
            .await
    }

    pub async fn request_teleconsultation(
        &self,
        request: &TeleconsultationRequest,
    ) -> Result<Teleconsultation, ApiError> {
        self.request(RequestDescriptor::post("/api/teleconsultations/").json(request)?)
            .await
    }

    pub async fn accept_teleconsultation(
        &self,
        teleconsultation_id: &str,
    ) -> Result<Teleconsultation, ApiError> {
        let path = format!("/api/teleconsultations/{}/accept", segment(teleconsultation_id));
        self.request(RequestDescriptor::post(path)).await
    }

    pub async fn end_teleconsultation(
        &self,
        teleconsultation_id: &str,
    ) -> Result<Teleconsultation, ApiError> {
        let path = format!("/api/teleconsultations/{}/end", segment(teleconsultation_id));
        self.request(RequestDescriptor::post(path)).await
    }

    /// Room credentials for joining the call.
    pub async fn teleconsultation_token(
        &self,
        teleconsultation_id: &str,
    ) -> Result<TeleconsultationToken, ApiError> {
        let path = format!("/api/teleconsultations/{}/token", segment(teleconsultation_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn get_teleconsultation(
        &self,
        teleconsultation_id: &str,
    ) -> Result<Teleconsultation, ApiError> {
        let path = format!("/api/teleconsultations/{}", segment(teleconsultation_id));
        self.request(RequestDescriptor::get(path)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::testing::ScriptedTransport;
    use crate::client::{ApiClient, RequestBody};
    use crate::token_storage::MemoryTokenStore;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn client(body: serde_json::Value) -> ApiClient<ScriptedTransport> {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("a-1"), Some("r-1")));
        ApiClient::new(ScriptedTransport::ok(body), tokens)
    }

    fn teleconsultation_json(status: &str) -> serde_json::Value {
        json!({
            "teleconsultation_id": "t-1",
            "consultation_id": "c-1",
            "practitioner_id": null,
            "requested_by_user_id": "u-1",
            "specialist_id": "s-1",
            "livekit_room_name": "room-t-1",
            "status": status,
            "started_at": null,
            "ended_at": null,
            "duration_seconds": null,
            "created_at": "2024-05-01T10:00:00"
        })
    }

    #[tokio::test]
    async fn test_accept_posts_without_body() {
        let client = client(teleconsultation_json("ACTIVE"));
        let call = client.accept_teleconsultation("t-1").await.unwrap();

        assert_eq!(call.status, "ACTIVE");
        let sent = client.transport().last_call();
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.path, "/api/teleconsultations/t-1/accept");
        assert_eq!(sent.body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn test_room_token() {
        let client = client(json!({"token": "jwt-room", "room_name": "room-t-1"}));
        let token = client.teleconsultation_token("t-1").await.unwrap();

        assert_eq!(token.room_name, "room-t-1");
        assert_eq!(
            client.transport().last_call().path,
            "/api/teleconsultations/t-1/token"
        );
    }
}
