use super::segment;
use crate::client::{ApiClient, RequestDescriptor, Transport};
use crate::errors::ApiError;
use crate::models::{
    ApprovalAction, AvailabilityQuery, Practitioner, PractitionerAvailable,
    PractitionerStatusUpdate, PractitionerUpdate,
};

impl<T: Transport> ApiClient<T> {
    pub async fn list_available_practitioners(
        &self,
        filter: AvailabilityQuery,
    ) -> Result<Vec<PractitionerAvailable>, ApiError> {
        let descriptor =
            RequestDescriptor::get("/api/practitioners/available").query_pairs(filter.to_query());
        self.request(descriptor).await
    }

    /// Marks the signed-in practitioner online or offline.
    pub async fn update_my_status(&self, is_online: bool) -> Result<Practitioner, ApiError> {
        let body = PractitionerStatusUpdate { is_online };
        self.request(RequestDescriptor::put("/api/practitioners/me/status").json(&body)?)
            .await
    }

    pub async fn list_practitioners(&self) -> Result<Vec<Practitioner>, ApiError> {
        self.request(RequestDescriptor::get("/api/practitioners/")).await
    }

    pub async fn get_practitioner(&self, practitioner_id: &str) -> Result<Practitioner, ApiError> {
        let path = format!("/api/practitioners/{}", segment(practitioner_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn update_practitioner(
        &self,
        practitioner_id: &str,
        update: &PractitionerUpdate,
    ) -> Result<Practitioner, ApiError> {
        let path = format!("/api/practitioners/{}", segment(practitioner_id));
        self.request(RequestDescriptor::put(path).json(update)?).await
    }

    pub async fn list_pending_practitioners(&self) -> Result<Vec<Practitioner>, ApiError> {
        self.request(RequestDescriptor::get("/api/practitioners/pending"))
            .await
    }

    pub async fn approve_or_reject(
        &self,
        practitioner_id: &str,
        action: ApprovalAction,
    ) -> Result<Practitioner, ApiError> {
        let path = format!("/api/practitioners/{}/approve", segment(practitioner_id));
        self.request(RequestDescriptor::put(path).json(&action)?).await
    }
}
