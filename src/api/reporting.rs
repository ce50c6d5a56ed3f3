use super::segment;
use crate::client::{ApiClient, RequestDescriptor, Transport};
use crate::errors::ApiError;
use crate::models::{
    AdminStats, Notification, PractitionerStats, RetrainingLog, RetrainingLogCreate, UserStats,
};

impl<T: Transport> ApiClient<T> {
    pub async fn list_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.request(RequestDescriptor::get("/api/notifications/")).await
    }

    pub async fn create_retraining_log(
        &self,
        log: &RetrainingLogCreate,
    ) -> Result<RetrainingLog, ApiError> {
        self.request(RequestDescriptor::post("/api/retraining-logs/").json(log)?)
            .await
    }

    pub async fn list_retraining_logs(&self) -> Result<Vec<RetrainingLog>, ApiError> {
        self.request(RequestDescriptor::get("/api/retraining-logs/"))
            .await
    }

    pub async fn get_retraining_log(&self, log_id: &str) -> Result<RetrainingLog, ApiError> {
        let path = format!("/api/retraining-logs/{}", segment(log_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.request(RequestDescriptor::get("/api/stats/admin")).await
    }

    pub async fn practitioner_stats(&self) -> Result<PractitionerStats, ApiError> {
        self.request(RequestDescriptor::get("/api/stats/practitioner")).await
    }

    pub async fn user_stats(&self) -> Result<UserStats, ApiError> {
        self.request(RequestDescriptor::get("/api/stats/user")).await
    }
}
