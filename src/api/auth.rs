use super::segment;
use crate::client::{ApiClient, RequestDescriptor, Transport};
use crate::errors::ApiError;
use crate::models::{LoginRequest, RegisterRequest, TokenResponse, User, UserUpdate};
use crate::token_storage::TokenPair;
use secrecy::{ExposeSecret, SecretString};

impl<T: Transport> ApiClient<T> {
    /// Exchanges credentials for a token pair and stores it.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), ApiError> {
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        let descriptor = RequestDescriptor::post("/api/auth/login")
            .json(&body)?
            .skip_auth();

        let tokens: TokenResponse = self.request(descriptor).await?;
        self.tokens().set_tokens(&TokenPair::from(tokens));
        tracing::info!("Signed in as {}", email);
        Ok(())
    }

    pub async fn register(&self, registration: &RegisterRequest) -> Result<User, ApiError> {
        let descriptor = RequestDescriptor::post("/api/auth/register")
            .json(registration)?
            .skip_auth();
        self.request(descriptor).await
    }

    /// Forgets the stored credentials. The backend keeps no session state.
    pub fn logout(&self) {
        self.tokens().clear();
        tracing::info!("Signed out");
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.request(RequestDescriptor::get("/api/users/me")).await
    }

    pub async fn update_current_user(&self, update: &UserUpdate) -> Result<User, ApiError> {
        self.request(RequestDescriptor::put("/api/users/me").json(update)?)
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.request(RequestDescriptor::get("/api/users/")).await
    }

    pub async fn deactivate_user(&self, user_id: &str) -> Result<User, ApiError> {
        let path = format!("/api/users/{}/deactivate", segment(user_id));
        self.request(RequestDescriptor::put(path)).await
    }
}
