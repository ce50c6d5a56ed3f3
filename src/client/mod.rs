//! Authenticated request client.
//!
//! Every call goes through [`ApiClient::execute`], which attaches the stored
//! access token, and on a 401 runs at most one refresh at a time. Requests
//! that hit a 401 while the refresh is in flight wait for it and then replay
//! themselves with the new token.

mod refresh;
mod request;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use refresh::{Acquire, RefreshCoordinator, RefreshGuard, RefreshOutcome, RefreshWaiter};
pub use request::{FilePart, RequestBody, RequestDescriptor};
pub use transport::{RawResponse, ReqwestTransport, Transport};

use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::models::{RefreshRequest, TokenResponse};
use crate::token_storage::{TokenPair, TokenStore};
use crate::traits::{LogSessionObserver, SessionObserver};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Path of the token refresh endpoint
pub const REFRESH_PATH: &str = "/api/auth/refresh";

pub struct ApiClient<T = ReqwestTransport> {
    transport: T,
    tokens: Arc<dyn TokenStore>,
    observer: Arc<dyn SessionObserver>,
    refresh: RefreshCoordinator,
}

impl ApiClient<ReqwestTransport> {
    /// Client talking HTTP to the configured backend.
    pub fn from_config(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Ok(Self::new(ReqwestTransport::new(config)?, tokens))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, tokens: Arc<dyn TokenStore>) -> Self {
        ApiClient {
            transport,
            tokens,
            observer: Arc::new(LogSessionObserver),
            refresh: RefreshCoordinator::new(),
        }
    }

    pub fn with_session_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.access_token().is_some()
    }

    /// True while a token refresh is in flight.
    pub fn refresh_in_progress(&self) -> bool {
        self.refresh.is_refreshing()
    }

    /// Requests parked behind the in-flight refresh.
    pub fn queued_requests(&self) -> usize {
        self.refresh.waiting()
    }

    /// Sends the request and decodes the JSON response body.
    ///
    /// An empty body decodes as JSON `null`, so `R = ()` or `Option<_>`
    /// accept 204 responses.
    pub async fn request<R: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<R, ApiError> {
        let response = self.execute(&descriptor).await?;
        decode(&response)
    }

    /// Sends the request and ignores whatever body comes back.
    pub async fn request_no_content(&self, descriptor: RequestDescriptor) -> Result<(), ApiError> {
        self.execute(&descriptor).await.map(|_| ())
    }

    /// Sends the request, handling expired credentials. Returns the raw
    /// 2xx response or the error the caller should see.
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, ApiError> {
        let (response, sent_token) = self.send_with_current_token(descriptor).await?;
        if response.status != 401 {
            return into_result(response);
        }

        let error = ApiError::from_status(response.status, &response.body);
        if descriptor.skip_auth || descriptor.is_retry() {
            return Err(error);
        }

        if self.credentials_rotated(sent_token.as_ref()) {
            tracing::debug!(
                "{} {} was sent with a superseded token, replaying",
                descriptor.method,
                descriptor.path
            );
            return self.replay(descriptor).await;
        }

        match self.refresh.acquire(error) {
            Acquire::Waiter(waiter) => {
                tracing::debug!(
                    "Queued {} {} behind the token refresh",
                    descriptor.method,
                    descriptor.path
                );
                match waiter.wait().await {
                    RefreshOutcome::Refreshed => self.replay(descriptor).await,
                    RefreshOutcome::Failed(error) => Err(error),
                }
            }
            Acquire::Leader(guard) => self.refresh_and_retry(descriptor, guard).await,
        }
    }

    async fn send_with_current_token(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<(RawResponse, Option<SecretString>), ApiError> {
        let token = if descriptor.skip_auth {
            None
        } else {
            self.tokens.access_token()
        };
        let bearer = token.as_ref().map(|t| t.expose_secret().as_str());
        let response = self.transport.send(descriptor, bearer).await?;
        Ok((response, token))
    }

    fn credentials_rotated(&self, sent: Option<&SecretString>) -> bool {
        match (sent, self.tokens.access_token()) {
            (Some(sent), Some(current)) => sent.expose_secret() != current.expose_secret(),
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }

    /// Sends the request once more with whatever token is stored now. A 401
    /// here is final.
    async fn replay(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, ApiError> {
        let retry = descriptor.as_retry();
        let (response, _) = self.send_with_current_token(&retry).await?;
        into_result(response)
    }

    async fn refresh_and_retry(
        &self,
        descriptor: &RequestDescriptor,
        guard: RefreshGuard<'_>,
    ) -> Result<RawResponse, ApiError> {
        let trigger = guard.trigger().clone();

        let Some(refresh_token) = self.tokens.refresh_token() else {
            tracing::warn!("Access token rejected and no refresh token is stored");
            self.end_session();
            guard.reject(trigger.clone());
            return Err(trigger);
        };

        match self.call_refresh(&refresh_token).await {
            Ok(pair) => {
                self.tokens.set_tokens(&pair);
                let released = guard.resolve();
                tracing::info!(
                    "Access token refreshed, releasing {} queued request(s)",
                    released
                );
                self.replay(descriptor).await
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                self.end_session();
                let rejected = guard.reject(trigger.clone());
                if rejected > 0 {
                    tracing::debug!("Rejected {} queued request(s)", rejected);
                }
                Err(trigger)
            }
        }
    }

    async fn call_refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        };
        let descriptor = RequestDescriptor::post(REFRESH_PATH)
            .skip_auth()
            .json(&body)?;

        let response = into_result(self.transport.send(&descriptor, None).await?)?;
        let tokens: TokenResponse = decode(&response)?;
        Ok(tokens.into())
    }

    fn end_session(&self) {
        self.tokens.clear();
        self.observer.session_ended();
    }
}

fn into_result(response: RawResponse) -> Result<RawResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_status(response.status, &response.body))
    }
}

fn decode<R: DeserializeOwned>(response: &RawResponse) -> Result<R, ApiError> {
    let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &response.body
    };

    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        status: response.status,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedTransport, json_response, token_response};
    use super::*;
    use crate::token_storage::MemoryTokenStore;
    use crate::traits::CountingSessionObserver;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn unauthorized() -> RawResponse {
        json_response(401, json!({"detail": "Token expired"}))
    }

    fn expired_token_error() -> ApiError {
        ApiError::Http {
            status: 401,
            detail: "Token expired".to_string(),
        }
    }

    fn client_with(
        transport: ScriptedTransport,
        tokens: Arc<MemoryTokenStore>,
    ) -> (ApiClient<ScriptedTransport>, CountingSessionObserver) {
        let observer = CountingSessionObserver::new();
        let client =
            ApiClient::new(transport, tokens).with_session_observer(Arc::new(observer.clone()));
        (client, observer)
    }

    /// Backend that accepts only `new-access` and refreshes `refresh-1`.
    fn rotating_backend() -> ScriptedTransport {
        ScriptedTransport::new(|request, bearer| {
            if request.path == REFRESH_PATH {
                return Ok(token_response("new-access", "new-refresh"));
            }
            match bearer {
                Some("new-access") => Ok(json_response(200, json!({"path": request.path}))),
                _ => Ok(unauthorized()),
            }
        })
    }

    async fn wait_for_queue(client: &ApiClient<ScriptedTransport>, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.queued_requests() < expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("requests never queued behind the refresh");
    }

    #[tokio::test]
    async fn test_bearer_attached_and_body_decoded() {
        let transport = ScriptedTransport::new(|_, bearer| {
            Ok(json_response(200, json!({"bearer": bearer})))
        });
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("abc"), Some("r")));
        let (client, _) = client_with(transport, tokens);

        let body: Value = client
            .request(RequestDescriptor::get("/api/auth/me"))
            .await
            .unwrap();

        assert_eq!(body["bearer"], "abc");
        assert_eq!(client.transport().calls()[0].bearer.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_non_auth_errors_surface_with_detail() {
        let transport = ScriptedTransport::new(|_, _| {
            Ok(json_response(404, json!({"detail": "Consultation not found"})))
        });
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("abc"), Some("r")));
        let (client, _) = client_with(transport, tokens);

        let error = client
            .request::<Value>(RequestDescriptor::get("/api/consultations/x"))
            .await
            .unwrap_err();

        assert_eq!(error.status(), 404);
        assert_eq!(error.detail(), "Consultation not found");
        assert_eq!(client.transport().refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_decodes_as_unit() {
        let transport = ScriptedTransport::new(|_, _| Ok(RawResponse::new(204, Vec::new())));
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("abc"), Some("r")));
        let (client, _) = client_with(transport, tokens);

        client
            .request::<()>(RequestDescriptor::delete("/api/images/i-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_decode_error() {
        let transport =
            ScriptedTransport::new(|_, _| Ok(json_response(200, json!({"unexpected": true}))));
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("abc"), Some("r")));
        let (client, _) = client_with(transport, tokens);

        let error = client
            .request::<TokenResponse>(RequestDescriptor::get("/api/auth/me"))
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::Decode { status: 200, .. }));
    }

    #[tokio::test]
    async fn test_network_failure_propagates_without_refresh() {
        let transport = ScriptedTransport::new(|_, _| {
            Err(ApiError::Network {
                detail: "connection refused".to_string(),
            })
        });
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("abc"), Some("r")));
        let (client, _) = client_with(transport, tokens);

        let error = client
            .execute(&RequestDescriptor::get("/api/patients/"))
            .await
            .unwrap_err();
        assert_eq!(error.status(), 500);
        assert_eq!(client.transport().refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_and_request_retried() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("refresh-1")));
        let (client, observer) = client_with(rotating_backend(), tokens.clone());

        let body: Value = client
            .request(RequestDescriptor::get("/api/consultations/"))
            .await
            .unwrap();

        assert_eq!(body["path"], "/api/consultations/");
        assert_eq!(client.transport().refresh_calls(), 1);
        assert_eq!(
            tokens.access_token().unwrap().expose_secret(),
            "new-access"
        );
        assert_eq!(
            tokens.refresh_token().unwrap().expose_secret(),
            "new-refresh"
        );
        assert_eq!(observer.count(), 0);
        assert!(!client.refresh_in_progress());

        let calls = client.transport().calls();
        let refresh = calls.iter().find(|c| c.path == REFRESH_PATH).unwrap();
        assert_eq!(refresh.bearer, None);
        assert_eq!(refresh.body, RequestBody::Json(json!({"refresh_token": "refresh-1"})));
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh_and_all_replay() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("refresh-1")));
        let transport = rotating_backend().with_refresh_gate();
        let gate = transport.refresh_gate();
        let (client, observer) = client_with(transport, tokens);

        let release = async {
            wait_for_queue(&client, 3).await;
            assert!(client.refresh_in_progress());
            assert_eq!(client.transport().refresh_calls(), 1);
            gate.notify_one();
        };

        let (a, b, c, d, ()) = tokio::join!(
            client.request::<Value>(RequestDescriptor::get("/api/patients/")),
            client.request::<Value>(RequestDescriptor::get("/api/consultations/")),
            client.request::<Value>(RequestDescriptor::get("/api/notifications/")),
            client.request::<Value>(RequestDescriptor::get("/api/images/")),
            release,
        );

        assert_eq!(a.unwrap()["path"], "/api/patients/");
        assert_eq!(b.unwrap()["path"], "/api/consultations/");
        assert_eq!(c.unwrap()["path"], "/api/notifications/");
        assert_eq!(d.unwrap()["path"], "/api/images/");
        assert_eq!(client.transport().refresh_calls(), 1);
        assert_eq!(observer.count(), 0);
        assert!(!client.refresh_in_progress());
        assert_eq!(client.queued_requests(), 0);

        let replays: Vec<_> = client
            .transport()
            .calls()
            .into_iter()
            .filter(|c| c.path != REFRESH_PATH && c.bearer.as_deref() == Some("new-access"))
            .collect();
        assert_eq!(replays.len(), 4);
        assert!(replays.iter().all(|c| c.retry));
    }

    #[tokio::test]
    async fn test_refresh_failure_rejects_queue_and_ends_session() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("revoked")));
        let transport = ScriptedTransport::new(|request, _| {
            if request.path == REFRESH_PATH {
                return Ok(json_response(401, json!({"detail": "Invalid refresh token"})));
            }
            Ok(unauthorized())
        })
        .with_refresh_gate();
        let gate = transport.refresh_gate();
        let (client, observer) = client_with(transport, tokens.clone());

        let release = async {
            wait_for_queue(&client, 2).await;
            gate.notify_one();
        };

        let patients = RequestDescriptor::get("/api/patients/");
        let consultations = RequestDescriptor::get("/api/consultations/");
        let images = RequestDescriptor::get("/api/images/");
        let (leader, first, second, ()) = tokio::join!(
            client.execute(&patients),
            client.execute(&consultations),
            client.execute(&images),
            release,
        );

        assert_eq!(leader.unwrap_err(), expired_token_error());
        assert_eq!(first.unwrap_err(), expired_token_error());
        assert_eq!(second.unwrap_err(), expired_token_error());
        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
        assert_eq!(observer.count(), 1);
        assert_eq!(client.transport().refresh_calls(), 1);
        assert!(!client.refresh_in_progress());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_ends_session() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), None));
        let (client, observer) = client_with(rotating_backend(), tokens.clone());

        let error = client
            .execute(&RequestDescriptor::get("/api/auth/me"))
            .await
            .unwrap_err();

        assert_eq!(error, expired_token_error());
        assert_eq!(client.transport().refresh_calls(), 0);
        assert_eq!(observer.count(), 1);
        assert!(tokens.access_token().is_none());
        assert!(!client.refresh_in_progress());
    }

    #[tokio::test]
    async fn test_later_401_starts_new_refresh_after_failure() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("revoked")));
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        // The first refresh is refused, the next one succeeds.
        let transport = ScriptedTransport::new(move |request, bearer| {
            if request.path == REFRESH_PATH {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Ok(json_response(401, json!({"detail": "Invalid refresh token"})));
                }
                return Ok(token_response("new-access", "new-refresh"));
            }
            match bearer {
                Some("new-access") => Ok(json_response(200, json!({"path": request.path}))),
                _ => Ok(unauthorized()),
            }
        });
        let (client, observer) = client_with(transport, tokens.clone());

        let error = client
            .execute(&RequestDescriptor::get("/api/patients/"))
            .await
            .unwrap_err();
        assert_eq!(error, expired_token_error());
        assert_eq!(observer.count(), 1);
        assert!(!client.refresh_in_progress());

        tokens.set_tokens(&TokenPair::new("stale-access", "refresh-2"));

        let body: Value = client
            .request(RequestDescriptor::get("/api/patients/"))
            .await
            .unwrap();

        assert_eq!(body["path"], "/api/patients/");
        assert_eq!(client.transport().refresh_calls(), 2);
        assert_eq!(observer.count(), 1);
        assert_eq!(tokens.access_token().unwrap().expose_secret(), "new-access");
        assert!(!client.refresh_in_progress());
    }

    #[tokio::test]
    async fn test_retry_that_gets_401_is_not_refreshed_again() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("refresh-1")));
        // Refresh succeeds but the backend keeps rejecting every token.
        let transport = ScriptedTransport::new(|request, _| {
            if request.path == REFRESH_PATH {
                return Ok(token_response("new-access", "new-refresh"));
            }
            Ok(unauthorized())
        });
        let (client, observer) = client_with(transport, tokens);

        let error = client
            .execute(&RequestDescriptor::get("/api/auth/me"))
            .await
            .unwrap_err();

        assert_eq!(error.status(), 401);
        assert_eq!(client.transport().refresh_calls(), 1);
        assert_eq!(client.transport().calls().len(), 3);
        assert_eq!(observer.count(), 0);
    }

    #[tokio::test]
    async fn test_skip_auth_request_sends_no_bearer_and_never_refreshes() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("refresh-1")));
        let transport = ScriptedTransport::new(|_, _| {
            Ok(json_response(401, json!({"detail": "Incorrect email or password"})))
        });
        let (client, observer) = client_with(transport, tokens.clone());

        let error = client
            .execute(
                &RequestDescriptor::post("/api/auth/login")
                    .json(&json!({"email": "a@b.c", "password": "nope"}))
                    .unwrap()
                    .skip_auth(),
            )
            .await
            .unwrap_err();

        assert_eq!(error.detail(), "Incorrect email or password");
        assert_eq!(client.transport().calls()[0].bearer, None);
        assert_eq!(client.transport().refresh_calls(), 0);
        assert_eq!(observer.count(), 0);
        assert!(tokens.access_token().is_some());
    }

    #[tokio::test]
    async fn test_superseded_token_replays_without_second_refresh() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("refresh-1")));
        let sends = Arc::new(AtomicUsize::new(0));
        let store = tokens.clone();
        let counter = sends.clone();
        // Another task rotates the tokens while the first request is on the wire.
        let transport = ScriptedTransport::new(move |request, bearer| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                store.set_tokens(&TokenPair::new("new-access", "new-refresh"));
            }
            match bearer {
                Some("new-access") => Ok(json_response(200, json!({"path": request.path}))),
                _ => Ok(unauthorized()),
            }
        });
        let (client, _) = client_with(transport, tokens);

        let body: Value = client
            .request(RequestDescriptor::get("/api/auth/me"))
            .await
            .unwrap();

        assert_eq!(body["path"], "/api/auth/me");
        assert_eq!(client.transport().refresh_calls(), 0);
        assert_eq!(sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_releases_queue() {
        let tokens = Arc::new(MemoryTokenStore::with_tokens(Some("old-access"), Some("refresh-1")));
        let transport = rotating_backend().with_refresh_gate();
        let (client, _) = client_with(transport, tokens);

        let patients = RequestDescriptor::get("/api/patients/");
        let leader = client.execute(&patients);
        let outcome = tokio::time::timeout(Duration::from_millis(50), leader).await;
        assert!(outcome.is_err());

        assert!(!client.refresh_in_progress());
        assert_eq!(client.queued_requests(), 0);
    }
}
