use super::request::{FilePart, RequestBody, RequestDescriptor};
use crate::config::ApiConfig;
use crate::errors::ApiError;
use reqwest::multipart::{Form, Part};
use std::future::Future;

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and reports what came back.
///
/// Non-2xx responses are `Ok`; only failures that produced no response at
/// all are `Err`.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> impl Future<Output = Result<RawResponse, ApiError>> + Send;
}

/// HTTP transport over a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("dermoai-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_form(parts: &[FilePart]) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for file in parts {
            let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            if let Some(ref content_type) = file.content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url_for(&descriptor.path);
        tracing::debug!("{} {}", descriptor.method, url);

        let mut request = self.client.request(descriptor.method.clone(), &url);

        if !descriptor.query.is_empty() {
            request = request.query(&descriptor.query);
        }
        for (name, value) in &descriptor.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        request = match descriptor.body {
            RequestBody::Empty => request,
            RequestBody::Json(ref value) => request.json(value),
            RequestBody::Multipart(ref parts) => request.multipart(Self::build_form(parts)?),
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        tracing::debug!("{} {} -> {}", descriptor.method, url, status);
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
