//! Scripted transport for unit tests.

use super::{REFRESH_PATH, RawResponse, RequestBody, RequestDescriptor, Transport};
use crate::errors::ApiError;
use reqwest::Method;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

type Handler =
    dyn Fn(&RequestDescriptor, Option<&str>) -> Result<RawResponse, ApiError> + Send + Sync;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
    pub retry: bool,
}

/// Answers every request through a closure and records what was sent.
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
    refresh_gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestDescriptor, Option<&str>) -> Result<RawResponse, ApiError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            refresh_gate: None,
        }
    }

    /// Always answers 200 with `body`.
    pub fn ok(body: Value) -> Self {
        Self::new(move |_, _| Ok(json_response(200, body.clone())))
    }

    /// Holds refresh calls until the gate is notified.
    pub fn with_refresh_gate(mut self) -> Self {
        self.refresh_gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn refresh_gate(&self) -> Arc<Notify> {
        self.refresh_gate
            .clone()
            .expect("transport was built without a refresh gate")
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls().pop().expect("no request was sent")
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path == REFRESH_PATH)
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<RawResponse, ApiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: descriptor.method.clone(),
            path: descriptor.path.clone(),
            query: descriptor.query.clone(),
            bearer: bearer.map(str::to_string),
            body: descriptor.body.clone(),
            retry: descriptor.is_retry(),
        });

        if descriptor.path == REFRESH_PATH
            && let Some(ref gate) = self.refresh_gate
        {
            gate.notified().await;
        }

        (self.handler)(descriptor, bearer)
    }
}

pub(crate) fn json_response(status: u16, body: Value) -> RawResponse {
    RawResponse::new(status, body.to_string().into_bytes())
}

pub(crate) fn token_response(access: &str, refresh: &str) -> RawResponse {
    json_response(
        200,
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer"
        }),
    )
}
