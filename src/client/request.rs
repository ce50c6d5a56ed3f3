use crate::errors::ApiError;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// One file in a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<FilePart>),
}

/// Everything needed to send a request, and to send it again.
///
/// Bodies are owned values so a request parked behind a token refresh can be
/// replayed unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Never attach the bearer credential and never enter the refresh flow
    pub skip_auth: bool,
    pub(crate) retry: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            skip_auth: false,
            retry: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest {
            detail: format!("Failed to serialize request body: {}", e),
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn json_value(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Adds a file part, turning the body into a multipart form.
    pub fn file(mut self, part: FilePart) -> Self {
        match self.body {
            RequestBody::Multipart(ref mut parts) => parts.push(part),
            _ => self.body = RequestBody::Multipart(vec![part]),
        }
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// True once the request has been replayed after a refresh.
    pub fn is_retry(&self) -> bool {
        self.retry
    }

    pub(crate) fn as_retry(&self) -> Self {
        let mut replay = self.clone();
        replay.retry = true;
        replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_parts() {
        let request = RequestDescriptor::get("/api/images/")
            .query("reviewed", true)
            .query("limit", 20)
            .header("X-Request-Source", "cli");

        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.query,
            vec![
                ("reviewed".to_string(), "true".to_string()),
                ("limit".to_string(), "20".to_string())
            ]
        );
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.body, RequestBody::Empty);
        assert!(!request.skip_auth);
        assert!(!request.is_retry());
    }

    #[test]
    fn test_json_body() {
        let request = RequestDescriptor::post("/api/patients/")
            .json(&json!({"name": "Ada"}))
            .unwrap();
        assert_eq!(request.body, RequestBody::Json(json!({"name": "Ada"})));
    }

    #[test]
    fn test_files_accumulate_into_one_form() {
        let request = RequestDescriptor::post("/api/images/upload")
            .file(FilePart::new("files", "a.jpg", vec![1, 2]).with_content_type("image/jpeg"))
            .file(FilePart::new("files", "b.jpg", vec![3]));

        match request.body {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].content_type.as_deref(), Some("image/jpeg"));
                assert_eq!(parts[1].file_name, "b.jpg");
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_copy_keeps_request_intact() {
        let original = RequestDescriptor::put("/api/users/me")
            .json(&json!({"name": "New"}))
            .unwrap();
        let replay = original.as_retry();

        assert!(replay.is_retry());
        assert!(!original.is_retry());
        assert_eq!(replay.body, original.body);
        assert_eq!(replay.path, original.path);
    }
}
