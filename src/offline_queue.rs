use crate::client::{ApiClient, RawResponse, RequestBody, RequestDescriptor, Transport};
use crate::errors::{AppError, QueueError};
use chrono::{DateTime, Utc};
use reqwest::Method;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;

/// A write that could not reach the backend
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRequest {
    pub id: i64,
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl QueuedRequest {
    fn to_descriptor(&self) -> Result<RequestDescriptor, QueueError> {
        let method = Method::from_bytes(self.method.as_bytes()).map_err(|_| QueueError::Method {
            method: self.method.clone(),
        })?;
        let descriptor = RequestDescriptor::new(method, self.path.clone());
        Ok(match self.body {
            Some(ref body) => descriptor.json_value(body.clone()),
            None => descriptor,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Accepted by the backend
    pub sent: usize,
    /// Answered with an error status and dropped
    pub rejected: usize,
    /// Still queued because the backend could not be reached
    pub remaining: usize,
}

#[derive(Debug)]
pub enum Submission {
    Sent(RawResponse),
    Queued(i64),
}

/// SQLite-backed queue of JSON writes, replayed oldest first.
pub struct OfflineQueue {
    conn: Connection,
}

impl OfflineQueue {
    pub fn open(db_path: &Path) -> Result<Self, QueueError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self, QueueError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, QueueError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pending_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                method TEXT NOT NULL,
                path TEXT NOT NULL,
                body TEXT,
                created_at TEXT NOT NULL
            )",
            params![],
        )?;
        Ok(OfflineQueue { conn })
    }

    pub fn enqueue(&self, method: &Method, path: &str, body: Option<&Value>) -> Result<i64, QueueError> {
        let body = body.map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT INTO pending_requests (method, path, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![method.as_str(), path, body, Utc::now().to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!("Queued {} {} for later delivery (#{})", method, path, id);
        Ok(id)
    }

    pub fn pending(&self) -> Result<Vec<QueuedRequest>, QueueError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, method, path, body, created_at
             FROM pending_requests
             ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, method, path, body, created_at)| -> Result<QueuedRequest, QueueError> {
                let body = body.as_deref().map(serde_json::from_str).transpose()?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Ok(QueuedRequest {
                    id,
                    method,
                    path,
                    body,
                    created_at,
                })
            })
            .collect()
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_requests", params![], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    pub fn oldest(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        let oldest: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM pending_requests ORDER BY id ASC LIMIT 1",
                params![],
                |row| row.get(0),
            )
            .optional()?;
        Ok(oldest
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|t| t.with_timezone(&Utc)))
    }

    pub fn remove(&self, id: i64) -> Result<(), QueueError> {
        self.conn
            .execute("DELETE FROM pending_requests WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<usize, QueueError> {
        Ok(self.conn.execute("DELETE FROM pending_requests", params![])?)
    }

    /// Sends queued writes through `client`, oldest first. An entry leaves
    /// the queue once the backend answers, whatever the status. Replay stops
    /// at the first request that gets no answer, or once the session is gone
    /// and nothing more can be authorized.
    pub async fn replay<T: Transport>(&self, client: &ApiClient<T>) -> Result<ReplaySummary, QueueError> {
        let pending = self.pending()?;
        let mut summary = ReplaySummary::default();

        for (index, entry) in pending.iter().enumerate() {
            let descriptor = match entry.to_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!("Dropping queued request #{}: {}", entry.id, e);
                    self.remove(entry.id)?;
                    summary.rejected += 1;
                    continue;
                }
            };

            match client.execute(&descriptor).await {
                Ok(_) => {
                    tracing::debug!("Delivered queued {} {}", entry.method, entry.path);
                    summary.sent += 1;
                }
                Err(e) if e.is_connectivity() => {
                    tracing::info!("Backend still unreachable, keeping queued requests: {}", e);
                    summary.remaining = pending.len() - index;
                    return Ok(summary);
                }
                Err(e) if e.is_unauthorized() => {
                    tracing::warn!("Session is no longer valid, keeping queued requests: {}", e);
                    summary.remaining = pending.len() - index;
                    return Ok(summary);
                }
                Err(e) => {
                    tracing::warn!(
                        "Queued {} {} was rejected by the backend: {}",
                        entry.method,
                        entry.path,
                        e
                    );
                    summary.rejected += 1;
                }
            }
            self.remove(entry.id)?;
        }

        Ok(summary)
    }

    /// Sends a JSON write now, or queues it when the backend is unreachable.
    pub async fn submit_or_enqueue<T: Transport>(
        &self,
        client: &ApiClient<T>,
        descriptor: RequestDescriptor,
    ) -> Result<Submission, AppError> {
        match client.execute(&descriptor).await {
            Ok(response) => Ok(Submission::Sent(response)),
            Err(e) if e.is_connectivity() => {
                let body = match descriptor.body {
                    RequestBody::Empty => None,
                    RequestBody::Json(ref value) => Some(value),
                    RequestBody::Multipart(_) => return Err(e.into()),
                };
                let id = self.enqueue(&descriptor.method, &descriptor.path, body)?;
                Ok(Submission::Queued(id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
