use serde::{Deserialize, Serialize};

use super::Urgency;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub image_id: String,
    pub consultation_id: Option<String>,
    pub uploaded_by: Option<String>,
    pub image_url: String,
    pub storage_key: String,
    pub predicted_condition: Option<String>,
    pub confidence: Option<f64>,
    pub reviewed_label: Option<String>,
    pub uploaded_at: String,
    pub file_size: Option<u64>,
    pub source: String,
    pub allowed_review: bool,
    pub consent_to_reuse: bool,
}

/// Page of images as returned by the review queue endpoints
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageList {
    pub items: Vec<Image>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageUploadResponse {
    pub image_id: String,
    pub image_url: String,
    pub predicted_condition: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuickScanResponse {
    pub image_id: String,
    pub image_url: String,
    pub predicted_condition: String,
    pub confidence: f64,
    pub urgency: Urgency,
    pub consent_to_reuse: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttachImageRequest<'a> {
    pub consultation_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageReviewUpdate<'a> {
    pub reviewed_label: &'a str,
}

/// Pagination for the unreviewed-image queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreviewedQuery {
    pub skip: u32,
    pub limit: u32,
}

impl Default for UnreviewedQuery {
    fn default() -> Self {
        Self { skip: 0, limit: 20 }
    }
}

/// Optional filters for the admin image listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFilter {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub consultation_id: Option<String>,
    pub uploaded_by: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ImageFilter {
    /// Query pairs for the filters that are set, in a stable order.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(skip) = self.skip {
            query.push(("skip".to_string(), skip.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        let text_filters = [
            ("consultation_id", &self.consultation_id),
            ("uploaded_by", &self.uploaded_by),
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
        ];
        for (key, value) in text_filters {
            if let Some(value) = value {
                query.push((key.to_string(), value.clone()));
            }
        }
        query
    }
}
