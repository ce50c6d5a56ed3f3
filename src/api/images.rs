use super::segment;
use crate::client::{ApiClient, FilePart, RequestDescriptor, Transport};
use crate::errors::ApiError;
use crate::models::{
    AttachImageRequest, Image, ImageFilter, ImageList, ImageReviewUpdate, ImageUploadResponse,
    QuickScanResponse, UnreviewedQuery,
};
use std::path::Path;

/// Form field the backend reads uploaded images from
const IMAGE_FIELD: &str = "file";

/// Reads an image from disk into an upload part, guessing the content type
/// from the extension.
pub fn image_file_part(path: &Path) -> Result<FilePart, ApiError> {
    let bytes = std::fs::read(path).map_err(|e| ApiError::InvalidRequest {
        detail: format!("Cannot read {}: {}", path.display(), e),
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let part = FilePart::new(IMAGE_FIELD, file_name, bytes);
    let content_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("webp") => Some("image/webp"),
        Some("heic") => Some("image/heic"),
        _ => None,
    };

    Ok(match content_type {
        Some(content_type) => part.with_content_type(content_type),
        None => part,
    })
}

fn as_image_field(mut file: FilePart) -> FilePart {
    file.field = IMAGE_FIELD.to_string();
    file
}

impl<T: Transport> ApiClient<T> {
    /// Uploads an image into a consultation; the backend runs the classifier
    /// on it and returns the prediction.
    pub async fn upload_to_consultation(
        &self,
        consultation_id: &str,
        file: FilePart,
    ) -> Result<ImageUploadResponse, ApiError> {
        let descriptor = RequestDescriptor::post("/api/images/upload")
            .query("consultation_id", consultation_id)
            .file(as_image_field(file));
        self.request(descriptor).await
    }

    pub async fn attach_to_consultation(
        &self,
        image_id: &str,
        consultation_id: &str,
    ) -> Result<Image, ApiError> {
        let path = format!("/api/images/{}/attach", segment(image_id));
        let body = AttachImageRequest { consultation_id };
        self.request(RequestDescriptor::post(path).json(&body)?).await
    }

    pub async fn get_image(&self, image_id: &str) -> Result<Image, ApiError> {
        let path = format!("/api/images/{}", segment(image_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn list_consultation_images(&self, consultation_id: &str) -> Result<Vec<Image>, ApiError> {
        let path = format!("/api/images/consultation/{}", segment(consultation_id));
        self.request(RequestDescriptor::get(path)).await
    }

    pub async fn list_unreviewed_images(&self, page: UnreviewedQuery) -> Result<ImageList, ApiError> {
        let descriptor = RequestDescriptor::get("/api/images/unreviewed")
            .query("skip", page.skip)
            .query("limit", page.limit);
        self.request(descriptor).await
    }

    pub async fn list_all_images(&self, filter: &ImageFilter) -> Result<ImageList, ApiError> {
        let descriptor = RequestDescriptor::get("/api/images/all").query_pairs(filter.to_query());
        self.request(descriptor).await
    }

    /// Records the label a practitioner assigned to the image.
    pub async fn update_image_review(
        &self,
        image_id: &str,
        reviewed_label: &str,
    ) -> Result<Image, ApiError> {
        let path = format!("/api/images/{}", segment(image_id));
        let body = ImageReviewUpdate { reviewed_label };
        self.request(RequestDescriptor::patch(path).json(&body)?).await
    }

    pub async fn delete_image(&self, image_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/images/{}", segment(image_id));
        self.request_no_content(RequestDescriptor::delete(path)).await
    }

    /// Quick scan outside any consultation.
    pub async fn triage_scan(
        &self,
        file: FilePart,
        consent_to_reuse: bool,
    ) -> Result<QuickScanResponse, ApiError> {
        let descriptor = RequestDescriptor::post("/api/triage/scan")
            .query("consent_to_reuse", consent_to_reuse)
            .file(as_image_field(file));
        self.request(descriptor).await
    }

    pub async fn triage_history(&self) -> Result<Vec<Image>, ApiError> {
        self.request(RequestDescriptor::get("/api/triage/history")).await
    }
}
