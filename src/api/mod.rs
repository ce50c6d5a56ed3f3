//! Typed calls for every backend resource, as methods on [`ApiClient`].
//!
//! [`ApiClient`]: crate::client::ApiClient

mod auth;
mod clinical;
mod images;
mod practitioners;
mod reporting;
mod telemedicine;

pub use images::image_file_part;

/// Percent-encodes a single path segment.
pub(crate) fn segment(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
