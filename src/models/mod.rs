//! JSON shapes exchanged with the triage backend.
//!
//! Timestamps are kept as the ISO 8601 strings the backend sends.

mod admin;
mod auth;
mod clinical;
mod images;
mod practitioners;
mod telemedicine;

pub use admin::*;
pub use auth::*;
pub use clinical::*;
pub use images::*;
pub use practitioners::*;
pub use telemedicine::*;
