//! Side-channel coordinators.
//!
//! Each coordinator owns one slice of session data, mutated by the dispatcher
//! and observed by the UI through `watch` subscriptions.

pub mod advertisement;
pub mod group;
pub mod laundry;
pub mod staging;

pub use advertisement::{AdvertisementControlState, AdvertisementCoordinator};
pub use group::{GroupCoordinator, GroupMembership};
pub use laundry::{LaundryCoordinator, LaundryDispatch, LaundryState};
pub use staging::ModelStaging;

/// Resolves a media path sent by the backend against the HTTP base address.
///
/// Absolute `http…` URLs pass through unchanged; anything else is joined to
/// `base_url` with exactly one slash in between.
pub fn resolve_media_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
