//! Docker Registry adapter.
//!
//! Lists the tags of an image repository through the v2 HTTP API
//! (`GET /v2/<repository>/tags/list`). Zero tags is a valid answer; a
//! network, status or decode failure is an error and is never reported as
//! an empty list.

pub mod auth;
pub mod client;

use async_trait::async_trait;

use crate::error::RegistryError;

pub use auth::BearerChallenge;
pub use client::{DEFAULT_REGISTRY_URL, HttpRegistry, MAX_PAGES};

/// Source of raw image tags.
#[async_trait]
pub trait TagRegistry: Send + Sync {
    /// All tags of `repository`, in the order the registry returned them.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError>;
}
