//! In-memory adapters for exercising the configurator without a registry
//! or Docker daemon.
//!
//! Provides:
//! - [`StubRegistry`]: fixed tag lists per repository, with optional failures
//! - [`StubDaemon`]: records every pull and fails selected image references
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use browsers_configurator::configurator::{BrowserImageSpec, Configurator, ConfiguratorSettings};
//! use browsers_configurator::testing::{StubDaemon, StubRegistry};
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(StubRegistry::new().with_tags("selenoid/firefox", &["47.0", "latest"]));
//! let mut configurator = Configurator::new(ConfiguratorSettings::default());
//! configurator
//!     .initialize_with(registry, Arc::new(StubDaemon::new()))
//!     .unwrap();
//!
//! let config = configurator
//!     .build_config(&[BrowserImageSpec::new("selenoid/firefox", 2, false)])
//!     .await
//!     .unwrap();
//! assert_eq!(config["firefox"].default, "47.0");
//! configurator.close();
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::daemon::ImagePuller;
use crate::error::{DaemonError, RegistryError};
use crate::registry::TagRegistry;

enum StubTags {
    Tags(Vec<String>),
    Status(u16),
}

/// A registry that answers from a fixed table.
///
/// Unknown repositories answer with status 404.
#[derive(Default)]
pub struct StubRegistry {
    repositories: HashMap<String, StubTags>,
    requested: Mutex<Vec<String>>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `tags` for `repository`.
    pub fn with_tags(mut self, repository: &str, tags: &[&str]) -> Self {
        self.repositories.insert(
            repository.to_string(),
            StubTags::Tags(tags.iter().map(|t| t.to_string()).collect()),
        );
        self
    }

    /// Fail requests for `repository` with an HTTP `status`.
    pub fn with_failure(mut self, repository: &str, status: u16) -> Self {
        self.repositories
            .insert(repository.to_string(), StubTags::Status(status));
        self
    }

    /// Repositories requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl TagRegistry for StubRegistry {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, RegistryError> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(repository.to_string());

        let url = format!("stub://registry/v2/{repository}/tags/list");
        match self.repositories.get(repository) {
            Some(StubTags::Tags(tags)) => Ok(tags.clone()),
            Some(StubTags::Status(status)) => Err(RegistryError::Status {
                url,
                status: *status,
            }),
            None => Err(RegistryError::Status { url, status: 404 }),
        }
    }
}

/// A daemon that records pulls and fails configured image references.
#[derive(Default)]
pub struct StubDaemon {
    failing: HashSet<String>,
    pulled: Mutex<Vec<String>>,
}

impl StubDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make pulls of `image` (`repository:tag`) fail.
    pub fn with_failure(mut self, image: &str) -> Self {
        self.failing.insert(image.to_string());
        self
    }

    /// Every attempted pull, in order, including failed ones.
    pub fn pulled(&self) -> Vec<String> {
        self.pulled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ImagePuller for StubDaemon {
    async fn pull(&self, repository: &str, tag: &str) -> Result<(), DaemonError> {
        let image = format!("{repository}:{tag}");
        self.pulled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(image.clone());

        if self.failing.contains(&image) {
            return Err(DaemonError::ImagePullFailed {
                image,
                reason: "stub failure".to_string(),
            });
        }
        Ok(())
    }
}
