//! Docker daemon adapter.
//!
//! Pulls `repository:tag` images through the engine's image-create endpoint
//! (`POST /v<api>/images/create?fromImage=<repo>&tag=<tag>`) and waits for
//! the engine to finish streaming progress.

pub mod connect;
pub mod puller;

use async_trait::async_trait;

use crate::error::DaemonError;

pub use connect::{DEFAULT_API_VERSION, DockerHost, connect_docker, parse_api_version};
pub use puller::DockerDaemon;

/// Something that can make an image available on the local host.
#[async_trait]
pub trait ImagePuller: Send + Sync {
    /// Pull `repository:tag`, returning once the engine reports completion.
    async fn pull(&self, repository: &str, tag: &str) -> Result<(), DaemonError>;
}
