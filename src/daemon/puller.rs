//! Image pulls through the Docker Engine API.

use async_trait::async_trait;
use bollard::Docker;
use bollard::image::CreateImageOptions;
use futures::StreamExt;

use crate::daemon::ImagePuller;
use crate::error::DaemonError;

/// Daemon adapter backed by `bollard`.
#[derive(Debug, Clone)]
pub struct DockerDaemon {
    docker: Docker,
}

impl DockerDaemon {
    /// Wrap an existing bollard client.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ImagePuller for DockerDaemon {
    async fn pull(&self, repository: &str, tag: &str) -> Result<(), DaemonError> {
        let image = format!("{repository}:{tag}");

        let options = CreateImageOptions {
            from_image: repository.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        // The engine streams progress until the pull completes; an `error`
        // entry means it gave up even though the HTTP status was 200.
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(error) = info.error {
                        return Err(DaemonError::ImagePullFailed {
                            image,
                            reason: error,
                        });
                    }
                    if let Some(status) = info.status {
                        tracing::trace!("Pull status for {}: {}", image, status);
                    }
                }
                Err(e) => {
                    return Err(DaemonError::ImagePullFailed {
                        image,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
