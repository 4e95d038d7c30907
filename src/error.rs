//! Error types for the configurator and its adapters.

use thiserror::Error;

use crate::configurator::ConfiguratorState;

/// Result type for configurator operations.
pub type Result<T> = std::result::Result<T, ConfiguratorError>;

/// Errors surfaced by the [`Configurator`](crate::configurator::Configurator).
#[derive(Debug, Error)]
pub enum ConfiguratorError {
    /// Registry or daemon client could not be constructed or reached.
    #[error("Connectivity error: {reason}")]
    Connectivity {
        /// Reason for failure.
        reason: String,
    },

    /// Listing tags for a repository failed.
    #[error("Failed to fetch tags for '{repository}': {source}")]
    Fetch {
        /// Repository whose tag list could not be fetched.
        repository: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// An operation was attempted outside the `Initialized` state.
    #[error("Configurator is not initialized (state: {state})")]
    NotInitialized {
        /// State the configurator was in.
        state: ConfiguratorState,
    },
}

/// Errors from the Docker Registry adapter.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry URL could not be parsed or joined.
    #[error("Invalid registry URL '{url}': {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Network-level failure (connect, timeout, body read).
    #[error("Registry request to {url} failed: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The registry answered with a non-success status.
    #[error("Registry returned status {status} for {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not a valid tag list.
    #[error("Invalid tag list from {url}: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The registry demanded authentication we could not satisfy.
    #[error("Registry authentication failed: {reason}")]
    Auth {
        /// Reason for failure.
        reason: String,
    },

    /// The tag list still had a next page after the page limit.
    #[error("Tag list at {url} has more than {pages} pages")]
    TooManyPages {
        /// First URL of the listing.
        url: String,
        /// Pages read before giving up.
        pages: usize,
    },
}

/// Errors from the Docker daemon adapter.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The Docker host parameter is malformed or uses an unsupported scheme.
    #[error("Invalid Docker host '{host}': {reason}")]
    InvalidHost {
        /// Offending host parameter.
        host: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to connect to the Docker daemon.
    #[error("Docker connection failed: {reason}")]
    Connection {
        /// Reason for failure.
        reason: String,
    },

    /// Failed to pull an image.
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePullFailed {
        /// Image reference (`repo:tag`).
        image: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Errors while resolving configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value was present but could not be interpreted.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Environment variable or option name.
        key: String,
        /// Explanation.
        message: String,
    },

    /// A required value was missing.
    #[error("Missing required configuration: {key}")]
    MissingRequired {
        /// Environment variable or option name.
        key: String,
    },
}
