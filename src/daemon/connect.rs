//! Docker daemon connection parameters.
//!
//! The host is passed in explicitly (usually resolved from `DOCKER_HOST` by
//! the config layer) rather than read from the process environment here, so
//! tests can point the daemon client at a mock server without touching
//! global state.

use bollard::{ClientVersion, Docker};

use crate::error::DaemonError;

/// Docker Engine API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "1.29";

/// Where to reach the Docker daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerHost {
    /// Platform default socket (`/var/run/docker.sock` or the Windows named pipe).
    LocalDefaults,
    /// Unix domain socket at the given path.
    Unix(String),
    /// Plain HTTP over TCP, `host:port`.
    Tcp(String),
}

impl DockerHost {
    /// Parse a `DOCKER_HOST`-style value. `None` or empty means local defaults.
    pub fn parse(raw: Option<&str>) -> Result<Self, DaemonError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(DockerHost::LocalDefaults);
        };

        let invalid = |reason: &str| DaemonError::InvalidHost {
            host: raw.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = raw.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(DockerHost::Unix(path.to_string()));
        }

        let addr = raw
            .strip_prefix("tcp://")
            .or_else(|| raw.strip_prefix("http://"))
            .ok_or_else(|| invalid("expected unix://, tcp:// or http:// scheme"))?
            .trim_end_matches('/');

        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        port.parse::<u16>()
            .map_err(|e| invalid(&format!("bad port '{port}': {e}")))?;

        Ok(DockerHost::Tcp(addr.to_string()))
    }
}

impl std::fmt::Display for DockerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DockerHost::LocalDefaults => write!(f, "local defaults"),
            DockerHost::Unix(path) => write!(f, "unix://{}", path),
            DockerHost::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Parse an API version such as `1.29`.
pub fn parse_api_version(raw: &str) -> Result<ClientVersion, DaemonError> {
    let raw = raw.trim().trim_start_matches('v');
    let invalid = || DaemonError::Connection {
        reason: format!("invalid Docker API version '{}', expected <major>.<minor>", raw),
    };

    let (major, minor) = raw.split_once('.').ok_or_else(invalid)?;
    Ok(ClientVersion {
        major_version: major.parse().map_err(|_| invalid())?,
        minor_version: minor.parse().map_err(|_| invalid())?,
    })
}

/// Build a bollard client. No request is made until the first call.
pub fn connect_docker(
    host: &DockerHost,
    api_version: &ClientVersion,
    timeout_secs: u64,
) -> Result<Docker, DaemonError> {
    let result = match host {
        DockerHost::Tcp(addr) => Docker::connect_with_http(addr, timeout_secs, api_version),
        #[cfg(unix)]
        DockerHost::Unix(path) => Docker::connect_with_unix(path, timeout_secs, api_version),
        #[cfg(not(unix))]
        DockerHost::Unix(_) => {
            return Err(DaemonError::Connection {
                reason: "unix sockets are not supported on this platform".to_string(),
            });
        }
        #[cfg(unix)]
        DockerHost::LocalDefaults => {
            Docker::connect_with_unix("/var/run/docker.sock", timeout_secs, api_version)
        }
        #[cfg(windows)]
        DockerHost::LocalDefaults => {
            Docker::connect_with_named_pipe("//./pipe/docker_engine", timeout_secs, api_version)
        }
    };

    result.map_err(|e| DaemonError::Connection {
        reason: format!("{host}: {e}"),
    })
}
