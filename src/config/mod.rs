//! Configuration resolved from environment variables.
//!
//! Every setting has a default; `.env` files are loaded by the binary before
//! resolution and CLI flags override the resolved values.
//!
//! | Variable                     | Default                              |
//! |------------------------------|--------------------------------------|
//! | `BROWSERS`                   | `selenoid/firefox,selenoid/chrome,selenoid/opera` |
//! | `BROWSER_VERSIONS_LIMIT`     | `2`                                  |
//! | `PULL_IMAGES`                | `false`                              |
//! | `CONFIGURATOR_VERBOSE`       | `false`                              |
//! | `DOCKER_REGISTRY_URL`        | `https://registry.hub.docker.com`    |
//! | `DOCKER_HOST`                | platform socket                      |
//! | `DOCKER_API_VERSION`         | `1.29`                               |
//! | `REGISTRY_TIMEOUT_SECS`      | `30`                                 |
//! | `DOCKER_TIMEOUT_SECS`        | `120`                                |
//! | `BROWSER_PORT`               | `4444`                               |
//! | `BROWSER_PATH`               | per family (`/wd/hub`, `/` or none)  |

pub(crate) mod helpers;

use std::time::Duration;

use crate::configurator::browsers::DEFAULT_PORT;
use crate::configurator::{BrowserImageSpec, ConfiguratorSettings, ConnectionSettings, LaunchDefaults};
use crate::daemon::DEFAULT_API_VERSION;
use crate::error::ConfigError;
use crate::registry::DEFAULT_REGISTRY_URL;

pub use helpers::{EnvLookup, process_env};
use helpers::{optional_env, parse_bool_env, parse_optional_env};

/// Images configured when `BROWSERS` is not set.
pub const DEFAULT_BROWSERS: &[&str] = &["selenoid/firefox", "selenoid/chrome", "selenoid/opera"];

/// Number of versions kept per browser when not configured.
pub const DEFAULT_LIMIT: usize = 2;

/// Fully resolved settings for one configurator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Repositories to configure, in output order.
    pub browsers: Vec<String>,
    /// Versions kept per browser.
    pub limit: usize,
    /// Pull the selected images.
    pub pull: bool,
    /// Report progress at `info`.
    pub verbose: bool,
    pub registry_url: String,
    pub docker_host: Option<String>,
    pub docker_api_version: String,
    pub registry_timeout_secs: u64,
    pub docker_timeout_secs: u64,
    /// Port written for every browser.
    pub browser_port: String,
    /// Path written for every browser. `None` keeps the per-family paths.
    pub browser_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browsers: DEFAULT_BROWSERS.iter().map(|b| b.to_string()).collect(),
            limit: DEFAULT_LIMIT,
            pull: false,
            verbose: false,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            docker_host: None,
            docker_api_version: DEFAULT_API_VERSION.to_string(),
            registry_timeout_secs: 30,
            docker_timeout_secs: 120,
            browser_port: DEFAULT_PORT.to_string(),
            browser_path: None,
        }
    }
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&process_env)
    }

    /// Resolve from an arbitrary lookup.
    pub fn resolve(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let browsers = match optional_env(env, "BROWSERS") {
            Some(raw) => parse_browser_list(&raw)?,
            None => defaults.browsers,
        };

        let config = Self {
            browsers,
            limit: parse_optional_env(env, "BROWSER_VERSIONS_LIMIT", defaults.limit)?,
            pull: parse_bool_env(env, "PULL_IMAGES", defaults.pull)?,
            verbose: parse_bool_env(env, "CONFIGURATOR_VERBOSE", defaults.verbose)?,
            registry_url: optional_env(env, "DOCKER_REGISTRY_URL").unwrap_or(defaults.registry_url),
            docker_host: optional_env(env, "DOCKER_HOST"),
            docker_api_version: optional_env(env, "DOCKER_API_VERSION")
                .unwrap_or(defaults.docker_api_version),
            registry_timeout_secs: parse_optional_env(
                env,
                "REGISTRY_TIMEOUT_SECS",
                defaults.registry_timeout_secs,
            )?,
            docker_timeout_secs: parse_optional_env(
                env,
                "DOCKER_TIMEOUT_SECS",
                defaults.docker_timeout_secs,
            )?,
            browser_port: optional_env(env, "BROWSER_PORT").unwrap_or(defaults.browser_port),
            browser_path: optional_env(env, "BROWSER_PATH").or(defaults.browser_path),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browsers.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "BROWSERS".to_string(),
            });
        }
        if self.limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BROWSER_VERSIONS_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.browser_port.parse::<u16>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "BROWSER_PORT".to_string(),
                message: format!("'{}' is not a valid port", self.browser_port),
            });
        }
        Ok(())
    }

    /// Settings for [`Configurator::new`](crate::configurator::Configurator::new).
    ///
    /// `BROWSER_PORT` replaces the port of every family. `BROWSER_PATH`,
    /// when set, replaces every path; otherwise the per-family paths stay.
    pub fn to_settings(&self) -> ConfiguratorSettings {
        let mut launch = LaunchDefaults::default();
        if self.browser_port != DEFAULT_PORT {
            launch = launch.with_port(&self.browser_port);
        }
        if let Some(path) = &self.browser_path {
            launch = launch.with_path(path);
        }

        ConfiguratorSettings {
            connection: ConnectionSettings {
                registry_url: self.registry_url.clone(),
                docker_host: self.docker_host.clone(),
                docker_api_version: self.docker_api_version.clone(),
                request_timeout: Duration::from_secs(self.registry_timeout_secs),
                daemon_timeout: Duration::from_secs(self.docker_timeout_secs),
            },
            verbose: self.verbose,
            launch,
        }
    }

    /// One spec per configured repository.
    pub fn to_specs(&self) -> Vec<BrowserImageSpec> {
        self.browsers
            .iter()
            .map(|repo| BrowserImageSpec::new(repo.clone(), self.limit, self.pull))
            .collect()
    }
}

/// Split a comma-separated repository list, dropping blanks and duplicates.
pub fn parse_browser_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut browsers: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if item.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                key: "BROWSERS".to_string(),
                message: format!("repository '{item}' contains whitespace"),
            });
        }
        if !browsers.iter().any(|b| b == item) {
            browsers.push(item.to_string());
        }
    }

    if browsers.is_empty() {
        return Err(ConfigError::MissingRequired {
            key: "BROWSERS".to_string(),
        });
    }
    Ok(browsers)
}
