//! Builds a Selenoid `browsers.json` from registry tags.
//!
//! The `Configurator` owns one registry client and one daemon client and
//! runs every configured browser image through a small pipeline:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                            Configurator                                   │
//! │                                                                           │
//! │   build_config(specs)                                                     │
//! │         │  for each spec, in order                                        │
//! │         ▼                                                                 │
//! │   ┌──────────────┐   ┌──────────────────┐   ┌────────────┐   ┌─────────┐  │
//! │   │ Fetch tags   │──▶│ Filter, sort,    │──▶│ Pull each  │──▶│Assemble │  │
//! │   │ (registry)   │   │ truncate (limit) │   │ (if pull)  │   │Versions │  │
//! │   └──────────────┘   └──────────────────┘   └────────────┘   └─────────┘  │
//! │                                                                    │      │
//! │                                                                    ▼      │
//! │                                                          BrowsersConfig   │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Browsers are processed one after another and pulls within a browser run
//! newest first, so request order and log output are reproducible. A fetch
//! failure aborts the whole build; a pull failure only drops that tag.
//!
//! # Example
//!
//! ```rust,no_run
//! use browsers_configurator::configurator::{
//!     BrowserImageSpec, Configurator, ConfiguratorSettings,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut configurator = Configurator::new(ConfiguratorSettings::default());
//! configurator.initialize().await?;
//!
//! let config = configurator
//!     .build_config(&[BrowserImageSpec::new("selenoid/firefox", 2, false)])
//!     .await;
//! configurator.close();
//!
//! println!("{}", serde_json::to_string_pretty(&config?)?);
//! # Ok(())
//! # }
//! ```

pub mod browsers;
pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use crate::daemon::{
    DEFAULT_API_VERSION, DockerDaemon, DockerHost, ImagePuller, connect_docker, parse_api_version,
};
use crate::error::{ConfiguratorError, Result};
use crate::registry::{DEFAULT_REGISTRY_URL, HttpRegistry, TagRegistry};

pub use browsers::{
    Browser, BrowserLaunch, BrowsersConfig, LaunchDefaults, VersionRule, Versions,
};
pub use pipeline::{BrowserImageSpec, PullFailure, browser_name, image_with_tag};

use pipeline::Progress;

/// Where the registry and daemon live.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Docker Registry base URL.
    pub registry_url: String,
    /// `DOCKER_HOST`-style daemon address; `None` for the platform default.
    pub docker_host: Option<String>,
    /// Docker Engine API version, e.g. `1.29`.
    pub docker_api_version: String,
    /// Per-request timeout for registry calls.
    pub request_timeout: Duration,
    /// Per-request timeout for daemon calls (pulls can be slow).
    pub daemon_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            docker_host: None,
            docker_api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
            daemon_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything a `Configurator` needs besides the list of images.
#[derive(Debug, Clone, Default)]
pub struct ConfiguratorSettings {
    pub connection: ConnectionSettings,
    /// Log fetch and pull progress at `info` instead of `debug`.
    pub verbose: bool,
    /// Port/path written into every `Browser` entry.
    pub launch: LaunchDefaults,
}

/// Lifecycle state of a `Configurator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguratorState {
    /// Created, no clients yet.
    Uninitialized,
    /// Clients acquired; `build_config` may be called.
    Initialized,
    /// Clients released; terminal.
    Closed,
}

impl std::fmt::Display for ConfiguratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfiguratorState::Uninitialized => "uninitialized",
            ConfiguratorState::Initialized => "initialized",
            ConfiguratorState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Result of a build, including the pulls that were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub config: BrowsersConfig,
    pub failed_pulls: Vec<PullFailure>,
}

struct Clients {
    registry: Arc<dyn TagRegistry>,
    daemon: Arc<dyn ImagePuller>,
}

/// Orchestrates registry lookups and image pulls into a `BrowsersConfig`.
pub struct Configurator {
    settings: ConfiguratorSettings,
    state: ConfiguratorState,
    clients: Option<Clients>,
}

impl Configurator {
    /// Create an uninitialized configurator.
    pub fn new(settings: ConfiguratorSettings) -> Self {
        Self {
            settings,
            state: ConfiguratorState::Uninitialized,
            clients: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConfiguratorState {
        self.state
    }

    /// The settings this configurator was created with.
    pub fn settings(&self) -> &ConfiguratorSettings {
        &self.settings
    }

    /// Build the registry and daemon clients and check the registry answers.
    ///
    /// On failure nothing is retained and the state stays `Uninitialized`.
    pub async fn initialize(&mut self) -> Result<()> {
        if !self.check_can_initialize()? {
            return Ok(());
        }

        let conn = &self.settings.connection;

        let host = DockerHost::parse(conn.docker_host.as_deref()).map_err(connectivity)?;
        let api_version = parse_api_version(&conn.docker_api_version).map_err(connectivity)?;
        let docker =
            connect_docker(&host, &api_version, conn.daemon_timeout.as_secs()).map_err(connectivity)?;

        let registry =
            HttpRegistry::new(&conn.registry_url, conn.request_timeout).map_err(connectivity)?;
        registry.ping().await.map_err(connectivity)?;

        tracing::debug!(
            "Using registry {} and Docker daemon at {} (API v{}.{})",
            registry.base_url(),
            host,
            api_version.major_version,
            api_version.minor_version
        );

        self.install(Arc::new(registry), Arc::new(DockerDaemon::new(docker)));
        Ok(())
    }

    /// Initialize with caller-supplied adapters instead of building clients.
    pub fn initialize_with(
        &mut self,
        registry: Arc<dyn TagRegistry>,
        daemon: Arc<dyn ImagePuller>,
    ) -> Result<()> {
        if self.check_can_initialize()? {
            self.install(registry, daemon);
        }
        Ok(())
    }

    /// `Ok(false)` when already initialized, an error once closed.
    fn check_can_initialize(&self) -> Result<bool> {
        match self.state {
            ConfiguratorState::Uninitialized => Ok(true),
            ConfiguratorState::Initialized => Ok(false),
            ConfiguratorState::Closed => Err(ConfiguratorError::NotInitialized { state: self.state }),
        }
    }

    fn install(&mut self, registry: Arc<dyn TagRegistry>, daemon: Arc<dyn ImagePuller>) {
        self.clients = Some(Clients { registry, daemon });
        self.state = ConfiguratorState::Initialized;
        tracing::debug!("Configurator initialized");
    }

    /// Build the configuration for `specs`.
    pub async fn build_config(&self, specs: &[BrowserImageSpec]) -> Result<BrowsersConfig> {
        self.build_config_with_report(specs)
            .await
            .map(|outcome| outcome.config)
    }

    /// Build the configuration and report which pulls were dropped.
    ///
    /// The first fetch failure aborts the build; no partial config is returned.
    pub async fn build_config_with_report(
        &self,
        specs: &[BrowserImageSpec],
    ) -> Result<BuildOutcome> {
        let clients = match (&self.clients, self.state) {
            (Some(clients), ConfiguratorState::Initialized) => clients,
            _ => return Err(ConfiguratorError::NotInitialized { state: self.state }),
        };

        let progress = Progress {
            verbose: self.settings.verbose,
        };
        let mut config = BrowsersConfig::new();
        let mut failed_pulls = Vec::new();

        for spec in specs {
            let repository = spec.repository.as_str();
            let name = browser_name(repository);

            progress.report(format_args!("Fetching tags for image {}", repository));
            let tags = pipeline::fetch_tags(clients.registry.as_ref(), repository).await?;

            let mut selected = pipeline::select_versions(&tags, spec.limit);
            progress.report(format_args!(
                "Selected {} of {} tags for {}: {:?}",
                selected.len(),
                tags.len(),
                repository,
                selected
            ));

            if spec.pull {
                selected = pipeline::pull_versions(
                    clients.daemon.as_ref(),
                    repository,
                    selected,
                    progress,
                    &mut failed_pulls,
                )
                .await;
            }

            match pipeline::assemble_versions(repository, &selected, &self.settings.launch) {
                Some(versions) => {
                    progress.report(format_args!(
                        "Configured {} with default version {}",
                        name, versions.default
                    ));
                    if config.insert(name.to_string(), versions).is_some() {
                        tracing::warn!(
                            "Browser '{}' configured more than once; keeping {}",
                            name,
                            repository
                        );
                    }
                }
                None => {
                    tracing::warn!("No usable versions for {}, omitting '{}'", repository, name);
                }
            }
        }

        Ok(BuildOutcome {
            config,
            failed_pulls,
        })
    }

    /// Release the clients. Safe to call more than once or after a failed
    /// `initialize`.
    pub fn close(&mut self) {
        if self.state == ConfiguratorState::Closed {
            return;
        }
        self.clients = None;
        self.state = ConfiguratorState::Closed;
        tracing::debug!("Configurator closed");
    }
}

impl Drop for Configurator {
    fn drop(&mut self) {
        if self.state == ConfiguratorState::Initialized {
            tracing::warn!("Configurator dropped without close(), releasing clients");
            self.close();
        }
    }
}

fn connectivity(e: impl std::fmt::Display) -> ConfiguratorError {
    ConfiguratorError::Connectivity {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubDaemon, StubRegistry};
    use pretty_assertions::assert_eq;

    fn firefox_and_phantomjs() -> Arc<StubRegistry> {
        Arc::new(
            StubRegistry::new()
                .with_tags("selenoid/firefox", &["46.0", "45.0", "47.0", "latest"])
                .with_tags("selenoid/phantomjs", &["2.1.1", "latest"]),
        )
    }

    fn configurator(registry: Arc<StubRegistry>, daemon: Arc<StubDaemon>) -> Configurator {
        let mut c = Configurator::new(ConfiguratorSettings {
            verbose: true,
            ..Default::default()
        });
        c.initialize_with(registry, daemon).unwrap();
        c
    }

    fn specs(limit: usize, pull: bool) -> Vec<BrowserImageSpec> {
        vec![
            BrowserImageSpec::new("selenoid/firefox", limit, pull),
            BrowserImageSpec::new("selenoid/phantomjs", limit, pull),
        ]
    }

    fn browser(image: &str, path: &str) -> Browser {
        Browser {
            image: image.to_string(),
            port: "4444".to_string(),
            path: path.to_string(),
        }
    }

    async fn check_create_config(pull: bool) {
        let daemon = Arc::new(StubDaemon::new());
        let mut c = configurator(firefox_and_phantomjs(), daemon.clone());

        let cfg = c.build_config(&specs(2, pull)).await.unwrap();
        assert_eq!(cfg.len(), 2);

        let mut firefox = std::collections::BTreeMap::new();
        firefox.insert(
            "47.0".to_string(),
            browser("selenoid/firefox:47.0", "/wd/hub"),
        );
        firefox.insert(
            "46.0".to_string(),
            browser("selenoid/firefox:46.0", "/wd/hub"),
        );
        assert_eq!(
            cfg["firefox"],
            Versions {
                default: "47.0".to_string(),
                versions: firefox,
            }
        );

        let phantomjs = &cfg["phantomjs"];
        assert_eq!(phantomjs.default, "2.1.1");
        assert_eq!(phantomjs.versions.len(), 1);
        assert_eq!(
            phantomjs.versions["2.1.1"],
            browser("selenoid/phantomjs:2.1.1", "")
        );

        if pull {
            assert_eq!(
                daemon.pulled(),
                vec![
                    "selenoid/firefox:47.0",
                    "selenoid/firefox:46.0",
                    "selenoid/phantomjs:2.1.1"
                ]
            );
        } else {
            assert!(daemon.pulled().is_empty());
        }

        c.close();
    }

    #[tokio::test]
    async fn test_create_config() {
        check_create_config(true).await;
    }

    #[tokio::test]
    async fn test_limit_no_pull() {
        check_create_config(false).await;
    }

    #[tokio::test]
    async fn test_failed_pull_drops_only_that_tag() {
        let daemon = Arc::new(StubDaemon::new().with_failure("selenoid/firefox:47.0"));
        let c = configurator(firefox_and_phantomjs(), daemon);

        let outcome = c.build_config_with_report(&specs(2, true)).await.unwrap();

        let firefox = &outcome.config["firefox"];
        assert_eq!(firefox.default, "46.0");
        assert_eq!(firefox.versions.keys().collect::<Vec<_>>(), vec!["46.0"]);
        assert_eq!(outcome.failed_pulls.len(), 1);
        assert_eq!(outcome.failed_pulls[0].image, "selenoid/firefox:47.0");
        assert!(outcome.config.contains_key("phantomjs"));
    }

    #[tokio::test]
    async fn test_all_pulls_failing_omits_browser() {
        let daemon = Arc::new(StubDaemon::new().with_failure("selenoid/phantomjs:2.1.1"));
        let c = configurator(firefox_and_phantomjs(), daemon);

        let outcome = c.build_config_with_report(&specs(2, true)).await.unwrap();
        assert!(!outcome.config.contains_key("phantomjs"));
        assert!(outcome.config.contains_key("firefox"));
    }

    #[tokio::test]
    async fn test_no_versions_omits_browser() {
        let registry = Arc::new(
            StubRegistry::new()
                .with_tags("selenoid/firefox", &["47.0"])
                .with_tags("selenoid/edge", &["latest", "dev"])
                .with_tags("selenoid/empty", &[]),
        );
        let c = configurator(registry, Arc::new(StubDaemon::new()));

        let cfg = c
            .build_config(&[
                BrowserImageSpec::new("selenoid/firefox", 3, false),
                BrowserImageSpec::new("selenoid/edge", 3, false),
                BrowserImageSpec::new("selenoid/empty", 3, false),
            ])
            .await
            .unwrap();

        assert_eq!(cfg.keys().collect::<Vec<_>>(), vec!["firefox"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_build() {
        let registry = Arc::new(
            StubRegistry::new()
                .with_tags("selenoid/firefox", &["47.0"])
                .with_failure("selenoid/chrome", 404),
        );
        let daemon = Arc::new(StubDaemon::new());
        let c = configurator(registry.clone(), daemon.clone());

        let err = c
            .build_config(&[
                BrowserImageSpec::new("selenoid/firefox", 2, true),
                BrowserImageSpec::new("selenoid/chrome", 2, true),
                BrowserImageSpec::new("selenoid/opera", 2, true),
            ])
            .await
            .unwrap_err();

        assert!(
            matches!(err, ConfiguratorError::Fetch { ref repository, .. } if repository == "selenoid/chrome")
        );
        // Nothing after the failing browser is touched.
        assert_eq!(
            registry.requested(),
            vec!["selenoid/firefox", "selenoid/chrome"]
        );
    }

    #[tokio::test]
    async fn test_default_is_max_key_and_limit_respected() {
        let registry = Arc::new(StubRegistry::new().with_tags(
            "selenoid/chrome",
            &["9.0", "10.0", "latest", "10.0.1", "8", "beta"],
        ));
        let c = configurator(registry, Arc::new(StubDaemon::new()));

        for limit in 1..=6 {
            let cfg = c
                .build_config(&[BrowserImageSpec::new("selenoid/chrome", limit, false)])
                .await
                .unwrap();
            let chrome = &cfg["chrome"];

            assert_eq!(chrome.versions.len(), limit.min(4));
            assert_eq!(chrome.default, "10.0.1");
            assert_eq!(
                crate::version::max_version(chrome.versions.keys().map(String::as_str)),
                Some(chrome.default.as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_verbosity_does_not_change_output() {
        let registry = firefox_and_phantomjs();

        let mut quiet = Configurator::new(ConfiguratorSettings::default());
        quiet
            .initialize_with(registry.clone(), Arc::new(StubDaemon::new()))
            .unwrap();
        let mut loud = Configurator::new(ConfiguratorSettings {
            verbose: true,
            ..Default::default()
        });
        loud.initialize_with(registry, Arc::new(StubDaemon::new()))
            .unwrap();

        assert_eq!(
            quiet.build_config(&specs(2, true)).await.unwrap(),
            loud.build_config(&specs(2, true)).await.unwrap()
        );
        quiet.close();
        loud.close();
    }

    #[tokio::test]
    async fn test_family_launch_defaults() {
        let registry = Arc::new(
            StubRegistry::new()
                .with_tags("selenoid/chrome", &["60.0"])
                .with_tags("selenoid/firefox", &["47.0"])
                .with_tags("selenoid/opera", &["44.0", "12.16"])
                .with_tags("selenoid/phantomjs", &["2.1.1", "latest"]),
        );
        let mut c = Configurator::new(ConfiguratorSettings::default());
        c.initialize_with(registry, Arc::new(StubDaemon::new()))
            .unwrap();

        let cfg = c
            .build_config(&[
                BrowserImageSpec::new("selenoid/chrome", 1, false),
                BrowserImageSpec::new("selenoid/firefox", 1, false),
                BrowserImageSpec::new("selenoid/opera", 2, false),
                BrowserImageSpec::new("selenoid/phantomjs", 1, false),
            ])
            .await
            .unwrap();
        assert_eq!(cfg["chrome"].versions["60.0"].path, "/");
        assert_eq!(cfg["firefox"].versions["47.0"].path, "/wd/hub");
        assert_eq!(cfg["opera"].versions["44.0"].path, "/");
        assert_eq!(cfg["opera"].versions["12.16"].path, "/wd/hub");
        assert_eq!(
            cfg["phantomjs"].versions["2.1.1"],
            browser("selenoid/phantomjs:2.1.1", "")
        );

        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(
            json["phantomjs"]["versions"]["2.1.1"],
            serde_json::json!({"image": "selenoid/phantomjs:2.1.1", "port": "4444"})
        );
        c.close();
    }

    #[tokio::test]
    async fn test_state_machine() {
        let mut c = Configurator::new(ConfiguratorSettings::default());
        assert_eq!(c.state(), ConfiguratorState::Uninitialized);

        let err = c.build_config(&specs(2, false)).await.unwrap_err();
        assert!(matches!(
            err,
            ConfiguratorError::NotInitialized {
                state: ConfiguratorState::Uninitialized
            }
        ));

        c.initialize_with(firefox_and_phantomjs(), Arc::new(StubDaemon::new()))
            .unwrap();
        assert_eq!(c.state(), ConfiguratorState::Initialized);
        // A second initialize is a no-op.
        c.initialize_with(Arc::new(StubRegistry::new()), Arc::new(StubDaemon::new()))
            .unwrap();
        assert_eq!(c.build_config(&specs(2, false)).await.unwrap().len(), 2);

        c.close();
        c.close();
        assert_eq!(c.state(), ConfiguratorState::Closed);
        assert!(c.build_config(&specs(2, false)).await.is_err());
        assert!(
            c.initialize_with(firefox_and_phantomjs(), Arc::new(StubDaemon::new()))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_initialize_rejects_malformed_docker_host() {
        let mut c = Configurator::new(ConfiguratorSettings {
            connection: ConnectionSettings {
                registry_url: "http://127.0.0.1:1".to_string(),
                docker_host: Some("bogus-host".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });

        let err = c.initialize().await.unwrap_err();
        assert!(matches!(err, ConfiguratorError::Connectivity { .. }));
        assert_eq!(c.state(), ConfiguratorState::Uninitialized);

        c.close();
        assert_eq!(c.state(), ConfiguratorState::Closed);
    }

    #[tokio::test]
    async fn test_initialize_rejects_unreachable_registry() {
        let mut c = Configurator::new(ConfiguratorSettings {
            connection: ConnectionSettings {
                // Port 1 is reserved and nothing listens there.
                registry_url: "http://127.0.0.1:1".to_string(),
                docker_host: Some("tcp://127.0.0.1:2375".to_string()),
                request_timeout: Duration::from_secs(2),
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(matches!(
            c.initialize().await,
            Err(ConfiguratorError::Connectivity { .. })
        ));
        c.close();
    }
}
