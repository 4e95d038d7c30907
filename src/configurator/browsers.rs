//! Output document types (`browsers.json`).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::version::VersionKey;

/// Port every Selenoid browser image listens on.
pub const DEFAULT_PORT: &str = "4444";

/// WebDriver base path for images that serve under `/wd/hub`.
pub const WD_HUB_PATH: &str = "/wd/hub";

/// Last Presto-based Opera release. Later Opera images are Blink-based.
pub const LAST_PRESTO_OPERA: &str = "12.16";

/// Container launch descriptor for one version of one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Browser {
    /// Image reference, `repository:tag`.
    pub image: String,
    /// Port exposed by the container.
    pub port: String,
    /// Base path of the WebDriver endpoint.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

/// All configured versions of one browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    /// Highest retained version.
    pub default: String,
    /// Version tag to launch descriptor.
    pub versions: BTreeMap<String, Browser>,
}

/// The complete document, keyed by browser name.
pub type BrowsersConfig = BTreeMap<String, Versions>;

/// Port and path emitted for every version of a browser family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserLaunch {
    pub port: String,
    pub path: String,
}

impl BrowserLaunch {
    pub fn new(port: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            path: path.into(),
        }
    }
}

impl Default for BrowserLaunch {
    /// Default port, no path.
    fn default() -> Self {
        Self::new(DEFAULT_PORT, "")
    }
}

/// Override for the versions of one family up to and including `up_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRule {
    pub browser: String,
    pub up_to: VersionKey,
    pub launch: BrowserLaunch,
}

/// Launch defaults with per-family and per-version overrides.
///
/// Lookup order: the first matching [`VersionRule`], then the family
/// override, then `fallback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchDefaults {
    /// Used for any browser without an override.
    pub fallback: BrowserLaunch,
    /// Overrides keyed by browser name (`chrome`, `opera`, ...).
    pub families: HashMap<String, BrowserLaunch>,
    /// Version-bounded overrides, checked before `families`.
    pub rules: Vec<VersionRule>,
}

impl LaunchDefaults {
    /// Same port/path for every browser.
    pub fn uniform(launch: BrowserLaunch) -> Self {
        Self {
            fallback: launch,
            families: HashMap::new(),
            rules: Vec::new(),
        }
    }

    /// Add or replace the override for one browser family.
    pub fn with_family(mut self, browser: impl Into<String>, launch: BrowserLaunch) -> Self {
        self.families.insert(browser.into(), launch);
        self
    }

    /// Override `browser` versions `<= up_to`. A non-numeric `up_to`
    /// is ignored.
    pub fn with_versions_up_to(
        mut self,
        browser: impl Into<String>,
        up_to: &str,
        launch: BrowserLaunch,
    ) -> Self {
        match VersionKey::parse(up_to) {
            Some(up_to) => self.rules.push(VersionRule {
                browser: browser.into(),
                up_to,
                launch,
            }),
            None => tracing::warn!("Ignoring launch override for non-numeric version {}", up_to),
        }
        self
    }

    /// Use `port` for every browser and version, keeping each path.
    pub fn with_port(mut self, port: &str) -> Self {
        for launch in self.launches_mut() {
            launch.port = port.to_string();
        }
        self
    }

    /// Use `path` for every browser and version, keeping each port.
    pub fn with_path(mut self, path: &str) -> Self {
        for launch in self.launches_mut() {
            launch.path = path.to_string();
        }
        self
    }

    /// Port/path for `browser`, ignoring version rules.
    pub fn for_browser(&self, browser: &str) -> &BrowserLaunch {
        self.families.get(browser).unwrap_or(&self.fallback)
    }

    /// Port/path for one `tag` of `browser`.
    pub fn for_version(&self, browser: &str, tag: &str) -> &BrowserLaunch {
        if let Some(key) = VersionKey::parse(tag)
            && let Some(rule) = self
                .rules
                .iter()
                .find(|rule| rule.browser == browser && key <= rule.up_to)
        {
            return &rule.launch;
        }
        self.for_browser(browser)
    }

    fn launches_mut(&mut self) -> impl Iterator<Item = &mut BrowserLaunch> {
        std::iter::once(&mut self.fallback)
            .chain(self.families.values_mut())
            .chain(self.rules.iter_mut().map(|rule| &mut rule.launch))
    }
}

impl Default for LaunchDefaults {
    /// Firefox and Presto Opera serve WebDriver at `/wd/hub`, Chrome and
    /// Blink Opera at `/`. Anything else gets no path.
    fn default() -> Self {
        Self::uniform(BrowserLaunch::default())
            .with_family("firefox", BrowserLaunch::new(DEFAULT_PORT, WD_HUB_PATH))
            .with_family("chrome", BrowserLaunch::new(DEFAULT_PORT, "/"))
            .with_family("opera", BrowserLaunch::new(DEFAULT_PORT, "/"))
            .with_versions_up_to(
                "opera",
                LAST_PRESTO_OPERA,
                BrowserLaunch::new(DEFAULT_PORT, WD_HUB_PATH),
            )
    }
}
