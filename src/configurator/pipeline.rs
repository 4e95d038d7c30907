//! The per-browser stages: fetch → select → pull → assemble.
//!
//! Each stage is a free function over the adapter traits so it can be
//! exercised on its own with the fakes in [`crate::testing`].

use std::collections::BTreeMap;

use crate::configurator::browsers::{Browser, LaunchDefaults, Versions};
use crate::daemon::ImagePuller;
use crate::error::{ConfiguratorError, Result};
use crate::registry::TagRegistry;
use crate::version;

/// One browser image to configure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserImageSpec {
    /// Repository name, e.g. `selenoid/firefox`.
    pub repository: String,
    /// Maximum number of versions to keep.
    pub limit: usize,
    /// Whether to pull every kept version onto the local host.
    pub pull: bool,
}

impl BrowserImageSpec {
    pub fn new(repository: impl Into<String>, limit: usize, pull: bool) -> Self {
        Self {
            repository: repository.into(),
            limit,
            pull,
        }
    }
}

/// A tag that was selected but could not be pulled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullFailure {
    /// Image reference, `repository:tag`.
    pub image: String,
    /// Reason reported by the daemon adapter.
    pub reason: String,
}

/// Routes progress messages to `info` in verbose mode, `debug` otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Progress {
    pub verbose: bool,
}

impl Progress {
    pub(crate) fn report(&self, message: std::fmt::Arguments<'_>) {
        if self.verbose {
            tracing::info!("{}", message);
        } else {
            tracing::debug!("{}", message);
        }
    }
}

/// `selenoid/firefox` + `47.0` → `selenoid/firefox:47.0`.
pub fn image_with_tag(repository: &str, tag: &str) -> String {
    format!("{}:{}", repository, tag)
}

/// Browser name from the last path segment: `selenoid/firefox` → `firefox`.
pub fn browser_name(repository: &str) -> &str {
    let trimmed = repository.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Fetch stage. A registry failure becomes a [`ConfiguratorError::Fetch`].
pub async fn fetch_tags(registry: &dyn TagRegistry, repository: &str) -> Result<Vec<String>> {
    registry
        .list_tags(repository)
        .await
        .map_err(|source| ConfiguratorError::Fetch {
            repository: repository.to_string(),
            source,
        })
}

/// Select stage: drop non-versions, sort newest first, keep at most `limit`.
pub fn select_versions(tags: &[String], limit: usize) -> Vec<String> {
    let mut sorted = version::sort_descending(tags);
    sorted.truncate(limit);
    sorted
}

/// Pull stage. Tags are pulled one at a time in the given order; failures
/// are recorded in `failures` and left out of the returned list.
pub(crate) async fn pull_versions(
    daemon: &dyn ImagePuller,
    repository: &str,
    tags: Vec<String>,
    progress: Progress,
    failures: &mut Vec<PullFailure>,
) -> Vec<String> {
    let mut pulled = Vec::with_capacity(tags.len());

    for tag in tags {
        let image = image_with_tag(repository, &tag);
        progress.report(format_args!("Pulling image {}", image));

        match daemon.pull(repository, &tag).await {
            Ok(()) => {
                progress.report(format_args!("Pulled image {}", image));
                pulled.push(tag);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", image, e);
                failures.push(PullFailure {
                    image,
                    reason: e.to_string(),
                });
            }
        }
    }

    pulled
}

/// Assemble stage. `tags` must be ordered newest first; `None` when empty.
///
/// The default is the first tag. When several tags share the top key
/// (`46`, `46.0`) that is the one the registry listed first.
pub fn assemble_versions(
    repository: &str,
    tags: &[String],
    launch: &LaunchDefaults,
) -> Option<Versions> {
    let default = tags.first()?.clone();
    let browser = browser_name(repository);

    let versions: BTreeMap<String, Browser> = tags
        .iter()
        .map(|tag| {
            let launch = launch.for_version(browser, tag);
            (
                tag.clone(),
                Browser {
                    image: image_with_tag(repository, tag),
                    port: launch.port.clone(),
                    path: launch.path.clone(),
                },
            )
        })
        .collect();

    Some(Versions { default, versions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::testing::{StubDaemon, StubRegistry};
    use pretty_assertions::assert_eq;

    fn strings(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_image_with_tag() {
        assert_eq!(
            image_with_tag("selenoid/firefox", "tag"),
            "selenoid/firefox:tag"
        );
    }

    #[test]
    fn test_browser_name() {
        assert_eq!(browser_name("selenoid/firefox"), "firefox");
        assert_eq!(browser_name("registry.local:5000/team/chrome"), "chrome");
        assert_eq!(browser_name("phantomjs"), "phantomjs");
        assert_eq!(browser_name("selenoid/opera/"), "opera");
    }

    #[test]
    fn test_select_versions_limit() {
        let tags = strings(&["46.0", "45.0", "47.0", "latest"]);

        assert_eq!(select_versions(&tags, 2), vec!["47.0", "46.0"]);
        assert_eq!(select_versions(&tags, 10), vec!["47.0", "46.0", "45.0"]);
        assert!(select_versions(&tags, 0).is_empty());
    }

    #[test]
    fn test_select_versions_returns_min_of_limit_and_valid() {
        let tags = strings(&["1.0", "2.0", "3.0", "nightly", "4.0"]);
        for limit in 0..7 {
            assert_eq!(select_versions(&tags, limit).len(), limit.min(4));
        }
    }

    #[tokio::test]
    async fn test_fetch_tags_maps_errors() {
        let registry = StubRegistry::new().with_failure("selenoid/chrome", 500);

        let err = fetch_tags(&registry, "selenoid/chrome").await.unwrap_err();
        match err {
            ConfiguratorError::Fetch { repository, source } => {
                assert_eq!(repository, "selenoid/chrome");
                assert!(matches!(source, RegistryError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pull_versions_skips_failures_in_order() {
        let daemon = StubDaemon::new().with_failure("selenoid/firefox:46.0");
        let mut failures = Vec::new();

        let pulled = pull_versions(
            &daemon,
            "selenoid/firefox",
            strings(&["47.0", "46.0", "45.0"]),
            Progress { verbose: true },
            &mut failures,
        )
        .await;

        assert_eq!(pulled, vec!["47.0", "45.0"]);
        assert_eq!(
            daemon.pulled(),
            vec![
                "selenoid/firefox:47.0",
                "selenoid/firefox:46.0",
                "selenoid/firefox:45.0"
            ]
        );
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].image, "selenoid/firefox:46.0");
    }

    #[test]
    fn test_assemble_versions() {
        let launch = LaunchDefaults::default();
        let versions =
            assemble_versions("selenoid/firefox", &strings(&["47.0", "46.0"]), &launch).unwrap();

        assert_eq!(versions.default, "47.0");
        assert_eq!(versions.versions.len(), 2);
        assert_eq!(
            versions.versions["46.0"],
            Browser {
                image: "selenoid/firefox:46.0".to_string(),
                port: "4444".to_string(),
                path: "/wd/hub".to_string(),
            }
        );
    }

    #[test]
    fn test_assemble_empty_is_omitted() {
        assert!(assemble_versions("selenoid/firefox", &[], &LaunchDefaults::default()).is_none());
    }

    #[test]
    fn test_assemble_picks_launch_per_version() {
        let launch = LaunchDefaults::default();

        let opera = assemble_versions("selenoid/opera", &strings(&["44.0", "12.16"]), &launch)
            .unwrap();
        assert_eq!(opera.versions["44.0"].path, "/");
        assert_eq!(opera.versions["12.16"].path, "/wd/hub");

        let phantomjs =
            assemble_versions("selenoid/phantomjs", &strings(&["2.1.1"]), &launch).unwrap();
        assert_eq!(phantomjs.versions["2.1.1"].path, "");
        assert_eq!(phantomjs.versions["2.1.1"].port, "4444");
    }

    #[test]
    fn test_assemble_default_with_equal_keys() {
        let tags = select_versions(&strings(&["46.0", "45.0", "46"]), 3);
        let versions =
            assemble_versions("selenoid/firefox", &tags, &LaunchDefaults::default()).unwrap();

        assert_eq!(versions.default, "46.0");
        // Map order puts "46" first; both carry the top key.
        let top = version::max_version(versions.versions.keys().map(String::as_str)).unwrap();
        assert_eq!(top, "46");
        assert_eq!(
            version::VersionKey::parse(&versions.default),
            version::VersionKey::parse(top)
        );
    }
}
