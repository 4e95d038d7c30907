//! Runs the configurator and writes `browsers.json`.

use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::config::Config;
use crate::configurator::{BrowsersConfig, Configurator};

/// Build the configuration described by `config` and write it out.
pub async fn run_generate(config: &Config, output: Option<&Path>) -> anyhow::Result<()> {
    let mut configurator = Configurator::new(config.to_settings());

    let result = async {
        configurator
            .initialize()
            .await
            .context("failed to initialize configurator")?;
        configurator
            .build_config_with_report(&config.to_specs())
            .await
            .context("failed to build browsers configuration")
    }
    .await;

    // Release clients whether or not the build succeeded.
    configurator.close();
    let outcome = result?;

    for failure in &outcome.failed_pulls {
        tracing::warn!("Not configured: {} ({})", failure.image, failure.reason);
    }
    if outcome.config.is_empty() {
        tracing::warn!("No browser had any usable version; writing an empty document");
    }

    write_config(&outcome.config, output)?;

    if let Some(path) = output {
        tracing::info!(
            "Wrote {} browser(s) to {}",
            outcome.config.len(),
            path.display()
        );
    }
    Ok(())
}

/// Serialize `config` as pretty JSON to `output`, or stdout when `None`.
pub fn write_config(config: &BrowsersConfig, output: Option<&Path>) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(config)?;
    json.push('\n');

    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::configurator::{Browser, Versions};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_config_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browsers.json");

        let mut versions = BTreeMap::new();
        versions.insert(
            "2.1.1".to_string(),
            Browser {
                image: "selenoid/phantomjs:2.1.1".to_string(),
                port: "4444".to_string(),
                path: String::new(),
            },
        );
        let mut config = BrowsersConfig::new();
        config.insert(
            "phantomjs".to_string(),
            Versions {
                default: "2.1.1".to_string(),
                versions,
            },
        );

        write_config(&config, Some(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with('\n'));
        let back: BrowsersConfig = serde_json::from_str(&written).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_write_config_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("browsers.json");

        let err = write_config(&BrowsersConfig::new(), Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to write"));
    }
}
