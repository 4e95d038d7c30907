//! Command-line interface.
//!
//! Flags override the environment-resolved [`Config`](crate::config::Config).

mod generate;

pub use generate::{run_generate, write_config};

use std::path::PathBuf;

use clap::{ColorChoice, Parser};

use crate::config::{Config, parse_browser_list};
use crate::error::ConfigError;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "browsers-configurator")]
#[command(about = "Generate a Selenoid browsers.json from Docker Registry tags")]
#[command(
    long_about = "Lists the tags of each browser image, keeps the newest versions and writes browsers.json.\nExamples:\n  browsers-configurator --limit 3 > browsers.json\n  browsers-configurator --browsers selenoid/firefox,selenoid/chrome --pull -o browsers.json"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    /// Comma-separated image repositories (env: BROWSERS)
    #[arg(short, long)]
    pub browsers: Option<String>,

    /// Number of newest versions to keep per browser (env: BROWSER_VERSIONS_LIMIT)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,

    /// Pull the selected images onto the Docker host; `--pull=false` turns
    /// it off (env: PULL_IMAGES)
    #[arg(
        short,
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub pull: Option<bool>,

    /// Docker Registry URL (env: DOCKER_REGISTRY_URL)
    #[arg(long)]
    pub registry: Option<String>,

    /// Docker daemon address, e.g. unix:///var/run/docker.sock (env: DOCKER_HOST)
    #[arg(long)]
    pub docker_host: Option<String>,

    /// Docker Engine API version (env: DOCKER_API_VERSION)
    #[arg(long)]
    pub docker_api_version: Option<String>,

    /// Write the document to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report fetch and pull progress; `--verbose=false` turns it off
    /// (env: CONFIGURATOR_VERBOSE)
    #[arg(
        short,
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Apply flags on top of `config`.
    pub fn apply(&self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(ref browsers) = self.browsers {
            config.browsers = parse_browser_list(browsers)?;
        }
        if let Some(limit) = self.limit {
            config.limit = limit as usize;
        }
        if let Some(ref registry) = self.registry {
            config.registry_url = registry.clone();
        }
        if let Some(ref host) = self.docker_host {
            config.docker_host = Some(host.clone());
        }
        if let Some(ref version) = self.docker_api_version {
            config.docker_api_version = version.clone();
        }
        if let Some(pull) = self.pull {
            config.pull = pull;
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
        }

        config.validate()?;
        Ok(config)
    }
}
