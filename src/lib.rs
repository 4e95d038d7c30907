//! Generates Selenoid `browsers.json` documents.
//!
//! Lists the tags of each browser image in a Docker Registry, keeps the
//! newest numeric versions, optionally pulls them through the Docker Engine
//! API and assembles the result into a map from browser name to versions.

pub mod cli;
pub mod config;
pub mod configurator;
pub mod daemon;
pub mod error;
pub mod registry;
pub mod testing;
pub mod version;
