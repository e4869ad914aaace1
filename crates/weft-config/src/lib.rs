#![allow(clippy::must_use_candidate)]

//! Configuration for the weft command line
//!
//! A single TOML file with a `[logging]` section and a `[generator]` section.
//! `${VAR}` and `${VAR:-default}` placeholders are expanded before parsing.

mod env;
pub mod generator;
mod loader;
pub mod logging;

use serde::Deserialize;

pub use generator::{GeneratorConfig, TokenConfig};
pub use logging::{LogFormat, LoggingConfig};

/// Top-level weft configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Chat generator construction parameters
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
}
