//! Configuration module for Quarry
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so the command line can run with nothing but a seed
//! URL and override individual values with flags.
//!
//! # Example
//!
//! ```no_run
//! use quarry::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("quarry.toml")).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, FilterConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
