//! Startup configuration read from the environment.

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_MAX_THREADS: usize = 64;
pub const DEFAULT_STATIC_DIR: &str = "public";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid port '{0}'")]
    InvalidPort(String),
    #[error("Invalid value for {name}: '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    /// Actix worker count; actix picks one per core when unset.
    pub workers: Option<usize>,
    pub max_blocking_threads: usize,
    /// Client pages; only served when the directory exists.
    pub static_dir: PathBuf,
}

impl Config {
    /// Reads the process environment. A first command-line argument overrides
    /// `PORT`.
    ///
    /// # Errors
    ///
    /// * If the port or a numeric variable does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::args().nth(1), |name| std::env::var(name).ok())
    }

    /// # Errors
    ///
    /// * If the port or a numeric variable does not parse
    pub fn from_vars(
        port_arg: Option<String>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let port = match port_arg.or_else(|| var("PORT")) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(value))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            workers: parse_usize("ACTIX_WORKERS", var("ACTIX_WORKERS"))?,
            max_blocking_threads: parse_usize("MAX_THREADS", var("MAX_THREADS"))?
                .unwrap_or(DEFAULT_MAX_THREADS),
            static_dir: var("STATIC_DIR").map_or_else(|| DEFAULT_STATIC_DIR.into(), PathBuf::from),
        })
    }
}

fn parse_usize(name: &'static str, value: Option<String>) -> Result<Option<usize>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        })
        .transpose()
}
