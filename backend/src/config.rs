//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded by the binary
//! through `dotenvy`). CLI flags override them.
//!
//! | Variable                     | Default  |
//! |------------------------------|----------|
//! | `SCHOOLMIX_API_BASE_URL`     | none     |
//! | `SCHOOLMIX_API_KEY`          | none     |
//! | `SCHOOLMIX_COMPARISON_YEAR`  | `14-15`  |
//! | `SCHOOLMIX_PORT`             | `3000`   |

use std::env;

use crate::error::ConfigError;

/// Year used for the "after" snapshot when nothing else is configured.
pub const DEFAULT_COMPARISON_YEAR: &str = "14-15";

pub const DEFAULT_PORT: u16 = 3000;

/// Upload size limit for the HTTP API (in bytes).
pub const MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;

pub const API_BASE_URL_VAR: &str = "SCHOOLMIX_API_BASE_URL";
pub const API_KEY_VAR: &str = "SCHOOLMIX_API_KEY";
pub const COMPARISON_YEAR_VAR: &str = "SCHOOLMIX_COMPARISON_YEAR";
pub const PORT_VAR: &str = "SCHOOLMIX_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the schools API, without the `/schools` suffix.
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub comparison_year: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_key: None,
            comparison_year: DEFAULT_COMPARISON_YEAR.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

fn trimmed<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Comparison year alone, for commands that need nothing else.
///
/// Never fails, whatever the rest of the environment holds.
pub fn comparison_year_from_env() -> String {
    comparison_year_from_lookup(|key| env::var(key).ok())
}

pub fn comparison_year_from_lookup<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    trimmed(&lookup, COMPARISON_YEAR_VAR).unwrap_or_else(|| DEFAULT_COMPARISON_YEAR.to_string())
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| trimmed(&lookup, key);
        let defaults = Self::default();

        let port = match get(PORT_VAR) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: PORT_VAR,
                value: raw.clone(),
                message: e.to_string(),
            })?,
            None => defaults.port,
        };

        Ok(Self {
            api_base_url: get(API_BASE_URL_VAR).map(|url| url.trim_end_matches('/').to_string()),
            api_key: get(API_KEY_VAR),
            comparison_year: comparison_year_from_lookup(&lookup),
            port,
        })
    }

    /// Whether the remote schools API can be used.
    pub fn has_api(&self) -> bool {
        self.api_base_url.is_some() && self.api_key.is_some()
    }
}
