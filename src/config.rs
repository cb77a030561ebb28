//! Environment-driven configuration.
//!
//! | Variable                 | Meaning                                    |
//! |--------------------------|--------------------------------------------|
//! | `ECCONV_LIBRARY`         | Load the driver from this path only        |
//! | `ECCONV_OUTPUT_CAPACITY` | Output buffer capacity in code units       |
//! | `ECCONV_SETTINGS`        | Where the active converter is remembered   |

use std::path::PathBuf;

use tracing::warn;

use crate::binder::ModuleLocator;
use crate::text::DEFAULT_OUTPUT_CAPACITY;

pub const LIBRARY_ENV: &str = "ECCONV_LIBRARY";
pub const OUTPUT_CAPACITY_ENV: &str = "ECCONV_OUTPUT_CAPACITY";
pub const SETTINGS_ENV: &str = "ECCONV_SETTINGS";

/// Largest output capacity the `int` length parameter can describe,
/// leaving room for the guard unit.
pub const MAX_OUTPUT_CAPACITY: usize = i32::MAX as usize - 1;

#[derive(Debug, Clone)]
pub struct Config {
    pub library: Option<PathBuf>,
    pub output_capacity: usize,
    pub settings_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: None,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            settings_path: default_settings_path(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(LIBRARY_ENV).filter(|v| !v.is_empty()) {
            config.library = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup(OUTPUT_CAPACITY_ENV) {
            match parse_capacity(&raw) {
                Some(capacity) => config.output_capacity = capacity,
                None => warn!(
                    value = raw,
                    default = DEFAULT_OUTPUT_CAPACITY,
                    "ignoring invalid {OUTPUT_CAPACITY_ENV}"
                ),
            }
        }

        if let Some(path) = lookup(SETTINGS_ENV).filter(|v| !v.is_empty()) {
            config.settings_path = Some(PathBuf::from(path));
        }

        config
    }

    pub fn locator(&self) -> ModuleLocator {
        ModuleLocator::new(self.library.clone())
    }
}

fn parse_capacity(raw: &str) -> Option<usize> {
    let capacity: usize = raw.trim().parse().ok()?;
    (1..=MAX_OUTPUT_CAPACITY)
        .contains(&capacity)
        .then_some(capacity)
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ecconv").join("converter.json"))
}
