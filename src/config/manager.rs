//! Configuration source wrangling
// (c) 2024 Ross Younger

use std::path::Path;

use anyhow::Result;
use figment::{
    providers::{Env, Format as _, Serialized, Toml},
    Figment, Provider,
};
use serde::Deserialize;
use tracing::debug;

use super::Configuration;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "TCPFETCH_";

/// Processes and merges all possible configuration sources.
#[derive(Debug)]
pub struct Manager {
    data: Figment,
}

impl Manager {
    fn new(config_file: Option<&Path>, apply_env: bool) -> Result<Self> {
        let mut new1 = Self {
            data: Figment::from(Serialized::defaults(Configuration::system_default())),
        };
        if let Some(path) = config_file {
            // figment quietly skips missing files, which would hide a typo
            if !path.is_file() {
                anyhow::bail!("configuration file {} not found", path.display());
            }
            debug!("reading configuration from {}", path.display());
            new1.merge_provider(Toml::file(path));
        }
        if apply_env {
            new1.merge_provider(Env::prefixed(ENV_PREFIX));
        }
        Ok(new1)
    }

    /// General constructor for production use.
    ///
    /// Applies the system defaults, then the given configuration file (if any),
    /// then the environment.
    pub fn standard(config_file: Option<&Path>) -> Result<Self> {
        Self::new(config_file, true)
    }

    /// Testing constructor, does not apply the environment
    #[cfg(test)]
    pub(crate) fn without_env(config_file: Option<&Path>) -> Result<Self> {
        Self::new(config_file, false)
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    /// This uses figment's `merge` operation, which prefers to _replace_ existing items.
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider); // in the error case, this leaves the provider in a fused state
    }

    /// Attempts to extract a particular struct from the data.
    ///
    /// `T` is usually [Configuration], but it isn't intrinsically required to be.
    pub fn get<'de, T>(&self) -> Result<T, figment::Error>
    where
        T: Deserialize<'de>,
    {
        self.data.extract::<T>()
    }
}
