//! Operator configuration.
//!
//! Loads configuration with priority:
//! 1. Specified config file
//! 2. apiforge.toml in the current directory or one of its parents
//!
//! Values of the form `${VAR_NAME}` are resolved from the environment once,
//! at load time. Nothing reads the environment after that.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "apiforge.toml";

/// Operator supplied configuration, as written in `apiforge.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Region to use for multi-region backends
    #[serde(default)]
    pub region: Option<String>,

    /// Secret per security scheme name (can reference env vars with ${VAR_NAME})
    #[serde(default)]
    pub credentials: HashMap<String, String>,

    /// Values for operation headers, keyed by header name or config name
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Host overrides keyed by resource name
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut credentials: Vec<&str> = self.credentials.keys().map(String::as_str).collect();
        credentials.sort_unstable();
        let mut headers: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        headers.sort_unstable();
        f.debug_struct("ProviderConfig")
            .field("region", &self.region)
            .field("credentials", &credentials)
            .field("headers", &headers)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Non-secret operator settings consulted while resolving requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub region: Option<String>,
    pub endpoints: HashMap<String, String>,
    pub headers: HashMap<String, String>,
}

impl ProviderSettings {
    /// Endpoint override for `resource_name`, if one is configured.
    pub fn endpoint(&self, resource_name: &str) -> Option<&str> {
        self.endpoints
            .get(resource_name)
            .map(String::as_str)
            .filter(|e| !e.is_empty())
    }

    /// Configured value for an operation header.
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

impl ProviderConfig {
    /// Load configuration from `apiforge.toml`, searching the current
    /// directory and its parents.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::find_config_file()?,
        };

        tracing::debug!("Loading configuration from: {:?}", config_path);

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    /// Parse configuration from a TOML string and resolve env references.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: ProviderConfig = toml::from_str(contents)?;
        config.resolve_env_vars()?;
        Ok(config)
    }

    /// Find apiforge.toml by searching current directory and parents
    fn find_config_file() -> Result<PathBuf> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        Err(anyhow!(
            "{} not found in the current directory or any of its parents",
            CONFIG_FILE_NAME
        ))
    }

    /// Resolve ${VAR_NAME} references to environment variables.
    ///
    /// Region and endpoints decide where requests go, so an unset reference
    /// there is an error. Credentials and headers keep the literal text and
    /// log a warning naming the key.
    fn resolve_env_vars(&mut self) -> Result<()> {
        for (name, value) in self.credentials.iter_mut() {
            match Self::resolve_env_var(value) {
                Some(resolved) => *value = resolved,
                None => tracing::warn!("credential '{}' references an unset environment variable", name),
            }
        }

        for (name, value) in self.headers.iter_mut() {
            match Self::resolve_env_var(value) {
                Some(resolved) => *value = resolved,
                None => tracing::warn!("header '{}' references an unset environment variable", name),
            }
        }

        for (name, value) in self.endpoints.iter_mut() {
            let resolved = Self::resolve_env_var(value).ok_or_else(|| {
                anyhow!("endpoint '{}' references an unset environment variable: {}", name, value)
            })?;
            *value = resolved;
        }

        if let Some(region) = self.region.take() {
            let resolved = Self::resolve_env_var(&region).ok_or_else(|| {
                anyhow!("region references an unset environment variable: {}", region)
            })?;
            self.region = Some(resolved);
        }

        Ok(())
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    /// Non-secret settings used by the URL resolver and dispatcher.
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            region: self.region.clone(),
            endpoints: self.endpoints.clone(),
            headers: self.headers.clone(),
        }
    }
}
