//! Configuration loader with layered sources
//!
//! Loads configuration from, in increasing precedence:
//! 1. Default values
//! 2. User-level config: ~/.labeler/labeler.toml
//! 3. Project-level config: ./.labeler/labeler.toml
//! 4. An explicit file (TOML, or YAML for `.yaml`/`.yml`)
//! 5. `LABELER_*` environment variables
//!
//! Files are merged key by key: a later file only overrides the keys it sets.
//! Arrays such as `categories` are replaced as a whole. CLI flags are applied
//! on top by the binary.

use crate::config::schema::JobConfig;
use crate::error::{LabelerError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tooling::config::{build_env_key, get_env, get_env_bool, get_env_parse};
use tracing::{debug, info};

/// Default prefix for environment overrides
pub const ENV_PREFIX: &str = "LABELER_";

/// Configuration loader
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a loader for the standard locations
    pub fn new() -> Self {
        Self {
            user_config_path: Self::user_config_path(),
            project_config_path: Self::project_config_path(),
            explicit_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Create a loader for custom user and project locations
    pub fn with_paths(user: Option<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: user,
            project_config_path: project.into(),
            explicit_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Add an explicit config file; it must exist
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Get user-level config path (~/.labeler/labeler.toml)
    fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".labeler").join("labeler.toml"))
    }

    /// Get project-level config path (./.labeler/labeler.toml)
    fn project_config_path() -> PathBuf {
        PathBuf::from(".labeler").join("labeler.toml")
    }

    pub fn get_user_config_path(&self) -> Option<&PathBuf> {
        self.user_config_path.as_ref()
    }

    pub fn get_project_config_path(&self) -> &PathBuf {
        &self.project_config_path
    }

    /// Load and merge every layer, then apply environment overrides
    ///
    /// Missing user or project files are skipped; a file that exists but does
    /// not parse is an error.
    pub async fn load(&self) -> Result<JobConfig> {
        let mut merged = toml::Value::Table(toml::Table::new());

        if let Some(user_path) = &self.user_config_path {
            if let Some(layer) = Self::read_optional(user_path).await? {
                debug!(path = %user_path.display(), "Loaded user-level config");
                merge_values(&mut merged, layer);
            }
        }

        if let Some(layer) = Self::read_optional(&self.project_config_path).await? {
            debug!(path = %self.project_config_path.display(), "Loaded project-level config");
            merge_values(&mut merged, layer);
        }

        if let Some(explicit) = &self.explicit_path {
            let layer = Self::read_optional(explicit).await?.ok_or_else(|| {
                LabelerError::Config(format!("Config file not found: {}", explicit.display()))
            })?;
            debug!(path = %explicit.display(), "Loaded explicit config");
            merge_values(&mut merged, layer);
        }

        let mut config: JobConfig = merged.try_into()?;
        self.apply_env_overrides(&mut config)?;

        info!(categories = config.categories.len(), "Configuration loaded");
        Ok(config)
    }

    async fn read_optional(path: &Path) -> Result<Option<toml::Value>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LabelerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        parse_layer(path, &content).map(Some)
    }

    fn env_key(&self, name: &str) -> String {
        build_env_key(&self.env_prefix, name)
    }

    /// Apply `<prefix>*` environment variables
    pub fn apply_env_overrides(&self, config: &mut JobConfig) -> Result<()> {
        if let Some(mode) = get_env_parse(&self.env_key("sampling_mode"))? {
            config.sampling.mode = mode;
        }
        if let Some(seed) = get_env_parse(&self.env_key("seed"))? {
            config.sampling.seed = Some(seed);
        }
        if let Some(positive) = get_env_parse(&self.env_key("target_positive"))? {
            config.targets.positive = positive;
        }
        if let Some(negative) = get_env_parse(&self.env_key("target_negative"))? {
            config.targets.negative = negative;
        }
        if let Some(attempts) = get_env_parse(&self.env_key("max_retries"))? {
            config.retry.max_retries = attempts;
        }
        if let Some(delay) = get_env_parse(&self.env_key("retry_delay_ms"))? {
            config.retry.retry_delay_ms = delay;
        }
        if let Some(path) = get_env(&self.env_key("checkpoint_path"))? {
            config.checkpoint.path = Some(PathBuf::from(path));
        }
        if let Some(every) = get_env_parse(&self.env_key("checkpoint_every"))? {
            config.checkpoint.every = every;
        }
        if let Some(keep) = get_env_bool(&self.env_key("keep_checkpoint"))? {
            config.checkpoint.keep = keep;
        }
        if let Some(concurrency) = get_env_parse(&self.env_key("concurrency"))? {
            config.execution.concurrency = concurrency;
        }
        if let Some(size) = get_env_parse(&self.env_key("cache_size"))? {
            config.execution.cache_size = size;
        }
        if let Some(column) = get_env(&self.env_key("text_column"))? {
            config.input.text_column = column;
        }
        if let Some(column) = get_env(&self.env_key("date_column"))? {
            config.input.date_column = column;
        }
        if let Some(dir) = get_env(&self.env_key("output_dir"))? {
            config.output.dir = PathBuf::from(dir);
        }
        if let Some(url) = get_env(&self.env_key("base_url"))? {
            config.classifier.base_url = url;
        }
        if let Some(model) = get_env(&self.env_key("model"))? {
            config.classifier.model = model;
        }
        if let Some(timeout) = get_env_parse(&self.env_key("timeout_secs"))? {
            config.classifier.timeout_secs = timeout;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a config file body, choosing YAML or TOML by extension
pub fn parse_layer(path: &Path, content: &str) -> Result<toml::Value> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yaml" | "yml"))
        .unwrap_or(false);

    let value = if is_yaml {
        serde_yaml::from_str::<toml::Value>(content).map_err(|e| {
            LabelerError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?
    } else {
        toml::Value::Table(toml::from_str::<toml::Table>(content).map_err(|e| {
            LabelerError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?)
    };

    if !value.is_table() {
        return Err(LabelerError::Config(format!(
            "{} must contain a table of settings",
            path.display()
        )));
    }
    Ok(value)
}

/// Recursively merge `overlay` into `base`; tables merge, everything else is replaced
pub fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
