use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf};

use crate::error::PipelineError;
use crate::provider::ProviderId;

/// Stored credentials for a single provider. PVGIS needs none of this;
/// NSRDB needs the API key plus the requester identity fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "pvgis" or "nsrdb".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.nsrdb]
    /// api_key = "..."
    /// full_name = "..."
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId, PipelineError> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            PipelineError::invalid_input(
                "No default provider configured.\n\
                 Hint: run `facadepv configure <provider>` (e.g. `facadepv configure pvgis`) first.",
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "facadepv", "facadepv-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider's stored credentials and make it the default
    /// if none is set yet.
    pub fn upsert_provider(&mut self, provider_id: ProviderId, provider: ProviderConfig) {
        self.providers.insert(provider_id.as_str().to_string(), provider);

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.providers.contains_key(provider_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nsrdb_config() -> ProviderConfig {
        ProviderConfig {
            api_key: "KEY".into(),
            full_name: Some("Jane Roe".into()),
            email: Some("jane@example.com".into()),
            affiliation: Some("Example Labs".into()),
        }
    }

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn upsert_sets_default_when_none() {
        let mut cfg = Config::default();

        cfg.upsert_provider(ProviderId::Nsrdb, nsrdb_config());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::Nsrdb);
        assert!(cfg.is_provider_configured(ProviderId::Nsrdb));
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider(ProviderId::Pvgis, ProviderConfig::default());
        cfg.upsert_provider(ProviderId::Nsrdb, nsrdb_config());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::Pvgis);
    }

    #[test]
    fn set_default_provider_overrides_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider(ProviderId::Pvgis, ProviderConfig::default());
        cfg.upsert_provider(ProviderId::Nsrdb, nsrdb_config());

        cfg.set_default_provider(ProviderId::Nsrdb);

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::Nsrdb);
    }

    #[test]
    fn toml_roundtrip_preserves_identity_fields() {
        let mut cfg = Config::default();
        cfg.upsert_provider(ProviderId::Nsrdb, nsrdb_config());

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();

        let stored = back.provider_config(ProviderId::Nsrdb).unwrap();
        assert_eq!(stored.api_key, "KEY");
        assert_eq!(stored.email.as_deref(), Some("jane@example.com"));
    }
}
