//! Layered CLI settings
//!
//! Sources, lowest precedence first: built-in defaults, `scribe.toml` in the
//! working directory, `scribe/config.toml` in the user config directory, an
//! explicit `--config` file, then `SCRIBE_*` environment variables. Command
//! line flags are applied on top by the caller.

use anyhow::{bail, Context};
use config::{ConfigError, Environment, File};
use scribe_client::{
    Config, DEFAULT_MAX_CONCURRENT_PARTS, DEFAULT_MULTIPART_PART_SIZE, DEFAULT_MULTIPART_THRESHOLD,
    DEFAULT_SIGNED_URL_EXPIRY_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "SCRIBE";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Service endpoint URL
    pub endpoint: Option<String>,
    /// Organization that owns files and jobs
    pub organization: Option<String>,
    pub api_key: Option<String>,
    /// Shared secret for `verify-webhook`
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
    pub multipart_threshold: u64,
    pub multipart_part_size: u64,
    pub max_concurrent_parts: usize,
    pub signed_url_expiry_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: None,
            organization: None,
            api_key: None,
            webhook_secret: None,
            timeout_secs: 300,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_part_size: DEFAULT_MULTIPART_PART_SIZE,
            max_concurrent_parts: DEFAULT_MAX_CONCURRENT_PARTS,
            signed_url_expiry_secs: DEFAULT_SIGNED_URL_EXPIRY_SECS,
            poll_interval_secs: 3,
            poll_timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Load settings from files and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        // An explicitly requested file must exist
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::Message(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
        }

        let mut builder = config::Config::builder()
            .add_source(File::with_name("scribe").required(false));
        if let Some(user_file) = user_config_file() {
            builder = builder.add_source(File::from(user_file).required(false));
        }
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(env);

        builder.build()?.try_deserialize()
    }

    /// Turn the merged settings into a client configuration
    pub fn client_config(&self) -> anyhow::Result<Config> {
        let endpoint = self
            .endpoint
            .as_deref()
            .context("no endpoint configured (set --endpoint or SCRIBE_ENDPOINT)")?;
        let organization = self
            .organization
            .as_deref()
            .context("no organization configured (set --organization or SCRIBE_ORGANIZATION)")?;
        if self.multipart_part_size == 0 || self.max_concurrent_parts == 0 {
            bail!("multipart_part_size and max_concurrent_parts must be positive");
        }

        let mut config = Config::new(endpoint, organization)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_multipart(self.multipart_threshold, self.multipart_part_size)
            .with_max_concurrent_parts(self.max_concurrent_parts)
            .with_polling(
                Duration::from_secs(self.poll_interval_secs),
                Duration::from_secs(self.poll_timeout_secs),
            );
        config.signed_url_expiry_secs = self.signed_url_expiry_secs;
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        Ok(config)
    }
}

// E.g. `SCRIBE_API_KEY=... scribe list` sets `api_key`
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scribe").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_with(None, env_from(&[])).unwrap();
        assert_eq!(settings.max_concurrent_parts, DEFAULT_MAX_CONCURRENT_PARTS);
        assert_eq!(settings.poll_interval_secs, 3);
    }

    #[test]
    fn test_file_then_env_precedence() {
        let file = toml_file(
            r#"
            endpoint = "https://file.example.com"
            organization = "from-file"
            max_concurrent_parts = 5
            "#,
        );

        let settings = Settings::load_with(
            Some(file.path()),
            env_from(&[("SCRIBE_ORGANIZATION", "from-env"), ("SCRIBE_POLL_TIMEOUT_SECS", "30")]),
        )
        .unwrap();

        assert_eq!(settings.endpoint.as_deref(), Some("https://file.example.com"));
        assert_eq!(settings.organization.as_deref(), Some("from-env"));
        assert_eq!(settings.max_concurrent_parts, 5);
        assert_eq!(settings.poll_timeout_secs, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Settings::load_with(Some(Path::new("/nope/scribe.toml")), env_from(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_client_config_requires_endpoint_and_org() {
        let mut settings = Settings::default();
        assert!(settings.client_config().is_err());

        settings.endpoint = Some("https://api.example.com".into());
        settings.organization = Some("acme".into());
        settings.api_key = Some("k".into());
        settings.poll_timeout_secs = 60;

        let config = settings.client_config().unwrap();
        assert_eq!(config.organization, "acme");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.poll_timeout, Duration::from_secs(60));
    }
}
