//! CLI-specific configuration management

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use directories::ProjectDirs;
use ds_utils::api::{DEFAULT_API_DOMAIN, DEFAULT_API_VERSION};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.json";

/// Defaults for every command, flags and `DS_*` environment variables take precedence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub project_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dataset: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
	#[serde(default = "default_api_domain")]
	pub api_domain: String,
	#[serde(default = "default_api_version")]
	pub api_version: String,
}

fn default_api_domain() -> String {
	DEFAULT_API_DOMAIN.to_string()
}

fn default_api_version() -> String {
	DEFAULT_API_VERSION.to_string()
}

impl Default for CliConfig {
	fn default() -> Self {
		Self {
			project_id: None,
			dataset: None,
			token: None,
			api_domain: default_api_domain(),
			api_version: default_api_version(),
		}
	}
}

/// Keys accepted by `dsctl config get|set`
pub const KEYS: [&str; 5] = ["project_id", "dataset", "token", "api_domain", "api_version"];

impl CliConfig {
	/// Platform config directory, `~/.config/dsctl` on Linux
	pub fn default_dir() -> Result<PathBuf> {
		ProjectDirs::from("", "", "dsctl")
			.map(|dirs| dirs.config_dir().to_path_buf())
			.context("could not determine a config directory for this platform")
	}

	pub fn config_path(config_dir: &Path) -> PathBuf {
		config_dir.join(CONFIG_FILE)
	}

	/// Loads the config, a missing file means defaults
	pub fn load(config_dir: &Path) -> Result<Self> {
		let path = Self::config_path(config_dir);

		if !path.exists() {
			return Ok(Self::default());
		}

		let json = std::fs::read_to_string(&path)
			.with_context(|| format!("reading config file {}", path.display()))?;

		serde_json::from_str(&json)
			.with_context(|| format!("parsing config file {}", path.display()))
	}

	pub fn save(&self, config_dir: &Path) -> Result<()> {
		std::fs::create_dir_all(config_dir)
			.with_context(|| format!("creating config directory {}", config_dir.display()))?;

		let path = Self::config_path(config_dir);
		std::fs::write(&path, serde_json::to_string_pretty(self)?)
			.with_context(|| format!("writing config file {}", path.display()))
	}

	pub fn get(&self, key: &str) -> Result<Option<&str>> {
		Ok(match key {
			"project_id" => self.project_id.as_deref(),
			"dataset" => self.dataset.as_deref(),
			"token" => self.token.as_deref(),
			"api_domain" => Some(&self.api_domain),
			"api_version" => Some(&self.api_version),
			_ => bail!("Unknown config key: {key}"),
		})
	}

	/// Sets `key`, an empty value unsets optional keys and resets the others to their default
	pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
		let value = (!value.is_empty()).then(|| value.to_string());

		match key {
			"project_id" => self.project_id = value,
			"dataset" => self.dataset = value,
			"token" => self.token = value,
			"api_domain" => self.api_domain = value.unwrap_or_else(default_api_domain),
			"api_version" => self.api_version = value.unwrap_or_else(default_api_version),
			_ => bail!("Cannot set key: {key}"),
		}

		Ok(())
	}
}
