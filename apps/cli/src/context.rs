use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use dialoguer::Input;
use ds_utils::api::ApiConfig;

use crate::config::CliConfig;

const NO_PROJECT_ID: &str =
	"No project id configured, pass --project, set DS_PROJECT_ID or run `dsctl config set project_id <id>`";

/// Connection flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ApiArgs {
	/// Project id
	#[arg(long = "project", env = "DS_PROJECT_ID", global = true)]
	pub project_id: Option<String>,
	/// Dataset to use when a command doesn't name one
	#[arg(long, env = "DS_DATASET", global = true)]
	pub dataset: Option<String>,
	/// API token
	#[arg(long, env = "DS_AUTH_TOKEN", global = true, hide_env_values = true)]
	pub token: Option<String>,
	/// API domain, or a full base url such as http://127.0.0.1:4000
	#[arg(long, env = "DS_API_DOMAIN", global = true)]
	pub api_domain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Context {
	pub config: CliConfig,
	pub config_dir: PathBuf,
	pub api: ApiArgs,
}

impl Context {
	pub const fn new(config: CliConfig, config_dir: PathBuf, api: ApiArgs) -> Self {
		Self {
			config,
			config_dir,
			api,
		}
	}

	/// Dataset from the command itself, then flags/env, then the config file, then a prompt
	pub fn resolve_dataset(&self, explicit: Option<String>) -> Result<String> {
		if let Some(dataset) = explicit
			.or_else(|| self.api.dataset.clone())
			.or_else(|| self.config.dataset.clone())
			.filter(|dataset| !dataset.is_empty())
		{
			return Ok(dataset);
		}

		Input::<String>::new()
			.with_prompt("Dataset name")
			.interact_text()
			.context("reading dataset name")
	}

	/// Api configuration for `dataset`, merging flags over the config file
	pub fn api_config(&self, dataset: impl Into<String>) -> Result<ApiConfig> {
		let project_id = self
			.api
			.project_id
			.clone()
			.or_else(|| self.config.project_id.clone())
			.filter(|id| !id.is_empty())
			.context(NO_PROJECT_ID)?;

		let mut config = ApiConfig::new(project_id, dataset);
		config.api_domain = self
			.api
			.api_domain
			.clone()
			.unwrap_or_else(|| self.config.api_domain.clone());
		config.api_version.clone_from(&self.config.api_version);
		config.token = self.api.token.clone().or_else(|| self.config.token.clone());

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn context(api: ApiArgs) -> Context {
		let mut config = CliConfig::default();
		config.set("project_id", "from-config").unwrap();
		config.set("token", "config-token").unwrap();
		config.set("dataset", "staging").unwrap();

		Context::new(config, PathBuf::from("/tmp/dsctl"), api)
	}

	#[test]
	fn flags_win_over_config() {
		let ctx = context(ApiArgs {
			project_id: Some("from-flag".to_string()),
			token: None,
			dataset: Some("production".to_string()),
			api_domain: Some("http://127.0.0.1:4000".to_string()),
		});

		let config = ctx.api_config("production").unwrap();
		assert_eq!(config.project_id, "from-flag");
		assert_eq!(config.token.as_deref(), Some("config-token"));
		assert_eq!(config.api_domain, "http://127.0.0.1:4000");

		assert_eq!(ctx.resolve_dataset(None).unwrap(), "production");
		assert_eq!(ctx.resolve_dataset(Some("other".to_string())).unwrap(), "other");
	}

	#[test]
	fn config_file_fills_the_gaps() {
		let ctx = context(ApiArgs::default());

		let config = ctx.api_config("staging").unwrap();
		assert_eq!(config.project_id, "from-config");
		assert_eq!(config.api_domain, ds_utils::api::DEFAULT_API_DOMAIN);
		assert_eq!(ctx.resolve_dataset(None).unwrap(), "staging");
	}
}
