use std::time::Duration;

use async_trait::async_trait;
use ds_utils::api::{check_response, ApiConfig, ApiError, WithAuth};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};

use crate::{
	options::ListBackupQuery,
	types::{BackupList, BackupPage},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Management endpoints for dataset backups
#[async_trait]
pub trait BackupApi: Send + Sync + 'static {
	/// One page of a backup's file listing, `None` asks for the first page
	async fn fetch_page(
		&self,
		backup_id: &str,
		cursor: Option<&str>,
	) -> Result<BackupPage, ApiError>;

	async fn list_backups(&self, query: &ListBackupQuery) -> Result<BackupList, ApiError>;

	async fn set_backups_enabled(&self, enabled: bool) -> Result<(), ApiError>;
}

/// [`BackupApi`] over the hosted HTTP API, scoped to `config.dataset`
#[derive(Debug, Clone)]
pub struct HttpBackupApi {
	client: Client,
	config: ApiConfig,
}

impl HttpBackupApi {
	pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
		let client = ds_utils::http_client_builder()
			.timeout(REQUEST_TIMEOUT)
			.build()?;

		Ok(Self::with_client(client, config))
	}

	pub const fn with_client(client: Client, config: ApiConfig) -> Self {
		Self { client, config }
	}

	pub const fn config(&self) -> &ApiConfig {
		&self.config
	}

	fn backups_url(&self) -> String {
		self.config.global_url(&format!(
			"projects/{}/datasets/{}/backups",
			self.config.project_id, self.config.dataset
		))
	}
}

#[async_trait]
impl BackupApi for HttpBackupApi {
	#[instrument(skip(self), err)]
	async fn fetch_page(
		&self,
		backup_id: &str,
		cursor: Option<&str>,
	) -> Result<BackupPage, ApiError> {
		let token = self.config.require_token()?;

		let mut request = self
			.client
			.get(format!("{}/{backup_id}", self.backups_url()))
			.with_auth(token);

		if let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) {
			request = request.query(&[("nextCursor", cursor)]);
		}

		let page = check_response(request.send().await?)
			.await?
			.json::<BackupPage>()
			.await?;

		debug!(files = page.files.len(), total_files = page.total_files, "Fetched backup page");

		Ok(page)
	}

	async fn list_backups(&self, query: &ListBackupQuery) -> Result<BackupList, ApiError> {
		let token = self.config.require_token()?;

		check_response(
			self.client
				.get(self.backups_url())
				.query(&query.to_params())
				.with_auth(token)
				.send()
				.await?,
		)
		.await?
		.json()
		.await
		.map_err(Into::into)
	}

	async fn set_backups_enabled(&self, enabled: bool) -> Result<(), ApiError> {
		let token = self.config.require_token()?;

		check_response(
			self.client
				.put(self.config.project_url(&format!(
					"datasets/{}/settings/backups",
					self.config.dataset
				)))
				.json(&json!({ "enable": enabled }))
				.with_auth(token)
				.send()
				.await?,
		)
		.await?;

		debug!(dataset = %self.config.dataset, enabled, "Updated backup settings");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backups_are_addressed_on_the_global_host() {
		let api = HttpBackupApi::with_client(Client::new(), ApiConfig::new("abc123", "production"));

		assert_eq!(
			api.backups_url(),
			"https://api.sanity.io/v2024-02-21/projects/abc123/datasets/production/backups"
		);
	}
}
