use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const MAX_CONCURRENCY: usize = 24;

pub const DEFAULT_LIST_LIMIT: u32 = 30;
pub const MAX_LIST_LIMIT: u32 = 100;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("token is missing")]
	MissingToken,
	#[error("dataset must be a valid dataset name")]
	EmptyDataset,
	#[error("backup-id should be a valid string")]
	EmptyBackupId,
	#[error("concurrency should be in 1 to 24 range, got {0}")]
	Concurrency(usize),
	#[error("limit should be in 1 to 100 range, got {0}")]
	Limit(u32),
	#[error("invalid {flag} date format '{value}', use YYYY-MM-DD")]
	Date { flag: &'static str, value: String },
	#[error("--after date must be before --before")]
	DateRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadBackupOptions {
	pub project_id: String,
	pub dataset: String,
	pub token: String,
	pub backup_id: String,
	/// Final archive location, already resolved with [`resolve_output_path`]
	pub out_path: PathBuf,
	pub overwrite: bool,
	pub concurrency: usize,
}

impl DownloadBackupOptions {
	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.token.is_empty() {
			return Err(ValidationError::MissingToken);
		}

		if self.dataset.is_empty() {
			return Err(ValidationError::EmptyDataset);
		}

		if self.backup_id.is_empty() {
			return Err(ValidationError::EmptyBackupId);
		}

		validate_concurrency(Some(self.concurrency)).map(|_| ())
	}
}

pub fn validate_concurrency(concurrency: Option<usize>) -> Result<usize, ValidationError> {
	match concurrency {
		None => Ok(DEFAULT_CONCURRENCY),
		Some(value @ 1..=MAX_CONCURRENCY) => Ok(value),
		Some(value) => Err(ValidationError::Concurrency(value)),
	}
}

pub fn default_file_name(dataset: &str, backup_id: &str) -> String {
	format!("{dataset}-backup-{backup_id}.tar.gz")
}

/// Paths without an extension are taken as directories
pub fn is_directory_like(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.map_or(true, |ext| {
			ext.is_empty() || !ext.chars().all(|c| c.is_alphanumeric() || c == '_')
		})
}

/// Makes `out` absolute against `cwd` and appends the default file name when it names a directory
pub fn resolve_output_path(out: &Path, cwd: &Path, dataset: &str, backup_id: &str) -> PathBuf {
	let out = if out.is_absolute() {
		out.to_path_buf()
	} else {
		cwd.join(out)
	};

	if is_directory_like(&out) {
		out.join(default_file_name(dataset, backup_id))
	} else {
		out
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBackupQuery {
	pub limit: u32,
	/// Inclusive
	pub after: Option<NaiveDate>,
	/// Exclusive
	pub before: Option<NaiveDate>,
}

impl Default for ListBackupQuery {
	fn default() -> Self {
		Self {
			limit: DEFAULT_LIST_LIMIT,
			after: None,
			before: None,
		}
	}
}

impl ListBackupQuery {
	pub fn new(
		limit: Option<u32>,
		after: Option<&str>,
		before: Option<&str>,
	) -> Result<Self, ValidationError> {
		let limit = match limit {
			None => DEFAULT_LIST_LIMIT,
			Some(value @ 1..=MAX_LIST_LIMIT) => value,
			Some(value) => return Err(ValidationError::Limit(value)),
		};

		let after = after.map(|value| parse_date("after", value)).transpose()?;
		let before = before.map(|value| parse_date("before", value)).transpose()?;

		if let (Some(after), Some(before)) = (after, before) {
			if after > before {
				return Err(ValidationError::DateRange);
			}
		}

		Ok(Self {
			limit,
			after,
			before,
		})
	}

	pub fn to_params(&self) -> Vec<(&'static str, String)> {
		let mut params = vec![("limit", self.limit.to_string())];

		if let Some(after) = self.after {
			params.push(("after", after.format(DATE_FORMAT).to_string()));
		}
		if let Some(before) = self.before {
			params.push(("before", before.format(DATE_FORMAT).to_string()));
		}

		params
	}
}

fn parse_date(flag: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
	let invalid = || ValidationError::Date {
		flag,
		value: value.to_string(),
	};

	// chrono happily takes unpadded fields, the API doesn't
	if value.len() != 10 {
		return Err(invalid());
	}

	NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| invalid())
}
