use std::path::PathBuf;

use ds_utils::{api::ApiError, error::FileIOError};
use thiserror::Error;

use crate::{download::DownloadError, options::ValidationError};

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Validation(#[from] ValidationError),
	#[error(transparent)]
	Api(#[from] ApiError),
	#[error("output file '{}' already exists", .0.display())]
	OutputExists(PathBuf),
	#[error("No files to download")]
	NoFiles,
	#[error("backup pagination did not advance past cursor <cursor='{0}'>")]
	StalledPagination(String),
	#[error("invalid file name '{0}' in backup")]
	InvalidFileName(String),
	#[error("failed to download '{name}': {source}")]
	Download {
		name: String,
		#[source]
		source: DownloadError,
	},
	#[error("failed to encode document: {0}")]
	Encode(#[from] serde_json::Error),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("background archiving task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
}

impl Error {
	/// The message users should see, servers put the useful part in the body
	pub fn user_message(&self) -> String {
		match self {
			Self::Api(ApiError::Status { message, .. })
			| Self::Download {
				source: DownloadError::Status { message, .. },
				..
			} => message.clone(),
			other => other.to_string(),
		}
	}
}
