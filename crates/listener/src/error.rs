use ds_utils::api::ApiError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	/// The connection to the feed dropped or could not be established
	#[error("listener transport failed: {0}")]
	Transport(String),
	#[error(transparent)]
	Api(#[from] ApiError),
	/// The server rejected the subscription itself, reconnecting won't help
	#[error("listener channel error: {0}")]
	Channel(String),
	#[error("failed to decode listener event: {0}")]
	Decode(#[from] serde_json::Error),
	/// Sequencing invariants were violated, recovered by fetching fresh snapshots
	#[error("listener out of sync: {0}")]
	OutOfSync(String),
	#[error("document fetch returned {got} documents, expected {expected}")]
	SnapshotCount { expected: usize, got: usize },
	#[error("listener was closed")]
	Closed,
}

impl Error {
	/// Errors a relay leg can die from that are fixed by subscribing again
	pub fn is_transport(&self) -> bool {
		match self {
			Self::Transport(_) | Self::Decode(_) => true,
			Self::Api(e) => e.status().map_or(
				!matches!(e, ApiError::MissingToken),
				|status| status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
			),
			Self::Channel(_) | Self::OutOfSync(_) | Self::SnapshotCount { .. } | Self::Closed => {
				false
			}
		}
	}

	pub const fn is_out_of_sync(&self) -> bool {
		matches!(self, Self::OutOfSync(_))
	}
}
