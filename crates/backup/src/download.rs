use std::{
	future::Future,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use ds_utils::{api::extract_message, error::FileIOError};
use futures::{stream::BoxStream, StreamExt};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{redirect::Policy, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt, time::timeout};
use tracing::{debug, trace};

pub const MAX_ATTEMPTS: u32 = 5;
pub const BASE_BACKOFF: Duration = Duration::from_millis(200);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const READ_TIMEOUT: Duration = Duration::from_secs(3 * 60);
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct DownloadConfig {
	pub max_attempts: u32,
	/// Delay before the second attempt, doubled for every one after it
	pub base_backoff: Duration,
	pub connect_timeout: Duration,
	/// Fires when no bytes arrive for this long, even in the middle of a body
	pub read_timeout: Duration,
	pub max_redirects: usize,
}

impl Default for DownloadConfig {
	fn default() -> Self {
		Self {
			max_attempts: MAX_ATTEMPTS,
			base_backoff: BASE_BACKOFF,
			connect_timeout: CONNECT_TIMEOUT,
			read_timeout: READ_TIMEOUT,
			max_redirects: MAX_REDIRECTS,
		}
	}
}

impl DownloadConfig {
	/// `base * 2^attempt`, with `attempt` starting at zero
	pub fn backoff(&self, attempt: u32) -> Duration {
		self.base_backoff.saturating_mul(2_u32.saturating_pow(attempt))
	}
}

#[derive(Debug, Error)]
pub enum DownloadError {
	#[error("{message} (status {status})")]
	Status { status: StatusCode, message: String },
	#[error("read timeout: no data received for {0:?}")]
	ReadTimeout(Duration),
	#[error("request failed: {0}")]
	Transport(String),
	#[error("document is not valid JSON: {0}")]
	InvalidDocument(#[from] serde_json::Error),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

impl DownloadError {
	/// Client errors won't get better by asking again
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Status { status, .. } => status.as_u16() >= 500,
			Self::ReadTimeout(_) | Self::Transport(_) => true,
			Self::InvalidDocument(_) | Self::FileIO(_) => false,
		}
	}
}

impl From<reqwest::Error> for DownloadError {
	fn from(e: reqwest::Error) -> Self {
		Self::Transport(e.to_string())
	}
}

pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// Where backup files are fetched from
#[async_trait]
pub trait FileSource: Send + Sync + 'static {
	/// Starts a request, non-success statuses must be reported as [`DownloadError::Status`]
	async fn open(&self, url: &str) -> Result<ByteStream, DownloadError>;
}

#[derive(Debug, Clone)]
pub struct HttpFileSource {
	client: Client,
}

impl HttpFileSource {
	pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
		let client = ds_utils::http_client_builder()
			.redirect(Policy::limited(config.max_redirects))
			.connect_timeout(config.connect_timeout)
			.build()?;

		Ok(Self { client })
	}
}

#[async_trait]
impl FileSource for HttpFileSource {
	async fn open(&self, url: &str) -> Result<ByteStream, DownloadError> {
		let response = self.client.get(url).send().await?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();

			return Err(DownloadError::Status {
				status,
				message: extract_message(status, &body),
			});
		}

		Ok(response
			.bytes_stream()
			.map(|chunk| chunk.map_err(DownloadError::from))
			.boxed())
	}
}

/// Fetches single backup files with retries and the idle read timeout applied
pub struct Downloader<S: ?Sized> {
	source: Arc<S>,
	config: DownloadConfig,
}

impl<S: FileSource + ?Sized> Downloader<S> {
	pub fn new(source: Arc<S>, config: DownloadConfig) -> Self {
		Self { source, config }
	}

	pub const fn config(&self) -> &DownloadConfig {
		&self.config
	}

	/// Downloads a JSON document, whole
	pub async fn fetch_document(&self, url: &str) -> Result<Value, DownloadError> {
		self.with_retry(url, || async move {
			let mut stream = self.open(url).await?;
			let mut body = BytesMut::new();

			while let Some(chunk) = self.next_chunk(&mut stream).await? {
				body.extend_from_slice(&chunk);
			}

			Ok(serde_json::from_slice(&body)?)
		})
		.await
	}

	/// Streams an asset to `path`, through a uniquely named `.part` sibling so a failed attempt
	/// never leaves a truncated file behind and concurrent downloads of the same name don't
	/// share one. The last download to finish wins. Returns how many bytes were written.
	pub async fn fetch_to_file(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
		let written = self
			.with_retry(url, || async move {
				let part = part_path(path);
				let res = self.write_part(url, &part).await;

				if res.is_err() {
					if let Err(e) = fs::remove_file(&part).await {
						trace!(?e, path = %part.display(), "No partial asset to remove");
					}
				}

				res.map(|written| (part, written))
			})
			.await;

		let (part, written) = written?;

		if let Err(e) = fs::rename(&part, path).await {
			if let Err(e) = fs::remove_file(&part).await {
				trace!(?e, path = %part.display(), "No partial asset to remove");
			}

			return Err(FileIOError::from((path, e, "moving asset into place")).into());
		}

		trace!(path = %path.display(), written, "Asset downloaded");

		Ok(written)
	}

	async fn write_part(&self, url: &str, part: &Path) -> Result<u64, DownloadError> {
		let mut stream = self.open(url).await?;
		let mut file = fs::File::create(part)
			.await
			.map_err(|e| FileIOError::from((part, e, "creating asset file")))?;
		let mut written = 0_u64;

		while let Some(chunk) = self.next_chunk(&mut stream).await? {
			file.write_all(&chunk)
				.await
				.map_err(|e| FileIOError::from((part, e, "writing asset file")))?;
			written += chunk.len() as u64;
		}

		file.flush()
			.await
			.map_err(|e| FileIOError::from((part, e, "flushing asset file")))?;

		Ok(written)
	}

	/// The read timeout also covers waiting for the response headers
	async fn open(&self, url: &str) -> Result<ByteStream, DownloadError> {
		timeout(self.config.read_timeout, self.source.open(url))
			.await
			.map_err(|_| DownloadError::ReadTimeout(self.config.read_timeout))?
	}

	async fn next_chunk(&self, stream: &mut ByteStream) -> Result<Option<Bytes>, DownloadError> {
		timeout(self.config.read_timeout, stream.next())
			.await
			.map_err(|_| DownloadError::ReadTimeout(self.config.read_timeout))?
			.transpose()
	}

	async fn with_retry<T, F, Fut>(&self, url: &str, mut attempt_fn: F) -> Result<T, DownloadError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, DownloadError>>,
	{
		let mut attempt = 0;

		loop {
			match attempt_fn().await {
				Ok(value) => return Ok(value),
				Err(e) if !e.is_retryable() || attempt + 1 >= self.config.max_attempts => {
					debug!(%url, attempts = attempt + 1, ?e, "Giving up on download");
					return Err(e);
				}
				Err(e) => {
					let delay = self.config.backoff(attempt);
					debug!(%url, ?delay, ?e, "Download failed, retrying");

					tokio::time::sleep(delay).await;
					attempt += 1;
				}
			}
		}
	}
}

/// `<path>.<8 random alphanumerics>.part`
fn part_path(path: &Path) -> PathBuf {
	let suffix = rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(8)
		.map(char::from)
		.collect::<String>();

	let mut part = path.as_os_str().to_owned();
	part.push(format!(".{suffix}.part"));
	PathBuf::from(part)
}
