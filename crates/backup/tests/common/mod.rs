#![allow(dead_code)]

use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, Mutex},
	time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use ds_backup::{
	BackupApi, BackupFile, BackupList, BackupPage, ByteStream, DownloadConfig, DownloadError,
	FileKind, FileSource, ListBackupQuery,
};
use ds_utils::api::ApiError;
use futures::{future, stream, StreamExt};
use reqwest::StatusCode;

enum ScriptedPage {
	Page(BackupPage),
	Status(StatusCode, String),
}

/// Serves scripted backup pages in order, recording every cursor it was asked for
#[derive(Default)]
pub struct FakeBackupApi {
	pages: Mutex<VecDeque<ScriptedPage>>,
	requests: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeBackupApi {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn with_pages(pages: impl IntoIterator<Item = BackupPage>) -> Arc<Self> {
		let api = Self::new();
		for page in pages {
			api.push_page(page);
		}
		api
	}

	pub fn push_page(&self, page: BackupPage) {
		self.pages.lock().unwrap().push_back(ScriptedPage::Page(page));
	}

	pub fn push_status(&self, status: u16, message: &str) {
		self.pages.lock().unwrap().push_back(ScriptedPage::Status(
			StatusCode::from_u16(status).unwrap(),
			message.to_string(),
		));
	}

	/// `(backup_id, cursor)` of every page request
	pub fn requests(&self) -> Vec<(String, Option<String>)> {
		self.requests.lock().unwrap().clone()
	}
}

#[async_trait]
impl BackupApi for FakeBackupApi {
	async fn fetch_page(
		&self,
		backup_id: &str,
		cursor: Option<&str>,
	) -> Result<BackupPage, ApiError> {
		self.requests
			.lock()
			.unwrap()
			.push((backup_id.to_string(), cursor.map(ToString::to_string)));

		let scripted = self.pages.lock().unwrap().pop_front();

		match scripted {
			Some(ScriptedPage::Page(page)) => Ok(page),
			Some(ScriptedPage::Status(status, message)) => {
				Err(ApiError::Status { status, message })
			}
			None => Err(ApiError::Status {
				status: StatusCode::NOT_FOUND,
				message: "no more pages scripted".to_string(),
			}),
		}
	}

	async fn list_backups(&self, _: &ListBackupQuery) -> Result<BackupList, ApiError> {
		Ok(BackupList::default())
	}

	async fn set_backups_enabled(&self, _: bool) -> Result<(), ApiError> {
		Ok(())
	}
}

#[derive(Debug, Clone)]
pub enum Response {
	Status(u16),
	Body(Vec<&'static str>),
	/// Sends these chunks, then goes silent without ever ending the body
	Stall(Vec<&'static str>),
	/// Accepts the request but never answers it
	Hang,
}

/// Answers each url with its scripted responses in order, unknown urls get a 404
#[derive(Default)]
pub struct FakeFileSource {
	responses: Mutex<HashMap<String, VecDeque<Response>>>,
	attempts: Mutex<HashMap<String, usize>>,
}

impl FakeFileSource {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn script(&self, url: &str, responses: impl IntoIterator<Item = Response>) {
		self.responses
			.lock()
			.unwrap()
			.entry(url.to_string())
			.or_default()
			.extend(responses);
	}

	pub fn attempts(&self, url: &str) -> usize {
		self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
	}
}

#[async_trait]
impl FileSource for FakeFileSource {
	async fn open(&self, url: &str) -> Result<ByteStream, DownloadError> {
		*self
			.attempts
			.lock()
			.unwrap()
			.entry(url.to_string())
			.or_default() += 1;

		let response = self
			.responses
			.lock()
			.unwrap()
			.get_mut(url)
			.and_then(VecDeque::pop_front)
			.unwrap_or(Response::Status(404));

		match response {
			Response::Status(code) => Err(DownloadError::Status {
				status: StatusCode::from_u16(code).unwrap(),
				message: format!("scripted {code}"),
			}),
			Response::Body(chunks) => Ok(chunk_stream(chunks).boxed()),
			Response::Stall(chunks) => Ok(chunk_stream(chunks).chain(stream::pending()).boxed()),
			Response::Hang => future::pending().await,
		}
	}
}

fn chunk_stream(
	chunks: Vec<&'static str>,
) -> impl futures::Stream<Item = Result<Bytes, DownloadError>> + Send + 'static {
	stream::iter(chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))))
}

pub fn file(name: &str, kind: FileKind) -> BackupFile {
	BackupFile {
		name: name.to_string(),
		url: url(name),
		kind,
	}
}

pub fn url(name: &str) -> String {
	format!("https://cdn.test/{name}")
}

/// Names of the regular files directly inside `dir`, sorted
pub fn file_names(dir: &std::path::Path) -> Vec<String> {
	let mut names = std::fs::read_dir(dir)
		.unwrap()
		.map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
		.collect::<Vec<_>>();
	names.sort();
	names
}

pub fn page(files: Vec<BackupFile>, total_files: u64, next_cursor: Option<&str>) -> BackupPage {
	BackupPage {
		created_at: None,
		total_files,
		files,
		next_cursor: next_cursor.map(ToString::to_string),
	}
}

/// Quick retries and timeouts for tests running on the real clock
pub fn fast_config() -> DownloadConfig {
	DownloadConfig {
		base_backoff: Duration::from_millis(5),
		read_timeout: Duration::from_millis(100),
		..DownloadConfig::default()
	}
}
