//!
//! # Dataset Backups
//!
//! Downloads a dataset backup, page by page, into a single `.tar.gz` archive holding an
//! `images/` and a `files/` directory plus every document in `data.ndjson`.
//!
//! Downloads run concurrently, each file retried with exponential backoff when the server or the
//! connection misbehaves. Assets are streamed to disk and never held in memory.
//!
//! Also covers listing backups and switching them on and off for a dataset.
#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod api;
mod archive;
mod download;
mod error;
mod options;
mod pages;
mod pipeline;
mod staging;
mod types;

pub use api::{BackupApi, HttpBackupApi};
pub use archive::create_archive;
pub use download::{
	ByteStream, DownloadConfig, DownloadError, Downloader, FileSource, HttpFileSource,
	BASE_BACKOFF, MAX_ATTEMPTS, READ_TIMEOUT,
};
pub use error::Error;
pub use options::{
	default_file_name, is_directory_like, resolve_output_path, validate_concurrency,
	DownloadBackupOptions, ListBackupQuery, ValidationError, DEFAULT_CONCURRENCY,
	DEFAULT_LIST_LIMIT, MAX_CONCURRENCY, MAX_LIST_LIMIT,
};
pub use pages::BackupPageFetcher;
pub use pipeline::{describe, BackupDownloadPipeline, DownloadSummary, Progress};
pub use staging::{normalize_name, StagingDir, DOCUMENTS_FILE, FILES_DIR, IMAGES_DIR};
pub use types::{BackupFile, BackupList, BackupPage, BackupSummary, FileKind};
