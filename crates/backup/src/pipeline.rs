use std::{env, path::PathBuf, sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::{
	api::BackupApi,
	archive::create_archive,
	download::{Downloader, FileSource},
	error::Error,
	options::DownloadBackupOptions,
	pages::BackupPageFetcher,
	staging::StagingDir,
	types::{BackupFile, FileKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
	/// `total` is what the listing announced, zero when it didn't say
	Downloading { current: u64, total: u64 },
	Archiving,
	Complete { elapsed: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
	pub out_path: PathBuf,
	pub files_downloaded: u64,
	pub archive_bytes: u64,
	pub elapsed: Duration,
}

/// Downloads every file of a backup into a staging directory, then packs it into a single
/// `.tar.gz`. The staging directory is removed whatever the outcome.
pub struct BackupDownloadPipeline<A: ?Sized, S: ?Sized> {
	api: Arc<A>,
	downloader: Downloader<S>,
	staging_root: PathBuf,
}

impl<A: BackupApi + ?Sized, S: FileSource + ?Sized> BackupDownloadPipeline<A, S> {
	pub fn new(api: Arc<A>, downloader: Downloader<S>) -> Self {
		Self {
			api,
			downloader,
			staging_root: env::temp_dir(),
		}
	}

	/// Where staging directories are created, the system temp dir by default
	#[must_use]
	pub fn with_staging_root(mut self, staging_root: impl Into<PathBuf>) -> Self {
		self.staging_root = staging_root.into();
		self
	}

	#[instrument(
		skip_all,
		fields(dataset = %options.dataset, backup_id = %options.backup_id),
		err
	)]
	pub async fn run(
		&self,
		options: &DownloadBackupOptions,
		on_progress: &(dyn Fn(Progress) + Send + Sync),
	) -> Result<DownloadSummary, Error> {
		options.validate()?;

		if !options.overwrite && options.out_path.exists() {
			return Err(Error::OutputExists(options.out_path.clone()));
		}

		let start = Instant::now();
		let staging = StagingDir::create(&self.staging_root).await?;

		let res = self.assemble(options, &staging, on_progress).await;

		staging.cleanup().await;

		let (files_downloaded, archive_bytes) = res?;
		let elapsed = start.elapsed();

		on_progress(Progress::Complete { elapsed });
		info!(files_downloaded, archive_bytes, ?elapsed, "Backup downloaded");

		Ok(DownloadSummary {
			out_path: options.out_path.clone(),
			files_downloaded,
			archive_bytes,
			elapsed,
		})
	}

	async fn assemble(
		&self,
		options: &DownloadBackupOptions,
		staging: &StagingDir,
		on_progress: &(dyn Fn(Progress) + Send + Sync),
	) -> Result<(u64, u64), Error> {
		let mut fetcher = BackupPageFetcher::new(Arc::clone(&self.api), options.backup_id.as_str());
		let mut downloaded = 0;

		while let Some(files) = fetcher.read().await? {
			debug!(files = files.len(), "Downloading backup page");

			let mut downloads = stream::iter(files)
				.map(|file| self.download_file(staging, file))
				.buffer_unordered(options.concurrency);

			while let Some(res) = downloads.next().await {
				res?;
				downloaded += 1;

				on_progress(Progress::Downloading {
					current: downloaded,
					total: fetcher.total_files(),
				});
			}
		}

		on_progress(Progress::Archiving);
		let archive_bytes = create_archive(staging.root(), &options.out_path).await?;

		Ok((downloaded, archive_bytes))
	}

	async fn download_file(&self, staging: &StagingDir, file: BackupFile) -> Result<(), Error> {
		let BackupFile { name, url, kind } = file;

		let res = match kind {
			FileKind::Document => match self.downloader.fetch_document(&url).await {
				Ok(document) => return staging.append_document(&document).await,
				Err(e) => Err(e),
			},
			FileKind::Image | FileKind::File => {
				let path = staging.asset_path(kind, &name)?;
				self.downloader.fetch_to_file(&url, &path).await.map(|_| ())
			}
		};

		res.map_err(|source| Error::Download { name, source })
	}
}

/// Label shown for a progress step
pub fn describe(progress: Progress) -> String {
	match progress {
		Progress::Downloading { current, total } if total > 0 => {
			format!("Downloading documents and assets... ({current}/{total})")
		}
		Progress::Downloading { .. } => "Downloading documents and assets...".to_string(),
		Progress::Archiving => "Archiving files into a tarball...".to_string(),
		Progress::Complete { elapsed } => {
			format!("Backup download complete ({:.1}s).", elapsed.as_secs_f64())
		}
	}
}
