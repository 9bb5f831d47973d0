use std::{collections::HashSet, sync::Arc};

use tracing::{debug, trace};

use crate::{api::BackupApi, error::Error, types::BackupFile};

/// Pulls a backup's file listing one page at a time.
///
/// Every [`read`](Self::read) fetches exactly one page and yields its files, the fetcher is done
/// once a page comes back without a cursor. It can't be rewound, and a cursor handed out twice
/// ends it with [`Error::StalledPagination`] instead of cycling through the same pages forever.
pub struct BackupPageFetcher<A: ?Sized> {
	api: Arc<A>,
	backup_id: String,
	cursor: Option<String>,
	followed: HashSet<String>,
	total_files: u64,
	finished: bool,
}

impl<A: BackupApi + ?Sized> BackupPageFetcher<A> {
	pub fn new(api: Arc<A>, backup_id: impl Into<String>) -> Self {
		Self {
			api,
			backup_id: backup_id.into(),
			cursor: None,
			followed: HashSet::new(),
			total_files: 0,
			finished: false,
		}
	}

	/// Total reported by the first page, zero until then
	pub const fn total_files(&self) -> u64 {
		self.total_files
	}

	pub const fn is_finished(&self) -> bool {
		self.finished
	}

	/// The next page of files, `None` once the listing is exhausted
	pub async fn read(&mut self) -> Result<Option<Vec<BackupFile>>, Error> {
		if self.finished {
			return Ok(None);
		}

		let page = self
			.api
			.fetch_page(&self.backup_id, self.cursor.as_deref())
			.await
			.inspect_err(|_| self.finished = true)?;

		if self.total_files == 0 {
			self.total_files = page.total_files;
		}

		let next_cursor = page.next_cursor().map(ToString::to_string);

		match (page.files.is_empty(), next_cursor) {
			(true, None) => {
				self.finished = true;
				return Err(Error::NoFiles);
			}
			(_, Some(cursor)) if self.followed.contains(&cursor) => {
				self.finished = true;
				return Err(Error::StalledPagination(cursor));
			}
			(_, Some(cursor)) => {
				trace!(%cursor, "Following backup page cursor");
				self.followed.insert(cursor.clone());
				self.cursor = Some(cursor);
			}
			(false, None) => {
				debug!(backup_id = %self.backup_id, "Reached the last backup page");
				self.finished = true;
			}
		}

		Ok(Some(page.files))
	}
}
