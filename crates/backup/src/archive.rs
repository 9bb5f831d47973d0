use std::{
	fs::{self, File},
	io::{BufWriter, Write},
	path::{Path, PathBuf},
};

use ds_utils::error::FileIOError;
use flate2::{write::GzEncoder, Compression};
use tokio::task::spawn_blocking;
use tracing::info;

use crate::{
	error::Error,
	staging::{DOCUMENTS_FILE, FILES_DIR, IMAGES_DIR},
};

/// Packs a staging directory into a gzipped tar at `out`, returning the archive size
pub async fn create_archive(staging: &Path, out: &Path) -> Result<u64, Error> {
	let staging = staging.to_path_buf();
	let out = out.to_path_buf();

	spawn_blocking(move || write_archive(&staging, &out)).await?
}

// Blocking all the way down, meant to run inside `spawn_blocking`
fn write_archive(staging: &Path, out: &Path) -> Result<u64, Error> {
	if let Some(parent) = out.parent() {
		fs::create_dir_all(parent)
			.map_err(|e| FileIOError::from((parent, e, "creating output directory")))?;
	}

	let file = File::create(out).map_err(|e| FileIOError::from((out, e, "creating archive")))?;
	let archive_error = |e| FileIOError::from((out, e, "writing archive"));

	let mut tar = tar::Builder::new(GzEncoder::new(BufWriter::new(file), Compression::default()));

	for dir in [IMAGES_DIR, FILES_DIR] {
		tar.append_dir_all(dir, staging.join(dir))
			.map_err(archive_error)?;
	}

	let documents: PathBuf = staging.join(DOCUMENTS_FILE);
	tar.append_path_with_name(&documents, DOCUMENTS_FILE)
		.map_err(|e| FileIOError::from((&documents, e, "archiving documents")))?;

	tar.into_inner()
		.and_then(GzEncoder::finish)
		.and_then(|mut writer| writer.flush())
		.map_err(archive_error)?;

	let size = fs::metadata(out)
		.map_err(|e| FileIOError::from((out, e, "reading archive size")))?
		.len();

	info!(path = %out.display(), size, "Backup archive written");

	Ok(size)
}
