use std::path::{Path, PathBuf};

use chrono::Utc;
use ds_utils::error::{report_warning, FileIOError};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

use crate::{error::Error, types::FileKind};

pub const IMAGES_DIR: &str = "images";
pub const FILES_DIR: &str = "files";
pub const DOCUMENTS_FILE: &str = "data.ndjson";

/// Scratch directory a backup is assembled in before archiving
#[derive(Debug)]
pub struct StagingDir {
	root: PathBuf,
	documents: Mutex<fs::File>,
}

impl StagingDir {
	/// Creates `<base>/backup-<unix millis>-<5 random alphanumerics>` with its asset
	/// directories and an empty document log
	pub async fn create(base: &Path) -> Result<Self, Error> {
		let root = base.join(staging_dir_name());

		for dir in [root.join(IMAGES_DIR), root.join(FILES_DIR)] {
			fs::create_dir_all(&dir)
				.await
				.map_err(|e| FileIOError::from((&dir, e, "creating staging directory")))?;
		}

		let documents_path = root.join(DOCUMENTS_FILE);
		let documents = fs::File::create(&documents_path)
			.await
			.map_err(|e| FileIOError::from((&documents_path, e, "creating document log")))?;

		debug!(root = %root.display(), "Created staging directory");

		Ok(Self {
			root,
			documents: Mutex::new(documents),
		})
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Where an asset of `kind` lands, only the last component of `name` is kept
	pub fn asset_path(&self, kind: FileKind, name: &str) -> Result<PathBuf, Error> {
		let dir = match kind {
			FileKind::Image => IMAGES_DIR,
			FileKind::File => FILES_DIR,
			FileKind::Document => return Err(Error::InvalidFileName(name.to_string())),
		};

		Ok(self.root.join(dir).join(normalize_name(name)?))
	}

	/// Appends one document as a line of `data.ndjson`
	pub async fn append_document(&self, document: &Value) -> Result<(), Error> {
		let mut line = serde_json::to_vec(document)?;
		line.push(b'\n');

		let path = self.root.join(DOCUMENTS_FILE);
		let mut file = self.documents.lock().await;

		file.write_all(&line)
			.await
			.map_err(|e| FileIOError::from((&path, e, "appending document")))?;
		file.flush()
			.await
			.map_err(|e| FileIOError::from((&path, e, "flushing document log")))?;

		Ok(())
	}

	/// Removes the whole directory, failures are only logged
	pub async fn cleanup(self) {
		let Self { root, documents } = self;
		drop(documents);

		report_warning(
			&fs::remove_dir_all(&root)
				.await
				.map_err(|e| FileIOError::from((&root, e))),
			"removing staging directory",
		);
	}
}

fn staging_dir_name() -> String {
	let suffix = rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(5)
		.map(char::from)
		.collect::<String>();

	format!("backup-{}-{suffix}", Utc::now().timestamp_millis())
}

/// Strips any directory part from a server provided name
pub fn normalize_name(name: &str) -> Result<&str, Error> {
	match name.rsplit(['/', '\\']).next() {
		Some(base) if !base.is_empty() && base != "." && base != ".." => Ok(base),
		_ => Err(Error::InvalidFileName(name.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn names_are_reduced_to_their_base() {
		assert_eq!(normalize_name("a.png").ok(), Some("a.png"));
		assert_eq!(normalize_name("images/a.png").ok(), Some("a.png"));
		assert_eq!(normalize_name("..\\..\\evil.exe").ok(), Some("evil.exe"));
		assert!(normalize_name("").is_err());
		assert!(normalize_name("files/").is_err());
		assert!(normalize_name("../..").is_err());
	}

	#[test]
	fn staging_name_layout() {
		let name = staging_dir_name();
		let mut parts = name.splitn(3, '-');

		assert_eq!(parts.next(), Some("backup"));
		assert!(parts.next().is_some_and(|millis| millis.parse::<i64>().is_ok()));
		assert!(parts.next().is_some_and(|suffix| {
			suffix.len() == 5 && suffix.chars().all(|c| c.is_ascii_alphanumeric())
		}));
	}

	#[tokio::test]
	async fn documents_are_appended_as_lines() {
		let base = tempfile::tempdir().unwrap();
		let staging = StagingDir::create(base.path()).await.unwrap();
		let root = staging.root().to_path_buf();

		assert!(root.join(IMAGES_DIR).is_dir());
		assert!(root.join(FILES_DIR).is_dir());

		staging.append_document(&json!({"_id": "a"})).await.unwrap();
		staging.append_document(&json!({"_id": "b"})).await.unwrap();

		assert_eq!(
			std::fs::read_to_string(root.join(DOCUMENTS_FILE)).unwrap(),
			"{\"_id\":\"a\"}\n{\"_id\":\"b\"}\n"
		);
		assert_eq!(
			staging.asset_path(FileKind::Image, "x/a.png").unwrap(),
			root.join(IMAGES_DIR).join("a.png")
		);
		assert!(staging.asset_path(FileKind::Document, "doc").is_err());

		staging.cleanup().await;
		assert!(!root.exists());
	}
}
