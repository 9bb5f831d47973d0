use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
	Image,
	File,
	/// Anything that isn't an asset is a JSON document
	#[serde(other)]
	Document,
}

impl FileKind {
	pub const fn is_asset(self) -> bool {
		matches!(self, Self::Image | Self::File)
	}
}

/// One entry of a backup, downloaded from a plain url
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
	pub name: String,
	pub url: String,
	#[serde(rename = "type")]
	pub kind: FileKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPage {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub total_files: u64,
	#[serde(default)]
	pub files: Vec<BackupFile>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub next_cursor: Option<String>,
}

impl BackupPage {
	/// The cursor to follow, empty cursors mean there is nothing left
	pub fn next_cursor(&self) -> Option<&str> {
		self.next_cursor.as_deref().filter(|cursor| !cursor.is_empty())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
	pub id: String,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupList {
	#[serde(default)]
	pub backups: Vec<BackupSummary>,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn page_from_api_payload() {
		let page: BackupPage = serde_json::from_value(json!({
			"createdAt": "2024-03-01T10:00:00Z",
			"totalFiles": 3,
			"files": [
				{"name": "doc-1", "url": "https://cdn/doc-1", "type": "document"},
				{"name": "a.png", "url": "https://cdn/a.png", "type": "image"},
				{"name": "b.pdf", "url": "https://cdn/b.pdf", "type": "file"},
				{"name": "c", "url": "https://cdn/c", "type": "something-new"}
			],
			"nextCursor": ""
		}))
		.unwrap();

		assert_eq!(page.total_files, 3);
		assert_eq!(
			page.files.iter().map(|file| file.kind).collect::<Vec<_>>(),
			vec![
				FileKind::Document,
				FileKind::Image,
				FileKind::File,
				FileKind::Document
			]
		);
		assert_eq!(page.next_cursor(), None);
	}
}
