use std::{fmt::Display, path::Path};

use thiserror::Error;
use tracing::warn;

/// Logs a best effort failure (staging cleanup and friends) instead of propagating it
pub fn report_warning(res: &Result<(), impl Display>, context: &str) {
	if let Err(e) = res {
		warn!(%context, "{e:#}");
	}
}

/// File I/O error that includes the path that caused the error
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: std::io::Error,
	pub maybe_context: Option<&'static str>,
}

impl Display for FileIOError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"file I/O error{}: {}; path: '{}'",
			self.maybe_context
				.map(|ctx| format!(" ({ctx})"))
				.unwrap_or_default(),
			self.source,
			self.path.display()
		)
	}
}

impl<P: AsRef<Path>> From<(P, std::io::Error)> for FileIOError {
	fn from((path, source): (P, std::io::Error)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}
}

impl<P: AsRef<Path>> From<(P, std::io::Error, &'static str)> for FileIOError {
	fn from((path, source, context): (P, std::io::Error, &'static str)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(context),
		}
	}
}
