use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct DownloadArgs {
	/// Dataset to download a backup of
	#[arg(value_name = "DATASET")]
	pub dataset_name: Option<String>,
	/// The backup to download, picked from a list when omitted
	#[arg(long)]
	pub backup_id: Option<String>,
	/// File or directory the backup should be written to
	#[arg(long)]
	pub out: Option<PathBuf>,
	/// Replace an existing file without asking
	#[arg(long, default_value_t = false)]
	pub overwrite: bool,
	/// Concurrent downloads (max: 24)
	#[arg(long)]
	pub concurrency: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
	#[arg(value_name = "DATASET")]
	pub dataset_name: Option<String>,
	/// Maximum number of backups returned (1 to 100, default 30)
	#[arg(long)]
	pub limit: Option<u32>,
	/// Only backups created on or after this date (YYYY-MM-DD)
	#[arg(long)]
	pub after: Option<String>,
	/// Only backups created before this date (YYYY-MM-DD)
	#[arg(long)]
	pub before: Option<String>,
}

#[derive(Args, Debug)]
pub struct ToggleArgs {
	#[arg(value_name = "DATASET")]
	pub dataset_name: Option<String>,
}
