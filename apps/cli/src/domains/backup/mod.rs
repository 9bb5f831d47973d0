mod args;

use std::{env, path::PathBuf, sync::Arc, sync::Mutex};

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use dialoguer::{Confirm, Input, Select};
use ds_backup::{
	default_file_name, resolve_output_path, validate_concurrency, BackupApi,
	BackupDownloadPipeline, DownloadBackupOptions, DownloadConfig, Downloader, Error,
	HttpBackupApi, HttpFileSource, ListBackupQuery, Progress,
};
use ds_utils::api::ApiError;
use tracing::debug;

use crate::{
	context::Context,
	ui::{progress::StepSpinner, table::new_table},
};

use self::args::{DownloadArgs, ListArgs, ToggleArgs};

const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Subcommand, Debug)]
pub enum BackupCmd {
	/// Download a dataset backup to a local file
	Download(DownloadArgs),
	/// List available backups for a dataset
	List(ListArgs),
	/// Enable backups for a dataset
	Enable(ToggleArgs),
	/// Disable backups for a dataset
	Disable(ToggleArgs),
}

pub async fn run(ctx: &Context, cmd: BackupCmd) -> Result<()> {
	match cmd {
		BackupCmd::Download(args) => download(ctx, args).await,
		BackupCmd::List(args) => list(ctx, args).await,
		BackupCmd::Enable(args) => toggle(ctx, args, true).await,
		BackupCmd::Disable(args) => toggle(ctx, args, false).await,
	}
}

async fn download(ctx: &Context, args: DownloadArgs) -> Result<()> {
	let dataset = ctx.resolve_dataset(args.dataset_name)?;
	let api_config = ctx.api_config(dataset.as_str())?;
	let token = api_config.require_token()?.to_string();
	let project_id = api_config.project_id.clone();

	let api = Arc::new(HttpBackupApi::new(api_config)?);

	let backup_id = match args.backup_id {
		Some(backup_id) => backup_id,
		None => choose_backup_id(api.as_ref(), &dataset).await?,
	};
	let concurrency = validate_concurrency(args.concurrency)?;

	let cwd = env::current_dir().context("reading the current directory")?;
	let out = match args.out {
		Some(out) => out,
		None => PathBuf::from(
			Input::<String>::new()
				.with_prompt("Output path")
				.default(
					cwd.join(default_file_name(&dataset, &backup_id))
						.to_string_lossy()
						.to_string(),
				)
				.interact_text()?,
		),
	};
	let out_path = resolve_output_path(&out, &cwd, &dataset, &backup_id);

	let mut overwrite = args.overwrite;
	if !overwrite && out_path.exists() {
		let confirmed = Confirm::new()
			.with_prompt(format!(
				"File \"{}\" already exists, would you like to overwrite it?",
				out_path.display()
			))
			.default(false)
			.interact()?;

		if !confirmed {
			println!("Operation cancelled.");
			return Ok(());
		}
		overwrite = true;
	}

	let options = DownloadBackupOptions {
		project_id,
		dataset,
		token,
		backup_id,
		out_path,
		overwrite,
		concurrency,
	};
	options.validate()?;

	let mut header = new_table(&["Downloading backup for", ""]);
	header.add_row(vec!["projectId", options.project_id.as_str()]);
	header.add_row(vec!["dataset", options.dataset.as_str()]);
	header.add_row(vec!["backupId", options.backup_id.as_str()]);
	println!("{header}\n");
	println!("Downloading backup to \"{}\"", options.out_path.display());

	let config = DownloadConfig::default();
	let source = Arc::new(HttpFileSource::new(&config)?);
	let pipeline = BackupDownloadPipeline::new(api, Downloader::new(source, config));

	let spinner = Mutex::new(StepSpinner::start("Downloading documents and assets..."));
	let on_progress = |progress: Progress| {
		if let Ok(mut spinner) = spinner.lock() {
			spinner.update(progress);
		}
	};

	match pipeline.run(&options, &on_progress).await {
		Ok(summary) => {
			debug!(?summary, "Backup download finished");
			Ok(())
		}
		Err(e) => {
			if let Ok(spinner) = spinner.lock() {
				spinner.fail();
			}

			bail!("Downloading dataset backup failed: {}", e.user_message())
		}
	}
}

async fn choose_backup_id(api: &impl BackupApi, dataset: &str) -> Result<String> {
	let backups = api
		.list_backups(&ListBackupQuery::default())
		.await
		.map_err(|e| anyhow::anyhow!("Listing dataset backups failed: {}", api_message(e)))?
		.backups;

	if backups.is_empty() {
		bail!("No backups found for dataset {dataset}");
	}

	let items = backups
		.iter()
		.map(|backup| {
			format!(
				"{} ({})",
				backup.id,
				backup.created_at.format(DATE_TIME_FORMAT)
			)
		})
		.collect::<Vec<_>>();

	let selected = Select::new()
		.with_prompt("Select backup ID to use")
		.items(&items)
		.default(0)
		.interact()?;

	Ok(backups[selected].id.clone())
}

async fn list(ctx: &Context, args: ListArgs) -> Result<()> {
	let query = ListBackupQuery::new(args.limit, args.after.as_deref(), args.before.as_deref())?;

	let dataset = ctx.resolve_dataset(args.dataset_name)?;
	let api = HttpBackupApi::new(ctx.api_config(dataset)?)?;

	let backups = api
		.list_backups(&query)
		.await
		.map_err(|e| anyhow::anyhow!("List dataset backup failed: {}", api_message(e)))?
		.backups;

	if backups.is_empty() {
		println!("No backups found.");
		return Ok(());
	}

	let mut table = new_table(&["RESOURCE", "CREATED AT", "BACKUP ID"]);
	for backup in &backups {
		table.add_row(vec![
			"Dataset".to_string(),
			backup.created_at.format(DATE_TIME_FORMAT).to_string(),
			backup.id.clone(),
		]);
	}
	println!("{table}");

	Ok(())
}

async fn toggle(ctx: &Context, args: ToggleArgs, enable: bool) -> Result<()> {
	let dataset = ctx.resolve_dataset(args.dataset_name)?;
	let api = HttpBackupApi::new(ctx.api_config(dataset)?)?;

	match api.set_backups_enabled(enable).await {
		Ok(()) => {
			println!(
				"Dataset backup {}",
				if enable { "enabled" } else { "disabled" }
			);
			Ok(())
		}
		Err(e) => bail!(
			"{} dataset backup failed: {}",
			if enable { "Enabling" } else { "Disabling" },
			api_message(e)
		),
	}
}

fn api_message(e: ApiError) -> String {
	Error::from(e).user_message()
}
