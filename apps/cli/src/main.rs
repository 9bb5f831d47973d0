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
	clippy::dbg_macro,
	deprecated
)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod context;
mod domains;
mod ui;

use crate::{
	config::CliConfig,
	context::{ApiArgs, Context},
	domains::{backup::BackupCmd, config::ConfigCmd, listen::ListenArgs},
};

const DEFAULT_LOG_FILTER: &str = "warn,ds_listener=info,ds_backup=info,dsctl=info";
const VERBOSE_LOG_FILTER: &str = "info,ds_listener=debug,ds_backup=debug,dsctl=debug";

#[derive(Parser, Debug)]
#[command(name = "dsctl", about = "Dataset backups and live document listening", version)]
struct Cli {
	/// Debug logging for every component, RUST_LOG takes precedence
	#[arg(short, long, global = true, default_value_t = false)]
	verbose: bool,

	/// Directory holding config.json, the platform config directory by default
	#[arg(long, env = "DS_CONFIG_DIR", global = true)]
	config_dir: Option<PathBuf>,

	#[command(flatten)]
	api: ApiArgs,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Dataset backup operations
	#[command(subcommand)]
	Backup(BackupCmd),
	/// Stream the events of a document pair as JSON lines
	Listen(ListenArgs),
	/// Show or change stored defaults
	#[command(subcommand)]
	Config(ConfigCmd),
}

fn init_tracing(verbose: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(if verbose {
			VERBOSE_LOG_FILTER
		} else {
			DEFAULT_LOG_FILTER
		})
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr).with_target(false))
		.init();
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	init_tracing(cli.verbose);

	let config_dir = match cli.config_dir {
		Some(dir) => dir,
		None => CliConfig::default_dir()?,
	};
	let ctx = Context::new(CliConfig::load(&config_dir)?, config_dir, cli.api);

	match cli.command {
		Commands::Backup(cmd) => domains::backup::run(&ctx, cmd).await,
		Commands::Listen(args) => domains::listen::run(&ctx, args).await,
		Commands::Config(cmd) => domains::config::run(&ctx, cmd),
	}
}
