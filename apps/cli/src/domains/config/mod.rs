use anyhow::Result;
use clap::Subcommand;

use crate::{
	config::{CliConfig, KEYS},
	context::Context,
	ui::table::new_table,
};

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
	/// Show all configuration
	Show,
	/// Get a configuration value
	Get {
		/// Configuration key (project_id, dataset, token, api_domain, api_version)
		key: String,
	},
	/// Set a configuration value, an empty value unsets it
	Set {
		key: String,
		value: String,
	},
}

pub fn run(ctx: &Context, cmd: ConfigCmd) -> Result<()> {
	let mut config = ctx.config.clone();

	match cmd {
		ConfigCmd::Show => {
			let mut table = new_table(&["Key", "Value"]);
			for key in KEYS {
				table.add_row(vec![key.to_string(), display_value(key, config.get(key)?)]);
			}

			println!("{table}");
			println!();
			println!(
				"Config file: {}",
				CliConfig::config_path(&ctx.config_dir).display()
			);
		}
		ConfigCmd::Get { key } => {
			println!("{}", display_value(&key, config.get(&key)?));
		}
		ConfigCmd::Set { key, value } => {
			config.set(&key, &value)?;
			config.save(&ctx.config_dir)?;
			println!("Set {key} = {}", display_value(&key, config.get(&key)?));
		}
	}

	Ok(())
}

fn display_value(key: &str, value: Option<&str>) -> String {
	match value {
		None => "(not set)".to_string(),
		Some(_) if key == "token" => "(hidden)".to_string(),
		Some(value) => value.to_string(),
	}
}
