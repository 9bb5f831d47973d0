use comfy_table::{presets::UTF8_BORDERS_ONLY, Table};

/// Borderless table in the style used by every listing command
pub fn new_table(header: &[&str]) -> Table {
	let mut table = Table::new();
	table.load_preset(UTF8_BORDERS_ONLY);
	table.set_header(header.to_vec());
	table
}
