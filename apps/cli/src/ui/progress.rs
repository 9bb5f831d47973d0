//! Spinner shown while a backup downloads

use std::time::Duration;

use ds_backup::{describe, Progress};
use indicatif::{ProgressBar, ProgressStyle};

const TICK: Duration = Duration::from_millis(100);

/// One spinner line per step, finished steps stay on screen with a check mark
#[derive(Debug, Clone)]
pub struct StepSpinner {
	bar: ProgressBar,
}

impl StepSpinner {
	pub fn start(message: &str) -> Self {
		Self {
			bar: spinner(message),
		}
	}

	/// Updates the current line, or closes it and opens a new one when the step changes
	pub fn update(&mut self, progress: Progress) {
		let message = describe(progress);

		match progress {
			Progress::Downloading { .. } => self.bar.set_message(message),
			Progress::Archiving => {
				self.succeed();
				self.bar = spinner(&message);
			}
			Progress::Complete { .. } => {
				self.succeed();
				println!("✔ {message}");
			}
		}
	}

	pub fn fail(&self) {
		self.bar
			.abandon_with_message(format!("✖ {}", self.bar.message()));
	}

	fn succeed(&self) {
		if !self.bar.is_finished() {
			self.bar.finish_with_message(format!("✔ {}", self.bar.message()));
		}
	}
}

fn spinner(message: &str) -> ProgressBar {
	let bar = ProgressBar::new_spinner();
	bar.set_style(
		ProgressStyle::with_template("{spinner:.cyan} {msg}")
			.unwrap_or_else(|_| ProgressStyle::default_spinner())
			.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏✔"),
	);
	bar.set_message(message.to_string());
	bar.enable_steady_tick(TICK);
	bar
}
