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
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod api;
pub mod error;

/// `User-Agent` sent by every http client built through [`http_client_builder`]
pub const USER_AGENT: &str = concat!("dataset-sync/", env!("CARGO_PKG_VERSION"));

/// Base http client builder shared by the listener and backup crates
pub fn http_client_builder() -> reqwest::ClientBuilder {
	reqwest::Client::builder().user_agent(USER_AGENT)
}
