//!
//! # Pair Listener
//!
//! Live, ordered and gap-free mutation events for one document pair (its draft and published
//! variants) on top of a push feed whose subscriptions get dropped by the server every so often.
//!
//! What you get:
//! - Overlapping rotation of feed subscriptions, so a subscription timeout never loses a mutation;
//! - Deduplication of whatever the overlap delivers twice;
//! - Fresh snapshots of both documents, draft first, every time the feed (re)welcomes us;
//! - Multi-part transactions delivered atomically, bracketed by pending markers;
//! - Automatic resync whenever the event sequence stops making sense.
//!
//! ## Basic example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ds_listener::{HttpDatasetClient, IdPair, ListenerConfig, PairListener};
//! use ds_utils::api::ApiConfig;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ds_listener::Error> {
//!     let client = Arc::new(HttpDatasetClient::new(
//!         ApiConfig::new("abc123", "production").with_token("secret"),
//!     )?);
//!
//!     let listener = PairListener::new(Arc::clone(&client), client, ListenerConfig::default());
//!     let mut events = listener.listen(IdPair::from_id("my-document"), None);
//!
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?);
//!     }
//!
//!     Ok(())
//! }
//! ```
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

mod buffer;
mod config;
mod dedup;
mod error;
mod pair;
mod relay;
mod remote;
mod rotator;
mod sse;
mod types;

pub use buffer::{all_pending_transaction_events_received, TransactionBuffer};
pub use config::{ListenerConfig, RotationConfig};
pub use dedup::{EventDeduplicator, DEFAULT_DEDUP_CAPACITY};
pub use error::Error;
pub use pair::{fetch_snapshots, DocumentSource, ListenerStream, PairListener, Snapshots};
pub use relay::{
	FeedStream, ListenQuery, ListenerRelay, MutationFeed, DEFAULT_TAG, PAIR_FILTER, SNAPSHOT_TAG,
};
pub use remote::{decode_feed, order_documents, HttpDatasetClient};
pub use rotator::RelayRotator;
pub use sse::{SseDecoder, SseMessage};
pub use types::{
	Document, FeedEvent, IdPair, ListenerEvent, MutationEvent, PendingPhase, SnapshotEvent,
	DRAFTS_PREFIX,
};
