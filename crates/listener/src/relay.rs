use std::{fmt, sync::Arc};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
	error::Error,
	types::{FeedEvent, IdPair},
};

/// Matches exactly the two variants of a pair, bound through `$publishedId` and `$draftId`
pub const PAIR_FILTER: &str = "*[_id == $publishedId || _id == $draftId]";

pub const DEFAULT_TAG: &str = "document.pair-listener";
pub const SNAPSHOT_TAG: &str = "document.snapshots";

pub type FeedStream = BoxStream<'static, Result<FeedEvent, Error>>;

/// A subscription on the remote mutation feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenQuery {
	pub query: String,
	pub published_id: String,
	pub draft_id: String,
	pub tag: String,
}

impl ListenQuery {
	pub fn for_pair(pair: &IdPair, tag: impl Into<String>) -> Self {
		Self {
			query: PAIR_FILTER.to_string(),
			published_id: pair.published_id.clone(),
			draft_id: pair.draft_id.clone(),
			tag: tag.into(),
		}
	}

	/// Query string parameters, query variables are sent JSON encoded with a `$` prefix
	pub fn to_params(&self) -> Vec<(String, String)> {
		vec![
			("query".to_string(), self.query.clone()),
			(
				"$publishedId".to_string(),
				serde_json::Value::from(self.published_id.as_str()).to_string(),
			),
			(
				"$draftId".to_string(),
				serde_json::Value::from(self.draft_id.as_str()).to_string(),
			),
			("includeResult".to_string(), "false".to_string()),
			("events".to_string(), "welcome,mutation,reconnect".to_string()),
			("effectFormat".to_string(), "mendoza".to_string()),
			("tag".to_string(), self.tag.clone()),
		]
	}
}

/// Source of raw feed events. A stream returned from [`listen`](Self::listen) ends, or yields
/// an error, when the underlying connection goes away; it is never restarted here.
#[async_trait]
pub trait MutationFeed: Send + Sync + 'static {
	async fn listen(&self, query: ListenQuery) -> Result<FeedStream, Error>;
}

/// One leg worth of subscription to a pair, every [`open`](Self::open) is a fresh connection
pub struct ListenerRelay<F: ?Sized> {
	feed: Arc<F>,
	query: ListenQuery,
}

impl<F: ?Sized> Clone for ListenerRelay<F> {
	fn clone(&self) -> Self {
		Self {
			feed: Arc::clone(&self.feed),
			query: self.query.clone(),
		}
	}
}

impl<F: ?Sized> fmt::Debug for ListenerRelay<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ListenerRelay")
			.field("query", &self.query)
			.finish_non_exhaustive()
	}
}

impl<F: MutationFeed + ?Sized> ListenerRelay<F> {
	pub fn new(feed: Arc<F>, pair: &IdPair, tag: &str) -> Self {
		Self {
			feed,
			query: ListenQuery::for_pair(pair, tag),
		}
	}

	pub fn query(&self) -> &ListenQuery {
		&self.query
	}

	pub async fn open(&self) -> Result<FeedStream, Error> {
		self.feed.listen(self.query.clone()).await
	}
}
