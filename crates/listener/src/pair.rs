use std::{
	fmt,
	future::pending,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
	time::Duration,
};

use async_trait::async_trait;
use futures::{stream::BoxStream, Stream, StreamExt};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, instrument, warn};

use crate::{
	buffer::TransactionBuffer,
	config::ListenerConfig,
	dedup::EventDeduplicator,
	error::Error,
	relay::{ListenerRelay, MutationFeed, DEFAULT_TAG, SNAPSHOT_TAG},
	rotator::RelayRotator,
	types::{Document, FeedEvent, IdPair, ListenerEvent, MutationEvent, SnapshotEvent},
};

/// Batched document reads
#[async_trait]
pub trait DocumentSource: Send + Sync + 'static {
	/// Returns exactly one entry per requested id, in request order, `None` for missing documents
	async fn get_documents(&self, ids: &[&str], tag: &str) -> Result<Vec<Option<Document>>, Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshots {
	pub draft: Option<Document>,
	pub published: Option<Document>,
}

impl Snapshots {
	/// Snapshot events in emission order, draft first
	pub fn into_events(self, pair: &IdPair) -> [ListenerEvent; 2] {
		[
			ListenerEvent::Snapshot(SnapshotEvent::new(&pair.draft_id, self.draft)),
			ListenerEvent::Snapshot(SnapshotEvent::new(&pair.published_id, self.published)),
		]
	}
}

/// Reads both variants of a pair in a single request
pub async fn fetch_snapshots<D: DocumentSource + ?Sized>(
	documents: &D,
	pair: &IdPair,
) -> Result<Snapshots, Error> {
	let ids = pair.fetch_order();
	let mut fetched = documents.get_documents(&ids, SNAPSHOT_TAG).await?;

	if fetched.len() != ids.len() {
		return Err(Error::SnapshotCount {
			expected: ids.len(),
			got: fetched.len(),
		});
	}

	let published = fetched.pop().flatten();
	let draft = fetched.pop().flatten();

	Ok(Snapshots { draft, published })
}

/// Entry point for observing a document pair.
///
/// Every [`listen`](Self::listen) call owns its own rotation, deduplication window and transaction
/// buffer, nothing is shared between pairs.
pub struct PairListener<F: ?Sized, D: ?Sized> {
	feed: Arc<F>,
	documents: Arc<D>,
	config: ListenerConfig,
}

impl<F: ?Sized, D: ?Sized> Clone for PairListener<F, D> {
	fn clone(&self) -> Self {
		Self {
			feed: Arc::clone(&self.feed),
			documents: Arc::clone(&self.documents),
			config: self.config.clone(),
		}
	}
}

impl<F: ?Sized, D: ?Sized> fmt::Debug for PairListener<F, D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PairListener")
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl<F: MutationFeed + ?Sized, D: DocumentSource + ?Sized> PairListener<F, D> {
	pub fn new(feed: Arc<F>, documents: Arc<D>, config: ListenerConfig) -> Self {
		Self {
			feed,
			documents,
			config,
		}
	}

	/// Starts listening on a pair, must be called from within a tokio runtime.
	///
	/// Every welcome from the feed is replaced by two snapshots, draft first, so the stream
	/// always starts with them. Dropping the returned stream cancels every leg, timer and
	/// in-flight snapshot fetch belonging to it.
	pub fn listen(&self, pair: IdPair, tag: Option<&str>) -> ListenerStream {
		let cancel = CancellationToken::new();

		let relay = ListenerRelay::new(Arc::clone(&self.feed), &pair, tag.unwrap_or(DEFAULT_TAG));
		let upstream = RelayRotator::new(
			relay,
			self.config.rotation.clone(),
			EventDeduplicator::new(self.config.dedup_capacity),
		)
		.spawn(cancel.child_token());

		let (tx, rx) = async_channel::bounded(self.config.channel_capacity.max(1));

		let driver = PairDriver {
			pair,
			documents: Arc::clone(&self.documents),
			buffer: TransactionBuffer::new(),
			stalled_transaction_timeout: self.config.stalled_transaction_timeout,
			has_snapshot: false,
		};

		tokio::spawn(driver.run(upstream, tx, cancel.clone()));

		ListenerStream {
			events: rx.boxed(),
			_guard: cancel.drop_guard(),
		}
	}
}

/// Events for one pair, see [`PairListener::listen`]
pub struct ListenerStream {
	events: BoxStream<'static, Result<ListenerEvent, Error>>,
	_guard: DropGuard,
}

impl fmt::Debug for ListenerStream {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ListenerStream").finish_non_exhaustive()
	}
}

impl Stream for ListenerStream {
	type Item = Result<ListenerEvent, Error>;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.events.poll_next_unpin(cx)
	}
}

struct PairDriver<D: ?Sized> {
	pair: IdPair,
	documents: Arc<D>,
	buffer: TransactionBuffer,
	stalled_transaction_timeout: Option<Duration>,
	has_snapshot: bool,
}

/// `Ok(false)` means the subscriber went away
type Step = Result<bool, Error>;

impl<D: DocumentSource + ?Sized> PairDriver<D> {
	#[instrument(skip_all, fields(document_id = %self.pair.published_id))]
	async fn run(
		mut self,
		upstream: async_channel::Receiver<Result<FeedEvent, Error>>,
		tx: async_channel::Sender<Result<ListenerEvent, Error>>,
		cancel: CancellationToken,
	) {
		let mut stalled_at: Option<Instant> = None;

		loop {
			let step = tokio::select! {
				biased;

				() = cancel.cancelled() => break,

				() = sleep_until_opt(stalled_at) => Err(Error::OutOfSync(format!(
					"transaction still incomplete after {:?}",
					self.stalled_transaction_timeout.unwrap_or_default()
				))),

				event = upstream.recv() => match event {
					Ok(Ok(event)) => self.handle(event, &tx, &cancel).await,
					Ok(Err(e)) => Err(e),
					Err(_) => Err(Error::Closed),
				},
			};

			let step = match step {
				Err(e) if e.is_out_of_sync() => {
					let discarded = self.buffer.discard();
					error!(?e, discarded, "Listener out of sync, refetching snapshots");

					self.resync(&tx, &cancel).await
				}
				step => step,
			};

			match step {
				Ok(true) => {}
				Ok(false) | Err(Error::Closed) => break,
				Err(e) => {
					error!(?e, "Pair listener failed");
					let _ = tx.send(Err(e)).await;
					break;
				}
			}

			stalled_at = match (self.buffer.is_buffering(), stalled_at) {
				(false, _) => None,
				(true, Some(deadline)) => Some(deadline),
				(true, None) => self
					.stalled_transaction_timeout
					.map(|timeout| Instant::now() + timeout),
			};
		}

		debug!("Pair listener stopped");
	}

	async fn handle(
		&mut self,
		event: FeedEvent,
		tx: &async_channel::Sender<Result<ListenerEvent, Error>>,
		cancel: &CancellationToken,
	) -> Step {
		match event {
			FeedEvent::Welcome { listener_name } => {
				debug!(?listener_name, "Feed welcomed us, fetching snapshots");
				self.resync(tx, cancel).await
			}
			FeedEvent::Reconnect => {
				warn!("Feed reconnecting, waiting for a fresh welcome");
				Ok(deliver(tx, self.buffer.push(ListenerEvent::Reconnect)).await)
			}
			FeedEvent::Mutation(mutation) => {
				self.check_sequence(&mutation)?;
				Ok(deliver(tx, self.buffer.push(ListenerEvent::Mutation(mutation))).await)
			}
		}
	}

	fn check_sequence(&self, mutation: &MutationEvent) -> Result<(), Error> {
		if !self.pair.contains(&mutation.document_id) {
			return Err(Error::OutOfSync(format!(
				"received mutation for unrelated document <id='{}'>",
				mutation.document_id
			)));
		}

		if !self.has_snapshot {
			return Err(Error::OutOfSync(format!(
				"received mutation <transaction_id='{}'> before the first snapshot",
				mutation.transaction_id
			)));
		}

		Ok(())
	}

	async fn resync(
		&mut self,
		tx: &async_channel::Sender<Result<ListenerEvent, Error>>,
		cancel: &CancellationToken,
	) -> Step {
		let snapshots = tokio::select! {
			biased;

			() = cancel.cancelled() => return Err(Error::Closed),
			res = fetch_snapshots(&*self.documents, &self.pair) => res?,
		};

		self.has_snapshot = true;
		info!(
			draft_rev = ?snapshots.draft.as_ref().and_then(|doc| doc.rev.as_deref()),
			published_rev = ?snapshots.published.as_ref().and_then(|doc| doc.rev.as_deref()),
			"Fetched document snapshots"
		);

		for event in snapshots.into_events(&self.pair) {
			if !deliver(tx, self.buffer.push(event)).await {
				return Ok(false);
			}
		}

		Ok(true)
	}
}

async fn deliver(
	tx: &async_channel::Sender<Result<ListenerEvent, Error>>,
	events: Vec<ListenerEvent>,
) -> bool {
	for event in events {
		if tx.send(Ok(event)).await.is_err() {
			return false;
		}
	}

	true
}

async fn sleep_until_opt(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => sleep_until(deadline).await,
		None => pending().await,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use pretty_assertions::assert_eq;
	use serde_json::Map;

	use super::*;

	#[derive(Default)]
	struct RecordingSource {
		requests: Mutex<Vec<Vec<String>>>,
		response: Vec<Option<Document>>,
	}

	#[async_trait]
	impl DocumentSource for RecordingSource {
		async fn get_documents(
			&self,
			ids: &[&str],
			tag: &str,
		) -> Result<Vec<Option<Document>>, Error> {
			assert_eq!(tag, SNAPSHOT_TAG);
			self.requests
				.lock()
				.unwrap()
				.push(ids.iter().map(ToString::to_string).collect());

			Ok(self.response.clone())
		}
	}

	fn document(id: &str, rev: &str) -> Document {
		Document {
			id: id.to_string(),
			rev: Some(rev.to_string()),
			fields: Map::new(),
		}
	}

	#[tokio::test]
	async fn snapshots_are_fetched_draft_first() {
		let source = RecordingSource {
			response: vec![Some(document("drafts.x", "r2")), None],
			..Default::default()
		};
		let pair = IdPair::from_id("x");

		let snapshots = fetch_snapshots(&source, &pair).await.unwrap();

		assert_eq!(
			*source.requests.lock().unwrap(),
			vec![vec!["drafts.x".to_string(), "x".to_string()]]
		);
		assert_eq!(snapshots.draft, Some(document("drafts.x", "r2")));
		assert_eq!(snapshots.published, None);

		let [first, second] = snapshots.into_events(&pair);
		assert_eq!(
			first,
			ListenerEvent::Snapshot(SnapshotEvent {
				document_id: "drafts.x".to_string(),
				initial_revision: Some("r2".to_string()),
				document: Some(document("drafts.x", "r2")),
			})
		);
		assert_eq!(second, ListenerEvent::Snapshot(SnapshotEvent::new("x", None)));
	}

	#[tokio::test]
	async fn wrong_document_count_is_an_error() {
		let source = RecordingSource {
			response: vec![None],
			..Default::default()
		};

		assert!(matches!(
			fetch_snapshots(&source, &IdPair::from_id("x")).await,
			Err(Error::SnapshotCount {
				expected: 2,
				got: 1
			})
		));
	}
}
