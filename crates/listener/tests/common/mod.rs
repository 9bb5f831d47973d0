#![allow(dead_code)]

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use ds_listener::{
	Document, DocumentSource, Error, FeedEvent, FeedStream, ListenQuery, ListenerConfig,
	MutationEvent, MutationFeed, RotationConfig,
};
use futures::{stream, StreamExt};
use serde_json::{json, Map};

pub type LegSender = async_channel::Sender<Result<FeedEvent, Error>>;

enum ScriptedLeg {
	Stream(async_channel::Receiver<Result<FeedEvent, Error>>),
	Fail(Error),
}

/// Hands out pre-scripted legs, one per subscription, in the order they were pushed.
/// Once the script runs out, subscriptions stay silent forever.
#[derive(Default)]
pub struct ScriptedFeed {
	legs: Mutex<VecDeque<ScriptedLeg>>,
	subscriptions: AtomicUsize,
	queries: Mutex<Vec<ListenQuery>>,
}

impl ScriptedFeed {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Scripts the next subscription, events sent on the returned sender flow through it and
	/// dropping the sender ends it
	pub fn push_leg(&self) -> LegSender {
		let (tx, rx) = async_channel::unbounded();
		self.legs.lock().unwrap().push_back(ScriptedLeg::Stream(rx));
		tx
	}

	/// Scripts the next subscription to be refused
	pub fn push_failure(&self, error: Error) {
		self.legs.lock().unwrap().push_back(ScriptedLeg::Fail(error));
	}

	pub fn subscriptions(&self) -> usize {
		self.subscriptions.load(Ordering::SeqCst)
	}

	pub fn queries(&self) -> Vec<ListenQuery> {
		self.queries.lock().unwrap().clone()
	}
}

#[async_trait]
impl MutationFeed for ScriptedFeed {
	async fn listen(&self, query: ListenQuery) -> Result<FeedStream, Error> {
		self.subscriptions.fetch_add(1, Ordering::SeqCst);
		self.queries.lock().unwrap().push(query);

		let leg = self.legs.lock().unwrap().pop_front();

		match leg {
			Some(ScriptedLeg::Stream(rx)) => Ok(rx.boxed()),
			Some(ScriptedLeg::Fail(e)) => Err(e),
			None => Ok(stream::pending().boxed()),
		}
	}
}

/// Serves documents from memory, counting every batched read
#[derive(Default)]
pub struct FakeDocuments {
	documents: Mutex<HashMap<String, Document>>,
	fetches: AtomicUsize,
}

impl FakeDocuments {
	pub fn with(documents: impl IntoIterator<Item = Document>) -> Arc<Self> {
		let this = Self::default();
		for doc in documents {
			this.put(doc);
		}
		Arc::new(this)
	}

	pub fn put(&self, doc: Document) {
		self.documents.lock().unwrap().insert(doc.id.clone(), doc);
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl DocumentSource for FakeDocuments {
	async fn get_documents(
		&self,
		ids: &[&str],
		_tag: &str,
	) -> Result<Vec<Option<Document>>, Error> {
		self.fetches.fetch_add(1, Ordering::SeqCst);

		let documents = self.documents.lock().unwrap();
		Ok(ids.iter().map(|id| documents.get(*id).cloned()).collect())
	}
}

pub fn document(id: &str, rev: &str) -> Document {
	let mut fields = Map::new();
	fields.insert("title".to_string(), json!(format!("title of {id}")));

	Document {
		id: id.to_string(),
		rev: Some(rev.to_string()),
		fields,
	}
}

pub fn mutation_event(transaction_id: &str, document_id: &str, total: u32) -> MutationEvent {
	MutationEvent {
		transaction_id: transaction_id.to_string(),
		document_id: document_id.to_string(),
		transaction_total_events: total,
		transaction_current_event: 1,
		previous_rev: None,
		result_rev: Some(format!("{transaction_id}-rev")),
		effects: None,
		timestamp: Utc::now(),
	}
}

pub fn mutation(transaction_id: &str, document_id: &str, total: u32) -> FeedEvent {
	FeedEvent::Mutation(mutation_event(transaction_id, document_id, total))
}

/// Short, deterministic timings so paused-clock tests stay readable
pub fn rotation_config() -> RotationConfig {
	RotationConfig {
		exchange_wait_min: Duration::from_secs(10),
		exchange_wait_max: Duration::from_secs(10),
		overlap: Duration::from_secs(5),
		reconnect_delay: Duration::from_secs(1),
		max_reconnect_delay: Duration::from_secs(8),
		channel_capacity: 16,
	}
}

pub fn listener_config() -> ListenerConfig {
	ListenerConfig {
		stalled_transaction_timeout: Some(Duration::from_secs(60)),
		..Default::default()
	}
}
