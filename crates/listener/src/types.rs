use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DRAFTS_PREFIX: &str = "drafts.";

/// The two variants of one logical document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdPair {
	pub published_id: String,
	pub draft_id: String,
}

impl IdPair {
	pub fn new(published_id: impl Into<String>, draft_id: impl Into<String>) -> Self {
		Self {
			published_id: published_id.into(),
			draft_id: draft_id.into(),
		}
	}

	/// Builds the pair from either of its variants, following the `drafts.` prefix convention
	pub fn from_id(id: &str) -> Self {
		let published_id = id.strip_prefix(DRAFTS_PREFIX).unwrap_or(id);

		Self {
			published_id: published_id.to_string(),
			draft_id: format!("{DRAFTS_PREFIX}{published_id}"),
		}
	}

	pub fn contains(&self, document_id: &str) -> bool {
		self.published_id == document_id || self.draft_id == document_id
	}

	/// Ids in snapshot fetch order, draft first
	pub fn fetch_order(&self) -> [&str; 2] {
		[&self.draft_id, &self.published_id]
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
	#[serde(rename = "_id")]
	pub id: String,
	#[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
	pub rev: Option<String>,
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

/// One document's share of a server side transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
	pub transaction_id: String,
	pub document_id: String,
	pub transaction_total_events: u32,
	#[serde(default)]
	pub transaction_current_event: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub previous_rev: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result_rev: Option<String>,
	/// Patch effects in the format requested by the subscription
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub effects: Option<Value>,
	pub timestamp: DateTime<Utc>,
}

impl MutationEvent {
	pub const fn is_multi_part(&self) -> bool {
		self.transaction_total_events > 1
	}

	/// A transaction yields at most one event per document, so this identifies an event across
	/// relay legs without collapsing the parts of a multi document transaction
	pub fn dedup_key(&self) -> String {
		format!("{}:{}", self.transaction_id, self.document_id)
	}
}

/// Raw events as delivered by one feed subscription
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedEvent {
	Welcome {
		#[serde(skip_serializing_if = "Option::is_none")]
		listener_name: Option<String>,
	},
	Mutation(MutationEvent),
	Reconnect,
}

impl FeedEvent {
	pub const fn welcome() -> Self {
		Self::Welcome {
			listener_name: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingPhase {
	Begin,
	End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEvent {
	pub document_id: String,
	pub initial_revision: Option<String>,
	pub document: Option<Document>,
}

impl SnapshotEvent {
	pub fn new(document_id: impl Into<String>, document: Option<Document>) -> Self {
		Self {
			document_id: document_id.into(),
			initial_revision: document.as_ref().and_then(|doc| doc.rev.clone()),
			document,
		}
	}
}

/// Events handed to subscribers of a pair listener
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ListenerEvent {
	Mutation(MutationEvent),
	Reconnect,
	/// Only produced when converting raw feed events, a pair listener replaces it with snapshots
	Welcome,
	Snapshot(SnapshotEvent),
	/// Brackets a period where an incomplete transaction is being held back
	#[serde(rename = "pending")]
	PendingMutations { phase: PendingPhase },
}

impl ListenerEvent {
	pub const PENDING_BEGIN: Self = Self::PendingMutations {
		phase: PendingPhase::Begin,
	};
	pub const PENDING_END: Self = Self::PendingMutations {
		phase: PendingPhase::End,
	};

	pub const fn as_mutation(&self) -> Option<&MutationEvent> {
		match self {
			Self::Mutation(mutation) => Some(mutation),
			_ => None,
		}
	}
}

impl From<FeedEvent> for ListenerEvent {
	fn from(event: FeedEvent) -> Self {
		match event {
			FeedEvent::Welcome { .. } => Self::Welcome,
			FeedEvent::Mutation(mutation) => Self::Mutation(mutation),
			FeedEvent::Reconnect => Self::Reconnect,
		}
	}
}
