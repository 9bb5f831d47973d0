use indexmap::IndexSet;
use tracing::trace;

use crate::types::FeedEvent;

pub const DEFAULT_DEDUP_CAPACITY: usize = 1000;

/// Bounded, least-recently-used window of already delivered mutations.
///
/// This is a best effort filter: a burst of more distinct ids than the capacity
/// can push an id out of the window and let a late duplicate through again.
#[derive(Debug)]
pub struct EventDeduplicator {
	seen: IndexSet<String>,
	capacity: usize,
}

impl Default for EventDeduplicator {
	fn default() -> Self {
		Self::new(DEFAULT_DEDUP_CAPACITY)
	}
}

impl EventDeduplicator {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self {
			seen: IndexSet::with_capacity(capacity),
			capacity,
		}
	}

	/// Returns `true` the first time an id shows up inside the window, `false` for repeats.
	///
	/// Repeats refresh the id, the entry evicted at capacity is always the least recently seen one.
	pub fn test(&mut self, id: &str) -> bool {
		if let Some(index) = self.seen.get_index_of(id) {
			let last = self.seen.len() - 1;
			self.seen.move_index(index, last);
			return false;
		}

		if self.seen.len() >= self.capacity {
			self.seen.shift_remove_index(0);
		}

		self.seen.insert(id.to_string());

		true
	}

	/// Drops mutations that were already delivered, control events are never filtered
	pub fn filter(&mut self, event: FeedEvent) -> Option<FeedEvent> {
		let is_duplicate = match &event {
			FeedEvent::Mutation(mutation) => !self.test(&mutation.dedup_key()),
			FeedEvent::Welcome { .. } | FeedEvent::Reconnect => false,
		};

		if is_duplicate {
			trace!(?event, "Dropping duplicate mutation");
			None
		} else {
			Some(event)
		}
	}

	pub fn len(&self) -> usize {
		self.seen.len()
	}

	pub fn is_empty(&self) -> bool {
		self.seen.is_empty()
	}

	pub const fn capacity(&self) -> usize {
		self.capacity
	}
}
