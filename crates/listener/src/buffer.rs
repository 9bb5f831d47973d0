use std::collections::HashMap;

use tracing::debug;

use crate::types::{ListenerEvent, MutationEvent};

/// Makes multi event transactions atomic for downstream consumers.
///
/// Mutations pass straight through until a transaction that spans several events shows up.
/// From then on everything is held back, in arrival order, until every transaction in the
/// buffer has all of its declared events, at which point the whole buffer is flushed.
/// The held back period is bracketed by [`ListenerEvent::PENDING_BEGIN`] and
/// [`ListenerEvent::PENDING_END`], state seen in between is transiently inconsistent.
///
/// There is no timeout here, a transaction that never completes is held forever.
/// Callers that need to bound that must track time themselves and [`discard`](Self::discard).
#[derive(Debug, Default)]
pub struct TransactionBuffer {
	buffered: Vec<MutationEvent>,
}

impl TransactionBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Feeds one event in, returning the events that are ready to be emitted, in order
	pub fn push(&mut self, event: ListenerEvent) -> Vec<ListenerEvent> {
		let mutation = match event {
			ListenerEvent::Mutation(mutation) => mutation,
			other => {
				if !self.buffered.is_empty() {
					debug!(
						discarded = self.buffered.len(),
						"Control event while buffering, discarding incomplete transactions"
					);
					self.buffered.clear();
				}

				return vec![other];
			}
		};

		let is_buffering = !self.buffered.is_empty();
		let is_multi = mutation.is_multi_part();

		if !is_multi && !is_buffering {
			return vec![ListenerEvent::Mutation(mutation)];
		}

		self.buffered.push(mutation);

		if !is_multi {
			// Held back to keep its place behind the transaction in flight
			return vec![];
		}

		if all_pending_transaction_events_received(&self.buffered) {
			let mut next = self
				.buffered
				.drain(..)
				.map(ListenerEvent::Mutation)
				.collect::<Vec<_>>();
			next.push(ListenerEvent::PENDING_END);

			return next;
		}

		if self.buffered.len() == 1 {
			vec![ListenerEvent::PENDING_BEGIN]
		} else {
			vec![]
		}
	}

	/// Drops whatever is being held, returning how many events were lost
	pub fn discard(&mut self) -> usize {
		let discarded = self.buffered.len();
		self.buffered.clear();
		discarded
	}

	pub fn is_buffering(&self) -> bool {
		!self.buffered.is_empty()
	}

	pub fn buffered(&self) -> &[MutationEvent] {
		&self.buffered
	}
}

/// Events can arrive in any order, so instead of trusting the per event counters we check that
/// every transaction id has as many events as its declared total
pub fn all_pending_transaction_events_received(events: &[MutationEvent]) -> bool {
	let mut groups = HashMap::<&str, (u32, u32)>::new();

	for event in events {
		let (_, received) = groups
			.entry(event.transaction_id.as_str())
			.or_insert((event.transaction_total_events, 0));
		*received += 1;
	}

	groups
		.values()
		.all(|(expected, received)| expected == received)
}
