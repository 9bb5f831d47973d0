use std::future::pending;

use futures::StreamExt;
use tokio::{
	sync::mpsc,
	time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::{
	config::RotationConfig,
	dedup::EventDeduplicator,
	error::Error,
	relay::{ListenerRelay, MutationFeed},
	types::FeedEvent,
};

type LegId = u64;

#[derive(Debug)]
enum LegMessage {
	Event(LegId, FeedEvent),
	Failed(LegId, Error),
	Ended(LegId),
}

#[derive(Debug)]
struct Leg {
	id: LegId,
	cancel: CancellationToken,
	/// Next legs hide their first welcome, the current leg already announced the connection
	suppress_first: bool,
	seen_first: bool,
	welcomed: bool,
}

impl Leg {
	fn stop(self) {
		self.cancel.cancel();
	}
}

/// Keeps one logical feed alive across server side subscription timeouts.
///
/// A current leg is opened right away. After a randomized wait a next leg is opened next to it,
/// and once the next leg has been welcomed both stay live for an overlap window before the
/// current one is dropped and the next takes its place. Both legs are merged and passed through
/// an [`EventDeduplicator`], which absorbs what the overlap delivers twice.
///
/// Transport failures are handled here: a failed current leg is replaced by a welcomed next leg
/// when there is one, otherwise a `Reconnect` is emitted downstream and a fresh leg is opened
/// after a backoff. Any other error is forwarded and ends the rotation.
pub struct RelayRotator<F: ?Sized> {
	relay: ListenerRelay<F>,
	config: RotationConfig,
	dedup: EventDeduplicator,
}

impl<F: MutationFeed + ?Sized> RelayRotator<F> {
	pub fn new(relay: ListenerRelay<F>, config: RotationConfig, dedup: EventDeduplicator) -> Self {
		Self {
			relay,
			config,
			dedup,
		}
	}

	/// Starts the rotation loop on the runtime. Cancelling `cancel`, or dropping the receiver,
	/// stops every leg along with any pending timer.
	pub fn spawn(
		self,
		cancel: CancellationToken,
	) -> async_channel::Receiver<Result<FeedEvent, Error>> {
		let (tx, rx) = async_channel::bounded(self.config.channel_capacity.max(1));

		tokio::spawn(self.run(tx, cancel));

		rx
	}

	#[instrument(skip_all, fields(document_id = %self.relay.query().published_id))]
	async fn run(
		self,
		tx: async_channel::Sender<Result<FeedEvent, Error>>,
		cancel: CancellationToken,
	) {
		let Self {
			relay,
			config,
			mut dedup,
		} = self;

		let legs_cancel = cancel.child_token();
		let _legs_guard = legs_cancel.clone().drop_guard();

		let (legs_tx, mut legs_rx) = mpsc::channel(config.channel_capacity.max(1));
		let mut next_leg_id: LegId = 0;

		let mut open_leg = |suppress_first: bool| {
			let id = next_leg_id;
			next_leg_id += 1;

			let leg_cancel = legs_cancel.child_token();
			tokio::spawn(run_leg(
				relay.clone(),
				id,
				legs_tx.clone(),
				leg_cancel.clone(),
			));

			debug!(leg_id = id, "Opened relay leg");

			Leg {
				id,
				cancel: leg_cancel,
				suppress_first,
				seen_first: false,
				welcomed: false,
			}
		};

		let mut current = Some(open_leg(false));
		let mut next: Option<Leg> = None;

		let mut exchange_at = Some(Instant::now() + config.exchange_wait());
		let mut cutover_at: Option<Instant> = None;
		let mut restart_at: Option<Instant> = None;
		let mut reconnect_delay = config.reconnect_delay;

		loop {
			tokio::select! {
				biased;

				() = cancel.cancelled() => {
					debug!("Rotation cancelled");
					break;
				}

				() = sleep_until_opt(cutover_at) => {
					cutover_at = None;

					if let Some(promoted) = next.take() {
						if let Some(old) = current.replace(promoted) {
							debug!(old_leg = old.id, "Overlap elapsed, closing previous relay leg");
							old.stop();
						}
						exchange_at = Some(Instant::now() + config.exchange_wait());
					}
				}

				() = sleep_until_opt(restart_at) => {
					restart_at = None;

					current = Some(open_leg(false));
					exchange_at = Some(Instant::now() + config.exchange_wait());
				}

				() = sleep_until_opt(exchange_at) => {
					exchange_at = None;

					if current.is_some() && next.is_none() {
						debug!("Starting relay exchange");
						next = Some(open_leg(true));
					}
				}

				Some(message) = legs_rx.recv() => {
					let (id, event) = match message {
						LegMessage::Event(id, event) => (id, Ok(event)),
						LegMessage::Failed(id, e) => (id, Err(e)),
						LegMessage::Ended(id) => {
							(id, Err(Error::Transport("feed connection closed".to_string())))
						}
					};

					let is_current = current.as_ref().is_some_and(|leg| leg.id == id);
					let is_next = next.as_ref().is_some_and(|leg| leg.id == id);

					if !is_current && !is_next {
						trace!(leg_id = id, "Ignoring message from a stopped relay leg");
						continue;
					}

					let event = match event {
						Ok(event) => event,
						Err(e) if !e.is_transport() => {
							error!(?e, leg_id = id, "Relay leg failed with a fatal error");
							let _ = tx.send(Err(e)).await;
							break;
						}
						Err(e) if is_next => {
							warn!(?e, leg_id = id, "Next relay leg failed, retrying the exchange");

							if let Some(leg) = next.take() {
								leg.stop();
							}
							cutover_at = None;
							exchange_at = Some(Instant::now() + config.reconnect_delay);

							continue;
						}
						Err(e) => {
							if let Some(leg) = current.take() {
								leg.stop();
							}

							match next.take() {
								Some(leg) if leg.welcomed => {
									debug!(
										?e,
										leg_id = id,
										"Current relay leg failed, promoting the welcomed next leg"
									);

									current = Some(leg);
									cutover_at = None;
									exchange_at = Some(Instant::now() + config.exchange_wait());
								}
								Some(mut leg) => {
									warn!(
										?e,
										leg_id = id,
										"Current relay leg failed, promoting the pending next leg"
									);

									// Its welcome has to reach downstream to trigger a resync
									leg.suppress_first = false;
									current = Some(leg);
									cutover_at = None;
									exchange_at = Some(Instant::now() + config.exchange_wait());

									if !emit(&mut dedup, &tx, FeedEvent::Reconnect).await {
										break;
									}
								}
								None => {
									warn!(
										?e,
										leg_id = id,
										?reconnect_delay,
										"Current relay leg failed, reconnecting"
									);

									exchange_at = None;
									restart_at = Some(Instant::now() + reconnect_delay);
									reconnect_delay = config.next_reconnect_delay(reconnect_delay);

									if !emit(&mut dedup, &tx, FeedEvent::Reconnect).await {
										break;
									}
								}
							}

							continue;
						}
					};

					let leg = if is_current {
						current.as_mut()
					} else {
						next.as_mut()
					};
					let Some(leg) = leg else {
						continue;
					};

					let is_first = !leg.seen_first;
					leg.seen_first = true;

					if let FeedEvent::Welcome { .. } = &event {
						if !leg.welcomed && !is_current {
							cutover_at = Some(Instant::now() + config.overlap);
						}
						leg.welcomed = true;

						if is_current {
							reconnect_delay = config.reconnect_delay;
						}

						if is_first && leg.suppress_first {
							trace!(leg_id = id, "Suppressing welcome of the next relay leg");
							continue;
						}
					}

					if !emit(&mut dedup, &tx, event).await {
						break;
					}
				}
			}
		}

		if let Some(leg) = current.take() {
			leg.stop();
		}
		if let Some(leg) = next.take() {
			leg.stop();
		}
	}
}

async fn run_leg<F: MutationFeed + ?Sized>(
	relay: ListenerRelay<F>,
	id: LegId,
	tx: mpsc::Sender<LegMessage>,
	cancel: CancellationToken,
) {
	let res = tokio::select! {
		() = cancel.cancelled() => return,
		res = forward_leg(&relay, id, &tx) => res,
	};

	let message = match res {
		Ok(()) => LegMessage::Ended(id),
		Err(e) => LegMessage::Failed(id, e),
	};

	// The rotation loop being gone means there is nobody left to tell
	let _ = tx.send(message).await;
}

async fn forward_leg<F: MutationFeed + ?Sized>(
	relay: &ListenerRelay<F>,
	id: LegId,
	tx: &mpsc::Sender<LegMessage>,
) -> Result<(), Error> {
	let mut stream = relay.open().await?;

	while let Some(event) = stream.next().await {
		if tx.send(LegMessage::Event(id, event?)).await.is_err() {
			break;
		}
	}

	Ok(())
}

/// Returns `false` once nobody is listening anymore
async fn emit(
	dedup: &mut EventDeduplicator,
	tx: &async_channel::Sender<Result<FeedEvent, Error>>,
	event: FeedEvent,
) -> bool {
	match dedup.filter(event) {
		Some(event) => tx.send(Ok(event)).await.is_ok(),
		None => true,
	}
}

async fn sleep_until_opt(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => sleep_until(deadline).await,
		None => pending().await,
	}
}
