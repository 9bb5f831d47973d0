use std::{sync::Arc, time::Duration};

use ds_listener::{
	Error, EventDeduplicator, FeedEvent, IdPair, ListenerRelay, RelayRotator, DEFAULT_TAG,
};
use pretty_assertions::assert_eq;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

mod common;

use common::{mutation, rotation_config, ScriptedFeed};

type Events = async_channel::Receiver<Result<FeedEvent, Error>>;

fn start(feed: &Arc<ScriptedFeed>, cancel: CancellationToken) -> Events {
	let relay = ListenerRelay::new(Arc::clone(feed), &IdPair::from_id("x"), DEFAULT_TAG);

	RelayRotator::new(relay, rotation_config(), EventDeduplicator::default()).spawn(cancel)
}

async fn next_event(events: &Events) -> FeedEvent {
	events.recv().await.unwrap().unwrap()
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn next_leg_takes_over_without_gaps() {
	let feed = ScriptedFeed::new();
	let current = feed.push_leg();
	let next = feed.push_leg();

	let tx1 = mutation("tx1", "x", 1);
	let tx2 = mutation("tx2", "x", 1);

	current.send(Ok(tx1.clone())).await.unwrap();
	next.send(Ok(FeedEvent::welcome())).await.unwrap();
	next.send(Ok(tx2.clone())).await.unwrap();

	let events = start(&feed, CancellationToken::new());

	assert_eq!(next_event(&events).await, tx1);
	// The next leg's welcome is swallowed, only its mutation makes it through
	assert_eq!(next_event(&events).await, tx2);
	assert_eq!(feed.subscriptions(), 2);
	assert!(events.is_empty());
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn overlap_duplicates_are_dropped() {
	let feed = ScriptedFeed::new();
	let current = feed.push_leg();
	let next = feed.push_leg();

	let tx1 = mutation("tx1", "x", 1);
	let tx2 = mutation("tx2", "drafts.x", 1);

	current.send(Ok(FeedEvent::welcome())).await.unwrap();
	current.send(Ok(tx1.clone())).await.unwrap();

	next.send(Ok(FeedEvent::welcome())).await.unwrap();
	next.send(Ok(tx1.clone())).await.unwrap();
	next.send(Ok(tx2.clone())).await.unwrap();

	let started = Instant::now();
	let events = start(&feed, CancellationToken::new());

	assert_eq!(next_event(&events).await, FeedEvent::welcome());
	assert_eq!(next_event(&events).await, tx1);
	assert_eq!(next_event(&events).await, tx2);
	assert_eq!(feed.subscriptions(), 2);

	// Both legs stay up during the overlap window
	sleep_until(started + Duration::from_secs(12)).await;
	assert!(!current.is_closed());

	// After it the previous leg is dropped and the next one keeps flowing
	sleep_until(started + Duration::from_secs(16)).await;
	assert!(current.is_closed());
	assert!(!next.is_closed());

	let tx3 = mutation("tx3", "x", 1);
	next.send(Ok(tx3.clone())).await.unwrap();
	assert_eq!(next_event(&events).await, tx3);
	assert!(logs_contain("Overlap elapsed"));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn dead_leg_is_reconnected_after_a_delay() {
	let feed = ScriptedFeed::new();
	let first = feed.push_leg();
	let second = feed.push_leg();

	first.send(Ok(FeedEvent::welcome())).await.unwrap();
	drop(first);

	let tx1 = mutation("tx1", "x", 1);
	second.send(Ok(FeedEvent::welcome())).await.unwrap();
	second.send(Ok(tx1.clone())).await.unwrap();

	let started = Instant::now();
	let events = start(&feed, CancellationToken::new());

	assert_eq!(next_event(&events).await, FeedEvent::welcome());
	assert_eq!(next_event(&events).await, FeedEvent::Reconnect);

	// A reconnected leg announces itself, downstream needs the welcome to resync
	assert_eq!(next_event(&events).await, FeedEvent::welcome());
	assert!(started.elapsed() >= Duration::from_secs(1));

	assert_eq!(next_event(&events).await, tx1);
	assert_eq!(feed.subscriptions(), 2);
	assert!(logs_contain("Current relay leg failed, reconnecting"));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn refused_subscriptions_back_off() {
	let feed = ScriptedFeed::new();
	feed.push_failure(Error::Transport("connection refused".to_string()));
	feed.push_failure(Error::Transport("connection refused".to_string()));
	let third = feed.push_leg();
	third.send(Ok(FeedEvent::welcome())).await.unwrap();

	let started = Instant::now();
	let events = start(&feed, CancellationToken::new());

	assert_eq!(next_event(&events).await, FeedEvent::Reconnect);
	assert_eq!(next_event(&events).await, FeedEvent::Reconnect);
	assert_eq!(next_event(&events).await, FeedEvent::welcome());

	// 1s then 2s
	assert!(started.elapsed() >= Duration::from_secs(3));
	assert_eq!(feed.subscriptions(), 3);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn welcomed_next_leg_replaces_a_dead_current_leg_silently() {
	let feed = ScriptedFeed::new();
	let current = feed.push_leg();
	let next = feed.push_leg();

	current.send(Ok(FeedEvent::welcome())).await.unwrap();
	next.send(Ok(FeedEvent::welcome())).await.unwrap();

	let started = Instant::now();
	let events = start(&feed, CancellationToken::new());
	assert_eq!(next_event(&events).await, FeedEvent::welcome());

	// Next leg is open and welcomed at 10s, the current one dies inside the overlap window
	sleep_until(started + Duration::from_secs(12)).await;
	assert_eq!(feed.subscriptions(), 2);
	drop(current);

	let tx1 = mutation("tx1", "x", 1);
	next.send(Ok(tx1.clone())).await.unwrap();

	assert_eq!(next_event(&events).await, tx1);
	assert_eq!(feed.subscriptions(), 2);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn fatal_errors_end_the_rotation() {
	let feed = ScriptedFeed::new();
	let leg = feed.push_leg();

	leg.send(Ok(FeedEvent::welcome())).await.unwrap();
	leg.send(Err(Error::Channel("invalid query".to_string())))
		.await
		.unwrap();

	let events = start(&feed, CancellationToken::new());

	assert_eq!(next_event(&events).await, FeedEvent::welcome());
	assert!(matches!(
		events.recv().await,
		Ok(Err(Error::Channel(reason))) if reason == "invalid query"
	));
	assert!(events.recv().await.is_err());
	assert_eq!(feed.subscriptions(), 1);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn cancellation_stops_every_leg() {
	let feed = ScriptedFeed::new();
	let current = feed.push_leg();
	let next = feed.push_leg();

	current.send(Ok(FeedEvent::welcome())).await.unwrap();

	let cancel = CancellationToken::new();
	let started = Instant::now();
	let events = start(&feed, cancel.clone());
	assert_eq!(next_event(&events).await, FeedEvent::welcome());

	// The next leg is connecting but hasn't been welcomed yet
	sleep_until(started + Duration::from_secs(11)).await;
	assert_eq!(feed.subscriptions(), 2);

	cancel.cancel();
	sleep(Duration::from_millis(10)).await;

	assert!(current.is_closed());
	assert!(next.is_closed());
	assert!(events.recv().await.is_err());
}
