use std::time::Duration;

use rand::Rng;

use crate::dedup::DEFAULT_DEDUP_CAPACITY;

/// How long to wait after a leg is set up before starting the exchange for the next one
pub const EXCHANGE_WAIT_MIN: Duration = Duration::from_secs(12 * 60);
pub const EXCHANGE_WAIT_MAX: Duration = Duration::from_secs(19 * 60);

/// How long both legs stay live once the next leg has been welcomed
pub const EXCHANGE_OVERLAP: Duration = Duration::from_secs(20);

pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

pub const STALLED_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RotationConfig {
	pub exchange_wait_min: Duration,
	pub exchange_wait_max: Duration,
	pub overlap: Duration,
	/// First delay before resubscribing a dead leg, doubled on every consecutive failure
	pub reconnect_delay: Duration,
	pub max_reconnect_delay: Duration,
	pub channel_capacity: usize,
}

impl Default for RotationConfig {
	fn default() -> Self {
		Self {
			exchange_wait_min: EXCHANGE_WAIT_MIN,
			exchange_wait_max: EXCHANGE_WAIT_MAX,
			overlap: EXCHANGE_OVERLAP,
			reconnect_delay: RECONNECT_DELAY,
			max_reconnect_delay: MAX_RECONNECT_DELAY,
			channel_capacity: 64,
		}
	}
}

impl RotationConfig {
	/// Random delay within the configured bounds, so that many listeners opened together don't
	/// all rotate at the same moment
	pub fn exchange_wait(&self) -> Duration {
		if self.exchange_wait_max <= self.exchange_wait_min {
			return self.exchange_wait_min;
		}

		rand::thread_rng().gen_range(self.exchange_wait_min..=self.exchange_wait_max)
	}

	pub fn next_reconnect_delay(&self, current: Duration) -> Duration {
		(current * 2).min(self.max_reconnect_delay)
	}
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
	pub rotation: RotationConfig,
	pub dedup_capacity: usize,
	/// How long a multi event transaction may stay incomplete before the listener resyncs.
	/// `None` holds incomplete transactions until the next snapshot.
	pub stalled_transaction_timeout: Option<Duration>,
	pub channel_capacity: usize,
}

impl Default for ListenerConfig {
	fn default() -> Self {
		Self {
			rotation: RotationConfig::default(),
			dedup_capacity: DEFAULT_DEDUP_CAPACITY,
			stalled_transaction_timeout: Some(STALLED_TRANSACTION_TIMEOUT),
			channel_capacity: 64,
		}
	}
}
