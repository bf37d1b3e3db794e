//! Session timing and endpoint configuration.

use std::time::Duration;

/// Delay after opening the display before geometry is recomputed once more.
///
/// Layout is often not final when the display opens.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Quiet period after the last viewport resize before geometry is recomputed.
pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	/// Backend endpoint handed to the channel binding.
	pub endpoint: String,
	pub settle_delay: Duration,
	/// Zero disables debouncing.
	pub resize_debounce: Duration,
}

impl SessionConfig {
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			settle_delay: DEFAULT_SETTLE_DELAY,
			resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
		}
	}

	pub fn with_settle_delay(mut self, delay: Duration) -> Self {
		self.settle_delay = delay;
		self
	}

	pub fn with_resize_debounce(mut self, debounce: Duration) -> Self {
		self.resize_debounce = debounce;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_and_builders() {
		let config = SessionConfig::new("http://127.0.0.1:8080");
		assert_eq!(config.settle_delay, Duration::from_millis(300));
		assert_eq!(config.resize_debounce, Duration::from_millis(50));

		let config = config.with_settle_delay(Duration::ZERO).with_resize_debounce(Duration::from_millis(5));
		assert!(config.settle_delay.is_zero());
		assert_eq!(config.resize_debounce, Duration::from_millis(5));
	}
}
