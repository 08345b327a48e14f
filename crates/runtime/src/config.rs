//! Session configuration.

use std::time::Duration;

/// Default number of events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default number of buffered protocol anomaly reports.
pub const DEFAULT_ANOMALY_CAPACITY: usize = 64;

/// Options for a [`Session`](crate::Session).
///
/// No command timeout is applied unless one is set here or passed to
/// [`Session::call_command_with_timeout`](crate::Session::call_command_with_timeout).
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Per-subscriber event buffer. A subscriber that falls further behind
	/// skips the oldest events instead of stalling dispatch.
	pub event_capacity: usize,

	/// Buffer for the anomaly diagnostic channel.
	pub anomaly_capacity: usize,

	/// Bound applied to every command issued through the session.
	pub command_timeout: Option<Duration>,

	/// Largest inbound WebSocket message accepted, in bytes.
	pub max_message_size: Option<usize>,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			event_capacity: DEFAULT_EVENT_CAPACITY,
			anomaly_capacity: DEFAULT_ANOMALY_CAPACITY,
			command_timeout: None,
			max_message_size: None,
		}
	}
}

impl SessionConfig {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the per-subscriber event buffer size.
	pub fn event_capacity(mut self, capacity: usize) -> Self {
		self.event_capacity = capacity.max(1);
		self
	}

	/// Sets the anomaly channel buffer size.
	pub fn anomaly_capacity(mut self, capacity: usize) -> Self {
		self.anomaly_capacity = capacity.max(1);
		self
	}

	/// Applies a timeout to every command.
	pub fn command_timeout(mut self, timeout: Duration) -> Self {
		self.command_timeout = Some(timeout);
		self
	}

	/// Sets the maximum inbound WebSocket message size.
	pub fn max_message_size(mut self, bytes: usize) -> Self {
		self.max_message_size = Some(bytes);
		self
	}
}
