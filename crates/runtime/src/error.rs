//! Error types for the DevTools session runtime.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a session stopped accepting commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
	/// Closed explicitly through [`Session::close`](crate::Session::close).
	Closed,
	/// The remote end hung up (close frame, EOF).
	Disconnected,
	/// Reading or writing the transport failed.
	TransportFailed(String),
}

impl fmt::Display for CloseReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CloseReason::Closed => f.write_str("closed by client"),
			CloseReason::Disconnected => f.write_str("remote end disconnected"),
			CloseReason::TransportFailed(reason) => write!(f, "transport failed: {reason}"),
		}
	}
}

/// Errors that can occur while talking to a DevTools endpoint.
#[derive(Debug, Error)]
pub enum Error {
	/// The remote end rejected the command.
	#[error("{method} failed: {message} (code {code})")]
	Command {
		method: String,
		code: i64,
		message: String,
		data: Option<String>,
	},

	/// The session terminated; no further commands can be issued on it.
	#[error("Session closed: {0}")]
	SessionClosed(CloseReason),

	/// A result or event payload did not match its expected shape.
	#[error("Failed to decode {method} payload: {source}")]
	Decode {
		method: String,
		#[source]
		source: serde_json::Error,
	},

	/// The response to a command could not be understood at all.
	#[error("{method} got a malformed response: {reason}")]
	Protocol { method: String, reason: String },

	/// Command parameters could not be encoded.
	#[error("Failed to encode params: {0}")]
	Encode(#[source] serde_json::Error),

	/// Transport-level error (WebSocket or pipe).
	#[error("Transport error: {0}")]
	Transport(String),

	/// Failed to establish the transport connection.
	#[error("Failed to connect to DevTools endpoint: {0}")]
	ConnectionFailed(String),

	/// A caller-imposed bound on a command elapsed.
	#[error("Timeout: {method} got no response within {after:?}")]
	Timeout { method: String, after: Duration },

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns true if the remote end rejected the command.
	pub fn is_command_error(&self) -> bool {
		matches!(self, Error::Command { .. })
	}

	/// Returns true if the session was terminated.
	pub fn is_session_closed(&self) -> bool {
		matches!(self, Error::SessionClosed(_))
	}

	/// Returns true if a payload failed to decode locally.
	pub fn is_decode_error(&self) -> bool {
		matches!(self, Error::Decode { .. })
	}

	/// Returns true if the remote end sent an unreadable response.
	pub fn is_protocol_error(&self) -> bool {
		matches!(self, Error::Protocol { .. })
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}

	/// Protocol error code, if the remote end rejected the command.
	pub fn code(&self) -> Option<i64> {
		match self {
			Error::Command { code, .. } => Some(*code),
			_ => None,
		}
	}

	/// Close reason, if the session was terminated.
	pub fn close_reason(&self) -> Option<&CloseReason> {
		match self {
			Error::SessionClosed(reason) => Some(reason),
			_ => None,
		}
	}

	pub(crate) fn command(method: &str, error: cdp_protocol::ErrorPayload) -> Self {
		Error::Command {
			method: method.to_string(),
			code: error.code,
			message: error.message,
			data: error.data,
		}
	}
}
