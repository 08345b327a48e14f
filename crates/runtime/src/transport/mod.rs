//! Transport adapters between a [`Session`](crate::Session) and a DevTools endpoint.
//!
//! The session only needs a way to push text frames out and a task that pumps
//! inbound frames into a channel. Both halves are trait objects so tests and
//! embedders can plug in anything that carries JSON text.
//!
//! - [`WebSocketTransport`]: `ws://`/`wss://` debugger URL (the usual case)
//! - [`PipeTransport`]: NUL-delimited frames, as spoken over
//!   `--remote-debugging-pipe`

mod pipe;
mod websocket;


use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

pub use pipe::{PipeReceiver, PipeSender, PipeTransport};
pub use websocket::{WebSocketReceiver, WebSocketSender, WebSocketTransport};

use crate::error::Result;

/// Outbound half of a transport.
pub trait TransportSender: Send {
	/// Writes one complete text frame.
	fn send(&mut self, text: String) -> BoxFuture<'_, Result<()>>;

	/// Closes the underlying connection.
	fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Inbound half of a transport.
pub trait TransportReceiver: Send {
	/// Pumps inbound text frames into `sink` until the connection ends.
	///
	/// Returns `Ok(())` on an orderly disconnect or once `sink` is dropped,
	/// and an error when reading fails.
	fn run(self: Box<Self>, sink: mpsc::UnboundedSender<String>) -> BoxFuture<'static, Result<()>>;
}

/// Both halves of a connected transport, ready to hand to a session.
pub struct TransportParts {
	pub sender: Box<dyn TransportSender>,
	pub receiver: Box<dyn TransportReceiver>,
}

impl TransportParts {
	pub fn new(
		sender: impl TransportSender + 'static,
		receiver: impl TransportReceiver + 'static,
	) -> Self {
		Self {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
		}
	}
}
