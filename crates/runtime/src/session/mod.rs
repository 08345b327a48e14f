//! Session core: request/response correlation and event dispatch.
//!
//! One [`Session`] correlates traffic for one transport connection. It handles:
//! - Allocating request ids and correlating responses
//! - Sorting inbound frames into responses, events and anomalies
//! - Fanning events out to every subscriber
//! - Caching one instance of each domain wrapper
//! - Failing every pending call when the connection ends
//!
//! # Message Flow
//!
//! 1. A caller invokes [`Session::call_command`] with a method and params
//! 2. A slot is registered in the pending table under a fresh id
//! 3. The request is queued to the writer task, which owns the transport sender
//! 4. The caller awaits its slot; no lock is held while it waits
//! 5. [`SessionLoop::run`] receives the response and resolves the slot by id
//! 6. Events take the other branch and are broadcast on the event bus
//!
//! # Lifecycle
//!
//! `Connected` → `Closed(reason)`, once, on [`Session::close`], remote
//! disconnect or transport failure. A closed session rejects commands
//! immediately and ends every event stream; reconnecting means building a new
//! session.

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cdp_protocol::{Command, Event, EventKind, Message, Request, encode_params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::config::SessionConfig;
use crate::domains::{Domain, DomainCache};
use crate::error::{CloseReason, Error, Result};
use crate::events::{DomainEventStream, EventBus, EventStream, TypedEventStream};
use crate::pending::{PendingCalls, Resolution};
use crate::transport::{TransportParts, WebSocketTransport};

/// Connection state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
	Connected,
	/// Terminal. Carries the first cause of termination.
	Closed(CloseReason),
}

impl SessionState {
	pub fn close_reason(&self) -> Option<&CloseReason> {
		match self {
			SessionState::Connected => None,
			SessionState::Closed(reason) => Some(reason),
		}
	}
}

/// Protocol anomaly observed by the dispatch loop.
///
/// Anomalies are reported and discarded; they never affect other calls or end
/// the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
	/// Response for an id that is not, and was not, pending.
	UnknownResponse { id: u64 },
	/// Frame that is neither a response nor an event.
	Malformed { reason: String },
}

impl fmt::Display for Anomaly {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Anomaly::UnknownResponse { id } => write!(f, "response for unknown request id {id}"),
			Anomaly::Malformed { reason } => write!(f, "malformed frame: {reason}"),
		}
	}
}

struct Shared {
	config: SessionConfig,
	pending: Arc<PendingCalls>,
	outbound_tx: mpsc::UnboundedSender<String>,
	events: EventBus<Event>,
	anomalies: EventBus<Anomaly>,
	domains: DomainCache,
	state: watch::Sender<SessionState>,
	/// Set once a [`SessionLoop`] has started running.
	loop_started: AtomicBool,
	/// Flips to `true` when the loop has stopped and the transport is closed.
	loop_finished: watch::Sender<bool>,
}

impl Shared {
	/// Classifies one inbound frame and routes it. Never fails.
	fn dispatch(&self, text: &str) {
		match Message::parse(text) {
			Message::Response(response) => {
				let id = response.id;
				match self.pending.resolve(id, response.into_result()) {
					Resolution::Delivered => tracing::debug!(id, "Resolved command"),
					Resolution::Cancelled => {
						tracing::debug!(id, "Discarded late response for cancelled command")
					}
					Resolution::Unknown => self.report(Anomaly::UnknownResponse { id }),
				}
			}
			Message::MalformedResponse { id, reason } => {
				if self.pending.fail(id, &reason) == Resolution::Delivered {
					tracing::debug!(id, "Failed command on malformed response");
				}
				self.report(Anomaly::Malformed { reason });
			}
			Message::Event(event) => {
				tracing::debug!(method = %event.method, "Dispatching event");
				self.events.emit(event);
			}
			Message::Unknown(reason) => {
				tracing::trace!(frame = %text, "Unclassifiable frame");
				self.report(Anomaly::Malformed { reason });
			}
		}
	}

	fn report(&self, anomaly: Anomaly) {
		tracing::warn!(%anomaly, "Protocol anomaly");
		self.anomalies.emit(anomaly);
	}

	/// Moves the session to `Closed`. Only the first call has any effect.
	fn terminate(&self, reason: CloseReason) -> bool {
		let transitioned = self.state.send_if_modified(|state| match state {
			SessionState::Connected => {
				*state = SessionState::Closed(reason.clone());
				true
			}
			SessionState::Closed(_) => false,
		});
		if !transitioned {
			return false;
		}

		let failed = self.pending.close_all(reason.clone());
		self.events.close();
		self.anomalies.close();
		self.domains.clear();

		match &reason {
			CloseReason::TransportFailed(e) => {
				tracing::error!(error = %e, failed_calls = failed, "Session terminated")
			}
			_ => tracing::info!(%reason, failed_calls = failed, "Session closed"),
		}
		true
	}

	fn closed_error(&self) -> Error {
		let reason = self
			.state
			.borrow()
			.close_reason()
			.cloned()
			.or_else(|| self.pending.closed_reason())
			.unwrap_or(CloseReason::Disconnected);
		Error::SessionClosed(reason)
	}
}

/// Handle to a live DevTools session.
///
/// Cheap to clone; all clones share the same pending table, event bus and
/// domain cache.
#[derive(Clone)]
pub struct Session {
	shared: Arc<Shared>,
}

impl Session {
	/// Creates a session over `parts`.
	///
	/// Nothing is read or written until the returned [`SessionLoop`] is run.
	pub fn new(parts: TransportParts, config: SessionConfig) -> (Session, SessionLoop) {
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let (state, _) = watch::channel(SessionState::Connected);
		let (loop_finished, _) = watch::channel(false);

		let shared = Arc::new(Shared {
			pending: Arc::new(PendingCalls::new()),
			outbound_tx,
			events: EventBus::new(config.event_capacity),
			anomalies: EventBus::new(config.anomaly_capacity),
			domains: DomainCache::new(),
			state,
			loop_started: AtomicBool::new(false),
			loop_finished,
			config,
		});

		let session_loop = SessionLoop {
			shared: Arc::clone(&shared),
			parts,
			outbound_rx,
		};

		(Session { shared }, session_loop)
	}

	/// Creates a session and runs its dispatch loop on the tokio runtime.
	pub fn spawn(parts: TransportParts, config: SessionConfig) -> Session {
		let (session, session_loop) = Session::new(parts, config);
		tokio::spawn(session_loop.run());
		session
	}

	/// Connects to a WebSocket debugger URL and spawns the session.
	pub async fn connect(url: &str, config: SessionConfig) -> Result<Session> {
		let parts = WebSocketTransport::connect(url, &config).await?;
		Ok(Session::spawn(parts, config))
	}

	/// Sends a command and waits for its result.
	///
	/// Returns the `result` payload, `None` when the response carried none.
	/// Waits indefinitely unless [`SessionConfig::command_timeout`] is set;
	/// dropping the future cancels the call cleanly.
	///
	/// # Errors
	///
	/// - [`Error::Command`] if the remote end rejected the command
	/// - [`Error::SessionClosed`] if the session is or becomes closed
	/// - [`Error::Timeout`] if a configured timeout elapsed
	pub async fn call_command(&self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
		match self.shared.config.command_timeout {
			Some(timeout) => self.call_command_with_timeout(method, params, timeout).await,
			None => self.issue(method, params).await,
		}
	}

	/// Like [`call_command`](Self::call_command) with an explicit bound.
	///
	/// On timeout the pending slot is released; a response arriving later is
	/// discarded without being reported as an anomaly.
	pub async fn call_command_with_timeout(
		&self,
		method: &str,
		params: Option<Value>,
		timeout: Duration,
	) -> Result<Option<Value>> {
		tokio::time::timeout(timeout, self.issue(method, params))
			.await
			.map_err(|_| {
				tracing::warn!(method, ?timeout, "Command timed out");
				Error::Timeout {
					method: method.to_string(),
					after: timeout,
				}
			})?
	}

	async fn issue(&self, method: &str, params: Option<Value>) -> Result<Option<Value>> {
		let response = self.shared.pending.register(method)?;
		let id = response.id();

		let text = Request::new(id, method, params)
			.to_text()
			.map_err(Error::Encode)?;
		tracing::debug!(id, method, "Sending command");
		tracing::trace!(frame = %text, "Request frame");

		if self.shared.outbound_tx.send(text).is_err() {
			return Err(self.shared.closed_error());
		}

		response.await
	}

	/// Sends a typed command and decodes its typed result.
	pub async fn send<C: Command>(&self, command: &C) -> Result<C::Response> {
		let params = encode_params(command).map_err(Error::Encode)?;
		let result = self.call_command(C::METHOD, params).await?;
		decode_result(C::METHOD, result)
	}

	/// Sends a command by name with serializable params, decoding the result into `R`.
	pub async fn send_raw<P: Serialize, R: DeserializeOwned>(
		&self,
		method: &str,
		params: P,
	) -> Result<R> {
		let params = encode_params(&params).map_err(Error::Encode)?;
		let result = self.call_command(method, params).await?;
		decode_result(method, result)
	}

	/// Subscribes to every inbound event, unfiltered.
	pub fn events(&self) -> EventStream<Event> {
		self.shared.events.subscribe()
	}

	/// Subscribes to one event kind, decoded.
	pub fn listen<T: EventKind>(&self) -> TypedEventStream<T> {
		TypedEventStream::new(self.shared.events.subscribe())
	}

	/// Subscribes to all events of one domain.
	pub fn domain_events(&self, domain: &str) -> DomainEventStream {
		DomainEventStream::new(self.shared.events.subscribe(), domain)
	}

	/// Waits for the next event named `method`.
	///
	/// # Errors
	///
	/// - [`Error::Timeout`] if no such event arrives in time
	/// - [`Error::SessionClosed`] if the session closes first
	pub async fn wait_for_event(&self, method: &str, timeout: Duration) -> Result<Event> {
		let wanted = method.to_string();
		let waiter = self
			.shared
			.events
			.register_waiter(move |event: &Event| event.method == wanted);

		match tokio::time::timeout(timeout, waiter).await {
			Ok(Ok(event)) => Ok(event),
			Ok(Err(_)) => Err(self.shared.closed_error()),
			Err(_) => Err(Error::Timeout {
				method: method.to_string(),
				after: timeout,
			}),
		}
	}

	/// Subscribes to protocol anomaly reports.
	pub fn anomalies(&self) -> EventStream<Anomaly> {
		self.shared.anomalies.subscribe()
	}

	/// Returns the session's instance of `T`, creating it with `factory` on first access.
	pub fn get_or_create_domain<T, F>(&self, factory: F) -> Arc<T>
	where
		T: Send + Sync + 'static,
		F: FnOnce() -> T,
	{
		self.shared.domains.get_or_insert_with(factory)
	}

	/// Returns the session's instance of domain `D`.
	pub fn domain<D: Domain>(&self) -> Arc<D> {
		let session = self.clone();
		self.get_or_create_domain(move || D::new(session))
	}

	pub fn state(&self) -> SessionState {
		self.shared.state.borrow().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.shared.state.borrow().close_reason().is_some()
	}

	/// Resolves once the session has closed, with the reason.
	pub async fn closed(&self) -> CloseReason {
		let mut state = self.shared.state.subscribe();
		match state.wait_for(|s| s.close_reason().is_some()).await {
			Ok(closed) => closed
				.close_reason()
				.cloned()
				.unwrap_or(CloseReason::Disconnected),
			Err(_) => CloseReason::Disconnected,
		}
	}

	/// Number of commands awaiting a response.
	pub fn pending_calls(&self) -> usize {
		self.shared.pending.len()
	}

	pub fn config(&self) -> &SessionConfig {
		&self.shared.config
	}

	/// Closes the session.
	///
	/// Pending calls fail with [`CloseReason::Closed`]. Resolves once the
	/// dispatch loop has stopped and the transport sender is closed, or right
	/// away if the loop was never run. Idempotent.
	pub async fn close(&self) {
		self.shared.terminate(CloseReason::Closed);
		if !self.shared.loop_started.load(Ordering::SeqCst) {
			return;
		}
		let mut finished = self.shared.loop_finished.subscribe();
		let _ = finished.wait_for(|done| *done).await;
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("state", &self.state())
			.field("pending_calls", &self.pending_calls())
			.finish()
	}
}

fn decode_result<R: DeserializeOwned>(method: &str, result: Option<Value>) -> Result<R> {
	serde_json::from_value(result.unwrap_or(Value::Null)).map_err(|source| Error::Decode {
		method: method.to_string(),
		source,
	})
}

/// The single dispatch path of a session.
///
/// Owns the transport. Run it exactly once, typically via [`Session::spawn`].
pub struct SessionLoop {
	shared: Arc<Shared>,
	parts: TransportParts,
	outbound_rx: mpsc::UnboundedReceiver<String>,
}

impl SessionLoop {
	/// Reads and dispatches inbound frames until the session closes.
	///
	/// Each frame is fully routed before the next is read. When the transport
	/// ends or fails the session is terminated with the matching reason.
	pub async fn run(self) {
		let SessionLoop {
			shared,
			parts,
			mut outbound_rx,
		} = self;
		shared.loop_started.store(true, Ordering::SeqCst);
		let TransportParts {
			mut sender,
			receiver,
		} = parts;

		let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
		let mut reader = tokio::spawn(receiver.run(inbound_tx));

		let writer_shared = Arc::clone(&shared);
		let mut writer_state = shared.state.subscribe();
		let writer = tokio::spawn(async move {
			loop {
				tokio::select! {
					message = outbound_rx.recv() => {
						let Some(text) = message else { break };
						if let Err(e) = sender.send(text).await {
							tracing::error!(error = %e, "Transport write error");
							writer_shared.terminate(CloseReason::TransportFailed(e.to_string()));
							break;
						}
					}
					_ = wait_closed(&mut writer_state) => break,
				}
			}
			if let Err(e) = sender.close().await {
				tracing::debug!(error = %e, "Error closing transport");
			}
		});

		let mut state = shared.state.subscribe();
		let reason = loop {
			tokio::select! {
				biased;
				frame = inbound_rx.recv() => match frame {
					Some(text) => shared.dispatch(&text),
					None => {
						break match (&mut reader).await {
							Ok(Ok(())) => CloseReason::Disconnected,
							Ok(Err(e)) => {
								tracing::error!(error = %e, "Transport read error");
								CloseReason::TransportFailed(e.to_string())
							}
							Err(e) => CloseReason::TransportFailed(e.to_string()),
						};
					}
				},
				_ = wait_closed(&mut state) => break CloseReason::Closed,
			}
		};

		shared.terminate(reason);
		reader.abort();
		let _ = writer.await;
		shared.loop_finished.send_replace(true);
		tracing::debug!("Session loop finished");
	}
}

async fn wait_closed(state: &mut watch::Receiver<SessionState>) {
	let _ = state.wait_for(|s| s.close_reason().is_some()).await;
}
