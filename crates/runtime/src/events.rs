//! Event fan-out.
//!
//! - [`EventBus`] - broadcast channel plus predicate waiters, closable
//! - [`EventStream`] - one subscriber's view, with lag handling
//! - [`TypedEventStream`] - narrowed to one event and decoded
//! - [`DomainEventStream`] - narrowed to one domain
//!
//! Every subscriber gets its own copy of every event emitted after it
//! subscribed. A subscriber that falls more than the configured capacity
//! behind skips the oldest events (logged) rather than holding up dispatch.

use std::marker::PhantomData;

use cdp_protocol::{Event, EventKind};
use futures_util::Stream;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, oneshot};

struct WaiterEntry<E> {
	predicate: Box<dyn Fn(&E) -> bool + Send + Sync>,
	complete_tx: oneshot::Sender<E>,
}

/// Broadcast bus with predicate-based one-shot waiters.
///
/// Waiters are checked before the broadcast in [`emit`](Self::emit), so a
/// `wait_for` caller cannot miss its event to subscriber lag.
pub struct EventBus<E: Clone + Send + 'static> {
	tx: RwLock<Option<broadcast::Sender<E>>>,
	waiters: Mutex<Vec<WaiterEntry<E>>>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
	/// Creates a bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self {
			tx: RwLock::new(Some(tx)),
			waiters: Mutex::new(Vec::new()),
		}
	}

	/// Emits an event to matching waiters, then to all subscribers.
	///
	/// Waiters whose receiver was dropped are pruned on the way. Never blocks.
	/// A no-op once the bus is closed.
	pub fn emit(&self, event: E) {
		{
			let mut waiters = self.waiters.lock();
			let mut i = 0;
			while i < waiters.len() {
				if waiters[i].complete_tx.is_closed() {
					waiters.swap_remove(i);
				} else if (waiters[i].predicate)(&event) {
					let entry = waiters.swap_remove(i);
					let _ = entry.complete_tx.send(event.clone());
				} else {
					i += 1;
				}
			}
		}
		if let Some(tx) = self.tx.read().as_ref() {
			let _ = tx.send(event);
		}
	}

	/// Subscribes to events emitted from now on.
	///
	/// Subscribing to a closed bus yields a stream that is already finished.
	pub fn subscribe(&self) -> EventStream<E> {
		match self.tx.read().as_ref() {
			Some(tx) => EventStream::new(tx.subscribe()),
			None => {
				let (tx, rx) = broadcast::channel(1);
				drop(tx);
				EventStream::new(rx)
			}
		}
	}

	/// Registers a waiter completed by the first event matching `predicate`.
	///
	/// The receiver errors if the bus closes first.
	pub fn register_waiter<F>(&self, predicate: F) -> oneshot::Receiver<E>
	where
		F: Fn(&E) -> bool + Send + Sync + 'static,
	{
		let (complete_tx, complete_rx) = oneshot::channel();
		if self.is_closed() {
			return complete_rx;
		}
		self.waiters.lock().push(WaiterEntry {
			predicate: Box::new(predicate),
			complete_tx,
		});
		complete_rx
	}

	/// Ends every stream after its buffered events and fails all waiters.
	pub fn close(&self) {
		self.tx.write().take();
		self.waiters.lock().clear();
	}

	pub fn is_closed(&self) -> bool {
		self.tx.read().is_none()
	}

	/// Returns the number of active subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.tx
			.read()
			.as_ref()
			.map_or(0, |tx| tx.receiver_count())
	}

	/// Returns the number of registered waiters.
	pub fn waiter_count(&self) -> usize {
		self.waiters.lock().len()
	}
}

/// One subscriber's event feed.
///
/// Unlike the raw receiver, lag is logged and skipped rather than surfaced,
/// so receive loops keep running.
pub struct EventStream<E: Clone + Send + 'static> {
	rx: broadcast::Receiver<E>,
}

impl<E: Clone + Send + 'static> EventStream<E> {
	pub(crate) fn new(rx: broadcast::Receiver<E>) -> Self {
		Self { rx }
	}

	/// Receives the next event.
	///
	/// Returns `None` once the session has closed and the buffer is drained.
	pub async fn recv(&mut self) -> Option<E> {
		loop {
			match self.rx.recv().await {
				Ok(event) => return Some(event),
				Err(broadcast::error::RecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped events");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Receives an event if one is already buffered.
	pub fn try_recv(&mut self) -> Option<E> {
		loop {
			match self.rx.try_recv() {
				Ok(event) => return Some(event),
				Err(broadcast::error::TryRecvError::Lagged(n)) => {
					tracing::warn!(dropped = n, "Event stream lagged, dropped events");
				}
				Err(
					broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
				) => return None,
			}
		}
	}

	/// Converts into a [`Stream`] ending when the session closes.
	pub fn into_stream(self) -> impl Stream<Item = E> + Send {
		futures_util::stream::unfold(self, |mut events| async move {
			events.recv().await.map(|event| (event, events))
		})
	}
}

/// Events of one kind, decoded into their typed payload.
///
/// Payloads that fail to decode are logged and skipped; they never end the
/// stream or affect other subscribers.
pub struct TypedEventStream<T: EventKind> {
	events: EventStream<Event>,
	_kind: PhantomData<fn() -> T>,
}

impl<T: EventKind> TypedEventStream<T> {
	pub(crate) fn new(events: EventStream<Event>) -> Self {
		Self {
			events,
			_kind: PhantomData,
		}
	}

	/// Receives the next decoded event.
	pub async fn recv(&mut self) -> Option<T> {
		loop {
			let event = self.events.recv().await?;
			if let Some(decoded) = decode_event::<T>(event) {
				return Some(decoded);
			}
		}
	}

	/// Receives a decoded event if one is already buffered.
	pub fn try_recv(&mut self) -> Option<T> {
		loop {
			let event = self.events.try_recv()?;
			if let Some(decoded) = decode_event::<T>(event) {
				return Some(decoded);
			}
		}
	}

	pub fn into_stream(self) -> impl Stream<Item = T> + Send {
		futures_util::stream::unfold(self, |mut events| async move {
			events.recv().await.map(|event| (event, events))
		})
	}
}

fn decode_event<T: EventKind>(event: Event) -> Option<T> {
	if event.method != T::METHOD {
		return None;
	}
	match serde_json::from_value::<T>(event.params_or_empty()) {
		Ok(decoded) => Some(decoded),
		Err(e) => {
			tracing::warn!(method = T::METHOD, error = %e, "Dropping undecodable event");
			None
		}
	}
}

/// Raw events belonging to one domain.
pub struct DomainEventStream {
	events: EventStream<Event>,
	domain: String,
}

impl DomainEventStream {
	pub(crate) fn new(events: EventStream<Event>, domain: impl Into<String>) -> Self {
		Self {
			events,
			domain: domain.into(),
		}
	}

	pub async fn recv(&mut self) -> Option<Event> {
		loop {
			let event = self.events.recv().await?;
			if event.domain() == self.domain {
				return Some(event);
			}
		}
	}

	pub fn domain(&self) -> &str {
		&self.domain
	}
}
