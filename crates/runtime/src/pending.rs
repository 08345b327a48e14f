//! Pending call table: id allocation and request/response correlation.
//!
//! Every in-flight command owns one slot keyed by its request id. The slot is
//! resolved exactly once: by the dispatch loop when the matching response
//! arrives, or by [`PendingCalls::close_all`] when the session terminates.
//! Dropping the [`ResponseFuture`] before either happens releases the slot and
//! remembers the id, so a late response is recognized and discarded. Only the
//! most recent [`MAX_CANCELLED`] such ids are remembered; a response for an
//! older one is treated as unknown.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use cdp_protocol::ErrorPayload;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{CloseReason, Error, Result};

type Outcome = Result<Option<Value>>;

/// Number of cancelled ids kept for recognizing late responses.
pub const MAX_CANCELLED: usize = 1024;

struct PendingCall {
	method: String,
	tx: oneshot::Sender<Outcome>,
}

struct PendingState {
	next_id: u64,
	calls: HashMap<u64, PendingCall>,
	cancelled: HashSet<u64>,
	/// Cancellation order, oldest first. May hold ids already taken out of
	/// `cancelled` by a late response.
	cancelled_order: VecDeque<u64>,
	closed: Option<CloseReason>,
}

impl PendingState {
	fn remember_cancelled(&mut self, id: u64) {
		while self.cancelled_order.len() >= MAX_CANCELLED {
			if let Some(oldest) = self.cancelled_order.pop_front() {
				self.cancelled.remove(&oldest);
			}
		}
		self.cancelled_order.push_back(id);
		self.cancelled.insert(id);
	}
}

/// What happened to an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// Handed to the waiting caller.
	Delivered,
	/// The caller had already given up; response discarded.
	Cancelled,
	/// No call with this id is or was pending.
	Unknown,
}

/// Mutex-guarded table of in-flight commands.
///
/// The lock is held only while the table is touched, never across an await.
pub struct PendingCalls {
	state: Mutex<PendingState>,
}

impl Default for PendingCalls {
	fn default() -> Self {
		Self::new()
	}
}

impl PendingCalls {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(PendingState {
				next_id: 1,
				calls: HashMap::new(),
				cancelled: HashSet::new(),
				cancelled_order: VecDeque::new(),
				closed: None,
			}),
		}
	}

	/// Allocates an id and registers a slot for it.
	///
	/// Ids still pending or awaiting a late response are skipped. Fails once the
	/// table is closed; the check and the insert share one critical section.
	pub fn register(self: &Arc<Self>, method: &str) -> Result<ResponseFuture> {
		let mut state = self.state.lock();
		if let Some(reason) = &state.closed {
			return Err(Error::SessionClosed(reason.clone()));
		}

		let id = loop {
			let candidate = state.next_id;
			state.next_id = state.next_id.wrapping_add(1).max(1);
			if !state.calls.contains_key(&candidate) && !state.cancelled.contains(&candidate) {
				break candidate;
			}
		};

		let (tx, rx) = oneshot::channel();
		state.calls.insert(id, PendingCall {
			method: method.to_string(),
			tx,
		});

		Ok(ResponseFuture {
			rx,
			guard: CancelGuard {
				id,
				calls: Arc::clone(self),
				completed: false,
			},
		})
	}

	/// Routes a response to the call waiting on `id`.
	pub fn resolve(
		&self,
		id: u64,
		outcome: std::result::Result<Option<Value>, ErrorPayload>,
	) -> Resolution {
		self.complete(id, |method| {
			outcome.map_err(|error| Error::command(method, error))
		})
	}

	/// Fails the call waiting on `id` because its response was unreadable.
	pub fn fail(&self, id: u64, reason: &str) -> Resolution {
		self.complete(id, |method| {
			Err(Error::Protocol {
				method: method.to_string(),
				reason: reason.to_string(),
			})
		})
	}

	fn complete(&self, id: u64, outcome: impl FnOnce(&str) -> Outcome) -> Resolution {
		let call = {
			let mut state = self.state.lock();
			match state.calls.remove(&id) {
				Some(call) => call,
				None if state.cancelled.remove(&id) => return Resolution::Cancelled,
				None => return Resolution::Unknown,
			}
		};

		let outcome = outcome(&call.method);
		if call.tx.send(outcome).is_err() {
			tracing::debug!(id, method = %call.method, "Caller went away before its response");
		}
		Resolution::Delivered
	}

	/// Releases a slot whose caller stopped waiting.
	fn cancel(&self, id: u64) {
		let mut state = self.state.lock();
		if let Some(call) = state.calls.remove(&id) {
			if state.closed.is_none() {
				state.remember_cancelled(id);
			}
			tracing::debug!(id, method = %call.method, "Released cancelled call");
		}
	}

	/// Fails every pending call and rejects new ones.
	///
	/// The first reason recorded wins; later calls only drain. Returns the
	/// number of calls failed.
	pub fn close_all(&self, reason: CloseReason) -> usize {
		let (reason, drained): (CloseReason, Vec<PendingCall>) = {
			let mut state = self.state.lock();
			let reason = state.closed.get_or_insert(reason).clone();
			state.cancelled.clear();
			state.cancelled_order.clear();
			(reason, state.calls.drain().map(|(_, call)| call).collect())
		};

		let count = drained.len();
		for call in drained {
			let _ = call.tx.send(Err(Error::SessionClosed(reason.clone())));
		}
		count
	}

	/// Number of calls currently awaiting a response.
	pub fn len(&self) -> usize {
		self.state.lock().calls.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Reason the table was closed, if it was.
	pub fn closed_reason(&self) -> Option<CloseReason> {
		self.state.lock().closed.clone()
	}
}

/// RAII guard releasing the slot when a [`ResponseFuture`] is dropped early.
struct CancelGuard {
	id: u64,
	calls: Arc<PendingCalls>,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.completed {
			self.calls.cancel(self.id);
		}
	}
}

/// Future resolving to the response for one request id.
pub struct ResponseFuture {
	rx: oneshot::Receiver<Outcome>,
	guard: CancelGuard,
}

impl ResponseFuture {
	/// The request id this future waits on.
	pub fn id(&self) -> u64 {
		self.guard.id
	}
}

impl Future for ResponseFuture {
	type Output = Outcome;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				Poll::Ready(result.unwrap_or_else(|_| {
					let reason = self
						.guard
						.calls
						.closed_reason()
						.unwrap_or(CloseReason::Disconnected);
					Err(Error::SessionClosed(reason))
				}))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}
