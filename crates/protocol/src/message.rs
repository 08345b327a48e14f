//! Request, response and event envelopes.
//!
//! Outbound traffic is always a [`Request`]. Inbound frames are sorted by
//! [`Message::parse`] using only the top-level keys:
//!
//! | keys present                       | classified as                  |
//! |------------------------------------|--------------------------------|
//! | `id` + `result` or `error`         | [`Message::Response`]          |
//! | `id` alone                         | void [`Message::Response`]     |
//! | `id` + unreadable `result`/`error` | [`Message::MalformedResponse`] |
//! | `method` without `id`              | [`Message::Event`]             |
//! | anything else                      | [`Message::Unknown`]           |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Command request sent to the remote end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
	/// Correlation id, unique among in-flight requests of a session.
	pub id: u64,
	/// Fully qualified method, e.g. `Page.navigate`.
	pub method: String,
	/// Parameters; omitted from the wire when the command takes none.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

impl Request {
	pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
		Self {
			id,
			method: method.into(),
			params,
		}
	}

	/// Serializes the request into a single JSON text frame.
	pub fn to_text(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}
}

/// Protocol error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// JSON-RPC style error code (e.g. `-32601` for an unknown method).
	pub code: i64,
	/// Human-readable message from the remote end.
	pub message: String,
	/// Optional extra detail some commands attach.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Response to a previously sent [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	/// Id of the request this answers.
	pub id: u64,
	/// Success payload. Absent for void commands.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Failure payload (mutually exclusive with `result`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

impl Response {
	/// Collapses the envelope into the caller-facing outcome.
	pub fn into_result(self) -> Result<Option<Value>, ErrorPayload> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.result),
		}
	}
}

/// Unsolicited notification pushed by the remote end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	/// `<Domain>.<eventName>`.
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

impl Event {
	pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
		Self {
			method: method.into(),
			params,
		}
	}

	/// Domain part of the method name.
	pub fn domain(&self) -> &str {
		crate::command::domain_of(&self.method)
	}

	/// Parameters, substituting an empty object when the event carried none.
	pub fn params_or_empty(&self) -> Value {
		self.params
			.clone()
			.unwrap_or_else(|| Value::Object(Map::new()))
	}
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
	Response(Response),
	Event(Event),
	/// Response with a usable id but a body that cannot be understood. The
	/// call waiting on `id` still has to be completed.
	MalformedResponse { id: u64, reason: String },
	/// Frame matching neither shape; carries the reason it was rejected.
	Unknown(String),
}

impl Message {
	/// Classifies a raw text frame.
	///
	/// Never fails: frames that cannot be understood come back as
	/// [`Message::Unknown`] so the caller can report them and move on.
	pub fn parse(text: &str) -> Self {
		match serde_json::from_str::<Value>(text) {
			Ok(value) => Self::classify(value),
			Err(e) => Message::Unknown(format!("invalid JSON: {e}")),
		}
	}

	/// Classifies an already decoded JSON value.
	pub fn classify(value: Value) -> Self {
		let Value::Object(mut map) = value else {
			return Message::Unknown("frame is not a JSON object".to_string());
		};

		let id = match map.remove("id") {
			None | Some(Value::Null) => None,
			Some(Value::Number(n)) => match n.as_u64() {
				Some(id) => Some(id),
				None => return Message::Unknown(format!("invalid id: {n}")),
			},
			Some(other) => return Message::Unknown(format!("invalid id: {other}")),
		};

		let method = match map.remove("method") {
			None | Some(Value::Null) => None,
			Some(Value::String(method)) => Some(method),
			Some(other) => return Message::Unknown(format!("invalid method: {other}")),
		};

		let result = non_null(map.remove("result"));
		let error = non_null(map.remove("error"));

		match (id, method) {
			(Some(id), method) => match (result, error) {
				(Some(_), Some(_)) => Message::MalformedResponse {
					id,
					reason: format!("response {id} carries both result and error"),
				},
				(None, Some(error)) => match serde_json::from_value::<ErrorPayload>(error) {
					Ok(error) => Message::Response(Response {
						id,
						result: None,
						error: Some(error),
					}),
					Err(e) => Message::MalformedResponse {
						id,
						reason: format!("malformed error in response {id}: {e}"),
					},
				},
				(result, None) if result.is_some() || method.is_none() => {
					Message::Response(Response {
						id,
						result,
						error: None,
					})
				}
				(_, None) => Message::Unknown(format!(
					"unexpected request from remote end: id={id}, method={}",
					method.unwrap_or_default()
				)),
			},
			(None, Some(method)) => Message::Event(Event {
				method,
				params: non_null(map.remove("params")),
			}),
			(None, None) => Message::Unknown("frame has neither id nor method".to_string()),
		}
	}
}

fn non_null(value: Option<Value>) -> Option<Value> {
	value.filter(|v| !v.is_null())
}
