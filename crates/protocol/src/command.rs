//! Traits binding typed payloads to protocol method names.
//!
//! Generated domain code implements [`Command`] for every parameter struct and
//! [`EventKind`] for every event payload; the runtime only ever sees the method
//! string and a JSON value.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A command's typed parameters.
///
/// Unit structs serialize to `null` and therefore go out without a `params`
/// field; structs with fields always send an object.
pub trait Command: Serialize {
	/// Fully qualified method, e.g. `Animation.getCurrentTime`.
	const METHOD: &'static str;

	/// Typed return. Use [`Empty`] for commands without one.
	type Response: DeserializeOwned;
}

/// A typed event payload.
pub trait EventKind: DeserializeOwned + Clone + Send + 'static {
	/// Fully qualified event name, e.g. `Animation.animationCreated`.
	const METHOD: &'static str;
}

/// Result of a command that returns nothing.
///
/// Decodes from an absent result, `null` or any object, so void commands never
/// fail on whatever the remote end chooses to send back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Empty {}

impl<'de> Deserialize<'de> for Empty {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		IgnoredAny::deserialize(deserializer)?;
		Ok(Empty {})
	}
}

/// Encodes command parameters, mapping `null` to "no params".
pub fn encode_params<P: Serialize>(params: &P) -> serde_json::Result<Option<Value>> {
	match serde_json::to_value(params)? {
		Value::Null => Ok(None),
		value => Ok(Some(value)),
	}
}

/// Returns the `<Domain>` part of a `<Domain>.<name>` method.
///
/// A method without a dot is its own domain.
pub fn domain_of(method: &str) -> &str {
	method.split_once('.').map_or(method, |(domain, _)| domain)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[derive(Serialize)]
	struct Enable;

	#[derive(Serialize)]
	#[serde(rename_all = "camelCase")]
	struct SetRate {
		playback_rate: f64,
	}

	#[test]
	fn unit_params_are_omitted() {
		assert_eq!(encode_params(&Enable).unwrap(), None);
		assert_eq!(encode_params(&()).unwrap(), None);
	}

	#[test]
	fn struct_params_are_objects() {
		assert_eq!(
			encode_params(&SetRate { playback_rate: 0.5 }).unwrap(),
			Some(json!({"playbackRate": 0.5}))
		);
	}

	#[test]
	fn empty_accepts_any_void_result() {
		assert_eq!(serde_json::from_value::<Empty>(Value::Null).unwrap(), Empty {});
		assert_eq!(serde_json::from_value::<Empty>(json!({})).unwrap(), Empty {});
		assert_eq!(
			serde_json::from_value::<Empty>(json!({"ignored": true})).unwrap(),
			Empty {}
		);
	}

	#[test]
	fn domain_prefix() {
		assert_eq!(domain_of("Page.navigate"), "Page");
		assert_eq!(domain_of("Target.attachedToTarget"), "Target");
		assert_eq!(domain_of("weird"), "weird");
	}
}
