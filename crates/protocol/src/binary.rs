//! Base64 binary payloads.
//!
//! The protocol ships bytes (screenshots, response bodies, PDF data) as
//! standard base64 strings inside JSON. [`Binary`] decodes them at the
//! domain-wrapper layer; the session core never looks inside.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bytes carried as a base64 string on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binary(pub Vec<u8>);

impl Binary {
	pub fn into_bytes(self) -> Vec<u8> {
		self.0
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}

impl From<Vec<u8>> for Binary {
	fn from(bytes: Vec<u8>) -> Self {
		Binary(bytes)
	}
}

impl Serialize for Binary {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&STANDARD.encode(&self.0))
	}
}

impl<'de> Deserialize<'de> for Binary {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		STANDARD
			.decode(encoded.as_bytes())
			.map(Binary)
			.map_err(serde::de::Error::custom)
	}
}
