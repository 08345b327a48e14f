//! Wire types for the Chrome DevTools Protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with a
//! debugging endpoint: request/response/event envelopes, the classifier that
//! sorts an inbound frame into one of them, and the traits that bind a typed
//! command or event to its `Domain.method` name.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **Schema-agnostic**: Any domain, present or future, is addressed by its method string
//! - **Stable**: Changes only when the wire protocol changes
//!
//! Session handling (id allocation, correlation, event fan-out) lives in `cdp-runtime`.

pub mod binary;
pub mod command;
pub mod message;

pub use binary::Binary;
pub use command::{Command, Empty, EventKind, domain_of, encode_params};
pub use message::{ErrorPayload, Event, Message, Request, Response};
