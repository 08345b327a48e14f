//! DevTools Runtime - transport, correlation, and event dispatch
//!
//! This crate provides the session core every protocol domain wrapper is
//! built on:
//!
//! - **Transport**: Text frames over WebSocket or a NUL-delimited pipe
//! - **Session**: Request id allocation, response correlation, and the dispatch loop
//! - **Events**: Multi-subscriber fan-out with typed and per-domain views
//! - **Domains**: One cached wrapper instance per domain per session
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   cdp-rs     │  Domain wrappers (Page, Animation, ...)
//! └──────┬───────┘
//!        │ implements Domain / Command / EventKind
//! ┌──────▼───────┐
//! │ cdp-runtime  │  This crate
//! │  ┌────────┐  │
//! │  │Session │  │  Correlation, dispatch, domain cache
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Events │  │  Broadcast fan-out
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket / pipe transport
//! │  └────────┘  │
//! └──────────────┘
//! ```
//!
//! The session only knows method strings and JSON values, so any domain,
//! present or future, can be called and listened to through it.

pub mod config;
pub mod domains;
pub mod error;
pub mod events;
pub mod pending;
pub mod session;
pub mod transport;

pub use cdp_protocol::{Command, Empty, Event, EventKind};
pub use config::SessionConfig;
pub use domains::{Domain, DomainCache};
pub use error::{CloseReason, Error, Result};
pub use events::{DomainEventStream, EventBus, EventStream, TypedEventStream};
pub use session::{Anomaly, Session, SessionLoop, SessionState};
pub use transport::{
	PipeTransport, TransportParts, TransportReceiver, TransportSender, WebSocketTransport,
};
