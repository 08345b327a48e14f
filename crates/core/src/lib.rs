//! Typed Chrome DevTools Protocol client.
//!
//! [`CdpClient`] owns one [`Session`] and hands out cached domain wrappers.
//! Each wrapper is a thin typed layer over [`Session::send`]; anything not
//! covered by a wrapper can go through [`Session::call_command`] directly.
//!
//! ```ignore
//! let client = CdpClient::connect("ws://127.0.0.1:9222/devtools/page/ABC").await?;
//! client.animation().enable().await?;
//! let mut created = client.animation().on_animation_created();
//! while let Some(event) = created.recv().await {
//!     let time = client.animation().get_current_time(&event.id).await?;
//!     println!("{} at {time}ms", event.id);
//! }
//! ```

mod client;
pub mod domains;

pub use cdp_protocol::{Binary, Command, Empty, Event, EventKind};
pub use cdp_runtime::{
	Anomaly, CloseReason, Domain, DomainEventStream, Error, EventStream, PipeTransport, Result,
	Session, SessionConfig, SessionState, TransportParts, TypedEventStream, WebSocketTransport,
};
pub use client::CdpClient;
pub use domains::{Accessibility, Animation, Page};
