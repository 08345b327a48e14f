//! Typed wrappers for individual protocol domains.
//!
//! Every domain module has the same shape: one parameter struct per command
//! implementing [`Command`](cdp_protocol::Command), one payload struct per
//! event implementing [`EventKind`](cdp_protocol::EventKind), and a wrapper
//! type holding the session.

pub mod accessibility;
pub mod animation;
pub mod page;

pub use accessibility::Accessibility;
pub use animation::Animation;
pub use page::Page;
