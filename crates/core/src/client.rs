use std::sync::Arc;

use cdp_runtime::{CloseReason, Result, Session, SessionConfig, TransportParts};

use crate::domains::{Accessibility, Animation, Page};

/// Entry point: one DevTools connection and its domain wrappers.
///
/// Clones share the session. Domain accessors return the same instance for
/// the lifetime of the session.
#[derive(Debug, Clone)]
pub struct CdpClient {
	session: Session,
}

impl CdpClient {
	/// Connects to a `ws://` or `wss://` debugger URL with default settings.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		Self::connect_with_config(ws_url, SessionConfig::default()).await
	}

	pub async fn connect_with_config(ws_url: &str, config: SessionConfig) -> Result<Self> {
		tracing::info!(url = ws_url, "Connecting to DevTools endpoint");
		let session = Session::connect(ws_url, config).await?;
		Ok(Self { session })
	}

	/// Runs a client over an already established transport, e.g.
	/// [`PipeTransport`](cdp_runtime::PipeTransport) on a browser's debugging pipe.
	pub fn from_transport(parts: TransportParts, config: SessionConfig) -> Self {
		Self {
			session: Session::spawn(parts, config),
		}
	}

	pub fn from_session(session: Session) -> Self {
		Self { session }
	}

	/// The underlying session, for untyped commands and raw event streams.
	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn accessibility(&self) -> Arc<Accessibility> {
		self.session.domain()
	}

	pub fn animation(&self) -> Arc<Animation> {
		self.session.domain()
	}

	pub fn page(&self) -> Arc<Page> {
		self.session.domain()
	}

	/// Closes the connection and waits for the transport to shut down.
	/// Pending commands fail with [`CloseReason::Closed`].
	pub async fn close(&self) {
		self.session.close().await;
	}

	pub fn is_closed(&self) -> bool {
		self.session.is_closed()
	}

	/// Resolves once the connection has closed, for whatever reason.
	pub async fn closed(&self) -> CloseReason {
		self.session.closed().await
	}
}
