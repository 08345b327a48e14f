use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use super::{TransportParts, TransportReceiver, TransportSender};
use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Text frames over a WebSocket, the standard DevTools transport.
pub struct WebSocketTransport;

impl WebSocketTransport {
	/// Connects to a debugger URL such as
	/// `ws://127.0.0.1:9222/devtools/browser/<id>`.
	pub async fn connect(url: &str, config: &SessionConfig) -> Result<TransportParts> {
		let mut ws_config = WebSocketConfig::default();
		if let Some(max) = config.max_message_size {
			ws_config.max_message_size = Some(max);
			ws_config.max_frame_size = Some(max);
		}

		tracing::debug!(url, "Connecting to DevTools endpoint");
		let (stream, _response) =
			tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false)
				.await
				.map_err(|e| Error::ConnectionFailed(format!("{url}: {e}")))?;
		tracing::info!(url, "Connected to DevTools endpoint");

		Ok(Self::from_stream(stream))
	}

	/// Splits an already established WebSocket into transport halves.
	pub fn from_stream<S>(stream: WebSocketStream<S>) -> TransportParts
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let (sink, stream) = stream.split();
		TransportParts::new(WebSocketSender { sink }, WebSocketReceiver { stream })
	}
}

pub struct WebSocketSender<S> {
	sink: SplitSink<WebSocketStream<S>, Message>,
}

impl<S> TransportSender for WebSocketSender<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send,
{
	fn send(&mut self, text: String) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.sink
				.send(Message::Text(text))
				.await
				.map_err(|e| Error::Transport(e.to_string()))
		})
	}

	fn close(&mut self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			match self.sink.close().await {
				Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
				Err(e) => Err(Error::Transport(e.to_string())),
			}
		})
	}
}

pub struct WebSocketReceiver<S> {
	stream: SplitStream<WebSocketStream<S>>,
}

impl<S> TransportReceiver for WebSocketReceiver<S>
where
	S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
	fn run(self: Box<Self>, sink: mpsc::UnboundedSender<String>) -> BoxFuture<'static, Result<()>> {
		let mut stream = self.stream;
		Box::pin(async move {
			while let Some(frame) = stream.next().await {
				let text = match frame {
					Ok(Message::Text(text)) => text,
					Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
						Ok(text) => text,
						Err(e) => {
							tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame");
							continue;
						}
					},
					Ok(Message::Close(frame)) => {
						tracing::debug!(?frame, "WebSocket closed by remote end");
						return Ok(());
					}
					Ok(_) => continue,
					Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Ok(()),
					Err(e) => return Err(Error::Transport(e.to_string())),
				};

				tracing::trace!(len = text.len(), "Received WebSocket frame");
				if sink.send(text).is_err() {
					return Ok(());
				}
			}
			Ok(())
		})
	}
}
