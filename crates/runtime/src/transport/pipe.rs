use futures_util::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use super::{TransportParts, TransportReceiver, TransportSender};
use crate::error::{Error, Result};

/// Frame terminator used by Chrome's `--remote-debugging-pipe`.
const FRAME_DELIMITER: u8 = 0;

/// NUL-delimited JSON over a pair of byte streams.
///
/// Chrome reads commands from fd 3 and writes responses to fd 4 when launched
/// with `--remote-debugging-pipe`; every message is terminated by a `\0`.
pub struct PipeTransport;

impl PipeTransport {
	/// Wraps a writer (towards the browser) and a reader (from the browser).
	pub fn new<W, R>(writer: W, reader: R) -> TransportParts
	where
		W: AsyncWrite + Unpin + Send + 'static,
		R: AsyncRead + Unpin + Send + 'static,
	{
		TransportParts::new(PipeSender { writer }, PipeReceiver {
			reader: BufReader::new(reader),
		})
	}
}

pub struct PipeSender<W> {
	writer: W,
}

impl<W> TransportSender for PipeSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	fn send(&mut self, text: String) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.writer.write_all(text.as_bytes()).await?;
			self.writer.write_all(&[FRAME_DELIMITER]).await?;
			self.writer.flush().await?;
			Ok(())
		})
	}

	fn close(&mut self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.writer.shutdown().await?;
			Ok(())
		})
	}
}

pub struct PipeReceiver<R> {
	reader: BufReader<R>,
}

impl<R> TransportReceiver for PipeReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	fn run(self: Box<Self>, sink: mpsc::UnboundedSender<String>) -> BoxFuture<'static, Result<()>> {
		let mut reader = self.reader;
		Box::pin(async move {
			loop {
				let mut frame = Vec::new();
				let read = reader.read_until(FRAME_DELIMITER, &mut frame).await?;
				if read == 0 {
					tracing::debug!("Pipe closed by remote end");
					return Ok(());
				}

				if frame.pop() != Some(FRAME_DELIMITER) {
					return Err(Error::Transport(format!(
						"unterminated frame at end of stream ({read} bytes)"
					)));
				}

				let text = match String::from_utf8(frame) {
					Ok(text) => text,
					Err(e) => {
						tracing::warn!(error = %e, "Dropping non-UTF-8 pipe frame");
						continue;
					}
				};

				tracing::trace!(len = text.len(), "Received pipe frame");
				if sink.send(text).is_err() {
					return Ok(());
				}
			}
		})
	}
}
