//! Scripted browser end of a debugging pipe.

use cdp::{CdpClient, PipeTransport, SessionConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tracing_subscriber::EnvFilter;

pub struct FakeBrowser {
	reader: BufReader<DuplexStream>,
	writer: DuplexStream,
}

impl FakeBrowser {
	pub async fn next_frame(&mut self) -> Option<String> {
		let mut frame = Vec::new();
		let read = self.reader.read_until(0, &mut frame).await.unwrap();
		if read == 0 {
			return None;
		}
		frame.pop();
		Some(String::from_utf8(frame).unwrap())
	}

	/// Reads the next request and checks its method.
	pub async fn expect(&mut self, method: &str) -> Value {
		let frame = self.next_frame().await.expect("connection closed");
		let request: Value = serde_json::from_str(&frame).unwrap();
		assert_eq!(request["method"], method, "unexpected request {frame}");
		request
	}

	pub async fn send(&mut self, message: Value) {
		self.writer
			.write_all(message.to_string().as_bytes())
			.await
			.unwrap();
		self.writer.write_all(&[0]).await.unwrap();
		self.writer.flush().await.unwrap();
	}

	pub async fn reply(&mut self, request: &Value, result: Value) {
		self.send(json!({"id": request["id"], "result": result}))
			.await;
	}

	pub async fn event(&mut self, method: &str, params: Value) {
		self.send(json!({"method": method, "params": params})).await;
	}

	pub fn disconnect(self) {
		drop(self);
	}
}

pub fn connect() -> (CdpClient, FakeBrowser) {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();

	let (browser_read, client_write) = tokio::io::duplex(256 * 1024);
	let (client_read, browser_write) = tokio::io::duplex(256 * 1024);

	let client = CdpClient::from_transport(
		PipeTransport::new(client_write, client_read),
		SessionConfig::default(),
	);
	let browser = FakeBrowser {
		reader: BufReader::new(browser_read),
		writer: browser_write,
	};
	(client, browser)
}
