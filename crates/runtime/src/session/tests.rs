use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tracing_subscriber::EnvFilter;

use super::*;
use crate::transport::PipeTransport;

/// Browser side of a pipe connection, driven by the test.
struct FakeBrowser {
	reader: BufReader<DuplexStream>,
	writer: DuplexStream,
}

impl FakeBrowser {
	async fn next_frame(&mut self) -> Option<String> {
		let mut frame = Vec::new();
		let read = self.reader.read_until(0, &mut frame).await.unwrap();
		if read == 0 {
			return None;
		}
		assert_eq!(frame.pop(), Some(0));
		Some(String::from_utf8(frame).unwrap())
	}

	async fn next_request(&mut self) -> Value {
		let frame = self.next_frame().await.expect("connection closed");
		serde_json::from_str(&frame).unwrap()
	}

	async fn send_text(&mut self, text: &str) {
		self.writer.write_all(text.as_bytes()).await.unwrap();
		self.writer.write_all(&[0]).await.unwrap();
		self.writer.flush().await.unwrap();
	}

	async fn send(&mut self, message: Value) {
		self.send_text(&message.to_string()).await;
	}

	async fn reply(&mut self, id: &Value, result: Value) {
		self.send(json!({"id": id, "result": result})).await;
	}
}

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

fn start(config: SessionConfig) -> (Session, FakeBrowser) {
	init_tracing();
	let (browser_read, client_write) = tokio::io::duplex(64 * 1024);
	let (client_read, browser_write) = tokio::io::duplex(64 * 1024);

	let session = Session::spawn(PipeTransport::new(client_write, client_read), config);
	let browser = FakeBrowser {
		reader: BufReader::new(browser_read),
		writer: browser_write,
	};
	(session, browser)
}

fn spawn_call(
	session: &Session,
	method: &'static str,
	params: Option<Value>,
) -> tokio::task::JoinHandle<Result<Option<Value>>> {
	let session = session.clone();
	tokio::spawn(async move { session.call_command(method, params).await })
}

#[tokio::test]
async fn test_void_command_envelope() {
	let (session, mut browser) = start(SessionConfig::default());

	let call = spawn_call(&session, "Accessibility.enable", None);
	let frame = browser.next_frame().await.unwrap();
	assert_eq!(frame, r#"{"id":1,"method":"Accessibility.enable"}"#);

	browser.send_text(r#"{"id":1,"result":{}}"#).await;
	let result = call.await.unwrap().unwrap();
	assert_eq!(result, Some(json!({})));
	assert_eq!(session.pending_calls(), 0);
}

#[tokio::test]
async fn test_command_with_params_and_result() {
	let (session, mut browser) = start(SessionConfig::default());

	let call = spawn_call(
		&session,
		"Animation.getCurrentTime",
		Some(json!({"id": "anim-1"})),
	);
	let request = browser.next_request().await;
	assert_eq!(request["method"], "Animation.getCurrentTime");
	assert_eq!(request["params"], json!({"id": "anim-1"}));

	browser
		.reply(&request["id"], json!({"currentTime": 12.5}))
		.await;
	assert_eq!(
		call.await.unwrap().unwrap(),
		Some(json!({"currentTime": 12.5}))
	);
}

#[tokio::test]
async fn test_reordered_responses_reach_their_callers() {
	let (session, mut browser) = start(SessionConfig::default());

	let methods = ["Page.enable", "Network.enable", "Runtime.enable", "DOM.enable"];
	let calls: Vec<_> = methods
		.iter()
		.map(|method| spawn_call(&session, method, None))
		.collect();

	let mut requests = Vec::new();
	for _ in &methods {
		requests.push(browser.next_request().await);
	}

	let mut ids: Vec<u64> = requests.iter().map(|r| r["id"].as_u64().unwrap()).collect();
	ids.sort_unstable();
	ids.dedup();
	assert_eq!(ids.len(), methods.len(), "ids must be unique");

	for request in requests.iter().rev() {
		browser
			.reply(&request["id"], json!({"echo": request["method"]}))
			.await;
	}

	for (method, call) in methods.iter().zip(calls) {
		let result = call.await.unwrap().unwrap().unwrap();
		assert_eq!(result["echo"], *method);
	}
}

#[tokio::test]
async fn test_unknown_response_id_is_reported_and_ignored() {
	let (session, mut browser) = start(SessionConfig::default());
	let mut anomalies = session.anomalies();

	let call_a = spawn_call(&session, "Page.enable", None);
	let request_a = browser.next_request().await;

	browser.reply(&json!(999), json!({})).await;
	assert_eq!(
		anomalies.recv().await,
		Some(Anomaly::UnknownResponse { id: 999 })
	);

	let call_b = spawn_call(&session, "Page.reload", None);
	let request_b = browser.next_request().await;

	browser.reply(&request_b["id"], json!({"b": true})).await;
	browser.reply(&request_a["id"], json!({"a": true})).await;

	assert_eq!(call_a.await.unwrap().unwrap(), Some(json!({"a": true})));
	assert_eq!(call_b.await.unwrap().unwrap(), Some(json!({"b": true})));
	assert!(!session.is_closed());
}

#[tokio::test]
async fn test_malformed_frames_are_reported() {
	let (session, mut browser) = start(SessionConfig::default());
	let mut anomalies = session.anomalies();

	browser.send_text("not json").await;
	browser.send_text(r#"{"params": {}}"#).await;

	for _ in 0..2 {
		match anomalies.recv().await {
			Some(Anomaly::Malformed { .. }) => {}
			other => panic!("Expected malformed anomaly, got {other:?}"),
		}
	}

	let call = spawn_call(&session, "Page.enable", None);
	let request = browser.next_request().await;
	browser.reply(&request["id"], json!({})).await;
	assert!(call.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_malformed_response_fails_only_its_caller() {
	let (session, mut browser) = start(SessionConfig::default());
	let mut anomalies = session.anomalies();

	let navigate = spawn_call(
		&session,
		"Page.navigate",
		Some(json!({"url": "about:blank"})),
	);
	let request = browser.next_request().await;
	browser
		.send(json!({"id": request["id"], "error": {"code": "bad", "message": "x"}}))
		.await;

	let err = navigate.await.unwrap().unwrap_err();
	assert!(err.is_protocol_error(), "got {err:?}");
	match err {
		Error::Protocol { method, .. } => assert_eq!(method, "Page.navigate"),
		other => panic!("Expected protocol error, got {other:?}"),
	}
	assert_eq!(session.pending_calls(), 0);
	match anomalies.recv().await {
		Some(Anomaly::Malformed { reason }) => assert!(reason.contains("malformed error")),
		other => panic!("Expected malformed anomaly, got {other:?}"),
	}

	let reload = spawn_call(&session, "Page.reload", None);
	let request = browser.next_request().await;
	browser
		.send(json!({"id": request["id"], "result": {}, "error": {"code": 1, "message": "x"}}))
		.await;
	assert!(reload.await.unwrap().unwrap_err().is_protocol_error());

	let enable = spawn_call(&session, "Page.enable", None);
	let request = browser.next_request().await;
	browser.reply(&request["id"], json!({})).await;
	assert!(enable.await.unwrap().is_ok());
	assert!(!session.is_closed());
}

#[tokio::test]
async fn test_command_error_does_not_affect_session() {
	let (session, mut browser) = start(SessionConfig::default());

	let call = spawn_call(&session, "Foo.bar", None);
	let request = browser.next_request().await;
	browser
		.send(json!({
			"id": request["id"],
			"error": {"code": -32601, "message": "'Foo.bar' wasn't found"}
		}))
		.await;

	let err = call.await.unwrap().unwrap_err();
	assert!(err.is_command_error());
	assert_eq!(err.code(), Some(-32601));
	match err {
		Error::Command {
			method, message, ..
		} => {
			assert_eq!(method, "Foo.bar");
			assert_eq!(message, "'Foo.bar' wasn't found");
		}
		other => panic!("Expected command error, got {other:?}"),
	}

	let call = spawn_call(&session, "Page.enable", None);
	let request = browser.next_request().await;
	browser.reply(&request["id"], json!({})).await;
	assert!(call.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_typed_send_decode_failure_is_local() {
	#[derive(Debug, Deserialize)]
	#[serde(rename_all = "camelCase")]
	struct CurrentTime {
		#[allow(dead_code)]
		current_time: f64,
	}

	let (session, mut browser) = start(SessionConfig::default());

	let caller = session.clone();
	let call = tokio::spawn(async move {
		caller
			.send_raw::<_, CurrentTime>("Animation.getCurrentTime", json!({"id": "x"}))
			.await
	});
	let request = browser.next_request().await;
	browser
		.reply(&request["id"], json!({"currentTime": "soon"}))
		.await;

	let err = call.await.unwrap().unwrap_err();
	assert!(err.is_decode_error(), "got {err:?}");
	assert!(!session.is_closed());
}

#[tokio::test]
async fn test_events_fan_out_in_order() {
	let (session, mut browser) = start(SessionConfig::default());

	let mut first = session.events();
	let mut second = session.events();

	for n in 0..5 {
		browser
			.send(json!({"method": "Network.dataReceived", "params": {"seq": n}}))
			.await;
	}

	for stream in [&mut first, &mut second] {
		for n in 0..5 {
			let event = stream.recv().await.unwrap();
			assert_eq!(event.method, "Network.dataReceived");
			assert_eq!(event.params.unwrap()["seq"], n);
		}
	}
}

#[tokio::test]
async fn test_unsolicited_event_leaves_pending_calls_alone() {
	#[derive(Debug, Clone, PartialEq, Deserialize)]
	struct AnimationCreated {
		id: String,
	}

	impl EventKind for AnimationCreated {
		const METHOD: &'static str = "Animation.animationCreated";
	}

	let (session, mut browser) = start(SessionConfig::default());
	let mut created = session.listen::<AnimationCreated>();

	let call = spawn_call(&session, "Animation.enable", None);
	let request = browser.next_request().await;

	browser
		.send_text(r#"{"method":"Animation.animationCreated","params":{"id":"a1"}}"#)
		.await;

	assert_eq!(
		created.recv().await,
		Some(AnimationCreated {
			id: "a1".to_string()
		})
	);
	assert_eq!(session.pending_calls(), 1);

	browser.reply(&request["id"], json!({})).await;
	assert!(call.await.unwrap().is_ok());
	assert!(created.try_recv().is_none());
}

#[tokio::test]
async fn test_wait_for_event() {
	let (session, mut browser) = start(SessionConfig::default());

	let waiter = {
		let session = session.clone();
		tokio::spawn(async move {
			session
				.wait_for_event("Page.loadEventFired", Duration::from_secs(5))
				.await
		})
	};
	tokio::task::yield_now().await;

	browser.send(json!({"method": "Page.frameNavigated", "params": {}})).await;
	browser
		.send(json!({"method": "Page.loadEventFired", "params": {"timestamp": 7.0}}))
		.await;

	let event = waiter.await.unwrap().unwrap();
	assert_eq!(event.params, Some(json!({"timestamp": 7.0})));

	let err = session
		.wait_for_event("Page.loadEventFired", Duration::from_millis(20))
		.await
		.unwrap_err();
	assert!(err.is_timeout());
}

#[tokio::test]
async fn test_disconnect_fails_all_pending_calls() {
	let (session, mut browser) = start(SessionConfig::default());
	let mut events = session.events();

	let calls: Vec<_> = ["A.a", "A.b", "A.c"]
		.into_iter()
		.map(|method| spawn_call(&session, method, None))
		.collect();
	for _ in 0..3 {
		browser.next_request().await;
	}
	assert_eq!(session.pending_calls(), 3);

	let FakeBrowser { reader, writer } = browser;
	drop(writer);

	for call in calls {
		let err = call.await.unwrap().unwrap_err();
		assert_eq!(err.close_reason(), Some(&CloseReason::Disconnected));
	}

	assert_eq!(session.closed().await, CloseReason::Disconnected);
	assert_eq!(
		session.state(),
		SessionState::Closed(CloseReason::Disconnected)
	);
	assert!(events.recv().await.is_none());

	let err = session.call_command("Page.enable", None).await.unwrap_err();
	assert!(err.is_session_closed());
	assert_eq!(session.pending_calls(), 0);
	drop(reader);
}

#[tokio::test]
async fn test_transport_failure_terminates_session() {
	let (session, mut browser) = start(SessionConfig::default());

	let call = spawn_call(&session, "Page.enable", None);
	browser.next_request().await;

	browser.writer.write_all(br#"{"id":1,"res"#).await.unwrap();
	drop(browser.writer);

	let err = call.await.unwrap().unwrap_err();
	match err.close_reason() {
		Some(CloseReason::TransportFailed(reason)) => {
			assert!(reason.contains("unterminated frame"))
		}
		other => panic!("Expected transport failure, got {other:?}"),
	}
}

#[tokio::test]
async fn test_write_failure_terminates_session() {
	let (session, mut browser) = start(SessionConfig::default());

	let pending = spawn_call(&session, "Page.enable", None);
	browser.next_request().await;
	assert_eq!(session.pending_calls(), 1);

	let FakeBrowser { reader, writer } = browser;
	drop(reader);

	let failed = spawn_call(&session, "Page.reload", None);

	for call in [pending, failed] {
		let err = call.await.unwrap().unwrap_err();
		match err.close_reason() {
			Some(CloseReason::TransportFailed(_)) => {}
			other => panic!("Expected transport failure, got {other:?}"),
		}
	}
	assert!(matches!(session.closed().await, CloseReason::TransportFailed(_)));
	assert_eq!(session.pending_calls(), 0);
	drop(writer);
}

#[tokio::test]
async fn test_close_without_running_loop_returns() {
	init_tracing();
	let (_browser_read, client_write) = tokio::io::duplex(1024);
	let (client_read, _browser_write) = tokio::io::duplex(1024);
	let (session, _session_loop) = Session::new(
		PipeTransport::new(client_write, client_read),
		SessionConfig::default(),
	);

	session.close().await;
	assert_eq!(session.state(), SessionState::Closed(CloseReason::Closed));
}

#[tokio::test]
async fn test_close_rejects_calls_and_closes_transport() {
	let (session, mut browser) = start(SessionConfig::default());

	let call = spawn_call(&session, "Page.enable", None);
	browser.next_request().await;

	session.close().await;
	session.close().await;

	let err = call.await.unwrap().unwrap_err();
	assert_eq!(err.close_reason(), Some(&CloseReason::Closed));
	assert!(session.is_closed());

	let err = session.call_command("Page.enable", None).await.unwrap_err();
	assert_eq!(err.close_reason(), Some(&CloseReason::Closed));

	assert_eq!(browser.next_frame().await, None);
}

#[tokio::test]
async fn test_timeout_releases_slot_and_ignores_late_response() {
	let (session, mut browser) = start(SessionConfig::default());
	let mut anomalies = session.anomalies();

	let err = session
		.call_command_with_timeout("Page.reload", None, Duration::from_millis(50))
		.await
		.unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(session.pending_calls(), 0);

	let late = browser.next_request().await;
	browser.reply(&late["id"], json!({})).await;

	let call = spawn_call(&session, "Page.enable", None);
	let request = browser.next_request().await;
	assert_ne!(request["id"], late["id"]);
	browser.reply(&request["id"], json!({})).await;
	assert!(call.await.unwrap().is_ok());

	assert!(anomalies.try_recv().is_none());
}

#[tokio::test]
async fn test_configured_command_timeout() {
	let (session, mut browser) =
		start(SessionConfig::new().command_timeout(Duration::from_millis(30)));

	let err = session
		.call_command("Page.navigate", Some(json!({"url": "about:blank"})))
		.await
		.unwrap_err();
	match err {
		Error::Timeout { method, after } => {
			assert_eq!(method, "Page.navigate");
			assert_eq!(after, Duration::from_millis(30));
		}
		other => panic!("Expected timeout, got {other:?}"),
	}
	browser.next_request().await;
}

#[tokio::test]
async fn test_domain_instances_are_cached_per_session() {
	struct Probe {
		session: Session,
	}

	impl Domain for Probe {
		const NAME: &'static str = "Probe";

		fn new(session: Session) -> Self {
			Self { session }
		}
	}

	let (session, _browser) = start(SessionConfig::default());

	let first = session.domain::<Probe>();
	let second = session.clone().domain::<Probe>();
	assert!(Arc::ptr_eq(&first, &second));
	assert!(!first.session.is_closed());

	let (other_session, _other_browser) = start(SessionConfig::default());
	let foreign = other_session.domain::<Probe>();
	assert!(!Arc::ptr_eq(&first, &foreign));

	session.close().await;
	let after_close_a = session.domain::<Probe>();
	let after_close_b = session.domain::<Probe>();
	assert!(!Arc::ptr_eq(&after_close_a, &after_close_b));
	assert!(after_close_a.session.is_closed());
}
