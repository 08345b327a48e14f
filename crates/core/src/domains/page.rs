//! `Page` domain: navigation, lifecycle events and screenshots.

use cdp_protocol::{Binary, Command, Empty, EventKind};
use cdp_runtime::{Domain, DomainEventStream, Result, Session, TypedEventStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Enable;

impl Command for Enable {
	const METHOD: &'static str = "Page.enable";
	type Response = Empty;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Disable;

impl Command for Disable {
	const METHOD: &'static str = "Page.disable";
	type Response = Empty;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigate {
	pub url: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub referrer: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub frame_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateReturns {
	pub frame_id: String,
	/// Absent for same-document navigations.
	#[serde(default)]
	pub loader_id: Option<String>,
	/// Set when the navigation failed, e.g. `net::ERR_NAME_NOT_RESOLVED`.
	#[serde(default)]
	pub error_text: Option<String>,
}

impl Command for Navigate {
	const METHOD: &'static str = "Page.navigate";
	type Response = NavigateReturns;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reload {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ignore_cache: Option<bool>,
}

impl Command for Reload {
	const METHOD: &'static str = "Page.reload";
	type Response = Empty;
}

/// Image encoding for [`Page::capture_screenshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
	#[default]
	Png,
	Jpeg,
	Webp,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureScreenshot {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub format: Option<ScreenshotFormat>,
	/// Compression quality 0..=100, jpeg and webp only.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quality: Option<u8>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub capture_beyond_viewport: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureScreenshotReturns {
	pub data: Binary,
}

impl Command for CaptureScreenshot {
	const METHOD: &'static str = "Page.captureScreenshot";
	type Response = CaptureScreenshotReturns;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadEventFired {
	pub timestamp: f64,
}

impl EventKind for LoadEventFired {
	const METHOD: &'static str = "Page.loadEventFired";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DomContentEventFired {
	pub timestamp: f64,
}

impl EventKind for DomContentEventFired {
	const METHOD: &'static str = "Page.domContentEventFired";
}

/// The `frame` object is passed through as sent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameNavigated {
	pub frame: Value,
	#[serde(rename = "type", default)]
	pub navigation_type: Option<String>,
}

impl FrameNavigated {
	pub fn url(&self) -> Option<&str> {
		self.frame.get("url")?.as_str()
	}
}

impl EventKind for FrameNavigated {
	const METHOD: &'static str = "Page.frameNavigated";
}

/// Handle for the `Page` domain of one session.
///
/// Obtain via [`CdpClient::page`](crate::CdpClient::page).
#[derive(Debug, Clone)]
pub struct Page {
	session: Session,
}

impl Domain for Page {
	const NAME: &'static str = "Page";

	fn new(session: Session) -> Self {
		Self { session }
	}
}

impl Page {
	/// Starts page lifecycle event delivery.
	pub async fn enable(&self) -> Result<()> {
		self.session.send(&Enable).await?;
		Ok(())
	}

	pub async fn disable(&self) -> Result<()> {
		self.session.send(&Disable).await?;
		Ok(())
	}

	/// Navigates the main frame to `url`.
	///
	/// A failed navigation is not a command error: check
	/// [`NavigateReturns::error_text`].
	pub async fn navigate(&self, url: &str) -> Result<NavigateReturns> {
		tracing::debug!(url, "Navigating");
		self.session
			.send(&Navigate {
				url: url.to_string(),
				referrer: None,
				frame_id: None,
			})
			.await
	}

	pub async fn reload(&self) -> Result<()> {
		self.session.send(&Reload::default()).await?;
		Ok(())
	}

	/// Captures the viewport and returns the decoded image bytes.
	pub async fn capture_screenshot(&self, format: ScreenshotFormat) -> Result<Vec<u8>> {
		let returns = self
			.session
			.send(&CaptureScreenshot {
				format: Some(format),
				..Default::default()
			})
			.await?;
		Ok(returns.data.into_bytes())
	}

	pub fn on_load_event_fired(&self) -> TypedEventStream<LoadEventFired> {
		self.session.listen()
	}

	pub fn on_dom_content_event_fired(&self) -> TypedEventStream<DomContentEventFired> {
		self.session.listen()
	}

	pub fn on_frame_navigated(&self) -> TypedEventStream<FrameNavigated> {
		self.session.listen()
	}

	pub fn events(&self) -> DomainEventStream {
		self.session.domain_events(<Self as Domain>::NAME)
	}
}

#[cfg(test)]
mod tests {
	use cdp_protocol::encode_params;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_screenshot_params() {
		let params = CaptureScreenshot {
			format: Some(ScreenshotFormat::Jpeg),
			quality: Some(80),
			..Default::default()
		};
		assert_eq!(
			encode_params(&params).unwrap(),
			Some(json!({"format": "jpeg", "quality": 80}))
		);
	}

	#[test]
	fn test_navigate_returns_error_text() {
		let returns: NavigateReturns = serde_json::from_value(json!({
			"frameId": "F1",
			"errorText": "net::ERR_NAME_NOT_RESOLVED"
		}))
		.unwrap();
		assert_eq!(returns.loader_id, None);
		assert_eq!(
			returns.error_text.as_deref(),
			Some("net::ERR_NAME_NOT_RESOLVED")
		);
	}

	#[test]
	fn test_frame_navigated_keeps_raw_frame() {
		let event: FrameNavigated = serde_json::from_value(json!({
			"frame": {"id": "F1", "url": "https://example.com/", "securityOrigin": "x"},
			"type": "Navigation"
		}))
		.unwrap();
		assert_eq!(event.url(), Some("https://example.com/"));
		assert_eq!(event.frame["securityOrigin"], "x");
	}
}
