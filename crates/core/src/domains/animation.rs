//! `Animation` domain: inspect and control CSS and Web Animations.

use cdp_protocol::{Command, Empty, EventKind};
use cdp_runtime::{Domain, DomainEventStream, Result, Session, TypedEventStream};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Enable;

impl Command for Enable {
	const METHOD: &'static str = "Animation.enable";
	type Response = Empty;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Disable;

impl Command for Disable {
	const METHOD: &'static str = "Animation.disable";
	type Response = Empty;
}

#[derive(Debug, Clone, Serialize)]
pub struct GetCurrentTime {
	/// Animation id.
	pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCurrentTimeReturns {
	/// Current time of the animation, in milliseconds.
	pub current_time: f64,
}

impl Command for GetCurrentTime {
	const METHOD: &'static str = "Animation.getCurrentTime";
	type Response = GetCurrentTimeReturns;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GetPlaybackRate;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPlaybackRateReturns {
	pub playback_rate: f64,
}

impl Command for GetPlaybackRate {
	const METHOD: &'static str = "Animation.getPlaybackRate";
	type Response = GetPlaybackRateReturns;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPlaybackRate {
	pub playback_rate: f64,
}

impl Command for SetPlaybackRate {
	const METHOD: &'static str = "Animation.setPlaybackRate";
	type Response = Empty;
}

/// Snapshot of an animation as reported by `Animation.animationStarted`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationInfo {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub paused_state: bool,
	#[serde(default)]
	pub play_state: String,
	#[serde(default)]
	pub playback_rate: f64,
	#[serde(default)]
	pub start_time: f64,
	#[serde(default)]
	pub current_time: f64,
	/// `CSSTransition`, `CSSAnimation` or `WebAnimation`.
	#[serde(rename = "type", default)]
	pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimationCreated {
	pub id: String,
}

impl EventKind for AnimationCreated {
	const METHOD: &'static str = "Animation.animationCreated";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimationStarted {
	pub animation: AnimationInfo,
}

impl EventKind for AnimationStarted {
	const METHOD: &'static str = "Animation.animationStarted";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnimationCanceled {
	pub id: String,
}

impl EventKind for AnimationCanceled {
	const METHOD: &'static str = "Animation.animationCanceled";
}

/// Handle for the `Animation` domain of one session.
///
/// Obtain via [`CdpClient::animation`](crate::CdpClient::animation).
#[derive(Debug, Clone)]
pub struct Animation {
	session: Session,
}

impl Domain for Animation {
	const NAME: &'static str = "Animation";

	fn new(session: Session) -> Self {
		Self { session }
	}
}

impl Animation {
	/// Starts animation event delivery.
	pub async fn enable(&self) -> Result<()> {
		self.session.send(&Enable).await?;
		Ok(())
	}

	pub async fn disable(&self) -> Result<()> {
		self.session.send(&Disable).await?;
		Ok(())
	}

	/// Returns the current time of animation `id`, in milliseconds.
	pub async fn get_current_time(&self, id: &str) -> Result<f64> {
		let returns = self
			.session
			.send(&GetCurrentTime { id: id.to_string() })
			.await?;
		Ok(returns.current_time)
	}

	/// Returns the document's playback rate.
	pub async fn get_playback_rate(&self) -> Result<f64> {
		Ok(self.session.send(&GetPlaybackRate).await?.playback_rate)
	}

	pub async fn set_playback_rate(&self, playback_rate: f64) -> Result<()> {
		self.session.send(&SetPlaybackRate { playback_rate }).await?;
		Ok(())
	}

	pub fn on_animation_created(&self) -> TypedEventStream<AnimationCreated> {
		self.session.listen()
	}

	pub fn on_animation_started(&self) -> TypedEventStream<AnimationStarted> {
		self.session.listen()
	}

	pub fn on_animation_canceled(&self) -> TypedEventStream<AnimationCanceled> {
		self.session.listen()
	}

	/// Every event of this domain, untyped.
	pub fn events(&self) -> DomainEventStream {
		self.session.domain_events(<Self as Domain>::NAME)
	}
}
