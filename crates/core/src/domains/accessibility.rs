//! `Accessibility` domain: the browser's accessibility tree.

use cdp_protocol::{Command, Empty, EventKind};
use cdp_runtime::{Domain, DomainEventStream, Result, Session, TypedEventStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Enable;

impl Command for Enable {
	const METHOD: &'static str = "Accessibility.enable";
	type Response = Empty;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Disable;

impl Command for Disable {
	const METHOD: &'static str = "Accessibility.disable";
	type Response = Empty;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFullAxTree {
	/// Maximum depth of the returned tree; the full tree when omitted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub depth: Option<u32>,
	/// Frame to fetch the tree for; the root frame when omitted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub frame_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetFullAxTreeReturns {
	pub nodes: Vec<AxNode>,
}

impl Command for GetFullAxTree {
	const METHOD: &'static str = "Accessibility.getFullAXTree";
	type Response = GetFullAxTreeReturns;
}

/// A computed accessibility property value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxValue {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub value: Option<Value>,
}

/// A node in the accessibility tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxNode {
	pub node_id: String,
	/// Whether the node is hidden from assistive technology.
	#[serde(default)]
	pub ignored: bool,
	#[serde(default)]
	pub role: Option<AxValue>,
	#[serde(default)]
	pub name: Option<AxValue>,
	#[serde(default)]
	pub description: Option<AxValue>,
	#[serde(default)]
	pub value: Option<AxValue>,
	#[serde(default)]
	pub parent_id: Option<String>,
	#[serde(default)]
	pub child_ids: Vec<String>,
	#[serde(rename = "backendDOMNodeId", default)]
	pub backend_dom_node_id: Option<i64>,
	#[serde(default)]
	pub frame_id: Option<String>,
}

impl AxNode {
	/// The role as a string, e.g. `"button"`.
	pub fn role_name(&self) -> Option<&str> {
		self.role.as_ref()?.value.as_ref()?.as_str()
	}
}

/// Fired when the tree of a document finished loading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadComplete {
	pub root: AxNode,
}

impl EventKind for LoadComplete {
	const METHOD: &'static str = "Accessibility.loadComplete";
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodesUpdated {
	pub nodes: Vec<AxNode>,
}

impl EventKind for NodesUpdated {
	const METHOD: &'static str = "Accessibility.nodesUpdated";
}

/// Handle for the `Accessibility` domain of one session.
///
/// Obtain via [`CdpClient::accessibility`](crate::CdpClient::accessibility).
#[derive(Debug, Clone)]
pub struct Accessibility {
	session: Session,
}

impl Domain for Accessibility {
	const NAME: &'static str = "Accessibility";

	fn new(session: Session) -> Self {
		Self { session }
	}
}

impl Accessibility {
	/// Enables the domain. Node ids stay stable across calls while enabled.
	pub async fn enable(&self) -> Result<()> {
		self.session.send(&Enable).await?;
		Ok(())
	}

	pub async fn disable(&self) -> Result<()> {
		self.session.send(&Disable).await?;
		Ok(())
	}

	/// Fetches the accessibility tree of the root frame, limited to `depth`
	/// levels when given.
	pub async fn get_full_ax_tree(&self, depth: Option<u32>) -> Result<Vec<AxNode>> {
		let returns = self
			.session
			.send(&GetFullAxTree {
				depth,
				frame_id: None,
			})
			.await?;
		Ok(returns.nodes)
	}

	pub fn on_load_complete(&self) -> TypedEventStream<LoadComplete> {
		self.session.listen()
	}

	pub fn on_nodes_updated(&self) -> TypedEventStream<NodesUpdated> {
		self.session.listen()
	}

	pub fn events(&self) -> DomainEventStream {
		self.session.domain_events(<Self as Domain>::NAME)
	}
}
