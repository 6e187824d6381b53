use core::fmt;

use serde::{Deserialize, Serialize};

use crate::context::NodeContext;
use crate::error::SnapshotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Uninitialized,
    Running,
    Success,
    Failure,
    Waiting,
}

impl Status {
    /// Success or Failure: the activation is over.
    pub fn is_done(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    /// Running or Waiting: the node persists across ticks.
    pub fn is_active(self) -> bool {
        matches!(self, Status::Running | Status::Waiting)
    }

    pub fn code(self) -> u64 {
        match self {
            Status::Uninitialized => 0,
            Status::Running => 1,
            Status::Success => 2,
            Status::Failure => 3,
            Status::Waiting => 4,
        }
    }

    pub fn invert(self) -> Status {
        match self {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            other => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Uninitialized => "uninitialized",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Waiting => "waiting",
        };
        f.write_str(s)
    }
}

/// Index of a node inside its [`GraphModule`](crate::GraphModule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Refer to a node by position, e.g. before it has been added.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Action,
    Composite,
    Modifier,
    Join,
}

/// Structural shape of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Action,
    Composite(Vec<NodeId>),
    Modifier(Option<NodeId>),
    /// The only kind that may be reached from more than one parent.
    Join(Option<NodeId>),
}

impl NodeKind {
    pub fn category(&self) -> NodeCategory {
        match self {
            NodeKind::Action => NodeCategory::Action,
            NodeKind::Composite(_) => NodeCategory::Composite,
            NodeKind::Modifier(_) => NodeCategory::Modifier,
            NodeKind::Join(_) => NodeCategory::Join,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            NodeKind::Action => &[],
            NodeKind::Composite(children) => children,
            NodeKind::Modifier(child) | NodeKind::Join(child) => child.as_slice(),
        }
    }
}

/// Lifecycle hooks of a node.
///
/// Hooks receive a [`NodeContext`] through which they start and end children,
/// read variables and obtain awake handles. Returning Success or Failure from
/// `on_start`, `on_update` or `on_rejoin` ends the node's branch in the same
/// call; returning Waiting parks the node until it is awakened.
pub trait Behavior: 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status;

    /// Called once per tick while the node is Running.
    fn on_update(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Running
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// A join reached again by another parent while it is running.
    fn on_rejoin(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Waiting
    }

    /// Transient state that a structural copy of the node would lose.
    fn save_state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Re-establish state after a snapshot restore. Called for every restored
    /// node, with `state` as saved (if any).
    fn restore_state(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        _state: Option<&serde_json::Value>,
    ) -> Result<(), SnapshotError> {
        Ok(())
    }

    /// Drop per-activation state; called by a module reset.
    fn reset(&mut self) {}
}
