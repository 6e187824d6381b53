use canopy_core::Guid;
use thiserror::Error;

use crate::bt::NodeId;

/// A malformed graph rejected at build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("root node {0} does not exist")]
    MissingRoot(NodeId),

    #[error("node {parent} references missing child {child}")]
    MissingChild { parent: NodeId, child: NodeId },

    #[error("node {node} has {parents} parents but only joins may have more than one")]
    MultipleParents { node: NodeId, parents: usize },

    #[error("root node {0} is the child of another node")]
    RootHasParent(NodeId),

    #[error("node {0} is part of a cycle")]
    Cycle(NodeId),

    #[error("guid {0} is used by more than one node")]
    DuplicateGuid(Guid),
}

/// Runtime misuse of a module. None of these leave the module inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("branch termination re-entered while ending {0}")]
    ReentrantEndBranch(Guid),

    #[error("no node {0} in this module")]
    UnknownNode(NodeId),

    #[error("graph still running after {ticks} ticks")]
    Stalled { ticks: u64 },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot has {found} modules, graph has {expected}")]
    ModuleCount { expected: usize, found: usize },

    #[error("snapshot of module {found} cannot restore module {expected}")]
    ModuleIndex { expected: usize, found: usize },

    #[error("module {module} has no node with guid {guid}")]
    UnknownNode { module: usize, guid: Guid },

    #[error("invalid state for node {guid}: {source}")]
    State {
        guid: Guid,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}
