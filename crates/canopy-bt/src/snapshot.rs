use canopy_core::Guid;
use serde::{Deserialize, Serialize};

use crate::bt::Status;
use crate::error::SnapshotError;

/// Run state of a whole graph; structure is not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub tick: u64,
    pub modules: Vec<ModuleSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub index: usize,
    /// Active nodes in start order.
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub guid: Guid,
    pub status: Status,
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Decode a node's saved state, tagging failures with its guid.
pub fn decode_state<T: serde::de::DeserializeOwned>(
    guid: Guid,
    state: &serde_json::Value,
) -> Result<T, SnapshotError> {
    T::deserialize(state).map_err(|source| SnapshotError::State { guid, source })
}
