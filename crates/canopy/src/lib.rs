//! Umbrella crate that re-exports the `canopy-*` building blocks.
//!
//! `core` holds identity, variables and blackboards; `bt` the graph runtime and
//! node library; `tools` lifecycle tracing.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use canopy_core as core;

#[cfg(feature = "tools")]
#[cfg_attr(docsrs, doc(cfg(feature = "tools")))]
pub use canopy_tools as tools;

#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub use canopy_bt as bt;

/// The types most hosts need to build and drive a graph.
#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub mod prelude {
    pub use canopy_bt::nodes::*;
    pub use canopy_bt::{
        Behavior, EventChannel, Graph, GraphModule, ModuleBuilder, NodeContext, NodeId, Status,
    };
    pub use canopy_core::{Blackboard, EngineConfig, Guid, TickConfig, TickContext, Value};
}
