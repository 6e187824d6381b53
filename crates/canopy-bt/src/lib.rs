//! Tick-driven behavior graph runtime built on `canopy-core`.
//!
//! A [`Graph`] owns one root [`GraphModule`] plus subgraph modules. Each module
//! is an arena of nodes wired through [`NodeKind`]; node logic lives in
//! [`Behavior`] implementations, a library of which is in [`nodes`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod bt;
pub mod builder;
pub mod context;
pub mod error;
pub mod event;
pub mod graph;
pub mod module;
pub mod nodes;
pub mod snapshot;

pub use bt::{Behavior, NodeCategory, NodeId, NodeKind, Status};
pub use builder::ModuleBuilder;
pub use context::{NodeContext, Subgraph};
pub use error::{EngineError, GraphError, SnapshotError};
pub use event::{AwakeHandle, ChannelSubscription, EventChannel};
pub use graph::Graph;
pub use module::{GraphModule, StatusChange};
pub use snapshot::{decode_state, GraphSnapshot, ModuleSnapshot, NodeSnapshot};
