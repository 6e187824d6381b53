//! Identity, tick context, typed variables and blackboards for the canopy behavior engine.
//!
//! Everything here is single-threaded: variables share storage through `Rc`, and
//! a graph instance is expected to be driven from one thread.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod blackboard;
pub mod cast;
pub mod config;
pub mod error;
pub mod guid;
pub mod registry;
pub mod shared;
pub mod tick;
pub mod value;
pub mod variable;

pub use blackboard::Blackboard;
pub use cast::CastAccess;
pub use config::{EngineConfig, TickConfig, TraceConfig};
pub use error::{BlackboardError, ConversionError, VariableError};
pub use guid::Guid;
pub use registry::{TypeRegistry, VariableDef};
pub use shared::{SharedBlackboard, MAX_SHARED_DEPTH};
pub use tick::TickContext;
pub use value::{coerce, ComponentRef, EntityId, Value, ValueType, VariableValue};
pub use variable::{ListenerId, Subscription, TypedVariable, Variable};
