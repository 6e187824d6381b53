//! Built-in node library.

mod action;
mod composite;
mod join;
mod modifier;

pub use action::{
    AlwaysFail, AlwaysSucceed, Condition, NeverComplete, RunSubgraph, SetVariable, Wait,
    WaitForEvent,
};
pub use composite::{Parallel, ParallelPolicy, Selector, Sequence};
pub use join::{WaitForAll, WaitForAny};
pub use modifier::{ForceSuccess, Inverter, Repeat, Root, Timeout, TriggerMode, TriggerOnEvent};
