use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use canopy_core::{Guid, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bt::{Behavior, Status};
use crate::context::NodeContext;
use crate::error::SnapshotError;
use crate::event::{ChannelSubscription, EventChannel};
use crate::snapshot::decode_state;

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSucceed;

impl Behavior for AlwaysSucceed {
    fn name(&self) -> &str {
        "AlwaysSucceed"
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Success
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFail;

impl Behavior for AlwaysFail {
    fn name(&self) -> &str {
        "AlwaysFail"
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Failure
    }
}

/// Stays Running until something ends it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverComplete;

impl Behavior for NeverComplete {
    fn name(&self) -> &str {
        "NeverComplete"
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Running
    }
}

/// Succeeds after `seconds` of tick time.
#[derive(Debug, Clone)]
pub struct Wait {
    seconds: f32,
    elapsed: f32,
}

#[derive(Serialize, Deserialize)]
struct WaitState {
    elapsed: f32,
}

impl Wait {
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds,
            elapsed: 0.0,
        }
    }
}

impl Behavior for Wait {
    fn name(&self) -> &str {
        "Wait"
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        self.elapsed = 0.0;
        if self.seconds <= 0.0 {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.elapsed += ctx.dt_seconds();
        if self.elapsed >= self.seconds {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(WaitState {
            elapsed: self.elapsed,
        })
        .ok()
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), SnapshotError> {
        if let Some(state) = state {
            self.elapsed = decode_state::<WaitState>(ctx.guid(), state)?.elapsed;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

type Predicate = Box<dyn FnMut(&NodeContext<'_>) -> bool>;

/// Succeeds or fails on start according to a predicate.
pub struct Condition {
    predicate: Predicate,
}

impl Condition {
    pub fn new(predicate: impl FnMut(&NodeContext<'_>) -> bool + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// True when the boolean variable `guid` is set. Missing or non-boolean
    /// variables count as false.
    pub fn is_true(guid: Guid) -> Self {
        Self::new(move |ctx| ctx.get::<bool>(guid).unwrap_or(false))
    }

    /// True when variable `guid` currently holds `expected`.
    pub fn equals(guid: Guid, expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        Self::new(move |ctx| ctx.value(guid).is_ok_and(|value| value == expected))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}

impl Behavior for Condition {
    fn name(&self) -> &str {
        "Condition"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if (self.predicate)(ctx) {
            Status::Success
        } else {
            Status::Failure
        }
    }
}

/// Writes a value to a variable and succeeds; fails when the write fails.
#[derive(Debug, Clone)]
pub struct SetVariable {
    guid: Guid,
    value: Value,
}

impl SetVariable {
    pub fn new(guid: Guid, value: impl Into<Value>) -> Self {
        Self {
            guid,
            value: value.into(),
        }
    }
}

impl Behavior for SetVariable {
    fn name(&self) -> &str {
        "SetVariable"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        match ctx.set_value(self.guid, self.value.clone()) {
            Ok(_) => Status::Success,
            Err(err) => {
                warn!(node = %ctx.node(), guid = %self.guid, %err, "variable write failed");
                Status::Failure
            }
        }
    }
}

type EventFilter<T> = Rc<dyn Fn(&T) -> bool>;

/// Waits, subscribed to a channel, until a matching event arrives.
pub struct WaitForEvent<T: 'static> {
    channel: EventChannel<T>,
    filter: Option<EventFilter<T>>,
    fired: Rc<Cell<bool>>,
    subscription: Option<ChannelSubscription>,
}

#[derive(Serialize, Deserialize)]
struct EventState {
    fired: bool,
}

impl<T: 'static> WaitForEvent<T> {
    pub fn new(channel: &EventChannel<T>) -> Self {
        Self {
            channel: channel.clone(),
            filter: None,
            fired: Rc::new(Cell::new(false)),
            subscription: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Fn(&T) -> bool + 'static) -> Self {
        self.filter = Some(Rc::new(filter));
        self
    }

    fn listen(&mut self, ctx: &NodeContext<'_>) {
        let handle = ctx.awake_handle();
        let fired = self.fired.clone();
        let filter = self.filter.clone();
        self.subscription = Some(self.channel.subscribe(move |event: &T| {
            if filter.as_ref().map_or(true, |accept| accept(event)) {
                fired.set(true);
                handle.awake();
            }
        }));
    }
}

impl<T: 'static> Behavior for WaitForEvent<T> {
    fn name(&self) -> &str {
        "WaitForEvent"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.fired.set(false);
        self.listen(ctx);
        Status::Waiting
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if self.fired.get() {
            debug!(node = %ctx.node(), "event received");
            Status::Success
        } else {
            Status::Waiting
        }
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        self.subscription = None;
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(EventState {
            fired: self.fired.get(),
        })
        .ok()
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), SnapshotError> {
        let fired = match state {
            Some(state) => decode_state::<EventState>(ctx.guid(), state)?.fired,
            None => false,
        };
        self.listen(ctx);
        self.fired.set(fired);
        if fired {
            ctx.awake_handle().awake();
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.subscription = None;
        self.fired.set(false);
    }
}

/// Runs another module of the graph as a child.
///
/// The subgraph starts with this node, is ticked from this node's update, and
/// is ended with this node. Its root result becomes this node's result.
#[derive(Debug, Clone, Copy)]
pub struct RunSubgraph {
    module: usize,
}

impl RunSubgraph {
    pub fn new(module: usize) -> Self {
        Self { module }
    }

    pub fn module(&self) -> usize {
        self.module
    }
}

fn subgraph_result(root: Status) -> Status {
    if root.is_done() {
        root
    } else {
        Status::Failure
    }
}

impl Behavior for RunSubgraph {
    fn name(&self) -> &str {
        "RunSubgraph"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let Some(mut sub) = ctx.subgraph(self.module) else {
            warn!(module = self.module, "subgraph not available");
            return Status::Failure;
        };
        sub.start();
        if sub.is_running() {
            Status::Running
        } else {
            subgraph_result(sub.root_status())
        }
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let Some(mut sub) = ctx.subgraph(self.module) else {
            return Status::Failure;
        };
        sub.tick();
        if sub.is_running() {
            Status::Running
        } else {
            subgraph_result(sub.root_status())
        }
    }

    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {
        if let Some(mut sub) = ctx.subgraph(self.module) {
            if sub.is_running() {
                sub.end();
            }
        }
    }
}
