use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bt::{Behavior, Status};
use crate::context::NodeContext;
use crate::error::SnapshotError;
use crate::snapshot::decode_state;

/// Runs its child once, or succeeds directly when it has none.
fn release(ctx: &mut NodeContext<'_>) -> Status {
    let Some(child) = ctx.child() else {
        return Status::Success;
    };
    let status = ctx.start(child);
    if status.is_done() {
        status
    } else {
        Status::Waiting
    }
}

fn follow(ctx: &NodeContext<'_>) -> Status {
    match ctx.child() {
        Some(child) => ctx.outcome(child).unwrap_or(Status::Waiting),
        None => Status::Success,
    }
}

/// Holds until every parent has reached it, then runs its child once.
#[derive(Debug, Default)]
pub struct WaitForAll {
    arrived: usize,
    released: bool,
}

#[derive(Serialize, Deserialize)]
struct JoinState {
    arrived: usize,
    released: bool,
}

impl WaitForAll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrived(&self) -> usize {
        self.arrived
    }

    fn check(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let expected = ctx.parent_count().max(1);
        debug!(node = %ctx.node(), arrived = self.arrived, expected, "join arrival");
        if self.released {
            return ctx.status(ctx.node());
        }
        if self.arrived < expected {
            return Status::Waiting;
        }
        self.released = true;
        release(ctx)
    }
}

impl Behavior for WaitForAll {
    fn name(&self) -> &str {
        "WaitForAll"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.arrived = 1;
        self.released = false;
        self.check(ctx)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if self.released {
            follow(ctx)
        } else {
            Status::Waiting
        }
    }

    fn on_rejoin(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.arrived += 1;
        self.check(ctx)
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(JoinState {
            arrived: self.arrived,
            released: self.released,
        })
        .ok()
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), SnapshotError> {
        if let Some(state) = state {
            let state = decode_state::<JoinState>(ctx.guid(), state)?;
            self.arrived = state.arrived;
            self.released = state.released;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.arrived = 0;
        self.released = false;
    }
}

/// Runs its child as soon as the first parent reaches it; later arrivals
/// share that run.
#[derive(Debug, Default)]
pub struct WaitForAny;

impl WaitForAny {
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for WaitForAny {
    fn name(&self) -> &str {
        "WaitForAny"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        release(ctx)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        follow(ctx)
    }

    fn on_rejoin(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        ctx.status(ctx.node())
    }
}
