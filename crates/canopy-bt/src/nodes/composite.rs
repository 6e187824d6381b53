use serde::{Deserialize, Serialize};

use crate::bt::{Behavior, Status};
use crate::context::NodeContext;

/// Runs children in order until one fails.
#[derive(Debug, Default)]
pub struct Sequence {
    index: usize,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start children from `self.index` until one does not succeed immediately.
    fn advance(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        loop {
            let Some(child) = ctx.children().get(self.index).copied() else {
                return Status::Success;
            };
            match ctx.start(child) {
                Status::Success => self.index += 1,
                Status::Failure => return Status::Failure,
                _ => return Status::Waiting,
            }
        }
    }
}

impl Behavior for Sequence {
    fn name(&self) -> &str {
        "Sequence"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.index = 0;
        self.advance(ctx)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let Some(&current) = ctx.children().get(self.index) else {
            return Status::Success;
        };
        match ctx.outcome(current) {
            None => Status::Waiting,
            Some(Status::Failure) => Status::Failure,
            Some(_) => {
                self.index += 1;
                self.advance(ctx)
            }
        }
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "index": self.index }))
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), crate::SnapshotError> {
        if let Some(state) = state {
            self.index = crate::snapshot::decode_state::<Cursor>(ctx.guid(), state)?.index;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.index = 0;
    }
}

/// Runs children in order until one succeeds.
#[derive(Debug, Default)]
pub struct Selector {
    index: usize,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        loop {
            let Some(child) = ctx.children().get(self.index).copied() else {
                return Status::Failure;
            };
            match ctx.start(child) {
                Status::Failure => self.index += 1,
                Status::Success => return Status::Success,
                _ => return Status::Waiting,
            }
        }
    }
}

impl Behavior for Selector {
    fn name(&self) -> &str {
        "Selector"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.index = 0;
        self.advance(ctx)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let Some(&current) = ctx.children().get(self.index) else {
            return Status::Failure;
        };
        match ctx.outcome(current) {
            None => Status::Waiting,
            Some(Status::Success) => Status::Success,
            Some(_) => {
                self.index += 1;
                self.advance(ctx)
            }
        }
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "index": self.index }))
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), crate::SnapshotError> {
        if let Some(state) = state {
            self.index = crate::snapshot::decode_state::<Cursor>(ctx.guid(), state)?.index;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.index = 0;
    }
}

#[derive(Deserialize)]
struct Cursor {
    index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParallelPolicy {
    /// Succeed when every child succeeds; fail on the first failure.
    #[default]
    All,
    /// Succeed on the first success; fail when every child fails.
    Any,
}

/// Starts every child at once and settles according to its policy.
///
/// Children still active when the parallel settles are ended with it.
#[derive(Debug, Default)]
pub struct Parallel {
    policy: ParallelPolicy,
}

impl Parallel {
    pub fn new(policy: ParallelPolicy) -> Self {
        Self { policy }
    }

    pub fn all() -> Self {
        Self::new(ParallelPolicy::All)
    }

    pub fn any() -> Self {
        Self::new(ParallelPolicy::Any)
    }

    fn settle(&self, ctx: &NodeContext<'_>) -> Status {
        let (decisive, fallback) = match self.policy {
            ParallelPolicy::All => (Status::Failure, Status::Success),
            ParallelPolicy::Any => (Status::Success, Status::Failure),
        };
        let mut pending = false;
        for &child in ctx.children() {
            match ctx.outcome(child) {
                Some(status) if status == decisive => return decisive,
                Some(_) => {}
                None => pending = true,
            }
        }
        if pending {
            Status::Waiting
        } else {
            fallback
        }
    }
}

impl Behavior for Parallel {
    fn name(&self) -> &str {
        "Parallel"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let decisive = match self.policy {
            ParallelPolicy::All => Status::Failure,
            ParallelPolicy::Any => Status::Success,
        };
        for i in 0..ctx.children().len() {
            let child = ctx.children()[i];
            if ctx.start(child) == decisive {
                return decisive;
            }
        }
        self.settle(ctx)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.settle(ctx)
    }
}
