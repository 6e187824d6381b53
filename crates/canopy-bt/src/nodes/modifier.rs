use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bt::{Behavior, Status};
use crate::context::NodeContext;
use crate::error::SnapshotError;
use crate::event::{ChannelSubscription, EventChannel};
use crate::snapshot::decode_state;

/// Start the only child (or read its outcome) and report it once finished.
///
/// `None` while the child is still active. A missing child fails.
fn follow_child(ctx: &mut NodeContext<'_>, start: bool) -> Option<Status> {
    let Some(child) = ctx.child() else {
        warn!(node = %ctx.node(), "modifier has no child");
        return Some(Status::Failure);
    };
    if start {
        let status = ctx.start(child);
        return status.is_done().then_some(status);
    }
    ctx.outcome(child)
}

/// Entry point of a module.
#[derive(Debug, Default)]
pub struct Root {
    repeat: bool,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the child every time it finishes.
    pub fn repeating() -> Self {
        Self { repeat: true }
    }

    fn settle(&self, outcome: Option<Status>) -> Status {
        match outcome {
            None => Status::Waiting,
            Some(_) if self.repeat => Status::Running,
            Some(status) => status,
        }
    }
}

impl Behavior for Root {
    fn name(&self) -> &str {
        "Root"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if ctx.child().is_none() {
            warn!(node = %ctx.node(), "root has no child");
            return Status::Failure;
        }
        let outcome = follow_child(ctx, true);
        self.settle(outcome)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let Some(outcome) = follow_child(ctx, false) else {
            return Status::Waiting;
        };
        if self.repeat && ctx.child().is_some() {
            let restarted = follow_child(ctx, true);
            return self.settle(restarted);
        }
        outcome
    }
}

/// Runs its child a fixed number of times (or forever), one run per tick at
/// most, then succeeds.
#[derive(Debug, Default)]
pub struct Repeat {
    count: Option<u32>,
    done: u32,
}

#[derive(Serialize, Deserialize)]
struct RepeatState {
    done: u32,
}

impl Repeat {
    pub fn times(count: u32) -> Self {
        Self {
            count: Some(count),
            done: 0,
        }
    }

    pub fn forever() -> Self {
        Self {
            count: None,
            done: 0,
        }
    }

    pub fn completed(&self) -> u32 {
        self.done
    }

    fn run_child(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        match follow_child(ctx, true) {
            Some(_) if ctx.child().is_none() => Status::Failure,
            // Count it on the next update.
            Some(_) => Status::Running,
            None => Status::Waiting,
        }
    }
}

impl Behavior for Repeat {
    fn name(&self) -> &str {
        "Repeat"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.done = 0;
        if self.count == Some(0) {
            return Status::Success;
        }
        self.run_child(ctx)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if follow_child(ctx, false).is_none() {
            return Status::Waiting;
        }
        self.done += 1;
        if self.count.is_some_and(|count| self.done >= count) {
            return Status::Success;
        }
        self.run_child(ctx)
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(RepeatState { done: self.done }).ok()
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), SnapshotError> {
        if let Some(state) = state {
            self.done = decode_state::<RepeatState>(ctx.guid(), state)?.done;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.done = 0;
    }
}

/// Swaps Success and Failure of its child.
#[derive(Debug, Default)]
pub struct Inverter;

impl Behavior for Inverter {
    fn name(&self) -> &str {
        "Inverter"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        follow_child(ctx, true).map_or(Status::Waiting, Status::invert)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        follow_child(ctx, false).map_or(Status::Waiting, Status::invert)
    }
}

/// Succeeds whenever its child finishes.
#[derive(Debug, Default)]
pub struct ForceSuccess;

impl Behavior for ForceSuccess {
    fn name(&self) -> &str {
        "ForceSuccess"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        follow_child(ctx, true).map_or(Status::Waiting, |_| Status::Success)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        follow_child(ctx, false).map_or(Status::Waiting, |_| Status::Success)
    }
}

/// Ends its child and fails once `seconds` of tick time have elapsed.
///
/// The start tick does not count; each later update adds that tick's `dt`.
#[derive(Debug)]
pub struct Timeout {
    seconds: f32,
    elapsed: f32,
}

#[derive(Serialize, Deserialize)]
struct ElapsedState {
    elapsed: f32,
}

impl Timeout {
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds,
            elapsed: 0.0,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl Behavior for Timeout {
    fn name(&self) -> &str {
        "Timeout"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.elapsed = 0.0;
        follow_child(ctx, true).unwrap_or(Status::Running)
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if let Some(status) = follow_child(ctx, false) {
            return status;
        }
        self.elapsed += ctx.dt_seconds();
        if self.elapsed < self.seconds {
            return Status::Running;
        }
        debug!(node = %ctx.node(), elapsed = self.elapsed, "timeout expired");
        if let Some(child) = ctx.child() {
            // A failure here was already reported by the module.
            let _ = ctx.end_branch(child);
        }
        Status::Failure
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(ElapsedState {
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
            self.elapsed = decode_state::<ElapsedState>(ctx.guid(), state)?.elapsed;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

/// How [`TriggerOnEvent`] reacts to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerMode {
    /// Start the child; events arriving while it is active are ignored.
    #[default]
    Default,
    /// End an active child first, then start it again in the same update.
    Restart,
    /// Start the child on the first event only, then finish with its result.
    Once,
}

type EventFilter<T> = Rc<dyn Fn(&T) -> bool>;

/// Waits for events on a channel and runs its child in response.
///
/// Under `Default` and `Restart` the node keeps listening until its branch is
/// ended; only `Once` completes on its own.
pub struct TriggerOnEvent<T: 'static> {
    channel: EventChannel<T>,
    mode: TriggerMode,
    filter: Option<EventFilter<T>>,
    pending: Rc<Cell<u32>>,
    subscription: Option<ChannelSubscription>,
    fired: bool,
}

#[derive(Serialize, Deserialize)]
struct TriggerState {
    fired: bool,
}

impl<T: 'static> TriggerOnEvent<T> {
    pub fn new(channel: &EventChannel<T>, mode: TriggerMode) -> Self {
        Self {
            channel: channel.clone(),
            mode,
            filter: None,
            pending: Rc::new(Cell::new(0)),
            subscription: None,
            fired: false,
        }
    }

    /// Only events passing `filter` trigger the child.
    pub fn with_filter(mut self, filter: impl Fn(&T) -> bool + 'static) -> Self {
        self.filter = Some(Rc::new(filter));
        self
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    fn listen(&mut self, ctx: &NodeContext<'_>) {
        let handle = ctx.awake_handle();
        let pending = self.pending.clone();
        let filter = self.filter.clone();
        self.subscription = Some(self.channel.subscribe(move |event: &T| {
            if filter.as_ref().map_or(true, |accept| accept(event)) {
                pending.set(pending.get() + 1);
                handle.awake();
            }
        }));
    }
}

impl<T: 'static> Behavior for TriggerOnEvent<T> {
    fn name(&self) -> &str {
        "TriggerOnEvent"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if ctx.child().is_none() {
            warn!(node = %ctx.node(), "trigger has no child");
            return Status::Failure;
        }
        self.pending.set(0);
        self.fired = false;
        self.listen(ctx);
        Status::Waiting
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        let Some(child) = ctx.child() else {
            return Status::Failure;
        };

        if self.pending.replace(0) > 0 {
            match self.mode {
                TriggerMode::Default => {
                    if ctx.is_running(child) {
                        debug!(node = %ctx.node(), "event ignored while child is active");
                    } else {
                        ctx.start(child);
                    }
                }
                TriggerMode::Restart => {
                    if ctx.is_running(child) {
                        let _ = ctx.end_branch(child);
                    }
                    ctx.start(child);
                }
                TriggerMode::Once => {
                    if !self.fired {
                        self.fired = true;
                        self.subscription = None;
                        ctx.start(child);
                    }
                }
            }
        }

        if self.mode == TriggerMode::Once && self.fired {
            if let Some(status) = ctx.outcome(child) {
                return status;
            }
        }
        Status::Waiting
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        self.subscription = None;
    }

    fn save_state(&self) -> Option<serde_json::Value> {
        serde_json::to_value(TriggerState { fired: self.fired }).ok()
    }

    fn restore_state(
        &mut self,
        ctx: &mut NodeContext<'_>,
        state: Option<&serde_json::Value>,
    ) -> Result<(), SnapshotError> {
        if let Some(state) = state {
            self.fired = decode_state::<TriggerState>(ctx.guid(), state)?.fired;
        }
        self.pending.set(0);
        if !(self.mode == TriggerMode::Once && self.fired) {
            self.listen(ctx);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.subscription = None;
        self.pending.set(0);
        self.fired = false;
    }
}
