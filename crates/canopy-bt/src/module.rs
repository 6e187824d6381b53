use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use canopy_core::{
    Guid, SharedBlackboard, TickContext, Value, Variable, VariableError, VariableValue,
};
use canopy_tools::{TraceEvent, TraceLog, Tracer};
use tracing::{debug, error, warn};

use crate::bt::{Behavior, NodeCategory, NodeId, NodeKind, Status};
use crate::context::NodeContext;
use crate::error::{EngineError, SnapshotError};
use crate::event::{AwakeHandle, WakeQueue};
use crate::snapshot::{ModuleSnapshot, NodeSnapshot};

pub(crate) struct NodeSlot {
    pub(crate) guid: Guid,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) parents: Vec<NodeId>,
    /// Taken out while one of the node's hooks runs.
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) status: Status,
    pub(crate) is_running: bool,
    pub(crate) processed: bool,
    pub(crate) activation: u64,
    /// Ended while inside one of its own hooks; `on_end` runs once the hook returns.
    pub(crate) end_deferred: bool,
}

impl NodeSlot {
    pub(crate) fn new(guid: Guid, kind: NodeKind, behavior: Box<dyn Behavior>) -> Self {
        Self {
            guid,
            name: behavior.name().to_string(),
            kind,
            parents: Vec::new(),
            behavior: Some(behavior),
            status: Status::Uninitialized,
            is_running: false,
            processed: false,
            activation: 0,
            end_deferred: false,
        }
    }
}

/// Delivered to module listeners once per tick in which any status changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub module: usize,
    pub tick: u64,
    pub root: Status,
}

type StatusListener = Box<dyn FnMut(&StatusChange)>;

/// One node tree plus its execution bookkeeping.
///
/// `processed` holds every started-but-not-ended node in start order;
/// `running` is the subset with status Running, rebuilt lazily at the start of
/// a tick whenever membership or statuses changed. Branch termination is an
/// explicit post-order walk and never recurses.
pub struct GraphModule {
    index: usize,
    name: String,
    nodes: Vec<NodeSlot>,
    by_guid: HashMap<Guid, NodeId>,
    root: NodeId,

    processed: Vec<NodeId>,
    running: Vec<NodeId>,
    running_dirty: bool,
    batch: Vec<NodeId>,

    end_stack: Vec<NodeId>,
    ended_this_pass: HashSet<NodeId>,
    ending_branch: bool,

    status_changed: bool,
    wake: WakeQueue,
    listeners: Vec<StatusListener>,

    blackboard: SharedBlackboard,
    groups: Vec<SharedBlackboard>,
    tracer: Tracer,
    current_tick: TickContext,
}

impl GraphModule {
    pub(crate) fn from_parts(
        name: String,
        nodes: Vec<NodeSlot>,
        root: NodeId,
        blackboard: SharedBlackboard,
        groups: Vec<SharedBlackboard>,
        tracer: Tracer,
    ) -> Self {
        let by_guid = nodes
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.guid, NodeId(i as u32)))
            .collect();
        Self {
            index: 0,
            name,
            nodes,
            by_guid,
            root,
            processed: Vec::new(),
            running: Vec::new(),
            running_dirty: false,
            batch: Vec::new(),
            end_stack: Vec::new(),
            ended_this_pass: HashSet::new(),
            ending_branch: false,
            status_changed: false,
            wake: Rc::new(RefCell::new(Vec::new())),
            listeners: Vec::new(),
            blackboard,
            groups,
            tracer,
            current_tick: TickContext::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn find(&self, guid: Guid) -> Option<NodeId> {
        self.by_guid.get(&guid).copied()
    }

    pub fn guid(&self, id: NodeId) -> Option<Guid> {
        self.nodes.get(id.index()).map(|slot| slot.guid)
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|slot| slot.name.as_str())
    }

    pub fn category(&self, id: NodeId) -> Option<NodeCategory> {
        self.nodes.get(id.index()).map(|slot| slot.kind.category())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .map_or(&[], |slot| slot.kind.children())
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .map_or(&[], |slot| slot.parents.as_slice())
    }

    pub fn status(&self, id: NodeId) -> Status {
        self.nodes
            .get(id.index())
            .map_or(Status::Uninitialized, |slot| slot.status)
    }

    /// True between a node's start and its end.
    pub fn is_running(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(|slot| slot.is_running)
    }

    pub fn is_processed(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(|slot| slot.processed)
    }

    /// Started-but-not-ended nodes in start order.
    pub fn processed(&self) -> &[NodeId] {
        &self.processed
    }

    /// The running-node cache as of the last rebuild.
    pub fn running_nodes(&self) -> &[NodeId] {
        &self.running
    }

    pub fn root_status(&self) -> Status {
        self.status(self.root)
    }

    /// Whether any node of this module is still processed.
    pub fn is_active(&self) -> bool {
        !self.processed.is_empty()
    }

    pub fn current_tick(&self) -> TickContext {
        self.current_tick
    }

    pub(crate) fn set_current_tick(&mut self, tick: TickContext) {
        self.current_tick = tick;
    }

    pub fn blackboard(&self) -> &SharedBlackboard {
        &self.blackboard
    }

    pub fn groups(&self) -> &[SharedBlackboard] {
        &self.groups
    }

    /// Layer another store under this module's own; earlier groups win.
    pub fn add_group(&mut self, store: SharedBlackboard) {
        self.groups.push(store);
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    pub fn trace_log(&self) -> Option<&TraceLog> {
        self.tracer.log()
    }

    pub fn take_trace_log(&mut self) -> Option<TraceLog> {
        self.tracer.take_log()
    }

    pub fn on_status_changed(&mut self, listener: impl FnMut(&StatusChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn start(&mut self) -> Status {
        self.start_in(&mut [])
    }

    pub fn tick(&mut self, ctx: &TickContext) -> Status {
        self.tick_in(ctx, &mut [])
    }

    pub fn end(&mut self) {
        self.end_in(&mut []);
    }

    pub fn start_node(&mut self, id: NodeId) -> Status {
        self.start_node_in(id, &mut [])
    }

    pub fn end_branch(&mut self, id: NodeId) -> Result<(), EngineError> {
        self.end_branch_in(id, &mut [])
    }

    pub(crate) fn start_in(&mut self, subgraphs: &mut [GraphModule]) -> Status {
        if self.is_running(self.root) {
            return self.root_status();
        }
        debug!(module = %self.name, tick = self.current_tick.tick, "module start");
        self.start_node_in(self.root, subgraphs)
    }

    /// Ends the root branch, then any branch still processed outside it.
    pub(crate) fn end_in(&mut self, subgraphs: &mut [GraphModule]) {
        debug!(module = %self.name, tick = self.current_tick.tick, "module end");
        if self.end_branch_in(self.root, subgraphs).is_err() {
            return;
        }
        while let Some(&orphan) = self.processed.first() {
            if self.end_branch_in(orphan, subgraphs).is_err() {
                break;
            }
        }
    }

    /// Forget all run state. Structure, behaviors and listeners are kept.
    pub fn reset(&mut self) {
        if self.ending_branch {
            error!(module = %self.name, "reset requested while a branch is ending");
            return;
        }
        self.processed.clear();
        self.running.clear();
        self.batch.clear();
        self.end_stack.clear();
        self.ended_this_pass.clear();
        self.running_dirty = false;
        self.status_changed = false;
        self.wake.borrow_mut().clear();
        for slot in &mut self.nodes {
            slot.status = Status::Uninitialized;
            slot.is_running = false;
            slot.processed = false;
            slot.end_deferred = false;
            if let Some(behavior) = slot.behavior.as_mut() {
                behavior.reset();
            }
        }
    }

    pub(crate) fn start_node_in(&mut self, id: NodeId, subgraphs: &mut [GraphModule]) -> Status {
        if !self.contains(id) {
            error!(module = %self.name, node = %id, "start of unknown node");
            return Status::Failure;
        }
        if self.ending_branch {
            error!(module = %self.name, node = %id, "node started while a branch is ending");
            return Status::Failure;
        }

        if self.nodes[id.index()].is_running {
            if matches!(self.nodes[id.index()].kind, NodeKind::Join(_)) {
                return self.rejoin(id, subgraphs);
            }
            if self.end_branch_in(id, subgraphs).is_err() {
                return Status::Failure;
            }
        }

        let slot = &mut self.nodes[id.index()];
        slot.is_running = true;
        slot.activation += 1;
        if !slot.processed {
            slot.processed = true;
            self.processed.push(id);
        }
        self.set_status(id, Status::Uninitialized);
        self.running_dirty = true;

        debug!(module = %self.name, node = %self.nodes[id.index()].name, %id, "node start");
        self.trace("node.start", id, 0);

        let status = self
            .invoke(id, subgraphs, |behavior, ctx| behavior.on_start(ctx))
            .unwrap_or(Status::Failure);
        let status = if status == Status::Uninitialized {
            warn!(module = %self.name, node = %id, "start hook returned Uninitialized; treating as Running");
            Status::Running
        } else {
            status
        };
        self.apply_result(id, status, subgraphs);
        self.status(id)
    }

    fn rejoin(&mut self, id: NodeId, subgraphs: &mut [GraphModule]) -> Status {
        debug!(module = %self.name, node = %self.nodes[id.index()].name, %id, "join reached again");
        self.trace("node.rejoin", id, 0);
        let status = self
            .invoke(id, subgraphs, |behavior, ctx| behavior.on_rejoin(ctx))
            .unwrap_or(Status::Waiting);
        if status != Status::Uninitialized || !self.nodes[id.index()].processed {
            self.apply_result(id, status, subgraphs);
        }
        self.status(id)
    }

    fn apply_result(&mut self, id: NodeId, status: Status, subgraphs: &mut [GraphModule]) {
        if !self.nodes[id.index()].processed {
            self.settle_ended(id, status);
            return;
        }
        self.set_status(id, status);
        if status.is_done() {
            if self.end_branch_in(id, subgraphs).is_err() {
                return;
            }
            self.awake_parents(id);
        }
    }

    /// A node whose branch was ended while one of its hooks ran still reports
    /// a result: the hook's own if it finished, Failure otherwise.
    fn settle_ended(&mut self, id: NodeId, status: Status) {
        let settled = if status.is_done() {
            status
        } else {
            Status::Failure
        };
        debug!(module = %self.name, node = %id, %status, %settled, "node ended inside its own hook");
        self.set_status(id, settled);
        self.awake_parents(id);
    }

    /// End `root` and every processed descendant exactly once, children first.
    pub(crate) fn end_branch_in(
        &mut self,
        root: NodeId,
        subgraphs: &mut [GraphModule],
    ) -> Result<(), EngineError> {
        if !self.contains(root) {
            error!(module = %self.name, node = %root, "end of unknown node");
            return Err(EngineError::UnknownNode(root));
        }
        if self.ending_branch {
            let guid = self.nodes[root.index()].guid;
            error!(module = %self.name, node = %root, %guid, "EndBranch called from an end hook; ignored");
            return Err(EngineError::ReentrantEndBranch(guid));
        }

        self.ending_branch = true;
        self.end_stack.push(root);
        while let Some(&top) = self.end_stack.last() {
            let next = self.nodes[top.index()]
                .kind
                .children()
                .iter()
                .copied()
                .find(|child| {
                    self.nodes[child.index()].status.is_active()
                        && !self.ended_this_pass.contains(child)
                });
            if let Some(child) = next {
                self.end_stack.push(child);
                continue;
            }

            self.end_stack.pop();
            self.remove_processed(top);
            if self.nodes[top.index()].is_running {
                self.end_node(top, subgraphs);
            }
            self.ended_this_pass.insert(top);
        }
        self.ended_this_pass.clear();
        self.ending_branch = false;
        Ok(())
    }

    fn end_node(&mut self, id: NodeId, subgraphs: &mut [GraphModule]) {
        let slot = &mut self.nodes[id.index()];
        slot.is_running = false;
        let status = slot.status;
        debug!(module = %self.name, node = %self.nodes[id.index()].name, %id, %status, "node end");
        self.trace("node.end", id, status.code());
        if self.nodes[id.index()].behavior.is_none() {
            self.nodes[id.index()].end_deferred = true;
            return;
        }
        self.invoke(id, subgraphs, |behavior, ctx| behavior.on_end(ctx));
    }

    /// Runs an end hook postponed by [`Self::end_node`] under the same
    /// re-entrancy guard as a regular branch end.
    fn finish_deferred_end(&mut self, id: NodeId, subgraphs: &mut [GraphModule]) {
        let ending = std::mem::replace(&mut self.ending_branch, true);
        self.invoke(id, subgraphs, |behavior, ctx| behavior.on_end(ctx));
        self.ending_branch = ending;
    }

    fn remove_processed(&mut self, id: NodeId) {
        let slot = &mut self.nodes[id.index()];
        if !slot.processed {
            return;
        }
        slot.processed = false;
        if let Some(pos) = self.processed.iter().position(|&p| p == id) {
            self.processed.remove(pos);
        }
        self.running_dirty = true;
    }

    fn awake_parents(&mut self, id: NodeId) {
        for i in 0..self.nodes[id.index()].parents.len() {
            let parent = self.nodes[id.index()].parents[i];
            self.awake_node(parent);
        }
    }

    /// Promote a processed Waiting (or still-starting) node to Running.
    pub fn awake_node(&mut self, id: NodeId) -> bool {
        let Some(slot) = self.nodes.get(id.index()) else {
            return false;
        };
        if !slot.processed || !matches!(slot.status, Status::Waiting | Status::Uninitialized) {
            return false;
        }
        self.set_status(id, Status::Running);
        self.trace("node.awake", id, 0);
        true
    }

    pub fn awake_handle(&self, id: NodeId) -> AwakeHandle {
        let activation = self.nodes.get(id.index()).map_or(0, |slot| slot.activation);
        AwakeHandle::new(&self.wake, id, activation)
    }

    pub(crate) fn tick_in(&mut self, ctx: &TickContext, subgraphs: &mut [GraphModule]) -> Status {
        self.current_tick = *ctx;
        self.status_changed = false;
        self.drain_wake_queue();

        if self.running_dirty {
            self.running.clear();
            let nodes = &self.nodes;
            self.running.extend(
                self.processed
                    .iter()
                    .copied()
                    .filter(|id| nodes[id.index()].status == Status::Running),
            );
            self.running_dirty = false;
        }

        let mut batch = std::mem::take(&mut self.batch);
        batch.clear();
        batch.extend_from_slice(&self.running);
        for &id in &batch {
            let slot = &self.nodes[id.index()];
            // Removed or parked by an earlier node this pass.
            if !slot.processed || slot.status != Status::Running {
                continue;
            }
            let status = self
                .invoke(id, subgraphs, |behavior, ctx| behavior.on_update(ctx))
                .unwrap_or(Status::Running);
            self.trace("node.update", id, status.code());
            if !self.nodes[id.index()].processed {
                self.apply_result(id, status, subgraphs);
                continue;
            }
            match status {
                Status::Running => {}
                Status::Uninitialized => {
                    warn!(module = %self.name, node = %id, "update hook returned Uninitialized; ignored");
                }
                other => self.apply_result(id, other, subgraphs),
            }
        }
        self.batch = batch;

        if self.status_changed {
            self.status_changed = false;
            self.running_dirty = true;
            self.notify_status_changed();
        }
        self.root_status()
    }

    fn drain_wake_queue(&mut self) {
        let requests = std::mem::take(&mut *self.wake.borrow_mut());
        for request in requests {
            let current = self
                .nodes
                .get(request.node.index())
                .is_some_and(|slot| slot.activation == request.activation);
            if current {
                self.awake_node(request.node);
            } else {
                debug!(module = %self.name, node = %request.node, "stale awake request dropped");
            }
        }
    }

    fn notify_status_changed(&mut self) {
        let change = StatusChange {
            module: self.index,
            tick: self.current_tick.tick,
            root: self.root_status(),
        };
        self.tracer.emit(
            TraceEvent::new(change.tick, "module.status_changed")
                .with_a(self.index as u64)
                .with_b(change.root.code()),
        );
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(&change);
        }
        self.listeners = listeners;
    }

    fn set_status(&mut self, id: NodeId, status: Status) {
        let slot = &mut self.nodes[id.index()];
        if slot.status != status {
            slot.status = status;
            self.status_changed = true;
            self.running_dirty = true;
        }
    }

    fn invoke<R>(
        &mut self,
        id: NodeId,
        subgraphs: &mut [GraphModule],
        hook: impl FnOnce(&mut dyn Behavior, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let Some(mut behavior) = self.nodes[id.index()].behavior.take() else {
            warn!(module = %self.name, node = %id, "hook skipped: node is inside one of its own hooks");
            return None;
        };
        let result = {
            let mut ctx = NodeContext {
                module: &mut *self,
                subgraphs: &mut *subgraphs,
                node: id,
            };
            hook(behavior.as_mut(), &mut ctx)
        };
        self.nodes[id.index()].behavior = Some(behavior);
        if std::mem::take(&mut self.nodes[id.index()].end_deferred) {
            self.finish_deferred_end(id, subgraphs);
        }
        Some(result)
    }

    fn trace(&mut self, tag: &'static str, id: NodeId, b: u64) {
        let event = TraceEvent::new(self.current_tick.tick, tag)
            .with_a(id.index() as u64)
            .with_b(b)
            .with_node(self.nodes[id.index()].guid);
        self.tracer.emit(event);
    }

    /// Own blackboard first, then the group stores in order.
    pub fn variable(&self, guid: Guid) -> Option<Variable> {
        self.lookup(guid).ok().flatten()
    }

    pub fn variable_by_name(&self, name: &str) -> Option<Variable> {
        for store in self.stores() {
            let Ok(board) = store.try_borrow() else {
                warn!(module = %self.name, name, "blackboard busy; lookup stopped");
                return None;
            };
            if let Some(variable) = board.variable_by_name(name) {
                return Some(variable);
            }
        }
        None
    }

    /// A busy store ends the search so a later store never shadows it.
    fn lookup(&self, guid: Guid) -> Result<Option<Variable>, VariableError> {
        for store in self.stores() {
            let board = store.try_borrow().map_err(|_| {
                warn!(module = %self.name, %guid, "blackboard busy; lookup stopped");
                VariableError::StoreBusy(guid)
            })?;
            if let Some(variable) = board.variable(guid) {
                return Ok(Some(variable));
            }
        }
        Ok(None)
    }

    pub fn value(&self, guid: Guid) -> Result<Value, VariableError> {
        self.require(guid)?.value()
    }

    pub fn set_value(&self, guid: Guid, value: impl Into<Value>) -> Result<bool, VariableError> {
        self.require(guid)?.set_value(value)
    }

    pub fn get<T: VariableValue>(&self, guid: Guid) -> Result<T, VariableError> {
        self.require(guid)?.get()
    }

    pub fn set<T: VariableValue>(&self, guid: Guid, value: T) -> Result<bool, VariableError> {
        self.require(guid)?.set(value)
    }

    pub fn get_by_name<T: VariableValue>(&self, name: &str) -> Result<T, VariableError> {
        self.variable_by_name(name)
            .ok_or_else(|| VariableError::NameNotFound(name.to_string()))?
            .get()
    }

    pub fn set_by_name<T: VariableValue>(&self, name: &str, value: T) -> Result<bool, VariableError> {
        self.variable_by_name(name)
            .ok_or_else(|| VariableError::NameNotFound(name.to_string()))?
            .set(value)
    }

    fn stores(&self) -> impl Iterator<Item = &SharedBlackboard> {
        std::iter::once(&self.blackboard).chain(self.groups.iter())
    }

    fn require(&self, guid: Guid) -> Result<Variable, VariableError> {
        self.lookup(guid)?.ok_or_else(|| {
            warn!(module = %self.name, %guid, "no such variable in module or groups");
            VariableError::NotFound(guid)
        })
    }

    /// Every processed node that is Running or Waiting, in start order.
    pub fn snapshot(&self) -> ModuleSnapshot {
        let nodes = self
            .processed
            .iter()
            .map(|id| &self.nodes[id.index()])
            .filter(|slot| slot.status.is_active())
            .map(|slot| NodeSnapshot {
                guid: slot.guid,
                status: slot.status,
                running: slot.is_running,
                state: slot.behavior.as_ref().and_then(|b| b.save_state()),
            })
            .collect();
        ModuleSnapshot {
            index: self.index,
            nodes,
        }
    }

    pub fn restore(&mut self, snapshot: &ModuleSnapshot) -> Result<(), SnapshotError> {
        self.restore_in(snapshot, &mut [])
    }

    /// Reset, then rebuild processed bookkeeping from `snapshot`. Nothing is
    /// touched when the snapshot belongs to another module or names an
    /// unknown node.
    pub(crate) fn restore_in(
        &mut self,
        snapshot: &ModuleSnapshot,
        subgraphs: &mut [GraphModule],
    ) -> Result<(), SnapshotError> {
        if snapshot.index != self.index {
            return Err(SnapshotError::ModuleIndex {
                expected: self.index,
                found: snapshot.index,
            });
        }
        let ids = snapshot
            .nodes
            .iter()
            .map(|node| {
                self.find(node.guid).ok_or(SnapshotError::UnknownNode {
                    module: self.index,
                    guid: node.guid,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.reset();
        for (&id, node) in ids.iter().zip(&snapshot.nodes) {
            let slot = &mut self.nodes[id.index()];
            slot.status = node.status;
            slot.is_running = node.running;
            slot.activation += 1;
            if !slot.processed {
                slot.processed = true;
                self.processed.push(id);
            }
        }
        self.running_dirty = true;

        for (&id, node) in ids.iter().zip(&snapshot.nodes) {
            let state = node.state.as_ref();
            if let Some(Err(err)) =
                self.invoke(id, subgraphs, |behavior, ctx| behavior.restore_state(ctx, state))
            {
                return Err(err);
            }
        }
        debug!(module = %self.name, nodes = ids.len(), "module restored");
        Ok(())
    }
}

impl fmt::Debug for GraphModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphModule")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("processed", &self.processed)
            .field("root_status", &self.root_status())
            .finish()
    }
}
