use canopy_core::{Guid, TickContext, Value, Variable, VariableError, VariableValue};
use tracing::error;

use crate::bt::{NodeId, Status};
use crate::error::EngineError;
use crate::event::AwakeHandle;
use crate::module::GraphModule;

/// What a node hook can reach: its own module, the modules after it in the
/// graph, and the current tick.
pub struct NodeContext<'a> {
    pub(crate) module: &'a mut GraphModule,
    pub(crate) subgraphs: &'a mut [GraphModule],
    pub(crate) node: NodeId,
}

impl<'a> NodeContext<'a> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn guid(&self) -> Guid {
        self.module.guid(self.node).unwrap_or_else(Guid::nil)
    }

    pub fn module_index(&self) -> usize {
        self.module.index()
    }

    pub fn tick(&self) -> TickContext {
        self.module.current_tick()
    }

    pub fn dt_seconds(&self) -> f32 {
        self.module.current_tick().dt_seconds
    }

    pub fn children(&self) -> &[NodeId] {
        self.module.children(self.node)
    }

    /// The first (for modifiers and joins, the only) child.
    pub fn child(&self) -> Option<NodeId> {
        self.children().first().copied()
    }

    pub fn parent_count(&self) -> usize {
        self.module.parents(self.node).len()
    }

    pub fn status(&self, node: NodeId) -> Status {
        self.module.status(node)
    }

    pub fn is_running(&self, node: NodeId) -> bool {
        self.module.is_running(node)
    }

    /// The result of `node`'s last activation once it has finished.
    pub fn outcome(&self, node: NodeId) -> Option<Status> {
        let status = self.module.status(node);
        (status.is_done() && !self.module.is_running(node)).then_some(status)
    }

    /// Start `node` and return its status after the start hook ran.
    pub fn start(&mut self, node: NodeId) -> Status {
        self.module.start_node_in(node, self.subgraphs)
    }

    pub fn end_branch(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.module.end_branch_in(node, self.subgraphs)
    }

    /// Promote `node` from Waiting to Running immediately.
    pub fn awake(&mut self, node: NodeId) -> bool {
        self.module.awake_node(node)
    }

    /// A handle that promotes this node on the next tick of its module.
    pub fn awake_handle(&self) -> AwakeHandle {
        self.module.awake_handle(self.node)
    }

    pub fn variable(&self, guid: Guid) -> Option<Variable> {
        self.module.variable(guid)
    }

    pub fn variable_by_name(&self, name: &str) -> Option<Variable> {
        self.module.variable_by_name(name)
    }

    pub fn value(&self, guid: Guid) -> Result<Value, VariableError> {
        self.module.value(guid)
    }

    pub fn set_value(&self, guid: Guid, value: impl Into<Value>) -> Result<bool, VariableError> {
        self.module.set_value(guid, value)
    }

    pub fn get<T: VariableValue>(&self, guid: Guid) -> Result<T, VariableError> {
        self.module.get(guid)
    }

    pub fn set<T: VariableValue>(&self, guid: Guid, value: T) -> Result<bool, VariableError> {
        self.module.set(guid, value)
    }

    /// Module `index` of the graph, which must come after this node's module.
    pub fn subgraph(&mut self, index: usize) -> Option<Subgraph<'_>> {
        let tick = self.module.current_tick();
        let Some(offset) = index.checked_sub(self.module.index() + 1) else {
            error!(
                module = self.module.index(),
                target = index,
                "subgraph must come after the module that runs it"
            );
            return None;
        };
        let (module, subgraphs) = self.subgraphs.get_mut(offset..)?.split_first_mut()?;
        Some(Subgraph {
            module,
            subgraphs,
            tick,
        })
    }
}

/// A module driven from a node of an earlier module.
pub struct Subgraph<'a> {
    module: &'a mut GraphModule,
    subgraphs: &'a mut [GraphModule],
    tick: TickContext,
}

impl Subgraph<'_> {
    pub fn index(&self) -> usize {
        self.module.index()
    }

    pub fn start(&mut self) -> Status {
        self.module.set_current_tick(self.tick);
        self.module.start_in(self.subgraphs)
    }

    pub fn tick(&mut self) -> Status {
        self.module.tick_in(&self.tick, self.subgraphs)
    }

    pub fn end(&mut self) {
        self.module.set_current_tick(self.tick);
        self.module.end_in(self.subgraphs);
    }

    pub fn root_status(&self) -> Status {
        self.module.root_status()
    }

    pub fn is_running(&self) -> bool {
        self.module.is_active()
    }

    pub fn module(&self) -> &GraphModule {
        &*self.module
    }
}
