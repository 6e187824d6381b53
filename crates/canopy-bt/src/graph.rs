use canopy_core::{
    EngineConfig, Guid, TickConfig, TickContext, Value, Variable, VariableError, VariableValue,
};
use canopy_tools::Tracer;
use tracing::{debug, info, warn};

use crate::bt::{NodeId, Status};
use crate::error::{EngineError, SnapshotError};
use crate::module::GraphModule;
use crate::snapshot::GraphSnapshot;

/// A root module plus the subgraph modules its nodes may run.
///
/// Module 0 is the root. A node in module `i` can only reach modules after `i`.
#[derive(Debug)]
pub struct Graph {
    modules: Vec<GraphModule>,
    clock: TickContext,
}

impl Graph {
    pub fn new(root: GraphModule) -> Self {
        let mut graph = Self {
            modules: Vec::new(),
            clock: TickContext::default(),
        };
        graph.push_module(root);
        graph
    }

    /// Append a subgraph module and return its index.
    pub fn add_subgraph(&mut self, module: GraphModule) -> usize {
        self.push_module(module)
    }

    fn push_module(&mut self, mut module: GraphModule) -> usize {
        let index = self.modules.len();
        module.set_index(index);
        self.modules.push(module);
        index
    }

    /// Attach an in-memory trace log to every module when tracing is enabled.
    pub fn apply_config(&mut self, config: &EngineConfig) {
        if config.trace.enabled {
            for module in &mut self.modules {
                if !module.tracer().is_recording() {
                    module.set_tracer(Tracer::recording());
                }
            }
        }
        self.clock.dt_seconds = config.tick.dt_seconds;
    }

    pub fn modules(&self) -> &[GraphModule] {
        &self.modules
    }

    pub fn module(&self, index: usize) -> Option<&GraphModule> {
        self.modules.get(index)
    }

    pub fn module_mut(&mut self, index: usize) -> Option<&mut GraphModule> {
        self.modules.get_mut(index)
    }

    pub fn root(&self) -> &GraphModule {
        &self.modules[0]
    }

    pub fn root_mut(&mut self) -> &mut GraphModule {
        &mut self.modules[0]
    }

    pub fn clock(&self) -> TickContext {
        self.clock
    }

    pub fn root_status(&self) -> Status {
        self.root().root_status()
    }

    pub fn is_running(&self) -> bool {
        self.root().is_active()
    }

    pub fn start(&mut self) -> Status {
        let clock = self.clock;
        let (root, subgraphs) = self.split_root();
        root.set_current_tick(clock);
        root.start_in(subgraphs)
    }

    pub fn tick(&mut self, ctx: &TickContext) -> Status {
        self.clock = *ctx;
        let (root, subgraphs) = self.split_root();
        root.tick_in(ctx, subgraphs)
    }

    pub fn end(&mut self) {
        let clock = self.clock;
        let (root, subgraphs) = self.split_root();
        root.set_current_tick(clock);
        root.end_in(subgraphs);
        // Subgraphs left running by a node that never ended them.
        for module in self.modules.iter_mut().skip(1) {
            if module.is_active() {
                module.end();
            }
        }
    }

    /// End, reset every module, start again.
    pub fn restart(&mut self) -> Status {
        debug!(tick = self.clock.tick, "graph restart");
        self.end();
        for module in &mut self.modules {
            module.reset();
        }
        self.start()
    }

    /// Start if idle, then tick with `config` until the root module has no
    /// processed node.
    pub fn run_until_quiescent(&mut self, config: &TickConfig) -> Result<Status, EngineError> {
        if !self.is_running() {
            self.start();
        }
        let first = self.clock.tick;
        for n in 1..=config.max_ticks {
            if !self.is_running() {
                break;
            }
            let ctx = config.context(first.wrapping_add(n));
            self.tick(&ctx);
        }
        if self.is_running() {
            warn!(ticks = config.max_ticks, "graph did not settle");
            return Err(EngineError::Stalled {
                ticks: config.max_ticks,
            });
        }
        let status = self.root_status();
        info!(%status, ticks = self.clock.tick.wrapping_sub(first), "graph settled");
        Ok(status)
    }

    pub fn awake(&mut self, module: usize, node: NodeId) -> bool {
        self.modules
            .get_mut(module)
            .is_some_and(|m| m.awake_node(node))
    }

    pub fn serialize(&self) -> GraphSnapshot {
        GraphSnapshot {
            tick: self.clock.tick,
            modules: self.modules.iter().map(GraphModule::snapshot).collect(),
        }
    }

    pub fn deserialize(&mut self, snapshot: &GraphSnapshot) -> Result<(), SnapshotError> {
        if snapshot.modules.len() != self.modules.len() {
            return Err(SnapshotError::ModuleCount {
                expected: self.modules.len(),
                found: snapshot.modules.len(),
            });
        }
        if let Some((i, found)) = snapshot
            .modules
            .iter()
            .enumerate()
            .find(|(i, m)| m.index != *i)
        {
            return Err(SnapshotError::ModuleIndex {
                expected: i,
                found: found.index,
            });
        }
        self.clock.tick = snapshot.tick;
        for (i, module_snapshot) in snapshot.modules.iter().enumerate() {
            let (module, subgraphs) = self.split_at(i);
            module.set_current_tick(TickContext::new(snapshot.tick, 0.0));
            module.restore_in(module_snapshot, subgraphs)?;
        }
        Ok(())
    }

    pub fn variable(&self, guid: Guid) -> Option<Variable> {
        self.root().variable(guid)
    }

    pub fn variable_by_name(&self, name: &str) -> Option<Variable> {
        self.root().variable_by_name(name)
    }

    pub fn value(&self, guid: Guid) -> Result<Value, VariableError> {
        self.root().value(guid)
    }

    pub fn set_value(&self, guid: Guid, value: impl Into<Value>) -> Result<bool, VariableError> {
        self.root().set_value(guid, value)
    }

    pub fn get<T: VariableValue>(&self, guid: Guid) -> Result<T, VariableError> {
        self.root().get(guid)
    }

    pub fn set<T: VariableValue>(&self, guid: Guid, value: T) -> Result<bool, VariableError> {
        self.root().set(guid, value)
    }

    pub fn get_by_name<T: VariableValue>(&self, name: &str) -> Result<T, VariableError> {
        self.root().get_by_name(name)
    }

    pub fn set_by_name<T: VariableValue>(&self, name: &str, value: T) -> Result<bool, VariableError> {
        self.root().set_by_name(name, value)
    }

    fn split_root(&mut self) -> (&mut GraphModule, &mut [GraphModule]) {
        self.split_at(0)
    }

    fn split_at(&mut self, index: usize) -> (&mut GraphModule, &mut [GraphModule]) {
        let (_, tail) = self.modules.split_at_mut(index);
        let (module, rest) = tail
            .split_first_mut()
            .expect("graph always holds its root module");
        (module, rest)
    }
}
