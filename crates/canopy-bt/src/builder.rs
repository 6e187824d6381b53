use std::collections::HashSet;

use canopy_core::{Blackboard, Guid, SharedBlackboard};
use canopy_tools::Tracer;
use tracing::debug;

use crate::bt::{Behavior, NodeId, NodeKind};
use crate::error::GraphError;
use crate::module::{GraphModule, NodeSlot};

/// Allocates nodes bottom-up and validates the resulting tree.
///
/// ```
/// use canopy_bt::{ModuleBuilder, nodes::{AlwaysSucceed, Repeat, Root}};
///
/// let mut b = ModuleBuilder::new("patrol");
/// let leaf = b.action(AlwaysSucceed);
/// let repeat = b.modifier(Repeat::times(3), leaf);
/// let root = b.modifier(Root::new(), repeat);
/// let module = b.build(root).unwrap();
/// assert_eq!(module.len(), 3);
/// ```
pub struct ModuleBuilder {
    name: String,
    nodes: Vec<NodeSlot>,
    blackboard: Option<SharedBlackboard>,
    groups: Vec<SharedBlackboard>,
    tracer: Tracer,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            blackboard: None,
            groups: Vec::new(),
            tracer: Tracer::new(),
        }
    }

    pub fn add(&mut self, kind: NodeKind, behavior: impl Behavior) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes
            .push(NodeSlot::new(Guid::new(), kind, Box::new(behavior)));
        id
    }

    pub fn action(&mut self, behavior: impl Behavior) -> NodeId {
        self.add(NodeKind::Action, behavior)
    }

    pub fn composite(
        &mut self,
        behavior: impl Behavior,
        children: impl IntoIterator<Item = NodeId>,
    ) -> NodeId {
        self.add(NodeKind::Composite(children.into_iter().collect()), behavior)
    }

    pub fn modifier(&mut self, behavior: impl Behavior, child: impl Into<Option<NodeId>>) -> NodeId {
        self.add(NodeKind::Modifier(child.into()), behavior)
    }

    pub fn join(&mut self, behavior: impl Behavior, child: impl Into<Option<NodeId>>) -> NodeId {
        self.add(NodeKind::Join(child.into()), behavior)
    }

    /// Replace the generated guid of `id`.
    pub fn guid(&mut self, id: NodeId, guid: Guid) -> &mut Self {
        if let Some(slot) = self.nodes.get_mut(id.index()) {
            slot.guid = guid;
        }
        self
    }

    pub fn blackboard(&mut self, store: SharedBlackboard) -> &mut Self {
        self.blackboard = Some(store);
        self
    }

    pub fn group(&mut self, store: SharedBlackboard) -> &mut Self {
        self.groups.push(store);
        self
    }

    pub fn tracer(&mut self, tracer: Tracer) -> &mut Self {
        self.tracer = tracer;
        self
    }

    pub fn build(self, root: NodeId) -> Result<GraphModule, GraphError> {
        let ModuleBuilder {
            name,
            mut nodes,
            blackboard,
            groups,
            tracer,
        } = self;

        if root.index() >= nodes.len() {
            return Err(GraphError::MissingRoot(root));
        }

        let mut guids = HashSet::with_capacity(nodes.len());
        for slot in &nodes {
            if !guids.insert(slot.guid) {
                return Err(GraphError::DuplicateGuid(slot.guid));
            }
        }

        for i in 0..nodes.len() {
            let parent = NodeId(i as u32);
            for c in 0..nodes[i].kind.children().len() {
                let child = nodes[i].kind.children()[c];
                let Some(slot) = nodes.get_mut(child.index()) else {
                    return Err(GraphError::MissingChild { parent, child });
                };
                slot.parents.push(parent);
            }
        }

        for (i, slot) in nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            if slot.parents.len() > 1 && !matches!(slot.kind, NodeKind::Join(_)) {
                return Err(GraphError::MultipleParents {
                    node: id,
                    parents: slot.parents.len(),
                });
            }
        }
        if !nodes[root.index()].parents.is_empty() {
            return Err(GraphError::RootHasParent(root));
        }
        check_acyclic(&nodes)?;

        debug!(module = %name, nodes = nodes.len(), "module built");
        Ok(GraphModule::from_parts(
            name,
            nodes,
            root,
            blackboard.unwrap_or_else(|| Blackboard::new().into_shared()),
            groups,
            tracer,
        ))
    }
}

/// Iterative three-colour DFS over every node.
fn check_acyclic(nodes: &[NodeSlot]) -> Result<(), GraphError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Open,
        Done,
    }

    let mut marks = vec![Mark::New; nodes.len()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for start in 0..nodes.len() {
        if marks[start] != Mark::New {
            continue;
        }
        marks[start] = Mark::Open;
        stack.push((start, 0));
        while let Some((node, next)) = stack.last_mut() {
            let children = nodes[*node].kind.children();
            if *next < children.len() {
                let child = children[*next].index();
                *next += 1;
                match marks[child] {
                    Mark::Open => return Err(GraphError::Cycle(NodeId(child as u32))),
                    Mark::New => {
                        marks[child] = Mark::Open;
                        stack.push((child, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[*node] = Mark::Done;
                stack.pop();
            }
        }
    }
    Ok(())
}
