use canopy_bt::nodes::{AlwaysSucceed, Inverter, Parallel, Root, Sequence};
use canopy_bt::{GraphError, ModuleBuilder, NodeCategory, NodeId, NodeKind};
use canopy_core::Guid;

#[test]
fn built_module_reports_structure() {
    let mut b = ModuleBuilder::new("shape");
    let a = b.action(AlwaysSucceed);
    let c = b.action(AlwaysSucceed);
    let seq = b.composite(Sequence::new(), [a, c]);
    let root = b.modifier(Root::new(), seq);
    let module = b.build(root).unwrap();

    assert_eq!(module.name(), "shape");
    assert_eq!(module.root(), root);
    assert_eq!(module.children(seq), &[a, c]);
    assert_eq!(module.parents(a), &[seq]);
    assert_eq!(module.category(seq), Some(NodeCategory::Composite));
    assert_eq!(module.category(root), Some(NodeCategory::Modifier));
    assert_eq!(module.node_name(a), Some("AlwaysSucceed"));
    let guid = module.guid(c).unwrap();
    assert_eq!(module.find(guid), Some(c));
}

#[test]
fn missing_root_is_rejected() {
    let mut b = ModuleBuilder::new("empty");
    b.action(AlwaysSucceed);
    assert_eq!(
        b.build(NodeId::new(7)).unwrap_err(),
        GraphError::MissingRoot(NodeId::new(7))
    );
}

#[test]
fn missing_child_is_rejected() {
    let mut b = ModuleBuilder::new("dangling");
    let root = b.modifier(Root::new(), NodeId::new(5));
    assert_eq!(
        b.build(root).unwrap_err(),
        GraphError::MissingChild {
            parent: root,
            child: NodeId::new(5)
        }
    );
}

#[test]
fn root_with_parent_is_rejected() {
    let mut b = ModuleBuilder::new("inner-root");
    let leaf = b.action(AlwaysSucceed);
    let wrapper = b.modifier(Inverter, leaf);
    b.modifier(Root::new(), wrapper);
    assert_eq!(b.build(wrapper).unwrap_err(), GraphError::RootHasParent(wrapper));
}

#[test]
fn cycles_are_rejected() {
    let mut b = ModuleBuilder::new("loop");
    // 0 -> 1 -> 0, reached from the root through a parallel.
    let first = b.modifier(Inverter, NodeId::new(1));
    let second = b.modifier(Inverter, first);
    let leaf = b.action(AlwaysSucceed);
    let parallel = b.composite(Parallel::all(), [leaf]);
    let root = b.add(NodeKind::Modifier(Some(parallel)), Root::new());
    assert_eq!(second, NodeId::new(1));
    assert!(matches!(b.build(root).unwrap_err(), GraphError::Cycle(_)));
}

#[test]
fn duplicate_guids_are_rejected() {
    let mut b = ModuleBuilder::new("twins");
    let a = b.action(AlwaysSucceed);
    let c = b.action(AlwaysSucceed);
    let seq = b.composite(Sequence::new(), [a, c]);
    let root = b.modifier(Root::new(), seq);
    let guid = Guid::from_u128(42);
    b.guid(a, guid).guid(c, guid);
    assert_eq!(b.build(root).unwrap_err(), GraphError::DuplicateGuid(guid));
}
