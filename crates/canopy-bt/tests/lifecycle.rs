mod common;

use std::cell::RefCell;
use std::rc::Rc;

use canopy_bt::nodes::{
    AlwaysFail, AlwaysSucceed, Condition, ForceSuccess, Inverter, NeverComplete, Parallel,
    Repeat, Root, RunSubgraph, Selector, Sequence, SetVariable, Timeout, TriggerMode,
    TriggerOnEvent, Wait, WaitForAll, WaitForAny, WaitForEvent,
};
use canopy_bt::{
    Behavior, EngineError, EventChannel, Graph, ModuleBuilder, NodeContext, NodeId, Status,
    StatusChange,
};
use canopy_core::{Guid, TickConfig, TickContext};
use canopy_tools::Tracer;

use common::{count, entries, log, Log, Recorder};

fn tick(graph: &mut Graph, n: u64, dt: f32) -> Status {
    graph.tick(&TickContext::new(n, dt))
}

#[test]
fn repeat_runs_child_three_times_then_succeeds() {
    let log = log();
    let mut b = ModuleBuilder::new("repeat");
    let leaf = b.action(Recorder::new("leaf", &log, Status::Success));
    let repeat = b.modifier(Repeat::times(3), leaf);
    let root = b.modifier(Root::new(), repeat);
    let mut graph = Graph::new(b.build(root).unwrap());

    let status = graph.run_until_quiescent(&TickConfig::default()).unwrap();

    assert_eq!(status, Status::Success);
    assert_eq!(count(&log, "leaf:start"), 3);
    assert_eq!(count(&log, "leaf:end"), 3);
    assert!(!graph.is_running());
}

#[test]
fn sequence_stops_at_first_failure() {
    let log = log();
    let mut b = ModuleBuilder::new("sequence");
    let first = b.action(Recorder::new("first", &log, Status::Failure));
    let second = b.action(Recorder::new("second", &log, Status::Success));
    let seq = b.composite(Sequence::new(), [first, second]);
    let root = b.modifier(Root::new(), seq);
    let mut graph = Graph::new(b.build(root).unwrap());

    assert_eq!(graph.start(), Status::Failure);
    assert_eq!(entries(&log), vec!["first:start", "first:end"]);

    let module = graph.root();
    assert_eq!(module.status(seq), Status::Failure);
    assert_eq!(module.status(first), Status::Failure);
    assert_eq!(module.status(second), Status::Uninitialized);
    assert!(module.processed().is_empty());
}

#[test]
fn timeout_ends_never_completing_child() {
    let log = log();
    let mut b = ModuleBuilder::new("timeout");
    let leaf = b.action(Recorder::new("leaf", &log, Status::Running));
    let timeout = b.modifier(Timeout::new(2.0), leaf);
    let root = b.modifier(Root::new(), timeout);
    let mut graph = Graph::new(b.build(root).unwrap());

    assert_eq!(graph.start(), Status::Waiting);

    for n in 1..=3 {
        tick(&mut graph, n, 0.5);
        assert_eq!(graph.root().status(timeout), Status::Running);
    }
    tick(&mut graph, 4, 0.5);

    let module = graph.root();
    assert_eq!(module.status(timeout), Status::Failure);
    assert!(!module.is_running(leaf));
    // The timeout ran first on tick 4 and removed the leaf before its turn.
    assert_eq!(count(&log, "leaf:update"), 3);
    assert_eq!(count(&log, "leaf:end"), 1);

    assert_eq!(tick(&mut graph, 5, 0.5), Status::Failure);
    assert!(!graph.is_running());
}

#[test]
fn completed_status_survives_branch_end() {
    let mut b = ModuleBuilder::new("persist");
    let leaf = b.action(AlwaysFail);
    let root = b.modifier(Root::new(), leaf);
    let mut module = b.build(root).unwrap();

    module.start();
    assert_eq!(module.status(leaf), Status::Failure);
    assert!(!module.is_running(leaf));
    assert!(!module.is_processed(leaf));
}

#[test]
fn aborted_node_keeps_its_last_status() {
    let mut b = ModuleBuilder::new("abort");
    let leaf = b.action(NeverComplete);
    let root = b.modifier(Root::new(), leaf);
    let mut module = b.build(root).unwrap();

    module.start();
    module.end();
    assert_eq!(module.status(leaf), Status::Running);
    assert!(!module.is_running(leaf));
    assert!(!module.is_active());
}

#[test]
fn end_branch_is_idempotent() {
    let log = log();
    let mut b = ModuleBuilder::new("idempotent");
    let leaves = ["a", "b", "c"]
        .into_iter()
        .map(|label| b.action(Recorder::new(label, &log, Status::Running)))
        .collect::<Vec<_>>();
    let parallel = b.composite(Parallel::all(), leaves);
    let root = b.modifier(Root::new(), parallel);
    let mut module = b.build(root).unwrap();

    module.start();
    module.end_branch(parallel).unwrap();
    let after_first = entries(&log);
    module.end_branch(parallel).unwrap();

    assert_eq!(entries(&log), after_first);
    for label in ["a", "b", "c"] {
        assert_eq!(count(&log, &format!("{label}:end")), 1);
    }
    assert_eq!(module.processed(), &[root]);
}

#[test]
fn end_branch_visits_children_before_parents() {
    let mut b = ModuleBuilder::new("order");
    let left = b.action(NeverComplete);
    let right = b.action(NeverComplete);
    let parallel = b.composite(Parallel::all(), [left, right]);
    let root = b.modifier(Root::new(), parallel);
    b.tracer(Tracer::recording());
    let mut module = b.build(root).unwrap();

    module.start();
    module.end();

    let ended = module
        .trace_log()
        .unwrap()
        .with_tag("node.end")
        .map(|e| node_at(&module, e.a))
        .collect::<Vec<_>>();
    assert_eq!(ended, vec![left, right, parallel, root]);
}

fn node_at(module: &canopy_bt::GraphModule, index: u64) -> NodeId {
    module
        .node_ids()
        .nth(index as usize)
        .expect("trace names a node of this module")
}

struct EndsItself {
    result: Rc<RefCell<Option<Result<(), EngineError>>>>,
    restart: Rc<RefCell<Option<Status>>>,
}

impl Behavior for EndsItself {
    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Running
    }

    fn on_end(&mut self, ctx: &mut NodeContext<'_>) {
        let node = ctx.node();
        *self.result.borrow_mut() = Some(ctx.end_branch(node));
        *self.restart.borrow_mut() = Some(ctx.start(node));
    }
}

#[test]
fn end_branch_from_end_hook_is_rejected() {
    let result = Rc::new(RefCell::new(None));
    let restart = Rc::new(RefCell::new(None));
    let mut b = ModuleBuilder::new("reentrant");
    let leaf = b.action(EndsItself {
        result: result.clone(),
        restart: restart.clone(),
    });
    let root = b.modifier(Root::new(), leaf);
    let mut module = b.build(root).unwrap();
    let guid = module.guid(leaf).unwrap();

    module.start();
    module.end();

    assert_eq!(
        *result.borrow(),
        Some(Err(EngineError::ReentrantEndBranch(guid)))
    );
    assert_eq!(*restart.borrow(), Some(Status::Failure));
    assert!(!module.is_active());
    assert!(!module.is_running(leaf));
}

#[test]
fn starting_a_running_node_restarts_it() {
    let log = log();
    let mut b = ModuleBuilder::new("restart");
    let leaf = b.action(Recorder::new("leaf", &log, Status::Running));
    let root = b.modifier(Root::new(), leaf);
    let mut module = b.build(root).unwrap();

    module.start();
    assert_eq!(module.start_node(leaf), Status::Running);
    assert_eq!(entries(&log), vec!["leaf:start", "leaf:end", "leaf:start"]);
    assert_eq!(module.processed(), &[root, leaf]);
}

#[test]
fn each_running_node_updates_once_per_tick() {
    let log = log();
    let mut b = ModuleBuilder::new("once");
    let a = b.action(Recorder::new("a", &log, Status::Running));
    let c = b.action(Recorder::new("c", &log, Status::Running));
    let parallel = b.composite(Parallel::all(), [a, c]);
    let root = b.modifier(Root::new(), parallel);
    let mut graph = Graph::new(b.build(root).unwrap());

    graph.start();
    log.borrow_mut().clear();
    tick(&mut graph, 1, 0.1);
    tick(&mut graph, 2, 0.1);

    assert_eq!(
        entries(&log),
        vec!["a:update", "c:update", "a:update", "c:update"]
    );
}

#[test]
fn status_listeners_fire_once_per_changed_tick() {
    let log = log();
    let mut b = ModuleBuilder::new("listeners");
    let leaves = ["a", "b", "c"]
        .into_iter()
        .map(|label| b.action(Recorder::new(label, &log, Status::Running).then(Status::Success)))
        .collect::<Vec<_>>();
    let parallel = b.composite(Parallel::all(), leaves);
    let root = b.modifier(Root::new(), parallel);
    let mut graph = Graph::new(b.build(root).unwrap());

    let changes: Rc<RefCell<Vec<StatusChange>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = changes.clone();
    graph
        .root_mut()
        .on_status_changed(move |change| sink.borrow_mut().push(*change));

    graph.start();
    tick(&mut graph, 1, 0.1);
    assert_eq!(changes.borrow().len(), 1);
    assert_eq!(changes.borrow()[0].tick, 1);

    // Nothing running and nothing awakened: no notification.
    let mut idle = ModuleBuilder::new("idle");
    let leaf = idle.action(AlwaysFail);
    let idle_root = idle.modifier(Root::new(), leaf);
    let mut idle = idle.build(idle_root).unwrap();
    let idle_changes = Rc::new(RefCell::new(0));
    let counter = idle_changes.clone();
    idle.on_status_changed(move |_| *counter.borrow_mut() += 1);
    idle.start();
    idle.tick(&TickContext::new(1, 0.1));
    assert_eq!(*idle_changes.borrow(), 0);

    assert_eq!(
        graph.run_until_quiescent(&TickConfig::default()).unwrap(),
        Status::Success
    );
    assert!(changes.borrow().iter().all(|c| c.module == 0));
}

#[test]
fn run_until_quiescent_reports_stall() {
    let mut b = ModuleBuilder::new("stall");
    let leaf = b.action(NeverComplete);
    let root = b.modifier(Root::new(), leaf);
    let mut graph = Graph::new(b.build(root).unwrap());

    let config = TickConfig {
        dt_seconds: 0.1,
        max_ticks: 5,
    };
    assert_eq!(
        graph.run_until_quiescent(&config),
        Err(EngineError::Stalled { ticks: 5 })
    );
    assert!(graph.is_running());
}

#[test]
fn restart_resets_and_starts_again() {
    let log = log();
    let mut b = ModuleBuilder::new("restart");
    let leaf = b.action(Recorder::new("leaf", &log, Status::Running));
    let root = b.modifier(Root::new(), leaf);
    let mut graph = Graph::new(b.build(root).unwrap());

    graph.start();
    assert_eq!(graph.restart(), Status::Waiting);
    assert_eq!(entries(&log), vec!["leaf:start", "leaf:end", "leaf:start"]);
}

#[test]
fn repeating_root_restarts_finished_child() {
    let log = log();
    let mut b = ModuleBuilder::new("loop");
    let leaf = b.action(Recorder::new("leaf", &log, Status::Success));
    let root = b.modifier(Root::repeating(), leaf);
    let mut graph = Graph::new(b.build(root).unwrap());

    assert_eq!(graph.start(), Status::Running);
    for n in 1..=4 {
        tick(&mut graph, n, 0.1);
    }
    assert_eq!(count(&log, "leaf:start"), 5);
    assert!(graph.is_running());
}

#[test]
fn updates_follow_start_order_not_tree_order() {
    let log = log();
    let mut b = ModuleBuilder::new("start-order");
    let wait = b.action(Wait::new(0.15));
    let a = b.action(Recorder::new("a", &log, Status::Running));
    let seq = b.composite(Sequence::new(), [wait, a]);
    let later = b.action(Recorder::new("b", &log, Status::Running));
    let parallel = b.composite(Parallel::all(), [seq, later]);
    let root = b.modifier(Root::new(), parallel);
    let mut graph = Graph::new(b.build(root).unwrap());

    graph.start();
    for n in 1..=3 {
        tick(&mut graph, n, 0.1);
    }
    // `a` started on tick 3, after `b`, although it comes first in the tree.
    assert_eq!(count(&log, "a:start"), 1);
    assert_eq!(graph.root().processed().last(), Some(&a));

    log.borrow_mut().clear();
    tick(&mut graph, 4, 0.1);
    assert_eq!(entries(&log), vec!["b:update", "a:update"]);
}

/// Ends its own branch from the start or update hook.
struct EndsOwnBranch {
    from_start: bool,
    log: Log,
}

impl EndsOwnBranch {
    fn end_self(&self, ctx: &mut NodeContext<'_>, hook: &str) {
        let me = ctx.node();
        let result = ctx.end_branch(me);
        self.log.borrow_mut().push(format!("{hook}:{result:?}"));
    }
}

impl Behavior for EndsOwnBranch {
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        if self.from_start {
            self.end_self(ctx, "start");
        }
        Status::Running
    }

    fn on_update(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        self.end_self(ctx, "update");
        Status::Running
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        self.log.borrow_mut().push("end".to_string());
    }
}

#[test]
fn node_ending_itself_on_start_runs_end_hook_and_fails() {
    let log = log();
    let mut b = ModuleBuilder::new("self-end-start");
    let leaf = b.action(EndsOwnBranch {
        from_start: true,
        log: log.clone(),
    });
    let root = b.modifier(Root::new(), leaf);
    let mut module = b.build(root).unwrap();

    assert_eq!(module.start(), Status::Failure);
    assert_eq!(entries(&log), vec!["start:Ok(())", "end"]);
    assert_eq!(module.status(leaf), Status::Failure);
    assert!(!module.is_running(leaf));
    assert!(!module.is_processed(leaf));
    assert!(!module.is_active());
}

#[test]
fn node_ending_itself_on_update_runs_end_hook_and_fails() {
    let log = log();
    let mut b = ModuleBuilder::new("self-end-update");
    let leaf = b.action(EndsOwnBranch {
        from_start: false,
        log: log.clone(),
    });
    let root = b.modifier(Root::new(), leaf);
    let mut graph = Graph::new(b.build(root).unwrap());

    assert_eq!(graph.start(), Status::Waiting);
    tick(&mut graph, 1, 0.1);

    assert_eq!(entries(&log), vec!["update:Ok(())", "end"]);
    let module = graph.root();
    assert_eq!(module.status(leaf), Status::Failure);
    assert!(!module.is_running(leaf));
    assert!(!module.is_processed(leaf));

    // The root hears about it like any other completion.
    assert_eq!(tick(&mut graph, 2, 0.1), Status::Failure);
    assert!(!graph.is_running());
    assert_eq!(count(&log, "end"), 1);
}

fn assert_started(label: &str, add: impl FnOnce(&mut ModuleBuilder) -> NodeId) {
    let mut b = ModuleBuilder::new(label);
    let node = add(&mut b);
    let root = b.modifier(Root::new(), node);
    let mut module = b.build(root).unwrap();

    let status = module.start_node(node);
    assert!(
        matches!(
            status,
            Status::Running | Status::Waiting | Status::Success | Status::Failure
        ),
        "{label} started as {status:?}"
    );
    assert_eq!(status, module.status(node), "{label}");
    assert_eq!(module.is_processed(node), status.is_active(), "{label}");
    assert_eq!(module.is_running(node), status.is_active(), "{label}");
}

#[test]
fn every_builtin_node_leaves_start_in_a_settled_status() {
    let channel = EventChannel::<()>::new();
    let log = log();

    assert_started("succeed", |b| b.action(AlwaysSucceed));
    assert_started("fail", |b| b.action(AlwaysFail));
    assert_started("never", |b| b.action(NeverComplete));
    assert_started("wait", |b| b.action(Wait::new(1.0)));
    assert_started("wait-zero", |b| b.action(Wait::new(0.0)));
    assert_started("condition", |b| b.action(Condition::new(|_| true)));
    assert_started("set-missing", |b| b.action(SetVariable::new(Guid::new(), true)));
    assert_started("wait-event", |b| b.action(WaitForEvent::new(&channel)));
    assert_started("subgraph-missing", |b| b.action(RunSubgraph::new(1)));
    assert_started("self-end", |b| {
        b.action(EndsOwnBranch {
            from_start: true,
            log: log.clone(),
        })
    });

    assert_started("sequence", |b| {
        let child = b.action(AlwaysSucceed);
        b.composite(Sequence::new(), [child])
    });
    assert_started("selector", |b| {
        let child = b.action(AlwaysFail);
        b.composite(Selector::new(), [child])
    });
    assert_started("parallel", |b| {
        let child = b.action(NeverComplete);
        b.composite(Parallel::all(), [child])
    });

    assert_started("repeat", |b| {
        let child = b.action(AlwaysSucceed);
        b.modifier(Repeat::times(2), child)
    });
    assert_started("inverter", |b| {
        let child = b.action(AlwaysSucceed);
        b.modifier(Inverter, child)
    });
    assert_started("force-success", |b| {
        let child = b.action(AlwaysFail);
        b.modifier(ForceSuccess, child)
    });
    assert_started("timeout", |b| {
        let child = b.action(NeverComplete);
        b.modifier(Timeout::new(1.0), child)
    });
    assert_started("trigger", |b| {
        let child = b.action(AlwaysSucceed);
        b.modifier(TriggerOnEvent::new(&channel, TriggerMode::Default), child)
    });
    assert_started("nested-root", |b| {
        let child = b.action(AlwaysSucceed);
        b.modifier(Root::new(), child)
    });

    assert_started("wait-all", |b| {
        let child = b.action(AlwaysSucceed);
        b.join(WaitForAll::new(), child)
    });
    assert_started("wait-any", |b| {
        let child = b.action(NeverComplete);
        b.join(WaitForAny::new(), child)
    });
}
