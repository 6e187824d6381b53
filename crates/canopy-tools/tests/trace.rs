use std::cell::RefCell;
use std::rc::Rc;

use canopy_core::Guid;
use canopy_tools::{TraceEvent, TraceSink, Tracer};

#[derive(Clone, Default)]
struct RcSink(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for RcSink {
    fn emit(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}

#[test]
fn emit_writes_to_trace_log_when_recording() {
    let mut tracer = Tracer::recording();

    tracer.emit(TraceEvent::new(1, "test").with_a(10).with_b(20));

    let log = tracer.log().unwrap();
    assert_eq!(log.events.len(), 1);
    assert_eq!(log.events[0].tick, 1);
    assert_eq!(log.events[0].tag, "test");
    assert_eq!(log.events[0].a, 10);
    assert_eq!(log.events[0].b, 20);
}

#[test]
fn emit_writes_to_sink_when_present() {
    let handle = RcSink::default();
    let shared = handle.0.clone();
    let mut tracer = Tracer::new().with_sink(Box::new(handle));

    tracer.emit(TraceEvent::new(2, "sink_event"));

    assert!(tracer.log().is_none());
    let events = shared.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tick, 2);
    assert_eq!(events[0].tag, "sink_event");
}

#[test]
fn emit_writes_to_both_log_and_sink_when_both_present() {
    let handle = RcSink::default();
    let shared = handle.0.clone();
    let mut tracer = Tracer::recording().with_sink(Box::new(handle));

    tracer.emit(TraceEvent::new(3, "both"));

    assert_eq!(tracer.log().unwrap().count("both"), 1);
    assert_eq!(shared.borrow().len(), 1);
}

#[test]
fn counts_filter_by_node() {
    let a = Guid::from_u128(1);
    let b = Guid::from_u128(2);
    let mut tracer = Tracer::recording();

    tracer.emit(TraceEvent::new(0, "node.start").with_node(a));
    tracer.emit(TraceEvent::new(0, "node.start").with_node(b));
    tracer.emit(TraceEvent::new(1, "node.end").with_node(a));

    let log = tracer.take_log().unwrap();
    assert_eq!(log.count("node.start"), 2);
    assert_eq!(log.count_for("node.start", a), 1);
    assert_eq!(log.count_for("node.end", b), 0);
    assert!(tracer.log().unwrap().is_empty());
}
