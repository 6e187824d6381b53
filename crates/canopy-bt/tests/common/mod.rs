#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use canopy_bt::{AwakeHandle, Behavior, NodeContext, Status};

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

pub fn count(log: &Log, entry: &str) -> usize {
    log.borrow().iter().filter(|e| *e == entry).count()
}

/// Records `label:start`, `label:update` and `label:end`.
pub struct Recorder {
    label: &'static str,
    log: Log,
    start: Status,
    update: Status,
}

impl Recorder {
    pub fn new(label: &'static str, log: &Log, start: Status) -> Self {
        Self {
            label,
            log: log.clone(),
            start,
            update: Status::Running,
        }
    }

    pub fn then(mut self, update: Status) -> Self {
        self.update = update;
        self
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{}:{hook}", self.label));
    }
}

impl Behavior for Recorder {
    fn name(&self) -> &str {
        self.label
    }

    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        self.record("start");
        self.start
    }

    fn on_update(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        self.record("update");
        self.update
    }

    fn on_end(&mut self, _ctx: &mut NodeContext<'_>) {
        self.record("end");
    }
}

/// Waits on start and hands out its awake handle.
pub struct Parked {
    pub handle: Rc<RefCell<Option<AwakeHandle>>>,
}

impl Parked {
    pub fn new() -> (Self, Rc<RefCell<Option<AwakeHandle>>>) {
        let handle = Rc::new(RefCell::new(None));
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl Behavior for Parked {
    fn name(&self) -> &str {
        "Parked"
    }

    fn on_start(&mut self, ctx: &mut NodeContext<'_>) -> Status {
        *self.handle.borrow_mut() = Some(ctx.awake_handle());
        Status::Waiting
    }

    fn on_update(&mut self, _ctx: &mut NodeContext<'_>) -> Status {
        Status::Success
    }
}
