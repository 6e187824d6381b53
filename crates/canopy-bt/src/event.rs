//! Event-driven resumption.
//!
//! An [`EventChannel`] is a single-threaded broadcast point owned by the host.
//! Nodes subscribe in `on_start`, keep the [`ChannelSubscription`], and drop it
//! (or unsubscribe) in `on_end`. Their callback usually calls
//! [`AwakeHandle::awake`], which queues the node for promotion at the start of
//! the owning module's next tick.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::bt::NodeId;

type Listener<T> = Rc<dyn Fn(&T)>;

struct ChannelInner<T> {
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
    next_id: Cell<u64>,
}

/// Broadcast point for host events. Clones share listeners.
pub struct EventChannel<T> {
    inner: Rc<ChannelInner<T>>,
}

impl<T: 'static> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> ChannelSubscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<ChannelInner<T>> = Rc::downgrade(&self.inner);
        ChannelSubscription {
            id,
            remove: Some(Box::new(move |id| {
                if let Some(inner) = weak.upgrade() {
                    inner.listeners.borrow_mut().retain(|(l, _)| *l != id);
                }
            })),
        }
    }

    /// Deliver `event` to every listener registered when the call began.
    pub fn emit(&self, event: &T) -> usize {
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

/// Registration on an [`EventChannel`]; dropping it unsubscribes.
pub struct ChannelSubscription {
    id: u64,
    remove: Option<Box<dyn FnOnce(u64)>>,
}

impl ChannelSubscription {
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove(self.id);
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WakeRequest {
    pub(crate) node: NodeId,
    pub(crate) activation: u64,
}

pub(crate) type WakeQueue = Rc<RefCell<Vec<WakeRequest>>>;

/// Queues a Waiting -> Running promotion for one activation of one node.
///
/// Requests from a handle whose activation has since ended are ignored.
#[derive(Clone)]
pub struct AwakeHandle {
    queue: Weak<RefCell<Vec<WakeRequest>>>,
    request: WakeRequest,
}

impl AwakeHandle {
    pub(crate) fn new(queue: &WakeQueue, node: NodeId, activation: u64) -> Self {
        Self {
            queue: Rc::downgrade(queue),
            request: WakeRequest { node, activation },
        }
    }

    pub fn node(&self) -> NodeId {
        self.request.node
    }

    /// Returns false when the owning module no longer exists.
    pub fn awake(&self) -> bool {
        match self.queue.upgrade() {
            Some(queue) => {
                queue.borrow_mut().push(self.request);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for AwakeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwakeHandle")
            .field("node", &self.request.node)
            .field("activation", &self.request.activation)
            .finish()
    }
}
