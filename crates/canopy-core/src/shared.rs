use std::cell::RefCell;
use std::rc::Rc;

use crate::variable::Binding;
use crate::{Blackboard, Guid, ValueType, Variable, VariableError};

/// A blackboard referenced from several graph instances.
pub type SharedBlackboard = Rc<RefCell<Blackboard>>;

/// Redirection hops allowed before a shared lookup is treated as a cycle.
pub const MAX_SHARED_DEPTH: usize = 16;

#[derive(Clone)]
pub(crate) struct SharedBinding {
    store: SharedBlackboard,
}

impl SharedBinding {
    pub(crate) fn store(&self) -> &SharedBlackboard {
        &self.store
    }

    /// The variable the store currently holds for `guid`, following nested
    /// shared redirections.
    pub(crate) fn resolve(&self, guid: Guid) -> Result<Variable, VariableError> {
        let mut store = self.store.clone();
        for _ in 0..MAX_SHARED_DEPTH {
            let target = {
                let board = store
                    .try_borrow()
                    .map_err(|_| VariableError::StoreBusy(guid))?;
                board.variable(guid).ok_or(VariableError::SharedMissing(guid))?
            };
            match &target.binding {
                Binding::Shared(next) => store = next.store.clone(),
                _ => return Ok(target),
            }
        }
        Err(VariableError::SharedCycle(guid))
    }
}

impl Variable {
    /// A variable without local storage: every access is redirected to the
    /// variable `store` holds under the same `guid`.
    pub fn shared(
        guid: Guid,
        name: impl Into<String>,
        ty: ValueType,
        store: &SharedBlackboard,
    ) -> Self {
        Self::from_parts(
            guid,
            name.into(),
            ty,
            Binding::Shared(SharedBinding {
                store: store.clone(),
            }),
        )
    }

    pub fn shared_store(&self) -> Option<&SharedBlackboard> {
        match &self.binding {
            Binding::Shared(shared) => Some(shared.store()),
            _ => None,
        }
    }

    /// The canonical variable behind a shared variable, or this variable itself.
    pub fn resolve_shared(&self) -> Result<Variable, VariableError> {
        match &self.binding {
            Binding::Shared(shared) => shared.resolve(self.guid()),
            _ => Ok(self.clone()),
        }
    }
}
