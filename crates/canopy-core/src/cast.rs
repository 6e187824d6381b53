use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::variable::{Binding, Callback, Subscription};
use crate::{ConversionError, Guid, Value, ValueType, Variable, VariableError};

/// Directions a cast adapter must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastAccess {
    ReadOnly,
    ReadWrite,
}

/// Derives a value of one type from a source variable of another.
///
/// The converted value is cached. The adapter registers on the source's change
/// notification on first read and recomputes the cache from there.
pub(crate) struct CastBinding {
    source: Variable,
    target: ValueType,
    access: CastAccess,
    cache: Rc<RefCell<Option<Value>>>,
    registration: RefCell<Option<Subscription>>,
}

impl CastBinding {
    fn new(source: Variable, target: ValueType, access: CastAccess) -> Self {
        Self {
            source,
            target,
            access,
            cache: Rc::new(RefCell::new(None)),
            registration: RefCell::new(None),
        }
    }

    pub(crate) fn source(&self) -> &Variable {
        &self.source
    }

    pub(crate) fn rebuild(&self, source: Variable) -> Self {
        Self::new(source, self.target, self.access)
    }

    fn ensure_registered(&self) {
        if self.registration.borrow().is_some() {
            return;
        }

        let cache = Rc::downgrade(&self.cache);
        let target = self.target;
        let callback: Callback = Rc::new(move |value: &Value| {
            if let Some(cache) = cache.upgrade() {
                *cache.borrow_mut() = value.convert_to(target).ok();
            }
        });

        match self.source.subscribe_rc(callback) {
            Ok(subscription) => {
                *self.registration.borrow_mut() = Some(subscription);
                let seeded = self
                    .source
                    .value()
                    .ok()
                    .and_then(|value| value.convert_to(target).ok());
                *self.cache.borrow_mut() = seeded;
            }
            Err(err) => {
                debug!(source = %self.source.guid(), error = %err, "cast adapter could not register; reading through");
            }
        }
    }

    pub(crate) fn read(&self, guid: Guid) -> Result<Value, VariableError> {
        self.ensure_registered();
        if self.registration.borrow().is_some() {
            if let Some(value) = self.cache.borrow().clone() {
                return Ok(value);
            }
        }

        let value = self.source.value()?;
        value
            .convert_to(self.target)
            .map_err(|e| VariableError::conversion(guid, e))
    }

    pub(crate) fn write(&self, guid: Guid, value: Value) -> Result<bool, VariableError> {
        if self.access == CastAccess::ReadOnly {
            return Err(VariableError::ReadOnly(guid));
        }
        let back = value
            .convert_to(self.source.value_type())
            .map_err(|e| VariableError::conversion(guid, e))?;
        self.source.set_value(back)
    }

    pub(crate) fn subscribe(&self, callback: Callback) -> Result<Subscription, VariableError> {
        let target = self.target;
        self.source.subscribe_rc(Rc::new(move |value: &Value| {
            if let Ok(converted) = value.convert_to(target) {
                callback(&converted);
            }
        }))
    }
}

impl Drop for CastBinding {
    fn drop(&mut self) {
        if let Some(subscription) = self.registration.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

impl Variable {
    /// An adapter presenting `source` as `target`.
    ///
    /// Fails when `source`'s type cannot convert to `target`, or, for
    /// [`CastAccess::ReadWrite`], when `target` cannot convert back.
    pub fn cast(
        source: &Variable,
        target: ValueType,
        access: CastAccess,
    ) -> Result<Variable, ConversionError> {
        let source_ty = source.value_type();
        let err = if !source_ty.can_convert_to(target) {
            Some(ConversionError::new(source_ty, target))
        } else if access == CastAccess::ReadWrite && !target.can_convert_to(source_ty) {
            Some(ConversionError::new(target, source_ty))
        } else {
            None
        };
        if let Some(err) = err {
            warn!(source = %source.guid(), error = %err, "rejected cast adapter");
            return Err(err);
        }

        Ok(Self::from_parts(
            source.guid(),
            source.name().to_string(),
            target,
            Binding::Cast(Rc::new(CastBinding::new(source.clone(), target, access))),
        ))
    }

    pub fn cast_source(&self) -> Option<&Variable> {
        match &self.binding {
            Binding::Cast(cast) => Some(cast.source()),
            _ => None,
        }
    }
}
