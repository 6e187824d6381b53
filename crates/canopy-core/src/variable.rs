use core::fmt;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::cast::CastBinding;
use crate::shared::SharedBinding;
use crate::{value, Guid, Value, ValueType, VariableError, VariableValue};

pub type ListenerId = u64;

pub(crate) type Callback = Rc<dyn Fn(&Value)>;

/// Local storage shared by every handle cloned from one [`Variable`].
pub(crate) struct ValueCell {
    value: RefCell<Value>,
    listeners: RefCell<Vec<(ListenerId, Callback)>>,
    next_listener: Cell<ListenerId>,
}

impl ValueCell {
    pub(crate) fn new(value: Value) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(1),
        })
    }

    pub(crate) fn get(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Store `value`; listeners run only when it differs from the previous
    /// value under [`Value::is_identical`].
    pub(crate) fn set(&self, value: Value) -> bool {
        {
            let mut slot = self.value.borrow_mut();
            if slot.is_identical(&value) {
                return false;
            }
            *slot = value.clone();
        }

        // Listeners may read or write this cell again.
        let callbacks: Vec<Callback> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(&value);
        }
        true
    }

    pub(crate) fn subscribe(self: &Rc<Self>, callback: Callback) -> Subscription {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push((id, callback));
        Subscription {
            cell: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.borrow().iter().any(|(listener, _)| *listener == id)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// Change-notification registration returned by [`Variable::subscribe`].
///
/// Dropping the handle keeps the listener alive; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    cell: Weak<ValueCell>,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.cell
            .upgrade()
            .is_some_and(|cell| cell.has_listener(self.id))
    }

    pub fn unsubscribe(&self) -> bool {
        self.cell
            .upgrade()
            .is_some_and(|cell| cell.unsubscribe(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) enum Binding {
    Local(Rc<ValueCell>),
    Shared(SharedBinding),
    Cast(Rc<CastBinding>),
}

/// A typed, GUID-identified value cell with change notification.
///
/// Cloning a `Variable` clones the handle: both clones read and write the same
/// storage. Use [`Variable::duplicate`] for an independent copy.
#[derive(Clone)]
pub struct Variable {
    guid: Guid,
    name: String,
    ty: ValueType,
    pub(crate) binding: Binding,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_guid(Guid::new(), name, value)
    }

    pub fn with_guid(guid: Guid, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.value_type();
        Self::from_parts(guid, name.into(), ty, Binding::Local(ValueCell::new(value)))
    }

    /// A local variable of `ty` holding that type's default value.
    pub fn of_type(guid: Guid, name: impl Into<String>, ty: ValueType) -> Self {
        Self::from_parts(
            guid,
            name.into(),
            ty,
            Binding::Local(ValueCell::new(ty.default_value())),
        )
    }

    pub(crate) fn from_parts(guid: Guid, name: String, ty: ValueType, binding: Binding) -> Self {
        Self {
            guid,
            name,
            ty,
            binding,
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Declared type, fixed at construction.
    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn is_local(&self) -> bool {
        matches!(self.binding, Binding::Local(_))
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.binding, Binding::Shared(_))
    }

    pub fn is_cast(&self) -> bool {
        matches!(self.binding, Binding::Cast(_))
    }

    pub fn value(&self) -> Result<Value, VariableError> {
        match &self.binding {
            Binding::Local(cell) => Ok(cell.get()),
            Binding::Shared(shared) => {
                let target = shared.resolve(self.guid).map_err(|e| self.report(e))?;
                let value = target.value()?;
                self.conform(value)
            }
            Binding::Cast(cast) => cast.read(self.guid).map_err(|e| self.report(e)),
        }
    }

    /// Write `value`, converting it to the declared type when needed.
    ///
    /// Returns whether the stored value changed (and listeners ran).
    pub fn set_value(&self, value: impl Into<Value>) -> Result<bool, VariableError> {
        let value = self.conform(value.into())?;
        match &self.binding {
            Binding::Local(cell) => Ok(cell.set(value)),
            Binding::Shared(shared) => {
                let target = shared.resolve(self.guid).map_err(|e| self.report(e))?;
                target.set_value(value)
            }
            Binding::Cast(cast) => cast.write(self.guid, value).map_err(|e| self.report(e)),
        }
    }

    pub fn get<T: VariableValue>(&self) -> Result<T, VariableError> {
        let value = self.value()?;
        value::coerce::<T>(&value).map_err(|e| self.report(VariableError::conversion(self.guid, e)))
    }

    pub fn set<T: VariableValue>(&self, value: T) -> Result<bool, VariableError> {
        self.set_value(value.into_value())
    }

    /// Register `callback` to run after every change of the stored value.
    ///
    /// Shared variables register on the canonical variable of their store; cast
    /// variables register on their source and deliver converted values.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Value) + 'static,
    ) -> Result<Subscription, VariableError> {
        self.subscribe_rc(Rc::new(callback))
    }

    pub(crate) fn subscribe_rc(&self, callback: Callback) -> Result<Subscription, VariableError> {
        match &self.binding {
            Binding::Local(cell) => Ok(cell.subscribe(callback)),
            Binding::Shared(shared) => shared.resolve(self.guid)?.subscribe_rc(callback),
            Binding::Cast(cast) => cast.subscribe(callback),
        }
    }

    /// Number of listeners on this variable's own storage (zero for shared and cast variables).
    pub fn listener_count(&self) -> usize {
        match &self.binding {
            Binding::Local(cell) => cell.listener_count(),
            _ => 0,
        }
    }

    /// A statically typed view; fails unless the declared type is exactly `T`'s type.
    pub fn typed<T: VariableValue>(&self) -> Result<TypedVariable<T>, VariableError> {
        if self.ty != T::TYPE {
            return Err(self.report(VariableError::TypeMismatch {
                guid: self.guid,
                declared: self.ty,
                requested: T::TYPE,
            }));
        }
        Ok(TypedVariable {
            inner: self.clone(),
            _marker: PhantomData,
        })
    }

    /// An independent copy.
    ///
    /// Local values move into fresh storage without listeners. Shared variables
    /// keep their GUID and target store, never a value. Cast variables are
    /// rebuilt over a duplicate of their source.
    pub fn duplicate(&self) -> Variable {
        let binding = match &self.binding {
            Binding::Local(cell) => Binding::Local(ValueCell::new(cell.get())),
            Binding::Shared(shared) => Binding::Shared(shared.clone()),
            Binding::Cast(cast) => Binding::Cast(Rc::new(cast.rebuild(cast.source().duplicate()))),
        };
        Self::from_parts(self.guid, self.name.clone(), self.ty, binding)
    }

    /// Whether both handles read and write the same local storage.
    pub fn shares_storage_with(&self, other: &Variable) -> bool {
        match (&self.binding, &other.binding) {
            (Binding::Local(a), Binding::Local(b)) => Rc::ptr_eq(a, b),
            (Binding::Cast(a), Binding::Cast(b)) => Rc::ptr_eq(a, b),
            (Binding::Shared(a), Binding::Shared(b)) => {
                self.guid == other.guid && Rc::ptr_eq(a.store(), b.store())
            }
            _ => false,
        }
    }

    fn conform(&self, value: Value) -> Result<Value, VariableError> {
        if value.value_type() == self.ty {
            return Ok(value);
        }
        value
            .convert_to(self.ty)
            .map_err(|e| self.report(VariableError::conversion(self.guid, e)))
    }

    fn report(&self, err: VariableError) -> VariableError {
        warn!(variable = %self.name, guid = %self.guid, error = %err, "variable access failed");
        err
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.binding {
            Binding::Local(_) => "local",
            Binding::Shared(_) => "shared",
            Binding::Cast(_) => "cast",
        };
        f.debug_struct("Variable")
            .field("guid", &self.guid)
            .field("name", &self.name)
            .field("type", &self.ty)
            .field("kind", &kind)
            .finish()
    }
}

/// A [`Variable`] whose declared type is statically known to be `T`.
#[derive(Debug)]
pub struct TypedVariable<T> {
    inner: Variable,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VariableValue> TypedVariable<T> {
    pub fn get(&self) -> Result<T, VariableError> {
        let value = self.inner.value()?;
        T::from_value(&value).ok_or(VariableError::TypeMismatch {
            guid: self.inner.guid,
            declared: value.value_type(),
            requested: T::TYPE,
        })
    }

    pub fn set(&self, value: T) -> Result<bool, VariableError> {
        self.inner.set_value(value.into_value())
    }

    pub fn variable(&self) -> &Variable {
        &self.inner
    }
}

impl<T> Clone for TypedVariable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}
