use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;

use crate::{
    BlackboardError, Guid, SharedBlackboard, Value, Variable, VariableError, VariableValue,
};

/// Ordered variable store, unique by GUID (names may repeat).
///
/// GUID lookups go through an index that is rebuilt lazily whenever its size
/// no longer matches the variable list; every structural mutation clears it.
#[derive(Default)]
pub struct Blackboard {
    variables: Vec<Variable>,
    index: RefCell<HashMap<Guid, usize>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedBlackboard {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn add(&mut self, variable: Variable) -> Result<(), BlackboardError> {
        if self.index_of(variable.guid()).is_some() {
            return Err(BlackboardError::DuplicateGuid(variable.guid()));
        }
        self.variables.push(variable);
        self.index.get_mut().clear();
        Ok(())
    }

    /// Add a local variable holding `value` and return its GUID.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Guid {
        let variable = Variable::new(name, value);
        let guid = variable.guid();
        self.variables.push(variable);
        self.index.get_mut().clear();
        guid
    }

    pub fn remove(&mut self, guid: Guid) -> Option<Variable> {
        let position = self.index_of(guid)?;
        let removed = self.variables.remove(position);
        self.index.get_mut().clear();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.index.get_mut().clear();
    }

    pub fn contains(&self, guid: Guid) -> bool {
        self.index_of(guid).is_some()
    }

    /// A handle to the variable stored under `guid`.
    pub fn variable(&self, guid: Guid) -> Option<Variable> {
        self.index_of(guid).map(|i| self.variables[i].clone())
    }

    /// First variable called `name`, by linear scan.
    pub fn variable_by_name(&self, name: &str) -> Option<Variable> {
        self.variables.iter().find(|v| v.name() == name).cloned()
    }

    pub fn value(&self, guid: Guid) -> Result<Value, VariableError> {
        self.require(guid)?.value()
    }

    pub fn set_value(&self, guid: Guid, value: impl Into<Value>) -> Result<bool, VariableError> {
        self.require(guid)?.set_value(value)
    }

    pub fn get<T: VariableValue>(&self, guid: Guid) -> Result<T, VariableError> {
        self.require(guid)?.get::<T>()
    }

    pub fn set<T: VariableValue>(&self, guid: Guid, value: T) -> Result<bool, VariableError> {
        self.require(guid)?.set(value)
    }

    pub fn get_by_name<T: VariableValue>(&self, name: &str) -> Result<T, VariableError> {
        self.require_name(name)?.get::<T>()
    }

    pub fn set_by_name<T: VariableValue>(&self, name: &str, value: T) -> Result<bool, VariableError> {
        self.require_name(name)?.set(value)
    }

    /// An independent store for a new graph instance.
    pub fn duplicate(&self) -> Blackboard {
        Blackboard {
            variables: self.variables.iter().map(Variable::duplicate).collect(),
            index: RefCell::new(HashMap::new()),
        }
    }

    fn require(&self, guid: Guid) -> Result<Variable, VariableError> {
        self.variable(guid).ok_or_else(|| {
            warn!(%guid, "blackboard has no such variable");
            VariableError::NotFound(guid)
        })
    }

    fn require_name(&self, name: &str) -> Result<Variable, VariableError> {
        self.variable_by_name(name).ok_or_else(|| {
            warn!(name, "blackboard has no variable with that name");
            VariableError::NameNotFound(name.to_string())
        })
    }

    fn index_of(&self, guid: Guid) -> Option<usize> {
        let mut index = self.index.borrow_mut();
        if index.len() != self.variables.len() {
            index.clear();
            for (i, variable) in self.variables.iter().enumerate() {
                index.entry(variable.guid()).or_insert(i);
            }
        }
        index.get(&guid).copied()
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.variables.iter()).finish()
    }
}
