//! Persisted variable definitions and the type identifiers they are keyed by.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Blackboard, BlackboardError, Guid, SharedBlackboard, Value, ValueType, Variable};

/// Maps stable type identifiers (and their aliases) to [`ValueType`]s.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    ids: HashMap<String, ValueType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeRegistry {
    /// An empty registry; nothing resolves until registered.
    pub fn empty() -> Self {
        Self {
            ids: HashMap::new(),
        }
    }

    /// Canonical identifiers for every [`ValueType`] plus common aliases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for ty in ValueType::ALL {
            registry.register(ty.id(), ty);
        }
        for (alias, ty) in [
            ("boolean", ValueType::Bool),
            ("int32", ValueType::Int),
            ("int64", ValueType::Int),
            ("integer", ValueType::Int),
            ("float32", ValueType::Float),
            ("float64", ValueType::Float),
            ("double", ValueType::Float),
            ("text", ValueType::String),
            ("vector2", ValueType::Vec2),
            ("vector3", ValueType::Vec3),
            ("game_object", ValueType::Entity),
        ] {
            registry.register(alias, ty);
        }
        registry
    }

    /// Register `id` for `ty`, returning the type it previously named.
    pub fn register(&mut self, id: impl Into<String>, ty: ValueType) -> Option<ValueType> {
        self.ids.insert(id.into(), ty)
    }

    pub fn resolve(&self, id: &str) -> Option<ValueType> {
        self.ids.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Authoring-side description of one blackboard variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub guid: Guid,
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    /// Initial value; the type's default when absent. Ignored for shared variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub shared: bool,
}

impl VariableDef {
    pub fn local(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            guid: Guid::new(),
            name: name.into(),
            type_id: value.value_type().id().to_string(),
            value: Some(value),
            shared: false,
        }
    }

    pub fn shared(guid: Guid, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            guid,
            name: name.into(),
            type_id: ty.id().to_string(),
            value: None,
            shared: true,
        }
    }
}

impl Blackboard {
    /// Build a store from definitions.
    ///
    /// Shared definitions redirect to `shared_store`, which must be supplied
    /// when any definition is shared.
    pub fn from_defs<'a>(
        defs: impl IntoIterator<Item = &'a VariableDef>,
        registry: &TypeRegistry,
        shared_store: Option<&SharedBlackboard>,
    ) -> Result<Blackboard, BlackboardError> {
        let mut board = Blackboard::new();
        for def in defs {
            let ty = registry.resolve(&def.type_id).ok_or_else(|| {
                warn!(variable = %def.name, type_id = %def.type_id, "unknown variable type");
                BlackboardError::UnknownType(def.type_id.clone())
            })?;

            let variable = if def.shared {
                let store = shared_store.ok_or(BlackboardError::MissingSharedStore(def.guid))?;
                Variable::shared(def.guid, def.name.clone(), ty, store)
            } else {
                let variable = Variable::of_type(def.guid, def.name.clone(), ty);
                if let Some(value) = &def.value {
                    variable.set_value(value.clone())?;
                }
                variable
            };
            board.add(variable)?;
        }
        Ok(board)
    }

    /// Export definitions; local and cast variables carry their current value.
    pub fn to_defs(&self) -> Vec<VariableDef> {
        self.iter()
            .map(|variable| {
                let shared = variable.is_shared();
                VariableDef {
                    guid: variable.guid(),
                    name: variable.name().to_string(),
                    type_id: variable.value_type().id().to_string(),
                    value: if shared { None } else { variable.value().ok() },
                    shared,
                }
            })
            .collect()
    }
}
