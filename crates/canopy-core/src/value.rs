use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Stable type identifier persisted alongside every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    Vec2,
    Vec3,
    Entity,
    Component,
}

impl ValueType {
    pub const ALL: [ValueType; 8] = [
        ValueType::Bool,
        ValueType::Int,
        ValueType::Float,
        ValueType::String,
        ValueType::Vec2,
        ValueType::Vec3,
        ValueType::Entity,
        ValueType::Component,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Vec2 => "vec2",
            ValueType::Vec3 => "vec3",
            ValueType::Entity => "entity",
            ValueType::Component => "component",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.id() == id)
    }

    pub fn default_value(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Vec2 => Value::Vec2([0.0; 2]),
            ValueType::Vec3 => Value::Vec3([0.0; 3]),
            ValueType::Entity => Value::Entity(EntityId::NONE),
            ValueType::Component => Value::Component(ComponentRef::new(EntityId::NONE, "")),
        }
    }

    /// Whether a value of this type can, in principle, be converted to `target`.
    ///
    /// `String -> Bool | Int | Float` passes here but may still fail at run time
    /// when the text does not parse.
    pub fn can_convert_to(self, target: ValueType) -> bool {
        use ValueType::*;

        if self == target {
            return true;
        }
        matches!(
            (self, target),
            (Bool | Int | Float, Bool | Int | Float | String)
                | (String, Bool | Int | Float)
                | (Vec2, Vec3)
                | (Vec3, Vec2)
                | (Component, Entity)
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Handle to a host-side entity (the "game object" a component lives on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    pub const NONE: EntityId = EntityId(0);
}

/// Handle to a named component attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub entity: EntityId,
    pub component: String,
}

impl ComponentRef {
    pub fn new(entity: EntityId, component: impl Into<String>) -> Self {
        Self {
            entity,
            component: component.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Entity(EntityId),
    Component(ComponentRef),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Vec2(_) => ValueType::Vec2,
            Value::Vec3(_) => ValueType::Vec3,
            Value::Entity(_) => ValueType::Entity,
            Value::Component(_) => ValueType::Component,
        }
    }

    /// Change-detection equality. Floats compare by bit pattern, so NaN
    /// matches itself and `0.0` differs from `-0.0`.
    pub fn is_identical(&self, other: &Value) -> bool {
        fn bits(a: &[f32], b: &[f32]) -> bool {
            a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Vec2(a), Value::Vec2(b)) => bits(a, b),
            (Value::Vec3(a), Value::Vec3(b)) => bits(a, b),
            _ => self == other,
        }
    }

        /// Best-effort conversion to `target`.
    ///
    /// Float to Int truncates toward zero and rejects non-finite or out of range
    /// input. Vec3 to Vec2 drops `z`; Vec2 to Vec3 fills `z` with zero.
    pub fn convert_to(&self, target: ValueType) -> Result<Value, ConversionError> {
        let from = self.value_type();
        if from == target {
            return Ok(self.clone());
        }
        let fail = || ConversionError::new(from, target);

        let converted = match (self, target) {
            (Value::Bool(b), ValueType::Int) => Value::Int(i64::from(*b)),
            (Value::Bool(b), ValueType::Float) => Value::Float(if *b { 1.0 } else { 0.0 }),
            (Value::Int(i), ValueType::Bool) => Value::Bool(*i != 0),
            (Value::Int(i), ValueType::Float) => Value::Float(*i as f64),
            (Value::Float(f), ValueType::Bool) => Value::Bool(*f != 0.0),
            (Value::Float(f), ValueType::Int) => {
                let truncated = f.trunc();
                if !truncated.is_finite()
                    || truncated < i64::MIN as f64
                    || truncated >= i64::MAX as f64
                {
                    return Err(fail());
                }
                Value::Int(truncated as i64)
            }
            (Value::Bool(b), ValueType::String) => Value::String(b.to_string()),
            (Value::Int(i), ValueType::String) => Value::String(i.to_string()),
            (Value::Float(f), ValueType::String) => Value::String(f.to_string()),
            (Value::String(s), ValueType::Bool) => {
                Value::Bool(s.trim().parse::<bool>().map_err(|_| fail())?)
            }
            (Value::String(s), ValueType::Int) => {
                Value::Int(s.trim().parse::<i64>().map_err(|_| fail())?)
            }
            (Value::String(s), ValueType::Float) => {
                Value::Float(s.trim().parse::<f64>().map_err(|_| fail())?)
            }
            (Value::Vec2([x, y]), ValueType::Vec3) => Value::Vec3([*x, *y, 0.0]),
            (Value::Vec3([x, y, _]), ValueType::Vec2) => Value::Vec2([*x, *y]),
            (Value::Component(c), ValueType::Entity) => Value::Entity(c.entity),
            _ => return Err(fail()),
        };
        Ok(converted)
    }
}

/// Rust types that map onto exactly one [`ValueType`].
pub trait VariableValue: Clone + 'static {
    const TYPE: ValueType;

    fn into_value(self) -> Value;

    /// Exact extraction; no conversion is attempted.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_variable_value {
    ($ty:ty, $vt:ident, $variant:ident) => {
        impl VariableValue for $ty {
            const TYPE: ValueType = ValueType::$vt;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_variable_value!(bool, Bool, Bool);
impl_variable_value!(i64, Int, Int);
impl_variable_value!(f64, Float, Float);
impl_variable_value!(String, String, String);
impl_variable_value!([f32; 2], Vec2, Vec2);
impl_variable_value!([f32; 3], Vec3, Vec3);
impl_variable_value!(EntityId, Entity, Entity);
impl_variable_value!(ComponentRef, Component, Component);

impl VariableValue for i32 {
    const TYPE: ValueType = ValueType::Int;

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl VariableValue for f32 {
    const TYPE: ValueType = ValueType::Float;

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

/// Extract `T` from `value`, converting across types when `value` is not already a `T`.
pub fn coerce<T: VariableValue>(value: &Value) -> Result<T, ConversionError> {
    if let Some(v) = T::from_value(value) {
        return Ok(v);
    }
    let converted = value.convert_to(T::TYPE)?;
    T::from_value(&converted).ok_or_else(|| ConversionError::new(value.value_type(), T::TYPE))
}
