use thiserror::Error;

use crate::{Guid, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot convert {from} to {to}")]
pub struct ConversionError {
    pub from: ValueType,
    pub to: ValueType,
}

impl ConversionError {
    pub fn new(from: ValueType, to: ValueType) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariableError {
    #[error("no variable with guid {0}")]
    NotFound(Guid),

    #[error("no variable named `{0}`")]
    NameNotFound(String),

    #[error("variable {guid} is declared as {declared}, not {requested}")]
    TypeMismatch {
        guid: Guid,
        declared: ValueType,
        requested: ValueType,
    },

    #[error("variable {guid}: {source}")]
    Conversion {
        guid: Guid,
        #[source]
        source: ConversionError,
    },

    #[error("shared store does not hold variable {0}")]
    SharedMissing(Guid),

    #[error("shared variable {0} redirects through too many stores")]
    SharedCycle(Guid),

    #[error("shared store for variable {0} is being modified")]
    StoreBusy(Guid),

    #[error("variable {0} is a read-only cast")]
    ReadOnly(Guid),
}

impl VariableError {
    pub fn conversion(guid: Guid, source: ConversionError) -> Self {
        Self::Conversion { guid, source }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlackboardError {
    #[error("variable {0} already exists in this blackboard")]
    DuplicateGuid(Guid),

    #[error("unknown variable type `{0}`")]
    UnknownType(String),

    #[error("variable {0} is shared but no shared store was supplied")]
    MissingSharedStore(Guid),

    #[error(transparent)]
    Variable(#[from] VariableError),
}
