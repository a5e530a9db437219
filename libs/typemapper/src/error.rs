use crate::value::TypeRef;

/// Raw text that does not parse as the converter's target type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert '{raw}' to {target}: {reason}")]
pub struct ConversionFailure {
    pub target: TypeRef,
    pub raw: String,
    pub reason: String,
}

impl ConversionFailure {
    pub fn new(target: TypeRef, raw: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            target,
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("no converter registered for type {ty}")]
    UnsupportedType { ty: TypeRef },

    #[error(transparent)]
    Conversion(#[from] ConversionFailure),

    #[error("cannot access field '{field}' of {owner}: {reason}")]
    Access {
        owner: TypeRef,
        field: &'static str,
        reason: String,
    },

    #[error("cannot construct {ty} for embedded field '{field}': {reason}")]
    Construction {
        ty: TypeRef,
        field: &'static str,
        reason: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Wrap the error with a location such as a column or row.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        MappingError::Context {
            context: ctx.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers peeled off.
    pub fn root_cause(&self) -> &MappingError {
        match self {
            MappingError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
