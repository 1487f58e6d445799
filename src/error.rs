//! Error type shared by every stage of schema processing.
//!
//! Messages carry the source line of the offending element (`line N: ...`) when it is known.

/// Failure raised while building or verifying the semantic model.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown field kind: {0}")]
    UnknownFieldKind(String),
    #[error("Duplicate member name: {0}")]
    DuplicateMemberName(String),
    #[error("Conflicting length specification: {0}")]
    ConflictingLengthSpec(String),
    #[error("Bit length exceeded: {0}")]
    BitLengthExceeded(String),
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("Reuse kind mismatch: {0}")]
    ReuseKindMismatch(String),
    #[error("Reuse invariant violation: {0}")]
    ReuseInvariantViolation(String),
    #[error("Invalid property: {0}")]
    InvalidProperty(String),
    #[error("Missing property: {0}")]
    MissingProperty(String),
    #[error("Duplicate property: {0}")]
    DuplicateProperty(String),
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    #[error("Invalid version: {0}")]
    InvalidVersion(String),
    #[error("XML: {0}")]
    Xml(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
