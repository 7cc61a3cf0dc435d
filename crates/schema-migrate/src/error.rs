//! Error types for the schema migration library.

use thiserror::Error;

/// Main error type for schema model and transformation operations.
///
/// Model-integrity violations are raised synchronously by the mutation
/// primitive that would cause them; program errors abort the engine at the
/// failing operation with enough context to locate it.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// An entity with the same qualified name already exists
    #[error("Entity '{0}' already exists")]
    DuplicateEntity(String),

    /// A named entity could not be resolved
    #[error("Entity '{0}' does not exist")]
    UnknownEntity(String),

    /// An attribute with the same name already exists on the entity
    #[error("Attribute '{attribute}' already exists on entity '{entity}'")]
    DuplicateAttribute { entity: String, attribute: String },

    /// A named attribute could not be resolved on the entity
    #[error("Attribute '{attribute}' does not exist on entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },

    /// A relationship with the same name already exists on the entity
    #[error("Relationship '{relationship}' already exists on entity '{entity}'")]
    DuplicateRelationship {
        entity: String,
        relationship: String,
    },

    /// A named relationship could not be resolved on the entity
    #[error("Relationship '{relationship}' does not exist on entity '{entity}'")]
    UnknownRelationship {
        entity: String,
        relationship: String,
    },

    /// A second PRIMARY or PARTITION key was added to an entity
    #[error("Entity '{entity}' already has a {kind} key")]
    DuplicateKey { entity: String, kind: String },

    /// No key of the requested kind exists on the entity
    #[error("Entity '{entity}' has no {kind} key")]
    UnknownKey { entity: String, kind: String },

    /// A key names a member attribute the entity does not own
    #[error("Key member '{attribute}' is not an attribute of entity '{entity}'")]
    KeyMemberNotOwned { entity: String, attribute: String },

    /// A relationship type (graph edge type) with the same name already exists
    #[error("Relationship type '{0}' already exists")]
    DuplicateRelationshipType(String),

    /// A named relationship type could not be resolved
    #[error("Relationship type '{0}' does not exist")]
    UnknownRelationshipType(String),

    /// A structural variation with the same id already exists on the entity
    #[error("Variation {variation_id} already exists on entity '{entity}'")]
    DuplicateVariation { entity: String, variation_id: u32 },

    /// A named structural variation could not be resolved
    #[error("Variation {variation_id} does not exist on entity '{entity}'")]
    UnknownVariation { entity: String, variation_id: u32 },

    /// An operation requires a primary key the entity does not have
    #[error("Entity '{0}' has no primary key")]
    MissingPrimaryKey(String),

    /// An operation's preconditions were not met
    #[error("{0}")]
    Operation(String),

    /// Migration program text could not be parsed
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A native schema could not be imported or emitted
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    /// Create an operation-precondition error.
    pub fn operation(message: impl Into<String>) -> Self {
        SchemaError::Operation(message.into())
    }

    /// Create a parse error pinned to a source line.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        SchemaError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an adapter-boundary error.
    pub fn adapter(message: impl Into<String>) -> Self {
        SchemaError::Adapter(message.into())
    }
}

/// Result type alias for schema migration operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
