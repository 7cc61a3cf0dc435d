//! Operation records consumed by the transformation engine.
//!
//! A migration program is an ordered list of these records. The engine
//! accepts the list independent of how it was produced — hand-built or
//! parsed from SMEL text by [`crate::parser`].

use serde::{Deserialize, Serialize};

use crate::core::{Cardinality, DataType, EntityKind, KeyKind};

/// Optional `ADD REFERENCE fk TO target` clause carried by FLATTEN, UNWIND
/// and EXTRACT: creates a foreign-key attribute named `name` on the
/// produced entity, referencing `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceClause {
    pub name: String,
    pub target: String,
}

/// One side of a SPLIT: the new entity name and the attributes assigned
/// to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSide {
    pub name: String,
    pub attributes: Vec<String>,
}

/// A property on a graph edge type (`LINKING ... WITH PROPERTIES`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeProperty {
    pub name: String,
    pub data_type: DataType,
}

/// A single structural operation against the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Convert a Reference between `source` and `target` into an Aggregate
    /// named `alias` on `target` (relational -> document direction).
    Nest {
        source: String,
        target: String,
        alias: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cardinality: Option<Cardinality>,
    },
    /// Convert the Aggregate named `source` on `target` back into a
    /// Reference to a standalone entity.
    Unnest { source: String, target: String },
    /// Extract the embedded entity behind `entity`.`aggregate` into a
    /// top-level entity named `name`.
    Flatten {
        entity: String,
        aggregate: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<ReferenceClause>,
    },
    /// Normalize a many-valued aggregate (or list/set attribute) into a
    /// child entity with a foreign key back to the parent.
    Unwind {
        entity: String,
        feature: String,
        alias: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generate_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<ReferenceClause>,
    },

    AddAttribute {
        entity: String,
        name: String,
        data_type: DataType,
        #[serde(default)]
        optional: bool,
    },
    AddReference {
        entity: String,
        name: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cardinality: Option<Cardinality>,
        #[serde(default)]
        optional: bool,
    },
    AddEmbedded {
        entity: String,
        name: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cardinality: Option<Cardinality>,
        #[serde(default)]
        optional: bool,
    },
    AddEntity {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<EntityKind>,
    },
    AddKey {
        entity: String,
        kind: KeyKind,
        attributes: Vec<String>,
    },
    AddVariation {
        entity: String,
        variation_id: u32,
    },
    AddRelationshipType {
        name: String,
        source: String,
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cardinality: Option<Cardinality>,
    },

    DeleteAttribute {
        entity: String,
        name: String,
    },
    DeleteReference {
        entity: String,
        name: String,
    },
    DeleteEmbedded {
        entity: String,
        name: String,
    },
    /// Cascades: every relationship elsewhere targeting the entity is also
    /// removed, each with a diagnostic.
    DeleteEntity {
        name: String,
    },
    DropKey {
        entity: String,
        kind: KeyKind,
    },
    DropVariation {
        entity: String,
        variation_id: u32,
    },
    DropRelationshipType {
        name: String,
    },

    /// Renames propagate: every Reference/Aggregate/RelationshipType whose
    /// target names the old entity is rewritten as part of this operation.
    RenameEntity {
        from: String,
        to: String,
    },
    /// Rename an attribute or relationship within one entity.
    RenameFeature {
        entity: String,
        from: String,
        to: String,
    },
    RenameRelationshipType {
        from: String,
        to: String,
    },

    /// Duplicate an attribute or embedded sub-structure onto another entity.
    Copy {
        entity: String,
        feature: String,
        to: String,
    },
    /// Copy, then remove the source feature.
    Move {
        entity: String,
        feature: String,
        to: String,
    },

    Merge {
        left: String,
        right: String,
        into: String,
    },
    Split {
        entity: String,
        left: SplitSide,
        right: SplitSide,
    },
    Cast {
        entity: String,
        attribute: String,
        data_type: DataType,
    },
    Linking {
        source: String,
        target: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cardinality: Option<Cardinality>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        properties: Vec<EdgeProperty>,
    },
    Extract {
        entity: String,
        attributes: Vec<String>,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<ReferenceClause>,
    },
}

impl Operation {
    /// Operation kind name used in diagnostics and failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Nest { .. } => "NEST",
            Operation::Unnest { .. } => "UNNEST",
            Operation::Flatten { .. } => "FLATTEN",
            Operation::Unwind { .. } => "UNWIND",
            Operation::AddAttribute { .. } => "ADD ATTRIBUTE",
            Operation::AddReference { .. } => "ADD REFERENCE",
            Operation::AddEmbedded { .. } => "ADD EMBEDDED",
            Operation::AddEntity { .. } => "ADD ENTITY",
            Operation::AddKey { .. } => "ADD KEY",
            Operation::AddVariation { .. } => "ADD VARIATION",
            Operation::AddRelationshipType { .. } => "ADD RELTYPE",
            Operation::DeleteAttribute { .. } => "DELETE ATTRIBUTE",
            Operation::DeleteReference { .. } => "DELETE REFERENCE",
            Operation::DeleteEmbedded { .. } => "DELETE EMBEDDED",
            Operation::DeleteEntity { .. } => "DELETE ENTITY",
            Operation::DropKey { .. } => "DROP KEY",
            Operation::DropVariation { .. } => "DROP VARIATION",
            Operation::DropRelationshipType { .. } => "DROP RELTYPE",
            Operation::RenameEntity { .. } => "RENAME ENTITY",
            Operation::RenameFeature { .. } => "RENAME",
            Operation::RenameRelationshipType { .. } => "RENAME RELTYPE",
            Operation::Copy { .. } => "COPY",
            Operation::Move { .. } => "MOVE",
            Operation::Merge { .. } => "MERGE",
            Operation::Split { .. } => "SPLIT",
            Operation::Cast { .. } => "CAST",
            Operation::Linking { .. } => "LINKING",
            Operation::Extract { .. } => "EXTRACT",
        }
    }
}

/// Category of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A DELETE/RENAME/MERGE rippled into another entity.
    Cascade,
    /// A CAST narrowed the attribute's value space.
    LossyCast,
}

/// Informational record emitted while applying an operation. Diagnostics
/// never stop execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Index of the operation that produced this record.
    pub operation_index: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn cascade(operation_index: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            operation_index,
            kind: DiagnosticKind::Cascade,
            message: message.into(),
        }
    }

    pub fn lossy_cast(operation_index: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            operation_index,
            kind: DiagnosticKind::LossyCast,
            message: message.into(),
        }
    }
}
