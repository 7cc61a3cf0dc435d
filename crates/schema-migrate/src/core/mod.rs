//! Canonical schema model (unified meta schema).
//!
//! These types are the engine's sole working representation: a
//! paradigm-neutral entity-relationship graph that every native format is
//! imported into and exported from.

mod datatype;
mod model;

pub use datatype::{DataType, PrimitiveType};
pub use model::{
    Attribute, Cardinality, Database, EntityKind, EntityType, Key, KeyKind, Paradigm,
    Relationship, RelationshipType, StructuralVariation,
};
