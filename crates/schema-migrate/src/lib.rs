//! # schema-migrate
//!
//! Cross-paradigm database schema migration library.
//!
//! Schemas from relational, document, graph, and columnar databases are
//! imported into a single canonical model, reshaped by an ordered program
//! of migration operations, and exported back out. Core pieces:
//!
//! - **Canonical model** of entities, attributes, relationships, and keys
//! - **Migration language** parser for declarative operation programs
//! - **Transformation engine** applying operations with fail-fast snapshots
//! - **Native adapters** for relational DDL and document JSON Schema
//! - **Type mapping** between canonical and paradigm-native types
//!
//! ## Example
//!
//! ```rust,no_run
//! use schema_migrate::{parse_program, RelationalAdapter, SchemaAdapter, TransformEngine};
//!
//! fn main() -> schema_migrate::Result<()> {
//!     let ddl = std::fs::read_to_string("schema.sql")?;
//!     let db = RelationalAdapter::new().import(&ddl, "shop")?;
//!     let program = parse_program(&std::fs::read_to_string("migration.sml")?)?;
//!     let outcome = TransformEngine::new(db).run(&program.operations);
//!     let (migrated, _diagnostics) = outcome.into_result()?;
//!     println!("{}", RelationalAdapter::new().export(&migrated)?);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod core;
pub mod engine;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod typemap;

// Re-exports for convenient access
pub use adapters::{adapter_for, DocumentAdapter, RelationalAdapter, SchemaAdapter};
pub use crate::core::{
    Attribute, Cardinality, Database, DataType, EntityKind, EntityType, Key, KeyKind, Paradigm,
    PrimitiveType, Relationship, RelationshipType,
};
pub use engine::{Diagnostic, DiagnosticKind, Operation, TransformEngine, TransformOutcome};
pub use error::{Result, SchemaError};
pub use parser::{parse_program, MigrationProgram};
