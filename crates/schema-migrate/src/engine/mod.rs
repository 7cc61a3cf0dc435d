//! Transformation engine: applies an ordered operation program to a
//! Database, producing the transformed model plus a diagnostics list.
//!
//! Execution is a deterministic, strictly sequential fold over the
//! operation list: each operation sees the cumulative effect of all prior
//! operations, nothing runs in parallel and nothing is skipped silently.
//! The engine has exactly two states — running and, on the first
//! unrecoverable failure, failed. Once failed it performs no further
//! operations and returns the diagnostics collected so far together with
//! the last consistent model snapshot (taken before the failing
//! operation). There is no rollback across previously committed
//! operations; the caller decides whether to keep the partial result.

mod nesting;
mod ops;
mod reshape;
mod structure;

pub use ops::{Diagnostic, DiagnosticKind, EdgeProperty, Operation, ReferenceClause, SplitSide};

use tracing::{debug, warn};

use crate::core::{Attribute, Database, DataType, EntityType, Key, PrimitiveType, Relationship};
use crate::error::{Result, SchemaError};

/// Where and why a program stopped.
#[derive(Debug)]
pub struct OperationFailure {
    /// Zero-based index of the failing operation.
    pub index: usize,
    /// Operation kind name (`"UNWIND"`, `"MERGE"`, ...).
    pub kind: &'static str,
    pub error: SchemaError,
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "operation {} ({}) failed: {}",
            self.index, self.kind, self.error
        )
    }
}

/// Result of running one operation program.
#[derive(Debug)]
pub struct TransformOutcome {
    /// The transformed model, or the pre-failure snapshot when `failure`
    /// is set.
    pub database: Database,
    pub diagnostics: Vec<Diagnostic>,
    pub failure: Option<OperationFailure>,
}

impl TransformOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Convert into a plain result, discarding the partial model on failure.
    pub fn into_result(self) -> Result<(Database, Vec<Diagnostic>)> {
        match self.failure {
            None => Ok((self.database, self.diagnostics)),
            Some(f) => Err(f.error),
        }
    }
}

/// The engine. Exclusively owns the model for the duration of one
/// program's execution; concurrent programs against the same Database must
/// be serialized by the caller.
pub struct TransformEngine {
    db: Database,
}

impl TransformEngine {
    pub fn new(database: Database) -> Self {
        TransformEngine { db: database }
    }

    /// Apply the program, one operation at a time.
    pub fn run(mut self, program: &[Operation]) -> TransformOutcome {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();

        for (index, op) in program.iter().enumerate() {
            debug!(index, kind = op.kind(), "applying operation");
            let snapshot = self.db.clone();
            let mut ctx = OpContext {
                db: &mut self.db,
                index,
                diagnostics: &mut diagnostics,
            };
            if let Err(error) = apply(&mut ctx, op) {
                warn!(index, kind = op.kind(), %error, "operation failed; stopping");
                return TransformOutcome {
                    database: snapshot,
                    diagnostics,
                    failure: Some(OperationFailure {
                        index,
                        kind: op.kind(),
                        error,
                    }),
                };
            }
            self.db.increment_version();
        }

        TransformOutcome {
            database: self.db,
            diagnostics,
            failure: None,
        }
    }
}

/// Mutable view handed to each operation implementation.
pub(crate) struct OpContext<'a> {
    pub db: &'a mut Database,
    pub index: usize,
    pub diagnostics: &'a mut Vec<Diagnostic>,
}

impl OpContext<'_> {
    pub fn cascade(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::cascade(self.index, message));
    }

    pub fn lossy_cast(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::lossy_cast(self.index, message));
    }
}

fn apply(ctx: &mut OpContext<'_>, op: &Operation) -> Result<()> {
    match op {
        Operation::Nest {
            source,
            target,
            alias,
            cardinality,
        } => nesting::nest(ctx, source, target, alias, *cardinality),
        Operation::Unnest { source, target } => nesting::unnest(ctx, source, target),
        Operation::Flatten {
            entity,
            aggregate,
            name,
            reference,
        } => nesting::flatten(ctx, entity, aggregate, name, reference.as_ref()),
        Operation::Unwind {
            entity,
            feature,
            alias,
            generate_key,
            reference,
        } => nesting::unwind(
            ctx,
            entity,
            feature,
            alias,
            generate_key.as_deref(),
            reference.as_ref(),
        ),

        Operation::AddAttribute {
            entity,
            name,
            data_type,
            optional,
        } => structure::add_attribute(ctx, entity, name, data_type, *optional),
        Operation::AddReference {
            entity,
            name,
            target,
            cardinality,
            optional,
        } => structure::add_reference(ctx, entity, name, target, *cardinality, *optional),
        Operation::AddEmbedded {
            entity,
            name,
            target,
            cardinality,
            optional,
        } => structure::add_embedded(ctx, entity, name, target, *cardinality, *optional),
        Operation::AddEntity { name, kind } => structure::add_entity(ctx, name, *kind),
        Operation::AddKey {
            entity,
            kind,
            attributes,
        } => structure::add_key(ctx, entity, *kind, attributes),
        Operation::AddVariation {
            entity,
            variation_id,
        } => structure::add_variation(ctx, entity, *variation_id),
        Operation::AddRelationshipType {
            name,
            source,
            target,
            cardinality,
        } => structure::add_relationship_type(ctx, name, source, target, *cardinality),

        Operation::DeleteAttribute { entity, name } => {
            structure::delete_attribute(ctx, entity, name)
        }
        Operation::DeleteReference { entity, name } => {
            structure::delete_relationship(ctx, entity, name, false)
        }
        Operation::DeleteEmbedded { entity, name } => {
            structure::delete_relationship(ctx, entity, name, true)
        }
        Operation::DeleteEntity { name } => structure::delete_entity(ctx, name),
        Operation::DropKey { entity, kind } => structure::drop_key(ctx, entity, *kind),
        Operation::DropVariation {
            entity,
            variation_id,
        } => structure::drop_variation(ctx, entity, *variation_id),
        Operation::DropRelationshipType { name } => structure::drop_relationship_type(ctx, name),

        Operation::RenameEntity { from, to } => structure::rename_entity(ctx, from, to),
        Operation::RenameFeature { entity, from, to } => {
            structure::rename_feature(ctx, entity, from, to)
        }
        Operation::RenameRelationshipType { from, to } => {
            structure::rename_relationship_type(ctx, from, to)
        }

        Operation::Copy {
            entity,
            feature,
            to,
        } => structure::copy_feature(ctx, entity, feature, to, false),
        Operation::Move {
            entity,
            feature,
            to,
        } => structure::copy_feature(ctx, entity, feature, to, true),

        Operation::Merge { left, right, into } => reshape::merge(ctx, left, right, into),
        Operation::Split {
            entity,
            left,
            right,
        } => reshape::split(ctx, entity, left, right),
        Operation::Cast {
            entity,
            attribute,
            data_type,
        } => reshape::cast(ctx, entity, attribute, data_type),
        Operation::Linking {
            source,
            target,
            name,
            cardinality,
            properties,
        } => reshape::linking(ctx, source, target, name, *cardinality, properties),
        Operation::Extract {
            entity,
            attributes,
            name,
            reference,
        } => reshape::extract(ctx, entity, attributes, name, reference.as_ref()),
    }
}

// ----- helpers shared by the operation implementations -----

/// Rewrite every Reference/Aggregate target, RelationshipType endpoint and
/// FOREIGN-key referenced entity equal to `old` so it names `new`,
/// emitting one cascade diagnostic per rewrite.
pub(crate) fn repoint_entity(ctx: &mut OpContext<'_>, old: &str, new: &str) {
    // A rename onto itself (SPLIT reusing the source name) is not a ripple.
    if old == new {
        return;
    }
    let mut notes: Vec<String> = Vec::new();
    for entity in ctx.db.entity_types.values_mut() {
        let owner = entity.full_name();
        for rel in entity.relationships.iter_mut() {
            if rel.target() == old {
                rel.set_target(new);
                notes.push(format!(
                    "relationship '{}' on '{}' repointed from '{}' to '{}'",
                    rel.name(),
                    owner,
                    old,
                    new
                ));
            }
        }
        for key in entity.keys.iter_mut() {
            if key.referenced_entity.as_deref() == Some(old) {
                key.referenced_entity = Some(new.to_string());
                notes.push(format!(
                    "foreign key on '{}' repointed from '{}' to '{}'",
                    owner, old, new
                ));
            }
        }
    }
    for rel_type in ctx.db.relationship_types.values_mut() {
        if rel_type.source == old {
            rel_type.source = new.to_string();
            notes.push(format!(
                "relationship type '{}' source repointed to '{}'",
                rel_type.name, new
            ));
        }
        if rel_type.target == old {
            rel_type.target = new.to_string();
            notes.push(format!(
                "relationship type '{}' target repointed to '{}'",
                rel_type.name, new
            ));
        }
    }
    for note in notes {
        ctx.cascade(note);
    }
}

/// Re-register every entity nested under `old_full` beneath `new_path`,
/// repointing relationships to each moved entity along the way.
pub(crate) fn reparent_descendants(ctx: &mut OpContext<'_>, old_full: &str, new_path: &[String]) {
    let prefix = format!("{old_full}.");
    let moved: Vec<String> = ctx
        .db
        .entity_types
        .keys()
        .filter(|k| k.starts_with(&prefix))
        .cloned()
        .collect();
    let old_segments = old_full.split('.').count();
    for old_name in moved {
        let Some(mut entity) = ctx.db.remove_entity(&old_name) else {
            continue;
        };
        let tail: Vec<String> = entity.path.split_off(old_segments);
        entity.path = new_path.to_vec();
        entity.path.extend(tail);
        let new_name = entity.full_name();
        if ctx.db.add_entity(entity).is_ok() {
            repoint_entity(ctx, &old_name, &new_name);
        }
    }
}

/// Entity kind for a root (top-level) entity in the given paradigm.
pub(crate) fn root_kind(paradigm: crate::core::Paradigm) -> crate::core::EntityKind {
    use crate::core::{EntityKind, Paradigm};
    match paradigm {
        Paradigm::Relational => EntityKind::Table,
        Paradigm::Document => EntityKind::Document,
        Paradigm::Graph => EntityKind::Vertex,
        Paradigm::Columnar => EntityKind::WideColumnTable,
    }
}

/// Foreign-key column name for one member of a parent's key:
/// `person` + `_id` -> `person_id`.
pub(crate) fn fk_column_name(parent: &EntityType, member: &str) -> String {
    format!("{}_{}", parent.name(), member.trim_start_matches('_'))
}

/// Data type for a foreign-key column pointing at `target`: the type of
/// the target's first primary-key member, falling back to `long`.
pub(crate) fn fk_column_type(db: &Database, target: &str) -> DataType {
    db.entity(target)
        .and_then(|e| {
            let pk = e.get_primary_key()?;
            let first = pk.attributes.first()?;
            e.get_attribute(first).map(|a| a.data_type.clone())
        })
        .unwrap_or_else(|| DataType::primitive(PrimitiveType::Long))
}

/// Apply an `ADD REFERENCE fk TO target` clause to `holder`: ensure the
/// foreign-key attribute exists, then add the Reference and FOREIGN key.
pub(crate) fn apply_reference_clause(
    db: &mut Database,
    holder: &str,
    clause: &ReferenceClause,
) -> Result<()> {
    if !db.contains_entity(&clause.target) {
        return Err(SchemaError::UnknownEntity(clause.target.clone()));
    }
    let fk_type = fk_column_type(db, &clause.target);
    let target_pk_members: Vec<String> = db
        .entity(&clause.target)
        .and_then(|e| e.get_primary_key())
        .map(|k| k.attributes.clone())
        .unwrap_or_default();

    let entity = db.expect_entity_mut(holder)?;
    if entity.get_attribute(&clause.name).is_none() {
        entity.add_attribute(Attribute::new(clause.name.clone(), fk_type).required())?;
    }
    entity.add_relationship(Relationship::reference(
        clause.name.clone(),
        clause.target.clone(),
        crate::core::Cardinality::OneToOne,
        false,
    ))?;
    entity.add_key(Key::foreign(
        vec![clause.name.clone()],
        clause.target.clone(),
        target_pk_members,
    ))?;
    Ok(())
}
