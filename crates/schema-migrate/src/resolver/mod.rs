//! Dependency ordering over reference edges, plus the delayed two-pass
//! reference-resolution used by adapters during import.
//!
//! An entity A depends on entity B when A holds a Reference to B.
//! Self-references are excluded from the edge set so they never produce a
//! false cycle. The sort is a depth-first traversal with a visiting set
//! (mark on enter) and a done set (mark on exit), emitting entities in
//! post-order of first visit — mutual references therefore terminate
//! instead of looping, at the cost of an arbitrary but stable order inside
//! the cycle.

use std::collections::HashSet;

use tracing::debug;

use crate::core::{Cardinality, Database, Relationship};
use crate::error::Result;

/// Total order of entity names such that, for an acyclic reference graph,
/// every referenced entity appears strictly before every entity holding a
/// Reference to it. Used for native relational emission ordering.
pub fn dependency_order(db: &Database) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(db.entity_types.len());
    let mut visiting: HashSet<String> = HashSet::new();
    let mut done: HashSet<String> = HashSet::new();

    fn visit(
        db: &Database,
        name: &str,
        visiting: &mut HashSet<String>,
        done: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if done.contains(name) || visiting.contains(name) {
            return;
        }
        visiting.insert(name.to_string());
        if let Some(entity) = db.entity(name) {
            for rel in entity.get_references() {
                let target = rel.target();
                // Self-references carry no ordering constraint.
                if target != name && db.contains_entity(target) {
                    visit(db, target, visiting, done, order);
                }
            }
        }
        visiting.remove(name);
        done.insert(name.to_string());
        order.push(name.to_string());
    }

    for name in db.entity_types.keys() {
        visit(db, name, &mut visiting, &mut done, &mut order);
    }
    order
}

/// A reference observed before its target necessarily exists.
///
/// Adapters record these tuples while creating entities, then resolve them
/// all once the full entity set is known, so a reference to a
/// later-declared entity still resolves correctly.
#[derive(Debug, Clone)]
pub struct PendingReference {
    /// Entity that will own the reference.
    pub source: String,
    /// Reference (foreign-key) name on the source entity.
    pub name: String,
    /// Target entity name.
    pub target: String,
    pub cardinality: Cardinality,
    pub is_optional: bool,
}

/// Second pass of import: materialize each pending tuple as a Reference on
/// its source entity. Tuples whose source or target no longer exists are
/// skipped with a debug log rather than failing the import — best effort at
/// the adapter boundary. Returns how many references were created.
pub fn resolve_pending(db: &mut Database, pending: Vec<PendingReference>) -> Result<usize> {
    let mut resolved = 0;
    for p in pending {
        if !db.contains_entity(&p.target) {
            debug!(source = %p.source, target = %p.target, "skipping dangling reference");
            continue;
        }
        let Some(entity) = db.entity_mut(&p.source) else {
            debug!(source = %p.source, "skipping reference on removed entity");
            continue;
        };
        entity.add_relationship(Relationship::reference(
            p.name,
            p.target,
            p.cardinality,
            p.is_optional,
        ))?;
        resolved += 1;
    }
    Ok(resolved)
}
