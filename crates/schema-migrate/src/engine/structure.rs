//! Structural operations: ADD, DELETE, DROP, RENAME, COPY, MOVE.
//!
//! Creation is never idempotent: adding an object that already exists
//! fails the operation. Deletions and renames cascade into dependents,
//! each ripple recorded as a diagnostic.

use crate::core::{
    Attribute, Cardinality, DataType, EntityKind, EntityType, Key, KeyKind, Relationship,
    RelationshipType, StructuralVariation,
};
use crate::error::{Result, SchemaError};

use super::{reparent_descendants, repoint_entity, root_kind, OpContext};

pub(crate) fn add_attribute(
    ctx: &mut OpContext<'_>,
    entity: &str,
    name: &str,
    data_type: &DataType,
    optional: bool,
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    let mut attr = Attribute::new(name, data_type.clone());
    if !optional {
        attr = attr.required();
    }
    e.add_attribute(attr)
}

pub(crate) fn add_reference(
    ctx: &mut OpContext<'_>,
    entity: &str,
    name: &str,
    target: &str,
    cardinality: Option<Cardinality>,
    optional: bool,
) -> Result<()> {
    if !ctx.db.contains_entity(target) {
        return Err(SchemaError::UnknownEntity(target.to_string()));
    }
    let e = ctx.db.expect_entity_mut(entity)?;
    e.add_relationship(Relationship::reference(
        name,
        target,
        cardinality.unwrap_or_default(),
        optional,
    ))
}

pub(crate) fn add_embedded(
    ctx: &mut OpContext<'_>,
    entity: &str,
    name: &str,
    target: &str,
    cardinality: Option<Cardinality>,
    optional: bool,
) -> Result<()> {
    if !ctx.db.contains_entity(target) {
        return Err(SchemaError::UnknownEntity(target.to_string()));
    }
    ctx.db.expect_entity_mut(entity)?.add_relationship(Relationship::aggregate(
        name,
        target,
        cardinality.unwrap_or_default(),
        optional,
    ))?;
    // An embedded target is no longer a root entity.
    let t = ctx.db.expect_entity_mut(target)?;
    if t.is_root {
        t.is_root = false;
        ctx.cascade(format!("'{target}' demoted to embedded: it is now aggregated"));
    }
    Ok(())
}

pub(crate) fn add_entity(
    ctx: &mut OpContext<'_>,
    name: &str,
    kind: Option<EntityKind>,
) -> Result<()> {
    let kind = kind.unwrap_or_else(|| root_kind(ctx.db.paradigm));
    ctx.db.add_entity(EntityType::new(name, kind))
}

pub(crate) fn add_key(
    ctx: &mut OpContext<'_>,
    entity: &str,
    kind: KeyKind,
    attributes: &[String],
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    e.add_key(Key::new(kind, attributes.to_vec()))
}

pub(crate) fn add_variation(
    ctx: &mut OpContext<'_>,
    entity: &str,
    variation_id: u32,
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    e.add_variation(StructuralVariation::new(variation_id))
}

pub(crate) fn add_relationship_type(
    ctx: &mut OpContext<'_>,
    name: &str,
    source: &str,
    target: &str,
    cardinality: Option<Cardinality>,
) -> Result<()> {
    if !ctx.db.contains_entity(source) {
        return Err(SchemaError::UnknownEntity(source.to_string()));
    }
    if !ctx.db.contains_entity(target) {
        return Err(SchemaError::UnknownEntity(target.to_string()));
    }
    ctx.db.add_relationship_type(RelationshipType::new(
        name,
        source,
        target,
        cardinality.unwrap_or(Cardinality::ZeroToMany),
    ))
}

pub(crate) fn delete_attribute(ctx: &mut OpContext<'_>, entity: &str, name: &str) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    if e.remove_attribute(name).is_none() {
        return Err(SchemaError::UnknownAttribute {
            entity: entity.to_string(),
            attribute: name.to_string(),
        });
    }
    let dropped = e.drop_keys_mentioning(name);
    if dropped > 0 {
        ctx.cascade(format!(
            "deleting attribute '{name}' on '{entity}' dropped {dropped} key(s)"
        ));
    }
    Ok(())
}

/// Delete a Reference (`embedded = false`) or an Aggregate
/// (`embedded = true`) by name. Deleting a reference also drops foreign
/// keys built on the same column.
pub(crate) fn delete_relationship(
    ctx: &mut OpContext<'_>,
    entity: &str,
    name: &str,
    embedded: bool,
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    match e.get_relationship(name) {
        None => {
            return Err(SchemaError::UnknownRelationship {
                entity: entity.to_string(),
                relationship: name.to_string(),
            })
        }
        Some(rel) if rel.is_aggregate() != embedded => {
            let (found, wanted) = if embedded {
                ("a reference", "an embedding")
            } else {
                ("an embedding", "a reference")
            };
            return Err(SchemaError::operation(format!(
                "'{name}' on '{entity}' is {found}, not {wanted}"
            )));
        }
        Some(_) => {}
    }
    e.remove_relationship(name);
    if !embedded {
        let before = e.keys.len();
        e.keys
            .retain(|k| !(k.kind == KeyKind::Foreign && k.attributes.iter().any(|a| a == name)));
        let dropped = before - e.keys.len();
        if dropped > 0 {
            ctx.cascade(format!(
                "deleting reference '{name}' on '{entity}' dropped {dropped} foreign key(s)"
            ));
        }
    }
    Ok(())
}

/// Delete an entity. Every relationship, foreign key and relationship type
/// elsewhere pointing at it is removed too, each with a diagnostic.
pub(crate) fn delete_entity(ctx: &mut OpContext<'_>, name: &str) -> Result<()> {
    if ctx.db.remove_entity(name).is_none() {
        return Err(SchemaError::UnknownEntity(name.to_string()));
    }
    let mut notes: Vec<String> = Vec::new();
    for e in ctx.db.entity_types.values_mut() {
        let owner = e.full_name();
        let before = e.relationships.len();
        e.relationships.retain(|r| r.target() != name);
        for _ in 0..(before - e.relationships.len()) {
            notes.push(format!(
                "deleting '{name}' removed a relationship on '{owner}'"
            ));
        }
        let before = e.keys.len();
        e.keys.retain(|k| k.referenced_entity.as_deref() != Some(name));
        for _ in 0..(before - e.keys.len()) {
            notes.push(format!(
                "deleting '{name}' removed a foreign key on '{owner}'"
            ));
        }
    }
    let dangling: Vec<String> = ctx
        .db
        .relationship_types
        .values()
        .filter(|rt| rt.source == name || rt.target == name)
        .map(|rt| rt.name.clone())
        .collect();
    for rt in dangling {
        ctx.db.remove_relationship_type(&rt);
        notes.push(format!(
            "deleting '{name}' removed relationship type '{rt}'"
        ));
    }
    for note in notes {
        ctx.cascade(note);
    }
    Ok(())
}

pub(crate) fn drop_key(ctx: &mut OpContext<'_>, entity: &str, kind: KeyKind) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    let dropped = e.drop_key(kind).ok_or_else(|| SchemaError::UnknownKey {
        entity: entity.to_string(),
        kind: kind.to_string(),
    })?;
    // Former members stop being identifying unless another singular key
    // still claims them.
    if kind.is_singular() {
        let still_claimed: Vec<String> = e
            .keys
            .iter()
            .filter(|k| k.kind.is_singular())
            .flat_map(|k| k.attributes.iter().cloned())
            .collect();
        for member in &dropped.attributes {
            if !still_claimed.contains(member) {
                if let Some(attr) = e.get_attribute_mut(member) {
                    attr.is_key = false;
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn drop_variation(
    ctx: &mut OpContext<'_>,
    entity: &str,
    variation_id: u32,
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    e.remove_variation(variation_id)
        .map(|_| ())
        .ok_or(SchemaError::UnknownVariation {
            entity: entity.to_string(),
            variation_id,
        })
}

pub(crate) fn drop_relationship_type(ctx: &mut OpContext<'_>, name: &str) -> Result<()> {
    ctx.db
        .remove_relationship_type(name)
        .map(|_| ())
        .ok_or_else(|| SchemaError::UnknownRelationshipType(name.to_string()))
}

/// Rename an entity. The new simple name replaces the last path segment;
/// every pointer to the old name (and to entities nested under it) is
/// rewritten, each rewrite a diagnostic.
pub(crate) fn rename_entity(ctx: &mut OpContext<'_>, from: &str, to: &str) -> Result<()> {
    let mut entity = ctx
        .db
        .remove_entity(from)
        .ok_or_else(|| SchemaError::UnknownEntity(from.to_string()))?;
    if let Some(last) = entity.path.last_mut() {
        *last = to.to_string();
    }
    let new_full = entity.full_name();
    if ctx.db.contains_entity(&new_full) {
        return Err(SchemaError::DuplicateEntity(new_full));
    }
    let new_path = entity.path.clone();
    ctx.db.add_entity(entity)?;
    repoint_entity(ctx, from, &new_full);
    reparent_descendants(ctx, from, &new_path);
    Ok(())
}

/// Rename an attribute or relationship within one entity. Attribute
/// renames ripple into key member lists, into the Reference paired with
/// the column by name, and into foreign keys elsewhere that reference the
/// renamed column.
pub(crate) fn rename_feature(
    ctx: &mut OpContext<'_>,
    entity: &str,
    from: &str,
    to: &str,
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    if e.get_attribute(from).is_some() {
        if e.get_attribute(to).is_some() {
            return Err(SchemaError::DuplicateAttribute {
                entity: entity.to_string(),
                attribute: to.to_string(),
            });
        }
        // A foreign-key column and its Reference share a name; they must
        // keep doing so after the rename.
        let paired = e
            .get_relationship(from)
            .map(|r| r.is_reference())
            .unwrap_or(false);
        if paired && e.get_relationship(to).is_some() {
            return Err(SchemaError::DuplicateRelationship {
                entity: entity.to_string(),
                relationship: to.to_string(),
            });
        }
        e.get_attribute_mut(from).unwrap().name = to.to_string();
        if paired {
            e.get_relationship_mut(from).unwrap().set_name(to);
        }
        for key in e.keys.iter_mut() {
            for member in key.attributes.iter_mut() {
                if member == from {
                    *member = to.to_string();
                }
            }
        }
        // Foreign keys elsewhere referencing this column follow the rename.
        let mut notes: Vec<String> = Vec::new();
        for other in ctx.db.entity_types.values_mut() {
            let owner = other.full_name();
            if owner == entity {
                continue;
            }
            for key in other.keys.iter_mut() {
                if key.referenced_entity.as_deref() == Some(entity)
                    && key.referenced_attributes.iter().any(|a| a == from)
                {
                    for referenced in key.referenced_attributes.iter_mut() {
                        if referenced == from {
                            *referenced = to.to_string();
                        }
                    }
                    notes.push(format!(
                        "foreign key on '{owner}' now references '{entity}.{to}'"
                    ));
                }
            }
        }
        for note in notes {
            ctx.cascade(note);
        }
        Ok(())
    } else if e.get_relationship(from).is_some() {
        if e.get_relationship(to).is_some() {
            return Err(SchemaError::DuplicateRelationship {
                entity: entity.to_string(),
                relationship: to.to_string(),
            });
        }
        e.get_relationship_mut(from).unwrap().set_name(to);
        Ok(())
    } else {
        Err(SchemaError::operation(format!(
            "entity '{entity}' has no attribute or relationship '{from}'"
        )))
    }
}

pub(crate) fn rename_relationship_type(
    ctx: &mut OpContext<'_>,
    from: &str,
    to: &str,
) -> Result<()> {
    if ctx.db.relationship_type(to).is_some() {
        return Err(SchemaError::DuplicateRelationshipType(to.to_string()));
    }
    let mut rt = ctx
        .db
        .remove_relationship_type(from)
        .ok_or_else(|| SchemaError::UnknownRelationshipType(from.to_string()))?;
    rt.name = to.to_string();
    ctx.db.add_relationship_type(rt)
}

/// COPY (and, with `remove_source`, MOVE) an attribute or relationship to
/// another entity. Moving the only embedding of a nested entity relocates
/// the nested entity under the destination's path.
pub(crate) fn copy_feature(
    ctx: &mut OpContext<'_>,
    entity: &str,
    feature: &str,
    to: &str,
    remove_source: bool,
) -> Result<()> {
    if !ctx.db.contains_entity(to) {
        return Err(SchemaError::UnknownEntity(to.to_string()));
    }
    let source = ctx.db.expect_entity(entity)?;

    if let Some(attr) = source.get_attribute(feature) {
        let copied = attr.duplicate(None);
        ctx.db.expect_entity_mut(to)?.add_attribute(copied)?;
        if remove_source {
            let src = ctx.db.expect_entity_mut(entity)?;
            src.remove_attribute(feature);
            let dropped = src.drop_keys_mentioning(feature);
            if dropped > 0 {
                ctx.cascade(format!(
                    "moving attribute '{feature}' off '{entity}' dropped {dropped} key(s)"
                ));
            }
        }
        return Ok(());
    }

    let Some(rel) = source.get_relationship(feature).cloned() else {
        return Err(SchemaError::operation(format!(
            "entity '{entity}' has no attribute or relationship '{feature}'"
        )));
    };

    if rel.is_reference() {
        ctx.db.expect_entity_mut(to)?.add_relationship(rel)?;
        if remove_source {
            ctx.db.expect_entity_mut(entity)?.remove_relationship(feature);
        }
        return Ok(());
    }

    // Aggregate: the embedded entity travels with the relationship.
    let child_old = rel.target().to_string();
    let sole_owner = ctx
        .db
        .entity_types
        .values()
        .flat_map(|e| e.relationships.iter())
        .filter(|r| r.is_aggregate() && r.target() == child_old)
        .count()
        == 1;

    if remove_source && sole_owner {
        // Relocate in place.
        ctx.db.expect_entity_mut(entity)?.remove_relationship(feature);
        if let Some(mut child) = ctx.db.remove_entity(&child_old) {
            let simple = child.name().to_string();
            let mut new_path = ctx.db.expect_entity(to)?.path.clone();
            new_path.push(simple);
            child.path = new_path.clone();
            let new_full = child.full_name();
            ctx.db.add_entity(child)?;
            let mut moved = rel;
            moved.set_target(&new_full);
            ctx.db.expect_entity_mut(to)?.add_relationship(moved)?;
            repoint_entity(ctx, &child_old, &new_full);
            reparent_descendants(ctx, &child_old, &new_path);
        } else {
            ctx.db.expect_entity_mut(to)?.add_relationship(rel)?;
        }
    } else {
        // Duplicate the embedded entity under the destination's path.
        let new_full = if let Some(child) = ctx.db.entity(&child_old).cloned() {
            let mut copy_path = ctx.db.expect_entity(to)?.path.clone();
            copy_path.push(child.name().to_string());
            let mut copy = EntityType::nested(copy_path, child.kind);
            for attr in &child.attributes {
                copy.attributes.push(attr.duplicate(None));
            }
            copy.relationships = child.relationships.clone();
            copy.keys = child.keys.clone();
            let name = copy.full_name();
            ctx.db.add_entity(copy)?;
            name
        } else {
            child_old.clone()
        };
        let copied =
            Relationship::aggregate(feature, new_full, rel.cardinality(), rel.is_optional());
        ctx.db.expect_entity_mut(to)?.add_relationship(copied)?;
        if remove_source {
            ctx.db.expect_entity_mut(entity)?.remove_relationship(feature);
        }
    }
    Ok(())
}
