//! Nesting-axis operations: NEST, UNNEST, FLATTEN, UNWIND.
//!
//! These four move structure between the reference world (normalized,
//! relational-shaped) and the aggregation world (embedded,
//! document-shaped). NEST/UNNEST convert a single relationship in place;
//! FLATTEN/UNWIND promote embedded structure to top-level entities,
//! UNWIND additionally normalizing many-valued features into child rows
//! keyed back to their parent.

use crate::core::{
    Attribute, Cardinality, DataType, EntityKind, EntityType, Key, PrimitiveType, Relationship,
};
use crate::error::{Result, SchemaError};

use super::{
    apply_reference_clause, fk_column_type, reparent_descendants, repoint_entity, root_kind,
    OpContext, ReferenceClause,
};

/// NEST source INTO target AS alias: replace the Reference joining the two
/// entities (either direction) with an Aggregate named `alias` on `target`.
/// If `source` is already embedded elsewhere it is copied under the new
/// owner's path; otherwise it is demoted in place.
pub(crate) fn nest(
    ctx: &mut OpContext<'_>,
    source: &str,
    target: &str,
    alias: &str,
    cardinality: Option<Cardinality>,
) -> Result<()> {
    if !ctx.db.contains_entity(source) {
        return Err(SchemaError::UnknownEntity(source.to_string()));
    }
    if !ctx.db.contains_entity(target) {
        return Err(SchemaError::UnknownEntity(target.to_string()));
    }

    let find_ref = |e: &EntityType, t: &str| {
        e.relationships
            .iter()
            .find(|r| r.is_reference() && r.target() == t)
            .map(|r| r.name().to_string())
    };
    let (holder, ref_name) = {
        let tgt = ctx.db.expect_entity(target)?;
        if let Some(name) = find_ref(tgt, source) {
            (target.to_string(), name)
        } else {
            let src = ctx.db.expect_entity(source)?;
            match find_ref(src, target) {
                Some(name) => (source.to_string(), name),
                None => {
                    return Err(SchemaError::operation(format!(
                        "NEST: no reference between '{source}' and '{target}'"
                    )))
                }
            }
        }
    };

    // Retire the reference and its backing foreign-key column.
    let (removed, dropped_keys, dropped_column) = {
        let h = ctx.db.expect_entity_mut(&holder)?;
        let rel = h
            .remove_relationship(&ref_name)
            .ok_or_else(|| SchemaError::UnknownRelationship {
                entity: holder.clone(),
                relationship: ref_name.clone(),
            })?;
        let column = h.remove_attribute(&ref_name).is_some();
        let keys = if column {
            h.drop_keys_mentioning(&ref_name)
        } else {
            0
        };
        (rel, keys, column)
    };
    if dropped_column {
        ctx.cascade(format!(
            "NEST absorbed foreign-key column '{ref_name}' on '{holder}' ({dropped_keys} key(s) dropped)"
        ));
    }

    // An entity embedded by more than one owner is copied per owner.
    let embedded_elsewhere = ctx
        .db
        .entity_types
        .values()
        .any(|e| e.relationships.iter().any(|r| r.is_aggregate() && r.target() == source));
    let agg_target = if embedded_elsewhere {
        let src = ctx.db.expect_entity(source)?.clone();
        let mut path = ctx.db.expect_entity(target)?.path.clone();
        path.push(src.name().to_string());
        let mut copy = EntityType::nested(path, EntityKind::Embedded);
        for attr in &src.attributes {
            copy.attributes.push(attr.duplicate(None));
        }
        copy.relationships = src.relationships.clone();
        copy.keys = src.keys.clone();
        let copy_name = copy.full_name();
        ctx.db.add_entity(copy)?;
        ctx.cascade(format!(
            "NEST copied '{source}' as '{copy_name}': it is embedded elsewhere"
        ));
        copy_name
    } else {
        let src = ctx.db.expect_entity_mut(source)?;
        src.is_root = false;
        src.kind = EntityKind::Embedded;
        source.to_string()
    };

    let card = cardinality.unwrap_or_else(|| removed.cardinality());
    ctx.db.expect_entity_mut(target)?.add_relationship(Relationship::aggregate(
        alias,
        agg_target,
        card,
        removed.is_optional(),
    ))?;
    Ok(())
}

/// UNNEST source FROM target: convert the Aggregate named `source` on
/// `target` back into a Reference to a standalone entity. The embedded
/// entity is promoted to root under its simple name.
pub(crate) fn unnest(ctx: &mut OpContext<'_>, source: &str, target: &str) -> Result<()> {
    {
        let owner = ctx.db.expect_entity(target)?;
        match owner.get_relationship(source) {
            None => {
                return Err(SchemaError::UnknownRelationship {
                    entity: target.to_string(),
                    relationship: source.to_string(),
                })
            }
            Some(rel) if !rel.is_aggregate() => {
                return Err(SchemaError::operation(format!(
                    "UNNEST: '{source}' on '{target}' is a reference, not an embedding"
                )))
            }
            Some(_) => {}
        }
    }
    let rel = ctx
        .db
        .expect_entity_mut(target)?
        .remove_relationship(source)
        .ok_or_else(|| SchemaError::UnknownRelationship {
            entity: target.to_string(),
            relationship: source.to_string(),
        })?;
    let child_old = rel.target().to_string();
    let mut child = ctx
        .db
        .remove_entity(&child_old)
        .ok_or_else(|| SchemaError::UnknownEntity(child_old.clone()))?;

    let new_name = child.name().to_string();
    child.path = vec![new_name.clone()];
    child.is_root = true;
    if child.kind == EntityKind::Embedded {
        child.kind = root_kind(ctx.db.paradigm);
    }
    let pk_members: Vec<String> = child
        .get_primary_key()
        .map(|k| k.attributes.clone())
        .unwrap_or_default();
    let fk_type = pk_members
        .first()
        .and_then(|m| child.get_attribute(m).map(|a| a.data_type.clone()))
        .unwrap_or_else(|| DataType::primitive(PrimitiveType::Long));
    let new_path = child.path.clone();
    ctx.db.add_entity(child)?;
    if new_name != child_old {
        repoint_entity(ctx, &child_old, &new_name);
        reparent_descendants(ctx, &child_old, &new_path);
    }

    let fk_name = format!("{source}_id");
    let owner = ctx.db.expect_entity_mut(target)?;
    if owner.get_attribute(&fk_name).is_none() {
        let mut attr = Attribute::new(fk_name.clone(), fk_type);
        if !rel.is_optional() {
            attr = attr.required();
        }
        owner.add_attribute(attr)?;
    }
    owner.add_relationship(Relationship::reference(
        fk_name.clone(),
        new_name.clone(),
        rel.cardinality(),
        rel.is_optional(),
    ))?;
    if !pk_members.is_empty() {
        owner.add_key(Key::foreign(vec![fk_name], new_name, pk_members))?;
    }
    Ok(())
}

/// FLATTEN entity.aggregate INTO name: promote a singular embedded entity
/// to a top-level entity. With an `ADD REFERENCE` clause the produced
/// entity holds the foreign key (and, lacking any key of its own, uses it
/// as primary key); without one the former owner keeps a Reference to it.
/// Many-valued aggregates take the UNWIND path instead.
pub(crate) fn flatten(
    ctx: &mut OpContext<'_>,
    entity: &str,
    aggregate: &str,
    name: &str,
    reference: Option<&ReferenceClause>,
) -> Result<()> {
    let (child_old, card, optional) = {
        let owner = ctx.db.expect_entity(entity)?;
        let rel = owner
            .get_relationship(aggregate)
            .ok_or_else(|| SchemaError::UnknownRelationship {
                entity: entity.to_string(),
                relationship: aggregate.to_string(),
            })?;
        if !rel.is_aggregate() {
            return Err(SchemaError::operation(format!(
                "FLATTEN: '{aggregate}' on '{entity}' is a reference, not an embedding"
            )));
        }
        (rel.target().to_string(), rel.cardinality(), rel.is_optional())
    };
    if card.is_multiple() {
        return unwind(ctx, entity, aggregate, name, None, reference);
    }

    ctx.db.expect_entity_mut(entity)?.remove_relationship(aggregate);
    let mut child = ctx
        .db
        .remove_entity(&child_old)
        .ok_or_else(|| SchemaError::UnknownEntity(child_old.clone()))?;
    child.path = vec![name.to_string()];
    child.is_root = true;
    if child.kind == EntityKind::Embedded {
        child.kind = EntityKind::Table;
    }
    let new_path = child.path.clone();
    ctx.db.add_entity(child)?;
    if child_old != name {
        repoint_entity(ctx, &child_old, name);
        reparent_descendants(ctx, &child_old, &new_path);
    }

    match reference {
        Some(clause) => {
            apply_reference_clause(ctx.db, name, clause)?;
            // A one-to-one satellite shares its owner's identity.
            let produced = ctx.db.expect_entity_mut(name)?;
            if produced.get_primary_key().is_none() {
                produced.add_key(Key::primary(vec![clause.name.clone()]))?;
            }
        }
        None => {
            let fk_type = fk_column_type(ctx.db, name);
            let pk_members: Vec<String> = ctx
                .db
                .entity(name)
                .and_then(|e| e.get_primary_key())
                .map(|k| k.attributes.clone())
                .unwrap_or_default();
            let fk_name = format!("{name}_id");
            let owner = ctx.db.expect_entity_mut(entity)?;
            if owner.get_attribute(&fk_name).is_none() {
                let mut attr = Attribute::new(fk_name.clone(), fk_type);
                if !optional {
                    attr = attr.required();
                }
                owner.add_attribute(attr)?;
            }
            owner.add_relationship(Relationship::reference(
                fk_name.clone(),
                name,
                card,
                optional,
            ))?;
            if !pk_members.is_empty() {
                owner.add_key(Key::foreign(vec![fk_name], name, pk_members))?;
            }
        }
    }
    Ok(())
}

/// UNWIND entity.feature INTO alias: normalize a many-valued feature (an
/// embedded relationship or a list/set attribute) into a child entity
/// carrying the parent's key as a foreign key. Without `generate_key` the
/// primary key is composite: parent-key copies plus the feature's
/// identifying attributes (or all its attributes when none identify).
pub(crate) fn unwind(
    ctx: &mut OpContext<'_>,
    entity: &str,
    feature: &str,
    alias: &str,
    generate_key: Option<&str>,
    reference: Option<&ReferenceClause>,
) -> Result<()> {
    if ctx.db.contains_entity(alias) {
        return Err(SchemaError::DuplicateEntity(alias.to_string()));
    }
    let (parent_simple, pk_members, pk_types) = {
        let parent = ctx.db.expect_entity(entity)?;
        let pk = parent
            .get_primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(entity.to_string()))?;
        let members = pk.attributes.clone();
        let types: Vec<DataType> = members
            .iter()
            .map(|m| {
                parent
                    .get_attribute(m)
                    .map(|a| a.data_type.clone())
                    .unwrap_or_else(|| DataType::primitive(PrimitiveType::Long))
            })
            .collect();
        (parent.name().to_string(), members, types)
    };

    // Detach the feature and collect the child's payload.
    let (attributes, relationships, identifying, child_old) = {
        let parent = ctx.db.expect_entity(entity)?;
        if let Some(rel) = parent.get_relationship(feature) {
            if !rel.is_aggregate() {
                return Err(SchemaError::operation(format!(
                    "UNWIND: '{feature}' on '{entity}' is a reference, not an embedding"
                )));
            }
            if !rel.cardinality().is_multiple() {
                return Err(SchemaError::operation(format!(
                    "UNWIND: '{feature}' on '{entity}' is single-valued; use FLATTEN"
                )));
            }
            let child_old = rel.target().to_string();
            let child = ctx
                .db
                .entity(&child_old)
                .ok_or_else(|| SchemaError::UnknownEntity(child_old.clone()))?
                .clone();
            ctx.db.expect_entity_mut(entity)?.remove_relationship(feature);
            ctx.db.remove_entity(&child_old);

            let mut identifying: Vec<String> = child
                .attributes
                .iter()
                .filter(|a| a.is_key)
                .map(|a| a.name.clone())
                .collect();
            if identifying.is_empty() {
                identifying = child.attributes.iter().map(|a| a.name.clone()).collect();
            }
            (
                child.attributes,
                child.relationships,
                identifying,
                Some(child_old),
            )
        } else if let Some(attr) = parent.get_attribute(feature) {
            let Some(element) = attr.data_type.element_type() else {
                return Err(SchemaError::operation(format!(
                    "UNWIND: attribute '{feature}' on '{entity}' is not a collection"
                )));
            };
            let value = Attribute::new(feature, element.clone()).required();
            ctx.db.expect_entity_mut(entity)?.remove_attribute(feature);
            (vec![value], Vec::new(), vec![feature.to_string()], None)
        } else {
            return Err(SchemaError::UnknownAttribute {
                entity: entity.to_string(),
                attribute: feature.to_string(),
            });
        }
    };

    let mut child = EntityType::new(alias, EntityKind::Table);
    for attr in attributes {
        child.add_attribute(attr)?;
    }
    for rel in relationships {
        child.add_relationship(rel)?;
    }

    // Parent-key copies, named `{parent}_{member}`.
    let mut fk_names: Vec<String> = Vec::with_capacity(pk_members.len());
    for (member, ty) in pk_members.iter().zip(pk_types) {
        let fk = format!("{}_{}", parent_simple, member.trim_start_matches('_'));
        if child.get_attribute(&fk).is_none() {
            child.add_attribute(Attribute::new(fk.clone(), ty).required())?;
        }
        fk_names.push(fk);
    }
    child.add_relationship(Relationship::reference(
        fk_names[0].clone(),
        entity,
        Cardinality::OneToOne,
        false,
    ))?;
    child.add_key(Key::foreign(fk_names.clone(), entity, pk_members))?;

    match generate_key {
        Some(key_name) => {
            child.add_attribute(Attribute::key(
                key_name,
                DataType::primitive(PrimitiveType::Long),
            ))?;
            child.add_key(Key::primary(vec![key_name.to_string()]))?;
        }
        None => {
            let mut members = fk_names.clone();
            for ident in identifying {
                if !members.contains(&ident) {
                    members.push(ident);
                }
            }
            child.add_key(Key::primary(members))?;
        }
    }
    let new_path = child.path.clone();
    ctx.db.add_entity(child)?;
    if let Some(old) = child_old {
        repoint_entity(ctx, &old, alias);
        reparent_descendants(ctx, &old, &new_path);
    }

    if let Some(clause) = reference {
        // A clause naming the auto-created back reference is already done.
        if ctx
            .db
            .expect_entity(alias)?
            .get_relationship(&clause.name)
            .is_none()
        {
            apply_reference_clause(ctx.db, alias, clause)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Database, Paradigm};

    fn document_db() -> Database {
        // person with embedded singular address, embedded many-valued knows,
        // and a primitive list attribute tags.
        let mut db = Database::new("people", Paradigm::Document);

        let mut person = EntityType::new("person", EntityKind::Document);
        person
            .add_attribute(Attribute::key(
                "_id",
                DataType::primitive(PrimitiveType::ObjectId),
            ))
            .unwrap();
        person
            .add_attribute(Attribute::new("name", DataType::primitive(PrimitiveType::String)))
            .unwrap();
        person
            .add_attribute(Attribute::new(
                "tags",
                DataType::list(DataType::primitive(PrimitiveType::String)),
            ))
            .unwrap();
        person.add_key(Key::primary(vec!["_id".into()])).unwrap();
        person
            .add_relationship(Relationship::aggregate(
                "address",
                "person.address",
                Cardinality::OneToOne,
                false,
            ))
            .unwrap();
        person
            .add_relationship(Relationship::aggregate(
                "knows",
                "person.knows",
                Cardinality::ZeroToMany,
                true,
            ))
            .unwrap();
        db.add_entity(person).unwrap();

        let mut address = EntityType::nested(
            vec!["person".into(), "address".into()],
            EntityKind::Embedded,
        );
        address
            .add_attribute(Attribute::new("street", DataType::primitive(PrimitiveType::String)))
            .unwrap();
        address
            .add_attribute(Attribute::new("city", DataType::primitive(PrimitiveType::String)))
            .unwrap();
        db.add_entity(address).unwrap();

        let mut knows = EntityType::nested(
            vec!["person".into(), "knows".into()],
            EntityKind::Embedded,
        );
        knows
            .add_attribute(Attribute::new(
                "knows_person_id",
                DataType::primitive(PrimitiveType::ObjectId),
            ))
            .unwrap();
        db.add_entity(knows).unwrap();
        db
    }

    fn relational_db() -> Database {
        let mut db = Database::new("shop", Paradigm::Relational);
        let mut person = EntityType::new("person", EntityKind::Table);
        person
            .add_attribute(Attribute::key(
                "id",
                DataType::primitive(PrimitiveType::Integer),
            ))
            .unwrap();
        person.add_key(Key::primary(vec!["id".into()])).unwrap();
        db.add_entity(person).unwrap();

        let mut address = EntityType::new("address", EntityKind::Table);
        address
            .add_attribute(Attribute::key(
                "id",
                DataType::primitive(PrimitiveType::Integer),
            ))
            .unwrap();
        address
            .add_attribute(Attribute::new("street", DataType::string(200)))
            .unwrap();
        address.add_key(Key::primary(vec!["id".into()])).unwrap();
        db.add_entity(address).unwrap();

        let person = db.entity_mut("person").unwrap();
        person
            .add_attribute(Attribute::new(
                "address_id",
                DataType::primitive(PrimitiveType::Integer),
            ))
            .unwrap();
        person
            .add_relationship(Relationship::reference(
                "address_id",
                "address",
                Cardinality::OneToOne,
                false,
            ))
            .unwrap();
        person
            .add_key(Key::foreign(
                vec!["address_id".into()],
                "address",
                vec!["id".into()],
            ))
            .unwrap();
        db.add_entity(EntityType::new("company", EntityKind::Table))
            .unwrap();
        db
    }

    fn ctx<'a>(db: &'a mut Database, diags: &'a mut Vec<super::super::Diagnostic>) -> OpContext<'a> {
        OpContext {
            db,
            index: 0,
            diagnostics: diags,
        }
    }

    #[test]
    fn test_nest_converts_reference_to_aggregate() {
        let mut db = relational_db();
        let mut diags = Vec::new();
        nest(
            &mut ctx(&mut db, &mut diags),
            "address",
            "person",
            "address",
            None,
        )
        .unwrap();

        let person = db.entity("person").unwrap();
        let rel = person.get_relationship("address").unwrap();
        assert!(rel.is_aggregate());
        assert_eq!(rel.target(), "address");
        // The fk column is gone along with its key.
        assert!(person.get_attribute("address_id").is_none());
        assert!(person.get_foreign_keys().is_empty());
        // The nested entity is demoted.
        let address = db.entity("address").unwrap();
        assert!(!address.is_root);
        assert_eq!(address.kind, EntityKind::Embedded);
    }

    #[test]
    fn test_nest_without_reference_fails() {
        let mut db = relational_db();
        let mut diags = Vec::new();
        let err = nest(
            &mut ctx(&mut db, &mut diags),
            "company",
            "person",
            "employer",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Operation(_)));
    }

    #[test]
    fn test_unnest_promotes_embedded_entity() {
        let mut db = document_db();
        let mut diags = Vec::new();
        unnest(&mut ctx(&mut db, &mut diags), "address", "person").unwrap();

        assert!(db.entity("person.address").is_none());
        let address = db.entity("address").unwrap();
        assert!(address.is_root);
        assert_eq!(address.kind, EntityKind::Document);

        let person = db.entity("person").unwrap();
        assert!(person.get_relationship("address").is_none());
        let rel = person.get_relationship("address_id").unwrap();
        assert!(rel.is_reference());
        assert_eq!(rel.target(), "address");
    }

    #[test]
    fn test_flatten_with_reference_clause_keys_produced_entity() {
        let mut db = document_db();
        let mut diags = Vec::new();
        flatten(
            &mut ctx(&mut db, &mut diags),
            "person",
            "address",
            "address",
            Some(&ReferenceClause {
                name: "address_id".into(),
                target: "person".into(),
            }),
        )
        .unwrap();

        let address = db.entity("address").unwrap();
        assert!(address.is_root);
        assert_eq!(address.kind, EntityKind::Table);
        // The produced entity holds the fk and uses it as its key.
        let fk = address.get_attribute("address_id").unwrap();
        assert_eq!(
            fk.data_type.as_primitive(),
            Some(PrimitiveType::ObjectId)
        );
        assert_eq!(address.get_relationship("address_id").unwrap().target(), "person");
        assert_eq!(
            address.get_primary_key().unwrap().attributes,
            vec!["address_id".to_string()]
        );
        // The owner keeps no reference in this direction.
        let person = db.entity("person").unwrap();
        assert!(person.get_relationship("address").is_none());
        assert!(person.get_relationship("address_id").is_none());
    }

    #[test]
    fn test_flatten_without_clause_gives_owner_the_reference() {
        let mut db = document_db();
        let mut diags = Vec::new();
        // Give the embedded address its own key first.
        let addr = db.entity_mut("person.address").unwrap();
        addr.add_attribute(Attribute::key(
            "code",
            DataType::primitive(PrimitiveType::String),
        ))
        .unwrap();
        addr.add_key(Key::primary(vec!["code".into()])).unwrap();

        flatten(
            &mut ctx(&mut db, &mut diags),
            "person",
            "address",
            "address",
            None,
        )
        .unwrap();

        let person = db.entity("person").unwrap();
        let rel = person.get_relationship("address_id").unwrap();
        assert!(rel.is_reference());
        assert_eq!(rel.target(), "address");
        let fks = person.get_foreign_keys();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].referenced_attributes, vec!["code".to_string()]);
    }

    #[test]
    fn test_unwind_list_attribute_builds_composite_key() {
        let mut db = document_db();
        let mut diags = Vec::new();
        unwind(
            &mut ctx(&mut db, &mut diags),
            "person",
            "tags",
            "person_tag",
            None,
            None,
        )
        .unwrap();

        assert!(db.entity("person").unwrap().get_attribute("tags").is_none());
        let tag = db.entity("person_tag").unwrap();
        // Scalar value column keeps the feature's name and element type.
        assert_eq!(
            tag.get_attribute("tags").unwrap().data_type.as_primitive(),
            Some(PrimitiveType::String)
        );
        assert_eq!(
            tag.get_attribute("person_id").unwrap().data_type.as_primitive(),
            Some(PrimitiveType::ObjectId)
        );
        assert_eq!(
            tag.get_primary_key().unwrap().attributes,
            vec!["person_id".to_string(), "tags".to_string()]
        );
        assert_eq!(tag.get_relationship("person_id").unwrap().target(), "person");
    }

    #[test]
    fn test_unwind_aggregate_with_clause_yields_two_references() {
        let mut db = document_db();
        let mut diags = Vec::new();
        unwind(
            &mut ctx(&mut db, &mut diags),
            "person",
            "knows",
            "person_knows",
            None,
            Some(&ReferenceClause {
                name: "knows_person_id".into(),
                target: "person".into(),
            }),
        )
        .unwrap();

        assert!(db.entity("person.knows").is_none());
        let knows = db.entity("person_knows").unwrap();
        assert_eq!(
            knows.get_primary_key().unwrap().attributes,
            vec!["person_id".to_string(), "knows_person_id".to_string()]
        );
        let refs = knows.get_references();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.target() == "person"));
    }

    #[test]
    fn test_unwind_with_generated_key() {
        let mut db = document_db();
        let mut diags = Vec::new();
        unwind(
            &mut ctx(&mut db, &mut diags),
            "person",
            "tags",
            "person_tag",
            Some("tag_id"),
            None,
        )
        .unwrap();

        let tag = db.entity("person_tag").unwrap();
        assert_eq!(
            tag.get_primary_key().unwrap().attributes,
            vec!["tag_id".to_string()]
        );
        assert_eq!(
            tag.get_attribute("tag_id").unwrap().data_type.as_primitive(),
            Some(PrimitiveType::Long)
        );
    }

    #[test]
    fn test_unwind_scalar_attribute_fails() {
        let mut db = document_db();
        let mut diags = Vec::new();
        let err = unwind(
            &mut ctx(&mut db, &mut diags),
            "person",
            "name",
            "person_name",
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Operation(_)));
    }
}
