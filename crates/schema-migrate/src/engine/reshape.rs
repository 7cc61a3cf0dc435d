//! Entity-level reshaping: MERGE, SPLIT, CAST, LINKING, EXTRACT.

use crate::core::{
    Attribute, Cardinality, DataType, EntityKind, EntityType, Key, KeyKind, PrimitiveType,
    Relationship, RelationshipType,
};
use crate::error::{Result, SchemaError};

use super::{
    apply_reference_clause, fk_column_name, repoint_entity, EdgeProperty, OpContext,
    ReferenceClause, SplitSide,
};

/// MERGE left AND right INTO target: union both entities' attributes,
/// relationships and keys into one. Attribute name collisions abort.
/// The left primary key wins; the right one is demoted to UNIQUE with a
/// diagnostic. Pointers elsewhere to either input are repointed.
pub(crate) fn merge(ctx: &mut OpContext<'_>, left: &str, right: &str, into: &str) -> Result<()> {
    if left == right {
        return Err(SchemaError::operation("MERGE: both sides name the same entity"));
    }
    if !ctx.db.contains_entity(left) {
        return Err(SchemaError::UnknownEntity(left.to_string()));
    }
    if !ctx.db.contains_entity(right) {
        return Err(SchemaError::UnknownEntity(right.to_string()));
    }
    if into != left && into != right && ctx.db.contains_entity(into) {
        return Err(SchemaError::DuplicateEntity(into.to_string()));
    }

    // Collision pre-check, so a failed merge leaves no half-moved state
    // inside this operation.
    {
        let l = ctx.db.expect_entity(left)?;
        let r = ctx.db.expect_entity(right)?;
        for attr in &r.attributes {
            if l.get_attribute(&attr.name).is_some() {
                return Err(SchemaError::DuplicateAttribute {
                    entity: into.to_string(),
                    attribute: attr.name.clone(),
                });
            }
        }
        for rel in &r.relationships {
            if l.get_relationship(rel.name()).is_some() {
                return Err(SchemaError::DuplicateRelationship {
                    entity: into.to_string(),
                    relationship: rel.name().to_string(),
                });
            }
        }
    }

    let l = ctx
        .db
        .remove_entity(left)
        .ok_or_else(|| SchemaError::UnknownEntity(left.to_string()))?;
    let r = ctx
        .db
        .remove_entity(right)
        .ok_or_else(|| SchemaError::UnknownEntity(right.to_string()))?;
    let mut merged = EntityType::new(into, l.kind);
    merged.attributes = l.attributes;
    merged.relationships = l.relationships;
    merged.keys = l.keys;

    merged.attributes.extend(r.attributes);
    merged.relationships.extend(r.relationships);
    let mut demoted = false;
    for mut key in r.keys {
        if key.kind == KeyKind::Primary && merged.get_primary_key().is_some() {
            key.kind = KeyKind::Unique;
            demoted = true;
        }
        merged.keys.push(key);
    }
    // Self-pointers between the two inputs collapse.
    merged.relationships.retain(|rel| {
        let t = rel.target();
        t != left && t != right
    });
    merged
        .keys
        .retain(|k| !matches!(k.referenced_entity.as_deref(), Some(t) if t == left || t == right));

    ctx.db.add_entity(merged)?;
    if demoted {
        ctx.cascade(format!(
            "MERGE demoted the primary key of '{right}' to UNIQUE on '{into}'"
        ));
    }
    repoint_entity(ctx, left, into);
    repoint_entity(ctx, right, into);
    Ok(())
}

/// SPLIT entity INTO two sides. Primary-key attributes are duplicated into
/// both; every non-key attribute must be assigned to exactly one side.
/// The second side references the first over the shared key. Relationships
/// of the input stay with the first side; pointers to the input are
/// repointed there.
pub(crate) fn split(
    ctx: &mut OpContext<'_>,
    entity: &str,
    left: &SplitSide,
    right: &SplitSide,
) -> Result<()> {
    let source = ctx.db.expect_entity(entity)?.clone();
    let pk = source
        .get_primary_key()
        .ok_or_else(|| SchemaError::MissingPrimaryKey(entity.to_string()))?
        .clone();
    for side in [left, right] {
        if side.name != entity && ctx.db.contains_entity(&side.name) {
            return Err(SchemaError::DuplicateEntity(side.name.clone()));
        }
    }

    // Validate the assignment: total and disjoint over non-key attributes.
    for name in left.attributes.iter().chain(&right.attributes) {
        if source.get_attribute(name).is_none() {
            return Err(SchemaError::UnknownAttribute {
                entity: entity.to_string(),
                attribute: name.clone(),
            });
        }
        if left.attributes.contains(name) && right.attributes.contains(name) {
            return Err(SchemaError::operation(format!(
                "SPLIT: attribute '{name}' assigned to both sides"
            )));
        }
    }
    for attr in &source.attributes {
        if attr.is_key {
            continue;
        }
        if !left.attributes.contains(&attr.name) && !right.attributes.contains(&attr.name) {
            return Err(SchemaError::operation(format!(
                "SPLIT: attribute '{}' of '{entity}' is not assigned to either side",
                attr.name
            )));
        }
    }

    ctx.db.remove_entity(entity);

    let build = |side: &SplitSide| -> Result<EntityType> {
        let mut e = EntityType::new(&side.name, source.kind);
        for member in &pk.attributes {
            if let Some(attr) = source.get_attribute(member) {
                e.attributes.push(attr.duplicate(None));
            }
        }
        for name in &side.attributes {
            if let Some(attr) = source.get_attribute(name) {
                e.attributes.push(attr.duplicate(None));
            }
        }
        e.add_key(Key::primary(pk.attributes.clone()))?;
        Ok(e)
    };
    let first = build(left)?;
    let mut second = build(right)?;

    // The second side joins back to the first over the shared key.
    second.add_relationship(Relationship::reference(
        pk.attributes[0].clone(),
        left.name.clone(),
        Cardinality::OneToOne,
        false,
    ))?;
    second.add_key(Key::foreign(
        pk.attributes.clone(),
        left.name.clone(),
        pk.attributes.clone(),
    ))?;

    ctx.db.add_entity(first)?;
    ctx.db.add_entity(second)?;

    // Non-key relationships of the input stay with the first side.
    let mut carried = 0usize;
    for rel in source.relationships {
        ctx.db
            .expect_entity_mut(&left.name)?
            .add_relationship(rel)?;
        carried += 1;
    }
    if carried > 0 {
        ctx.cascade(format!(
            "SPLIT kept {carried} relationship(s) of '{entity}' on '{}'",
            left.name
        ));
    }
    repoint_entity(ctx, entity, &left.name);
    Ok(())
}

// Width rank within a primitive family; casting to a lower rank narrows.
fn family_and_rank(p: PrimitiveType) -> (u8, u8) {
    match p {
        PrimitiveType::String => (0, 1),
        PrimitiveType::Text => (0, 2),
        PrimitiveType::Integer | PrimitiveType::Int32 => (1, 1),
        PrimitiveType::Long | PrimitiveType::Int64 => (1, 2),
        PrimitiveType::Float => (2, 1),
        PrimitiveType::Double => (2, 2),
        PrimitiveType::Decimal => (3, 1),
        PrimitiveType::Decimal128 => (3, 2),
        PrimitiveType::Date => (4, 1),
        PrimitiveType::DateTime | PrimitiveType::Timestamp => (4, 2),
        PrimitiveType::Boolean => (5, 1),
        PrimitiveType::Uuid => (6, 1),
        PrimitiveType::Binary => (7, 1),
        PrimitiveType::Null => (8, 1),
        PrimitiveType::ObjectId => (9, 1),
    }
}

fn is_lossy(from: &DataType, to: &DataType) -> bool {
    if from == to {
        return false;
    }
    let (Some(f), Some(t)) = (from.as_primitive(), to.as_primitive()) else {
        // Shape changes (collection <-> scalar, map rewrites) always lose
        // structure unless identical.
        return true;
    };
    // Narrowing string parameters loses data even within the same kind.
    if let (
        DataType::Primitive {
            max_length: Some(from_len),
            ..
        },
        DataType::Primitive {
            max_length: Some(to_len),
            ..
        },
    ) = (from, to)
    {
        if to_len < from_len {
            return true;
        }
    }
    let (ff, fr) = family_and_rank(f);
    let (tf, tr) = family_and_rank(t);
    if ff == tf {
        return tr < fr;
    }
    // Cross-family casts preserve values only when widening into text.
    !matches!(t, PrimitiveType::String | PrimitiveType::Text)
}

/// CAST an attribute to a new data type, flagging casts that can lose
/// values with a diagnostic.
pub(crate) fn cast(
    ctx: &mut OpContext<'_>,
    entity: &str,
    attribute: &str,
    data_type: &DataType,
) -> Result<()> {
    let e = ctx.db.expect_entity_mut(entity)?;
    let Some(attr) = e.get_attribute_mut(attribute) else {
        return Err(SchemaError::UnknownAttribute {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        });
    };
    let lossy = is_lossy(&attr.data_type, data_type);
    let old = attr.data_type.clone();
    attr.data_type = data_type.clone();
    if lossy {
        ctx.lossy_cast(format!(
            "CAST of '{entity}.{attribute}' from {old:?} to {data_type:?} can lose values"
        ));
    }
    Ok(())
}

/// LINKING source TO target AS name: declare a named graph edge type
/// between two entities, optionally carrying edge properties.
pub(crate) fn linking(
    ctx: &mut OpContext<'_>,
    source: &str,
    target: &str,
    name: &str,
    cardinality: Option<Cardinality>,
    properties: &[EdgeProperty],
) -> Result<()> {
    if !ctx.db.contains_entity(source) {
        return Err(SchemaError::UnknownEntity(source.to_string()));
    }
    if !ctx.db.contains_entity(target) {
        return Err(SchemaError::UnknownEntity(target.to_string()));
    }
    let mut rel_type = RelationshipType::new(
        name,
        source,
        target,
        cardinality.unwrap_or(Cardinality::ZeroToMany),
    );
    for prop in properties {
        rel_type
            .attributes
            .push(Attribute::new(prop.name.clone(), prop.data_type.clone()));
    }
    ctx.db.add_relationship_type(rel_type)
}

/// EXTRACT attributes FROM entity INTO name: move a subset of attributes
/// into a new entity linked back to its source. Without an `ADD REFERENCE`
/// clause the new entity carries copies of the source key, which double as
/// its primary key.
pub(crate) fn extract(
    ctx: &mut OpContext<'_>,
    entity: &str,
    attributes: &[String],
    name: &str,
    reference: Option<&ReferenceClause>,
) -> Result<()> {
    if ctx.db.contains_entity(name) {
        return Err(SchemaError::DuplicateEntity(name.to_string()));
    }
    let (moved, pk_members, pk_copies) = {
        let source = ctx.db.expect_entity(entity)?;
        let mut moved: Vec<Attribute> = Vec::with_capacity(attributes.len());
        for attr_name in attributes {
            let attr = source.get_attribute(attr_name).ok_or_else(|| {
                SchemaError::UnknownAttribute {
                    entity: entity.to_string(),
                    attribute: attr_name.clone(),
                }
            })?;
            if attr.is_key {
                return Err(SchemaError::operation(format!(
                    "EXTRACT: '{attr_name}' is a key attribute of '{entity}'"
                )));
            }
            moved.push(attr.clone());
        }
        let pk = source
            .get_primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(entity.to_string()))?;
        let copies: Vec<Attribute> = pk
            .attributes
            .iter()
            .filter_map(|m| {
                source
                    .get_attribute(m)
                    .map(|a| a.duplicate(Some(&fk_column_name(source, m))))
            })
            .collect();
        (moved, pk.attributes.clone(), copies)
    };

    let mut extracted = EntityType::new(name, EntityKind::Table);
    for attr in moved {
        extracted.add_attribute(attr)?;
    }

    match reference {
        Some(clause) => {
            ctx.db.add_entity(extracted)?;
            apply_reference_clause(ctx.db, name, clause)?;
            let e = ctx.db.expect_entity_mut(name)?;
            if e.get_primary_key().is_none() {
                e.add_key(Key::primary(vec![clause.name.clone()]))?;
            }
        }
        None => {
            let mut fk_names: Vec<String> = Vec::with_capacity(pk_copies.len());
            for copy in pk_copies {
                fk_names.push(copy.name.clone());
                let mut attr = copy;
                attr.is_key = false;
                extracted.add_attribute(attr.required())?;
            }
            extracted.add_relationship(Relationship::reference(
                fk_names[0].clone(),
                entity,
                Cardinality::OneToOne,
                false,
            ))?;
            extracted.add_key(Key::foreign(fk_names.clone(), entity, pk_members))?;
            extracted.add_key(Key::primary(fk_names))?;
            ctx.db.add_entity(extracted)?;
        }
    }

    // Only now mutate the source, the new entity being fully built.
    let source = ctx.db.expect_entity_mut(entity)?;
    let mut dropped_keys = 0usize;
    for attr_name in attributes {
        source.remove_attribute(attr_name);
        dropped_keys += source.drop_keys_mentioning(attr_name);
    }
    if dropped_keys > 0 {
        ctx.cascade(format!(
            "EXTRACT dropped {dropped_keys} key(s) on '{entity}' mentioning moved attributes"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Database, Paradigm};

    fn db() -> Database {
        let mut db = Database::new("d", Paradigm::Relational);
        let mut person = EntityType::new("person", EntityKind::Table);
        person
            .add_attribute(Attribute::key(
                "id",
                DataType::primitive(PrimitiveType::Integer),
            ))
            .unwrap();
        person
            .add_attribute(Attribute::new("name", DataType::string(100)))
            .unwrap();
        person
            .add_attribute(Attribute::new("street", DataType::string(200)))
            .unwrap();
        person
            .add_attribute(Attribute::new("city", DataType::string(100)))
            .unwrap();
        person.add_key(Key::primary(vec!["id".into()])).unwrap();
        db.add_entity(person).unwrap();

        let mut account = EntityType::new("account", EntityKind::Table);
        account
            .add_attribute(Attribute::key(
                "account_id",
                DataType::primitive(PrimitiveType::Integer),
            ))
            .unwrap();
        account
            .add_attribute(Attribute::new("balance", DataType::decimal(15, 2)))
            .unwrap();
        account
            .add_key(Key::primary(vec!["account_id".into()]))
            .unwrap();
        db.add_entity(account).unwrap();
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
    fn test_merge_unions_and_demotes_second_primary_key() {
        let mut db = db();
        let mut diags = Vec::new();
        merge(&mut ctx(&mut db, &mut diags), "person", "account", "customer").unwrap();

        assert!(!db.contains_entity("person"));
        assert!(!db.contains_entity("account"));
        let customer = db.entity("customer").unwrap();
        assert!(customer.get_attribute("name").is_some());
        assert!(customer.get_attribute("balance").is_some());
        assert_eq!(
            customer.get_primary_key().unwrap().attributes,
            vec!["id".to_string()]
        );
        let uniques = customer.get_unique_keys();
        assert_eq!(uniques.len(), 1);
        assert_eq!(uniques[0].attributes, vec!["account_id".to_string()]);
        assert!(diags
            .iter()
            .any(|d| d.kind == super::super::DiagnosticKind::Cascade));
    }

    #[test]
    fn test_merge_attribute_collision_aborts() {
        let mut db = db();
        let mut diags = Vec::new();
        db.entity_mut("account")
            .unwrap()
            .add_attribute(Attribute::new("name", DataType::string(50)))
            .unwrap();
        let err = merge(&mut ctx(&mut db, &mut diags), "person", "account", "customer")
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateAttribute { .. }));
        // Nothing was moved.
        assert!(db.contains_entity("person"));
        assert!(db.contains_entity("account"));
    }

    #[test]
    fn test_split_duplicates_key_and_links_sides() {
        let mut db = db();
        let mut diags = Vec::new();
        split(
            &mut ctx(&mut db, &mut diags),
            "person",
            &SplitSide {
                name: "person_core".into(),
                attributes: vec!["name".into()],
            },
            &SplitSide {
                name: "person_address".into(),
                attributes: vec!["street".into(), "city".into()],
            },
        )
        .unwrap();

        assert!(!db.contains_entity("person"));
        let core = db.entity("person_core").unwrap();
        let addr = db.entity("person_address").unwrap();
        assert!(core.get_attribute("id").is_some());
        assert!(addr.get_attribute("id").is_some());
        assert!(core.get_attribute("name").is_some());
        assert!(addr.get_attribute("street").is_some());
        assert!(addr.get_attribute("name").is_none());
        assert_eq!(addr.get_relationship("id").unwrap().target(), "person_core");
        assert_eq!(
            addr.get_foreign_keys()[0].referenced_entity.as_deref(),
            Some("person_core")
        );
    }

    #[test]
    fn test_split_reusing_source_name_is_silent() {
        let mut db = db();
        let mut diags = Vec::new();
        split(
            &mut ctx(&mut db, &mut diags),
            "person",
            &SplitSide {
                name: "person".into(),
                attributes: vec!["name".into()],
            },
            &SplitSide {
                name: "person_address".into(),
                attributes: vec!["street".into(), "city".into()],
            },
        )
        .unwrap();

        // The first side took over the source name; nothing else pointed at
        // the source, so no cascade records appear.
        assert!(diags.is_empty());
        let addr = db.entity("person_address").unwrap();
        assert_eq!(addr.get_relationship("id").unwrap().target(), "person");
        assert_eq!(
            addr.get_foreign_keys()[0].referenced_entity.as_deref(),
            Some("person")
        );
    }

    #[test]
    fn test_split_rejects_unassigned_attribute() {
        let mut db = db();
        let mut diags = Vec::new();
        let err = split(
            &mut ctx(&mut db, &mut diags),
            "person",
            &SplitSide {
                name: "a".into(),
                attributes: vec!["name".into()],
            },
            &SplitSide {
                name: "b".into(),
                attributes: vec!["street".into()],
            },
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Operation(_)));
    }

    #[test]
    fn test_cast_narrowing_flags_lossy() {
        let mut db = db();
        let mut diags = Vec::new();
        db.entity_mut("person")
            .unwrap()
            .add_attribute(Attribute::new(
                "score",
                DataType::primitive(PrimitiveType::Long),
            ))
            .unwrap();
        cast(
            &mut ctx(&mut db, &mut diags),
            "person",
            "score",
            &DataType::primitive(PrimitiveType::Integer),
        )
        .unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, super::super::DiagnosticKind::LossyCast);
        assert_eq!(
            db.entity("person")
                .unwrap()
                .get_attribute("score")
                .unwrap()
                .data_type
                .as_primitive(),
            Some(PrimitiveType::Integer)
        );
    }

    #[test]
    fn test_cast_widening_is_clean() {
        let mut db = db();
        let mut diags = Vec::new();
        cast(
            &mut ctx(&mut db, &mut diags),
            "person",
            "name",
            &DataType::primitive(PrimitiveType::Text),
        )
        .unwrap();
        assert!(diags.is_empty());
    }

    #[test]
    fn test_cast_string_truncation_flags_lossy() {
        let mut db = db();
        let mut diags = Vec::new();
        cast(
            &mut ctx(&mut db, &mut diags),
            "person",
            "street",
            &DataType::string(50),
        )
        .unwrap();
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_linking_declares_edge_type_with_properties() {
        let mut db = db();
        let mut diags = Vec::new();
        linking(
            &mut ctx(&mut db, &mut diags),
            "person",
            "account",
            "OWNS",
            Some(Cardinality::OneToMany),
            &[EdgeProperty {
                name: "since".into(),
                data_type: DataType::primitive(PrimitiveType::Date),
            }],
        )
        .unwrap();
        let rt = db.relationship_type("OWNS").unwrap();
        assert_eq!(rt.source, "person");
        assert_eq!(rt.target, "account");
        assert_eq!(rt.cardinality, Cardinality::OneToMany);
        assert_eq!(rt.attributes.len(), 1);
    }

    #[test]
    fn test_extract_moves_attributes_and_links_back() {
        let mut db = db();
        let mut diags = Vec::new();
        extract(
            &mut ctx(&mut db, &mut diags),
            "person",
            &["street".to_string(), "city".to_string()],
            "person_address",
            None,
        )
        .unwrap();

        let person = db.entity("person").unwrap();
        assert!(person.get_attribute("street").is_none());
        assert!(person.get_attribute("city").is_none());

        let addr = db.entity("person_address").unwrap();
        assert!(addr.get_attribute("street").is_some());
        assert!(addr.get_attribute("person_id").is_some());
        assert_eq!(
            addr.get_primary_key().unwrap().attributes,
            vec!["person_id".to_string()]
        );
        assert_eq!(addr.get_relationship("person_id").unwrap().target(), "person");
        assert_eq!(
            addr.get_foreign_keys()[0].referenced_attributes,
            vec!["id".to_string()]
        );
    }

    #[test]
    fn test_extract_rejects_key_attributes() {
        let mut db = db();
        let mut diags = Vec::new();
        let err = extract(
            &mut ctx(&mut db, &mut diags),
            "person",
            &["id".to_string()],
            "person_id_table",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Operation(_)));
    }
}
