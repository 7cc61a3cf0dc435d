//! Document adapter: MongoDB-style JSON Schema (`bsonType`) in and out.
//!
//! Import walks the schema recursively: nested `object` properties become
//! embedded entities whose path extends the owner's, arrays of objects
//! become many-valued embeddings, arrays of primitives become list-typed
//! attributes, and an `_id` property is the primary key. Export inverts
//! the walk starting from the root entity.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::core::{
    Attribute, Cardinality, Database, DataType, EntityKind, EntityType, Key, Paradigm,
    PrimitiveType, Relationship,
};
use crate::error::{Result, SchemaError};

use super::SchemaAdapter;

pub struct DocumentAdapter {
    /// Entity to export as the top-level document; autodetected from
    /// `is_root` when unset.
    pub root_entity: Option<String>,
}

impl DocumentAdapter {
    pub fn new() -> Self {
        DocumentAdapter { root_entity: None }
    }

    pub fn with_root(root_entity: impl Into<String>) -> Self {
        DocumentAdapter {
            root_entity: Some(root_entity.into()),
        }
    }
}

impl Default for DocumentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaAdapter for DocumentAdapter {
    fn paradigm(&self) -> Paradigm {
        Paradigm::Document
    }

    fn import(&self, input: &str, db_name: &str) -> Result<Database> {
        let schema: Value = serde_json::from_str(input)?;
        let mut db = Database::new(db_name, Paradigm::Document);

        let root_name = schema
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("root_document")
            .to_lowercase()
            .replace(' ', "_");
        parse_object(&mut db, &schema, vec![root_name], true)?;
        debug!(entities = db.entity_types.len(), "imported document schema");
        Ok(db)
    }

    fn export(&self, db: &Database) -> Result<String> {
        let root_name = match &self.root_entity {
            Some(name) => name.clone(),
            None => db
                .root_entities()
                .first()
                .map(|e| e.full_name())
                .ok_or_else(|| SchemaError::adapter("no root entity to export"))?,
        };
        let root = db.expect_entity(&root_name)?;
        let mut schema = export_object(db, root)?;
        if let Value::Object(obj) = &mut schema {
            obj.insert("title".to_string(), json!(root.name()));
        }
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

/// Parse one `bsonType: object` node into an entity, recursing into nested
/// objects and object arrays.
fn parse_object(db: &mut Database, schema: &Value, path: Vec<String>, is_root: bool) -> Result<()> {
    let mut entity = if is_root {
        let mut e = EntityType::new(path[0].clone(), EntityKind::Document);
        e.path = path.clone();
        e
    } else {
        EntityType::nested(path.clone(), EntityKind::Embedded)
    };

    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    // Nested objects are parsed after the owner so the registry keeps
    // owner-before-child insertion order.
    let mut nested: Vec<(Value, Vec<String>)> = Vec::new();

    for (prop_name, prop_schema) in properties {
        let name = prop_name.to_lowercase();
        let is_required = required.contains(&prop_name.as_str());
        let bson_type = prop_schema
            .get("bsonType")
            .or_else(|| prop_schema.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("string");

        match bson_type {
            "object" => {
                let mut child_path = path.clone();
                child_path.push(name.clone());
                entity.add_relationship(Relationship::aggregate(
                    name,
                    child_path.join("."),
                    if is_required {
                        Cardinality::OneToOne
                    } else {
                        Cardinality::ZeroToOne
                    },
                    !is_required,
                ))?;
                nested.push((prop_schema.clone(), child_path));
            }
            "array" => {
                let items = prop_schema.get("items").cloned().unwrap_or(json!({}));
                let items_type = items
                    .get("bsonType")
                    .or_else(|| items.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("string");
                if items_type == "object" {
                    let mut child_path = path.clone();
                    child_path.push(name.clone());
                    entity.add_relationship(Relationship::aggregate(
                        name,
                        child_path.join("."),
                        if is_required {
                            Cardinality::OneToMany
                        } else {
                            Cardinality::ZeroToMany
                        },
                        !is_required,
                    ))?;
                    nested.push((items, child_path));
                } else {
                    let element = primitive_type(items_type, &items);
                    let mut attr = Attribute::new(name, DataType::list(element));
                    attr.is_optional = !is_required;
                    entity.add_attribute(attr)?;
                }
            }
            _ => {
                let is_key = prop_name == "_id";
                let mut attr = Attribute::new(name.clone(), primitive_type(bson_type, prop_schema));
                attr.is_key = is_key;
                attr.is_optional = !is_required && !is_key;
                entity.add_attribute(attr)?;
                if is_key {
                    entity.add_key(Key::primary(vec![name]))?;
                }
            }
        }
    }

    db.add_entity(entity)?;
    for (child_schema, child_path) in nested {
        parse_object(db, &child_schema, child_path, false)?;
    }
    Ok(())
}

fn primitive_type(bson_type: &str, schema: &Value) -> DataType {
    let primitive = match bson_type {
        "string" => PrimitiveType::String,
        "objectId" => PrimitiveType::ObjectId,
        "int" => PrimitiveType::Int32,
        "long" => PrimitiveType::Int64,
        "double" => PrimitiveType::Double,
        "decimal" => PrimitiveType::Decimal128,
        "bool" => PrimitiveType::Boolean,
        "date" => PrimitiveType::DateTime,
        "timestamp" => PrimitiveType::Timestamp,
        "binData" => PrimitiveType::Binary,
        "null" => PrimitiveType::Null,
        // Unknown bson types degrade to string, never fail the import.
        _ => PrimitiveType::String,
    };
    match schema.get("maxLength").and_then(Value::as_u64) {
        Some(len) if primitive == PrimitiveType::String => DataType::string(len as u32),
        _ => DataType::primitive(primitive),
    }
}

fn export_object(db: &Database, entity: &EntityType) -> Result<Value> {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for attr in &entity.attributes {
        properties.insert(attr.name.clone(), export_data_type(&attr.data_type));
        if !attr.is_optional {
            required.push(attr.name.clone());
        }
    }
    for rel in entity.get_aggregates() {
        let child = db.expect_entity(rel.target())?;
        let child_schema = export_object(db, child)?;
        let value = if rel.cardinality().is_multiple() {
            json!({ "bsonType": "array", "items": child_schema })
        } else {
            child_schema
        };
        properties.insert(rel.name().to_string(), value);
        if rel.cardinality().is_required() {
            required.push(rel.name().to_string());
        }
    }

    let mut schema = Map::new();
    schema.insert("bsonType".to_string(), json!("object"));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema.insert("properties".to_string(), Value::Object(properties));
    Ok(Value::Object(schema))
}

fn export_data_type(data_type: &DataType) -> Value {
    match data_type {
        DataType::List { element_type } | DataType::Set { element_type } => {
            json!({ "bsonType": "array", "items": export_data_type(element_type) })
        }
        DataType::Map { .. } => json!({ "bsonType": "object" }),
        DataType::Primitive {
            primitive: PrimitiveType::String,
            max_length: Some(len),
            ..
        } => json!({ "bsonType": "string", "maxLength": len }),
        DataType::Primitive { .. } => {
            json!({ "bsonType": data_type.to_native(Paradigm::Document) })
        }
    }
}
