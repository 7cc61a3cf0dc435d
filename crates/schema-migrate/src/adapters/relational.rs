//! Relational adapter: `CREATE TABLE` DDL in, `CREATE TABLE` DDL out.
//!
//! Import recognizes the SQL subset the exporter produces plus the common
//! spellings around it: column definitions with inline `PRIMARY KEY`,
//! `NOT NULL` and `REFERENCES table(col)` clauses, table-level
//! `PRIMARY KEY (a, b)` and `FOREIGN KEY (col) REFERENCES t(col)`
//! constraints, `SERIAL`/`BIGSERIAL` (which imply a key), and `--` or
//! `/* */` comments. Export emits one `CREATE TABLE` per entity in
//! dependency order, single-column integer keys as `SERIAL`, composite
//! keys as a separate `PRIMARY KEY (...)` clause.

use regex::Regex;
use tracing::debug;

use crate::core::{
    Attribute, Cardinality, Database, DataType, EntityKind, EntityType, Key, Paradigm,
    PrimitiveType,
};
use crate::error::{Result, SchemaError};
use crate::resolver::{self, PendingReference};

use super::SchemaAdapter;

pub struct RelationalAdapter;

impl RelationalAdapter {
    pub fn new() -> Self {
        RelationalAdapter
    }
}

impl Default for RelationalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaAdapter for RelationalAdapter {
    fn paradigm(&self) -> Paradigm {
        Paradigm::Relational
    }

    fn import(&self, input: &str, db_name: &str) -> Result<Database> {
        let mut db = Database::new(db_name, Paradigm::Relational);
        let mut pending: Vec<PendingReference> = Vec::new();

        let ddl = strip_comments(input);
        let create_table =
            Regex::new(r"(?is)CREATE\s+TABLE\s+(\w+)\s*\((.*?)\)\s*;").expect("static pattern");
        for captures in create_table.captures_iter(&ddl) {
            let table_name = captures[1].to_lowercase();
            let entity = parse_table(&table_name, &captures[2], &mut pending)?;
            db.add_entity(entity)?;
        }
        if db.entity_types.is_empty() {
            return Err(SchemaError::adapter("no CREATE TABLE statements found"));
        }

        let resolved = resolver::resolve_pending(&mut db, pending)?;
        debug!(
            tables = db.entity_types.len(),
            references = resolved,
            "imported relational schema"
        );
        Ok(db)
    }

    fn export(&self, db: &Database) -> Result<String> {
        let mut out = String::new();
        for name in resolver::dependency_order(db) {
            let entity = db.expect_entity(&name)?;
            out.push_str(&export_table(entity, db));
            out.push('\n');
        }
        Ok(out)
    }
}

fn strip_comments(ddl: &str) -> String {
    let line = Regex::new(r"(?m)--.*$").expect("static pattern");
    let block = Regex::new(r"(?s)/\*.*?\*/").expect("static pattern");
    block.replace_all(&line.replace_all(ddl, ""), "").into_owned()
}

/// Split a table body on commas, ignoring commas nested in parentheses
/// (`DECIMAL(15,2)`).
fn split_columns(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_table(
    table_name: &str,
    body: &str,
    pending: &mut Vec<PendingReference>,
) -> Result<EntityType> {
    let mut entity = EntityType::new(table_name, EntityKind::Table);
    let table_pk = Regex::new(r"(?i)^PRIMARY\s+KEY\s*\(([^)]+)\)").expect("static pattern");
    let table_fk = Regex::new(r"(?i)^FOREIGN\s+KEY\s*\((\w+)\)\s+REFERENCES\s+(\w+)\s*\((\w+)\)")
        .expect("static pattern");
    let references = Regex::new(r"(?i)REFERENCES\s+(\w+)\s*\((\w+)\)").expect("static pattern");
    let column =
        Regex::new(r"(?i)^(\w+)\s+(\w+(?:\s+PRECISION)?)\s*(?:\(([^)]+)\))?\s*(.*)$")
            .expect("static pattern");

    let mut composite_pk: Option<Vec<String>> = None;
    for raw in split_columns(body) {
        let def = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if def.is_empty() {
            continue;
        }
        if let Some(caps) = table_pk.captures(&def) {
            composite_pk = Some(
                caps[1]
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .collect(),
            );
            continue;
        }
        if let Some(caps) = table_fk.captures(&def) {
            pending.push(PendingReference {
                source: table_name.to_string(),
                name: caps[1].to_lowercase(),
                target: caps[2].to_lowercase(),
                cardinality: Cardinality::OneToOne,
                is_optional: true,
            });
            continue;
        }
        let upper = def.to_uppercase();
        if upper.starts_with("UNIQUE") || upper.starts_with("CHECK") || upper.starts_with("CONSTRAINT")
        {
            continue;
        }

        let Some(caps) = column.captures(&def) else {
            return Err(SchemaError::adapter(format!(
                "unparseable column definition in table '{table_name}': '{def}'"
            )));
        };
        let col_name = caps[1].to_lowercase();
        let type_name = caps[2].to_uppercase();
        let params = caps.get(3).map(|m| m.as_str().to_string());
        let constraints = caps.get(4).map(|m| m.as_str().to_uppercase()).unwrap_or_default();

        let (primitive, serial) = sql_type_to_primitive(&type_name);
        let data_type = parameterized(primitive, params.as_deref());

        // SERIAL implies a key even without an explicit PRIMARY KEY.
        let is_key = serial || constraints.contains("PRIMARY KEY");
        let is_optional = !is_key && !constraints.contains("NOT NULL");
        let mut attr = Attribute::new(col_name.clone(), data_type);
        attr.is_key = is_key;
        attr.is_optional = is_optional;
        entity.add_attribute(attr)?;

        if constraints.contains("PRIMARY KEY") && entity.get_primary_key().is_none() {
            entity.add_key(Key::primary(vec![col_name.clone()]))?;
        }
        // Inline REFERENCES clause: resolved after all tables are known.
        if let Some(ref_caps) = references.captures(&def) {
            pending.push(PendingReference {
                source: table_name.to_string(),
                name: col_name,
                target: ref_caps[1].to_lowercase(),
                cardinality: Cardinality::OneToOne,
                is_optional,
            });
        }
    }

    if let Some(members) = composite_pk {
        if entity.get_primary_key().is_none() {
            entity.add_key(Key::primary(members))?;
        }
    }
    // SERIAL column without any declared PRIMARY KEY still keys the table.
    if entity.get_primary_key().is_none() {
        if let Some(name) = entity
            .attributes
            .iter()
            .find(|a| a.is_key)
            .map(|a| a.name.clone())
        {
            entity.add_key(Key::primary(vec![name]))?;
        }
    }
    Ok(entity)
}

fn sql_type_to_primitive(type_name: &str) -> (PrimitiveType, bool) {
    match type_name {
        "SERIAL" => (PrimitiveType::Integer, true),
        "BIGSERIAL" => (PrimitiveType::Long, true),
        "VARCHAR" | "CHAR" | "CHARACTER" => (PrimitiveType::String, false),
        "TEXT" => (PrimitiveType::Text, false),
        "INTEGER" | "INT" | "INT4" | "SMALLINT" => (PrimitiveType::Integer, false),
        "BIGINT" | "INT8" => (PrimitiveType::Long, false),
        "DOUBLE PRECISION" | "DOUBLE" => (PrimitiveType::Double, false),
        "REAL" | "FLOAT" => (PrimitiveType::Float, false),
        "DECIMAL" | "NUMERIC" => (PrimitiveType::Decimal, false),
        "BOOLEAN" | "BOOL" => (PrimitiveType::Boolean, false),
        "DATE" => (PrimitiveType::Date, false),
        "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" => (PrimitiveType::Timestamp, false),
        "UUID" => (PrimitiveType::Uuid, false),
        "BYTEA" | "BLOB" => (PrimitiveType::Binary, false),
        // Unknown native types degrade to string, never fail the import.
        _ => (PrimitiveType::String, false),
    }
}

fn parameterized(primitive: PrimitiveType, params: Option<&str>) -> DataType {
    let Some(params) = params else {
        return DataType::primitive(primitive);
    };
    let parts: Vec<u32> = params
        .split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect();
    match primitive {
        PrimitiveType::String | PrimitiveType::Text if !parts.is_empty() => {
            DataType::string(parts[0])
        }
        PrimitiveType::Decimal if !parts.is_empty() => {
            DataType::decimal(parts[0], parts.get(1).copied().unwrap_or(0))
        }
        _ => DataType::primitive(primitive),
    }
}

fn export_table(entity: &EntityType, db: &Database) -> String {
    let pk_columns: Vec<String> = entity
        .get_primary_key()
        .map(|k| k.attributes.clone())
        .unwrap_or_default();
    let composite = pk_columns.len() > 1;

    let mut columns: Vec<String> = Vec::with_capacity(entity.attributes.len() + 1);
    for attr in &entity.attributes {
        let mut parts = vec![attr.name.clone(), sql_type(attr)];
        if attr.is_key && !composite {
            parts.push("PRIMARY KEY".to_string());
        } else if !attr.is_optional || (attr.is_key && composite) {
            parts.push("NOT NULL".to_string());
        }
        // Foreign-key column: the reference with the same name points at
        // the target whose primary key we cite.
        if let Some(rel) = entity
            .relationships
            .iter()
            .find(|r| r.is_reference() && r.name() == attr.name)
        {
            let target = rel.target();
            let target_pk = db
                .entity(target)
                .and_then(|e| e.get_primary_key())
                .and_then(|k| k.attributes.first().cloned())
                .unwrap_or_else(|| format!("{target}_id"));
            parts.push(format!("REFERENCES {target}({target_pk})"));
        }
        columns.push(format!("    {}", parts.join(" ")));
    }
    if composite {
        columns.push(format!("    PRIMARY KEY ({})", pk_columns.join(", ")));
    }

    format!("CREATE TABLE {} (\n{}\n);\n", entity.name(), columns.join(",\n"))
}

fn sql_type(attr: &Attribute) -> String {
    let native = attr.data_type.to_native(Paradigm::Relational);
    // Single-column integer keys auto-increment.
    if attr.is_key && native == "INTEGER" {
        return "SERIAL".to_string();
    }
    if attr.is_key && native == "BIGINT" {
        return "BIGSERIAL".to_string();
    }
    native
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDL: &str = r#"
        -- people schema
        CREATE TABLE person (
            id SERIAL PRIMARY KEY,
            name VARCHAR(100) NOT NULL,
            email VARCHAR(255),
            balance DECIMAL(15,2)
        );

        /* addresses reference people */
        CREATE TABLE address (
            id SERIAL PRIMARY KEY,
            street VARCHAR(200),
            person_id INTEGER NOT NULL REFERENCES person(id)
        );
    "#;

    #[test]
    fn test_import_tables_attributes_and_keys() {
        let db = RelationalAdapter::new().import(DDL, "people").unwrap();
        assert_eq!(db.entity_types.len(), 2);

        let person = db.entity("person").unwrap();
        let id = person.get_attribute("id").unwrap();
        assert!(id.is_key);
        assert_eq!(id.data_type.as_primitive(), Some(PrimitiveType::Integer));
        assert_eq!(
            person.get_primary_key().unwrap().attributes,
            vec!["id".to_string()]
        );
        let name = person.get_attribute("name").unwrap();
        assert!(!name.is_optional);
        assert_eq!(name.data_type, DataType::string(100));
        assert!(person.get_attribute("email").unwrap().is_optional);
        assert_eq!(
            person.get_attribute("balance").unwrap().data_type,
            DataType::decimal(15, 2)
        );
    }

    #[test]
    fn test_import_resolves_forward_references() {
        // address is declared before person: the reference still resolves.
        let ddl = r#"
            CREATE TABLE address (
                id SERIAL PRIMARY KEY,
                person_id INTEGER REFERENCES person(id)
            );
            CREATE TABLE person (
                id SERIAL PRIMARY KEY
            );
        "#;
        let db = RelationalAdapter::new().import(ddl, "d").unwrap();
        let address = db.entity("address").unwrap();
        let rel = address.get_relationship("person_id").unwrap();
        assert_eq!(rel.target(), "person");
        assert!(rel.is_optional());
    }

    #[test]
    fn test_import_table_level_composite_primary_key() {
        let ddl = r#"
            CREATE TABLE person_knows (
                person_id VARCHAR(24) NOT NULL,
                knows_person_id VARCHAR(24) NOT NULL,
                PRIMARY KEY (person_id, knows_person_id)
            );
        "#;
        let db = RelationalAdapter::new().import(ddl, "d").unwrap();
        let e = db.entity("person_knows").unwrap();
        assert_eq!(
            e.get_primary_key().unwrap().attributes,
            vec!["person_id".to_string(), "knows_person_id".to_string()]
        );
        assert!(e.get_attribute("person_id").unwrap().is_key);
    }

    #[test]
    fn test_import_without_tables_fails() {
        let err = RelationalAdapter::new().import("SELECT 1;", "d").unwrap_err();
        assert!(matches!(err, SchemaError::Adapter(_)));
    }

    #[test]
    fn test_export_orders_referenced_tables_first() {
        let db = RelationalAdapter::new().import(DDL, "people").unwrap();
        let sql = RelationalAdapter::new().export(&db).unwrap();
        let person_pos = sql.find("CREATE TABLE person").unwrap();
        let address_pos = sql.find("CREATE TABLE address").unwrap();
        assert!(person_pos < address_pos);
        assert!(sql.contains("id SERIAL PRIMARY KEY"));
        assert!(sql.contains("person_id INTEGER NOT NULL REFERENCES person(id)"));
    }

    #[test]
    fn test_export_composite_key_as_table_constraint() {
        let mut db = Database::new("d", Paradigm::Relational);
        let mut e = EntityType::new("person_knows", EntityKind::Table);
        e.add_attribute(Attribute::new(
            "person_id",
            DataType::primitive(PrimitiveType::ObjectId),
        ))
        .unwrap();
        e.add_attribute(Attribute::new(
            "knows_person_id",
            DataType::primitive(PrimitiveType::ObjectId),
        ))
        .unwrap();
        e.add_key(Key::primary(vec![
            "person_id".into(),
            "knows_person_id".into(),
        ]))
        .unwrap();
        db.add_entity(e).unwrap();

        let sql = RelationalAdapter::new().export(&db).unwrap();
        assert!(sql.contains("person_id VARCHAR(24) NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (person_id, knows_person_id)"));
        // Composite members are never inlined as PRIMARY KEY.
        assert!(!sql.contains("person_id VARCHAR(24) PRIMARY KEY"));
    }

    #[test]
    fn test_round_trip_import_of_exported_ddl() {
        let db = RelationalAdapter::new().import(DDL, "people").unwrap();
        let sql = RelationalAdapter::new().export(&db).unwrap();
        let back = RelationalAdapter::new().import(&sql, "people").unwrap();
        assert_eq!(back.entity_types.len(), 2);
        let address = back.entity("address").unwrap();
        assert_eq!(
            address.get_relationship("person_id").unwrap().target(),
            "person"
        );
    }
}
