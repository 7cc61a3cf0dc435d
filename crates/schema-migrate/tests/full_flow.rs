//! Document-to-relational migration, end to end: JSON Schema import,
//! migration program parse, engine run, DDL export.

use schema_migrate::{
    parse_program, DocumentAdapter, Paradigm, RelationalAdapter, SchemaAdapter, TransformEngine,
};

const PERSON_SCHEMA: &str = r#"{
    "title": "person",
    "bsonType": "object",
    "required": ["_id", "name"],
    "properties": {
        "_id": {"bsonType": "objectId"},
        "name": {"bsonType": "string", "maxLength": 100},
        "age": {"bsonType": "int"},
        "tags": {"bsonType": "array", "items": {"bsonType": "string"}},
        "address": {
            "bsonType": "object",
            "required": ["street"],
            "properties": {
                "street": {"bsonType": "string"},
                "city": {"bsonType": "string"}
            }
        },
        "knows": {
            "bsonType": "array",
            "items": {
                "bsonType": "object",
                "required": ["knows_person_id"],
                "properties": {
                    "knows_person_id": {"bsonType": "objectId"}
                }
            }
        }
    }
}"#;

const PERSON_D2R: &str = "\
MIGRATION person_d2r : 1.0;
FROM document TO relational;

-- normalize the embedded collections, then pull the address out
UNWIND person.tags[] AS person_tag;
UNWIND person.knows[] AS person_knows ADD REFERENCE knows_person_id TO person;
FLATTEN person.address AS address ADD REFERENCE address_id TO person;
";

#[test]
fn person_document_to_relational() {
    let source = DocumentAdapter::new().import(PERSON_SCHEMA, "people").unwrap();
    assert_eq!(source.paradigm, Paradigm::Document);
    assert!(source.entity("person").unwrap().get_references().is_empty());

    let program = parse_program(PERSON_D2R).unwrap();
    assert_eq!(program.name, "person_d2r");
    assert_eq!(program.source, Some(Paradigm::Document));
    assert_eq!(program.target, Some(Paradigm::Relational));
    assert_eq!(program.operations.len(), 3);

    let outcome = TransformEngine::new(source).run(&program.operations);
    assert!(outcome.is_success(), "failure: {:?}", outcome.failure);
    let db = outcome.database;
    assert_eq!(db.version, 4);

    let names: Vec<&str> = db.entity_types.values().map(|e| e.name()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec!["address", "person", "person_knows", "person_tag"]);

    // person keeps its scalar attributes; the collections are gone.
    let person = db.entity("person").unwrap();
    assert!(person.get_attribute("_id").is_some());
    assert!(person.get_attribute("tags").is_none());
    assert!(person.get_relationship("address").is_none());
    assert!(person.get_relationship("knows").is_none());

    // person_tag: parent key plus the unwound value column, composite PK.
    let person_tag = db.entity("person_tag").unwrap();
    assert!(person_tag.get_attribute("person_id").is_some());
    assert!(person_tag.get_attribute("tags").is_some());
    assert_eq!(
        person_tag.get_primary_key().unwrap().attributes,
        vec!["person_id".to_string(), "tags".to_string()]
    );

    // person_knows: 2-member composite PK, both references back to person.
    let person_knows = db.entity("person_knows").unwrap();
    assert_eq!(person_knows.get_primary_key().unwrap().attributes.len(), 2);
    let ref_targets: Vec<&str> = person_knows
        .get_references()
        .iter()
        .map(|r| r.target())
        .collect();
    assert_eq!(ref_targets, vec!["person", "person"]);

    // address: extracted to a root entity holding the foreign key.
    let address = db.entity("address").unwrap();
    assert!(address.is_root);
    assert!(address.get_attribute("street").is_some());
    let addr_ref = address.get_relationship("address_id").unwrap();
    assert!(addr_ref.is_reference());
    assert_eq!(addr_ref.target(), "person");
    assert_eq!(
        address.get_primary_key().unwrap().attributes,
        vec!["address_id".to_string()]
    );

    // DDL export orders the referenced table first.
    let ddl = RelationalAdapter::new().export(&db).unwrap();
    let pos = |table: &str| {
        ddl.find(&format!("CREATE TABLE {table} "))
            .unwrap_or_else(|| panic!("missing table {table} in:\n{ddl}"))
    };
    let person_pos = pos("person");
    assert!(person_pos < pos("address"));
    assert!(person_pos < pos("person_tag"));
    assert!(person_pos < pos("person_knows"));
}

#[test]
fn failed_step_reports_index_and_preserves_committed_work() {
    let source = DocumentAdapter::new().import(PERSON_SCHEMA, "people").unwrap();
    let program = parse_program(
        "MIGRATION broken : 1.0;\n\
         UNWIND person.tags[] AS person_tag;\n\
         UNNEST nowhere FROM person;\n",
    )
    .unwrap();

    let outcome = TransformEngine::new(source).run(&program.operations);
    let failure = outcome.failure.expect("second step should fail");
    assert_eq!(failure.index, 1);
    // The snapshot keeps the first committed step.
    assert!(outcome.database.entity("person_tag").is_some());
    assert_eq!(outcome.database.version, 2);
}

#[test]
fn relational_round_trip_survives_reshaping() {
    let ddl = "\
        CREATE TABLE customer (\n\
            id SERIAL PRIMARY KEY,\n\
            full_name VARCHAR(200) NOT NULL,\n\
            city VARCHAR(100),\n\
            street VARCHAR(100)\n\
        );\n";
    let source = RelationalAdapter::new().import(ddl, "shop").unwrap();

    let program = parse_program(
        "MIGRATION shop_split : 1.0;\n\
         SPLIT customer INTO customer (full_name), customer_address (city, street);\n",
    )
    .unwrap();

    let (db, diagnostics) = TransformEngine::new(source)
        .run(&program.operations)
        .into_result()
        .unwrap();
    assert!(diagnostics.is_empty());

    let address = db.entity("customer_address").unwrap();
    assert!(address.get_attribute("city").is_some());
    assert!(address.get_attribute("id").is_some());

    let out = RelationalAdapter::new().export(&db).unwrap();
    assert!(out.contains("CREATE TABLE customer "));
    assert!(out.contains("CREATE TABLE customer_address "));
}

#[test]
fn renamed_foreign_key_column_keeps_its_references_clause() {
    let ddl = "\
        CREATE TABLE person (\n\
            id SERIAL PRIMARY KEY\n\
        );\n\
        CREATE TABLE orders (\n\
            id SERIAL PRIMARY KEY,\n\
            person_id INTEGER NOT NULL REFERENCES person(id)\n\
        );\n";
    let source = RelationalAdapter::new().import(ddl, "shop").unwrap();

    let program = parse_program(
        "MIGRATION fk_rename : 1.0;\n\
         RENAME person_id TO customer_id IN orders;\n",
    )
    .unwrap();
    let (db, _) = TransformEngine::new(source)
        .run(&program.operations)
        .into_result()
        .unwrap();

    let orders = db.entity("orders").unwrap();
    assert_eq!(
        orders.get_relationship("customer_id").unwrap().target(),
        "person"
    );
    let out = RelationalAdapter::new().export(&db).unwrap();
    assert!(out.contains("customer_id INTEGER NOT NULL REFERENCES person(id)"));
}

#[test]
fn cast_emits_lossy_diagnostics_without_failing() {
    let source = DocumentAdapter::new().import(PERSON_SCHEMA, "people").unwrap();
    let program = parse_program(
        "MIGRATION narrowing : 1.0;\n\
         CAST person.name TO string(10);\n\
         CAST person.age TO string;\n",
    )
    .unwrap();

    let outcome = TransformEngine::new(source).run(&program.operations);
    assert!(outcome.is_success());
    // max_length 100 -> 10 is lossy; int -> string is a safe widening.
    assert_eq!(outcome.diagnostics.len(), 1);
    assert!(matches!(
        outcome.diagnostics[0].kind,
        schema_migrate::DiagnosticKind::LossyCast
    ));
    assert_eq!(
        outcome.database.entity("person").unwrap().get_attribute("name").unwrap().data_type,
        schema_migrate::DataType::string(10)
    );
}
