//! Canonical entity-relationship graph: Database -> EntityType ->
//! {Attribute, Relationship, Key, StructuralVariation}.
//!
//! The model owns all structural mutation primitives used by the engine.
//! Local invariants (name uniqueness, at most one PRIMARY key, key members
//! owned by the entity) are enforced at the call site so a violating
//! mutation is rejected instead of corrupting the graph. Global invariants
//! that span entities (dangling relationship targets) are the engine's job
//! at program end, because intermediate states may be transiently
//! inconsistent.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::datatype::DataType;
use crate::error::{Result, SchemaError};

/// Abstract structural paradigm of a database, not product-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paradigm {
    /// PostgreSQL, MySQL, Oracle, SQL Server...
    Relational,
    /// MongoDB, CouchDB, DocumentDB...
    Document,
    /// Neo4j, ArangoDB, JanusGraph...
    Graph,
    /// Cassandra, HBase, ScyllaDB...
    Columnar,
}

impl Paradigm {
    /// Parse the spelling used in SMEL headers and serialized models.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "relational" | "postgresql" | "sql" => Self::Relational,
            "document" | "mongodb" => Self::Document,
            "graph" | "neo4j" => Self::Graph,
            "columnar" | "cassandra" => Self::Columnar,
            _ => return None,
        })
    }
}

/// Structural kind of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Standard relational table.
    #[default]
    Table,
    /// Top-level collection document (root entity).
    Document,
    /// Nested/embedded document (non-root entity).
    Embedded,
    /// Graph node.
    Vertex,
    /// Graph relationship materialized as an entity.
    Edge,
    /// Cassandra-style table with partition/clustering keys.
    WideColumnTable,
}

/// Key constraint kinds across the supported paradigms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyKind {
    Primary,
    Unique,
    Foreign,
    Partition,
    Clustering,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Primary => "PRIMARY",
            KeyKind::Unique => "UNIQUE",
            KeyKind::Foreign => "FOREIGN",
            KeyKind::Partition => "PARTITION",
            KeyKind::Clustering => "CLUSTERING",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_uppercase().as_str() {
            "PRIMARY" => Self::Primary,
            "UNIQUE" => Self::Unique,
            "FOREIGN" => Self::Foreign,
            "PARTITION" => Self::Partition,
            "CLUSTERING" => Self::Clustering,
            _ => return None,
        })
    }

    /// PRIMARY and PARTITION keys exist at most once per entity.
    pub fn is_singular(&self) -> bool {
        matches!(self, KeyKind::Primary | KeyKind::Partition)
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multiplicity/optionality of a relationship, one of four closed symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Cardinality {
    /// `?` — optional, at most one. Bounds (0, 1).
    #[serde(rename = "?")]
    ZeroToOne,
    /// `&` — required, exactly one. Bounds (1, 1).
    #[serde(rename = "&")]
    #[default]
    OneToOne,
    /// `*` — optional, unbounded. Bounds (0, -1).
    #[serde(rename = "*")]
    ZeroToMany,
    /// `+` — required, unbounded. Bounds (1, -1).
    #[serde(rename = "+")]
    OneToMany,
}

impl Cardinality {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "?" => Self::ZeroToOne,
            "&" => Self::OneToOne,
            "*" => Self::ZeroToMany,
            "+" => Self::OneToMany,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::ZeroToOne => "?",
            Self::OneToOne => "&",
            Self::ZeroToMany => "*",
            Self::OneToMany => "+",
        }
    }

    /// (lower, upper) bounds; -1 means unbounded.
    pub fn bounds(&self) -> (i32, i32) {
        match self {
            Self::ZeroToOne => (0, 1),
            Self::OneToOne => (1, 1),
            Self::ZeroToMany => (0, -1),
            Self::OneToMany => (1, -1),
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::ZeroToMany | Self::OneToMany)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::OneToOne | Self::OneToMany)
    }
}

fn default_true() -> bool {
    true
}

fn new_meta_id() -> Uuid {
    Uuid::new_v4()
}

/// A scalar or collection-valued field of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default = "default_true")]
    pub is_optional: bool,
    #[serde(default = "new_meta_id")]
    pub meta_id: Uuid,
}

impl Attribute {
    /// Optional non-key attribute.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Attribute {
            name: name.into(),
            data_type,
            is_key: false,
            is_optional: true,
            meta_id: Uuid::new_v4(),
        }
    }

    /// Identifying attribute. Key attributes are never optional.
    pub fn key(name: impl Into<String>, data_type: DataType) -> Self {
        Attribute {
            name: name.into(),
            data_type,
            is_key: true,
            is_optional: false,
            meta_id: Uuid::new_v4(),
        }
    }

    pub fn required(mut self) -> Self {
        self.is_optional = false;
        self
    }

    /// Mark identifying; forces `is_optional = false`.
    pub fn mark_key(&mut self) {
        self.is_key = true;
        self.is_optional = false;
    }

    /// Duplicate with a fresh `meta_id`, optionally under a new name.
    pub fn duplicate(&self, name: Option<&str>) -> Self {
        Attribute {
            name: name.unwrap_or(&self.name).to_string(),
            data_type: self.data_type.clone(),
            is_key: self.is_key,
            is_optional: self.is_optional,
            meta_id: Uuid::new_v4(),
        }
    }
}

/// A uniqueness/identity constraint. Member attributes are stored by name
/// and must belong to the owning entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    #[serde(default = "Key::default_kind", rename = "key_type")]
    pub kind: KeyKind,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default = "default_true")]
    pub is_managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_attributes: Vec<String>,
}

impl Key {
    fn default_kind() -> KeyKind {
        KeyKind::Primary
    }

    pub fn new(kind: KeyKind, attributes: Vec<String>) -> Self {
        Key {
            kind,
            attributes,
            is_managed: true,
            referenced_entity: None,
            referenced_attributes: Vec::new(),
        }
    }

    pub fn primary(attributes: Vec<String>) -> Self {
        Self::new(KeyKind::Primary, attributes)
    }

    /// Foreign key referencing another entity's attributes.
    pub fn foreign(
        attributes: Vec<String>,
        referenced_entity: impl Into<String>,
        referenced_attributes: Vec<String>,
    ) -> Self {
        Key {
            kind: KeyKind::Foreign,
            attributes,
            is_managed: false,
            referenced_entity: Some(referenced_entity.into()),
            referenced_attributes,
        }
    }
}

/// Structural link between entities: a closed tagged variant so every
/// consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Relationship {
    /// Named, resolvable pointer to a distinct top-level entity
    /// (foreign-key-like). Edge attributes carry payload when the
    /// relationship itself has data (graph paradigm).
    Reference {
        name: String,
        target: String,
        #[serde(default)]
        cardinality: Cardinality,
        #[serde(default = "default_true")]
        is_optional: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        edge_attributes: Vec<Attribute>,
        #[serde(default = "new_meta_id")]
        meta_id: Uuid,
    },
    /// Structural nesting: the owner's instances contain the target's.
    Aggregate {
        name: String,
        target: String,
        #[serde(default)]
        cardinality: Cardinality,
        #[serde(default = "default_true")]
        is_optional: bool,
        #[serde(default = "new_meta_id")]
        meta_id: Uuid,
    },
}

impl Relationship {
    pub fn reference(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        is_optional: bool,
    ) -> Self {
        Relationship::Reference {
            name: name.into(),
            target: target.into(),
            cardinality,
            is_optional,
            edge_attributes: Vec::new(),
            meta_id: Uuid::new_v4(),
        }
    }

    pub fn aggregate(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        is_optional: bool,
    ) -> Self {
        Relationship::Aggregate {
            name: name.into(),
            target: target.into(),
            cardinality,
            is_optional,
            meta_id: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Relationship::Reference { name, .. } | Relationship::Aggregate { name, .. } => name,
        }
    }

    pub fn set_name(&mut self, new_name: impl Into<String>) {
        match self {
            Relationship::Reference { name, .. } | Relationship::Aggregate { name, .. } => {
                *name = new_name.into();
            }
        }
    }

    /// Target entity name. A named reference, not an owning pointer: the
    /// engine resolves it by lookup at evaluation time.
    pub fn target(&self) -> &str {
        match self {
            Relationship::Reference { target, .. } | Relationship::Aggregate { target, .. } => {
                target
            }
        }
    }

    pub fn set_target(&mut self, new_target: impl Into<String>) {
        match self {
            Relationship::Reference { target, .. } | Relationship::Aggregate { target, .. } => {
                *target = new_target.into();
            }
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Relationship::Reference { cardinality, .. }
            | Relationship::Aggregate { cardinality, .. } => *cardinality,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Relationship::Reference { is_optional, .. }
            | Relationship::Aggregate { is_optional, .. } => *is_optional,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Relationship::Aggregate { .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Relationship::Reference { .. })
    }
}

/// An observed alternative shape of a document-like entity
/// (schema-on-read support).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralVariation {
    pub variation_id: u32,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl StructuralVariation {
    pub fn new(variation_id: u32) -> Self {
        StructuralVariation {
            variation_id,
            attributes: Vec::new(),
            relationships: Vec::new(),
            count: 0,
            first_seen: None,
            last_seen: None,
        }
    }

    /// Record one more observation of this shape.
    pub fn observe(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        if self.first_seen.is_none() {
            self.first_seen = Some(at);
        }
        self.last_seen = Some(at);
    }
}

/// A table / document type / vertex type / wide-column table.
///
/// The qualified name is an ordered path: nested document types extend
/// their owner's path (`["person", "address"]`). `is_root = false` only for
/// entities reachable via an Aggregate relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub path: Vec<String>,
    #[serde(default, rename = "entity_kind")]
    pub kind: EntityKind,
    #[serde(default = "default_true")]
    pub is_root: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub keys: Vec<Key>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variations: Vec<StructuralVariation>,
    #[serde(default = "new_meta_id")]
    pub meta_id: Uuid,
}

impl EntityType {
    /// Top-level root entity with a single-segment path.
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        EntityType {
            path: vec![name.into()],
            kind,
            is_root: true,
            attributes: Vec::new(),
            relationships: Vec::new(),
            keys: Vec::new(),
            variations: Vec::new(),
            meta_id: Uuid::new_v4(),
        }
    }

    /// Nested entity whose path extends its owner's.
    pub fn nested(path: Vec<String>, kind: EntityKind) -> Self {
        EntityType {
            path,
            kind,
            is_root: false,
            attributes: Vec::new(),
            relationships: Vec::new(),
            keys: Vec::new(),
            variations: Vec::new(),
            meta_id: Uuid::new_v4(),
        }
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// Dotted qualified name, the registry key.
    pub fn full_name(&self) -> String {
        self.path.join(".")
    }

    // ----- attributes -----

    pub fn add_attribute(&mut self, attr: Attribute) -> Result<()> {
        if self.get_attribute(&attr.name).is_some() {
            return Err(SchemaError::DuplicateAttribute {
                entity: self.full_name(),
                attribute: attr.name,
            });
        }
        self.attributes.push(attr);
        Ok(())
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn get_attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let idx = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(idx))
    }

    /// Identifying attributes, in declaration order.
    pub fn key_attributes(&self) -> Vec<&Attribute> {
        self.attributes.iter().filter(|a| a.is_key).collect()
    }

    // ----- relationships -----

    pub fn add_relationship(&mut self, rel: Relationship) -> Result<()> {
        if self.get_relationship(rel.name()).is_some() {
            return Err(SchemaError::DuplicateRelationship {
                entity: self.full_name(),
                relationship: rel.name().to_string(),
            });
        }
        self.relationships.push(rel);
        Ok(())
    }

    pub fn get_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name() == name)
    }

    pub fn get_relationship_mut(&mut self, name: &str) -> Option<&mut Relationship> {
        self.relationships.iter_mut().find(|r| r.name() == name)
    }

    pub fn remove_relationship(&mut self, name: &str) -> Option<Relationship> {
        let idx = self.relationships.iter().position(|r| r.name() == name)?;
        Some(self.relationships.remove(idx))
    }

    pub fn get_references(&self) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.is_reference())
            .collect()
    }

    pub fn get_aggregates(&self) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.is_aggregate())
            .collect()
    }

    // ----- keys -----

    /// Add a key constraint. Rejects a second PRIMARY/PARTITION key and
    /// members the entity does not own; marks member attributes as
    /// identifying (and therefore required).
    pub fn add_key(&mut self, key: Key) -> Result<()> {
        if key.kind.is_singular() && self.keys.iter().any(|k| k.kind == key.kind) {
            return Err(SchemaError::DuplicateKey {
                entity: self.full_name(),
                kind: key.kind.to_string(),
            });
        }
        for member in &key.attributes {
            if self.get_attribute(member).is_none() {
                return Err(SchemaError::KeyMemberNotOwned {
                    entity: self.full_name(),
                    attribute: member.clone(),
                });
            }
        }
        if matches!(key.kind, KeyKind::Primary | KeyKind::Partition) {
            for member in &key.attributes {
                if let Some(attr) = self.get_attribute_mut(member) {
                    attr.mark_key();
                }
            }
        }
        self.keys.push(key);
        Ok(())
    }

    pub fn get_primary_key(&self) -> Option<&Key> {
        self.keys.iter().find(|k| k.kind == KeyKind::Primary)
    }

    pub fn get_partition_key(&self) -> Option<&Key> {
        self.keys.iter().find(|k| k.kind == KeyKind::Partition)
    }

    pub fn get_unique_keys(&self) -> Vec<&Key> {
        self.keys.iter().filter(|k| k.kind == KeyKind::Unique).collect()
    }

    pub fn get_foreign_keys(&self) -> Vec<&Key> {
        self.keys.iter().filter(|k| k.kind == KeyKind::Foreign).collect()
    }

    pub fn get_clustering_keys(&self) -> Vec<&Key> {
        self.keys
            .iter()
            .filter(|k| k.kind == KeyKind::Clustering)
            .collect()
    }

    /// Remove the first key of the given kind.
    pub fn drop_key(&mut self, kind: KeyKind) -> Option<Key> {
        let idx = self.keys.iter().position(|k| k.kind == kind)?;
        Some(self.keys.remove(idx))
    }

    /// Remove every key whose member list mentions the attribute. Returns
    /// how many were dropped.
    pub fn drop_keys_mentioning(&mut self, attribute: &str) -> usize {
        let before = self.keys.len();
        self.keys
            .retain(|k| !k.attributes.iter().any(|a| a == attribute));
        before - self.keys.len()
    }

    // ----- variations -----

    pub fn add_variation(&mut self, variation: StructuralVariation) -> Result<()> {
        if self.get_variation(variation.variation_id).is_some() {
            return Err(SchemaError::DuplicateVariation {
                entity: self.full_name(),
                variation_id: variation.variation_id,
            });
        }
        self.variations.push(variation);
        Ok(())
    }

    pub fn get_variation(&self, variation_id: u32) -> Option<&StructuralVariation> {
        self.variations
            .iter()
            .find(|v| v.variation_id == variation_id)
    }

    pub fn remove_variation(&mut self, variation_id: u32) -> Option<StructuralVariation> {
        let idx = self
            .variations
            .iter()
            .position(|v| v.variation_id == variation_id)?;
        Some(self.variations.remove(idx))
    }
}

/// A named graph edge type between two entities. Distinct from
/// [`Relationship`], which is intra-entity structural nesting/reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipType {
    pub name: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default = "RelationshipType::default_cardinality")]
    pub cardinality: Cardinality,
    #[serde(default = "new_meta_id")]
    pub meta_id: Uuid,
}

impl RelationshipType {
    fn default_cardinality() -> Cardinality {
        Cardinality::ZeroToMany
    }

    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        RelationshipType {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            attributes: Vec::new(),
            cardinality,
            meta_id: Uuid::new_v4(),
        }
    }
}

/// One schema migration unit: the top-level owner of all entity types and
/// graph edge types. Entity names are unique within a database; the version
/// counter increases once per committed engine operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(rename = "db_name")]
    pub name: String,
    #[serde(rename = "db_type")]
    pub paradigm: Paradigm,
    #[serde(default = "Database::default_version")]
    pub version: u32,
    #[serde(default)]
    pub entity_types: IndexMap<String, EntityType>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub relationship_types: IndexMap<String, RelationshipType>,
    #[serde(default = "new_meta_id")]
    pub meta_id: Uuid,
}

impl Database {
    fn default_version() -> u32 {
        1
    }

    pub fn new(name: impl Into<String>, paradigm: Paradigm) -> Self {
        Database {
            name: name.into(),
            paradigm,
            version: 1,
            entity_types: IndexMap::new(),
            relationship_types: IndexMap::new(),
            meta_id: Uuid::new_v4(),
        }
    }

    // ----- entity registry -----

    pub fn add_entity(&mut self, entity: EntityType) -> Result<()> {
        let key = entity.full_name();
        if self.entity_types.contains_key(&key) {
            return Err(SchemaError::DuplicateEntity(key));
        }
        self.entity_types.insert(key, entity);
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.get(name)
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut EntityType> {
        self.entity_types.get_mut(name)
    }

    pub fn expect_entity(&self, name: &str) -> Result<&EntityType> {
        self.entity_types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    pub fn expect_entity_mut(&mut self, name: &str) -> Result<&mut EntityType> {
        self.entity_types
            .get_mut(name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    /// Remove an entity by name, preserving the registry's insertion order.
    pub fn remove_entity(&mut self, name: &str) -> Option<EntityType> {
        self.entity_types.shift_remove(name)
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.entity_types.contains_key(name)
    }

    /// Root entities only (those not reachable purely via aggregation).
    pub fn root_entities(&self) -> Vec<&EntityType> {
        self.entity_types.values().filter(|e| e.is_root).collect()
    }

    // ----- relationship types (graph edges) -----

    pub fn add_relationship_type(&mut self, rel_type: RelationshipType) -> Result<()> {
        if self.relationship_types.contains_key(&rel_type.name) {
            return Err(SchemaError::DuplicateRelationshipType(rel_type.name));
        }
        self.relationship_types
            .insert(rel_type.name.clone(), rel_type);
        Ok(())
    }

    pub fn relationship_type(&self, name: &str) -> Option<&RelationshipType> {
        self.relationship_types.get(name)
    }

    pub fn remove_relationship_type(&mut self, name: &str) -> Option<RelationshipType> {
        self.relationship_types.shift_remove(name)
    }

    /// Bump the version counter after a committed operation.
    pub fn increment_version(&mut self) -> u32 {
        self.version += 1;
        self.version
    }

    // ----- serialization -----

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut db: Database = serde_json::from_str(json)?;
        // Registry keys are derived state; rebuild them from entity paths so
        // hand-edited files with stale keys still load consistently.
        let entities: Vec<EntityType> = db.entity_types.drain(..).map(|(_, e)| e).collect();
        for entity in entities {
            db.entity_types.insert(entity.full_name(), entity);
        }
        Ok(db)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
