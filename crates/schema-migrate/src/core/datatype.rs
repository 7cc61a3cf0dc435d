//! Data type shapes for attributes.
//!
//! The type universe is a closed catalog of primitive kinds plus three
//! recursive container shapes (list, set, map). Native spellings per
//! paradigm live in [`crate::typemap`]; reverse mapping (native name to
//! primitive) is adapter-owned because native type name sets differ per
//! concrete system.

use serde::{Deserialize, Serialize};

use super::model::Paradigm;
use crate::typemap;

/// Closed catalog of primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "timestamp")]
    Timestamp,
    #[serde(rename = "uuid")]
    Uuid,
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "objectId")]
    ObjectId,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "decimal128")]
    Decimal128,
}

impl PrimitiveType {
    /// Parse the canonical spelling used in serialized models and SMEL text.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "text" => Self::Text,
            "integer" | "int" => Self::Integer,
            "long" => Self::Long,
            "double" => Self::Double,
            "float" => Self::Float,
            "decimal" => Self::Decimal,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "timestamp" => Self::Timestamp,
            "uuid" => Self::Uuid,
            "binary" => Self::Binary,
            "null" => Self::Null,
            "objectid" => Self::ObjectId,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "decimal128" => Self::Decimal128,
            _ => return None,
        })
    }
}

/// Value type of an attribute: a closed enumeration of shapes with a
/// recursive definition. Container element types cannot transitively
/// contain their own container; the engine never constructs such a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DataType {
    Primitive {
        #[serde(rename = "type")]
        primitive: PrimitiveType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        precision: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<u32>,
    },
    List {
        element_type: Box<DataType>,
    },
    Set {
        element_type: Box<DataType>,
    },
    Map {
        key_type: Box<DataType>,
        value_type: Box<DataType>,
    },
}

impl DataType {
    /// Bare primitive with no length/precision parameters.
    pub fn primitive(primitive: PrimitiveType) -> Self {
        DataType::Primitive {
            primitive,
            max_length: None,
            precision: None,
            scale: None,
        }
    }

    /// String with a maximum length.
    pub fn string(max_length: u32) -> Self {
        DataType::Primitive {
            primitive: PrimitiveType::String,
            max_length: Some(max_length),
            precision: None,
            scale: None,
        }
    }

    /// Exact decimal with precision and scale.
    pub fn decimal(precision: u32, scale: u32) -> Self {
        DataType::Primitive {
            primitive: PrimitiveType::Decimal,
            max_length: None,
            precision: Some(precision),
            scale: Some(scale),
        }
    }

    /// List of an element type.
    pub fn list(element: DataType) -> Self {
        DataType::List {
            element_type: Box::new(element),
        }
    }

    /// Set of an element type.
    pub fn set(element: DataType) -> Self {
        DataType::Set {
            element_type: Box::new(element),
        }
    }

    /// The primitive kind, if this is a primitive shape.
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            DataType::Primitive { primitive, .. } => Some(*primitive),
            _ => None,
        }
    }

    /// Element type of a list or set shape.
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::List { element_type } | DataType::Set { element_type } => Some(element_type),
            _ => None,
        }
    }

    /// Whether this shape holds multiple values.
    pub fn is_collection(&self) -> bool {
        matches!(self, DataType::List { .. } | DataType::Set { .. })
    }

    /// Native type spelling for a paradigm. Total: unmapped combinations
    /// fall back to a string-like spelling, never fail.
    pub fn to_native(&self, paradigm: Paradigm) -> String {
        match self {
            DataType::Primitive {
                primitive,
                max_length,
                precision,
                scale,
            } => {
                if paradigm == Paradigm::Relational {
                    if *primitive == PrimitiveType::String {
                        if let Some(len) = max_length {
                            return format!("VARCHAR({len})");
                        }
                    }
                    if *primitive == PrimitiveType::Decimal {
                        if let Some(p) = precision {
                            return format!("DECIMAL({p},{})", scale.unwrap_or(0));
                        }
                    }
                }
                typemap::primitive_to_native(*primitive, paradigm).to_string()
            }
            DataType::List { element_type } => match paradigm {
                Paradigm::Relational => format!("{}[]", element_type.to_native(paradigm)),
                Paradigm::Document => "array".to_string(),
                Paradigm::Graph => format!("List<{}>", element_type.to_native(paradigm)),
                Paradigm::Columnar => format!("list<{}>", element_type.to_native(paradigm)),
            },
            DataType::Set { element_type } => match paradigm {
                Paradigm::Relational => format!("{}[]", element_type.to_native(paradigm)),
                Paradigm::Document => "array".to_string(),
                Paradigm::Graph => format!("List<{}>", element_type.to_native(paradigm)),
                Paradigm::Columnar => format!("set<{}>", element_type.to_native(paradigm)),
            },
            DataType::Map {
                key_type,
                value_type,
            } => match paradigm {
                Paradigm::Relational => "JSONB".to_string(),
                Paradigm::Document => "object".to_string(),
                Paradigm::Graph => "Map".to_string(),
                Paradigm::Columnar => format!(
                    "map<{}, {}>",
                    key_type.to_native(paradigm),
                    value_type.to_native(paradigm)
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_parse() {
        assert_eq!(PrimitiveType::parse("string"), Some(PrimitiveType::String));
        assert_eq!(PrimitiveType::parse("INT"), Some(PrimitiveType::Integer));
        assert_eq!(
            PrimitiveType::parse("objectId"),
            Some(PrimitiveType::ObjectId)
        );
        assert_eq!(PrimitiveType::parse("nope"), None);
    }

    #[test]
    fn test_relational_parameterized_spellings() {
        assert_eq!(
            DataType::string(100).to_native(Paradigm::Relational),
            "VARCHAR(100)"
        );
        assert_eq!(
            DataType::decimal(15, 2).to_native(Paradigm::Relational),
            "DECIMAL(15,2)"
        );
        // No parameters -> base spelling from the type map
        assert_eq!(
            DataType::primitive(PrimitiveType::String).to_native(Paradigm::Relational),
            "VARCHAR(255)"
        );
    }

    #[test]
    fn test_container_spellings_compose() {
        let list = DataType::list(DataType::primitive(PrimitiveType::Integer));
        assert_eq!(list.to_native(Paradigm::Relational), "INTEGER[]");
        assert_eq!(list.to_native(Paradigm::Document), "array");
        assert_eq!(list.to_native(Paradigm::Graph), "List<Integer>");
        assert_eq!(list.to_native(Paradigm::Columnar), "list<int>");

        let set = DataType::set(DataType::primitive(PrimitiveType::Uuid));
        assert_eq!(set.to_native(Paradigm::Columnar), "set<uuid>");

        let map = DataType::Map {
            key_type: Box::new(DataType::primitive(PrimitiveType::String)),
            value_type: Box::new(DataType::primitive(PrimitiveType::Long)),
        };
        assert_eq!(map.to_native(Paradigm::Columnar), "map<text, bigint>");
        assert_eq!(map.to_native(Paradigm::Relational), "JSONB");
    }

    #[test]
    fn test_serde_tagged_shape() {
        let dt = DataType::list(DataType::string(64));
        let json = serde_json::to_value(&dt).unwrap();
        assert_eq!(json["kind"], "list");
        assert_eq!(json["element_type"]["kind"], "primitive");
        assert_eq!(json["element_type"]["type"], "string");
        assert_eq!(json["element_type"]["max_length"], 64);

        let back: DataType = serde_json::from_value(json).unwrap();
        assert_eq!(back, dt);
    }
}
