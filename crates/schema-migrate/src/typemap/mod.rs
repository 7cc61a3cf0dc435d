//! Primitive-to-native type spelling tables, one per structural paradigm.
//!
//! The forward direction is total: every (primitive, paradigm) pair has a
//! spelling, with string-like fallbacks where a paradigm has no direct
//! equivalent. The reverse direction (native name -> primitive) belongs to
//! the adapters, since native type name sets differ per concrete system.

use crate::core::{Paradigm, PrimitiveType};

/// Map a primitive kind to its native spelling for a paradigm.
pub fn primitive_to_native(primitive: PrimitiveType, paradigm: Paradigm) -> &'static str {
    match paradigm {
        Paradigm::Relational => relational(primitive),
        Paradigm::Document => document(primitive),
        Paradigm::Graph => graph(primitive),
        Paradigm::Columnar => columnar(primitive),
    }
}

fn relational(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::String => "VARCHAR(255)",
        PrimitiveType::Text => "TEXT",
        PrimitiveType::Integer => "INTEGER",
        PrimitiveType::Long => "BIGINT",
        PrimitiveType::Double => "DOUBLE PRECISION",
        PrimitiveType::Float => "REAL",
        PrimitiveType::Decimal => "DECIMAL",
        PrimitiveType::Boolean => "BOOLEAN",
        PrimitiveType::Date => "DATE",
        PrimitiveType::DateTime => "TIMESTAMP",
        PrimitiveType::Timestamp => "TIMESTAMP",
        PrimitiveType::Uuid => "UUID",
        PrimitiveType::Binary => "BYTEA",
        PrimitiveType::Null => "NULL",
        PrimitiveType::ObjectId => "VARCHAR(24)",
        PrimitiveType::Int32 => "INTEGER",
        PrimitiveType::Int64 => "BIGINT",
        PrimitiveType::Decimal128 => "DECIMAL",
    }
}

fn document(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::String => "string",
        PrimitiveType::Text => "string",
        PrimitiveType::Integer => "int",
        PrimitiveType::Long => "long",
        PrimitiveType::Double => "double",
        PrimitiveType::Float => "double",
        PrimitiveType::Decimal => "decimal",
        PrimitiveType::Boolean => "bool",
        PrimitiveType::Date => "date",
        PrimitiveType::DateTime => "date",
        PrimitiveType::Timestamp => "timestamp",
        PrimitiveType::Uuid => "binData",
        PrimitiveType::Binary => "binData",
        PrimitiveType::Null => "null",
        PrimitiveType::ObjectId => "objectId",
        PrimitiveType::Int32 => "int",
        PrimitiveType::Int64 => "long",
        PrimitiveType::Decimal128 => "decimal",
    }
}

fn graph(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::String => "String",
        PrimitiveType::Text => "String",
        PrimitiveType::Integer => "Integer",
        PrimitiveType::Long => "Long",
        PrimitiveType::Double => "Double",
        PrimitiveType::Float => "Float",
        PrimitiveType::Decimal => "Double",
        PrimitiveType::Boolean => "Boolean",
        PrimitiveType::Date => "Date",
        PrimitiveType::DateTime => "DateTime",
        PrimitiveType::Timestamp => "DateTime",
        PrimitiveType::Uuid => "String",
        PrimitiveType::Binary => "ByteArray",
        PrimitiveType::Null => "null",
        PrimitiveType::ObjectId => "String",
        PrimitiveType::Int32 => "Integer",
        PrimitiveType::Int64 => "Long",
        PrimitiveType::Decimal128 => "Double",
    }
}

fn columnar(p: PrimitiveType) -> &'static str {
    match p {
        PrimitiveType::String => "text",
        PrimitiveType::Text => "text",
        PrimitiveType::Integer => "int",
        PrimitiveType::Long => "bigint",
        PrimitiveType::Double => "double",
        PrimitiveType::Float => "float",
        PrimitiveType::Decimal => "decimal",
        PrimitiveType::Boolean => "boolean",
        PrimitiveType::Date => "date",
        PrimitiveType::DateTime => "timestamp",
        PrimitiveType::Timestamp => "timestamp",
        PrimitiveType::Uuid => "uuid",
        PrimitiveType::Binary => "blob",
        PrimitiveType::Null => "text",
        PrimitiveType::ObjectId => "text",
        PrimitiveType::Int32 => "int",
        PrimitiveType::Int64 => "bigint",
        PrimitiveType::Decimal128 => "decimal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relational_spellings() {
        assert_eq!(
            primitive_to_native(PrimitiveType::String, Paradigm::Relational),
            "VARCHAR(255)"
        );
        assert_eq!(
            primitive_to_native(PrimitiveType::Long, Paradigm::Relational),
            "BIGINT"
        );
        assert_eq!(
            primitive_to_native(PrimitiveType::ObjectId, Paradigm::Relational),
            "VARCHAR(24)"
        );
    }

    #[test]
    fn test_document_spellings() {
        assert_eq!(
            primitive_to_native(PrimitiveType::ObjectId, Paradigm::Document),
            "objectId"
        );
        assert_eq!(
            primitive_to_native(PrimitiveType::Uuid, Paradigm::Document),
            "binData"
        );
    }

    #[test]
    fn test_fallbacks_are_string_like() {
        // Paradigms without a direct equivalent still produce a spelling.
        assert_eq!(
            primitive_to_native(PrimitiveType::Uuid, Paradigm::Graph),
            "String"
        );
        assert_eq!(
            primitive_to_native(PrimitiveType::Null, Paradigm::Columnar),
            "text"
        );
    }

    #[test]
    fn test_totality() {
        // Every combination yields a non-empty spelling.
        let all = [
            PrimitiveType::String,
            PrimitiveType::Text,
            PrimitiveType::Integer,
            PrimitiveType::Long,
            PrimitiveType::Double,
            PrimitiveType::Float,
            PrimitiveType::Decimal,
            PrimitiveType::Boolean,
            PrimitiveType::Date,
            PrimitiveType::DateTime,
            PrimitiveType::Timestamp,
            PrimitiveType::Uuid,
            PrimitiveType::Binary,
            PrimitiveType::Null,
            PrimitiveType::ObjectId,
            PrimitiveType::Int32,
            PrimitiveType::Int64,
            PrimitiveType::Decimal128,
        ];
        for paradigm in [
            Paradigm::Relational,
            Paradigm::Document,
            Paradigm::Graph,
            Paradigm::Columnar,
        ] {
            for p in all {
                assert!(!primitive_to_native(p, paradigm).is_empty());
            }
        }
    }
}
