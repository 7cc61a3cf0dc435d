//! SMEL (Schema Migration Evolution Language) parser.
//!
//! A migration script is a header followed by `;`-terminated operation
//! statements. Keywords are case-insensitive, `--` starts a line comment,
//! and qualified names are dotted (`person.address.street`). The parser is
//! a hand-written tokenizer plus recursive descent producing the same
//! [`Operation`] records the engine accepts when driven programmatically.
//!
//! ```text
//! MIGRATION person_d2r : 1.0;
//! FROM document TO relational;
//!
//! UNWIND person.tags[] AS person_tag;
//! UNWIND person.knows[] AS person_knows ADD REFERENCE knows_person_id TO person;
//! FLATTEN person.address AS address ADD REFERENCE address_id TO person;
//! ```

use tracing::debug;

use crate::core::{Cardinality, DataType, EntityKind, KeyKind, Paradigm, PrimitiveType};
use crate::engine::{EdgeProperty, Operation, ReferenceClause, SplitSide};
use crate::error::{Result, SchemaError};

/// A parsed migration script: header metadata plus the operation list.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationProgram {
    pub name: String,
    pub version: String,
    pub source: Option<Paradigm>,
    pub target: Option<Paradigm>,
    /// `USING schema : version`, when present.
    pub using_schema: Option<String>,
    pub operations: Vec<Operation>,
}

/// Parse a complete SMEL script.
pub fn parse_program(input: &str) -> Result<MigrationProgram> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.migration()?;
    debug!(
        name = %program.name,
        operations = program.operations.len(),
        "parsed migration program"
    );
    Ok(program)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(u32),
    Sym(char),
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
}

const SYMBOLS: &[char] = &[
    '.', ',', ';', ':', '(', ')', '<', '>', '[', ']', '?', '&', '*', '+',
];

fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    for (idx, raw_line) in input.lines().enumerate() {
        let line = idx + 1;
        let text = match raw_line.find("--") {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let mut chars = text.char_indices().peekable();
        while let Some(&(start, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
            } else if c.is_ascii_alphabetic() || c == '_' {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    tok: Tok::Ident(text[start..end].to_string()),
                    line,
                });
            } else if c.is_ascii_digit() {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_digit() {
                        end = i + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: u32 = text[start..end]
                    .parse()
                    .map_err(|_| SchemaError::parse(line, "number out of range"))?;
                tokens.push(Spanned {
                    tok: Tok::Number(value),
                    line,
                });
            } else if SYMBOLS.contains(&c) {
                chars.next();
                tokens.push(Spanned {
                    tok: Tok::Sym(c),
                    line,
                });
            } else {
                return Err(SchemaError::parse(line, format!("unexpected character '{c}'")));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn err(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::parse(self.line(), message)
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|t| t.tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Whether the next token is the given keyword (case-insensitive).
    fn at_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    /// Consume the keyword if present.
    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.err(format!("expected '{kw}'")))
        }
    }

    fn at_sym(&self, sym: char) -> bool {
        matches!(self.peek(), Some(Tok::Sym(c)) if *c == sym)
    }

    fn eat_sym(&mut self, sym: char) -> bool {
        if self.at_sym(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: char) -> Result<()> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(self.err(format!("expected '{sym}'")))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Tok::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.err("expected identifier")),
        }
    }

    fn number(&mut self) -> Result<u32> {
        match self.peek() {
            Some(Tok::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(n)
            }
            _ => Err(self.err("expected number")),
        }
    }

    /// `1` or `1.0` style version literal.
    fn version(&mut self) -> Result<String> {
        let major = self.number()?;
        if self.eat_sym('.') {
            let minor = self.number()?;
            Ok(format!("{major}.{minor}"))
        } else {
            Ok(major.to_string())
        }
    }

    /// Dotted qualified name as its segment list.
    fn qualified(&mut self) -> Result<Vec<String>> {
        let mut segments = vec![self.ident()?];
        while self.eat_sym('.') {
            segments.push(self.ident()?);
        }
        Ok(segments)
    }

    /// Qualified name split into (entity, feature). The last segment is the
    /// feature; everything before it is the (possibly nested) entity name.
    fn entity_feature(&mut self) -> Result<(String, String)> {
        let segments = self.qualified()?;
        if segments.len() < 2 {
            return Err(self.err("expected 'entity.feature'"));
        }
        let feature = segments.last().unwrap().clone();
        let entity = segments[..segments.len() - 1].join(".");
        Ok((entity, feature))
    }

    fn cardinality(&mut self) -> Result<Cardinality> {
        match self.next() {
            Some(Tok::Sym(c)) if "?&*+".contains(c) => {
                Ok(Cardinality::from_symbol(&c.to_string()).unwrap())
            }
            _ => Err(self.err("expected cardinality symbol (? & * +)")),
        }
    }

    fn with_cardinality(&mut self) -> Result<Option<Cardinality>> {
        if self.eat_kw("WITH") {
            self.expect_kw("CARDINALITY")?;
            Ok(Some(self.cardinality()?))
        } else {
            Ok(None)
        }
    }

    /// `ADD REFERENCE fk TO target` trailing clause.
    fn reference_clause(&mut self) -> Result<Option<ReferenceClause>> {
        if self.at_kw("ADD") {
            self.pos += 1;
            self.expect_kw("REFERENCE")?;
            let name = self.ident()?;
            self.expect_kw("TO")?;
            let target = self.qualified()?.join(".");
            Ok(Some(ReferenceClause { name, target }))
        } else {
            Ok(None)
        }
    }

    /// `string`, `string(100)`, `decimal(15,2)`, `list<string>`,
    /// `map<string, long>`.
    fn data_type(&mut self) -> Result<DataType> {
        let name = self.ident()?;
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "list" | "set" => {
                self.expect_sym('<')?;
                let element = self.data_type()?;
                self.expect_sym('>')?;
                Ok(if lower == "list" {
                    DataType::list(element)
                } else {
                    DataType::set(element)
                })
            }
            "map" => {
                self.expect_sym('<')?;
                let key = self.data_type()?;
                self.expect_sym(',')?;
                let value = self.data_type()?;
                self.expect_sym('>')?;
                Ok(DataType::Map {
                    key_type: Box::new(key),
                    value_type: Box::new(value),
                })
            }
            _ => {
                let primitive = PrimitiveType::parse(&name)
                    .ok_or_else(|| self.err(format!("unknown type '{name}'")))?;
                if self.eat_sym('(') {
                    let first = self.number()?;
                    let second = if self.eat_sym(',') {
                        Some(self.number()?)
                    } else {
                        None
                    };
                    self.expect_sym(')')?;
                    match (primitive, second) {
                        (PrimitiveType::String, None) => Ok(DataType::string(first)),
                        (PrimitiveType::Decimal | PrimitiveType::Decimal128, scale) => {
                            Ok(DataType::decimal(first, scale.unwrap_or(0)))
                        }
                        _ => Err(self.err(format!(
                            "type '{name}' does not take parameters"
                        ))),
                    }
                } else {
                    Ok(DataType::primitive(primitive))
                }
            }
        }
    }

    fn identifier_list(&mut self) -> Result<Vec<String>> {
        self.expect_sym('(')?;
        let mut names = vec![self.ident()?];
        while self.eat_sym(',') {
            names.push(self.ident()?);
        }
        self.expect_sym(')')?;
        Ok(names)
    }

    fn migration(&mut self) -> Result<MigrationProgram> {
        self.expect_kw("MIGRATION")?;
        let name = self.ident()?;
        self.expect_sym(':')?;
        let version = self.version()?;
        self.expect_sym(';')?;

        let (mut source, mut target) = (None, None);
        if self.eat_kw("FROM") {
            source = Some(self.paradigm()?);
            self.expect_kw("TO")?;
            target = Some(self.paradigm()?);
            self.expect_sym(';')?;
        }
        let mut using_schema = None;
        if self.eat_kw("USING") {
            let schema = self.ident()?;
            self.expect_sym(':')?;
            let schema_version = self.version()?;
            using_schema = Some(format!("{schema}:{schema_version}"));
            self.expect_sym(';')?;
        }

        let mut operations = Vec::new();
        while self.peek().is_some() {
            operations.push(self.operation()?);
        }
        Ok(MigrationProgram {
            name,
            version,
            source,
            target,
            using_schema,
            operations,
        })
    }

    fn paradigm(&mut self) -> Result<Paradigm> {
        let name = self.ident()?;
        Paradigm::parse(&name).ok_or_else(|| self.err(format!("unknown database type '{name}'")))
    }

    fn operation(&mut self) -> Result<Operation> {
        let op = if self.eat_kw("NEST") {
            self.nest()?
        } else if self.eat_kw("UNNEST") {
            self.unnest()?
        } else if self.eat_kw("FLATTEN") {
            self.flatten()?
        } else if self.eat_kw("UNWIND") {
            self.unwind()?
        } else if self.eat_kw("ADD") {
            self.add()?
        } else if self.eat_kw("DELETE") {
            self.delete()?
        } else if self.eat_kw("DROP") {
            self.drop_op()?
        } else if self.eat_kw("RENAME") {
            self.rename()?
        } else if self.eat_kw("COPY") {
            self.copy_or_move(false)?
        } else if self.eat_kw("MOVE") {
            self.copy_or_move(true)?
        } else if self.eat_kw("MERGE") {
            self.merge()?
        } else if self.eat_kw("SPLIT") {
            self.split()?
        } else if self.eat_kw("CAST") {
            self.cast()?
        } else if self.eat_kw("LINKING") {
            self.linking()?
        } else if self.eat_kw("EXTRACT") {
            self.extract()?
        } else {
            return Err(self.err("expected an operation keyword"));
        };
        self.expect_sym(';')?;
        Ok(op)
    }

    fn nest(&mut self) -> Result<Operation> {
        let source = self.qualified()?.join(".");
        self.expect_kw("INTO")?;
        let target = self.qualified()?.join(".");
        self.expect_kw("AS")?;
        let alias = self.ident()?;
        let cardinality = self.with_cardinality()?;
        Ok(Operation::Nest {
            source,
            target,
            alias,
            cardinality,
        })
    }

    fn unnest(&mut self) -> Result<Operation> {
        let source = self.ident()?;
        self.expect_kw("FROM")?;
        let target = self.qualified()?.join(".");
        Ok(Operation::Unnest { source, target })
    }

    fn flatten(&mut self) -> Result<Operation> {
        let (entity, aggregate) = self.entity_feature()?;
        self.expect_kw("AS")?;
        let name = self.ident()?;
        let reference = self.reference_clause()?;
        Ok(Operation::Flatten {
            entity,
            aggregate,
            name,
            reference,
        })
    }

    fn unwind(&mut self) -> Result<Operation> {
        let (entity, feature) = self.entity_feature()?;
        // Trailing `[]` marks the many-valued feature; optional.
        if self.eat_sym('[') {
            self.expect_sym(']')?;
        }
        self.expect_kw("AS")?;
        let alias = self.ident()?;
        let mut generate_key = None;
        if self.eat_kw("GENERATE") {
            self.expect_kw("KEY")?;
            generate_key = Some(self.ident()?);
            if self.eat_kw("AS") {
                self.expect_kw("SERIAL")?;
            }
        }
        let reference = self.reference_clause()?;
        Ok(Operation::Unwind {
            entity,
            feature,
            alias,
            generate_key,
            reference,
        })
    }

    fn add(&mut self) -> Result<Operation> {
        if self.eat_kw("ATTRIBUTE") {
            let (entity, name) = self.entity_feature()?;
            self.expect_kw("WITH")?;
            self.expect_kw("TYPE")?;
            let data_type = self.data_type()?;
            let mut optional = true;
            if self.eat_kw("NOT") {
                self.expect_kw("NULL")?;
                optional = false;
            }
            Ok(Operation::AddAttribute {
                entity,
                name,
                data_type,
                optional,
            })
        } else if self.eat_kw("REFERENCE") {
            let (entity, name) = self.entity_feature()?;
            self.expect_kw("TO")?;
            let target = self.qualified()?.join(".");
            let cardinality = self.with_cardinality()?;
            let mut optional = true;
            if self.eat_kw("NOT") {
                self.expect_kw("NULL")?;
                optional = false;
            }
            Ok(Operation::AddReference {
                entity,
                name,
                target,
                cardinality,
                optional,
            })
        } else if self.eat_kw("EMBEDDED") {
            let (entity, name) = self.entity_feature()?;
            self.expect_kw("TO")?;
            let target = self.qualified()?.join(".");
            let cardinality = self.with_cardinality()?;
            Ok(Operation::AddEmbedded {
                entity,
                name,
                target,
                cardinality,
                optional: true,
            })
        } else if self.eat_kw("ENTITY") {
            let name = self.ident()?;
            let kind = if self.eat_kw("AS") {
                Some(self.entity_kind()?)
            } else {
                None
            };
            Ok(Operation::AddEntity { name, kind })
        } else if self.eat_kw("KEY") {
            let kind = self.key_kind()?;
            let attributes = self.identifier_list()?;
            self.expect_kw("TO")?;
            let entity = self.qualified()?.join(".");
            Ok(Operation::AddKey {
                entity,
                kind,
                attributes,
            })
        } else if self.eat_kw("VARIATION") {
            let variation_id = self.number()?;
            self.expect_kw("TO")?;
            let entity = self.qualified()?.join(".");
            Ok(Operation::AddVariation {
                entity,
                variation_id,
            })
        } else if self.eat_kw("RELTYPE") {
            let name = self.ident()?;
            self.expect_kw("FROM")?;
            let source = self.qualified()?.join(".");
            self.expect_kw("TO")?;
            let target = self.qualified()?.join(".");
            let cardinality = self.with_cardinality()?;
            Ok(Operation::AddRelationshipType {
                name,
                source,
                target,
                cardinality,
            })
        } else {
            Err(self.err("expected ATTRIBUTE, REFERENCE, EMBEDDED, ENTITY, KEY, VARIATION or RELTYPE"))
        }
    }

    fn delete(&mut self) -> Result<Operation> {
        if self.eat_kw("ATTRIBUTE") {
            let (entity, name) = self.entity_feature()?;
            Ok(Operation::DeleteAttribute { entity, name })
        } else if self.eat_kw("REFERENCE") {
            let (entity, name) = self.entity_feature()?;
            Ok(Operation::DeleteReference { entity, name })
        } else if self.eat_kw("EMBEDDED") {
            let (entity, name) = self.entity_feature()?;
            Ok(Operation::DeleteEmbedded { entity, name })
        } else if self.eat_kw("ENTITY") {
            let name = self.qualified()?.join(".");
            Ok(Operation::DeleteEntity { name })
        } else {
            Err(self.err("expected ATTRIBUTE, REFERENCE, EMBEDDED or ENTITY"))
        }
    }

    fn drop_op(&mut self) -> Result<Operation> {
        if self.eat_kw("KEY") {
            let kind = self.key_kind()?;
            self.expect_kw("FROM")?;
            let entity = self.qualified()?.join(".");
            Ok(Operation::DropKey { entity, kind })
        } else if self.eat_kw("VARIATION") {
            let variation_id = self.number()?;
            self.expect_kw("FROM")?;
            let entity = self.qualified()?.join(".");
            Ok(Operation::DropVariation {
                entity,
                variation_id,
            })
        } else if self.eat_kw("RELTYPE") {
            let name = self.ident()?;
            Ok(Operation::DropRelationshipType { name })
        } else {
            Err(self.err("expected KEY, VARIATION or RELTYPE"))
        }
    }

    fn rename(&mut self) -> Result<Operation> {
        if self.eat_kw("ENTITY") {
            let from = self.qualified()?.join(".");
            self.expect_kw("TO")?;
            let to = self.ident()?;
            Ok(Operation::RenameEntity { from, to })
        } else if self.eat_kw("RELTYPE") {
            let from = self.ident()?;
            self.expect_kw("TO")?;
            let to = self.ident()?;
            Ok(Operation::RenameRelationshipType { from, to })
        } else {
            let from = self.ident()?;
            self.expect_kw("TO")?;
            let to = self.ident()?;
            self.expect_kw("IN")?;
            let entity = self.qualified()?.join(".");
            Ok(Operation::RenameFeature { entity, from, to })
        }
    }

    fn copy_or_move(&mut self, is_move: bool) -> Result<Operation> {
        let (entity, feature) = self.entity_feature()?;
        self.expect_kw("TO")?;
        let to = self.qualified()?.join(".");
        Ok(if is_move {
            Operation::Move {
                entity,
                feature,
                to,
            }
        } else {
            Operation::Copy {
                entity,
                feature,
                to,
            }
        })
    }

    fn merge(&mut self) -> Result<Operation> {
        let left = self.qualified()?.join(".");
        if !self.eat_sym(',') {
            self.expect_kw("AND")?;
        }
        let right = self.qualified()?.join(".");
        self.expect_kw("INTO")?;
        let into = self.ident()?;
        Ok(Operation::Merge { left, right, into })
    }

    fn split(&mut self) -> Result<Operation> {
        let entity = self.qualified()?.join(".");
        self.expect_kw("INTO")?;
        let left = self.split_side()?;
        if !self.eat_sym(',') {
            self.expect_kw("AND")?;
        }
        let right = self.split_side()?;
        Ok(Operation::Split {
            entity,
            left,
            right,
        })
    }

    fn split_side(&mut self) -> Result<SplitSide> {
        let name = self.ident()?;
        let attributes = self.identifier_list()?;
        Ok(SplitSide { name, attributes })
    }

    fn cast(&mut self) -> Result<Operation> {
        let (entity, attribute) = self.entity_feature()?;
        self.expect_kw("TO")?;
        let data_type = self.data_type()?;
        Ok(Operation::Cast {
            entity,
            attribute,
            data_type,
        })
    }

    fn linking(&mut self) -> Result<Operation> {
        let source = self.qualified()?.join(".");
        self.expect_kw("TO")?;
        let target = self.qualified()?.join(".");
        self.expect_kw("AS")?;
        let name = self.ident()?;
        let mut cardinality = None;
        let mut properties = Vec::new();
        while self.eat_kw("WITH") {
            if self.eat_kw("CARDINALITY") {
                cardinality = Some(self.cardinality()?);
            } else if self.eat_kw("PROPERTIES") {
                self.expect_sym('(')?;
                loop {
                    let prop_name = self.ident()?;
                    let data_type = self.data_type()?;
                    properties.push(EdgeProperty {
                        name: prop_name,
                        data_type,
                    });
                    if !self.eat_sym(',') {
                        break;
                    }
                }
                self.expect_sym(')')?;
            } else {
                return Err(self.err("expected CARDINALITY or PROPERTIES"));
            }
        }
        Ok(Operation::Linking {
            source,
            target,
            name,
            cardinality,
            properties,
        })
    }

    fn extract(&mut self) -> Result<Operation> {
        let attributes = self.identifier_list()?;
        self.expect_kw("FROM")?;
        let entity = self.qualified()?.join(".");
        self.expect_kw("AS")?;
        let name = self.ident()?;
        let reference = self.reference_clause()?;
        Ok(Operation::Extract {
            entity,
            attributes,
            name,
            reference,
        })
    }

    fn key_kind(&mut self) -> Result<KeyKind> {
        let name = self.ident()?;
        KeyKind::parse(&name).ok_or_else(|| self.err(format!("unknown key kind '{name}'")))
    }

    fn entity_kind(&mut self) -> Result<EntityKind> {
        let name = self.ident()?;
        Ok(match name.to_ascii_lowercase().as_str() {
            "table" => EntityKind::Table,
            "document" => EntityKind::Document,
            "embedded" => EntityKind::Embedded,
            "vertex" => EntityKind::Vertex,
            "edge" => EntityKind::Edge,
            "wide_column_table" => EntityKind::WideColumnTable,
            _ => return Err(self.err(format!("unknown entity kind '{name}'"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture_program() {
        let program = parse_program(
            r#"
            MIGRATION person_d2r : 1.0;
            FROM document TO relational;

            -- normalize arrays, then pull the embedded address out
            UNWIND person.tags[] AS person_tag;
            UNWIND person.knows[] AS person_knows ADD REFERENCE knows_person_id TO person;
            FLATTEN person.address AS address ADD REFERENCE address_id TO person;
            "#,
        )
        .unwrap();

        assert_eq!(program.name, "person_d2r");
        assert_eq!(program.version, "1.0");
        assert_eq!(program.source, Some(Paradigm::Document));
        assert_eq!(program.target, Some(Paradigm::Relational));
        assert_eq!(program.operations.len(), 3);
        assert_eq!(
            program.operations[1],
            Operation::Unwind {
                entity: "person".into(),
                feature: "knows".into(),
                alias: "person_knows".into(),
                generate_key: None,
                reference: Some(ReferenceClause {
                    name: "knows_person_id".into(),
                    target: "person".into(),
                }),
            }
        );
        assert_eq!(
            program.operations[2],
            Operation::Flatten {
                entity: "person".into(),
                aggregate: "address".into(),
                name: "address".into(),
                reference: Some(ReferenceClause {
                    name: "address_id".into(),
                    target: "person".into(),
                }),
            }
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let program = parse_program(
            "migration m : 1;\nfrom relational to document;\nnest address into person as address;",
        )
        .unwrap();
        assert_eq!(
            program.operations[0],
            Operation::Nest {
                source: "address".into(),
                target: "person".into(),
                alias: "address".into(),
                cardinality: None,
            }
        );
    }

    #[test]
    fn test_add_attribute_with_type_and_not_null() {
        let program = parse_program(
            "MIGRATION m : 1;\nADD ATTRIBUTE person.email WITH TYPE string(255) NOT NULL;",
        )
        .unwrap();
        assert_eq!(
            program.operations[0],
            Operation::AddAttribute {
                entity: "person".into(),
                name: "email".into(),
                data_type: DataType::string(255),
                optional: false,
            }
        );
    }

    #[test]
    fn test_container_and_parameterized_types() {
        let program = parse_program(
            "MIGRATION m : 1;\n\
             ADD ATTRIBUTE a.tags WITH TYPE list<string>;\n\
             ADD ATTRIBUTE a.prices WITH TYPE map<string, decimal(15, 2)>;\n\
             CAST a.total TO decimal(10, 4);",
        )
        .unwrap();
        assert_eq!(
            program.operations[0],
            Operation::AddAttribute {
                entity: "a".into(),
                name: "tags".into(),
                data_type: DataType::list(DataType::primitive(PrimitiveType::String)),
                optional: true,
            }
        );
        let Operation::AddAttribute { data_type, .. } = &program.operations[1] else {
            panic!("expected ADD ATTRIBUTE");
        };
        assert!(matches!(data_type, DataType::Map { .. }));
        assert_eq!(
            program.operations[2],
            Operation::Cast {
                entity: "a".into(),
                attribute: "total".into(),
                data_type: DataType::decimal(10, 4),
            }
        );
    }

    #[test]
    fn test_unwind_with_generated_serial_key() {
        let program = parse_program(
            "MIGRATION m : 1;\nUNWIND order.items[] AS order_item GENERATE KEY item_id AS SERIAL;",
        )
        .unwrap();
        assert_eq!(
            program.operations[0],
            Operation::Unwind {
                entity: "order".into(),
                feature: "items".into(),
                alias: "order_item".into(),
                generate_key: Some("item_id".into()),
                reference: None,
            }
        );
    }

    #[test]
    fn test_structural_statements() {
        let program = parse_program(
            "MIGRATION m : 1;\n\
             ADD ENTITY audit_log AS table;\n\
             ADD KEY PRIMARY (id, seq) TO audit_log;\n\
             RENAME ENTITY person TO customer;\n\
             RENAME full_name TO name IN customer;\n\
             DELETE ENTITY obsolete;\n\
             DROP KEY UNIQUE FROM customer;\n\
             MERGE customer, account INTO client;\n\
             SPLIT client INTO core (name), detail (street, city);",
        )
        .unwrap();
        assert_eq!(program.operations.len(), 8);
        assert_eq!(
            program.operations[1],
            Operation::AddKey {
                entity: "audit_log".into(),
                kind: KeyKind::Primary,
                attributes: vec!["id".into(), "seq".into()],
            }
        );
        assert_eq!(
            program.operations[7],
            Operation::Split {
                entity: "client".into(),
                left: SplitSide {
                    name: "core".into(),
                    attributes: vec!["name".into()],
                },
                right: SplitSide {
                    name: "detail".into(),
                    attributes: vec!["street".into(), "city".into()],
                },
            }
        );
    }

    #[test]
    fn test_linking_with_cardinality_and_properties() {
        let program = parse_program(
            "MIGRATION m : 1;\n\
             LINKING person TO company AS WORKS_AT WITH CARDINALITY * WITH PROPERTIES (since date, role string);",
        )
        .unwrap();
        let Operation::Linking {
            source,
            target,
            name,
            cardinality,
            properties,
        } = &program.operations[0]
        else {
            panic!("expected LINKING");
        };
        assert_eq!(source, "person");
        assert_eq!(target, "company");
        assert_eq!(name, "WORKS_AT");
        assert_eq!(*cardinality, Some(Cardinality::ZeroToMany));
        assert_eq!(properties.len(), 2);
        assert_eq!(properties[0].name, "since");
    }

    #[test]
    fn test_extract_statement() {
        let program = parse_program(
            "MIGRATION m : 1;\nEXTRACT (street, city) FROM person AS person_address;",
        )
        .unwrap();
        assert_eq!(
            program.operations[0],
            Operation::Extract {
                entity: "person".into(),
                attributes: vec!["street".into(), "city".into()],
                name: "person_address".into(),
                reference: None,
            }
        );
    }

    #[test]
    fn test_error_reports_line_number() {
        let err = parse_program("MIGRATION m : 1;\n\nFLATTEN person AS address;").unwrap_err();
        let SchemaError::Parse { line, .. } = err else {
            panic!("expected parse error, got {err}");
        };
        assert_eq!(line, 3);
    }

    #[test]
    fn test_missing_semicolon_fails() {
        let err = parse_program("MIGRATION m : 1;\nDELETE ENTITY person").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { .. }));
    }

    #[test]
    fn test_header_is_required() {
        let err = parse_program("DELETE ENTITY person;").unwrap_err();
        assert!(matches!(err, SchemaError::Parse { .. }));
    }
}
