//! Native schema adapters: bidirectional converters between a concrete
//! schema format and the canonical model.
//!
//! Import is best-effort two-pass: entities first, then delayed
//! reference resolution via [`crate::resolver::resolve_pending`], so a
//! foreign key may name a table declared later in the input. Export is
//! deterministic; relational emission orders referenced tables first.

mod document;
mod relational;

pub use document::DocumentAdapter;
pub use relational::RelationalAdapter;

use crate::core::{Database, Paradigm};
use crate::error::{Result, SchemaError};

/// A bidirectional converter for one native schema format.
pub trait SchemaAdapter {
    /// Paradigm this adapter speaks.
    fn paradigm(&self) -> Paradigm;

    /// Parse native schema text into the canonical model.
    fn import(&self, input: &str, db_name: &str) -> Result<Database>;

    /// Emit the canonical model as native schema text.
    fn export(&self, db: &Database) -> Result<String>;
}

/// Adapter for a paradigm, if one is implemented.
pub fn adapter_for(paradigm: Paradigm) -> Result<Box<dyn SchemaAdapter>> {
    match paradigm {
        Paradigm::Relational => Ok(Box::new(RelationalAdapter::new())),
        Paradigm::Document => Ok(Box::new(DocumentAdapter::new())),
        Paradigm::Graph | Paradigm::Columnar => Err(SchemaError::adapter(format!(
            "no native adapter for the {paradigm:?} paradigm; use the JSON model format"
        ))),
    }
}
