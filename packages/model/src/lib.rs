//! Document model for the site merge engine: components, variant settings
//! and a node arena with parent back-references.

pub mod document;
pub mod error;
pub mod ids;
pub mod invariants;
pub mod mutations;
pub mod node;
pub mod visitor;

pub use document::{
    Component, ComponentKind, Document, Param, ParamKind, State, Variant, VariantKind,
    BASE_VARIANT_KEY,
};
pub use error::{ModelError, ModelResult};
pub use ids::{get_document_id, hash_parts, IdGenerator, Uid};
pub use invariants::{assert_document, check_document, InvariantViolation};
pub use mutations::{Mutation, MutationError};
pub use node::{Arg, ArgExpr, Node, NodeKind, ParentSlot, VariantSetting};

/// Parse a document from JSON
pub fn parse_document(json: &str) -> ModelResult<Document> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize a document as pretty JSON
pub fn to_json(doc: &Document) -> ModelResult<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}
