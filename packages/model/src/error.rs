use crate::ids::Uid;
use crate::invariants::InvariantViolation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Node not found: {0}")]
    NodeNotFound(Uid),

    #[error("Component not found: {0}")]
    ComponentNotFound(Uid),

    #[error("Document has {} invariant violation(s): {}", .0.len(), summarize(.0))]
    Invariants(Vec<InvariantViolation>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn summarize(violations: &[InvariantViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ModelResult<T> = Result<T, ModelError>;
