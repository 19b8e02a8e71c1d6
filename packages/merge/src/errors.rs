//! Error types for the merge engine

use sitediff_model::{InvariantViolation, ModelError, Uid};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Node {uid} missing from document {document}")]
    MissingNode { document: String, uid: Uid },

    #[error("Component {uid} missing from document {document}")]
    MissingComponent { document: String, uid: Uid },

    #[error("Node {0} changed kind between documents")]
    KindMismatch(Uid),

    #[error("Cycle repair for component {component} did not settle after {iterations} iterations")]
    CycleRepairDiverged { component: Uid, iterations: usize },

    #[error("No pending conflict at {0}")]
    UnknownConflict(String),

    #[error("Field {class}.{field} is not a scalar field")]
    NotScalar {
        class: &'static str,
        field: &'static str,
    },

    #[error("Merged document is unsound: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invariants(Vec<InvariantViolation>),
}

pub type MergeResult<T> = Result<T, MergeError>;
