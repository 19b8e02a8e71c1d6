//! # Sitediff Merge
//!
//! Three-way structural merge of site documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ ancestor, left, right (read-only)           │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: merged = copy of ancestor          │
//! │  - global variants, component set           │
//! │  - per component: fields, params, states,   │
//! │    variants, tree (root, parents, cycles),  │
//! │    per node: fields, children, settings     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ repair passes + invariant check             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Identity over position**: entities match by id, settings by
//!    canonical condition key, never by index
//! 2. **One-sided changes win**: only edits made on both sides can conflict
//! 3. **Deterministic**: the same inputs and picks give the same document
//!    and the same conflict paths
//!
//! ## Usage
//!
//! ### One shot
//!
//! ```rust,ignore
//! use sitediff_merge::{merge, Picks};
//!
//! let outcome = merge(&ancestor, &left, &right, None)?;
//! for conflict in &outcome.conflicts {
//!     println!("{}", conflict.path);
//! }
//! ```
//!
//! ### Interactive
//!
//! ```rust,ignore
//! use sitediff_merge::{BranchSide, MergeSession};
//!
//! let mut session = MergeSession::new(&ancestor, &left, &right);
//! session.run()?;
//! for conflict in session.conflicts() {
//!     session.pick_side(&conflict.path, BranchSide::Left)?;
//! }
//! let outcome = session.finish();
//! ```

mod children;
mod components;
mod conflicts;
mod errors;
mod identity;
mod repair;
mod session;
mod tree;
mod vsettings;

pub use children::{
    decide_order, insert_after_preceding, merge_order, resplice, restrict, OrderDecision,
    SlotContent, SlotOrder,
};
pub use conflicts::{
    diff_field, field_policy, BranchSide, CanonicalPath, ConflictKind, ConflictRecord,
    CustomHandler, FieldDiff, FieldPolicy, FieldSpec, Picks, FIELD_POLICIES,
};
pub use errors::{MergeError, MergeResult};
pub use identity::{
    clone_component_to_target, clone_node_to_target, clone_variant_to_target,
    clone_vsetting_to_target, Identity, IdentityTable,
};
pub use repair::{
    AutoFix, CleanupDanglingReferences, CleanupSwappedInstances, FoldDuplicateComponents,
    MaterializeVirtualSlots, NormalizeTree, PruneUnreachable, RepairEngine, RepairPass,
    RepairUniqueness,
};
pub use session::{MergeOutcome, MergeSession, MergeStatus, Source};

use sitediff_model::Document;
use tracing::instrument;

/// Merge `left` and `right`, both derived from `ancestor`.
///
/// Conflicts listed in `picks` are settled with the chosen side; the rest
/// are returned in [`MergeOutcome::conflicts`] with the merged document
/// holding the ancestor value.
#[instrument(skip_all, fields(ancestor = %ancestor.name))]
pub fn merge(
    ancestor: &Document,
    left: &Document,
    right: &Document,
    picks: Option<&Picks>,
) -> MergeResult<MergeOutcome> {
    let mut session = MergeSession::new(ancestor, left, right);
    if let Some(picks) = picks {
        session = session.with_picks(picks.clone());
    }
    session.run()?;
    Ok(session.finish())
}
