//! # Merge Session
//!
//! One mutable context threaded through every merge pass: the three
//! read-only inputs, the merged document being built, the identity table,
//! pending conflicts and the auto-fix log.
//!
//! The merged document starts as a copy of the ancestor under a tag derived
//! from the three input tags, so re-running a merge over the same inputs
//! produces the same document.

use crate::children;
use crate::components;
use crate::conflicts::{
    diff_field, field_policy, BranchSide, CanonicalPath, ConflictKind, ConflictRecord, FieldDiff,
    FieldTarget, PendingConflict, Picks, Resolution,
};
use crate::errors::{MergeError, MergeResult};
use crate::identity::{clone_component_to_target, clone_node_to_target, IdentityTable};
use crate::repair::{AutoFix, RepairEngine};
use crate::tree;
use serde::{Deserialize, Serialize};
use sitediff_model::{check_document, get_document_id, Document, IdGenerator, Uid};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

/// Which input a value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Ancestor,
    Left,
    Right,
}

impl From<BranchSide> for Source {
    fn from(side: BranchSide) -> Self {
        match side {
            BranchSide::Left => Source::Left,
            BranchSide::Right => Source::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStatus {
    Merged,
    NeedsResolution,
}

/// Result of a finished merge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub merged: Document,
    pub conflicts: Vec<ConflictRecord>,
    pub auto_fixes: Vec<AutoFix>,
}

impl MergeOutcome {
    pub fn status(&self) -> MergeStatus {
        if self.conflicts.is_empty() {
            MergeStatus::Merged
        } else {
            MergeStatus::NeedsResolution
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

pub struct MergeSession<'a> {
    pub(crate) ancestor: &'a Document,
    pub(crate) left: &'a Document,
    pub(crate) right: &'a Document,
    pub(crate) merged: Document,
    pub(crate) identities: IdentityTable,
    pub(crate) picks: Picks,
    pub(crate) pending: Vec<PendingConflict>,
    pub(crate) auto_fixes: Vec<AutoFix>,
    /// Nodes that entered the merged document from a branch
    pub(crate) created: BTreeSet<Uid>,
    /// Components added by either branch
    pub(crate) new_components: BTreeSet<Uid>,
    /// Branch variant ids folded into a merged variant with the same canonical key
    pub(crate) variant_aliases: BTreeMap<Uid, Uid>,
    pub(crate) ids: IdGenerator,
    repairs: RepairEngine,
}

impl<'a> MergeSession<'a> {
    pub fn new(ancestor: &'a Document, left: &'a Document, right: &'a Document) -> Self {
        let mut merged = ancestor.clone();
        merged.uuid = get_document_id(&format!(
            "merge/{}/{}/{}",
            ancestor.uuid, left.uuid, right.uuid
        ));
        let ids = IdGenerator::from_seed(merged.uuid.clone());

        let mut identities = IdentityTable::new();
        for uid in ancestor.nodes.keys() {
            identities.record(&ancestor.uuid, uid, uid.clone());
        }

        Self {
            ancestor,
            left,
            right,
            merged,
            identities,
            picks: Picks::new(),
            pending: Vec::new(),
            auto_fixes: Vec::new(),
            created: BTreeSet::new(),
            new_components: BTreeSet::new(),
            variant_aliases: BTreeMap::new(),
            ids,
            repairs: RepairEngine::new(),
        }
    }

    pub fn with_picks(mut self, picks: Picks) -> Self {
        self.picks = picks;
        self
    }

    pub fn with_repairs(mut self, repairs: RepairEngine) -> Self {
        self.repairs = repairs;
        self
    }

    pub fn merged(&self) -> &Document {
        &self.merged
    }

    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.pending.iter().map(|p| p.record.clone()).collect()
    }

    pub fn auto_fixes(&self) -> &[AutoFix] {
        &self.auto_fixes
    }

    pub fn identities(&self) -> &IdentityTable {
        &self.identities
    }

    /// Run every merge pass, then the repair passes
    #[instrument(skip(self), fields(ancestor = %self.ancestor.name, left = %self.left.name, right = %self.right.name))]
    pub fn run(&mut self) -> MergeResult<()> {
        info!("Starting merge");
        components::merge_document(self)?;
        self.finalize()?;
        info!(
            conflicts = self.pending.len(),
            auto_fixes = self.auto_fixes.len(),
            "Merge complete"
        );
        Ok(())
    }

    /// Resolve a pending conflict by taking one side, then re-run the repairs
    #[instrument(skip(self))]
    pub fn pick_side(&mut self, path: &str, side: BranchSide) -> MergeResult<()> {
        let index = self
            .pending
            .iter()
            .position(|p| p.record.path == path)
            .ok_or_else(|| MergeError::UnknownConflict(path.to_string()))?;
        let pending = self.pending.remove(index);
        self.apply_resolution(&pending.resolution, side)?;
        self.finalize()
    }

    pub fn finish(self) -> MergeOutcome {
        MergeOutcome {
            merged: self.merged,
            conflicts: self.pending.into_iter().map(|p| p.record).collect(),
            auto_fixes: self.auto_fixes,
        }
    }

    fn finalize(&mut self) -> MergeResult<()> {
        let repairs = std::mem::take(&mut self.repairs);
        let result = repairs.run(self);
        self.repairs = repairs;
        result?;

        let violations = check_document(&self.merged);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(MergeError::Invariants(violations))
        }
    }

    pub(crate) fn doc(&self, source: Source) -> &'a Document {
        match source {
            Source::Ancestor => self.ancestor,
            Source::Left => self.left,
            Source::Right => self.right,
        }
    }

    /// Whether `uid` exists in the ancestor and both branches
    pub(crate) fn in_all_inputs(&self, uid: &Uid) -> bool {
        self.ancestor.contains_node(uid)
            && self.left.contains_node(uid)
            && self.right.contains_node(uid)
    }

    pub(crate) fn clone_node(&mut self, source: Source, uid: &Uid) -> MergeResult<Uid> {
        let mut created = Vec::new();
        let source_doc = self.doc(source);
        let cloned = clone_node_to_target(
            &mut self.identities,
            source_doc,
            uid,
            &mut self.merged,
            &mut created,
        )?;
        self.created.extend(created);
        Ok(cloned)
    }

    pub(crate) fn clone_component(&mut self, source: Source, uid: &Uid) -> MergeResult<Uid> {
        let mut created = Vec::new();
        let source_doc = self.doc(source);
        let cloned = clone_component_to_target(
            &mut self.identities,
            source_doc,
            uid,
            &mut self.merged,
            &mut created,
        )?;
        self.created.extend(created);
        Ok(cloned)
    }

    /// Three-way merge of one scalar field into `target`
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn merge_scalar(
        &mut self,
        class: &'static str,
        field: &'static str,
        path: CanonicalPath,
        target: FieldTarget,
        ancestor: Option<String>,
        left: Option<String>,
        right: Option<String>,
    ) -> MergeResult<()> {
        match diff_field(field_policy(class, field), &ancestor, &left, &right) {
            FieldDiff::Unchanged => Ok(()),
            FieldDiff::Auto(value) => {
                target.write(&mut self.merged, value);
                Ok(())
            }
            FieldDiff::Conflict { left, right } => {
                let record = ConflictRecord {
                    path: path.to_string(),
                    kind: ConflictKind::Scalar,
                    left_value: serde_json::to_value(&left).unwrap_or_default(),
                    right_value: serde_json::to_value(&right).unwrap_or_default(),
                };
                self.raise(
                    record,
                    Resolution::Field {
                        target,
                        left,
                        right,
                    },
                )
            }
            FieldDiff::Delegate(_) => Err(MergeError::NotScalar { class, field }),
        }
    }

    /// Settle a conflict from `picks` or queue it for the caller
    pub(crate) fn raise(&mut self, record: ConflictRecord, resolution: Resolution) -> MergeResult<()> {
        match self.picks.get(&record.path).copied() {
            Some(side) => {
                debug!(path = %record.path, side = ?side, "Conflict resolved from picks");
                self.apply_resolution(&resolution, side)
            }
            None => {
                info!(path = %record.path, kind = ?record.kind, "Conflict needs resolution");
                self.pending.push(PendingConflict { record, resolution });
                Ok(())
            }
        }
    }

    pub(crate) fn apply_resolution(&mut self, resolution: &Resolution, side: BranchSide) -> MergeResult<()> {
        match resolution {
            Resolution::Field {
                target,
                left,
                right,
            } => {
                let value = match side {
                    BranchSide::Left => left.clone(),
                    BranchSide::Right => right.clone(),
                };
                target.write(&mut self.merged, value);
            }
            Resolution::ChildOrder { node, left, right } => {
                let order = match side {
                    BranchSide::Left => left,
                    BranchSide::Right => right,
                };
                children::apply_container_order(&mut self.merged, node, order);
            }
            Resolution::SlotOrder { node, left, right } => {
                let order = match side {
                    BranchSide::Left => left,
                    BranchSide::Right => right,
                };
                children::apply_slot_order(&mut self.merged, node, order);
            }
            Resolution::Reparent { component, node } => {
                tree::update_parent(self, node, side.into())?;
                tree::repair_cycles(self, component)?;
            }
            Resolution::Reroot { component } => {
                tree::adopt_root(self, component, side.into())?;
            }
        }
        Ok(())
    }
}
