//! Three-way block tree merge engine.
//!
//! Every identity found in base, ours, or theirs is decided on its own by
//! the [`ConflictDetector`]; conflicts go through the [`ConflictResolver`]
//! and are always recorded. The merged tree is then assembled in a fixed
//! visiting order: ours' document order first, then identities only theirs
//! knows about, then base-only leftovers. Blocks that survive from theirs
//! alone therefore land after everything from ours rather than at their
//! original position.
//!
//! Placement inside columns follows the winning container layouts. A child
//! listed by a surviving layout is reserved for that container before the
//! top level is walked, so a one-sided move across the container boundary
//! survives. When both sides move the same block into different containers
//! the placement is a [`ConflictKind::DivergentMove`] conflict.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::block::{Block, BlockType};
use crate::conflict::detector::{ConflictDetector, ConflictKind, Decision, MergeConflict, Side};
use crate::conflict::resolver::{ConflictResolver, MergeStrategy, Resolution};
use crate::tree::{BlockTree, FlatBlock, IdentityIndex, ROOT_PATH};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Knobs for [`TreeMerger::merge_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Base path for conflict paths.
    pub base_path: String,
    /// Try a per-attribute merge before reporting a divergent edit on a leaf.
    pub field_level: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            base_path: ROOT_PATH.to_string(),
            field_level: false,
        }
    }
}

/// The result of a three-way merge. Always produced; conflicts are data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeResult {
    pub content: BlockTree,
    pub conflicts: Vec<MergeConflict>,
    /// `true` when no conflicts were recorded.
    pub success: bool,
}

/// A single field whose three values all differ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConflict {
    pub field: String,
    pub base: Value,
    pub ours: Value,
    pub theirs: Value,
}

/// The result of [`TreeMerger::merge_attributes`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeMerge {
    pub block: Block,
    pub conflicts: Vec<FieldConflict>,
}

// ---------------------------------------------------------------------------
// Merger
// ---------------------------------------------------------------------------

/// Stateless three-way merge engine.
pub struct TreeMerger;

impl TreeMerger {
    /// Merge with default options (prefer ours).
    pub fn merge(base: &BlockTree, ours: &BlockTree, theirs: &BlockTree) -> MergeResult {
        Self::merge_with(base, ours, theirs, &MergeOptions::default())
    }

    pub fn merge_with(
        base: &BlockTree,
        ours: &BlockTree,
        theirs: &BlockTree,
        options: &MergeOptions,
    ) -> MergeResult {
        let base_idx = IdentityIndex::build(base, &options.base_path);
        let ours_idx = IdentityIndex::build(ours, &options.base_path);
        let theirs_idx = IdentityIndex::build(theirs, &options.base_path);
        info!(
            strategy = %options.strategy,
            base_blocks = base_idx.len(),
            ours_blocks = ours_idx.len(),
            theirs_blocks = theirs_idx.len(),
            "performing three-way merge"
        );

        let mut visit: Vec<&str> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for index in [&ours_idx, &theirs_idx, &base_idx] {
            for flat in index.iter() {
                let id = flat.block.id().as_str();
                if seen.insert(id) {
                    visit.push(id);
                }
            }
        }

        let conflict_for = |id: &str, kind: ConflictKind, resolution: Option<Resolution>| {
            let (b, o, t) = (base_idx.get(id), ours_idx.get(id), theirs_idx.get(id));
            MergeConflict {
                identity: id.into(),
                path: o.or(t).or(b).map(|f| f.path.clone()).unwrap_or_default(),
                kind,
                base: b.map(|f| f.block.to_block()),
                ours: o.map(|f| f.block.to_block()),
                theirs: t.map(|f| f.block.to_block()),
                resolution,
            }
        };

        let mut resolved: BTreeMap<&str, Block> = BTreeMap::new();
        let mut origin: BTreeMap<&str, Side> = BTreeMap::new();
        let mut conflicts = Vec::new();

        for &id in &visit {
            let versions = [base_idx.get(id), ours_idx.get(id), theirs_idx.get(id)];
            let [b, o, t] = versions;
            let pick = |side: Side| {
                let flat = match side {
                    Side::Base => b,
                    Side::Ours => o,
                    Side::Theirs => t,
                };
                flat.map(|f| f.block.to_block())
            };

            let kind = match ConflictDetector::detect(
                b.map(|f| f.block),
                o.map(|f| f.block),
                t.map(|f| f.block),
            ) {
                Decision::Keep(side) => {
                    if let Some(block) = pick(side) {
                        resolved.insert(id, block);
                        origin.insert(id, side);
                    }
                    continue;
                }
                Decision::Drop => {
                    debug!(identity = id, "block dropped");
                    continue;
                }
                Decision::Conflict(kind) => kind,
            };

            if options.field_level && kind == ConflictKind::DivergentEdit {
                if let Some(block) = field_level_merge(b, o, t, options.strategy) {
                    debug!(identity = id, "divergent edit merged field by field");
                    resolved.insert(id, block);
                    origin.insert(id, Side::Ours);
                    continue;
                }
            }

            let resolution = ConflictResolver::resolve(options.strategy, kind);
            if let Some(side) = ConflictResolver::surviving_side(resolution) {
                if let Some(block) = pick(side) {
                    resolved.insert(id, block);
                    origin.insert(id, side);
                }
            }
            conflicts.push(conflict_for(id, kind, resolution));
        }

        let (claims, contested) = claim_children(&visit, &resolved, &origin, options.strategy);
        for (id, resolution) in contested {
            conflicts.push(conflict_for(id, ConflictKind::DivergentMove, resolution));
        }

        let content = assemble(&visit, &resolved, &claims);
        let success = conflicts.is_empty();
        if success {
            info!(blocks = content.blocks.len(), "clean merge");
        } else {
            warn!(conflicts = conflicts.len(), "merge produced conflicts");
        }

        MergeResult {
            content,
            conflicts,
            success,
        }
    }

    /// Per-attribute merge of a single block present on all three sides,
    /// preferring ours for fields all three disagree on.
    pub fn merge_attributes(base: &Block, ours: &Block, theirs: &Block) -> AttributeMerge {
        Self::merge_attributes_with(base, ours, theirs, MergeStrategy::Ours)
    }

    /// Per-attribute merge of a single block present on all three sides.
    ///
    /// For each field other than identity, type, and nested collections:
    /// if ours equals theirs, keep it; if ours equals base, take theirs; if
    /// theirs equals base, keep ours. When all three differ the field is
    /// reported as a [`FieldConflict`] and settled by `strategy` (`manual`
    /// keeps the base value). Identity, type, and layout always come from
    /// ours. A side whose type differs from ours counts as unchanged: its
    /// fields never reach the merged block.
    pub fn merge_attributes_with(
        base: &Block,
        ours: &Block,
        theirs: &Block,
        strategy: MergeStrategy,
    ) -> AttributeMerge {
        let ours_type = ours.block_type();
        let ours_attrs = ours.view().attributes();
        let base_attrs = if base.block_type() == ours_type {
            base.view().attributes()
        } else {
            ours_attrs.clone()
        };
        let theirs_attrs = if theirs.block_type() == ours_type {
            theirs.view().attributes()
        } else {
            base_attrs.clone()
        };

        let Value::Object(mut merged) = ours.view().to_value() else {
            return AttributeMerge {
                block: ours.clone(),
                conflicts: Vec::new(),
            };
        };

        let keys: BTreeSet<&String> = base_attrs
            .keys()
            .chain(ours_attrs.keys())
            .chain(theirs_attrs.keys())
            .collect();

        let mut conflicts = Vec::new();
        for key in keys {
            let get = |attrs: &BTreeMap<String, Value>| attrs.get(key).cloned().unwrap_or(Value::Null);
            let (b, o, t) = (get(&base_attrs), get(&ours_attrs), get(&theirs_attrs));

            let value = if o == t || t == b {
                o
            } else if o == b {
                t
            } else {
                conflicts.push(FieldConflict {
                    field: key.clone(),
                    base: b.clone(),
                    ours: o.clone(),
                    theirs: t.clone(),
                });
                match strategy {
                    MergeStrategy::Ours => o,
                    MergeStrategy::Theirs => t,
                    MergeStrategy::Manual => b,
                }
            };

            if value.is_null() {
                merged.remove(key.as_str());
            } else {
                merged.insert(key.clone(), value);
            }
        }

        let block = match Block::from_value(Value::Object(merged)) {
            Ok(block) => block,
            Err(e) => {
                warn!(identity = %ours.id(), error = %e, "attribute merge produced an invalid block, keeping ours");
                ours.clone()
            }
        };
        debug!(identity = %ours.id(), field_conflicts = conflicts.len(), "attribute merge complete");

        AttributeMerge { block, conflicts }
    }
}

/// Field-level merge of a divergent leaf; `None` if any field still conflicts.
fn field_level_merge(
    base: Option<&FlatBlock<'_>>,
    ours: Option<&FlatBlock<'_>>,
    theirs: Option<&FlatBlock<'_>>,
    strategy: MergeStrategy,
) -> Option<Block> {
    let (base, ours, theirs) = (base?.block.to_block(), ours?.block.to_block(), theirs?.block.to_block());
    let ty = ours.block_type();
    if ty == BlockType::Columns || base.block_type() != ty || theirs.block_type() != ty {
        return None;
    }
    let merged = TreeMerger::merge_attributes_with(&base, &ours, &theirs, strategy);
    merged.conflicts.is_empty().then_some(merged.block)
}

/// Decide which surviving container each column child belongs to.
///
/// Every resolved columns block claims the resolved leaves its layout lists.
/// A child claimed by a single container goes there. A child claimed by
/// several containers is contested: the strategy picks the container that
/// came from its preferred side, falling back to the first claim in visiting
/// order, and the child is returned in the contested list.
fn claim_children<'a>(
    visit: &[&'a str],
    resolved: &BTreeMap<&'a str, Block>,
    origin: &BTreeMap<&'a str, Side>,
    strategy: MergeStrategy,
) -> (BTreeMap<&'a str, &'a str>, Vec<(&'a str, Option<Resolution>)>) {
    let mut owners: BTreeMap<&'a str, Vec<&'a str>> = BTreeMap::new();
    let mut order: Vec<&'a str> = Vec::new();

    for &id in visit {
        let Some((&container, Block::Columns(cols))) = resolved.get_key_value(id) else {
            continue;
        };
        for child in cols.columns.iter().flat_map(|c| &c.blocks) {
            let Some((&child_id, Block::Leaf(_))) = resolved.get_key_value(child.id.as_str()) else {
                continue;
            };
            let claimants = owners.entry(child_id).or_default();
            if claimants.is_empty() {
                order.push(child_id);
            }
            if !claimants.contains(&container) {
                claimants.push(container);
            }
        }
    }

    let mut claims = BTreeMap::new();
    let mut contested = Vec::new();
    for child in order {
        let claimants = &owners[child];
        let winner = match claimants.as_slice() {
            [only] => *only,
            [first, ..] => {
                let resolution = ConflictResolver::resolve(strategy, ConflictKind::DivergentMove);
                let preferred = ConflictResolver::surviving_side(resolution);
                let winner = claimants
                    .iter()
                    .copied()
                    .find(|c| origin.get(c).copied() == preferred)
                    .unwrap_or(*first);
                debug!(identity = child, container = winner, "block moved into different containers");
                contested.push((child, resolution));
                winner
            }
            [] => continue,
        };
        claims.insert(child, winner);
    }

    (claims, contested)
}

/// Build the merged tree from the per-identity outcomes.
///
/// A columns container takes its layout from whichever version won and is
/// filled with the winning version of each child claimed for it. Children
/// that no surviving layout claims are placed at the top level at their
/// visiting position.
fn assemble<'a>(
    visit: &[&'a str],
    resolved: &BTreeMap<&'a str, Block>,
    claims: &BTreeMap<&'a str, &'a str>,
) -> BlockTree {
    let mut placed: BTreeSet<&str> = BTreeSet::new();
    let mut blocks = Vec::new();

    for &id in visit {
        if placed.contains(id) || claims.contains_key(id) {
            continue;
        }
        let Some(block) = resolved.get(id) else {
            continue;
        };
        placed.insert(id);

        match block {
            Block::Leaf(leaf) => blocks.push(Block::Leaf(leaf.clone())),
            Block::Columns(cols) => {
                let mut merged = cols.clone();
                for column in &mut merged.columns {
                    let children = std::mem::take(&mut column.blocks);
                    for child in children {
                        let Some((&key, Block::Leaf(winner))) = resolved.get_key_value(child.id.as_str())
                        else {
                            continue;
                        };
                        if claims.get(key) == Some(&id) && placed.insert(key) {
                            column.blocks.push(winner.clone());
                        }
                    }
                }
                blocks.push(Block::Columns(merged));
            }
        }
    }

    BlockTree::new(blocks)
}
