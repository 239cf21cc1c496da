//! Conflict detection logic.
//!
//! For one identity, the detector looks at which of base, ours, and theirs
//! hold the block and compares structural signatures to decide whether the
//! merge can pick a side on its own or has to record a conflict.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::{Block, BlockId, BlockRef};
use crate::conflict::resolver::Resolution;
use crate::signature::Signature;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One of the three inputs of a merge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Base,
    Ours,
    Theirs,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

/// Categorisation of a merge conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides added the same identity with different values.
    ConcurrentAddition,
    /// Ours deleted the block, theirs modified it.
    DeleteModify,
    /// Ours modified the block, theirs deleted it.
    ModifyDelete,
    /// All three versions differ.
    DivergentEdit,
    /// Both sides moved the block into different columns containers.
    DivergentMove,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConcurrentAddition => write!(f, "concurrent_addition"),
            Self::DeleteModify => write!(f, "delete_modify"),
            Self::ModifyDelete => write!(f, "modify_delete"),
            Self::DivergentEdit => write!(f, "divergent_edit"),
            Self::DivergentMove => write!(f, "divergent_move"),
        }
    }
}

/// What the merge should do with one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Take the block from this side.
    Keep(Side),
    /// Leave the block out of the merged tree.
    Drop,
    /// The sides diverge; a resolution policy has to choose.
    Conflict(ConflictKind),
}

/// A recorded three-way merge conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergeConflict {
    pub identity: BlockId,
    /// Path of the block in ours, else theirs, else base.
    pub path: String,
    pub kind: ConflictKind,
    pub base: Option<Block>,
    pub ours: Option<Block>,
    pub theirs: Option<Block>,
    /// How the merge resolved it; `None` when manual resolution is required.
    pub resolution: Option<Resolution>,
}

impl MergeConflict {
    /// The version the resolution selected, if any.
    pub fn resolved_block(&self) -> Option<&Block> {
        match self.resolution? {
            Resolution::KeptOurs => self.ours.as_ref(),
            Resolution::KeptTheirs => self.theirs.as_ref(),
            Resolution::Removed => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless per-identity conflict detector.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Decide the fate of one identity from its three versions.
    ///
    /// | base | ours | theirs | outcome                                  |
    /// |------|------|--------|------------------------------------------|
    /// | -    | O    | -      | keep ours                                |
    /// | -    | -    | T      | keep theirs                              |
    /// | B    | -    | -      | drop                                     |
    /// | -    | O    | T      | keep ours if O == T, else conflict       |
    /// | B    | -    | T      | drop if T == B, else delete/modify       |
    /// | B    | O    | -      | drop if O == B, else modify/delete       |
    /// | B    | O    | T      | usual three-way rule, conflict if all differ |
    pub fn detect(
        base: Option<BlockRef<'_>>,
        ours: Option<BlockRef<'_>>,
        theirs: Option<BlockRef<'_>>,
    ) -> Decision {
        let (b, o, t) = (
            base.map(Signature::of_block),
            ours.map(Signature::of_block),
            theirs.map(Signature::of_block),
        );

        let decision = match (b, o, t) {
            (None, Some(_), None) => Decision::Keep(Side::Ours),
            (None, None, Some(_)) => Decision::Keep(Side::Theirs),
            (_, None, None) => Decision::Drop,
            (None, Some(o), Some(t)) => {
                if o == t {
                    Decision::Keep(Side::Ours)
                } else {
                    Decision::Conflict(ConflictKind::ConcurrentAddition)
                }
            }
            (Some(b), None, Some(t)) => {
                if t == b {
                    Decision::Drop
                } else {
                    Decision::Conflict(ConflictKind::DeleteModify)
                }
            }
            (Some(b), Some(o), None) => {
                if o == b {
                    Decision::Drop
                } else {
                    Decision::Conflict(ConflictKind::ModifyDelete)
                }
            }
            (Some(b), Some(o), Some(t)) => {
                if o == t || t == b {
                    Decision::Keep(Side::Ours)
                } else if o == b {
                    Decision::Keep(Side::Theirs)
                } else {
                    Decision::Conflict(ConflictKind::DivergentEdit)
                }
            }
        };

        if let Decision::Conflict(kind) = decision {
            let id = ours.or(theirs).or(base).map(|block| block.id().to_string());
            debug!(identity = ?id, conflict_kind = %kind, "conflict detected");
        }
        decision
    }
}
