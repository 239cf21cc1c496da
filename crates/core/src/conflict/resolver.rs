//! Conflict resolution policy.
//!
//! The [`ConflictResolver`] maps a detected conflict to an outcome under a
//! [`MergeStrategy`]: prefer our side, prefer their side, or leave the
//! conflict for a person to decide.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conflict::detector::{ConflictKind, Side};

/// Policy for conflicts the merge cannot settle on its own.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Prefer our side: keep our version, or stay removed if we deleted it.
    #[default]
    Ours,
    /// Prefer their side: keep their version, or stay removed if they deleted it.
    Theirs,
    /// Resolve nothing. The merged tree keeps the base version where one
    /// exists and each conflict is left without a resolution.
    Manual,
}

impl MergeStrategy {
    /// Parse a strategy string. Unknown values map to `None`.
    pub fn from_str_val(s: &str) -> Option<Self> {
        match s {
            "ours" => Some(Self::Ours),
            "theirs" => Some(Self::Theirs),
            "manual" | "manual-required" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// How a conflict was settled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeptOurs,
    KeptTheirs,
    Removed,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeptOurs => write!(f, "kept_ours"),
            Self::KeptTheirs => write!(f, "kept_theirs"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Stateless conflict resolution operations.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolution for a conflict of `kind` under `strategy`.
    ///
    /// Returns `None` under [`MergeStrategy::Manual`].
    pub fn resolve(strategy: MergeStrategy, kind: ConflictKind) -> Option<Resolution> {
        let resolution = match (strategy, kind) {
            (MergeStrategy::Manual, _) => None,

            (MergeStrategy::Ours, ConflictKind::DeleteModify) => Some(Resolution::Removed),
            (MergeStrategy::Ours, _) => Some(Resolution::KeptOurs),

            (MergeStrategy::Theirs, ConflictKind::ModifyDelete) => Some(Resolution::Removed),
            (MergeStrategy::Theirs, _) => Some(Resolution::KeptTheirs),
        };
        debug!(%strategy, conflict_kind = %kind, ?resolution, "conflict resolved by policy");
        resolution
    }

    /// The side whose version ends up in the merged tree, if any.
    ///
    /// An unresolved conflict falls back to the base version; a conflict with
    /// no base (concurrent addition) then contributes nothing.
    pub fn surviving_side(resolution: Option<Resolution>) -> Option<Side> {
        match resolution {
            Some(Resolution::KeptOurs) => Some(Side::Ours),
            Some(Resolution::KeptTheirs) => Some(Side::Theirs),
            Some(Resolution::Removed) => None,
            None => Some(Side::Base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ours_strategy() {
        use ConflictKind::*;
        let s = MergeStrategy::Ours;
        assert_eq!(ConflictResolver::resolve(s, ConcurrentAddition), Some(Resolution::KeptOurs));
        assert_eq!(ConflictResolver::resolve(s, DeleteModify), Some(Resolution::Removed));
        assert_eq!(ConflictResolver::resolve(s, ModifyDelete), Some(Resolution::KeptOurs));
        assert_eq!(ConflictResolver::resolve(s, DivergentEdit), Some(Resolution::KeptOurs));
    }

    #[test]
    fn test_theirs_strategy() {
        use ConflictKind::*;
        let s = MergeStrategy::Theirs;
        assert_eq!(ConflictResolver::resolve(s, ConcurrentAddition), Some(Resolution::KeptTheirs));
        assert_eq!(ConflictResolver::resolve(s, DeleteModify), Some(Resolution::KeptTheirs));
        assert_eq!(ConflictResolver::resolve(s, ModifyDelete), Some(Resolution::Removed));
        assert_eq!(ConflictResolver::resolve(s, DivergentEdit), Some(Resolution::KeptTheirs));
    }

    #[test]
    fn test_manual_strategy_leaves_conflicts_open() {
        for kind in [
            ConflictKind::ConcurrentAddition,
            ConflictKind::DeleteModify,
            ConflictKind::ModifyDelete,
            ConflictKind::DivergentEdit,
            ConflictKind::DivergentMove,
        ] {
            assert_eq!(ConflictResolver::resolve(MergeStrategy::Manual, kind), None);
        }
        assert_eq!(ConflictResolver::surviving_side(None), Some(Side::Base));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(MergeStrategy::from_str_val("theirs"), Some(MergeStrategy::Theirs));
        assert_eq!(
            MergeStrategy::from_str_val("manual-required"),
            Some(MergeStrategy::Manual)
        );
        assert_eq!(MergeStrategy::from_str_val("mine"), None);
        assert_eq!(MergeStrategy::default().to_string(), "ours");
    }
}
