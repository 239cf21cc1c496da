//! Change severity classification.
//!
//! Rules, in precedence order:
//!
//! 1. `none`  - no block changes and neither title nor banner changed.
//! 2. `major` - any block was added, removed, or moved.
//! 3. `minor` - any modification carries a content or attribute diff, or
//!    the title changed.
//! 4. `patch` - everything else (e.g. a banner-only change).
//!
//! Rule 3 counts attribute-only edits as `minor` by default. The
//! [`AttributeOnlySeverity::Patch`] policy demotes them to `patch`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::BlockChange;
use crate::version::ChangeType;

/// Severity assigned to a modification with attribute diffs but no text diff.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttributeOnlySeverity {
    #[default]
    Minor,
    Patch,
}

/// Tunable classification policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifierPolicy {
    #[serde(default)]
    pub attribute_only: AttributeOnlySeverity,
}

/// Stateless change classifier.
pub struct ChangeClassifier;

impl ChangeClassifier {
    /// Classify with the default policy.
    pub fn classify(changes: &[BlockChange], title_changed: bool, banner_changed: bool) -> ChangeType {
        Self::classify_with(changes, title_changed, banner_changed, ClassifierPolicy::default())
    }

    pub fn classify_with(
        changes: &[BlockChange],
        title_changed: bool,
        banner_changed: bool,
        policy: ClassifierPolicy,
    ) -> ChangeType {
        let kind = if changes.is_empty() && !title_changed && !banner_changed {
            ChangeType::None
        } else if changes.iter().any(|c| c.action.is_structural()) {
            ChangeType::Major
        } else if title_changed || changes.iter().any(|c| counts_as_minor(c, policy)) {
            ChangeType::Minor
        } else {
            ChangeType::Patch
        };

        debug!(
            changes = changes.len(),
            title_changed,
            banner_changed,
            change_type = %kind,
            "classified change set"
        );
        kind
    }
}

fn counts_as_minor(change: &BlockChange, policy: ClassifierPolicy) -> bool {
    if !change.has_value_change() {
        return false;
    }
    match policy.attribute_only {
        AttributeOnlySeverity::Minor => true,
        AttributeOnlySeverity::Patch => change.content_diff.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, LeafBlock, LeafContent};
    use crate::diff::TreeDiffer;
    use crate::tree::BlockTree;

    fn single(block: Block) -> BlockTree {
        BlockTree::new(vec![block])
    }

    fn text_edit() -> Vec<BlockChange> {
        TreeDiffer::diff(
            &single(LeafBlock::text("a", "x").into()),
            &single(LeafBlock::text("a", "y").into()),
        )
    }

    fn attribute_edit() -> Vec<BlockChange> {
        let price = |show_change: bool| -> Block {
            LeafBlock::new(
                "p",
                LeafContent::AssetPrice {
                    resource_address: "resource_rdx1".into(),
                    show_change,
                },
            )
            .into()
        };
        TreeDiffer::diff(&single(price(false)), &single(price(true)))
    }

    #[test]
    fn test_nothing_changed_is_none() {
        assert_eq!(ChangeClassifier::classify(&[], false, false), ChangeType::None);
    }

    #[test]
    fn test_structural_change_is_major() {
        let mut changes = TreeDiffer::diff(
            &BlockTree::default(),
            &single(LeafBlock::text("b", "new").into()),
        );
        changes.extend(text_edit());
        assert_eq!(ChangeClassifier::classify(&changes, true, true), ChangeType::Major);
    }

    #[test]
    fn test_content_edit_is_minor() {
        assert_eq!(ChangeClassifier::classify(&text_edit(), false, false), ChangeType::Minor);
    }

    #[test]
    fn test_title_change_is_minor() {
        assert_eq!(ChangeClassifier::classify(&[], true, false), ChangeType::Minor);
    }

    #[test]
    fn test_banner_change_is_patch() {
        assert_eq!(ChangeClassifier::classify(&[], false, true), ChangeType::Patch);
    }

    #[test]
    fn test_attribute_only_policy() {
        let changes = attribute_edit();
        assert!(changes[0].content_diff.is_none());
        assert_eq!(ChangeClassifier::classify(&changes, false, false), ChangeType::Minor);

        let policy = ClassifierPolicy {
            attribute_only: AttributeOnlySeverity::Patch,
        };
        assert_eq!(
            ChangeClassifier::classify_with(&changes, false, false, policy),
            ChangeType::Patch
        );
        assert_eq!(
            ChangeClassifier::classify_with(&text_edit(), false, false, policy),
            ChangeType::Minor
        );
    }
}
