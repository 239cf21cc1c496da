//! Identity-based block tree diff.
//!
//! Blocks are matched across two snapshots by identity, never by
//! similarity. A block whose content changed beyond recognition is still
//! the same logical block as long as its identity survived, and two
//! identical-looking blocks with different identities are never conflated.
//!
//! Changes are emitted in a fixed order: matched identities in old-document
//! order (a `moved` entry before a `modified` one), then removals in
//! old-document order, then additions in new-document order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::block::{BlockId, BlockRef, BlockType};
use crate::tree::{BlockTree, FlatBlock, IdentityIndex, ROOT_PATH};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What happened to a block between two snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Added,
    Removed,
    Modified,
    Moved,
}

impl ChangeAction {
    /// Whether the action changes the tree's shape rather than a block's
    /// values.
    pub fn is_structural(self) -> bool {
        matches!(self, Self::Added | Self::Removed | Self::Moved)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Modified => write!(f, "modified"),
            Self::Moved => write!(f, "moved"),
        }
    }
}

/// Old and new value of one attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeDiff {
    pub from: Value,
    pub to: Value,
}

/// Text change of a `content` block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentDiff {
    pub from: String,
    pub to: String,
    /// Unified line patch from `from` to `to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl ContentDiff {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            patch: Some(diffy::create_patch(from, to).to_string()),
        }
    }
}

/// One detected difference between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockChange {
    pub identity: BlockId,
    pub action: ChangeAction,
    pub block_type: BlockType,
    /// Path in the new snapshot, or in the old one for removals.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_diffs: Option<BTreeMap<String, AttributeDiff>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_diff: Option<ContentDiff>,
}

impl BlockChange {
    fn bare(flat: &FlatBlock<'_>, action: ChangeAction) -> Self {
        Self {
            identity: flat.block.id().clone(),
            action,
            block_type: flat.block.block_type(),
            path: flat.path.clone(),
            attribute_diffs: None,
            content_diff: None,
        }
    }

    /// Whether this change alters a block's values (content or attributes).
    pub fn has_value_change(&self) -> bool {
        self.action == ChangeAction::Modified
            && (self.content_diff.is_some()
                || self.attribute_diffs.as_ref().is_some_and(|d| !d.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Differ
// ---------------------------------------------------------------------------

/// Stateless block tree differ.
pub struct TreeDiffer;

impl TreeDiffer {
    /// Diff two snapshots using the default `root` base path.
    pub fn diff(old: &BlockTree, new: &BlockTree) -> Vec<BlockChange> {
        Self::diff_at(old, new, ROOT_PATH)
    }

    /// Diff two snapshots, rooting structural paths at `base_path`.
    pub fn diff_at(old: &BlockTree, new: &BlockTree, base_path: &str) -> Vec<BlockChange> {
        let old_index = IdentityIndex::build(old, base_path);
        let new_index = IdentityIndex::build(new, base_path);
        info!(
            old_blocks = old_index.len(),
            new_blocks = new_index.len(),
            "diffing block trees"
        );

        let mut changes = Vec::new();

        for before in old_index.iter() {
            let Some(after) = new_index.get(before.block.id().as_str()) else {
                continue;
            };

            if before.path != after.path {
                let mut change = BlockChange::bare(after, ChangeAction::Moved);
                change.attribute_diffs = Some(BTreeMap::from([(
                    "position".to_string(),
                    AttributeDiff {
                        from: Value::String(before.path.clone()),
                        to: Value::String(after.path.clone()),
                    },
                )]));
                debug!(identity = %change.identity, from = %before.path, to = %after.path, "block moved");
                changes.push(change);
            }

            let attrs = attribute_diffs(before.block, after.block);
            if !attrs.is_empty() {
                let mut change = BlockChange::bare(after, ChangeAction::Modified);
                change.content_diff = content_diff(before.block, after.block);
                debug!(identity = %change.identity, fields = attrs.len(), "block modified");
                change.attribute_diffs = Some(attrs);
                changes.push(change);
            }
        }

        for before in old_index.iter() {
            if !new_index.contains(before.block.id().as_str()) {
                debug!(identity = %before.block.id(), "block removed");
                changes.push(BlockChange::bare(before, ChangeAction::Removed));
            }
        }

        for after in new_index.iter() {
            if !old_index.contains(after.block.id().as_str()) {
                debug!(identity = %after.block.id(), "block added");
                changes.push(BlockChange::bare(after, ChangeAction::Added));
            }
        }

        info!(count = changes.len(), "diff complete");
        changes
    }
}

/// Field-by-field differences, excluding identity, type, and nested
/// collections. A field missing on one side compares as `null`.
pub fn attribute_diffs(old: BlockRef<'_>, new: BlockRef<'_>) -> BTreeMap<String, AttributeDiff> {
    let old_attrs = old.attributes();
    let new_attrs = new.attributes();

    let mut keys: Vec<&String> = old_attrs.keys().chain(new_attrs.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let from = old_attrs.get(key).cloned().unwrap_or(Value::Null);
            let to = new_attrs.get(key).cloned().unwrap_or(Value::Null);
            (from != to).then(|| (key.clone(), AttributeDiff { from, to }))
        })
        .collect()
}

fn content_diff(old: BlockRef<'_>, new: BlockRef<'_>) -> Option<ContentDiff> {
    match (old.text(), new.text()) {
        (Some(from), Some(to)) if from != to => Some(ContentDiff::new(from, to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, Column, ColumnsBlock, LeafBlock, LeafContent};
    use serde_json::json;

    fn text(id: &str, body: &str) -> Block {
        LeafBlock::text(id, body).into()
    }

    fn tree(blocks: Vec<Block>) -> BlockTree {
        BlockTree::new(blocks)
    }

    #[test]
    fn test_identical_trees_no_changes() {
        let t = tree(vec![
            text("a", "one"),
            ColumnsBlock::new(
                "c",
                vec![Column {
                    id: "left".into(),
                    blocks: vec![LeafBlock::text("x", "inner")],
                }],
            )
            .into(),
        ]);
        assert!(TreeDiffer::diff(&t, &t).is_empty());
        assert!(TreeDiffer::diff(&BlockTree::default(), &BlockTree::default()).is_empty());
    }

    #[test]
    fn test_added_block() {
        let old = tree(vec![text("a", "one")]);
        let new = tree(vec![text("a", "one"), text("b", "two")]);
        let changes = TreeDiffer::diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].identity.as_str(), "b");
        assert_eq!(changes[0].action, ChangeAction::Added);
        assert_eq!(changes[0].path, "root.1");
    }

    #[test]
    fn test_removed_block() {
        let old = tree(vec![text("a", "one")]);
        let changes = TreeDiffer::diff(&old, &BlockTree::default());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].identity.as_str(), "a");
        assert_eq!(changes[0].action, ChangeAction::Removed);
        assert_eq!(changes[0].path, "root.0");
    }

    #[test]
    fn test_reorder_yields_moves_only() {
        let old = tree(vec![text("a", "one"), text("b", "two")]);
        let new = tree(vec![text("b", "two"), text("a", "one")]);
        let changes = TreeDiffer::diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.action == ChangeAction::Moved));

        let a = &changes[0];
        assert_eq!(a.identity.as_str(), "a");
        let position = &a.attribute_diffs.as_ref().unwrap()["position"];
        assert_eq!(position.from, json!("root.0"));
        assert_eq!(position.to, json!("root.1"));
    }

    #[test]
    fn test_content_modification() {
        let old = tree(vec![text("a", "hello\nworld\n")]);
        let new = tree(vec![text("a", "hello\nthere\n")]);
        let changes = TreeDiffer::diff(&old, &new);
        assert_eq!(changes.len(), 1);

        let change = &changes[0];
        assert_eq!(change.action, ChangeAction::Modified);
        assert_eq!(change.block_type, BlockType::Content);
        let content = change.content_diff.as_ref().unwrap();
        assert_eq!(content.from, "hello\nworld\n");
        assert_eq!(content.to, "hello\nthere\n");
        assert!(content.patch.as_ref().unwrap().contains("+there"));
        assert_eq!(
            change.attribute_diffs.as_ref().unwrap()["text"].to,
            json!("hello\nthere\n")
        );
    }

    #[test]
    fn test_attribute_modification_without_content_diff() {
        let old = tree(vec![LeafBlock::new(
            "r",
            LeafContent::RecentPages {
                tag_path: None,
                limit: 5,
            },
        )
        .into()]);
        let new = tree(vec![LeafBlock::new(
            "r",
            LeafContent::RecentPages {
                tag_path: Some("blog".into()),
                limit: 10,
            },
        )
        .into()]);
        let changes = TreeDiffer::diff(&old, &new);
        assert_eq!(changes.len(), 1);
        let diffs = changes[0].attribute_diffs.as_ref().unwrap();
        assert_eq!(diffs["limit"], AttributeDiff { from: json!(5), to: json!(10) });
        assert_eq!(diffs["tagPath"], AttributeDiff { from: json!(null), to: json!("blog") });
        assert!(changes[0].content_diff.is_none());
    }

    #[test]
    fn test_move_into_column_and_modify() {
        let old = tree(vec![
            text("a", "one"),
            ColumnsBlock::new("c", vec![Column { id: "left".into(), blocks: vec![] }]).into(),
        ]);
        let new = tree(vec![ColumnsBlock::new(
            "c",
            vec![Column {
                id: "left".into(),
                blocks: vec![LeafBlock::text("a", "uno")],
            }],
        )
        .into()]);
        let changes = TreeDiffer::diff(&old, &new);
        let actions: Vec<(&str, ChangeAction)> = changes
            .iter()
            .map(|c| (c.identity.as_str(), c.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("a", ChangeAction::Moved),
                ("a", ChangeAction::Modified),
                ("c", ChangeAction::Moved),
            ]
        );
        assert_eq!(changes[0].path, "root.0.columns.0.blocks.0");
    }

    #[test]
    fn test_same_content_different_identity_not_conflated() {
        let old = tree(vec![text("a", "same")]);
        let new = tree(vec![text("b", "same")]);
        let changes = TreeDiffer::diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].action, ChangeAction::Removed);
        assert_eq!(changes[1].action, ChangeAction::Added);
    }

    #[test]
    fn test_columns_attribute_change() {
        let mut cols = ColumnsBlock::new("c", vec![]);
        let old = tree(vec![cols.clone().into()]);
        cols.gap = "lg".into();
        let new = tree(vec![cols.into()]);
        let changes = TreeDiffer::diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].block_type, BlockType::Columns);
        assert!(changes[0].attribute_diffs.as_ref().unwrap().contains_key("gap"));
    }

    #[test]
    fn test_change_serializes_camel_case() {
        let old = tree(vec![]);
        let new = tree(vec![text("a", "x")]);
        let changes = TreeDiffer::diff(&old, &new);
        let value = serde_json::to_value(&changes[0]).unwrap();
        assert_eq!(
            value,
            json!({"identity": "a", "action": "added", "blockType": "content", "path": "root.0"})
        );
    }
}
