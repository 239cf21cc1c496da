//! Block trees, flattening, and identity indexing.
//!
//! [`extract_blocks`] walks a tree in document order and pairs every block
//! with its structural path:
//!
//! ```text
//! root.0                      top-level block 0
//! root.1                      a columns container
//! root.1.columns.0.blocks.0   first child of its first column
//! ```
//!
//! Paths depend only on the tree's shape, so they are unique and stable
//! for a given snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::block::{Block, BlockRef};
use crate::errors::TreeError;

/// Default base path for [`extract_blocks`].
pub const ROOT_PATH: &str = "root";

// ---------------------------------------------------------------------------
// BlockTree
// ---------------------------------------------------------------------------

/// An ordered list of top-level blocks: one document snapshot.
///
/// Deserializes from a JSON array; `null` reads as the empty tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlockTree {
    pub blocks: Vec<Block>,
}

impl<'de> Deserialize<'de> for BlockTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let blocks = Option::<Vec<Block>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self { blocks })
    }
}

impl BlockTree {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Decode a tree from its JSON form. Empty input is the empty tree.
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "[]".to_string())
    }

    /// Check that every identity is non-empty and unique across all depths.
    pub fn validate(&self) -> Result<(), TreeError> {
        let mut seen: BTreeMap<&str, String> = BTreeMap::new();
        for flat in extract_blocks(self, ROOT_PATH) {
            let id = flat.block.id().as_str();
            if id.is_empty() {
                return Err(TreeError::EmptyIdentity(flat.path));
            }
            if let Some(first) = seen.get(id) {
                return Err(TreeError::DuplicateIdentity {
                    identity: id.to_string(),
                    first: first.clone(),
                    second: flat.path,
                });
            }
            seen.insert(id, flat.path);
        }
        Ok(())
    }

    /// Total number of blocks at every depth.
    pub fn block_count(&self) -> usize {
        extract_blocks(self, ROOT_PATH).len()
    }
}

impl From<Vec<Block>> for BlockTree {
    fn from(blocks: Vec<Block>) -> Self {
        Self::new(blocks)
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// A block paired with its structural path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatBlock<'a> {
    pub block: BlockRef<'a>,
    pub path: String,
}

/// Flatten `tree` into `(block, path)` pairs in document order.
///
/// A columns container is emitted before its children.
pub fn extract_blocks<'a>(tree: &'a BlockTree, base_path: &str) -> Vec<FlatBlock<'a>> {
    let mut out = Vec::new();
    for (i, block) in tree.blocks.iter().enumerate() {
        let path = format!("{base_path}.{i}");
        match block {
            Block::Leaf(leaf) => out.push(FlatBlock {
                block: BlockRef::Leaf(leaf),
                path,
            }),
            Block::Columns(cols) => {
                out.push(FlatBlock {
                    block: BlockRef::Columns(cols),
                    path: path.clone(),
                });
                for (j, column) in cols.columns.iter().enumerate() {
                    for (k, child) in column.blocks.iter().enumerate() {
                        out.push(FlatBlock {
                            block: BlockRef::Leaf(child),
                            path: format!("{path}.columns.{j}.blocks.{k}"),
                        });
                    }
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Identity index
// ---------------------------------------------------------------------------

/// Identity → (block, path) lookup over one flattened snapshot.
///
/// Keeps the flattened document order alongside the map so callers can walk
/// either way deterministically.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex<'a> {
    order: Vec<FlatBlock<'a>>,
    by_id: BTreeMap<&'a str, usize>,
}

impl<'a> IdentityIndex<'a> {
    /// Index `tree`. If an identity repeats, the first occurrence wins.
    pub fn build(tree: &'a BlockTree, base_path: &str) -> Self {
        let order = extract_blocks(tree, base_path);
        let mut by_id = BTreeMap::new();
        for (pos, flat) in order.iter().enumerate() {
            let id = flat.block.id().as_str();
            if by_id.contains_key(id) {
                warn!(identity = id, path = %flat.path, "duplicate block identity ignored");
                continue;
            }
            by_id.insert(id, pos);
        }
        debug!(blocks = order.len(), "identity index built");
        Self { order, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&FlatBlock<'a>> {
        self.by_id.get(id).map(|&pos| &self.order[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Indexed blocks in document order, skipping repeated identities.
    pub fn iter(&self) -> impl Iterator<Item = &FlatBlock<'a>> + '_ {
        self.order
            .iter()
            .enumerate()
            .filter(|(pos, flat)| self.by_id.get(flat.block.id().as_str()) == Some(pos))
            .map(|(_, flat)| flat)
    }

    /// Identities in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.by_id.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
