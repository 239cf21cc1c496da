//! Block model: the content units a document tree is built from.
//!
//! A tree holds [`Block`]s. Every variant except `columns` is a
//! [`LeafBlock`]; a [`ColumnsBlock`] holds [`Column`]s whose children are
//! leaves only, so a container can never nest inside another container.
//!
//! On the wire a block is a flat JSON object:
//!
//! ```json
//! { "id": "b1", "type": "content", "text": "Hello" }
//! { "id": "c1", "type": "columns", "gap": "md", "align": "start",
//!   "columns": [ { "id": "col-a", "blocks": [ ... ] } ] }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::TreeError;

/// Fields that never take part in attribute comparison.
pub const NON_ATTRIBUTE_FIELDS: [&str; 4] = ["id", "type", "columns", "blocks"];

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identity of a logical block, preserved across edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// Block type tag
// ---------------------------------------------------------------------------

/// The `type` tag of a block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum BlockType {
    Content,
    RecentPages,
    PageList,
    AssetPrice,
    TableOfContents,
    Columns,
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::RecentPages => write!(f, "recentPages"),
            Self::PageList => write!(f, "pageList"),
            Self::AssetPrice => write!(f, "assetPrice"),
            Self::TableOfContents => write!(f, "tableOfContents"),
            Self::Columns => write!(f, "columns"),
        }
    }
}

// ---------------------------------------------------------------------------
// Leaf blocks
// ---------------------------------------------------------------------------

fn default_limit() -> u32 {
    5
}

/// Accepts any JSON value for a page limit. Anything that is not a
/// non-negative integer in `u32` range (or a string holding one) falls back
/// to the default instead of failing the whole tree.
fn lenient_limit<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(parsed.unwrap_or_else(default_limit))
}

/// Variant-specific payload of a leaf block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LeafContent {
    /// Free-form markup text.
    Content {
        #[serde(default)]
        text: String,
    },
    /// The most recently updated pages, optionally filtered by tag path.
    RecentPages {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag_path: Option<String>,
        #[serde(default = "default_limit", deserialize_with = "lenient_limit")]
        limit: u32,
    },
    /// An explicit, ordered list of pages.
    PageList {
        #[serde(default)]
        page_ids: Vec<String>,
    },
    /// Live price widget for an on-chain resource.
    AssetPrice {
        #[serde(default)]
        resource_address: String,
        #[serde(default)]
        show_change: bool,
    },
    /// Generated table of contents for the document.
    TableOfContents {},
}

impl LeafContent {
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Content { .. } => BlockType::Content,
            Self::RecentPages { .. } => BlockType::RecentPages,
            Self::PageList { .. } => BlockType::PageList,
            Self::AssetPrice { .. } => BlockType::AssetPrice,
            Self::TableOfContents {} => BlockType::TableOfContents,
        }
    }
}

/// A block that can appear anywhere, including inside a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafBlock {
    pub id: BlockId,
    #[serde(flatten)]
    pub content: LeafContent,
}

impl LeafBlock {
    pub fn new(id: impl Into<String>, content: LeafContent) -> Self {
        Self {
            id: BlockId::new(id),
            content,
        }
    }

    /// Shorthand for a `content` block.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, LeafContent::Content { text: text.into() })
    }
}

// ---------------------------------------------------------------------------
// Columns container
// ---------------------------------------------------------------------------

fn default_gap() -> String {
    "md".into()
}
fn default_align() -> String {
    "start".into()
}

/// One column of a [`ColumnsBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    #[serde(default)]
    pub blocks: Vec<LeafBlock>,
}

/// Side-by-side layout container. Its columns hold leaf blocks only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsBlock {
    pub id: BlockId,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default = "default_gap")]
    pub gap: String,
    #[serde(default = "default_align")]
    pub align: String,
}

impl ColumnsBlock {
    pub fn new(id: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            id: BlockId::new(id),
            columns,
            gap: default_gap(),
            align: default_align(),
        }
    }

    /// Column ids paired with the identities of their children, in order.
    pub fn layout(&self) -> Vec<(&str, Vec<&str>)> {
        self.columns
            .iter()
            .map(|col| {
                (
                    col.id.as_str(),
                    col.blocks.iter().map(|b| b.id.as_str()).collect(),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A top-level block: a leaf or a columns container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Leaf(LeafBlock),
    Columns(ColumnsBlock),
}

impl Block {
    pub fn id(&self) -> &BlockId {
        match self {
            Self::Leaf(leaf) => &leaf.id,
            Self::Columns(cols) => &cols.id,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.view().block_type()
    }

    pub fn view(&self) -> BlockRef<'_> {
        match self {
            Self::Leaf(leaf) => BlockRef::Leaf(leaf),
            Self::Columns(cols) => BlockRef::Columns(cols),
        }
    }

    /// Decode a block from a JSON value, rejecting nested containers.
    pub fn from_value(value: Value) -> Result<Self, TreeError> {
        match value.get("type").and_then(Value::as_str) {
            Some("columns") => {
                reject_nested_columns(&value)?;
                Ok(Self::Columns(serde_json::from_value(value)?))
            }
            _ => Ok(Self::Leaf(serde_json::from_value(value)?)),
        }
    }
}

fn reject_nested_columns(value: &Value) -> Result<(), TreeError> {
    let Some(columns) = value.get("columns").and_then(Value::as_array) else {
        return Ok(());
    };
    let nested = columns
        .iter()
        .filter_map(|col| col.get("blocks").and_then(Value::as_array))
        .flatten()
        .find(|child| child.get("type").and_then(Value::as_str) == Some("columns"));

    match nested {
        Some(child) => Err(TreeError::NestedColumns(
            child
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        )),
        None => Ok(()),
    }
}

impl From<LeafBlock> for Block {
    fn from(leaf: LeafBlock) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<ColumnsBlock> for Block {
    fn from(cols: ColumnsBlock) -> Self {
        Self::Columns(cols)
    }
}

#[derive(Serialize)]
struct TaggedColumns<'a> {
    #[serde(rename = "type")]
    kind: BlockType,
    #[serde(flatten)]
    inner: &'a ColumnsBlock,
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(leaf) => leaf.serialize(serializer),
            Self::Columns(cols) => TaggedColumns {
                kind: BlockType::Columns,
                inner: cols,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Borrowed view
// ---------------------------------------------------------------------------

/// A borrowed block at any depth of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef<'a> {
    Leaf(&'a LeafBlock),
    Columns(&'a ColumnsBlock),
}

impl<'a> BlockRef<'a> {
    pub fn id(&self) -> &'a BlockId {
        match self {
            Self::Leaf(leaf) => &leaf.id,
            Self::Columns(cols) => &cols.id,
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Leaf(leaf) => leaf.content.block_type(),
            Self::Columns(_) => BlockType::Columns,
        }
    }

    /// Text of a `content` block.
    pub fn text(&self) -> Option<&'a str> {
        match self {
            Self::Leaf(LeafBlock {
                content: LeafContent::Content { text },
                ..
            }) => Some(text),
            _ => None,
        }
    }

    pub fn to_block(&self) -> Block {
        match self {
            Self::Leaf(leaf) => Block::Leaf((*leaf).clone()),
            Self::Columns(cols) => Block::Columns((*cols).clone()),
        }
    }

    /// The block as a JSON object, in wire form.
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            Self::Leaf(leaf) => serde_json::to_value(leaf),
            Self::Columns(cols) => serde_json::to_value(TaggedColumns {
                kind: BlockType::Columns,
                inner: cols,
            }),
        };
        encoded.unwrap_or(Value::Null)
    }

    /// Comparable fields of the block, keyed by wire name.
    ///
    /// Excludes identity, the type tag, and nested collections. Keys come
    /// back sorted, so iteration order is stable.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        match self.to_value() {
            Value::Object(map) => map
                .into_iter()
                .filter(|(key, _)| !NON_ATTRIBUTE_FIELDS.contains(&key.as_str()))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}
