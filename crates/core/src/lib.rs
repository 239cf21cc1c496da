//! blockrev core library.
//!
//! This crate provides the foundational components for versioning block
//! structured documents: the block tree model, identity-first diffing,
//! change classification, semantic version arithmetic, three-way merging
//! with conflict reporting, revision history, and configuration.

pub mod block;
pub mod classify;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod errors;
pub mod revision;
pub mod signature;
pub mod tree;
pub mod version;

// Re-exports for convenience.
pub use block::{Block, BlockId, BlockRef, BlockType, Column, ColumnsBlock, LeafBlock, LeafContent};
pub use classify::{ChangeClassifier, ClassifierPolicy};
pub use config::EngineConfig;
pub use conflict::{MergeConflict, MergeOptions, MergeResult, MergeStrategy, TreeMerger};
pub use diff::{BlockChange, ChangeAction, TreeDiffer};
pub use errors::CoreError;
pub use revision::{Document, DocumentEdit, Revision, RevisionPlan};
pub use tree::{extract_blocks, BlockTree, FlatBlock, IdentityIndex};
pub use version::{ChangeType, SemVer};
