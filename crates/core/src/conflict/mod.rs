//! Conflict detection, three-way merging, and resolution policy.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- classifying each identity's presence across base,
//!    ours, and theirs, and spotting divergent edits.
//! 2. **Resolution** -- mapping a conflict to an outcome under the
//!    configured [`MergeStrategy`].
//! 3. **Merging** -- assembling the merged tree and the conflict list, plus
//!    the per-attribute merge for a single block.

pub mod detector;
pub mod merger;
pub mod resolver;

pub use detector::{ConflictDetector, ConflictKind, Decision, MergeConflict, Side};
pub use merger::{AttributeMerge, FieldConflict, MergeOptions, MergeResult, TreeMerger};
pub use resolver::{ConflictResolver, MergeStrategy, Resolution};
