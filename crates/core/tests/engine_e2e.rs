//! End-to-end tests for the revision engine.
//!
//! These tests drive the public API from JSON snapshots in the wire format
//! through diffing, classification, version bumps, three-way merging, and
//! document history, the way an editor backend would.

use std::path::Path;

use tempfile::TempDir;

use blockrev_core::block::{Block, BlockType};
use blockrev_core::classify::ChangeClassifier;
use blockrev_core::config::EngineConfig;
use blockrev_core::conflict::{ConflictKind, MergeStrategy, Resolution, TreeMerger};
use blockrev_core::diff::{ChangeAction, TreeDiffer};
use blockrev_core::errors::{CoreError, TreeError};
use blockrev_core::revision::{Document, DocumentEdit};
use blockrev_core::tree::BlockTree;
use blockrev_core::version::{ChangeType, SemVer};

// ===========================================================================
// Helpers
// ===========================================================================

fn tree(json: &str) -> BlockTree {
    BlockTree::from_json(json).expect("fixture should parse")
}

fn ids(tree: &BlockTree) -> Vec<&str> {
    tree.blocks.iter().map(|b| b.id().as_str()).collect()
}

fn write_config(dir: &Path, body: &str) -> EngineConfig {
    let path = dir.join("blockrev.toml");
    std::fs::write(&path, body).unwrap();
    EngineConfig::load_and_validate(&path).expect("config should load")
}

const LANDING: &str = r#"[
  {"id": "intro", "type": "content", "text": "Welcome"},
  {"id": "grid", "type": "columns", "gap": "lg", "columns": [
    {"id": "left", "blocks": [
      {"id": "news", "type": "recentPages", "tagPath": "news", "limit": 3}
    ]},
    {"id": "right", "blocks": [
      {"id": "price", "type": "assetPrice", "resourceAddress": "resource_rdx1", "showChange": false}
    ]}
  ]},
  {"id": "toc", "type": "tableOfContents"}
]"#;

// ===========================================================================
// Diff and classification
// ===========================================================================

#[test]
fn test_identical_snapshots_have_no_changes() {
    let t = tree(LANDING);
    assert!(TreeDiffer::diff(&t, &t).is_empty());
    assert_eq!(ChangeClassifier::classify(&[], false, false), ChangeType::None);
}

#[test]
fn test_nested_attribute_edit_is_minor() {
    let old = tree(LANDING);
    let new = tree(&LANDING.replace(r#""showChange": false"#, r#""showChange": true"#));

    let changes = TreeDiffer::diff(&old, &new);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].identity.as_str(), "price");
    assert_eq!(changes[0].action, ChangeAction::Modified);
    assert_eq!(changes[0].block_type, BlockType::AssetPrice);
    assert_eq!(changes[0].path, "root.1.columns.1.blocks.0");
    assert!(changes[0].content_diff.is_none());

    let kind = ChangeClassifier::classify(&changes, false, false);
    assert_eq!(kind, ChangeType::Minor);
    assert_eq!(SemVer::parse(Some("1.4.2")).increment(kind).to_string(), "1.5.0");
}

#[test]
fn test_move_between_columns_is_major() {
    let old = tree(LANDING);
    let new = tree(
        r#"[
  {"id": "intro", "type": "content", "text": "Welcome"},
  {"id": "grid", "type": "columns", "gap": "lg", "columns": [
    {"id": "left", "blocks": []},
    {"id": "right", "blocks": [
      {"id": "price", "type": "assetPrice", "resourceAddress": "resource_rdx1", "showChange": false},
      {"id": "news", "type": "recentPages", "tagPath": "news", "limit": 3}
    ]}
  ]},
  {"id": "toc", "type": "tableOfContents"}
]"#,
    );

    let changes = TreeDiffer::diff(&old, &new);
    let moved: Vec<&str> = changes
        .iter()
        .filter(|c| c.action == ChangeAction::Moved)
        .map(|c| c.identity.as_str())
        .collect();
    assert_eq!(moved, vec!["news"]);
    assert!(changes.iter().all(|c| c.action != ChangeAction::Modified));
    assert_eq!(ChangeClassifier::classify(&changes, false, false), ChangeType::Major);
}

#[test]
fn test_change_list_serializes_in_camel_case() {
    let old = tree(r#"[{"id": "a", "type": "content", "text": "one"}]"#);
    let new = tree(r#"[{"id": "a", "type": "content", "text": "two"}]"#);
    let value = serde_json::to_value(TreeDiffer::diff(&old, &new)).unwrap();

    assert_eq!(value[0]["action"], "modified");
    assert_eq!(value[0]["blockType"], "content");
    assert_eq!(value[0]["contentDiff"]["from"], "one");
    assert_eq!(value[0]["attributeDiffs"]["text"]["to"], "two");
}

// ===========================================================================
// Merge
// ===========================================================================

#[test]
fn test_merge_of_parallel_edits_in_columns() {
    let base = tree(LANDING);
    let ours = tree(&LANDING.replace("Welcome", "Welcome back"));
    let theirs = tree(&LANDING.replace(r#""limit": 3"#, r#""limit": 6"#));

    let result = TreeMerger::merge(&base, &ours, &theirs);
    assert!(result.success);

    let changes = TreeDiffer::diff(&base, &result.content);
    let touched: Vec<&str> = changes.iter().map(|c| c.identity.as_str()).collect();
    assert_eq!(touched, vec!["intro", "news"]);
    assert_eq!(ids(&result.content), vec!["intro", "grid", "toc"]);
}

#[test]
fn test_merge_reports_conflicts_with_all_versions() {
    let base = tree(r#"[{"id": "a", "type": "content", "text": "x"}]"#);
    let ours = tree(r#"[{"id": "a", "type": "content", "text": "y"}]"#);
    let theirs = tree(r#"[{"id": "a", "type": "content", "text": "z"}]"#);

    let result = TreeMerger::merge(&base, &ours, &theirs);
    assert_eq!(result.content, ours);
    assert_eq!(result.conflicts.len(), 1);

    let value = serde_json::to_value(&result).unwrap();
    let conflict = &value["conflicts"][0];
    assert_eq!(conflict["identity"], "a");
    assert_eq!(conflict["kind"], "divergent_edit");
    assert_eq!(conflict["base"]["text"], "x");
    assert_eq!(conflict["ours"]["text"], "y");
    assert_eq!(conflict["theirs"]["text"], "z");
    assert_eq!(conflict["resolution"], "kept_ours");
    assert_eq!(value["success"], false);
}

#[test]
fn test_merge_with_configured_strategy() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        "[engine]\nroot_path = \"page\"\n\n[merge]\nstrategy = \"theirs\"\n",
    );
    assert_eq!(config.merge.strategy, MergeStrategy::Theirs);

    let base = tree(r#"[{"id": "a", "type": "content", "text": "x"}, {"id": "b", "type": "content", "text": "b"}]"#);
    let ours = tree(r#"[{"id": "a", "type": "content", "text": "x"}, {"id": "b", "type": "content", "text": "b!"}]"#);
    let theirs = tree(r#"[{"id": "a", "type": "content", "text": "x"}]"#);

    let result = TreeMerger::merge_with(&base, &ours, &theirs, &config.merge_options());
    assert_eq!(ids(&result.content), vec!["a"]);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].kind, ConflictKind::ModifyDelete);
    assert_eq!(result.conflicts[0].resolution, Some(Resolution::Removed));
    assert_eq!(result.conflicts[0].path, "page.1");
}

#[test]
fn test_their_move_into_column_combines_with_our_edit() {
    let base = tree(
        r#"[
  {"id": "intro", "type": "content", "text": "Welcome"},
  {"id": "grid", "type": "columns", "columns": [{"id": "left", "blocks": []}]}
]"#,
    );
    let ours = tree(
        r#"[
  {"id": "intro", "type": "content", "text": "Welcome back"},
  {"id": "grid", "type": "columns", "columns": [{"id": "left", "blocks": []}]}
]"#,
    );
    let theirs = tree(
        r#"[
  {"id": "grid", "type": "columns", "columns": [
    {"id": "left", "blocks": [{"id": "intro", "type": "content", "text": "Welcome"}]}
  ]}
]"#,
    );

    let result = TreeMerger::merge(&base, &ours, &theirs);
    assert!(result.success, "conflicts: {:?}", result.conflicts);
    assert_eq!(
        result.content,
        tree(
            r#"[
  {"id": "grid", "type": "columns", "columns": [
    {"id": "left", "blocks": [{"id": "intro", "type": "content", "text": "Welcome back"}]}
  ]}
]"#
        )
    );

    let changes = TreeDiffer::diff(&base, &result.content);
    let actions: Vec<ChangeAction> = changes.iter().map(|c| c.action).collect();
    assert!(actions.contains(&ChangeAction::Moved));
    assert!(actions.contains(&ChangeAction::Modified));
}

// ===========================================================================
// Documents
// ===========================================================================

#[test]
fn test_document_history_through_merge() {
    let mut doc = Document::new(
        "landing",
        DocumentEdit {
            title: "Landing".into(),
            banner: None,
            content: tree(LANDING),
        },
        "alice",
    )
    .unwrap();

    let base = doc.content.clone();
    let ours = tree(&LANDING.replace("Welcome", "Hello"));
    let theirs = tree(&LANDING.replace(r#"{"id": "toc", "type": "tableOfContents"}"#, r#"{"id": "toc", "type": "tableOfContents"}, {"id": "outro", "type": "content", "text": "Bye"}"#));
    let merged = TreeMerger::merge(&base, &ours, &theirs);
    assert!(merged.success);

    let rev = doc
        .commit(
            DocumentEdit {
                title: "Landing".into(),
                banner: None,
                content: merged.content,
            },
            "bob",
            Some("merge"),
        )
        .unwrap()
        .expect("merge result differs from base");
    assert_eq!(rev.change_type, ChangeType::Major);
    assert_eq!(rev.version, SemVer::new(2, 0, 0));
    assert_eq!(doc.revisions().len(), 2);
    assert_eq!(ids(&doc.content), vec!["intro", "grid", "toc", "outro"]);
}

// ===========================================================================
// Boundary errors
// ===========================================================================

#[test]
fn test_nested_columns_are_rejected() {
    let json = r#"[{"id": "outer", "type": "columns", "columns": [
        {"id": "c", "blocks": [{"id": "inner", "type": "columns", "columns": []}]}
    ]}]"#;
    let err = BlockTree::from_json(json).unwrap_err();
    assert!(matches!(err, TreeError::NestedColumns(_) | TreeError::ParseError(_)));

    let core: CoreError = err.into();
    assert!(matches!(core, CoreError::Tree(_)));
}

#[test]
fn test_duplicate_identity_across_depths() {
    let t = tree(
        r#"[
  {"id": "a", "type": "content", "text": "top"},
  {"id": "grid", "type": "columns", "columns": [
    {"id": "c", "blocks": [{"id": "a", "type": "content", "text": "nested"}]}
  ]}
]"#,
    );
    let err = t.validate().unwrap_err();
    assert!(matches!(err, TreeError::DuplicateIdentity { ref identity, .. } if identity == "a"));
    assert!(matches!(t.blocks[1], Block::Columns(_)));
}
