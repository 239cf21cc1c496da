//! Documents and their append-only revision history.
//!
//! A [`Document`] holds the current title, banner, and block tree together
//! with the list of [`Revision`]s that produced them. Every edit is diffed
//! against the current content, classified, and turned into a version bump;
//! edits classified as `none` leave the history untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{ChangeClassifier, ClassifierPolicy};
use crate::config::EngineConfig;
use crate::diff::{BlockChange, TreeDiffer};
use crate::errors::RevisionError;
use crate::tree::{BlockTree, ROOT_PATH};
use crate::version::{ChangeType, SemVer};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The proposed next state of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentEdit {
    pub title: String,
    pub banner: Option<String>,
    pub content: BlockTree,
}

/// What committing an edit would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionPlan {
    pub changes: Vec<BlockChange>,
    pub title_changed: bool,
    pub banner_changed: bool,
    pub change_type: ChangeType,
    pub from_version: SemVer,
    pub to_version: SemVer,
}

/// An immutable entry in a document's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    pub id: String,
    pub version: SemVer,
    pub change_type: ChangeType,
    pub title: String,
    pub banner: Option<String>,
    pub content: BlockTree,
    pub changes: Vec<BlockChange>,
    pub author: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A versioned document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub banner: Option<String>,
    pub content: BlockTree,
    pub version: SemVer,
    revisions: Vec<Revision>,
    #[serde(skip)]
    policy: ClassifierPolicy,
    #[serde(skip, default = "default_root_path")]
    root_path: String,
}

fn default_root_path() -> String {
    ROOT_PATH.into()
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

impl Document {
    /// Create a document at version `1.0.0`.
    ///
    /// The initial state is recorded as the first revision (change type
    /// `none`) so it can be reverted to later.
    pub fn new(
        id: impl Into<String>,
        edit: DocumentEdit,
        author: &str,
    ) -> Result<Self, RevisionError> {
        let id = id.into();
        validate_content(&id, &edit.content)?;

        let version = SemVer::default();
        let initial = Revision {
            id: uuid::Uuid::new_v4().to_string(),
            version,
            change_type: ChangeType::None,
            title: edit.title.clone(),
            banner: edit.banner.clone(),
            content: edit.content.clone(),
            changes: Vec::new(),
            author: author.to_string(),
            message: Some("created".into()),
            created_at: Utc::now(),
        };
        info!(document = %id, %version, "document created");

        Ok(Self {
            id,
            title: edit.title,
            banner: edit.banner,
            content: edit.content,
            version,
            revisions: vec![initial],
            policy: ClassifierPolicy::default(),
            root_path: default_root_path(),
        })
    }

    /// Apply the classifier policy and root path from `config`.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.policy = config.classifier;
        self.root_path = config.engine.root_path.clone();
        self
    }

    /// Diff, classify, and version an edit without applying it.
    pub fn plan_revision(&self, edit: &DocumentEdit) -> Result<RevisionPlan, RevisionError> {
        validate_content(&self.id, &edit.content)?;

        let changes = TreeDiffer::diff_at(&self.content, &edit.content, &self.root_path);
        let title_changed = self.title != edit.title;
        let banner_changed = self.banner != edit.banner;
        let change_type =
            ChangeClassifier::classify_with(&changes, title_changed, banner_changed, self.policy);

        Ok(RevisionPlan {
            changes,
            title_changed,
            banner_changed,
            change_type,
            from_version: self.version,
            to_version: self.version.increment(change_type),
        })
    }

    /// Commit an edit, returning the new revision.
    ///
    /// Returns `Ok(None)` and records nothing when the edit changes nothing.
    pub fn commit(
        &mut self,
        edit: DocumentEdit,
        author: &str,
        message: Option<&str>,
    ) -> Result<Option<&Revision>, RevisionError> {
        let plan = self.plan_revision(&edit)?;
        if plan.change_type == ChangeType::None {
            debug!(document = %self.id, "edit has no changes, nothing recorded");
            return Ok(None);
        }

        let revision = Revision {
            id: uuid::Uuid::new_v4().to_string(),
            version: plan.to_version,
            change_type: plan.change_type,
            title: edit.title.clone(),
            banner: edit.banner.clone(),
            content: edit.content.clone(),
            changes: plan.changes,
            author: author.to_string(),
            message: message.map(str::to_string),
            created_at: Utc::now(),
        };
        info!(
            document = %self.id,
            revision = %revision.id,
            from = %plan.from_version,
            to = %plan.to_version,
            change_type = %plan.change_type,
            "revision committed"
        );

        self.title = edit.title;
        self.banner = edit.banner;
        self.content = edit.content;
        self.version = plan.to_version;
        self.revisions.push(revision);
        Ok(self.revisions.last())
    }

    /// Restore the title, banner, and content of an earlier revision as a
    /// new revision. History is never rewritten.
    pub fn revert_to(&mut self, id: &str, author: &str) -> Result<Option<&Revision>, RevisionError> {
        let target = self
            .revision(id)
            .ok_or_else(|| RevisionError::NotFound(id.to_string()))?;
        let edit = DocumentEdit {
            title: target.title.clone(),
            banner: target.banner.clone(),
            content: target.content.clone(),
        };
        let message = format!("revert to {}", target.version);
        info!(document = %self.id, target = %id, "reverting document");

        self.commit(edit, author, Some(&message))
    }

    pub fn revision(&self, id: &str) -> Option<&Revision> {
        self.revisions.iter().find(|r| r.id == id)
    }

    /// All revisions, oldest first.
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn latest(&self) -> Option<&Revision> {
        self.revisions.last()
    }
}

fn validate_content(document: &str, content: &BlockTree) -> Result<(), RevisionError> {
    content
        .validate()
        .map_err(|source| RevisionError::InvalidContent {
            document: document.to_string(),
            source,
        })
}
