//! Error types for the blockrev core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! The pure engine operations (diff, classify, merge, version arithmetic)
//! never fail. Errors only arise at the edges: decoding a tree, validating
//! identities, looking up revisions, and loading configuration.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Tree errors
// ---------------------------------------------------------------------------

/// Errors from decoding or validating a block tree snapshot.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The serialized tree does not match the block schema.
    #[error("block tree parse error: {0}")]
    ParseError(String),

    /// A `columns` block was found inside a column.
    #[error("block '{0}' nests a columns block inside a column")]
    NestedColumns(String),

    /// Two blocks in one snapshot share an identity.
    #[error("duplicate block identity '{identity}' at {first} and {second}")]
    DuplicateIdentity {
        identity: String,
        first: String,
        second: String,
    },

    /// A block carries an empty identity.
    #[error("block at {0} has an empty identity")]
    EmptyIdentity(String),
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Revision errors
// ---------------------------------------------------------------------------

/// Errors from the document / revision history layer.
#[derive(Debug, Error)]
pub enum RevisionError {
    /// The requested revision ID was not found.
    #[error("revision not found: {0}")]
    NotFound(String),

    /// The edited content failed validation.
    #[error("invalid content for document {document}: {source}")]
    InvalidContent {
        document: String,
        #[source]
        source: TreeError,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
