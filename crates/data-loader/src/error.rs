//! Error types for the data-loader crate.
//!
//! Two families of errors live here:
//! - Fatal load errors (a file that cannot be opened, a missing header line,
//!   an interaction type outside the declared enum). These abort the load.
//! - Per-record errors (malformed field, unknown peer, interaction older than
//!   its item). The loader logs these and skips the offending record.

use thiserror::Error;

use crate::types::{ItemId, Timestamp, UserId};

/// Errors that can occur during data loading and indexing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file {path}: {source}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file has no header line (empty or unreadable)
    #[error("Invalid data format in {file}: missing header line")]
    MissingHeader { file: String },

    /// Interaction type code outside CLICK/BOOKMARK/REPLY/DELETE.
    ///
    /// This is a loader-corruption condition, not bad data, so it is fatal.
    #[error("Invalid interaction type {code} at line {line}")]
    InvalidInteractionType { code: u32, line: usize },

    /// Referenced entity doesn't exist (e.g., interaction for a non-existent item)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// Interaction happened before the item it refers to was created
    #[error(
        "Interaction by user {user} at {timestamp} is earlier than item {item} created at {created_at}"
    )]
    InteractionBeforeCreation {
        user: UserId,
        item: ItemId,
        timestamp: Timestamp,
        created_at: Timestamp,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
