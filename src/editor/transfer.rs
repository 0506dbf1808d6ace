//! Saving documents to and loading them from JSON files.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::schema::{Descriptor, Document};

/// Errors from file transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("file is not a descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Write a document to a pretty-printed JSON file.
pub fn save_to_file(document: &Document, path: &Path) -> Result<(), TransferError> {
    let descriptor = document.save();
    let text = serde_json::to_string_pretty(&descriptor)?;
    fs::write(path, text)?;
    Ok(())
}

/// Load a document from a JSON file. Failures leave the caller's current
/// document untouched, since nothing is returned to replace it with.
pub fn load_from_file(path: &Path) -> Result<Document, TransferError> {
    let text = fs::read_to_string(path)?;
    let descriptor: Descriptor = serde_json::from_str(&text).map_err(|error| {
        warn!(path = %path.display(), %error, "file is not a descriptor");
        error
    })?;
    Ok(Document::load(&descriptor))
}

// ===========================================================================
// Tests
// ===========================================================================
