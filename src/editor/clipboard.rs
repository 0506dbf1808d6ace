//! System clipboard transport for copy and paste.
//!
//! Clipboard access can fail on headless systems; every failure is logged
//! and the editing session continues. The structural copy/paste logic itself
//! is text-based and lives in [`crate::editor::ops`], so it stays testable
//! without a real clipboard.

use tracing::warn;

/// Best-effort system clipboard handle.
pub struct Clipboard {
    inner: Option<arboard::Clipboard>,
}

impl Clipboard {
    /// Connect to the system clipboard. On failure the handle is inert.
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(error) => {
                warn!(%error, "clipboard unavailable");
                None
            }
        };
        Self { inner }
    }

    /// Whether a system clipboard was reachable at construction.
    pub fn is_connected(&self) -> bool {
        self.inner.is_some()
    }

    /// Put text on the clipboard. Returns whether it was stored.
    pub fn set_text(&mut self, text: &str) -> bool {
        let Some(clipboard) = self.inner.as_mut() else {
            return false;
        };
        match clipboard.set_text(text.to_owned()) {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "clipboard write failed");
                false
            }
        }
    }

    /// Read text from the clipboard, if any.
    pub fn get_text(&mut self) -> Option<String> {
        let clipboard = self.inner.as_mut()?;
        match clipboard.get_text() {
            Ok(text) => Some(text),
            Err(error) => {
                warn!(%error, "clipboard read failed");
                None
            }
        }
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clipboard")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
