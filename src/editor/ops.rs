//! Structural tree editing: moves, insertion, removal, copy and paste.
//!
//! [`TreeEditor`] owns a [`Document`] and exposes the operations a visual
//! builder needs. Every operation keeps the document well-formed; boundary
//! cases (first child moved up, root removed) are no-ops rather than errors.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::schema::{
    document, ActionInvocation, Descriptor, Document, NodeData, NodeKey, SlotRouting,
};

/// Errors from editor operations.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("pasted payload is not a descriptor: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("node is not in the document")]
    UnknownNode,
    #[error("the root cannot be moved, removed or given siblings")]
    Root,
}

/// A document plus the structural operations of the builder.
#[derive(Debug)]
pub struct TreeEditor {
    document: Document,
}

impl TreeEditor {
    /// Start from an empty document.
    pub fn new() -> Self {
        Self {
            document: Document::new(),
        }
    }

    /// Edit an existing document.
    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    /// Load a serialized tree.
    pub fn load(descriptor: &Descriptor) -> Self {
        Self {
            document: Document::load(descriptor),
        }
    }

    /// Serialize the current tree.
    pub fn save(&self) -> Descriptor {
        self.document.save()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    // ── Moves ────────────────────────────────────────────────────────

    /// Move a node to the front of its siblings. Returns whether anything
    /// changed.
    pub fn move_first(&mut self, key: NodeKey) -> bool {
        self.splice(key, |index, _| (index > 0).then_some(0))
    }

    /// Move a node to the back of its siblings.
    pub fn move_last(&mut self, key: NodeKey) -> bool {
        self.splice(key, |index, len| (index + 1 < len).then_some(len - 1))
    }

    /// Swap a node with its previous sibling.
    pub fn move_up(&mut self, key: NodeKey) -> bool {
        self.splice(key, |index, _| index.checked_sub(1))
    }

    /// Swap a node with its next sibling.
    pub fn move_down(&mut self, key: NodeKey) -> bool {
        self.splice(key, |index, len| (index + 1 < len).then_some(index + 1))
    }

    /// Remove the node from its sibling list and reinsert it at the index
    /// `place` picks. `None` from `place` means no-op.
    fn splice(&mut self, key: NodeKey, place: impl Fn(usize, usize) -> Option<usize>) -> bool {
        let Some(parent) = self.document.parent(key) else {
            return false;
        };
        let Some(index) = self.document.sibling_index(key) else {
            return false;
        };
        let Some(siblings) = self.document.children_mut(parent) else {
            return false;
        };
        match place(index, siblings.len()) {
            Some(target) if target != index => {
                siblings.remove(index);
                siblings.insert(target, key);
                true
            }
            _ => false,
        }
    }

    // ── Insertion and removal ────────────────────────────────────────

    /// Append a fresh node with the given tag under `parent`. The id is the
    /// tag plus a unique random suffix.
    pub fn add_child(&mut self, parent: NodeKey, tag: &str) -> Result<NodeKey, EditError> {
        if !self.document.contains(parent) {
            return Err(EditError::UnknownNode);
        }
        let id = self.fresh_id(tag);
        Ok(self
            .document
            .insert_child(parent, NodeData::new(tag).with_id(id)))
    }

    /// Append one fresh node per tag under `parent`.
    pub fn add_children(&mut self, parent: NodeKey, tags: &[&str]) -> Result<Vec<NodeKey>, EditError> {
        tags.iter().map(|tag| self.add_child(parent, tag)).collect()
    }

    /// Remove a subtree, returning its parent-free serialized form. The
    /// root cannot be removed.
    pub fn remove(&mut self, key: NodeKey) -> Result<Descriptor, EditError> {
        if key == self.document.root() {
            return Err(EditError::Root);
        }
        self.document.extract(key).ok_or(EditError::UnknownNode)
    }

    // ── Copy and paste ───────────────────────────────────────────────

    /// Serialize a subtree to JSON for the clipboard.
    pub fn copy(&self, key: NodeKey) -> Result<String, EditError> {
        if !self.document.contains(key) {
            return Err(EditError::UnknownNode);
        }
        let descriptor = self.document.subtree_descriptor(key);
        serde_json::to_string_pretty(&descriptor).map_err(EditError::from)
    }

    /// Parse clipboard text and append the subtree under `parent`. All ids
    /// in the pasted subtree are regenerated. A parse failure leaves the
    /// document unchanged.
    pub fn paste_as_child(&mut self, parent: NodeKey, text: &str) -> Result<NodeKey, EditError> {
        if !self.document.contains(parent) {
            return Err(EditError::UnknownNode);
        }
        let descriptor: Descriptor = serde_json::from_str(text).map_err(|error| {
            warn!(%error, "pasted text is not a descriptor");
            EditError::Parse(error)
        })?;
        let key = self.document.insert_descriptor(parent, &descriptor);
        self.document.regenerate_ids(key);
        Ok(key)
    }

    /// Parse clipboard text and append the subtree next to `target`, under
    /// the same parent.
    pub fn paste_as_sibling(&mut self, target: NodeKey, text: &str) -> Result<NodeKey, EditError> {
        let parent = self.document.parent(target).ok_or(EditError::Root)?;
        self.paste_as_child(parent, text)
    }

    // ── Node edits ───────────────────────────────────────────────────

    /// Replace a node's properties map.
    pub fn set_properties(&mut self, key: NodeKey, properties: Map<String, Value>) -> bool {
        match self.document.get_mut(key) {
            Some(data) => {
                data.properties = properties;
                true
            }
            None => false,
        }
    }

    /// Replace a node's event map.
    pub fn set_events(&mut self, key: NodeKey, events: BTreeMap<String, Vec<ActionInvocation>>) -> bool {
        match self.document.get_mut(key) {
            Some(data) => {
                data.events = events;
                true
            }
            None => false,
        }
    }

    /// Replace a node's slot routing.
    pub fn set_slot(&mut self, key: NodeKey, slot: SlotRouting) -> bool {
        match self.document.get_mut(key) {
            Some(data) => {
                data.slot = slot;
                true
            }
            None => false,
        }
    }

    fn fresh_id(&self, tag: &str) -> String {
        let taken = self.document.all_ids();
        let mut id = format!("{}_{}", tag, document::random_suffix());
        while taken.contains(&id) {
            id = format!("{}_{}", tag, document::random_suffix());
        }
        id
    }
}

impl Default for TreeEditor {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
