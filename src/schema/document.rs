//! The live document: a slotmap arena of nodes with parent/child links.
//!
//! All nodes live in a single `SlotMap`. Parent/child relationships are
//! stored in secondary maps, so a parent "back-reference" is a key lookup,
//! never an owning pointer, and the ownership chain cannot become cyclic.
//! [`Document::load`] and [`Document::save`] convert between this form and
//! the serialized [`Descriptor`] tree.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use std::collections::BTreeMap;

use super::descriptor::{ActionInvocation, Children, Descriptor, ModelBinding, SlotRouting, Wrap};
use crate::render::tags::ComponentFactory;

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeKey] = &[];

/// The sentinel tag marking a document root. Rendered as a plain structural
/// container, never as a nested interpreter instance.
pub const ROOT_TAG: &str = "SchemaRenderer";

new_key_type! {
    /// Unique identifier for a document node. Copy, lightweight (u64).
    pub struct NodeKey;
}

// ---------------------------------------------------------------------------
// NodeData
// ---------------------------------------------------------------------------

/// Arena form of a descriptor: everything except the child list, which the
/// document tracks separately.
#[derive(Clone, Default)]
pub struct NodeData {
    /// Node id, unique among siblings.
    pub id: Option<String>,
    /// Renderable type name.
    pub tag: Option<String>,
    /// Property name -> literal or sigil-prefixed expression.
    pub properties: Map<String, Value>,
    /// Event name -> ordered action invocations.
    pub events: BTreeMap<String, Vec<ActionInvocation>>,
    /// Literal text content (exclusive with child nodes).
    pub text: Option<String>,
    /// Slot routing inside the parent implementation.
    pub slot: SlotRouting,
    /// Loop expression; must evaluate to an array.
    pub loop_expression: Option<String>,
    /// Two-way model binding.
    pub model: Option<ModelBinding>,
    /// Hidden nodes are dropped before slot distribution.
    pub hidden: bool,
    /// Render-order sort key among siblings.
    pub priority: i64,
    /// Optional enclosing node around rendered output.
    pub wrap: Option<Wrap>,
    /// Opt out of expression evaluation (raw passthrough).
    pub eval_disabled: bool,
    /// Runtime-attached component factory. Takes precedence over the tag
    /// registry. Never serialized.
    pub factory: Option<Arc<dyn ComponentFactory>>,
}

impl std::fmt::Debug for NodeData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeData")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("properties", &self.properties)
            .field("events", &self.events)
            .field("text", &self.text)
            .field("slot", &self.slot)
            .field("loop_expression", &self.loop_expression)
            .field("model", &self.model)
            .field("hidden", &self.hidden)
            .field("priority", &self.priority)
            .field("wrap", &self.wrap)
            .field("eval_disabled", &self.eval_disabled)
            .field("factory", &self.factory.as_ref().map(|factory| factory.name().to_owned()))
            .finish()
    }
}

impl NodeData {
    /// Create node data with the given tag and defaults otherwise.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Set the id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Copy the descriptor's node-local fields (everything except children).
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            tag: descriptor.tag.clone(),
            properties: descriptor.properties.clone(),
            events: descriptor.events.clone(),
            text: match &descriptor.children {
                Children::Text(text) => Some(text.clone()),
                Children::Nodes(_) => None,
            },
            slot: descriptor.slot.clone(),
            loop_expression: descriptor.loop_expression.clone(),
            model: descriptor.model.clone(),
            hidden: descriptor.hidden,
            priority: descriptor.priority,
            wrap: descriptor.wrap.clone(),
            eval_disabled: descriptor.eval_disabled,
            factory: None,
        }
    }

    /// Produce a descriptor with the node-local fields and empty children.
    pub fn to_descriptor(&self) -> Descriptor {
        Descriptor {
            id: self.id.clone(),
            tag: self.tag.clone(),
            properties: self.properties.clone(),
            events: self.events.clone(),
            children: match &self.text {
                Some(text) => Children::Text(text.clone()),
                None => Children::default(),
            },
            slot: self.slot.clone(),
            loop_expression: self.loop_expression.clone(),
            model: self.model.clone(),
            hidden: self.hidden,
            priority: self.priority,
            wrap: self.wrap.clone(),
            eval_disabled: self.eval_disabled,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// The central document tree, backed by a slotmap arena.
pub struct Document {
    nodes: SlotMap<NodeKey, NodeData>,
    children: SecondaryMap<NodeKey, Vec<NodeKey>>,
    parent: SecondaryMap<NodeKey, NodeKey>,
    root: NodeKey,
}

impl Document {
    /// Create a document with an empty root node.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut children = SecondaryMap::new();
        let root = nodes.insert(NodeData::new(ROOT_TAG).with_id("root"));
        children.insert(root, Vec::new());
        Self {
            nodes,
            children,
            parent: SecondaryMap::new(),
            root,
        }
    }

    /// Build a document from a serialized descriptor tree, computing parent
    /// links top-down.
    pub fn load(descriptor: &Descriptor) -> Self {
        let mut nodes = SlotMap::with_key();
        let mut children = SecondaryMap::new();
        let root = nodes.insert(NodeData::from_descriptor(descriptor));
        children.insert(root, Vec::new());
        let mut document = Self {
            nodes,
            children,
            parent: SecondaryMap::new(),
            root,
        };
        for child in descriptor.children.nodes() {
            document.insert_descriptor(root, child);
        }
        document
    }

    /// Serialize the whole document to a parent-free descriptor tree.
    pub fn save(&self) -> Descriptor {
        self.subtree_descriptor(self.root)
    }

    /// Serialize the subtree rooted at `key` to a parent-free descriptor.
    pub fn subtree_descriptor(&self, key: NodeKey) -> Descriptor {
        let mut descriptor = match self.nodes.get(key) {
            Some(data) => data.to_descriptor(),
            None => return Descriptor::default(),
        };
        let child_keys = self.children(key);
        if !child_keys.is_empty() {
            let children = child_keys
                .iter()
                .map(|&child| self.subtree_descriptor(child))
                .collect();
            descriptor.children = Children::Nodes(children);
        }
        descriptor
    }

    /// Insert a descriptor subtree under `parent`, appended to its children.
    /// Returns the key of the inserted subtree root.
    pub fn insert_descriptor(&mut self, parent: NodeKey, descriptor: &Descriptor) -> NodeKey {
        let key = self.insert_child(parent, NodeData::from_descriptor(descriptor));
        for child in descriptor.children.nodes() {
            self.insert_descriptor(key, child);
        }
        key
    }

    /// Insert a node as the last child of `parent`.
    pub fn insert_child(&mut self, parent: NodeKey, data: NodeData) -> NodeKey {
        debug_assert!(self.nodes.contains_key(parent), "parent node does not exist");
        // Text content and child nodes are mutually exclusive.
        if let Some(parent_data) = self.nodes.get_mut(parent) {
            parent_data.text = None;
        }
        let key = self.nodes.insert(data);
        self.children.insert(key, Vec::new());
        self.parent.insert(key, parent);
        match self.children.get_mut(parent) {
            Some(siblings) => siblings.push(key),
            None => {
                self.children.insert(parent, vec![key]);
            }
        }
        key
    }

    /// Detach `key` from its parent and delete the whole subtree, returning
    /// its parent-free descriptor form. Returns `None` for the root or for a
    /// key not in the document.
    pub fn extract(&mut self, key: NodeKey) -> Option<Descriptor> {
        if key == self.root || !self.nodes.contains_key(key) {
            return None;
        }
        let descriptor = self.subtree_descriptor(key);
        if let Some(parent_key) = self.parent.remove(key) {
            if let Some(siblings) = self.children.get_mut(parent_key) {
                siblings.retain(|&child| child != key);
            }
        }
        self.prune(key);
        Some(descriptor)
    }

    /// Delete a subtree's arena storage (depth-first).
    fn prune(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(kids) = self.children.remove(current) {
                stack.extend(kids);
            }
            self.parent.remove(current);
            self.nodes.remove(current);
        }
    }

    /// The root node key.
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.parent.get(key).copied()
    }

    /// Get the children of a node. Empty for leaves and unknown keys.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.children
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Mutable access to a node's child list. `None` for unknown keys.
    pub(crate) fn children_mut(&mut self, key: NodeKey) -> Option<&mut Vec<NodeKey>> {
        self.children.get_mut(key)
    }

    /// Immutable access to a node's data.
    pub fn get(&self, key: NodeKey) -> Option<&NodeData> {
        self.nodes.get(key)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut NodeData> {
        self.nodes.get_mut(key)
    }

    /// Whether the document contains the node.
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document holds only a root with no children.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// Index of `key` within its parent's child list.
    pub fn sibling_index(&self, key: NodeKey) -> Option<usize> {
        let parent_key = self.parent(key)?;
        self.children(parent_key).iter().position(|&child| child == key)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk(&self, start: NodeKey) -> Vec<NodeKey> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Every id present anywhere in the document.
    pub fn all_ids(&self) -> HashSet<String> {
        self.walk(self.root)
            .into_iter()
            .filter_map(|key| self.nodes.get(key).and_then(|data| data.id.clone()))
            .collect()
    }

    /// Regenerate every id in the subtree rooted at `start` so that none
    /// collides with any id already present in the document.
    ///
    /// Ids of the form `name_SUFFIX` keep `name` and get a fresh random
    /// suffix; other ids get a suffix appended.
    pub fn regenerate_ids(&mut self, start: NodeKey) {
        let mut taken = self.all_ids();
        for key in self.walk(start) {
            let Some(data) = self.nodes.get_mut(key) else { continue };
            let Some(old_id) = data.id.clone() else { continue };
            // The old id stays in the set: a pasted clone shares its ids
            // with the copy source, so reusing one is a collision too.
            let mut fresh = regenerate_id(&old_id);
            while taken.contains(&fresh) {
                fresh = regenerate_id(&old_id);
            }
            taken.insert(fresh.clone());
            data.id = Some(fresh);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.len())
            .field("root", &self.root)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Id generation
// ---------------------------------------------------------------------------

/// A short random id suffix (5 chars from the random tail of a fresh ULID).
pub fn random_suffix() -> String {
    let id = ulid::Ulid::new().to_string();
    id[id.len() - 5..].to_owned()
}

/// Replace the part after the last `_` with a fresh random suffix, or append
/// one when the id has no `_`.
pub fn regenerate_id(id: &str) -> String {
    match id.rfind('_') {
        Some(index) => format!("{}_{}", &id[..index], random_suffix()),
        None => format!("{}_{}", id, random_suffix()),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a small test tree:
    /// ```text
    ///       root
    ///      /    \
    ///    a        b
    ///   / \
    ///  c   d
    /// ```
    fn build_tree() -> (Document, NodeKey, NodeKey, NodeKey, NodeKey, NodeKey) {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.insert_child(root, NodeData::new("Card").with_id("a"));
        let b = doc.insert_child(root, NodeData::new("Card").with_id("b"));
        let c = doc.insert_child(a, NodeData::new("Button").with_id("c"));
        let d = doc.insert_child(a, NodeData::new("Label").with_id("d"));
        (doc, root, a, b, c, d)
    }

    // ── Structure ────────────────────────────────────────────────────

    #[test]
    fn new_document_has_root() {
        let doc = Document::new();
        assert!(doc.contains(doc.root()));
        assert!(doc.is_empty());
        assert_eq!(doc.get(doc.root()).unwrap().tag.as_deref(), Some(ROOT_TAG));
    }

    #[test]
    fn insert_child_links_parent() {
        let (doc, root, a, _b, c, _d) = build_tree();
        assert_eq!(doc.parent(a), Some(root));
        assert_eq!(doc.parent(c), Some(a));
        assert_eq!(doc.parent(root), None);
    }

    #[test]
    fn children_order() {
        let (doc, root, a, b, c, d) = build_tree();
        assert_eq!(doc.children(root), &[a, b]);
        assert_eq!(doc.children(a), &[c, d]);
        assert!(doc.children(c).is_empty());
    }

    #[test]
    fn sibling_index() {
        let (doc, _root, a, b, c, d) = build_tree();
        assert_eq!(doc.sibling_index(a), Some(0));
        assert_eq!(doc.sibling_index(b), Some(1));
        assert_eq!(doc.sibling_index(c), Some(0));
        assert_eq!(doc.sibling_index(d), Some(1));
    }

    #[test]
    fn sibling_index_of_root_is_none() {
        let (doc, root, ..) = build_tree();
        assert_eq!(doc.sibling_index(root), None);
    }

    #[test]
    fn walk_depth_first() {
        let (doc, root, a, b, c, d) = build_tree();
        assert_eq!(doc.walk(root), vec![root, a, c, d, b]);
    }

    // ── Extract ──────────────────────────────────────────────────────

    #[test]
    fn extract_subtree() {
        let (mut doc, root, a, b, c, d) = build_tree();
        let descriptor = doc.extract(a).unwrap();
        assert_eq!(descriptor.id.as_deref(), Some("a"));
        assert_eq!(descriptor.children.nodes().len(), 2);
        assert!(!doc.contains(a));
        assert!(!doc.contains(c));
        assert!(!doc.contains(d));
        assert!(doc.contains(b));
        assert_eq!(doc.children(root), &[b]);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn extract_root_is_noop() {
        let (mut doc, root, ..) = build_tree();
        assert!(doc.extract(root).is_none());
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn extract_stale_key() {
        let (mut doc, _root, _a, b, ..) = build_tree();
        doc.extract(b);
        assert!(doc.extract(b).is_none());
    }

    // ── Load / save ──────────────────────────────────────────────────

    #[test]
    fn load_save_round_trip() {
        let descriptor = Descriptor::new(ROOT_TAG).with_id("root").with_children(vec![
            Descriptor::new("Card").with_id("card_1").with_children(vec![
                Descriptor::new("Button").with_id("btn_1").with_text("Click me"),
            ]),
            Descriptor::new("Label").with_id("lbl_1").with_priority(3),
        ]);
        let doc = Document::load(&descriptor);
        assert_eq!(doc.save(), descriptor);
    }

    #[test]
    fn save_load_save_is_stable() {
        let descriptor = Descriptor::new(ROOT_TAG).with_children(vec![
            Descriptor::new("Card").with_property("flat", true).with_children(vec![
                Descriptor::new("Button").with_id("btn_1"),
            ]),
        ]);
        let doc = Document::load(&descriptor);
        let saved = doc.save();
        let reloaded = Document::load(&saved);
        assert_eq!(reloaded.save(), saved);
    }

    #[test]
    fn text_children_survive_round_trip() {
        let descriptor = Descriptor::new(ROOT_TAG)
            .with_children(vec![Descriptor::new("Label").with_text("hello")]);
        let doc = Document::load(&descriptor);
        let saved = doc.save();
        assert_eq!(saved.children.nodes()[0].children, Children::Text("hello".into()));
    }

    #[test]
    fn inserting_a_child_clears_text_content() {
        let descriptor = Descriptor::new(ROOT_TAG)
            .with_children(vec![Descriptor::new("Label").with_id("l").with_text("hello")]);
        let mut doc = Document::load(&descriptor);
        let label = doc.children(doc.root())[0];
        doc.insert_child(label, NodeData::new("Icon").with_id("i"));
        assert_eq!(doc.get(label).unwrap().text, None);

        // The saved form keeps the child nodes, and reloading is stable.
        let saved = doc.save();
        assert_eq!(saved.children.nodes()[0].children.nodes().len(), 1);
        assert_eq!(Document::load(&saved).save(), saved);
    }

    // ── Id regeneration ──────────────────────────────────────────────

    #[test]
    fn regenerate_id_replaces_suffix() {
        let fresh = regenerate_id("button_AAAAA");
        assert!(fresh.starts_with("button_"));
        assert_ne!(fresh, "button_AAAAA");
        assert_eq!(fresh.len(), "button_".len() + 5);
    }

    #[test]
    fn regenerate_id_appends_when_no_suffix() {
        let fresh = regenerate_id("button");
        assert!(fresh.starts_with("button_"));
        assert_eq!(fresh.len(), "button_".len() + 5);
    }

    #[test]
    fn regenerate_ids_avoids_collisions() {
        let (mut doc, _root, a, ..) = build_tree();
        doc.regenerate_ids(a);
        let ids = doc.all_ids();
        // Old subtree ids replaced, other ids untouched.
        assert!(!ids.contains("a"));
        assert!(!ids.contains("c"));
        assert!(!ids.contains("d"));
        assert!(ids.contains("b"));
        assert!(ids.contains("root"));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn regenerated_ids_never_reuse_the_copy_source() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.insert_child(root, NodeData::new("Card").with_id("card_1"));
        let pasted = doc.insert_child(root, NodeData::new("Card").with_id("card_1"));
        doc.regenerate_ids(pasted);
        let pasted_id = doc.get(pasted).unwrap().id.clone().unwrap();
        assert_ne!(pasted_id, "card_1");
        assert_eq!(doc.all_ids().len(), 3);
    }

    #[test]
    fn random_suffix_is_five_chars() {
        assert_eq!(random_suffix().len(), 5);
    }

    #[test]
    fn random_suffixes_differ() {
        // Two fresh ULIDs share a suffix with negligible probability.
        assert_ne!(random_suffix(), random_suffix());
    }
}
