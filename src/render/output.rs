//! Output tree: the fully evaluated, renderable form of a document pass.
//!
//! Every render pass derives a fresh output tree from the document and the
//! current binding snapshot. Output nodes carry resolved targets, evaluated
//! properties and assembled event hooks; they never reference the document
//! mutably and hold no parent links.

use serde_json::{Map, Value};

use crate::schema::{ActionInvocation, NodeKey};

use super::tags::RenderTarget;

// ---------------------------------------------------------------------------
// EventHook
// ---------------------------------------------------------------------------

/// A listener assembled for one output node and event name.
///
/// Firing a hook first applies the model write-back (when present), then the
/// declared invocations in order.
#[derive(Debug, Clone)]
pub struct EventHook {
    /// Event name the hook listens for.
    pub event: String,
    /// Document node the hook was assembled from.
    pub source: NodeKey,
    /// Binding path written with the event payload before any invocation.
    pub model_path: Option<String>,
    /// Declared action invocations, in document order.
    pub invocations: Vec<ActionInvocation>,
    /// Loop scope captured where the hook was produced.
    pub scope_args: Vec<Value>,
}

// ---------------------------------------------------------------------------
// SlotContentProvider
// ---------------------------------------------------------------------------

/// Deferred slot content: the consumer invokes it with runtime arguments and
/// gets the rendered nodes back.
///
/// All scoped children targeting the same slot name share one provider, in
/// sibling order.
#[derive(Debug, Clone)]
pub struct SlotContentProvider {
    /// Resolved slot name.
    pub slot: String,
    /// Document nodes whose subtrees render on invocation.
    pub sources: Vec<NodeKey>,
    /// Scope captured where the provider was produced. Invocation arguments
    /// are prepended to it.
    pub scope: Vec<Value>,
}

// ---------------------------------------------------------------------------
// OutputNode
// ---------------------------------------------------------------------------

/// One rendered node.
#[derive(Debug, Clone)]
pub struct OutputNode {
    /// Document node this output was derived from.
    pub source: NodeKey,
    /// Id copied from the document node.
    pub id: Option<String>,
    /// Resolved render target.
    pub target: RenderTarget,
    /// Evaluated properties.
    pub properties: Map<String, Value>,
    /// Assembled event hooks.
    pub hooks: Vec<EventHook>,
    /// Rendered children, in final order.
    pub children: Vec<OutputChild>,
    /// Deferred scoped slot content.
    pub slot_providers: Vec<SlotContentProvider>,
}

/// A child of an output node.
#[derive(Debug, Clone)]
pub enum OutputChild {
    /// Literal text content.
    Text(String),
    /// An inline (default-slot) child.
    Node(OutputNode),
    /// Children routed into a named slot of the parent implementation.
    NamedSlot { slot: String, nodes: Vec<OutputNode> },
}

impl OutputNode {
    /// An evaluated property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The hook for an event name, if one was assembled.
    pub fn hook(&self, event: &str) -> Option<&EventHook> {
        self.hooks.iter().find(|hook| hook.event == event)
    }

    /// Inline child nodes, skipping text and named-slot children.
    pub fn child_nodes(&self) -> impl Iterator<Item = &OutputNode> {
        self.children.iter().filter_map(|child| match child {
            OutputChild::Node(node) => Some(node),
            _ => None,
        })
    }

    /// Nodes routed into the given named slot.
    pub fn slot_nodes(&self, slot: &str) -> &[OutputNode] {
        self.children
            .iter()
            .find_map(|child| match child {
                OutputChild::NamedSlot { slot: name, nodes } if name == slot => Some(nodes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// The provider for a scoped slot name, if any.
    pub fn slot_provider(&self, slot: &str) -> Option<&SlotContentProvider> {
        self.slot_providers.iter().find(|provider| provider.slot == slot)
    }

    /// Concatenated text content of direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                OutputChild::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Depth-first search for the first inline descendant with the given id.
    pub fn find_by_id(&self, id: &str) -> Option<&OutputNode> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.child_nodes().find_map(|child| child.find_by_id(id))
    }
}
