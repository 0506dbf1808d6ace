//! Serialized document model: Descriptor, Children, SlotRouting, ModelBinding, Wrap.
//!
//! A [`Descriptor`] is the data-only, tree-shaped form of a component node:
//! what gets written to JSON files and the clipboard. The live, arena-backed
//! form lives in [`crate::schema::document`]. Parent links never appear here;
//! serialization is cycle-free by construction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ActionInvocation
// ---------------------------------------------------------------------------

/// A declarative "on this event, run action kind X with these details".
///
/// The event name is the key of the [`Descriptor::events`] map entry the
/// invocation lives under. `details` is opaque here; each registered action
/// handler interprets its own payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    /// Registry key of the action handler (e.g. `"change_binding"`).
    pub kind: String,
    /// Kind-specific payload.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl ActionInvocation {
    /// Create an invocation with an empty details payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            details: Map::new(),
        }
    }

    /// Add a details entry (builder).
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// SlotRouting
// ---------------------------------------------------------------------------

/// Where a child renders inside its parent's implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotRouting {
    /// Rendered inline among the parent's default children.
    #[default]
    Default,
    /// Routed into a named slot of the parent implementation.
    Named {
        /// Target slot name.
        slot: String,
    },
    /// Routed into a named slot that the parent invokes with runtime
    /// arguments (a slot-content-provider).
    Scoped {
        /// Target slot name. May contain the `<name>` placeholder.
        slot: String,
        /// Substituted for `<name>` in the slot name, if present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arg_name: Option<String>,
    },
}

impl SlotRouting {
    /// Whether this is the default routing (used to keep serialization minimal).
    pub fn is_default(&self) -> bool {
        matches!(self, SlotRouting::Default)
    }

    /// The slot name after `<name>` substitution, or `None` for default routing.
    pub fn resolved_slot(&self) -> Option<String> {
        match self {
            SlotRouting::Default => None,
            SlotRouting::Named { slot } => Some(slot.clone()),
            SlotRouting::Scoped { slot, arg_name } => Some(match arg_name {
                Some(name) => slot.replace("<name>", name),
                None => slot.clone(),
            }),
        }
    }

    /// Whether this routing produces a slot-content-provider.
    pub fn is_scoped(&self) -> bool {
        matches!(self, SlotRouting::Scoped { .. })
    }
}

// ---------------------------------------------------------------------------
// ModelBinding
// ---------------------------------------------------------------------------

/// Two-way binding declaration: keeps a binding path and a component
/// property/event pair in sync.
///
/// The property receives the binding's current value on render; the event
/// writes user input back through the store. Empty overrides fall back to the
/// per-tag defaults in the tag registry (`"value"` / `"input"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBinding {
    /// Dot-separated binding path the component value is bound to.
    pub path: String,
    /// Override for the value-like property name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Override for the update event name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl ModelBinding {
    /// Bind to a path with default property/event names.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            property: None,
            event: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Wrap
// ---------------------------------------------------------------------------

/// Optional enclosing node applied around a descriptor's rendered output,
/// including all loop-expanded instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrap {
    /// Tag of the wrapping node.
    pub tag: String,
    /// Static class applied to the wrapper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Extra attributes on the wrapper.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl Wrap {
    /// Wrap in the given tag with no class or attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: None,
            attributes: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

/// A descriptor's children: either a literal text payload or a list of
/// child descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Children {
    /// Literal string content.
    Text(String),
    /// Ordered child nodes.
    Nodes(Vec<Descriptor>),
}

impl Default for Children {
    fn default() -> Self {
        Children::Nodes(Vec::new())
    }
}

impl Children {
    /// Whether there is nothing to render (used to keep serialization minimal).
    pub fn is_empty(&self) -> bool {
        match self {
            Children::Text(text) => text.is_empty(),
            Children::Nodes(nodes) => nodes.is_empty(),
        }
    }

    /// Child descriptors, or an empty slice for text children.
    pub fn nodes(&self) -> &[Descriptor] {
        match self {
            Children::Text(_) => &[],
            Children::Nodes(nodes) => nodes.as_slice(),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

fn is_false(flag: &bool) -> bool {
    !*flag
}

fn is_zero(priority: &i64) -> bool {
    *priority == 0
}

/// A data-only node describing what to render.
///
/// Every field except `tag` is optional in the serialized form; defaults are
/// skipped on output so saved documents stay small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Descriptor {
    /// Node id, unique among siblings. Regenerated on paste.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Names the renderable type. Missing tags render as the structural
    /// container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Property name -> literal or sigil-prefixed expression string.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    /// Event name -> ordered action invocations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, Vec<ActionInvocation>>,
    /// Child nodes or literal text.
    #[serde(default, skip_serializing_if = "Children::is_empty")]
    pub children: Children,
    /// Slot routing inside the parent implementation.
    #[serde(default, skip_serializing_if = "SlotRouting::is_default")]
    pub slot: SlotRouting,
    /// Loop expression; must evaluate to an array. One subtree is rendered
    /// per element, with the element prepended to the scope arguments.
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub loop_expression: Option<String>,
    /// Two-way model binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelBinding>,
    /// Hidden nodes are dropped before slot distribution.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// Render-order sort key among siblings. Stable on ties.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i64,
    /// Optional enclosing node around the rendered output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<Wrap>,
    /// Opt out of expression evaluation entirely (raw passthrough).
    #[serde(default, skip_serializing_if = "is_false")]
    pub eval_disabled: bool,
}

impl Descriptor {
    /// Create a descriptor with the given tag and no other content.
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

    /// Set a property (builder).
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Append an action invocation under an event name (builder).
    pub fn with_event(mut self, event: impl Into<String>, invocation: ActionInvocation) -> Self {
        self.events.entry(event.into()).or_default().push(invocation);
        self
    }

    /// Set the children to a list of nodes (builder).
    pub fn with_children(mut self, children: Vec<Descriptor>) -> Self {
        self.children = Children::Nodes(children);
        self
    }

    /// Set the children to literal text (builder).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children = Children::Text(text.into());
        self
    }

    /// Set the slot routing (builder).
    pub fn with_slot(mut self, slot: SlotRouting) -> Self {
        self.slot = slot;
        self
    }

    /// Set the model binding (builder).
    pub fn with_model(mut self, model: ModelBinding) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the loop expression (builder).
    pub fn with_loop(mut self, expression: impl Into<String>) -> Self {
        self.loop_expression = Some(expression.into());
        self
    }

    /// Set the priority (builder).
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Mark hidden (builder).
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── Serialization shape ──────────────────────────────────────────

    #[test]
    fn minimal_descriptor_serializes_small() {
        let desc = Descriptor::new("Button");
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value, json!({ "tag": "Button" }));
    }

    #[test]
    fn defaults_are_skipped() {
        let desc = Descriptor::new("Card").with_id("card_1");
        let text = serde_json::to_string(&desc).unwrap();
        assert!(!text.contains("hidden"));
        assert!(!text.contains("priority"));
        assert!(!text.contains("children"));
        assert!(!text.contains("slot"));
    }

    #[test]
    fn round_trip_full_descriptor() {
        let desc = Descriptor::new("TextField")
            .with_id("field_1")
            .with_property("label", "Name")
            .with_property("width", "$(2 + 3)")
            .with_event(
                "click",
                ActionInvocation::new("change_binding")
                    .with_detail("binding", "clicked")
                    .with_detail("type", "boolean")
                    .with_detail("value", "true"),
            )
            .with_model(ModelBinding::new("form.name"))
            .with_priority(5)
            .with_slot(SlotRouting::Named {
                slot: "header".into(),
            });

        let text = serde_json::to_string(&desc).unwrap();
        let back: Descriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn loop_field_serializes_as_for() {
        let desc = Descriptor::new("Row").with_loop("$items");
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value["for"], json!("$items"));
    }

    // ── Children ─────────────────────────────────────────────────────

    #[test]
    fn text_children_round_trip() {
        let desc = Descriptor::new("Label").with_text("hello");
        let text = serde_json::to_string(&desc).unwrap();
        let back: Descriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(back.children, Children::Text("hello".into()));
    }

    #[test]
    fn node_children_round_trip() {
        let desc = Descriptor::new("Card")
            .with_children(vec![Descriptor::new("Button"), Descriptor::new("Label")]);
        let text = serde_json::to_string(&desc).unwrap();
        let back: Descriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(back.children.nodes().len(), 2);
    }

    #[test]
    fn children_is_empty() {
        assert!(Children::default().is_empty());
        assert!(Children::Text(String::new()).is_empty());
        assert!(!Children::Text("x".into()).is_empty());
        assert!(!Children::Nodes(vec![Descriptor::default()]).is_empty());
    }

    // ── SlotRouting ──────────────────────────────────────────────────

    #[test]
    fn slot_routing_default() {
        assert!(SlotRouting::default().is_default());
        assert_eq!(SlotRouting::Default.resolved_slot(), None);
    }

    #[test]
    fn slot_routing_named() {
        let routing = SlotRouting::Named {
            slot: "header".into(),
        };
        assert_eq!(routing.resolved_slot(), Some("header".into()));
        assert!(!routing.is_scoped());
    }

    #[test]
    fn slot_routing_scoped_name_substitution() {
        let routing = SlotRouting::Scoped {
            slot: "item.<name>".into(),
            arg_name: Some("title".into()),
        };
        assert_eq!(routing.resolved_slot(), Some("item.title".into()));
        assert!(routing.is_scoped());
    }

    #[test]
    fn slot_routing_scoped_without_arg_name() {
        let routing = SlotRouting::Scoped {
            slot: "row".into(),
            arg_name: None,
        };
        assert_eq!(routing.resolved_slot(), Some("row".into()));
    }

    #[test]
    fn slot_routing_serde_tagged() {
        let routing = SlotRouting::Scoped {
            slot: "row".into(),
            arg_name: None,
        };
        let value = serde_json::to_value(&routing).unwrap();
        assert_eq!(value, json!({ "kind": "scoped", "slot": "row" }));
    }

    // ── Invocations ──────────────────────────────────────────────────

    #[test]
    fn invocation_builder() {
        let invocation = ActionInvocation::new("change_binding")
            .with_detail("binding", "count")
            .with_detail("recursive", true);
        assert_eq!(invocation.kind, "change_binding");
        assert_eq!(invocation.details["binding"], json!("count"));
        assert_eq!(invocation.details["recursive"], json!(true));
    }

    #[test]
    fn event_order_is_preserved() {
        let desc = Descriptor::new("Button")
            .with_event("click", ActionInvocation::new("first"))
            .with_event("click", ActionInvocation::new("second"));
        let invocations = &desc.events["click"];
        assert_eq!(invocations[0].kind, "first");
        assert_eq!(invocations[1].kind, "second");
    }
}
