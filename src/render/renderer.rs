//! The tree-walking interpreter: document + binding snapshot -> output tree.
//!
//! A renderer borrows everything it reads and mutates nothing; every pass
//! derives a fresh [`OutputNode`] tree. Scope arguments are innermost-first:
//! a loop prepends the current element, a scoped slot invocation prepends
//! its call arguments, so `args[0]` is always the nearest enclosing value.

use serde_json::{Map, Value};
use tracing::warn;

use crate::binding::BindingStore;
use crate::expr::{classify, display, eval, EvalContext, ExprCache, Program, PropertySource};
use crate::schema::{Document, NodeData, NodeKey, Wrap};

use super::output::{EventHook, OutputChild, OutputNode, SlotContentProvider};
use super::tags::{RenderTarget, TagRegistry, CONTAINER_TAG, OVERLAY_TAG};

/// Mutates a cloned node before it renders. Hosts use this to attach
/// factories or inject defaults; the document itself is never touched.
pub type PreprocessFn = dyn Fn(&mut NodeData);

/// One render pass over a document.
pub struct Renderer<'a> {
    document: &'a Document,
    store: &'a BindingStore,
    tags: &'a TagRegistry,
    cache: &'a ExprCache,
    overlay: bool,
    preprocess: Option<&'a PreprocessFn>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        document: &'a Document,
        store: &'a BindingStore,
        tags: &'a TagRegistry,
        cache: &'a ExprCache,
    ) -> Self {
        Self {
            document,
            store,
            tags,
            cache,
            overlay: false,
            preprocess: None,
        }
    }

    /// Wrap every rendered subtree in an editor overlay node.
    pub fn with_overlay(mut self, overlay: bool) -> Self {
        self.overlay = overlay;
        self
    }

    /// Install a pre-render hook applied to each cloned node.
    pub fn with_preprocess(mut self, preprocess: &'a PreprocessFn) -> Self {
        self.preprocess = Some(preprocess);
        self
    }

    /// Render the whole document to a single output node.
    pub fn render(&self) -> OutputNode {
        let root = self.document.root();
        let mut outputs = self.render_node(root, &[]);
        if outputs.len() == 1 {
            return outputs.remove(0);
        }
        // A looping or hidden root still yields exactly one output.
        OutputNode {
            source: root,
            id: None,
            target: RenderTarget::Builtin(CONTAINER_TAG.into()),
            properties: Map::new(),
            hooks: Vec::new(),
            children: outputs.into_iter().map(OutputChild::Node).collect(),
            slot_providers: Vec::new(),
        }
    }

    /// Render one document node. Loops may yield several instances, hidden
    /// nodes and failed loop expressions yield none.
    pub fn render_node(&self, key: NodeKey, scope: &[Value]) -> Vec<OutputNode> {
        let Some(data) = self.document.get(key) else {
            return Vec::new();
        };
        let mut data = data.clone();
        if let Some(preprocess) = self.preprocess {
            preprocess(&mut data);
        }
        if data.hidden {
            return Vec::new();
        }

        let instances = match &data.loop_expression {
            Some(raw) => match self.eval_loop(raw, scope) {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        let mut inner = Vec::with_capacity(scope.len() + 1);
                        inner.push(item.clone());
                        inner.extend(scope.iter().cloned());
                        self.render_single(key, &data, &inner)
                    })
                    .collect(),
                other => {
                    warn!(
                        expression = %raw,
                        result = ?other,
                        "loop expression did not yield an array"
                    );
                    Vec::new()
                }
            },
            None => vec![self.render_single(key, &data, scope)],
        };

        let wrapped = match &data.wrap {
            Some(wrap) if !instances.is_empty() => vec![self.wrap_instances(key, wrap, instances)],
            _ => instances,
        };

        if self.overlay && key != self.document.root() {
            wrapped
                .into_iter()
                .map(|instance| self.overlay_instance(key, &data, instance))
                .collect()
        } else {
            wrapped
        }
    }

    /// Render deferred scoped slot content with invocation arguments.
    pub fn invoke_slot(&self, provider: &SlotContentProvider, call_args: &[Value]) -> Vec<OutputNode> {
        let mut scope = call_args.to_vec();
        scope.extend(provider.scope.iter().cloned());
        provider
            .sources
            .iter()
            .flat_map(|&source| self.render_node(source, &scope))
            .collect()
    }

    // ── One instance ─────────────────────────────────────────────────

    fn render_single(&self, key: NodeKey, data: &NodeData, scope: &[Value]) -> OutputNode {
        let target = self.tags.resolve(data);

        let mut properties = if data.eval_disabled {
            data.properties.clone()
        } else {
            data.properties
                .iter()
                .map(|(name, value)| (name.clone(), self.eval_property(value, scope)))
                .collect()
        };

        let mut hooks: Vec<EventHook> = Vec::new();
        if let Some(model) = &data.model {
            let defaults = self.tags.model_defaults(data.tag.as_deref());
            let property = model.property.clone().unwrap_or(defaults.property);
            let event = model.event.clone().unwrap_or(defaults.event);
            properties.insert(property, self.store.get(&model.path).unwrap_or(Value::Null));
            hooks.push(EventHook {
                event: event.clone(),
                source: key,
                model_path: Some(model.path.clone()),
                invocations: data.events.get(&event).cloned().unwrap_or_default(),
                scope_args: scope.to_vec(),
            });
        }
        for (event, invocations) in &data.events {
            if hooks.iter().any(|hook| &hook.event == event) {
                continue;
            }
            hooks.push(EventHook {
                event: event.clone(),
                source: key,
                model_path: None,
                invocations: invocations.clone(),
                scope_args: scope.to_vec(),
            });
        }

        let mut children = Vec::new();
        let mut named: Vec<(String, Vec<OutputNode>)> = Vec::new();
        let mut slot_providers: Vec<SlotContentProvider> = Vec::new();

        if let Some(text) = &data.text {
            children.push(OutputChild::Text(self.render_text(text, scope)));
        }

        for child_key in self.sorted_visible_children(key) {
            let Some(child) = self.document.get(child_key) else {
                continue;
            };
            match child.slot.resolved_slot() {
                None => {
                    children.extend(self.render_node(child_key, scope).into_iter().map(OutputChild::Node));
                }
                Some(slot) if child.slot.is_scoped() => {
                    // Same-named scoped children share one provider.
                    match slot_providers.iter_mut().find(|provider| provider.slot == slot) {
                        Some(provider) => provider.sources.push(child_key),
                        None => slot_providers.push(SlotContentProvider {
                            slot,
                            sources: vec![child_key],
                            scope: scope.to_vec(),
                        }),
                    }
                }
                Some(slot) => {
                    let nodes = self.render_node(child_key, scope);
                    match named.iter_mut().find(|(name, _)| name == &slot) {
                        Some((_, group)) => group.extend(nodes),
                        None => named.push((slot, nodes)),
                    }
                }
            }
        }
        for (slot, nodes) in named {
            children.push(OutputChild::NamedSlot { slot, nodes });
        }

        OutputNode {
            source: key,
            id: data.id.clone(),
            target,
            properties,
            hooks,
            children,
            slot_providers,
        }
    }

    // ── Wrapping ─────────────────────────────────────────────────────

    fn wrap_instances(&self, key: NodeKey, wrap: &Wrap, instances: Vec<OutputNode>) -> OutputNode {
        let mut properties = wrap.attributes.clone();
        if let Some(class) = &wrap.class {
            properties.insert("class".into(), Value::String(class.clone()));
        }
        OutputNode {
            source: key,
            id: None,
            target: RenderTarget::Builtin(wrap.tag.clone()),
            properties,
            hooks: Vec::new(),
            children: instances.into_iter().map(OutputChild::Node).collect(),
            slot_providers: Vec::new(),
        }
    }

    fn overlay_instance(&self, key: NodeKey, data: &NodeData, instance: OutputNode) -> OutputNode {
        let mut properties = Map::new();
        properties.insert(
            "node-id".into(),
            data.id.clone().map(Value::String).unwrap_or(Value::Null),
        );
        OutputNode {
            source: key,
            id: None,
            target: RenderTarget::Builtin(OVERLAY_TAG.into()),
            properties,
            hooks: Vec::new(),
            children: vec![OutputChild::Node(instance)],
            slot_providers: Vec::new(),
        }
    }

    // ── Children ordering ────────────────────────────────────────────

    /// Visible children sorted by priority. The sort is stable, so equal
    /// priorities keep document order.
    fn sorted_visible_children(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut children: Vec<NodeKey> = self
            .document
            .children(key)
            .iter()
            .copied()
            .filter(|&child| {
                self.document
                    .get(child)
                    .map(|data| !data.hidden)
                    .unwrap_or(false)
            })
            .collect();
        children.sort_by_key(|&child| {
            self.document.get(child).map(|data| data.priority).unwrap_or(0)
        });
        children
    }

    // ── Evaluation helpers ───────────────────────────────────────────

    fn eval_property(&self, value: &Value, scope: &[Value]) -> Value {
        let Value::String(raw) = value else {
            return value.clone();
        };
        match classify(raw) {
            PropertySource::Expression(source) => {
                self.eval_source(source, scope).unwrap_or(Value::Null)
            }
            PropertySource::Reference(path) => self.store.get(path).unwrap_or(Value::Null),
            PropertySource::Literal(text) => Value::String(text.to_owned()),
        }
    }

    fn render_text(&self, raw: &str, scope: &[Value]) -> String {
        match classify(raw) {
            PropertySource::Expression(source) => self
                .eval_source(source, scope)
                .map(|value| display(&value))
                .unwrap_or_default(),
            PropertySource::Reference(path) => self
                .store
                .get(path)
                .map(|value| display(&value))
                .unwrap_or_default(),
            PropertySource::Literal(text) => text.to_owned(),
        }
    }

    fn eval_loop(&self, raw: &str, scope: &[Value]) -> Option<Value> {
        match classify(raw) {
            PropertySource::Expression(source) => self.eval_source(source, scope),
            PropertySource::Reference(path) => self.store.get(path),
            // A bare loop expression is still expression source.
            PropertySource::Literal(source) => self.eval_source(source, scope),
        }
    }

    /// Compile and evaluate expression source. Failures and assignment
    /// forms degrade to `None` with a log line; rendering never mutates.
    fn eval_source(&self, source: &str, scope: &[Value]) -> Option<Value> {
        let program = match self.cache.compile(source) {
            Ok(program) => program,
            Err(error) => {
                warn!(%source, %error, "expression failed to parse");
                return None;
            }
        };
        match &*program {
            Program::Value(expr) => {
                let context = EvalContext::new(self.store).with_scope(scope.to_vec());
                match eval(expr, &context) {
                    Ok(value) => Some(value),
                    Err(error) => {
                        warn!(%source, %error, "expression failed to evaluate");
                        None
                    }
                }
            }
            Program::Assign { .. } => {
                warn!(%source, "assignment is not allowed while rendering");
                None
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        ActionInvocation, BindingDeclaration, BindingKind, Descriptor, ModelBinding, SlotRouting,
        ROOT_TAG,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        document: Document,
        store: BindingStore,
        tags: TagRegistry,
        cache: ExprCache,
    }

    impl Fixture {
        fn new(root: Descriptor) -> Self {
            Self {
                document: Document::load(&root),
                store: BindingStore::new(vec![
                    BindingDeclaration::new("count", BindingKind::Number, "3"),
                    BindingDeclaration::new("title", BindingKind::String, "hello"),
                    BindingDeclaration::new(
                        "items",
                        BindingKind::Array,
                        json!([{ "label": "a" }, { "label": "b" }]),
                    ),
                ]),
                tags: TagRegistry::with_defaults(),
                cache: ExprCache::new(),
            }
        }

        fn renderer(&self) -> Renderer<'_> {
            Renderer::new(&self.document, &self.store, &self.tags, &self.cache)
        }

        fn render(&self) -> OutputNode {
            self.renderer().render()
        }
    }

    fn root(children: Vec<Descriptor>) -> Descriptor {
        Descriptor::new(ROOT_TAG).with_id("root").with_children(children)
    }

    // ── Targets ──────────────────────────────────────────────────────

    #[test]
    fn root_sentinel_renders_as_container() {
        let fixture = Fixture::new(root(vec![]));
        let output = fixture.render();
        assert_eq!(output.target.name(), CONTAINER_TAG);
        assert!(output.children.is_empty());
    }

    #[test]
    fn unknown_tags_pass_through() {
        let fixture = Fixture::new(root(vec![Descriptor::new("custom-chart")]));
        let output = fixture.render();
        assert_eq!(output.child_nodes().next().unwrap().target.name(), "custom-chart");
    }

    // ── Properties ───────────────────────────────────────────────────

    #[test]
    fn properties_evaluate_by_sigil() {
        let fixture = Fixture::new(root(vec![Descriptor::new("label")
            .with_id("l")
            .with_property("plain", "just text")
            .with_property("bound", "$title")
            .with_property("computed", "$(count * 2)")
            .with_property("structured", json!([1, 2]))]));
        let output = fixture.render();
        let label = output.find_by_id("l").unwrap();
        assert_eq!(label.property("plain"), Some(&json!("just text")));
        assert_eq!(label.property("bound"), Some(&json!("hello")));
        assert_eq!(label.property("computed"), Some(&json!(6)));
        assert_eq!(label.property("structured"), Some(&json!([1, 2])));
    }

    #[test]
    fn failed_expression_becomes_null() {
        let fixture = Fixture::new(root(vec![Descriptor::new("label")
            .with_id("l")
            .with_property("bad", "$(1 +)")]));
        let label = fixture.render();
        let label = label.find_by_id("l").unwrap();
        assert_eq!(label.property("bad"), Some(&Value::Null));
    }

    #[test]
    fn eval_disabled_keeps_raw_strings() {
        let fixture = Fixture::new(root(vec![{
            let mut descriptor = Descriptor::new("code").with_id("c").with_property("src", "$(count)");
            descriptor.eval_disabled = true;
            descriptor
        }]));
        let output = fixture.render();
        let code = output.find_by_id("c").unwrap();
        assert_eq!(code.property("src"), Some(&json!("$(count)")));
    }

    #[test]
    fn assignment_in_property_position_is_refused() {
        let fixture = Fixture::new(root(vec![Descriptor::new("label")
            .with_id("l")
            .with_property("sneaky", "$(count = 99)")]));
        let output = fixture.render();
        assert_eq!(output.find_by_id("l").unwrap().property("sneaky"), Some(&Value::Null));
        assert_eq!(fixture.store.get("count"), Some(json!(3)));
    }

    // ── Text ─────────────────────────────────────────────────────────

    #[test]
    fn text_children_interpolate() {
        let fixture = Fixture::new(root(vec![
            Descriptor::new("label").with_id("a").with_text("static"),
            Descriptor::new("label").with_id("b").with_text("$(title + '!')"),
        ]));
        let output = fixture.render();
        assert_eq!(output.find_by_id("a").unwrap().text(), "static");
        assert_eq!(output.find_by_id("b").unwrap().text(), "hello!");
    }

    // ── Visibility and ordering ──────────────────────────────────────

    #[test]
    fn hidden_nodes_are_dropped() {
        let fixture = Fixture::new(root(vec![
            Descriptor::new("label").with_id("shown"),
            Descriptor::new("label").with_id("gone").hidden(true),
        ]));
        let output = fixture.render();
        assert!(output.find_by_id("shown").is_some());
        assert!(output.find_by_id("gone").is_none());
    }

    #[test]
    fn priority_sorts_siblings_stably() {
        let fixture = Fixture::new(root(vec![
            Descriptor::new("label").with_id("late").with_priority(10),
            Descriptor::new("label").with_id("first"),
            Descriptor::new("label").with_id("second"),
        ]));
        let output = fixture.render();
        let ids: Vec<_> = output
            .child_nodes()
            .map(|node| node.id.clone().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["first", "second", "late"]);
    }

    // ── Loops ────────────────────────────────────────────────────────

    #[test]
    fn loop_renders_one_instance_per_element() {
        let fixture = Fixture::new(root(vec![Descriptor::new("row")
            .with_loop("$items")
            .with_property("label", "$(args[0].label)")]));
        let output = fixture.render();
        let labels: Vec<_> = output
            .child_nodes()
            .map(|node| node.property("label").cloned().unwrap())
            .collect();
        assert_eq!(labels, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn loop_over_non_array_renders_nothing() {
        let fixture = Fixture::new(root(vec![Descriptor::new("row").with_loop("$count")]));
        let output = fixture.render();
        assert_eq!(output.child_nodes().count(), 0);
    }

    #[test]
    fn nested_loop_scopes_stack_innermost_first() {
        let inner = Descriptor::new("cell")
            .with_loop("$(args[0].cols)")
            .with_property("cell", "$(args[1].row + ':' + args[0])");
        let mut fixture = Fixture::new(root(vec![Descriptor::new("line")
            .with_loop("$(rows)")
            .with_children(vec![inner])]));
        fixture.store.set_value(
            "rows",
            json!([{ "row": "r1", "cols": ["c1", "c2"] }]),
            false,
        );
        let output = fixture.render();
        let line = output.child_nodes().next().unwrap();
        let cells: Vec<_> = line
            .child_nodes()
            .map(|node| node.property("cell").cloned().unwrap())
            .collect();
        assert_eq!(cells, vec![json!("r1:c1"), json!("r1:c2")]);
    }

    // ── Wrap ─────────────────────────────────────────────────────────

    #[test]
    fn wrap_encloses_all_loop_instances_once() {
        let fixture = Fixture::new(root(vec![{
            let mut descriptor = Descriptor::new("row").with_loop("$items");
            descriptor.wrap = Some({
                let mut wrap = Wrap::new("list");
                wrap.class = Some("rows".into());
                wrap
            });
            descriptor
        }]));
        let output = fixture.render();
        let wrapper = output.child_nodes().next().unwrap();
        assert_eq!(wrapper.target.name(), "list");
        assert_eq!(wrapper.property("class"), Some(&json!("rows")));
        assert_eq!(wrapper.child_nodes().count(), 2);
    }

    // ── Model bindings ───────────────────────────────────────────────

    #[test]
    fn model_injects_value_and_hook() {
        let fixture = Fixture::new(root(vec![Descriptor::new("text-field")
            .with_id("f")
            .with_model(ModelBinding::new("title"))]));
        let output = fixture.render();
        let field = output.find_by_id("f").unwrap();
        assert_eq!(field.property("value"), Some(&json!("hello")));
        let hook = field.hook("input").unwrap();
        assert_eq!(hook.model_path.as_deref(), Some("title"));
        assert!(hook.invocations.is_empty());
    }

    #[test]
    fn checkbox_model_uses_overridden_pair() {
        let mut fixture = Fixture::new(root(vec![Descriptor::new("checkbox")
            .with_id("c")
            .with_model(ModelBinding::new("agreed"))]));
        fixture.store.set_value("agreed", json!(true), false);
        let output = fixture.render();
        let checkbox = output.find_by_id("c").unwrap();
        assert_eq!(checkbox.property("checked"), Some(&json!(true)));
        assert!(checkbox.hook("change").is_some());
        assert!(checkbox.hook("input").is_none());
    }

    #[test]
    fn model_hook_keeps_declared_invocations() {
        let fixture = Fixture::new(root(vec![Descriptor::new("text-field")
            .with_id("f")
            .with_model(ModelBinding::new("title"))
            .with_event("input", ActionInvocation::new("eval_expression"))]));
        let output = fixture.render();
        let hook = output.find_by_id("f").unwrap().hook("input").unwrap();
        assert_eq!(hook.model_path.as_deref(), Some("title"));
        assert_eq!(hook.invocations.len(), 1);
    }

    // ── Slots ────────────────────────────────────────────────────────

    #[test]
    fn named_slot_children_are_grouped() {
        let fixture = Fixture::new(root(vec![Descriptor::new("card").with_id("card").with_children(vec![
            Descriptor::new("label").with_id("inline"),
            Descriptor::new("label")
                .with_id("head")
                .with_slot(SlotRouting::Named { slot: "header".into() }),
        ])]));
        let output = fixture.render();
        let card = output.find_by_id("card").unwrap();
        assert_eq!(card.child_nodes().count(), 1);
        let header = card.slot_nodes("header");
        assert_eq!(header.len(), 1);
        assert_eq!(header[0].id.as_deref(), Some("head"));
    }

    #[test]
    fn scoped_slot_defers_and_renders_on_invoke() {
        let fixture = Fixture::new(root(vec![Descriptor::new("table").with_id("t").with_children(vec![
            Descriptor::new("cell")
                .with_property("text", "$(args[0].label)")
                .with_slot(SlotRouting::Scoped {
                    slot: "item.<name>".into(),
                    arg_name: Some("label".into()),
                }),
        ])]));
        let output = fixture.render();
        let table = output.find_by_id("t").unwrap();
        // Nothing rendered inline; the provider is deferred.
        assert_eq!(table.child_nodes().count(), 0);
        let provider = table.slot_provider("item.label").unwrap();
        let rendered = fixture.renderer().invoke_slot(provider, &[json!({ "label": "row 1" })]);
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].property("text"), Some(&json!("row 1")));
    }

    // ── Overlay mode ─────────────────────────────────────────────────

    #[test]
    fn overlay_wraps_each_subtree_with_node_id() {
        let fixture = Fixture::new(root(vec![Descriptor::new("label").with_id("l")]));
        let output = fixture.renderer().with_overlay(true).render();
        assert_eq!(output.target.name(), CONTAINER_TAG);
        let overlay = output.child_nodes().next().unwrap();
        assert_eq!(overlay.target.name(), OVERLAY_TAG);
        assert_eq!(overlay.property("node-id"), Some(&json!("l")));
        assert_eq!(overlay.child_nodes().next().unwrap().id.as_deref(), Some("l"));
    }

    // ── Preprocess hook ──────────────────────────────────────────────

    #[test]
    fn preprocess_sees_a_clone() {
        let fixture = Fixture::new(root(vec![Descriptor::new("label").with_id("l")]));
        let hide_labels = |data: &mut NodeData| {
            if data.tag.as_deref() == Some("label") {
                data.hidden = true;
            }
        };
        let output = fixture.renderer().with_preprocess(&hide_labels).render();
        assert!(output.find_by_id("l").is_none());
        // The document itself is untouched.
        let untouched = fixture.render();
        assert!(untouched.find_by_id("l").is_some());
    }
}
