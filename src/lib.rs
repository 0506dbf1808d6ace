//! # trellis
//!
//! A declarative UI schema interpreter and structural tree editor.
//!
//! Documents are trees of data-only [`schema::Descriptor`]s: tags,
//! properties, event-action lists, loops, slots and two-way model bindings,
//! all serializable JSON. A [`root::RenderRoot`] interprets a document
//! against typed [`binding`] values and produces a fresh
//! [`render::OutputNode`] tree per pass; hosts map output nodes onto
//! whatever widget system they drive. The companion [`editor::TreeEditor`]
//! restructures documents the way a visual builder does: moves, paste with
//! id regeneration, clipboard and file transfer.
//!
//! ## Core Systems
//!
//! - **[`schema`]** - Serialized descriptors, binding declarations, and the
//!   slotmap-backed live document
//! - **[`binding`]** - Typed binding store: defaults, overrides, dot-path
//!   writes, change notification
//! - **[`expr`]** - Sandboxed expression language: logos tokenizer, recursive
//!   descent parser, evaluator with allow-listed functions
//! - **[`action`]** - Event actions: handler trait, registry, built-ins
//! - **[`render`]** - Tag resolution and the tree-walking interpreter
//! - **[`editor`]** - Structural editing, clipboard, file transfer
//! - **[`root`]** - The render root tying everything together

// Document model
pub mod schema;

// Values and evaluation
pub mod binding;
pub mod expr;

// Behavior
pub mod action;

// Interpretation
pub mod render;

// Editing
pub mod editor;

// Root
pub mod root;

pub use root::RenderRoot;
