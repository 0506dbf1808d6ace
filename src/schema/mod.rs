//! Document model: serialized descriptors, binding declarations, and the
//! arena-backed live document.

pub mod declaration;
pub mod descriptor;
pub mod document;

pub use declaration::{BindingDeclaration, BindingKind};
pub use descriptor::{ActionInvocation, Children, Descriptor, ModelBinding, SlotRouting, Wrap};
pub use document::{Document, NodeData, NodeKey, ROOT_TAG};
