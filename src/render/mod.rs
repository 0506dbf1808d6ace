//! Rendering: tag resolution, the tree-walking interpreter, output tree.

pub mod output;
pub mod renderer;
pub mod tags;

pub use output::{EventHook, OutputChild, OutputNode, SlotContentProvider};
pub use renderer::{PreprocessFn, Renderer};
pub use tags::{
    ComponentFactory, ModelDefaults, RenderTarget, TagRegistry, CONTAINER_TAG, OVERLAY_TAG,
};
