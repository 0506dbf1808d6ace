//! Binding values: path access, typed defaults, overrides, notification.

pub mod path;
pub mod store;

pub use store::{BindingStore, StoreObserver, ValueProvider};
