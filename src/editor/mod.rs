//! Tree editor: structural operations, clipboard transport, file transfer.

pub mod clipboard;
pub mod ops;
pub mod transfer;

pub use clipboard::Clipboard;
pub use ops::{EditError, TreeEditor};
pub use transfer::{load_from_file, save_to_file, TransferError};
