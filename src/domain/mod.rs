//! Domain types and rules that do not touch storage.

pub mod assets;
pub mod error;
pub mod notes;
pub mod slug;

pub use assets::{AssetDescriptor, AssetRef, ContentHash, FileType, FileTypePolicy};
pub use error::DomainError;
pub use notes::NoteId;
