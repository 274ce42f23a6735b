//! Application services layer.

pub mod error;
pub mod notes;
pub mod render;
