//! Common types and utilities shared by the container, model and
//! comparison layers.

pub mod cancel;
pub mod color;
pub mod container;

pub use cancel::CancellationToken;
pub use color::Color;
pub use container::{ContainerKind, detect_container};
