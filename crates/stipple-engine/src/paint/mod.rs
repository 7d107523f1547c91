//! Paint state carried into draw contexts.
//!
//! Scope:
//! - color representation and RGBA8 packing
//! - gradient and scissor descriptors serialized into the context uniform block

pub mod color;
pub mod gradient;
pub mod scissor;

pub use color::Color4;
pub use gradient::Gradient;
pub use scissor::Scissor;
