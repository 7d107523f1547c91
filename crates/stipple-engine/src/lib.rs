//! Stipple engine crate.
//!
//! A batched 2D sprite renderer: meshes and vertex layouts, GLSL shader
//! introspection, a context-recording [`render::SpriteBatch`] and a two-half
//! stencil compositor, with a wgpu backend and window/device plumbing.

pub mod coords;
pub mod device;
pub mod logging;
pub mod mesh;
pub mod paint;
pub mod render;
pub mod shader;
