//! Geometry consumed by meshes and the sprite batch.
//!
//! Canonical CPU space:
//! - units are whatever the active perspective matrix expects
//! - polygons arrive already triangulated
//!
//! Math types come from `glam` and are re-exported for convenience.

mod path;
mod poly;
mod rect;

pub use glam::{Affine2, Mat4, Vec2, Vec3};
pub use path::Path2;
pub use poly::Poly2;
pub use rect::Rect;
