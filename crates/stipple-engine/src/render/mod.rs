//! Batched sprite rendering.
//!
//! `SpriteBatch` accumulates geometry into vertex/index arenas and records
//! state changes as contexts; a [`DrawBackend`] replays them.
//!
//! Convention:
//! - geometry is in whatever space the perspective matrix maps to clip space
//! - vertex colors are straight alpha, packed RGBA8

mod backend;
mod batch;
mod blend;
mod context;
mod stencil;
mod target;
mod text;
mod texture;
mod wgpu_backend;

pub use backend::{DrawBackend, DrawCall, RecordedCall, RecordedDraw, RecordingBackend};
pub use batch::{BatchConfig, BatchState, SpriteBatch, SpriteMesh, PERSPECTIVE_UNIFORM, TEXTURE_SAMPLER};
pub use blend::{Blend, BlendEquation, BlendFactor, BlendMode};
pub use context::{
    context_buffer, Context, DepthState, Recorded, CONTEXT_BLOCK, CONTEXT_BLOCK_SIZE,
    CONTEXT_LAYOUT, DRAW_BLUR, DRAW_GRADIENT, DRAW_SCISSOR, DRAW_TEXTURE,
};
pub use stencil::{
    StencilCompare, StencilEffect, StencilMode, StencilOp, StencilPassOp, StencilRead,
    StencilRule, StencilState, StencilTest, StencilWrite, BOTH_HALVES, LOWER_HALF, UPPER_HALF,
};
pub use target::RenderTarget;
pub use text::{GlyphQuad, GlyphRun};
pub use texture::{Texture, TextureId};
pub use wgpu_backend::WgpuBackend;

use crate::shader::Shader;

pub const SPRITE_VERTEX_SHADER: &str = include_str!("shaders/sprite.vert");
pub const SPRITE_FRAGMENT_SHADER: &str = include_str!("shaders/sprite.frag");

/// Uncompiled instance of the built-in sprite shader.
pub fn sprite_shader() -> Shader {
    Shader::new(SPRITE_VERTEX_SHADER, SPRITE_FRAGMENT_SHADER)
}
