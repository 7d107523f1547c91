use std::ops::Range;

use glam::{Affine2, Mat4, Vec2};

use super::{Blend, StencilEffect, Texture};
use crate::mesh::DrawCommand;
use crate::paint::{Color4, Gradient, Scissor};
use crate::shader::UniformBuffer;

// ── context block layout ──────────────────────────────────────────────────

/// Name of the per-context uniform block in the sprite shader.
pub const CONTEXT_BLOCK: &str = "uContext";
/// std140 size of the context block.
pub const CONTEXT_BLOCK_SIZE: usize = 176;

/// Member offsets of the context block.
pub const CONTEXT_LAYOUT: [(&str, usize); 12] = [
    ("scMatrix", 0),
    ("scExtent", 48),
    ("scFringe", 56),
    ("gdMatrix", 64),
    ("gdInner", 112),
    ("gdOuter", 128),
    ("gdExtent", 144),
    ("gdRadius", 152),
    ("gdFeathr", 156),
    ("blurStep", 160),
    ("ctDepth", 168),
    ("drawType", 172),
];

pub const DRAW_TEXTURE: i32 = 1;
pub const DRAW_GRADIENT: i32 = 2;
pub const DRAW_SCISSOR: i32 = 4;
pub const DRAW_BLUR: i32 = 8;

/// Uniform buffer with `capacity` context blocks and named offsets registered.
pub fn context_buffer(capacity: usize) -> UniformBuffer {
    let mut buffer = UniformBuffer::new(capacity, CONTEXT_BLOCK_SIZE);
    for (name, offset) in CONTEXT_LAYOUT {
        buffer.set_offset(name, offset);
    }
    buffer
}

// ── context ───────────────────────────────────────────────────────────────

/// Depth configuration for a draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
}

/// Snapshot of every draw parameter that is not stored per vertex.
///
/// Color is deliberately absent: it is baked into vertices at append time.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub perspective: Mat4,
    pub texture: Option<Texture>,
    pub gradient: Option<Gradient>,
    pub scissor: Option<Scissor>,
    pub blend: Blend,
    pub depth: f32,
    pub depth_state: DepthState,
    pub blur: f32,
    pub stencil: StencilEffect,
    pub command: DrawCommand,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            perspective: Mat4::IDENTITY,
            texture: None,
            gradient: None,
            scissor: None,
            blend: Blend::default(),
            depth: 0.0,
            depth_state: DepthState::default(),
            blur: 0.0,
            stencil: StencilEffect::None,
            command: DrawCommand::Triangles,
        }
    }
}

impl Context {
    /// Draw-type flags the fragment shader switches on.
    pub fn draw_type(&self) -> i32 {
        let mut flags = 0;
        if self.texture.is_some() {
            flags |= DRAW_TEXTURE;
            if self.blur > 0.0 {
                flags |= DRAW_BLUR;
            }
        }
        if self.gradient.is_some() {
            flags |= DRAW_GRADIENT;
        }
        if self.scissor.is_some() {
            flags |= DRAW_SCISSOR;
        }
        flags
    }

    /// Offset between blur taps in uv units.
    pub fn blur_step(&self) -> Vec2 {
        match self.texture {
            Some(t) if self.blur > 0.0 => t.texel() * self.blur,
            _ => Vec2::ZERO,
        }
    }

    /// Serialises this context into block `block` of `buffer`.
    pub fn write_block(&self, buffer: &mut UniformBuffer, block: usize) {
        match self.scissor {
            Some(s) => {
                buffer.write(block, "scMatrix", &s.matrix());
                buffer.write(block, "scExtent", &s.extent());
                buffer.write(block, "scFringe", &s.fringe_scale());
            }
            None => {
                buffer.write(block, "scMatrix", &Affine2::IDENTITY);
                buffer.write(block, "scExtent", &Vec2::ONE);
                buffer.write(block, "scFringe", &Vec2::ONE);
            }
        }

        match self.gradient {
            Some(g) => {
                buffer.write(block, "gdMatrix", &g.matrix());
                buffer.write(block, "gdInner", &g.inner);
                buffer.write(block, "gdOuter", &g.outer);
                buffer.write(block, "gdExtent", &g.extent);
                buffer.write(block, "gdRadius", &g.radius);
                buffer.write(block, "gdFeathr", &g.feather);
            }
            None => {
                buffer.write(block, "gdMatrix", &Affine2::IDENTITY);
                buffer.write(block, "gdInner", &Color4::WHITE);
                buffer.write(block, "gdOuter", &Color4::WHITE);
                buffer.write(block, "gdExtent", &Vec2::ZERO);
                buffer.write(block, "gdRadius", &0.0f32);
                buffer.write(block, "gdFeathr", &1.0f32);
            }
        }

        buffer.write(block, "blurStep", &self.blur_step());
        buffer.write(block, "ctDepth", &self.depth);
        buffer.write(block, "drawType", &self.draw_type());
    }
}

/// A closed context and the arena ranges drawn with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub context: Context,
    pub vertices: Range<usize>,
    pub indices: Range<usize>,
    /// Uniform block holding the serialised context.
    pub block: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rect;
    use crate::render::TextureId;

    #[test]
    fn draw_type_flags() {
        let mut ctx = Context::default();
        assert_eq!(ctx.draw_type(), 0);
        ctx.blur = 2.0;
        assert_eq!(ctx.draw_type(), 0, "blur without a texture is ignored");
        ctx.texture = Some(Texture::new(TextureId(1), 64, 32));
        ctx.scissor = Some(Scissor::new(Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(ctx.draw_type(), DRAW_TEXTURE | DRAW_BLUR | DRAW_SCISSOR);
        assert_eq!(ctx.blur_step(), Vec2::new(2.0 / 64.0, 2.0 / 32.0));
    }

    #[test]
    fn write_block_fills_named_members() {
        let mut buffer = context_buffer(2);
        let ctx = Context {
            depth: 0.25,
            gradient: Some(Gradient::radial(Vec2::ZERO, 1.0, 3.0, Color4::WHITE, Color4::BLACK)),
            ..Context::default()
        };
        ctx.write_block(&mut buffer, 1);
        assert_eq!(buffer.read::<f32>(1, "ctDepth"), Some(0.25));
        assert_eq!(buffer.read::<i32>(1, "drawType"), Some(DRAW_GRADIENT));
        assert_eq!(buffer.read::<Color4>(1, "gdOuter"), Some(Color4::BLACK));
        assert_eq!(buffer.read::<f32>(0, "ctDepth"), Some(0.0));
    }
}
