//! The seam between the batch and a GPU API.

use std::ops::Range;

use super::{Blend, DepthState, StencilState, TextureId};
use crate::mesh::{DrawCommand, SpriteVertex2};
use crate::shader::{Shader, ShaderId, UniformBuffer};

/// Everything a backend needs to issue one indexed draw.
#[derive(Debug)]
pub struct DrawCall<'a> {
    pub shader: &'a Shader,
    pub command: DrawCommand,
    pub texture: Option<TextureId>,
    pub blend: Blend,
    /// A `Native` stencil mode leaves the backend's stencil state alone.
    pub stencil: StencilState,
    pub depth: DepthState,
    pub uniforms: &'a UniformBuffer,
    /// Block of `uniforms` this draw reads.
    pub uniform_block: usize,
    pub indices: Range<u32>,
}

/// GPU backend driven by [`SpriteBatch`](super::SpriteBatch).
///
/// Per flush the batch calls `upload` and `upload_uniforms` once, `draw`
/// once per context, then `submit`.
pub trait DrawBackend {
    fn upload(&mut self, vertices: &[SpriteVertex2], indices: &[u32]);

    fn upload_uniforms(&mut self, uniforms: &UniformBuffer);

    fn draw(&mut self, call: &DrawCall<'_>);

    /// Zeroes the stencil bits in `mask`.
    fn clear_stencil(&mut self, mask: u8);

    fn submit(&mut self);
}

// ── recording backend ─────────────────────────────────────────────────────

/// A draw as the recording backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub shader: ShaderId,
    pub command: DrawCommand,
    pub texture: Option<TextureId>,
    pub blend: Blend,
    pub stencil: StencilState,
    pub depth: DepthState,
    pub uniform_block: usize,
    pub indices: Range<u32>,
    /// Bytes of the uniform block read by this draw.
    pub block_bytes: Vec<u8>,
    /// Staged bytes of every shader-local block, by block index.
    pub locals: Vec<(usize, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Upload {
        vertices: Vec<SpriteVertex2>,
        indices: Vec<u32>,
    },
    UploadUniforms {
        blocks: usize,
    },
    Draw(RecordedDraw),
    ClearStencil(u8),
    Submit,
}

/// Backend that records calls instead of rendering. Used headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<RecordedCall>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<RecordedCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draws(&self) -> impl Iterator<Item = &RecordedDraw> {
        self.calls.iter().filter_map(|c| match c {
            RecordedCall::Draw(d) => Some(d),
            _ => None,
        })
    }

    pub fn submits(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, RecordedCall::Submit)).count()
    }
}

impl DrawBackend for RecordingBackend {
    fn upload(&mut self, vertices: &[SpriteVertex2], indices: &[u32]) {
        self.calls.push(RecordedCall::Upload {
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        });
    }

    fn upload_uniforms(&mut self, uniforms: &UniformBuffer) {
        self.calls.push(RecordedCall::UploadUniforms {
            blocks: uniforms.capacity(),
        });
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let shader = call.shader;
        let locals = (0..shader.blocks().len())
            .filter(|&i| shader.block_bind_point(i).is_none())
            .filter_map(|i| shader.local_block(i).map(|bytes| (i, bytes.to_vec())))
            .collect();
        self.calls.push(RecordedCall::Draw(RecordedDraw {
            shader: shader.id(),
            command: call.command,
            texture: call.texture,
            blend: call.blend,
            stencil: call.stencil,
            depth: call.depth,
            uniform_block: call.uniform_block,
            indices: call.indices.clone(),
            block_bytes: call.uniforms.block_bytes(call.uniform_block).to_vec(),
            locals,
        }));
    }

    fn clear_stencil(&mut self, mask: u8) {
        self.calls.push(RecordedCall::ClearStencil(mask));
    }

    fn submit(&mut self) {
        self.calls.push(RecordedCall::Submit);
    }
}
