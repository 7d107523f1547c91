use std::collections::HashMap;

use super::binding::{self, ShaderId};
use super::error::ShaderError;
use super::introspect;
use super::source::preprocess_source;
use super::std140::{std140_stride, Std140};
use super::types::{AttributeInfo, BlockInfo, SamplerInfo, Stage, UniformInfo};
use super::uniform_buffer::UniformBuffer;
use crate::render::Texture;

/// Parsed, validated stage modules kept for pipeline creation.
#[derive(Debug)]
pub struct CompiledStages {
    pub vertex: naga::Module,
    pub fragment: naga::Module,
}

/// Block or sampler addressed by name or by index.
#[derive(Debug, Copy, Clone)]
pub enum NameOrIndex<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for NameOrIndex<'a> {
    fn from(name: &'a str) -> Self {
        NameOrIndex::Name(name)
    }
}

impl From<usize> for NameOrIndex<'_> {
    fn from(index: usize) -> Self {
        NameOrIndex::Index(index)
    }
}

/// A vertex/fragment program with cached introspection.
///
/// Uniform values for blocks that are not backed by a [`UniformBuffer`] are
/// staged on the shader (one byte image per block) and read by the backend
/// at draw time.
#[derive(Debug)]
pub struct Shader {
    id: ShaderId,
    vertex_source: String,
    fragment_source: String,
    stages: Option<CompiledStages>,

    attributes: Vec<AttributeInfo>,
    uniforms: Vec<UniformInfo>,
    samplers: Vec<SamplerInfo>,
    blocks: Vec<BlockInfo>,

    attribute_index: HashMap<String, usize>,
    uniform_index: HashMap<String, usize>,
    sampler_index: HashMap<String, usize>,
    block_index: HashMap<String, usize>,

    local_blocks: Vec<Vec<u8>>,
    block_bind_points: Vec<Option<u32>>,
    sampler_bind_points: Vec<Option<u32>>,
}

impl Shader {
    /// Stores both sources after `::` expansion. Nothing is compiled yet.
    pub fn new(vertex_source: &str, fragment_source: &str) -> Self {
        Self {
            id: ShaderId::next(),
            vertex_source: preprocess_source(vertex_source),
            fragment_source: preprocess_source(fragment_source),
            stages: None,
            attributes: Vec::new(),
            uniforms: Vec::new(),
            samplers: Vec::new(),
            blocks: Vec::new(),
            attribute_index: HashMap::new(),
            uniform_index: HashMap::new(),
            sampler_index: HashMap::new(),
            block_index: HashMap::new(),
            local_blocks: Vec::new(),
            block_bind_points: Vec::new(),
            sampler_bind_points: Vec::new(),
        }
    }

    /// Compiles, links and introspects the program.
    ///
    /// On failure the diagnostics are logged, the shader is left without a
    /// program and the error is returned.
    pub fn compile(&mut self) -> Result<(), ShaderError> {
        self.dispose();
        match self.build() {
            Ok(()) => {
                log::debug!(
                    "shader {}: {} attributes, {} uniforms, {} samplers, {} blocks",
                    self.id.get(),
                    self.attributes.len(),
                    self.uniforms.len(),
                    self.samplers.len(),
                    self.blocks.len()
                );
                Ok(())
            }
            Err(err) => {
                log::error!("shader {} failed to compile: {err}", self.id.get());
                self.dispose();
                Err(err)
            }
        }
    }

    fn build(&mut self) -> Result<(), ShaderError> {
        let vertex = introspect::parse_stage(Stage::Vertex, &self.vertex_source)?;
        introspect::validate_stage(Stage::Vertex, &self.vertex_source, &vertex)?;
        let fragment = introspect::parse_stage(Stage::Fragment, &self.fragment_source)?;
        introspect::validate_stage(Stage::Fragment, &self.fragment_source, &fragment)?;
        introspect::link(&vertex, &fragment)?;

        let reflection = introspect::reflect(&vertex, &fragment);
        self.attributes = reflection.attributes;
        self.uniforms = reflection.uniforms;
        self.samplers = reflection.samplers;
        self.blocks = reflection.blocks;

        // First declaration wins on name clashes.
        for (i, a) in self.attributes.iter().enumerate() {
            self.attribute_index.entry(a.name.clone()).or_insert(i);
        }
        for (i, u) in self.uniforms.iter().enumerate() {
            self.uniform_index.entry(u.name.clone()).or_insert(i);
        }
        for (i, s) in self.samplers.iter().enumerate() {
            self.sampler_index.entry(s.name.clone()).or_insert(i);
        }
        for (i, b) in self.blocks.iter().enumerate() {
            self.block_index.entry(b.name.clone()).or_insert(i);
        }

        self.local_blocks = self.blocks.iter().map(|b| vec![0; b.size as usize]).collect();
        self.block_bind_points = vec![None; self.blocks.len()];
        self.sampler_bind_points = vec![None; self.samplers.len()];
        self.stages = Some(CompiledStages { vertex, fragment });
        Ok(())
    }

    /// Drops the program and all introspection. Unbinds if bound.
    pub fn dispose(&mut self) {
        if self.is_bound() {
            binding::set_bound(None);
        }
        self.stages = None;
        self.attributes.clear();
        self.uniforms.clear();
        self.samplers.clear();
        self.blocks.clear();
        self.attribute_index.clear();
        self.uniform_index.clear();
        self.sampler_index.clear();
        self.block_index.clear();
        self.local_blocks.clear();
        self.block_bind_points.clear();
        self.sampler_bind_points.clear();
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.stages.is_some()
    }

    #[inline]
    pub fn id(&self) -> ShaderId {
        self.id
    }

    #[inline]
    pub fn stages(&self) -> Option<&CompiledStages> {
        self.stages.as_ref()
    }

    #[inline]
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    #[inline]
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    // ── binding ───────────────────────────────────────────────────────────

    /// Makes this the bound program. Replaces whatever was bound.
    ///
    /// # Panics
    /// When the shader is not compiled.
    pub fn bind(&self) {
        assert!(self.is_compiled(), "Shader::bind on an uncompiled shader");
        if !self.is_bound() {
            binding::set_bound(Some(self.id));
        }
    }

    pub fn unbind(&self) {
        if self.is_bound() {
            binding::set_bound(None);
        }
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        binding::bound_program() == Some(self.id)
    }

    // ── introspection ─────────────────────────────────────────────────────

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[UniformInfo] {
        &self.uniforms
    }

    pub fn samplers(&self) -> &[SamplerInfo] {
        &self.samplers
    }

    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attribute_index.get(name).map(|&i| &self.attributes[i])
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attribute(name).map(|a| a.location)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniform_index.get(name).map(|&i| &self.uniforms[i])
    }

    pub fn uniform_location(&self, name: &str) -> Option<usize> {
        self.uniform_index.get(name).copied()
    }

    /// Like [`uniform_location`](Self::uniform_location), but a miss is an error.
    pub fn try_uniform_location(&self, name: &str) -> Result<usize, ShaderError> {
        if !self.is_compiled() {
            return Err(ShaderError::NotCompiled);
        }
        self.uniform_location(name)
            .ok_or_else(|| ShaderError::UnknownUniform(name.to_owned()))
    }

    pub fn sampler(&self, name: &str) -> Option<&SamplerInfo> {
        self.sampler_index.get(name).map(|&i| &self.samplers[i])
    }

    pub fn block(&self, name: &str) -> Option<&BlockInfo> {
        self.block_index.get(name).map(|&i| &self.blocks[i])
    }

    pub fn block_index(&self, name: &str) -> Option<usize> {
        self.block_index.get(name).copied()
    }

    fn resolve_block(&self, block: NameOrIndex<'_>) -> Option<usize> {
        match block {
            NameOrIndex::Name(name) => self.block_index(name),
            NameOrIndex::Index(i) => (i < self.blocks.len()).then_some(i),
        }
    }

    // ── uniform writes ────────────────────────────────────────────────────

    /// Writes a uniform by location into the block's staged bytes.
    ///
    /// # Panics
    /// When the shader is not bound.
    pub fn set_uniform_at<T: Std140>(&mut self, location: usize, value: &T) {
        assert!(self.is_bound(), "uniform write to shader {} while it is not bound", self.id.get());
        let Some(u) = self.uniforms.get(location) else { return };
        let (block, offset, size) = (u.block, u.offset as usize, u.size as usize);
        let Some(bytes) = self.local_blocks.get_mut(block) else { return };
        let len = T::SIZE.min(size);
        if offset + len > bytes.len() {
            return;
        }
        let mut staged = vec![0u8; T::SIZE];
        value.write_std140(&mut staged);
        bytes[offset..offset + len].copy_from_slice(&staged[..len]);
    }

    /// Writes consecutive array elements starting at `location`.
    ///
    /// # Panics
    /// When the shader is not bound.
    pub fn set_uniform_slice_at<T: Std140>(&mut self, location: usize, values: &[T]) {
        assert!(self.is_bound(), "uniform write to shader {} while it is not bound", self.id.get());
        let Some(u) = self.uniforms.get(location) else { return };
        let (block, offset, size) = (u.block, u.offset as usize, u.size as usize);
        let Some(bytes) = self.local_blocks.get_mut(block) else { return };
        let stride = std140_stride::<T>();
        let mut staged = vec![0u8; T::SIZE];
        for (i, value) in values.iter().enumerate() {
            let at = offset + i * stride;
            if at + T::SIZE > offset + size || at + T::SIZE > bytes.len() {
                break;
            }
            value.write_std140(&mut staged);
            bytes[at..at + T::SIZE].copy_from_slice(&staged);
        }
    }

    /// Name-addressed [`set_uniform_at`](Self::set_uniform_at); unknown names are ignored.
    pub fn set_uniform<T: Std140>(&mut self, name: &str, value: &T) {
        let Some(location) = self.uniform_location(name) else { return };
        self.set_uniform_at(location, value);
    }

    pub fn set_uniform_slice<T: Std140>(&mut self, name: &str, values: &[T]) {
        let Some(location) = self.uniform_location(name) else { return };
        self.set_uniform_slice_at(location, values);
    }

    /// Reads a staged uniform back.
    pub fn uniform_at<T: Std140>(&self, location: usize) -> Option<T> {
        let u = self.uniforms.get(location)?;
        let bytes = self.local_blocks.get(u.block)?;
        let offset = u.offset as usize;
        if T::SIZE > u.size as usize || offset + T::SIZE > bytes.len() {
            return None;
        }
        Some(T::read_std140(&bytes[offset..offset + T::SIZE]))
    }

    pub fn get_uniform<T: Std140>(&self, name: &str) -> Option<T> {
        self.uniform_at(self.uniform_location(name)?)
    }

    /// Staged bytes of a block, as the backend uploads them.
    pub fn local_block(&self, block: usize) -> Option<&[u8]> {
        self.local_blocks.get(block).map(Vec::as_slice)
    }

    // ── blocks ────────────────────────────────────────────────────────────

    /// Compares a buffer's named offsets with the block's members.
    pub fn validate_block<'a>(
        &self,
        block: impl Into<NameOrIndex<'a>>,
        buffer: &UniformBuffer,
    ) -> Result<(), ShaderError> {
        if !self.is_compiled() {
            return Err(ShaderError::NotCompiled);
        }
        let block = block.into();
        let Some(index) = self.resolve_block(block) else {
            return Err(ShaderError::UnknownBlock(match block {
                NameOrIndex::Name(name) => name.to_owned(),
                NameOrIndex::Index(i) => format!("#{i}"),
            }));
        };
        let mismatches = self.block_mismatches(index, buffer);
        match mismatches.first() {
            None => Ok(()),
            Some(detail) => Err(ShaderError::BlockMismatch {
                block: self.blocks[index].name.clone(),
                detail: detail.clone(),
            }),
        }
    }

    fn block_mismatches(&self, index: usize, buffer: &UniformBuffer) -> Vec<String> {
        let info = &self.blocks[index];
        let mut out = Vec::new();

        for &location in &info.members {
            let u = &self.uniforms[location];
            match buffer.offset(&u.name) {
                None => out.push(format!("member `{}` has no buffer offset", u.name)),
                Some(off) if off != u.offset as usize => out.push(format!(
                    "member `{}` is at {} in the block but {} in the buffer",
                    u.name, u.offset, off
                )),
                Some(_) => {}
            }
        }

        for name in buffer.names() {
            let known = info.members.iter().any(|&l| self.uniforms[l].name == name);
            if !known {
                out.push(format!("buffer offset `{name}` is not a member"));
            }
        }

        if buffer.block_size() < info.size as usize {
            out.push(format!(
                "buffer blocks are {} bytes, block needs {}",
                buffer.block_size(),
                info.size
            ));
        }
        out.sort();
        out
    }

    /// Routes a block to `buffer`'s bind point, warning about layout mismatches.
    pub fn set_uniform_block<'a>(&mut self, block: impl Into<NameOrIndex<'a>>, buffer: &UniformBuffer) {
        let Some(index) = self.resolve_block(block.into()) else { return };
        for detail in self.block_mismatches(index, buffer) {
            log::warn!("uniform block `{}`: {detail}", self.blocks[index].name);
        }
        self.block_bind_points[index] = Some(buffer.bind_point());
    }

    /// Bind point of the buffer backing block `index`; `None` means the
    /// block is staged locally.
    pub fn block_bind_point(&self, index: usize) -> Option<u32> {
        self.block_bind_points.get(index).copied().flatten()
    }

    // ── samplers ──────────────────────────────────────────────────────────

    /// Records the texture bind point a sampler reads. Unknown names are ignored.
    pub fn set_sampler<'a>(&mut self, sampler: impl Into<NameOrIndex<'a>>, bind_point: u32) {
        let index = match sampler.into() {
            NameOrIndex::Name(name) => self.sampler_index.get(name).copied(),
            NameOrIndex::Index(i) => (i < self.samplers.len()).then_some(i),
        };
        let Some(index) = index else { return };
        self.sampler_bind_points[index] = Some(bind_point);
    }

    pub fn set_sampler_texture(&mut self, name: &str, texture: &Texture) {
        self.set_sampler(name, texture.bind_point);
    }

    pub fn sampler_bind_point(&self, name: &str) -> Option<u32> {
        let index = *self.sampler_index.get(name)?;
        self.sampler_bind_points[index]
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.unbind();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{
        context_buffer, sprite_shader, CONTEXT_BLOCK, CONTEXT_BLOCK_SIZE, CONTEXT_LAYOUT,
        SPRITE_FRAGMENT_SHADER,
    };
    use crate::shader::{bound_program, SamplerKind, ScalarKind, ShaderType};
    use glam::{Mat4, Vec3};

    fn compiled() -> Shader {
        let mut shader = sprite_shader();
        shader.compile().expect("sprite shader compiles");
        shader
    }

    #[test]
    fn sprite_shader_attributes() {
        let shader = compiled();
        let attrs: Vec<(&str, u32)> = shader
            .attributes()
            .iter()
            .map(|a| (a.name.as_str(), a.location))
            .collect();
        assert_eq!(
            attrs,
            [("aPosition", 0), ("aColor", 1), ("aTexCoord", 2), ("aGradCoord", 3)]
        );
        assert_eq!(
            shader.attribute("aColor").map(|a| a.ty),
            Some(ShaderType::Vector { kind: ScalarKind::Float, size: 4 })
        );
        assert_eq!(shader.attribute_location("aGradCoord"), Some(3));
    }

    #[test]
    fn context_block_matches_layout() {
        let shader = compiled();
        let block = shader.block(CONTEXT_BLOCK).expect("context block");
        assert_eq!(block.size as usize, CONTEXT_BLOCK_SIZE);
        assert_eq!((block.group, block.binding), (1, 0));
        assert!(block.stages.vertex && block.stages.fragment);
        assert_eq!(block.members.len(), CONTEXT_LAYOUT.len());
        for (name, offset) in CONTEXT_LAYOUT {
            let u = shader.uniform(name).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(u.offset as usize, offset, "{name}");
        }
        assert_eq!(
            shader.uniform("scMatrix").map(|u| u.ty),
            Some(ShaderType::Matrix { columns: 3, rows: 3 })
        );
    }

    #[test]
    fn camera_block_and_samplers() {
        let shader = compiled();
        let camera = shader.block("uCamera").expect("camera block");
        assert_eq!(camera.size, 64);
        assert!(camera.stages.vertex && !camera.stages.fragment);

        let texture = shader.sampler("uTexture").expect("texture");
        assert_eq!(texture.kind, SamplerKind::Texture2D);
        assert_eq!((texture.group, texture.binding), (2, 0));
        assert!(texture.stages.fragment && !texture.stages.vertex);
        assert_eq!(shader.sampler("uSampler").map(|s| s.kind), Some(SamplerKind::Filter));
    }

    #[test]
    fn validate_block_against_buffers() {
        let shader = compiled();
        assert_eq!(shader.validate_block(CONTEXT_BLOCK, &context_buffer(4)), Ok(()));

        let mut shifted = context_buffer(4);
        shifted.set_offset("ctDepth", 164);
        assert!(matches!(
            shader.validate_block(CONTEXT_BLOCK, &shifted),
            Err(ShaderError::BlockMismatch { .. })
        ));

        let mut extra = context_buffer(4);
        extra.set_offset("unknown", 0);
        assert!(shader.validate_block(CONTEXT_BLOCK, &extra).is_err());

        assert_eq!(
            shader.validate_block("missing", &context_buffer(1)),
            Err(ShaderError::UnknownBlock("missing".into()))
        );
        assert_eq!(
            sprite_shader().validate_block(CONTEXT_BLOCK, &context_buffer(1)),
            Err(ShaderError::NotCompiled)
        );
    }

    #[test]
    fn set_uniform_block_records_bind_point() {
        let mut shader = compiled();
        let mut buffer = context_buffer(2);
        buffer.set_bind_point(5);
        shader.set_uniform_block(CONTEXT_BLOCK, &buffer);

        let context = shader.block_index(CONTEXT_BLOCK).expect("context block");
        let camera = shader.block_index("uCamera").expect("camera block");
        assert_eq!(shader.block_bind_point(context), Some(5));
        assert_eq!(shader.block_bind_point(camera), None);
    }

    #[test]
    fn unwritten_fragment_input_fails_to_link() {
        let vertex = "#version 450
layout(location = 0) in vec2 aPosition;
layout(location = 0) out vec4 vColor;
void main() {
    vColor = vec4(1.0);
    gl_Position = vec4(aPosition, 0.0, 1.0);
}";
        let fragment = "#version 450
layout(location = 1) in vec2 vTexCoord;
layout(location = 0) out vec4 fragColor;
void main() {
    fragColor = vec4(vTexCoord, 0.0, 1.0);
}";
        let mut shader = Shader::new(vertex, fragment);
        assert!(matches!(shader.compile(), Err(ShaderError::Link(_))));
        assert!(!shader.is_compiled());
        assert!(shader.attributes().is_empty());
    }

    #[test]
    fn syntax_error_is_a_parse_error() {
        let mut shader = Shader::new("#version 450\nvoid main() { oops }", SPRITE_FRAGMENT_SHADER);
        assert!(matches!(
            shader.compile(),
            Err(ShaderError::Parse { stage: Stage::Vertex, .. })
        ));
    }

    #[test]
    fn uniform_staging_round_trip() {
        let mut shader = compiled();
        shader.bind();
        let m = Mat4::from_scale(Vec3::new(2.0, -2.0, 1.0));
        shader.set_uniform("uPerspective", &m);
        assert_eq!(shader.get_uniform::<Mat4>("uPerspective"), Some(m));

        // Misses are silent.
        shader.set_uniform("uNothing", &1.0f32);
        assert_eq!(shader.get_uniform::<f32>("uNothing"), None);
        assert_eq!(
            shader.try_uniform_location("uNothing"),
            Err(ShaderError::UnknownUniform("uNothing".into()))
        );
        shader.unbind();
    }

    #[test]
    fn uniform_slices_follow_array_stride() {
        let vertex = "#version 450
layout(location = 0) in vec2 aPosition;
layout(std140, set = 0, binding = 0) uniform uWeights {
    float weights[4];
    float tail;
};
void main() {
    gl_Position = vec4(aPosition * weights[0] + tail, 0.0, 1.0);
}";
        let fragment = "#version 450
layout(location = 0) out vec4 fragColor;
void main() {
    fragColor = vec4(1.0);
}";
        let mut shader = Shader::new(vertex, fragment);
        shader.compile().expect("array shader compiles");
        let weights = shader.uniform("weights").expect("weights").clone();
        assert_eq!((weights.count, weights.offset, weights.size), (4, 0, 64));
        assert_eq!(shader.uniform("tail").map(|u| u.offset), Some(64));

        shader.bind();
        shader.set_uniform("tail", &9.0f32);
        shader.set_uniform_slice("weights", &[1.0f32, 2.0, 3.0, 4.0, 5.0]);
        let bytes = shader.local_block(weights.block).expect("staged block");
        for (i, expected) in [1.0f32, 2.0, 3.0, 4.0].into_iter().enumerate() {
            assert_eq!(f32::read_std140(&bytes[i * 16..]), expected);
            assert_eq!(&bytes[i * 16 + 4..i * 16 + 16], &[0; 12]);
        }
        assert_eq!(shader.get_uniform::<f32>("tail"), Some(9.0));
        shader.unbind();
    }

    #[test]
    #[should_panic(expected = "while it is not bound")]
    fn unbound_write_panics() {
        let mut shader = compiled();
        shader.set_uniform("uPerspective", &Mat4::IDENTITY);
    }

    #[test]
    fn binding_is_exclusive_and_cleared_on_drop() {
        let a = compiled();
        let b = compiled();
        a.bind();
        assert!(a.is_bound());
        b.bind();
        assert!(!a.is_bound());
        assert_eq!(bound_program(), Some(b.id()));
        drop(b);
        assert_eq!(bound_program(), None);
    }

    #[test]
    fn samplers_take_bind_points() {
        let mut shader = compiled();
        shader.set_sampler("uTexture", 3);
        shader.set_sampler("uMissing", 4);
        assert_eq!(shader.sampler_bind_point("uTexture"), Some(3));
        assert_eq!(shader.sampler_bind_point("uSampler"), None);
    }
}
