use std::mem;

use glam::{Affine2, Mat4, Vec2};

use super::backend::{DrawBackend, DrawCall, RecordingBackend};
use super::context::{context_buffer, Context, Recorded, CONTEXT_BLOCK, CONTEXT_BLOCK_SIZE};
use super::stencil::{BOTH_HALVES, LOWER_HALF, UPPER_HALF};
use super::{Blend, BlendEquation, BlendFactor, BlendMode, GlyphRun, StencilEffect, Texture};
use crate::coords::{Path2, Poly2, Rect};
use crate::mesh::{DrawCommand, Mesh, MeshVertex, SpriteVertex2};
use crate::paint::{Color4, Gradient, Scissor};
use crate::shader::{Shader, ShaderError, UniformBuffer};

/// Mesh type the batch consumes.
pub type SpriteMesh = Mesh<SpriteVertex2>;

/// Uniform holding the perspective matrix.
pub const PERSPECTIVE_UNIFORM: &str = "uPerspective";
/// Sampler the active texture is routed to.
pub const TEXTURE_SAMPLER: &str = "uTexture";

/// Arena sizing.
///
/// Index capacity is `vertex_capacity * index_ratio`; the number of
/// contexts per flush is `vertex_capacity / context_ratio`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub vertex_capacity: usize,
    pub index_ratio: usize,
    pub context_ratio: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            vertex_capacity: 8192,
            index_ratio: 3,
            context_ratio: 16,
        }
    }
}

impl BatchConfig {
    pub fn with_capacity(vertex_capacity: usize) -> Self {
        Self {
            vertex_capacity,
            ..Self::default()
        }
    }

    #[inline]
    pub fn index_capacity(&self) -> usize {
        self.vertex_capacity * self.index_ratio
    }

    #[inline]
    pub fn context_capacity(&self) -> usize {
        (self.vertex_capacity / self.context_ratio.max(1)).max(1)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BatchState {
    Uninitialized,
    Ready,
    Drawing,
}

/// Accumulates geometry and replays it in as few draws as possible.
///
/// State changes are deferred: changing anything but the color while
/// geometry is pending closes the current [`Context`] and opens a new one.
/// `flush`/`end` then issue one draw per context. When an arena or the
/// context history fills up the batch flushes on its own.
pub struct SpriteBatch<B: DrawBackend = RecordingBackend> {
    backend: B,
    shader: Option<Shader>,
    config: BatchConfig,
    state: BatchState,

    vertices: Vec<SpriteVertex2>,
    indices: Vec<u32>,
    uniforms: UniformBuffer,
    history: Vec<Recorded>,

    context: Context,
    vertex_mark: usize,
    index_mark: usize,
    color: Color4,

    vertices_drawn: usize,
    calls_made: usize,
}

impl<B: DrawBackend> SpriteBatch<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            shader: None,
            config: BatchConfig::default(),
            state: BatchState::Uninitialized,
            vertices: Vec::new(),
            indices: Vec::new(),
            uniforms: UniformBuffer::new(1, CONTEXT_BLOCK_SIZE),
            history: Vec::new(),
            context: Context::default(),
            vertex_mark: 0,
            index_mark: 0,
            color: Color4::WHITE,
            vertices_drawn: 0,
            calls_made: 0,
        }
    }

    /// Initializes with the default capacities.
    pub fn init(&mut self, shader: Shader) -> Result<(), ShaderError> {
        self.init_with(BatchConfig::default(), shader)
    }

    /// Allocates the arenas and takes ownership of `shader`, compiling it
    /// if needed.
    ///
    /// # Panics
    /// When called twice, when the vertex capacity cannot hold a quad, or
    /// when the index capacity cannot hold a triangle.
    pub fn init_with(&mut self, config: BatchConfig, mut shader: Shader) -> Result<(), ShaderError> {
        assert_eq!(self.state, BatchState::Uninitialized, "SpriteBatch::init called twice");
        assert!(config.vertex_capacity >= 4, "SpriteBatch capacity must hold at least one quad");
        assert!(config.index_capacity() >= 3, "SpriteBatch index capacity must hold at least one triangle");

        if !shader.is_compiled() {
            shader.compile()?;
        }

        let uniforms = context_buffer(config.context_capacity());
        if shader.block(CONTEXT_BLOCK).is_some() {
            shader.set_uniform_block(CONTEXT_BLOCK, &uniforms);
        }

        self.vertices = Vec::with_capacity(config.vertex_capacity);
        self.indices = Vec::with_capacity(config.index_capacity());
        self.history = Vec::with_capacity(config.context_capacity());
        self.uniforms = uniforms;
        self.shader = Some(shader);
        self.config = config;
        self.state = BatchState::Ready;

        log::debug!(
            "sprite batch ready: {} vertices, {} indices, {} contexts",
            config.vertex_capacity,
            config.index_capacity(),
            config.context_capacity()
        );
        Ok(())
    }

    // ── session ───────────────────────────────────────────────────────────

    /// Starts a pass with the current perspective.
    pub fn begin(&mut self) {
        self.begin_with(self.context.perspective);
    }

    /// Starts a pass. Counters reset and depth writes are turned off.
    ///
    /// # Panics
    /// Before `init`, or when a pass is already active.
    pub fn begin_with(&mut self, perspective: Mat4) {
        assert_ne!(self.state, BatchState::Uninitialized, "SpriteBatch::begin before init");
        assert_ne!(self.state, BatchState::Drawing, "SpriteBatch::begin called twice without end");

        self.vertices_drawn = 0;
        self.calls_made = 0;
        self.context.perspective = perspective;
        self.context.depth_state.write = false;
        self.state = BatchState::Drawing;
    }

    /// Flushes and closes the pass.
    pub fn end(&mut self) {
        assert_eq!(self.state, BatchState::Drawing, "SpriteBatch::end without begin");
        self.flush();
        self.state = BatchState::Ready;
        if let Some(shader) = self.shader.as_ref() {
            shader.unbind();
        }
    }

    /// Draws everything pending.
    ///
    /// # Panics
    /// Outside `begin`/`end`.
    pub fn flush(&mut self) {
        assert_eq!(self.state, BatchState::Drawing, "SpriteBatch::flush outside begin/end");
        self.close_context();
        self.submit_history();
    }

    /// Zeroes both stencil halves after drawing what is pending.
    pub fn clear_stencil(&mut self) {
        self.clear_stencil_bits(BOTH_HALVES);
    }

    /// Zeroes the lower or upper stencil half after drawing what is pending.
    pub fn clear_half_stencil(&mut self, lower: bool) {
        self.clear_stencil_bits(if lower { LOWER_HALF } else { UPPER_HALF });
    }

    fn clear_stencil_bits(&mut self, mask: u8) {
        if self.state == BatchState::Drawing {
            self.flush();
        }
        self.backend.clear_stencil(mask);
    }

    // ── context history ───────────────────────────────────────────────────

    #[inline]
    fn has_pending(&self) -> bool {
        self.indices.len() > self.index_mark
    }

    /// Closes the current context over the pending range and serialises it.
    fn close_context(&mut self) {
        if !self.has_pending() {
            return;
        }
        let block = self.history.len();
        self.context.write_block(&mut self.uniforms, block);
        self.history.push(Recorded {
            context: self.context.clone(),
            vertices: self.vertex_mark..self.vertices.len(),
            indices: self.index_mark..self.indices.len(),
            block,
        });
        self.vertex_mark = self.vertices.len();
        self.index_mark = self.indices.len();
    }

    /// Closes the current context before a state change.
    fn record(&mut self) {
        if !self.has_pending() {
            return;
        }
        self.close_context();
        if self.history.len() >= self.config.context_capacity() {
            self.submit_history();
        }
    }

    fn submit_history(&mut self) {
        if self.history.is_empty() || self.shader.is_none() {
            self.unwind();
            return;
        }
        let mut history = mem::take(&mut self.history);
        let Some(shader) = self.shader.as_mut() else { return };

        self.backend.upload(&self.vertices, &self.indices);
        self.backend.upload_uniforms(&self.uniforms);
        self.uniforms.mark_clean();

        shader.bind();
        for entry in &history {
            let ctx = &entry.context;
            shader.set_uniform(PERSPECTIVE_UNIFORM, &ctx.perspective);
            self.uniforms.activate(entry.block);
            if let Some(texture) = ctx.texture {
                shader.set_sampler(TEXTURE_SAMPLER, texture.bind_point);
            }

            self.backend.draw(&DrawCall {
                shader: &*shader,
                command: ctx.command,
                texture: ctx.texture.map(|t| t.id),
                blend: ctx.blend,
                stencil: ctx.stencil.state(),
                depth: ctx.depth_state,
                uniforms: &self.uniforms,
                uniform_block: entry.block,
                indices: entry.indices.start as u32..entry.indices.end as u32,
            });
            self.calls_made += 1;
            self.vertices_drawn += entry.vertices.len();
        }
        self.backend.submit();

        log::trace!(
            "sprite batch flush: {} draws, {} vertices",
            history.len(),
            self.vertices.len()
        );

        history.clear();
        self.history = history;
        self.unwind();
    }

    /// Drops the history and rewinds the arenas.
    fn unwind(&mut self) {
        self.history.clear();
        self.vertices.clear();
        self.indices.clear();
        self.vertex_mark = 0;
        self.index_mark = 0;
    }

    // ── appends ───────────────────────────────────────────────────────────

    /// Copies `mesh` into the arenas, flushing or splitting as needed.
    fn push_mesh(&mut self, mesh: &SpriteMesh) -> usize {
        assert_eq!(self.state, BatchState::Drawing, "SpriteBatch: drawing outside begin/end");
        if mesh.command().divider().is_none() {
            log::warn!("SpriteBatch: ignoring mesh without a draw command");
            return 0;
        }
        if mesh.is_empty() {
            return 0;
        }

        if mesh.command() != self.context.command {
            self.record();
            self.context.command = mesh.command();
        }

        let vertex_capacity = self.config.vertex_capacity;
        let index_capacity = self.config.index_capacity();
        if mesh.vertex_count() > vertex_capacity || mesh.index_count() > index_capacity {
            return self.chunkify(mesh);
        }
        if self.vertices.len() + mesh.vertex_count() > vertex_capacity
            || self.indices.len() + mesh.index_count() > index_capacity
        {
            self.flush();
        }

        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(mesh.vertices());
        self.indices.extend(mesh.indices().iter().map(|i| i + base));
        mesh.vertex_count()
    }

    /// Appends a mesh too large for the arenas piece by piece.
    fn chunkify(&mut self, mesh: &SpriteMesh) -> usize {
        if !mesh.is_sliceable() {
            log::warn!(
                "SpriteBatch: {} indices exceed capacity and do not form whole primitives; dropped",
                mesh.index_count()
            );
            return 0;
        }
        let divider = mesh.command().divider().unwrap_or(3);
        let room = self.config.vertex_capacity.min(self.config.index_capacity());
        let step = (room / divider) * divider;
        debug_assert!(step > 0, "chunk step must cover at least one primitive");

        let mut appended = 0;
        let mut start = 0;
        while start < mesh.index_count() {
            let end = (start + step).min(mesh.index_count());
            appended += self.push_mesh(&mesh.slice(start, end));
            start = end;
        }
        appended
    }

    /// Applies the current color, gradient coordinates and texture mapping.
    fn painted(&self, mut mesh: SpriteMesh, transform: Option<Affine2>) -> SpriteMesh {
        mesh.set_color(self.color);
        mesh.set_gradcoords_from_positions();
        if let (Some(texture), Some(bounds)) = (self.context.texture, mesh.bounds()) {
            mesh.set_texcoords_from_bounds(bounds, texture.uv_min(), texture.uv_max());
        }
        if let Some(transform) = transform {
            mesh *= transform;
        }
        mesh
    }

    pub fn fill_rect(&mut self, rect: Rect) -> usize {
        let mesh = self.painted(Mesh::from_rect(rect), None);
        self.push_mesh(&mesh)
    }

    pub fn fill_rect_with_transform(&mut self, rect: Rect, transform: Affine2) -> usize {
        let mesh = self.painted(Mesh::from_rect(rect), Some(transform));
        self.push_mesh(&mesh)
    }

    pub fn fill_poly(&mut self, poly: &Poly2) -> usize {
        let mesh = self.painted(Mesh::from_poly(poly), None);
        self.push_mesh(&mesh)
    }

    pub fn fill_poly_with_transform(&mut self, poly: &Poly2, transform: Affine2) -> usize {
        let mesh = self.painted(Mesh::from_poly(poly), Some(transform));
        self.push_mesh(&mesh)
    }

    /// Fills a mesh with the current color, replacing its vertex colors.
    pub fn fill_mesh(&mut self, mesh: &SpriteMesh) -> usize {
        let mesh = self.painted(mesh.clone(), None);
        self.push_mesh(&mesh)
    }

    pub fn fill_mesh_with_transform(&mut self, mesh: &SpriteMesh, transform: Affine2) -> usize {
        let mesh = self.painted(mesh.clone(), Some(transform));
        self.push_mesh(&mesh)
    }

    pub fn outline_rect(&mut self, rect: Rect) -> usize {
        let mesh = self.painted(Mesh::from_path(&Path2::from_rect(rect)), None);
        self.push_mesh(&mesh)
    }

    pub fn outline_path(&mut self, path: &Path2) -> usize {
        let mesh = self.painted(Mesh::from_path(path), None);
        self.push_mesh(&mesh)
    }

    pub fn outline_path_with_transform(&mut self, path: &Path2, transform: Affine2) -> usize {
        let mesh = self.painted(Mesh::from_path(path), Some(transform));
        self.push_mesh(&mesh)
    }

    /// Outlines a polygon's vertex loop.
    pub fn outline_poly(&mut self, poly: &Poly2) -> usize {
        self.outline_path(&Path2::new(poly.vertices.clone(), true))
    }

    /// Draws a mesh with its own colors and coordinates.
    pub fn draw_mesh(&mut self, mesh: &SpriteMesh) -> usize {
        self.push_mesh(mesh)
    }

    pub fn draw_mesh_with_transform(&mut self, mesh: &SpriteMesh, transform: Affine2) -> usize {
        let mut mesh = mesh.clone();
        mesh *= transform;
        self.push_mesh(&mesh)
    }

    /// Draws a glyph run with its atlas. The previous texture is restored afterwards.
    pub fn draw_text(&mut self, run: &GlyphRun, origin: Vec2) -> usize {
        if run.is_empty() {
            return 0;
        }

        let packed = self.color.pack();
        let mut vertices = Vec::with_capacity(run.len() * 4);
        let mut indices = Vec::with_capacity(run.len() * 6);
        for quad in &run.quads {
            let lo = origin + quad.bounds.min();
            let hi = origin + quad.bounds.max();
            let corners = [
                (lo, quad.uv_min),
                (Vec2::new(hi.x, lo.y), Vec2::new(quad.uv_max.x, quad.uv_min.y)),
                (hi, quad.uv_max),
                (Vec2::new(lo.x, hi.y), Vec2::new(quad.uv_min.x, quad.uv_max.y)),
            ];

            let base = vertices.len() as u32;
            for (position, uv) in corners {
                let mut v = SpriteVertex2::from_position(position.extend(0.0));
                v.set_color(packed);
                v.set_texcoord(uv);
                v.set_gradcoord(position);
                vertices.push(v);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let previous = self.context.texture;
        self.set_texture(Some(run.texture));
        let appended = self.push_mesh(&Mesh::with_command(vertices, indices, DrawCommand::Triangles));
        self.set_texture(previous);
        appended
    }

    // ── state ─────────────────────────────────────────────────────────────

    /// Sets the color baked into subsequent vertices. Never splits a context.
    pub fn set_color(&mut self, color: Color4) {
        self.color = color;
    }

    pub fn color(&self) -> Color4 {
        self.color
    }

    pub fn set_texture(&mut self, texture: Option<Texture>) {
        if self.context.texture != texture {
            self.record();
            self.context.texture = texture;
        }
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.context.texture.as_ref()
    }

    pub fn set_gradient(&mut self, gradient: Option<Gradient>) {
        if self.context.gradient != gradient {
            self.record();
            self.context.gradient = gradient;
        }
    }

    pub fn gradient(&self) -> Option<&Gradient> {
        self.context.gradient.as_ref()
    }

    pub fn set_scissor(&mut self, scissor: Option<Scissor>) {
        if self.context.scissor != scissor {
            self.record();
            self.context.scissor = scissor;
        }
    }

    pub fn scissor(&self) -> Option<&Scissor> {
        self.context.scissor.as_ref()
    }

    pub fn set_blend(&mut self, blend: Blend) {
        if self.context.blend != blend {
            self.record();
            self.context.blend = blend;
        }
    }

    pub fn blend(&self) -> Blend {
        self.context.blend
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.set_blend(mode.blend());
    }

    /// Sets source and destination factors for both RGB and alpha.
    pub fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.set_blend(Blend {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
            ..self.context.blend
        });
    }

    pub fn set_src_blend_func(&mut self, rgb: BlendFactor, alpha: BlendFactor) {
        self.set_blend(Blend {
            src_rgb: rgb,
            src_alpha: alpha,
            ..self.context.blend
        });
    }

    pub fn set_dst_blend_func(&mut self, rgb: BlendFactor, alpha: BlendFactor) {
        self.set_blend(Blend {
            dst_rgb: rgb,
            dst_alpha: alpha,
            ..self.context.blend
        });
    }

    pub fn set_blend_equation(&mut self, rgb: BlendEquation, alpha: BlendEquation) {
        self.set_blend(Blend {
            equation_rgb: rgb,
            equation_alpha: alpha,
            ..self.context.blend
        });
    }

    /// Depth written for subsequent geometry (NDC, `[0, 1]`).
    pub fn set_depth(&mut self, depth: f32) {
        if self.context.depth != depth {
            self.record();
            self.context.depth = depth;
        }
    }

    pub fn depth(&self) -> f32 {
        self.context.depth
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        if self.context.depth_state.test != enabled {
            self.record();
            self.context.depth_state.test = enabled;
        }
    }

    pub fn depth_test(&self) -> bool {
        self.context.depth_state.test
    }

    /// Blur radius in texels; only affects textured geometry.
    pub fn set_blur(&mut self, radius: f32) {
        let radius = radius.max(0.0);
        if self.context.blur != radius {
            self.record();
            self.context.blur = radius;
        }
    }

    pub fn blur(&self) -> f32 {
        self.context.blur
    }

    pub fn set_perspective(&mut self, perspective: Mat4) {
        if self.context.perspective != perspective {
            self.record();
            self.context.perspective = perspective;
        }
    }

    pub fn perspective(&self) -> Mat4 {
        self.context.perspective
    }

    pub fn set_stencil_effect(&mut self, effect: StencilEffect) {
        if self.context.stencil != effect {
            self.record();
            self.context.stencil = effect;
        }
    }

    pub fn stencil_effect(&self) -> StencilEffect {
        self.context.stencil
    }

    // ── introspection ─────────────────────────────────────────────────────

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Vertices drawn since `begin`.
    pub fn vertices_drawn(&self) -> usize {
        self.vertices_drawn
    }

    /// Draw calls issued since `begin`.
    pub fn calls_made(&self) -> usize {
        self.calls_made
    }

    /// Closed contexts waiting for the next flush.
    pub fn history(&self) -> &[Recorded] {
        &self.history
    }

    /// Vertex arena contents, closed contexts and the open one.
    pub fn pending_vertices(&self) -> &[SpriteVertex2] {
        &self.vertices
    }

    pub fn pending_indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec3;
    use crate::render::backend::{RecordedCall, RecordedDraw};
    use crate::render::{sprite_shader, TextureId};
    use crate::shader::Std140;

    fn batch(capacity: usize) -> SpriteBatch {
        let mut batch = SpriteBatch::new(RecordingBackend::new());
        batch
            .init_with(BatchConfig::with_capacity(capacity), sprite_shader())
            .expect("sprite shader compiles");
        batch
    }

    fn draws(batch: &SpriteBatch) -> Vec<RecordedDraw> {
        batch.backend().draws().cloned().collect()
    }

    fn uploaded_vertices(batch: &SpriteBatch) -> usize {
        batch
            .backend()
            .calls()
            .iter()
            .map(|c| match c {
                RecordedCall::Upload { vertices, .. } => vertices.len(),
                _ => 0,
            })
            .sum()
    }

    fn unit(i: usize) -> Rect {
        Rect::new(i as f32, 0.0, 1.0, 1.0)
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "init called twice")]
    fn double_init_panics() {
        let mut b = batch(64);
        let _ = b.init(sprite_shader());
    }

    #[test]
    #[should_panic(expected = "begin called twice")]
    fn double_begin_panics() {
        let mut b = batch(64);
        b.begin();
        b.begin();
    }

    #[test]
    #[should_panic(expected = "flush outside")]
    fn flush_outside_pass_panics() {
        let mut b = batch(64);
        b.flush();
    }

    #[test]
    fn begin_end_moves_through_states() {
        let mut b = batch(64);
        assert_eq!(b.state(), BatchState::Ready);
        b.begin();
        assert_eq!(b.state(), BatchState::Drawing);
        b.end();
        assert_eq!(b.state(), BatchState::Ready);
        assert_eq!(b.calls_made(), 0);
        assert_eq!(b.backend().submits(), 0);
    }

    // ── contexts ──────────────────────────────────────────────────────────

    #[test]
    fn two_textures_make_two_draws() {
        let t1 = Texture::new(TextureId(1), 8, 8);
        let t2 = Texture::new(TextureId(2), 8, 8);
        let mut b = batch(64);
        b.begin();
        b.set_texture(Some(t1));
        assert_eq!(b.fill_rect(unit(0)), 4);
        b.set_texture(Some(t2));
        b.fill_rect(unit(1));
        b.end();

        let d = draws(&b);
        assert_eq!(d.len(), 2);
        assert_eq!((d[0].texture, d[0].indices.clone()), (Some(TextureId(1)), 0..6));
        assert_eq!((d[1].texture, d[1].indices.clone()), (Some(TextureId(2)), 6..12));
        assert_eq!(b.calls_made(), 2);
        assert_eq!(b.vertices_drawn(), 8);
    }

    #[test]
    fn color_changes_stay_in_one_context() {
        let mut b = batch(64);
        b.begin();
        b.set_color(Color4::BLACK);
        b.fill_rect(unit(0));
        b.set_color(Color4::WHITE);
        b.fill_rect(unit(1));
        assert!(b.history().is_empty());
        assert_eq!(b.pending_vertices()[0].color, Color4::BLACK.pack());
        assert_eq!(b.pending_vertices()[4].color, Color4::WHITE.pack());
        b.end();
        assert_eq!(draws(&b).len(), 1);
        assert_eq!(draws(&b)[0].indices, 0..12);
    }

    #[test]
    fn unchanged_state_does_not_split() {
        let mut b = batch(64);
        b.begin();
        b.set_depth(0.5);
        b.fill_rect(unit(0));
        b.set_depth(0.5);
        b.set_stencil_effect(StencilEffect::None);
        b.fill_rect(unit(1));
        b.end();
        assert_eq!(b.calls_made(), 1);
    }

    #[test]
    fn contexts_partition_the_arena() {
        let mut b = batch(256);
        b.begin();
        b.fill_rect(unit(0));
        b.set_depth(0.1);
        b.fill_rect(unit(1));
        b.fill_rect(unit(2));
        b.set_blend_mode(BlendMode::Additive);
        b.outline_rect(unit(3));
        b.set_scissor(Some(Scissor::new(Rect::new(0.0, 0.0, 2.0, 2.0))));
        b.fill_rect(unit(4));

        let history = b.history().to_vec();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].vertices.start, 0);
        assert_eq!(history[0].indices.start, 0);
        for pair in history.windows(2) {
            assert_eq!(pair[0].vertices.end, pair[1].vertices.start);
            assert_eq!(pair[0].indices.end, pair[1].indices.start);
        }

        b.end();
        let d = draws(&b);
        assert_eq!(d.len(), 4);
        assert_eq!(d[0].indices.start, 0);
        for pair in d.windows(2) {
            assert_eq!(pair[0].indices.end, pair[1].indices.start);
        }
        let total: u32 = d.iter().map(|d| d.indices.end - d.indices.start).sum();
        assert_eq!(total as usize, 6 * 4 + 8);
        assert_eq!(d[2].command, DrawCommand::Lines);
    }

    #[test]
    fn context_block_carries_state() {
        let mut b = batch(64);
        let perspective = Mat4::orthographic_rh(0.0, 100.0, 100.0, 0.0, -1.0, 1.0);
        b.begin_with(perspective);
        b.set_depth(0.5);
        b.set_gradient(Some(Gradient::radial(Vec2::ZERO, 1.0, 2.0, Color4::WHITE, Color4::BLACK)));
        b.fill_rect(unit(0));
        b.end();

        let d = &draws(&b)[0];
        assert_eq!(f32::read_std140(&d.block_bytes[168..]), 0.5);
        assert_eq!(i32::read_std140(&d.block_bytes[172..]), 2);

        let shader = b.shader().unwrap();
        let camera = shader.block_index("uCamera").unwrap();
        let (_, bytes) = d.locals.iter().find(|(i, _)| *i == camera).unwrap();
        assert_eq!(Mat4::read_std140(bytes), perspective);
    }

    #[test]
    fn gradcoords_are_shape_local() {
        let mut b = batch(64);
        b.begin();
        b.fill_rect_with_transform(Rect::new(0.0, 0.0, 1.0, 1.0), Affine2::from_translation(Vec2::new(5.0, 0.0)));
        let v = b.pending_vertices()[2];
        assert_eq!(v.position, [6.0, 1.0]);
        assert_eq!(v.gradcoord, [1.0, 1.0]);
        b.end();
    }

    #[test]
    fn textured_fill_maps_texture_region() {
        let atlas = Texture::new(TextureId(3), 64, 64).region(0, 0, 32, 32);
        let mut b = batch(64);
        b.begin();
        b.set_texture(Some(atlas));
        b.fill_rect(Rect::new(10.0, 10.0, 4.0, 4.0));
        assert_eq!(b.pending_vertices()[0].texcoord, [0.0, 0.0]);
        assert_eq!(b.pending_vertices()[2].texcoord, [0.5, 0.5]);
        b.end();
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn overflow_flushes_without_losing_geometry() {
        let mut b = batch(16);
        b.begin();
        for i in 0..10 {
            b.fill_rect(unit(i));
        }
        b.end();
        assert!(b.calls_made() > 1);
        assert_eq!(b.vertices_drawn(), 40);
        assert_eq!(uploaded_vertices(&b), 40);
    }

    #[test]
    fn full_context_history_flushes() {
        let mut b = batch(64);
        assert_eq!(b.config().context_capacity(), 4);
        b.begin();
        for i in 0..6 {
            b.set_texture(Some(Texture::new(TextureId(i as u64 % 2), 4, 4)));
            b.fill_rect(unit(i));
        }
        b.end();
        assert_eq!(b.calls_made(), 6);
        assert_eq!(b.backend().submits(), 2);
    }

    #[test]
    fn oversized_mesh_is_chunked() {
        let poly = Poly2::ellipse(Rect::new(0.0, 0.0, 10.0, 10.0), 40);
        let mut b = batch(16);
        b.begin();
        b.fill_poly(&poly);
        b.end();

        let d = draws(&b);
        assert!(d.len() >= 3);
        assert!(d.iter().all(|d| d.command == DrawCommand::Triangles));
        let total: u32 = d.iter().map(|d| d.indices.end - d.indices.start).sum();
        assert_eq!(total as usize, poly.indices.len());
    }

    #[test]
    fn oversized_outline_is_chunked_as_lines() {
        let path = Path2::new(
            (0..50).map(|i| Vec2::new(i as f32, (i % 2) as f32)).collect(),
            true,
        );
        let mut b = batch(16);
        b.begin();
        b.outline_path(&path);
        b.end();

        let d = draws(&b);
        assert!(d.len() >= 6);
        assert!(d.iter().all(|d| d.command == DrawCommand::Lines));
        let total: u32 = d.iter().map(|d| d.indices.end - d.indices.start).sum();
        assert_eq!(total, 100);
    }

    #[test]
    #[should_panic(expected = "index capacity")]
    fn zero_index_ratio_is_rejected() {
        let config = BatchConfig {
            vertex_capacity: 64,
            index_ratio: 0,
            context_ratio: 16,
        };
        let mut b = SpriteBatch::new(RecordingBackend::new());
        let _ = b.init_with(config, sprite_shader());
    }

    // ── stencil ───────────────────────────────────────────────────────────

    #[test]
    fn stencil_effect_resolves_per_draw() {
        let mut b = batch(64);
        b.begin();
        b.set_stencil_effect(StencilEffect::Stamp);
        b.fill_rect(unit(0));
        b.set_stencil_effect(StencilEffect::Clip);
        b.fill_rect(unit(0));
        b.end();

        let d = draws(&b);
        assert_eq!(d[0].stencil, StencilEffect::Stamp.state());
        assert!(!d[0].stencil.color_writes);
        assert_eq!(d[1].stencil, StencilEffect::Clip.state());
    }

    #[test]
    fn clear_half_stencil_flushes_first() {
        let mut b = batch(64);
        b.begin();
        b.fill_rect(unit(0));
        b.clear_half_stencil(true);
        b.end();

        let calls = b.backend().calls();
        let kinds: Vec<&str> = calls
            .iter()
            .map(|c| match c {
                RecordedCall::Upload { .. } => "upload",
                RecordedCall::UploadUniforms { .. } => "uniforms",
                RecordedCall::Draw(_) => "draw",
                RecordedCall::ClearStencil(_) => "clear",
                RecordedCall::Submit => "submit",
            })
            .collect();
        assert_eq!(kinds, vec!["upload", "uniforms", "draw", "submit", "clear"]);
        assert_eq!(calls[4], RecordedCall::ClearStencil(LOWER_HALF));
    }

    // ── text ──────────────────────────────────────────────────────────────

    #[test]
    fn draw_text_uses_atlas_and_restores_texture() {
        let atlas = Texture::new(TextureId(7), 128, 128);
        let mut run = GlyphRun::new(atlas);
        run.push_glyph(Rect::new(0.0, 0.0, 8.0, 12.0), 0, 0, 8, 12);
        run.push_glyph(Rect::new(8.0, 0.0, 8.0, 12.0), 8, 0, 8, 12);

        let mut b = batch(64);
        b.begin();
        assert_eq!(b.draw_text(&run, Vec2::new(100.0, 50.0)), 8);
        assert_eq!(b.texture(), None);
        b.fill_rect(unit(0));
        b.end();

        let d = draws(&b);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].texture, Some(TextureId(7)));
        assert_eq!(d[0].indices, 0..12);
        assert_eq!(d[1].texture, None);
    }

    #[test]
    fn draw_mesh_keeps_vertex_colors() {
        let mut mesh = SpriteMesh::from_rect(unit(0));
        mesh.vertices_mut()[0].set_color(Color4::BLACK.pack());
        let mut b = batch(64);
        b.begin();
        b.set_color(Color4::new(1.0, 0.0, 0.0, 1.0));
        b.draw_mesh(&mesh);
        assert_eq!(b.pending_vertices()[0].color, Color4::BLACK.pack());
        assert_eq!(b.pending_vertices()[1].color, u32::MAX);
        b.end();
    }

    #[test]
    fn undefined_meshes_are_ignored() {
        let mesh = SpriteMesh::with_parts(vec![SpriteVertex2::from_position(Vec3::ZERO); 5], vec![0, 1, 2, 3, 4]);
        let mut b = batch(64);
        b.begin();
        assert_eq!(b.draw_mesh(&mesh), 0);
        b.end();
        assert_eq!(b.calls_made(), 0);
    }
}
