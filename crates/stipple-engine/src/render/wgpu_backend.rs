//! [`DrawBackend`] over wgpu.
//!
//! Draws are collected between `upload` and `submit` and replayed in a single
//! render pass. Bind group layouts come from shader introspection; every
//! uniform block is bound with a dynamic offset, either into the uploaded
//! [`UniformBuffer`] or into a per-submit arena holding shader-local blocks.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;

use super::{
    Blend, BlendEquation, BlendFactor, DepthState, DrawBackend, DrawCall, RenderTarget,
    StencilCompare, StencilPassOp, StencilState, Texture, TextureId,
};
use crate::mesh::{DrawCommand, MeshVertex, SpriteVertex2};
use crate::shader::{SamplerKind, Shader, ShaderId, Stages, UniformBuffer, UNIFORM_ALIGNMENT};

/// Entry point the GLSL front end gives both stages.
const ENTRY_POINT: &str = "main";

const MIN_BUFFER_SIZE: u64 = 256;

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,

    target: Option<RenderTarget>,
    pending_clear: Option<wgpu::Color>,

    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    uniform_buffer: Option<wgpu::Buffer>,
    arena_buffer: Option<wgpu::Buffer>,
    arena: Vec<u8>,

    programs: HashMap<ShaderId, Program>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    bind_groups: HashMap<BindGroupKey, wgpu::BindGroup>,
    clear_pipelines: HashMap<u8, wgpu::RenderPipeline>,

    textures: HashMap<TextureId, wgpu::TextureView>,
    next_texture: u64,
    white: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,

    pending: Vec<PendingDraw>,
    warned_undefined: bool,
}

impl WgpuBackend {
    /// `depth_format` must carry a stencil aspect (e.g. `Depth24PlusStencil8`).
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        if !depth_format.has_stencil_aspect() {
            log::warn!("WgpuBackend: depth format {depth_format:?} has no stencil; effects will fail validation");
        }
        Self {
            device,
            queue,
            color_format,
            depth_format,
            target: None,
            pending_clear: None,
            vertex_buffer: None,
            index_buffer: None,
            uniform_buffer: None,
            arena_buffer: None,
            arena: Vec::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            bind_groups: HashMap::new(),
            clear_pipelines: HashMap::new(),
            textures: HashMap::new(),
            next_texture: 1,
            white: None,
            sampler: None,
            pending: Vec::new(),
            warned_undefined: false,
        }
    }

    /// Sets the attachments later passes render into.
    pub fn set_target(&mut self, target: RenderTarget) {
        self.pending_clear = target.clear;
        self.target = Some(target);
    }

    /// Drops the target; draws submitted without one are discarded.
    pub fn take_target(&mut self) -> Option<RenderTarget> {
        self.pending_clear = None;
        self.target.take()
    }

    #[inline]
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    #[inline]
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads straight-alpha RGBA8 pixels and registers the texture.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Texture {
        let (width, height) = (width.max(1), height.max(1));
        let expected = (width * height * 4) as usize;
        let mut pixels = Cow::Borrowed(rgba);
        if rgba.len() != expected {
            log::warn!(
                "create_texture: {}x{} needs {expected} bytes, got {}",
                width,
                height,
                rgba.len()
            );
            pixels.to_mut().resize(expected, 0);
        }

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        let view = self.upload_texture(width, height, &pixels, "stipple texture");
        self.textures.insert(id, view);
        Texture::new(id, width, height)
    }

    /// Forgets a texture. Later draws using it sample white.
    pub fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            self.bind_groups.retain(|key, _| key.texture != Some(id));
        }
    }

    fn upload_texture(&self, width: u32, height: u32, rgba: &[u8], label: &str) -> wgpu::TextureView {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn ensure_defaults(&mut self) {
        if self.white.is_none() {
            self.white = Some(self.upload_texture(1, 1, &[255; 4], "stipple white texture"));
        }
        if self.sampler.is_none() {
            self.sampler = Some(self.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("stipple sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            }));
        }
    }

    // ── programs and pipelines ────────────────────────────────────────────

    fn ensure_program(&mut self, shader: &Shader) -> bool {
        if self.programs.contains_key(&shader.id()) {
            return true;
        }
        let Some(stages) = shader.stages() else {
            log::warn!("WgpuBackend: shader {} is not compiled; draw skipped", shader.id().get());
            return false;
        };

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stipple vertex stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(stages.vertex.clone())),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stipple fragment stage"),
            source: wgpu::ShaderSource::Naga(Cow::Owned(stages.fragment.clone())),
        });

        let group_count = shader
            .blocks()
            .iter()
            .map(|b| b.group + 1)
            .chain(shader.samplers().iter().map(|s| s.group + 1))
            .max()
            .unwrap_or(0);

        let mut groups = Vec::with_capacity(group_count as usize);
        for group in 0..group_count {
            let blocks = shader
                .blocks()
                .iter()
                .enumerate()
                .filter(|(_, b)| b.group == group)
                .map(|(index, b)| GroupEntry {
                    binding: b.binding,
                    visibility: visibility(b.stages),
                    kind: EntryKind::Block {
                        index,
                        size: b.size as u64,
                    },
                });
            let samplers = shader
                .samplers()
                .iter()
                .filter(|s| s.group == group)
                .map(|s| GroupEntry {
                    binding: s.binding,
                    visibility: visibility(s.stages),
                    kind: match s.kind {
                        SamplerKind::Texture2D | SamplerKind::Texture => EntryKind::Texture,
                        SamplerKind::Filter => EntryKind::Sampler { comparison: false },
                        SamplerKind::Comparison => EntryKind::Sampler { comparison: true },
                    },
                });
            let mut entries: Vec<GroupEntry> = blocks.chain(samplers).collect();
            entries.sort_by_key(|e| e.binding);
            entries.dedup_by_key(|e| e.binding);

            let layout_entries: Vec<wgpu::BindGroupLayoutEntry> =
                entries.iter().map(GroupEntry::layout_entry).collect();
            let layout = self
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("stipple bgl"),
                    entries: &layout_entries,
                });
            groups.push(GroupLayout { layout, entries });
        }

        let layouts: Vec<&wgpu::BindGroupLayout> = groups.iter().map(|g| &g.layout).collect();
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("stipple pipeline layout"),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });

        log::debug!(
            "WgpuBackend: shader {} mapped to {} bind groups",
            shader.id().get(),
            group_count
        );
        self.programs.insert(
            shader.id(),
            Program {
                vertex,
                fragment,
                groups,
                layout,
            },
        );
        true
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> Option<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return Some(pipeline.clone());
        }
        let program = self.programs.get(&key.shader)?;
        let topology = match key.command {
            DrawCommand::Lines => wgpu::PrimitiveTopology::LineList,
            DrawCommand::Triangles => wgpu::PrimitiveTopology::TriangleList,
            DrawCommand::Undefined => return None,
        };
        let write_mask = if key.stencil.color_writes {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("stipple sprite pipeline"),
            layout: Some(&program.layout),

            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some(ENTRY_POINT),
                compilation_options: Default::default(),
                buffers: &[SpriteVertex2::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some(ENTRY_POINT),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(blend_state(&key.blend)),
                    write_mask,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(depth_stencil_state(self.depth_format, key.depth, &key.stencil)),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(key.clone(), pipeline.clone());
        Some(pipeline)
    }

    fn ensure_clear_pipeline(&mut self, mask: u8) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.clear_pipelines.get(&mask) {
            return pipeline.clone();
        }

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stipple stencil clear shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/stencil_clear.wgsl").into()),
        });
        let face = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Always,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Zero,
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("stipple stencil clear pipeline"),
            layout: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: self.depth_format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState {
                    front: face,
                    back: face,
                    read_mask: 0xFF,
                    write_mask: mask as u32,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.clear_pipelines.insert(mask, pipeline.clone());
        pipeline
    }

    // ── bind groups ───────────────────────────────────────────────────────

    fn ensure_bind_group(&mut self, key: &BindGroupKey) -> Option<wgpu::BindGroup> {
        if let Some(group) = self.bind_groups.get(key) {
            return Some(group.clone());
        }
        self.ensure_defaults();

        let group = self.programs.get(&key.shader)?.groups.get(key.group as usize)?;
        let texture = key
            .texture
            .and_then(|id| self.textures.get(&id))
            .or(self.white.as_ref())?;
        let sampler = self.sampler.as_ref()?;

        let mut block = 0;
        let mut entries = Vec::with_capacity(group.entries.len());
        for entry in &group.entries {
            let resource = match entry.kind {
                EntryKind::Block { size, .. } => {
                    let local = key.local_mask & (1 << block) != 0;
                    block += 1;
                    let buffer = if local {
                        self.arena_buffer.as_ref()?
                    } else {
                        self.uniform_buffer.as_ref()?
                    };
                    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(size),
                    })
                }
                EntryKind::Texture => wgpu::BindingResource::TextureView(texture),
                EntryKind::Sampler { .. } => wgpu::BindingResource::Sampler(sampler),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: entry.binding,
                resource,
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stipple bind group"),
            layout: &group.layout,
            entries: &entries,
        });
        self.bind_groups.insert(key.clone(), bind_group.clone());
        Some(bind_group)
    }

    /// Grows `slot` to hold `required` bytes. Returns true when reallocated.
    fn ensure_buffer(
        device: &wgpu::Device,
        slot: &mut Option<wgpu::Buffer>,
        required: u64,
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> bool {
        if slot.as_ref().is_some_and(|b| b.size() >= required) {
            return false;
        }
        let size = required.next_power_of_two().max(MIN_BUFFER_SIZE);
        *slot = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        true
    }

    // ── passes ────────────────────────────────────────────────────────────

    fn attachment_loads(&mut self) -> (wgpu::LoadOp<wgpu::Color>, wgpu::LoadOp<f32>, wgpu::LoadOp<u32>) {
        match self.pending_clear.take() {
            Some(color) => (
                wgpu::LoadOp::Clear(color),
                wgpu::LoadOp::Clear(1.0),
                wgpu::LoadOp::Clear(0),
            ),
            None => (wgpu::LoadOp::Load, wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        }
    }
}

impl DrawBackend for WgpuBackend {
    fn upload(&mut self, vertices: &[SpriteVertex2], indices: &[u32]) {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        Self::ensure_buffer(
            &self.device,
            &mut self.vertex_buffer,
            vertex_bytes.len() as u64,
            wgpu::BufferUsages::VERTEX,
            "stipple vertex buffer",
        );
        Self::ensure_buffer(
            &self.device,
            &mut self.index_buffer,
            index_bytes.len() as u64,
            wgpu::BufferUsages::INDEX,
            "stipple index buffer",
        );

        if let (Some(vbo), false) = (self.vertex_buffer.as_ref(), vertex_bytes.is_empty()) {
            self.queue.write_buffer(vbo, 0, vertex_bytes);
        }
        if let (Some(ibo), false) = (self.index_buffer.as_ref(), index_bytes.is_empty()) {
            self.queue.write_buffer(ibo, 0, index_bytes);
        }
    }

    fn upload_uniforms(&mut self, uniforms: &UniformBuffer) {
        let bytes = uniforms.bytes();
        let reallocated = Self::ensure_buffer(
            &self.device,
            &mut self.uniform_buffer,
            bytes.len() as u64,
            wgpu::BufferUsages::UNIFORM,
            "stipple uniform buffer",
        );
        if reallocated {
            self.bind_groups.clear();
        }
        if let (Some(ubo), false) = (self.uniform_buffer.as_ref(), bytes.is_empty()) {
            self.queue.write_buffer(ubo, 0, bytes);
        }
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        if call.command == DrawCommand::Undefined {
            if !self.warned_undefined {
                log::warn!("WgpuBackend: draw with undefined command ignored");
                self.warned_undefined = true;
            }
            return;
        }
        if call.indices.is_empty() {
            return;
        }
        let shader = call.shader;
        if !self.ensure_program(shader) {
            return;
        }

        let key = PipelineKey {
            shader: shader.id(),
            blend: call.blend,
            stencil: StencilState {
                reference: 0,
                ..call.stencil
            },
            depth: call.depth,
            command: call.command,
        };
        let Some(pipeline) = self.ensure_pipeline(&key) else { return };
        let Some(program) = self.programs.get(&shader.id()) else { return };

        let uniform_offset = (call.uniform_block * call.uniforms.stride()) as u32;
        let mut groups = Vec::with_capacity(program.groups.len());
        for (group, layout) in program.groups.iter().enumerate() {
            let mut offsets = Vec::new();
            let mut local_mask = 0u64;
            for entry in &layout.entries {
                let EntryKind::Block { index, .. } = entry.kind else { continue };
                if shader.block_bind_point(index).is_some() {
                    offsets.push(uniform_offset);
                } else {
                    local_mask |= 1 << offsets.len();
                    let bytes = shader.local_block(index).unwrap_or(&[]);
                    offsets.push(push_local(&mut self.arena, bytes));
                }
            }
            groups.push(PendingGroup {
                key: BindGroupKey {
                    shader: shader.id(),
                    group: group as u32,
                    texture: call.texture,
                    local_mask,
                },
                offsets,
            });
        }

        self.pending.push(PendingDraw {
            pipeline,
            groups,
            reference: call.stencil.reference as u32,
            indices: call.indices.clone(),
        });
    }

    fn clear_stencil(&mut self, mask: u8) {
        if self.target.is_none() {
            log::warn!("WgpuBackend: clear_stencil without a target");
            return;
        }
        let pipeline = self.ensure_clear_pipeline(mask);
        let (color_load, depth_load, stencil_load) = self.attachment_loads();
        let Some(target) = self.target.as_ref() else { return };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stipple stencil clear encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stipple stencil clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_stencil,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&pipeline);
            rpass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn submit(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() && self.pending_clear.is_none() {
            self.arena.clear();
            return;
        }
        if self.target.is_none() {
            log::warn!("WgpuBackend: {} draws submitted without a target", pending.len());
            self.arena.clear();
            return;
        }

        // Local blocks land in the arena before any bind group refers to it.
        if !self.arena.is_empty() {
            let reallocated = Self::ensure_buffer(
                &self.device,
                &mut self.arena_buffer,
                self.arena.len() as u64,
                wgpu::BufferUsages::UNIFORM,
                "stipple local uniform arena",
            );
            if reallocated {
                self.bind_groups.clear();
            }
            if let Some(arena) = self.arena_buffer.as_ref() {
                self.queue.write_buffer(arena, 0, &self.arena);
            }
            self.arena.clear();
        }

        let mut resolved = Vec::with_capacity(pending.len());
        for draw in &pending {
            let groups: Option<Vec<wgpu::BindGroup>> =
                draw.groups.iter().map(|g| self.ensure_bind_group(&g.key)).collect();
            match groups {
                Some(groups) => resolved.push(groups),
                None => {
                    log::warn!("WgpuBackend: missing resources for a draw; batch skipped");
                    return;
                }
            }
        }

        let (color_load, depth_load, stencil_load) = self.attachment_loads();
        let Some(target) = self.target.as_ref() else { return };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stipple batch encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("stipple batch pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_stencil,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: stencil_load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let (Some(vbo), Some(ibo)) = (self.vertex_buffer.as_ref(), self.index_buffer.as_ref()) {
                rpass.set_vertex_buffer(0, vbo.slice(..));
                rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);

                for (draw, groups) in pending.iter().zip(&resolved) {
                    rpass.set_pipeline(&draw.pipeline);
                    for (i, (group, pending_group)) in groups.iter().zip(&draw.groups).enumerate() {
                        rpass.set_bind_group(i as u32, group, &pending_group.offsets);
                    }
                    rpass.set_stencil_reference(draw.reference);
                    rpass.draw_indexed(draw.indices.clone(), 0, 0..1);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

// ── internal types ────────────────────────────────────────────────────────

struct Program {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    groups: Vec<GroupLayout>,
    layout: wgpu::PipelineLayout,
}

struct GroupLayout {
    layout: wgpu::BindGroupLayout,
    /// Sorted by binding, which is also the dynamic offset order.
    entries: Vec<GroupEntry>,
}

struct GroupEntry {
    binding: u32,
    visibility: wgpu::ShaderStages,
    kind: EntryKind,
}

#[derive(Copy, Clone)]
enum EntryKind {
    Block { index: usize, size: u64 },
    Texture,
    Sampler { comparison: bool },
}

impl GroupEntry {
    fn layout_entry(&self) -> wgpu::BindGroupLayoutEntry {
        let ty = match self.kind {
            EntryKind::Block { size, .. } => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            EntryKind::Texture => wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            EntryKind::Sampler { comparison: false } => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
            }
            EntryKind::Sampler { comparison: true } => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison)
            }
        };
        wgpu::BindGroupLayoutEntry {
            binding: self.binding,
            visibility: self.visibility,
            ty,
            count: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: ShaderId,
    blend: Blend,
    /// Reference zeroed; it is dynamic pass state.
    stencil: StencilState,
    depth: DepthState,
    command: DrawCommand,
}

/// Block `i` of the group (in binding order) reads the arena when bit `i`
/// of `local_mask` is set, the uniform buffer otherwise.
#[derive(Clone, PartialEq, Eq, Hash)]
struct BindGroupKey {
    shader: ShaderId,
    group: u32,
    texture: Option<TextureId>,
    local_mask: u64,
}

struct PendingGroup {
    key: BindGroupKey,
    offsets: Vec<u32>,
}

struct PendingDraw {
    pipeline: wgpu::RenderPipeline,
    groups: Vec<PendingGroup>,
    reference: u32,
    indices: Range<u32>,
}

// ── conversions ───────────────────────────────────────────────────────────

/// Appends a block to the arena at an aligned offset and returns it.
fn push_local(arena: &mut Vec<u8>, bytes: &[u8]) -> u32 {
    let offset = arena.len();
    arena.extend_from_slice(bytes);
    let padded = arena.len().div_ceil(UNIFORM_ALIGNMENT) * UNIFORM_ALIGNMENT;
    arena.resize(padded, 0);
    offset as u32
}

fn visibility(stages: Stages) -> wgpu::ShaderStages {
    let mut out = wgpu::ShaderStages::NONE;
    if stages.vertex {
        out |= wgpu::ShaderStages::VERTEX;
    }
    if stages.fragment {
        out |= wgpu::ShaderStages::FRAGMENT;
    }
    out
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn blend_component(src: BlendFactor, dst: BlendFactor, equation: BlendEquation) -> wgpu::BlendComponent {
    let operation = match equation {
        BlendEquation::Add => wgpu::BlendOperation::Add,
        BlendEquation::Subtract => wgpu::BlendOperation::Subtract,
        BlendEquation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendEquation::Min => wgpu::BlendOperation::Min,
        BlendEquation::Max => wgpu::BlendOperation::Max,
    };
    // wgpu rejects min/max with factors other than One.
    let (src_factor, dst_factor) = match equation {
        BlendEquation::Min | BlendEquation::Max => (wgpu::BlendFactor::One, wgpu::BlendFactor::One),
        _ => (blend_factor(src), blend_factor(dst)),
    };
    wgpu::BlendComponent {
        src_factor,
        dst_factor,
        operation,
    }
}

fn blend_state(blend: &Blend) -> wgpu::BlendState {
    wgpu::BlendState {
        color: blend_component(blend.src_rgb, blend.dst_rgb, blend.equation_rgb),
        alpha: blend_component(blend.src_alpha, blend.dst_alpha, blend.equation_alpha),
    }
}

fn depth_stencil_state(
    format: wgpu::TextureFormat,
    depth: DepthState,
    stencil: &StencilState,
) -> wgpu::DepthStencilState {
    let stencil = if stencil.enabled() {
        let face = wgpu::StencilFaceState {
            compare: match stencil.compare {
                StencilCompare::Always => wgpu::CompareFunction::Always,
                StencilCompare::Equal => wgpu::CompareFunction::Equal,
                StencilCompare::NotEqual => wgpu::CompareFunction::NotEqual,
            },
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: match stencil.pass_op {
                StencilPassOp::Keep => wgpu::StencilOperation::Keep,
                StencilPassOp::Replace => wgpu::StencilOperation::Replace,
                StencilPassOp::Invert => wgpu::StencilOperation::Invert,
                StencilPassOp::Zero => wgpu::StencilOperation::Zero,
            },
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: stencil.read_mask as u32,
            write_mask: stencil.write_mask as u32,
        }
    } else {
        // Native and disabled both draw without touching the stencil.
        wgpu::StencilState::default()
    };

    wgpu::DepthStencilState {
        format,
        depth_write_enabled: depth.write,
        depth_compare: if depth.test {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        },
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BlendMode, StencilEffect};

    #[test]
    fn push_local_aligns_each_block() {
        let mut arena = Vec::new();
        assert_eq!(push_local(&mut arena, &[1; 64]), 0);
        assert_eq!(push_local(&mut arena, &[2; 300]), 256);
        assert_eq!(push_local(&mut arena, &[3; 16]), 768);
        assert_eq!(arena.len(), 1024);
        assert_eq!(arena[256], 2);
        assert_eq!(arena[784], 0);
    }

    #[test]
    fn min_max_force_unit_factors() {
        let mut blend = BlendMode::Alpha.blend();
        blend.equation_rgb = BlendEquation::Max;
        let state = blend_state(&blend);
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(state.color.operation, wgpu::BlendOperation::Max);
        assert_eq!(state.alpha.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn stencil_state_maps_masks_and_ops() {
        let state = StencilEffect::Stamp.state();
        let ds = depth_stencil_state(wgpu::TextureFormat::Depth24PlusStencil8, DepthState::default(), &state);
        assert_eq!(ds.stencil.write_mask, state.write_mask as u32);
        assert_eq!(ds.stencil.read_mask, state.read_mask as u32);
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Always);
        assert!(!ds.depth_write_enabled);

        let native = depth_stencil_state(
            wgpu::TextureFormat::Depth24PlusStencil8,
            DepthState { test: true, write: true },
            &StencilEffect::Native.state(),
        );
        assert_eq!(native.stencil, wgpu::StencilState::default());
        assert_eq!(native.depth_compare, wgpu::CompareFunction::LessEqual);
        assert!(native.depth_write_enabled);
    }

    #[test]
    fn visibility_follows_stages() {
        let both = Stages { vertex: true, fragment: true };
        assert_eq!(visibility(both), wgpu::ShaderStages::VERTEX_FRAGMENT);
        assert_eq!(visibility(Stages::default()), wgpu::ShaderStages::NONE);
    }
}
