use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Vertex contract for [`Mesh`](super::Mesh).
///
/// Every vertex exposes a 3D position (2D vertices report `z = 0` and ignore
/// writes to it), a packed RGBA8 color, a texture coordinate and a gradient
/// coordinate. The GPU layout is described by [`MeshVertex::layout`].
pub trait MeshVertex: Pod + Default {
    fn from_position(position: Vec3) -> Self;

    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);

    fn color(&self) -> u32;
    fn set_color(&mut self, packed: u32);

    fn texcoord(&self) -> Vec2;
    fn set_texcoord(&mut self, uv: Vec2);

    fn gradcoord(&self) -> Vec2;
    fn set_gradcoord(&mut self, coord: Vec2);

    fn layout() -> wgpu::VertexBufferLayout<'static>;
}

// ── 2D ────────────────────────────────────────────────────────────────────

/// 2D sprite vertex, 28 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex2 {
    pub position: [f32; 2],
    pub color: u32,
    pub texcoord: [f32; 2],
    pub gradcoord: [f32; 2],
}

impl SpriteVertex2 {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Unorm8x4,  // color
        2 => Float32x2, // texcoord
        3 => Float32x2  // gradcoord
    ];
}

impl MeshVertex for SpriteVertex2 {
    #[inline]
    fn from_position(position: Vec3) -> Self {
        Self {
            position: [position.x, position.y],
            color: u32::MAX,
            ..Self::default()
        }
    }

    #[inline]
    fn position(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], 0.0)
    }

    #[inline]
    fn set_position(&mut self, position: Vec3) {
        self.position = [position.x, position.y];
    }

    #[inline]
    fn color(&self) -> u32 {
        self.color
    }

    #[inline]
    fn set_color(&mut self, packed: u32) {
        self.color = packed;
    }

    #[inline]
    fn texcoord(&self) -> Vec2 {
        Vec2::from_array(self.texcoord)
    }

    #[inline]
    fn set_texcoord(&mut self, uv: Vec2) {
        self.texcoord = uv.to_array();
    }

    #[inline]
    fn gradcoord(&self) -> Vec2 {
        Vec2::from_array(self.gradcoord)
    }

    #[inline]
    fn set_gradcoord(&mut self, coord: Vec2) {
        self.gradcoord = coord.to_array();
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex2>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

// ── 3D ────────────────────────────────────────────────────────────────────

/// Sprite vertex with a depth coordinate, 32 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex3 {
    pub position: [f32; 3],
    pub color: u32,
    pub texcoord: [f32; 2],
    pub gradcoord: [f32; 2],
}

impl SpriteVertex3 {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Unorm8x4,  // color
        2 => Float32x2, // texcoord
        3 => Float32x2  // gradcoord
    ];
}

impl MeshVertex for SpriteVertex3 {
    #[inline]
    fn from_position(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            color: u32::MAX,
            ..Self::default()
        }
    }

    #[inline]
    fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    fn set_position(&mut self, position: Vec3) {
        self.position = position.to_array();
    }

    #[inline]
    fn color(&self) -> u32 {
        self.color
    }

    #[inline]
    fn set_color(&mut self, packed: u32) {
        self.color = packed;
    }

    #[inline]
    fn texcoord(&self) -> Vec2 {
        Vec2::from_array(self.texcoord)
    }

    #[inline]
    fn set_texcoord(&mut self, uv: Vec2) {
        self.texcoord = uv.to_array();
    }

    #[inline]
    fn gradcoord(&self) -> Vec2 {
        Vec2::from_array(self.gradcoord)
    }

    #[inline]
    fn set_gradcoord(&mut self, coord: Vec2) {
        self.gradcoord = coord.to_array();
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex3>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn sprite_vertex2_layout() {
        assert_eq!(size_of::<SpriteVertex2>(), 28);
        assert_eq!(offset_of!(SpriteVertex2, color), 8);
        assert_eq!(offset_of!(SpriteVertex2, texcoord), 12);
        assert_eq!(offset_of!(SpriteVertex2, gradcoord), 20);

        let layout = SpriteVertex2::layout();
        assert_eq!(layout.array_stride, 28);
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 12, 20]);
    }

    #[test]
    fn sprite_vertex3_layout() {
        assert_eq!(size_of::<SpriteVertex3>(), 32);
        assert_eq!(offset_of!(SpriteVertex3, color), 12);
        assert_eq!(offset_of!(SpriteVertex3, texcoord), 16);
        assert_eq!(offset_of!(SpriteVertex3, gradcoord), 24);

        let offsets: Vec<u64> = SpriteVertex3::layout().attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 16, 24]);
    }

    #[test]
    fn two_dimensional_vertex_drops_depth() {
        let mut v = SpriteVertex2::from_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.position(), Vec3::new(1.0, 2.0, 0.0));
        v.set_position(Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(v.position, [4.0, 5.0]);
        assert_eq!(v.color, u32::MAX);
    }
}
