use glam::Vec2;

/// Backend-side texture handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// A texture as the batch sees it: identity, size, bind point and the
/// `s`/`t` sub-region shapes are mapped onto.
///
/// Pixel data lives in the backend (see `WgpuBackend::create_texture`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub bind_point: u32,
    pub min_s: f32,
    pub max_s: f32,
    pub min_t: f32,
    pub max_t: f32,
}

impl Texture {
    /// Whole-texture region on bind point 0.
    pub fn new(id: TextureId, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            bind_point: 0,
            min_s: 0.0,
            max_s: 1.0,
            min_t: 0.0,
            max_t: 1.0,
        }
    }

    /// Same texture restricted to the pixel rectangle `(x, y, w, h)`.
    pub fn region(&self, x: u32, y: u32, w: u32, h: u32) -> Self {
        let (tw, th) = (self.width.max(1) as f32, self.height.max(1) as f32);
        Self {
            min_s: x as f32 / tw,
            max_s: (x + w) as f32 / tw,
            min_t: y as f32 / th,
            max_t: (y + h) as f32 / th,
            ..*self
        }
    }

    #[inline]
    pub fn uv_min(&self) -> Vec2 {
        Vec2::new(self.min_s, self.min_t)
    }

    #[inline]
    pub fn uv_max(&self) -> Vec2 {
        Vec2::new(self.max_s, self.max_t)
    }

    /// One texel in uv units.
    #[inline]
    pub fn texel(&self) -> Vec2 {
        Vec2::new(1.0 / self.width.max(1) as f32, 1.0 / self.height.max(1) as f32)
    }
}
