use glam::Vec2;

use super::Texture;
use crate::coords::Rect;

/// One positioned glyph: a quad on screen and its region in the atlas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphQuad {
    /// Quad relative to the run origin.
    pub bounds: Rect,
    pub uv_min: Vec2,
    pub uv_max: Vec2,
}

/// Laid-out text: an atlas texture plus textured quads.
///
/// Shaping and rasterisation happen upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub texture: Texture,
    pub quads: Vec<GlyphQuad>,
}

impl GlyphRun {
    pub fn new(texture: Texture) -> Self {
        Self {
            texture,
            quads: Vec::new(),
        }
    }

    /// Adds a glyph whose atlas region is given in pixels.
    pub fn push_glyph(&mut self, bounds: Rect, atlas_x: u32, atlas_y: u32, atlas_w: u32, atlas_h: u32) {
        let region = self.texture.region(atlas_x, atlas_y, atlas_w, atlas_h);
        self.quads.push(GlyphQuad {
            bounds,
            uv_min: region.uv_min(),
            uv_max: region.uv_max(),
        });
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.quads.len()
    }
}
