use glam::Vec4;

/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Vertices carry colors packed to RGBA8 (see [`Color4::pack`]); the unpacked
/// form is used for uniforms (gradient stops) and blending math.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const CLEAR: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a color from 8-bit channels.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    /// Packs into a `u32` whose little-endian bytes are `r, g, b, a`.
    ///
    /// This is the layout a `unorm8x4` vertex attribute reads back as
    /// `vec4(r, g, b, a)`.
    #[inline]
    pub fn pack(self) -> u32 {
        let c = self.clamped();
        let q = |v: f32| (v * 255.0).round() as u32;
        q(c.r) | (q(c.g) << 8) | (q(c.b) << 16) | (q(c.a) << 24)
    }

    /// Inverse of [`pack`](Self::pack).
    #[inline]
    pub fn unpack(packed: u32) -> Self {
        let [r, g, b, a] = packed.to_le_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    /// Component-wise product, used to tint colors.
    #[inline]
    pub fn modulate(self, other: Self) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b, self.a * other.a)
    }

    /// Returns the premultiplied-alpha form.
    #[inline]
    pub fn premultiplied(self) -> Self {
        Self::new(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Clamps all channels to `[0, 1]`.
    #[inline]
    pub fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::from_array(self.to_array())
    }
}

impl From<[f32; 4]> for Color4 {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_puts_red_in_the_low_byte() {
        assert_eq!(Color4::new(1.0, 0.0, 0.0, 0.0).pack(), 0x0000_00ff);
        assert_eq!(Color4::new(0.0, 0.0, 0.0, 1.0).pack(), 0xff00_0000);
        assert_eq!(Color4::WHITE.pack(), u32::MAX);
    }

    #[test]
    fn pack_clamps_out_of_range_channels() {
        assert_eq!(Color4::new(2.0, -1.0, 0.0, 1.0).pack(), 0xff00_00ff);
    }

    #[test]
    fn unpack_inverts_pack_for_byte_values() {
        let c = Color4::from_rgba8(12, 34, 56, 78);
        assert_eq!(Color4::unpack(c.pack()), c);
    }
}
