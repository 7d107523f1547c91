//! std140 encoding of the values uniform setters accept.

use glam::{Affine2, Mat2, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

use crate::paint::Color4;

/// A value with a std140 byte representation.
///
/// `SIZE` is the footprint of one value; array elements are padded to
/// [`std140_stride`].
pub trait Std140: Sized {
    const SIZE: usize;

    /// Writes `Self::SIZE` bytes to the front of `out`.
    fn write_std140(&self, out: &mut [u8]);

    /// Reads a value back from the front of `bytes`.
    fn read_std140(bytes: &[u8]) -> Self;
}

/// Array element stride for `T` (rounded up to 16 bytes).
#[inline]
pub const fn std140_stride<T: Std140>() -> usize {
    (T::SIZE + 15) & !15
}

#[inline]
fn put(out: &mut [u8], offset: usize, values: &[f32]) {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

#[inline]
fn get<const N: usize>(bytes: &[u8], offset: usize) -> [f32; N] {
    let mut v = [0.0f32; N];
    for (i, slot) in v.iter_mut().enumerate() {
        let at = offset + i * 4;
        *slot = f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    }
    v
}

// ── scalars ───────────────────────────────────────────────────────────────

impl Std140 for f32 {
    const SIZE: usize = 4;

    fn write_std140(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        get::<1>(bytes, 0)[0]
    }
}

impl Std140 for i32 {
    const SIZE: usize = 4;

    fn write_std140(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Std140 for u32 {
    const SIZE: usize = 4;

    fn write_std140(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

// ── vectors ───────────────────────────────────────────────────────────────

impl Std140 for Vec2 {
    const SIZE: usize = 8;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Vec2::from_array(get(bytes, 0))
    }
}

impl Std140 for Vec3 {
    const SIZE: usize = 12;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Vec3::from_array(get(bytes, 0))
    }
}

impl Std140 for Vec4 {
    const SIZE: usize = 16;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Vec4::from_array(get(bytes, 0))
    }
}

impl Std140 for Quat {
    const SIZE: usize = 16;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Quat::from_array(get(bytes, 0))
    }
}

impl Std140 for Color4 {
    const SIZE: usize = 16;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Color4::from(get::<4>(bytes, 0))
    }
}

// ── matrices ──────────────────────────────────────────────────────────────
//
// Columns are padded to 16 bytes.

impl Std140 for Mat2 {
    const SIZE: usize = 32;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.x_axis.to_array());
        put(out, 16, &self.y_axis.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Mat2::from_cols(Vec2::from_array(get(bytes, 0)), Vec2::from_array(get(bytes, 16)))
    }
}

impl Std140 for Mat3 {
    const SIZE: usize = 48;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.x_axis.to_array());
        put(out, 16, &self.y_axis.to_array());
        put(out, 32, &self.z_axis.to_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Mat3::from_cols(
            Vec3::from_array(get(bytes, 0)),
            Vec3::from_array(get(bytes, 16)),
            Vec3::from_array(get(bytes, 32)),
        )
    }
}

/// Encoded as the homogeneous 3x3 matrix `mat3`.
impl Std140 for Affine2 {
    const SIZE: usize = 48;

    fn write_std140(&self, out: &mut [u8]) {
        Mat3::from(*self).write_std140(out);
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Affine2::from_mat3(Mat3::read_std140(bytes))
    }
}

impl Std140 for Mat4 {
    const SIZE: usize = 64;

    fn write_std140(&self, out: &mut [u8]) {
        put(out, 0, &self.to_cols_array());
    }

    fn read_std140(bytes: &[u8]) -> Self {
        Mat4::from_cols_array(&get::<16>(bytes, 0))
    }
}

/// Column-major `C`x`R` matrices (`matCxR` in GLSL), `R` up to 4.
impl<const R: usize, const C: usize> Std140 for [[f32; R]; C] {
    const SIZE: usize = C * 16;

    fn write_std140(&self, out: &mut [u8]) {
        debug_assert!(R <= 4, "matrix columns hold at most 4 rows");
        for (c, column) in self.iter().enumerate() {
            put(out, c * 16, column);
        }
    }

    fn read_std140(bytes: &[u8]) -> Self {
        let mut m = [[0.0f32; R]; C];
        for (c, column) in m.iter_mut().enumerate() {
            for (r, value) in column.iter_mut().enumerate() {
                *value = get::<1>(bytes, c * 16 + r * 4)[0];
            }
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Std140>(v: &T) -> Vec<u8> {
        let mut out = vec![0u8; T::SIZE];
        v.write_std140(&mut out);
        out
    }

    #[test]
    fn mat3_columns_are_padded() {
        let m = Mat3::from_cols_array(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let bytes = encode(&m);
        assert_eq!(bytes.len(), 48);
        assert_eq!(f32::read_std140(&bytes[16..]), 4.0);
        assert_eq!(f32::read_std140(&bytes[12..]), 0.0);
        assert_eq!(Mat3::read_std140(&bytes), m);
    }

    #[test]
    fn affine2_encodes_translation_in_third_column() {
        let a = Affine2::from_translation(Vec2::new(3.0, 4.0));
        let bytes = encode(&a);
        assert_eq!(Vec3::read_std140(&bytes[32..]), Vec3::new(3.0, 4.0, 1.0));
    }

    #[test]
    fn non_square_matrix_uses_sixteen_byte_columns() {
        let m: [[f32; 2]; 3] = [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert_eq!(<[[f32; 2]; 3]>::SIZE, 48);
        let bytes = encode(&m);
        assert_eq!(f32::read_std140(&bytes[32..]), 5.0);
        assert_eq!(<[[f32; 2]; 3]>::read_std140(&bytes), m);
    }

    #[test]
    fn array_stride_rounds_to_sixteen() {
        assert_eq!(std140_stride::<f32>(), 16);
        assert_eq!(std140_stride::<Vec3>(), 16);
        assert_eq!(std140_stride::<Mat3>(), 48);
    }
}
