use glam::{Affine2, Vec2};

use super::Color4;

/// Gradient descriptor consumed by the sprite shader.
///
/// The model is a feathered rounded box in *gradient space*: the color is
/// `inner` inside the box, `outer` outside it, blended across `feather`.
/// `transform` maps gradient space into the coordinate space of the vertex
/// gradient coordinates. Linear and radial gradients are special cases.
///
/// Vertex colors keep modulating the result, so while a gradient is active
/// the per-vertex color acts as a modulation factor rather than a tint.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Gradient {
    pub transform: Affine2,
    pub extent: Vec2,
    pub radius: f32,
    pub feather: f32,
    pub inner: Color4,
    pub outer: Color4,
}

/// Half-size used for the "infinite" box of a linear gradient.
const LINEAR_EXTENT: f32 = 1.0e5;

impl Gradient {
    /// Linear gradient from `start` (inner color) to `end` (outer color).
    pub fn linear(start: Vec2, end: Vec2, inner: Color4, outer: Color4) -> Self {
        let delta = end - start;
        let length = delta.length();
        let dir = if length > f32::EPSILON { delta / length } else { Vec2::Y };

        // Columns map gradient-space x along the normal and y along the axis.
        let origin = start - dir * LINEAR_EXTENT;
        let transform = Affine2::from_cols(Vec2::new(dir.y, -dir.x), dir, origin);

        Self {
            transform,
            extent: Vec2::new(LINEAR_EXTENT, LINEAR_EXTENT + length * 0.5),
            radius: 0.0,
            feather: length.max(1.0),
            inner,
            outer,
        }
    }

    /// Radial gradient between two radii around `center`.
    pub fn radial(center: Vec2, inner_radius: f32, outer_radius: f32, inner: Color4, outer: Color4) -> Self {
        let r = (inner_radius + outer_radius) * 0.5;
        Self {
            transform: Affine2::from_translation(center),
            extent: Vec2::splat(r),
            radius: r,
            feather: (outer_radius - inner_radius).max(1.0),
            inner,
            outer,
        }
    }

    /// Feathered rounded-box gradient; `origin`/`size` describe the box.
    pub fn boxed(origin: Vec2, size: Vec2, radius: f32, feather: f32, inner: Color4, outer: Color4) -> Self {
        Self {
            transform: Affine2::from_translation(origin + size * 0.5),
            extent: size * 0.5,
            radius,
            feather: feather.max(1.0),
            inner,
            outer,
        }
    }

    /// Matrix the shader applies to gradient coordinates (inverse transform).
    #[inline]
    pub fn matrix(&self) -> Affine2 {
        self.transform.inverse()
    }

    /// Returns a copy whose gradient space is additionally moved by `transform`.
    pub fn transformed(&self, transform: Affine2) -> Self {
        Self {
            transform: transform * self.transform,
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_axis_maps_start_to_box_edge() {
        let g = Gradient::linear(Vec2::new(0.0, 0.0), Vec2::new(0.0, 10.0), Color4::WHITE, Color4::BLACK);
        let p = g.matrix().transform_point2(Vec2::new(0.0, 0.0));
        // Start sits `LINEAR_EXTENT` along the axis from the box origin.
        assert!((p.y - LINEAR_EXTENT).abs() < 1e-1);
        assert_eq!(g.feather, 10.0);
    }

    #[test]
    fn radial_centers_the_box() {
        let g = Gradient::radial(Vec2::new(5.0, 5.0), 2.0, 4.0, Color4::WHITE, Color4::CLEAR);
        assert_eq!(g.matrix().transform_point2(Vec2::new(5.0, 5.0)), Vec2::ZERO);
        assert_eq!(g.radius, 3.0);
        assert_eq!(g.feather, 2.0);
    }
}
