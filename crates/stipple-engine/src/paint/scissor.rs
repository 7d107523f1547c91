use glam::{Affine2, Vec2};

use crate::coords::Rect;

/// A (possibly transformed) rectangular scissor mask.
///
/// Unlike hardware scissoring, the mask is evaluated in the fragment shader,
/// so rotated rectangles work and edges can be softened by `fringe`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Scissor {
    pub bounds: Rect,
    pub transform: Affine2,
    pub fringe: f32,
}

impl Scissor {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds: bounds.normalized(),
            transform: Affine2::IDENTITY,
            fringe: 1.0,
        }
    }

    pub fn with_transform(bounds: Rect, transform: Affine2) -> Self {
        Self {
            transform,
            ..Self::new(bounds)
        }
    }

    /// Matrix mapping a position into box space centered on the scissor.
    pub fn matrix(&self) -> Affine2 {
        (self.transform * Affine2::from_translation(self.bounds.center())).inverse()
    }

    #[inline]
    pub fn extent(&self) -> Vec2 {
        self.bounds.size * 0.5
    }

    /// Per-axis edge scale; the shader multiplies signed distances by it.
    pub fn fringe_scale(&self) -> Vec2 {
        let fringe = self.fringe.max(f32::EPSILON);
        let m = self.transform.matrix2;
        let sx = Vec2::new(m.x_axis.x, m.y_axis.x).length();
        let sy = Vec2::new(m.x_axis.y, m.y_axis.y).length();
        Vec2::new(sx / fringe, sy / fringe)
    }

    /// Restricts this scissor to the overlap with `other` when both share a transform.
    ///
    /// Scissors with different transforms cannot be intersected exactly; the
    /// incoming one wins in that case.
    pub fn intersect(&self, other: &Scissor) -> Scissor {
        if self.transform != other.transform {
            return *other;
        }
        let bounds = self
            .bounds
            .intersect(other.bounds)
            .unwrap_or(Rect::from_origin_size(self.bounds.origin, Vec2::ZERO));
        Scissor { bounds, ..*other }
    }

    /// CPU reference for the shader test (hard edge).
    pub fn contains(&self, p: Vec2) -> bool {
        let local = self.matrix().transform_point2(p);
        let ext = self.extent();
        local.x.abs() <= ext.x && local.y.abs() <= ext.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_scissor_contains_rotated_points() {
        let s = Scissor::with_transform(
            Rect::new(0.0, 0.0, 10.0, 2.0),
            Affine2::from_angle(std::f32::consts::FRAC_PI_2),
        );
        // The box (center 5,1) rotated a quarter turn lands around (-1, 5).
        assert!(s.contains(Vec2::new(-1.0, 5.0)));
        assert!(!s.contains(Vec2::new(5.0, 1.0)));
    }

    #[test]
    fn intersect_shrinks_bounds() {
        let a = Scissor::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        let b = Scissor::new(Rect::new(5.0, 5.0, 10.0, 10.0));
        assert_eq!(a.intersect(&b).bounds, Rect::new(5.0, 5.0, 5.0, 5.0));
    }
}
