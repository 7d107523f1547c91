use glam::Vec2;

use super::Rect;

/// A triangulated polygon.
///
/// Triangulation happens upstream; `indices` is a flat triangle list into
/// `vertices`. Orientation and hole handling are the producer's business.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Poly2 {
    pub vertices: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl Poly2 {
    pub fn new(vertices: Vec<Vec2>, indices: Vec<u32>) -> Self {
        debug_assert!(indices.len() % 3 == 0, "Poly2 indices must form triangles");
        Self { vertices, indices }
    }

    /// Two-triangle polygon covering `rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            vertices: rect.corners().to_vec(),
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Triangle fan around the first vertex of a convex outline.
    pub fn from_convex(outline: &[Vec2]) -> Self {
        let mut indices = Vec::with_capacity(outline.len().saturating_sub(2) * 3);
        for i in 1..outline.len().saturating_sub(1) {
            indices.extend_from_slice(&[0, i as u32, i as u32 + 1]);
        }
        Self {
            vertices: outline.to_vec(),
            indices,
        }
    }

    /// Regular `segments`-gon approximating an ellipse inscribed in `rect`.
    pub fn ellipse(rect: Rect, segments: u32) -> Self {
        let segments = segments.max(3);
        let center = rect.center();
        let radius = rect.size * 0.5;
        let outline: Vec<Vec2> = (0..segments)
            .map(|i| {
                let theta = std::f32::consts::TAU * i as f32 / segments as f32;
                center + Vec2::new(theta.cos(), theta.sin()) * radius
            })
            .collect();
        Self::from_convex(&outline)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.vertices.iter().copied())
    }
}
