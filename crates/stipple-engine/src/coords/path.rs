use glam::Vec2;

use super::Rect;

/// An outline: an ordered list of points, optionally closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path2 {
    pub vertices: Vec<Vec2>,
    pub closed: bool,
}

impl Path2 {
    pub fn new(vertices: Vec<Vec2>, closed: bool) -> Self {
        Self { vertices, closed }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            vertices: rect.corners().to_vec(),
            closed: true,
        }
    }

    /// Segment index pairs (`Lines` topology), closing the loop when `closed`.
    pub fn segment_indices(&self) -> Vec<u32> {
        let n = self.vertices.len() as u32;
        if n < 2 {
            return Vec::new();
        }
        let segments = if self.closed { n } else { n - 1 };
        let mut indices = Vec::with_capacity(segments as usize * 2);
        for i in 0..segments {
            indices.push(i);
            indices.push((i + 1) % n);
        }
        indices
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.vertices.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_path_has_one_fewer_segment() {
        let p = Path2::new(vec![Vec2::ZERO, Vec2::X, Vec2::ONE], false);
        assert_eq!(p.segment_indices(), vec![0, 1, 1, 2]);
    }

    #[test]
    fn closed_path_wraps_to_start() {
        let p = Path2::new(vec![Vec2::ZERO, Vec2::X, Vec2::ONE], true);
        assert_eq!(p.segment_indices(), vec![0, 1, 1, 2, 2, 0]);
    }
}
