//! Generic vertex/index containers.
//!
//! A [`Mesh`] is the unit the sprite batch consumes: vertices of any
//! [`MeshVertex`] type, a flat `u32` index list and the primitive topology
//! the indices describe.

mod vertex;

use std::collections::HashMap;
use std::ops::{AddAssign, MulAssign};

use glam::{Affine2, Mat4, Vec2, Vec3};

use crate::coords::{Path2, Poly2, Rect};
use crate::paint::Color4;

pub use vertex::{MeshVertex, SpriteVertex2, SpriteVertex3};

/// Primitive topology of a mesh's index list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DrawCommand {
    Lines,
    Triangles,
    #[default]
    Undefined,
}

impl DrawCommand {
    /// Number of indices per primitive, if the topology is known.
    #[inline]
    pub fn divider(self) -> Option<usize> {
        match self {
            DrawCommand::Lines => Some(2),
            DrawCommand::Triangles => Some(3),
            DrawCommand::Undefined => None,
        }
    }

    /// Infers a topology from an index count. Triangles win when both fit.
    pub fn infer(index_count: usize) -> Self {
        if index_count % 3 == 0 {
            DrawCommand::Triangles
        } else if index_count % 2 == 0 {
            DrawCommand::Lines
        } else {
            DrawCommand::Undefined
        }
    }
}

/// Indexed geometry over vertices of type `V`.
///
/// Every index is expected to be `< vertices.len()`; [`Mesh::is_valid`]
/// checks it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh<V> {
    vertices: Vec<V>,
    indices: Vec<u32>,
    command: DrawCommand,
}

impl<V> Default for Mesh<V> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            command: DrawCommand::Undefined,
        }
    }
}

impl<V: MeshVertex> Mesh<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mesh and infers the command from the index count.
    pub fn with_parts(vertices: Vec<V>, indices: Vec<u32>) -> Self {
        let command = DrawCommand::infer(indices.len());
        Self { vertices, indices, command }
    }

    pub fn with_command(vertices: Vec<V>, indices: Vec<u32>, command: DrawCommand) -> Self {
        Self { vertices, indices, command }
    }

    /// Opaque white triangles from a triangulated polygon.
    pub fn from_poly(poly: &Poly2) -> Self {
        let mut mesh = Self::new();
        mesh.set_poly(poly);
        mesh
    }

    /// Opaque white line segments following a path.
    pub fn from_path(path: &Path2) -> Self {
        let vertices = path
            .vertices
            .iter()
            .map(|p| V::from_position(p.extend(0.0)))
            .collect();
        Self::with_command(vertices, path.segment_indices(), DrawCommand::Lines)
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::from_poly(&Poly2::from_rect(rect))
    }

    /// Replaces the contents with `poly`, as [`Mesh::from_poly`] would.
    pub fn set_poly(&mut self, poly: &Poly2) {
        self.vertices.clear();
        self.vertices
            .extend(poly.vertices.iter().map(|p| V::from_position(p.extend(0.0))));
        self.indices.clear();
        self.indices.extend_from_slice(&poly.indices);
        self.command = DrawCommand::Triangles;
    }

    /// Replaces the contents and re-infers the command.
    pub fn set_parts(&mut self, vertices: Vec<V>, indices: Vec<u32>) {
        self.command = DrawCommand::infer(indices.len());
        self.vertices = vertices;
        self.indices = indices;
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    #[inline]
    pub fn vertices_mut(&mut self) -> &mut [V] {
        &mut self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn command(&self) -> DrawCommand {
        self.command
    }

    #[inline]
    pub fn set_command(&mut self, command: DrawCommand) {
        self.command = command;
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Drops all geometry; the command is kept.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Checks that every index refers to an existing vertex.
    pub fn is_valid(&self) -> bool {
        let n = self.vertices.len();
        self.indices.iter().all(|&i| (i as usize) < n)
    }

    /// 2D bounds of all vertex positions.
    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.vertices.iter().map(|v| v.position().truncate()))
    }

    pub fn set_color(&mut self, color: Color4) {
        let packed = color.pack();
        for v in &mut self.vertices {
            v.set_color(packed);
        }
    }

    /// Sets each gradient coordinate to the vertex's current 2D position.
    pub fn set_gradcoords_from_positions(&mut self) {
        for v in &mut self.vertices {
            let p = v.position().truncate();
            v.set_gradcoord(p);
        }
    }

    /// Maps positions inside `bounds` linearly onto the `[min, max]` texture region.
    pub fn set_texcoords_from_bounds(&mut self, bounds: Rect, min: Vec2, max: Vec2) {
        let size = bounds.size.max(Vec2::splat(f32::EPSILON));
        for v in &mut self.vertices {
            let t = (v.position().truncate() - bounds.origin) / size;
            v.set_texcoord(min + (max - min) * t);
        }
    }

    // ── slicing ───────────────────────────────────────────────────────────

    /// True when the indices are a whole number of primitives of a known command.
    pub fn is_sliceable(&self) -> bool {
        match self.command.divider() {
            Some(d) => self.indices.len() % d == 0,
            None => false,
        }
    }

    /// Returns the primitives in the index range `[start, end)` as a new mesh.
    ///
    /// Only referenced vertices are copied, in first-use order.
    ///
    /// # Panics
    /// When the mesh is not sliceable, or a boundary is not a multiple of
    /// the primitive size or lies outside the index list.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        assert!(self.is_sliceable(), "Mesh::slice on a non-sliceable mesh ({:?})", self.command);
        let divider = self.command.divider().unwrap_or(1);
        assert!(
            start % divider == 0 && end % divider == 0,
            "Mesh::slice bounds {start}..{end} not aligned to {divider}"
        );
        assert!(
            start <= end && end <= self.indices.len(),
            "Mesh::slice bounds {start}..{end} out of range (len {})",
            self.indices.len()
        );

        let mut remap: HashMap<u32, u32> = HashMap::with_capacity(end - start);
        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(end - start);

        for &old in &self.indices[start..end] {
            let new = *remap.entry(old).or_insert_with(|| {
                vertices.push(self.vertices[old as usize]);
                (vertices.len() - 1) as u32
            });
            indices.push(new);
        }

        Self::with_command(vertices, indices, self.command)
    }

    #[inline]
    pub fn slice_from(&self, start: usize) -> Self {
        self.slice(start, self.indices.len())
    }

    #[inline]
    pub fn slice_to(&self, end: usize) -> Self {
        self.slice(0, end)
    }
}

impl<V: MeshVertex> MulAssign<Affine2> for Mesh<V> {
    fn mul_assign(&mut self, transform: Affine2) {
        for v in &mut self.vertices {
            let p = v.position();
            let q = transform.transform_point2(p.truncate());
            v.set_position(q.extend(p.z));
        }
    }
}

impl<V: MeshVertex> MulAssign<Mat4> for Mesh<V> {
    fn mul_assign(&mut self, transform: Mat4) {
        for v in &mut self.vertices {
            let p: Vec3 = transform.project_point3(v.position());
            v.set_position(p);
        }
    }
}

impl<V: MeshVertex> AddAssign<&Mesh<V>> for Mesh<V> {
    /// Appends `other`, offsetting its indices. Does nothing when the commands differ.
    fn add_assign(&mut self, other: &Mesh<V>) {
        if self.command != other.command {
            return;
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type M = Mesh<SpriteVertex2>;

    fn verts(n: usize) -> Vec<SpriteVertex2> {
        (0..n)
            .map(|i| SpriteVertex2::from_position(Vec3::new(i as f32, 0.0, 0.0)))
            .collect()
    }

    /// Primitive list as position tuples, independent of vertex numbering.
    fn primitives(mesh: &M) -> Vec<Vec<[f32; 2]>> {
        let d = mesh.command().divider().unwrap_or(1);
        mesh.indices()
            .chunks(d)
            .map(|c| c.iter().map(|&i| mesh.vertices()[i as usize].position).collect())
            .collect()
    }

    // ── inference ─────────────────────────────────────────────────────────

    #[test]
    fn six_indices_infer_triangles() {
        assert_eq!(M::with_parts(verts(4), vec![0, 1, 2, 0, 2, 3]).command(), DrawCommand::Triangles);
    }

    #[test]
    fn inference_falls_back_to_lines_then_undefined() {
        assert_eq!(M::with_parts(verts(3), vec![0, 1, 1, 2]).command(), DrawCommand::Lines);
        assert_eq!(M::with_parts(verts(3), vec![0, 1, 2, 0, 1]).command(), DrawCommand::Undefined);
        assert!(!M::with_parts(verts(3), vec![0, 1, 2, 0, 1]).is_sliceable());
    }

    // ── builders ──────────────────────────────────────────────────────────

    #[test]
    fn from_poly_is_white_triangles() {
        let m = M::from_rect(Rect::new(0.0, 0.0, 2.0, 3.0));
        assert_eq!(m.command(), DrawCommand::Triangles);
        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.index_count(), 6);
        assert!(m.vertices().iter().all(|v| v.color == u32::MAX));
        assert_eq!(m.bounds(), Some(Rect::new(0.0, 0.0, 2.0, 3.0)));
    }

    #[test]
    fn from_path_is_lines() {
        let path = Path2::new(vec![Vec2::ZERO, Vec2::X, Vec2::ONE], true);
        let m = M::from_path(&path);
        assert_eq!(m.command(), DrawCommand::Lines);
        assert_eq!(m.indices(), &[0, 1, 1, 2, 2, 0]);
        assert!(m.is_sliceable());
    }

    // ── concatenation ─────────────────────────────────────────────────────

    #[test]
    fn add_assign_offsets_indices() {
        let mut a = M::with_parts(verts(3), vec![0, 1, 2]);
        let b = M::with_parts(verts(4), vec![0, 1, 2, 0, 2, 3]);
        a += &b;
        assert_eq!(a.vertex_count(), 7);
        assert_eq!(a.indices(), &[0, 1, 2, 3, 4, 5, 3, 5, 6]);
        assert!(a.is_valid());
    }

    #[test]
    fn add_assign_ignores_mismatched_command() {
        let mut a = M::with_parts(verts(3), vec![0, 1, 2]);
        let before = a.clone();
        a += &M::with_parts(verts(2), vec![0, 1]);
        assert_eq!(a, before);
    }

    // ── slicing ───────────────────────────────────────────────────────────

    #[test]
    fn slice_halves_recombine_to_the_original_primitives() {
        let m = M::with_parts(verts(6), vec![0, 1, 2, 2, 3, 4, 4, 5, 0, 1, 3, 5]);
        for k in [0, 3, 6, 9, 12] {
            let mut head = m.slice_to(k);
            let tail = m.slice_from(k);
            assert!(head.is_valid() && tail.is_valid());

            let mut expected = primitives(&head);
            expected.extend(primitives(&tail));
            assert_eq!(expected, primitives(&m), "split at {k}");

            // Concatenation keeps the primitive sequence too.
            head += &tail;
            assert_eq!(primitives(&head), primitives(&m));
        }
    }

    #[test]
    fn slice_deduplicates_vertices() {
        let m = M::with_parts(verts(6), vec![0, 1, 2, 0, 2, 3, 4, 5, 0]);
        let s = m.slice(0, 6);
        assert_eq!(s.vertex_count(), 4);
        assert_eq!(s.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(s.command(), DrawCommand::Triangles);
    }

    #[test]
    #[should_panic(expected = "not aligned")]
    fn slice_rejects_unaligned_bounds() {
        let m = M::with_parts(verts(4), vec![0, 1, 2, 0, 2, 3]);
        let _ = m.slice(1, 6);
    }

    #[test]
    #[should_panic(expected = "non-sliceable")]
    fn slice_rejects_undefined_command() {
        let m = M::with_parts(verts(3), vec![0, 1, 2, 0, 1]);
        let _ = m.slice(0, 0);
    }

    // ── transforms ────────────────────────────────────────────────────────

    #[test]
    fn affine_transform_moves_positions_only() {
        let mut m = M::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        m.set_color(Color4::BLACK);
        m *= Affine2::from_translation(Vec2::new(10.0, 20.0));
        assert_eq!(m.bounds(), Some(Rect::new(10.0, 20.0, 1.0, 1.0)));
        assert!(m.vertices().iter().all(|v| v.color == Color4::BLACK.pack()));
    }

    #[test]
    fn mat4_transform_applies_to_3d_vertices() {
        let mut m: Mesh<SpriteVertex3> = Mesh::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        m *= Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        assert!(m.vertices().iter().all(|v| v.position[2] == 5.0));
    }
}
