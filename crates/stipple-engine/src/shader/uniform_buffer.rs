use std::collections::HashMap;

use super::std140::Std140;

/// Dynamic uniform offsets must be multiples of this.
pub const UNIFORM_ALIGNMENT: usize = 256;

/// CPU-side uniform buffer holding `capacity` blocks of one layout.
///
/// Members are addressed by name through offsets registered with
/// [`set_offset`](Self::set_offset). Writes to unknown names are ignored so
/// one buffer can feed shaders that only use part of the layout.
#[derive(Debug, Clone)]
pub struct UniformBuffer {
    data: Vec<u8>,
    capacity: usize,
    block_size: usize,
    stride: usize,
    offsets: HashMap<String, usize>,
    active: usize,
    bind_point: u32,
    dirty: bool,
}

impl UniformBuffer {
    /// # Panics
    /// When `capacity` or `block_size` is zero.
    pub fn new(capacity: usize, block_size: usize) -> Self {
        assert!(capacity > 0, "UniformBuffer capacity must be non-zero");
        assert!(block_size > 0, "UniformBuffer block size must be non-zero");
        let stride = block_size.div_ceil(UNIFORM_ALIGNMENT) * UNIFORM_ALIGNMENT;
        Self {
            data: vec![0; capacity * stride],
            capacity,
            block_size,
            stride,
            offsets: HashMap::new(),
            active: 0,
            bind_point: 0,
            dirty: true,
        }
    }

    /// Registers member `name` at `offset` bytes into each block.
    pub fn set_offset(&mut self, name: impl Into<String>, offset: usize) {
        self.offsets.insert(name.into(), offset);
    }

    #[inline]
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    /// Registered member names (unordered).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.offsets.keys().map(String::as_str)
    }

    /// Writes `value` to member `name` of `block`. Unknown names and
    /// out-of-range blocks are ignored.
    pub fn write<T: Std140>(&mut self, block: usize, name: &str, value: &T) {
        let Some(offset) = self.offset(name) else { return };
        if block >= self.capacity || offset + T::SIZE > self.block_size {
            return;
        }
        let at = block * self.stride + offset;
        value.write_std140(&mut self.data[at..at + T::SIZE]);
        self.dirty = true;
    }

    /// Reads member `name` of `block` back.
    pub fn read<T: Std140>(&self, block: usize, name: &str) -> Option<T> {
        let offset = self.offset(name)?;
        if block >= self.capacity || offset + T::SIZE > self.block_size {
            return None;
        }
        let at = block * self.stride + offset;
        Some(T::read_std140(&self.data[at..at + T::SIZE]))
    }

    /// Selects the block the next draw reads.
    pub fn activate(&mut self, block: usize) {
        assert!(block < self.capacity, "UniformBuffer::activate({block}) beyond capacity {}", self.capacity);
        self.active = block;
    }

    #[inline]
    pub fn active(&self) -> usize {
        self.active
    }

    /// Byte offset of the active block, as a dynamic binding offset.
    #[inline]
    pub fn active_offset(&self) -> u32 {
        (self.active * self.stride) as u32
    }

    #[inline]
    pub fn block_bytes(&self, block: usize) -> &[u8] {
        let at = block * self.stride;
        &self.data[at..at + self.block_size]
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn bind_point(&self) -> u32 {
        self.bind_point
    }

    pub fn set_bind_point(&mut self, bind_point: u32) {
        self.bind_point = bind_point;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Called by backends after uploading.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn buffer() -> UniformBuffer {
        let mut ub = UniformBuffer::new(4, 32);
        ub.set_offset("a", 0);
        ub.set_offset("b", 8);
        ub
    }

    #[test]
    fn blocks_are_padded_to_dynamic_offset_alignment() {
        let ub = buffer();
        assert_eq!(ub.stride(), 256);
        assert_eq!(ub.bytes().len(), 4 * 256);
        assert_eq!(UniformBuffer::new(1, 300).stride(), 512);
    }

    #[test]
    fn writes_land_at_named_offsets() {
        let mut ub = buffer();
        ub.write(2, "b", &Vec2::new(1.0, 2.0));
        assert_eq!(ub.read::<Vec2>(2, "b"), Some(Vec2::new(1.0, 2.0)));
        assert_eq!(ub.read::<Vec2>(1, "b"), Some(Vec2::ZERO));
        assert_eq!(f32::read_std140(&ub.block_bytes(2)[8..]), 1.0);
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut ub = buffer();
        ub.mark_clean();
        ub.write(0, "missing", &1.0f32);
        ub.write(9, "a", &1.0f32);
        assert!(!ub.is_dirty());
        assert_eq!(ub.read::<f32>(0, "missing"), None);
    }

    #[test]
    fn activate_selects_dynamic_offset() {
        let mut ub = buffer();
        ub.activate(3);
        assert_eq!(ub.active_offset(), 768);
    }
}
