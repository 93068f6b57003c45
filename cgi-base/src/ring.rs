use std::ops::{Index, IndexMut};

/// Tracks which slot of a ring of per-frame resources the CPU is currently writing to.
///
/// The first call to `advance()` selects slot 0, every later call moves to the next slot modulo
/// the ring size.
#[derive(Debug, Clone, Copy)]
pub struct FrameRing {
    size: u32,
    index: u32,
    frame_count: u64,
}

impl FrameRing {
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "a frame ring needs at least one slot");
        FrameRing {
            size,
            index: size - 1,
            frame_count: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// The slot selected by the most recent `advance()`
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Number of times `advance()` has been called
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn advance(&mut self) -> u32 {
        self.index = (self.index + 1) % self.size;
        self.frame_count += 1;
        self.index
    }
}

/// One value per ring slot
#[derive(Debug, Clone)]
pub struct PerRingSlot<T> {
    values: Vec<T>,
}

impl<T> PerRingSlot<T> {
    pub fn new_with<F: FnMut(u32) -> T>(
        size: u32,
        mut f: F,
    ) -> Self {
        PerRingSlot {
            values: (0..size).map(|index| f(index)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<T> {
        self.values.iter_mut()
    }
}

impl<T: Default> PerRingSlot<T> {
    pub fn new(size: u32) -> Self {
        Self::new_with(size, |_| T::default())
    }
}

impl<T> Index<u32> for PerRingSlot<T> {
    type Output = T;

    fn index(
        &self,
        index: u32,
    ) -> &T {
        &self.values[index as usize]
    }
}

impl<T> IndexMut<u32> for PerRingSlot<T> {
    fn index_mut(
        &mut self,
        index: u32,
    ) -> &mut T {
        &mut self.values[index as usize]
    }
}
