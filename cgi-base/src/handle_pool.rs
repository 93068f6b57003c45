/// Identifies a value stored in a `HandlePool`. The generation detects handles that outlived the
/// value they were issued for: once a slot is reused, old handles to it no longer resolve.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PoolHandle {
    index: u32,
    generation: u32,
}

impl PoolHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct PoolSlot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by generation-checked handles. Freed slots go to a free list and are
/// reused before the storage grows.
///
/// A pool may be given a hard upper bound on live values. Exceeding it is treated as a caller bug
/// and panics, the same as removing a value twice.
pub struct HandlePool<T> {
    slots: Vec<PoolSlot<T>>,
    free_list: Vec<u32>,
    len: usize,
    max_len: Option<usize>,
}

impl<T> Default for HandlePool<T> {
    fn default() -> Self {
        HandlePool {
            slots: Vec::default(),
            free_list: Vec::default(),
            len: 0,
            max_len: None,
        }
    }
}

impl<T> HandlePool<T> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a pool that can never hold more than `max_len` live values
    pub fn with_max_len(max_len: usize) -> Self {
        HandlePool {
            slots: Vec::with_capacity(max_len),
            free_list: Vec::default(),
            len: 0,
            max_len: Some(max_len),
        }
    }

    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(
        &mut self,
        value: T,
    ) -> PoolHandle {
        if let Some(max_len) = self.max_len {
            assert!(
                self.len < max_len,
                "handle pool is full, it was created with room for {} values",
                max_len
            );
        }

        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            PoolHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(PoolSlot {
                generation: 0,
                value: Some(value),
            });
            PoolHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Remove the value, returning it. Returns None if the handle is stale or already removed.
    pub fn try_remove(
        &mut self,
        handle: PoolHandle,
    ) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Remove the value, returning it. Panics if the handle does not refer to a live value.
    pub fn remove(
        &mut self,
        handle: PoolHandle,
    ) -> T {
        match self.try_remove(handle) {
            Some(value) => value,
            None => panic!(
                "tried to remove a stale or already removed handle {:?}",
                handle
            ),
        }
    }

    pub fn contains(
        &self,
        handle: PoolHandle,
    ) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(
        &self,
        handle: PoolHandle,
    ) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(
        &mut self,
        handle: PoolHandle,
    ) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation == handle.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    PoolHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Remove every value. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut pool = HandlePool::new();
        let a = pool.insert("a");
        let b = pool.insert("b");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some(&"a"));
        assert_eq!(pool.get(b), Some(&"b"));

        assert_eq!(pool.remove(a), "a");
        assert!(!pool.contains(a));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn reused_slot_invalidates_old_handle() {
        let mut pool = HandlePool::new();
        let first = pool.insert(1);
        pool.remove(first);

        let second = pool.insert(2);
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(pool.get(first).is_none());
        assert_eq!(pool.get(second), Some(&2));
        assert!(pool.try_remove(first).is_none());
    }

    #[test]
    #[should_panic(expected = "stale or already removed")]
    fn double_remove_panics() {
        let mut pool = HandlePool::new();
        let handle = pool.insert(5);
        pool.remove(handle);
        pool.remove(handle);
    }

    #[test]
    #[should_panic(expected = "handle pool is full")]
    fn max_len_is_enforced() {
        let mut pool = HandlePool::with_max_len(2);
        pool.insert(0);
        pool.insert(1);
        pool.insert(2);
    }

    #[test]
    fn max_len_counts_live_values_only() {
        let mut pool = HandlePool::with_max_len(1);
        let handle = pool.insert(0);
        pool.remove(handle);
        pool.insert(1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn iter_and_clear() {
        let mut pool = HandlePool::new();
        let a = pool.insert(10);
        let b = pool.insert(20);
        pool.remove(a);

        let live: Vec<_> = pool.iter().map(|(handle, value)| (handle, *value)).collect();
        assert_eq!(live, vec![(b, 20)]);

        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.get(b).is_none());
    }
}
