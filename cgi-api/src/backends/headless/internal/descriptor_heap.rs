use super::CgiGpuAddress;
use crate::{
    CgiCpuDescriptorHandle, CgiDescriptorHandlePair, CgiDescriptorHeapType, CgiFormat,
    CgiGpuDescriptorHandle, CgiResourceId, CgiResult, CgiSamplerDef,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// Every heap gets its own 4GB window of handle space, so a handle can never be mistaken for a
// slot of another heap
static NEXT_HEAP_BASE: AtomicU64 = AtomicU64::new(1);
const GPU_HANDLE_BIT: u64 = 1 << 63;

/// Handle increment size of each heap type
pub fn handle_increment_size(heap_type: CgiDescriptorHeapType) -> u32 {
    match heap_type {
        CgiDescriptorHeapType::CbvSrvUav => 32,
        CgiDescriptorHeapType::Sampler => 32,
        CgiDescriptorHeapType::Rtv => 32,
        CgiDescriptorHeapType::Dsv => 8,
    }
}

/// The view written into one descriptor slot
#[derive(Clone, Debug, PartialEq)]
pub enum CgiDescriptor {
    Cbv {
        address: CgiGpuAddress,
        size: u32,
    },
    Srv {
        resource: CgiResourceId,
        format: CgiFormat,
        first_mip: u32,
        mip_count: u32,
        cube: bool,
    },
    Uav {
        resource: CgiResourceId,
        mip_level: u32,
    },
    Sampler(CgiSamplerDef),
    Rtv {
        resource: CgiResourceId,
        subresource: u32,
        format: CgiFormat,
    },
    Dsv {
        resource: CgiResourceId,
        subresource: u32,
        format: CgiFormat,
        read_only: bool,
    },
}

struct CgiDescriptorHeapInner {
    contents: Vec<Option<CgiDescriptor>>,
    //TODO: bitfield
    allocated_descriptors: Vec<bool>,
    allocated_descriptor_count: u32,
}

impl CgiDescriptorHeapInner {
    // First fit inside [range_begin, range_end)
    fn allocate(
        &mut self,
        count: u32,
        range_begin: u32,
        range_end: u32,
    ) -> Option<u32> {
        assert!(count > 0);

        let mut free_count = 0;
        let mut free_range_begin = range_begin;
        for i in range_begin..range_end {
            if !self.allocated_descriptors[i as usize] {
                free_count += 1;
            } else {
                free_count = 0;
                free_range_begin = i + 1;
            }

            if free_count >= count {
                break;
            }
        }

        if free_count < count {
            return None;
        }

        for i in free_range_begin..(free_range_begin + count) {
            self.allocated_descriptors[i as usize] = true;
        }
        self.allocated_descriptor_count += count;

        Some(free_range_begin)
    }

    fn free(
        &mut self,
        first_descriptor: u32,
        count: u32,
    ) {
        assert!(count > 0);

        for i in first_descriptor..(first_descriptor + count) {
            assert!(
                self.allocated_descriptors[i as usize],
                "freeing descriptor {} which is not allocated",
                i
            );
            self.allocated_descriptors[i as usize] = false;
            self.contents[i as usize] = None;
        }

        self.allocated_descriptor_count -= count;
    }
}

/// A fixed-size table of descriptors of one heap type.
///
/// Handles are pure offset arithmetic from the heap's base handles: `base + index * stride`.
/// Shader-visible heaps also have GPU handles. Cloning the heap shares the table.
#[derive(Clone)]
pub struct CgiDescriptorHeap {
    inner: Arc<Mutex<CgiDescriptorHeapInner>>,
    heap_type: CgiDescriptorHeapType,
    count: u32,
    stride: u32,
    cpu_first_handle: u64,
    gpu_first_handle: Option<u64>,
}

impl std::fmt::Debug for CgiDescriptorHeap {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CgiDescriptorHeap")
            .field("heap_type", &self.heap_type)
            .field("count", &self.count)
            .field("cpu_first_handle", &self.cpu_first_handle)
            .finish()
    }
}

impl CgiDescriptorHeap {
    pub fn new(
        heap_type: CgiDescriptorHeapType,
        count: u32,
        shader_visible: bool,
    ) -> Self {
        assert!(
            !shader_visible
                || heap_type == CgiDescriptorHeapType::CbvSrvUav
                || heap_type == CgiDescriptorHeapType::Sampler,
            "only CBV/SRV/UAV and sampler heaps can be shader visible"
        );

        let cpu_first_handle = NEXT_HEAP_BASE.fetch_add(1, Ordering::Relaxed) << 32;
        let gpu_first_handle = if shader_visible {
            Some(cpu_first_handle | GPU_HANDLE_BIT)
        } else {
            None
        };

        log::debug!(
            "Create {:?} descriptor heap with {} descriptors (shader visible: {})",
            heap_type,
            count,
            shader_visible
        );

        let inner = CgiDescriptorHeapInner {
            contents: vec![None; count as usize],
            allocated_descriptors: vec![false; count as usize],
            allocated_descriptor_count: 0,
        };

        CgiDescriptorHeap {
            inner: Arc::new(Mutex::new(inner)),
            heap_type,
            count,
            stride: handle_increment_size(heap_type),
            cpu_first_handle,
            gpu_first_handle,
        }
    }

    pub fn heap_type(&self) -> CgiDescriptorHeapType {
        self.heap_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_shader_visible(&self) -> bool {
        self.gpu_first_handle.is_some()
    }

    pub fn allocated_count(&self) -> u32 {
        self.inner.lock().unwrap().allocated_descriptor_count
    }

    pub fn at_cpu(
        &self,
        index: u32,
    ) -> CgiCpuDescriptorHandle {
        debug_assert!(index < self.count);
        CgiCpuDescriptorHandle(self.cpu_first_handle + index as u64 * self.stride as u64)
    }

    pub fn at_gpu(
        &self,
        index: u32,
    ) -> CgiGpuDescriptorHandle {
        debug_assert!(index < self.count);
        let gpu_first_handle = self
            .gpu_first_handle
            .expect("GPU handles only exist for shader-visible heaps");
        CgiGpuDescriptorHandle(gpu_first_handle + index as u64 * self.stride as u64)
    }

    pub fn handle_pair(
        &self,
        index: u32,
    ) -> CgiDescriptorHandlePair {
        CgiDescriptorHandlePair {
            cpu: self.at_cpu(index),
            gpu: self.at_gpu(index),
        }
    }

    /// Index of a CPU handle issued by this heap
    pub fn cpu_index(
        &self,
        handle: CgiCpuDescriptorHandle,
    ) -> Option<u32> {
        let offset = handle.0.checked_sub(self.cpu_first_handle)?;
        if offset % self.stride as u64 != 0 {
            return None;
        }
        let index = offset / self.stride as u64;
        if index < self.count as u64 {
            Some(index as u32)
        } else {
            None
        }
    }

    /// Index of a GPU handle issued by this heap
    pub fn gpu_index(
        &self,
        handle: CgiGpuDescriptorHandle,
    ) -> Option<u32> {
        let offset = handle.0.checked_sub(self.gpu_first_handle?)?;
        if offset % self.stride as u64 != 0 {
            return None;
        }
        let index = offset / self.stride as u64;
        if index < self.count as u64 {
            Some(index as u32)
        } else {
            None
        }
    }

    /// Allocate `count` contiguous descriptors anywhere in the heap
    pub fn allocate(
        &self,
        count: u32,
    ) -> CgiResult<u32> {
        self.allocate_in_range(count, 0, self.count)
    }

    pub(crate) fn allocate_in_range(
        &self,
        count: u32,
        range_begin: u32,
        range_end: u32,
    ) -> CgiResult<u32> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .allocate(count, range_begin, range_end)
            .ok_or_else(|| {
                format!(
                    "{:?} descriptor heap cannot fit {} more descriptors ({} of {} in use)",
                    self.heap_type,
                    count,
                    inner.allocated_descriptor_count,
                    range_end - range_begin
                )
                .into()
            })
    }

    pub fn free(
        &self,
        first_descriptor: u32,
        count: u32,
    ) {
        self.inner.lock().unwrap().free(first_descriptor, count)
    }

    pub fn write(
        &self,
        index: u32,
        descriptor: CgiDescriptor,
    ) {
        assert!(index < self.count);
        self.inner.lock().unwrap().contents[index as usize] = Some(descriptor);
    }

    pub fn read(
        &self,
        index: u32,
    ) -> Option<CgiDescriptor> {
        self.inner
            .lock()
            .unwrap()
            .contents
            .get(index as usize)
            .cloned()
            .flatten()
    }

    /// Descriptor referenced by a CPU handle of this heap
    pub fn read_cpu(
        &self,
        handle: CgiCpuDescriptorHandle,
    ) -> Option<CgiDescriptor> {
        self.read(self.cpu_index(handle)?)
    }

    /// Copy `count` descriptors between heaps of the same type, like `CopyDescriptorsSimple`
    pub fn copy_descriptors(
        dst: &CgiDescriptorHeap,
        dst_index: u32,
        src: &CgiDescriptorHeap,
        src_index: u32,
        count: u32,
    ) {
        assert_eq!(dst.heap_type, src.heap_type);
        assert!(dst_index + count <= dst.count && src_index + count <= src.count);

        let copied: Vec<Option<CgiDescriptor>> = {
            let src_inner = src.inner.lock().unwrap();
            src_inner.contents[src_index as usize..(src_index + count) as usize].to_vec()
        };

        let mut dst_inner = dst.inner.lock().unwrap();
        for (i, descriptor) in copied.into_iter().enumerate() {
            dst_inner.contents[dst_index as usize + i] = descriptor;
        }
    }
}

struct DynamicRegionState {
    ring_index: u32,
    offset: u32,
    peak_load: u32,
}

/// Shader-visible heap split into a static prefix and a per-frame dynamic region.
///
/// Indices `[0, static_count)` are allocated and freed like a regular heap and stay valid for the
/// lifetime of the owning resource. The rest is divided into one segment per ring-buffer slot.
/// `get_next_handle_pair` hands out contiguous blocks of the current slot's segment and the offset
/// goes back to the start of the segment in `begin_frame`.
pub struct CgiDynamicDescriptorHeap {
    heap: CgiDescriptorHeap,
    static_count: u32,
    dynamic_capacity: u32,
    state: Mutex<DynamicRegionState>,
}

impl CgiDynamicDescriptorHeap {
    pub fn new(
        heap_type: CgiDescriptorHeapType,
        count: u32,
        static_count: u32,
        ring_buffer_size: u32,
    ) -> CgiResult<Self> {
        if static_count >= count {
            return Err(format!(
                "{:?} heap of {} descriptors has no room for a dynamic region after {} static ones",
                heap_type, count, static_count
            )
            .into());
        }

        let dynamic_capacity = (count - static_count) / ring_buffer_size;
        if dynamic_capacity == 0 {
            return Err(format!(
                "{:?} heap dynamic region is too small for {} ring buffer slots",
                heap_type, ring_buffer_size
            )
            .into());
        }

        Ok(CgiDynamicDescriptorHeap {
            heap: CgiDescriptorHeap::new(heap_type, count, true),
            static_count,
            dynamic_capacity,
            state: Mutex::new(DynamicRegionState {
                ring_index: 0,
                offset: 0,
                peak_load: 0,
            }),
        })
    }

    pub fn heap(&self) -> &CgiDescriptorHeap {
        &self.heap
    }

    pub fn static_count(&self) -> u32 {
        self.static_count
    }

    /// Number of descriptors `get_next_handle_pair` may hand out in one frame
    pub fn dynamic_capacity(&self) -> u32 {
        self.dynamic_capacity
    }

    /// Allocate descriptors in the static prefix
    pub fn allocate_static(
        &self,
        count: u32,
    ) -> CgiResult<u32> {
        self.heap.allocate_in_range(count, 0, self.static_count)
    }

    pub fn free_static(
        &self,
        first_descriptor: u32,
        count: u32,
    ) {
        assert!(first_descriptor + count <= self.static_count);
        self.heap.free(first_descriptor, count)
    }

    /// Reserve `count` contiguous descriptors for the current frame. Returns the first index and
    /// its handles. Running out of room is fatal: the heap sizes in `CgiRendererDef` are a budget
    /// the caller must respect.
    pub fn get_next_handle_pair(
        &self,
        count: u32,
    ) -> (u32, CgiDescriptorHandlePair) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.offset + count <= self.dynamic_capacity,
            "dynamic descriptor heap overflow: {:?} heap needs {} more descriptors, {} of {} used this frame",
            self.heap.heap_type(),
            count,
            state.offset,
            self.dynamic_capacity
        );

        let index = self.static_count + state.ring_index * self.dynamic_capacity + state.offset;
        state.offset += count;
        state.peak_load = state.peak_load.max(state.offset);

        (index, self.heap.handle_pair(index))
    }

    /// Descriptors handed out during the current frame
    pub fn current_load(&self) -> u32 {
        self.state.lock().unwrap().offset
    }

    /// Highest per-frame load seen so far
    pub fn peak_load(&self) -> u32 {
        self.state.lock().unwrap().peak_load
    }

    pub fn begin_frame(
        &self,
        ring_index: u32,
    ) {
        let mut state = self.state.lock().unwrap();
        state.ring_index = ring_index;
        state.offset = 0;
    }
}

impl std::fmt::Debug for CgiDynamicDescriptorHeap {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CgiDynamicDescriptorHeap")
            .field("heap", &self.heap)
            .field("static_count", &self.static_count)
            .field("dynamic_capacity", &self.dynamic_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_offsets_from_the_base() {
        let heap = CgiDescriptorHeap::new(CgiDescriptorHeapType::CbvSrvUav, 16, true);
        let stride = heap.stride() as u64;
        assert_eq!(heap.at_cpu(3).0 - heap.at_cpu(0).0, 3 * stride);
        assert_eq!(heap.at_gpu(5).0 - heap.at_gpu(0).0, 5 * stride);
        assert_eq!(heap.cpu_index(heap.at_cpu(7)), Some(7));
        assert_eq!(heap.gpu_index(heap.at_gpu(7)), Some(7));

        let other = CgiDescriptorHeap::new(CgiDescriptorHeapType::CbvSrvUav, 16, false);
        assert_eq!(other.cpu_index(heap.at_cpu(0)), None);
        assert!(!other.is_shader_visible());
    }

    #[test]
    fn first_fit_allocation_reuses_freed_ranges() {
        let heap = CgiDescriptorHeap::new(CgiDescriptorHeapType::Rtv, 8, false);
        assert_eq!(heap.allocate(3).unwrap(), 0);
        assert_eq!(heap.allocate(2).unwrap(), 3);
        heap.free(0, 3);
        assert_eq!(heap.allocate(2).unwrap(), 0);
        assert_eq!(heap.allocate(3).unwrap(), 5);
        assert!(heap.allocate(2).is_err());
        assert_eq!(heap.allocated_count(), 7);
    }

    #[test]
    fn copy_descriptors_between_heaps() {
        let src = CgiDescriptorHeap::new(CgiDescriptorHeapType::Sampler, 4, false);
        let dst = CgiDescriptorHeap::new(CgiDescriptorHeapType::Sampler, 4, true);
        src.write(1, CgiDescriptor::Sampler(CgiSamplerDef::linear_wrap()));
        CgiDescriptorHeap::copy_descriptors(&dst, 2, &src, 1, 1);
        assert_eq!(
            dst.read(2),
            Some(CgiDescriptor::Sampler(CgiSamplerDef::linear_wrap()))
        );
        assert_eq!(dst.read_cpu(dst.at_cpu(2)), dst.read(2));
    }

    #[test]
    fn dynamic_region_never_overlaps_static_prefix() {
        let heap =
            CgiDynamicDescriptorHeap::new(CgiDescriptorHeapType::CbvSrvUav, 40, 8, 2).unwrap();
        assert_eq!(heap.dynamic_capacity(), 16);
        assert_eq!(heap.allocate_static(8).unwrap(), 0);
        assert!(heap.allocate_static(1).is_err());

        for ring_index in &[0, 1, 0] {
            heap.begin_frame(*ring_index);
            let mut total = 0;
            for count in &[1, 5, 10] {
                let (index, pair) = heap.get_next_handle_pair(*count);
                assert!(index >= heap.static_count());
                assert_eq!(pair.cpu, heap.heap().at_cpu(index));
                total += count;
            }
            assert_eq!(heap.current_load(), total);
        }
        assert_eq!(heap.peak_load(), 16);
    }

    #[test]
    fn ring_slots_use_separate_segments() {
        let heap = CgiDynamicDescriptorHeap::new(CgiDescriptorHeapType::Sampler, 12, 2, 2).unwrap();
        heap.begin_frame(0);
        let (first, _) = heap.get_next_handle_pair(5);
        heap.begin_frame(1);
        let (second, _) = heap.get_next_handle_pair(5);
        assert_eq!(first, 2);
        assert_eq!(second, 7);
    }

    #[test]
    #[should_panic(expected = "dynamic descriptor heap overflow")]
    fn dynamic_overflow_is_fatal() {
        let heap =
            CgiDynamicDescriptorHeap::new(CgiDescriptorHeapType::CbvSrvUav, 20, 4, 2).unwrap();
        heap.begin_frame(0);
        heap.get_next_handle_pair(6);
        heap.get_next_handle_pair(3);
    }
}
