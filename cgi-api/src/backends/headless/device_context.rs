use super::internal::{CgiDescriptorHeap, CgiDynamicDescriptorHeap};
use super::{CgiFramebufferHeadless, CgiGpuHeadless, CgiRenderPassHeadless};
use crate::{
    CgiDescriptorHeapType, CgiFramebufferHandle, CgiRenderPassHandle, CgiRendererDef, CgiResult,
};
use cgi_base::handle_pool::HandlePool;
use fnv::FnvHashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::ThreadId;

/// Delivered once at the start of every frame, after the GPU is known to be done with the slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiFrameInfo {
    pub ring_index: u32,
    pub frame_count: u64,
}

/// Implemented by ring-buffered objects that recycle per-frame storage. Listeners are held weakly,
/// dropping the object unregisters it.
pub trait CgiFrameListener: Send + Sync {
    fn on_begin_frame(
        &self,
        frame_info: &CgiFrameInfo,
    );
}

#[derive(Default)]
struct CommandAllocatorState {
    recording: bool,
    // Fence value of the last submission that used this allocator
    in_flight_fence_value: u64,
}

pub struct CgiDeviceContextHeadlessInner {
    renderer_def: CgiRendererDef,
    gpu: CgiGpuHeadless,

    cbv_srv_uav_heap: CgiDynamicDescriptorHeap,
    sampler_heap: CgiDynamicDescriptorHeap,
    rtv_heap: CgiDescriptorHeap,
    dsv_heap: CgiDescriptorHeap,

    ring_index: AtomicU32,
    frame_count: AtomicU64,

    // One allocator per (ring slot, recording thread)
    command_allocators: Mutex<FnvHashMap<(u32, ThreadId), CommandAllocatorState>>,
    frame_listeners: Mutex<Vec<Weak<dyn CgiFrameListener>>>,

    pub(crate) render_passes: Mutex<HandlePool<Arc<CgiRenderPassHeadless>>>,
    pub(crate) framebuffers: Mutex<HandlePool<Arc<CgiFramebufferHeadless>>>,

    next_object_id: AtomicU64,
}

impl CgiDeviceContextHeadlessInner {
    pub fn new(renderer_def: &CgiRendererDef) -> CgiResult<Self> {
        if renderer_def.ring_buffer_size == 0 {
            return Err("ring_buffer_size must be at least 1".into());
        }

        let sizes = &renderer_def.descriptor_heap_sizes;
        let cbv_srv_uav_heap = CgiDynamicDescriptorHeap::new(
            CgiDescriptorHeapType::CbvSrvUav,
            sizes.cbv_srv_uav,
            sizes.cbv_srv_uav_static,
            renderer_def.ring_buffer_size,
        )?;
        let sampler_heap = CgiDynamicDescriptorHeap::new(
            CgiDescriptorHeapType::Sampler,
            sizes.sampler,
            sizes.sampler_static,
            renderer_def.ring_buffer_size,
        )?;
        let rtv_heap = CgiDescriptorHeap::new(CgiDescriptorHeapType::Rtv, sizes.rtv, false);
        let dsv_heap = CgiDescriptorHeap::new(CgiDescriptorHeapType::Dsv, sizes.dsv, false);

        let gpu = CgiGpuHeadless::new(
            renderer_def.gpu_timeline,
            renderer_def.validation_mode.is_enabled(),
            rtv_heap.clone(),
            dsv_heap.clone(),
        )?;

        Ok(CgiDeviceContextHeadlessInner {
            renderer_def: renderer_def.clone(),
            gpu,
            cbv_srv_uav_heap,
            sampler_heap,
            rtv_heap,
            dsv_heap,
            ring_index: AtomicU32::new(0),
            frame_count: AtomicU64::new(0),
            command_allocators: Default::default(),
            frame_listeners: Default::default(),
            render_passes: Default::default(),
            framebuffers: Default::default(),
            next_object_id: AtomicU64::new(1),
        })
    }
}

/// Shared device state: the simulated GPU, the renderer-wide descriptor heaps, the command
/// allocators and the handle pools. Every object created by a renderer keeps a clone.
#[derive(Clone)]
pub struct CgiDeviceContextHeadless {
    pub(crate) inner: Arc<CgiDeviceContextHeadlessInner>,
}

impl std::fmt::Debug for CgiDeviceContextHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiDeviceContextHeadless")
            .field("ring_index", &self.ring_index())
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

impl CgiDeviceContextHeadless {
    pub fn new(renderer_def: &CgiRendererDef) -> CgiResult<Self> {
        Ok(CgiDeviceContextHeadless {
            inner: Arc::new(CgiDeviceContextHeadlessInner::new(renderer_def)?),
        })
    }

    pub fn renderer_def(&self) -> &CgiRendererDef {
        &self.inner.renderer_def
    }

    pub fn ring_buffer_size(&self) -> u32 {
        self.inner.renderer_def.ring_buffer_size
    }

    /// Ring slot of the frame being recorded
    pub fn ring_index(&self) -> u32 {
        self.inner.ring_index.load(Ordering::Acquire)
    }

    pub fn frame_count(&self) -> u64 {
        self.inner.frame_count.load(Ordering::Acquire)
    }

    pub fn validation_enabled(&self) -> bool {
        self.inner.renderer_def.validation_mode.is_enabled()
    }

    pub fn save_compiled_shaders_dir(&self) -> Option<&Path> {
        self.inner.renderer_def.save_compiled_shaders_dir.as_deref()
    }

    pub fn gpu(&self) -> &CgiGpuHeadless {
        &self.inner.gpu
    }

    pub fn cbv_srv_uav_heap(&self) -> &CgiDynamicDescriptorHeap {
        &self.inner.cbv_srv_uav_heap
    }

    pub fn sampler_heap(&self) -> &CgiDynamicDescriptorHeap {
        &self.inner.sampler_heap
    }

    pub fn rtv_heap(&self) -> &CgiDescriptorHeap {
        &self.inner.rtv_heap
    }

    pub fn dsv_heap(&self) -> &CgiDescriptorHeap {
        &self.inner.dsv_heap
    }

    /// Unique id for pipeline and root signature objects, recorded into command lists
    pub fn next_object_id(&self) -> u64 {
        self.inner.next_object_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register_frame_listener(
        &self,
        listener: &Arc<dyn CgiFrameListener>,
    ) {
        self.inner
            .frame_listeners
            .lock()
            .unwrap()
            .push(Arc::downgrade(listener));
    }

    pub fn render_pass(
        &self,
        handle: CgiRenderPassHandle,
    ) -> Option<Arc<CgiRenderPassHeadless>> {
        self.inner
            .render_passes
            .lock()
            .unwrap()
            .get(handle.0)
            .cloned()
    }

    pub fn framebuffer(
        &self,
        handle: CgiFramebufferHandle,
    ) -> Option<Arc<CgiFramebufferHeadless>> {
        self.inner
            .framebuffers
            .lock()
            .unwrap()
            .get(handle.0)
            .cloned()
    }

    pub(crate) fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    // Called by the renderer once the GPU is done with `ring_index`
    pub(crate) fn begin_frame(
        &self,
        ring_index: u32,
        frame_count: u64,
    ) {
        profiling::scope!("notify frame listeners");
        self.inner.ring_index.store(ring_index, Ordering::Release);
        self.inner.frame_count.store(frame_count, Ordering::Release);

        self.inner.cbv_srv_uav_heap.begin_frame(ring_index);
        self.inner.sampler_heap.begin_frame(ring_index);

        let frame_info = CgiFrameInfo {
            ring_index,
            frame_count,
        };

        // Upgrade outside the lock so a listener may register new listeners
        let listeners: Vec<Arc<dyn CgiFrameListener>> = {
            let mut frame_listeners = self.inner.frame_listeners.lock().unwrap();
            frame_listeners.retain(|listener| listener.strong_count() > 0);
            frame_listeners
                .iter()
                .filter_map(|listener| listener.upgrade())
                .collect()
        };

        for listener in listeners {
            listener.on_begin_frame(&frame_info);
        }
    }

    // Resetting an allocator is only legal once the GPU finished the lists recorded from it
    pub(crate) fn reset_command_allocators(
        &self,
        ring_index: u32,
    ) {
        let completed_value = self.inner.gpu.completed_fence_value();
        let allocators = self.inner.command_allocators.lock().unwrap();
        for ((allocator_ring_index, thread), allocator) in allocators.iter() {
            if *allocator_ring_index != ring_index {
                continue;
            }

            assert!(
                !allocator.recording,
                "command allocator of thread {:?} for ring slot {} is reset while a list is recording",
                thread,
                ring_index
            );
            assert!(
                completed_value >= allocator.in_flight_fence_value,
                "command allocator for ring slot {} is reset while the GPU still uses it (fence {} < {})",
                ring_index,
                completed_value,
                allocator.in_flight_fence_value
            );
        }
    }

    // Claim the calling thread's allocator for the ring slot
    pub(crate) fn begin_command_list(
        &self,
        ring_index: u32,
        thread: ThreadId,
    ) {
        let mut allocators = self.inner.command_allocators.lock().unwrap();
        let allocator = allocators.entry((ring_index, thread)).or_insert_with(|| {
            log::debug!(
                "Create command allocator for thread {:?} ring slot {}",
                thread,
                ring_index
            );
            CommandAllocatorState::default()
        });

        assert!(
            !allocator.recording,
            "the command allocator of thread {:?} for ring slot {} already backs a recording command list, use one command buffer per thread",
            thread,
            ring_index
        );
        assert!(
            self.inner.gpu.completed_fence_value() >= allocator.in_flight_fence_value,
            "command list for ring slot {} recorded while the GPU still uses its allocator",
            ring_index
        );
        allocator.recording = true;
    }

    pub(crate) fn end_command_list(
        &self,
        ring_index: u32,
        thread: ThreadId,
    ) {
        let mut allocators = self.inner.command_allocators.lock().unwrap();
        if let Some(allocator) = allocators.get_mut(&(ring_index, thread)) {
            allocator.recording = false;
        }
    }

    pub(crate) fn mark_command_allocators_in_flight(
        &self,
        ring_index: u32,
        fence_value: u64,
    ) {
        let mut allocators = self.inner.command_allocators.lock().unwrap();
        for ((allocator_ring_index, _), allocator) in allocators.iter_mut() {
            if *allocator_ring_index == ring_index {
                allocator.in_flight_fence_value = fence_value;
            }
        }
    }

    pub(crate) fn command_allocator_count(&self) -> usize {
        self.inner.command_allocators.lock().unwrap().len()
    }
}
