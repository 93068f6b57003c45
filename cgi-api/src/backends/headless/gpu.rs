use super::internal::{CgiDescriptor, CgiDescriptorHeap, CgiNativeCommand, CgiResourceTransition};
use crate::{
    CgiCpuDescriptorHandle, CgiFormat, CgiGpuStats, CgiGpuTimeline, CgiResourceId,
    CgiResourceState, CgiResult, CgiTextureDef,
};
use crossbeam_channel::{Receiver, Sender};
use fnv::FnvHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

enum GpuStorage {
    Buffer(Vec<u8>),
    Texture {
        format: CgiFormat,
        subresources: Vec<Vec<u8>>,
    },
}

struct GpuResource {
    name: String,
    storage: GpuStorage,
    // One per subresource, buffers have one
    states: Vec<CgiResourceState>,
}

type GpuResourceMap = Arc<Mutex<FnvHashMap<CgiResourceId, GpuResource>>>;

/// Monotonic fence. The queue signals values in submission order.
#[derive(Debug, Default)]
pub struct CgiFenceHeadless {
    completed_value: Mutex<u64>,
    condvar: Condvar,
}

impl CgiFenceHeadless {
    pub fn completed_value(&self) -> u64 {
        *self.completed_value.lock().unwrap()
    }

    fn signal(
        &self,
        value: u64,
    ) {
        let mut completed_value = self.completed_value.lock().unwrap();
        debug_assert!(value >= *completed_value);
        *completed_value = value;
        self.condvar.notify_all();
    }

    /// Block until the fence reaches `value`. Returns true if the call had to wait.
    pub fn wait_for_value(
        &self,
        value: u64,
    ) -> bool {
        let mut completed_value = self.completed_value.lock().unwrap();
        let mut waited = false;
        while *completed_value < value {
            waited = true;
            completed_value = self.condvar.wait(completed_value).unwrap();
        }
        waited
    }
}

enum QueueOp {
    ExecuteCommandLists(Vec<Vec<CgiNativeCommand>>),
    Present {
        resource: CgiResourceId,
        image_index: u32,
    },
    Signal(u64),
}

fn encode_clear_color(
    format: CgiFormat,
    color: [f32; 4],
) -> Option<Vec<u8>> {
    let unorm = |v: f32| (v.max(0.0).min(1.0) * 255.0 + 0.5) as u8;
    let floats = |count: usize| -> Vec<u8> {
        color[..count]
            .iter()
            .flat_map(|v| v.to_le_bytes().to_vec())
            .collect()
    };

    Some(match format {
        CgiFormat::R8Unorm => vec![unorm(color[0])],
        CgiFormat::R8G8Unorm => vec![unorm(color[0]), unorm(color[1])],
        CgiFormat::R8G8B8A8Unorm | CgiFormat::R8G8B8A8Srgb => {
            color.iter().map(|v| unorm(*v)).collect()
        }
        CgiFormat::B8G8R8A8Unorm | CgiFormat::B8G8R8A8Srgb => vec![
            unorm(color[2]),
            unorm(color[1]),
            unorm(color[0]),
            unorm(color[3]),
        ],
        CgiFormat::R32Sfloat => floats(1),
        CgiFormat::R32G32Sfloat => floats(2),
        CgiFormat::R32G32B32Sfloat => floats(3),
        CgiFormat::R32G32B32A32Sfloat => floats(4),
        _ => return None,
    })
}

fn encode_clear_depth(
    format: CgiFormat,
    depth: Option<f32>,
    stencil: Option<u8>,
    existing: &[u8],
) -> Option<Vec<u8>> {
    match format {
        CgiFormat::D32Sfloat => depth.map(|depth| depth.to_le_bytes().to_vec()),
        CgiFormat::D24UnormS8Uint => {
            let old = u32::from_le_bytes([existing[0], existing[1], existing[2], existing[3]]);
            let depth_bits = depth
                .map(|depth| (depth.max(0.0).min(1.0) * 0x00ff_ffff as f32) as u32)
                .unwrap_or(old & 0x00ff_ffff);
            let stencil_bits = stencil.map(|s| s as u32).unwrap_or(old >> 24);
            Some((depth_bits | stencil_bits << 24).to_le_bytes().to_vec())
        }
        _ => None,
    }
}

// Consumes queue operations in order: executes command lists against resource storage, validates
// resource states and signals the fence
struct GpuExecutor {
    resources: GpuResourceMap,
    stats: Arc<Mutex<CgiGpuStats>>,
    fence: Arc<CgiFenceHeadless>,
    rtv_heap: CgiDescriptorHeap,
    dsv_heap: CgiDescriptorHeap,
    validation: bool,
}

impl GpuExecutor {
    fn validation_error(
        &self,
        message: String,
    ) {
        if self.validation {
            log::error!("GPU validation: {}", message);
            self.stats.lock().unwrap().validation_errors += 1;
        }
    }

    fn process(
        &self,
        op: QueueOp,
    ) {
        match op {
            QueueOp::ExecuteCommandLists(lists) => {
                profiling::scope!("execute command lists");
                for commands in &lists {
                    self.execute(commands);
                }
                self.stats.lock().unwrap().command_lists_executed += lists.len() as u64;
            }
            QueueOp::Present {
                resource,
                image_index,
            } => {
                let state = {
                    let resources = self.resources.lock().unwrap();
                    resources.get(&resource).map(|r| r.states[0])
                };
                match state {
                    Some(state) if state == CgiResourceState::PRESENT => {}
                    Some(state) => self.validation_error(format!(
                        "presenting swap chain image {} in state {:?}, it must be in the present state",
                        image_index, state
                    )),
                    None => self.validation_error(format!(
                        "presenting swap chain image {} which no longer exists",
                        image_index
                    )),
                }
                self.stats.lock().unwrap().presents += 1;
            }
            QueueOp::Signal(value) => {
                self.fence.signal(value);
                self.stats.lock().unwrap().completed_fence_value = value;
            }
        }
    }

    fn check_state(
        &self,
        resource: &GpuResource,
        subresource: u32,
        expected: CgiResourceState,
        operation: &str,
    ) {
        let state = resource.states[subresource as usize];
        let ok = if expected.is_empty() {
            state.is_empty()
        } else {
            state.contains(expected)
        };
        if !ok {
            self.validation_error(format!(
                "{} on {} subresource {} expects state {:?} but it is {:?}",
                operation, resource.name, subresource, expected, state
            ));
        }
    }

    fn apply_barrier(
        &self,
        resources: &mut FnvHashMap<CgiResourceId, GpuResource>,
        transition: &CgiResourceTransition,
    ) {
        let resource = match resources.get_mut(&transition.resource) {
            Some(resource) => resource,
            None => {
                self.validation_error(format!(
                    "barrier on destroyed resource {:?}",
                    transition.resource
                ));
                return;
            }
        };

        let range = match transition.subresource {
            Some(subresource) if (subresource as usize) < resource.states.len() => {
                subresource as usize..subresource as usize + 1
            }
            Some(subresource) => {
                let message = format!(
                    "barrier on {} subresource {} which does not exist",
                    resource.name, subresource
                );
                self.validation_error(message);
                return;
            }
            None => 0..resource.states.len(),
        };

        for subresource in range {
            let state = resource.states[subresource];
            if state != transition.before {
                let message = format!(
                    "barrier on {} subresource {} says before state is {:?} but it is {:?}",
                    resource.name, subresource, transition.before, state
                );
                self.validation_error(message);
            }
            resource.states[subresource] = transition.after;
        }
    }

    fn view_target(
        &self,
        handle: CgiCpuDescriptorHandle,
    ) -> Option<(CgiResourceId, u32)> {
        match self
            .rtv_heap
            .read_cpu(handle)
            .or_else(|| self.dsv_heap.read_cpu(handle))
        {
            Some(CgiDescriptor::Rtv {
                resource,
                subresource,
                ..
            }) => Some((resource, subresource)),
            Some(CgiDescriptor::Dsv {
                resource,
                subresource,
                ..
            }) => Some((resource, subresource)),
            _ => None,
        }
    }

    fn execute(
        &self,
        commands: &[CgiNativeCommand],
    ) {
        // Pipeline state does not carry over between command lists
        let mut pipeline_bound = false;
        let mut draw_calls = 0;
        let mut dispatches = 0;
        let mut barriers = 0;

        for command in commands {
            match command {
                CgiNativeCommand::ResourceBarrier(transitions) => {
                    let mut resources = self.resources.lock().unwrap();
                    for transition in transitions {
                        self.apply_barrier(&mut resources, transition);
                    }
                    barriers += transitions.len() as u64;
                }
                CgiNativeCommand::OMSetRenderTargets { rtvs, dsv } => {
                    for handle in rtvs.iter().chain(dsv.iter()) {
                        if self.view_target(*handle).is_none() {
                            self.validation_error(format!(
                                "render target handle {:?} does not refer to a view",
                                handle
                            ));
                        }
                    }
                }
                CgiNativeCommand::ClearRenderTargetView { rtv, color } => {
                    self.clear_view(*rtv, |resource, data| {
                        if let GpuStorage::Texture { format, .. } = &resource.storage {
                            if let Some(pixel) = encode_clear_color(*format, *color) {
                                for chunk in data.chunks_mut(pixel.len()) {
                                    chunk.copy_from_slice(&pixel[..chunk.len()]);
                                }
                            }
                        }
                    }, CgiResourceState::RENDER_TARGET, "ClearRenderTargetView");
                }
                CgiNativeCommand::ClearDepthStencilView {
                    dsv,
                    depth,
                    stencil,
                } => {
                    self.clear_view(*dsv, |resource, data| {
                        if let GpuStorage::Texture { format, .. } = &resource.storage {
                            let pixel_size = format.pixel_size_in_bytes().unwrap_or(0) as usize;
                            if pixel_size == 0 {
                                return;
                            }
                            for chunk in data.chunks_mut(pixel_size) {
                                let pixel = encode_clear_depth(*format, *depth, *stencil, chunk);
                                if let Some(pixel) = pixel {
                                    let len = pixel.len().min(chunk.len());
                                    chunk[..len].copy_from_slice(&pixel[..len]);
                                }
                            }
                        }
                    }, CgiResourceState::DEPTH_WRITE, "ClearDepthStencilView");
                }
                CgiNativeCommand::SetPipelineState(_) => pipeline_bound = true,
                CgiNativeCommand::DrawInstanced { .. }
                | CgiNativeCommand::DrawIndexedInstanced { .. }
                | CgiNativeCommand::DispatchMesh { .. } => {
                    if !pipeline_bound {
                        self.validation_error("draw without a pipeline state".to_string());
                    }
                    draw_calls += 1;
                }
                CgiNativeCommand::Dispatch { .. } | CgiNativeCommand::DispatchRays { .. } => {
                    if !pipeline_bound {
                        self.validation_error("dispatch without a pipeline state".to_string());
                    }
                    dispatches += 1;
                }
                CgiNativeCommand::CopyBufferRegion {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => self.copy_buffer_region(*dst, *dst_offset, *src, *src_offset, *size),
                CgiNativeCommand::CopyTextureRegion {
                    dst,
                    dst_subresource,
                    src,
                    src_offset,
                    size,
                } => self.copy_texture_region(*dst, *dst_subresource, *src, *src_offset, *size),
                CgiNativeCommand::ResolveSubresource {
                    dst,
                    dst_subresource,
                    src,
                    src_subresource,
                } => self.resolve_subresource(*dst, *dst_subresource, *src, *src_subresource),
                _ => {}
            }
        }

        let mut stats = self.stats.lock().unwrap();
        stats.draw_calls += draw_calls;
        stats.dispatches += dispatches;
        stats.barriers += barriers;
    }

    fn clear_view<F: FnOnce(&GpuResource, &mut [u8])>(
        &self,
        handle: CgiCpuDescriptorHandle,
        f: F,
        expected_state: CgiResourceState,
        operation: &str,
    ) {
        let (resource_id, subresource) = match self.view_target(handle) {
            Some(target) => target,
            None => {
                self.validation_error(format!("{} with an invalid view {:?}", operation, handle));
                return;
            }
        };

        let mut resources = self.resources.lock().unwrap();
        let resource = match resources.get_mut(&resource_id) {
            Some(resource) => resource,
            None => {
                self.validation_error(format!("{} on a destroyed resource", operation));
                return;
            }
        };

        self.check_state(resource, subresource, expected_state, operation);

        // Take the subresource out so the closure can see the rest of the resource
        let mut data = match &mut resource.storage {
            GpuStorage::Texture { subresources, .. } => {
                std::mem::take(&mut subresources[subresource as usize])
            }
            GpuStorage::Buffer(_) => return,
        };
        f(resource, &mut data);
        if let GpuStorage::Texture { subresources, .. } = &mut resource.storage {
            subresources[subresource as usize] = data;
        }
    }

    fn copy_buffer_region(
        &self,
        dst: CgiResourceId,
        dst_offset: u64,
        src: CgiResourceId,
        src_offset: u64,
        size: u64,
    ) {
        let mut resources = self.resources.lock().unwrap();
        let data = match resources.get(&src) {
            Some(resource) => {
                self.check_state(resource, 0, CgiResourceState::COPY_SRC, "CopyBufferRegion");
                match &resource.storage {
                    GpuStorage::Buffer(data) if src_offset + size <= data.len() as u64 => {
                        data[src_offset as usize..(src_offset + size) as usize].to_vec()
                    }
                    _ => {
                        self.validation_error("CopyBufferRegion source out of range".to_string());
                        return;
                    }
                }
            }
            None => {
                self.validation_error("CopyBufferRegion from a destroyed buffer".to_string());
                return;
            }
        };

        match resources.get_mut(&dst) {
            Some(resource) => {
                self.check_state(resource, 0, CgiResourceState::COPY_DST, "CopyBufferRegion");
                match &mut resource.storage {
                    GpuStorage::Buffer(dst_data) if dst_offset + size <= dst_data.len() as u64 => {
                        dst_data[dst_offset as usize..(dst_offset + size) as usize]
                            .copy_from_slice(&data);
                    }
                    _ => self.validation_error(
                        "CopyBufferRegion destination out of range".to_string(),
                    ),
                }
            }
            None => self.validation_error("CopyBufferRegion into a destroyed buffer".to_string()),
        }
    }

    fn copy_texture_region(
        &self,
        dst: CgiResourceId,
        dst_subresource: u32,
        src: CgiResourceId,
        src_offset: u64,
        size: u64,
    ) {
        let mut resources = self.resources.lock().unwrap();
        let data = match resources.get(&src).map(|resource| &resource.storage) {
            Some(GpuStorage::Buffer(data)) if src_offset + size <= data.len() as u64 => {
                data[src_offset as usize..(src_offset + size) as usize].to_vec()
            }
            _ => {
                self.validation_error(
                    "CopyTextureRegion source is not a large enough buffer".to_string(),
                );
                return;
            }
        };

        match resources.get_mut(&dst) {
            Some(resource) if (dst_subresource as usize) < resource.states.len() => {
                self.check_state(
                    resource,
                    dst_subresource,
                    CgiResourceState::COPY_DST,
                    "CopyTextureRegion",
                );
                if let GpuStorage::Texture { subresources, .. } = &mut resource.storage {
                    let target = &mut subresources[dst_subresource as usize];
                    if target.len() != data.len() {
                        let message = format!(
                            "CopyTextureRegion of {} bytes into {} subresource {} of {} bytes",
                            data.len(),
                            resource.name,
                            dst_subresource,
                            target.len()
                        );
                        self.validation_error(message);
                    }
                    let len = target.len().min(data.len());
                    target[..len].copy_from_slice(&data[..len]);
                }
            }
            _ => self.validation_error("CopyTextureRegion into an invalid subresource".to_string()),
        }
    }

    fn resolve_subresource(
        &self,
        dst: CgiResourceId,
        dst_subresource: u32,
        src: CgiResourceId,
        src_subresource: u32,
    ) {
        let mut resources = self.resources.lock().unwrap();
        let data = match resources.get(&src) {
            Some(resource) => {
                self.check_state(
                    resource,
                    src_subresource,
                    CgiResourceState::RESOLVE_SOURCE,
                    "ResolveSubresource",
                );
                match &resource.storage {
                    GpuStorage::Texture { subresources, .. } => {
                        subresources[src_subresource as usize].clone()
                    }
                    GpuStorage::Buffer(_) => return,
                }
            }
            None => return,
        };

        if let Some(resource) = resources.get_mut(&dst) {
            self.check_state(
                resource,
                dst_subresource,
                CgiResourceState::RESOLVE_DEST,
                "ResolveSubresource",
            );
            if let GpuStorage::Texture { subresources, .. } = &mut resource.storage {
                let target = &mut subresources[dst_subresource as usize];
                let len = target.len().min(data.len());
                target[..len].copy_from_slice(&data[..len]);
            }
        }
    }
}

enum GpuQueue {
    Immediate(Mutex<GpuExecutor>),
    Threaded {
        sender: Option<Sender<QueueOp>>,
        worker: Option<JoinHandle<()>>,
    },
}

fn run_worker(
    executor: GpuExecutor,
    receiver: Receiver<QueueOp>,
    latency: Duration,
) {
    for op in receiver.iter() {
        if let QueueOp::ExecuteCommandLists(_) = &op {
            std::thread::sleep(latency);
        }
        executor.process(op);
    }
    log::debug!("Simulated GPU worker exiting");
}

/// The simulated GPU: resource memory, one direct queue and its fence.
///
/// Memory written through `write_buffer` models upload heaps: the CPU writes immediately, and it
/// is the caller's job (ring buffering plus the frame fence) not to overwrite data the queue has
/// not consumed yet.
pub struct CgiGpuHeadless {
    resources: GpuResourceMap,
    fence: Arc<CgiFenceHeadless>,
    last_signaled_value: AtomicU64,
    next_resource_id: AtomicU64,
    stats: Arc<Mutex<CgiGpuStats>>,
    queue: GpuQueue,
}

impl std::fmt::Debug for CgiGpuHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CgiGpuHeadless")
            .field("last_signaled_value", &self.last_signaled_value)
            .field("completed_value", &self.fence.completed_value())
            .finish()
    }
}

impl CgiGpuHeadless {
    pub(crate) fn new(
        timeline: CgiGpuTimeline,
        validation: bool,
        rtv_heap: CgiDescriptorHeap,
        dsv_heap: CgiDescriptorHeap,
    ) -> CgiResult<Self> {
        let resources = GpuResourceMap::default();
        let fence = Arc::new(CgiFenceHeadless::default());
        let stats = Arc::new(Mutex::new(CgiGpuStats::default()));

        let executor = GpuExecutor {
            resources: resources.clone(),
            stats: stats.clone(),
            fence: fence.clone(),
            rtv_heap,
            dsv_heap,
            validation,
        };

        let queue = match timeline {
            CgiGpuTimeline::Immediate => GpuQueue::Immediate(Mutex::new(executor)),
            CgiGpuTimeline::Threaded { latency } => {
                let (sender, receiver) = crossbeam_channel::unbounded();
                let worker = std::thread::Builder::new()
                    .name("cgi-headless-gpu".to_string())
                    .spawn(move || run_worker(executor, receiver, latency))?;
                GpuQueue::Threaded {
                    sender: Some(sender),
                    worker: Some(worker),
                }
            }
        };

        Ok(CgiGpuHeadless {
            resources,
            fence,
            last_signaled_value: AtomicU64::new(0),
            next_resource_id: AtomicU64::new(1),
            stats,
            queue,
        })
    }

    fn submit(
        &self,
        op: QueueOp,
    ) {
        match &self.queue {
            GpuQueue::Immediate(executor) => executor.lock().unwrap().process(op),
            GpuQueue::Threaded { sender, .. } => {
                if let Some(sender) = sender {
                    // The worker only exits after the sender is dropped
                    let _ = sender.send(op);
                }
            }
        }
    }

    fn allocate_resource_id(&self) -> CgiResourceId {
        CgiResourceId(self.next_resource_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn create_buffer(
        &self,
        name: &str,
        size: u64,
        initial_state: CgiResourceState,
    ) -> CgiResourceId {
        let id = self.allocate_resource_id();
        log::trace!("Create buffer {} ({:?}) of {} bytes", name, id, size);
        self.resources.lock().unwrap().insert(
            id,
            GpuResource {
                name: name.to_string(),
                storage: GpuStorage::Buffer(vec![0; size as usize]),
                states: vec![initial_state],
            },
        );
        id
    }

    /// Subresources are laid out mip-major within each array layer: `mip + layer * mip_count`
    pub fn create_texture(
        &self,
        texture_def: &CgiTextureDef,
        initial_state: CgiResourceState,
    ) -> CgiResourceId {
        let id = self.allocate_resource_id();
        let mut subresources = Vec::with_capacity(texture_def.subresource_count() as usize);
        for _ in 0..texture_def.array_layers {
            for mip_level in 0..texture_def.mip_count {
                let extents = texture_def.mip_extents(mip_level);
                let size = texture_def.format.surface_size(extents.width, extents.height)
                    * u64::from(texture_def.depth);
                subresources.push(vec![0; size as usize]);
            }
        }

        log::trace!(
            "Create texture {} ({:?}) with {} subresources",
            texture_def.name,
            id,
            subresources.len()
        );
        self.resources.lock().unwrap().insert(
            id,
            GpuResource {
                name: texture_def.name.clone(),
                states: vec![initial_state; subresources.len()],
                storage: GpuStorage::Texture {
                    format: texture_def.format,
                    subresources,
                },
            },
        );
        id
    }

    pub fn destroy_resource(
        &self,
        id: CgiResourceId,
    ) {
        if self.resources.lock().unwrap().remove(&id).is_none() {
            log::warn!("Destroying resource {:?} which does not exist", id);
        }
    }

    /// CPU write into a buffer (upload memory)
    pub fn write_buffer(
        &self,
        id: CgiResourceId,
        offset: u64,
        data: &[u8],
    ) {
        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .get_mut(&id)
            .unwrap_or_else(|| panic!("write to destroyed buffer {:?}", id));
        match &mut resource.storage {
            GpuStorage::Buffer(storage) => {
                let end = offset as usize + data.len();
                assert!(
                    end <= storage.len(),
                    "write of {} bytes at {} overflows buffer {} of {} bytes",
                    data.len(),
                    offset,
                    resource.name,
                    storage.len()
                );
                storage[offset as usize..end].copy_from_slice(data);
            }
            GpuStorage::Texture { .. } => panic!("{} is not a buffer", resource.name),
        }
    }

    pub fn read_buffer(
        &self,
        id: CgiResourceId,
        offset: u64,
        size: u64,
    ) -> Option<Vec<u8>> {
        let resources = self.resources.lock().unwrap();
        match &resources.get(&id)?.storage {
            GpuStorage::Buffer(storage) => storage
                .get(offset as usize..(offset + size) as usize)
                .map(|data| data.to_vec()),
            GpuStorage::Texture { .. } => None,
        }
    }

    pub fn read_subresource(
        &self,
        id: CgiResourceId,
        subresource: u32,
    ) -> Option<Vec<u8>> {
        let resources = self.resources.lock().unwrap();
        match &resources.get(&id)?.storage {
            GpuStorage::Texture { subresources, .. } => {
                subresources.get(subresource as usize).cloned()
            }
            GpuStorage::Buffer(_) => None,
        }
    }

    /// State of a subresource as seen by the GPU timeline, i.e. after all executed barriers
    pub fn resource_state(
        &self,
        id: CgiResourceId,
        subresource: u32,
    ) -> Option<CgiResourceState> {
        let resources = self.resources.lock().unwrap();
        resources
            .get(&id)?
            .states
            .get(subresource as usize)
            .copied()
    }

    pub fn execute_command_lists(
        &self,
        lists: Vec<Vec<CgiNativeCommand>>,
    ) {
        if !lists.is_empty() {
            self.submit(QueueOp::ExecuteCommandLists(lists));
        }
    }

    pub fn present(
        &self,
        resource: CgiResourceId,
        image_index: u32,
    ) {
        self.submit(QueueOp::Present {
            resource,
            image_index,
        });
    }

    /// Queue a signal of the next fence value and return it
    pub fn signal(&self) -> u64 {
        let value = self.last_signaled_value.fetch_add(1, Ordering::AcqRel) + 1;
        self.submit(QueueOp::Signal(value));
        value
    }

    pub fn last_signaled_value(&self) -> u64 {
        self.last_signaled_value.load(Ordering::Acquire)
    }

    pub fn completed_fence_value(&self) -> u64 {
        self.fence.completed_value()
    }

    /// Returns true if the call blocked
    pub fn wait_for_fence_value(
        &self,
        value: u64,
    ) -> bool {
        profiling::scope!("wait_for_fence_value");
        self.fence.wait_for_value(value)
    }

    pub fn wait_idle(&self) {
        let value = self.signal();
        self.wait_for_fence_value(value);
    }

    pub fn stats(&self) -> CgiGpuStats {
        let mut stats = *self.stats.lock().unwrap();
        stats.completed_fence_value = self.fence.completed_value();
        stats
    }
}

impl Drop for CgiGpuHeadless {
    fn drop(&mut self) {
        if let GpuQueue::Threaded { sender, worker } = &mut self.queue {
            sender.take();
            if let Some(worker) = worker.take() {
                if worker.join().is_err() {
                    log::error!("Simulated GPU worker panicked");
                }
            }
        }
    }
}
