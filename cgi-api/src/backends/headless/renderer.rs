use super::{
    CgiCommandBufferHeadless, CgiDeviceContextHeadless, CgiFramebufferHeadless,
    CgiGeometryHeadless, CgiPipelineHeadless, CgiRenderPassHeadless, CgiShaderHeadless,
    CgiSwapchainHeadless, CgiTextureHeadless,
};
use crate::{
    CgiCommandBuffer, CgiFrameStats, CgiFramebufferDef, CgiFramebufferHandle, CgiGeometryDef,
    CgiPipelineDef, CgiRenderPassDef, CgiRenderPassHandle, CgiRendererDef, CgiResult,
    CgiShaderDef, CgiSwapchainDef, CgiTextureDef,
};
use cgi_base::ring::{FrameRing, PerRingSlot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Owns the device, the swap chain and the frame cycle. Every other object is created here.
///
/// Frame cycle methods take `&mut self` and run on the render thread. Factories and
/// `create_command_buffer` take `&self`, so worker threads may record in parallel while sharing
/// the renderer.
pub struct CgiRendererHeadless {
    device_context: CgiDeviceContextHeadless,
    swapchain: CgiSwapchainHeadless,
    frame_ring: FrameRing,
    // Fence value signaled after the last submission of each ring slot
    slot_fence_values: PerRingSlot<u64>,
    command_buffer: CgiCommandBuffer,
    queued_submissions: Mutex<Vec<Vec<super::internal::CgiNativeCommand>>>,
    in_frame: bool,
    fence_stalls: AtomicU64,
}

impl std::fmt::Debug for CgiRendererHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiRendererHeadless")
            .field("ring_index", &self.frame_ring.index())
            .field("frame_count", &self.frame_ring.frame_count())
            .field("in_frame", &self.in_frame)
            .finish()
    }
}

impl CgiRendererHeadless {
    pub fn new(renderer_def: &CgiRendererDef) -> CgiResult<Self> {
        let device_context = CgiDeviceContextHeadless::new(renderer_def)?;
        let swapchain = CgiSwapchainHeadless::new(&device_context, &renderer_def.swapchain)?;
        let ring_buffer_size = renderer_def.ring_buffer_size;
        let command_buffer =
            CgiCommandBuffer::Headless(CgiCommandBufferHeadless::new(&device_context, false));

        log::info!(
            "Created headless renderer: {} ring slots, {:?} GPU timeline, validation {:?}",
            ring_buffer_size,
            renderer_def.gpu_timeline,
            renderer_def.validation_mode
        );

        Ok(CgiRendererHeadless {
            device_context,
            swapchain,
            frame_ring: FrameRing::new(ring_buffer_size),
            slot_fence_values: PerRingSlot::new(ring_buffer_size),
            command_buffer,
            queued_submissions: Default::default(),
            in_frame: false,
            fence_stalls: AtomicU64::new(0),
        })
    }

    pub fn device_context(&self) -> &CgiDeviceContextHeadless {
        &self.device_context
    }

    pub fn renderer_def(&self) -> &CgiRendererDef {
        self.device_context.renderer_def()
    }

    pub fn ring_index(&self) -> u32 {
        self.frame_ring.index()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_ring.frame_count()
    }

    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// The command buffer recorded by the render thread, begun by `begin_frame`
    pub fn command_buffer(&self) -> &CgiCommandBuffer {
        &self.command_buffer
    }

    fn headless_command_buffer(&self) -> &CgiCommandBufferHeadless {
        match &self.command_buffer {
            CgiCommandBuffer::Headless(command_buffer) => command_buffer,
        }
    }

    /// Fence value the given ring slot waits for before it is reused
    pub fn slot_fence_value(
        &self,
        ring_index: u32,
    ) -> u64 {
        self.slot_fence_values[ring_index]
    }

    /// Advance to the next ring slot and wait until the GPU is done with it. This is the only
    /// place the frame cycle blocks.
    pub fn begin_frame(
        &mut self,
        present: bool,
    ) -> CgiResult<()> {
        profiling::scope!("begin_frame");
        assert!(!self.in_frame, "begin_frame() called twice without end_frame()");

        let ring_index = self.frame_ring.advance();
        let fence_value = self.slot_fence_values[ring_index];
        if self.device_context.gpu().wait_for_fence_value(fence_value) {
            self.fence_stalls.fetch_add(1, Ordering::Relaxed);
            log::trace!(
                "Frame {} waited for fence {} of ring slot {}",
                self.frame_ring.frame_count(),
                fence_value,
                ring_index
            );
        }

        self.device_context.reset_command_allocators(ring_index);
        self.device_context
            .begin_frame(ring_index, self.frame_ring.frame_count());

        if present {
            let image_index = self.swapchain.acquire_next_image();
            log::trace!("Acquired swap chain image {}", image_index);
        }

        self.headless_command_buffer().begin()?;
        self.in_frame = true;
        Ok(())
    }

    /// Submit the frame's command lists, signal the ring slot's fence and optionally present
    pub fn end_frame(
        &mut self,
        present: bool,
    ) -> CgiResult<()> {
        profiling::scope!("end_frame");
        assert!(self.in_frame, "end_frame() called without begin_frame()");
        let state = self.headless_command_buffer().state();
        assert!(
            state == super::CgiCommandBufferState::Recording
                || state == super::CgiCommandBufferState::Ended,
            "end_frame() while a render pass is active"
        );
        if present && self.swapchain.current_image_index().is_none() {
            return Err("end_frame(true) without a swap chain image, call begin_frame(true)".into());
        }

        let command_buffer = self.headless_command_buffer();
        if state == super::CgiCommandBufferState::Recording {
            command_buffer.end()?;
        }

        let mut lists = Vec::default();
        if let Some(list) = command_buffer.take_submission() {
            lists.push(list);
        }
        lists.append(&mut self.queued_submissions.lock().unwrap());

        let gpu = self.device_context.gpu();
        gpu.execute_command_lists(lists);
        if present {
            self.swapchain.present();
        }

        let ring_index = self.frame_ring.index();
        let fence_value = gpu.signal();
        self.slot_fence_values[ring_index] = fence_value;
        self.device_context
            .mark_command_allocators_in_flight(ring_index, fence_value);

        self.in_frame = false;
        Ok(())
    }

    pub fn present(&mut self) -> CgiResult<()> {
        self.end_frame(true)
    }

    /// Wait for the last submitted frame. Presenting frames are throttled by `begin_frame`
    /// already, so this only blocks when `present` is false.
    pub fn sync(
        &mut self,
        present: bool,
    ) {
        if !present {
            let fence_value = self.slot_fence_values[self.frame_ring.index()];
            self.device_context.gpu().wait_for_fence_value(fence_value);
        }
    }

    pub fn wait_idle(&self) {
        profiling::scope!("wait_idle");
        self.device_context.gpu().wait_idle();
    }

    /// Submit a command buffer recorded on another thread. It executes after the render
    /// thread's command buffer when the frame ends.
    pub fn queue_command_buffer(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        let command_buffer = match command_buffer {
            CgiCommandBuffer::Headless(command_buffer) => command_buffer,
        };
        let list = command_buffer
            .take_submission()
            .ok_or("only command buffers closed with end() can be queued")?;
        self.queued_submissions.lock().unwrap().push(list);
        Ok(())
    }

    /// Record into a transient command buffer, submit it and wait for it
    pub fn execute_immediate<F>(
        &self,
        f: F,
    ) -> CgiResult<()>
    where
        F: FnOnce(&CgiCommandBuffer) -> CgiResult<()>,
    {
        profiling::scope!("execute_immediate");
        let command_buffer =
            CgiCommandBuffer::Headless(CgiCommandBufferHeadless::new(&self.device_context, true));
        let headless_command_buffer = match &command_buffer {
            CgiCommandBuffer::Headless(command_buffer) => command_buffer,
        };
        headless_command_buffer.begin()?;
        f(&command_buffer)?;
        headless_command_buffer.end()?;

        if let Some(list) = headless_command_buffer.take_submission() {
            self.device_context.gpu().execute_command_lists(vec![list]);
        }
        self.wait_idle();
        Ok(())
    }

    pub fn swapchain_def(&self) -> &CgiSwapchainDef {
        self.swapchain.swapchain_def()
    }

    pub fn swapchain(&self) -> &CgiSwapchainHeadless {
        &self.swapchain
    }

    pub fn current_swapchain_image_index(&self) -> Option<u32> {
        self.swapchain.current_image_index()
    }

    /// Recreate the swap chain images. Framebuffers using them must be recreated by the caller.
    pub fn resize_swapchain(
        &mut self,
        width: u32,
        height: u32,
    ) -> CgiResult<()> {
        assert!(!self.in_frame, "resize_swapchain() inside a frame");
        self.wait_idle();
        self.swapchain.resize(width, height)
    }

    pub fn frame_stats(&self) -> CgiFrameStats {
        CgiFrameStats {
            frame_count: self.frame_ring.frame_count(),
            fence_stalls: self.fence_stalls.load(Ordering::Relaxed),
            cbv_srv_uav_peak_load: self.device_context.cbv_srv_uav_heap().peak_load(),
            sampler_peak_load: self.device_context.sampler_heap().peak_load(),
            gpu: self.device_context.gpu().stats(),
        }
    }

    //
    // Factories
    //

    pub fn create_command_buffer(&self) -> CgiCommandBufferHeadless {
        CgiCommandBufferHeadless::new(&self.device_context, false)
    }

    pub fn create_render_pass(
        &self,
        render_pass_def: &CgiRenderPassDef,
    ) -> CgiResult<CgiRenderPassHandle> {
        let render_pass = CgiRenderPassHeadless::new(render_pass_def)?;
        let handle = self
            .device_context
            .inner
            .render_passes
            .lock()
            .unwrap()
            .insert(std::sync::Arc::new(render_pass));
        log::debug!(
            "Created render pass {:?} with {} attachments and {} subpasses",
            handle,
            render_pass_def.attachments.len(),
            render_pass_def.subpasses.len()
        );
        Ok(CgiRenderPassHandle(handle))
    }

    /// Panics if the handle is stale
    pub fn delete_render_pass(
        &self,
        render_pass: CgiRenderPassHandle,
    ) {
        self.device_context
            .inner
            .render_passes
            .lock()
            .unwrap()
            .remove(render_pass.0);
    }

    pub fn create_framebuffer(
        &self,
        framebuffer_def: &CgiFramebufferDef,
    ) -> CgiResult<CgiFramebufferHandle> {
        let render_pass = self
            .device_context
            .render_pass(framebuffer_def.render_pass)
            .ok_or("create_framebuffer() with a stale render pass handle")?;
        let swapchain_image = match framebuffer_def.swapchain_image {
            Some(image_index) => Some(
                self.swapchain
                    .image(image_index)
                    .cloned()
                    .ok_or_else(|| format!("swap chain has no image {}", image_index))?,
            ),
            None => None,
        };

        let framebuffer = CgiFramebufferHeadless::new(
            &self.device_context,
            framebuffer_def.render_pass,
            render_pass,
            framebuffer_def,
            swapchain_image,
        )?;
        let handle = self
            .device_context
            .inner
            .framebuffers
            .lock()
            .unwrap()
            .insert(std::sync::Arc::new(framebuffer));
        Ok(CgiFramebufferHandle(handle))
    }

    /// Panics if the handle is stale
    pub fn delete_framebuffer(
        &self,
        framebuffer: CgiFramebufferHandle,
    ) {
        self.device_context
            .inner
            .framebuffers
            .lock()
            .unwrap()
            .remove(framebuffer.0);
    }

    pub fn create_texture(
        &self,
        texture_def: &CgiTextureDef,
    ) -> CgiResult<CgiTextureHeadless> {
        CgiTextureHeadless::new(&self.device_context, texture_def)
    }

    /// Load a DDS file into a new sampled texture and upload every mip
    pub fn create_texture_from_dds(
        &self,
        name: &str,
        bytes: &[u8],
        lod_bias: u32,
    ) -> CgiResult<CgiTextureHeadless> {
        profiling::scope!("create_texture_from_dds");
        let image = crate::load_dds(bytes, lod_bias)?;
        let texture = self.create_texture(&image.texture_def(name))?;

        self.execute_immediate(|command_buffer| {
            let command_buffer = match command_buffer {
                CgiCommandBuffer::Headless(command_buffer) => command_buffer,
            };
            for (array_layer, mips) in image.layers.iter().enumerate() {
                for (mip_level, mip) in mips.iter().enumerate() {
                    texture.update_image(
                        command_buffer,
                        mip_level as u32,
                        array_layer as u32,
                        &mip.data,
                    )?;
                }
            }
            Ok(())
        })?;
        texture.free_staging_buffers();

        log::debug!(
            "Loaded {} from DDS: {}x{} {:?}, {} mips ({} skipped)",
            name,
            image.width,
            image.height,
            image.format,
            image.mip_count(),
            image.skipped_mips
        );
        Ok(texture)
    }

    pub fn create_geometry(
        &self,
        geometry_def: &CgiGeometryDef,
    ) -> CgiResult<CgiGeometryHeadless> {
        CgiGeometryHeadless::new(&self.device_context, geometry_def)
    }

    pub fn create_shader(
        &self,
        shader_def: &CgiShaderDef,
    ) -> CgiResult<CgiShaderHeadless> {
        CgiShaderHeadless::new(&self.device_context, shader_def)
    }

    pub fn create_pipeline(
        &self,
        pipeline_def: &CgiPipelineDef,
    ) -> CgiResult<CgiPipelineHeadless> {
        CgiPipelineHeadless::new(&self.device_context, pipeline_def)
    }
}

impl Drop for CgiRendererHeadless {
    fn drop(&mut self) {
        log::info!("Destroying headless renderer");
        self.wait_idle();

        // Framebuffers hold textures, which hold the device context
        self.device_context
            .inner
            .framebuffers
            .lock()
            .unwrap()
            .clear();
        self.device_context
            .inner
            .render_passes
            .lock()
            .unwrap()
            .clear();

        // Best effort: objects the application still holds keep the device alive. The renderer's
        // own references are this one, the swap chain, its images and the command buffer.
        if cfg!(debug_assertions) {
            let expected = 3 + self.swapchain.image_count() as usize;
            let actual = self.device_context.strong_count();
            if actual > expected {
                log::warn!(
                    "Renderer dropped while {} objects still reference the device",
                    actual - expected
                );
            }
        }
    }
}
