use super::internal::{CgiNativeCommand, CgiPipelineBindPoint, CgiResourceTransition};
use super::{
    CgiDeviceContextHeadless, CgiFramebufferHeadless, CgiGeometryHeadless, CgiPipelineHeadless,
    CgiShaderHeadless,
};
use crate::{
    CgiClearValue, CgiComplexSetHandle, CgiFramebufferHandle, CgiPipelineType,
    CgiRenderPassHandle, CgiResourceState, CgiResult, CgiScissorRect, CgiTexture,
    CgiTextureBarrier, CgiViewport, CgiViewportFlags,
};
use cgi_base::ring::PerRingSlot;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CgiCommandBufferState {
    /// Not recording, the lists of earlier frames may still be in flight
    Idle,
    Recording,
    InRenderPass,
    /// Closed by `end()`, waiting to be submitted
    Ended,
}

struct ActiveRenderPass {
    render_pass: CgiRenderPassHandle,
    framebuffer: Arc<CgiFramebufferHeadless>,
    subpass: u32,
    clear_values: Vec<CgiClearValue>,
}

#[derive(Copy, Clone)]
struct BoundPipeline {
    id: u64,
    pipeline_type: CgiPipelineType,
    root_signature: u64,
    render_pass: Option<CgiRenderPassHandle>,
    subpass: u32,
}

impl BoundPipeline {
    fn bind_point(&self) -> CgiPipelineBindPoint {
        match self.pipeline_type {
            CgiPipelineType::Graphics | CgiPipelineType::Mesh => CgiPipelineBindPoint::Graphics,
            CgiPipelineType::Compute | CgiPipelineType::RayTracing => {
                CgiPipelineBindPoint::Compute
            }
        }
    }
}

struct CommandBufferInner {
    state: CgiCommandBufferState,
    // One native list per ring slot
    lists: PerRingSlot<Vec<CgiNativeCommand>>,
    ring_index: u32,
    recording_thread: Option<ThreadId>,
    pending_barriers: Vec<CgiResourceTransition>,
    render_pass: Option<ActiveRenderPass>,
    pipeline: Option<BoundPipeline>,
    graphics_root_signature: Option<u64>,
    compute_root_signature: Option<u64>,
    index_buffer_bound: bool,
    viewport: Option<CgiViewport>,
    scissor: Option<CgiScissorRect>,
}

impl CommandBufferInner {
    fn assert_recording(
        &self,
        operation: &str,
    ) {
        assert!(
            self.state == CgiCommandBufferState::Recording
                || self.state == CgiCommandBufferState::InRenderPass,
            "{} called on a command buffer that is not recording ({:?})",
            operation,
            self.state
        );
    }

    fn flush_barriers(&mut self) {
        if !self.pending_barriers.is_empty() {
            let barriers = std::mem::take(&mut self.pending_barriers);
            self.lists[self.ring_index].push(CgiNativeCommand::ResourceBarrier(barriers));
        }
    }

    fn push(
        &mut self,
        command: CgiNativeCommand,
    ) {
        self.flush_barriers();
        log::trace!("record {:?}", command);
        self.lists[self.ring_index].push(command);
    }

    fn push_barriers(
        &mut self,
        transitions: Vec<CgiResourceTransition>,
    ) {
        if !transitions.is_empty() {
            self.push(CgiNativeCommand::ResourceBarrier(transitions));
        }
    }

    // Bind the targets of the current subpass and clear the attachments first used in it
    fn begin_subpass(&mut self) {
        let (commands, subpass) = {
            let active = match &self.render_pass {
                Some(active) => active,
                None => return,
            };
            let framebuffer = &active.framebuffer;
            let mut commands = vec![CgiNativeCommand::OMSetRenderTargets {
                rtvs: framebuffer.rtv_handles(active.subpass),
                dsv: framebuffer.dsv_handle(active.subpass),
            }];
            commands.extend(framebuffer.clear_commands(active.subpass, &active.clear_values));
            (commands, active.subpass)
        };

        log::trace!("begin subpass {}", subpass);
        for command in commands {
            self.push(command);
        }
    }

    fn assert_draw_state(
        &self,
        operation: &str,
        expected_type: CgiPipelineType,
    ) {
        self.assert_recording(operation);
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| panic!("{} without a bound pipeline", operation));
        assert_eq!(
            pipeline.pipeline_type, expected_type,
            "{} with a {:?} pipeline bound",
            operation, pipeline.pipeline_type
        );

        match expected_type {
            CgiPipelineType::Graphics | CgiPipelineType::Mesh => {
                let active = self
                    .render_pass
                    .as_ref()
                    .unwrap_or_else(|| panic!("{} outside of a render pass", operation));
                assert!(
                    pipeline.render_pass == Some(active.render_pass)
                        && pipeline.subpass == active.subpass,
                    "{}: the bound pipeline was built for {:?} subpass {}, the active render pass is {:?} subpass {}",
                    operation,
                    pipeline.render_pass,
                    pipeline.subpass,
                    active.render_pass,
                    active.subpass
                );
            }
            CgiPipelineType::Compute | CgiPipelineType::RayTracing => {
                assert!(
                    self.render_pass.is_none(),
                    "{} inside a render pass",
                    operation
                );
            }
        }
    }
}

/// Records native commands, one list per ring slot.
///
/// A command buffer is used by one thread at a time. Each recording thread gets its own command
/// allocator for the ring slot. `immediate` command buffers record outside the frame cycle and
/// bypass the allocators.
pub struct CgiCommandBufferHeadless {
    device_context: CgiDeviceContextHeadless,
    immediate: bool,
    inner: Mutex<CommandBufferInner>,
}

impl std::fmt::Debug for CgiCommandBufferHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiCommandBufferHeadless")
            .field("immediate", &self.immediate)
            .field("state", &self.state())
            .finish()
    }
}

impl CgiCommandBufferHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        immediate: bool,
    ) -> Self {
        let list_count = if immediate {
            1
        } else {
            device_context.ring_buffer_size()
        };

        CgiCommandBufferHeadless {
            device_context: device_context.clone(),
            immediate,
            inner: Mutex::new(CommandBufferInner {
                state: CgiCommandBufferState::Idle,
                lists: PerRingSlot::new(list_count),
                ring_index: 0,
                recording_thread: None,
                pending_barriers: Vec::default(),
                render_pass: None,
                pipeline: None,
                graphics_root_signature: None,
                compute_root_signature: None,
                index_buffer_bound: false,
                viewport: None,
                scissor: None,
            }),
        }
    }

    pub fn state(&self) -> CgiCommandBufferState {
        self.inner.lock().unwrap().state
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Commands recorded into the list of the ring slot this buffer last began in
    pub fn recorded_commands(&self) -> Vec<CgiNativeCommand> {
        let inner = self.inner.lock().unwrap();
        inner.lists[inner.ring_index].clone()
    }

    pub fn current_subpass(&self) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .render_pass
            .as_ref()
            .map(|active| active.subpass)
    }

    pub fn viewport(&self) -> Option<CgiViewport> {
        self.inner.lock().unwrap().viewport
    }

    pub fn scissor(&self) -> Option<CgiScissorRect> {
        self.inner.lock().unwrap().scissor
    }

    /// Start recording into the current ring slot's list, discarding what it held
    pub fn begin(&self) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        assert!(
            inner.state == CgiCommandBufferState::Idle,
            "begin() called on a command buffer in state {:?}",
            inner.state
        );

        let ring_index = if self.immediate {
            0
        } else {
            let ring_index = self.device_context.ring_index();
            let thread = std::thread::current().id();
            self.device_context.begin_command_list(ring_index, thread);
            inner.recording_thread = Some(thread);
            ring_index
        };

        inner.ring_index = ring_index;
        inner.lists[ring_index].clear();
        inner.state = CgiCommandBufferState::Recording;
        inner.pipeline = None;
        inner.graphics_root_signature = None;
        inner.compute_root_signature = None;
        inner.index_buffer_bound = false;
        inner.viewport = None;
        inner.scissor = None;
        Ok(())
    }

    /// Close the list. It is submitted by the renderer.
    pub fn end(&self) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        assert!(
            inner.state == CgiCommandBufferState::Recording,
            "end() called on a command buffer in state {:?}",
            inner.state
        );

        inner.flush_barriers();
        if let Some(thread) = inner.recording_thread.take() {
            self.device_context
                .end_command_list(inner.ring_index, thread);
        }
        inner.state = CgiCommandBufferState::Ended;
        Ok(())
    }

    // Hand the closed list to the renderer for submission
    pub(crate) fn take_submission(&self) -> Option<Vec<CgiNativeCommand>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != CgiCommandBufferState::Ended {
            return None;
        }
        inner.state = CgiCommandBufferState::Idle;
        Some(inner.lists[inner.ring_index].clone())
    }

    // Used by resource uploads
    pub(crate) fn record_commands(
        &self,
        commands: Vec<CgiNativeCommand>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("resource upload");
        for command in commands {
            inner.push(command);
        }
    }

    pub fn cmd_begin_render_pass(
        &self,
        render_pass: CgiRenderPassHandle,
        framebuffer: CgiFramebufferHandle,
        clear_values: &[CgiClearValue],
        viewport_flags: CgiViewportFlags,
    ) -> CgiResult<()> {
        profiling::scope!("cmd_begin_render_pass");
        let mut inner = self.inner.lock().unwrap();
        assert!(
            inner.state == CgiCommandBufferState::Recording,
            "cmd_begin_render_pass() called in state {:?}",
            inner.state
        );

        let framebuffer = self
            .device_context
            .framebuffer(framebuffer)
            .ok_or("cmd_begin_render_pass() with a stale framebuffer handle")?;
        if framebuffer.render_pass_handle() != render_pass {
            return Err("framebuffer was created for a different render pass".into());
        }

        let render_pass_headless = framebuffer.render_pass();
        let attachment_count = render_pass_headless.attachment_count() as usize;
        let any_clears = render_pass_headless
            .def()
            .attachments
            .iter()
            .any(|attachment| attachment.clears());
        if clear_values.len() != attachment_count && (any_clears || !clear_values.is_empty()) {
            return Err(format!(
                "render pass has {} attachments, {} clear values given",
                attachment_count,
                clear_values.len()
            )
            .into());
        }
        for (attachment, clear_value) in render_pass_headless
            .def()
            .attachments
            .iter()
            .zip(clear_values)
            .filter(|(attachment, _)| attachment.clears())
        {
            let is_depth_value = matches!(clear_value, CgiClearValue::DepthStencil { .. });
            if attachment.format.is_depth() != is_depth_value {
                return Err(format!(
                    "attachment {} ({:?}) was given the clear value {:?}",
                    attachment.name, attachment.format, clear_value
                )
                .into());
            }
        }

        let extents = framebuffer.extents();
        let entry_transitions = framebuffer.entry_transitions();
        inner.push_barriers(entry_transitions);

        inner.render_pass = Some(ActiveRenderPass {
            render_pass,
            framebuffer,
            subpass: 0,
            clear_values: clear_values.to_vec(),
        });
        inner.state = CgiCommandBufferState::InRenderPass;
        inner.begin_subpass();

        if !viewport_flags.contains(CgiViewportFlags::NO_VIEWPORT) {
            let viewport = CgiViewport::from_extents(extents);
            inner.push(CgiNativeCommand::RSSetViewports(vec![viewport]));
            inner.viewport = Some(viewport);
        }
        if !viewport_flags.contains(CgiViewportFlags::NO_SCISSOR) {
            let scissor = CgiScissorRect::from_extents(extents);
            inner.push(CgiNativeCommand::RSSetScissorRects(vec![scissor]));
            inner.scissor = Some(scissor);
        }
        Ok(())
    }

    /// Move to the next subpass. Only the attachments whose layout changes get a barrier.
    pub fn cmd_next_subpass(&self) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let (resolve_commands, transitions) = {
            let active = inner
                .render_pass
                .as_mut()
                .expect("cmd_next_subpass() outside of a render pass");
            let subpass_count = active.framebuffer.render_pass().subpass_count();
            assert!(
                active.subpass + 1 < subpass_count,
                "cmd_next_subpass() called on the last subpass ({} of {})",
                active.subpass,
                subpass_count
            );

            let resolve_commands = active.framebuffer.resolve_commands(active.subpass);
            let transitions = active.framebuffer.subpass_transitions(active.subpass);
            active.subpass += 1;
            (resolve_commands, transitions)
        };

        for command in resolve_commands {
            inner.push(command);
        }
        inner.push_barriers(transitions);
        inner.begin_subpass();
        Ok(())
    }

    pub fn cmd_end_render_pass(&self) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let active = inner
            .render_pass
            .take()
            .expect("cmd_end_render_pass() without cmd_begin_render_pass()");
        let subpass_count = active.framebuffer.render_pass().subpass_count();
        assert!(
            active.subpass + 1 == subpass_count,
            "cmd_end_render_pass() in subpass {}, the render pass has {} subpasses",
            active.subpass,
            subpass_count
        );

        for command in active.framebuffer.resolve_commands(active.subpass) {
            inner.push(command);
        }
        inner.push_barriers(active.framebuffer.exit_transitions());
        inner.state = CgiCommandBufferState::Recording;
        Ok(())
    }

    pub fn cmd_bind_pipeline(
        &self,
        pipeline: &CgiPipelineHeadless,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_bind_pipeline()");

        let bound = BoundPipeline {
            id: pipeline.id(),
            pipeline_type: pipeline.pipeline_type(),
            root_signature: pipeline.root_signature().id(),
            render_pass: pipeline.render_pass(),
            subpass: pipeline.subpass(),
        };
        let bind_point = bound.bind_point();

        inner.push(CgiNativeCommand::SetPipelineState(bound.id));
        let bound_root_signature = match bind_point {
            CgiPipelineBindPoint::Graphics => &mut inner.graphics_root_signature,
            CgiPipelineBindPoint::Compute => &mut inner.compute_root_signature,
        };
        if *bound_root_signature != Some(bound.root_signature) {
            *bound_root_signature = Some(bound.root_signature);
            inner.push(CgiNativeCommand::SetRootSignature {
                bind_point,
                root_signature: bound.root_signature,
            });
        }
        if bound.pipeline_type == CgiPipelineType::Graphics {
            inner.push(CgiNativeCommand::IASetPrimitiveTopology(pipeline.topology()));
        }

        inner.pipeline = Some(bound);
        Ok(())
    }

    /// Bind the vertex buffers of `geometry` selected by `binding_mask`
    pub fn cmd_bind_vertex_buffers(
        &self,
        geometry: &CgiGeometryHeadless,
        binding_mask: u32,
    ) -> CgiResult<()> {
        let views = geometry.vertex_buffer_views(binding_mask);
        if views.is_empty() {
            return Err(format!(
                "geometry {} has no vertex buffers for binding mask {:#x}",
                geometry.geometry_def().name,
                binding_mask
            )
            .into());
        }

        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_bind_vertex_buffers()");

        // One command per run of consecutive slots
        let mut start_slot = views[0].0;
        let mut run = Vec::default();
        for (slot, view) in views {
            if slot != start_slot + run.len() as u32 {
                inner.push(CgiNativeCommand::IASetVertexBuffers {
                    start_slot,
                    views: std::mem::take(&mut run),
                });
                start_slot = slot;
            }
            run.push(view);
        }
        inner.push(CgiNativeCommand::IASetVertexBuffers {
            start_slot,
            views: run,
        });
        Ok(())
    }

    pub fn cmd_bind_index_buffer(
        &self,
        geometry: &CgiGeometryHeadless,
    ) -> CgiResult<()> {
        let view = geometry.index_buffer_view().ok_or_else(|| {
            format!(
                "geometry {} has no index buffer",
                geometry.geometry_def().name
            )
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_bind_index_buffer()");
        inner.push(CgiNativeCommand::IASetIndexBuffer(view));
        inner.index_buffer_bound = true;
        Ok(())
    }

    /// Bind one descriptor set of `shader`, using the uniforms staged with `write_uniform`. Sets
    /// with textures need the complex set to bind.
    pub fn cmd_bind_descriptors(
        &self,
        shader: &CgiShaderHeadless,
        set_number: u32,
        complex_set: Option<CgiComplexSetHandle>,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_bind_descriptors()");

        let pipeline = inner
            .pipeline
            .ok_or("cmd_bind_descriptors() before cmd_bind_pipeline()")?;
        let root_signature = shader
            .root_signature()
            .ok_or("cmd_bind_descriptors() with a shader that has no pipeline layout")?;
        if root_signature.id() != pipeline.root_signature {
            return Err(format!(
                "descriptors of shader {} bound while the pipeline uses another root signature",
                shader.source_name()
            )
            .into());
        }

        let commands = shader.bind_commands(pipeline.bind_point(), set_number, complex_set)?;
        for command in commands {
            inner.push(command);
        }
        Ok(())
    }

    /// Set the root constants of a set directly, bypassing `write_uniform`
    pub fn cmd_push_constants(
        &self,
        shader: &CgiShaderHeadless,
        set_number: u32,
        data: &[u8],
    ) -> CgiResult<()> {
        let parameter_index = shader.root_constants_parameter(set_number).ok_or_else(|| {
            format!(
                "set {} of shader {} is not bound as root constants",
                set_number,
                shader.source_name()
            )
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_push_constants()");
        let pipeline = inner
            .pipeline
            .ok_or("cmd_push_constants() before cmd_bind_pipeline()")?;

        let values = data
            .chunks(4)
            .map(|chunk| {
                let mut bytes = [0u8; 4];
                bytes[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(bytes)
            })
            .collect();
        inner.push(CgiNativeCommand::SetRoot32BitConstants {
            bind_point: pipeline.bind_point(),
            parameter_index,
            values,
        });
        Ok(())
    }

    pub fn cmd_set_viewport(
        &self,
        viewport: &CgiViewport,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_set_viewport()");
        inner.push(CgiNativeCommand::RSSetViewports(vec![*viewport]));
        inner.viewport = Some(*viewport);
        Ok(())
    }

    pub fn cmd_set_scissor(
        &self,
        scissor: &CgiScissorRect,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_recording("cmd_set_scissor()");
        inner.push(CgiNativeCommand::RSSetScissorRects(vec![*scissor]));
        inner.scissor = Some(*scissor);
        Ok(())
    }

    pub fn cmd_draw(
        &self,
        vertex_count: u32,
        first_vertex: u32,
    ) -> CgiResult<()> {
        self.cmd_draw_instanced(vertex_count, first_vertex, 1, 0)
    }

    pub fn cmd_draw_instanced(
        &self,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_draw_state("cmd_draw()", CgiPipelineType::Graphics);
        inner.push(CgiNativeCommand::DrawInstanced {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn cmd_draw_indexed(
        &self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> CgiResult<()> {
        self.cmd_draw_indexed_instanced(index_count, first_index, 1, 0, vertex_offset)
    }

    pub fn cmd_draw_indexed_instanced(
        &self,
        index_count: u32,
        first_index: u32,
        instance_count: u32,
        first_instance: u32,
        vertex_offset: i32,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_draw_state("cmd_draw_indexed()", CgiPipelineType::Graphics);
        assert!(
            inner.index_buffer_bound,
            "cmd_draw_indexed() without an index buffer"
        );
        inner.push(CgiNativeCommand::DrawIndexedInstanced {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    pub fn cmd_dispatch(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_draw_state("cmd_dispatch()", CgiPipelineType::Compute);
        inner.push(CgiNativeCommand::Dispatch {
            x: group_count_x,
            y: group_count_y,
            z: group_count_z,
        });
        Ok(())
    }

    pub fn cmd_dispatch_mesh(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_draw_state("cmd_dispatch_mesh()", CgiPipelineType::Mesh);
        inner.push(CgiNativeCommand::DispatchMesh {
            x: group_count_x,
            y: group_count_y,
            z: group_count_z,
        });
        Ok(())
    }

    pub fn cmd_trace_rays(
        &self,
        width: u32,
        height: u32,
        depth: u32,
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_draw_state("cmd_trace_rays()", CgiPipelineType::RayTracing);
        inner.push(CgiNativeCommand::DispatchRays {
            width,
            height,
            depth,
        });
        Ok(())
    }

    /// Queue layout transitions of textures. Consecutive barriers are batched into one native
    /// barrier, flushed by the next command.
    pub fn cmd_pipeline_image_memory_barrier(
        &self,
        texture_barriers: &[CgiTextureBarrier],
    ) -> CgiResult<()> {
        let mut inner = self.inner.lock().unwrap();
        assert!(
            inner.state == CgiCommandBufferState::Recording,
            "cmd_pipeline_image_memory_barrier() called in state {:?}, it is not allowed inside render passes",
            inner.state
        );

        for barrier in texture_barriers {
            let texture = match barrier.texture {
                CgiTexture::Headless(texture) => texture,
            };
            let before: CgiResourceState = barrier.src_layout.into();
            let after: CgiResourceState = barrier.dst_layout.into();
            if before == after {
                continue;
            }

            let texture_def = texture.texture_def();
            if barrier.mip_level.is_none() && barrier.array_layer.is_none() {
                inner.pending_barriers.push(CgiResourceTransition {
                    resource: texture.resource(),
                    subresource: None,
                    before,
                    after,
                });
                continue;
            }

            let mip_levels = match barrier.mip_level {
                Some(mip_level) => mip_level..mip_level + 1,
                None => 0..texture_def.mip_count,
            };
            let array_layers = match barrier.array_layer {
                Some(array_layer) => array_layer..array_layer + 1,
                None => 0..texture_def.array_layers,
            };
            if mip_levels.end > texture_def.mip_count
                || array_layers.end > texture_def.array_layers
            {
                return Err(format!(
                    "barrier on texture {} names a subresource it does not have",
                    texture_def.name
                )
                .into());
            }

            for array_layer in array_layers {
                for mip_level in mip_levels.clone() {
                    inner.pending_barriers.push(CgiResourceTransition {
                        resource: texture.resource(),
                        subresource: Some(texture.subresource_index(mip_level, array_layer)),
                        before,
                        after,
                    });
                }
            }
        }
        Ok(())
    }
}
