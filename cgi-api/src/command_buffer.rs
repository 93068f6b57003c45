use crate::headless::{CgiCommandBufferHeadless, CgiCommandBufferState};
use crate::{
    CgiClearValue, CgiComplexSetHandle, CgiFramebufferHandle, CgiGeometry, CgiPipeline,
    CgiRenderPassHandle, CgiResult, CgiScissorRect, CgiShader, CgiTextureBarrier, CgiViewport,
    CgiViewportFlags,
};

/// Records commands for the GPU. Holds one native command list per ring-buffer slot and moves
/// through `Idle -> Recording -> (in render pass) -> Recording -> Ended`.
///
/// Misuse of the state machine (beginning twice, `cmd_next_subpass()` past the last subpass,
/// drawing without a matching pipeline, ...) panics. Invalid arguments are reported as errors.
#[derive(Debug)]
pub enum CgiCommandBuffer {
    Headless(CgiCommandBufferHeadless),
}

impl CgiCommandBuffer {
    pub fn state(&self) -> CgiCommandBufferState {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.state(),
        }
    }

    /// Start recording into the list of the current ring slot
    pub fn begin(&self) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.begin(),
        }
    }

    /// Close the list, it can then be submitted
    pub fn end(&self) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.end(),
        }
    }

    /// Execute the entry barriers of the framebuffer, bind subpass 0's targets, clear and set the
    /// viewport and scissor to the framebuffer size unless `viewport_flags` opts out.
    /// `clear_values` has one entry per attachment, and may be empty if nothing is cleared.
    pub fn cmd_begin_render_pass(
        &self,
        render_pass: CgiRenderPassHandle,
        framebuffer: CgiFramebufferHandle,
        clear_values: &[CgiClearValue],
        viewport_flags: CgiViewportFlags,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => {
                inner.cmd_begin_render_pass(render_pass, framebuffer, clear_values, viewport_flags)
            }
        }
    }

    pub fn cmd_next_subpass(&self) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_next_subpass(),
        }
    }

    pub fn cmd_end_render_pass(&self) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_end_render_pass(),
        }
    }

    pub fn cmd_bind_pipeline(
        &self,
        pipeline: &CgiPipeline,
    ) -> CgiResult<()> {
        match (self, pipeline) {
            (CgiCommandBuffer::Headless(inner), CgiPipeline::Headless(pipeline)) => {
                inner.cmd_bind_pipeline(pipeline)
            }
        }
    }

    pub fn cmd_bind_vertex_buffers(
        &self,
        geometry: &CgiGeometry,
        binding_mask: u32,
    ) -> CgiResult<()> {
        match (self, geometry) {
            (CgiCommandBuffer::Headless(inner), CgiGeometry::Headless(geometry)) => {
                inner.cmd_bind_vertex_buffers(geometry, binding_mask)
            }
        }
    }

    pub fn cmd_bind_index_buffer(
        &self,
        geometry: &CgiGeometry,
    ) -> CgiResult<()> {
        match (self, geometry) {
            (CgiCommandBuffer::Headless(inner), CgiGeometry::Headless(geometry)) => {
                inner.cmd_bind_index_buffer(geometry)
            }
        }
    }

    pub fn cmd_bind_descriptors(
        &self,
        shader: &CgiShader,
        set_number: u32,
        complex_set: Option<CgiComplexSetHandle>,
    ) -> CgiResult<()> {
        match (self, shader) {
            (CgiCommandBuffer::Headless(inner), CgiShader::Headless(shader)) => {
                inner.cmd_bind_descriptors(shader, set_number, complex_set)
            }
        }
    }

    pub fn cmd_push_constants<T: bytemuck::Pod>(
        &self,
        shader: &CgiShader,
        set_number: u32,
        data: &T,
    ) -> CgiResult<()> {
        match (self, shader) {
            (CgiCommandBuffer::Headless(inner), CgiShader::Headless(shader)) => {
                inner.cmd_push_constants(shader, set_number, bytemuck::bytes_of(data))
            }
        }
    }

    pub fn cmd_set_viewport(
        &self,
        viewport: &CgiViewport,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_set_viewport(viewport),
        }
    }

    pub fn cmd_set_scissor(
        &self,
        scissor: &CgiScissorRect,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_set_scissor(scissor),
        }
    }

    pub fn cmd_draw(
        &self,
        vertex_count: u32,
        first_vertex: u32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_draw(vertex_count, first_vertex),
        }
    }

    pub fn cmd_draw_instanced(
        &self,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_draw_instanced(
                vertex_count,
                first_vertex,
                instance_count,
                first_instance,
            ),
        }
    }

    pub fn cmd_draw_indexed(
        &self,
        index_count: u32,
        first_index: u32,
        vertex_offset: i32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => {
                inner.cmd_draw_indexed(index_count, first_index, vertex_offset)
            }
        }
    }

    pub fn cmd_draw_indexed_instanced(
        &self,
        index_count: u32,
        first_index: u32,
        instance_count: u32,
        first_instance: u32,
        vertex_offset: i32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_draw_indexed_instanced(
                index_count,
                first_index,
                instance_count,
                first_instance,
                vertex_offset,
            ),
        }
    }

    pub fn cmd_dispatch(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => {
                inner.cmd_dispatch(group_count_x, group_count_y, group_count_z)
            }
        }
    }

    pub fn cmd_dispatch_mesh(
        &self,
        group_count_x: u32,
        group_count_y: u32,
        group_count_z: u32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => {
                inner.cmd_dispatch_mesh(group_count_x, group_count_y, group_count_z)
            }
        }
    }

    pub fn cmd_trace_rays(
        &self,
        width: u32,
        height: u32,
        depth: u32,
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => inner.cmd_trace_rays(width, height, depth),
        }
    }

    /// Layout transitions outside of render passes
    pub fn cmd_pipeline_image_memory_barrier(
        &self,
        texture_barriers: &[CgiTextureBarrier],
    ) -> CgiResult<()> {
        match self {
            CgiCommandBuffer::Headless(inner) => {
                inner.cmd_pipeline_image_memory_barrier(texture_barriers)
            }
        }
    }

    pub fn headless_command_buffer(&self) -> Option<&CgiCommandBufferHeadless> {
        match self {
            CgiCommandBuffer::Headless(inner) => Some(inner),
        }
    }
}
