use crate::headless::CgiRendererHeadless;
use crate::{
    CgiCommandBuffer, CgiFrameStats, CgiFramebufferDef, CgiFramebufferHandle, CgiGeometry,
    CgiGeometryDef, CgiPipeline, CgiPipelineDef, CgiRenderPassDef, CgiRenderPassHandle,
    CgiRendererDef, CgiResult, CgiShader, CgiShaderDef, CgiSwapchainDef, CgiTexture,
    CgiTextureDef,
};

/// Owns the device, swap chain and descriptor heaps and drives the frame cycle. Created by
/// [`create_renderer`](crate::create_renderer).
///
/// Dropping the renderer waits for the GPU. Objects created by it should be dropped first.
#[derive(Debug)]
pub enum CgiRenderer {
    Headless(CgiRendererHeadless),
}

impl CgiRenderer {
    pub fn renderer_def(&self) -> &CgiRendererDef {
        match self {
            CgiRenderer::Headless(inner) => inner.renderer_def(),
        }
    }

    /// Slot of the ring buffer used by the current frame
    pub fn ring_index(&self) -> u32 {
        match self {
            CgiRenderer::Headless(inner) => inner.ring_index(),
        }
    }

    pub fn frame_count(&self) -> u64 {
        match self {
            CgiRenderer::Headless(inner) => inner.frame_count(),
        }
    }

    pub fn is_in_frame(&self) -> bool {
        match self {
            CgiRenderer::Headless(inner) => inner.is_in_frame(),
        }
    }

    /// The render thread's command buffer. `begin_frame` begins it and `end_frame` submits it.
    pub fn command_buffer(&self) -> &CgiCommandBuffer {
        match self {
            CgiRenderer::Headless(inner) => inner.command_buffer(),
        }
    }

    pub fn begin_frame(
        &mut self,
        present: bool,
    ) -> CgiResult<()> {
        match self {
            CgiRenderer::Headless(inner) => inner.begin_frame(present),
        }
    }

    pub fn end_frame(
        &mut self,
        present: bool,
    ) -> CgiResult<()> {
        match self {
            CgiRenderer::Headless(inner) => inner.end_frame(present),
        }
    }

    /// Shorthand for `end_frame(true)`
    pub fn present(&mut self) -> CgiResult<()> {
        match self {
            CgiRenderer::Headless(inner) => inner.present(),
        }
    }

    pub fn sync(
        &mut self,
        present: bool,
    ) {
        match self {
            CgiRenderer::Headless(inner) => inner.sync(present),
        }
    }

    pub fn wait_idle(&self) {
        match self {
            CgiRenderer::Headless(inner) => inner.wait_idle(),
        }
    }

    /// Submit a command buffer closed with `end()`. It runs after the render thread's command
    /// buffer at the end of the frame.
    pub fn queue_command_buffer(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        match self {
            CgiRenderer::Headless(inner) => inner.queue_command_buffer(command_buffer),
        }
    }

    /// Record into a transient command buffer, execute it and wait for the GPU
    pub fn execute_immediate<F>(
        &self,
        f: F,
    ) -> CgiResult<()>
    where
        F: FnOnce(&CgiCommandBuffer) -> CgiResult<()>,
    {
        match self {
            CgiRenderer::Headless(inner) => inner.execute_immediate(f),
        }
    }

    pub fn swapchain_def(&self) -> &CgiSwapchainDef {
        match self {
            CgiRenderer::Headless(inner) => inner.swapchain_def(),
        }
    }

    pub fn swapchain_image_count(&self) -> u32 {
        match self {
            CgiRenderer::Headless(inner) => inner.swapchain().image_count(),
        }
    }

    pub fn swapchain_image(
        &self,
        image_index: u32,
    ) -> Option<CgiTexture> {
        match self {
            CgiRenderer::Headless(inner) => inner
                .swapchain()
                .image(image_index)
                .cloned()
                .map(CgiTexture::Headless),
        }
    }

    /// Image acquired by the current presenting frame
    pub fn current_swapchain_image_index(&self) -> Option<u32> {
        match self {
            CgiRenderer::Headless(inner) => inner.current_swapchain_image_index(),
        }
    }

    pub fn resize_swapchain(
        &mut self,
        width: u32,
        height: u32,
    ) -> CgiResult<()> {
        match self {
            CgiRenderer::Headless(inner) => inner.resize_swapchain(width, height),
        }
    }

    pub fn frame_stats(&self) -> CgiFrameStats {
        match self {
            CgiRenderer::Headless(inner) => inner.frame_stats(),
        }
    }

    pub fn create_command_buffer(&self) -> CgiCommandBuffer {
        match self {
            CgiRenderer::Headless(inner) => {
                CgiCommandBuffer::Headless(inner.create_command_buffer())
            }
        }
    }

    pub fn create_render_pass(
        &self,
        render_pass_def: &CgiRenderPassDef,
    ) -> CgiResult<CgiRenderPassHandle> {
        match self {
            CgiRenderer::Headless(inner) => inner.create_render_pass(render_pass_def),
        }
    }

    pub fn delete_render_pass(
        &self,
        render_pass: CgiRenderPassHandle,
    ) {
        match self {
            CgiRenderer::Headless(inner) => inner.delete_render_pass(render_pass),
        }
    }

    pub fn create_framebuffer(
        &self,
        framebuffer_def: &CgiFramebufferDef,
    ) -> CgiResult<CgiFramebufferHandle> {
        match self {
            CgiRenderer::Headless(inner) => inner.create_framebuffer(framebuffer_def),
        }
    }

    pub fn delete_framebuffer(
        &self,
        framebuffer: CgiFramebufferHandle,
    ) {
        match self {
            CgiRenderer::Headless(inner) => inner.delete_framebuffer(framebuffer),
        }
    }

    pub fn create_texture(
        &self,
        texture_def: &CgiTextureDef,
    ) -> CgiResult<CgiTexture> {
        Ok(match self {
            CgiRenderer::Headless(inner) => {
                CgiTexture::Headless(inner.create_texture(texture_def)?)
            }
        })
    }

    /// Create a sampled texture from the bytes of a DDS file. `lod_bias` drops that many of the
    /// largest mips, on top of any the file asks to skip.
    pub fn create_texture_from_dds(
        &self,
        name: &str,
        bytes: &[u8],
        lod_bias: u32,
    ) -> CgiResult<CgiTexture> {
        Ok(match self {
            CgiRenderer::Headless(inner) => {
                CgiTexture::Headless(inner.create_texture_from_dds(name, bytes, lod_bias)?)
            }
        })
    }

    pub fn create_geometry(
        &self,
        geometry_def: &CgiGeometryDef,
    ) -> CgiResult<CgiGeometry> {
        Ok(match self {
            CgiRenderer::Headless(inner) => {
                CgiGeometry::Headless(inner.create_geometry(geometry_def)?)
            }
        })
    }

    pub fn create_shader(
        &self,
        shader_def: &CgiShaderDef,
    ) -> CgiResult<CgiShader> {
        Ok(match self {
            CgiRenderer::Headless(inner) => CgiShader::Headless(inner.create_shader(shader_def)?),
        })
    }

    pub fn create_pipeline(
        &self,
        pipeline_def: &CgiPipelineDef,
    ) -> CgiResult<CgiPipeline> {
        Ok(match self {
            CgiRenderer::Headless(inner) => {
                CgiPipeline::Headless(inner.create_pipeline(pipeline_def)?)
            }
        })
    }

    pub fn headless_renderer(&self) -> Option<&CgiRendererHeadless> {
        match self {
            CgiRenderer::Headless(inner) => Some(inner),
        }
    }
}
