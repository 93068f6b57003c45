use crate::headless::CgiTextureHeadless;
use crate::{CgiCommandBuffer, CgiResourceId, CgiResult, CgiTextureDef};

/// An image resource: render target, depth buffer or sampled texture.
///
/// Cloning is cheap, all clones refer to the same resource. It is destroyed when the last clone
/// is dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum CgiTexture {
    Headless(CgiTextureHeadless),
}

impl CgiTexture {
    pub fn texture_def(&self) -> &CgiTextureDef {
        match self {
            CgiTexture::Headless(inner) => inner.texture_def(),
        }
    }

    pub fn resource(&self) -> CgiResourceId {
        match self {
            CgiTexture::Headless(inner) => inner.resource(),
        }
    }

    /// Record an upload of one subresource. `data` holds exactly one tightly packed surface.
    pub fn update_image(
        &self,
        command_buffer: &CgiCommandBuffer,
        mip_level: u32,
        array_layer: u32,
        data: &[u8],
    ) -> CgiResult<()> {
        match (self, command_buffer) {
            (CgiTexture::Headless(inner), CgiCommandBuffer::Headless(command_buffer)) => {
                inner.update_image(command_buffer, mip_level, array_layer, data)
            }
        }
    }

    /// Release staging memory of uploads that have executed
    pub fn free_staging_buffers(&self) {
        match self {
            CgiTexture::Headless(inner) => inner.free_staging_buffers(),
        }
    }

    pub fn read_subresource(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<Vec<u8>> {
        match self {
            CgiTexture::Headless(inner) => inner.read_subresource(mip_level, array_layer),
        }
    }

    pub fn headless_texture(&self) -> Option<&CgiTextureHeadless> {
        match self {
            CgiTexture::Headless(inner) => Some(inner),
        }
    }
}
