use crate::headless::CgiRendererHeadless;
use crate::{CgiRenderer, CgiRendererDef, CgiResult};

/// Version of the API a renderer is built for. Callers pass the version they were compiled
/// against to `create_renderer`.
pub const CGI_SDK_VERSION: u32 = 0x0001_0003;

/// Entry point of a backend: create a renderer from its configuration.
///
/// Panics if `version` is not `CGI_SDK_VERSION`, the caller and the backend disagree about the
/// layout of every type crossing this boundary. An invalid configuration is reported as an error.
pub fn create_renderer(
    version: u32,
    renderer_def: &CgiRendererDef,
) -> CgiResult<CgiRenderer> {
    assert_eq!(
        version, CGI_SDK_VERSION,
        "renderer was requested for SDK version {:#x} but this backend implements {:#x}",
        version, CGI_SDK_VERSION
    );

    log::info!(
        "Creating headless renderer, SDK version {:#x}, ring buffer size {}",
        version,
        renderer_def.ring_buffer_size
    );
    Ok(CgiRenderer::Headless(CgiRendererHeadless::new(
        renderer_def,
    )?))
}
