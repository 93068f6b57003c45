use crate::headless::CgiPipelineHeadless;
use crate::{CgiPipelineType, CgiRenderPassHandle};

/// Immutable pipeline state object
#[derive(Debug)]
pub enum CgiPipeline {
    Headless(CgiPipelineHeadless),
}

impl CgiPipeline {
    pub fn pipeline_type(&self) -> CgiPipelineType {
        match self {
            CgiPipeline::Headless(inner) => inner.pipeline_type(),
        }
    }

    pub fn branch(&self) -> &str {
        match self {
            CgiPipeline::Headless(inner) => inner.branch(),
        }
    }

    /// Render pass and subpass a graphics or mesh pipeline draws into
    pub fn render_target(&self) -> Option<(CgiRenderPassHandle, u32)> {
        match self {
            CgiPipeline::Headless(inner) => inner
                .render_pass()
                .map(|render_pass| (render_pass, inner.subpass())),
        }
    }

    pub fn headless_pipeline(&self) -> Option<&CgiPipelineHeadless> {
        match self {
            CgiPipeline::Headless(inner) => Some(inner),
        }
    }
}
