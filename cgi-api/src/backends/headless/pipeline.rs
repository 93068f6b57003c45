use super::{CgiDeviceContextHeadless, CgiRootSignatureHeadless, CgiShaderHeadless};
use crate::{
    CgiBlendMode, CgiCompareOp, CgiCullMode, CgiFillMode, CgiFormat, CgiGeometry,
    CgiPipelineDef, CgiPipelineType, CgiPrimitiveTopology, CgiRenderPassHandle, CgiResult,
    CgiSampleCount, CgiShader, CgiShaderStageFlags, CgiVertexUsage, MAX_VERTEX_INPUT_BINDINGS,
};
use std::sync::Arc;

/// One element of the native input layout
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiInputElement {
    pub semantic: CgiVertexUsage,
    pub semantic_index: u32,
    pub format: CgiFormat,
    pub input_slot: u32,
    pub aligned_byte_offset: u32,
    pub per_instance: bool,
}

fn pipeline_type_of(stages: CgiShaderStageFlags) -> CgiPipelineType {
    if stages.contains(CgiShaderStageFlags::COMPUTE) {
        CgiPipelineType::Compute
    } else if stages.contains(CgiShaderStageFlags::RAYGEN) {
        CgiPipelineType::RayTracing
    } else if stages.intersects(CgiShaderStageFlags::MESH | CgiShaderStageFlags::TASK) {
        CgiPipelineType::Mesh
    } else {
        CgiPipelineType::Graphics
    }
}

fn input_layout(
    geometry: Option<&CgiGeometry>,
    vertex_binding_mask: u32,
) -> (Vec<CgiInputElement>, [u32; MAX_VERTEX_INPUT_BINDINGS]) {
    let mut strides = [0; MAX_VERTEX_INPUT_BINDINGS];
    let geometry_def = match geometry {
        Some(CgiGeometry::Headless(geometry)) => geometry.geometry_def(),
        None => return (Vec::default(), strides),
    };

    for binding in 0..geometry_def.binding_count() {
        if vertex_binding_mask & (1 << binding) != 0 {
            strides[binding as usize] = geometry_def.binding_stride(binding);
        }
    }

    let elements = geometry_def
        .vertex_elements
        .iter()
        .filter(|element| vertex_binding_mask & (1 << element.binding) != 0)
        .map(|element| CgiInputElement {
            semantic: element.usage,
            semantic_index: element.usage_index,
            format: element.format,
            input_slot: element.binding,
            aligned_byte_offset: element.offset,
            per_instance: geometry_def.instance_binding_mask & (1 << element.binding) != 0,
        })
        .collect();

    (elements, strides)
}

/// Immutable pipeline state built from one branch of a shader
#[derive(Debug)]
pub struct CgiPipelineHeadless {
    id: u64,
    pipeline_type: CgiPipelineType,
    shader: CgiShaderHeadless,
    branch: String,
    root_signature: Arc<CgiRootSignatureHeadless>,
    render_pass: Option<CgiRenderPassHandle>,
    subpass: u32,
    topology: CgiPrimitiveTopology,
    input_layout: Vec<CgiInputElement>,
    vertex_buffer_strides: [u32; MAX_VERTEX_INPUT_BINDINGS],
    vertex_binding_mask: u32,
    color_formats: Vec<CgiFormat>,
    depth_format: Option<CgiFormat>,
    sample_count: CgiSampleCount,
    cull_mode: CgiCullMode,
    fill_mode: CgiFillMode,
    depth_test: bool,
    depth_write: bool,
    depth_compare_op: CgiCompareOp,
    color_blend: Vec<CgiBlendMode>,
}

impl CgiPipelineHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        pipeline_def: &CgiPipelineDef,
    ) -> CgiResult<Self> {
        let shader = match pipeline_def.shader {
            CgiShader::Headless(shader) => shader.clone(),
        };

        let compiled = shader.branch(pipeline_def.branch).ok_or_else(|| {
            format!(
                "shader {} has no branch {}",
                shader.source_name(),
                pipeline_def.branch
            )
        })?;
        let pipeline_type = pipeline_type_of(compiled.branch.stages);

        let root_signature = shader.root_signature().ok_or_else(|| {
            format!(
                "shader {} needs create_pipeline_layout before pipelines are created",
                shader.source_name()
            )
        })?;

        let mut color_formats = Vec::default();
        let mut depth_format = None;
        let mut sample_count = pipeline_def.sample_count;
        let mut render_pass = None;

        if pipeline_type == CgiPipelineType::Graphics || pipeline_type == CgiPipelineType::Mesh {
            let render_pass_handle = pipeline_def.render_pass.ok_or_else(|| {
                format!(
                    "{:?} pipeline for {}:{} needs a render pass",
                    pipeline_type,
                    shader.source_name(),
                    pipeline_def.branch
                )
            })?;
            let render_pass_headless = device_context
                .render_pass(render_pass_handle)
                .ok_or("pipeline created with a stale render pass handle")?;
            if pipeline_def.subpass >= render_pass_headless.subpass_count() {
                return Err(format!(
                    "render pass has {} subpasses, pipeline targets subpass {}",
                    render_pass_headless.subpass_count(),
                    pipeline_def.subpass
                )
                .into());
            }

            color_formats = render_pass_headless.color_formats(pipeline_def.subpass);
            depth_format = render_pass_headless.depth_format(pipeline_def.subpass);

            let subpass_samples = render_pass_headless.sample_count(pipeline_def.subpass);
            if pipeline_def.sample_count != subpass_samples {
                return Err(format!(
                    "pipeline {}:{} uses {:?} but subpass {} renders with {:?}",
                    shader.source_name(),
                    pipeline_def.branch,
                    pipeline_def.sample_count,
                    pipeline_def.subpass,
                    subpass_samples
                )
                .into());
            }
            sample_count = subpass_samples;

            if !pipeline_def.color_blend.is_empty()
                && pipeline_def.color_blend.len() != color_formats.len()
            {
                return Err(format!(
                    "pipeline {}:{} has {} blend modes for {} color targets",
                    shader.source_name(),
                    pipeline_def.branch,
                    pipeline_def.color_blend.len(),
                    color_formats.len()
                )
                .into());
            }

            render_pass = Some(render_pass_handle);
        }

        let (input_layout, vertex_buffer_strides) =
            if pipeline_type == CgiPipelineType::Graphics {
                input_layout(pipeline_def.geometry, pipeline_def.vertex_binding_mask)
            } else {
                (Vec::default(), [0; MAX_VERTEX_INPUT_BINDINGS])
            };

        let id = device_context.next_object_id();
        log::debug!(
            "Created {:?} pipeline {} for {}:{} ({} input elements)",
            pipeline_type,
            id,
            shader.source_name(),
            pipeline_def.branch,
            input_layout.len()
        );

        Ok(CgiPipelineHeadless {
            id,
            pipeline_type,
            branch: pipeline_def.branch.to_string(),
            shader,
            root_signature,
            render_pass,
            subpass: pipeline_def.subpass,
            topology: pipeline_def.topology,
            input_layout,
            vertex_buffer_strides,
            vertex_binding_mask: pipeline_def.vertex_binding_mask,
            color_formats,
            depth_format,
            sample_count,
            cull_mode: pipeline_def.cull_mode,
            fill_mode: pipeline_def.fill_mode,
            depth_test: pipeline_def.depth_test && depth_format.is_some(),
            depth_write: pipeline_def.depth_write && depth_format.is_some(),
            depth_compare_op: pipeline_def.depth_compare_op,
            color_blend: pipeline_def.color_blend.clone(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pipeline_type(&self) -> CgiPipelineType {
        self.pipeline_type
    }

    pub fn shader(&self) -> &CgiShaderHeadless {
        &self.shader
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn root_signature(&self) -> &Arc<CgiRootSignatureHeadless> {
        &self.root_signature
    }

    pub fn render_pass(&self) -> Option<CgiRenderPassHandle> {
        self.render_pass
    }

    pub fn subpass(&self) -> u32 {
        self.subpass
    }

    pub fn topology(&self) -> CgiPrimitiveTopology {
        self.topology
    }

    pub fn input_layout(&self) -> &[CgiInputElement] {
        &self.input_layout
    }

    pub fn vertex_buffer_strides(&self) -> &[u32; MAX_VERTEX_INPUT_BINDINGS] {
        &self.vertex_buffer_strides
    }

    pub fn vertex_binding_mask(&self) -> u32 {
        self.vertex_binding_mask
    }

    pub fn color_formats(&self) -> &[CgiFormat] {
        &self.color_formats
    }

    pub fn depth_format(&self) -> Option<CgiFormat> {
        self.depth_format
    }

    pub fn sample_count(&self) -> CgiSampleCount {
        self.sample_count
    }

    pub fn cull_mode(&self) -> CgiCullMode {
        self.cull_mode
    }

    pub fn fill_mode(&self) -> CgiFillMode {
        self.fill_mode
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }

    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    pub fn depth_compare_op(&self) -> CgiCompareOp {
        self.depth_compare_op
    }

    /// Blend mode of a color target
    pub fn color_blend(
        &self,
        color_index: usize,
    ) -> CgiBlendMode {
        self.color_blend
            .get(color_index)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_type_follows_stages() {
        assert_eq!(
            pipeline_type_of(CgiShaderStageFlags::VS_FS),
            CgiPipelineType::Graphics
        );
        assert_eq!(
            pipeline_type_of(CgiShaderStageFlags::COMPUTE),
            CgiPipelineType::Compute
        );
        assert_eq!(
            pipeline_type_of(CgiShaderStageFlags::MESH | CgiShaderStageFlags::FRAGMENT),
            CgiPipelineType::Mesh
        );
        assert_eq!(
            pipeline_type_of(CgiShaderStageFlags::RAYGEN),
            CgiPipelineType::RayTracing
        );
    }
}
