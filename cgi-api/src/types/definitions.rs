#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use super::misc::*;
use crate::{CgiGeometry, CgiRenderPassHandle, CgiShader, CgiTexture};
use std::path::PathBuf;
use std::time::Duration;

/// How the headless backend's simulated GPU consumes submitted work
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiGpuTimeline {
    /// Work executes inside `submit` and the fence is signaled before it returns
    Immediate,
    /// Work executes on a worker thread that waits `latency` before each submission
    Threaded { latency: Duration },
}

impl Default for CgiGpuTimeline {
    fn default() -> Self {
        CgiGpuTimeline::Immediate
    }
}

/// Descriptor counts for the renderer-wide heaps. The shader-visible heaps are split into a static
/// prefix (stable for the lifetime of a resource) and a dynamic region recycled every frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CgiDescriptorHeapSizes {
    pub cbv_srv_uav: u32,
    pub cbv_srv_uav_static: u32,
    pub sampler: u32,
    pub sampler_static: u32,
    pub rtv: u32,
    pub dsv: u32,
}

impl Default for CgiDescriptorHeapSizes {
    fn default() -> Self {
        CgiDescriptorHeapSizes {
            cbv_srv_uav: 64 * 1024,
            cbv_srv_uav_static: 16 * 1024,
            sampler: 2048,
            sampler_static: 512,
            rtv: 512,
            dsv: 512,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CgiSwapchainDef {
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
    pub format: CgiFormat,
    pub enable_vsync: bool,
}

impl Default for CgiSwapchainDef {
    fn default() -> Self {
        CgiSwapchainDef {
            width: 1280,
            height: 720,
            image_count: 3,
            format: CgiFormat::B8G8R8A8Unorm,
            enable_vsync: true,
        }
    }
}

/// General configuration that all backends understand
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct CgiRendererDef {
    /// Number of frames the CPU may record ahead of the GPU
    pub ring_buffer_size: u32,
    pub validation_mode: CgiValidationMode,
    pub swapchain: CgiSwapchainDef,
    pub descriptor_heap_sizes: CgiDescriptorHeapSizes,
    pub gpu_timeline: CgiGpuTimeline,
    /// If set, every compiled shader stage is written to this directory
    pub save_compiled_shaders_dir: Option<PathBuf>,
}

impl Default for CgiRendererDef {
    fn default() -> Self {
        CgiRendererDef {
            ring_buffer_size: 3,
            validation_mode: Default::default(),
            swapchain: Default::default(),
            descriptor_heap_sizes: Default::default(),
            gpu_timeline: Default::default(),
            save_compiled_shaders_dir: None,
        }
    }
}

#[cfg(feature = "serde-support")]
impl CgiRendererDef {
    pub fn from_ron(text: &str) -> crate::CgiResult<Self> {
        ron::de::from_str(text).map_err(|e| {
            crate::CgiError::ContentError(format!("could not parse renderer config: {}", e))
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiSamplerDef {
    pub min_filter: CgiFilterType,
    pub mag_filter: CgiFilterType,
    pub mip_filter: CgiFilterType,
    pub address_mode_u: CgiAddressMode,
    pub address_mode_v: CgiAddressMode,
    pub address_mode_w: CgiAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: f32,
    pub compare_op: Option<CgiCompareOp>,
}

impl Default for CgiSamplerDef {
    fn default() -> Self {
        Self::linear_clamp()
    }
}

impl CgiSamplerDef {
    fn with_filter_and_address(
        filter: CgiFilterType,
        address_mode: CgiAddressMode,
    ) -> Self {
        CgiSamplerDef {
            min_filter: filter,
            mag_filter: filter,
            mip_filter: filter,
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mip_lod_bias: 0.0,
            max_anisotropy: 1.0,
            compare_op: None,
        }
    }

    pub fn nearest_clamp() -> Self {
        Self::with_filter_and_address(CgiFilterType::Nearest, CgiAddressMode::Clamp)
    }

    pub fn linear_clamp() -> Self {
        Self::with_filter_and_address(CgiFilterType::Linear, CgiAddressMode::Clamp)
    }

    pub fn linear_wrap() -> Self {
        Self::with_filter_and_address(CgiFilterType::Linear, CgiAddressMode::Wrap)
    }

    pub fn anisotropic_wrap() -> Self {
        let mut def =
            Self::with_filter_and_address(CgiFilterType::Anisotropic, CgiAddressMode::Wrap);
        def.max_anisotropy = 16.0;
        def
    }

    /// Comparison sampler for shadow maps
    pub fn shadow() -> Self {
        let mut def = Self::with_filter_and_address(CgiFilterType::Linear, CgiAddressMode::Border);
        def.compare_op = Some(CgiCompareOp::LessOrEqual);
        def
    }
}

/// Describes how one texture slot of a descriptor set is sampled
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CgiSetSampler {
    /// Immutable sampler baked into the root signature
    Static(CgiSamplerDef),
    /// Sampler taken from the bound texture, written into the complex set's sampler table
    Custom,
    /// Input attachment read in the fragment shader, no sampler
    Input,
    /// Read/write storage image, no sampler
    Storage,
}

/// Layout of one descriptor set of a shader
#[derive(Clone, Debug, PartialEq)]
pub struct CgiDescriptorSetDef {
    pub set_number: u32,
    /// Size of the per-instance constant block. Zero if the set has no uniform data.
    pub uniform_size: u32,
    /// Number of instances that may be bound per frame, and the maximum number of live complex sets
    pub capacity: u32,
    /// One entry per texture slot
    pub samplers: Vec<CgiSetSampler>,
    pub stage_flags: CgiShaderStageFlags,
}

impl CgiDescriptorSetDef {
    pub fn new(
        set_number: u32,
        uniform_size: u32,
        capacity: u32,
        stage_flags: CgiShaderStageFlags,
    ) -> Self {
        CgiDescriptorSetDef {
            set_number,
            uniform_size,
            capacity,
            samplers: Vec::default(),
            stage_flags,
        }
    }

    pub fn with_samplers(
        mut self,
        samplers: Vec<CgiSetSampler>,
    ) -> Self {
        self.samplers = samplers;
        self
    }

    pub fn texture_count(&self) -> u32 {
        self.samplers.len() as u32
    }

    /// True if no texture slot needs a sampler table, only immutable samplers or none at all
    pub fn static_samplers_only(&self) -> bool {
        !self
            .samplers
            .iter()
            .any(|sampler| *sampler == CgiSetSampler::Custom)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CgiShaderDef {
    pub source_name: String,
    pub source: String,
    /// Branch descriptors to compile. See `CgiShaderBranch::parse`.
    pub branches: Vec<String>,
}

impl CgiShaderDef {
    /// Compile every branch declared with a `//@` line in the source
    pub fn from_source(
        source_name: &str,
        source: &str,
    ) -> Self {
        CgiShaderDef {
            source_name: source_name.to_string(),
            source: source.to_string(),
            branches: crate::CgiShaderBranch::collect_from_source(source),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CgiTextureDef {
    pub name: String,
    pub format: CgiFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub array_layers: u32,
    pub sample_count: CgiSampleCount,
    pub usage: CgiTextureUsage,
    /// Layout the texture is created in, and returns to after uploads. Derived from `usage` if
    /// not set.
    pub initial_layout: Option<CgiImageLayout>,
    /// Sampler used by `CgiSetSampler::Custom` slots
    pub sampler: Option<CgiSamplerDef>,
}

impl Default for CgiTextureDef {
    fn default() -> Self {
        CgiTextureDef {
            name: String::default(),
            format: CgiFormat::R8G8B8A8Unorm,
            width: 1,
            height: 1,
            depth: 1,
            mip_count: 1,
            array_layers: 1,
            sample_count: CgiSampleCount::SampleCount1,
            usage: CgiTextureUsage::SAMPLED,
            initial_layout: None,
            sampler: None,
        }
    }
}

impl CgiTextureDef {
    pub fn new_2d(
        name: &str,
        format: CgiFormat,
        width: u32,
        height: u32,
        usage: CgiTextureUsage,
    ) -> Self {
        CgiTextureDef {
            name: name.to_string(),
            format,
            width,
            height,
            usage,
            ..Default::default()
        }
    }

    pub fn main_layout(&self) -> CgiImageLayout {
        if let Some(initial_layout) = self.initial_layout {
            initial_layout
        } else if self.usage.contains(CgiTextureUsage::DEPTH_STENCIL) {
            CgiImageLayout::DepthStencilAttachment
        } else if self.usage.contains(CgiTextureUsage::RENDER_TARGET) {
            CgiImageLayout::ColorAttachment
        } else {
            CgiImageLayout::XsReadOnly
        }
    }

    pub fn subresource_count(&self) -> u32 {
        self.mip_count * self.array_layers
    }

    pub fn mip_extents(
        &self,
        mip_level: u32,
    ) -> CgiExtents2D {
        CgiExtents2D {
            width: (self.width >> mip_level).max(1),
            height: (self.height >> mip_level).max(1),
        }
    }

    pub fn validate(&self) -> crate::CgiResult<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(format!("texture {} has a zero extent", self.name).into());
        }
        if self.width > crate::MAX_TEXTURE_EXTENT
            || self.height > crate::MAX_TEXTURE_EXTENT
            || self.array_layers > crate::MAX_TEXTURE_ARRAY_SIZE * 6
        {
            return Err(format!("texture {} exceeds the texture size limits", self.name).into());
        }
        if self.mip_count == 0 || self.array_layers == 0 {
            return Err(
                format!("texture {} needs at least one mip and one layer", self.name).into(),
            );
        }
        let max_mips = 32 - self.width.max(self.height).leading_zeros();
        if self.mip_count > max_mips {
            return Err(format!(
                "texture {} requests {} mips but {}x{} only has {}",
                self.name, self.mip_count, self.width, self.height, max_mips
            )
            .into());
        }
        if self.usage.contains(CgiTextureUsage::CUBE_MAP) && self.array_layers % 6 != 0 {
            return Err(format!("cube map {} must have a multiple of 6 layers", self.name).into());
        }
        if self.usage.contains(CgiTextureUsage::DEPTH_STENCIL) != self.format.is_depth() {
            return Err(format!(
                "texture {} format {:?} does not match its depth-stencil usage",
                self.name, self.format
            )
            .into());
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CgiVertexUsage {
    Position,
    Normal,
    Tangent,
    Color,
    TexCoord,
    BlendWeights,
    BlendIndices,
    InstanceData,
}

/// One vertex attribute, read from `binding` at `offset`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiVertexElement {
    pub binding: u32,
    pub offset: u32,
    pub format: CgiFormat,
    pub usage: CgiVertexUsage,
    pub usage_index: u32,
}

impl CgiVertexElement {
    pub fn new(
        binding: u32,
        offset: u32,
        format: CgiFormat,
        usage: CgiVertexUsage,
        usage_index: u32,
    ) -> Self {
        CgiVertexElement {
            binding,
            offset,
            format,
            usage,
            usage_index,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CgiGeometryDef {
    pub name: String,
    pub vertex_elements: Vec<CgiVertexElement>,
    /// Bindings that advance per instance instead of per vertex
    pub instance_binding_mask: u32,
    /// Bindings rewritten every frame. They live in upload memory, one region per ring slot.
    pub dynamic_binding_mask: u32,
    pub index_type: CgiIndexType,
}

impl CgiGeometryDef {
    pub fn new(
        name: &str,
        vertex_elements: Vec<CgiVertexElement>,
    ) -> Self {
        CgiGeometryDef {
            name: name.to_string(),
            vertex_elements,
            instance_binding_mask: 0,
            dynamic_binding_mask: 0,
            index_type: CgiIndexType::Uint16,
        }
    }

    pub fn binding_count(&self) -> u32 {
        self.vertex_elements
            .iter()
            .map(|element| element.binding + 1)
            .max()
            .unwrap_or(0)
    }

    /// Byte stride of a binding, derived from the furthest element in it
    pub fn binding_stride(
        &self,
        binding: u32,
    ) -> u32 {
        self.vertex_elements
            .iter()
            .filter(|element| element.binding == binding)
            .map(|element| element.offset + element.format.pixel_size_in_bytes().unwrap_or(0))
            .max()
            .unwrap_or(0)
    }
}

/// One image bound to a framebuffer attachment
#[derive(Clone, Debug)]
pub struct CgiFramebufferAttachment {
    pub texture: CgiTexture,
    pub mip_level: u32,
    pub array_layer: u32,
}

impl CgiFramebufferAttachment {
    pub fn new(texture: &CgiTexture) -> Self {
        CgiFramebufferAttachment {
            texture: texture.clone(),
            mip_level: 0,
            array_layer: 0,
        }
    }

    pub fn mip_level(
        mut self,
        mip_level: u32,
    ) -> Self {
        self.mip_level = mip_level;
        self
    }

    pub fn cube_map_face(
        mut self,
        face: CgiCubeMapFace,
    ) -> Self {
        self.array_layer = face.array_layer();
        self
    }
}

#[derive(Clone, Debug)]
pub struct CgiFramebufferDef {
    pub render_pass: CgiRenderPassHandle,
    /// One per render pass attachment, except that attachment 0 is omitted when `swapchain_image`
    /// is set
    pub attachments: Vec<CgiFramebufferAttachment>,
    pub width: u32,
    pub height: u32,
    /// Bind this swap chain image as attachment 0
    pub swapchain_image: Option<u32>,
}

/// Everything needed to build a pipeline from a shader branch
pub struct CgiPipelineDef<'a> {
    pub shader: &'a CgiShader,
    pub branch: &'a str,
    pub geometry: Option<&'a CgiGeometry>,
    /// Only the bindings whose bit is set feed the vertex input layout
    pub vertex_binding_mask: u32,
    /// Required for graphics and mesh pipelines
    pub render_pass: Option<CgiRenderPassHandle>,
    pub subpass: u32,
    pub topology: CgiPrimitiveTopology,
    pub cull_mode: CgiCullMode,
    pub fill_mode: CgiFillMode,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: CgiCompareOp,
    /// One per color attachment of the subpass. Empty means opaque everywhere.
    pub color_blend: Vec<CgiBlendMode>,
    pub sample_count: CgiSampleCount,
}

impl<'a> CgiPipelineDef<'a> {
    pub fn graphics(
        shader: &'a CgiShader,
        branch: &'a str,
        render_pass: CgiRenderPassHandle,
        subpass: u32,
    ) -> Self {
        CgiPipelineDef {
            shader,
            branch,
            geometry: None,
            vertex_binding_mask: u32::MAX,
            render_pass: Some(render_pass),
            subpass,
            topology: CgiPrimitiveTopology::TriangleList,
            cull_mode: CgiCullMode::Back,
            fill_mode: CgiFillMode::Solid,
            depth_test: true,
            depth_write: true,
            depth_compare_op: CgiCompareOp::GreaterOrEqual,
            color_blend: Vec::default(),
            sample_count: CgiSampleCount::SampleCount1,
        }
    }

    pub fn compute(
        shader: &'a CgiShader,
        branch: &'a str,
    ) -> Self {
        CgiPipelineDef {
            shader,
            branch,
            geometry: None,
            vertex_binding_mask: 0,
            render_pass: None,
            subpass: 0,
            topology: CgiPrimitiveTopology::TriangleList,
            cull_mode: CgiCullMode::None,
            fill_mode: CgiFillMode::Solid,
            depth_test: false,
            depth_write: false,
            depth_compare_op: CgiCompareOp::Always,
            color_blend: Vec::default(),
            sample_count: CgiSampleCount::SampleCount1,
        }
    }

    pub fn with_geometry(
        mut self,
        geometry: &'a CgiGeometry,
        vertex_binding_mask: u32,
    ) -> Self {
        self.geometry = Some(geometry);
        self.vertex_binding_mask = vertex_binding_mask;
        self
    }

    pub fn without_depth(mut self) -> Self {
        self.depth_test = false;
        self.depth_write = false;
        self
    }
}

/// Ad hoc layout transition of a texture, recorded outside render passes
#[derive(Clone, Debug)]
pub struct CgiTextureBarrier<'a> {
    pub texture: &'a CgiTexture,
    pub src_layout: CgiImageLayout,
    pub dst_layout: CgiImageLayout,
    /// None covers every mip level
    pub mip_level: Option<u32>,
    /// None covers every array layer
    pub array_layer: Option<u32>,
}

impl<'a> CgiTextureBarrier<'a> {
    pub fn layout_transition(
        texture: &'a CgiTexture,
        src_layout: CgiImageLayout,
        dst_layout: CgiImageLayout,
    ) -> Self {
        CgiTextureBarrier {
            texture,
            src_layout,
            dst_layout,
            mip_level: None,
            array_layer: None,
        }
    }

    pub fn mip_level(
        mut self,
        mip_level: u32,
    ) -> Self {
        self.mip_level = Some(mip_level);
        self
    }

    pub fn array_layer(
        mut self,
        array_layer: u32,
    ) -> Self {
        self.array_layer = Some(array_layer);
        self
    }
}
