#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use cgi_base::handle_pool::PoolHandle;

/// Controls if validation is enabled or not. For the headless backend, validation means the
/// simulated GPU tracks the state of every subresource and reports barriers that do not match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiValidationMode {
    Disabled,
    EnabledIfAvailable,
    Enabled,
}

impl Default for CgiValidationMode {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        let validation_mode = CgiValidationMode::EnabledIfAvailable;
        #[cfg(not(debug_assertions))]
        let validation_mode = CgiValidationMode::Disabled;

        validation_mode
    }
}

impl CgiValidationMode {
    pub fn is_enabled(self) -> bool {
        self != CgiValidationMode::Disabled
    }
}

/// Image and buffer formats understood by the API
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiFormat {
    Undefined,
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    B8G8R8A8Srgb,
    A2B10G10R10Unorm,
    R16G16Sfloat,
    R16G16B16A16Sfloat,
    R32Sfloat,
    R32G32Sfloat,
    R32G32B32Sfloat,
    R32G32B32A32Sfloat,
    D32Sfloat,
    D24UnormS8Uint,
    D32SfloatS8Uint,
    Bc1Unorm,
    Bc1Srgb,
    Bc2Unorm,
    Bc2Srgb,
    Bc3Unorm,
    Bc3Srgb,
    Bc4Unorm,
    Bc5Unorm,
    Bc7Unorm,
    Bc7Srgb,
}

impl Default for CgiFormat {
    fn default() -> Self {
        CgiFormat::Undefined
    }
}

impl CgiFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            CgiFormat::D32Sfloat | CgiFormat::D24UnormS8Uint | CgiFormat::D32SfloatS8Uint
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, CgiFormat::D24UnormS8Uint | CgiFormat::D32SfloatS8Uint)
    }

    pub fn is_block_compressed(self) -> bool {
        self.block_size_in_bytes().is_some()
    }

    /// Bytes per 4x4 block for block-compressed formats
    pub fn block_size_in_bytes(self) -> Option<u32> {
        match self {
            CgiFormat::Bc1Unorm | CgiFormat::Bc1Srgb | CgiFormat::Bc4Unorm => Some(8),
            CgiFormat::Bc2Unorm
            | CgiFormat::Bc2Srgb
            | CgiFormat::Bc3Unorm
            | CgiFormat::Bc3Srgb
            | CgiFormat::Bc5Unorm
            | CgiFormat::Bc7Unorm
            | CgiFormat::Bc7Srgb => Some(16),
            _ => None,
        }
    }

    /// Bytes per pixel for uncompressed formats
    pub fn pixel_size_in_bytes(self) -> Option<u32> {
        match self {
            CgiFormat::Undefined => None,
            CgiFormat::R8Unorm => Some(1),
            CgiFormat::R8G8Unorm => Some(2),
            CgiFormat::R8G8B8A8Unorm
            | CgiFormat::R8G8B8A8Srgb
            | CgiFormat::B8G8R8A8Unorm
            | CgiFormat::B8G8R8A8Srgb
            | CgiFormat::A2B10G10R10Unorm
            | CgiFormat::R16G16Sfloat
            | CgiFormat::R32Sfloat
            | CgiFormat::D32Sfloat
            | CgiFormat::D24UnormS8Uint => Some(4),
            CgiFormat::R16G16B16A16Sfloat
            | CgiFormat::R32G32Sfloat
            | CgiFormat::D32SfloatS8Uint => Some(8),
            CgiFormat::R32G32B32Sfloat => Some(12),
            CgiFormat::R32G32B32A32Sfloat => Some(16),
            _ => None,
        }
    }

    /// Size of one row of pixels (or one row of 4x4 blocks for block-compressed formats)
    pub fn row_pitch(
        self,
        width: u32,
    ) -> u32 {
        if let Some(block_size) = self.block_size_in_bytes() {
            cgi_base::memory::div_round_up(width.max(1), 4).saturating_mul(block_size)
        } else {
            width
                .max(1)
                .saturating_mul(self.pixel_size_in_bytes().unwrap_or(0))
        }
    }

    /// Size of a whole 2D surface in bytes
    pub fn surface_size(
        self,
        width: u32,
        height: u32,
    ) -> u64 {
        let rows = if self.is_block_compressed() {
            cgi_base::memory::div_round_up(height.max(1), 4)
        } else {
            height.max(1)
        };
        u64::from(self.row_pitch(width)) * u64::from(rows)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiSampleCount {
    SampleCount1,
    SampleCount2,
    SampleCount4,
    SampleCount8,
    SampleCount16,
}

impl Default for CgiSampleCount {
    fn default() -> Self {
        CgiSampleCount::SampleCount1
    }
}

impl CgiSampleCount {
    pub fn as_u32(self) -> u32 {
        match self {
            CgiSampleCount::SampleCount1 => 1,
            CgiSampleCount::SampleCount2 => 2,
            CgiSampleCount::SampleCount4 => 4,
            CgiSampleCount::SampleCount8 => 8,
            CgiSampleCount::SampleCount16 => 16,
        }
    }
}

/// What happens to an attachment's contents when a render pass first touches it
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiLoadOp {
    DontCare,
    Load,
    Clear,
}

impl Default for CgiLoadOp {
    fn default() -> Self {
        CgiLoadOp::Load
    }
}

/// What happens to an attachment's contents when a render pass is done with it
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiStoreOp {
    DontCare,
    Store,
}

impl Default for CgiStoreOp {
    fn default() -> Self {
        CgiStoreOp::Store
    }
}

/// Logical layout of an image. Backends translate it into their native resource state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    /// Readable by any shader stage
    XsReadOnly,
    /// Readable by the fragment shader only
    FsReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

impl Default for CgiImageLayout {
    fn default() -> Self {
        CgiImageLayout::Undefined
    }
}

bitflags::bitflags! {
    /// Native resource states, modeled on D3D12. A barrier is a transition between two of these.
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct CgiResourceState: u32 {
        const COMMON = 0;
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const SHADER_RESOURCE = 0x40 | 0x80;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DST = 0x400;
        const COPY_SRC = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const GENERIC_READ = 0x1 | 0x2 | 0x40 | 0x80 | 0x200 | 0x800;
        /// Same bits as COMMON, as in D3D12
        const PRESENT = 0;
    }
}

impl From<CgiImageLayout> for CgiResourceState {
    fn from(layout: CgiImageLayout) -> Self {
        match layout {
            CgiImageLayout::Undefined => CgiResourceState::COMMON,
            CgiImageLayout::General => CgiResourceState::COMMON,
            CgiImageLayout::ColorAttachment => CgiResourceState::RENDER_TARGET,
            CgiImageLayout::DepthStencilAttachment => CgiResourceState::DEPTH_WRITE,
            CgiImageLayout::DepthStencilReadOnly => {
                CgiResourceState::DEPTH_READ | CgiResourceState::SHADER_RESOURCE
            }
            CgiImageLayout::XsReadOnly => CgiResourceState::SHADER_RESOURCE,
            CgiImageLayout::FsReadOnly => CgiResourceState::PIXEL_SHADER_RESOURCE,
            CgiImageLayout::TransferSrc => CgiResourceState::COPY_SRC,
            CgiImageLayout::TransferDst => CgiResourceState::COPY_DST,
            CgiImageLayout::PresentSrc => CgiResourceState::PRESENT,
        }
    }
}

bitflags::bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct CgiShaderStageFlags: u32 {
        const NONE = 0;
        const VERTEX = 1;
        const TESSELLATION_CONTROL = 2;
        const TESSELLATION_EVALUATION = 4;
        const GEOMETRY = 8;
        const FRAGMENT = 16;
        const COMPUTE = 32;
        const TASK = 64;
        const MESH = 128;
        const RAYGEN = 256;
        const ALL_GRAPHICS = 1 | 2 | 4 | 8 | 16;
        const VS_FS = 1 | 16;
        const ALL = 1 | 2 | 4 | 8 | 16 | 32 | 64 | 128 | 256;
    }
}

/// Individual shader stages in pipeline order, with their single-letter tag and entry point suffix
static SHADER_STAGE_TAGS: [(CgiShaderStageFlags, char, &str); 9] = [
    (CgiShaderStageFlags::VERTEX, 'V', "VS"),
    (CgiShaderStageFlags::TESSELLATION_CONTROL, 'H', "HS"),
    (CgiShaderStageFlags::TESSELLATION_EVALUATION, 'D', "DS"),
    (CgiShaderStageFlags::GEOMETRY, 'G', "GS"),
    (CgiShaderStageFlags::FRAGMENT, 'F', "FS"),
    (CgiShaderStageFlags::COMPUTE, 'C', "CS"),
    (CgiShaderStageFlags::TASK, 'T', "TS"),
    (CgiShaderStageFlags::MESH, 'M', "MS"),
    (CgiShaderStageFlags::RAYGEN, 'R', "RS"),
];

impl CgiShaderStageFlags {
    pub fn from_tag(tag: char) -> Option<CgiShaderStageFlags> {
        SHADER_STAGE_TAGS
            .iter()
            .find(|(_, t, _)| *t == tag)
            .map(|(stage, _, _)| *stage)
    }

    /// Suffix appended to a branch's entry name to form the entry point of a single stage
    pub fn entry_suffix(self) -> Option<&'static str> {
        SHADER_STAGE_TAGS
            .iter()
            .find(|(stage, _, _)| *stage == self)
            .map(|(_, _, suffix)| *suffix)
    }

    /// Iterate the single stages contained in these flags, in pipeline order
    pub fn stages(self) -> impl Iterator<Item = CgiShaderStageFlags> {
        SHADER_STAGE_TAGS
            .iter()
            .map(|(stage, _, _)| *stage)
            .filter(move |stage| self.contains(*stage))
    }
}

bitflags::bitflags! {
    /// Lets `cmd_begin_render_pass` skip setting the viewport and/or scissor to the framebuffer
    /// size
    #[derive(Default)]
    pub struct CgiViewportFlags: u32 {
        const NO_VIEWPORT = 1;
        const NO_SCISSOR = 2;
    }
}

bitflags::bitflags! {
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct CgiTextureUsage: u32 {
        const SAMPLED = 1;
        const RENDER_TARGET = 2;
        const DEPTH_STENCIL = 4;
        const UNORDERED_ACCESS = 8;
        const INPUT_ATTACHMENT = 16;
        const CUBE_MAP = 32;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CgiPipelineType {
    Graphics,
    Compute,
    Mesh,
    RayTracing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiPrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    PatchList3,
}

impl Default for CgiPrimitiveTopology {
    fn default() -> Self {
        CgiPrimitiveTopology::TriangleList
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiIndexType {
    Uint16,
    Uint32,
}

impl CgiIndexType {
    pub fn size_in_bytes(self) -> u32 {
        match self {
            CgiIndexType::Uint16 => 2,
            CgiIndexType::Uint32 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiCompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

impl Default for CgiCompareOp {
    fn default() -> Self {
        CgiCompareOp::GreaterOrEqual
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiCullMode {
    None,
    Front,
    Back,
}

impl Default for CgiCullMode {
    fn default() -> Self {
        CgiCullMode::Back
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiFillMode {
    Solid,
    Wireframe,
}

impl Default for CgiFillMode {
    fn default() -> Self {
        CgiFillMode::Solid
    }
}

/// Blend equation for one color attachment
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiBlendMode {
    Opaque,
    /// `s*(sa) + d*(1-sa)`
    Alpha,
    /// `s + d`
    Additive,
    /// `s*d`
    Multiply,
}

impl Default for CgiBlendMode {
    fn default() -> Self {
        CgiBlendMode::Opaque
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiFilterType {
    Nearest,
    Linear,
    Anisotropic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiAddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiCubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CgiCubeMapFace {
    pub fn array_layer(self) -> u32 {
        match self {
            CgiCubeMapFace::PositiveX => 0,
            CgiCubeMapFace::NegativeX => 1,
            CgiCubeMapFace::PositiveY => 2,
            CgiCubeMapFace::NegativeY => 3,
            CgiCubeMapFace::PositiveZ => 4,
            CgiCubeMapFace::NegativeZ => 5,
        }
    }
}

/// Clear value for one render pass attachment. The list passed to `cmd_begin_render_pass` has one
/// entry per attachment, in attachment order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CgiClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl Default for CgiClearValue {
    fn default() -> Self {
        CgiClearValue::Color([0.0, 0.0, 0.0, 0.0])
    }
}

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiExtents2D {
    pub width: u32,
    pub height: u32,
}

#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct CgiViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl CgiViewport {
    pub fn from_extents(extents: CgiExtents2D) -> Self {
        CgiViewport {
            x: 0.0,
            y: 0.0,
            width: extents.width as f32,
            height: extents.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CgiScissorRect {
    pub fn from_extents(extents: CgiExtents2D) -> Self {
        CgiScissorRect {
            x: 0,
            y: 0,
            width: extents.width,
            height: extents.height,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CgiDescriptorHeapType {
    CbvSrvUav,
    Sampler,
    Rtv,
    Dsv,
}

/// CPU-side address of a descriptor slot
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CgiCpuDescriptorHandle(pub u64);

/// GPU-side address of a descriptor slot in a shader-visible heap
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CgiGpuDescriptorHandle(pub u64);

/// The CPU and GPU handles of the same descriptor slot
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiDescriptorHandlePair {
    pub cpu: CgiCpuDescriptorHandle,
    pub gpu: CgiGpuDescriptorHandle,
}

/// Identifies a native GPU resource (buffer or texture)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CgiResourceId(pub u64);

/// Handle to a render pass created by a renderer. Only valid with the renderer that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiRenderPassHandle(pub(crate) PoolHandle);

/// Handle to a framebuffer created by a renderer. Only valid with the renderer that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiFramebufferHandle(pub(crate) PoolHandle);

/// Handle to a set of textures bound to one descriptor set of a shader
/// (`bind_descriptor_set_textures`). Only valid with the shader and set number that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiComplexSetHandle {
    pub(crate) set_number: u32,
    pub(crate) handle: PoolHandle,
}

impl CgiComplexSetHandle {
    pub fn set_number(&self) -> u32 {
        self.set_number
    }
}

/// Counters describing the simulated GPU's work
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiGpuStats {
    pub command_lists_executed: u64,
    pub draw_calls: u64,
    pub dispatches: u64,
    pub barriers: u64,
    pub presents: u64,
    pub validation_errors: u64,
    pub completed_fence_value: u64,
}

/// Frame cycle diagnostics
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiFrameStats {
    pub frame_count: u64,
    /// Number of `begin_frame` calls that had to block on the GPU
    pub fence_stalls: u64,
    pub cbv_srv_uav_peak_load: u32,
    pub sampler_peak_load: u32,
    pub gpu: CgiGpuStats,
}
