//! Command generation interface (CGI): a thin, explicit GPU abstraction modeled on Direct3D 12.
//!
//! The API is built around a few objects:
//! * [`CgiRenderer`]: owns the device, swap chain, descriptor heaps and the frame cycle. All other
//!   objects are created through it.
//! * [`CgiCommandBuffer`]: records commands into one native command list per ring-buffer slot.
//! * [`CgiShader`]: compiled shader branches, descriptor-set layouts and the root signature.
//! * [`CgiPipeline`], [`CgiGeometry`], [`CgiTexture`]: immutable pipeline state and GPU resources.
//!
//! Render passes are described declaratively with [`CgiRenderPassDef`] and referenced through
//! generation-checked handles. Subpasses are emulated: the command buffer computes and records the
//! resource barriers between them.
//!
//! The frame cycle is:
//!
//! ```text
//! renderer.begin_frame(present)   // waits until the GPU is done with this ring slot
//! ... record into renderer.command_buffer() and/or per-thread command buffers ...
//! renderer.end_frame(present)     // submits, signals the slot fence, presents
//! ```
//!
//! The only backend is `headless`, a software model of the D3D12 binding model: resource states,
//! descriptor heaps, root signatures and fences. It executes command lists on a simulated GPU,
//! either inline or on a worker thread with artificial latency.

pub use api::*;
pub use command_buffer::*;
pub use dds::*;
pub use error::*;
pub use geometry::*;
pub use pipeline::*;
pub use renderer::*;
pub use shader::*;
pub use shader_branch::*;
pub use texture::*;
pub use types::*;

pub use backends::headless;

mod api;
mod backends;
mod command_buffer;
mod dds;
mod error;
mod geometry;
mod pipeline;
mod renderer;
mod shader;
mod shader_branch;
mod texture;
mod types;

/// Maximum number of vertex buffer bindings of a geometry
pub const MAX_VERTEX_INPUT_BINDINGS: usize = 8;

/// Root signature budget, in DWORDs, as in D3D12
pub const MAX_ROOT_SIGNATURE_DWORDS: u32 = 64;

/// Largest uniform block that may be bound as root constants, in bytes
pub const MAX_ROOT_CONSTANTS_SIZE: u32 = 64;

/// Constant buffer views must start on this alignment
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Largest width or height of a 2D texture, as in D3D12
pub const MAX_TEXTURE_EXTENT: u32 = 16384;

/// Largest number of array slices of a 2D texture, as in D3D12
pub const MAX_TEXTURE_ARRAY_SIZE: u32 = 2048;
