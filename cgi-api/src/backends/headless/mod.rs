//! Software backend. Models the D3D12 binding model without a GPU: resource states and barriers,
//! descriptor heaps, root signatures, fences and a queue that executes recorded command lists.

mod command_buffer;
pub use command_buffer::*;

mod device_context;
pub use device_context::*;

mod geometry;
pub use geometry::*;

mod gpu;
pub use gpu::*;

pub mod internal;

mod pipeline;
pub use pipeline::*;

mod render_pass;
pub use render_pass::*;

mod renderer;
pub use renderer::*;

mod root_signature;
pub use root_signature::*;

mod shader;
pub use shader::*;

mod swapchain;
pub use swapchain::*;

mod texture;
pub use texture::*;

#[cfg(test)]
mod renderer_tests;
