//! Rendering built on top of `cgi-api`. The main piece is [`DeferredShading`], which owns the
//! render passes, targets and pipelines of a deferred renderer and records its passes into a
//! command buffer each frame:
//!
//! ```text
//! G-buffer -> lighting        (one render pass, two subpasses)
//! compose -> forward          (one render pass, two subpasses)
//! reflection                  (optional)
//! tone map to the swap chain
//! ```

mod deferred_shading;
pub use deferred_shading::*;

mod scene;
pub use scene::*;

pub mod shaders;

pub use cgi_api::CgiResult;

#[cfg(test)]
mod deferred_shading_tests;
