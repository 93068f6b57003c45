mod commands;
pub use commands::*;

mod descriptor_heap;
pub use descriptor_heap::*;

pub(crate) mod preprocessor;
