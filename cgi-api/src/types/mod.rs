mod definitions;
pub use definitions::*;

mod misc;
pub use misc::*;

mod render_pass;
pub use render_pass::*;
