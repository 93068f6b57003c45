//! Lowest level crate of the CGI rendering stack. Handle pools, frame rings and a few memory
//! helpers shared by the other crates.

pub mod handle_pool;
pub mod memory;
pub mod ring;
