//! Report rendering and file generation.

pub mod generator;
pub mod renderer;

pub use generator::*;
pub use renderer::{render, RenderOptions};
