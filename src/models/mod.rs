pub mod common;
pub mod image;
pub mod text;
pub mod thumbnail;

pub use common::*;
pub use image::*;
pub use text::*;
pub use thumbnail::*;
