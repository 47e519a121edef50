//! Common types shared across the TinyUI engine crates.
//!
//! - affine [`Matrix`] math and rectangles
//! - CSS-style [`Color`] parsing
//! - CPU-side RGBA images ([`PixelBuffer`])

pub mod color;
pub mod geometry;
pub mod pixels;

pub use color::Color;
pub use geometry::{Matrix, Point, Rect, Size};
pub use pixels::PixelBuffer;
