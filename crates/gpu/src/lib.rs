//! GL plumbing for the TinyUI engine.
//!
//! - [`GlBackend`]: the seam every GL call goes through, with a `glow`
//!   implementation and a state-tracking headless one
//! - [`GlState`]: full snapshot/restore of GL global state
//! - [`GlTaskQueue`]: deferred GL work and safe sections
//! - [`TextureManager`]: texture cache, URL load coalescing, deferred
//!   upload and delete
//! - [`QuadPipeline`]: the single shader program used for all drawing

pub mod backend;
pub mod error;
pub mod fetch;
pub mod glow_backend;
pub mod headless;
pub mod image;
pub mod pipeline;
pub mod shaders;
pub mod state;
pub mod tasks;
pub mod texture;

pub use backend::{GlBackend, ObjectBinder, VertexAttrib};
pub use error::{GpuError, TextureError};
pub use fetch::{DefaultFetcher, ImageFetcher};
pub use glow_backend::GlowBackend;
pub use headless::HeadlessGl;
pub use pipeline::{Fill, QuadPipeline, QuadVertex};
pub use state::{GlState, GlStateFor, ObjectBindings};
pub use tasks::{FlushReport, GlTask, GlTaskQueue, SafeSection};
pub use texture::{TextureInfo, TextureKey, TextureLoad, TextureManager};

/// Re-exported GL enum constants.
pub use glow;
