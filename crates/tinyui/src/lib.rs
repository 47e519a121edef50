//! TinyUI: a small retained-mode 2D engine drawing into a WebGL context.
//!
//! Build a tree of containers, vector graphics, BBCode text and bitmaps in a
//! [`Scene`], then let the [`Engine`] render it every frame. The engine can
//! own its canvas or share a context with another renderer through
//! [`Engine::patch_render`], which leaves GL state exactly as it found it.
//!
//! ```ignore
//! let mut engine = Engine::new(gl, EngineOptions::default(), Rc::new(DefaultFetcher::new()))?;
//! let label = engine.create_text("[b]Hello[/b] [color=red]world[/color]", "label");
//! engine.scene_mut().add_child(engine.root(), label)?;
//! engine.render()?;
//! ```

pub mod clip;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod tick;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use clip::ScissorStack;
pub use config::{ContextAttributes, EngineOptions, FontData};
pub use engine::{BitmapLoad, Engine, FrameStats};
pub use error::{EngineError, Result};
pub use input::{CanvasMetrics, DispatchOutcome, EventManager, PointerInput};
pub use tick::{TickId, TickScheduler};

pub use common::{Color, Matrix, PixelBuffer, Point, Rect, Size};
pub use gpu::{DefaultFetcher, GlBackend, GlowBackend, GpuError, HeadlessGl, ImageFetcher, TextureError};
pub use scene::{Bitmap, EventKind, Graphics, ListenerId, NodeId, NodeKind, PointerSource, Scene, SceneError, UiEvent};
pub use text::{TextAlign, TextLayout, TextStyle, TextSystem};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
