//! The engine: owns the GL seam, the scene and the frame loop.
//!
//! A frame runs the ticks, then renders. Rendering enters a safe section,
//! releases textures of destroyed nodes, flushes deferred GL work, attaches
//! finished URL loads to their bitmaps and walks the tree depth first,
//! threading the accumulated matrix and alpha down to every draw.

use crate::clip::ScissorStack;
use crate::config::EngineOptions;
use crate::error::{EngineError, Result};
use crate::input::{CanvasMetrics, DispatchOutcome, EventManager, PointerInput};
use crate::tick::{TickId, TickScheduler};
use common::{Matrix, PixelBuffer, Rect};
use futures::future::{FutureExt, LocalBoxFuture};
use gpu::glow;
use gpu::{
    Fill, FlushReport, GlBackend, GlState, GlStateFor, GlTaskQueue, ImageFetcher, QuadPipeline, TextureLoad,
    TextureManager,
};
use scene::{Bitmap, EventKind, ListenerId, NodeId, NodeKind, Primitive, Scene, SceneError, UiEvent};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use text::{TextStyle, TextSystem};
use tracing::{debug, info};

/// Resolves to the bitmap node once its texture is on the GPU.
pub type BitmapLoad = LocalBoxFuture<'static, Result<NodeId>>;

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub nodes_visited: usize,
    /// Deferred GL tasks run at the start of the frame.
    pub tasks_flushed: usize,
    /// Rendered in patch mode.
    pub patched: bool,
}

/// Retained-mode 2D engine over a GL backend.
pub struct Engine<B: GlBackend> {
    gl: Rc<B>,
    tasks: Rc<GlTaskQueue<B>>,
    textures: TextureManager<B>,
    /// `None` once destroyed.
    pipeline: Option<QuadPipeline<B>>,
    scene: Scene,
    ticks: TickScheduler,
    events: EventManager,
    options: EngineOptions,
    width: u32,
    height: u32,
    auto_render: bool,
    last_frame_ms: Option<f64>,
    /// URL bitmaps whose texture is not attached yet.
    url_bitmaps: HashMap<NodeId, String>,
    /// URL bitmaps whose load failed, destroyed at the next render.
    failed_bitmaps: Rc<RefCell<Vec<NodeId>>>,
}

impl<B: GlBackend> Engine<B> {
    /// Create an engine whose text uses system fonts plus
    /// [`EngineOptions::fonts`]. On the web there are no system fonts, so
    /// supply one with [`EngineOptions::with_font`] for real glyphs.
    pub fn new(gl: Rc<B>, options: EngineOptions, fetcher: Rc<dyn ImageFetcher>) -> Result<Self> {
        let text = TextSystem::with_fonts(options.fonts.iter().map(|f| (f.family.as_str(), f.data.as_slice())));
        Self::with_text_system(gl, options, fetcher, Rc::new(text))
    }

    /// Create an engine. Fails without side effects if the shader program
    /// cannot be built.
    pub fn with_text_system(
        gl: Rc<B>,
        options: EngineOptions,
        fetcher: Rc<dyn ImageFetcher>,
        text: Rc<TextSystem>,
    ) -> Result<Self> {
        let pipeline = QuadPipeline::new(&*gl)?;

        let (width, height) = match options.drawing_buffer_size {
            Some(size) => size,
            None => {
                let mut viewport = [0; 4];
                gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
                (viewport[2].max(0) as u32, viewport[3].max(0) as u32)
            }
        };

        let tasks = GlTaskQueue::new(Rc::clone(&gl));
        let textures = TextureManager::new(Rc::clone(&tasks), fetcher);
        let mut scene = Scene::new(text);
        scene.set_default_text_style(options.default_text_style.clone());
        let events = EventManager::new(
            CanvasMetrics::unscaled(width as f32, height as f32),
            options.handle_touch_events,
            options.touch_replay_window_ms,
        );

        info!(width, height, patch = options.save_gl_state, "engine created");
        Ok(Self {
            gl,
            tasks,
            textures,
            pipeline: Some(pipeline),
            scene,
            ticks: TickScheduler::new(),
            events,
            options,
            width,
            height,
            auto_render: false,
            last_frame_ms: None,
            url_bitmaps: HashMap::new(),
            failed_bitmaps: Rc::new(RefCell::new(Vec::new())),
        })
    }

    pub fn gl(&self) -> &Rc<B> {
        &self.gl
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn root(&self) -> NodeId {
        self.scene.root()
    }

    pub fn textures(&self) -> &TextureManager<B> {
        &self.textures
    }

    /// The deferred GL task queue shared with the texture manager.
    pub fn tasks(&self) -> &Rc<GlTaskQueue<B>> {
        &self.tasks
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Drawing buffer size.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_destroyed(&self) -> bool {
        self.pipeline.is_none()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(EngineError::Destroyed);
        }
        Ok(())
    }

    // ---- nodes ----

    pub fn create_container(&mut self, name: &str) -> NodeId {
        self.scene.create_container(name)
    }

    pub fn create_graphics(&mut self, name: &str) -> NodeId {
        self.scene.create_graphics(name)
    }

    pub fn create_text(&mut self, content: &str, name: &str) -> NodeId {
        self.scene.create_text(content, name)
    }

    pub fn create_text_with_style(&mut self, content: &str, style: TextStyle, name: &str) -> NodeId {
        self.scene.create_text_with_style(content, style, name)
    }

    /// Bitmap over a decoded image.
    pub fn create_bitmap_from_image(&mut self, pixels: PixelBuffer) -> Result<NodeId> {
        self.create_bitmap_from_canvas(pixels, None)
    }

    /// Bitmap over CPU-drawn pixels. `resize` fixes the display size,
    /// otherwise it follows the pixel size.
    pub fn create_bitmap_from_canvas(&mut self, pixels: PixelBuffer, resize: Option<(f32, f32)>) -> Result<NodeId> {
        self.ensure_alive()?;
        let (width, height) = (pixels.width, pixels.height);
        let key = self.textures.create_texture(pixels);
        Ok(self.scene.create_bitmap(Bitmap::owned(key, width, height, resize), "bitmap"))
    }

    /// Re-upload the pixels of a bitmap created from a canvas or image.
    pub fn update_bitmap_pixels(&mut self, id: NodeId, pixels: PixelBuffer) -> Result<()> {
        self.ensure_alive()?;
        let actual = self.scene.node(id)?.kind().name();
        let (width, height) = (pixels.width, pixels.height);
        let key = match self.scene.bitmap(id) {
            Some(bitmap) if bitmap.owns_texture() => bitmap.texture(),
            _ => None,
        };
        let Some(key) = key else {
            return Err(SceneError::WrongKind { id, expected: "owned bitmap", actual }.into());
        };
        self.textures.update_texture(key, pixels);
        if let Some(bitmap) = self.scene.bitmap_mut(id) {
            bitmap.attach(key, width, height);
        }
        Ok(())
    }

    /// Create a bitmap node for `url` right away and start loading it.
    ///
    /// The node draws nothing until its texture is attached during a render
    /// after the upload. The returned future resolves once the upload has run;
    /// on failure it yields the error and the node is destroyed at the next
    /// render.
    pub fn create_bitmap_from_url(&mut self, url: &str) -> Result<(NodeId, BitmapLoad)> {
        self.ensure_alive()?;
        let id = self.scene.create_bitmap(Bitmap::pending(None), url);
        self.url_bitmaps.insert(id, url.to_string());

        let load = self.textures.load_texture(url);
        let failed = Rc::clone(&self.failed_bitmaps);
        let future = async move {
            match load.await {
                Ok(_) => Ok(id),
                Err(e) => {
                    failed.borrow_mut().push(id);
                    Err(EngineError::from(e))
                }
            }
        }
        .boxed_local();

        // cached URLs can be attached at once
        self.resolve_url_bitmaps();
        Ok((id, future))
    }

    /// Load `url` into a shared texture without creating a node.
    pub fn load_texture(&self, url: &str) -> TextureLoad {
        self.textures.load_texture(url)
    }

    /// Destroy a node and its subtree, queueing its textures for deletion.
    pub fn destroy_node(&mut self, id: NodeId) -> Result<usize> {
        let count = self.scene.destroy(id)?;
        self.release_textures();
        Ok(count)
    }

    pub fn add_event_listener<F>(&mut self, id: NodeId, kind: EventKind, handler: F) -> Result<ListenerId>
    where
        F: Fn(&mut UiEvent, &mut Scene) + 'static,
    {
        Ok(self.scene.add_event_listener(id, kind, handler)?)
    }

    pub fn remove_event_listener(&mut self, id: NodeId, kind: EventKind, listener: ListenerId) -> bool {
        self.scene.remove_event_listener(id, kind, listener)
    }

    fn release_textures(&mut self) {
        for key in self.scene.take_released_textures() {
            self.textures.release(key);
        }
    }

    fn resolve_url_bitmaps(&mut self) {
        let failed = std::mem::take(&mut *self.failed_bitmaps.borrow_mut());
        for id in failed {
            self.url_bitmaps.remove(&id);
            if self.scene.contains(id) && self.scene.destroy(id).is_ok() {
                debug!(?id, "destroyed bitmap whose load failed");
            }
        }

        let textures = &self.textures;
        let scene = &mut self.scene;
        self.url_bitmaps.retain(|id, url| {
            if !scene.contains(*id) {
                return false;
            }
            let Some(key) = textures.key_for_url(url) else {
                return true;
            };
            match textures.info(key) {
                Some(info) if textures.is_ready(key) => {
                    if let Some(bitmap) = scene.bitmap_mut(*id) {
                        bitmap.attach(key, info.width, info.height);
                    }
                    false
                }
                _ => true,
            }
        });
    }

    // ---- ticks and input ----

    pub fn add_tick<F>(&mut self, tick: F) -> TickId
    where
        F: FnMut(&mut Scene, f64) -> anyhow::Result<()> + 'static,
    {
        self.ticks.add(tick)
    }

    /// Idempotent.
    pub fn remove_tick(&mut self, id: TickId) -> bool {
        self.ticks.remove(id)
    }

    /// Whether the host loop should call [`frame`](Self::frame) every
    /// animation frame.
    pub fn set_auto_render(&mut self, enabled: bool) {
        self.auto_render = enabled && !self.is_destroyed();
        if !self.auto_render {
            self.last_frame_ms = None;
        }
    }

    pub fn is_auto_render(&self) -> bool {
        self.auto_render
    }

    /// Run every tick, then render. `now_ms` is the frame timestamp.
    pub fn frame(&mut self, now_ms: f64) -> Result<FrameStats> {
        self.ensure_alive()?;
        let delta = self.last_frame_ms.map(|last| (now_ms - last).max(0.0)).unwrap_or(0.0);
        self.last_frame_ms = Some(now_ms);
        self.ticks.run(&mut self.scene, delta);
        self.render()
    }

    pub fn handle_pointer(&mut self, input: PointerInput) -> DispatchOutcome {
        if self.is_destroyed() {
            return DispatchOutcome::default();
        }
        self.events.prune(input.timestamp_ms);
        let outcome = self.events.handle(&mut self.scene, input);
        self.release_textures();
        outcome
    }

    pub fn set_canvas_metrics(&mut self, metrics: CanvasMetrics) {
        self.events.set_metrics(metrics);
    }

    pub fn canvas_metrics(&self) -> CanvasMetrics {
        self.events.metrics()
    }

    /// New drawing buffer size, used for the viewport, projection and
    /// scissor clamping.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.events.set_buffer_size(width as f32, height as f32);
        debug!(width, height, "resized");
    }

    // ---- rendering ----

    /// Render the tree. Clears first unless `save_gl_state` is set, in which
    /// case this is a [`patch_render`](Self::patch_render).
    pub fn render(&mut self) -> Result<FrameStats> {
        if self.options.save_gl_state {
            self.patch_render()
        } else {
            self.render_pass(false)
        }
    }

    /// Render without clearing into a context owned by another renderer, and
    /// leave GL global state exactly as it was found.
    pub fn patch_render(&mut self) -> Result<FrameStats> {
        self.ensure_alive()?;
        let saved: GlStateFor<B> = GlState::capture(&*self.gl);
        let result = self.render_pass(true);
        saved.restore(&*self.gl);
        result
    }

    /// Run deferred GL work now.
    pub fn flush(&mut self) -> Result<FlushReport> {
        self.ensure_alive()?;
        self.release_textures();
        let _section = self.tasks.enter_safe_section();
        Ok(self.tasks.flush())
    }

    fn render_pass(&mut self, patch: bool) -> Result<FrameStats> {
        self.ensure_alive()?;
        let _section = self.tasks.enter_safe_section();
        let mut stats = FrameStats { patched: patch, ..FrameStats::default() };

        self.release_textures();
        stats.tasks_flushed = self.tasks.flush().executed;
        self.resolve_url_bitmaps();

        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(EngineError::Destroyed);
        };
        let gl = &*self.gl;
        let (width, height) = (self.width as f32, self.height as f32);

        gl.viewport(0, 0, self.width as i32, self.height as i32);
        for cap in [glow::DEPTH_TEST, glow::STENCIL_TEST, glow::CULL_FACE, glow::SCISSOR_TEST] {
            gl.disable(cap);
        }
        gl.enable(glow::BLEND);
        gl.blend_equation_separate(glow::FUNC_ADD, glow::FUNC_ADD);
        gl.blend_func_separate(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA, glow::ONE, glow::ONE_MINUS_SRC_ALPHA);
        if !patch {
            let [r, g, b, a] = self.options.clear_color.to_f32_array();
            gl.clear_color(r, g, b, a);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
        pipeline.begin(gl, width, height);

        let mut frame = Frame {
            gl,
            pipeline,
            textures: &self.textures,
            scissor: ScissorStack::new(width, height),
            stats: &mut stats,
        };
        let root = self.scene.root();
        frame.render_node(&mut self.scene, root, &Matrix::IDENTITY, 1.0);

        Ok(stats)
    }

    /// Release every GPU resource. Queued GL work is drained once inside one
    /// safe section, pending loads fail with a "destroyed while loading"
    /// error, and later renders return [`EngineError::Destroyed`].
    pub fn destroy(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };
        self.auto_render = false;
        self.ticks.clear();
        self.url_bitmaps.clear();
        self.failed_bitmaps.borrow_mut().clear();
        self.scene.clear();
        self.scene.take_released_textures();
        self.textures.destroy();

        let _section = self.tasks.enter_safe_section();
        let report = self.tasks.flush();
        pipeline.destroy(&*self.gl);
        info!(tasks = report.executed, "engine destroyed");
    }
}

impl<B: GlBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<B: GlBackend> fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("nodes", &self.scene.len())
            .field("textures", &self.textures.len())
            .field("auto_render", &self.auto_render)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Per-frame render walk state.
struct Frame<'a, B: GlBackend> {
    gl: &'a B,
    pipeline: &'a QuadPipeline<B>,
    textures: &'a TextureManager<B>,
    scissor: ScissorStack,
    stats: &'a mut FrameStats,
}

impl<'a, B: GlBackend> Frame<'a, B> {
    fn render_node(&mut self, scene: &mut Scene, id: NodeId, parent_matrix: &Matrix, parent_alpha: f32) {
        let Some(node) = scene.get(id) else {
            return;
        };
        if !node.visible || node.alpha <= 0.0 {
            return;
        }
        self.stats.nodes_visited += 1;

        let alpha = node.alpha * parent_alpha;
        let clip = node.clip_rect;
        let children = node.children().to_vec();
        let matrix = parent_matrix.multiply(&scene.local_matrix(id));

        let clipped = match clip {
            Some(rect) => {
                let region = self.scissor.push(matrix.transform_rect(&rect));
                self.apply_scissor(Some(region));
                true
            }
            None => false,
        };

        self.draw_content(scene, id, &matrix, alpha);
        for child in children {
            self.render_node(scene, child, &matrix, alpha);
        }

        if clipped {
            let outer = self.scissor.pop();
            self.apply_scissor(outer);
        }
    }

    fn apply_scissor(&self, region: Option<Rect>) {
        match region {
            Some(rect) => {
                let [x, y, w, h] = self.scissor.gl_box(rect);
                self.gl.enable(glow::SCISSOR_TEST);
                self.gl.scissor(x, y, w, h);
            }
            None => self.gl.disable(glow::SCISSOR_TEST),
        }
    }

    fn draw_content(&mut self, scene: &mut Scene, id: NodeId, matrix: &Matrix, alpha: f32) {
        if scene.text_node(id).is_some() {
            self.draw_text(scene, id, matrix, alpha);
            return;
        }
        match scene.get(id).map(|n| n.kind()) {
            Some(NodeKind::Graphics(graphics)) => {
                for command in graphics.commands() {
                    let (primitive, points) = command.tessellate();
                    let mode = match primitive {
                        Primitive::Triangles => glow::TRIANGLES,
                        Primitive::TriangleFan => glow::TRIANGLE_FAN,
                    };
                    self.pipeline.draw_shape(self.gl, matrix, &points, mode, command.color(), alpha);
                    self.stats.draw_calls += 1;
                }
            }
            Some(NodeKind::Bitmap(bitmap)) => {
                let texture = bitmap.texture().and_then(|key| self.textures.texture(key));
                if let Some(texture) = texture {
                    let rect = Rect::new(0.0, 0.0, bitmap.width, bitmap.height);
                    self.pipeline.draw_quad(self.gl, matrix, rect, Fill::Texture(texture), alpha);
                    self.stats.draw_calls += 1;
                }
            }
            _ => {}
        }
    }

    /// Rasterize when the layout changed, then draw the block offset by its
    /// bleed.
    fn draw_text(&mut self, scene: &mut Scene, id: NodeId, matrix: &Matrix, alpha: f32) {
        let system = Rc::clone(scene.text_system());
        let Some(node) = scene.text_node_mut(id) else {
            return;
        };
        if node.layout().lines.is_empty() || node.layout().width <= 0.0 {
            return;
        }

        if node.is_raster_dirty() || node.texture().is_none() {
            let pixels = system.rasterize(node.layout());
            let key = match node.texture() {
                Some(key) if self.textures.info(key).is_some() => {
                    self.textures.update_texture(key, pixels);
                    key
                }
                _ => self.textures.create_texture(pixels),
            };
            node.set_rasterized(key);
        }

        let Some(texture) = node.texture().and_then(|key| self.textures.texture(key)) else {
            return;
        };
        let (width, height) = node.layout().pixel_size();
        let bleed = node.layout().bleed;
        let rect = Rect::new(-bleed, -bleed, width as f32, height as f32);
        self.pipeline.draw_quad(self.gl, matrix, rect, Fill::Texture(texture), alpha);
        self.stats.draw_calls += 1;
    }
}
