//! Browser host: context creation, the animation frame loop and DOM input.

use crate::config::EngineOptions;
use crate::engine::Engine;
use crate::error::Result;
use crate::input::{CanvasMetrics, PointerInput};
use gpu::{DefaultFetcher, GlowBackend, GpuError};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Event, HtmlCanvasElement, MouseEvent, TouchEvent, WebGl2RenderingContext,
    WebGlRenderingContext,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

const MOUSE_EVENTS: [&str; 3] = ["mousedown", "mousemove", "mouseup"];
const TOUCH_EVENTS: [&str; 4] = ["touchstart", "touchmove", "touchend", "touchcancel"];

/// Create a WebGL context on `canvas` with the configured id and attributes.
pub fn create_context(canvas: &HtmlCanvasElement, options: &EngineOptions) -> std::result::Result<GlowBackend, GpuError> {
    let attrs = &options.context_attributes;
    let object = js_sys::Object::new();
    for (key, value) in [
        ("alpha", attrs.alpha),
        ("antialias", attrs.antialias),
        ("premultipliedAlpha", attrs.premultiplied_alpha),
        ("preserveDrawingBuffer", attrs.preserve_drawing_buffer),
        ("depth", attrs.depth),
        ("stencil", attrs.stencil),
    ] {
        js_sys::Reflect::set(&object, &JsValue::from_str(key), &JsValue::from_bool(value))
            .map_err(|_| GpuError::ContextUnavailable(format!("cannot set context attribute {key}")))?;
    }

    let id = options.context_id.as_str();
    let context = canvas
        .get_context_with_context_options(id, &object)
        .ok()
        .flatten()
        .ok_or_else(|| GpuError::ContextUnavailable(format!("{id} context unavailable")))?;

    match id {
        "webgl2" => context
            .dyn_into::<WebGl2RenderingContext>()
            .map(GlowBackend::from_webgl2)
            .map_err(|_| GpuError::ContextUnavailable("not a WebGL2 context".to_string())),
        _ => context
            .dyn_into::<WebGlRenderingContext>()
            .map(GlowBackend::from_webgl1)
            .map_err(|_| GpuError::ContextUnavailable("not a WebGL context".to_string())),
    }
}

type RafClosure = Closure<dyn FnMut(f64)>;

struct RafInner {
    closure: RefCell<Option<RafClosure>>,
    callback: RefCell<Box<dyn FnMut(f64)>>,
    running: Cell<bool>,
    raf_id: Cell<i32>,
}

/// `requestAnimationFrame` loop. Re-registers itself each frame until
/// stopped or dropped.
pub struct RafLoop {
    inner: Rc<RafInner>,
}

impl RafLoop {
    pub fn new(callback: impl FnMut(f64) + 'static) -> Self {
        Self {
            inner: Rc::new(RafInner {
                closure: RefCell::new(None),
                callback: RefCell::new(Box::new(callback)),
                running: Cell::new(false),
                raf_id: Cell::new(0),
            }),
        }
    }

    /// No-op when already running.
    pub fn start(&self) {
        if self.inner.running.get() {
            return;
        }
        self.inner.running.set(true);

        let inner = Rc::downgrade(&self.inner);
        let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if !inner.running.get() {
                return;
            }
            inner.callback.borrow_mut()(timestamp_ms);

            if inner.running.get() {
                if let Some(closure) = inner.closure.borrow().as_ref() {
                    inner.raf_id.set(request_animation_frame(closure.as_ref().unchecked_ref()));
                }
            }
        }) as Box<dyn FnMut(f64)>);

        self.inner.raf_id.set(request_animation_frame(closure.as_ref().unchecked_ref()));
        *self.inner.closure.borrow_mut() = Some(closure);
    }

    pub fn stop(&self) {
        if !self.inner.running.get() {
            return;
        }
        self.inner.running.set(false);
        cancel_animation_frame(self.inner.raf_id.get());
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }
}

impl Drop for RafLoop {
    fn drop(&mut self) {
        self.stop();
        self.inner.closure.borrow_mut().take();
    }
}

type Listener = Closure<dyn FnMut(Event)>;

/// An [`Engine`] bound to a canvas: DOM pointer input is dispatched into the
/// scene and auto render drives [`Engine::frame`] from animation frames.
pub struct WebEngine {
    engine: Rc<RefCell<Engine<GlowBackend>>>,
    canvas: HtmlCanvasElement,
    raf: RafLoop,
    listeners: Vec<(&'static str, Listener)>,
}

impl WebEngine {
    /// Text only gets real glyphs from fonts passed with
    /// [`EngineOptions::with_font`]; the browser exposes no font files.
    pub fn new(canvas: HtmlCanvasElement, mut options: EngineOptions) -> Result<Self> {
        let gl = create_context(&canvas, &options)?;
        if options.drawing_buffer_size.is_none() {
            options.drawing_buffer_size = Some((canvas.width(), canvas.height()));
        }
        let handle_touch = options.handle_touch_events;
        let engine = Rc::new(RefCell::new(Engine::new(Rc::new(gl), options, Rc::new(DefaultFetcher::new()))?));

        let weak = Rc::downgrade(&engine);
        let raf = RafLoop::new(move |timestamp_ms| {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            let Ok(mut engine) = engine.try_borrow_mut() else {
                return;
            };
            if engine.is_auto_render() {
                if let Err(e) = engine.frame(timestamp_ms) {
                    warn!(error = %e, "frame failed");
                }
            }
        });

        let mut web = Self { engine, canvas, raf, listeners: Vec::new() };
        web.update_metrics();
        for name in MOUSE_EVENTS {
            web.listen(name)?;
        }
        if handle_touch {
            for name in TOUCH_EVENTS {
                web.listen(name)?;
            }
        }
        Ok(web)
    }

    pub fn engine(&self) -> &Rc<RefCell<Engine<GlowBackend>>> {
        &self.engine
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Start or stop calling [`Engine::frame`] every animation frame.
    pub fn set_auto_render(&self, enabled: bool) {
        let enabled = {
            let mut engine = self.engine.borrow_mut();
            engine.set_auto_render(enabled);
            engine.is_auto_render()
        };
        if enabled {
            self.raf.start();
        } else {
            self.raf.stop();
        }
    }

    /// Match the drawing buffer to the canvas `width` and `height`.
    pub fn sync_size(&self) {
        self.engine.borrow_mut().resize(self.canvas.width(), self.canvas.height());
        self.update_metrics();
    }

    fn update_metrics(&self) {
        update_metrics(&self.canvas, &mut self.engine.borrow_mut());
    }

    fn listen(&mut self, name: &'static str) -> Result<()> {
        let weak: Weak<RefCell<Engine<GlowBackend>>> = Rc::downgrade(&self.engine);
        let canvas = self.canvas.clone();
        let listener = Closure::wrap(Box::new(move |event: Event| {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            let Some(input) = pointer_input(name, &event) else {
                return;
            };
            let Ok(mut engine) = engine.try_borrow_mut() else {
                return;
            };
            update_metrics(&canvas, &mut engine);
            let outcome = engine.handle_pointer(input);
            if outcome.stopped {
                event.stop_propagation();
                event.prevent_default();
            }
        }) as Box<dyn FnMut(Event)>);

        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        self.canvas
            .add_event_listener_with_callback_and_add_event_listener_options(
                name,
                listener.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(|_| GpuError::ContextUnavailable(format!("cannot listen for {name}")))?;
        debug!(event = name, "listening");
        self.listeners.push((name, listener));
        Ok(())
    }

    /// Stop the loop, remove DOM listeners and release every GPU resource.
    pub fn destroy(&mut self) {
        self.raf.stop();
        for (name, listener) in self.listeners.drain(..) {
            let _ = self.canvas.remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
        if let Ok(mut engine) = self.engine.try_borrow_mut() {
            engine.destroy();
        }
    }
}

impl Drop for WebEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn update_metrics(canvas: &HtmlCanvasElement, engine: &mut Engine<GlowBackend>) {
    let rect = canvas.get_bounding_client_rect();
    let (width, height) = engine.size();
    engine.set_canvas_metrics(CanvasMetrics {
        offset_x: rect.left() as f32,
        offset_y: rect.top() as f32,
        css_width: rect.width() as f32,
        css_height: rect.height() as f32,
        buffer_width: width as f32,
        buffer_height: height as f32,
    });
}

/// Client position of a mouse event, or of the first changed touch.
fn pointer_input(name: &str, event: &Event) -> Option<PointerInput> {
    let (x, y) = if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
        (mouse.client_x(), mouse.client_y())
    } else {
        let touch = event.dyn_ref::<TouchEvent>()?.changed_touches().get(0)?;
        (touch.client_x(), touch.client_y())
    };
    PointerInput::from_dom(name, x as f32, y as f32, event.time_stamp())
}
