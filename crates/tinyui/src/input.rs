//! Canvas input: coordinate mapping, dispatch and touch/mouse reconciliation.
//!
//! Browsers fire emulated mouse events after touch events for the same
//! gesture. A touch event whose propagation was stopped is remembered by
//! kind for a short window; the matching mouse event inside that window is
//! stopped the same way without being dispatched again.

use common::Point;
use scene::{EventKind, PointerSource, Scene, UiEvent};
use std::collections::HashMap;
use tracing::trace;

/// Canvas placement used to map client coordinates to drawing-buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasMetrics {
    /// Canvas top-left in client (CSS) pixels.
    pub offset_x: f32,
    pub offset_y: f32,
    /// Displayed size in CSS pixels.
    pub css_width: f32,
    pub css_height: f32,
    /// Backing drawing-buffer size.
    pub buffer_width: f32,
    pub buffer_height: f32,
}

impl CanvasMetrics {
    /// Canvas displayed at its buffer size at the client origin.
    pub fn unscaled(width: f32, height: f32) -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            css_width: width,
            css_height: height,
            buffer_width: width,
            buffer_height: height,
        }
    }

    /// Client point to drawing-buffer pixels. A zero CSS size maps 1:1.
    pub fn to_buffer(&self, client_x: f32, client_y: f32) -> Point {
        let sx = if self.css_width > 0.0 { self.buffer_width / self.css_width } else { 1.0 };
        let sy = if self.css_height > 0.0 { self.buffer_height / self.css_height } else { 1.0 };
        Point::new((client_x - self.offset_x) * sx, (client_y - self.offset_y) * sy)
    }
}

/// One physical pointer event in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub kind: EventKind,
    pub source: PointerSource,
    pub client_x: f32,
    pub client_y: f32,
    pub timestamp_ms: f64,
}

impl PointerInput {
    pub fn new(kind: EventKind, source: PointerSource, client_x: f32, client_y: f32, timestamp_ms: f64) -> Self {
        Self { kind, source, client_x, client_y, timestamp_ms }
    }

    /// Build from a DOM event name such as `mousedown` or `touchend`.
    pub fn from_dom(name: &str, client_x: f32, client_y: f32, timestamp_ms: f64) -> Option<Self> {
        let (kind, source) = EventKind::from_dom_name(name)?;
        Some(Self::new(kind, source, client_x, client_y, timestamp_ms))
    }
}

/// What happened to one [`PointerInput`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// A listener received the event.
    pub delivered: bool,
    /// Propagation was stopped; the host should stop the DOM event too.
    pub stopped: bool,
    /// The stop came from an earlier touch event, nothing was dispatched.
    pub replayed: bool,
}

/// Turns pointer input into [`UiEvent`] dispatches on a scene.
#[derive(Debug)]
pub struct EventManager {
    metrics: CanvasMetrics,
    handle_touch: bool,
    replay_window_ms: f64,
    /// Timestamp of the last stopped touch event, per kind.
    stopped_touches: HashMap<EventKind, f64>,
}

impl EventManager {
    pub fn new(metrics: CanvasMetrics, handle_touch: bool, replay_window_ms: f64) -> Self {
        Self { metrics, handle_touch, replay_window_ms, stopped_touches: HashMap::new() }
    }

    pub fn metrics(&self) -> CanvasMetrics {
        self.metrics
    }

    pub fn set_metrics(&mut self, metrics: CanvasMetrics) {
        self.metrics = metrics;
    }

    pub fn set_buffer_size(&mut self, width: f32, height: f32) {
        self.metrics.buffer_width = width;
        self.metrics.buffer_height = height;
    }

    pub fn handles_touch(&self) -> bool {
        self.handle_touch
    }

    /// Dispatch `input` into `scene`.
    pub fn handle(&mut self, scene: &mut Scene, input: PointerInput) -> DispatchOutcome {
        match input.source {
            PointerSource::Touch if !self.handle_touch => return DispatchOutcome::default(),
            PointerSource::Mouse => {
                if self.take_replay(input.kind, input.timestamp_ms) {
                    trace!(kind = %input.kind, "replaying stopped touch on mouse event");
                    return DispatchOutcome { delivered: false, stopped: true, replayed: true };
                }
            }
            PointerSource::Touch => {}
        }

        let point = self.metrics.to_buffer(input.client_x, input.client_y);
        let mut event = UiEvent::new(input.kind, input.source, point.x, point.y).with_timestamp(input.timestamp_ms);
        let delivered = scene.dispatch(&mut event);
        let stopped = event.is_propagation_stopped();

        if input.source == PointerSource::Touch {
            if stopped {
                self.stopped_touches.insert(input.kind, input.timestamp_ms);
            } else {
                self.stopped_touches.remove(&input.kind);
            }
        }
        DispatchOutcome { delivered, stopped, replayed: false }
    }

    /// Consume a remembered stopped touch of `kind` if it is recent enough.
    fn take_replay(&mut self, kind: EventKind, now_ms: f64) -> bool {
        match self.stopped_touches.remove(&kind) {
            Some(at) => {
                let age = now_ms - at;
                (0.0..=self.replay_window_ms).contains(&age)
            }
            None => false,
        }
    }

    /// Forget remembered touches older than the replay window.
    pub fn prune(&mut self, now_ms: f64) {
        let window = self.replay_window_ms;
        self.stopped_touches.retain(|_, at| now_ms - *at <= window);
    }

    pub fn pending_replays(&self) -> usize {
        self.stopped_touches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Color;
    use std::cell::Cell;
    use std::rc::Rc;
    use text::TextSystem;

    /// Scene with one 100x100 square at the origin counting touchstarts.
    fn scene_with_target(stop: bool) -> (Scene, Rc<Cell<usize>>) {
        let mut scene = Scene::new(Rc::new(TextSystem::monospace()));
        let root = scene.root();
        let g = scene.create_graphics("target");
        scene.graphics_mut(g).unwrap().fill_rect(0.0, 0.0, 100.0, 100.0, Color::WHITE);
        scene.add_child(root, g).unwrap();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        scene
            .add_event_listener(g, EventKind::TouchStart, move |e, _| {
                c.set(c.get() + 1);
                if stop {
                    e.stop_propagation();
                }
            })
            .unwrap();
        (scene, count)
    }

    #[test]
    fn test_client_to_buffer_scaling() {
        let metrics = CanvasMetrics {
            offset_x: 10.0,
            offset_y: 20.0,
            css_width: 200.0,
            css_height: 100.0,
            buffer_width: 400.0,
            buffer_height: 200.0,
        };
        assert_eq!(metrics.to_buffer(110.0, 70.0), Point::new(200.0, 100.0));

        let degenerate = CanvasMetrics { css_width: 0.0, css_height: 0.0, ..metrics };
        assert_eq!(degenerate.to_buffer(15.0, 25.0), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_mouse_after_stopped_touch_is_replayed() {
        let (mut scene, count) = scene_with_target(true);
        let mut events = EventManager::new(CanvasMetrics::unscaled(200.0, 200.0), true, 300.0);

        let touch = events.handle(&mut scene, PointerInput::from_dom("touchstart", 5.0, 5.0, 1000.0).unwrap());
        assert_eq!(touch, DispatchOutcome { delivered: true, stopped: true, replayed: false });

        let mouse = events.handle(&mut scene, PointerInput::from_dom("mousedown", 5.0, 5.0, 1100.0).unwrap());
        assert_eq!(mouse, DispatchOutcome { delivered: false, stopped: true, replayed: true });
        assert_eq!(count.get(), 1);

        // the replay is consumed
        let again = events.handle(&mut scene, PointerInput::from_dom("mousedown", 5.0, 5.0, 1150.0).unwrap());
        assert!(!again.replayed);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_replay_window_expires() {
        let (mut scene, count) = scene_with_target(true);
        let mut events = EventManager::new(CanvasMetrics::unscaled(200.0, 200.0), true, 300.0);
        events.handle(&mut scene, PointerInput::from_dom("touchstart", 5.0, 5.0, 1000.0).unwrap());
        let late = events.handle(&mut scene, PointerInput::from_dom("mousedown", 5.0, 5.0, 1400.0).unwrap());
        assert!(!late.replayed);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_unstopped_touch_is_not_remembered() {
        let (mut scene, count) = scene_with_target(false);
        let mut events = EventManager::new(CanvasMetrics::unscaled(200.0, 200.0), true, 300.0);
        events.handle(&mut scene, PointerInput::from_dom("touchstart", 5.0, 5.0, 0.0).unwrap());
        assert_eq!(events.pending_replays(), 0);
        let mouse = events.handle(&mut scene, PointerInput::from_dom("mousedown", 5.0, 5.0, 10.0).unwrap());
        assert_eq!(mouse, DispatchOutcome { delivered: true, stopped: false, replayed: false });
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_replay_is_keyed_by_kind() {
        let (mut scene, _) = scene_with_target(true);
        let mut events = EventManager::new(CanvasMetrics::unscaled(200.0, 200.0), true, 300.0);
        events.handle(&mut scene, PointerInput::from_dom("touchstart", 5.0, 5.0, 0.0).unwrap());
        let up = events.handle(&mut scene, PointerInput::from_dom("mouseup", 5.0, 5.0, 10.0).unwrap());
        assert!(!up.replayed);
        assert_eq!(events.pending_replays(), 1);
        events.prune(1000.0);
        assert_eq!(events.pending_replays(), 0);
    }

    #[test]
    fn test_touch_ignored_when_disabled() {
        let (mut scene, count) = scene_with_target(false);
        let mut events = EventManager::new(CanvasMetrics::unscaled(200.0, 200.0), false, 300.0);
        let outcome = events.handle(&mut scene, PointerInput::from_dom("touchstart", 5.0, 5.0, 0.0).unwrap());
        assert_eq!(outcome, DispatchOutcome::default());
        events.handle(&mut scene, PointerInput::from_dom("mousedown", 5.0, 5.0, 0.0).unwrap());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_scaled_canvas_hits_buffer_coordinates() {
        let (mut scene, count) = scene_with_target(false);
        // displayed at 4x the buffer size: client 300 maps to buffer 75
        let metrics = CanvasMetrics {
            css_width: 800.0,
            css_height: 800.0,
            ..CanvasMetrics::unscaled(200.0, 200.0)
        };
        let mut events = EventManager::new(metrics, true, 300.0);
        events.handle(&mut scene, PointerInput::from_dom("mousedown", 300.0, 300.0, 0.0).unwrap());
        assert_eq!(count.get(), 1);
        events.handle(&mut scene, PointerInput::from_dom("mousedown", 500.0, 500.0, 0.0).unwrap());
        assert_eq!(count.get(), 1);
    }
}
