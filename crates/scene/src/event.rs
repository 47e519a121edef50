//! Pointer events and the listener table nodes carry.

use crate::node::NodeId;
use common::Point;
use std::fmt;
use std::rc::Rc;

/// Event names. Mouse input is folded onto the touch names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TouchStart,
    TouchMove,
    TouchEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TouchStart => "touchstart",
            EventKind::TouchMove => "touchmove",
            EventKind::TouchEnd => "touchend",
        }
    }

    /// Map a DOM event name, touch or mouse, to its kind and source.
    pub fn from_dom_name(name: &str) -> Option<(EventKind, PointerSource)> {
        let mapped = match name {
            "touchstart" => (EventKind::TouchStart, PointerSource::Touch),
            "touchmove" => (EventKind::TouchMove, PointerSource::Touch),
            "touchend" | "touchcancel" => (EventKind::TouchEnd, PointerSource::Touch),
            "mousedown" => (EventKind::TouchStart, PointerSource::Mouse),
            "mousemove" => (EventKind::TouchMove, PointerSource::Mouse),
            "mouseup" => (EventKind::TouchEnd, PointerSource::Mouse),
            _ => return None,
        };
        Some(mapped)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerSource {
    Touch,
    Mouse,
}

/// A pointer event in canvas drawing-buffer pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct UiEvent {
    pub kind: EventKind,
    pub source: PointerSource,
    /// Canvas position.
    pub x: f32,
    pub y: f32,
    /// Position in the local space of `current_target`.
    pub local: Point,
    /// Deepest node the event was delivered to.
    pub target: Option<NodeId>,
    /// Node whose listeners are running.
    pub current_target: Option<NodeId>,
    pub timestamp_ms: f64,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
    handled: bool,
}

impl UiEvent {
    pub fn new(kind: EventKind, source: PointerSource, x: f32, y: f32) -> Self {
        Self {
            kind,
            source,
            x,
            y,
            local: Point::new(x, y),
            target: None,
            current_target: None,
            timestamp_ms: 0.0,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
            handled: false,
        }
    }

    pub fn touch(kind: EventKind, x: f32, y: f32) -> Self {
        Self::new(kind, PointerSource::Touch, x, y)
    }

    pub fn with_timestamp(mut self, timestamp_ms: f64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// No ancestor of the current node receives the event.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Like [`stop_propagation`](Self::stop_propagation), and also skips the
    /// remaining listeners of the current node and the remaining siblings.
    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }

    /// Whether any listener received the event.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub(crate) fn mark_handled(&mut self) {
        self.handled = true;
    }
}

/// Handle returned by [`Emitter::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry<K, F: ?Sized> {
    id: ListenerId,
    kind: K,
    callback: Rc<F>,
}

/// Ordered listener table keyed by event kind. `F` is the callback type,
/// usually a `dyn Fn(..)`.
pub struct Emitter<K, F: ?Sized> {
    next_id: u64,
    entries: Vec<Entry<K, F>>,
}

impl<K: Copy + PartialEq, F: ?Sized> Emitter<K, F> {
    pub fn new() -> Self {
        Self { next_id: 0, entries: Vec::new() }
    }

    pub fn on(&mut self, kind: K, callback: Rc<F>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Entry { id, kind, callback });
        id
    }

    /// Remove one listener. Returns `false` if it was not registered for
    /// `kind`.
    pub fn off(&mut self, kind: K, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !(e.id == id && e.kind == kind));
        self.entries.len() != before
    }

    pub fn off_all(&mut self, kind: K) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.kind != kind);
        before - self.entries.len()
    }

    pub fn has(&self, kind: K) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// Snapshot of the callbacks for `kind` in registration order. Listeners
    /// added or removed while the snapshot runs do not affect it.
    pub fn listeners(&self, kind: K) -> Vec<Rc<F>> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| Rc::clone(&e.callback))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Copy + PartialEq, F: ?Sized> Default for Emitter<K, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, F: ?Sized> fmt::Debug for Emitter<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter").field("listeners", &self.entries.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Callback = dyn Fn(&str);

    #[test]
    fn test_emitter_order_and_removal() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut emitter: Emitter<EventKind, Callback> = Emitter::new();
        let l = log.clone();
        let first = emitter.on(EventKind::TouchStart, Rc::new(move |s: &str| l.borrow_mut().push(format!("1{s}"))));
        let l = log.clone();
        emitter.on(EventKind::TouchStart, Rc::new(move |s: &str| l.borrow_mut().push(format!("2{s}"))));
        emitter.on(EventKind::TouchEnd, Rc::new(|_: &str| {}));

        for cb in emitter.listeners(EventKind::TouchStart) {
            cb("a");
        }
        assert_eq!(*log.borrow(), vec!["1a", "2a"]);

        assert!(!emitter.off(EventKind::TouchEnd, first));
        assert!(emitter.off(EventKind::TouchStart, first));
        assert!(!emitter.off(EventKind::TouchStart, first));
        assert_eq!(emitter.listeners(EventKind::TouchStart).len(), 1);
        assert_eq!(emitter.off_all(EventKind::TouchEnd), 1);
        assert!(!emitter.has(EventKind::TouchEnd));
    }

    #[test]
    fn test_dom_names() {
        assert_eq!(
            EventKind::from_dom_name("mousedown"),
            Some((EventKind::TouchStart, PointerSource::Mouse))
        );
        assert_eq!(
            EventKind::from_dom_name("touchcancel"),
            Some((EventKind::TouchEnd, PointerSource::Touch))
        );
        assert_eq!(EventKind::from_dom_name("click"), None);
        assert_eq!(EventKind::TouchMove.to_string(), "touchmove");
    }

    #[test]
    fn test_stop_flags() {
        let mut e = UiEvent::touch(EventKind::TouchStart, 1.0, 2.0);
        e.stop_propagation();
        assert!(e.is_propagation_stopped());
        assert!(!e.is_immediate_propagation_stopped());
        e.stop_immediate_propagation();
        assert!(e.is_immediate_propagation_stopped());
    }
}
