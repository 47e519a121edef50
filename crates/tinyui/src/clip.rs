//! Scissor stack for node clip rects.

use common::Rect;

/// Nested clip regions in drawing-buffer pixels, y down. Each pushed region
/// is intersected with the one below it and with the viewport.
#[derive(Debug, Clone)]
pub struct ScissorStack {
    viewport: Rect,
    stack: Vec<Rect>,
}

impl ScissorStack {
    pub fn new(width: f32, height: f32) -> Self {
        Self { viewport: Rect::new(0.0, 0.0, width, height), stack: Vec::new() }
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Innermost active region, or `None` when nothing clips.
    pub fn current(&self) -> Option<Rect> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push `rect` and return the effective region.
    pub fn push(&mut self, rect: Rect) -> Rect {
        let outer = self.current().unwrap_or(self.viewport);
        let clipped = outer.intersect(&snap(rect));
        self.stack.push(clipped);
        clipped
    }

    /// Pop the innermost region and return the one now active.
    pub fn pop(&mut self) -> Option<Rect> {
        self.stack.pop();
        self.current()
    }

    /// `[x, y, width, height]` for `glScissor`, whose origin is bottom-left.
    pub fn gl_box(&self, rect: Rect) -> [i32; 4] {
        let y = self.viewport.height - rect.bottom();
        [rect.x as i32, y as i32, rect.width as i32, rect.height as i32]
    }
}

/// Grow to whole pixels so partially covered pixels stay drawable.
fn snap(rect: Rect) -> Rect {
    let x0 = rect.x.floor();
    let y0 = rect.y.floor();
    let x1 = rect.right().ceil();
    let y1 = rect.bottom().ceil();
    Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
}
