//! Vector shapes drawn as flat-colored triangles.

use common::{Color, Point, Rect};
use std::f32::consts::TAU;

/// How a vertex list is assembled into triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    TriangleFan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect { rect: Rect, color: Color },
    Circle { center: Point, radius: f32, color: Color },
}

impl DrawCommand {
    pub fn bounds(&self) -> Rect {
        match *self {
            DrawCommand::Rect { rect, .. } => rect,
            DrawCommand::Circle { center, radius, .. } => {
                Rect::new(center.x - radius, center.y - radius, radius * 2.0, radius * 2.0)
            }
        }
    }

    pub fn color(&self) -> Color {
        match *self {
            DrawCommand::Rect { color, .. } | DrawCommand::Circle { color, .. } => color,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        match *self {
            DrawCommand::Rect { rect, .. } => rect.contains_point(point),
            DrawCommand::Circle { center, radius, .. } => center.distance(point) <= radius,
        }
    }

    /// Vertices in local space and how to assemble them.
    pub fn tessellate(&self) -> (Primitive, Vec<Point>) {
        match *self {
            DrawCommand::Rect { rect, .. } => {
                let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());
                let points = vec![
                    Point::new(x0, y0),
                    Point::new(x1, y0),
                    Point::new(x0, y1),
                    Point::new(x0, y1),
                    Point::new(x1, y0),
                    Point::new(x1, y1),
                ];
                (Primitive::Triangles, points)
            }
            DrawCommand::Circle { center, radius, .. } => {
                let segments = circle_segments(radius);
                let mut points = Vec::with_capacity(segments + 2);
                points.push(center);
                for i in 0..=segments {
                    let angle = TAU * i as f32 / segments as f32;
                    points.push(Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin()));
                }
                (Primitive::TriangleFan, points)
            }
        }
    }
}

/// Fan segments for a circle; more for larger radii.
pub fn circle_segments(radius: f32) -> usize {
    ((radius.max(0.0).sqrt() * 6.0).ceil() as usize).clamp(12, 256)
}

/// Command list plus the running union of command bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graphics {
    commands: Vec<DrawCommand>,
    bounds: Option<Rect>,
}

impl Graphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) -> &mut Self {
        let rect = Rect::new(x, y, width.max(0.0), height.max(0.0));
        self.push(DrawCommand::Rect { rect, color })
    }

    pub fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Color) -> &mut Self {
        self.push(DrawCommand::Circle { center: Point::new(x, y), radius: radius.max(0.0), color })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.bounds = None;
    }

    fn push(&mut self, command: DrawCommand) -> &mut Self {
        let b = command.bounds();
        self.bounds = Some(match self.bounds {
            Some(current) => current.union(&b),
            None => b,
        });
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Union of all command bounds, `Rect::ZERO` when empty.
    pub fn bounds(&self) -> Rect {
        self.bounds.unwrap_or(Rect::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether a local point lies inside any shape.
    pub fn hit(&self, point: Point) -> bool {
        if !self.bounds().contains_point(point) {
            return false;
        }
        self.commands.iter().any(|c| c.contains(point))
    }
}
