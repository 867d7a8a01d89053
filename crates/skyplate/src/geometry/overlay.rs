//! Renderer-independent drawing primitives in image pixel coordinates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Lime,
    Cyan,
    Magenta,
    Yellow,
    Red,
    White,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    Circle,
    Star,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// Translucent box drawn behind a label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelBackground {
    pub color: Color,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    /// Text starts at the point.
    Start,
    /// Text is centered on the point.
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawPrimitive {
    Marker {
        at: Point,
        shape: MarkerShape,
        size: f64,
        color: Color,
    },
    Circle {
        center: Point,
        radius: f64,
        color: Color,
        line_width: f64,
    },
    Line {
        from: Point,
        to: Point,
        color: Color,
        line_width: f64,
        alpha: f64,
    },
    Text {
        at: Point,
        text: String,
        color: Color,
        font_size: f64,
        bold: bool,
        anchor: TextAnchor,
        background: Option<LabelBackground>,
    },
}
