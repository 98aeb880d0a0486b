//! Pixel-space geometry shared by every pipeline stage.

use serde::Serialize;

/// A point in pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Planar Euclidean distance.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle, top-left corner plus size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x: x_min,
            y: y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Zero or negative extent on either axis.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// Bounding box as it arrives from a detector.
///
/// Detectors disagree on the format, so the variant is carried explicitly
/// and normalized into a [`Rect`] exactly once.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundingBox {
    Corner {
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
    },
    Size {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl BoundingBox {
    pub fn to_rect(&self) -> Rect {
        match *self {
            BoundingBox::Corner {
                x_min,
                y_min,
                x_max,
                y_max,
            } => Rect::from_corners(x_min, y_min, x_max, y_max),
            BoundingBox::Size {
                x,
                y,
                width,
                height,
            } => Rect::new(x, y, width, height),
        }
    }

    /// Center computed with the formula native to the variant.
    pub fn center(&self) -> Point {
        match *self {
            BoundingBox::Corner {
                x_min,
                y_min,
                x_max,
                y_max,
            } => Point::new((x_min + x_max) / 2.0, (y_min + y_max) / 2.0),
            BoundingBox::Size {
                x,
                y,
                width,
                height,
            } => Point::new(x + width / 2.0, y + height / 2.0),
        }
    }
}
