use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixels. Always normalized so `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Rectangle {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rectangle {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Reduces a quadrilateral to its axis-aligned envelope.
    ///
    /// Returns `None` for fewer than four points or any non-finite coordinate.
    pub fn from_points(points: &[[f64; 2]]) -> Option<Self> {
        if points.len() < 4 || points.iter().flatten().any(|v| !v.is_finite()) {
            return None;
        }
        let (mut x1, mut y1) = (f64::INFINITY, f64::INFINITY);
        let (mut x2, mut y2) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for [x, y] in points {
            x1 = x1.min(*x);
            y1 = y1.min(*y);
            x2 = x2.max(*x);
            y2 = y2.max(*y);
        }
        Some(Self { x1, y1, x2, y2 })
    }

    /// Accepts `[x1, y1, x2, y2]` or a flattened quad `[x0, y0, ..., x3, y3]`.
    pub fn from_coords(coords: &[f64]) -> Option<Self> {
        if coords.iter().any(|v| !v.is_finite()) {
            return None;
        }
        match coords.len() {
            4 => Some(Self::new(coords[0], coords[1], coords[2], coords[3])),
            n if n >= 8 => {
                let points: Vec<[f64; 2]> = coords[..8]
                    .chunks_exact(2)
                    .map(|pair| [pair[0], pair[1]])
                    .collect();
                Self::from_points(&points)
            }
            _ => None,
        }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn average(&self, other: &Self) -> Self {
        Self::new(
            (self.x1 + other.x1) * 0.5,
            (self.y1 + other.y1) * 0.5,
            (self.x2 + other.x2) * 0.5,
            (self.y2 + other.y2) * 0.5,
        )
    }

    pub fn iou(&self, other: &Self) -> f64 {
        iou(self, other)
    }

    /// Length of the shared vertical interval, zero when disjoint.
    pub fn vertical_overlap(&self, other: &Self) -> f64 {
        (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0)
    }

    /// Splits the box into `count` equal slots along one axis and returns slot `index`.
    pub fn slice(&self, index: usize, count: usize, vertical: bool) -> Self {
        let count = count.max(1) as f64;
        let index = index as f64;
        if vertical {
            let step = self.height() / count;
            Self::new(
                self.x1,
                self.y1 + step * index,
                self.x2,
                self.y1 + step * (index + 1.0),
            )
        } else {
            let step = self.width() / count;
            Self::new(
                self.x1 + step * index,
                self.y1,
                self.x1 + step * (index + 1.0),
                self.y2,
            )
        }
    }
}

impl From<[f64; 4]> for Rectangle {
    fn from(value: [f64; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Rectangle> for [f64; 4] {
    fn from(value: Rectangle) -> Self {
        [value.x1, value.y1, value.x2, value.y2]
    }
}

/// Intersection over union. Zero when the union has no area.
pub fn iou(a: &Rectangle, b: &Rectangle) -> f64 {
    let inter = Rectangle {
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
        x2: a.x2.min(b.x2),
        y2: a.y2.min(b.y2),
    };
    let inter_area = inter.area();
    let union = a.area() + b.area() - inter_area;
    if union <= 0.0 || !union.is_finite() {
        0.0
    } else {
        (inter_area / union).clamp(0.0, 1.0)
    }
}
