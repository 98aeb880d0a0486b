use serde::Serialize;

use super::geometry::{Point, Rect};

/// A detection accepted for this frame, in uniform pixel-space form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectedObject {
    /// Tracking identity assigned by the upstream detector.
    pub identity: String,
    /// Lower-cased class name.
    pub label: String,
    pub confidence: f64,
    pub bounding_box: Rect,
    pub center: Point,
    pub area: f64,
}

impl DetectedObject {
    /// Build from a top-left + size rectangle.
    pub fn new(identity: &str, label: &str, confidence: f64, bounding_box: Rect) -> Self {
        Self::with_center(
            identity,
            label,
            confidence,
            bounding_box,
            bounding_box.center(),
        )
    }

    pub(crate) fn with_center(
        identity: &str,
        label: &str,
        confidence: f64,
        bounding_box: Rect,
        center: Point,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            label: label.to_lowercase(),
            confidence,
            bounding_box,
            center,
            area: bounding_box.area(),
        }
    }
}

impl AsRef<DetectedObject> for DetectedObject {
    fn as_ref(&self) -> &DetectedObject {
        self
    }
}
