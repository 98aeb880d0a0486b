mod geometry;
mod normalize;
mod object;

pub use geometry::{BoundingBox, Point, Rect};
pub use normalize::{normalize_detections, LabelFilter};
pub use object::DetectedObject;
