use crate::frame::RawDetection;

use super::object::DetectedObject;

/// Case-insensitive allow-list of object labels.
///
/// An empty filter accepts every label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelFilter {
    labels: Vec<String>,
}

impl LabelFilter {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn allows(&self, label: &str) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        let label = label.trim().to_lowercase();
        self.labels.iter().any(|allowed| *allowed == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Convert raw detections into [`DetectedObject`]s, keeping input order.
///
/// Detections are dropped, never rejected, when the label is missing or
/// not allowed, the confidence is below `min_confidence`, or the bounding
/// box is missing or degenerate. A detection without an identity is keyed
/// by its position in `raw`.
pub fn normalize_detections(
    raw: &[RawDetection],
    labels: &LabelFilter,
    min_confidence: f64,
) -> Vec<DetectedObject> {
    let mut objects = Vec::with_capacity(raw.len());

    for (index, det) in raw.iter().enumerate() {
        let Some(label) = det.label.as_deref().filter(|l| !l.trim().is_empty()) else {
            log::debug!("dropping detection #{}: no label", index);
            continue;
        };
        if !labels.allows(label) {
            log::debug!("dropping detection #{}: label {} not allowed", index, label);
            continue;
        }

        let confidence = det.confidence.unwrap_or(0.0);
        if confidence < min_confidence {
            log::debug!(
                "dropping detection #{}: confidence {:.2} < {:.2}",
                index,
                confidence,
                min_confidence
            );
            continue;
        }

        let Some(bbox) = det.bbox.and_then(|b| b.to_bounding_box()) else {
            log::debug!("dropping detection #{}: no bounding box", index);
            continue;
        };
        let rect = bbox.to_rect();
        if rect.is_degenerate() {
            log::debug!("dropping detection #{}: degenerate bounding box", index);
            continue;
        }

        let identity = det.id.clone().unwrap_or_else(|| index.to_string());
        objects.push(DetectedObject::with_center(
            &identity,
            label.trim(),
            confidence,
            rect,
            bbox.center(),
        ));
    }

    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Point, Rect};
    use crate::frame::RawBox;

    fn vehicles() -> LabelFilter {
        LabelFilter::new(["car", "Truck"])
    }

    #[test]
    fn label_filter_is_case_insensitive() {
        let filter = vehicles();
        assert!(filter.allows("CAR"));
        assert!(filter.allows("truck"));
        assert!(!filter.allows("person"));
        assert!(LabelFilter::accept_all().allows("anything"));
    }

    #[test]
    fn size_form_is_normalized() {
        let raw = vec![RawDetection::sized("a", "Car", 10.0, 20.0, 40.0, 60.0)];
        let objects = normalize_detections(&raw, &vehicles(), 0.0);
        assert_eq!(objects.len(), 1);
        let obj = &objects[0];
        assert_eq!(obj.identity, "a");
        assert_eq!(obj.label, "car");
        assert_eq!(obj.center, Point::new(30.0, 50.0));
        assert_eq!(obj.bounding_box, Rect::new(10.0, 20.0, 40.0, 60.0));
        assert!((obj.area - 2400.0).abs() < 1e-9);
    }

    #[test]
    fn corner_form_is_normalized() {
        let raw = vec![RawDetection::cornered("b", "truck", 100.0, 100.0, 140.0, 120.0)];
        let objects = normalize_detections(&raw, &vehicles(), 0.0);
        assert_eq!(objects[0].center, Point::new(120.0, 110.0));
        assert_eq!(objects[0].bounding_box, Rect::new(100.0, 100.0, 40.0, 20.0));
    }

    #[test]
    fn invalid_detections_are_dropped_silently() {
        let mut no_label = RawDetection::sized("1", "car", 0.0, 0.0, 10.0, 10.0);
        no_label.label = None;
        let wrong_label = RawDetection::sized("2", "person", 0.0, 0.0, 10.0, 10.0);
        let mut no_box = RawDetection::sized("3", "car", 0.0, 0.0, 10.0, 10.0);
        no_box.bbox = None;
        let zero_width = RawDetection::sized("4", "car", 0.0, 0.0, 0.0, 10.0);
        let mut empty_box = RawDetection::sized("5", "car", 0.0, 0.0, 10.0, 10.0);
        empty_box.bbox = Some(RawBox::default());
        let good = RawDetection::sized("6", "car", 0.0, 0.0, 10.0, 10.0);

        let raw = vec![no_label, wrong_label, no_box, zero_width, empty_box, good];
        let objects = normalize_detections(&raw, &vehicles(), 0.0);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].identity, "6");
    }

    #[test]
    fn low_confidence_is_dropped() {
        let mut weak = RawDetection::sized("w", "car", 0.0, 0.0, 10.0, 10.0);
        weak.confidence = Some(0.2);
        let mut unscored = RawDetection::sized("u", "car", 0.0, 0.0, 10.0, 10.0);
        unscored.confidence = None;
        let objects = normalize_detections(&[weak.clone(), unscored.clone()], &vehicles(), 0.5);
        assert!(objects.is_empty());

        let objects = normalize_detections(&[weak, unscored], &vehicles(), 0.0);
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].confidence, 0.0);
    }

    #[test]
    fn missing_identity_uses_position() {
        let mut anon = RawDetection::sized("x", "car", 0.0, 0.0, 10.0, 10.0);
        anon.id = None;
        let raw = vec![RawDetection::sized("x", "person", 0.0, 0.0, 1.0, 1.0), anon];
        let objects = normalize_detections(&raw, &vehicles(), 0.0);
        assert_eq!(objects[0].identity, "1");
    }
}
