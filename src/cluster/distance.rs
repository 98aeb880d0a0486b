//! Pairwise distances and bounding-box overlap among candidates.

use serde::Serialize;

use crate::config::ClusterSettings;
use crate::detect::{DetectedObject, Point, Rect};

/// Symmetric n×n matrix of center distances, zero on the diagonal.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn from_centers(centers: &[Point]) -> Self {
        let n = centers.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = centers[i].distance_to(&centers[j]);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    pub fn from_objects<T: AsRef<DetectedObject>>(objects: &[T]) -> Self {
        let centers: Vec<Point> = objects.iter().map(|o| o.as_ref().center).collect();
        Self::from_centers(&centers)
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }
}

/// Intersection-over-union of two rectangles, 0 when they are disjoint.
pub fn overlap_ratio(a: &Rect, b: &Rect) -> f64 {
    if a.right() < b.x || b.right() < a.x || a.bottom() < b.y || b.bottom() < a.y {
        return 0.0;
    }

    let ix0 = a.x.max(b.x);
    let iy0 = a.y.max(b.y);
    let ix1 = a.right().min(b.right());
    let iy1 = a.bottom().min(b.bottom());
    let intersection = (ix1 - ix0).max(0.0) * (iy1 - iy0).max(0.0);
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// Two candidates close enough to be considered for linking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProximityPair {
    /// Candidate indices, `a < b`.
    pub a: usize,
    pub b: usize,
    pub id_a: String,
    pub id_b: String,
    pub distance: f64,
    pub overlap_ratio: f64,
    /// Within the distance threshold and below the overlap cutoff.
    pub is_qualifying: bool,
}

/// Every unordered pair within `distance_threshold`, in (i, j) order.
///
/// Pairs overlapping at or above the suppression threshold are kept but
/// marked non-qualifying: they are most likely the same physical object
/// detected twice.
pub fn proximity_pairs<T: AsRef<DetectedObject>>(
    objects: &[T],
    matrix: &DistanceMatrix,
    settings: &ClusterSettings,
) -> Vec<ProximityPair> {
    let mut pairs = Vec::new();
    for i in 0..objects.len() {
        let first = objects[i].as_ref();
        for j in (i + 1)..objects.len() {
            let distance = matrix.get(i, j);
            if distance > settings.distance_threshold {
                continue;
            }
            let second = objects[j].as_ref();
            let overlap = overlap_ratio(&first.bounding_box, &second.bounding_box);
            let is_qualifying = overlap < settings.overlap_suppression_threshold;
            if !is_qualifying {
                log::debug!(
                    "suppressing pair {}/{}: overlap {:.2} looks like a duplicate",
                    first.identity,
                    second.identity,
                    overlap
                );
            }
            pairs.push(ProximityPair {
                a: i,
                b: j,
                id_a: first.identity.clone(),
                id_b: second.identity.clone(),
                distance,
                overlap_ratio: overlap,
                is_qualifying,
            });
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ClusterSettings {
        ClusterSettings {
            distance_threshold: 150.0,
            min_cluster_size: 2,
            overlap_suppression_threshold: 0.3,
        }
    }

    fn boxed(id: &str, x: f64, y: f64, w: f64, h: f64) -> DetectedObject {
        DetectedObject::new(id, "car", 1.0, Rect::new(x, y, w, h))
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let m = DistanceMatrix::from_centers(&[
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(6.0, 8.0),
        ]);
        assert_eq!(m.len(), 3);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 0.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
        assert!((m.get(0, 1) - 5.0).abs() < 1e-9);
        assert!((m.get(0, 2) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!((overlap_ratio(&r, &r) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 0.0, 10.0, 10.0);
        let c = Rect::new(0.0, 30.0, 10.0, 10.0);
        assert_eq!(overlap_ratio(&a, &b), 0.0);
        assert_eq!(overlap_ratio(&a, &c), 0.0);
    }

    #[test]
    fn iou_of_half_shifted_boxes() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 0.0, 10.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((overlap_ratio(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn pairs_respect_distance_and_overlap() {
        let objects = vec![
            boxed("a", 0.0, 0.0, 40.0, 20.0),
            boxed("b", 100.0, 0.0, 40.0, 20.0),
            boxed("c", 102.0, 0.0, 40.0, 20.0),
            boxed("far", 1000.0, 0.0, 40.0, 20.0),
        ];
        let matrix = DistanceMatrix::from_objects(&objects);
        let pairs = proximity_pairs(&objects, &matrix, &settings());

        let keyed: Vec<(&str, &str, bool)> = pairs
            .iter()
            .map(|p| (p.id_a.as_str(), p.id_b.as_str(), p.is_qualifying))
            .collect();
        assert_eq!(
            keyed,
            vec![("a", "b", true), ("a", "c", true), ("b", "c", false)]
        );
        assert!(pairs.iter().all(|p| p.a < p.b));
    }

    #[test]
    fn pair_at_exact_threshold_is_kept() {
        let objects = vec![
            boxed("a", 0.0, 0.0, 10.0, 10.0),
            boxed("b", 150.0, 0.0, 10.0, 10.0),
        ];
        let matrix = DistanceMatrix::from_objects(&objects);
        let pairs = proximity_pairs(&objects, &matrix, &settings());
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].is_qualifying);
    }
}
