//! Connected-component clustering over qualifying proximity pairs.

use serde::Serialize;
use std::f64::consts::PI;

use crate::config::{ClusterMode, ClusterSettings};
use crate::detect::{DetectedObject, Point, Rect};

use super::distance::{DistanceMatrix, ProximityPair};

const ID_SEPARATOR: char = '_';
const ID_ESCAPE: char = '\\';

/// A group of candidates linked through qualifying pairs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cluster {
    /// Derived from the sorted member identities, so the same membership
    /// yields the same id on every frame.
    pub id: String,
    /// Candidate indices in traversal order.
    pub members: Vec<usize>,
    /// Member identities in traversal order.
    pub member_ids: Vec<String>,
    pub centroid: Point,
    pub bounds: Rect,
    pub avg_pair_distance: f64,
    pub max_pair_distance: f64,
    /// Members per unit area of the circle spanning the widest pair.
    pub density: f64,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Deterministic cluster identifier from member identities.
///
/// Separators and escapes inside an identity are backslash-escaped, so
/// distinct memberships never collide.
pub fn cluster_id<S: AsRef<str>>(prefix: &str, identities: &[S]) -> String {
    let mut sorted: Vec<&str> = identities.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();

    let mut id = String::from(prefix);
    for identity in sorted {
        id.push(ID_SEPARATOR);
        for c in identity.chars() {
            if c == ID_SEPARATOR || c == ID_ESCAPE {
                id.push(ID_ESCAPE);
            }
            id.push(c);
        }
    }
    id
}

/// Density with the zero-spread fallback to an area of 1.
pub fn cluster_density(member_count: usize, max_pair_distance: f64) -> f64 {
    let radius = max_pair_distance / 2.0;
    let area = PI * radius * radius;
    let area = if area > 0.0 { area } else { 1.0 };
    member_count as f64 / area
}

/// Depth-first components of the qualifying-edge graph.
///
/// Start nodes are taken in candidate order and neighbours are visited in
/// increasing index order, matching a recursive traversal exactly.
pub fn connected_components(n: usize, pairs: &[ProximityPair]) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for pair in pairs.iter().filter(|p| p.is_qualifying) {
        adjacency[pair.a].push(pair.b);
        adjacency[pair.b].push(pair.a);
    }
    for neighbours in adjacency.iter_mut() {
        neighbours.sort_unstable();
        neighbours.dedup();
    }

    let mut visited = vec![false; n];
    let mut components = Vec::new();
    // (node, index of the next neighbour to scan)
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        visited[start] = true;
        component.push(start);
        stack.push((start, 0));

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            match adjacency[node][*next..].iter().position(|&m| !visited[m]) {
                Some(offset) => {
                    let neighbour = adjacency[node][*next + offset];
                    *next += offset + 1;
                    visited[neighbour] = true;
                    component.push(neighbour);
                    stack.push((neighbour, 0));
                }
                None => {
                    stack.pop();
                }
            }
        }

        components.push(component);
    }

    components
}

/// Build clusters from candidates and their proximity pairs.
///
/// Components smaller than `min_cluster_size` are dropped.
pub fn build_clusters<T: AsRef<DetectedObject>>(
    objects: &[T],
    matrix: &DistanceMatrix,
    pairs: &[ProximityPair],
    settings: &ClusterSettings,
    mode: ClusterMode,
) -> Vec<Cluster> {
    connected_components(objects.len(), pairs)
        .into_iter()
        .filter(|component| component.len() >= settings.min_cluster_size)
        .filter_map(|component| summarize(objects, matrix, component, mode))
        .collect()
}

fn summarize<T: AsRef<DetectedObject>>(
    objects: &[T],
    matrix: &DistanceMatrix,
    members: Vec<usize>,
    mode: ClusterMode,
) -> Option<Cluster> {
    let first = objects.get(*members.first()?)?.as_ref();
    let count = members.len() as f64;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut bounds = first.bounding_box;
    for &idx in &members {
        let obj = objects[idx].as_ref();
        sum_x += obj.center.x;
        sum_y += obj.center.y;
        bounds = bounds.union(&obj.bounding_box);
    }

    let mut distances = Vec::with_capacity(members.len() * (members.len() - 1) / 2);
    for (pos, &i) in members.iter().enumerate() {
        for &j in &members[pos + 1..] {
            distances.push(matrix.get(i, j));
        }
    }
    let (avg_pair_distance, max_pair_distance) = if distances.is_empty() {
        (0.0, 0.0)
    } else {
        let sum: f64 = distances.iter().sum();
        let max = distances.iter().copied().fold(0.0_f64, f64::max);
        (sum / distances.len() as f64, max)
    };

    let member_ids: Vec<String> = members
        .iter()
        .map(|&idx| objects[idx].as_ref().identity.clone())
        .collect();

    Some(Cluster {
        id: cluster_id(mode.id_prefix(), &member_ids),
        density: cluster_density(members.len(), max_pair_distance),
        members,
        member_ids,
        centroid: Point::new(sum_x / count, sum_y / count),
        bounds,
        avg_pair_distance,
        max_pair_distance,
    })
}
