//! Distance computation and cluster building.

mod builder;
mod distance;

pub use builder::{build_clusters, cluster_density, cluster_id, connected_components, Cluster};
pub use distance::{overlap_ratio, proximity_pairs, DistanceMatrix, ProximityPair};
