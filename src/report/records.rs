use serde::Serialize;

use crate::cluster::{Cluster, ProximityPair};
use crate::config::ClusterMode;
use crate::track::Candidate;

use super::alerts::{assess_crowd, AlertAssessment, AlertLevel};

/// Everything the engine derived from one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub mode: ClusterMode,
    pub timestamp_ms: u64,
    pub source: Option<String>,
    /// Objects that survived normalization.
    pub total_objects: usize,
    pub candidates: Vec<Candidate>,
    pub pairs: Vec<ProximityPair>,
    pub clusters: Vec<Cluster>,
}

impl FrameReport {
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Candidates that belong to some cluster.
    pub fn clustered_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }

    pub fn alerts(&self) -> AlertAssessment {
        let sizes: Vec<usize> = self.clusters.iter().map(Cluster::len).collect();
        assess_crowd(self.candidate_count(), &sizes)
    }

    /// Output records for this frame, produced on demand.
    ///
    /// Hotspot mode yields one record per cluster and nothing at all when
    /// there are no clusters. Crowd mode yields a single summary.
    pub fn records(&self) -> Box<dyn Iterator<Item = OutputRecord> + '_> {
        match self.mode {
            ClusterMode::Hotspot => Box::new(
                self.clusters
                    .iter()
                    .enumerate()
                    .map(move |(idx, cluster)| {
                        OutputRecord::Hotspot(self.hotspot_record(idx + 1, cluster))
                    }),
            ),
            ClusterMode::Crowd => {
                Box::new(std::iter::once(OutputRecord::Crowd(self.crowd_summary())))
            }
        }
    }

    pub fn hotspot_record(&self, hotspot_number: usize, cluster: &Cluster) -> HotspotRecord {
        let members: Vec<&Candidate> = cluster
            .members
            .iter()
            .filter_map(|&idx| self.candidates.get(idx))
            .collect();
        let count = members.len().max(1) as f64;
        let avg_duration_ms =
            members.iter().map(|c| c.parked_duration_ms as f64).sum::<f64>() / count;
        let avg_frames = members
            .iter()
            .map(|c| c.stationary_frames as f64)
            .sum::<f64>()
            / count;

        HotspotRecord {
            timestamp: self.timestamp_ms,
            source: self.source.clone(),
            hotspot_id: cluster.id.clone(),
            hotspot_number,
            vehicle_count: cluster.len(),
            centroid_x: cluster.centroid.x.round(),
            centroid_y: cluster.centroid.y.round(),
            avg_distance_px: round_to(cluster.avg_pair_distance, 1),
            max_distance_px: round_to(cluster.max_pair_distance, 1),
            vehicle_ids: cluster.member_ids.join(","),
            avg_parked_duration_sec: round_to(avg_duration_ms / 1000.0, 1),
            avg_parked_frames: round_to(avg_frames, 1),
        }
    }

    pub fn crowd_summary(&self) -> CrowdSummary {
        let assessment = self.alerts();
        let crowded = self.clustered_count();
        let candidates = self.candidate_count();
        let density_percentage = if candidates == 0 {
            0.0
        } else {
            round_to(crowded as f64 / candidates as f64 * 100.0, 1)
        };

        CrowdSummary {
            timestamp: self.timestamp_ms,
            source: self.source.clone(),
            status: if self.clusters.is_empty() {
                CrowdStatus::Clear
            } else {
                CrowdStatus::Crowded
            },
            total_vehicles: self.total_objects,
            candidate_vehicles: candidates,
            crowded_vehicles: crowded,
            cluster_count: self.clusters.len(),
            density_percentage,
            alert_level: assessment.level,
            alerts: assessment.notes,
            clusters: self
                .clusters
                .iter()
                .enumerate()
                .map(|(idx, cluster)| CrowdClusterRecord::new(idx + 1, cluster))
                .collect(),
        }
    }
}

/// One message for the messaging collaborator.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Hotspot(HotspotRecord),
    Crowd(CrowdSummary),
}

impl OutputRecord {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A group of parked vehicles, published once per frame it is active.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HotspotRecord {
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub hotspot_id: String,
    pub hotspot_number: usize,
    pub vehicle_count: usize,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub avg_distance_px: f64,
    pub max_distance_px: f64,
    pub vehicle_ids: String,
    pub avg_parked_duration_sec: f64,
    pub avg_parked_frames: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdStatus {
    Clear,
    Crowded,
}

/// Per-frame crowd overview.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrowdSummary {
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub status: CrowdStatus,
    pub total_vehicles: usize,
    pub candidate_vehicles: usize,
    pub crowded_vehicles: usize,
    pub cluster_count: usize,
    pub density_percentage: f64,
    pub alert_level: AlertLevel,
    pub alerts: Vec<String>,
    pub clusters: Vec<CrowdClusterRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrowdClusterRecord {
    pub crowd_id: String,
    pub crowd_number: usize,
    pub vehicle_count: usize,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub avg_distance_px: f64,
    pub max_distance_px: f64,
    pub density: f64,
    pub vehicle_ids: String,
}

impl CrowdClusterRecord {
    fn new(crowd_number: usize, cluster: &Cluster) -> Self {
        Self {
            crowd_id: cluster.id.clone(),
            crowd_number,
            vehicle_count: cluster.len(),
            centroid_x: cluster.centroid.x.round(),
            centroid_y: cluster.centroid.y.round(),
            avg_distance_px: round_to(cluster.avg_pair_distance, 1),
            max_distance_px: round_to(cluster.max_pair_distance, 1),
            density: round_to(cluster.density, 6),
            vehicle_ids: cluster.member_ids.join(","),
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
