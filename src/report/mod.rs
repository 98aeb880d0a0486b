//! Cluster metrics, alerting and output records.

mod alerts;
mod records;

pub use alerts::{
    assess_crowd, AlertAssessment, AlertLevel, HIGH_DENSITY_RATIO, LARGE_CLUSTER_SIZE,
    MANY_CLUSTERS,
};
pub use records::{
    CrowdClusterRecord, CrowdStatus, CrowdSummary, FrameReport, HotspotRecord, OutputRecord,
};
