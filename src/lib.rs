//! Proximity Clustering Engine
//!
//! Groups per-frame object detections into spatial clusters of nearby
//! objects. Two variants share one pipeline:
//!
//! - **crowd**: every accepted object is a candidate, and each frame yields
//!   one summary with alert grading.
//! - **hotspot**: only objects that stayed put for enough consecutive frames
//!   ("parked") are candidates, and each active cluster yields its own record.
//!
//! # Pipeline
//!
//! Each frame flows strictly forward:
//!
//! 1. `detect`: raw detections → [`DetectedObject`]s (filtered, never rejected)
//! 2. `track`: per-identity history → parked candidates (hotspot mode)
//! 3. `cluster`: distance matrix, IoU duplicate suppression, connected components
//! 4. `report`: per-cluster metrics, alerts, output records
//!
//! [`ProximityEngine`] owns the tracker table and drives the stages. Only the
//! tracker carries state between frames.
//!
//! # Module Structure
//!
//! - `frame`: frame envelope parsing
//! - `config`: mode presets, config file and env overrides
//! - `router`: one engine per source stream
//! - `transport`: MQTT endpoint handling and topic naming for the bridge binary

pub mod cluster;
pub mod config;
pub mod detect;
pub mod engine;
pub mod frame;
pub mod report;
pub mod router;
pub mod track;
pub mod transport;

pub use cluster::{Cluster, DistanceMatrix, ProximityPair};
pub use config::{ClusterMode, ClusterSettings, EngineConfig, TrackingSettings};
pub use detect::{BoundingBox, DetectedObject, LabelFilter, Point, Rect};
pub use engine::{EngineStats, ProximityEngine};
pub use frame::{parse_frame, FrameRecord, RawBox, RawDetection};
pub use report::{
    AlertLevel, CrowdClusterRecord, CrowdStatus, CrowdSummary, FrameReport, HotspotRecord,
    OutputRecord,
};
pub use router::EngineRouter;
pub use track::{Candidate, TrackedObjectState, TrackerTable};
