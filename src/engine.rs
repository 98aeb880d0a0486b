//! Per-frame pipeline: normalize, track, measure, cluster, report.
//!
//! One [`ProximityEngine`] serves one source stream. Frames must be fed in
//! arrival order because the tracker's stationary streaks depend on it;
//! `&mut self` on the processing methods keeps callers from interleaving.

use std::collections::HashSet;

use anyhow::Result;

use crate::cluster::{build_clusters, proximity_pairs, DistanceMatrix};
use crate::config::{ClusterMode, EngineConfig};
use crate::detect::{normalize_detections, DetectedObject};
use crate::frame::{now_epoch_ms, FrameRecord};
use crate::report::FrameReport;
use crate::track::{Candidate, TrackerTable};

/// Running counters, mostly for health logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub clusters_found: u64,
}

#[derive(Clone, Debug)]
pub struct ProximityEngine {
    config: EngineConfig,
    tracker: TrackerTable,
    stats: EngineStats,
}

impl ProximityEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracker: TrackerTable::new(config.tracking.clone()),
            config,
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> ClusterMode {
        self.config.mode
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn tracker(&self) -> &TrackerTable {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut TrackerTable {
        &mut self.tracker
    }

    pub fn tracked_count(&self) -> usize {
        self.tracker.len()
    }

    /// Process a frame at its own timestamp, or now if it carries none.
    pub fn process_frame(&mut self, frame: &FrameRecord) -> Option<FrameReport> {
        let now_ms = frame.timestamp_ms().unwrap_or_else(now_epoch_ms);
        self.process_frame_at(frame, now_ms)
    }

    /// Process a frame as of `now_ms`.
    ///
    /// Returns `None` when no detection survives normalization; the frame
    /// is then ignored entirely and tracker state is left untouched.
    pub fn process_frame_at(&mut self, frame: &FrameRecord, now_ms: u64) -> Option<FrameReport> {
        let objects = normalize_detections(
            &frame.detections,
            &self.config.labels,
            self.config.min_confidence,
        );
        if objects.is_empty() {
            log::debug!("frame dropped: no usable detections");
            self.stats.frames_dropped += 1;
            return None;
        }
        self.stats.frames_processed += 1;

        let total_objects = objects.len();
        let candidates = match self.config.mode {
            ClusterMode::Crowd => objects.into_iter().map(Candidate::untracked).collect(),
            ClusterMode::Hotspot => self.parked_candidates(objects, now_ms),
        };

        let mut report = FrameReport {
            mode: self.config.mode,
            timestamp_ms: now_ms,
            source: frame.source.clone(),
            total_objects,
            candidates,
            pairs: Vec::new(),
            clusters: Vec::new(),
        };

        let settings = &self.config.clustering;
        if report.candidates.len() < settings.min_cluster_size {
            log::debug!(
                "{} of {} objects are candidates, below cluster size {}",
                report.candidates.len(),
                total_objects,
                settings.min_cluster_size
            );
            return Some(report);
        }

        let matrix = DistanceMatrix::from_objects(&report.candidates);
        report.pairs = proximity_pairs(&report.candidates, &matrix, settings);
        report.clusters = build_clusters(
            &report.candidates,
            &matrix,
            &report.pairs,
            settings,
            self.config.mode,
        );
        self.stats.clusters_found += report.clusters.len() as u64;

        log::debug!(
            "frame {}: {} objects, {} candidates, {} pairs, {} clusters",
            now_ms,
            total_objects,
            report.candidates.len(),
            report.pairs.len(),
            report.clusters.len()
        );
        Some(report)
    }

    fn parked_candidates(&mut self, objects: Vec<DetectedObject>, now_ms: u64) -> Vec<Candidate> {
        self.tracker.purge_stale(now_ms);

        let mut seen = HashSet::new();
        let mut parked = Vec::new();
        for object in objects {
            if !seen.insert(object.identity.clone()) {
                log::debug!(
                    "ignoring repeated identity {} within one frame",
                    object.identity
                );
                continue;
            }
            let state = self.tracker.observe(&object, now_ms);
            if state.is_parked {
                parked.push(Candidate {
                    stationary_frames: state.stationary_frames,
                    parked_duration_ms: state.parked_duration_ms(now_ms),
                    object,
                });
            }
        }
        parked
    }
}
