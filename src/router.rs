//! One engine per source stream.
//!
//! Tracker state must never mix frames from different cameras, so frames
//! are routed by source key to their own [`ProximityEngine`], created on
//! first sight from a shared configuration template.

use anyhow::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::engine::{EngineStats, ProximityEngine};
use crate::frame::FrameRecord;
use crate::report::FrameReport;
use crate::transport::source_key;

pub const DEFAULT_MAX_SOURCES: usize = 64;

#[derive(Debug)]
pub struct EngineRouter {
    template: EngineConfig,
    engines: HashMap<String, ProximityEngine>,
    max_sources: usize,
    rejected_frames: u64,
}

impl EngineRouter {
    pub fn new(template: EngineConfig, max_sources: usize) -> Result<Self> {
        template.validate()?;
        Ok(Self {
            template,
            engines: HashMap::new(),
            max_sources: max_sources.max(1),
            rejected_frames: 0,
        })
    }

    pub fn template(&self) -> &EngineConfig {
        &self.template
    }

    pub fn source_count(&self) -> usize {
        self.engines.len()
    }

    pub fn engine(&self, key: &str) -> Option<&ProximityEngine> {
        self.engines.get(key)
    }

    /// Frames refused because the source limit was reached.
    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames
    }

    /// Counters summed over every source.
    pub fn totals(&self) -> EngineStats {
        self.engines
            .values()
            .map(ProximityEngine::stats)
            .fold(EngineStats::default(), |mut acc, s| {
                acc.frames_processed += s.frames_processed;
                acc.frames_dropped += s.frames_dropped;
                acc.clusters_found += s.clusters_found;
                acc
            })
    }

    /// Route a frame that arrived on `topic` and process it.
    ///
    /// Returns the source key alongside the report so callers can derive
    /// output topics. `Ok(None)` means the frame was dropped, either by the
    /// engine or because a new source would exceed the limit.
    pub fn process(
        &mut self,
        topic: &str,
        frame: &FrameRecord,
    ) -> Result<Option<(String, FrameReport)>> {
        let key = source_key(frame.source.as_deref(), topic);
        let at_limit = self.engines.len() >= self.max_sources;
        let engine = match self.engines.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if at_limit {
                    self.rejected_frames += 1;
                    log::warn!(
                        "source limit {} reached; ignoring frame from {}",
                        self.max_sources,
                        key
                    );
                    return Ok(None);
                }
                log::info!("new source {} ({} mode)", key, self.template.mode);
                entry.insert(ProximityEngine::new(self.template.clone())?)
            }
        };
        Ok(engine.process_frame(frame).map(|report| (key, report)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawDetection;

    fn frame(source: Option<&str>, ts: u64) -> FrameRecord {
        let frame = FrameRecord::new(vec![RawDetection::sized(
            "a", "car", 0.0, 0.0, 40.0, 20.0,
        )])
        .with_timestamp(ts);
        match source {
            Some(source) => frame.with_source(source),
            None => frame,
        }
    }

    #[test]
    fn sources_get_separate_trackers() {
        let mut router = EngineRouter::new(EngineConfig::hotspot(), 8).unwrap();
        router.process("t", &frame(Some("cam1"), 0)).unwrap();
        router.process("t", &frame(Some("cam1"), 100)).unwrap();
        router.process("t", &frame(Some("cam2"), 100)).unwrap();

        assert_eq!(router.source_count(), 2);
        let cam1 = router.engine("cam1").unwrap().tracker().get("a").unwrap();
        let cam2 = router.engine("cam2").unwrap().tracker().get("a").unwrap();
        assert_eq!(cam1.stationary_frames, 1);
        assert_eq!(cam2.stationary_frames, 0);
        assert_eq!(router.totals().frames_processed, 3);
    }

    #[test]
    fn topic_is_fallback_key() {
        let mut router = EngineRouter::new(EngineConfig::crowd(), 8).unwrap();
        let (key, _) = router
            .process("vision/detections/gate", &frame(None, 0))
            .unwrap()
            .unwrap();
        assert_eq!(key, "vision/detections/gate");
    }

    #[test]
    fn source_limit_is_enforced() {
        let mut router = EngineRouter::new(EngineConfig::crowd(), 1).unwrap();
        assert!(router.process("t", &frame(Some("a"), 0)).unwrap().is_some());
        assert!(router.process("t", &frame(Some("b"), 0)).unwrap().is_none());
        assert!(router.process("t", &frame(Some("a"), 1)).unwrap().is_some());
        assert_eq!(router.rejected_frames(), 1);
        assert_eq!(router.source_count(), 1);
    }
}
