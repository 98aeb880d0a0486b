use std::collections::VecDeque;

use crate::detect::Point;

/// Everything remembered about one identity across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObjectState {
    pub identity: String,
    /// Recent centers, oldest first.
    pub history: VecDeque<Point>,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    /// Consecutive frames with movement within the stationary threshold.
    pub stationary_frames: u32,
    pub is_parked: bool,
}

impl TrackedObjectState {
    pub fn new(identity: &str, center: Point, now_ms: u64) -> Self {
        let mut history = VecDeque::new();
        history.push_back(center);
        Self {
            identity: identity.to_string(),
            history,
            first_seen_ms: now_ms,
            last_seen_ms: now_ms,
            stationary_frames: 0,
            is_parked: false,
        }
    }

    pub fn last_center(&self) -> Option<Point> {
        self.history.back().copied()
    }

    /// Time since first sighting.
    pub fn parked_duration_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.first_seen_ms)
    }

    pub(crate) fn push_center(&mut self, center: Point, capacity: usize) {
        self.history.push_back(center);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }
}
