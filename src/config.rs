//! Engine configuration: mode presets, optional config file, env overrides.
//!
//! Resolution order is preset for the selected mode, then the config file
//! named by `CLUSTER_CONFIG` (JSON, or TOML when the path ends in `.toml`),
//! then individual `CLUSTER_*` environment variables, then validation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::LabelFilter;

const DEFAULT_LABELS: [&str; 4] = ["car", "truck", "bus", "motorcycle"];
const DEFAULT_OVERLAP_CROWD: f64 = 0.3;
const DEFAULT_OVERLAP_HOTSPOT: f64 = 0.5;
const DEFAULT_STATIONARY_THRESHOLD_PX: f64 = 10.0;
const DEFAULT_REQUIRED_STATIONARY_FRAMES: u32 = 10;
const DEFAULT_HISTORY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Which clustering variant the engine runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// Every accepted object is a candidate; one summary record per frame.
    #[default]
    Crowd,
    /// Only parked objects are candidates; one record per hotspot.
    Hotspot,
}

impl ClusterMode {
    /// Prefix of cluster identifiers produced in this mode.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Crowd => "crowd",
            Self::Hotspot => "hotspot",
        }
    }
}

impl FromStr for ClusterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "crowd" | "crowds" => Ok(Self::Crowd),
            "hotspot" | "hotspots" | "parked" => Ok(Self::Hotspot),
            other => Err(anyhow!(
                "unknown cluster mode '{}': expected 'crowd' or 'hotspot'",
                other
            )),
        }
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_prefix())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSettings {
    /// Maximum center distance (px) for two candidates to be linked.
    pub distance_threshold: f64,
    /// Smallest component reported as a cluster.
    pub min_cluster_size: usize,
    /// Pairs at or above this IoU are treated as duplicate detections.
    pub overlap_suppression_threshold: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackingSettings {
    /// Largest per-frame movement (px) that still counts as stationary.
    pub stationary_movement_threshold: f64,
    /// Consecutive stationary frames before an object is parked.
    pub required_stationary_frames: u32,
    /// Identities unseen for longer than this are forgotten.
    pub history_timeout: Duration,
    /// Centers retained per identity.
    pub history_capacity: usize,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            stationary_movement_threshold: DEFAULT_STATIONARY_THRESHOLD_PX,
            required_stationary_frames: DEFAULT_REQUIRED_STATIONARY_FRAMES,
            history_timeout: Duration::from_millis(DEFAULT_HISTORY_TIMEOUT_MS),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub mode: ClusterMode,
    pub labels: LabelFilter,
    pub min_confidence: f64,
    pub clustering: ClusterSettings,
    pub tracking: TrackingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::crowd()
    }
}

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    mode: Option<ClusterMode>,
    labels: Option<Vec<String>>,
    min_confidence: Option<f64>,
    clustering: Option<ClusteringConfigFile>,
    tracking: Option<TrackingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ClusteringConfigFile {
    distance_threshold: Option<f64>,
    min_cluster_size: Option<usize>,
    overlap_suppression_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    stationary_movement_threshold: Option<f64>,
    required_stationary_frames: Option<u32>,
    history_timeout_ms: Option<u64>,
    history_capacity: Option<usize>,
}

impl EngineConfig {
    /// Preset for crowd analytics over moving traffic.
    pub fn crowd() -> Self {
        Self {
            mode: ClusterMode::Crowd,
            labels: LabelFilter::new(DEFAULT_LABELS),
            min_confidence: 0.0,
            clustering: ClusterSettings {
                distance_threshold: 150.0,
                min_cluster_size: 3,
                overlap_suppression_threshold: DEFAULT_OVERLAP_CROWD,
            },
            tracking: TrackingSettings::default(),
        }
    }

    /// Preset for parked-vehicle hotspot detection.
    pub fn hotspot() -> Self {
        Self {
            mode: ClusterMode::Hotspot,
            labels: LabelFilter::new(DEFAULT_LABELS),
            min_confidence: 0.0,
            clustering: ClusterSettings {
                distance_threshold: 200.0,
                min_cluster_size: 2,
                overlap_suppression_threshold: DEFAULT_OVERLAP_HOTSPOT,
            },
            tracking: TrackingSettings::default(),
        }
    }

    pub fn for_mode(mode: ClusterMode) -> Self {
        match mode {
            ClusterMode::Crowd => Self::crowd(),
            ClusterMode::Hotspot => Self::hotspot(),
        }
    }

    /// Load from `CLUSTER_CONFIG` and `CLUSTER_*` overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`EngineConfig::load`], but an explicit `path` takes precedence
    /// over `CLUSTER_CONFIG`.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        Self::load_for(path, None)
    }

    /// Like [`EngineConfig::load_with`], with `mode` overriding both
    /// `CLUSTER_MODE` and the file. The preset for that mode is the base.
    pub fn load_for(path: Option<&Path>, mode: Option<ClusterMode>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CLUSTER_CONFIG").ok().map(PathBuf::from));
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => EngineConfigFile::default(),
        };

        let mode = match (mode, env_value("CLUSTER_MODE")) {
            (Some(mode), _) => mode,
            (None, Some(mode)) => mode.parse()?,
            (None, None) => file_cfg.mode.unwrap_or_default(),
        };
        let mut cfg = Self::for_mode(mode);
        cfg.apply_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_file(&mut self, file: EngineConfigFile) {
        if let Some(labels) = file.labels {
            self.labels = LabelFilter::new(labels);
        }
        if let Some(min_confidence) = file.min_confidence {
            self.min_confidence = min_confidence;
        }
        if let Some(clustering) = file.clustering {
            if let Some(v) = clustering.distance_threshold {
                self.clustering.distance_threshold = v;
            }
            if let Some(v) = clustering.min_cluster_size {
                self.clustering.min_cluster_size = v;
            }
            if let Some(v) = clustering.overlap_suppression_threshold {
                self.clustering.overlap_suppression_threshold = v;
            }
        }
        if let Some(tracking) = file.tracking {
            if let Some(v) = tracking.stationary_movement_threshold {
                self.tracking.stationary_movement_threshold = v;
            }
            if let Some(v) = tracking.required_stationary_frames {
                self.tracking.required_stationary_frames = v;
            }
            if let Some(v) = tracking.history_timeout_ms {
                self.tracking.history_timeout = Duration::from_millis(v);
            }
            if let Some(v) = tracking.history_capacity {
                self.tracking.history_capacity = v;
            }
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(labels) = env_value("CLUSTER_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.labels = LabelFilter::new(parsed);
            }
        }
        if let Some(v) = env_parse::<f64>("CLUSTER_MIN_CONFIDENCE", "a number")? {
            self.min_confidence = v;
        }
        if let Some(v) = env_parse::<f64>("CLUSTER_DISTANCE_THRESHOLD", "a number of pixels")? {
            self.clustering.distance_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("CLUSTER_MIN_SIZE", "an integer")? {
            self.clustering.min_cluster_size = v;
        }
        if let Some(v) = env_parse::<f64>("CLUSTER_OVERLAP_THRESHOLD", "a ratio")? {
            self.clustering.overlap_suppression_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("CLUSTER_STATIONARY_THRESHOLD", "a number of pixels")? {
            self.tracking.stationary_movement_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("CLUSTER_STATIONARY_FRAMES", "an integer")? {
            self.tracking.required_stationary_frames = v;
        }
        if let Some(v) = env_parse::<u64>("CLUSTER_HISTORY_TIMEOUT_MS", "milliseconds")? {
            self.tracking.history_timeout = Duration::from_millis(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let clustering = &self.clustering;
        if !(clustering.distance_threshold.is_finite() && clustering.distance_threshold > 0.0) {
            return Err(anyhow!("distance_threshold must be a positive number of pixels"));
        }
        if clustering.min_cluster_size < 2 {
            return Err(anyhow!("min_cluster_size must be at least 2"));
        }
        let overlap = clustering.overlap_suppression_threshold;
        if !(overlap > 0.0 && overlap <= 1.0) {
            return Err(anyhow!(
                "overlap_suppression_threshold must be in (0, 1], got {}",
                overlap
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!("min_confidence must be in [0, 1]"));
        }

        let tracking = &self.tracking;
        if !(tracking.stationary_movement_threshold.is_finite()
            && tracking.stationary_movement_threshold >= 0.0)
        {
            return Err(anyhow!("stationary_movement_threshold must not be negative"));
        }
        if tracking.required_stationary_frames == 0 {
            return Err(anyhow!("required_stationary_frames must be greater than zero"));
        }
        if tracking.history_timeout.is_zero() {
            return Err(anyhow!("history_timeout must be greater than zero"));
        }
        if tracking.history_capacity < 2 {
            return Err(anyhow!("history_capacity must be at least 2"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<EngineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env_value(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}, got '{}'", key, expected, raw)),
        None => Ok(None),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
