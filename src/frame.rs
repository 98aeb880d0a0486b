//! Frame envelope parsing.
//!
//! Detectors publish one JSON document per analysed frame. The envelope
//! carries frame metadata plus a list of raw detections whose bounding
//! boxes come in either corner form (`x_min,y_min,x_max,y_max`) or size
//! form (`x,y,width,height`). This module only deserializes; deciding
//! which detections are usable is the job of [`crate::detect`].

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::detect::BoundingBox;

/// One analysed frame as received from the messaging layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameRecord {
    /// Capture time in milliseconds since the epoch. Anything that is not
    /// a number (or a numeric string) is ignored and the wall clock is used.
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub timestamp: Option<f64>,

    /// Frame width in pixels. Informational only.
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub width: Option<f64>,

    /// Frame height in pixels. Informational only.
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub height: Option<f64>,

    /// Camera or stream name. One engine instance is kept per source.
    #[serde(default, alias = "camera", deserialize_with = "deserialize_name")]
    pub source: Option<String>,

    /// Unreadable entries are kept as empty placeholders so positions stay
    /// stable; the normalizer drops them.
    #[serde(alias = "objects", deserialize_with = "deserialize_detections")]
    pub detections: Vec<RawDetection>,
}

impl FrameRecord {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp = Some(timestamp_ms as f64);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Capture time, if the producer stamped one that makes sense.
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.timestamp
            .filter(|ts| ts.is_finite() && *ts >= 0.0)
            .map(|ts| ts as u64)
    }
}

/// A detection exactly as the detector reported it.
///
/// Every field is optional: incomplete detections are filtered by the
/// normalizer rather than failing the whole frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDetection {
    /// Tracking identity. Detectors emit either strings or integers.
    #[serde(
        default,
        alias = "identity",
        alias = "track_id",
        deserialize_with = "deserialize_name"
    )]
    pub id: Option<String>,

    #[serde(default, alias = "class")]
    pub label: Option<String>,

    #[serde(default, alias = "score")]
    pub confidence: Option<f64>,

    #[serde(default, alias = "box", alias = "bounding_box")]
    pub bbox: Option<RawBox>,
}

impl RawDetection {
    /// Detection with a size-form bounding box.
    pub fn sized(id: &str, label: &str, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Some(id.to_string()),
            label: Some(label.to_string()),
            confidence: Some(1.0),
            bbox: Some(RawBox {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                ..RawBox::default()
            }),
        }
    }

    /// Detection with a corner-form bounding box.
    pub fn cornered(id: &str, label: &str, x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            id: Some(id.to_string()),
            label: Some(label.to_string()),
            confidence: Some(1.0),
            bbox: Some(RawBox {
                x_min: Some(x_min),
                y_min: Some(y_min),
                x_max: Some(x_max),
                y_max: Some(y_max),
                ..RawBox::default()
            }),
        }
    }
}

/// Union of the two bounding-box layouts detectors emit.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawBox {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default, alias = "w")]
    pub width: Option<f64>,
    #[serde(default, alias = "h")]
    pub height: Option<f64>,
    #[serde(default, alias = "xmin")]
    pub x_min: Option<f64>,
    #[serde(default, alias = "ymin")]
    pub y_min: Option<f64>,
    #[serde(default, alias = "xmax")]
    pub x_max: Option<f64>,
    #[serde(default, alias = "ymax")]
    pub y_max: Option<f64>,
}

impl RawBox {
    /// Resolve the layout. Corner keys take precedence; absent numbers
    /// within the chosen layout count as 0. Returns `None` when no
    /// coordinate key is present at all.
    pub fn to_bounding_box(&self) -> Option<BoundingBox> {
        let has_corner = self.x_min.is_some()
            || self.y_min.is_some()
            || self.x_max.is_some()
            || self.y_max.is_some();
        if has_corner {
            return Some(BoundingBox::Corner {
                x_min: self.x_min.unwrap_or(0.0),
                y_min: self.y_min.unwrap_or(0.0),
                x_max: self.x_max.unwrap_or(0.0),
                y_max: self.y_max.unwrap_or(0.0),
            });
        }

        let has_size =
            self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some();
        if has_size {
            return Some(BoundingBox::Size {
                x: self.x.unwrap_or(0.0),
                y: self.y.unwrap_or(0.0),
                width: self.width.unwrap_or(0.0),
                height: self.height.unwrap_or(0.0),
            });
        }

        None
    }
}

fn deserialize_name<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn deserialize_detections<'de, D>(deserializer: D) -> std::result::Result<Vec<RawDetection>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(detections_from_values(values))
}

/// Convert detections one at a time so a single malformed entry cannot
/// take the rest of the frame down with it.
fn detections_from_values(values: Vec<Value>) -> Vec<RawDetection> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                log::debug!("dropping detection #{}: unreadable ({})", index, e);
                RawDetection::default()
            })
        })
        .collect()
}

/// Parse a frame envelope.
///
/// Accepts either a full envelope object or a bare array of detections.
/// Returns an error only when the payload is not JSON, is neither shape,
/// or the envelope fields themselves are unusable (no detection list).
/// Callers log the error and skip the frame.
pub fn parse_frame(payload: &[u8]) -> Result<FrameRecord> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| anyhow!("malformed frame envelope: {}", e))?;
    match value {
        Value::Object(_) => serde_json::from_value(value)
            .map_err(|e| anyhow!("malformed frame envelope: {}", e)),
        Value::Array(values) => Ok(FrameRecord::new(detections_from_values(values))),
        _ => Err(anyhow!(
            "malformed frame envelope: expected an object or an array of detections"
        )),
    }
}

/// Wall-clock time in milliseconds since the epoch.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
