use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::core::error::DetectionLoadError;
use crate::core::geometry::Rectangle;

/// Location of a detection as reported by an engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Region {
    Points(Vec<[f64; 2]>),
    Coords(Vec<f64>),
    /// Anything else, including `null`. Never yields a rectangle.
    Other(Value),
}

impl Default for Region {
    fn default() -> Self {
        Region::Other(Value::Null)
    }
}

impl Region {
    pub fn to_rectangle(&self) -> Option<Rectangle> {
        match self {
            Region::Points(points) => Rectangle::from_points(points),
            Region::Coords(coords) => Rectangle::from_coords(coords),
            Region::Other(_) => None,
        }
    }
}

impl From<Rectangle> for Region {
    fn from(rect: Rectangle) -> Self {
        Region::Coords(vec![rect.x1, rect.y1, rect.x2, rect.y2])
    }
}

/// One word- or line-level detection from a recognition engine.
///
/// Missing or mistyped fields still deserialize: the region falls back to
/// [`Region::Other`], text to empty, confidence to NaN. The normalizer then
/// drops the detection with a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDetection {
    #[serde(rename = "box", alias = "bbox", alias = "quad", default)]
    pub region: Region,
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
    #[serde(default = "missing_confidence", deserialize_with = "lenient_confidence")]
    pub confidence: f64,
}

impl RawDetection {
    pub fn new(region: impl Into<Region>, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            region: region.into(),
            text: text.into(),
            confidence,
        }
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}

fn lenient_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .unwrap_or_else(missing_confidence))
}

fn missing_confidence() -> f64 {
    f64::NAN
}

/// Reads one engine's detections from a JSON array.
///
/// Only an unreadable file or a document that is not an array is an error.
/// Elements that are not detection objects are skipped with a warning.
pub fn load_detections(path: &Path) -> Result<Vec<RawDetection>, DetectionLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| DetectionLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let elements: Vec<Value> =
        serde_json::from_str(&raw).map_err(|source| DetectionLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value(element) {
            Ok(detection) => Some(detection),
            Err(e) => {
                warn!(path = %path.display(), index, error = %e, "skipping detection");
                None
            }
        })
        .collect())
}
