//! Warp markers.

use serde::{Deserialize, Serialize};

/// Role of a marker in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    #[default]
    Normal,
    Anchor,
    /// Placed by the beat quantizer.
    Tempo,
}

/// Pins a moment of the source audio (`source_time`) to a moment of the
/// edited timeline (`target_time`). Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpMarker {
    pub id: String,
    pub source_time: f64,
    pub target_time: f64,
    #[serde(default)]
    pub marker_type: MarkerType,
    #[serde(default)]
    pub is_anchor: bool,
}

impl WarpMarker {
    pub fn new(id: impl Into<String>, source_time: f64, target_time: f64) -> Self {
        Self {
            id: id.into(),
            source_time,
            target_time,
            marker_type: MarkerType::Normal,
            is_anchor: false,
        }
    }

    pub fn anchor(id: impl Into<String>, source_time: f64, target_time: f64) -> Self {
        Self {
            marker_type: MarkerType::Anchor,
            is_anchor: true,
            ..Self::new(id, source_time, target_time)
        }
    }

    pub fn tempo(id: impl Into<String>, source_time: f64, target_time: f64) -> Self {
        Self {
            marker_type: MarkerType::Tempo,
            ..Self::new(id, source_time, target_time)
        }
    }

    /// Offset applied by this marker, `target - source`.
    #[inline]
    pub fn displacement(&self) -> f64 {
        self.target_time - self.source_time
    }
}
