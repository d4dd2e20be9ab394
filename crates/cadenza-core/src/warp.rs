//! Piecewise-linear source ↔ target time mapping.
//!
//! A [`WarpMap`] is built from a clip's marker list plus two implicit
//! endpoints: the clip start (source 0 → target 0) and the clip's natural end.
//! Between points the map is linear; outside them it extrapolates at the
//! boundary segment's slope. Both axes are strictly increasing, so the map is
//! invertible everywhere.

use crate::{MarkerError, Result, WarpMarker};
use serde::{Deserialize, Serialize};

/// Slopes within this distance of 1.0 count as unwarped.
const UNIT_SLOPE_EPSILON: f64 = 1e-9;

/// A validated anchor point of the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpPoint {
    pub source: f64,
    pub target: f64,
}

/// One linear piece between two consecutive points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpSegment {
    pub start: WarpPoint,
    pub end: WarpPoint,
}

impl WarpSegment {
    /// `Δtarget / Δsource`. 0.5 plays the segment twice as fast.
    #[inline]
    pub fn slope(&self) -> f64 {
        (self.end.target - self.start.target) / (self.end.source - self.start.source)
    }

    #[inline]
    fn overlaps_source(&self, from: f64, to: f64) -> bool {
        self.start.source < to && self.end.source > from
    }
}

/// Immutable, strictly monotonic warp map for one clip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarpMap {
    points: Vec<WarpPoint>,
    clip_duration: f64,
}

/// Check a marker list without building the map.
pub fn validate_markers(markers: &[WarpMarker], clip_duration: f64) -> Result<()> {
    WarpMap::build(markers, clip_duration).map(|_| ())
}

impl WarpMap {
    /// Validate `markers` against a clip of `clip_duration` seconds and build the map.
    ///
    /// Markers must already be sorted by source time; an unsorted list is
    /// rejected rather than re-sorted. Exact duplicates collapse to one point.
    pub fn build(markers: &[WarpMarker], clip_duration: f64) -> Result<Self> {
        Self::build_points(markers, clip_duration).map_err(|err| {
            tracing::debug!(markers = markers.len(), clip_duration, %err, "rejected warp markers");
            err
        })
    }

    fn build_points(markers: &[WarpMarker], clip_duration: f64) -> Result<Self> {
        if !clip_duration.is_finite() || clip_duration <= 0.0 {
            return Err(MarkerError::InvalidClipDuration(clip_duration).into());
        }

        let mut points: Vec<WarpPoint> = Vec::with_capacity(markers.len() + 2);
        let mut previous: Option<(usize, &WarpMarker)> = None;

        for (index, marker) in markers.iter().enumerate() {
            let (source, target) = (marker.source_time, marker.target_time);
            if !source.is_finite() || !target.is_finite() {
                return Err(MarkerError::NonFinite { index }.into());
            }
            if source < 0.0 || target < 0.0 {
                return Err(MarkerError::NegativeTime {
                    index,
                    source_time: source,
                    target_time: target,
                }
                .into());
            }
            if source > clip_duration {
                return Err(MarkerError::OutOfClip {
                    index,
                    source_time: source,
                    clip_duration,
                }
                .into());
            }

            if let Some((prev_index, prev)) = previous {
                if source < prev.source_time {
                    return Err(MarkerError::Unsorted {
                        index,
                        source_time: source,
                        previous: prev.source_time,
                    }
                    .into());
                }
                if target < prev.target_time {
                    return Err(MarkerError::NonMonotonicTarget {
                        index,
                        target_time: target,
                        previous: prev.target_time,
                    }
                    .into());
                }
                let same_source = source == prev.source_time;
                let same_target = target == prev.target_time;
                match (same_source, same_target) {
                    (true, true) => continue,
                    (true, false) => {
                        return Err(MarkerError::AmbiguousSource {
                            first: prev_index,
                            second: index,
                            source_time: source,
                        }
                        .into());
                    }
                    (false, true) => {
                        return Err(MarkerError::CollapsedTarget {
                            first: prev_index,
                            second: index,
                            target_time: target,
                        }
                        .into());
                    }
                    (false, false) => {}
                }
            } else if source > 0.0 && target == 0.0 {
                return Err(MarkerError::CollapsedOrigin {
                    index,
                    source_time: source,
                }
                .into());
            }

            points.push(WarpPoint { source, target });
            previous = Some((index, marker));
        }

        if points.first().map_or(true, |first| first.source > 0.0) {
            points.insert(
                0,
                WarpPoint {
                    source: 0.0,
                    target: 0.0,
                },
            );
        }

        if let Some(&last) = points.last() {
            if last.source < clip_duration {
                let slope = match points.len() {
                    1 => 1.0,
                    n => WarpSegment {
                        start: points[n - 2],
                        end: last,
                    }
                    .slope(),
                };
                points.push(WarpPoint {
                    source: clip_duration,
                    target: last.target + (clip_duration - last.source) * slope,
                });
            }
        }

        Ok(Self {
            points,
            clip_duration,
        })
    }

    /// Unwarped 1:1 map for a clip of `clip_duration` seconds.
    pub fn identity(clip_duration: f64) -> Result<Self> {
        Self::build(&[], clip_duration)
    }

    /// Map a source time to the edited timeline.
    pub fn to_target(&self, source: f64) -> f64 {
        let segment = self.segment_for_source(source);
        segment.start.target + (source - segment.start.source) * segment.slope()
    }

    /// Map a timeline time back into the source audio.
    pub fn to_source(&self, target: f64) -> f64 {
        let segment = self.segment_for_target(target);
        segment.start.source + (target - segment.start.target) / segment.slope()
    }

    /// Local slope of the map at `source`.
    pub fn stretch_ratio_at(&self, source: f64) -> f64 {
        self.segment_for_source(source).slope()
    }

    pub fn points(&self) -> &[WarpPoint] {
        &self.points
    }

    pub fn clip_duration(&self) -> f64 {
        self.clip_duration
    }

    /// Timeline length of the whole clip.
    pub fn target_duration(&self) -> f64 {
        self.to_target(self.clip_duration)
    }

    pub fn segments(&self) -> impl Iterator<Item = WarpSegment> + '_ {
        self.points.windows(2).map(|w| WarpSegment {
            start: w[0],
            end: w[1],
        })
    }

    /// True when every point lies on `target == source`.
    pub fn is_identity(&self) -> bool {
        self.points
            .iter()
            .all(|p| (p.target - p.source).abs() <= UNIT_SLOPE_EPSILON)
    }

    /// True when every segment touching the source range `[from, to]` has slope 1.
    pub fn is_unit_slope_between(&self, from: f64, to: f64) -> bool {
        self.slopes_between(from, to)
            .all(|slope| (slope - 1.0).abs() <= UNIT_SLOPE_EPSILON)
    }

    pub fn max_stretch_ratio_between(&self, from: f64, to: f64) -> f64 {
        self.slopes_between(from, to).fold(f64::MIN, f64::max)
    }

    pub fn min_stretch_ratio_between(&self, from: f64, to: f64) -> f64 {
        self.slopes_between(from, to).fold(f64::MAX, f64::min)
    }

    /// Slopes of segments overlapping `[from, to]`, including extrapolated ends.
    fn slopes_between(&self, from: f64, to: f64) -> impl Iterator<Item = f64> + '_ {
        let last = self.points.len() - 2;
        let lead = (from < 0.0).then(|| self.stretch_ratio_at(from));
        let tail = (to > self.clip_duration).then(|| self.stretch_ratio_at(to));
        let inner = self.segments().enumerate().filter_map(move |(i, s)| {
            let touches = s.overlaps_source(from, to)
                || (from == to && s.start.source <= from && (from < s.end.source || i == last));
            touches.then(|| s.slope())
        });
        lead.into_iter().chain(inner).chain(tail)
    }

    fn segment_for_source(&self, source: f64) -> WarpSegment {
        let idx = self.points.partition_point(|p| p.source <= source);
        self.segment_at(idx)
    }

    fn segment_for_target(&self, target: f64) -> WarpSegment {
        let idx = self.points.partition_point(|p| p.target <= target);
        self.segment_at(idx)
    }

    /// Segment ending at point `idx`, clamped so queries outside the map use the boundary segment.
    #[inline]
    fn segment_at(&self, idx: usize) -> WarpSegment {
        let i = idx.saturating_sub(1).min(self.points.len() - 2);
        WarpSegment {
            start: self.points[i],
            end: self.points[i + 1],
        }
    }
}
