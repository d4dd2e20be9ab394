//! Sample-domain time maps driving the stretchers.

/// Monotonic mapping between input sample positions and output sample
/// positions. Output position 0 is the first sample of the rendered range.
pub trait TimeMap: Sync {
    /// Output position of input position `source_pos`.
    fn to_output(&self, source_pos: f64) -> f64;

    /// Input position of output position `output_pos`.
    fn to_source(&self, output_pos: f64) -> f64;

    /// Largest local `d output / d input` over the mapped range.
    fn max_ratio(&self) -> f64;
}

/// Constant-ratio map: `output = (source - source_offset) × ratio`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformMap {
    ratio: f64,
    source_offset: f64,
}

impl UniformMap {
    /// `ratio > 1` lengthens, `ratio < 1` shortens.
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            source_offset: 0.0,
        }
    }

    pub fn with_offset(mut self, source_offset: f64) -> Self {
        self.source_offset = source_offset;
        self
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl TimeMap for UniformMap {
    fn to_output(&self, source_pos: f64) -> f64 {
        (source_pos - self.source_offset) * self.ratio
    }

    fn to_source(&self, output_pos: f64) -> f64 {
        output_pos / self.ratio + self.source_offset
    }

    fn max_ratio(&self) -> f64 {
        self.ratio
    }
}
