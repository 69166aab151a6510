//! Pixel-bucket downsampling.
//!
//! [`reduce`] maps a series of `N` samples onto `W` pixel columns. With
//! `spp = N / W` samples per pixel, column `x` covers the source window
//!
//! ```text
//! start  = floor(x * spp)
//! length = min(spp, N - start)
//! end    = floor(start + length - 1),  raised to start + 1 if <= start
//! ```
//!
//! and emits the mean of `series[start..end)`. `start` is an integer, so both
//! bounds reduce to integer division and are exact for any `N` and `W`. When
//! `N < W` consecutive columns can land on the same window; only the first of
//! them emits a bucket.

use climagraph_core::{Sample, Timestamp};
use serde::Serialize;

/// Inclusive value interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Smallest range containing every value, or `None` for no values.
    pub fn of<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| match acc {
            None => Some(Self::new(v, v)),
            Some(range) => Some(Self::new(range.min.min(v), range.max.max(v))),
        })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Caller-supplied bounds. Either side may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KnownBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl KnownBounds {
    /// No bounds known: everything is computed from the data.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// One aggregated output point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownsampleBucket {
    /// Output column.
    pub pixel_x: usize,
    /// Arithmetic mean of the source values in this column.
    pub mean_value: f64,
    /// Timestamps of the source samples, in order.
    pub source_timestamps: Vec<Timestamp>,
}

/// Output of [`reduce`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reduction {
    /// Width the reduction was computed for.
    pub pixel_width: usize,
    /// Buckets in ascending `pixel_x` order.
    pub buckets: Vec<DownsampleBucket>,
    /// Known bounds where supplied, otherwise the raw min/max of the input.
    /// `None` for an empty series.
    pub value_range: Option<ValueRange>,
    /// Min/max of the bucket means when no bounds were supplied, otherwise
    /// the supplied bounds completed from `value_range`. `None` when there
    /// is nothing to measure.
    pub observed: Option<ValueRange>,
    /// Columns skipped because their window repeated the previous one.
    pub collapsed: usize,
}

impl Reduction {
    /// Columns that emitted no bucket.
    pub fn collapsed_columns(&self) -> usize {
        self.collapsed
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Source window `[start, end)` for column `x`.
fn column_window(x: usize, len: usize, pixel_width: usize) -> (usize, usize) {
    let start = x * len / pixel_width;
    let length = (len / pixel_width).min(len - start);
    let end = (start + length).saturating_sub(1);
    if start >= end {
        (start, (start + 1).min(len))
    } else {
        (start, end)
    }
}

fn mean(window: &[Sample]) -> f64 {
    window.iter().map(|s| s.v).sum::<f64>() / window.len() as f64
}

/// Reduce `series` to at most `pixel_width` buckets.
///
/// An empty series or a zero width yields no buckets.
pub fn reduce(series: &[Sample], pixel_width: usize, known: KnownBounds) -> Reduction {
    let value_range = if series.is_empty() {
        None
    } else {
        match (known.min, known.max) {
            (Some(min), Some(max)) => Some(ValueRange::new(min, max)),
            (min, max) => ValueRange::of(series.iter().map(|s| s.v)).map(|raw| {
                ValueRange::new(min.unwrap_or(raw.min), max.unwrap_or(raw.max))
            }),
        }
    };

    let mut buckets = Vec::new();
    let mut collapsed = 0;
    if pixel_width > 0 && !series.is_empty() {
        let len = series.len();
        let mut previous = None;

        for x in 0..pixel_width {
            let window = column_window(x, len, pixel_width);
            if previous == Some(window) {
                collapsed += 1;
                continue;
            }
            previous = Some(window);

            let (start, end) = window;
            let samples = &series[start..end];
            buckets.push(DownsampleBucket {
                pixel_x: x,
                mean_value: mean(samples),
                source_timestamps: samples.iter().map(|s| s.t).collect(),
            });
        }
    }

    let observed = if known.is_empty() {
        ValueRange::of(buckets.iter().map(|b| b.mean_value))
    } else {
        value_range
    };

    Reduction {
        pixel_width,
        buckets,
        value_range,
        observed,
        collapsed,
    }
}
