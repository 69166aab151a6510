//! Half-open range filtering over sorted series.
//!
//! Every tier answers range queries through this function (or an equivalent
//! that applies the same bounds), so a query gives the same samples no matter
//! which tier served it: `from` inclusive, `to` exclusive.

use crate::{DateRange, Sample, Series};

/// Return the samples of `series` that fall inside `range`.
///
/// A full range returns an independent copy of the whole series, so the
/// caller can never reach back into a cached entry through the result.
pub fn filter(series: &[Sample], range: &DateRange) -> Series {
    if range.is_full() {
        return series.to_vec();
    }

    series
        .iter()
        .filter(|sample| range.contains(sample.t))
        .copied()
        .collect()
}
