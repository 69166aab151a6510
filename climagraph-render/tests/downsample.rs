//! Reduction and surface behaviour on realistic series.

use std::sync::Arc;

use climagraph_render::{reduce, KnownBounds, RenderSurface, ValueRange};
use climagraph_test_utils::fixtures::{day, daily, long_series};
use climagraph_test_utils::generators::arb_daily_series;
use proptest::prelude::*;

#[test]
fn test_century_of_days_fills_every_column() {
    let series = long_series(40_000);
    let reduction = reduce(&series, 1_280, KnownBounds::none());

    assert_eq!(reduction.buckets.len(), 1_280);
    assert_eq!(reduction.collapsed_columns(), 0);

    let covered: usize = reduction
        .buckets
        .iter()
        .map(|b| b.source_timestamps.len())
        .sum();
    assert!(covered <= series.len());
    assert_eq!(reduction.buckets[0].source_timestamps[0], series[0].t);
}

#[test]
fn test_mean_of_two_points() {
    let series = daily(day(1881, 1, 1), &[0.0, 10.0]);
    let reduction = reduce(&series, 2, KnownBounds::none());

    let points: Vec<(usize, f64)> = reduction
        .buckets
        .iter()
        .map(|b| (b.pixel_x, b.mean_value))
        .collect();
    assert_eq!(points, vec![(0, 0.0), (1, 10.0)]);
    assert_eq!(reduction.observed, Some(ValueRange::new(0.0, 10.0)));
}

#[test]
fn test_bucket_statistics_can_differ_from_raw() {
    // A single spike averaged with its neighbour.
    let series = daily(day(2003, 8, 1), &[20.0, 44.0, 21.0, 22.0, 23.0, 22.0]);
    let reduction = reduce(&series, 2, KnownBounds::none());

    assert_eq!(reduction.value_range, Some(ValueRange::new(20.0, 44.0)));
    let observed = reduction.observed.expect("buckets were emitted");
    assert!(observed.max < 44.0);
    assert_eq!(observed, ValueRange::new(22.5, 32.0));
}

#[tokio::test]
async fn test_resize_keeps_observed_bounds() {
    let surface = RenderSurface::new(2);
    let data = Arc::new(daily(day(1950, 1, 1), &[-10.0, 10.0, 0.0, 20.0]));

    assert!(surface.set_data(Arc::clone(&data)).applied().await);
    let first = surface.latest().expect("frame");
    assert_eq!(first.reduction.observed, Some(ValueRange::new(-10.0, 0.0)));

    assert!(surface.resize(4).applied().await);
    let resized = surface.latest().expect("frame");
    assert_eq!(resized.pixel_width, 4);
    // The raw range always comes from the data; only the mean bounds carry.
    assert_eq!(resized.reduction.value_range, Some(ValueRange::new(-10.0, 20.0)));
    assert_eq!(resized.reduction.observed, Some(ValueRange::new(-10.0, 0.0)));

    // New data drops the carried bounds: at width 4 every sample is a bucket.
    assert!(surface.set_data(data).applied().await);
    let fresh = surface.latest().expect("frame");
    assert_eq!(fresh.reduction.value_range, Some(ValueRange::new(-10.0, 20.0)));
    assert_eq!(fresh.reduction.observed, Some(ValueRange::new(-10.0, 20.0)));
}

#[tokio::test]
async fn test_last_request_wins_under_bursts() {
    let surface = RenderSurface::new(800);
    let mut rx = surface.subscribe();
    let series = Arc::new(long_series(20_000));

    let mut tickets = vec![surface.set_data(series)];
    for width in [400, 600, 1_000, 1_200] {
        tickets.push(surface.resize(width));
    }
    let last = tickets.pop().expect("last ticket");
    let last_generation = last.generation();

    assert!(last.applied().await);
    for ticket in tickets {
        assert!(!ticket.applied().await);
    }

    rx.changed().await.expect("surface alive");
    let frame = rx.borrow().clone().expect("frame");
    assert_eq!(frame.generation, last_generation);
    assert_eq!(frame.pixel_width, 1_200);
    assert_eq!(frame.reduction.buckets.len(), 1_200);
    assert_eq!(surface.generation(), last_generation);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: column count follows min(N, W) rules for gapped daily data.
    #[test]
    fn prop_column_count(series in arb_daily_series(600), width in 1usize..800) {
        let reduction = reduce(&series, width, KnownBounds::none());
        if series.is_empty() {
            prop_assert!(reduction.buckets.is_empty());
            prop_assert!(reduction.observed.is_none());
        } else if series.len() >= width {
            prop_assert_eq!(reduction.buckets.len(), width);
        } else {
            prop_assert!(reduction.buckets.len() <= series.len());
            // Every column either emits a bucket or repeats its neighbour.
            prop_assert_eq!(
                reduction.collapsed_columns() + reduction.buckets.len(),
                width
            );
            prop_assert!(reduction.collapsed_columns() >= width - series.len());
        }
    }
}
