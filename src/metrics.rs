use serde::{ Deserialize, Serialize };

use crate::location::{ calculate_distance, calculate_speed, GpsSample };

pub const ZERO_TO_SIXTY_MPH: f64 = 60.0;
pub const QUARTER_MILE: f64 = 0.25;

/// Performance figures derived from a route. Times are in seconds, speeds in
/// miles per hour and distances in miles. Unreached milestones stay at 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub zero_to_sixty: f64,
    pub quarter_mile: f64,
    /// Estimated as twice the quarter mile, not measured.
    pub half_mile: f64,
    pub top_speed: f64,
    /// Mean of the per-segment speeds, not distance over time.
    pub average_speed: f64,
    pub total_distance: f64,
    pub lap_times: Vec<f64>,
}

fn elapsed_seconds(from: &GpsSample, to: &GpsSample) -> f64 {
    to.timestamp.saturating_sub(from.timestamp) as f64 / 1000.0
}

/// Derives metrics from an ordered route. `lap_markers` are externally
/// supplied lap boundaries (ms timestamps); nothing here infers laps.
///
/// Pure: the same route and markers always give the same result.
pub fn compute(route: &[GpsSample], lap_markers: &[u64]) -> PerformanceMetrics {
    if route.len() < 2 {
        return PerformanceMetrics::default();
    }

    let first = &route[0];
    let mut metrics = PerformanceMetrics::default();
    let mut speed_sum = 0.0;
    let mut zero_to_sixty = None;
    let mut quarter_mile = None;

    for pair in route.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let speed = calculate_speed(a, b);

        metrics.total_distance += calculate_distance(a, b);
        speed_sum += speed;
        if speed > metrics.top_speed {
            metrics.top_speed = speed;
        }

        if zero_to_sixty.is_none() && speed >= ZERO_TO_SIXTY_MPH {
            zero_to_sixty = Some(elapsed_seconds(first, b));
        }
        if quarter_mile.is_none() && metrics.total_distance >= QUARTER_MILE {
            quarter_mile = Some(elapsed_seconds(first, b));
        }
    }

    metrics.average_speed = speed_sum / (route.len() - 1) as f64;
    metrics.zero_to_sixty = zero_to_sixty.unwrap_or(0.0);
    metrics.quarter_mile = quarter_mile.unwrap_or(0.0);
    metrics.half_mile = 2.0 * metrics.quarter_mile;
    metrics.lap_times = lap_times(route, lap_markers);

    metrics
}

/// Successive differences between lap boundaries, starting at the first
/// fix. Markers outside the route window or not after the previous boundary
/// are ignored.
fn lap_times(route: &[GpsSample], lap_markers: &[u64]) -> Vec<f64> {
    let (first, last) = match (route.first(), route.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return vec![],
    };

    let mut previous = first;
    let mut laps = vec![];
    for &marker in lap_markers {
        if marker <= previous || marker > last {
            continue;
        }
        laps.push((marker - previous) as f64 / 1000.0);
        previous = marker;
    }
    laps
}
