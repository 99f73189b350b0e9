use super::GpsSample;

pub const EARTH_RADIUS_MILES: f64 = 3958.8;
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

const MS_PER_HOUR: f64 = 3_600_000.0;

fn haversine(a: &GpsSample, b: &GpsSample, radius: f64) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points.
    let h = h.clamp(0.0, 1.0);

    radius * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Great-circle distance in miles.
pub fn calculate_distance(a: &GpsSample, b: &GpsSample) -> f64 {
    haversine(a, b, EARTH_RADIUS_MILES)
}

pub fn calculate_distance_meters(a: &GpsSample, b: &GpsSample) -> f64 {
    haversine(a, b, EARTH_RADIUS_METERS)
}

/// Speed between two fixes in miles per hour. Zero when `b` is not later
/// than `a`.
pub fn calculate_speed(a: &GpsSample, b: &GpsSample) -> f64 {
    if b.timestamp <= a.timestamp {
        return 0.0;
    }
    let elapsed_hours = (b.timestamp - a.timestamp) as f64 / MS_PER_HOUR;
    calculate_distance(a, b) / elapsed_hours
}

/// Degrees of latitude spanning `distance` along a meridian, with `distance`
/// in the same unit as `radius`.
pub(crate) fn latitude_delta(distance: f64, radius: f64) -> f64 {
    (distance / radius).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latitude: f64, longitude: f64, timestamp: u64) -> GpsSample {
        GpsSample::new(latitude, longitude, timestamp)
    }

    #[test]
    fn distance_to_self_is_zero() {
        let a = sample(47.5809, 19.2489, 0);
        assert_eq!(0.0, calculate_distance(&a, &a));
        assert_eq!(0.0, calculate_distance_meters(&a, &a));
    }

    #[test]
    fn distance_is_non_negative_and_symmetric() {
        let points = [
            sample(0.0, 0.0, 0),
            sample(-33.8688, 151.2093, 0),
            sample(51.5074, -0.1278, 0),
            sample(89.9, 179.9, 0),
            sample(-89.9, -179.9, 0),
        ];
        for a in &points {
            for b in &points {
                let forward = calculate_distance(a, b);
                assert!(forward >= 0.0);
                assert!((forward - calculate_distance(b, a)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn one_degree_of_latitude() {
        let a = sample(0.0, 0.0, 0);
        let b = sample(1.0, 0.0, 0);
        let meters = calculate_distance_meters(&a, &b);
        assert!((meters - 111_194.9).abs() < 1.0, "got {}", meters);
    }

    #[test]
    fn mile_per_minute_is_sixty_mph() {
        let a = sample(40.0, -75.0, 1_000);
        let b = sample(40.0 + latitude_delta(1.0, EARTH_RADIUS_MILES), -75.0, 61_000);
        assert!((calculate_distance(&a, &b) - 1.0).abs() < 1e-9);
        assert!((calculate_speed(&a, &b) - 60.0).abs() < 1e-6);
    }

    #[test]
    fn speed_guard_on_non_increasing_time() {
        let a = sample(40.0, -75.0, 5_000);
        let b = sample(40.1, -75.0, 5_000);
        let c = sample(40.2, -75.0, 4_000);
        assert_eq!(0.0, calculate_speed(&a, &b));
        assert_eq!(0.0, calculate_speed(&a, &c));
    }
}
