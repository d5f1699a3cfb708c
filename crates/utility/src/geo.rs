pub const EARTH_RADIUS_KM: f64 = 6371.0;

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / std::f64::consts::PI
}

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_distance(
    latitude_1: f64,
    longitude_1: f64,
    latitude_2: f64,
    longitude_2: f64,
) -> f64 {
    let lat1_rad = to_radians(latitude_1);
    let lon1_rad = to_radians(longitude_1);
    let lat2_rad = to_radians(latitude_2);
    let lon2_rad = to_radians(longitude_2);

    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Whether a point lies within `radius_km` of a reference coordinate.
pub fn within_radius(
    latitude_1: f64,
    longitude_1: f64,
    latitude_2: f64,
    longitude_2: f64,
    radius_km: f64,
) -> bool {
    haversine_distance(latitude_1, longitude_1, latitude_2, longitude_2) <= radius_km
}

/// Rectangular bounding box around a coordinate, usable as a cheap
/// pre-filter before exact distance checks at database level.
pub fn calculate_bounding_box(
    lat: f64,
    lon: f64,
    radius_km: f64,
) -> ((f64, f64), (f64, f64)) {
    let lat_rad = to_radians(lat);
    let lon_rad = to_radians(lon);

    let min_lat = lat_rad - radius_km / EARTH_RADIUS_KM;
    let max_lat = lat_rad + radius_km / EARTH_RADIUS_KM;

    // longitude bounds shrink with latitude
    let min_lon = lon_rad - radius_km / (EARTH_RADIUS_KM * lat_rad.cos());
    let max_lon = lon_rad + radius_km / (EARTH_RADIUS_KM * lat_rad.cos());

    (
        (to_degrees(min_lat), to_degrees(min_lon)),
        (to_degrees(max_lat), to_degrees(max_lon)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert!(haversine_distance(54.32, 10.12, 54.32, 10.12) < 1e-9);
    }

    #[test]
    fn known_distance_kiel_to_raisdorf() {
        // Kiel Hbf to Raisdorf is roughly 8 km as the crow flies.
        let d = haversine_distance(54.3146, 10.1320, 54.2803, 10.2441);
        assert!(d > 7.5 && d < 9.0, "unexpected distance {d}");
    }

    #[test]
    fn radius_check_matches_distance() {
        // ~600 m apart: 0.0054 degrees of latitude.
        let (lat, lon) = (54.32, 10.12);
        let far = lat + 0.0054;
        assert!(!within_radius(lat, lon, far, lon, 0.5));
        // ~400 m apart.
        let near = lat + 0.0036;
        assert!(within_radius(lat, lon, near, lon, 0.5));
    }

    #[test]
    fn bounding_box_contains_points_within_radius() {
        let (lat, lon) = (54.32, 10.12);
        let ((min_lat, min_lon), (max_lat, max_lon)) =
            calculate_bounding_box(lat, lon, 0.5);

        assert!(min_lat < lat && lat < max_lat);
        assert!(min_lon < lon && lon < max_lon);
        // a point ~400 m north still falls inside the box
        assert!(lat + 0.0036 < max_lat);
    }
}
