//! Great-circle distance for the waste bank finder

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// `"850m"` below one kilometre, `"3.2km"` otherwise
pub fn distance_text(km: f64) -> String {
    if km < 1.0 {
        format!("{}m", (km * 1000.0).round() as i64)
    } else {
        format!("{:.1}km", km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(haversine_km(-6.2, 106.8, -6.2, 106.8), 0.0);
    }

    #[test]
    fn test_known_distance() {
        // Jakarta (Monas) to Bandung (Gedung Sate), roughly 119 km
        let d = haversine_km(-6.1754, 106.8272, -6.9025, 107.6188);
        assert!((d - 119.0).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_one_degree_latitude() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_distance_text() {
        assert_eq!(distance_text(0.4567), "457m");
        assert_eq!(distance_text(0.0), "0m");
        assert_eq!(distance_text(1.0), "1.0km");
        assert_eq!(distance_text(12.345), "12.3km");
    }
}
