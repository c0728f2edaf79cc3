//! Field zones and their map geometry

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::types::GeoPoint;

/// Mean earth radius (IUGG), metres
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Zone geometry as drawn on the map: a single marker or a polygon outline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "coordinates", rename_all = "lowercase")]
pub enum Coordinates {
    Point(GeoPoint),
    Polygon(Vec<GeoPoint>),
}

impl Coordinates {
    /// Validate ranges and, for polygons, the number of distinct vertices
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Coordinates::Point(p) => p.validate(),
            Coordinates::Polygon(points) => {
                for p in points {
                    p.validate()?;
                }
                let distinct = distinct_vertices(points);
                if distinct.len() < 3 {
                    return Err(DomainError::InvalidCoordinates(format!(
                        "polygon needs at least 3 distinct vertices, got {}",
                        distinct.len()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Area in square metres, rounded to 2 decimals. Points have no area.
    pub fn area_m2(&self) -> Option<Decimal> {
        match self {
            Coordinates::Point(_) => None,
            Coordinates::Polygon(points) => {
                let area = polygon_area_m2(points);
                Decimal::from_f64(area).map(|d| d.round_dp(2))
            }
        }
    }

    /// Centre of the geometry, used to place the zone label on the map
    pub fn centroid(&self) -> GeoPoint {
        match self {
            Coordinates::Point(p) => *p,
            Coordinates::Polygon(points) => {
                let distinct = distinct_vertices(points);
                if distinct.is_empty() {
                    return GeoPoint::new(0.0, 0.0);
                }
                let n = distinct.len() as f64;
                let lat = distinct.iter().map(|p| p.lat).sum::<f64>() / n;
                let lng = distinct.iter().map(|p| p.lng).sum::<f64>() / n;
                GeoPoint::new(lat, lng)
            }
        }
    }
}

/// Vertices in order with repeats (including a closing vertex) dropped
fn distinct_vertices(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut out: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for p in points {
        if out.iter().any(|q| q == p) {
            continue;
        }
        out.push(*p);
    }
    out
}

/// Geodesic polygon area on a sphere using the spherical-excess form of the
/// shoelace formula. Vertices may be given in either winding order.
pub fn polygon_area_m2(points: &[GeoPoint]) -> f64 {
    let ring = distinct_vertices(points);
    if ring.len() < 3 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let d_lng = (b.lng - a.lng).to_radians();
        total += d_lng * (2.0 + a.lat.to_radians().sin() + b.lat.to_radians().sin());
    }

    (total * EARTH_MEAN_RADIUS_M * EARTH_MEAN_RADIUS_M / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side_deg: f64) -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, side_deg),
            GeoPoint::new(side_deg, side_deg),
            GeoPoint::new(side_deg, 0.0),
        ]
    }

    #[test]
    fn test_point_has_no_area() {
        let c = Coordinates::Point(GeoPoint::new(4.6, -74.0));
        assert!(c.validate().is_ok());
        assert_eq!(c.area_m2(), None);
    }

    #[test]
    fn test_polygon_needs_three_vertices() {
        let c = Coordinates::Polygon(vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 2.0),
            GeoPoint::new(1.0, 1.0),
        ]);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_small_square_area() {
        // 0.001 degrees at the equator is about 111.2 m per side
        let area = polygon_area_m2(&square(0.001));
        assert!((area - 12_364.0).abs() < 50.0, "area was {}", area);
    }

    #[test]
    fn test_winding_order_does_not_matter() {
        let mut reversed = square(0.01);
        reversed.reverse();
        let a = polygon_area_m2(&square(0.01));
        let b = polygon_area_m2(&reversed);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_closed_ring_counts_once() {
        let mut closed = square(0.01);
        closed.push(closed[0]);
        assert!((polygon_area_m2(&closed) - polygon_area_m2(&square(0.01))).abs() < 1e-6);
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"{"type":"polygon","coordinates":[{"lat":1.0,"lng":2.0},{"lat":1.5,"lng":2.0},{"lat":1.5,"lng":2.5}]}"#;
        let c: Coordinates = serde_json::from_str(json).unwrap();
        assert!(matches!(c, Coordinates::Polygon(ref v) if v.len() == 3));

        let point = Coordinates::Point(GeoPoint::new(4.0, -75.0));
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["type"], "point");
        assert_eq!(value["coordinates"]["lat"], 4.0);
    }
}
