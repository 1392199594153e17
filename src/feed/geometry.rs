//! GeoRSS geometries and great-circle distances.
//!
//! All coordinates are `(latitude, longitude)` in decimal degrees and all
//! distances are kilometres.

use std::fmt;

/// Mean earth radius used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// The geometry kinds a feed entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Polygon,
}

/// A single location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Haversine distance to `other` in kilometres.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// A closed ring of points.
///
/// GeoRSS polygons repeat the first vertex at the end; the closing vertex is
/// kept as received and ignored where it would skew a calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Vertices without the repeated closing vertex.
    fn open_ring(&self) -> &[Point] {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 && first == last => {
                &self.points[..self.points.len() - 1]
            }
            _ => &self.points,
        }
    }

    /// Vertex average, or `None` for an empty polygon.
    pub fn centroid(&self) -> Option<Point> {
        let ring = self.open_ring();
        if ring.is_empty() {
            return None;
        }
        let n = ring.len() as f64;
        let (lat, lon) = ring
            .iter()
            .fold((0.0, 0.0), |(lat, lon), p| (lat + p.latitude, lon + p.longitude));
        Some(Point::new(lat / n, lon / n))
    }

    /// Ray-casting containment test in the lat/lon plane.
    pub fn contains(&self, point: &Point) -> bool {
        let ring = self.open_ring();
        if ring.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (pi, pj) = (&ring[i], &ring[j]);
            if (pi.latitude > point.latitude) != (pj.latitude > point.latitude) {
                let crossing = (pj.longitude - pi.longitude) * (point.latitude - pi.latitude)
                    / (pj.latitude - pi.latitude)
                    + pi.longitude;
                if point.longitude < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Distance from `point` to this polygon: zero inside, otherwise the
    /// distance to the closest edge.
    pub fn distance_to(&self, point: &Point) -> Option<f64> {
        let ring = self.open_ring();
        match ring.len() {
            0 => return None,
            1 => return Some(ring[0].distance_to(point)),
            _ => {}
        }
        if self.contains(point) {
            return Some(0.0);
        }

        let mut best: Option<f64> = None;
        for (i, a) in ring.iter().enumerate() {
            let b = &ring[(i + 1) % ring.len()];
            let d = closest_point_on_segment(point, a, b).distance_to(point);
            best = Some(best.map_or(d, |current| current.min(d)));
        }
        best
    }
}

/// Projects `p` onto segment `a`-`b` in the lat/lon plane.
fn closest_point_on_segment(p: &Point, a: &Point, b: &Point) -> Point {
    let dx = b.longitude - a.longitude;
    let dy = b.latitude - a.latitude;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return *a;
    }
    let t = (((p.longitude - a.longitude) * dx + (p.latitude - a.latitude) * dy) / len_sq)
        .clamp(0.0, 1.0);
    Point::new(a.latitude + t * dy, a.longitude + t * dx)
}

/// A geometry attached to a feed item.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Polygon(Polygon),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// The representative location: the point itself or the polygon centroid.
    pub fn location(&self) -> Option<Point> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Polygon(poly) => poly.centroid(),
        }
    }

    pub fn distance_to(&self, home: &Point) -> Option<f64> {
        match self {
            Geometry::Point(p) => Some(p.distance_to(home)),
            Geometry::Polygon(poly) => poly.distance_to(home),
        }
    }
}
