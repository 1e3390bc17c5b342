//! # Geo Module - Geodesic Helpers
//!
//! Spherical-earth navigation math used by taxi and turn maneuvers: bearings
//! between points, forward projection along a bearing, great-circle distance
//! and signed turn angles. All headings are degrees true in `[0, 360)`,
//! distances are metres, and coordinates are degrees latitude/longitude.
//!
//! The sphere model is deliberate. The engine animates parameters over a few
//! kilometres of airport surface, where the spherical error is far below the
//! taxi-edge resolution.
//!
//! ## Example Usage
//! ```
//! use airtraffic_lib::geo::{self, GeoPoint};
//!
//! // Project a hold-short point 60 metres down the runway heading
//! let threshold = GeoPoint::new(32.0, 34.85);
//! let lineup = geo::point_at_distance(threshold, 90.0, 60.0);
//!
//! // The projection and the distance function agree
//! let measured = geo::distance_metres(threshold, lineup);
//! assert!((measured - 60.0).abs() < 0.1);
//!
//! // And the bearing back to the projection matches the heading
//! let bearing = geo::heading_from_points(threshold, lineup);
//! assert!((bearing - 90.0).abs() < 0.1);
//! ```
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for bearings, projection and turn arithmetic


use serde::{Deserialize, Serialize};

/// Mean earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate in degrees.
///
/// `GeoPoint` is the position type every ground structure shares: taxi-edge
/// endpoints, runway thresholds, parking stands and the aircraft location
/// itself. It implements `Copy` so closures can capture waypoints by value
/// without borrowing the structures they came from.
///
/// # Examples
/// ```
/// use airtraffic_lib::geo::GeoPoint;
///
/// let threshold = GeoPoint::new(32.0, 34.85);
/// assert_eq!(threshold.latitude, 32.0);
/// assert_eq!(threshold.longitude, 34.85);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north
    pub latitude: f64,
    /// Longitude in degrees, positive east
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a new coordinate from latitude and longitude in degrees.
    ///
    /// # Arguments
    ///
    /// * `latitude` - Degrees north of the equator, negative south
    /// * `longitude` - Degrees east of the prime meridian, negative west
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::geo::GeoPoint;
    /// let field = GeoPoint::new(32.0, 34.85);
    /// let antipodal = GeoPoint::new(-32.0, -145.15);
    /// assert!(field.latitude > 0.0 && antipodal.latitude < 0.0);
    /// ```
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

/// Normalizes a heading into `[0, 360)`.
///
/// Turn arithmetic routinely produces headings outside the compass range
/// (sums past north, negative differences); every value written back to an
/// aircraft attitude goes through this wrap first.
///
/// # Arguments
///
/// * `heading` - Any heading in degrees, unbounded in either direction
///
/// # Returns
///
/// The equivalent compass heading in `[0, 360)`.
///
/// # Examples
/// ```
/// # use airtraffic_lib::geo::normalize_heading;
/// assert_eq!(normalize_heading(360.0), 0.0);
/// assert_eq!(normalize_heading(-90.0), 270.0);
/// assert_eq!(normalize_heading(725.0), 5.0);
/// ```
pub fn normalize_heading(heading: f64) -> f64 {
    let wrapped = heading % 360.0;
    if wrapped < 0.0 { wrapped + 360.0 } else { wrapped }
}

/// Great-circle distance between two points in metres.
///
/// # Arguments
///
/// * `a` - First point
/// * `b` - Second point
///
/// # Returns
///
/// The arc length along the earth's surface between `a` and `b`, always
/// non-negative and symmetric in its arguments.
///
/// # Mathematical Background
///
/// Uses the haversine form:
///
/// ```text
/// h = sin²(Δφ/2) + cos(φ₁)·cos(φ₂)·sin²(Δλ/2)
/// d = 2·R·asin(√h)
/// ```
///
/// which stays numerically stable for the short distances that dominate
/// ground movement, where the plain spherical law of cosines loses
/// precision.
///
/// # Examples
/// ```
/// # use airtraffic_lib::geo::{distance_metres, GeoPoint};
/// // A quarter of the equator is a quarter circumference.
/// let d = distance_metres(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 90.0));
/// assert!((d - 10_007_543.0).abs() < 10.0);
///
/// // Coincident points are zero metres apart.
/// let p = GeoPoint::new(32.0, 34.85);
/// assert_eq!(distance_metres(p, p), 0.0);
/// ```
pub fn distance_metres(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial bearing from `a` to `b` in degrees true.
///
/// # Arguments
///
/// * `a` - Observer position
/// * `b` - Target position
///
/// # Returns
///
/// The forward azimuth at `a` of the great circle through `b`, normalized
/// into `[0, 360)`. The bearing of a point onto itself is indeterminate and
/// comes back as north.
///
/// # Mathematical Background
///
/// The standard forward-azimuth formula:
///
/// ```text
/// θ = atan2( sin(Δλ)·cos(φ₂),
///            cos(φ₁)·sin(φ₂) − sin(φ₁)·cos(φ₂)·cos(Δλ) )
/// ```
///
/// # Examples
/// ```
/// # use airtraffic_lib::geo::{heading_from_points, GeoPoint};
/// let origin = GeoPoint::new(0.0, 0.0);
/// let east = GeoPoint::new(0.0, 1.0);
/// assert!((heading_from_points(origin, east) - 90.0).abs() < 1e-9);
///
/// let north = GeoPoint::new(1.0, 0.0);
/// assert!(heading_from_points(origin, north).abs() < 1e-9);
/// ```
pub fn heading_from_points(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();
    normalize_heading(y.atan2(x).to_degrees())
}

/// Projects a point `distance` metres forward along `heading`.
///
/// This is the workhorse behind line-up geometry, arrival spawn positions
/// and dead-reckoned motion: anywhere the engine needs "the point N metres
/// that way".
///
/// # Arguments
///
/// * `from` - Starting position
/// * `heading` - Direction of travel in degrees true
/// * `distance` - Ground distance in metres
///
/// # Returns
///
/// The destination reached by travelling `distance` metres along the great
/// circle that leaves `from` on `heading`.
///
/// # Mathematical Background
///
/// The direct geodesic problem on a sphere:
///
/// ```text
/// φ₂ = asin( sin(φ₁)·cos(δ) + cos(φ₁)·sin(δ)·cos(θ) )
/// λ₂ = λ₁ + atan2( sin(θ)·sin(δ)·cos(φ₁), cos(δ) − sin(φ₁)·sin(φ₂) )
/// ```
///
/// where `δ = distance / R` is the angular distance travelled.
///
/// # Examples
/// ```
/// # use airtraffic_lib::geo::{distance_metres, point_at_distance, GeoPoint};
/// let threshold = GeoPoint::new(32.0, 34.85);
/// let rollout = point_at_distance(threshold, 90.0, 1500.0);
///
/// // Projection round-trips through the distance function.
/// assert!((distance_metres(threshold, rollout) - 1500.0).abs() < 0.1);
///
/// // Zero distance is the identity.
/// let same = point_at_distance(threshold, 45.0, 0.0);
/// assert!(distance_metres(threshold, same) < 1e-6);
/// ```
pub fn point_at_distance(from: GeoPoint, heading: f64, distance: f64) -> GeoPoint {
    let angular = distance / EARTH_RADIUS_M;
    let bearing = heading.to_radians();
    let lat = from.latitude.to_radians();
    let lon = from.longitude.to_radians();

    let new_lat = (lat.sin() * angular.cos() + lat.cos() * angular.sin() * bearing.cos()).asin();
    let new_lon = lon
        + (bearing.sin() * angular.sin() * lat.cos())
            .atan2(angular.cos() - lat.sin() * new_lat.sin());

    GeoPoint::new(new_lat.to_degrees(), new_lon.to_degrees())
}

/// Signed shortest turn from `from` to `to`, in degrees within `(-180, 180]`.
///
/// Positive values turn right, negative values turn left. This is the arc
/// the airborne-turn animation sweeps through, so a 350°-to-10° turn
/// reports +20 rather than -340.
///
/// # Arguments
///
/// * `from` - Current heading in degrees
/// * `to` - Target heading in degrees
///
/// # Returns
///
/// The smallest signed rotation that carries `from` onto `to`. An exact
/// reversal reports +180 so the result range stays half-open.
///
/// # Examples
/// ```
/// # use airtraffic_lib::geo::turn_degrees;
/// assert_eq!(turn_degrees(90.0, 120.0), 30.0);
/// assert_eq!(turn_degrees(120.0, 90.0), -30.0);
///
/// // The short way across north.
/// assert_eq!(turn_degrees(350.0, 10.0), 20.0);
/// assert_eq!(turn_degrees(10.0, 350.0), -20.0);
/// ```
pub fn turn_degrees(from: f64, to: f64) -> f64 {
    let mut delta = normalize_heading(to) - normalize_heading(from);
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Linear interpolation between two points at `progress` in `[0, 1]`.
///
/// Planar interpolation is exact enough for single taxi edges, and it lands
/// precisely on the far node at `progress = 1`, which the taxi maneuver
/// relies on.
///
/// # Arguments
///
/// * `a` - Position at `progress = 0`
/// * `b` - Position at `progress = 1`
/// * `progress` - Interpolation parameter, normally in `[0, 1]`
///
/// # Examples
/// ```
/// # use airtraffic_lib::geo::{lerp, GeoPoint};
/// let a = GeoPoint::new(32.0, 34.85);
/// let b = GeoPoint::new(32.01, 34.87);
///
/// assert_eq!(lerp(a, b, 0.0), a);
/// assert_eq!(lerp(a, b, 1.0), b);
///
/// let mid = lerp(a, b, 0.5);
/// assert!((mid.latitude - 32.005).abs() < 1e-12);
/// ```
pub fn lerp(a: GeoPoint, b: GeoPoint, progress: f64) -> GeoPoint {
    GeoPoint::new(
        a.latitude + (b.latitude - a.latitude) * progress,
        a.longitude + (b.longitude - a.longitude) * progress,
    )
}
