//! Planar rupture geometry and closed-form distance measures.
//!
//! All surfaces are planar rectangles described by a top-edge center,
//! strike, dip, top depth and along-strike/down-dip extents. Distances are
//! computed by projecting sites into the surface's local frame (x along
//! strike, y along the dip direction, hanging wall at positive y) on a
//! locally flat earth. No spatial indexing happens here: callers are
//! expected to have distance-filtered their site collections already.

use serde::{Deserialize, Serialize};

/// Kilometers per degree of latitude (mean Earth radius arc).
pub const KM_PER_DEG: f64 = 111.195;

/// Horizontal offset in km from (`lon0`, `lat0`) to (`lon`, `lat`) as an
/// (east, north) pair, on a locally flat earth.
pub fn horizontal_offset_km(lon0: f64, lat0: f64, lon: f64, lat: f64) -> (f64, f64) {
    let east = (lon - lon0) * KM_PER_DEG * lat0.to_radians().cos();
    let north = (lat - lat0) * KM_PER_DEG;
    (east, north)
}

/// Horizontal distance in km between two lon/lat points.
pub fn horizontal_distance_km(lon0: f64, lat0: f64, lon: f64, lat: f64) -> f64 {
    let (e, n) = horizontal_offset_km(lon0, lat0, lon, lat);
    e.hypot(n)
}

/// The scalar distance bundle for one (surface, site) pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDistances {
    /// Closest distance to the rupture plane, km.
    pub rrup: f64,
    /// Distance to the surface projection, km.
    pub rjb: f64,
    /// Signed perpendicular distance to the extended top edge, km
    /// (positive on the hanging-wall side).
    pub rx: f64,
    /// Distance off the rupture ends measured parallel to strike, km.
    pub ry0: f64,
    /// Longitude of the closest point on the rupture surface.
    pub clon: f64,
    /// Latitude of the closest point on the rupture surface.
    pub clat: f64,
}

/// A planar rupture rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarSurface {
    /// Longitude of the top-edge center.
    pub lon: f64,
    /// Latitude of the top-edge center.
    pub lat: f64,
    /// Strike azimuth in decimal degrees.
    pub strike: f64,
    /// Dip angle in decimal degrees, (0, 90].
    pub dip: f64,
    /// Depth to the top edge, km.
    pub ztor: f64,
    /// Along-strike length, km.
    pub length: f64,
    /// Down-dip width, km.
    pub width: f64,
}

impl PlanarSurface {
    /// Depth to the bottom edge, km.
    pub fn zbot(&self) -> f64 {
        self.ztor + self.width * self.dip.to_radians().sin()
    }

    /// Site position in the local frame: x along strike, y along the dip
    /// direction (hanging wall positive).
    fn local_xy(&self, site_lon: f64, site_lat: f64) -> (f64, f64) {
        let (east, north) = horizontal_offset_km(self.lon, self.lat, site_lon, site_lat);
        let strike_rad = self.strike.to_radians();
        // along-strike unit vector (east, north) for azimuth θ is (sin θ, cos θ);
        // the dip direction is θ + 90°.
        let x = east * strike_rad.sin() + north * strike_rad.cos();
        let y = east * strike_rad.cos() - north * strike_rad.sin();
        (x, y)
    }

    /// All scalar distance measures for one site.
    pub fn distances_to(&self, site_lon: f64, site_lat: f64) -> SurfaceDistances {
        let (x, y) = self.local_xy(site_lon, site_lat);
        let dip_rad = self.dip.to_radians();
        let half_len = self.length / 2.0;
        // horizontal extent of the dipping plane from the top edge
        let proj_width = self.width * dip_rad.cos();

        let ry0 = (x.abs() - half_len).max(0.0);
        let rx = y;

        let dy_out = if y < 0.0 {
            -y
        } else {
            (y - proj_width).max(0.0)
        };
        let rjb = ry0.hypot(dy_out);

        // cross-section: distance from (y, 0) to the segment
        // (0, ztor) → (proj_width, zbot), then combine with the
        // along-strike overshoot.
        let (cy, cz) = closest_on_segment(
            (0.0, self.ztor),
            (proj_width, self.zbot()),
            (y, 0.0),
        );
        let d_section = (y - cy).hypot(cz);
        let rrup = d_section.hypot(ry0);

        // closest point on the surface, back in geographic coordinates
        let cx = x.clamp(-half_len, half_len);
        let strike_rad = self.strike.to_radians();
        let east = cx * strike_rad.sin() + cy * strike_rad.cos();
        let north = cx * strike_rad.cos() - cy * strike_rad.sin();
        let clat = self.lat + north / KM_PER_DEG;
        let clon = self.lon + east / (KM_PER_DEG * self.lat.to_radians().cos());

        SurfaceDistances {
            rrup,
            rjb,
            rx,
            ry0,
            clon,
            clat,
        }
    }
}

/// Closest point on the segment a→b to point p, all in a 2-D plane.
fn closest_on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> (f64, f64) {
    let (ax, ay) = a;
    let (bx, by) = b;
    let (px, py) = p;
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return a;
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    (ax + t * dx, ay + t * dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_surface() -> PlanarSurface {
        // north-striking vertical plane through the origin, 10 km long,
        // from 0 to 10 km depth
        PlanarSurface {
            lon: 0.0,
            lat: 0.0,
            strike: 0.0,
            dip: 90.0,
            ztor: 0.0,
            length: 10.0,
            width: 10.0,
        }
    }

    #[test]
    fn site_beside_vertical_plane() {
        let s = vertical_surface();
        // site 1 degree east, on the perpendicular bisector
        let d = s.distances_to(1.0, 0.0);
        let expect = KM_PER_DEG; // cos(0) = 1
        assert!((d.rjb - expect).abs() < 1e-6, "rjb {}", d.rjb);
        assert!((d.rrup - expect).abs() < 1e-6);
        assert!((d.rx - expect).abs() < 1e-6);
        assert_eq!(d.ry0, 0.0);
    }

    #[test]
    fn site_off_the_end_has_positive_ry0() {
        let s = vertical_surface();
        // site due north, past the end of the 10 km trace
        let d = s.distances_to(0.0, 0.5);
        let dist = 0.5 * KM_PER_DEG;
        assert!((d.ry0 - (dist - 5.0)).abs() < 1e-6);
        assert!((d.rjb - d.ry0).abs() < 1e-6);
    }

    #[test]
    fn footwall_site_has_negative_rx() {
        let s = PlanarSurface {
            dip: 45.0,
            ..vertical_surface()
        };
        let d = s.distances_to(-0.2, 0.0);
        assert!(d.rx < 0.0);
        // footwall rjb is measured from the top edge
        assert!((d.rjb - 0.2 * KM_PER_DEG).abs() < 1e-6);
    }

    #[test]
    fn hanging_wall_site_over_dipping_plane_has_zero_rjb() {
        let s = PlanarSurface {
            dip: 30.0,
            ztor: 5.0,
            ..vertical_surface()
        };
        // 30° dip, width 10 → horizontal extent ≈ 8.66 km; a site 5 km
        // out on the hanging wall sits over the surface projection
        let lon = 5.0 / KM_PER_DEG;
        let d = s.distances_to(lon, 0.0);
        assert_eq!(d.rjb, 0.0);
        assert!(d.rrup >= s.ztor * 0.5);
        assert!(d.rrup < s.zbot());
    }

    #[test]
    fn rrup_reaches_ztor_directly_above_top_edge() {
        let s = PlanarSurface {
            ztor: 3.0,
            ..vertical_surface()
        };
        let d = s.distances_to(0.0, 0.0);
        assert!((d.rrup - 3.0).abs() < 1e-9);
        assert_eq!(d.rjb, 0.0);
    }

    #[test]
    fn closest_point_is_on_the_trace() {
        let s = vertical_surface();
        let d = s.distances_to(0.3, 0.2);
        // vertical plane: closest point longitude is the trace longitude
        assert!(d.clon.abs() < 1e-9);
        assert!((d.clat - 0.2 * KM_PER_DEG / KM_PER_DEG).abs() < 0.05);
    }

    #[test]
    fn zbot_follows_dip() {
        let s = PlanarSurface {
            dip: 30.0,
            ztor: 2.0,
            ..vertical_surface()
        };
        assert!((s.zbot() - (2.0 + 10.0 * 0.5)).abs() < 1e-12);
    }
}
