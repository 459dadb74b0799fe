//! Seismic sources: planar point-source grids and explicit rupture lists.
//!
//! A point source expands its magnitude-frequency distribution over nodal
//! planes and hypocentral depths into a dense grid of identical planar
//! ruptures — the context builder has a closed-form fast path for these.
//! Fault, multi-fault and non-parametric sources carry explicit rupture
//! lists and go through the general path.

use serde::{Deserialize, Serialize};
use tremor_core::pmf::Occurrence;
use tremor_core::{HazardError, Result};

use crate::geo::PlanarSurface;
use crate::mfd::Mfd;
use crate::rupture::Rupture;

/// A rupture orientation hypothesis with its weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodalPlane {
    /// Strike azimuth, decimal degrees.
    pub strike: f64,
    /// Dip angle, decimal degrees.
    pub dip: f64,
    /// Rake angle, decimal degrees.
    pub rake: f64,
}

/// A point source: seismicity concentrated at one location, expanded into
/// planar ruptures whose dimensions scale with magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointSource {
    /// Source longitude, decimal degrees.
    pub lon: f64,
    /// Source latitude, decimal degrees.
    pub lat: f64,
    /// Magnitude-frequency distribution.
    pub mfd: Mfd,
    /// Weighted nodal-plane distribution.
    pub nodal_planes: Vec<(f64, NodalPlane)>,
    /// Weighted hypocentral-depth distribution, km.
    pub hypo_depths: Vec<(f64, f64)>,
    /// Top of the seismogenic layer, km.
    pub upper_depth: f64,
    /// Bottom of the seismogenic layer, km.
    pub lower_depth: f64,
    /// Rupture length / width ratio.
    pub aspect_ratio: f64,
}

impl PointSource {
    /// Rupture area in km² from magnitude (generic moment scaling).
    fn area(mag: f64) -> f64 {
        10f64.powf(mag - 4.0)
    }

    /// Planar dimensions for one magnitude/plane, clipped to the
    /// seismogenic layer.
    fn dimensions(&self, mag: f64, dip: f64) -> (f64, f64) {
        let area = Self::area(mag);
        let mut width = (area / self.aspect_ratio).sqrt();
        let max_width = (self.lower_depth - self.upper_depth) / dip.to_radians().sin();
        if width > max_width {
            width = max_width;
        }
        let length = area / width;
        (length, width)
    }

    /// Expand into planar ruptures: one per (magnitude bin × nodal plane
    /// × hypocentral depth), rates scaled by the distribution weights.
    pub fn ruptures(&self) -> Vec<Rupture> {
        let mut out = Vec::new();
        for (mag, rate) in self.mfd.annual_rates() {
            for (np_weight, plane) in &self.nodal_planes {
                let (length, width) = self.dimensions(mag, plane.dip);
                for (hd_weight, depth) in &self.hypo_depths {
                    let half_vertical = width * plane.dip.to_radians().sin() / 2.0;
                    let ztor = (depth - half_vertical)
                        .clamp(self.upper_depth, (self.lower_depth - 2.0 * half_vertical).max(self.upper_depth));
                    let surface = PlanarSurface {
                        lon: self.lon,
                        lat: self.lat,
                        strike: plane.strike,
                        dip: plane.dip,
                        ztor,
                        length,
                        width,
                    };
                    let mut rup = Rupture::new(
                        mag,
                        plane.rake,
                        surface,
                        *depth,
                        Occurrence::Rate(rate * np_weight * hd_weight),
                    );
                    rup.hypo_lon = self.lon;
                    rup.hypo_lat = self.lat;
                    out.push(rup);
                }
            }
        }
        out
    }

    fn validate(&self) -> Result<()> {
        self.mfd.validate()?;
        for (label, weights) in [
            ("nodal plane", self.nodal_planes.iter().map(|(w, _)| *w).sum::<f64>()),
            ("hypo depth", self.hypo_depths.iter().map(|(w, _)| *w).sum::<f64>()),
        ] {
            if (weights - 1.0).abs() > 1e-6 {
                return Err(HazardError::Config(format!(
                    "{label} weights must sum to 1, got {weights}"
                )));
            }
        }
        if self.lower_depth <= self.upper_depth || self.aspect_ratio <= 0.0 {
            return Err(HazardError::Config("invalid point source geometry".into()));
        }
        Ok(())
    }
}

/// The two source shapes the context builder distinguishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceKind {
    /// Dense planar grid (area/point sources) — fast path.
    Point(PointSource),
    /// Explicit rupture list (fault, multi-fault, non-parametric) —
    /// general path.
    Ruptures(Vec<Rupture>),
}

/// A seismic source with its calculation-level bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Human-readable source id from the source model.
    pub source_id: String,
    /// Integer id used in context bookkeeping.
    pub src_id: u32,
    /// Tectonic region type label.
    pub trt: String,
    /// Global rupture-id offset: rupture `i` of this source gets id
    /// `rup_offset + i`, unique within the calculation.
    pub rup_offset: u64,
    /// The source shape.
    pub kind: SourceKind,
    /// Per-rupture weights for mutually exclusive ruptures. `None` means
    /// independent ruptures.
    pub rup_weights: Option<Vec<f64>>,
}

impl Source {
    /// Validate configuration invariants at setup time.
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            SourceKind::Point(p) => p.validate()?,
            SourceKind::Ruptures(rups) => {
                if rups.is_empty() {
                    return Err(HazardError::Config(format!(
                        "source {} has no ruptures",
                        self.source_id
                    )));
                }
            }
        }
        if let Some(weights) = &self.rup_weights {
            if weights.len() != self.count_ruptures() {
                return Err(HazardError::Config(format!(
                    "source {}: {} rupture weights for {} ruptures",
                    self.source_id,
                    weights.len(),
                    self.count_ruptures()
                )));
            }
            let total: f64 = weights.iter().sum();
            if (total - 1.0).abs() > 1e-6 {
                return Err(HazardError::Config(format!(
                    "source {}: rupture weights sum to {total}, expected 1",
                    self.source_id
                )));
            }
        }
        Ok(())
    }

    /// Materialize the rupture list.
    pub fn ruptures(&self) -> Vec<Rupture> {
        match &self.kind {
            SourceKind::Point(p) => p.ruptures(),
            SourceKind::Ruptures(rups) => rups.clone(),
        }
    }

    /// Number of ruptures without materializing them.
    pub fn count_ruptures(&self) -> usize {
        match &self.kind {
            SourceKind::Point(p) => {
                p.mfd.annual_rates().len() * p.nodal_planes.len() * p.hypo_depths.len()
            }
            SourceKind::Ruptures(rups) => rups.len(),
        }
    }

    /// Whether the fast planar-grid path applies.
    pub fn is_planar_grid(&self) -> bool {
        matches!(self.kind, SourceKind::Point(_))
    }

    /// Largest magnitude the source can produce.
    pub fn max_mag(&self) -> f64 {
        match &self.kind {
            SourceKind::Point(p) => p.mfd.max_mag(),
            SourceKind::Ruptures(rups) => {
                rups.iter().map(|r| r.mag).fold(f64::NEG_INFINITY, f64::max)
            }
        }
    }

    /// Representative location for coarse distance filtering.
    pub fn centroid(&self) -> (f64, f64) {
        match &self.kind {
            SourceKind::Point(p) => (p.lon, p.lat),
            SourceKind::Ruptures(rups) => {
                let n = rups.len() as f64;
                let lon = rups.iter().map(|r| r.surface.lon).sum::<f64>() / n;
                let lat = rups.iter().map(|r| r.surface.lat).sum::<f64>() / n;
                (lon, lat)
            }
        }
    }

    /// Upper bound on the horizontal extent of any rupture from the
    /// centroid, km. Added to the integration distance when filtering.
    pub fn radius_km(&self) -> f64 {
        match &self.kind {
            SourceKind::Point(p) => {
                let (length, width) = p.dimensions(p.mfd.max_mag(), 45.0);
                length.hypot(width) / 2.0
            }
            SourceKind::Ruptures(rups) => {
                let (clon, clat) = self.centroid();
                rups.iter()
                    .map(|r| {
                        crate::geo::horizontal_distance_km(clon, clat, r.surface.lon, r.surface.lat)
                            + r.surface.length.hypot(r.surface.width) / 2.0
                    })
                    .fold(0.0, f64::max)
            }
        }
    }
}
