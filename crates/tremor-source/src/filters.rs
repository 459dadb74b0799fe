//! Magnitude-dependent integration distance and the source-site filter.
//!
//! The filter is the only spatial pruning in the engine: given a source and
//! a site collection it returns the subset of sites within the source's
//! maximum influence distance, or `None` when no site is in range. A source
//! filtered down to nothing is a normal "no contribution" outcome, never an
//! error.

use serde::{Deserialize, Serialize};
use tremor_core::{HazardError, Result};

use crate::geo::horizontal_distance_km;
use crate::site::SiteCollection;
use crate::source::Source;

/// Maximum integration distance as a function of magnitude.
///
/// Piecewise-linear interpolation between (magnitude, distance) knots;
/// clamped at the end knots. Small-magnitude ruptures stop mattering at
/// much shorter distances than large ones, and cutting them early is the
/// main cost lever of a hazard calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationDistance {
    knots: Vec<(f64, f64)>,
}

impl IntegrationDistance {
    /// A constant cutoff, independent of magnitude.
    pub fn constant(dist_km: f64) -> Self {
        Self {
            knots: vec![(0.0, dist_km)],
        }
    }

    /// Magnitude-dependent cutoff from (magnitude, distance) knots,
    /// sorted by magnitude.
    pub fn new(mut knots: Vec<(f64, f64)>) -> Result<Self> {
        if knots.is_empty() {
            return Err(HazardError::Config("empty integration distance".into()));
        }
        knots.sort_by(|a, b| a.0.total_cmp(&b.0));
        if knots.iter().any(|(_, d)| *d <= 0.0) {
            return Err(HazardError::Config(
                "integration distances must be positive".into(),
            ));
        }
        Ok(Self { knots })
    }

    /// The cutoff distance in km for a given magnitude.
    pub fn max_distance(&self, mag: f64) -> f64 {
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        if mag <= first.0 {
            return first.1;
        }
        if mag >= last.0 {
            return last.1;
        }
        for pair in self.knots.windows(2) {
            let (m0, d0) = pair[0];
            let (m1, d1) = pair[1];
            if mag <= m1 {
                let t = (mag - m0) / (m1 - m0);
                return d0 + t * (d1 - d0);
            }
        }
        last.1
    }
}

/// Filters site collections down to a source's influence radius.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    /// The magnitude-dependent cutoff.
    pub int_dist: IntegrationDistance,
}

impl SourceFilter {
    /// Build a filter around an integration distance.
    pub fn new(int_dist: IntegrationDistance) -> Self {
        Self { int_dist }
    }

    /// The sites within range of the source, or `None` if there are none.
    ///
    /// The cutoff uses the source's largest magnitude plus its horizontal
    /// extent, measured from the centroid — a conservative coarse filter;
    /// exact per-rupture cutoffs are applied later by the context builder.
    pub fn filter(&self, source: &Source, sites: &SiteCollection) -> Option<SiteCollection> {
        let (clon, clat) = source.centroid();
        let cutoff = self.int_dist.max_distance(source.max_mag()) + source.radius_km();
        let keep: Vec<usize> = (0..sites.len())
            .filter(|i| {
                horizontal_distance_km(clon, clat, sites.lon[*i], sites.lat[*i]) <= cutoff
            })
            .collect();
        if keep.is_empty() {
            tracing::debug!(
                source = %source.source_id,
                cutoff_km = cutoff,
                "no site within the integration distance"
            );
            None
        } else if keep.len() == sites.len() {
            Some(sites.clone())
        } else {
            Some(sites.take(&keep))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mfd::Mfd;
    use crate::source::{NodalPlane, PointSource, SourceKind};
    use crate::site::Site;

    fn point_source_at(lon: f64) -> Source {
        Source {
            source_id: "s".into(),
            src_id: 0,
            trt: "Active Shallow Crust".into(),
            rup_offset: 0,
            kind: SourceKind::Point(PointSource {
                lon,
                lat: 0.0,
                mfd: Mfd::Discretized {
                    min_mag: 6.0,
                    bin_width: 0.1,
                    rates: vec![0.01],
                },
                nodal_planes: vec![(1.0, NodalPlane { strike: 0.0, dip: 90.0, rake: 0.0 })],
                hypo_depths: vec![(1.0, 10.0)],
                upper_depth: 0.0,
                lower_depth: 20.0,
                aspect_ratio: 1.0,
            }),
            rup_weights: None,
        }
    }

    #[test]
    fn interpolates_between_knots() {
        let d = IntegrationDistance::new(vec![(5.0, 100.0), (7.0, 300.0)]).unwrap();
        assert_eq!(d.max_distance(4.0), 100.0);
        assert_eq!(d.max_distance(8.0), 300.0);
        assert!((d.max_distance(6.0) - 200.0).abs() < 1e-12);
    }

    #[test]
    fn constant_distance_ignores_magnitude() {
        let d = IntegrationDistance::constant(200.0);
        assert_eq!(d.max_distance(4.0), 200.0);
        assert_eq!(d.max_distance(9.0), 200.0);
    }

    #[test]
    fn far_source_filters_to_none() {
        let sites = SiteCollection::new(&[Site::rock(0.0, 0.0)]).unwrap();
        let filter = SourceFilter::new(IntegrationDistance::constant(50.0));
        // ~10 degrees away ≈ 1100 km
        assert!(filter.filter(&point_source_at(10.0), &sites).is_none());
        assert!(filter.filter(&point_source_at(0.1), &sites).is_some());
    }

    #[test]
    fn filter_keeps_in_range_sids() {
        let sites = SiteCollection::new(&[
            Site::rock(0.0, 0.0),
            Site::rock(5.0, 0.0),
            Site::rock(0.2, 0.0),
        ])
        .unwrap();
        let filter = SourceFilter::new(IntegrationDistance::constant(100.0));
        let kept = filter.filter(&point_source_at(0.0), &sites).unwrap();
        assert_eq!(kept.sids, vec![0, 2]);
    }

    #[test]
    fn empty_knots_rejected() {
        assert!(IntegrationDistance::new(vec![]).is_err());
        assert!(IntegrationDistance::new(vec![(5.0, -1.0)]).is_err());
    }
}
