//! Building context batches from sources and filtered sites.
//!
//! `ctx_iter` walks a source's ruptures, computes the distance measures the
//! schema asks for, drops (rupture, site) pairs beyond the magnitude-
//! dependent integration distance, floors the remaining distances to the
//! configured minimum, and groups the surviving rows into one batch per
//! rounded magnitude. Batches that end up empty are never produced; a
//! source whose every rupture is out of range contributes nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;
use tremor_core::ctx::round_mag;
use tremor_core::{CtxArray, CtxRow, CtxSchema, DistanceKind, Result, RupParam};
use tremor_source::filters::IntegrationDistance;
use tremor_source::geo::{SurfaceDistances, horizontal_distance_km};
use tremor_source::rupture::Rupture;
use tremor_source::site::SiteCollection;
use tremor_source::source::Source;

/// Cached per-site distance bundles keyed by shared surface id.
///
/// Multi-fault sources emit many ruptures over few distinct surfaces; the
/// cache makes the surface geometry cost proportional to the number of
/// surfaces instead of the number of ruptures. Valid for one site
/// collection only, which is why `ctx_iter` owns a fresh cache per call.
#[derive(Debug, Default)]
pub struct DistCache {
    map: HashMap<u64, Arc<Vec<SurfaceDistances>>>,
    hits: usize,
}

impl DistCache {
    fn get_or_compute(&mut self, rup: &Rupture, sites: &SiteCollection) -> Arc<Vec<SurfaceDistances>> {
        let compute = || {
            Arc::new(
                sites
                    .lon
                    .iter()
                    .zip(&sites.lat)
                    .map(|(lon, lat)| rup.surface.distances_to(*lon, *lat))
                    .collect::<Vec<_>>(),
            )
        };
        match rup.surface_key {
            None => compute(),
            Some(key) => {
                if let Some(cached) = self.map.get(&key) {
                    self.hits += 1;
                    Arc::clone(cached)
                } else {
                    let fresh = compute();
                    let _ = self.map.insert(key, Arc::clone(&fresh));
                    fresh
                }
            }
        }
    }
}

/// Builds per-magnitude context batches for one tectonic-region group.
#[derive(Debug, Clone)]
pub struct CtxBuilder {
    schema: Arc<CtxSchema>,
    int_dist: IntegrationDistance,
    min_distance_km: f64,
    grp_id: u32,
}

impl CtxBuilder {
    pub fn new(
        schema: Arc<CtxSchema>,
        int_dist: IntegrationDistance,
        min_distance_km: f64,
        grp_id: u32,
    ) -> Self {
        Self {
            schema,
            int_dist,
            min_distance_km,
            grp_id,
        }
    }

    /// Context batches for a source against an already coarse-filtered
    /// site collection, one batch per rounded magnitude, ascending.
    ///
    /// Point sources take the planar fast path (distances recomputed per
    /// rupture, no caching); explicit rupture lists go through the
    /// distance cache keyed by shared surface.
    pub fn ctx_iter(&self, source: &Source, sites: &SiteCollection) -> Result<Vec<CtxArray>> {
        let site_cols: Vec<&[f64]> = self
            .schema
            .site
            .iter()
            .map(|p| sites.param(*p))
            .collect::<Result<_>>()?;

        let planar_grid = source.is_planar_grid();
        let mut cache = DistCache::default();
        let mut batches: BTreeMap<u64, CtxArray> = BTreeMap::new();
        let mut rup_vals = vec![0.0; self.schema.rup.len()];
        let mut dist_vals = vec![0.0; self.schema.dist.len()];

        for (index, rup) in source.ruptures().iter().enumerate() {
            let max_dist = self.int_dist.max_distance(rup.mag);
            let rup_id = source.rup_offset + index as u64;
            let distances = if planar_grid {
                // fast path: one closed-form pass over the whole grid
                Arc::new(
                    sites
                        .lon
                        .iter()
                        .zip(&sites.lat)
                        .map(|(lon, lat)| rup.surface.distances_to(*lon, *lat))
                        .collect::<Vec<_>>(),
                )
            } else {
                cache.get_or_compute(rup, sites)
            };

            for (p, slot) in self.schema.rup.iter().zip(&mut rup_vals) {
                *slot = rup_param(rup, *p);
            }

            let mag = round_mag(rup.mag);
            for (i, d) in distances.iter().enumerate() {
                if d.rrup > max_dist {
                    continue;
                }
                self.fill_dist_vals(rup, sites, i, d, &mut dist_vals);
                let batch = batches.entry(mag.to_bits()).or_insert_with(|| {
                    CtxArray::new(Arc::clone(&self.schema), self.grp_id)
                });
                let site_row: Vec<f64> = site_cols.iter().map(|col| col[i]).collect();
                batch.push(CtxRow {
                    mag,
                    occurrence: &rup.occurrence,
                    sid: sites.sids[i],
                    rup_id,
                    src_id: source.src_id,
                    rup_vals: &rup_vals,
                    site_vals: &site_row,
                    dist_vals: &dist_vals,
                })?;
            }
        }

        if cache.hits > 0 {
            debug!(
                source = %source.source_id,
                hits = cache.hits,
                surfaces = cache.map.len(),
                "distance cache reuse"
            );
        }
        Ok(batches.into_values().collect())
    }

    fn fill_dist_vals(
        &self,
        rup: &Rupture,
        sites: &SiteCollection,
        i: usize,
        d: &SurfaceDistances,
        out: &mut [f64],
    ) {
        let floor = self.min_distance_km;
        for (kind, slot) in self.schema.dist.iter().zip(out) {
            *slot = match kind {
                DistanceKind::Rrup => d.rrup.max(floor),
                DistanceKind::Rjb => d.rjb.max(floor),
                DistanceKind::Rx => d.rx,
                DistanceKind::Ry0 => d.ry0,
                DistanceKind::Repi => {
                    horizontal_distance_km(rup.hypo_lon, rup.hypo_lat, sites.lon[i], sites.lat[i])
                        .max(floor)
                }
                DistanceKind::Rhypo => {
                    let repi = horizontal_distance_km(
                        rup.hypo_lon,
                        rup.hypo_lat,
                        sites.lon[i],
                        sites.lat[i],
                    );
                    repi.hypot(rup.hypo_depth).max(floor)
                }
                DistanceKind::CloseLon => d.clon,
                DistanceKind::CloseLat => d.clat,
            };
        }
    }
}

fn rup_param(rup: &Rupture, p: RupParam) -> f64 {
    match p {
        RupParam::Strike => rup.surface.strike,
        RupParam::Dip => rup.surface.dip,
        RupParam::Rake => rup.rake,
        RupParam::Ztor => rup.surface.ztor,
        RupParam::Zbot => rup.surface.zbot(),
        RupParam::Width => rup.surface.width,
        RupParam::HypoLon => rup.hypo_lon,
        RupParam::HypoLat => rup.hypo_lat,
        RupParam::HypoDepth => rup.hypo_depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tremor_core::pmf::Occurrence;
    use tremor_core::{CtxSchema, DistanceKind, RupParam, SiteParam};
    use tremor_source::geo::PlanarSurface;
    use tremor_source::mfd::Mfd;
    use tremor_source::site::Site;
    use tremor_source::source::{NodalPlane, PointSource, SourceKind};

    fn schema() -> Arc<CtxSchema> {
        Arc::new(CtxSchema::from_unions(
            [RupParam::Rake, RupParam::Ztor],
            [SiteParam::Vs30],
            [DistanceKind::Rrup, DistanceKind::Rjb, DistanceKind::Rhypo],
        ))
    }

    fn builder(max_dist: f64, min_dist: f64) -> CtxBuilder {
        CtxBuilder::new(
            schema(),
            IntegrationDistance::constant(max_dist),
            min_dist,
            0,
        )
    }

    fn sites() -> SiteCollection {
        SiteCollection::new(&[
            Site::rock(0.1, 0.0),
            Site::rock(0.5, 0.0),
            Site::rock(3.0, 0.0),
        ])
        .unwrap()
    }

    fn surface() -> PlanarSurface {
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

    fn fault_source(rups: Vec<Rupture>) -> Source {
        Source {
            source_id: "flt".into(),
            src_id: 1,
            trt: "Active Shallow Crust".into(),
            rup_offset: 100,
            kind: SourceKind::Ruptures(rups),
            rup_weights: None,
        }
    }

    #[test]
    fn batches_group_by_rounded_magnitude() {
        let rups = vec![
            Rupture::new(6.0004, 0.0, surface(), 5.0, Occurrence::Rate(0.01)),
            Rupture::new(5.9996, 0.0, surface(), 5.0, Occurrence::Rate(0.02)),
            Rupture::new(6.5, 0.0, surface(), 5.0, Occurrence::Rate(0.001)),
        ];
        let batches = builder(500.0, 0.0)
            .ctx_iter(&fault_source(rups), &sites())
            .unwrap();
        assert_eq!(batches.len(), 2);
        // near-duplicate magnitudes share one batch of 2 rups × 3 sites
        assert_eq!(batches[0].mags()[0], 6.0);
        assert_eq!(batches[0].len(), 6);
        assert_eq!(batches[1].mags()[0], 6.5);
        assert_eq!(batches[1].len(), 3);
    }

    #[test]
    fn out_of_range_pairs_dropped_silently() {
        // ~55 km and ~330 km cut off by a 100 km integration distance
        let rups = vec![Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01))];
        let batches = builder(100.0, 0.0)
            .ctx_iter(&fault_source(rups), &sites())
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].sids(), &[0, 1]);
    }

    #[test]
    fn all_out_of_range_yields_no_batches() {
        let rups = vec![Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01))];
        let batches = builder(5.0, 0.0)
            .ctx_iter(&fault_source(rups), &sites())
            .unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn minimum_distance_floors_short_distances() {
        let rups = vec![Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01))];
        let batches = builder(500.0, 20.0)
            .ctx_iter(&fault_source(rups), &sites())
            .unwrap();
        let rrup = batches[0].dist_col(DistanceKind::Rrup).unwrap();
        assert!(rrup.iter().all(|d| *d >= 20.0));
        // the far site keeps its true distance
        assert!(rrup[2] > 300.0);
    }

    #[test]
    fn rupture_ids_carry_the_source_offset() {
        let rups = vec![
            Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01)),
            Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01)),
        ];
        let batches = builder(500.0, 0.0)
            .ctx_iter(&fault_source(rups), &sites())
            .unwrap();
        let ids = batches[0].rup_ids();
        assert!(ids.contains(&100));
        assert!(ids.contains(&101));
    }

    #[test]
    fn shared_surfaces_compute_distances_once() {
        let mut a = Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01));
        let mut b = Rupture::new(7.0, 0.0, surface(), 5.0, Occurrence::Rate(0.001));
        a.surface_key = Some(42);
        b.surface_key = Some(42);
        let sites = sites();
        let mut cache = DistCache::default();
        let first = cache.get_or_compute(&a, &sites);
        let second = cache.get_or_compute(&b, &sites);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits, 1);
    }

    #[test]
    fn point_source_takes_the_planar_path() {
        let src = Source {
            source_id: "pt".into(),
            src_id: 0,
            trt: "Active Shallow Crust".into(),
            rup_offset: 0,
            kind: SourceKind::Point(PointSource {
                lon: 0.0,
                lat: 0.0,
                mfd: Mfd::Discretized {
                    min_mag: 5.0,
                    bin_width: 0.5,
                    rates: vec![0.01, 0.001],
                },
                nodal_planes: vec![(1.0, NodalPlane { strike: 0.0, dip: 90.0, rake: 0.0 })],
                hypo_depths: vec![(1.0, 8.0)],
                upper_depth: 0.0,
                lower_depth: 20.0,
                aspect_ratio: 1.0,
            }),
            rup_weights: None,
        };
        let batches = builder(500.0, 0.0).ctx_iter(&src, &sites()).unwrap();
        assert_eq!(batches.len(), 2); // one per magnitude bin
        for batch in &batches {
            assert_eq!(batch.len(), 3);
        }
    }
}
