//! Partition/merge parallelism over sources.
//!
//! Each source of a group is processed into its own probability map on a
//! rayon worker, then the per-source maps merge into the group map.
//! Merging is commutative and associative (missing planes act as the
//! accumulation identity), so the only order sensitivity is floating-point
//! rounding in the plane products and sums.
//!
//! Heavy sources are dispatched first: a cheap sampled pass
//! ([`ContextMaker::estimate_weight`]) orders the work so the long poles
//! start early instead of straggling at the end.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};
use tremor_core::Result;
use tremor_ctx::{AccumMode, ContextMaker, MapArray};
use tremor_source::filters::SourceFilter;
use tremor_source::site::SiteCollection;

use crate::curves::{
    CmakerSequence, HazardCurves, SourceGroup, SourceStats, accumulate_source,
};
use crate::logic::{GsimLogicTree, RmapMaker};

/// Parallel variant of [`crate::curves::calc_hazard_curves`]: same
/// results up to floating-point rounding, sources fan out over the rayon
/// pool.
pub fn calc_hazard_curves_parallel(
    groups: &[SourceGroup],
    sites: &SiteCollection,
    makers: &CmakerSequence,
    tree: &GsimLogicTree,
    filter: &SourceFilter,
) -> Result<(HazardCurves, Vec<SourceStats>)> {
    let mut curves = HazardCurves::new(makers.num_levels());
    let mut stats = Vec::new();
    for group in groups {
        let maker = makers.get(group.grp_id)?;
        let rmap = RmapMaker::new(maker, tree)?;
        let (map, group_stats) = parallel_group_map(maker, group, sites, filter)?;
        for sid in map.sids().collect::<Vec<_>>() {
            if let Some(curve) = rmap.mean_curve(&map, sid) {
                curves.combine(sid, &curve);
            }
        }
        stats.extend(group_stats);
    }
    info!(
        groups = groups.len(),
        sites = curves.len(),
        "hazard curves computed (parallel)"
    );
    Ok((curves, stats))
}

/// One group's map, with its sources processed in parallel.
pub fn parallel_group_map(
    maker: &ContextMaker,
    group: &SourceGroup,
    sites: &SiteCollection,
    filter: &SourceFilter,
) -> Result<(MapArray, Vec<SourceStats>)> {
    group.validate()?;
    let mode = if group.rup_mutex || group.src_weights.is_some() {
        AccumMode::Sum
    } else {
        AccumMode::PneProduct
    };

    let estimates = group
        .sources
        .iter()
        .map(|s| maker.estimate_weight(s, sites, filter))
        .collect::<Result<Vec<f64>>>()?;
    let mut order: Vec<usize> = (0..group.sources.len()).collect();
    order.sort_by(|a, b| estimates[*b].total_cmp(&estimates[*a]));
    debug!(
        grp_id = group.grp_id,
        sources = order.len(),
        "dispatching sources by estimated weight"
    );

    let results = order
        .par_iter()
        .map(|&i| -> Result<(usize, MapArray, SourceStats)> {
            let source = &group.sources[i];
            let start = Instant::now();
            let mut local;
            let rows = match &group.src_weights {
                Some(weights) => {
                    let mut pne = maker.empty_map(AccumMode::PneProduct);
                    let rows =
                        accumulate_source(maker, group, source, &mut pne, sites, filter)?;
                    local = maker.empty_map(AccumMode::Sum);
                    for sid in pne.sids().collect::<Vec<_>>() {
                        if let Some(poes) = pne.poes(sid) {
                            local.plane_mut(sid).scaled_add(weights[i], &poes);
                        }
                    }
                    rows
                }
                None => {
                    local = maker.empty_map(mode);
                    accumulate_source(maker, group, source, &mut local, sites, filter)?
                }
            };
            let stats = SourceStats {
                source_id: source.source_id.clone(),
                grp_id: group.grp_id,
                rows,
                weight: (rows * maker.num_branches()) as f64,
                elapsed: start.elapsed(),
            };
            Ok((i, local, stats))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut map = maker.empty_map(mode);
    let mut stats: Vec<Option<SourceStats>> = vec![None; group.sources.len()];
    for (i, local, s) in results {
        map.merge(local)?;
        stats[i] = Some(s);
    }
    if let Some(cluster) = &group.cluster {
        cluster.apply(&mut map)?;
    }
    Ok((map, stats.into_iter().flatten().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tremor_core::pmf::{Occurrence, Pmf};
    use tremor_core::{Imt, ImtGrid};
    use tremor_ctx::{GmmBranch, MakerParams};
    use tremor_gmm::models::fixed::{FixedDistribution, FixedDistributionSpec, FixedEntry};
    use tremor_source::filters::IntegrationDistance;
    use tremor_source::geo::PlanarSurface;
    use tremor_source::rupture::Rupture;
    use tremor_source::site::Site;
    use tremor_source::source::{Source, SourceKind};

    use crate::cluster::ClusterModel;
    use crate::curves::{calc_hazard_curves, group_map};
    use crate::logic::GsimBranchDef;

    fn maker() -> ContextMaker {
        let mut entries = BTreeMap::new();
        let _ = entries.insert(Imt::Pga, FixedEntry { median: 0.2, sigma: 0.6 });
        let branch = GmmBranch {
            gid: 0,
            model: Box::new(
                FixedDistribution::new(FixedDistributionSpec {
                    name: "fixed".into(),
                    trt: "Active Shallow Crust".into(),
                    entries,
                })
                .unwrap(),
            ),
        };
        ContextMaker::new(
            "Active Shallow Crust",
            0,
            vec![branch],
            ImtGrid::new(vec![(Imt::Pga, vec![0.1, 0.2, 0.4])]).unwrap(),
            MakerParams::default(),
        )
        .unwrap()
    }

    fn tree() -> GsimLogicTree {
        let mut by_trt = BTreeMap::new();
        let _ = by_trt.insert(
            "Active Shallow Crust".to_string(),
            vec![GsimBranchDef { gid: 0, weight: 1.0 }],
        );
        GsimLogicTree::new(by_trt).unwrap()
    }

    fn source(src_id: u32, rup_offset: u64, rates: &[f64]) -> Source {
        let surface = PlanarSurface {
            lon: 0.0,
            lat: 0.0,
            strike: 0.0,
            dip: 90.0,
            ztor: 0.0,
            length: 10.0,
            width: 10.0,
        };
        let rups = rates
            .iter()
            .map(|r| Rupture::new(6.0, 0.0, surface, 5.0, Occurrence::Rate(*r)))
            .collect();
        Source {
            source_id: format!("s{src_id}"),
            src_id,
            trt: "Active Shallow Crust".into(),
            rup_offset,
            kind: SourceKind::Ruptures(rups),
            rup_weights: None,
        }
    }

    fn sites() -> SiteCollection {
        SiteCollection::new(&[Site::rock(0.3, 0.0), Site::rock(0.0, 0.4)]).unwrap()
    }

    fn filter() -> SourceFilter {
        SourceFilter::new(IntegrationDistance::constant(300.0))
    }

    fn assert_curves_close(a: &HazardCurves, b: &HazardCurves) {
        assert_eq!(a.len(), b.len());
        for sid in a.sids() {
            for (x, y) in a.curve(sid).unwrap().iter().zip(b.curve(sid).unwrap()) {
                assert!((x - y).abs() < 1e-12, "{x} vs {y}");
            }
        }
    }

    #[test]
    fn parallel_matches_sequential_for_independent_groups() {
        let seq = CmakerSequence::new(vec![maker()]).unwrap();
        let groups = vec![SourceGroup::independent(
            "Active Shallow Crust",
            0,
            vec![
                source(0, 0, &[0.02]),
                source(1, 100, &[0.04, 0.01]),
                source(2, 200, &[0.005]),
            ],
        )];
        let (serial, _) =
            calc_hazard_curves(&groups, &sites(), &seq, &tree(), &filter()).unwrap();
        let (parallel, stats) =
            calc_hazard_curves_parallel(&groups, &sites(), &seq, &tree(), &filter()).unwrap();
        assert_eq!(stats.len(), 3);
        assert_curves_close(&serial, &parallel);
    }

    #[test]
    fn parallel_matches_sequential_for_src_mutex_groups() {
        let cm = maker();
        let mut group = SourceGroup::independent(
            "Active Shallow Crust",
            0,
            vec![source(0, 0, &[0.02]), source(1, 100, &[0.04])],
        );
        group.src_weights = Some(vec![0.7, 0.3]);
        let (serial, _) = group_map(&cm, &group, &sites(), &filter()).unwrap();
        let (parallel, _) = parallel_group_map(&cm, &group, &sites(), &filter()).unwrap();
        for sid in serial.sids() {
            let a = serial.poes(sid).unwrap();
            let b = parallel.poes(sid).unwrap();
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn cluster_applies_after_the_merge() {
        let cm = maker();
        let mut group = SourceGroup::independent(
            "Active Shallow Crust",
            0,
            vec![source(0, 0, &[0.02]), source(1, 100, &[0.04])],
        );
        group.cluster = Some(ClusterModel::new(Pmf::new(vec![0.5, 0.5]).unwrap()));
        let (serial, _) = group_map(&cm, &group, &sites(), &filter()).unwrap();
        let (parallel, _) = parallel_group_map(&cm, &group, &sites(), &filter()).unwrap();
        for sid in serial.sids() {
            let a = serial.poes(sid).unwrap();
            let b = parallel.poes(sid).unwrap();
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn stats_keep_source_order() {
        let cm = maker();
        let group = SourceGroup::independent(
            "Active Shallow Crust",
            0,
            vec![source(0, 0, &[0.02]), source(1, 100, &[0.04, 0.01])],
        );
        let (_, stats) = parallel_group_map(&cm, &group, &sites(), &filter()).unwrap();
        let ids: Vec<&str> = stats.iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(ids, vec!["s0", "s1"]);
    }
}
