//! The classical hazard-curve driver.
//!
//! Sources are organized in [`SourceGroup`]s sharing a tectonic region and
//! an interaction rule. Each group accumulates into one probability map,
//! the logic tree reduces the map's branch planes to mean curves, and
//! curves from different groups combine as independent contributions:
//! `P = 1 − ∏(1 − P_grp)`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use ndarray::Array1;
use tracing::{debug, info};
use tremor_core::{HazardError, Result};
use tremor_ctx::{AccumMode, ContextMaker, MapArray};
use tremor_source::filters::SourceFilter;
use tremor_source::site::SiteCollection;
use tremor_source::source::Source;

use crate::cluster::ClusterModel;
use crate::logic::{GsimLogicTree, RmapMaker};

const WEIGHT_TOL: f64 = 1e-6;

/// Sources sharing a tectonic region and an interaction rule.
///
/// Exactly one rule applies: independent ruptures (the default), mutually
/// exclusive sources (`src_weights`), or mutually exclusive ruptures
/// (`rup_mutex`, with weights on each source). A cluster model rides on
/// top of the independent rule only.
#[derive(Debug, Clone)]
pub struct SourceGroup {
    /// Tectonic region type shared by the sources.
    pub trt: String,
    /// Group id, matching a maker's `grp_id`.
    pub grp_id: u32,
    /// The group's sources.
    pub sources: Vec<Source>,
    /// Weights for mutually exclusive sources; `None` means independent.
    pub src_weights: Option<Vec<f64>>,
    /// Ruptures within each source are mutually exclusive alternatives.
    pub rup_mutex: bool,
    /// Occurrence-count distribution governing the whole group.
    pub cluster: Option<ClusterModel>,
}

impl SourceGroup {
    /// An independent group with no cluster model.
    pub fn independent(trt: impl Into<String>, grp_id: u32, sources: Vec<Source>) -> Self {
        Self {
            trt: trt.into(),
            grp_id,
            sources,
            src_weights: None,
            rup_mutex: false,
            cluster: None,
        }
    }

    /// Validate configuration invariants at setup time.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(HazardError::Config(format!(
                "group {} has no sources",
                self.grp_id
            )));
        }
        for source in &self.sources {
            source.validate()?;
        }
        if self.src_weights.is_some() && self.rup_mutex {
            return Err(HazardError::Config(format!(
                "group {}: source-level and rupture-level mutual exclusion cannot combine",
                self.grp_id
            )));
        }
        if let Some(weights) = &self.src_weights {
            if weights.len() != self.sources.len() {
                return Err(HazardError::Config(format!(
                    "group {}: {} source weights for {} sources",
                    self.grp_id,
                    weights.len(),
                    self.sources.len()
                )));
            }
            let total: f64 = weights.iter().sum();
            if (total - 1.0).abs() > WEIGHT_TOL {
                return Err(HazardError::Config(format!(
                    "group {}: source weights sum to {total}, expected 1",
                    self.grp_id
                )));
            }
        }
        if self.rup_mutex {
            for source in &self.sources {
                if source.rup_weights.is_none() {
                    return Err(HazardError::Config(format!(
                        "group {}: source {} has no rupture weights",
                        self.grp_id, source.source_id
                    )));
                }
            }
        }
        if self.cluster.is_some() && (self.rup_mutex || self.src_weights.is_some()) {
            return Err(HazardError::Config(format!(
                "group {}: cluster models apply to independent groups only",
                self.grp_id
            )));
        }
        Ok(())
    }
}

/// The makers of a calculation, addressable by group id.
#[derive(Debug)]
pub struct CmakerSequence {
    makers: Vec<ContextMaker>,
    num_levels: usize,
}

impl CmakerSequence {
    /// Duplicate group ids and mismatched level counts are rejected: one
    /// maker serves one group, and every group feeds the same curves.
    pub fn new(makers: Vec<ContextMaker>) -> Result<Self> {
        let first = makers
            .first()
            .ok_or_else(|| HazardError::Config("no context makers".into()))?;
        let num_levels = first.grid().num_levels();
        let mut seen = std::collections::BTreeSet::new();
        for maker in &makers {
            if !seen.insert(maker.grp_id) {
                return Err(HazardError::Config(format!(
                    "duplicate maker for group {}",
                    maker.grp_id
                )));
            }
            if maker.grid().num_levels() != num_levels {
                return Err(HazardError::Config(format!(
                    "maker for group {} has {} levels, expected {num_levels}",
                    maker.grp_id,
                    maker.grid().num_levels()
                )));
            }
        }
        Ok(Self { makers, num_levels })
    }

    pub fn get(&self, grp_id: u32) -> Result<&ContextMaker> {
        self.makers
            .iter()
            .find(|m| m.grp_id == grp_id)
            .ok_or_else(|| HazardError::Config(format!("no maker for group {grp_id}")))
    }

    pub fn makers(&self) -> &[ContextMaker] {
        &self.makers
    }

    /// Levels per curve (L), shared by every maker.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }
}

/// Per-source accounting, for load balancing and progress reporting.
#[derive(Debug, Clone)]
pub struct SourceStats {
    /// Human-readable source id.
    pub source_id: String,
    /// Group the source was processed in.
    pub grp_id: u32,
    /// Context rows the source contributed.
    pub rows: usize,
    /// Realized computational weight (rows × branches).
    pub weight: f64,
    /// Wall time spent on the source.
    pub elapsed: Duration,
}

/// Per-site mean hazard curves, length L each.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardCurves {
    num_levels: usize,
    curves: BTreeMap<u32, Vec<f64>>,
}

impl HazardCurves {
    pub fn new(num_levels: usize) -> Self {
        Self {
            num_levels,
            curves: BTreeMap::new(),
        }
    }

    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Sites with a curve, ascending.
    pub fn sids(&self) -> impl Iterator<Item = u32> + '_ {
        self.curves.keys().copied()
    }

    pub fn curve(&self, sid: u32) -> Option<&[f64]> {
        self.curves.get(&sid).map(Vec::as_slice)
    }

    /// Fold one group's mean curve for a site into the total, treating
    /// groups as independent: `P = 1 − (1 − P)(1 − P_grp)`.
    pub fn combine(&mut self, sid: u32, group_curve: &Array1<f64>) {
        debug_assert_eq!(group_curve.len(), self.num_levels);
        let curve = self
            .curves
            .entry(sid)
            .or_insert_with(|| vec![0.0; self.num_levels]);
        for (c, g) in curve.iter_mut().zip(group_curve) {
            *c = 1.0 - (1.0 - *c) * (1.0 - g);
        }
    }
}

/// Accumulate one source into a group map according to the group's rule.
/// Returns the rows contributed.
pub(crate) fn accumulate_source(
    maker: &ContextMaker,
    group: &SourceGroup,
    source: &Source,
    map: &mut MapArray,
    sites: &SiteCollection,
    filter: &SourceFilter,
) -> Result<usize> {
    let rup_weights = if group.rup_mutex {
        let weights: BTreeMap<u64, f64> = source
            .rup_weights
            .as_ref()
            .map(|ws| {
                ws.iter()
                    .enumerate()
                    .map(|(i, w)| (source.rup_offset + i as u64, *w))
                    .collect()
            })
            .unwrap_or_default();
        Some(weights)
    } else {
        None
    };
    let mut rows = 0;
    for batch in maker.make_ctxs(source, sites, filter)? {
        rows += maker.update(map, batch, rup_weights.as_ref())?.rows;
    }
    Ok(rows)
}

/// Build one group's probability map: a `PneProduct` map for independent
/// and clustered groups, a `Sum` map otherwise.
pub fn group_map(
    maker: &ContextMaker,
    group: &SourceGroup,
    sites: &SiteCollection,
    filter: &SourceFilter,
) -> Result<(MapArray, Vec<SourceStats>)> {
    group.validate()?;
    let mut stats = Vec::with_capacity(group.sources.len());
    let mut record = |source: &Source, rows: usize, start: Instant| {
        stats.push(SourceStats {
            source_id: source.source_id.clone(),
            grp_id: group.grp_id,
            rows,
            weight: (rows * maker.num_branches()) as f64,
            elapsed: start.elapsed(),
        });
    };

    let map = match &group.src_weights {
        // mutually exclusive sources: weighted sum of per-source poes
        Some(weights) => {
            let mut total = maker.empty_map(AccumMode::Sum);
            for (source, w) in group.sources.iter().zip(weights) {
                let start = Instant::now();
                let mut local = maker.empty_map(AccumMode::PneProduct);
                let rows = accumulate_source(maker, group, source, &mut local, sites, filter)?;
                for sid in local.sids().collect::<Vec<_>>() {
                    if let Some(poes) = local.poes(sid) {
                        total.plane_mut(sid).scaled_add(*w, &poes);
                    }
                }
                record(source, rows, start);
            }
            total
        }
        None => {
            let mode = if group.rup_mutex {
                AccumMode::Sum
            } else {
                AccumMode::PneProduct
            };
            let mut map = maker.empty_map(mode);
            for source in &group.sources {
                let start = Instant::now();
                let rows = accumulate_source(maker, group, source, &mut map, sites, filter)?;
                record(source, rows, start);
            }
            if let Some(cluster) = &group.cluster {
                cluster.apply(&mut map)?;
            }
            map
        }
    };
    debug!(
        grp_id = group.grp_id,
        sites = map.len(),
        "group map accumulated"
    );
    Ok((map, stats))
}

/// The end-to-end classical calculator: every group's map, reduced by the
/// logic tree to mean curves and combined across groups.
pub fn calc_hazard_curves(
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
        let (map, group_stats) = group_map(maker, group, sites, filter)?;
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
        "hazard curves computed"
    );
    Ok((curves, stats))
}
