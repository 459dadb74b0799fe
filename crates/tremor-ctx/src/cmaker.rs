//! The `ContextMaker`: one tectonic-region group's dispatch loop.
//!
//! A maker owns the model branches of one group, the IMT/level grid, the
//! truncation policy and the context schema derived from the branches. Its
//! operations are the hot path of a classical calculation:
//!
//! 1. [`ContextMaker::make_ctxs`] — filter, build, collapse;
//! 2. [`ContextMaker::get_mean_stds`] — the (4, G, M, N) mean/stddev block;
//! 3. [`ContextMaker::gen_poes`] — memory-bounded PoE slices;
//! 4. [`ContextMaker::update`] — fold PoEs into a probability map.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use ndarray::{Array3, Array4, s};
use tracing::warn;
use tremor_core::{
    CtxArray, CtxSchema, HazardError, HorizontalComponent, Imt, ImtGrid, Result, Truncation,
};
use tremor_gmm::wrappers::ComponentConverted;
use tremor_gmm::GroundMotionModel;
use tremor_source::filters::{IntegrationDistance, SourceFilter};
use tremor_source::site::SiteCollection;
use tremor_source::source::{Source, SourceKind};

use crate::builder::CtxBuilder;
use crate::collapse::CollapseSpec;
use crate::map::{AccumMode, MapArray};
use crate::schema;

// Rows per PoE slice; bounds peak memory of gen_poes at
// MAX_POE_ROWS × L × G doubles per slice.
const MAX_POE_ROWS: usize = 1024;

// Sampling stride for weight estimation.
const WEIGHT_SAMPLE: usize = 10;

/// One model branch with its calculation-global branch id.
#[derive(Debug)]
pub struct GmmBranch {
    /// Global branch id (the `gid`), assigned by the logic tree.
    pub gid: u32,
    /// The branch's model.
    pub model: Box<dyn GroundMotionModel>,
}

/// Maker configuration beyond the branches and the grid.
#[derive(Debug, Clone)]
pub struct MakerParams {
    /// Epsilon truncation level (`None` = untruncated, `0` = step).
    pub truncation_level: Option<f64>,
    /// Investigation time in years.
    pub investigation_time: f64,
    /// Magnitude-dependent integration distance.
    pub int_dist: IntegrationDistance,
    /// Minimum-distance floor in km (0 = off).
    pub min_distance_km: f64,
    /// Optional lossy context collapsing.
    pub collapse: CollapseSpec,
    /// Convert every branch to this component convention when set.
    pub uniform_component: Option<HorizontalComponent>,
    /// Return consumed batches from [`ContextMaker::update`].
    pub keep_ctxs: bool,
}

impl Default for MakerParams {
    fn default() -> Self {
        Self {
            truncation_level: None,
            investigation_time: 1.0,
            int_dist: IntegrationDistance::constant(300.0),
            min_distance_km: 0.0,
            collapse: CollapseSpec::off(),
            uniform_component: None,
            keep_ctxs: false,
        }
    }
}

/// PoEs for a contiguous row range: an (n, L, G) block.
#[derive(Debug)]
pub struct PoeBatch {
    /// Absolute row range inside the source context array.
    pub range: Range<usize>,
    /// PoE values, dimensions (rows, levels, branches).
    pub poes: Array3<f64>,
}

/// What [`ContextMaker::update`] consumed.
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Context rows folded into the map.
    pub rows: usize,
    /// The consumed batch, returned when `keep_ctxs` is configured.
    pub kept: Option<CtxArray>,
}

/// The per-group dispatch engine.
pub struct ContextMaker {
    /// Tectonic region type this maker serves.
    pub trt: String,
    /// Group id stamped on every context batch.
    pub grp_id: u32,
    branches: Vec<GmmBranch>,
    grid: ImtGrid,
    imts: Vec<Imt>,
    schema: Arc<CtxSchema>,
    trunc: Truncation,
    params: MakerParams,
    /// Estimated computational weight, annotated after construction by
    /// the scheduling layer.
    pub wei: f64,
}

impl std::fmt::Debug for ContextMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextMaker")
            .field("trt", &self.trt)
            .field("grp_id", &self.grp_id)
            .field("branches", &self.branches.len())
            .field("imts", &self.imts)
            .field("wei", &self.wei)
            .finish_non_exhaustive()
    }
}

impl ContextMaker {
    /// Build a maker for one group. Fails on an empty branch list or a
    /// bad truncation level; warns when a branch's declared tectonic
    /// region differs from the group's.
    pub fn new(
        trt: impl Into<String>,
        grp_id: u32,
        branches: Vec<GmmBranch>,
        grid: ImtGrid,
        params: MakerParams,
    ) -> Result<Self> {
        let trt = trt.into();
        if branches.is_empty() {
            return Err(HazardError::Config(format!(
                "no ground-motion model branches for `{trt}`"
            )));
        }
        let trunc = Truncation::from_level(params.truncation_level)?;
        if params.investigation_time <= 0.0 {
            return Err(HazardError::Config(format!(
                "investigation time must be positive, got {}",
                params.investigation_time
            )));
        }
        let branches: Vec<GmmBranch> = branches
            .into_iter()
            .map(|b| match params.uniform_component {
                Some(target) if b.model.caps().component != target => GmmBranch {
                    gid: b.gid,
                    model: Box::new(ComponentConverted::new(b.model, target)),
                },
                _ => b,
            })
            .collect();
        for b in &branches {
            if b.model.caps().trt != trt {
                warn!(
                    model = b.model.name(),
                    model_trt = %b.model.caps().trt,
                    group_trt = %trt,
                    "model used outside its declared tectonic region"
                );
            }
        }
        let schema = schema_from(&branches);
        let imts = grid.imts().copied().collect();
        Ok(Self {
            trt,
            grp_id,
            branches,
            grid,
            imts,
            schema,
            trunc,
            params,
            wei: 0.0,
        })
    }

    /// Number of branches (the G dimension).
    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    /// Global branch ids, in branch order.
    pub fn gids(&self) -> Vec<u32> {
        self.branches.iter().map(|b| b.gid).collect()
    }

    /// The derived context schema.
    pub fn schema(&self) -> &Arc<CtxSchema> {
        &self.schema
    }

    /// The IMT/level grid.
    pub fn grid(&self) -> &ImtGrid {
        &self.grid
    }

    /// The truncation policy.
    pub fn truncation(&self) -> Truncation {
        self.trunc
    }

    /// Investigation time in years.
    pub fn time_span(&self) -> f64 {
        self.params.investigation_time
    }

    /// A probability map shaped for this maker.
    pub fn empty_map(&self, mode: AccumMode) -> MapArray {
        MapArray::new(mode, self.grid.num_levels(), self.num_branches())
    }

    fn builder(&self) -> CtxBuilder {
        CtxBuilder::new(
            Arc::clone(&self.schema),
            self.params.int_dist.clone(),
            self.params.min_distance_km,
            self.grp_id,
        )
    }

    /// Filter, build and (optionally) collapse the context batches of one
    /// source. `Ok(vec![])` means the source contributes nothing here.
    pub fn make_ctxs(
        &self,
        source: &Source,
        sites: &SiteCollection,
        filter: &SourceFilter,
    ) -> Result<Vec<CtxArray>> {
        schema::check_site_params(&self.schema, sites)?;
        let Some(near) = filter.filter(source, sites) else {
            return Ok(Vec::new());
        };
        let batches = self.builder().ctx_iter(source, &near)?;
        batches
            .into_iter()
            .map(|b| self.params.collapse.apply(b))
            .collect()
    }

    /// Mean and standard deviations for every (branch, IMT, row): an
    /// `Array4` of shape (4, G, M, N) holding mean, sigma, tau, phi.
    ///
    /// Rows are dispatched per magnitude slice, so the result is identical
    /// whether the rows arrive as one batch or split across several.
    pub fn get_mean_stds(&self, ctx: &CtxArray) -> Result<Array4<f64>> {
        let n = ctx.len();
        let (g_count, m_count) = (self.branches.len(), self.imts.len());
        let mut out = Array4::zeros((4, g_count, m_count, n));
        for slice in ctx.mag_slices() {
            let view = ctx.view(slice.clone());
            for (g, branch) in self.branches.iter().enumerate() {
                let (mean, sig, tau, phi) = out.multi_slice_mut((
                    s![0, g, .., slice.clone()],
                    s![1, g, .., slice.clone()],
                    s![2, g, .., slice.clone()],
                    s![3, g, .., slice.clone()],
                ));
                branch.model.compute(&view, &self.imts, mean, sig, tau, phi)?;
            }
        }
        Ok(out)
    }

    /// Probabilities of exceedance for every (row, level, branch), in row
    /// slices of bounded size.
    pub fn gen_poes(&self, ctx: &CtxArray) -> Result<Vec<PoeBatch>> {
        let ms = self.get_mean_stds(ctx)?;
        let n = ctx.len();
        let l_total = self.grid.num_levels();
        let g_count = self.branches.len();
        let dist_levels: Vec<Vec<f64>> = (0..self.imts.len())
            .map(|m| self.grid.distribution_levels(m))
            .collect();

        let mut out = Vec::new();
        let mut start = 0;
        while start < n {
            let end = (start + MAX_POE_ROWS).min(n);
            let mut poes = Array3::zeros((end - start, l_total, g_count));
            for (m, levels) in dist_levels.iter().enumerate() {
                let l_range = self.grid.level_range(m);
                for g in 0..g_count {
                    for row in start..end {
                        let mean = ms[[0, g, m, row]];
                        let sig = ms[[1, g, m, row]];
                        if sig <= 0.0 && self.trunc.requires_positive_sigma() {
                            return Err(HazardError::ZeroSigma {
                                trunc: trunc_as_f64(self.trunc),
                            });
                        }
                        for (li, lvl) in levels.iter().enumerate() {
                            let x = if sig > 0.0 { (lvl - mean) / sig } else { lvl - mean };
                            poes[[row - start, l_range.start + li, g]] = self.trunc.sf(x);
                        }
                    }
                }
            }
            out.push(PoeBatch {
                range: start..end,
                poes,
            });
            start = end;
        }
        Ok(out)
    }

    /// Fold one context batch into a probability map.
    ///
    /// Independent ruptures (`rup_mutex = None`) multiply per-row
    /// no-exceedance factors into a `PneProduct` map. Mutually exclusive
    /// ruptures contribute `weight · poe` into a `Sum` map; every rupture
    /// id in the batch must have a weight.
    pub fn update(
        &self,
        map: &mut MapArray,
        ctx: CtxArray,
        rup_mutex: Option<&BTreeMap<u64, f64>>,
    ) -> Result<UpdateOutcome> {
        let expected_mode = if rup_mutex.is_some() {
            AccumMode::Sum
        } else {
            AccumMode::PneProduct
        };
        if map.mode() != expected_mode {
            return Err(HazardError::Config(
                "probability map mode does not match the update rule".into(),
            ));
        }
        let time_span = self.params.investigation_time;
        let batches = self.gen_poes(&ctx)?;
        for batch in &batches {
            for (rel, row) in batch.range.clone().enumerate() {
                let sid = ctx.sids()[row];
                let occurrence = &ctx.occurrences()[row];
                let poe_plane = batch.poes.slice(s![rel, .., ..]);
                let plane = map.plane_mut(sid);
                match rup_mutex {
                    None => {
                        for (acc, poe) in plane.iter_mut().zip(&poe_plane) {
                            *acc *= occurrence.pne(*poe, time_span);
                        }
                    }
                    Some(weights) => {
                        let rup_id = ctx.rup_ids()[row];
                        let w = *weights.get(&rup_id).ok_or_else(|| {
                            HazardError::Config(format!(
                                "no mutex weight for rupture {rup_id}"
                            ))
                        })?;
                        for (acc, poe) in plane.iter_mut().zip(&poe_plane) {
                            *acc += w * poe;
                        }
                    }
                }
            }
        }
        let rows = ctx.len();
        let kept = self.params.keep_ctxs.then_some(ctx);
        Ok(UpdateOutcome { rows, kept })
    }

    /// Estimate the computational weight of a source from a sampled
    /// context pass. Scheduling aid only: the value has no effect on
    /// results.
    pub fn estimate_weight(
        &self,
        source: &Source,
        sites: &SiteCollection,
        filter: &SourceFilter,
    ) -> Result<f64> {
        let Some(near) = filter.filter(source, sites) else {
            return Ok(0.0);
        };
        let rups = source.ruptures();
        if rups.is_empty() {
            return Ok(0.0);
        }
        let sampled: Vec<_> = rups.iter().step_by(WEIGHT_SAMPLE).cloned().collect();
        let scale = rups.len() as f64 / sampled.len() as f64;
        let sampled_source = Source {
            kind: SourceKind::Ruptures(sampled),
            rup_weights: None,
            ..source.clone()
        };
        let batches = self.builder().ctx_iter(&sampled_source, &near)?;
        let rows: usize = batches.iter().map(CtxArray::len).sum();
        // planar grids amortize their geometry; explicit lists do not
        let type_mult = if source.is_planar_grid() { 0.2 } else { 1.0 };
        Ok(rows as f64 * scale * type_mult * self.branches.len() as f64)
    }
}

fn schema_from(branches: &[GmmBranch]) -> Arc<CtxSchema> {
    let rup = branches
        .iter()
        .flat_map(|b| b.model.caps().requires_rup.iter().copied());
    let site = branches
        .iter()
        .flat_map(|b| b.model.caps().requires_site.iter().copied());
    let dist = branches
        .iter()
        .flat_map(|b| b.model.caps().requires_dist.iter().copied());
    Arc::new(CtxSchema::from_unions(rup, site, dist))
}

fn trunc_as_f64(trunc: Truncation) -> f64 {
    match trunc {
        Truncation::None => f64::INFINITY,
        Truncation::Step => 0.0,
        Truncation::Sigma(b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use std::collections::BTreeMap as Map;
    use tremor_core::pmf::Occurrence;
    use tremor_gmm::models::fixed::{FixedDistribution, FixedDistributionSpec, FixedEntry};
    use tremor_gmm::CrustalBackbone;
    use tremor_source::geo::PlanarSurface;
    use tremor_source::rupture::Rupture;
    use tremor_source::site::Site;

    fn grid() -> ImtGrid {
        ImtGrid::new(vec![(Imt::Pga, vec![0.1, 0.2, 0.4])]).unwrap()
    }

    fn fixed_branch(gid: u32, median: f64, sigma: f64) -> GmmBranch {
        let mut entries = BTreeMap::new();
        let _ = entries.insert(Imt::Pga, FixedEntry { median, sigma });
        GmmBranch {
            gid,
            model: Box::new(
                FixedDistribution::new(FixedDistributionSpec {
                    name: format!("fixed-{gid}"),
                    trt: "Active Shallow Crust".into(),
                    entries,
                })
                .unwrap(),
            ),
        }
    }

    fn maker(branches: Vec<GmmBranch>, params: MakerParams) -> ContextMaker {
        ContextMaker::new("Active Shallow Crust", 0, branches, grid(), params).unwrap()
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
            source_id: "s".into(),
            src_id: 0,
            trt: "Active Shallow Crust".into(),
            rup_offset: 0,
            kind: SourceKind::Ruptures(rups),
            rup_weights: None,
        }
    }

    fn one_rupture_ctx(cm: &ContextMaker, rate: f64) -> CtxArray {
        let source = fault_source(vec![Rupture::new(
            6.0,
            0.0,
            surface(),
            5.0,
            Occurrence::Rate(rate),
        )]);
        let sites = SiteCollection::new(&[Site::rock(0.3, 0.0)]).unwrap();
        let filter = SourceFilter::new(IntegrationDistance::constant(300.0));
        let mut batches = cm.make_ctxs(&source, &sites, &filter).unwrap();
        assert_eq!(batches.len(), 1);
        batches.remove(0)
    }

    #[test]
    fn zero_branches_is_fatal() {
        let err = ContextMaker::new(
            "Active Shallow Crust",
            0,
            Vec::new(),
            grid(),
            MakerParams::default(),
        )
        .unwrap_err();
        assert_matches!(err, HazardError::Config(_));
    }

    #[test]
    fn mean_stds_block_has_the_advertised_shape() {
        let cm = maker(
            vec![fixed_branch(0, 0.2, 0.6), fixed_branch(1, 0.3, 0.5)],
            MakerParams::default(),
        );
        let ctx = one_rupture_ctx(&cm, 0.01);
        let ms = cm.get_mean_stds(&ctx).unwrap();
        assert_eq!(ms.shape(), &[4, 2, 1, 1]);
        assert!((ms[[0, 0, 0, 0]] - 0.2f64.ln()).abs() < 1e-12);
        assert_eq!(ms[[1, 1, 0, 0]], 0.5);
    }

    #[test]
    fn batching_does_not_change_mean_stds() {
        let cm = maker(vec![fixed_branch(0, 0.2, 0.6)], MakerParams::default());
        let source = fault_source(vec![
            Rupture::new(5.5, 0.0, surface(), 5.0, Occurrence::Rate(0.01)),
            Rupture::new(6.5, 0.0, surface(), 5.0, Occurrence::Rate(0.001)),
        ]);
        let sites = SiteCollection::new(&[Site::rock(0.3, 0.0)]).unwrap();
        let filter = SourceFilter::new(IntegrationDistance::constant(300.0));
        let batches = cm.make_ctxs(&source, &sites, &filter).unwrap();
        assert_eq!(batches.len(), 2);

        // concatenated batches give the same block as per-batch dispatch
        let mut merged = batches[0].clone();
        merged.append(&batches[1]).unwrap();
        let whole = cm.get_mean_stds(&merged).unwrap();
        let part0 = cm.get_mean_stds(&batches[0]).unwrap();
        let part1 = cm.get_mean_stds(&batches[1]).unwrap();
        assert_eq!(whole.slice(s![.., .., .., 0..1]), part0.view());
        assert_eq!(whole.slice(s![.., .., .., 1..2]), part1.view());
    }

    #[test]
    fn poes_decrease_with_level() {
        let cm = maker(vec![fixed_branch(0, 0.2, 0.6)], MakerParams::default());
        let ctx = one_rupture_ctx(&cm, 0.01);
        let batches = cm.gen_poes(&ctx).unwrap();
        assert_eq!(batches.len(), 1);
        let poes = &batches[0].poes;
        assert!(poes[[0, 0, 0]] > poes[[0, 1, 0]]);
        assert!(poes[[0, 1, 0]] > poes[[0, 2, 0]]);
        // the median level (0.2) has exactly 50% exceedance
        assert!((poes[[0, 1, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_sigma_with_truncation_is_fatal() {
        let cm = maker(
            vec![fixed_branch(0, 0.2, 0.0)],
            MakerParams {
                truncation_level: Some(3.0),
                ..MakerParams::default()
            },
        );
        let ctx = one_rupture_ctx(&cm, 0.01);
        let err = cm.gen_poes(&ctx).unwrap_err();
        assert_matches!(err, HazardError::ZeroSigma { trunc } if trunc == 3.0);
    }

    #[test]
    fn zero_sigma_with_step_truncation_is_fine() {
        let cm = maker(
            vec![fixed_branch(0, 0.2, 0.0)],
            MakerParams {
                truncation_level: Some(0.0),
                ..MakerParams::default()
            },
        );
        let ctx = one_rupture_ctx(&cm, 0.01);
        let batches = cm.gen_poes(&ctx).unwrap();
        let poes = &batches[0].poes;
        // step at the median: exceeds 0.1, not 0.4
        assert_eq!(poes[[0, 0, 0]], 1.0);
        assert_eq!(poes[[0, 2, 0]], 0.0);
    }

    #[test]
    fn independent_update_multiplies_pne() {
        let cm = maker(vec![fixed_branch(0, 0.2, 0.6)], MakerParams::default());
        let ctx = one_rupture_ctx(&cm, 0.02);
        let poes = cm.gen_poes(&ctx).unwrap().remove(0).poes;
        let mut map = cm.empty_map(AccumMode::PneProduct);
        let outcome = cm.update(&mut map, ctx, None).unwrap();
        assert_eq!(outcome.rows, 1);
        assert!(outcome.kept.is_none());

        let got = map.poes(0).unwrap();
        for l in 0..3 {
            let expect = 1.0 - (-0.02 * poes[[0, l, 0]]).exp();
            assert!((got[[l, 0]] - expect).abs() < 1e-12);
        }
    }

    #[test]
    fn mutex_update_needs_weights_and_sums() {
        let cm = maker(vec![fixed_branch(0, 0.2, 0.6)], MakerParams::default());
        let ctx = one_rupture_ctx(&cm, 0.02);
        let poes = cm.gen_poes(&ctx).unwrap().remove(0).poes;

        let mut map = cm.empty_map(AccumMode::Sum);
        let missing: Map<u64, f64> = Map::new();
        assert!(cm.update(&mut map, ctx.clone(), Some(&missing)).is_err());

        let mut weights = Map::new();
        let _ = weights.insert(0u64, 0.4);
        cm.update(&mut map, ctx.clone(), Some(&weights)).unwrap();
        let got = map.poes(0).unwrap();
        assert!((got[[0, 0]] - 0.4 * poes[[0, 0, 0]]).abs() < 1e-12);

        // wrong map mode for the rule
        let mut wrong = cm.empty_map(AccumMode::PneProduct);
        assert!(cm.update(&mut wrong, ctx, Some(&weights)).is_err());
    }

    #[test]
    fn keep_ctxs_returns_the_batch() {
        let cm = maker(
            vec![fixed_branch(0, 0.2, 0.6)],
            MakerParams {
                keep_ctxs: true,
                ..MakerParams::default()
            },
        );
        let ctx = one_rupture_ctx(&cm, 0.01);
        let mut map = cm.empty_map(AccumMode::PneProduct);
        let outcome = cm.update(&mut map, ctx, None).unwrap();
        assert_eq!(outcome.kept.map(|c| c.len()), Some(1));
    }

    #[test]
    fn schema_derives_from_branches() {
        let cm = ContextMaker::new(
            "Active Shallow Crust",
            0,
            vec![GmmBranch {
                gid: 0,
                model: Box::new(CrustalBackbone::new().unwrap()),
            }],
            grid(),
            MakerParams::default(),
        )
        .unwrap();
        assert!(cm.schema().dist.contains(&tremor_core::DistanceKind::Rrup));
        assert!(cm.schema().site.contains(&tremor_core::SiteParam::Vs30));
    }

    #[test]
    fn estimate_weight_scales_with_rupture_count() {
        let cm = maker(vec![fixed_branch(0, 0.2, 0.6)], MakerParams::default());
        let sites = SiteCollection::new(&[Site::rock(0.3, 0.0)]).unwrap();
        let filter = SourceFilter::new(IntegrationDistance::constant(300.0));
        let small = fault_source(vec![
            Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01));
            5
        ]);
        let large = fault_source(vec![
            Rupture::new(6.0, 0.0, surface(), 5.0, Occurrence::Rate(0.01));
            50
        ]);
        let w_small = cm.estimate_weight(&small, &sites, &filter).unwrap();
        let w_large = cm.estimate_weight(&large, &sites, &filter).unwrap();
        assert!(w_large > w_small);
        // a filtered-out source weighs nothing
        let far = SiteCollection::new(&[Site::rock(50.0, 0.0)]).unwrap();
        assert_eq!(cm.estimate_weight(&small, &far, &filter).unwrap(), 0.0);
    }

    proptest! {
        // splitting rows across updates never changes the accumulated map
        #[test]
        fn update_is_batching_invariant(rate in 0.001f64..0.1) {
            let cm = maker(vec![fixed_branch(0, 0.2, 0.6)], MakerParams::default());
            let rups = vec![
                Rupture::new(5.5, 0.0, surface(), 5.0, Occurrence::Rate(rate)),
                Rupture::new(6.5, 0.0, surface(), 5.0, Occurrence::Rate(rate * 0.5)),
            ];
            let source = fault_source(rups);
            let sites = SiteCollection::new(&[Site::rock(0.3, 0.0)]).unwrap();
            let filter = SourceFilter::new(IntegrationDistance::constant(300.0));
            let batches = cm.make_ctxs(&source, &sites, &filter).unwrap();
            prop_assert_eq!(batches.len(), 2);

            let mut merged = batches[0].clone();
            merged.append(&batches[1]).unwrap();
            let mut whole = cm.empty_map(AccumMode::PneProduct);
            cm.update(&mut whole, merged, None).unwrap();

            let mut split = cm.empty_map(AccumMode::PneProduct);
            for b in batches {
                cm.update(&mut split, b, None).unwrap();
            }
            let a = whole.poes(0).unwrap();
            let b = split.poes(0).unwrap();
            for (x, y) in a.iter().zip(b.iter()) {
                prop_assert!((x - y).abs() < 1e-12);
            }
        }
    }
}
