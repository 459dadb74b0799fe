//! Ground-motion logic tree and realization reduction.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tremor_core::{HazardError, Result};
use tremor_ctx::{ContextMaker, MapArray};

const WEIGHT_TOL: f64 = 1e-6;

/// One logic-tree branch: a global branch id with its weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GsimBranchDef {
    /// Global branch id, matching the `gid` of a maker branch.
    pub gid: u32,
    /// Branch weight; weights of one tectonic region sum to 1.
    pub weight: f64,
}

/// Branch weights per tectonic region type.
///
/// Every tectonic region named by the source model must have at least one
/// branch; an empty region would silently zero out its sources'
/// contribution, so it is rejected at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GsimLogicTree {
    by_trt: BTreeMap<String, Vec<GsimBranchDef>>,
}

impl GsimLogicTree {
    pub fn new(by_trt: BTreeMap<String, Vec<GsimBranchDef>>) -> Result<Self> {
        if by_trt.is_empty() {
            return Err(HazardError::Config("empty ground-motion logic tree".into()));
        }
        for (trt, branches) in &by_trt {
            if branches.is_empty() {
                return Err(HazardError::Config(format!(
                    "no ground-motion branches for `{trt}`"
                )));
            }
            let total: f64 = branches.iter().map(|b| b.weight).sum();
            if (total - 1.0).abs() > WEIGHT_TOL {
                return Err(HazardError::Config(format!(
                    "branch weights for `{trt}` sum to {total}, expected 1"
                )));
            }
        }
        Ok(Self { by_trt })
    }

    /// Branches for a tectonic region. An unknown region is fatal.
    pub fn branches(&self, trt: &str) -> Result<&[GsimBranchDef]> {
        self.by_trt
            .get(trt)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                HazardError::Config(format!("no ground-motion branches for `{trt}`"))
            })
    }

    /// The tectonic regions covered by the tree.
    pub fn trts(&self) -> impl Iterator<Item = &str> {
        self.by_trt.keys().map(String::as_str)
    }
}

/// Reduces a maker's per-branch planes to weighted mean hazard curves.
///
/// Built once per (maker, tree) pair: the maker's branch order fixes the
/// G axis, and each column's weight comes from the tree branch with the
/// matching gid.
#[derive(Debug, Clone)]
pub struct RmapMaker {
    weights: Vec<f64>,
}

impl RmapMaker {
    pub fn new(maker: &ContextMaker, tree: &GsimLogicTree) -> Result<Self> {
        let branches = tree.branches(&maker.trt)?;
        let weights = maker
            .gids()
            .iter()
            .map(|gid| {
                branches
                    .iter()
                    .find(|b| b.gid == *gid)
                    .map(|b| b.weight)
                    .ok_or_else(|| {
                        HazardError::Config(format!(
                            "maker branch gid {gid} is not in the logic tree for `{}`",
                            maker.trt
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { weights })
    }

    /// Per-column weights, in the maker's branch order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The weighted mean curve (length L) for one site, or `None` when
    /// the site was never touched.
    pub fn mean_curve(&self, map: &MapArray, sid: u32) -> Option<Array1<f64>> {
        let poes = map.poes(sid)?;
        let (l, g) = map.shape();
        debug_assert_eq!(g, self.weights.len());
        let mut out = Array1::zeros(l);
        for (gi, w) in self.weights.iter().enumerate() {
            for li in 0..l {
                out[li] += w * poes[[li, gi]];
            }
        }
        Some(out)
    }
}
