//! The serde contract for stored calculations.
//!
//! A calculation description serializes each group as a [`CmakerConfig`]
//! and its contexts as flat [`CtxArray`] batches. `read_cmakers` and
//! `read_ctx_by_grp` reconstruct the dispatch state from that form: the
//! same JSON produces the same makers and the same batches, so a
//! calculation can be split, stored and resumed elsewhere.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tremor_core::{CtxArray, HorizontalComponent, ImtGrid, Result};
use tremor_gmm::GmmRegistry;
use tremor_source::filters::IntegrationDistance;

use crate::cmaker::{ContextMaker, GmmBranch, MakerParams};
use crate::collapse::CollapseSpec;

/// One serialized model branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmmBranchConfig {
    /// Global branch id.
    pub gid: u32,
    /// Registry name (or alias) of the model.
    pub model: String,
    /// Model construction parameters; `null` for parameterless models.
    #[serde(default)]
    pub params: Value,
}

/// One serialized `ContextMaker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmakerConfig {
    pub trt: String,
    pub grp_id: u32,
    pub branches: Vec<GmmBranchConfig>,
    pub imtls: ImtGrid,
    #[serde(default)]
    pub truncation_level: Option<f64>,
    pub investigation_time: f64,
    /// (magnitude, max distance km) knots; a single knot is a constant.
    pub integration_distance: Vec<(f64, f64)>,
    #[serde(default)]
    pub min_distance_km: f64,
    #[serde(default = "collapse_off")]
    pub collapse_level: i32,
    #[serde(default)]
    pub uniform_component: Option<HorizontalComponent>,
    #[serde(default)]
    pub keep_ctxs: bool,
}

fn collapse_off() -> i32 {
    -1
}

impl CmakerConfig {
    /// Instantiate the maker this config describes.
    pub fn build(&self, registry: &GmmRegistry) -> Result<ContextMaker> {
        let branches = self
            .branches
            .iter()
            .map(|b| {
                Ok(GmmBranch {
                    gid: b.gid,
                    model: registry.create(&b.model, &b.params)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut grid = self.imtls.clone();
        grid.reindex();
        let params = MakerParams {
            truncation_level: self.truncation_level,
            investigation_time: self.investigation_time,
            int_dist: IntegrationDistance::new(self.integration_distance.clone())?,
            min_distance_km: self.min_distance_km,
            collapse: CollapseSpec {
                level: self.collapse_level,
            },
            uniform_component: self.uniform_component,
            keep_ctxs: self.keep_ctxs,
        };
        ContextMaker::new(self.trt.clone(), self.grp_id, branches, grid, params)
    }
}

/// Reconstruct every maker from a serialized calculation description (a
/// JSON array of [`CmakerConfig`]).
pub fn read_cmakers(json: &str, registry: &GmmRegistry) -> Result<Vec<ContextMaker>> {
    let configs: Vec<CmakerConfig> = serde_json::from_str(json)?;
    configs.iter().map(|c| c.build(registry)).collect()
}

/// Reconstruct stored context batches (a JSON array of [`CtxArray`]),
/// concatenated per group id.
pub fn read_ctx_by_grp(json: &str) -> Result<BTreeMap<u32, CtxArray>> {
    let batches: Vec<CtxArray> = serde_json::from_str(json)?;
    let mut by_grp: BTreeMap<u32, CtxArray> = BTreeMap::new();
    for batch in batches {
        match by_grp.get_mut(&batch.grp_id) {
            None => {
                let _ = by_grp.insert(batch.grp_id, batch);
            }
            Some(existing) => existing.append(&batch)?,
        }
    }
    for ctx in by_grp.values_mut() {
        ctx.sort_by_mag();
    }
    Ok(by_grp)
}
