//! Constant-distribution model for scenarios and calibration tests.

use std::collections::BTreeMap;

use ndarray::ArrayViewMut2;
use serde::{Deserialize, Serialize};
use tremor_core::{CtxView, HazardError, Imt, Result};

use crate::caps::{Capabilities, ImtClass};
use crate::model::GroundMotionModel;

/// Per-IMT distribution parameters. The median is given in the IMT's
/// natural units (g, cm/s, or intensity) and stored in distribution space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedEntry {
    pub median: f64,
    pub sigma: f64,
}

/// Serialized form of a [`FixedDistribution`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedDistributionSpec {
    pub name: String,
    pub trt: String,
    pub entries: BTreeMap<Imt, FixedEntry>,
}

/// A model predicting the same distribution everywhere, regardless of
/// magnitude, distance or site. Its requirement sets are empty, so it can
/// run against any context schema.
#[derive(Debug)]
pub struct FixedDistribution {
    spec: FixedDistributionSpec,
    caps: Capabilities,
}

impl FixedDistribution {
    pub fn new(spec: FixedDistributionSpec) -> Result<Self> {
        if spec.entries.is_empty() {
            return Err(HazardError::Config(format!("{}: no IMT entries", spec.name)));
        }
        for (imt, entry) in &spec.entries {
            if entry.sigma < 0.0 {
                return Err(HazardError::Config(format!(
                    "{}: negative sigma for {imt}",
                    spec.name
                )));
            }
        }
        let mut caps = Capabilities::new(spec.trt.clone());
        caps.imts.extend(spec.entries.keys().map(ImtClass::from));
        Ok(Self { spec, caps })
    }
}

impl GroundMotionModel for FixedDistribution {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn caps(&self) -> &Capabilities {
        &self.caps
    }

    fn compute(
        &self,
        ctx: &CtxView<'_>,
        imts: &[Imt],
        mut mean: ArrayViewMut2<'_, f64>,
        mut sig: ArrayViewMut2<'_, f64>,
        _tau: ArrayViewMut2<'_, f64>,
        _phi: ArrayViewMut2<'_, f64>,
    ) -> Result<()> {
        for (m, imt) in imts.iter().enumerate() {
            let entry = self.spec.entries.get(imt).ok_or_else(|| {
                HazardError::UnsupportedImt {
                    model: self.spec.name.clone(),
                    imt: imt.to_string(),
                }
            })?;
            let mu = imt.to_distribution(entry.median);
            for n in 0..ctx.len() {
                mean[[m, n]] = mu;
                sig[[m, n]] = entry.sigma;
            }
        }
        Ok(())
    }
}
