//! Tabulated ground-motion model.
//!
//! Some regions publish ground motion as lookup tables rather than
//! functional forms. [`TableGmm`] carries, per IMT, a grid of ln-medians
//! over magnitude × distance and a constant total sigma, and interpolates
//! bilinearly (linear in magnitude, linear in log distance). Anything
//! outside the grid is an out-of-domain error, never an extrapolation.

use ndarray::ArrayViewMut2;
use serde::{Deserialize, Serialize};
use tremor_core::{CtxView, DistanceKind, HazardError, Imt, Result};

use crate::caps::{Capabilities, ImtClass};
use crate::model::GroundMotionModel;

/// One IMT's grid: `ln_medians[i * dists.len() + j]` for magnitude `i`
/// and distance `j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImtTable {
    pub imt: Imt,
    pub ln_medians: Vec<f64>,
    pub sigma: f64,
}

/// Serialized form of a [`TableGmm`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableGmmSpec {
    pub name: String,
    pub trt: String,
    /// The distance measure the grid is tabulated against.
    pub dist: DistanceKind,
    /// Ascending magnitudes.
    pub mags: Vec<f64>,
    /// Ascending distances in km (all positive).
    pub dists: Vec<f64>,
    pub tables: Vec<ImtTable>,
}

#[derive(Debug)]
pub struct TableGmm {
    spec: TableGmmSpec,
    caps: Capabilities,
}

impl TableGmm {
    pub fn new(spec: TableGmmSpec) -> Result<Self> {
        if spec.mags.len() < 2 || !ascending(&spec.mags) {
            return Err(HazardError::Config(format!(
                "{}: magnitudes must be ascending, at least two",
                spec.name
            )));
        }
        if spec.dists.len() < 2 || !ascending(&spec.dists) || spec.dists[0] <= 0.0 {
            return Err(HazardError::Config(format!(
                "{}: distances must be positive ascending, at least two",
                spec.name
            )));
        }
        if spec.tables.is_empty() {
            return Err(HazardError::Config(format!("{}: no IMT tables", spec.name)));
        }
        let cells = spec.mags.len() * spec.dists.len();
        for table in &spec.tables {
            if table.ln_medians.len() != cells {
                return Err(HazardError::Config(format!(
                    "{}: grid for {} has {} cells, expected {cells}",
                    spec.name,
                    table.imt,
                    table.ln_medians.len()
                )));
            }
            if table.sigma <= 0.0 {
                return Err(HazardError::Config(format!(
                    "{}: sigma for {} must be positive",
                    spec.name, table.imt
                )));
            }
        }
        let mut caps = Capabilities::new(spec.trt.clone());
        caps.imts.extend(spec.tables.iter().map(|t| ImtClass::from(&t.imt)));
        let _ = caps.requires_dist.insert(spec.dist);
        Ok(Self { spec, caps })
    }

    fn table(&self, imt: &Imt) -> Result<&ImtTable> {
        self.spec
            .tables
            .iter()
            .find(|t| t.imt == *imt)
            .ok_or_else(|| HazardError::UnsupportedImt {
                model: self.spec.name.clone(),
                imt: imt.to_string(),
            })
    }

    fn ln_median(&self, table: &ImtTable, mag: f64, dist: f64) -> Result<f64> {
        let mags = &self.spec.mags;
        let dists = &self.spec.dists;
        if mag < mags[0] || mag > mags[mags.len() - 1] {
            return Err(HazardError::OutOfDomain {
                model: self.spec.name.clone(),
                what: "magnitude",
                value: mag,
            });
        }
        if dist < dists[0] || dist > dists[dists.len() - 1] {
            return Err(HazardError::OutOfDomain {
                model: self.spec.name.clone(),
                what: "distance",
                value: dist,
            });
        }
        let i = bracket(mags, mag);
        let j = bracket(dists, dist);
        let tm = (mag - mags[i]) / (mags[i + 1] - mags[i]);
        let td = (dist.ln() - dists[j].ln()) / (dists[j + 1].ln() - dists[j].ln());
        let w = dists.len();
        let at = |i: usize, j: usize| table.ln_medians[i * w + j];
        let lo = at(i, j) + td * (at(i, j + 1) - at(i, j));
        let hi = at(i + 1, j) + td * (at(i + 1, j + 1) - at(i + 1, j));
        Ok(lo + tm * (hi - lo))
    }
}

fn ascending(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

// Index of the left edge of the bracketing interval; `x` must be in range.
fn bracket(values: &[f64], x: f64) -> usize {
    let mut i = 0;
    while i + 2 < values.len() && x > values[i + 1] {
        i += 1;
    }
    i
}

impl GroundMotionModel for TableGmm {
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
        let dists = ctx.dist(self.spec.dist)?;
        let mag = ctx.mag();
        for (m, imt) in imts.iter().enumerate() {
            let table = self.table(imt)?;
            for (n, dist) in dists.iter().enumerate() {
                mean[[m, n]] = self.ln_median(table, mag, *dist)?;
                sig[[m, n]] = table.sigma;
            }
        }
        Ok(())
    }
}
