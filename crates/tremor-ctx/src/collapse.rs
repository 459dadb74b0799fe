//! Optional lossy context collapsing.
//!
//! Collapsing coarsens distance precision and then merges rows that became
//! identical, summing their Poissonian rates. It is an explicitly
//! approximate speed/accuracy trade: higher levels round distances more
//! aggressively and merge more rows. Rows with explicit occurrence PMFs
//! are never merged.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tremor_core::pmf::Occurrence;
use tremor_core::{CtxArray, CtxRow, DistanceKind, Result};

/// Collapse configuration. `level < 0` disables collapsing entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseSpec {
    /// Coarsening aggressiveness: -1 off, 0 mild, 1 moderate, 2+ coarse.
    pub level: i32,
}

impl CollapseSpec {
    pub fn off() -> Self {
        Self { level: -1 }
    }

    pub fn is_off(&self) -> bool {
        self.level < 0
    }

    // Distance rounding step in km per level.
    fn dist_step(&self) -> f64 {
        match self.level {
            0 => 0.1,
            1 => 1.0,
            _ => 5.0,
        }
    }

    /// Whether a distance kind participates in coarsening. Signed offsets
    /// and closest-point coordinates keep full precision.
    fn coarsens(kind: DistanceKind) -> bool {
        matches!(
            kind,
            DistanceKind::Rrup
                | DistanceKind::Rjb
                | DistanceKind::Rhypo
                | DistanceKind::Repi
                | DistanceKind::Ry0
        )
    }

    /// Coarsen and merge one batch. The result has the same schema and
    /// magnitude; identical rows (same site, same rupture parameters, same
    /// rounded distances) collapse to one row with summed rates.
    pub fn apply(&self, ctx: CtxArray) -> Result<CtxArray> {
        if self.is_off() || ctx.is_empty() {
            return Ok(ctx);
        }
        let mut ctx = ctx;
        let step = self.dist_step();
        let schema = Arc::clone(ctx.schema());
        for kind in schema.dist.iter().copied().filter(|k| Self::coarsens(*k)) {
            if let Some(col) = ctx.dist_col_mut(kind) {
                for v in col {
                    *v = (*v / step).round() * step;
                }
            }
        }

        let before = ctx.len();
        let mut out = CtxArray::new(Arc::clone(&schema), ctx.grp_id);
        // key → (row index in `out`, accumulated rate)
        let mut seen: BTreeMap<Vec<u64>, usize> = BTreeMap::new();
        let mut rates: Vec<Option<f64>> = Vec::new();
        let mut keyed_rows: Vec<CtxRowOwned> = Vec::new();

        for n in 0..ctx.len() {
            let key = row_key(&ctx, n)?;
            let rate = match &ctx.occurrences()[n] {
                Occurrence::Rate(r) => Some(*r),
                Occurrence::ProbsOccur(_) => None,
            };
            match (rate, seen.get(&key)) {
                (Some(r), Some(&slot)) => {
                    // merge into the existing row
                    if let Some(acc) = &mut rates[slot] {
                        *acc += r;
                    }
                }
                (rate, _) => {
                    let slot = keyed_rows.len();
                    if rate.is_some() {
                        let _ = seen.insert(key, slot);
                    }
                    rates.push(rate);
                    keyed_rows.push(CtxRowOwned::capture(&ctx, n)?);
                }
            }
        }

        for (row, rate) in keyed_rows.iter().zip(&rates) {
            let occurrence = match rate {
                Some(r) => Occurrence::Rate(*r),
                None => row.occurrence.clone(),
            };
            out.push(CtxRow {
                mag: row.mag,
                occurrence: &occurrence,
                sid: row.sid,
                rup_id: row.rup_id,
                src_id: row.src_id,
                rup_vals: &row.rup_vals,
                site_vals: &row.site_vals,
                dist_vals: &row.dist_vals,
            })?;
        }
        if out.len() < before {
            debug!(level = self.level, before, after = out.len(), "collapsed context rows");
        }
        Ok(out)
    }
}

// Bit-exact row identity over everything but the occurrence.
fn row_key(ctx: &CtxArray, n: usize) -> Result<Vec<u64>> {
    let schema = ctx.schema();
    let mut key = Vec::with_capacity(2 + schema.rup.len() + schema.site.len() + schema.dist.len());
    key.push(u64::from(ctx.sids()[n]));
    key.push(ctx.mags()[n].to_bits());
    for p in &schema.rup {
        key.push(ctx.rup_col(*p)?[n].to_bits());
    }
    for p in &schema.site {
        key.push(ctx.site_col(*p)?[n].to_bits());
    }
    for p in &schema.dist {
        key.push(ctx.dist_col(*p)?[n].to_bits());
    }
    Ok(key)
}

struct CtxRowOwned {
    mag: f64,
    occurrence: Occurrence,
    sid: u32,
    rup_id: u64,
    src_id: u32,
    rup_vals: Vec<f64>,
    site_vals: Vec<f64>,
    dist_vals: Vec<f64>,
}

impl CtxRowOwned {
    fn capture(ctx: &CtxArray, n: usize) -> Result<Self> {
        let schema = ctx.schema();
        Ok(Self {
            mag: ctx.mags()[n],
            occurrence: ctx.occurrences()[n].clone(),
            sid: ctx.sids()[n],
            rup_id: ctx.rup_ids()[n],
            src_id: ctx.src_ids()[n],
            rup_vals: schema
                .rup
                .iter()
                .map(|p| Ok(ctx.rup_col(*p)?[n]))
                .collect::<Result<_>>()?,
            site_vals: schema
                .site
                .iter()
                .map(|p| Ok(ctx.site_col(*p)?[n]))
                .collect::<Result<_>>()?,
            dist_vals: schema
                .dist
                .iter()
                .map(|p| Ok(ctx.dist_col(*p)?[n]))
                .collect::<Result<_>>()?,
        })
    }
}
