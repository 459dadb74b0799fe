//! Fixed-layout context records.
//!
//! A context row pairs one rupture (or one collapsed group of same-magnitude
//! ruptures) with one site, carrying every rupture parameter, site parameter
//! and distance measure any active ground-motion model requires. The column
//! set is pinned by a [`CtxSchema`], computed once per `ContextMaker` as the
//! union of all its models' requirements — every batch produced for a
//! dispatch call has the same populated fields.
//!
//! Rows are stored struct-of-arrays ([`CtxArray`]) and are always grouped by
//! 3-decimal-rounded magnitude before mean/stddev computation: vectorized
//! model dispatch is magnitude-sensitive and batched per single magnitude
//! value.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{HazardError, Result};
use crate::pmf::Occurrence;

/// Round a magnitude to 3 decimals. Near-duplicate magnitudes collapse to
/// the same dispatch batch.
pub fn round_mag(mag: f64) -> f64 {
    (mag * 1000.0).round() / 1000.0
}

/// Named site parameters a model can require.
///
/// All parameters are materialized as `f64` columns; boolean flags
/// (`Vs30Measured`, `Backarc`) use 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteParam {
    /// Time-averaged shear-wave velocity in the top 30 m, in m/s.
    Vs30,
    /// Whether vs30 was measured (1) or inferred (0).
    Vs30Measured,
    /// Depth to the 1.0 km/s velocity horizon, in km.
    Z1pt0,
    /// Depth to the 2.5 km/s velocity horizon, in km.
    Z2pt5,
    /// Whether the site lies in the backarc (1) or forearc (0).
    Backarc,
    /// Site longitude in decimal degrees.
    Lon,
    /// Site latitude in decimal degrees.
    Lat,
}

/// Named rupture parameters a model can require.
///
/// The magnitude is not listed here: every context row carries it
/// unconditionally in its own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RupParam {
    /// Strike angle in decimal degrees.
    Strike,
    /// Dip angle in decimal degrees.
    Dip,
    /// Rake angle in decimal degrees.
    Rake,
    /// Depth to the top of the rupture, in km.
    Ztor,
    /// Depth to the bottom of the rupture, in km.
    Zbot,
    /// Down-dip rupture width, in km.
    Width,
    /// Hypocenter longitude in decimal degrees.
    HypoLon,
    /// Hypocenter latitude in decimal degrees.
    HypoLat,
    /// Hypocenter depth in km.
    HypoDepth,
}

/// Named scalar distance measures between a rupture and a site.
///
/// Multi-component measures decompose into paired scalar fields: a model
/// needing the closest rupture point declares both [`DistanceKind::CloseLon`]
/// and [`DistanceKind::CloseLat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    /// Closest distance to the rupture surface, in km.
    Rrup,
    /// Joyner-Boore distance (to the surface projection), in km.
    Rjb,
    /// Perpendicular distance to the top-edge projection, in km (signed).
    Rx,
    /// Horizontal distance off the rupture end, parallel to strike, in km.
    Ry0,
    /// Hypocentral distance, in km.
    Rhypo,
    /// Epicentral distance, in km.
    Repi,
    /// Longitude of the closest rupture point, in decimal degrees.
    CloseLon,
    /// Latitude of the closest rupture point, in decimal degrees.
    CloseLat,
}

impl fmt::Display for SiteParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Vs30 => "vs30",
            Self::Vs30Measured => "vs30measured",
            Self::Z1pt0 => "z1pt0",
            Self::Z2pt5 => "z2pt5",
            Self::Backarc => "backarc",
            Self::Lon => "lon",
            Self::Lat => "lat",
        };
        f.write_str(s)
    }
}

impl fmt::Display for RupParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Strike => "strike",
            Self::Dip => "dip",
            Self::Rake => "rake",
            Self::Ztor => "ztor",
            Self::Zbot => "zbot",
            Self::Width => "width",
            Self::HypoLon => "hypo_lon",
            Self::HypoLat => "hypo_lat",
            Self::HypoDepth => "hypo_depth",
        };
        f.write_str(s)
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Rrup => "rrup",
            Self::Rjb => "rjb",
            Self::Rx => "rx",
            Self::Ry0 => "ry0",
            Self::Rhypo => "rhypo",
            Self::Repi => "repi",
            Self::CloseLon => "clon",
            Self::CloseLat => "clat",
        };
        f.write_str(s)
    }
}

/// The fixed column set of a context array: the union of every active
/// model's requirements, sorted and deduplicated once at `ContextMaker`
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtxSchema {
    /// Rupture-level columns (magnitude excluded, always present).
    pub rup: Vec<RupParam>,
    /// Site-level columns.
    pub site: Vec<SiteParam>,
    /// Distance columns.
    pub dist: Vec<DistanceKind>,
}

impl CtxSchema {
    /// Build a schema from requirement unions, sorting and deduplicating.
    pub fn from_unions(
        rup: impl IntoIterator<Item = RupParam>,
        site: impl IntoIterator<Item = SiteParam>,
        dist: impl IntoIterator<Item = DistanceKind>,
    ) -> Self {
        let mut rup: Vec<_> = rup.into_iter().collect();
        let mut site: Vec<_> = site.into_iter().collect();
        let mut dist: Vec<_> = dist.into_iter().collect();
        rup.sort_unstable();
        rup.dedup();
        site.sort_unstable();
        site.dedup();
        dist.sort_unstable();
        dist.dedup();
        Self { rup, site, dist }
    }

    fn rup_index(&self, p: RupParam) -> Option<usize> {
        self.rup.iter().position(|x| *x == p)
    }

    fn site_index(&self, p: SiteParam) -> Option<usize> {
        self.site.iter().position(|x| *x == p)
    }

    fn dist_index(&self, p: DistanceKind) -> Option<usize> {
        self.dist.iter().position(|x| *x == p)
    }
}

/// One context row, borrowed column values ordered per the schema.
#[derive(Debug, Clone, Copy)]
pub struct CtxRow<'a> {
    /// Rupture magnitude (rounded on insertion).
    pub mag: f64,
    /// Occurrence model of the rupture.
    pub occurrence: &'a Occurrence,
    /// Site id within the full site collection.
    pub sid: u32,
    /// Globally unique rupture id (`source_offset + index`).
    pub rup_id: u64,
    /// Integer id of the producing source.
    pub src_id: u32,
    /// Values for `schema.rup`, in schema order.
    pub rup_vals: &'a [f64],
    /// Values for `schema.site`, in schema order.
    pub site_vals: &'a [f64],
    /// Values for `schema.dist`, in schema order.
    pub dist_vals: &'a [f64],
}

/// A batch of context rows in struct-of-arrays layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtxArray {
    schema: Arc<CtxSchema>,
    /// Tectonic-region-group id this batch belongs to.
    pub grp_id: u32,
    mag: Vec<f64>,
    occurrence: Vec<Occurrence>,
    sids: Vec<u32>,
    rup_ids: Vec<u64>,
    src_ids: Vec<u32>,
    rup_cols: Vec<Vec<f64>>,
    site_cols: Vec<Vec<f64>>,
    dist_cols: Vec<Vec<f64>>,
}

impl CtxArray {
    /// An empty array with the given pinned schema.
    pub fn new(schema: Arc<CtxSchema>, grp_id: u32) -> Self {
        let rup_cols = vec![Vec::new(); schema.rup.len()];
        let site_cols = vec![Vec::new(); schema.site.len()];
        let dist_cols = vec![Vec::new(); schema.dist.len()];
        Self {
            schema,
            grp_id,
            mag: Vec::new(),
            occurrence: Vec::new(),
            sids: Vec::new(),
            rup_ids: Vec::new(),
            src_ids: Vec::new(),
            rup_cols,
            site_cols,
            dist_cols,
        }
    }

    /// The pinned schema.
    pub fn schema(&self) -> &Arc<CtxSchema> {
        &self.schema
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.mag.len()
    }

    /// Whether the array has no rows.
    pub fn is_empty(&self) -> bool {
        self.mag.is_empty()
    }

    /// Append one row. The value slices must match the schema lengths.
    pub fn push(&mut self, row: CtxRow<'_>) -> Result<()> {
        if row.rup_vals.len() != self.schema.rup.len()
            || row.site_vals.len() != self.schema.site.len()
            || row.dist_vals.len() != self.schema.dist.len()
        {
            return Err(HazardError::Config(
                "context row does not match the pinned schema".into(),
            ));
        }
        self.mag.push(round_mag(row.mag));
        self.occurrence.push(row.occurrence.clone());
        self.sids.push(row.sid);
        self.rup_ids.push(row.rup_id);
        self.src_ids.push(row.src_id);
        for (col, v) in self.rup_cols.iter_mut().zip(row.rup_vals) {
            col.push(*v);
        }
        for (col, v) in self.site_cols.iter_mut().zip(row.site_vals) {
            col.push(*v);
        }
        for (col, v) in self.dist_cols.iter_mut().zip(row.dist_vals) {
            col.push(*v);
        }
        Ok(())
    }

    /// Append all rows of another array with the same schema.
    pub fn append(&mut self, other: &CtxArray) -> Result<()> {
        if other.schema != self.schema {
            return Err(HazardError::Config(
                "cannot append context arrays with different schemas".into(),
            ));
        }
        self.mag.extend_from_slice(&other.mag);
        self.occurrence.extend(other.occurrence.iter().cloned());
        self.sids.extend_from_slice(&other.sids);
        self.rup_ids.extend_from_slice(&other.rup_ids);
        self.src_ids.extend_from_slice(&other.src_ids);
        for (dst, src) in self.rup_cols.iter_mut().zip(&other.rup_cols) {
            dst.extend_from_slice(src);
        }
        for (dst, src) in self.site_cols.iter_mut().zip(&other.site_cols) {
            dst.extend_from_slice(src);
        }
        for (dst, src) in self.dist_cols.iter_mut().zip(&other.dist_cols) {
            dst.extend_from_slice(src);
        }
        Ok(())
    }

    /// Magnitudes, one per row (already rounded).
    pub fn mags(&self) -> &[f64] {
        &self.mag
    }

    /// Site ids, one per row.
    pub fn sids(&self) -> &[u32] {
        &self.sids
    }

    /// Rupture ids, one per row.
    pub fn rup_ids(&self) -> &[u64] {
        &self.rup_ids
    }

    /// Source ids, one per row.
    pub fn src_ids(&self) -> &[u32] {
        &self.src_ids
    }

    /// Occurrence models, one per row.
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrence
    }

    /// A rupture-parameter column.
    pub fn rup_col(&self, p: RupParam) -> Result<&[f64]> {
        self.schema
            .rup_index(p)
            .map(|i| self.rup_cols[i].as_slice())
            .ok_or_else(|| HazardError::MissingParam {
                kind: "rupture",
                name: p.to_string(),
            })
    }

    /// A site-parameter column.
    pub fn site_col(&self, p: SiteParam) -> Result<&[f64]> {
        self.schema
            .site_index(p)
            .map(|i| self.site_cols[i].as_slice())
            .ok_or_else(|| HazardError::MissingParam {
                kind: "site",
                name: p.to_string(),
            })
    }

    /// A distance column.
    pub fn dist_col(&self, p: DistanceKind) -> Result<&[f64]> {
        self.schema
            .dist_index(p)
            .map(|i| self.dist_cols[i].as_slice())
            .ok_or_else(|| HazardError::MissingParam {
                kind: "distance",
                name: p.to_string(),
            })
    }

    /// Mutable distance column, for precision coarsening.
    pub fn dist_col_mut(&mut self, p: DistanceKind) -> Option<&mut [f64]> {
        self.schema
            .dist_index(p)
            .map(|i| self.dist_cols[i].as_mut_slice())
    }

    /// Mutable site column, for precision coarsening.
    pub fn site_col_mut(&mut self, p: SiteParam) -> Option<&mut [f64]> {
        self.schema
            .site_index(p)
            .map(|i| self.site_cols[i].as_mut_slice())
    }

    /// Sort rows by rounded magnitude (stable: rows with equal magnitude
    /// keep their relative order).
    pub fn sort_by_mag(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|a, b| self.mag[*a].total_cmp(&self.mag[*b]));
        self.mag = gather(&self.mag, &order);
        self.occurrence = gather_cloned(&self.occurrence, &order);
        self.sids = gather(&self.sids, &order);
        self.rup_ids = gather(&self.rup_ids, &order);
        self.src_ids = gather(&self.src_ids, &order);
        for col in &mut self.rup_cols {
            *col = gather(col, &order);
        }
        for col in &mut self.site_cols {
            *col = gather(col, &order);
        }
        for col in &mut self.dist_cols {
            *col = gather(col, &order);
        }
    }

    /// Contiguous ranges of equal magnitude. Call [`CtxArray::sort_by_mag`]
    /// first; on unsorted input equal magnitudes may span several ranges
    /// (correct but slower downstream).
    pub fn mag_slices(&self) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut start = 0;
        for i in 1..=self.len() {
            if i == self.len() || self.mag[i] != self.mag[start] {
                out.push(start..i);
                start = i;
            }
        }
        out
    }

    /// A borrowed view over a row range.
    pub fn view(&self, range: Range<usize>) -> CtxView<'_> {
        CtxView { arr: self, range }
    }

    /// A view over the whole array.
    pub fn full_view(&self) -> CtxView<'_> {
        self.view(0..self.len())
    }
}

fn gather<T: Copy>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|i| values[*i]).collect()
}

fn gather_cloned<T: Clone>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|i| values[*i].clone()).collect()
}

/// A borrowed, contiguous slice of a [`CtxArray`].
///
/// Views handed to model dispatch always cover rows of a single rounded
/// magnitude.
#[derive(Debug, Clone)]
pub struct CtxView<'a> {
    arr: &'a CtxArray,
    range: Range<usize>,
}

impl<'a> CtxView<'a> {
    /// Number of rows in the view.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// The underlying row range.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// The (shared) magnitude of the view's rows.
    pub fn mag(&self) -> f64 {
        self.arr.mag[self.range.start]
    }

    /// Magnitudes, one per row.
    pub fn mags(&self) -> &'a [f64] {
        &self.arr.mag[self.range.clone()]
    }

    /// Site ids, one per row.
    pub fn sids(&self) -> &'a [u32] {
        &self.arr.sids[self.range.clone()]
    }

    /// Rupture ids, one per row.
    pub fn rup_ids(&self) -> &'a [u64] {
        &self.arr.rup_ids[self.range.clone()]
    }

    /// Occurrence models, one per row.
    pub fn occurrences(&self) -> &'a [Occurrence] {
        &self.arr.occurrence[self.range.clone()]
    }

    /// A rupture-parameter column restricted to the view.
    pub fn rup(&self, p: RupParam) -> Result<&'a [f64]> {
        Ok(&self.arr.rup_col(p)?[self.range.clone()])
    }

    /// A site-parameter column restricted to the view.
    pub fn site(&self, p: SiteParam) -> Result<&'a [f64]> {
        Ok(&self.arr.site_col(p)?[self.range.clone()])
    }

    /// A distance column restricted to the view.
    pub fn dist(&self, p: DistanceKind) -> Result<&'a [f64]> {
        Ok(&self.arr.dist_col(p)?[self.range.clone()])
    }

    /// A sub-view relative to this view's start.
    pub fn subview(&self, rel: Range<usize>) -> CtxView<'a> {
        let start = self.range.start + rel.start;
        let end = self.range.start + rel.end;
        CtxView {
            arr: self.arr,
            range: start..end,
        }
    }
}
