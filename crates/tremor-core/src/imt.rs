//! Intensity measure types and level grids.
//!
//! An [`Imt`] names a scalar ground-motion quantity (PGA, PGV, spectral
//! acceleration at a period, macroseismic intensity). An [`ImtGrid`] maps an
//! ordered set of IMTs to their intensity measure levels and keeps a
//! flattened level array with per-IMT offsets, so hazard curves for all IMTs
//! live in one contiguous block.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{HazardError, Result};

/// SA periods are rounded to this many decimals so that `SA(0.1)` parsed
/// from different textual sources compares equal.
const PERIOD_DECIMALS: f64 = 1e6;

/// An intensity measure type.
///
/// Ground-motion models predict the distribution of one of these per site.
/// `Sa` carries its period in seconds; damping is fixed at the conventional
/// 5% and not modeled.
#[derive(Debug, Clone, Copy)]
pub enum Imt {
    /// Peak ground acceleration, in g.
    Pga,
    /// Peak ground velocity, in cm/s.
    Pgv,
    /// Spectral acceleration at the given period (seconds), in g.
    Sa(f64),
    /// Macroseismic intensity (normally distributed, not log-normally).
    Mmi,
}

impl Imt {
    /// Spectral acceleration with the period normalized for comparison.
    pub fn sa(period: f64) -> Self {
        Self::Sa((period * PERIOD_DECIMALS).round() / PERIOD_DECIMALS)
    }

    /// The period in seconds associated with this IMT, for
    /// period-dependent coefficient interpolation. PGA is treated as
    /// zero-period SA by convention.
    pub fn period(&self) -> f64 {
        match self {
            Self::Pga | Self::Pgv | Self::Mmi => 0.0,
            Self::Sa(p) => *p,
        }
    }

    /// Convert an intensity level to the space the ground-motion
    /// distribution lives in: natural log for log-normally distributed
    /// measures, identity for MMI.
    pub fn to_distribution(&self, value: f64) -> f64 {
        match self {
            Self::Mmi => value,
            _ => value.ln(),
        }
    }

    /// Inverse of [`Imt::to_distribution`].
    pub fn from_distribution(&self, value: f64) -> f64 {
        match self {
            Self::Mmi => value,
            _ => value.exp(),
        }
    }

    // Sort key: PGA first, then SA by ascending period, then PGV, then MMI.
    fn key(&self) -> (u8, u64) {
        match self {
            Self::Pga => (0, 0),
            Self::Sa(p) => (1, p.to_bits()),
            Self::Pgv => (2, 0),
            Self::Mmi => (3, 0),
        }
    }
}

impl PartialEq for Imt {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Imt {}

impl std::hash::Hash for Imt {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Imt {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Imt {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Imt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pga => write!(f, "PGA"),
            Self::Pgv => write!(f, "PGV"),
            Self::Mmi => write!(f, "MMI"),
            Self::Sa(p) => write!(f, "SA({p})"),
        }
    }
}

impl FromStr for Imt {
    type Err = HazardError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PGA" => Ok(Self::Pga),
            "PGV" => Ok(Self::Pgv),
            "MMI" => Ok(Self::Mmi),
            _ => {
                let period = s
                    .strip_prefix("SA(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|p| p.parse::<f64>().ok())
                    .filter(|p| *p > 0.0)
                    .ok_or_else(|| HazardError::Config(format!("unknown IMT `{s}`")))?;
                Ok(Self::sa(period))
            }
        }
    }
}

impl Serialize for Imt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Imt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// An ordered IMT → intensity-measure-levels mapping.
///
/// Levels are stored per IMT and also flattened into one array of length
/// `L = Σ len(levels)`, with per-IMT offset ranges. Probability maps and
/// hazard curves are indexed against the flattened array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImtGrid {
    entries: Vec<(Imt, Vec<f64>)>,
    #[serde(skip)]
    offsets: Vec<usize>,
}

impl ImtGrid {
    /// Build a grid from (IMT, levels) pairs. The pairs are sorted by IMT;
    /// each level list must be non-empty, positive and strictly increasing.
    pub fn new(mut entries: Vec<(Imt, Vec<f64>)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(HazardError::Config("empty IMT grid".into()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (imt, levels) in &entries {
            if levels.is_empty() {
                return Err(HazardError::Config(format!("no levels for {imt}")));
            }
            let increasing = levels.windows(2).all(|w| w[0] < w[1]);
            if !increasing || levels[0] <= 0.0 {
                return Err(HazardError::Config(format!(
                    "levels for {imt} must be positive and strictly increasing"
                )));
            }
        }
        for pair in entries.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(HazardError::Config(format!("duplicate IMT {}", pair[0].0)));
            }
        }
        let offsets = Self::compute_offsets(&entries);
        Ok(Self { entries, offsets })
    }

    fn compute_offsets(entries: &[(Imt, Vec<f64>)]) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(entries.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for (_, levels) in entries {
            total += levels.len();
            offsets.push(total);
        }
        offsets
    }

    /// Number of IMTs (the M dimension).
    pub fn num_imts(&self) -> usize {
        self.entries.len()
    }

    /// Total number of levels across all IMTs (the L dimension).
    pub fn num_levels(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    /// The IMTs in grid order.
    pub fn imts(&self) -> impl Iterator<Item = &Imt> {
        self.entries.iter().map(|(imt, _)| imt)
    }

    /// Levels for the m-th IMT.
    pub fn levels(&self, m: usize) -> &[f64] {
        &self.entries[m].1
    }

    /// The m-th IMT.
    pub fn imt(&self, m: usize) -> &Imt {
        &self.entries[m].0
    }

    /// Range of the m-th IMT's levels inside the flattened level array.
    pub fn level_range(&self, m: usize) -> std::ops::Range<usize> {
        self.offsets[m]..self.offsets[m + 1]
    }

    /// Levels of the m-th IMT converted to distribution space (ln for
    /// log-normal measures).
    pub fn distribution_levels(&self, m: usize) -> Vec<f64> {
        let imt = &self.entries[m].0;
        self.entries[m].1.iter().map(|x| imt.to_distribution(*x)).collect()
    }

    /// Rebuild the offset table after deserialization.
    pub fn reindex(&mut self) {
        self.offsets = Self::compute_offsets(&self.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn imt_string_round_trip() {
        for s in ["PGA", "PGV", "MMI", "SA(0.1)", "SA(1)"] {
            let imt: Imt = s.parse().unwrap();
            let back: Imt = imt.to_string().parse().unwrap();
            assert_eq!(imt, back);
        }
    }

    #[test]
    fn sa_periods_compare_after_normalization() {
        assert_eq!(Imt::sa(0.1), "SA(0.1)".parse().unwrap());
        assert_ne!(Imt::sa(0.1), Imt::sa(0.2));
    }

    #[test]
    fn unknown_imt_is_config_error() {
        let err = "PGX".parse::<Imt>().unwrap_err();
        assert_matches!(err, HazardError::Config(_));
        let err = "SA(-1.0)".parse::<Imt>().unwrap_err();
        assert_matches!(err, HazardError::Config(_));
    }

    #[test]
    fn imts_sort_pga_then_sa_by_period() {
        let mut imts = vec![Imt::Pgv, Imt::sa(1.0), Imt::Pga, Imt::sa(0.2)];
        imts.sort();
        assert_eq!(imts, vec![Imt::Pga, Imt::sa(0.2), Imt::sa(1.0), Imt::Pgv]);
    }

    #[test]
    fn grid_flattens_levels_with_offsets() {
        let grid = ImtGrid::new(vec![
            (Imt::sa(1.0), vec![0.01, 0.02]),
            (Imt::Pga, vec![0.1, 0.2, 0.4]),
        ])
        .unwrap();
        assert_eq!(grid.num_imts(), 2);
        assert_eq!(grid.num_levels(), 5);
        // PGA sorts first
        assert_eq!(grid.imt(0), &Imt::Pga);
        assert_eq!(grid.level_range(0), 0..3);
        assert_eq!(grid.level_range(1), 3..5);
    }

    #[test]
    fn grid_rejects_non_increasing_levels() {
        let err = ImtGrid::new(vec![(Imt::Pga, vec![0.2, 0.1])]).unwrap_err();
        assert_matches!(err, HazardError::Config(_));
    }

    #[test]
    fn grid_rejects_duplicate_imts() {
        let err =
            ImtGrid::new(vec![(Imt::Pga, vec![0.1]), (Imt::Pga, vec![0.2])]).unwrap_err();
        assert_matches!(err, HazardError::Config(_));
    }

    #[test]
    fn mmi_levels_stay_linear() {
        assert_eq!(Imt::Mmi.to_distribution(5.0), 5.0);
        assert!((Imt::Pga.to_distribution(0.1) - 0.1f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn grid_serde_round_trip() {
        let grid = ImtGrid::new(vec![(Imt::Pga, vec![0.1, 0.2])]).unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        let mut back: ImtGrid = serde_json::from_str(&json).unwrap();
        back.reindex();
        assert_eq!(back.num_levels(), 2);
        assert_eq!(back.level_range(0), 0..2);
    }
}
