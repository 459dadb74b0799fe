//! Per-site probability and rate planes.
//!
//! A [`MapArray`] maps site ids to [L × G] planes (flattened intensity
//! levels × model branches). Planes materialize on first touch at the
//! accumulation identity, so merging maps from independently processed
//! source partitions is commutative and associative: missing planes act as
//! the identity element.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tremor_core::{HazardError, Result};

/// How planes accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccumMode {
    /// Multiplicative no-exceedance accumulation (independent ruptures):
    /// planes start at 1 and hold `∏ pneᵢ`; the final probability of
    /// exceedance is `1 − plane`.
    PneProduct,
    /// Additive accumulation (mutually exclusive ruptures, or rates):
    /// planes start at 0 and hold `Σ wᵢ·poeᵢ` directly.
    Sum,
}

impl AccumMode {
    fn identity(self) -> f64 {
        match self {
            Self::PneProduct => 1.0,
            Self::Sum => 0.0,
        }
    }
}

/// Site id → [L × G] accumulation plane.
#[derive(Debug, Clone, PartialEq)]
pub struct MapArray {
    mode: AccumMode,
    shape: (usize, usize),
    planes: BTreeMap<u32, Array2<f64>>,
}

impl MapArray {
    pub fn new(mode: AccumMode, num_levels: usize, num_branches: usize) -> Self {
        Self {
            mode,
            shape: (num_levels, num_branches),
            planes: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> AccumMode {
        self.mode
    }

    /// (L, G) plane shape.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of touched sites.
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Touched site ids, ascending.
    pub fn sids(&self) -> impl Iterator<Item = u32> + '_ {
        self.planes.keys().copied()
    }

    /// The plane for a site, created at the identity on first access.
    pub fn plane_mut(&mut self, sid: u32) -> &mut Array2<f64> {
        let (l, g) = self.shape;
        let identity = self.mode.identity();
        self.planes
            .entry(sid)
            .or_insert_with(|| Array2::from_elem((l, g), identity))
    }

    /// The plane for a site, if touched.
    pub fn plane(&self, sid: u32) -> Option<&Array2<f64>> {
        self.planes.get(&sid)
    }

    /// The probability-of-exceedance plane for a site: `1 − ∏pne` in
    /// product mode, the accumulated sum otherwise.
    pub fn poes(&self, sid: u32) -> Option<Array2<f64>> {
        let plane = self.planes.get(&sid)?;
        Some(match self.mode {
            AccumMode::PneProduct => plane.mapv(|pne| 1.0 - pne),
            AccumMode::Sum => plane.clone(),
        })
    }

    /// Merge another map into this one. Missing planes on either side act
    /// as the identity, so merge order never matters.
    pub fn merge(&mut self, other: MapArray) -> Result<()> {
        if other.mode != self.mode || other.shape != self.shape {
            return Err(HazardError::Config(
                "cannot merge maps with different modes or shapes".into(),
            ));
        }
        for (sid, theirs) in other.planes {
            match self.planes.get_mut(&sid) {
                None => {
                    let _ = self.planes.insert(sid, theirs);
                }
                Some(ours) => match self.mode {
                    AccumMode::PneProduct => *ours *= &theirs,
                    AccumMode::Sum => *ours += &theirs,
                },
            }
        }
        Ok(())
    }

    /// Convert accumulated probabilities to annual rates,
    /// `r = −ln(1 − p) / T`. The result is a Sum-mode map.
    pub fn to_rates(&self, time_span: f64) -> MapArray {
        let planes = self
            .planes
            .iter()
            .map(|(sid, plane)| {
                let rates = match self.mode {
                    // product mode holds pne, so 1 − p = pne directly
                    AccumMode::PneProduct => plane.mapv(|pne| -pne.ln() / time_span),
                    AccumMode::Sum => plane.mapv(|p| -(1.0 - p).ln() / time_span),
                };
                (*sid, rates)
            })
            .collect();
        MapArray {
            mode: AccumMode::Sum,
            shape: self.shape,
            planes,
        }
    }

    /// Inverse of [`MapArray::to_rates`]: probabilities `1 − exp(−r·T)`
    /// from a Sum-mode rate map.
    pub fn rates_to_poes(&self, time_span: f64) -> MapArray {
        let planes = self
            .planes
            .iter()
            .map(|(sid, plane)| (*sid, plane.mapv(|r| -(-r * time_span).exp_m1())))
            .collect();
        MapArray {
            mode: AccumMode::Sum,
            shape: self.shape,
            planes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poe_map_with(sid: u32, pne: f64) -> MapArray {
        let mut map = MapArray::new(AccumMode::PneProduct, 2, 1);
        map.plane_mut(sid).fill(pne);
        map
    }

    #[test]
    fn untouched_sites_have_no_plane() {
        let mut map = MapArray::new(AccumMode::PneProduct, 3, 2);
        assert!(map.is_empty());
        assert!(map.poes(5).is_none());
        assert_eq!(map.plane_mut(5)[[0, 0]], 1.0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn product_mode_accumulates_pne() {
        let mut map = MapArray::new(AccumMode::PneProduct, 1, 1);
        *map.plane_mut(0) *= 0.9;
        *map.plane_mut(0) *= 0.8;
        let poes = map.poes(0).unwrap();
        assert!((poes[[0, 0]] - (1.0 - 0.72)).abs() < 1e-12);
    }

    #[test]
    fn merge_is_order_independent() {
        let a = poe_map_with(0, 0.9);
        let b = poe_map_with(0, 0.8);
        let c = poe_map_with(1, 0.5);

        let mut ab = a.clone();
        ab.merge(b.clone()).unwrap();
        ab.merge(c.clone()).unwrap();

        let mut cb = c;
        cb.merge(b).unwrap();
        cb.merge(a).unwrap();

        assert_eq!(ab, cb);
        assert!((ab.plane(0).unwrap()[[0, 0]] - 0.72).abs() < 1e-12);
        assert_eq!(ab.plane(1).unwrap()[[0, 0]], 0.5);
    }

    #[test]
    fn mode_mismatch_rejected() {
        let mut a = MapArray::new(AccumMode::PneProduct, 1, 1);
        assert!(a.merge(MapArray::new(AccumMode::Sum, 1, 1)).is_err());
        assert!(a.merge(MapArray::new(AccumMode::PneProduct, 2, 1)).is_err());
    }

    #[test]
    fn rate_conversion_round_trips() {
        let map = poe_map_with(0, 0.95); // poe = 0.05
        let rates = map.to_rates(50.0);
        let back = rates.rates_to_poes(50.0);
        assert!((back.plane(0).unwrap()[[0, 0]] - 0.05).abs() < 1e-12);
        // r = −ln(0.95)/50
        let expect = -(0.95f64.ln()) / 50.0;
        assert!((rates.plane(0).unwrap()[[0, 0]] - expect).abs() < 1e-15);
    }
}
