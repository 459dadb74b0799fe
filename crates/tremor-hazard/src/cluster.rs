//! Clustered source groups.
//!
//! A cluster fires as a whole: the number of times its ruptures occur
//! together follows an explicit occurrence-count distribution instead of
//! independent Poissonian draws. The group is first accumulated as if one
//! occurrence happened, then the resulting no-exceedance plane is
//! re-combined across the count distribution.

use tremor_core::pmf::Pmf;
use tremor_core::{HazardError, Result};
use tremor_ctx::{AccumMode, MapArray};

/// Occurrence-count distribution of a clustered group.
#[derive(Debug, Clone)]
pub struct ClusterModel {
    counts: Pmf,
}

impl ClusterModel {
    pub fn new(counts: Pmf) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &Pmf {
        &self.counts
    }

    /// Re-combine a group's no-exceedance planes across the count
    /// distribution: a plane value `q` (pne of one cluster occurrence)
    /// becomes `Σₙ P(n) · qⁿ`.
    ///
    /// Only product-mode maps carry per-occurrence pne, so any other mode
    /// is a configuration error.
    pub fn apply(&self, map: &mut MapArray) -> Result<()> {
        if map.mode() != AccumMode::PneProduct {
            return Err(HazardError::Config(
                "cluster models apply to no-exceedance maps only".into(),
            ));
        }
        let sids: Vec<u32> = map.sids().collect();
        for sid in sids {
            map.plane_mut(sid)
                .mapv_inplace(|pne| self.counts.pne(1.0 - pne));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(probs: &[f64]) -> ClusterModel {
        ClusterModel::new(Pmf::new(probs.to_vec()).unwrap())
    }

    #[test]
    fn certain_single_occurrence_is_identity() {
        let mut map = MapArray::new(AccumMode::PneProduct, 1, 1);
        map.plane_mut(0).fill(0.8);
        model(&[0.0, 1.0]).apply(&mut map).unwrap();
        assert!((map.plane(0).unwrap()[[0, 0]] - 0.8).abs() < 1e-15);
    }

    #[test]
    fn count_distribution_mixes_powers_of_pne() {
        // P(0)=0.5, P(1)=0.3, P(2)=0.2 with q=0.9:
        // 0.5 + 0.3*0.9 + 0.2*0.81 = 0.932
        let mut map = MapArray::new(AccumMode::PneProduct, 1, 1);
        map.plane_mut(0).fill(0.9);
        model(&[0.5, 0.3, 0.2]).apply(&mut map).unwrap();
        assert!((map.plane(0).unwrap()[[0, 0]] - 0.932).abs() < 1e-12);
    }

    #[test]
    fn sum_mode_rejected() {
        let mut map = MapArray::new(AccumMode::Sum, 1, 1);
        assert!(model(&[1.0]).apply(&mut map).is_err());
    }
}
