//! Occurrence models: Poissonian rates and discrete probability mass
//! functions over the number of occurrences.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{HazardError, Result};

/// Discrete probability mass function over the number of occurrences of a
/// rupture in the investigation time: `probs()[i]` is the probability of
/// exactly `i` occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pmf(Vec<f64>);

impl Pmf {
    /// Build a PMF, rejecting empty or negative inputs at setup time.
    pub fn new(probs: Vec<f64>) -> Result<Self> {
        if probs.is_empty() {
            return Err(HazardError::Config("empty probs_occur".into()));
        }
        if probs.iter().any(|p| *p < 0.0 || !p.is_finite()) {
            return Err(HazardError::Config(
                "probs_occur values must be finite and non-negative".into(),
            ));
        }
        Ok(Self(probs))
    }

    /// The occurrence probabilities, indexed by occurrence count.
    pub fn probs(&self) -> &[f64] {
        &self.0
    }

    /// Probability of no exceedance given a per-occurrence probability of
    /// exceedance: `Σᵢ pᵢ · (1 − poe)ⁱ`.
    pub fn pne(&self, poe: f64) -> f64 {
        let no_exceed = 1.0 - poe;
        let mut power = 1.0;
        let mut total = 0.0;
        for p in &self.0 {
            total += p * power;
            power *= no_exceed;
        }
        total
    }
}

/// Convolve two occurrence PMFs.
///
/// Used when collapsing two ruptures into one: the number of occurrences of
/// the combined rupture is the sum of the two independent counts. The result
/// has length `len(a) + len(b) − 1` and sums to `sum(a) · sum(b)`.
pub fn combine_pmf(a: &Pmf, b: &Pmf) -> Pmf {
    let (pa, pb) = (a.probs(), b.probs());
    let mut out = vec![0.0; pa.len() + pb.len() - 1];
    for (i, x) in pa.iter().enumerate() {
        for (j, y) in pb.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    Pmf(out)
}

/// How often a rupture occurs: either a Poissonian annual rate or an
/// explicit occurrence-count distribution (non-parametric ruptures).
///
/// This replaces the NaN-as-missing convention of record arrays: a context
/// row always carries exactly one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Occurrence {
    /// Poissonian occurrence with the given annual rate.
    Rate(f64),
    /// Explicit probability mass function over occurrence counts.
    /// Shared, since every site row of one rupture carries the same PMF.
    ProbsOccur(Arc<Pmf>),
}

impl Occurrence {
    /// Probability that this rupture produces no exceedance of a level
    /// with per-occurrence exceedance probability `poe`, over
    /// `time_span` years.
    ///
    /// Poissonian: `exp(−rate · T · poe)`. Non-parametric: the PMF sum,
    /// which already encodes the time span of the source model.
    pub fn pne(&self, poe: f64, time_span: f64) -> f64 {
        match self {
            Self::Rate(rate) => (-rate * time_span * poe).exp(),
            Self::ProbsOccur(pmf) => pmf.pne(poe),
        }
    }

    /// The Poissonian rate, if this is a parametric occurrence.
    pub fn rate(&self) -> Option<f64> {
        match self {
            Self::Rate(r) => Some(*r),
            Self::ProbsOccur(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pmf(probs: &[f64]) -> Pmf {
        Pmf::new(probs.to_vec()).unwrap()
    }

    #[test]
    fn combine_matches_reference_example() {
        let out = combine_pmf(&pmf(&[0.99, 0.01]), &pmf(&[0.98, 0.02]));
        let expect = [0.9702, 0.0296, 0.0002];
        for (got, want) in out.probs().iter().zip(expect) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
        assert!((out.probs().iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_or_negative_pmf_rejected() {
        assert!(Pmf::new(vec![]).is_err());
        assert!(Pmf::new(vec![0.5, -0.1]).is_err());
        assert!(Pmf::new(vec![0.5, f64::NAN]).is_err());
    }

    #[test]
    fn pmf_pne_is_polynomial_in_no_exceedance() {
        // P(0)=0.7, P(1)=0.2, P(2)=0.1 with poe=0.5:
        // 0.7 + 0.2*0.5 + 0.1*0.25 = 0.825
        let p = pmf(&[0.7, 0.2, 0.1]);
        assert!((p.pne(0.5) - 0.825).abs() < 1e-12);
        assert_eq!(p.pne(0.0), 1.0);
    }

    #[test]
    fn poisson_pne() {
        let occ = Occurrence::Rate(0.01);
        let pne = occ.pne(0.5, 1.0);
        assert!((pne - (-0.005f64).exp()).abs() < 1e-15);
        // zero rate contributes nothing
        assert_eq!(Occurrence::Rate(0.0).pne(0.9, 50.0), 1.0);
    }

    proptest! {
        #[test]
        fn combine_is_commutative_and_sum_preserving(
            a in proptest::collection::vec(0.0f64..1.0, 1..6),
            b in proptest::collection::vec(0.0f64..1.0, 1..6),
        ) {
            let (pa, pb) = (pmf(&a), pmf(&b));
            let ab = combine_pmf(&pa, &pb);
            let ba = combine_pmf(&pb, &pa);
            prop_assert_eq!(ab.probs().len(), a.len() + b.len() - 1);
            for (x, y) in ab.probs().iter().zip(ba.probs()) {
                prop_assert!((x - y).abs() < 1e-12);
            }
            let sum_a: f64 = a.iter().sum();
            let sum_b: f64 = b.iter().sum();
            let sum_ab: f64 = ab.probs().iter().sum();
            prop_assert!((sum_ab - sum_a * sum_b).abs() < 1e-9);
        }
    }
}
