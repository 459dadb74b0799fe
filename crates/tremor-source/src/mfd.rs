//! Magnitude-frequency distributions.
//!
//! An MFD discretizes a source's seismicity into (magnitude bin center,
//! annual occurrence rate) pairs. Rates are incremental per bin, not
//! cumulative.

use serde::{Deserialize, Serialize};
use tremor_core::{HazardError, Result};

/// A magnitude-frequency distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Mfd {
    /// Double-truncated Gutenberg-Richter: `log10 N(≥m) = a − b·m`
    /// between `min_mag` and `max_mag`, discretized into bins of
    /// `bin_width`.
    TruncatedGr {
        /// Productivity (log10 of the annual rate of events above zero).
        a_val: f64,
        /// Slope of the recurrence relation.
        b_val: f64,
        /// Minimum magnitude (inclusive bin edge).
        min_mag: f64,
        /// Maximum magnitude (inclusive bin edge).
        max_mag: f64,
        /// Discretization bin width.
        bin_width: f64,
    },
    /// Evenly discretized rates starting at `min_mag` with `bin_width`
    /// spacing.
    Discretized {
        /// Center of the first magnitude bin.
        min_mag: f64,
        /// Spacing between bin centers.
        bin_width: f64,
        /// Incremental annual rates, one per bin.
        rates: Vec<f64>,
    },
    /// Arbitrary (magnitude, rate) pairs.
    Arbitrary {
        /// Bin center magnitudes.
        mags: Vec<f64>,
        /// Incremental annual rates, parallel to `mags`.
        rates: Vec<f64>,
    },
}

impl Mfd {
    /// Validate shape invariants at setup time.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::TruncatedGr {
                b_val,
                min_mag,
                max_mag,
                bin_width,
                ..
            } => {
                if *b_val <= 0.0 || *bin_width <= 0.0 || max_mag < min_mag {
                    return Err(HazardError::Config(
                        "invalid truncated GR parameters".into(),
                    ));
                }
            }
            Self::Discretized { bin_width, rates, .. } => {
                if *bin_width <= 0.0 || rates.is_empty() {
                    return Err(HazardError::Config("invalid discretized MFD".into()));
                }
            }
            Self::Arbitrary { mags, rates } => {
                if mags.is_empty() || mags.len() != rates.len() {
                    return Err(HazardError::Config("invalid arbitrary MFD".into()));
                }
            }
        }
        Ok(())
    }

    /// The (bin center magnitude, incremental annual rate) pairs.
    pub fn annual_rates(&self) -> Vec<(f64, f64)> {
        match self {
            Self::TruncatedGr {
                a_val,
                b_val,
                min_mag,
                max_mag,
                bin_width,
            } => {
                let n_bins = (((max_mag - min_mag) / bin_width).round() as usize).max(1);
                (0..n_bins)
                    .map(|i| {
                        let lo = min_mag + i as f64 * bin_width;
                        let hi = (lo + bin_width).min(*max_mag);
                        let rate =
                            10f64.powf(a_val - b_val * lo) - 10f64.powf(a_val - b_val * hi);
                        ((lo + hi) / 2.0, rate)
                    })
                    .collect()
            }
            Self::Discretized {
                min_mag,
                bin_width,
                rates,
            } => rates
                .iter()
                .enumerate()
                .map(|(i, r)| (min_mag + i as f64 * bin_width, *r))
                .collect(),
            Self::Arbitrary { mags, rates } => {
                mags.iter().copied().zip(rates.iter().copied()).collect()
            }
        }
    }

    /// Largest magnitude with a non-zero rate, for maximum-distance
    /// lookups.
    pub fn max_mag(&self) -> f64 {
        self.annual_rates()
            .iter()
            .filter(|(_, r)| *r > 0.0)
            .map(|(m, _)| *m)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Total annual rate over all bins.
    pub fn total_rate(&self) -> f64 {
        self.annual_rates().iter().map(|(_, r)| r).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_gr_rates_decay_with_magnitude() {
        let mfd = Mfd::TruncatedGr {
            a_val: 4.0,
            b_val: 1.0,
            min_mag: 5.0,
            max_mag: 7.0,
            bin_width: 0.5,
        };
        mfd.validate().unwrap();
        let rates = mfd.annual_rates();
        assert_eq!(rates.len(), 4);
        for pair in rates.windows(2) {
            assert!(pair[0].1 > pair[1].1);
        }
        // total rate equals N(≥5) − N(≥7)
        let expect = 10f64.powf(4.0 - 5.0) - 10f64.powf(4.0 - 7.0);
        assert!((mfd.total_rate() - expect).abs() < 1e-12);
    }

    #[test]
    fn discretized_bin_centers() {
        let mfd = Mfd::Discretized {
            min_mag: 5.0,
            bin_width: 0.1,
            rates: vec![0.01, 0.002, 0.0005],
        };
        let rates = mfd.annual_rates();
        assert!((rates[2].0 - 5.2).abs() < 1e-12);
        assert!((mfd.max_mag() - 5.2).abs() < 1e-12);
    }

    #[test]
    fn invalid_parameters_rejected() {
        let bad = Mfd::TruncatedGr {
            a_val: 4.0,
            b_val: -1.0,
            min_mag: 5.0,
            max_mag: 7.0,
            bin_width: 0.5,
        };
        assert!(bad.validate().is_err());
        let bad = Mfd::Arbitrary {
            mags: vec![5.0],
            rates: vec![],
        };
        assert!(bad.validate().is_err());
    }
}
