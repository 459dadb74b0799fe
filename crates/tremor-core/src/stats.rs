//! Truncated-normal survival functions.
//!
//! Probability of exceedance is computed as the survival function of a
//! standard normal distribution, optionally symmetrically truncated at
//! `±truncation_level` sigmas. With truncation the survival function is
//! `SF(x) = (Φ(b) − Φ(x)) / (2Φ(b) − 1)` clipped to [0, 1], where `b` is
//! the truncation level and `Φ` the standard normal CDF.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::errors::{HazardError, Result};

/// Standard normal cumulative distribution function.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Standard normal survival function, `1 − Φ(x)` computed as `Φ(−x)`.
pub fn norm_sf(x: f64) -> f64 {
    norm_cdf(-x)
}

/// Epsilon-truncation policy for the ground-motion distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Truncation {
    /// No truncation: plain Gaussian over the whole real line. This is
    /// the default and effectively disables epsilon truncation.
    None,
    /// Zero truncation: the mean is treated as an exact value. The
    /// survival function becomes a step: 1 below the mean, 0 above.
    /// Sigma is not consulted in this mode.
    Step,
    /// Symmetric truncation at the given positive number of sigmas.
    Sigma(f64),
}

impl Default for Truncation {
    fn default() -> Self {
        Self::None
    }
}

impl Truncation {
    /// Build from an optional numeric truncation level, rejecting
    /// negative values at setup time.
    pub fn from_level(level: Option<f64>) -> Result<Self> {
        match level {
            None => Ok(Self::None),
            Some(t) if t == 0.0 => Ok(Self::Step),
            Some(t) if t > 0.0 => Ok(Self::Sigma(t)),
            Some(t) => Err(HazardError::Config(format!(
                "truncation level must be zero, positive or unset, got {t}"
            ))),
        }
    }

    /// Whether this policy needs a strictly positive standard deviation.
    /// A zero sigma under positive or absent truncation is a fatal
    /// model/parameter mismatch.
    pub fn requires_positive_sigma(&self) -> bool {
        !matches!(self, Self::Step)
    }

    /// Survival function at `x`, expressed in units of sigma from the
    /// mean. Result is always within [0, 1].
    pub fn sf(&self, x: f64) -> f64 {
        match self {
            Self::None => norm_sf(x),
            Self::Step => {
                if x <= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Sigma(b) => {
                let phi_b = norm_cdf(*b);
                let z = phi_b.mul_add(2.0, -1.0);
                ((phi_b - norm_cdf(x)) / z).clamp(0.0, 1.0)
            }
        }
    }
}
