//! Ruptures: a planar surface plus magnitude, rake, hypocenter and an
//! occurrence model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tremor_core::ctx::round_mag;
use tremor_core::pmf::{combine_pmf, Occurrence};
use tremor_core::{HazardError, Result};

use crate::geo::PlanarSurface;

/// One earthquake rupture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rupture {
    /// Moment magnitude.
    pub mag: f64,
    /// Rake angle, decimal degrees.
    pub rake: f64,
    /// The rupture surface.
    pub surface: PlanarSurface,
    /// Hypocenter longitude, decimal degrees.
    pub hypo_lon: f64,
    /// Hypocenter latitude, decimal degrees.
    pub hypo_lat: f64,
    /// Hypocenter depth, km.
    pub hypo_depth: f64,
    /// Poissonian rate or explicit occurrence-count PMF.
    pub occurrence: Occurrence,
    /// Cache key shared by ruptures reusing one fault surface. Multi-fault
    /// sources produce many ruptures over few distinct surfaces; the
    /// context builder uses this to avoid recomputing surface distances.
    pub surface_key: Option<u64>,
}

impl Rupture {
    /// A rupture with a centered hypocenter at the given depth, no
    /// surface sharing.
    pub fn new(mag: f64, rake: f64, surface: PlanarSurface, hypo_depth: f64, occurrence: Occurrence) -> Self {
        Self {
            mag,
            rake,
            hypo_lon: surface.lon,
            hypo_lat: surface.lat,
            hypo_depth,
            surface,
            occurrence,
            surface_key: None,
        }
    }

    /// Collapse another rupture of the same rounded magnitude into this
    /// one, keeping this rupture's geometry. Poissonian rates add;
    /// explicit occurrence PMFs convolve (the combined count is the sum
    /// of the two independent counts). Mixing the two occurrence kinds
    /// has no meaningful combination and is rejected.
    pub fn collapse_with(&self, other: &Rupture) -> Result<Rupture> {
        if round_mag(self.mag).to_bits() != round_mag(other.mag).to_bits() {
            return Err(HazardError::Config(format!(
                "cannot collapse ruptures of magnitudes {} and {}",
                self.mag, other.mag
            )));
        }
        let occurrence = match (&self.occurrence, &other.occurrence) {
            (Occurrence::Rate(a), Occurrence::Rate(b)) => Occurrence::Rate(a + b),
            (Occurrence::ProbsOccur(a), Occurrence::ProbsOccur(b)) => {
                Occurrence::ProbsOccur(Arc::new(combine_pmf(a, b)))
            }
            _ => {
                return Err(HazardError::Config(
                    "cannot collapse a Poissonian rupture with a non-parametric one".into(),
                ))
            }
        };
        Ok(Rupture {
            occurrence,
            ..self.clone()
        })
    }
}
