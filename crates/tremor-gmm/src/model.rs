//! The ground-motion model contract.

use ndarray::ArrayViewMut2;
use tremor_core::{CtxView, Imt, Result};

use crate::caps::Capabilities;

/// A ground-motion model: maps rupture+site+distance contexts to the
/// parameters of a (log-)normal ground-motion distribution.
///
/// # Contract
///
/// `compute` receives a context view whose rows all share one rounded
/// magnitude, plus the list of requested IMTs, and fills four M×n output
/// views (M = number of IMTs, n = rows in the view):
///
/// - `mean` in natural-log space (linear for MMI-class measures),
/// - `sig`/`tau`/`phi` (total / between-event / within-event standard
///   deviations) in linear space. Models with [`tremor_core::StdDevSupport::TotalOnly`]
///   leave `tau` and `phi` untouched (zero).
///
/// A model must not fail for inputs within its declared required-parameter
/// domain; table-backed models may return
/// [`tremor_core::HazardError::OutOfDomain`] for magnitudes, distances or
/// periods their tables do not cover, and that error propagates unchanged
/// to the caller — it indicates a model/input mismatch, not a retryable
/// condition.
pub trait GroundMotionModel: Send + Sync + std::fmt::Debug {
    /// Model name as registered (used in error messages and bookkeeping).
    fn name(&self) -> &str;

    /// The declared capability set.
    fn caps(&self) -> &Capabilities;

    /// Fill mean/sigma/tau/phi for every (IMT, context row) pair.
    fn compute(
        &self,
        ctx: &CtxView<'_>,
        imts: &[Imt],
        mean: ArrayViewMut2<'_, f64>,
        sig: ArrayViewMut2<'_, f64>,
        tau: ArrayViewMut2<'_, f64>,
        phi: ArrayViewMut2<'_, f64>,
    ) -> Result<()>;
}
