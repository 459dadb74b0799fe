//! Composite models wrapping other models.
//!
//! Each wrapper owns its inner model(s), derives its capability set from
//! them at construction, and implements [`GroundMotionModel`] itself, so
//! composites nest arbitrarily.

use ndarray::{Array2, ArrayViewMut2};
use tremor_core::{CtxView, HazardError, HorizontalComponent, Imt, Result, SiteParam, StdDevSupport};

use crate::caps::Capabilities;
use crate::imc::ComponentConverter;
use crate::model::GroundMotionModel;

const WEIGHT_TOL: f64 = 1e-6;

/// The weighted average of several models' distributions.
///
/// Means combine linearly; sigmas (and tau/phi, when every member
/// decomposes) combine as the square root of the weighted average of
/// variances. Members must share a tectonic region; the capability union
/// intersects IMT support and unions parameter requirements.
#[derive(Debug)]
pub struct WeightedAverage {
    name: String,
    caps: Capabilities,
    parts: Vec<(f64, Box<dyn GroundMotionModel>)>,
}

impl WeightedAverage {
    pub fn new(name: impl Into<String>, parts: Vec<(f64, Box<dyn GroundMotionModel>)>) -> Result<Self> {
        let name = name.into();
        if parts.is_empty() {
            return Err(HazardError::Config(format!("{name}: no member models")));
        }
        if parts.iter().any(|(w, _)| *w <= 0.0) {
            return Err(HazardError::Config(format!(
                "{name}: member weights must be positive"
            )));
        }
        let total: f64 = parts.iter().map(|(w, _)| w).sum();
        if (total - 1.0).abs() > WEIGHT_TOL {
            return Err(HazardError::Config(format!(
                "{name}: member weights sum to {total}, expected 1"
            )));
        }
        let first = parts[0].1.caps();
        for (_, model) in &parts[1..] {
            if model.caps().trt != first.trt {
                return Err(HazardError::Config(format!(
                    "{name}: member models span tectonic regions `{}` and `{}`",
                    first.trt,
                    model.caps().trt
                )));
            }
        }
        let caps = parts[1..]
            .iter()
            .fold(first.clone(), |acc, (_, model)| acc.union(model.caps()));
        Ok(Self { name, caps, parts })
    }
}

impl GroundMotionModel for WeightedAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn caps(&self) -> &Capabilities {
        &self.caps
    }

    fn compute(
        &self,
        ctx: &CtxView<'_>,
        imts: &[Imt],
        mut mean: ArrayViewMut2<'_, f64>,
        mut sig: ArrayViewMut2<'_, f64>,
        mut tau: ArrayViewMut2<'_, f64>,
        mut phi: ArrayViewMut2<'_, f64>,
    ) -> Result<()> {
        let shape = (imts.len(), ctx.len());
        mean.fill(0.0);
        sig.fill(0.0);
        tau.fill(0.0);
        phi.fill(0.0);
        let mut m_i = Array2::zeros(shape);
        let mut s_i = Array2::zeros(shape);
        let mut t_i = Array2::zeros(shape);
        let mut p_i = Array2::zeros(shape);
        for (w, model) in &self.parts {
            m_i.fill(0.0);
            s_i.fill(0.0);
            t_i.fill(0.0);
            p_i.fill(0.0);
            model.compute(ctx, imts, m_i.view_mut(), s_i.view_mut(), t_i.view_mut(), p_i.view_mut())?;
            // Accumulate variances; the sqrt happens once at the end.
            mean.scaled_add(*w, &m_i);
            sig.scaled_add(*w, &(&s_i * &s_i));
            tau.scaled_add(*w, &(&t_i * &t_i));
            phi.scaled_add(*w, &(&p_i * &p_i));
        }
        sig.mapv_inplace(f64::sqrt);
        tau.mapv_inplace(f64::sqrt);
        phi.mapv_inplace(f64::sqrt);
        Ok(())
    }
}

/// Adds a vs30-dependent amplification term on top of an inner model.
///
/// The ln-median gains `factor * ln(vs30 / 760)` (negative factors amplify
/// soft sites); the extra modeling uncertainty adds to total sigma in
/// quadrature. Decomposed sigma does not survive the overlay.
#[derive(Debug)]
pub struct SiteAmplification {
    name: String,
    caps: Capabilities,
    inner: Box<dyn GroundMotionModel>,
    factor: f64,
    extra_sigma: f64,
}

impl SiteAmplification {
    pub fn new(inner: Box<dyn GroundMotionModel>, factor: f64, extra_sigma: f64) -> Result<Self> {
        if extra_sigma < 0.0 {
            return Err(HazardError::Config(
                "site amplification extra sigma must be non-negative".into(),
            ));
        }
        let mut caps = inner.caps().clone();
        let _ = caps.requires_site.insert(SiteParam::Vs30);
        caps.stddev = StdDevSupport::TotalOnly;
        let name = format!("SiteAmplification[{}]", inner.name());
        Ok(Self { name, caps, inner, factor, extra_sigma })
    }
}

impl GroundMotionModel for SiteAmplification {
    fn name(&self) -> &str {
        &self.name
    }

    fn caps(&self) -> &Capabilities {
        &self.caps
    }

    fn compute(
        &self,
        ctx: &CtxView<'_>,
        imts: &[Imt],
        mut mean: ArrayViewMut2<'_, f64>,
        mut sig: ArrayViewMut2<'_, f64>,
        tau: ArrayViewMut2<'_, f64>,
        phi: ArrayViewMut2<'_, f64>,
    ) -> Result<()> {
        self.inner.compute(ctx, imts, mean.view_mut(), sig.view_mut(), tau, phi)?;
        let vs30 = ctx.site(SiteParam::Vs30)?;
        for m in 0..imts.len() {
            for (n, v) in vs30.iter().enumerate() {
                mean[[m, n]] += self.factor * (v / 760.0).ln();
                sig[[m, n]] = sig[[m, n]].hypot(self.extra_sigma);
            }
        }
        Ok(())
    }
}

/// Re-expresses an inner model in a different horizontal-component
/// convention.
#[derive(Debug)]
pub struct ComponentConverted {
    name: String,
    caps: Capabilities,
    inner: Box<dyn GroundMotionModel>,
    converter: ComponentConverter,
}

impl ComponentConverted {
    pub fn new(inner: Box<dyn GroundMotionModel>, target: HorizontalComponent) -> Self {
        let converter = ComponentConverter::new(inner.caps().component, target);
        let mut caps = inner.caps().clone();
        caps.component = target;
        // The conversion factor applies to total sigma only.
        caps.stddev = StdDevSupport::TotalOnly;
        let name = format!("ComponentConverted[{}]", inner.name());
        Self { name, caps, inner, converter }
    }
}

impl GroundMotionModel for ComponentConverted {
    fn name(&self) -> &str {
        &self.name
    }

    fn caps(&self) -> &Capabilities {
        &self.caps
    }

    fn compute(
        &self,
        ctx: &CtxView<'_>,
        imts: &[Imt],
        mut mean: ArrayViewMut2<'_, f64>,
        mut sig: ArrayViewMut2<'_, f64>,
        tau: ArrayViewMut2<'_, f64>,
        phi: ArrayViewMut2<'_, f64>,
    ) -> Result<()> {
        self.inner.compute(ctx, imts, mean.view_mut(), sig.view_mut(), tau, phi)?;
        if self.converter.is_identity() {
            return Ok(());
        }
        for (m, imt) in imts.iter().enumerate() {
            let mut mean_row = mean.row_mut(m);
            let mut sig_row = sig.row_mut(m);
            let (Some(mean_row), Some(sig_row)) =
                (mean_row.as_slice_mut(), sig_row.as_slice_mut())
            else {
                return Err(HazardError::Config(
                    "output views must be contiguous".into(),
                ));
            };
            self.converter.apply(imt, mean_row, sig_row);
        }
        Ok(())
    }
}
