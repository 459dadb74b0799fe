//! Closed-form backbone attenuation for active shallow crust.

use ndarray::ArrayViewMut2;
use tremor_core::consts::trt;
use tremor_core::{CtxView, DistanceKind, Imt, Result, SiteParam, StdDevSupport};

use crate::caps::{Capabilities, ImtClass};
use crate::coeffs::CoeffsTable;
use crate::model::GroundMotionModel;

// Reference rock condition for the site term.
const REF_VS30: f64 = 760.0;

const COEFFS: &str = "\
    imt     c1      c2      c3      c4      c5      c6      c7      tau     phi
    pga     1.35    0.95   -0.09    1.18    6.0     0.40   -0.55    0.35    0.50
    pgv     2.08    1.05   -0.07    1.05    5.0     0.40   -0.72    0.36    0.52
    0.05    1.62    0.91   -0.10    1.22    6.5     0.42   -0.45    0.37    0.54
    0.10    1.88    0.90   -0.11    1.25    7.0     0.44   -0.39    0.39    0.55
    0.20    1.71    0.93   -0.10    1.20    6.8     0.43   -0.50    0.38    0.54
    0.50    1.12    1.02   -0.08    1.09    5.6     0.41   -0.62    0.38    0.55
    1.00    0.61    1.08   -0.07    1.00    4.7     0.39   -0.68    0.40    0.56
    2.00    0.02    1.14   -0.06    0.94    4.0     0.37   -0.70    0.41    0.58
";

/// A magnitude/distance/site attenuation model with decomposed sigma.
///
/// The ln-median is a quadratic magnitude scaling minus geometric
/// spreading over an effective distance (rupture distance plus a
/// magnitude-dependent near-source saturation term), plus a linear
/// vs30 site term relative to 760 m/s rock.
#[derive(Debug)]
pub struct CrustalBackbone {
    caps: Capabilities,
    coeffs: CoeffsTable,
    // Column indices resolved once at construction.
    ic: [usize; 9],
}

impl CrustalBackbone {
    pub const NAME: &'static str = "CrustalBackbone";

    pub fn new() -> Result<Self> {
        let coeffs = CoeffsTable::parse(COEFFS)?;
        let ic = [
            coeffs.col("c1")?,
            coeffs.col("c2")?,
            coeffs.col("c3")?,
            coeffs.col("c4")?,
            coeffs.col("c5")?,
            coeffs.col("c6")?,
            coeffs.col("c7")?,
            coeffs.col("tau")?,
            coeffs.col("phi")?,
        ];
        let mut caps = Capabilities::new(trt::ACTIVE_SHALLOW_CRUST);
        caps.imts.extend([ImtClass::Pga, ImtClass::Pgv, ImtClass::Sa]);
        caps.stddev = StdDevSupport::Decomposed;
        let _ = caps.requires_site.insert(SiteParam::Vs30);
        let _ = caps.requires_dist.insert(DistanceKind::Rrup);
        Ok(Self { caps, coeffs, ic })
    }
}

impl GroundMotionModel for CrustalBackbone {
    fn name(&self) -> &str {
        Self::NAME
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
        let rrup = ctx.dist(DistanceKind::Rrup)?;
        let vs30 = ctx.site(SiteParam::Vs30)?;
        let dm = ctx.mag() - 6.0;

        for (m, imt) in imts.iter().enumerate() {
            self.caps.check_imt(Self::NAME, imt)?;
            let c = self.coeffs.get(Self::NAME, imt)?;
            let [c1, c2, c3, c4, c5, c6, c7, t, p] = self.ic.map(|i| c[i]);
            let saturation = c5 * (c6 * dm).exp();
            let mag_term = c1 + c2 * dm + c3 * dm * dm;
            for n in 0..ctx.len() {
                mean[[m, n]] =
                    mag_term - c4 * (rrup[n] + saturation).ln() + c7 * (vs30[n] / REF_VS30).ln();
                tau[[m, n]] = t;
                phi[[m, n]] = p;
                sig[[m, n]] = t.hypot(p);
            }
        }
        Ok(())
    }
}
