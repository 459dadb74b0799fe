//! Horizontal-component conversion.
//!
//! Ground-motion models publish coefficients for one horizontal-component
//! convention (geometric mean, RotD50, larger-of-two, random). When a
//! calculation requests a different convention than the model provides,
//! means and sigmas are adjusted with empirical period-dependent ratios.
//! All conversions route through the geometric mean as the reference
//! convention, so converting A→B and then B→A recovers the input exactly.

use tremor_core::{HorizontalComponent, Imt};

// Median ratio and extra dispersion of each convention relative to the
// geometric mean, tabulated against period. The between-convention
// variability is folded into sigma as a multiplicative factor.
struct RatioTable {
    periods: &'static [f64],
    ratio: &'static [f64],
    sigma_factor: &'static [f64],
}

const ROTD50: RatioTable = RatioTable {
    periods: &[0.01, 0.1, 1.0, 10.0],
    ratio: &[1.00, 1.02, 1.05, 1.06],
    sigma_factor: &[1.00, 1.00, 1.01, 1.01],
};

const GREATER_OF_TWO: RatioTable = RatioTable {
    periods: &[0.01, 0.1, 1.0, 10.0],
    ratio: &[1.10, 1.12, 1.18, 1.21],
    sigma_factor: &[1.02, 1.02, 1.03, 1.04],
};

const RANDOM: RatioTable = RatioTable {
    periods: &[0.01, 10.0],
    ratio: &[1.00, 1.00],
    sigma_factor: &[1.05, 1.05],
};

impl RatioTable {
    // Piecewise-linear in log period, clamped at the end knots. PGA and
    // PGV report period zero and clamp to the shortest tabulated period.
    fn at(&self, period: f64) -> (f64, f64) {
        let first = self.periods[0];
        let last = self.periods[self.periods.len() - 1];
        if period <= first {
            return (self.ratio[0], self.sigma_factor[0]);
        }
        if period >= last {
            let n = self.periods.len() - 1;
            return (self.ratio[n], self.sigma_factor[n]);
        }
        let mut i = 0;
        while period > self.periods[i + 1] {
            i += 1;
        }
        let (p0, p1) = (self.periods[i], self.periods[i + 1]);
        let t = (period.ln() - p0.ln()) / (p1.ln() - p0.ln());
        (
            self.ratio[i] + t * (self.ratio[i + 1] - self.ratio[i]),
            self.sigma_factor[i] + t * (self.sigma_factor[i + 1] - self.sigma_factor[i]),
        )
    }
}

fn table_for(component: HorizontalComponent) -> Option<&'static RatioTable> {
    match component {
        HorizontalComponent::GeometricMean => None,
        HorizontalComponent::RotD50 => Some(&ROTD50),
        HorizontalComponent::GreaterOfTwo => Some(&GREATER_OF_TWO),
        HorizontalComponent::Random => Some(&RANDOM),
    }
}

/// Converts means and sigmas from one component convention to another.
#[derive(Debug, Clone, Copy)]
pub struct ComponentConverter {
    from: HorizontalComponent,
    to: HorizontalComponent,
}

impl ComponentConverter {
    /// A converter between two conventions. Identity when they coincide.
    pub fn new(from: HorizontalComponent, to: HorizontalComponent) -> Self {
        Self { from, to }
    }

    /// Whether this conversion is a no-op.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    // Net ln-median shift and sigma factor at a given period. Going
    // from→reference divides by the source ratio; reference→to multiplies
    // by the target ratio.
    fn factors(&self, period: f64) -> (f64, f64) {
        let mut shift = 0.0;
        let mut factor = 1.0;
        if let Some(table) = table_for(self.from) {
            let (r, f) = table.at(period);
            shift -= r.ln();
            factor /= f;
        }
        if let Some(table) = table_for(self.to) {
            let (r, f) = table.at(period);
            shift += r.ln();
            factor *= f;
        }
        (shift, factor)
    }

    /// Adjust one IMT's mean and total-sigma rows in place. Means are in
    /// distribution space; MMI is not log-normal and is left untouched.
    pub fn apply(&self, imt: &Imt, mean: &mut [f64], sig: &mut [f64]) {
        if self.is_identity() || matches!(imt, Imt::Mmi) {
            return;
        }
        let (shift, factor) = self.factors(imt.period());
        for m in mean.iter_mut() {
            *m += shift;
        }
        for s in sig.iter_mut() {
            *s *= factor;
        }
    }

    /// The converter undoing this one.
    pub fn inverse(&self) -> Self {
        Self { from: self.to, to: self.from }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_values_alone() {
        let conv = ComponentConverter::new(
            HorizontalComponent::GeometricMean,
            HorizontalComponent::GeometricMean,
        );
        let mut mean = [0.5];
        let mut sig = [0.6];
        conv.apply(&Imt::Pga, &mut mean, &mut sig);
        assert_eq!(mean, [0.5]);
        assert_eq!(sig, [0.6]);
    }

    #[test]
    fn round_trip_is_exact() {
        let fwd = ComponentConverter::new(
            HorizontalComponent::GeometricMean,
            HorizontalComponent::GreaterOfTwo,
        );
        let inv = fwd.inverse();
        for imt in [Imt::Pga, Imt::sa(0.3), Imt::sa(5.0), Imt::Pgv] {
            let mut mean = [0.5, -1.2];
            let mut sig = [0.6, 0.7];
            fwd.apply(&imt, &mut mean, &mut sig);
            inv.apply(&imt, &mut mean, &mut sig);
            assert!((mean[0] - 0.5).abs() < 1e-12);
            assert!((mean[1] + 1.2).abs() < 1e-12);
            assert!((sig[0] - 0.6).abs() < 1e-12);
            assert!((sig[1] - 0.7).abs() < 1e-12);
        }
    }

    #[test]
    fn greater_of_two_raises_the_median() {
        let conv = ComponentConverter::new(
            HorizontalComponent::GeometricMean,
            HorizontalComponent::GreaterOfTwo,
        );
        let mut mean = [0.0];
        let mut sig = [0.6];
        conv.apply(&Imt::sa(1.0), &mut mean, &mut sig);
        assert!(mean[0] > 0.0);
        assert!(sig[0] > 0.6);
    }

    #[test]
    fn mmi_is_never_converted() {
        let conv = ComponentConverter::new(
            HorizontalComponent::GeometricMean,
            HorizontalComponent::Random,
        );
        let mut mean = [5.0];
        let mut sig = [1.0];
        conv.apply(&Imt::Mmi, &mut mean, &mut sig);
        assert_eq!(mean, [5.0]);
        assert_eq!(sig, [1.0]);
    }

    #[test]
    fn ratios_interpolate_in_log_period() {
        let (r_short, _) = GREATER_OF_TWO.at(0.01);
        let (r_mid, _) = GREATER_OF_TWO.at(0.3);
        let (r_long, _) = GREATER_OF_TWO.at(20.0);
        assert_eq!(r_short, 1.10);
        assert_eq!(r_long, 1.21);
        assert!(r_mid > 1.12 && r_mid < 1.18);
    }
}
