//! Declared model capabilities.
//!
//! Every ground-motion model carries a read-only [`Capabilities`] value:
//! what tectonic region it is valid for, which intensity measures it can
//! predict, which horizontal-component convention its coefficients use,
//! whether it decomposes sigma, and which site/rupture/distance parameters
//! it requires. The `ContextMaker` unions the requirement sets of all its
//! models into one fixed context schema.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tremor_core::{
    DistanceKind, HazardError, HorizontalComponent, Imt, Result, RupParam, SiteParam,
    StdDevSupport,
};

/// The class of an intensity measure, ignoring the SA period.
///
/// Models declare support per class; whether a specific SA period is in
/// range is a table-domain question answered at `compute` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImtClass {
    /// Peak ground acceleration.
    Pga,
    /// Peak ground velocity.
    Pgv,
    /// Spectral acceleration (any period).
    Sa,
    /// Macroseismic intensity.
    Mmi,
}

impl From<&Imt> for ImtClass {
    fn from(imt: &Imt) -> Self {
        match imt {
            Imt::Pga => Self::Pga,
            Imt::Pgv => Self::Pgv,
            Imt::Sa(_) => Self::Sa,
            Imt::Mmi => Self::Mmi,
        }
    }
}

/// Read-only capability metadata of one ground-motion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// Tectonic region type the model is defined for.
    pub trt: String,
    /// Supported intensity measure classes.
    pub imts: BTreeSet<ImtClass>,
    /// Horizontal-component convention of the coefficients.
    pub component: HorizontalComponent,
    /// Standard-deviation decomposition support.
    pub stddev: StdDevSupport,
    /// Required site parameters.
    pub requires_site: BTreeSet<SiteParam>,
    /// Required rupture parameters (magnitude is implicit).
    pub requires_rup: BTreeSet<RupParam>,
    /// Required distance measures.
    pub requires_dist: BTreeSet<DistanceKind>,
    /// The model has a recommended successor; using it logs a warning.
    pub deprecated: bool,
    /// The implementation has not been independently verified; using it
    /// logs a warning.
    pub non_verified: bool,
}

impl Capabilities {
    /// Minimal capabilities for a model of the given tectonic region.
    pub fn new(trt: impl Into<String>) -> Self {
        Self {
            trt: trt.into(),
            imts: BTreeSet::new(),
            component: HorizontalComponent::GeometricMean,
            stddev: StdDevSupport::TotalOnly,
            requires_site: BTreeSet::new(),
            requires_rup: BTreeSet::new(),
            requires_dist: BTreeSet::new(),
            deprecated: false,
            non_verified: false,
        }
    }

    /// Reject an unsupported intensity measure with the model's name in
    /// the error.
    pub fn check_imt(&self, model: &str, imt: &Imt) -> Result<()> {
        if self.imts.contains(&ImtClass::from(imt)) {
            Ok(())
        } else {
            Err(HazardError::UnsupportedImt {
                model: model.to_string(),
                imt: imt.to_string(),
            })
        }
    }

    /// The capability union used by composite models: requirements are
    /// unioned, sigma support degrades to the weakest member, and
    /// deprecation/verification flags propagate if any member carries
    /// them. The component convention is taken from `self` — composites
    /// that mix conventions must convert before combining.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            trt: self.trt.clone(),
            imts: self.imts.intersection(&other.imts).copied().collect(),
            component: self.component,
            stddev: if self.stddev == StdDevSupport::Decomposed
                && other.stddev == StdDevSupport::Decomposed
            {
                StdDevSupport::Decomposed
            } else {
                StdDevSupport::TotalOnly
            },
            requires_site: self.requires_site.union(&other.requires_site).copied().collect(),
            requires_rup: self.requires_rup.union(&other.requires_rup).copied().collect(),
            requires_dist: self.requires_dist.union(&other.requires_dist).copied().collect(),
            deprecated: self.deprecated || other.deprecated,
            non_verified: self.non_verified || other.non_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn check_imt_names_the_model() {
        let mut caps = Capabilities::new("Active Shallow Crust");
        let _ = caps.imts.insert(ImtClass::Pga);
        caps.check_imt("TestGmm", &Imt::Pga).unwrap();
        let err = caps.check_imt("TestGmm", &Imt::Pgv).unwrap_err();
        assert_matches!(err, HazardError::UnsupportedImt { model, .. } if model == "TestGmm");
    }

    #[test]
    fn union_merges_requirements_and_degrades_sigma() {
        let mut a = Capabilities::new("Active Shallow Crust");
        let _ = a.imts.insert(ImtClass::Pga);
        let _ = a.imts.insert(ImtClass::Sa);
        let _ = a.requires_dist.insert(DistanceKind::Rrup);
        a.stddev = StdDevSupport::Decomposed;

        let mut b = Capabilities::new("Active Shallow Crust");
        let _ = b.imts.insert(ImtClass::Pga);
        let _ = b.requires_dist.insert(DistanceKind::Rjb);
        let _ = b.requires_site.insert(SiteParam::Vs30);
        b.non_verified = true;

        let u = a.union(&b);
        // IMT support intersects, requirements union
        assert_eq!(u.imts.len(), 1);
        assert!(u.imts.contains(&ImtClass::Pga));
        assert_eq!(u.requires_dist.len(), 2);
        assert!(u.requires_site.contains(&SiteParam::Vs30));
        assert_eq!(u.stddev, StdDevSupport::TotalOnly);
        assert!(u.non_verified);
    }
}
