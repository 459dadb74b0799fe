//! Shared constants: tectonic region labels, standard-deviation kinds, and
//! horizontal-component conventions.

use serde::{Deserialize, Serialize};

/// Conventional tectonic region type labels. The engine treats the TRT as
/// an opaque string key (sources and models are matched by equality), these
/// are the names used by the bundled models.
pub mod trt {
    /// Active shallow crustal regions.
    pub const ACTIVE_SHALLOW_CRUST: &str = "Active Shallow Crust";
    /// Stable continental regions.
    pub const STABLE_CONTINENTAL: &str = "Stable Shallow Crust";
    /// Subduction interface events.
    pub const SUBDUCTION_INTERFACE: &str = "Subduction Interface";
    /// Subduction intraslab events.
    pub const SUBDUCTION_INTRASLAB: &str = "Subduction IntraSlab";
    /// Volcanic zones.
    pub const VOLCANIC: &str = "Volcanic";
}

/// One layer of the standard-deviation decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StdDevKind {
    /// Total standard deviation (sigma).
    Total,
    /// Between-event standard deviation (tau).
    Inter,
    /// Within-event standard deviation (phi).
    Intra,
}

/// Which standard-deviation decomposition a model can provide.
///
/// Models that only define a total sigma leave tau and phi at zero in the
/// output block; consumers that need the decomposition must check this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StdDevSupport {
    /// Only the total sigma is defined.
    TotalOnly,
    /// Total, between-event and within-event are all defined.
    Decomposed,
}

/// Horizontal-component convention a model's coefficients are defined for.
///
/// Mixing models with different conventions in one calculation requires
/// converting means and sigmas to a common convention (geometric mean).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizontalComponent {
    /// Geometric mean of the two horizontal components. The reference
    /// convention; conversion to it is the identity.
    GeometricMean,
    /// A randomly chosen horizontal component.
    Random,
    /// The larger of the two horizontal components.
    GreaterOfTwo,
    /// Median of the response-spectra rotation angles (RotD50).
    RotD50,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stddev_support_serde_round_trip() {
        let json = serde_json::to_string(&StdDevSupport::Decomposed).unwrap();
        let back: StdDevSupport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StdDevSupport::Decomposed);
    }

    #[test]
    fn component_equality() {
        assert_ne!(HorizontalComponent::GeometricMean, HorizontalComponent::RotD50);
    }
}
