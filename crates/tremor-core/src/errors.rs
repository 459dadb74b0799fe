//! Error hierarchy for the hazard engine.
//!
//! Three classes of failure, with different handling contracts:
//!
//! - **Configuration errors** ([`HazardError::Config`],
//!   [`HazardError::MissingParam`]) are fatal and raised at setup time,
//!   before any rupture is processed. They are never retried.
//! - **Out-of-domain errors** ([`HazardError::OutOfDomain`],
//!   [`HazardError::ZeroSigma`]) come from inside a ground-motion model
//!   and propagate unchanged to the caller: they indicate a real
//!   model/input mismatch, not a transient condition.
//! - Geometric edge cases (rupture beyond maximum distance, empty context
//!   batch) are *not* errors; they are empty results merged as identity.

use thiserror::Error;

/// Result alias used across the tremor crates.
pub type Result<T> = std::result::Result<T, HazardError>;

/// Errors produced by the hazard engine.
#[derive(Debug, Error)]
pub enum HazardError {
    /// Invalid calculation setup (bad weights, zero realizations for a
    /// tectonic region type, malformed level grids). Fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required context parameter is not populated. This is a schema
    /// violation and therefore a configuration-class error: the parameter
    /// union is computed once per `ContextMaker` and must cover every
    /// model requirement.
    #[error("missing required {kind} parameter `{name}`")]
    MissingParam {
        /// Parameter family: "site", "rupture" or "distance".
        kind: &'static str,
        /// The parameter name as it appears in the schema.
        name: String,
    },

    /// A table-backed model was queried outside its tabulated domain
    /// (magnitude, distance or spectral period). Propagated unchanged.
    #[error("{model}: {what}={value} is outside the supported range")]
    OutOfDomain {
        /// Name of the model that rejected the query.
        model: String,
        /// Which quantity was out of range.
        what: &'static str,
        /// The offending value.
        value: f64,
    },

    /// The combined standard deviation collapsed to zero while the
    /// truncation level requires a positive sigma. Indicates a
    /// misconfigured model/parameter combination.
    #[error("zero standard deviation with truncation level {trunc}")]
    ZeroSigma {
        /// The configured truncation level.
        trunc: f64,
    },

    /// A model does not support a requested intensity measure type.
    #[error("{model} does not support IMT {imt}")]
    UnsupportedImt {
        /// Name of the model.
        model: String,
        /// String form of the rejected IMT.
        imt: String,
    },

    /// Serialization failure in the datastore codec.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl HazardError {
    /// True for errors that must abort the enclosing calculation at
    /// setup time (as opposed to per-rupture domain errors).
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingParam { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_flagged() {
        assert!(HazardError::Config("x".into()).is_config());
        assert!(
            HazardError::MissingParam {
                kind: "site",
                name: "vs30".into()
            }
            .is_config()
        );
        assert!(
            !HazardError::OutOfDomain {
                model: "TableGmm".into(),
                what: "mag",
                value: 9.5
            }
            .is_config()
        );
    }

    #[test]
    fn display_mentions_parameter_name() {
        let err = HazardError::MissingParam {
            kind: "distance",
            name: "rjb".into(),
        };
        assert!(err.to_string().contains("rjb"));
    }
}
