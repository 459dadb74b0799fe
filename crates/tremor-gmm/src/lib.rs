//! # tremor-gmm
//!
//! Ground-motion models for the Tremor hazard engine.
//!
//! - **Contract**: [`model::GroundMotionModel`] — the `compute` entry point
//!   every model implements, writing ln-space means and linear-space
//!   standard deviations into pre-allocated M×n output views
//! - **Capabilities**: [`caps::Capabilities`] — declared tectonic region,
//!   supported IMTs, component convention, stddev decomposition, and the
//!   required site/rupture/distance parameter sets
//! - **Coefficients**: [`coeffs::CoeffsTable`] — per-IMT coefficient rows
//!   with log-period interpolation between tabulated SA periods
//! - **Registry**: [`registry::GmmRegistry`] — an explicit, constructed-once
//!   `name → factory` map (with aliases); never a global
//! - **Composites**: [`wrappers`] — weighted averages, site-amplification
//!   overlays, component conversion; each owns its inner models and
//!   re-derives the capability union at construction
//! - **Component conversion**: [`imc`] — period-dependent conversion of
//!   means and sigmas between horizontal-component conventions
//!
//! ## Crate Position
//!
//! Depends on `tremor-core`. Consumed by `tremor-ctx` and `tremor-hazard`.

#![deny(unsafe_code)]

pub mod caps;
pub mod coeffs;
pub mod imc;
pub mod model;
pub mod models;
pub mod registry;
pub mod wrappers;

pub use caps::{Capabilities, ImtClass};
pub use coeffs::CoeffsTable;
pub use imc::ComponentConverter;
pub use model::GroundMotionModel;
pub use models::{CrustalBackbone, FixedDistribution, TableGmm};
pub use registry::GmmRegistry;
pub use wrappers::{ComponentConverted, SiteAmplification, WeightedAverage};
