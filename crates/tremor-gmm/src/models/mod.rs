//! Concrete ground-motion models.
//!
//! - [`backbone::CrustalBackbone`] — closed-form attenuation for active
//!   shallow crust, coefficient-table driven, decomposed sigma
//! - [`table::TableGmm`] — a tabulated model interpolating ln-medians over
//!   a magnitude × distance grid, strict about its domain
//! - [`fixed::FixedDistribution`] — a constant-distribution model for
//!   scenario runs and calibration tests

pub mod backbone;
pub mod fixed;
pub mod table;

pub use backbone::CrustalBackbone;
pub use fixed::FixedDistribution;
pub use table::TableGmm;
