//! # tremor-source
//!
//! Sites, rupture geometry, and seismic sources for the Tremor hazard
//! engine.
//!
//! - **Sites**: [`site::Site`] and the struct-of-arrays
//!   [`site::SiteCollection`] with filtered views that preserve site ids
//! - **Geometry**: [`geo::PlanarSurface`] with closed-form distance
//!   measures (rrup, rjb, rx, ry0, repi, rhypo, closest point)
//! - **Ruptures**: [`rupture::Rupture`] pairing a surface with a magnitude,
//!   rake, hypocenter and an occurrence model
//! - **MFDs**: [`mfd::Mfd`] magnitude-frequency distributions (truncated
//!   Gutenberg-Richter, evenly discretized, arbitrary bins)
//! - **Sources**: [`source::Source`] — planar point-source grids (the fast
//!   path) and explicit rupture lists (faults, non-parametric sources)
//! - **Filtering**: [`filters::IntegrationDistance`] and
//!   [`filters::SourceFilter`] (magnitude-dependent maximum distance)
//!
//! ## Crate Position
//!
//! Depends on `tremor-core`. Consumed by `tremor-ctx` and `tremor-hazard`.

#![deny(unsafe_code)]

pub mod filters;
pub mod geo;
pub mod mfd;
pub mod rupture;
pub mod site;
pub mod source;

pub use filters::{IntegrationDistance, SourceFilter};
pub use geo::{PlanarSurface, SurfaceDistances};
pub use mfd::Mfd;
pub use rupture::Rupture;
pub use site::{Site, SiteCollection};
pub use source::{PointSource, Source, SourceKind};
