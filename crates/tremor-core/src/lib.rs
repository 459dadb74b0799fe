//! # tremor-core
//!
//! Foundation types, errors, and numeric primitives for the Tremor
//! probabilistic seismic hazard engine.
//!
//! This crate provides the shared vocabulary that all other tremor crates
//! depend on:
//!
//! - **Intensity measures**: [`imt::Imt`] (PGA, PGV, SA, MMI) and the
//!   [`imt::ImtGrid`] level grid with its flattened level array
//! - **Constants**: [`consts::StdDevKind`], [`consts::HorizontalComponent`],
//!   tectonic-region labels
//! - **Context records**: [`ctx::CtxArray`] fixed-layout record batches and
//!   the [`ctx::CtxSchema`] that pins their column set
//! - **Occurrence models**: [`pmf::Occurrence`] (Poissonian rate or discrete
//!   probability mass function) and [`pmf::combine_pmf`] convolution
//! - **Statistics**: [`stats::Truncation`] truncated-normal survival
//!   functions used for probability-of-exceedance computation
//! - **Errors**: [`errors::HazardError`] hierarchy via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other tremor crates.

#![deny(unsafe_code)]

pub mod consts;
pub mod ctx;
pub mod errors;
pub mod imt;
pub mod pmf;
pub mod stats;

pub use consts::{HorizontalComponent, StdDevKind, StdDevSupport};
pub use ctx::{CtxArray, CtxRow, CtxSchema, CtxView, DistanceKind, RupParam, SiteParam};
pub use errors::{HazardError, Result};
pub use imt::{Imt, ImtGrid};
pub use pmf::{Occurrence, Pmf, combine_pmf};
pub use stats::Truncation;
