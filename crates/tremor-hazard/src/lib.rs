//! # tremor-hazard
//!
//! Classical probabilistic hazard curves on top of the context pipeline.
//!
//! - **Logic tree**: [`logic::GsimLogicTree`] — per-tectonic-region branch
//!   weights (a region with zero branches is a fatal configuration error)
//!   and [`logic::RmapMaker`], which reduces per-branch planes to weighted
//!   mean curves
//! - **Groups**: [`curves::SourceGroup`] — sources sharing a tectonic
//!   region and an interaction rule (independent, mutually exclusive
//!   sources/ruptures, clustered)
//! - **Cluster models**: [`cluster::ClusterModel`] — re-combining a group's
//!   no-exceedance plane across an occurrence-count distribution
//! - **Driver**: [`curves::calc_hazard_curves`] — the end-to-end classical
//!   calculator, with per-source accounting in [`curves::SourceStats`]
//! - **Parallelism**: [`parallel`] — rayon partition/merge over sources;
//!   merge order never affects results beyond FP rounding
//!
//! ## Crate Position
//!
//! Top of the tremor stack; depends on every other tremor crate.

#![deny(unsafe_code)]

pub mod cluster;
pub mod curves;
pub mod logic;
pub mod parallel;

pub use cluster::ClusterModel;
pub use curves::{CmakerSequence, HazardCurves, SourceGroup, SourceStats, calc_hazard_curves};
pub use logic::{GsimBranchDef, GsimLogicTree, RmapMaker};
pub use parallel::calc_hazard_curves_parallel;
pub use tremor_ctx::{AccumMode, MapArray};
