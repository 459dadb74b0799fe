//! # tremor-ctx
//!
//! The context pipeline: turning filtered (source, sites) pairs into
//! fixed-schema context batches and dispatching them through a set of
//! ground-motion models.
//!
//! - **Schema derivation**: [`schema`] — the union of every active model's
//!   requirement sets, computed once per maker; a missing site parameter is
//!   a fatal configuration error
//! - **Building**: [`builder::CtxBuilder`] — per-magnitude context batches
//!   with a planar fast path, a distance cache for shared fault surfaces,
//!   and minimum-distance flooring
//! - **Collapsing**: [`collapse::CollapseSpec`] — optional lossy precision
//!   coarsening that merges near-identical rows
//! - **Accumulation**: [`map::MapArray`] — per-site [L × G] probability (or
//!   rate) planes with identity-based merge
//! - **Dispatch**: [`cmaker::ContextMaker`] — `get_mean_stds` (the
//!   (4, G, M, N) block), `gen_poes` (memory-bounded PoE slices), `update`
//!   (independent and mutually exclusive rules) and `estimate_weight`
//! - **Codec**: [`codec`] — the serde contract for calculation descriptions
//!   and stored context batches
//!
//! ## Crate Position
//!
//! Depends on `tremor-core`, `tremor-source` and `tremor-gmm`. Consumed by
//! `tremor-hazard`.

#![deny(unsafe_code)]

pub mod builder;
pub mod cmaker;
pub mod codec;
pub mod collapse;
pub mod map;
pub mod schema;

pub use builder::{CtxBuilder, DistCache};
pub use cmaker::{ContextMaker, GmmBranch, MakerParams, PoeBatch, UpdateOutcome};
pub use codec::{CmakerConfig, GmmBranchConfig, read_cmakers, read_ctx_by_grp};
pub use collapse::CollapseSpec;
pub use map::{AccumMode, MapArray};
