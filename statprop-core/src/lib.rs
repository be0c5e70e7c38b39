//! Shared store, domains and constraint primitives for the statprop workspace.
//!
//! `statprop-core` provides the foundation the decomposition crates build on:
//!
//! - **Error types** — [`StatPropError`] and [`Result`] for structured error handling
//! - **Traits** — [`NumericDomain`], [`Propagator`], [`Summarizable`]
//! - **Intervals** — outward-rounded [`Interval`] arithmetic
//! - **Domains** — finite integer sets and bounded reals with precision ε
//! - **Expressions** — [`Expr`] trees posted as interval-consistency constraints
//! - **Store** — arena-indexed variables, atomic batches and the propagation loop
//! - **Config** — [`PropagationConfig`] loadable from TOML

pub mod config;
pub mod constraints;
pub mod domain;
pub mod error;
pub mod expr;
pub mod interval;
pub mod store;
pub mod traits;

pub use config::PropagationConfig;
pub use constraints::{Atom, Truth};
pub use domain::{Domain, FiniteDomain, RealDomain, VarId};
pub use error::{Result, StatPropError};
pub use expr::Expr;
pub use interval::Interval;
pub use store::{check_precision, Store, Variables};
pub use traits::*;
