//! Core trait definitions for statprop.
//!
//! These traits define the contracts shared by domains, constraints and the
//! decomposition crates.

use core::fmt;

use crate::domain::VarId;
use crate::interval::Interval;
use crate::store::Variables;

/// Numeric-domain capability: bounds and membership queries.
///
/// Implemented by both finite integer domains and real intervals so that
/// decompositions can be written once for discrete and continuous inputs.
pub trait NumericDomain {
    /// Smallest interval enclosing the domain.
    fn hull(&self) -> Interval;

    /// Whether `x` is an admissible value.
    fn contains(&self, x: f64) -> bool;

    /// Whether some admissible value lies in the half-open `[lb, ub)`.
    fn meets(&self, lb: f64, ub: f64) -> bool;

    /// Whether the domain is reduced to a single value (within precision).
    fn is_fixed(&self) -> bool;
}

/// A constraint that narrows variable domains.
///
/// `propagate` must only ever remove values that cannot take part in a
/// solution, and must be correct for any order in which the store invokes
/// propagators.
pub trait Propagator: fmt::Debug {
    /// Short human-readable description used in logs.
    fn label(&self) -> String;

    /// Variables whose domain changes should re-schedule this propagator.
    fn scope(&self) -> Vec<VarId>;

    /// Narrow domains; return [`StatPropError::Infeasible`](crate::StatPropError)
    /// when a domain empties.
    fn propagate(&self, vars: &mut Variables) -> crate::Result<()>;
}

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}
