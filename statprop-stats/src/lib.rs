//! Constraint decompositions for statistical models.
//!
//! Every entry point takes a [`Store`](statprop_core::Store), a set of
//! caller-owned variables and a name prefix, allocates intermediate
//! variables as needed and posts constraints as one atomic batch. Results
//! appear once the store propagates.
//!
//! - **Statistics** — mean, sample variance, standard error, t statistic and
//!   Fisher ratio chains ([`chain`])
//! - **Membership** — reified bin membership for discrete and continuous
//!   series, histograms ([`membership`])
//! - **Contingency tables** — paired-sample cell counts and marginals
//!   ([`contingency`])
//! - **Bin counts** — global item/count consistency ([`bincounts`]) backed by
//!   a transportation oracle ([`flow`])
//! - **Matrix inversion** — `M × X = I` posted entrywise ([`matrix`])

pub mod bincounts;
pub mod chain;
pub mod contingency;
pub mod flow;
pub mod matrix;
pub mod membership;

pub use bincounts::{BinCountsFilter, Filtered};
pub use contingency::ContingencyBins;
pub use membership::{BinInterval, Continuous, Discrete, SeriesKind};
