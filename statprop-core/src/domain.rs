//! Variable domains: finite integer sets and bounded real intervals.

use core::fmt;

use crate::interval::Interval;
use crate::traits::{NumericDomain, Summarizable};

/// Arena index of a variable inside a [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A finite set of admissible integers, kept sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiniteDomain {
    values: Vec<i64>,
}

impl FiniteDomain {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        let mut values: Vec<i64> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        Self { values }
    }

    /// All integers in `[lo, hi]`.
    pub fn range(lo: i64, hi: i64) -> Self {
        Self {
            values: (lo..=hi).collect(),
        }
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> Option<i64> {
        self.values.first().copied()
    }

    pub fn max(&self) -> Option<i64> {
        self.values.last().copied()
    }

    pub fn contains_value(&self, v: i64) -> bool {
        self.values.binary_search(&v).is_ok()
    }

    /// Keep only values satisfying `keep`. Returns whether anything was removed.
    pub fn retain(&mut self, mut keep: impl FnMut(i64) -> bool) -> bool {
        let before = self.values.len();
        self.values.retain(|&v| keep(v));
        self.values.len() != before
    }
}

/// A bounded real interval with a fixed precision ε.
///
/// The variable counts as fixed once its width is at most ε.
#[derive(Debug, Clone, PartialEq)]
pub struct RealDomain {
    interval: Interval,
    precision: f64,
}

impl RealDomain {
    pub fn new(interval: Interval, precision: f64) -> Self {
        Self {
            interval,
            precision,
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub(crate) fn set_interval(&mut self, interval: Interval) {
        self.interval = interval;
    }
}

/// Domain of a store variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Discrete integer values (booleans are `{0, 1}`).
    Finite(FiniteDomain),
    /// Continuous interval.
    Real(RealDomain),
}

impl Domain {
    pub fn as_finite(&self) -> Option<&FiniteDomain> {
        match self {
            Domain::Finite(d) => Some(d),
            Domain::Real(_) => None,
        }
    }

    pub fn as_real(&self) -> Option<&RealDomain> {
        match self {
            Domain::Real(d) => Some(d),
            Domain::Finite(_) => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Domain::Finite(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Domain::Finite(d) => d.is_empty(),
            Domain::Real(d) => d.interval.is_empty(),
        }
    }
}

impl NumericDomain for FiniteDomain {
    fn hull(&self) -> Interval {
        match (self.min(), self.max()) {
            (Some(lo), Some(hi)) => Interval::new(lo as f64, hi as f64),
            _ => Interval::EMPTY,
        }
    }

    fn contains(&self, x: f64) -> bool {
        x.fract() == 0.0 && self.contains_value(x as i64)
    }

    fn meets(&self, lb: f64, ub: f64) -> bool {
        // first value >= lb
        let start = self.values.partition_point(|&v| (v as f64) < lb);
        self.values.get(start).is_some_and(|&v| (v as f64) < ub)
    }

    fn is_fixed(&self) -> bool {
        self.values.len() == 1
    }
}

impl NumericDomain for RealDomain {
    fn hull(&self) -> Interval {
        self.interval
    }

    fn contains(&self, x: f64) -> bool {
        self.interval.contains(x)
    }

    fn meets(&self, lb: f64, ub: f64) -> bool {
        !self.interval.is_empty() && self.interval.lo() < ub && self.interval.hi() >= lb
    }

    fn is_fixed(&self) -> bool {
        !self.interval.is_empty() && self.interval.width() <= self.precision
    }
}

impl NumericDomain for Domain {
    fn hull(&self) -> Interval {
        match self {
            Domain::Finite(d) => d.hull(),
            Domain::Real(d) => d.hull(),
        }
    }

    fn contains(&self, x: f64) -> bool {
        match self {
            Domain::Finite(d) => d.contains(x),
            Domain::Real(d) => NumericDomain::contains(d, x),
        }
    }

    fn meets(&self, lb: f64, ub: f64) -> bool {
        match self {
            Domain::Finite(d) => d.meets(lb, ub),
            Domain::Real(d) => d.meets(lb, ub),
        }
    }

    fn is_fixed(&self) -> bool {
        match self {
            Domain::Finite(d) => d.is_fixed(),
            Domain::Real(d) => d.is_fixed(),
        }
    }
}

impl Summarizable for Domain {
    fn summary(&self) -> String {
        match self {
            Domain::Finite(d) if d.len() <= 8 => format!("{:?}", d.values()),
            Domain::Finite(d) => format!(
                "{{{}..{}; {} values}}",
                d.min().unwrap_or_default(),
                d.max().unwrap_or_default(),
                d.len()
            ),
            Domain::Real(d) => format!("{} ε={}", d.interval, d.precision),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_domain_sorted_and_deduped() {
        let d = FiniteDomain::new([4, 1, 4, 2]);
        assert_eq!(d.values(), &[1, 2, 4]);
        assert_eq!(d.hull(), Interval::new(1.0, 4.0));
    }

    #[test]
    fn finite_meets_half_open() {
        let d = FiniteDomain::new([1, 3]);
        assert!(d.meets(1.0, 3.0));
        assert!(!d.meets(2.0, 3.0));
        assert!(d.meets(3.0, 4.0));
        assert!(!d.meets(4.0, 10.0));
    }

    #[test]
    fn real_meets_half_open() {
        let d = RealDomain::new(Interval::new(1.0, 3.0), 1e-6);
        assert!(d.meets(3.0, 4.0));
        assert!(!d.meets(3.5, 4.0));
        assert!(!d.meets(0.0, 1.0));
        assert!(d.meets(0.0, 1.5));
    }

    #[test]
    fn real_fixed_within_precision() {
        let d = RealDomain::new(Interval::new(1.0, 1.0 + 1e-9), 1e-6);
        assert!(d.is_fixed());
        let d = RealDomain::new(Interval::new(1.0, 2.0), 1e-6);
        assert!(!d.is_fixed());
    }

    #[test]
    fn finite_contains_rejects_fractions() {
        let d = FiniteDomain::range(0, 3);
        assert!(NumericDomain::contains(&d, 2.0));
        assert!(!NumericDomain::contains(&d, 2.5));
    }

    #[test]
    fn summary_abbreviates_large_domains() {
        let d = Domain::Finite(FiniteDomain::range(0, 99));
        assert_eq!(d.summary(), "{0..99; 100 values}");
    }
}
