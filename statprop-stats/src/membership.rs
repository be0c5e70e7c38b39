//! Reified bin membership.
//!
//! A membership indicator is a boolean variable bound to "value ∈ bin". The
//! [`SeriesKind`] parameter selects how the test is expressed: [`Discrete`]
//! series use two one-sided inequalities, [`Continuous`] series use one
//! interval-membership atom. Both produce the same indicator topology.

use statprop_core::{Atom, Domain, Expr, Interval, Result, StatPropError, Store, VarId};
use tracing::debug;

/// A half-open numeric interval `[lb, ub)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinInterval {
    pub lb: f64,
    pub ub: f64,
}

impl BinInterval {
    /// # Errors
    ///
    /// Returns an error unless `lb < ub` (infinite bounds are allowed).
    pub fn new(lb: f64, ub: f64) -> Result<Self> {
        if lb.is_nan() || ub.is_nan() || lb >= ub {
            return Err(StatPropError::Argument(format!(
                "bin interval [{lb}, {ub}) is empty or malformed"
            )));
        }
        Ok(Self { lb, ub })
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lb <= x && x < self.ub
    }

    /// The closure `[lb, ub]` as an interval.
    pub fn closure(&self) -> Interval {
        Interval::new(self.lb, self.ub)
    }
}

/// Contiguous bins from strictly increasing boundaries `b₀ < b₁ < … < bₘ`.
///
/// ```
/// use statprop_stats::membership::bins_from_boundaries;
/// let bins = bins_from_boundaries(&[1.0, 3.0, 4.0]).unwrap();
/// assert_eq!(bins.len(), 2);
/// assert!(bins[0].contains(2.0) && !bins[0].contains(3.0));
/// ```
pub fn bins_from_boundaries(boundaries: &[f64]) -> Result<Vec<BinInterval>> {
    if boundaries.len() < 2 {
        return Err(StatPropError::Argument(format!(
            "bins_from_boundaries: need at least 2 boundaries, got {}",
            boundaries.len()
        )));
    }
    boundaries
        .windows(2)
        .map(|w| BinInterval::new(w[0], w[1]))
        .collect()
}

/// Bins must be sorted and pairwise disjoint.
pub(crate) fn check_bins(op: &str, bins: &[BinInterval]) -> Result<()> {
    if bins.is_empty() {
        return Err(StatPropError::Argument(format!("{op}: no bins given")));
    }
    for w in bins.windows(2) {
        if w[0].ub > w[1].lb {
            return Err(StatPropError::Argument(format!(
                "{op}: bins [{}, {}) and [{}, {}) overlap or are unsorted",
                w[0].lb, w[0].ub, w[1].lb, w[1].ub
            )));
        }
    }
    Ok(())
}

/// Whether every admissible value of `domain` lies in one of `bins`.
///
/// Real domains are only recognised as covered by a gap-free run of bins.
pub(crate) fn covers(bins: &[BinInterval], domain: &Domain) -> bool {
    match domain {
        Domain::Finite(d) => d
            .values()
            .iter()
            .all(|&v| bins.iter().any(|bin| bin.contains(v as f64))),
        Domain::Real(r) => {
            let hull = r.interval();
            let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
                return false;
            };
            bins.windows(2).all(|w| w[0].ub == w[1].lb)
                && !hull.is_empty()
                && first.lb <= hull.lo()
                && hull.hi() < last.ub
        }
    }
}

/// How a series expresses "value ∈ bin".
pub trait SeriesKind {
    /// Name used in logs and errors.
    const KIND: &'static str;

    /// Whether a variable with this domain can belong to the series.
    fn accepts(domain: &Domain) -> bool;

    /// Atoms whose conjunction holds iff `var` lies in `bin`.
    fn membership(var: VarId, bin: &BinInterval) -> Vec<Atom>;
}

/// Integer-valued series: `x ≥ lb ∧ x < ub`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discrete;

/// Real-valued series: `x ∈ [lb, ub)` narrowed through the interval engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Continuous;

impl SeriesKind for Discrete {
    const KIND: &'static str = "discrete";

    fn accepts(domain: &Domain) -> bool {
        domain.is_finite()
    }

    fn membership(var: VarId, bin: &BinInterval) -> Vec<Atom> {
        vec![
            Atom::AtLeast { var, bound: bin.lb },
            Atom::Below { var, bound: bin.ub },
        ]
    }
}

impl SeriesKind for Continuous {
    const KIND: &'static str = "continuous";

    fn accepts(_domain: &Domain) -> bool {
        true
    }

    fn membership(var: VarId, bin: &BinInterval) -> Vec<Atom> {
        vec![Atom::Within {
            var,
            lb: bin.lb,
            ub: bin.ub,
        }]
    }
}

pub(crate) fn check_series<S: SeriesKind>(store: &Store, op: &str, series: &[VarId]) -> Result<()> {
    for &v in series {
        store.check_var(v)?;
        if !S::accepts(store.domain(v)) {
            return Err(StatPropError::Argument(format!(
                "{op}: '{}' cannot be used in a {} series",
                store.name(v),
                S::KIND
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_vars(store: &Store, vars: &[VarId]) -> Result<()> {
    vars.iter().try_for_each(|&v| store.check_var(v))
}

/// Fresh boolean bound to the conjunction of `atoms`.
pub(crate) fn indicator(store: &mut Store, name: &str, atoms: Vec<Atom>) -> Result<VarId> {
    let b = store.new_bool(name)?;
    store.post_reified(b, atoms)?;
    Ok(b)
}

/// One-dimensional bin-count decomposition.
///
/// For every item `s` and bin `b`, creates `"{name}[s][b]"` reified over
/// "series[s] ∈ bins[b]", posts `Σₛ indicator = counts[b]` per bin and
/// `Σ_b indicator = 1` per item, so that every item lands in exactly one bin.
///
/// # Errors
///
/// [`StatPropError::Argument`] if `counts` and `bins` differ in length, the
/// bins overlap, or a series variable does not fit the series kind.
pub fn encode_histogram<S: SeriesKind>(
    store: &mut Store,
    name: &str,
    series: &[VarId],
    bins: &[BinInterval],
    counts: &[VarId],
) -> Result<()> {
    check_bins("encode_histogram", bins)?;
    if counts.len() != bins.len() {
        return Err(StatPropError::Argument(format!(
            "encode_histogram: {} bins but {} count variables",
            bins.len(),
            counts.len()
        )));
    }
    check_series::<S>(store, "encode_histogram", series)?;
    check_vars(store, counts)?;

    store.batch(|s| {
        let mut columns: Vec<Vec<VarId>> = vec![Vec::with_capacity(series.len()); bins.len()];
        for (item, &x) in series.iter().enumerate() {
            let mut row = Vec::with_capacity(bins.len());
            for (b, bin) in bins.iter().enumerate() {
                let v = indicator(s, &format!("{name}[{item}][{b}]"), S::membership(x, bin))?;
                row.push(v);
                columns[b].push(v);
            }
            s.post_expr(Expr::sum(row.into_iter().map(Expr::var)), Interval::point(1.0))?;
        }
        for (column, &count) in columns.iter().zip(counts) {
            s.post_sum(column, count)?;
        }
        Ok(())
    })?;
    debug!(kind = S::KIND, name, items = series.len(), bins = bins.len(), "encoded histogram");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_must_increase() {
        assert!(bins_from_boundaries(&[1.0]).is_err());
        assert!(bins_from_boundaries(&[1.0, 1.0]).is_err());
        assert!(bins_from_boundaries(&[3.0, 1.0]).is_err());
        let bins = bins_from_boundaries(&[f64::NEG_INFINITY, 0.0, f64::INFINITY]).unwrap();
        assert!(bins[0].contains(-1e300) && bins[1].contains(0.0));
    }

    #[test]
    fn overlapping_bins_rejected() {
        let bins = [
            BinInterval::new(0.0, 2.0).unwrap(),
            BinInterval::new(1.0, 3.0).unwrap(),
        ];
        assert!(check_bins("t", &bins).is_err());
    }

    #[test]
    fn coverage_of_domains() {
        let bins = bins_from_boundaries(&[0.0, 3.0, 5.0]).unwrap();
        let mut store = Store::new();
        let inside = store.new_int("inside", [0, 2, 4]).unwrap();
        let outside = store.new_int("outside", [4, 5]).unwrap();
        let real = store.new_real("real", 0.0, 4.5, 1e-9).unwrap();
        let edge = store.new_real("edge", 1.0, 5.0, 1e-9).unwrap();
        assert!(covers(&bins, store.domain(inside)));
        assert!(!covers(&bins, store.domain(outside)));
        assert!(covers(&bins, store.domain(real)));
        assert!(!covers(&bins, store.domain(edge)));

        let gapped = [
            BinInterval::new(0.0, 1.0).unwrap(),
            BinInterval::new(2.0, 3.0).unwrap(),
        ];
        let r = store.new_real("r", 0.0, 2.5, 1e-9).unwrap();
        assert!(!covers(&gapped, store.domain(r)));
    }

    #[test]
    fn discrete_membership_uses_two_inequalities() {
        let bin = BinInterval::new(1.0, 3.0).unwrap();
        let mut store = Store::new();
        let x = store.new_int_range("x", 0, 5).unwrap();
        assert_eq!(Discrete::membership(x, &bin).len(), 2);
        assert_eq!(Continuous::membership(x, &bin).len(), 1);
    }

    #[test]
    fn histogram_counts_fixed_items() {
        let mut store = Store::new();
        let items: Vec<VarId> = [1, 2, 3, 5]
            .iter()
            .enumerate()
            .map(|(i, &v)| store.new_int(&format!("x{i}"), [v]).unwrap())
            .collect();
        let bins = bins_from_boundaries(&[0.0, 3.0, 6.0]).unwrap();
        let counts: Vec<VarId> = (0..2)
            .map(|b| store.new_int_range(&format!("c{b}"), 0, 4).unwrap())
            .collect();
        encode_histogram::<Discrete>(&mut store, "h", &items, &bins, &counts).unwrap();
        store.propagate().unwrap();
        assert_eq!(store.value(counts[0]), Some(2.0));
        assert_eq!(store.value(counts[1]), Some(2.0));
    }

    #[test]
    fn histogram_counts_narrow_items() {
        let mut store = Store::new();
        let x = store.new_real("x", 0.0, 10.0, 1e-9).unwrap();
        let bins = bins_from_boundaries(&[0.0, 4.0, 10.0]).unwrap();
        let empty = store.new_int("c0", [0]).unwrap();
        let full = store.new_int_range("c1", 0, 1).unwrap();
        encode_histogram::<Continuous>(&mut store, "h", &[x], &bins, &[empty, full]).unwrap();
        store.propagate().unwrap();
        assert_eq!(store.bounds(x), Interval::new(4.0, 10.0));
        assert_eq!(store.value(full), Some(1.0));
    }

    #[test]
    fn discrete_series_rejects_real_variables() {
        let mut store = Store::new();
        let x = store.new_real("x", 0.0, 10.0, 1e-9).unwrap();
        let c = store.new_int_range("c", 0, 1).unwrap();
        let bins = bins_from_boundaries(&[0.0, 10.0]).unwrap();
        let err = encode_histogram::<Discrete>(&mut store, "h", &[x], &bins, &[c]).unwrap_err();
        assert!(matches!(err, StatPropError::Argument(_)));
        assert_eq!(store.num_constraints(), 0);
    }
}
