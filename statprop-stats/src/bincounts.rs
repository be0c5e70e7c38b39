//! Global bin-count consistency.
//!
//! Given N items and M bins, each with a permitted count range, some
//! assignment of every item to exactly one bin must put each item in a bin
//! its domain meets and keep every bin's count within range. The filter
//! removes item values whose bin can never receive the item, and narrows
//! each count to the smallest and largest flow the bin can carry.
//!
//! [`BinCountsFilter::filter`] works on plain domain arrays;
//! [`post`] wraps it as a store propagator.

use statprop_core::{
    Domain, FiniteDomain, Interval, NumericDomain, Propagator, RealDomain, Result, StatPropError,
    Store, VarId, Variables,
};
use tracing::{debug, trace};

use crate::flow::Transportation;
use crate::membership::{bins_from_boundaries, check_bins, check_vars, BinInterval};

/// Narrowed item domains and count ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub items: Vec<Domain>,
    pub counts: Vec<(usize, usize)>,
}

/// Bin-count filtering oracle over a fixed set of bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinCountsFilter {
    bins: Vec<BinInterval>,
}

impl BinCountsFilter {
    /// # Errors
    ///
    /// Returns an error if `bins` is empty or the bins overlap.
    pub fn new(bins: Vec<BinInterval>) -> Result<Self> {
        check_bins("bincounts", &bins)?;
        Ok(Self { bins })
    }

    pub fn from_boundaries(boundaries: &[f64]) -> Result<Self> {
        Self::new(bins_from_boundaries(boundaries)?)
    }

    pub fn bins(&self) -> &[BinInterval] {
        &self.bins
    }

    /// Filter item domains and inclusive count ranges.
    ///
    /// # Errors
    ///
    /// [`StatPropError::Argument`] if `counts` does not have one range per
    /// bin. [`StatPropError::Infeasible`] if an item meets no bin, the count
    /// bounds cannot add up to the number of items, or no assignment exists.
    ///
    /// ```
    /// use statprop_core::{Domain, FiniteDomain};
    /// use statprop_stats::bincounts::BinCountsFilter;
    ///
    /// let filter = BinCountsFilter::from_boundaries(&[1.0, 3.0, 4.0]).unwrap();
    /// let items: Vec<Domain> = [1, 2, 3]
    ///     .iter()
    ///     .map(|&v| Domain::Finite(FiniteDomain::new([v])))
    ///     .collect();
    /// let out = filter.filter(&items, &[(0, 3), (0, 3)]).unwrap();
    /// assert_eq!(out.counts, vec![(2, 2), (1, 1)]);
    /// ```
    pub fn filter(&self, items: &[Domain], counts: &[(usize, usize)]) -> Result<Filtered> {
        if counts.len() != self.bins.len() {
            return Err(StatPropError::Argument(format!(
                "bincounts: {} bins but {} count ranges",
                self.bins.len(),
                counts.len()
            )));
        }
        let n = items.len();

        let mut allowed = Vec::with_capacity(n);
        for (i, item) in items.iter().enumerate() {
            let bins: Vec<usize> = self
                .bins
                .iter()
                .enumerate()
                .filter(|(_, bin)| item.meets(bin.lb, bin.ub))
                .map(|(b, _)| b)
                .collect();
            if bins.is_empty() {
                return Err(StatPropError::Infeasible(format!(
                    "bincounts: item {i} lies in no bin"
                )));
            }
            allowed.push(bins);
        }

        let bounds: Vec<(usize, usize)> = counts.iter().map(|&(lo, hi)| (lo, hi.min(n))).collect();
        check_capacity(n, &bounds)?;

        let problem = Transportation::new(allowed, bounds);
        if !problem.is_feasible() {
            return Err(StatPropError::Infeasible(
                "bincounts: no assignment of items to bins meets the count bounds".into(),
            ));
        }

        let mut narrowed = Vec::with_capacity(n);
        for (i, item) in items.iter().enumerate() {
            let supported: Vec<&BinInterval> = self
                .bins
                .iter()
                .enumerate()
                .filter(|&(b, _)| problem.supports(i, b))
                .map(|(_, bin)| bin)
                .collect();
            narrowed.push(restrict_to_bins(item, &supported));
        }

        let mut ranges = Vec::with_capacity(self.bins.len());
        for b in 0..self.bins.len() {
            // feasibility was checked above, so every bin has a range
            let range = problem.count_range(b).ok_or_else(|| {
                StatPropError::Infeasible(format!("bincounts: bin {b} has no feasible count"))
            })?;
            ranges.push(range);
        }

        Ok(Filtered {
            items: narrowed,
            counts: ranges,
        })
    }
}

fn check_capacity(n: usize, bounds: &[(usize, usize)]) -> Result<()> {
    let lower: usize = bounds.iter().map(|&(lo, _)| lo).sum();
    let upper: usize = bounds.iter().map(|&(_, hi)| hi).sum();
    if lower > n {
        return Err(StatPropError::Infeasible(format!(
            "bincounts: count lower bounds sum to {lower} but there are only {n} items"
        )));
    }
    if upper < n {
        return Err(StatPropError::Infeasible(format!(
            "bincounts: count upper bounds sum to {upper} but there are {n} items"
        )));
    }
    Ok(())
}

/// Keep the part of `item` covered by `bins`.
fn restrict_to_bins(item: &Domain, bins: &[&BinInterval]) -> Domain {
    match item {
        Domain::Finite(d) => Domain::Finite(FiniteDomain::new(
            d.values()
                .iter()
                .copied()
                .filter(|&v| bins.iter().any(|bin| bin.contains(v as f64))),
        )),
        Domain::Real(r) => {
            let cover = bins
                .iter()
                .fold(Interval::EMPTY, |acc, bin| acc.hull(&bin.closure()));
            Domain::Real(RealDomain::new(r.interval().intersect(&cover), r.precision()))
        }
    }
}

/// Integer count range of a count variable, clipped to `[0, n]`.
fn count_bounds(domain: &Domain, n: usize) -> Option<(usize, usize)> {
    let hull = domain.hull();
    let lo = hull.lo().max(0.0).ceil();
    let hi = hull.hi().min(n as f64).floor();
    (lo <= hi).then_some((lo as usize, hi as usize))
}

/// Store propagator running [`BinCountsFilter`] over item and count variables.
#[derive(Debug, Clone)]
pub struct BinCountsPropagator {
    filter: BinCountsFilter,
    items: Vec<VarId>,
    counts: Vec<VarId>,
}

impl BinCountsPropagator {
    fn ranges(&self, vars: &Variables) -> Result<Vec<(usize, usize)>> {
        let n = self.items.len();
        self.counts
            .iter()
            .map(|&c| {
                count_bounds(vars.domain(c), n).ok_or_else(|| {
                    StatPropError::Infeasible(format!(
                        "bincounts: count '{}' admits no value in [0, {n}]",
                        vars.name(c)
                    ))
                })
            })
            .collect()
    }
}

impl Propagator for BinCountsPropagator {
    fn label(&self) -> String {
        format!("bincounts({} items, {} bins)", self.items.len(), self.counts.len())
    }

    fn scope(&self) -> Vec<VarId> {
        self.items.iter().chain(&self.counts).copied().collect()
    }

    fn propagate(&self, vars: &mut Variables) -> Result<()> {
        let domains: Vec<Domain> = self.items.iter().map(|&v| vars.domain(v).clone()).collect();
        let ranges = self.ranges(vars)?;
        let out = self.filter.filter(&domains, &ranges)?;
        for (&id, domain) in self.items.iter().zip(&out.items) {
            if vars.restrict(id, domain)? {
                trace!(var = vars.name(id), "bincounts narrowed item");
            }
        }
        for (&id, &(lo, hi)) in self.counts.iter().zip(&out.counts) {
            vars.narrow(id, Interval::new(lo as f64, hi as f64))?;
        }
        Ok(())
    }
}

/// Post global bin-count consistency between `items` and `counts`.
///
/// `counts[b]` must be an integer variable; `items` may be integer or real.
/// The capacity arithmetic and the existence of an assignment are checked
/// immediately against the current domains.
///
/// Count variables are filtered on their bounds only. Holes inside a count
/// domain are kept and never used to prune: with three free items over three
/// bins, `c1, c2 ∈ {0, 3}` leaves `c0 ∈ {0, 1, 2, 3}` although only `{0, 3}`
/// is consistent.
///
/// # Errors
///
/// [`StatPropError::Argument`] on malformed bins, a length mismatch, unknown
/// or non-integer count variables. [`StatPropError::Infeasible`] if the
/// current domains already admit no assignment. Nothing is posted on error.
pub fn post(
    store: &mut Store,
    items: &[VarId],
    bins: &[BinInterval],
    counts: &[VarId],
) -> Result<()> {
    let filter = BinCountsFilter::new(bins.to_vec())?;
    if counts.len() != bins.len() {
        return Err(StatPropError::Argument(format!(
            "bincounts: {} bins but {} count variables",
            bins.len(),
            counts.len()
        )));
    }
    check_vars(store, items)?;
    check_vars(store, counts)?;
    if let Some(&c) = counts.iter().find(|&&c| !store.domain(c).is_finite()) {
        return Err(StatPropError::Argument(format!(
            "bincounts: count '{}' must be an integer variable",
            store.name(c)
        )));
    }

    let propagator = BinCountsPropagator {
        filter,
        items: items.to_vec(),
        counts: counts.to_vec(),
    };
    let domains: Vec<Domain> = items.iter().map(|&v| store.domain(v).clone()).collect();
    let ranges = propagator.ranges(store.variables())?;
    propagator.filter.filter(&domains, &ranges)?;

    store.post(Box::new(propagator))?;
    debug!(items = items.len(), bins = bins.len(), "posted bincounts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finite(values: &[i64]) -> Domain {
        Domain::Finite(FiniteDomain::new(values.iter().copied()))
    }

    fn values(domain: &Domain) -> Vec<i64> {
        domain.as_finite().unwrap().values().to_vec()
    }

    #[test]
    fn fixed_items_fix_counts() {
        let filter = BinCountsFilter::from_boundaries(&[1.0, 3.0, 4.0]).unwrap();
        let items = vec![finite(&[1]), finite(&[2]), finite(&[3])];
        let out = filter.filter(&items, &[(0, 3), (0, 3)]).unwrap();
        assert_eq!(out.items, items);
        assert_eq!(out.counts, vec![(2, 2), (1, 1)]);
    }

    #[test]
    fn count_bounds_prune_items() {
        let filter = BinCountsFilter::from_boundaries(&[1.0, 3.0, 5.0]).unwrap();
        let items = vec![finite(&[3, 4]), finite(&[1, 2, 4]), finite(&[2, 3, 4])];
        let out = filter.filter(&items, &[(1, 3), (0, 1)]).unwrap();
        assert_eq!(values(&out.items[0]), vec![3, 4]);
        assert_eq!(values(&out.items[1]), vec![1, 2]);
        assert_eq!(values(&out.items[2]), vec![2]);
        assert_eq!(out.counts, vec![(2, 2), (1, 1)]);
    }

    #[test]
    fn values_outside_every_bin_are_removed() {
        let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0, 4.0]).unwrap();
        let out = filter.filter(&[finite(&[1, 3, 7])], &[(0, 1), (0, 1)]).unwrap();
        assert_eq!(values(&out.items[0]), vec![1, 3]);
    }

    #[test]
    fn lower_bounds_exceeding_items_are_infeasible() {
        let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0, 4.0]).unwrap();
        let err = filter.filter(&[finite(&[1])], &[(1, 1), (1, 1)]).unwrap_err();
        assert!(err.is_infeasible());
    }

    #[test]
    fn item_outside_all_bins_is_infeasible() {
        let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0]).unwrap();
        let err = filter.filter(&[finite(&[5])], &[(0, 1)]).unwrap_err();
        assert!(err.is_infeasible());
    }

    #[test]
    fn count_arity_is_checked() {
        let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0, 4.0]).unwrap();
        let err = filter.filter(&[finite(&[1])], &[(0, 1)]).unwrap_err();
        assert!(matches!(err, StatPropError::Argument(_)));
    }

    #[test]
    fn real_items_shrink_to_supported_bins() {
        let filter = BinCountsFilter::from_boundaries(&[0.0, 4.0, 10.0]).unwrap();
        let item = Domain::Real(RealDomain::new(Interval::new(1.0, 8.0), 1e-9));
        let out = filter.filter(&[item], &[(0, 0), (0, 1)]).unwrap();
        assert_eq!(out.items[0].hull(), Interval::new(4.0, 8.0));
        assert_eq!(out.counts, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn store_propagator_matches_fixture() {
        let mut store = Store::new();
        let items = vec![
            store.new_int("x0", [3, 4]).unwrap(),
            store.new_int("x1", [1, 2, 4]).unwrap(),
            store.new_int("x2", [2, 3, 4]).unwrap(),
        ];
        let counts = vec![
            store.new_int_range("c0", 1, 3).unwrap(),
            store.new_int_range("c1", 0, 1).unwrap(),
        ];
        let bins = bins_from_boundaries(&[1.0, 3.0, 5.0]).unwrap();
        post(&mut store, &items, &bins, &counts).unwrap();
        store.propagate().unwrap();
        assert_eq!(values(store.domain(items[0])), vec![3, 4]);
        assert_eq!(values(store.domain(items[1])), vec![1, 2]);
        assert_eq!(values(store.domain(items[2])), vec![2]);
        assert_eq!(store.value(counts[0]), Some(2.0));
        assert_eq!(store.value(counts[1]), Some(1.0));
    }

    #[test]
    fn store_propagator_reacts_to_count_changes() {
        let mut store = Store::new();
        let items: Vec<VarId> = (0..3)
            .map(|i| store.new_int_range(&format!("x{i}"), 0, 3).unwrap())
            .collect();
        let counts = vec![
            store.new_int_range("c0", 0, 3).unwrap(),
            store.new_int_range("c1", 0, 3).unwrap(),
        ];
        let bins = bins_from_boundaries(&[0.0, 2.0, 4.0]).unwrap();
        post(&mut store, &items, &bins, &counts).unwrap();
        store.propagate().unwrap();
        assert_eq!(store.bounds(counts[0]), Interval::new(0.0, 3.0));

        store.narrow(counts[1], Interval::point(0.0)).unwrap();
        store.propagate().unwrap();
        assert_eq!(store.value(counts[0]), Some(3.0));
        for &x in &items {
            assert_eq!(values(store.domain(x)), vec![0, 1]);
        }
    }

    #[test]
    fn count_holes_are_not_used_for_pruning() {
        let mut store = Store::new();
        let items: Vec<VarId> = (0..3)
            .map(|i| store.new_int_range(&format!("x{i}"), 0, 2).unwrap())
            .collect();
        let counts = vec![
            store.new_int_range("c0", 0, 3).unwrap(),
            store.new_int("c1", [0, 3]).unwrap(),
            store.new_int("c2", [0, 3]).unwrap(),
        ];
        let bins = bins_from_boundaries(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        post(&mut store, &items, &bins, &counts).unwrap();
        store.propagate().unwrap();
        assert_eq!(values(store.domain(counts[0])), vec![0, 1, 2, 3]);
        assert_eq!(values(store.domain(counts[1])), vec![0, 3]);

        // once a hole-free bound decides the count, the others follow
        store.narrow(counts[1], Interval::point(3.0)).unwrap();
        store.propagate().unwrap();
        assert_eq!(store.value(counts[0]), Some(0.0));
        assert_eq!(store.value(counts[2]), Some(0.0));
    }

    #[test]
    fn post_fails_eagerly_when_lower_bounds_exceed_items() {
        let mut store = Store::new();
        let x = store.new_int("x", [1]).unwrap();
        let counts = vec![
            store.new_int_range("c0", 1, 1).unwrap(),
            store.new_int_range("c1", 1, 1).unwrap(),
        ];
        let bins = bins_from_boundaries(&[0.0, 2.0, 4.0]).unwrap();
        let err = post(&mut store, &[x], &bins, &counts).unwrap_err();
        assert!(err.is_infeasible());
        assert_eq!(store.num_constraints(), 0);
    }

    #[test]
    fn post_rejects_real_counts() {
        let mut store = Store::new();
        let x = store.new_int("x", [1]).unwrap();
        let c = store.new_real("c", 0.0, 1.0, 1e-9).unwrap();
        let bins = bins_from_boundaries(&[0.0, 2.0]).unwrap();
        let err = post(&mut store, &[x], &bins, &[c]).unwrap_err();
        assert!(matches!(err, StatPropError::Argument(_)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fixed_items_give_exact_counts(xs in proptest::collection::vec(0i64..6, 1..8)) {
                let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0, 4.0, 6.0]).unwrap();
                let items: Vec<Domain> = xs.iter().map(|&x| finite(&[x])).collect();
                let n = xs.len();
                let out = filter.filter(&items, &[(0, n), (0, n), (0, n)]).unwrap();
                for (b, &(lo, hi)) in out.counts.iter().enumerate() {
                    let actual = xs.iter().filter(|&&x| x / 2 == b as i64).count();
                    prop_assert_eq!((lo, hi), (actual, actual));
                }
                prop_assert_eq!(out.items, items);
            }

            #[test]
            fn filtering_keeps_every_feasible_assignment(
                xs in proptest::collection::vec(0i64..6, 1..6),
                widen in proptest::collection::vec(0i64..3, 6),
            ) {
                // widen each fixed value into a range; the original assignment stays feasible
                let filter = BinCountsFilter::from_boundaries(&[0.0, 2.0, 4.0, 6.0]).unwrap();
                let items: Vec<Domain> = xs
                    .iter()
                    .zip(&widen)
                    .map(|(&x, &w)| {
                        Domain::Finite(FiniteDomain::range((x - w).max(0), (x + w).min(5)))
                    })
                    .collect();
                let actual: Vec<usize> = (0..3)
                    .map(|b| xs.iter().filter(|&&x| x / 2 == b).count())
                    .collect();
                let counts: Vec<(usize, usize)> = actual.iter().map(|&c| (c, c)).collect();
                let out = filter.filter(&items, &counts).unwrap();
                for (item, &x) in out.items.iter().zip(&xs) {
                    prop_assert!(item.contains(x as f64));
                }
                prop_assert_eq!(out.counts, counts);
            }
        }
    }
}
