//! Transportation feasibility for item-to-bin assignments.
//!
//! Each item supplies one unit, each bin absorbs between `lo` and `hi`
//! units, and an item may only ship to the bins it is allowed in. The
//! constraint matrix of this bipartite problem is totally unimodular, so an
//! integral assignment exists iff the LP relaxation is feasible, and the
//! set of achievable counts for any single bin is a contiguous range.
//!
//! Feasibility with lower bounds is decided as a circulation with demands,
//! solved by Dinic's max-flow over an arena of paired edges.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    cap: i64,
}

/// Residual graph; edge `e` and its reverse `e ^ 1` are stored adjacently.
#[derive(Debug, Clone)]
struct FlowNetwork {
    adj: Vec<Vec<usize>>,
    edges: Vec<Edge>,
}

impl FlowNetwork {
    fn new(nodes: usize) -> Self {
        Self {
            adj: vec![Vec::new(); nodes],
            edges: Vec::new(),
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, cap: i64) -> usize {
        let id = self.edges.len();
        self.edges.push(Edge { to, cap });
        self.adj[from].push(id);
        self.edges.push(Edge { to: from, cap: 0 });
        self.adj[to].push(id + 1);
        id
    }

    fn levels(&self, source: usize) -> Vec<i64> {
        let mut level = vec![-1; self.adj.len()];
        level[source] = 0;
        let mut queue = VecDeque::from([source]);
        while let Some(u) = queue.pop_front() {
            for &e in &self.adj[u] {
                let edge = &self.edges[e];
                if edge.cap > 0 && level[edge.to] < 0 {
                    level[edge.to] = level[u] + 1;
                    queue.push_back(edge.to);
                }
            }
        }
        level
    }

    fn augment(
        &mut self,
        u: usize,
        sink: usize,
        pushed: i64,
        level: &[i64],
        next: &mut [usize],
    ) -> i64 {
        if u == sink {
            return pushed;
        }
        while next[u] < self.adj[u].len() {
            let e = self.adj[u][next[u]];
            let (to, cap) = (self.edges[e].to, self.edges[e].cap);
            if cap > 0 && level[to] == level[u] + 1 {
                let got = self.augment(to, sink, pushed.min(cap), level, next);
                if got > 0 {
                    self.edges[e].cap -= got;
                    self.edges[e ^ 1].cap += got;
                    return got;
                }
            }
            next[u] += 1;
        }
        0
    }

    fn max_flow(&mut self, source: usize, sink: usize) -> i64 {
        let mut total = 0;
        loop {
            let level = self.levels(source);
            if level[sink] < 0 {
                return total;
            }
            let mut next = vec![0; self.adj.len()];
            loop {
                let pushed = self.augment(source, sink, i64::MAX, &level, &mut next);
                if pushed == 0 {
                    break;
                }
                total += pushed;
            }
        }
    }
}

/// Items with allowed bins, and per-bin count bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transportation {
    allowed: Vec<Vec<usize>>,
    bounds: Vec<(usize, usize)>,
}

impl Transportation {
    /// `allowed[i]` lists the bins item `i` may go to; `bounds[b]` is the
    /// inclusive count range of bin `b`.
    ///
    /// # Panics
    ///
    /// Panics if an allowed bin index is out of range.
    pub fn new(allowed: Vec<Vec<usize>>, bounds: Vec<(usize, usize)>) -> Self {
        assert!(
            allowed.iter().flatten().all(|&b| b < bounds.len()),
            "allowed bin index out of range"
        );
        Self { allowed, bounds }
    }

    /// Number of items to place.
    pub fn num_items(&self) -> usize {
        self.allowed.len()
    }

    /// Number of bins.
    pub fn num_bins(&self) -> usize {
        self.bounds.len()
    }

    /// A feasible assignment (bin per item), if one exists.
    ///
    /// ```
    /// use statprop_stats::flow::Transportation;
    /// // two items, both may use either bin; bin 0 must take exactly one
    /// let t = Transportation::new(vec![vec![0, 1], vec![0, 1]], vec![(1, 1), (0, 2)]);
    /// let assignment = t.solve().unwrap();
    /// assert_eq!(assignment.iter().filter(|&&b| b == 0).count(), 1);
    /// ```
    pub fn solve(&self) -> Option<Vec<usize>> {
        let n = self.allowed.len();
        let m = self.bounds.len();
        if self.bounds.iter().any(|&(lo, hi)| lo > hi) {
            return None;
        }
        let lower: usize = self.bounds.iter().map(|&(lo, _)| lo).sum();
        let upper: usize = self.bounds.iter().map(|&(_, hi)| hi).sum();
        if lower > n || upper < n {
            return None;
        }

        // node layout: source, items, bins, sink, super source, super sink
        let source = 0;
        let item = |i: usize| 1 + i;
        let bin = |b: usize| 1 + n + b;
        let sink = 1 + n + m;
        let super_source = sink + 1;
        let super_sink = sink + 2;
        let mut net = FlowNetwork::new(sink + 3);

        // source → item carries exactly one unit: demand +1 at item, −1 at source
        for i in 0..n {
            net.add_edge(super_source, item(i), 1);
        }
        net.add_edge(source, super_sink, n as i64);

        let mut item_edges: Vec<Vec<(usize, usize)>> = Vec::with_capacity(n);
        for (i, bins) in self.allowed.iter().enumerate() {
            item_edges.push(
                bins.iter()
                    .map(|&b| (net.add_edge(item(i), bin(b), 1), b))
                    .collect(),
            );
        }

        // bin → sink with [lo, hi]: capacity hi − lo, demand +lo at sink, −lo at bin
        for (b, &(lo, hi)) in self.bounds.iter().enumerate() {
            net.add_edge(bin(b), sink, (hi - lo) as i64);
            if lo > 0 {
                net.add_edge(super_source, sink, lo as i64);
                net.add_edge(bin(b), super_sink, lo as i64);
            }
        }
        net.add_edge(sink, source, n as i64);

        let required = (n + lower) as i64;
        if net.max_flow(super_source, super_sink) != required {
            return None;
        }

        let mut assignment = Vec::with_capacity(n);
        for edges in &item_edges {
            let chosen = edges.iter().find(|&&(e, _)| net.edges[e].cap == 0)?;
            assignment.push(chosen.1);
        }
        Some(assignment)
    }

    /// Whether any assignment satisfies every bin range.
    pub fn is_feasible(&self) -> bool {
        self.solve().is_some()
    }

    /// Whether some feasible assignment sends `item` to `bin`.
    pub fn supports(&self, item: usize, bin: usize) -> bool {
        let (lo, hi) = self.bounds[bin];
        if hi == 0 || !self.allowed[item].contains(&bin) {
            return false;
        }
        let mut reduced = self.clone();
        reduced.allowed.remove(item);
        reduced.bounds[bin] = (lo.saturating_sub(1), hi - 1);
        reduced.is_feasible()
    }

    /// Smallest and largest count of `bin` over all feasible assignments.
    ///
    /// Returns `None` if the problem is infeasible. Every count in between is
    /// also achievable.
    pub fn count_range(&self, bin: usize) -> Option<(usize, usize)> {
        if !self.is_feasible() {
            return None;
        }
        let (lo, hi) = self.bounds[bin];
        let with_bounds = |range: (usize, usize)| {
            let mut t = self.clone();
            t.bounds[bin] = range;
            t.is_feasible()
        };

        // largest c with [c, hi] feasible; [lo, hi] is feasible
        let (mut a, mut b) = (lo, hi);
        while a < b {
            let mid = a + (b - a + 1) / 2;
            if with_bounds((mid, hi)) {
                a = mid;
            } else {
                b = mid - 1;
            }
        }
        let max = a;

        // smallest c with [lo, c] feasible
        let (mut a, mut b) = (lo, hi);
        while a < b {
            let mid = a + (b - a) / 2;
            if with_bounds((lo, mid)) {
                b = mid;
            } else {
                a = mid + 1;
            }
        }
        Some((a, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_flow_on_small_graph() {
        let mut net = FlowNetwork::new(4);
        net.add_edge(0, 1, 3);
        net.add_edge(0, 2, 2);
        net.add_edge(1, 2, 1);
        net.add_edge(1, 3, 2);
        net.add_edge(2, 3, 3);
        assert_eq!(net.max_flow(0, 3), 5);
    }

    #[test]
    fn solve_respects_allowed_bins() {
        let t = Transportation::new(vec![vec![1], vec![0, 1], vec![0]], vec![(0, 3), (0, 3)]);
        let a = t.solve().unwrap();
        assert_eq!(a[0], 1);
        assert_eq!(a[2], 0);
    }

    #[test]
    fn lower_bounds_are_enforced() {
        // bin 1 needs two items but only item 1 may use it
        let t = Transportation::new(vec![vec![0], vec![0, 1]], vec![(0, 2), (2, 2)]);
        assert!(!t.is_feasible());
        let t = Transportation::new(vec![vec![0, 1], vec![0, 1]], vec![(0, 2), (2, 2)]);
        assert_eq!(t.solve().unwrap(), vec![1, 1]);
    }

    #[test]
    fn capacity_arithmetic_short_circuits() {
        let t = Transportation::new(vec![vec![0]], vec![(2, 3)]);
        assert!(!t.is_feasible());
        let t = Transportation::new(vec![vec![0], vec![0]], vec![(0, 1)]);
        assert!(!t.is_feasible());
    }

    #[test]
    fn item_without_bins_is_infeasible() {
        let t = Transportation::new(vec![vec![]], vec![(0, 1)]);
        assert!(!t.is_feasible());
    }

    #[test]
    fn supports_and_count_range() {
        // items {3,4},{1,2,4},{2,3,4} over bins [1,3),[3,5) with counts [1,3],[0,1]
        let t = Transportation::new(vec![vec![1], vec![0, 1], vec![0, 1]], vec![(1, 3), (0, 1)]);
        assert!(t.supports(0, 1));
        assert!(!t.supports(1, 1));
        assert!(t.supports(1, 0));
        assert!(!t.supports(2, 1));
        assert_eq!(t.count_range(0), Some((2, 2)));
        assert_eq!(t.count_range(1), Some((1, 1)));
    }

    #[test]
    fn count_range_spans_interval() {
        let t = Transportation::new(vec![vec![0, 1]; 4], vec![(0, 4), (1, 3)]);
        assert_eq!(t.count_range(0), Some((1, 3)));
        assert_eq!(t.count_range(1), Some((1, 3)));
    }
}
