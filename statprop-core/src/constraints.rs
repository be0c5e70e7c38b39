//! Primitive propagators: bounds-consistent sums and reified conjunctions.

use crate::domain::{Domain, VarId};
use crate::interval::Interval;
use crate::store::Variables;
use crate::traits::{NumericDomain, Propagator};
use crate::Result;

// ── Sum ─────────────────────────────────────────────────────────────────────

/// `Σ terms = total`, bounds consistency.
#[derive(Debug, Clone)]
pub struct Sum {
    terms: Vec<VarId>,
    total: VarId,
}

impl Sum {
    pub fn new(terms: Vec<VarId>, total: VarId) -> Self {
        Self { terms, total }
    }
}

impl Propagator for Sum {
    fn label(&self) -> String {
        format!("sum of {} terms = {}", self.terms.len(), self.total)
    }

    fn scope(&self) -> Vec<VarId> {
        let mut scope = self.terms.clone();
        scope.push(self.total);
        scope
    }

    fn propagate(&self, vars: &mut Variables) -> Result<()> {
        let bounds: Vec<Interval> = self.terms.iter().map(|&t| vars.bounds(t)).collect();
        let total = sum_intervals(&bounds);
        vars.narrow(self.total, total)?;
        let target = vars.bounds(self.total);

        // prefix[k] = Σ bounds[..k], suffix[k] = Σ bounds[k..]
        let n = bounds.len();
        let mut prefix = vec![Interval::point(0.0); n + 1];
        let mut suffix = vec![Interval::point(0.0); n + 1];
        for k in 0..n {
            prefix[k + 1] = prefix[k] + bounds[k];
            suffix[n - k - 1] = suffix[n - k] + bounds[n - k - 1];
        }
        for (k, &term) in self.terms.iter().enumerate() {
            let others = prefix[k] + suffix[k + 1];
            vars.narrow(term, target - others)?;
        }
        Ok(())
    }
}

pub(crate) fn sum_intervals(parts: &[Interval]) -> Interval {
    parts
        .iter()
        .fold(Interval::point(0.0), |acc, &p| acc + p)
}

// ── Membership atoms ────────────────────────────────────────────────────────

/// A unary test on one variable, usable inside a reified conjunction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Atom {
    /// `var ≥ bound`
    AtLeast { var: VarId, bound: f64 },
    /// `var < bound`
    Below { var: VarId, bound: f64 },
    /// `lb ≤ var < ub`
    Within { var: VarId, lb: f64, ub: f64 },
}

/// Three-valued truth of an atom under the current domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Atom {
    pub fn var(&self) -> VarId {
        match *self {
            Atom::AtLeast { var, .. } | Atom::Below { var, .. } | Atom::Within { var, .. } => var,
        }
    }

    fn holds(&self, x: f64) -> bool {
        match *self {
            Atom::AtLeast { bound, .. } => x >= bound,
            Atom::Below { bound, .. } => x < bound,
            Atom::Within { lb, ub, .. } => lb <= x && x < ub,
        }
    }

    /// Whether the atom is entailed, disentailed, or still open.
    pub fn truth(&self, domain: &Domain) -> Truth {
        match domain {
            Domain::Finite(d) => {
                let mut any_true = false;
                let mut any_false = false;
                for &v in d.values() {
                    if self.holds(v as f64) {
                        any_true = true;
                    } else {
                        any_false = true;
                    }
                    if any_true && any_false {
                        return Truth::Unknown;
                    }
                }
                if any_false {
                    Truth::False
                } else {
                    Truth::True
                }
            }
            Domain::Real(d) => {
                let iv = d.hull();
                let (lo, hi) = (iv.lo(), iv.hi());
                let (entailed, refuted) = match *self {
                    Atom::AtLeast { bound, .. } => (lo >= bound, hi < bound),
                    Atom::Below { bound, .. } => (hi < bound, lo >= bound),
                    Atom::Within { lb, ub, .. } => (lo >= lb && hi < ub, !d.meets(lb, ub)),
                };
                if refuted {
                    Truth::False
                } else if entailed {
                    Truth::True
                } else {
                    Truth::Unknown
                }
            }
        }
    }

    /// Narrow the variable so that the atom holds.
    ///
    /// Half-open bounds are relaxed to their closure on real variables.
    pub fn enforce(&self, vars: &mut Variables) -> Result<()> {
        let var = self.var();
        if vars.domain(var).is_finite() {
            let atom = *self;
            vars.retain(var, |v| atom.holds(v as f64))?;
            return Ok(());
        }
        let by = match *self {
            Atom::AtLeast { bound, .. } => Interval::new(bound, f64::INFINITY),
            Atom::Below { bound, .. } => Interval::new(f64::NEG_INFINITY, bound),
            Atom::Within { lb, ub, .. } => Interval::new(lb, ub),
        };
        vars.narrow(var, by)?;
        Ok(())
    }

    /// Narrow the variable so that the atom fails.
    pub fn refute(&self, vars: &mut Variables) -> Result<()> {
        let var = self.var();
        if vars.domain(var).is_finite() {
            let atom = *self;
            vars.retain(var, |v| !atom.holds(v as f64))?;
            return Ok(());
        }
        let current = vars.bounds(var);
        let by = match *self {
            Atom::AtLeast { bound, .. } => Interval::new(f64::NEG_INFINITY, bound),
            Atom::Below { bound, .. } => Interval::new(bound, f64::INFINITY),
            Atom::Within { lb, ub, .. } => {
                if current.lo() >= lb {
                    Interval::new(ub, f64::INFINITY)
                } else if current.hi() < ub {
                    Interval::new(f64::NEG_INFINITY, lb)
                } else {
                    // the complement is two rays; nothing to narrow
                    return Ok(());
                }
            }
        };
        vars.narrow(var, by)?;
        Ok(())
    }
}

// ── Reification ─────────────────────────────────────────────────────────────

/// `indicator ⇔ (atom₁ ∧ … ∧ atomₖ)` over a boolean indicator.
#[derive(Debug, Clone)]
pub struct Reified {
    indicator: VarId,
    atoms: Vec<Atom>,
}

impl Reified {
    pub fn new(indicator: VarId, atoms: Vec<Atom>) -> Self {
        Self { indicator, atoms }
    }
}

impl Propagator for Reified {
    fn label(&self) -> String {
        format!("{} <=> conjunction of {} atoms", self.indicator, self.atoms.len())
    }

    fn scope(&self) -> Vec<VarId> {
        let mut scope: Vec<VarId> = self.atoms.iter().map(Atom::var).collect();
        scope.push(self.indicator);
        scope
    }

    fn propagate(&self, vars: &mut Variables) -> Result<()> {
        let truths: Vec<Truth> = self
            .atoms
            .iter()
            .map(|a| a.truth(vars.domain(a.var())))
            .collect();

        if truths.contains(&Truth::False) {
            vars.narrow(self.indicator, Interval::point(0.0))?;
            return Ok(());
        }
        if truths.iter().all(|&t| t == Truth::True) {
            vars.narrow(self.indicator, Interval::point(1.0))?;
            return Ok(());
        }

        let indicator = vars.bounds(self.indicator);
        if indicator.lo() >= 1.0 {
            for atom in &self.atoms {
                atom.enforce(vars)?;
            }
        } else if indicator.hi() <= 0.0 {
            let open: Vec<&Atom> = self
                .atoms
                .iter()
                .zip(&truths)
                .filter(|(_, t)| **t == Truth::Unknown)
                .map(|(a, _)| a)
                .collect();
            if let [last] = open.as_slice() {
                last.refute(vars)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[test]
    fn atom_truth_on_finite_domain() {
        let mut store = Store::new();
        let x = store.new_int("x", [1, 2, 3]).unwrap();
        let d = store.domain(x).clone();
        assert_eq!(Atom::AtLeast { var: x, bound: 1.0 }.truth(&d), Truth::True);
        assert_eq!(Atom::Below { var: x, bound: 1.0 }.truth(&d), Truth::False);
        assert_eq!(Atom::Within { var: x, lb: 2.0, ub: 5.0 }.truth(&d), Truth::Unknown);
    }

    #[test]
    fn atom_truth_on_real_domain_is_half_open() {
        let mut store = Store::new();
        let x = store.new_real("x", 3.0, 4.0, 1e-6).unwrap();
        let d = store.domain(x).clone();
        assert_eq!(Atom::Within { var: x, lb: 1.0, ub: 3.0 }.truth(&d), Truth::False);
        assert_eq!(Atom::Within { var: x, lb: 1.0, ub: 3.5 }.truth(&d), Truth::Unknown);
        assert_eq!(Atom::Within { var: x, lb: 3.0, ub: 5.0 }.truth(&d), Truth::True);
        assert_eq!(Atom::Within { var: x, lb: 0.0, ub: 2.0 }.truth(&d), Truth::False);
        assert_eq!(Atom::Below { var: x, bound: 4.0 }.truth(&d), Truth::Unknown);
    }

    #[test]
    fn reified_fixes_indicator_from_domain() {
        let mut store = Store::new();
        let x = store.new_int("x", [2]).unwrap();
        let y = store.new_int("y", [7]).unwrap();
        let b = store.new_bool("b").unwrap();
        let c = store.new_bool("c").unwrap();
        store
            .post_reified(
                b,
                vec![
                    Atom::AtLeast { var: x, bound: 1.0 },
                    Atom::Below { var: x, bound: 3.0 },
                ],
            )
            .unwrap();
        store
            .post_reified(c, vec![Atom::Within { var: y, lb: 0.0, ub: 5.0 }])
            .unwrap();
        store.propagate().unwrap();
        assert_eq!(store.value(b), Some(1.0));
        assert_eq!(store.value(c), Some(0.0));
    }

    #[test]
    fn true_indicator_enforces_conjunction() {
        let mut store = Store::new();
        let x = store.new_int_range("x", 0, 9).unwrap();
        let b = store.new_int("b", [1]).unwrap();
        store
            .post_reified(
                b,
                vec![
                    Atom::AtLeast { var: x, bound: 3.0 },
                    Atom::Below { var: x, bound: 6.0 },
                ],
            )
            .unwrap();
        store.propagate().unwrap();
        assert_eq!(store.domain(x).as_finite().unwrap().values(), &[3, 4, 5]);
    }

    #[test]
    fn false_indicator_refutes_last_open_atom() {
        let mut store = Store::new();
        let x = store.new_int_range("x", 0, 9).unwrap();
        let y = store.new_int("y", [4]).unwrap();
        let b = store.new_int("b", [0]).unwrap();
        store
            .post_reified(
                b,
                vec![
                    Atom::Within { var: y, lb: 0.0, ub: 5.0 },
                    Atom::Within { var: x, lb: 2.0, ub: 8.0 },
                ],
            )
            .unwrap();
        store.propagate().unwrap();
        assert_eq!(store.domain(x).as_finite().unwrap().values(), &[0, 1, 8, 9]);
    }

    #[test]
    fn refuting_within_on_real_keeps_single_ray() {
        let mut store = Store::new();
        let x = store.new_real("x", 1.0, 10.0, 1e-6).unwrap();
        let b = store.new_int("b", [0]).unwrap();
        store
            .post_reified(b, vec![Atom::Within { var: x, lb: 0.0, ub: 4.0 }])
            .unwrap();
        store.propagate().unwrap();
        assert_eq!(store.bounds(x), Interval::new(4.0, 10.0));
    }
}
