//! Arena-indexed constraint store and fixed-point propagation loop.
//!
//! A [`Store`] owns every variable and every posted constraint of one
//! problem instance. Variables are addressed by [`VarId`] arena indices,
//! constraints by their posting order. [`Store::propagate`] runs all
//! propagators to a fixed point; there is no search and no backtracking
//! beyond the rollback performed by [`Store::batch`].

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::config::PropagationConfig;
use crate::constraints::{Atom, Reified, Sum};
use crate::domain::{Domain, FiniteDomain, RealDomain, VarId};
use crate::expr::{Expr, ExprConstraint};
use crate::interval::Interval;
use crate::traits::{NumericDomain, Propagator, Summarizable};
use crate::{Result, StatPropError};

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    domain: Domain,
}

/// The variable arena, handed to propagators during propagation.
///
/// Every narrowing goes through this type so that changes can be recorded
/// for re-scheduling and, inside a batch, trailed for rollback.
#[derive(Debug)]
pub struct Variables {
    vars: Vec<Variable>,
    names: FxHashMap<String, VarId>,
    ratio: f64,
    changed: Vec<VarId>,
    trail: Vec<(VarId, Domain)>,
    trail_depth: usize,
}

impl Variables {
    fn new(ratio: f64) -> Self {
        Self {
            vars: Vec::new(),
            names: FxHashMap::default(),
            ratio,
            changed: Vec::new(),
            trail: Vec::new(),
            trail_depth: 0,
        }
    }

    /// Number of variables in the arena.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the arena holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Whether `id` addresses a variable of this arena.
    pub fn contains(&self, id: VarId) -> bool {
        id.0 < self.vars.len()
    }

    /// Name of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this arena.
    pub fn name(&self, id: VarId) -> &str {
        &self.vars[id.0].name
    }

    /// Current domain of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this arena.
    pub fn domain(&self, id: VarId) -> &Domain {
        &self.vars[id.0].domain
    }

    /// Interval hull of the domain of `id`.
    pub fn bounds(&self, id: VarId) -> Interval {
        self.domain(id).hull()
    }

    /// Whether the domain of `id` is a single value (or within ε for reals).
    pub fn is_fixed(&self, id: VarId) -> bool {
        self.domain(id).is_fixed()
    }

    /// Intersect the domain of `id` with `by`.
    ///
    /// Finite domains keep the integers inside `by`. Returns whether the
    /// domain changed.
    pub fn narrow(&mut self, id: VarId, by: Interval) -> Result<bool> {
        match &self.vars[id.0].domain {
            Domain::Finite(d) => {
                let lo = by.lo().ceil();
                let hi = by.hi().floor();
                let trims_low = d.min().is_some_and(|m| (m as f64) < lo);
                let trims_high = d.max().is_some_and(|m| (m as f64) > hi);
                if !(trims_low || trims_high) {
                    return Ok(false);
                }
                self.retain(id, |v| (v as f64) >= lo && (v as f64) <= hi)
            }
            Domain::Real(r) => {
                let old = r.interval();
                let precision = r.precision();
                let new = old.intersect(&by);
                if new == old {
                    return Ok(false);
                }
                if new.is_empty() {
                    return Err(self.wiped_out(id));
                }
                self.save(id);
                if let Domain::Real(r) = &mut self.vars[id.0].domain {
                    r.set_interval(new);
                }
                let significant = if old.width().is_infinite() {
                    new.unbounded_sides() < old.unbounded_sides()
                } else {
                    old.width() > precision && old.width() - new.width() > self.ratio * old.width()
                };
                if significant {
                    self.changed.push(id);
                }
                Ok(true)
            }
        }
    }

    /// Keep only the values of a finite domain satisfying `keep`.
    ///
    /// Real variables are narrowed through [`narrow`](Self::narrow) instead;
    /// calling this on one is an argument error.
    pub fn retain(&mut self, id: VarId, mut keep: impl FnMut(i64) -> bool) -> Result<bool> {
        let needs_change = match &self.vars[id.0].domain {
            Domain::Finite(d) => d.values().iter().any(|&v| !keep(v)),
            Domain::Real(_) => {
                return Err(StatPropError::Argument(format!(
                    "cannot filter values of real variable '{}'",
                    self.name(id)
                )))
            }
        };
        if !needs_change {
            return Ok(false);
        }
        self.save(id);
        let mut emptied = false;
        if let Domain::Finite(d) = &mut self.vars[id.0].domain {
            d.retain(&mut keep);
            emptied = d.is_empty();
        }
        if emptied {
            return Err(self.wiped_out(id));
        }
        self.changed.push(id);
        Ok(true)
    }

    /// Intersect the domain of `id` with another domain.
    pub fn restrict(&mut self, id: VarId, to: &Domain) -> Result<bool> {
        match (self.domain(id).is_finite(), to) {
            (true, Domain::Finite(allowed)) => {
                let allowed = allowed.clone();
                self.retain(id, |v| allowed.contains_value(v))
            }
            _ => self.narrow(id, to.hull()),
        }
    }

    fn wiped_out(&self, id: VarId) -> StatPropError {
        StatPropError::Infeasible(format!("domain of '{}' is empty", self.name(id)))
    }

    fn save(&mut self, id: VarId) {
        if self.trail_depth > 0 {
            let old = self.vars[id.0].domain.clone();
            self.trail.push((id, old));
        }
    }

    fn push(&mut self, name: &str, domain: Domain) -> Result<VarId> {
        if self.names.contains_key(name) {
            return Err(StatPropError::Argument(format!(
                "variable name '{name}' is already in use"
            )));
        }
        let id = VarId(self.vars.len());
        self.vars.push(Variable {
            name: name.to_string(),
            domain,
        });
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    fn take_changes(&mut self) -> Vec<VarId> {
        std::mem::take(&mut self.changed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    vars: usize,
    constraints: usize,
    trail: usize,
}

/// Shared constraint store for one problem instance.
///
/// # Examples
///
/// ```
/// use statprop_core::{Expr, Store};
///
/// let mut store = Store::new();
/// let x = store.new_real("x", 0.0, 10.0, 1e-9).unwrap();
/// let y = store.new_real("y", 0.0, 10.0, 1e-9).unwrap();
/// store.post_relation(Expr::var(x) + Expr::var(y), Expr::constant(3.0)).unwrap();
/// store.post_relation(Expr::var(x), Expr::constant(1.0)).unwrap();
/// store.propagate().unwrap();
/// assert!((store.value(y).unwrap() - 2.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct Store {
    vars: Variables,
    constraints: Vec<Box<dyn Propagator>>,
    watchers: Vec<Vec<usize>>,
    config: PropagationConfig,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        let config = PropagationConfig::default();
        Self {
            vars: Variables::new(config.effective_ratio()),
            constraints: Vec::new(),
            watchers: Vec::new(),
            config,
        }
    }

    /// Create an empty store with a validated configuration.
    pub fn with_config(config: PropagationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            vars: Variables::new(config.effective_ratio()),
            constraints: Vec::new(),
            watchers: Vec::new(),
            config,
        })
    }

    /// The configuration this store propagates with.
    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Read-only view of the variable arena.
    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    /// Number of variables created so far.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Number of posted propagators.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    // ── Variable creation ─────────────────────────────────────────────────

    /// Integer variable over an explicit value set.
    pub fn new_int(&mut self, name: &str, values: impl IntoIterator<Item = i64>) -> Result<VarId> {
        let domain = FiniteDomain::new(values);
        if domain.is_empty() {
            return Err(StatPropError::Argument(format!(
                "new_int: domain of '{name}' must not be empty"
            )));
        }
        self.add_var(name, Domain::Finite(domain))
    }

    /// Integer variable over `[lo, hi]`.
    pub fn new_int_range(&mut self, name: &str, lo: i64, hi: i64) -> Result<VarId> {
        if lo > hi {
            return Err(StatPropError::Argument(format!(
                "new_int_range: '{name}' has lo {lo} > hi {hi}"
            )));
        }
        self.add_var(name, Domain::Finite(FiniteDomain::range(lo, hi)))
    }

    /// Boolean variable, encoded as the integer domain `{0, 1}`.
    pub fn new_bool(&mut self, name: &str) -> Result<VarId> {
        self.add_var(name, Domain::Finite(FiniteDomain::range(0, 1)))
    }

    /// Real variable `[lo, hi]` with precision ε.
    pub fn new_real(&mut self, name: &str, lo: f64, hi: f64, precision: f64) -> Result<VarId> {
        check_precision(precision)?;
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(StatPropError::NumericDomain(format!(
                "new_real: '{name}' has invalid bounds [{lo}, {hi}]"
            )));
        }
        self.add_var(
            name,
            Domain::Real(RealDomain::new(Interval::new(lo, hi), precision)),
        )
    }

    /// Real variable fixed to `value`, with the configured default precision.
    pub fn new_constant(&mut self, name: &str, value: f64) -> Result<VarId> {
        let precision = self.config.effective_default_precision();
        self.new_real(name, value, value, precision)
    }

    fn add_var(&mut self, name: &str, domain: Domain) -> Result<VarId> {
        let id = self.vars.push(name, domain)?;
        self.watchers.push(Vec::new());
        trace!(var = name, id = id.0, "created variable");
        Ok(id)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// Find a variable by its unique name.
    pub fn lookup(&self, name: &str) -> Option<VarId> {
        self.vars.names.get(name).copied()
    }

    /// Whether `id` addresses a variable of this store.
    pub fn contains(&self, id: VarId) -> bool {
        self.vars.contains(id)
    }

    /// Name of `id`. Panics on a foreign id.
    pub fn name(&self, id: VarId) -> &str {
        self.vars.name(id)
    }

    /// Current domain of `id`. Panics on a foreign id.
    pub fn domain(&self, id: VarId) -> &Domain {
        self.vars.domain(id)
    }

    /// Interval hull of the current domain of `id`.
    pub fn bounds(&self, id: VarId) -> Interval {
        self.vars.bounds(id)
    }

    /// Whether `id` is fixed to a single value.
    pub fn is_fixed(&self, id: VarId) -> bool {
        self.vars.is_fixed(id)
    }

    /// The value of a fixed variable (midpoint for reals), if fixed.
    pub fn value(&self, id: VarId) -> Option<f64> {
        let domain = self.domain(id);
        if !domain.is_fixed() {
            return None;
        }
        Some(domain.hull().midpoint())
    }

    /// Narrow a variable directly. Trailed inside a batch.
    pub fn narrow(&mut self, id: VarId, by: Interval) -> Result<bool> {
        self.check_var(id)?;
        self.vars.narrow(id, by)
    }

    /// `Argument` error unless `id` belongs to this store.
    pub fn check_var(&self, id: VarId) -> Result<()> {
        if self.vars.contains(id) {
            Ok(())
        } else {
            Err(StatPropError::Argument(format!(
                "unknown variable {id} (store has {} variables)",
                self.vars.len()
            )))
        }
    }

    // ── Posting ───────────────────────────────────────────────────────────

    /// Post an arbitrary propagator.
    pub fn post(&mut self, propagator: Box<dyn Propagator>) -> Result<()> {
        let mut scope = propagator.scope();
        for &v in &scope {
            self.check_var(v)?;
        }
        scope.sort_unstable();
        scope.dedup();
        let index = self.constraints.len();
        for v in scope {
            self.watchers[v.0].push(index);
        }
        trace!(constraint = %propagator.label(), index, "posted constraint");
        self.constraints.push(propagator);
        Ok(())
    }

    /// Post `lhs = rhs` as one interval-consistency constraint.
    pub fn post_relation(&mut self, lhs: Expr, rhs: Expr) -> Result<()> {
        self.post_expr(lhs - rhs, Interval::point(0.0))
    }

    /// Post `expr ∈ target` as one interval-consistency constraint.
    pub fn post_expr(&mut self, expr: Expr, target: Interval) -> Result<()> {
        if target.is_empty() {
            return Err(StatPropError::NumericDomain(format!(
                "post_expr: empty target for {expr}"
            )));
        }
        self.post(Box::new(ExprConstraint::new(&expr, target)))
    }

    /// Post `Σ terms = total`.
    pub fn post_sum(&mut self, terms: &[VarId], total: VarId) -> Result<()> {
        self.post(Box::new(Sum::new(terms.to_vec(), total)))
    }

    /// Post `indicator ⇔ (atom₁ ∧ … ∧ atomₖ)`.
    pub fn post_reified(&mut self, indicator: VarId, atoms: Vec<Atom>) -> Result<()> {
        self.check_var(indicator)?;
        let is_bool = self
            .domain(indicator)
            .as_finite()
            .is_some_and(|d| d.values().iter().all(|&v| v == 0 || v == 1));
        if !is_bool {
            return Err(StatPropError::Argument(format!(
                "post_reified: '{}' is not a boolean variable",
                self.name(indicator)
            )));
        }
        if atoms.is_empty() {
            return Err(StatPropError::Argument(
                "post_reified: conjunction must not be empty".into(),
            ));
        }
        self.post(Box::new(Reified::new(indicator, atoms)))
    }

    // ── Propagation ───────────────────────────────────────────────────────

    /// Run every propagator to a fixed point.
    ///
    /// A finite-domain removal always re-schedules the variable's watchers;
    /// a real variable does so only when its width shrinks by more than the
    /// configured ratio. Stops with a warning after `max_steps` invocations.
    pub fn propagate(&mut self) -> Result<()> {
        let n = self.constraints.len();
        let max_steps = self.config.effective_max_steps();
        let mut queue: VecDeque<usize> = (0..n).collect();
        let mut queued = vec![true; n];
        let mut steps = 0usize;
        self.vars.take_changes();

        while let Some(c) = queue.pop_front() {
            queued[c] = false;
            if steps == max_steps {
                warn!(steps, pending = queue.len() + 1, "propagation step cap reached");
                break;
            }
            steps += 1;
            if let Err(e) = self.constraints[c].propagate(&mut self.vars) {
                debug!(constraint = %self.constraints[c].label(), error = %e, "propagation failed");
                return Err(e);
            }
            for v in self.vars.take_changes() {
                for &w in &self.watchers[v.0] {
                    if !queued[w] {
                        queued[w] = true;
                        queue.push_back(w);
                    }
                }
            }
        }
        debug!(steps, constraints = n, "propagation reached fixed point");
        Ok(())
    }

    // ── Batches ───────────────────────────────────────────────────────────

    /// Run `f` as one atomic batch.
    ///
    /// If `f` fails, every variable and constraint it created is removed and
    /// every domain it narrowed is restored.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Store) -> Result<T>) -> Result<T> {
        let mark = Mark {
            vars: self.vars.len(),
            constraints: self.constraints.len(),
            trail: self.vars.trail.len(),
        };
        self.vars.trail_depth += 1;
        let out = f(self);
        self.vars.trail_depth -= 1;
        match out {
            Ok(value) => {
                if self.vars.trail_depth == 0 {
                    self.vars.trail.clear();
                }
                Ok(value)
            }
            Err(e) => {
                self.rollback(mark);
                debug!(error = %e, "batch rolled back");
                Err(e)
            }
        }
    }

    fn rollback(&mut self, mark: Mark) {
        while self.vars.trail.len() > mark.trail {
            if let Some((id, domain)) = self.vars.trail.pop() {
                if id.0 < mark.vars {
                    self.vars.vars[id.0].domain = domain;
                }
            }
        }
        for removed in self.vars.vars.drain(mark.vars..) {
            self.vars.names.remove(&removed.name);
        }
        self.constraints.truncate(mark.constraints);
        self.watchers.truncate(mark.vars);
        for list in &mut self.watchers {
            list.retain(|&c| c < mark.constraints);
        }
        self.vars.changed.clear();
    }
}

impl Summarizable for Store {
    fn summary(&self) -> String {
        let fixed = (0..self.vars.len())
            .filter(|&i| self.vars.is_fixed(VarId(i)))
            .count();
        format!(
            "vars={}, fixed={}, constraints={}",
            self.vars.len(),
            fixed,
            self.constraints.len()
        )
    }
}

/// Precision must be positive and finite.
pub fn check_precision(precision: f64) -> Result<()> {
    if precision.is_finite() && precision > 0.0 {
        Ok(())
    } else {
        Err(StatPropError::Argument(format!(
            "precision must be positive and finite, got {precision}"
        )))
    }
}
