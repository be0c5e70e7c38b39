//! Derived statistics as networks of interval constraints.
//!
//! Each entry point ([`mean`], [`variance`], [`standard_error`],
//! [`t_statistic`], [`fisher_ratio`]) links a caller-owned output variable
//! to the observations through fresh intermediate real variables. Every
//! derived quantity is tied to its inputs by exactly one expression
//! constraint, and every fresh variable starts from an analytic bound that
//! contains the statistic for any admissible realization of the inputs.
//!
//! Observations may be integer or real variables; only their bounds are
//! read. Intermediate variables are named after the call's `name`, e.g.
//! `"t.sample_mean"` or `"t.standard_error.variance"`.
//!
//! # Bounds
//!
//! With `n` observations confined to a range of width `R`:
//!
//! - mean ∈ `[min lbᵢ, max ubᵢ]`
//! - sample variance ∈ `[0, ⌊n/2⌋⌈n/2⌉ / (n(n−1)) · R²]`
//! - standard error ∈ `[0, sqrt(V_max / n)]`
//!
//! The variance maximum is attained with half the observations at each end
//! of the range, so both bounds are exact for a box of observations.

use statprop_core::{check_precision, Expr, Interval, Result, StatPropError, Store, VarId};
use tracing::debug;

// ── Validation ──────────────────────────────────────────────────────────────

fn check_observations(store: &Store, op: &str, observations: &[VarId], min_n: usize) -> Result<()> {
    if observations.len() < min_n {
        return Err(StatPropError::Argument(format!(
            "{op}: need at least {min_n} observations, got {}",
            observations.len()
        )));
    }
    for &o in observations {
        store.check_var(o)?;
    }
    Ok(())
}

fn check_output(store: &Store, op: &str, output: VarId) -> Result<()> {
    store.check_var(output)?;
    if store.domain(output).as_real().is_none() {
        return Err(StatPropError::Argument(format!(
            "{op}: output '{}' must be a real variable",
            store.name(output)
        )));
    }
    Ok(())
}

// ── Bounds ──────────────────────────────────────────────────────────────────

/// Smallest interval containing every observation's domain.
pub fn observation_hull(store: &Store, observations: &[VarId]) -> Interval {
    observations
        .iter()
        .fold(Interval::EMPTY, |acc, &o| acc.hull(&store.bounds(o)))
}

/// Largest sample variance (denominator `n − 1`) of `n` values confined to a
/// range of width `range`.
///
/// # Errors
///
/// Returns [`StatPropError::NumericDomain`] if `range` is negative or NaN,
/// and [`StatPropError::Argument`] if `n < 2`.
pub fn max_sample_variance(n: usize, range: f64) -> Result<f64> {
    if n < 2 {
        return Err(StatPropError::Argument(format!(
            "max_sample_variance: need n >= 2, got {n}"
        )));
    }
    if range.is_nan() || range < 0.0 {
        return Err(StatPropError::NumericDomain(format!(
            "max_sample_variance: invalid range width {range}"
        )));
    }
    let low = (n / 2) as f64;
    let high = (n - n / 2) as f64;
    let n_f = n as f64;
    let bound = Interval::point(low * high) / Interval::point(n_f * (n_f - 1.0))
        * Interval::point(range).sqr();
    Ok(bound.hi())
}

fn max_standard_error(n: usize, max_variance: f64) -> f64 {
    (Interval::point(max_variance) / Interval::point(n as f64))
        .sqrt()
        .hi()
}

fn variance_bound(store: &Store, observations: &[VarId]) -> Result<f64> {
    let hull = observation_hull(store, observations);
    if hull.is_empty() {
        return Err(StatPropError::NumericDomain(
            "observation domains are empty".into(),
        ));
    }
    max_sample_variance(observations.len(), hull.width())
}

// ── Links ───────────────────────────────────────────────────────────────────

fn obs_sum(observations: &[VarId]) -> Expr {
    Expr::sum(observations.iter().map(|&o| Expr::var(o)))
}

/// `target = Σ xᵢ / n`
fn link_mean(store: &mut Store, observations: &[VarId], target: VarId) -> Result<()> {
    let n = observations.len() as f64;
    store.post_relation(Expr::var(target), obs_sum(observations) / n)
}

/// `target = Σ (xᵢ − m)² / (n − 1)`
fn link_variance(
    store: &mut Store,
    observations: &[VarId],
    mean: VarId,
    target: VarId,
) -> Result<()> {
    let n = observations.len() as f64;
    let squares = observations
        .iter()
        .map(|&o| (Expr::var(o) - Expr::var(mean)).sqr());
    store.post_relation(Expr::var(target), Expr::sum(squares) / (n - 1.0))
}

/// `target = sqrt(variance / n)`
fn link_standard_error(store: &mut Store, n: usize, variance: VarId, target: VarId) -> Result<()> {
    store.post_relation(
        Expr::var(target),
        (Expr::var(variance) / n as f64).sqrt(),
    )
}

// ── Fresh intermediates ─────────────────────────────────────────────────────

fn fresh_mean(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    precision: f64,
) -> Result<VarId> {
    let hull = observation_hull(store, observations);
    let m = store.new_real(name, hull.lo(), hull.hi(), precision)?;
    link_mean(store, observations, m)?;
    Ok(m)
}

fn fresh_variance(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    precision: f64,
) -> Result<VarId> {
    let v_max = variance_bound(store, observations)?;
    let m = fresh_mean(store, &format!("{name}.mean"), observations, precision)?;
    let v = store.new_real(name, 0.0, v_max, precision)?;
    link_variance(store, observations, m, v)?;
    Ok(v)
}

fn fresh_standard_error(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    precision: f64,
) -> Result<VarId> {
    let v_max = variance_bound(store, observations)?;
    let var = fresh_variance(store, &format!("{name}.variance"), observations, precision)?;
    let se = store.new_real(
        name,
        0.0,
        max_standard_error(observations.len(), v_max),
        precision,
    )?;
    link_standard_error(store, observations.len(), var, se)?;
    Ok(se)
}

// ── Public decompositions ───────────────────────────────────────────────────

/// Constrain `output` to the arithmetic mean of `observations`.
///
/// Narrows `output` to `[min lbᵢ, max ubᵢ]` and posts `output = Σ xᵢ / n`.
///
/// # Errors
///
/// [`StatPropError::Argument`] if there are no observations, the precision
/// is not positive, or `output` is not a real variable.
/// [`StatPropError::Infeasible`] if `output` is disjoint from the observation
/// hull; the store is left unchanged.
pub fn mean(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    output: VarId,
    precision: f64,
) -> Result<()> {
    check_precision(precision)?;
    check_observations(store, "mean", observations, 1)?;
    check_output(store, "mean", output)?;
    let hull = observation_hull(store, observations);

    store.batch(|s| {
        s.narrow(output, hull)?;
        link_mean(s, observations, output)
    })?;
    debug!(statistic = "mean", name, n = observations.len(), "decomposed");
    Ok(())
}

/// Constrain `output` to the sample variance (denominator `n − 1`).
///
/// Creates a fresh mean `"{name}.mean"`.
///
/// # Errors
///
/// [`StatPropError::Argument`] for fewer than two observations, a bad
/// precision or a non-real `output`. [`StatPropError::Infeasible`] if
/// `output` is disjoint from `[0, V_max]`; the store is left unchanged.
pub fn variance(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    output: VarId,
    precision: f64,
) -> Result<()> {
    check_precision(precision)?;
    check_observations(store, "variance", observations, 2)?;
    check_output(store, "variance", output)?;
    let v_max = variance_bound(store, observations)?;

    store.batch(|s| {
        s.narrow(output, Interval::new(0.0, v_max))?;
        let m = fresh_mean(s, &format!("{name}.mean"), observations, precision)?;
        link_variance(s, observations, m, output)
    })?;
    debug!(statistic = "variance", name, n = observations.len(), v_max, "decomposed");
    Ok(())
}

/// Constrain `output` to the standard error of the mean, `s / √n`.
///
/// Creates a fresh variance `"{name}.variance"` (and its mean).
///
/// # Errors
///
/// [`StatPropError::Argument`] for fewer than two observations, a bad
/// precision or a non-real `output`. [`StatPropError::Infeasible`] if
/// `output` is disjoint from `[0, sqrt(V_max / n)]`; the store is left
/// unchanged.
pub fn standard_error(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    output: VarId,
    precision: f64,
) -> Result<()> {
    check_precision(precision)?;
    check_observations(store, "standard_error", observations, 2)?;
    check_output(store, "standard_error", output)?;
    let v_max = variance_bound(store, observations)?;
    let se_max = max_standard_error(observations.len(), v_max);

    store.batch(|s| {
        s.narrow(output, Interval::new(0.0, se_max))?;
        let var = fresh_variance(s, &format!("{name}.variance"), observations, precision)?;
        link_standard_error(s, observations.len(), var, output)
    })?;
    debug!(statistic = "standard_error", name, n = observations.len(), se_max, "decomposed");
    Ok(())
}

/// Constrain `output` to the one-sample t statistic
/// `(x̄ − μ) / (s / √n)` against the hypothesised mean `mu`.
///
/// Creates `"{name}.sample_mean"` and `"{name}.standard_error"`, then posts
/// `output · se = x̄ − μ`. When the standard-error domain contains zero the
/// relation leaves `output` unconstrained.
pub fn t_statistic(
    store: &mut Store,
    name: &str,
    observations: &[VarId],
    mu: VarId,
    output: VarId,
    precision: f64,
) -> Result<()> {
    check_precision(precision)?;
    check_observations(store, "t_statistic", observations, 2)?;
    store.check_var(mu)?;
    check_output(store, "t_statistic", output)?;
    variance_bound(store, observations)?;

    store.batch(|s| {
        let sample_mean = fresh_mean(s, &format!("{name}.sample_mean"), observations, precision)?;
        let se_name = format!("{name}.standard_error");
        let se = fresh_standard_error(s, &se_name, observations, precision)?;
        s.post_relation(
            Expr::var(output) * Expr::var(se),
            Expr::var(sample_mean) - Expr::var(mu),
        )
    })?;
    debug!(statistic = "t", name, n = observations.len(), "decomposed");
    Ok(())
}

/// Constrain `output` to the variance ratio `var(a) / var(b)`.
///
/// Each variance is decomposed independently (`"{name}.variance_a"`,
/// `"{name}.variance_b"`). The ratio is posted as
/// `output · var(b) = var(a)`, so a denominator domain that contains zero
/// leaves `output` unbounded above instead of being cut off.
pub fn fisher_ratio(
    store: &mut Store,
    name: &str,
    observations_a: &[VarId],
    observations_b: &[VarId],
    output: VarId,
    precision: f64,
) -> Result<()> {
    check_precision(precision)?;
    check_observations(store, "fisher_ratio", observations_a, 2)?;
    check_observations(store, "fisher_ratio", observations_b, 2)?;
    check_output(store, "fisher_ratio", output)?;
    variance_bound(store, observations_a)?;
    variance_bound(store, observations_b)?;

    store.batch(|s| {
        s.narrow(output, Interval::NON_NEGATIVE)?;
        let va = fresh_variance(s, &format!("{name}.variance_a"), observations_a, precision)?;
        let vb = fresh_variance(s, &format!("{name}.variance_b"), observations_b, precision)?;
        s.post_relation(Expr::var(output) * Expr::var(vb), Expr::var(va))
    })?;
    debug!(
        statistic = "fisher_ratio",
        name,
        n_a = observations_a.len(),
        n_b = observations_b.len(),
        "decomposed"
    );
    Ok(())
}
