//! Matrix inversion as entrywise product constraints.
//!
//! `M × X = I` is posted as n² independent constraints
//! `Σₖ M[i][k] · X[k][j] = δᵢⱼ`; no elimination is performed. When `M` is
//! fixed and well conditioned, propagation collapses `X` to the inverse.
//! A singular `M` raises nothing: `X` simply stays wide.

use statprop_core::{check_precision, Expr, Interval, Result, StatPropError, Store, VarId};
use tracing::debug;

use crate::membership::check_vars;

fn check_square(what: &str, grid: &[Vec<VarId>], n: usize) -> Result<()> {
    if grid.len() != n || grid.iter().any(|row| row.len() != n) {
        return Err(StatPropError::Argument(format!(
            "matrix: {what} must be {n}x{n}"
        )));
    }
    Ok(())
}

/// Post `m × x = I`.
///
/// # Errors
///
/// [`StatPropError::Argument`] if `m` is empty, either grid is not square,
/// the shapes differ, or a variable is unknown. Nothing is posted on error.
pub fn decompose(
    store: &mut Store,
    name: &str,
    m: &[Vec<VarId>],
    x: &[Vec<VarId>],
) -> Result<()> {
    let n = m.len();
    if n == 0 {
        return Err(StatPropError::Argument("matrix: empty matrix".into()));
    }
    check_square("M", m, n)?;
    check_square("X", x, n)?;
    for row in m.iter().chain(x) {
        check_vars(store, row)?;
    }

    store.batch(|s| {
        for i in 0..n {
            for j in 0..n {
                let product = Expr::sum((0..n).map(|k| Expr::var(m[i][k]) * Expr::var(x[k][j])));
                let delta = if i == j { 1.0 } else { 0.0 };
                s.post_expr(product, Interval::point(delta))?;
            }
        }
        Ok(())
    })?;
    debug!(name, n, constraints = n * n, "decomposed matrix inverse");
    Ok(())
}

/// Allocate an n×n grid of real variables `"{name}[i][j]"` in `[-bound, bound]`.
///
/// # Errors
///
/// [`StatPropError::Argument`] for `n == 0`, a non-positive precision or a
/// name collision; [`StatPropError::NumericDomain`] if `bound` is negative
/// or NaN.
pub fn inverse_grid(
    store: &mut Store,
    name: &str,
    n: usize,
    bound: f64,
    precision: f64,
) -> Result<Vec<Vec<VarId>>> {
    if n == 0 {
        return Err(StatPropError::Argument("inverse_grid: n must be positive".into()));
    }
    check_precision(precision)?;
    if bound.is_nan() || bound < 0.0 {
        return Err(StatPropError::NumericDomain(format!(
            "inverse_grid: invalid bound {bound}"
        )));
    }
    store.batch(|s| {
        (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| s.new_real(&format!("{name}[{i}][{j}]"), -bound, bound, precision))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    })
}
