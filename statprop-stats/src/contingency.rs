//! Two-way contingency tables over paired series.
//!
//! Every cell `(i, j)` of the table counts the paired samples whose first
//! value lies in row bin `i` and whose second value lies in column bin `j`.
//! Each (cell, sample) pair gets a reified indicator; indicators sum to the
//! cell count, and cell counts sum to the row and column marginals.

use statprop_core::{Expr, Interval, Result, StatPropError, Store, VarId};
use tracing::debug;

use crate::membership::{
    bins_from_boundaries, check_bins, check_series, check_vars, covers, indicator, BinInterval,
    SeriesKind,
};

/// Row and column bins of a contingency table.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyBins {
    pub rows: Vec<BinInterval>,
    pub cols: Vec<BinInterval>,
}

impl ContingencyBins {
    /// # Errors
    ///
    /// Returns an error if either dimension is empty or has overlapping bins.
    pub fn new(rows: Vec<BinInterval>, cols: Vec<BinInterval>) -> Result<Self> {
        check_bins("contingency rows", &rows)?;
        check_bins("contingency columns", &cols)?;
        Ok(Self { rows, cols })
    }

    /// Contiguous bins from row and column boundary lists.
    pub fn from_boundaries(rows: &[f64], cols: &[f64]) -> Result<Self> {
        Self::new(bins_from_boundaries(rows)?, bins_from_boundaries(cols)?)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }
}

fn check_shapes(
    series_a: &[VarId],
    series_b: &[VarId],
    cells: &[Vec<VarId>],
    bins: &ContingencyBins,
    marginals_h: &[VarId],
    marginals_v: &[VarId],
) -> Result<()> {
    let (rows, cols) = bins.shape();
    if series_a.len() != series_b.len() {
        return Err(StatPropError::Argument(format!(
            "contingency: series lengths differ ({} vs {})",
            series_a.len(),
            series_b.len()
        )));
    }
    if cells.len() != rows || cells.iter().any(|row| row.len() != cols) {
        return Err(StatPropError::Argument(format!(
            "contingency: cell grid must be {rows}x{cols}"
        )));
    }
    if marginals_h.len() != rows {
        return Err(StatPropError::Argument(format!(
            "contingency: expected {rows} row marginals, got {}",
            marginals_h.len()
        )));
    }
    if marginals_v.len() != cols {
        return Err(StatPropError::Argument(format!(
            "contingency: expected {cols} column marginals, got {}",
            marginals_v.len()
        )));
    }
    Ok(())
}

/// Decompose a contingency table over paired samples.
///
/// For every cell `(i, j)` and sample `s`, creates `"{name}[i][j].{s}"`
/// reified over `series_a[s] ∈ rows[i] ∧ series_b[s] ∈ cols[j]`, then posts
/// `Σₛ = cells[i][j]`, `Σⱼ cells[i][j] = marginals_h[i]` and
/// `Σᵢ cells[i][j] = marginals_v[j]`. Each sample lies in at most one cell;
/// when the bins cover the domains of both of its values it lies in exactly
/// one.
///
/// # Errors
///
/// [`StatPropError::Argument`] on mismatched series lengths, a grid that is
/// not `rows × cols`, marginal arrays of the wrong length, or series
/// variables that do not fit the series kind. Nothing is created on error.
#[allow(clippy::too_many_arguments)]
pub fn decompose<S: SeriesKind>(
    store: &mut Store,
    name: &str,
    series_a: &[VarId],
    series_b: &[VarId],
    cells: &[Vec<VarId>],
    bins: &ContingencyBins,
    marginals_h: &[VarId],
    marginals_v: &[VarId],
) -> Result<()> {
    check_shapes(series_a, series_b, cells, bins, marginals_h, marginals_v)?;
    check_series::<S>(store, "contingency", series_a)?;
    check_series::<S>(store, "contingency", series_b)?;
    for row in cells {
        check_vars(store, row)?;
    }
    check_vars(store, marginals_h)?;
    check_vars(store, marginals_v)?;

    store.batch(|s| {
        let mut per_sample: Vec<Vec<VarId>> = vec![Vec::new(); series_a.len()];
        for (i, row_bin) in bins.rows.iter().enumerate() {
            for (j, col_bin) in bins.cols.iter().enumerate() {
                let mut indicators = Vec::with_capacity(series_a.len());
                for (k, (&a, &b)) in series_a.iter().zip(series_b).enumerate() {
                    let mut atoms = S::membership(a, row_bin);
                    atoms.extend(S::membership(b, col_bin));
                    let v = indicator(s, &format!("{name}[{i}][{j}].{k}"), atoms)?;
                    indicators.push(v);
                    per_sample[k].push(v);
                }
                s.post_sum(&indicators, cells[i][j])?;
            }
        }
        // a sample falls in at most one cell, and in exactly one when the
        // bins cover both of its domains
        for (k, indicators) in per_sample.into_iter().enumerate() {
            let covered = covers(&bins.rows, s.domain(series_a[k]))
                && covers(&bins.cols, s.domain(series_b[k]));
            let lo = if covered { 1.0 } else { 0.0 };
            s.post_expr(
                Expr::sum(indicators.into_iter().map(Expr::var)),
                Interval::new(lo, 1.0),
            )?;
        }
        for (row, &marginal) in cells.iter().zip(marginals_h) {
            s.post_sum(row, marginal)?;
        }
        for (j, &marginal) in marginals_v.iter().enumerate() {
            let column: Vec<VarId> = cells.iter().map(|row| row[j]).collect();
            s.post_sum(&column, marginal)?;
        }
        Ok(())
    })?;
    debug!(
        kind = S::KIND,
        name,
        samples = series_a.len(),
        rows = bins.rows.len(),
        cols = bins.cols.len(),
        "decomposed contingency table"
    );
    Ok(())
}
