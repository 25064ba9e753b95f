//! Append-only postsolve trail.
//!
//! Every transformation that removes a column records enough information to
//! reconstruct the column's value from a solution of the reduced problem.
//! Entries are stored with indices of the *original* problem space; the
//! trail keeps the current-to-original index maps up to date across
//! compressions so notifications can always be translated on arrival.
//! Replaying the trail in reverse lifts a reduced solution back to the
//! original problem.

use crate::flags::{ColFlags, RowFlags};
use crate::problem::Problem;

/// Snapshot of one row, taken when a column is fixed at infinity.
#[derive(Debug, Clone)]
struct RowSnapshot {
    /// `(original column, coefficient)` entries of the row.
    entries: Vec<(usize, f64)>,
    /// Finite left-hand side, if any.
    lhs: Option<f64>,
    /// Finite right-hand side, if any.
    rhs: Option<f64>,
}

/// One trail entry, in original index space.
#[derive(Debug, Clone)]
enum TrailEntry {
    /// Column fixed to a finite value.
    FixedCol { col: usize, val: f64 },

    /// Column fixed at plus or minus infinity; the rows it appeared in are
    /// kept so replay can pick a finite value satisfying them.
    FixedInfCol {
        col: usize,
        sign: i32,
        bound: f64,
        integral: bool,
        rows: Vec<RowSnapshot>,
    },

    /// Column eliminated through an equality `entries · x = rhs`.
    Substitution {
        col: usize,
        entries: Vec<(usize, f64)>,
        rhs: f64,
    },

    /// `col1` merged into `col2`, where `col1 = scale · col2` in the matrix;
    /// the merged variable carried by `col2` equals `x2 + scale · x1`.
    ParallelCols {
        col1: usize,
        col1_integral: bool,
        col1_lb: Option<f64>,
        col1_ub: Option<f64>,
        col2: usize,
        col2_integral: bool,
        col2_lb: Option<f64>,
        col2_ub: Option<f64>,
        scale: f64,
    },
}

/// The postsolve trail.
#[derive(Debug)]
pub struct Postsolve {
    orig_ncols: usize,
    /// Current row index to original row index.
    origrow_map: Vec<usize>,
    /// Current column index to original column index.
    origcol_map: Vec<usize>,
    entries: Vec<TrailEntry>,
}

impl Postsolve {
    /// Create an empty trail for a problem of the given original size.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            orig_ncols: ncols,
            origrow_map: (0..nrows).collect(),
            origcol_map: (0..ncols).collect(),
            entries: Vec::new(),
        }
    }

    /// Number of recorded transformations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original column index of a current column.
    pub fn orig_col(&self, col: usize) -> usize {
        self.origcol_map[col]
    }

    /// Original row index of a current row.
    pub fn orig_row(&self, row: usize) -> usize {
        self.origrow_map[row]
    }

    /// Record a column fixed to a finite value.
    pub fn notify_fixed_col(&mut self, col: usize, val: f64) {
        let col = self.origcol_map[col];
        self.entries.push(TrailEntry::FixedCol { col, val });
    }

    /// Record a column fixed at the infinity with the given sign.
    ///
    /// `bound` is the column's opposite finite bound; replay starts there and
    /// moves in the direction of `sign` as far as the stored rows permit.
    pub fn notify_fixed_inf_col(&mut self, col: usize, sign: i32, bound: f64, problem: &Problem) {
        debug_assert!(sign == -1 || sign == 1);
        let integral = problem.col_flags()[col].test(ColFlags::INTEGRAL);

        let mut rows = Vec::new();
        for &(row, _) in problem.matrix().col(col) {
            let rflags = problem.matrix().row_flags()[row];
            let entries = problem
                .matrix()
                .row(row)
                .iter()
                .map(|&(c, v)| (self.origcol_map[c], v))
                .collect();
            rows.push(RowSnapshot {
                entries,
                lhs: (!rflags.test(RowFlags::LHS_INF))
                    .then(|| problem.matrix().lhs()[row]),
                rhs: (!rflags.test(RowFlags::RHS_INF))
                    .then(|| problem.matrix().rhs()[row]),
            });
        }

        let col = self.origcol_map[col];
        self.entries.push(TrailEntry::FixedInfCol {
            col,
            sign,
            bound,
            integral,
            rows,
        });
    }

    /// Record a substitution of `col` through `entries · x = rhs`.
    ///
    /// `entries` carries current column indices.
    pub fn notify_substitution(&mut self, col: usize, entries: &[(usize, f64)], rhs: f64) {
        let col = self.origcol_map[col];
        let entries = entries
            .iter()
            .map(|&(c, v)| (self.origcol_map[c], v))
            .collect();
        self.entries.push(TrailEntry::Substitution { col, entries, rhs });
    }

    /// Record the merge of two parallel columns.
    #[allow(clippy::too_many_arguments)]
    pub fn notify_parallel_cols(
        &mut self,
        col1: usize,
        col1_integral: bool,
        col1_lb: Option<f64>,
        col1_ub: Option<f64>,
        col2: usize,
        col2_integral: bool,
        col2_lb: Option<f64>,
        col2_ub: Option<f64>,
        scale: f64,
    ) {
        let col1 = self.origcol_map[col1];
        let col2 = self.origcol_map[col2];
        self.entries.push(TrailEntry::ParallelCols {
            col1,
            col1_integral,
            col1_lb,
            col1_ub,
            col2,
            col2_integral,
            col2_lb,
            col2_ub,
            scale,
        });
    }

    /// Update the index maps after a compression.
    pub fn compress(&mut self, row_map: &[Option<usize>], col_map: &[Option<usize>]) {
        let mut new_rows = vec![0usize; row_map.iter().filter(|m| m.is_some()).count()];
        for (old, map) in row_map.iter().enumerate() {
            if let Some(new) = *map {
                new_rows[new] = self.origrow_map[old];
            }
        }
        self.origrow_map = new_rows;

        let mut new_cols = vec![0usize; col_map.iter().filter(|m| m.is_some()).count()];
        for (old, map) in col_map.iter().enumerate() {
            if let Some(new) = *map {
                new_cols[new] = self.origcol_map[old];
            }
        }
        self.origcol_map = new_cols;
    }

    /// Lift a solution of the reduced problem back to the original space.
    ///
    /// `reduced` is indexed by the current (live) columns. The trail is
    /// replayed in reverse; every entry reconstructs the value of the column
    /// it removed from the values restored so far.
    pub fn undo(&self, reduced: &[f64]) -> Vec<f64> {
        debug_assert_eq!(reduced.len(), self.origcol_map.len());

        let mut x = vec![0.0; self.orig_ncols];
        for (cur, &orig) in self.origcol_map.iter().enumerate() {
            x[orig] = reduced[cur];
        }

        for entry in self.entries.iter().rev() {
            match entry {
                TrailEntry::FixedCol { col, val } => x[*col] = *val,

                TrailEntry::FixedInfCol {
                    col,
                    sign,
                    bound,
                    integral,
                    rows,
                } => {
                    x[*col] = recover_inf_fixed_value(*col, *sign, *bound, *integral, rows, &x);
                }

                TrailEntry::Substitution { col, entries, rhs } => {
                    let mut residual = *rhs;
                    let mut coef = 0.0;
                    for &(other, val) in entries {
                        if other == *col {
                            coef = val;
                        } else {
                            residual -= val * x[other];
                        }
                    }
                    debug_assert!(coef != 0.0);
                    x[*col] = residual / coef;
                }

                TrailEntry::ParallelCols {
                    col1,
                    col1_integral,
                    col1_lb,
                    col1_ub,
                    col2,
                    col2_lb,
                    col2_ub,
                    scale,
                    ..
                } => {
                    let merged = x[*col2];
                    let (x1, x2) = split_parallel_value(
                        merged,
                        *col1_integral,
                        *col1_lb,
                        *col1_ub,
                        *col2_lb,
                        *col2_ub,
                        *scale,
                    );
                    x[*col1] = x1;
                    x[*col2] = x2;
                }
            }
        }

        x
    }
}

/// Pick a value for a column that was fixed at infinity: start from the
/// stored opposite bound and move in the fixing direction as far as the
/// remembered rows allow, given the values of the other columns.
fn recover_inf_fixed_value(
    col: usize,
    sign: i32,
    bound: f64,
    integral: bool,
    rows: &[RowSnapshot],
    x: &[f64],
) -> f64 {
    let mut lower = f64::NEG_INFINITY;
    let mut upper = f64::INFINITY;

    for row in rows {
        let mut residual = 0.0;
        let mut coef = 0.0;
        for &(other, val) in &row.entries {
            if other == col {
                coef = val;
            } else {
                residual += val * x[other];
            }
        }
        if coef == 0.0 {
            continue;
        }

        // lhs <= residual + coef * x <= rhs
        if let Some(lhs) = row.lhs {
            let limit = (lhs - residual) / coef;
            if coef > 0.0 {
                lower = lower.max(limit);
            } else {
                upper = upper.min(limit);
            }
        }
        if let Some(rhs) = row.rhs {
            let limit = (rhs - residual) / coef;
            if coef > 0.0 {
                upper = upper.min(limit);
            } else {
                lower = lower.max(limit);
            }
        }
    }

    let mut val = if sign < 0 {
        if upper.is_finite() {
            bound.min(upper)
        } else {
            bound
        }
    } else if lower.is_finite() {
        bound.max(lower)
    } else {
        bound
    };

    // the interval can exceed the starting bound only through roundoff
    val = val.clamp(lower.min(val), upper.max(val));

    if integral {
        if sign < 0 {
            val = val.floor();
        } else {
            val = val.ceil();
        }
    }

    val
}

/// Split the merged value `y = x2 + scale * x1` into components that respect
/// both original domains.
fn split_parallel_value(
    merged: f64,
    col1_integral: bool,
    col1_lb: Option<f64>,
    col1_ub: Option<f64>,
    col2_lb: Option<f64>,
    col2_ub: Option<f64>,
    scale: f64,
) -> (f64, f64) {
    // feasible x1 range induced by x2's domain
    let (mut lo, mut hi) = match (col2_lb, col2_ub) {
        (Some(lb2), Some(ub2)) => {
            let a = (merged - ub2) / scale;
            let b = (merged - lb2) / scale;
            if scale > 0.0 {
                (a, b)
            } else {
                (b, a)
            }
        }
        (Some(lb2), None) => {
            let b = (merged - lb2) / scale;
            if scale > 0.0 {
                (f64::NEG_INFINITY, b)
            } else {
                (b, f64::INFINITY)
            }
        }
        (None, Some(ub2)) => {
            let a = (merged - ub2) / scale;
            if scale > 0.0 {
                (a, f64::INFINITY)
            } else {
                (f64::NEG_INFINITY, a)
            }
        }
        (None, None) => (f64::NEG_INFINITY, f64::INFINITY),
    };

    if let Some(lb1) = col1_lb {
        lo = lo.max(lb1);
    }
    if let Some(ub1) = col1_ub {
        hi = hi.min(ub1);
    }

    let mut x1 = if lo.is_finite() {
        lo
    } else if hi.is_finite() {
        hi
    } else {
        0.0
    };

    if col1_integral {
        x1 = x1.ceil();
        if x1 > hi {
            x1 = hi.floor();
        }
    }

    let x2 = merged - scale * x1;
    (x1, x2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_col_undo() {
        let mut postsolve = Postsolve::new(1, 3);
        postsolve.notify_fixed_col(1, 4.0);

        // column 1 leaves the problem
        postsolve.compress(&[Some(0)], &[Some(0), None, Some(1)]);

        let x = postsolve.undo(&[1.0, 2.0]);
        assert_eq!(x, vec![1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_substitution_undo() {
        // x0 + 2 x1 = 6, x0 substituted
        let mut postsolve = Postsolve::new(1, 2);
        postsolve.notify_substitution(0, &[(0, 1.0), (1, 2.0)], 6.0);
        postsolve.compress(&[None], &[None, Some(0)]);

        let x = postsolve.undo(&[2.5]);
        assert_eq!(x[1], 2.5);
        assert_eq!(x[0], 1.0);
    }

    #[test]
    fn test_parallel_cols_undo() {
        // two columns with bounds [0, 2] each, scale 1: merged domain [0, 4]
        let mut postsolve = Postsolve::new(1, 2);
        postsolve.notify_parallel_cols(
            0,
            false,
            Some(0.0),
            Some(2.0),
            1,
            false,
            Some(0.0),
            Some(2.0),
            1.0,
        );
        postsolve.compress(&[Some(0)], &[None, Some(0)]);

        let x = postsolve.undo(&[2.5]);
        let (x0, x1) = (x[0], x[1]);
        assert!((0.0..=2.0).contains(&x0));
        assert!((0.0..=2.0).contains(&x1));
        assert!((x0 + x1 - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_cols_integral_split() {
        // merged value 3.5, col1 integral in [0, 3], col2 in [0, 2]
        let mut postsolve = Postsolve::new(1, 2);
        postsolve.notify_parallel_cols(
            0,
            true,
            Some(0.0),
            Some(3.0),
            1,
            false,
            Some(0.0),
            Some(2.0),
            1.0,
        );
        postsolve.compress(&[Some(0)], &[None, Some(0)]);

        let x = postsolve.undo(&[3.5]);
        assert_eq!(x[0], x[0].round());
        assert!((0.0..=3.0).contains(&x[0]));
        assert!((0.0..=2.0).contains(&x[1]));
        assert!((x[0] + x[1] - 3.5).abs() < 1e-9);
    }
}
