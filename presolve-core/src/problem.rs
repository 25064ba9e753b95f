//! Problem representation: bounds, flags, objective, locks and activities
//! around the constraint matrix.

use sprs::CsMat;
use thiserror::Error;

use crate::activity::{compute_row_activity, RowActivity};
use crate::flags::{ColFlags, RowFlags};
use crate::matrix::ConstraintMatrix;
use crate::num::Num;

/// Errors reported while assembling a problem.
#[derive(Error, Debug)]
pub enum ProblemError {
    /// An input vector does not match the matrix dimensions.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A bound pair is contradictory beyond any tolerance.
    #[error("variable {var} has lower bound {lb} above upper bound {ub}")]
    InvalidBounds {
        /// Offending variable.
        var: usize,
        /// Its lower bound.
        lb: f64,
        /// Its upper bound.
        ub: f64,
    },
}

/// Linear objective with a constant offset accumulated by reductions.
#[derive(Debug, Clone, Default)]
pub struct Objective {
    /// Objective coefficients per column.
    pub coefficients: Vec<f64>,
    /// Constant offset collected from fixed and substituted columns.
    pub offset: f64,
}

/// Number of rows that make relaxing a column in each direction unsafe.
#[derive(Debug, Clone, Copy, Default)]
pub struct Locks {
    /// Rows preventing the column from moving down.
    pub down: u32,
    /// Rows preventing the column from moving up.
    pub up: u32,
}

/// A mixed-integer or linear problem instance.
///
/// All mutation during presolve goes through the update core; presolve
/// methods only hold shared references.
#[derive(Debug, Clone)]
pub struct Problem {
    pub(crate) matrix: ConstraintMatrix,

    pub(crate) lower_bounds: Vec<f64>,
    pub(crate) upper_bounds: Vec<f64>,
    pub(crate) cflags: Vec<ColFlags>,

    pub(crate) objective: Objective,

    pub(crate) activities: Vec<RowActivity>,
    pub(crate) locks: Vec<Locks>,

    pub(crate) num_integral_cols: usize,
    pub(crate) num_continuous_cols: usize,
}

impl Problem {
    /// Assemble a problem from a CSC constraint matrix, row sides, an
    /// objective and variable domains.
    ///
    /// `None` sides and bounds are infinite. Integral columns are flagged but
    /// their bounds are not rounded here; that is the job of trivial
    /// presolve.
    pub fn new(
        a: &CsMat<f64>,
        lhs: &[Option<f64>],
        rhs: &[Option<f64>],
        objective: Vec<f64>,
        lower_bounds: &[Option<f64>],
        upper_bounds: &[Option<f64>],
        integral: &[bool],
    ) -> Result<Self, ProblemError> {
        let nrows = a.rows();
        let ncols = a.cols();

        if lhs.len() != nrows || rhs.len() != nrows {
            return Err(ProblemError::DimensionMismatch(format!(
                "matrix has {} rows but {} lhs / {} rhs values given",
                nrows,
                lhs.len(),
                rhs.len()
            )));
        }
        if objective.len() != ncols
            || lower_bounds.len() != ncols
            || upper_bounds.len() != ncols
            || integral.len() != ncols
        {
            return Err(ProblemError::DimensionMismatch(format!(
                "matrix has {} cols but {} objective / {} lb / {} ub / {} integrality values given",
                ncols,
                objective.len(),
                lower_bounds.len(),
                upper_bounds.len(),
                integral.len()
            )));
        }

        let mut lbs = vec![0.0; ncols];
        let mut ubs = vec![0.0; ncols];
        let mut cflags = vec![ColFlags::default(); ncols];
        let mut num_integral_cols = 0;

        for col in 0..ncols {
            match lower_bounds[col] {
                Some(lb) => lbs[col] = lb,
                None => cflags[col].set(ColFlags::LB_INF),
            }
            match upper_bounds[col] {
                Some(ub) => ubs[col] = ub,
                None => cflags[col].set(ColFlags::UB_INF),
            }
            if let (Some(lb), Some(ub)) = (lower_bounds[col], upper_bounds[col]) {
                if lb > ub {
                    return Err(ProblemError::InvalidBounds { var: col, lb, ub });
                }
            }
            if integral[col] {
                cflags[col].set(ColFlags::INTEGRAL);
                num_integral_cols += 1;
            }
        }

        let mut side_lhs = vec![0.0; nrows];
        let mut side_rhs = vec![0.0; nrows];
        let mut rflags = vec![RowFlags::default(); nrows];
        for row in 0..nrows {
            match lhs[row] {
                Some(l) => side_lhs[row] = l,
                None => rflags[row].set(RowFlags::LHS_INF),
            }
            match rhs[row] {
                Some(r) => side_rhs[row] = r,
                None => rflags[row].set(RowFlags::RHS_INF),
            }
            if let (Some(l), Some(r)) = (lhs[row], rhs[row]) {
                if l == r {
                    rflags[row].set(RowFlags::EQUATION);
                }
            }
        }

        let matrix = ConstraintMatrix::from_csc(a, side_lhs, side_rhs, rflags);

        Ok(Self {
            matrix,
            lower_bounds: lbs,
            upper_bounds: ubs,
            cflags,
            objective: Objective {
                coefficients: objective,
                offset: 0.0,
            },
            activities: vec![RowActivity::default(); nrows],
            locks: vec![Locks::default(); ncols],
            num_integral_cols,
            num_continuous_cols: ncols - num_integral_cols,
        })
    }

    /// Number of rows (including deleted ones until compression).
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of columns (including deleted ones until compression).
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// The constraint matrix.
    pub fn matrix(&self) -> &ConstraintMatrix {
        &self.matrix
    }

    /// Lower bounds; only meaningful where the `LB_INF` flag is clear.
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower_bounds
    }

    /// Upper bounds; only meaningful where the `UB_INF` flag is clear.
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    /// Column flags.
    pub fn col_flags(&self) -> &[ColFlags] {
        &self.cflags
    }

    /// The objective.
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Row activities.
    pub fn activities(&self) -> &[RowActivity] {
        &self.activities
    }

    /// Column locks; valid after [`Problem::recompute_locks`].
    pub fn locks(&self) -> &[Locks] {
        &self.locks
    }

    /// Number of live integral columns.
    pub fn num_integral_cols(&self) -> usize {
        self.num_integral_cols
    }

    /// Number of live continuous columns.
    pub fn num_continuous_cols(&self) -> usize {
        self.num_continuous_cols
    }

    pub(crate) fn count_col_deleted(&mut self, col: usize) {
        if self.cflags[col].test(ColFlags::INTEGRAL) {
            self.num_integral_cols -= 1;
        } else {
            self.num_continuous_cols -= 1;
        }
    }

    /// Recompute every non-deleted row's activity from scratch.
    pub fn recompute_all_activities(&mut self) {
        for row in 0..self.nrows() {
            if self.matrix.row_sizes()[row] < 0 {
                continue;
            }
            let mut activity = compute_row_activity(
                self.matrix.row(row),
                &self.lower_bounds,
                &self.upper_bounds,
                &self.cflags,
            );
            activity.last_change = self.activities[row].last_change;
            self.activities[row] = activity;
        }
    }

    /// Recompute the down/up locks of every column.
    ///
    /// An entry locks its column downward when decreasing the column can
    /// violate a finite side, and upward symmetrically.
    pub fn recompute_locks(&mut self) {
        for lock in self.locks.iter_mut() {
            *lock = Locks::default();
        }

        for row in 0..self.nrows() {
            let rflags = self.matrix.row_flags()[row];
            if rflags.test(RowFlags::REDUNDANT) {
                continue;
            }
            let lhs_finite = !rflags.test(RowFlags::LHS_INF);
            let rhs_finite = !rflags.test(RowFlags::RHS_INF);

            for &(col, val) in self.matrix.row(row) {
                if val > 0.0 {
                    if lhs_finite {
                        self.locks[col].down += 1;
                    }
                    if rhs_finite {
                        self.locks[col].up += 1;
                    }
                } else {
                    if lhs_finite {
                        self.locks[col].up += 1;
                    }
                    if rhs_finite {
                        self.locks[col].down += 1;
                    }
                }
            }
        }
    }

    /// Rewrite the objective through the equality row `eq_row`, removing the
    /// substituted column's coefficient.
    pub(crate) fn substitute_var_in_obj(&mut self, num: &Num, col: usize, eq_row: usize) {
        let obj_coef = self.objective.coefficients[col];
        if obj_coef == 0.0 {
            return;
        }

        let eq_entries = self.matrix.row(eq_row).to_vec();
        let eq_rhs = self.matrix.rhs()[eq_row];
        let eq_coef = eq_entries
            .iter()
            .find(|&&(c, _)| c == col)
            .map(|&(_, v)| v)
            .expect("substituted column missing from equality");

        let factor = obj_coef / eq_coef;
        for &(other, val) in &eq_entries {
            if other == col {
                continue;
            }
            let coef = &mut self.objective.coefficients[other];
            *coef -= factor * val;
            if num.is_zero(*coef) {
                *coef = 0.0;
            }
        }

        self.objective.offset += factor * eq_rhs;
        self.objective.coefficients[col] = 0.0;
    }

    /// Compress all column- and row-indexed arrays, delegating the matrix
    /// renumbering. Returns the old-to-new mappings.
    pub(crate) fn compress(&mut self) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
        let (row_map, col_map) = self.matrix.compress();

        compress_values(&row_map, &mut self.activities);
        compress_values(&col_map, &mut self.lower_bounds);
        compress_values(&col_map, &mut self.upper_bounds);
        compress_values(&col_map, &mut self.cflags);
        compress_values(&col_map, &mut self.locks);
        compress_values(&col_map, &mut self.objective.coefficients);

        (row_map, col_map)
    }
}

/// Keep the values of surviving indices, in their new order.
fn compress_values<T: Copy>(map: &[Option<usize>], values: &mut Vec<T>) {
    debug_assert_eq!(map.len(), values.len());
    let mut kept = 0usize;
    for old in 0..map.len() {
        if let Some(new) = map[old] {
            values[new] = values[old];
            kept += 1;
        }
    }
    values.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn small_problem() -> Problem {
        // min x0 + x1
        // r0: x0 + x1 >= 1
        // r1: 2 x0 - x1 <= 4
        // 0 <= x0 <= 2, 0 <= x1 <= 3, x1 integral
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 0, 2.0);
        tri.add_triplet(1, 1, -1.0);

        Problem::new(
            &tri.to_csc(),
            &[Some(1.0), None],
            &[None, Some(4.0)],
            vec![1.0, 1.0],
            &[Some(0.0), Some(0.0)],
            &[Some(2.0), Some(3.0)],
            &[false, true],
        )
        .unwrap()
    }

    #[test]
    fn test_problem_construction() {
        let problem = small_problem();

        assert_eq!(problem.nrows(), 2);
        assert_eq!(problem.ncols(), 2);
        assert_eq!(problem.num_integral_cols(), 1);
        assert_eq!(problem.num_continuous_cols(), 1);
        assert!(problem.matrix().row_flags()[0].test(RowFlags::RHS_INF));
        assert!(problem.matrix().row_flags()[1].test(RowFlags::LHS_INF));
        assert!(problem.col_flags()[1].test(ColFlags::INTEGRAL));
    }

    #[test]
    fn test_dimension_mismatch() {
        let tri = TriMat::new((2, 2));
        let err = Problem::new(
            &tri.to_csc(),
            &[Some(1.0)],
            &[None],
            vec![1.0, 1.0],
            &[None, None],
            &[None, None],
            &[false, false],
        );
        assert!(matches!(err, Err(ProblemError::DimensionMismatch(_))));
    }

    #[test]
    fn test_recompute_activities() {
        let mut problem = small_problem();
        problem.recompute_all_activities();

        // r0: x0 + x1 over [0,2]x[0,3] -> [0, 5]
        assert_eq!(problem.activities()[0].min, 0.0);
        assert_eq!(problem.activities()[0].max, 5.0);
        // r1: 2 x0 - x1 -> [-3, 4]
        assert_eq!(problem.activities()[1].min, -3.0);
        assert_eq!(problem.activities()[1].max, 4.0);
    }

    #[test]
    fn test_recompute_locks() {
        let mut problem = small_problem();
        problem.recompute_locks();

        // r0 has a finite lhs only: positive entries lock down
        // r1 has a finite rhs only: positive entries lock up, negative down
        assert_eq!(problem.locks()[0].down, 1); // from r0
        assert_eq!(problem.locks()[0].up, 1); // from r1
        assert_eq!(problem.locks()[1].down, 2); // from r0 and r1
        assert_eq!(problem.locks()[1].up, 0);
    }

    #[test]
    fn test_substitute_var_in_obj() {
        // eq row: x0 + 2 x1 = 4; objective x0 + x1
        let mut tri = TriMat::new((1, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 2.0);
        let mut problem = Problem::new(
            &tri.to_csc(),
            &[Some(4.0)],
            &[Some(4.0)],
            vec![1.0, 1.0],
            &[None, None],
            &[None, None],
            &[false, false],
        )
        .unwrap();

        let num = Num::default();
        problem.substitute_var_in_obj(&num, 0, 0);

        // x0 = 4 - 2 x1: obj becomes (1 - 2) x1 + 4
        assert_eq!(problem.objective().coefficients[0], 0.0);
        assert_eq!(problem.objective().coefficients[1], -1.0);
        assert_eq!(problem.objective().offset, 4.0);
    }
}
