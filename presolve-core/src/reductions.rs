//! Reduction records produced by presolve methods.
//!
//! A reduction is a single `(row, col, newval)` record. Nonnegative row and
//! column indices address a matrix coefficient; a negative row encodes a
//! column operation and a negative column a row operation, with the negative
//! value selecting the operation. Records are grouped into transactions that
//! are checked for conflicts and applied atomically.

/// One reduction record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduction {
    /// Row index, or a [`ColReduction`] tag if negative.
    pub row: i32,
    /// Column index, or a [`RowReduction`] tag if negative.
    pub col: i32,
    /// Payload: a coefficient, bound or side value, or an encoded index.
    pub newval: f64,
}

/// Column operations, encoded in the `row` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ColReduction {
    /// Filler record (second record of a two-record operation).
    None = -1,
    /// Set the objective coefficient to `newval`.
    Objective = -2,
    /// Tighten the lower bound to `newval`.
    LowerBound = -3,
    /// Tighten the upper bound to `newval`.
    UpperBound = -4,
    /// Fix the column to `newval`.
    Fixed = -5,
    /// Declare that the transaction depends on the column's coefficients.
    Locked = -6,
    /// Like `Locked`, and additionally forbid later transactions from
    /// touching the column this round.
    LockedStrong = -7,
    /// Declare that the transaction depends on the column's bounds.
    BoundsLocked = -8,
    /// Substitute the column through the equality row `newval`.
    Substitute = -9,
    /// Substitute the column in the objective only, through row `newval`.
    SubstituteObj = -10,
    /// Merge the column into column `newval` (parallel columns).
    Parallel = -11,
    /// Replace the column by `newval` times a second column plus an offset
    /// carried in the following record.
    Replace = -12,
    /// Mark the column implied integral.
    ImplInt = -13,
    /// Fix the column at the infinity with the sign of `newval`.
    FixedInfinity = -14,
}

impl ColReduction {
    /// Decode a negative row value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(Self::None),
            -2 => Some(Self::Objective),
            -3 => Some(Self::LowerBound),
            -4 => Some(Self::UpperBound),
            -5 => Some(Self::Fixed),
            -6 => Some(Self::Locked),
            -7 => Some(Self::LockedStrong),
            -8 => Some(Self::BoundsLocked),
            -9 => Some(Self::Substitute),
            -10 => Some(Self::SubstituteObj),
            -11 => Some(Self::Parallel),
            -12 => Some(Self::Replace),
            -13 => Some(Self::ImplInt),
            -14 => Some(Self::FixedInfinity),
            _ => None,
        }
    }
}

/// Row operations, encoded in the `col` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RowReduction {
    /// Filler record (continuation of a multi-record operation).
    None = -1,
    /// Set the right-hand side to `newval`.
    Rhs = -2,
    /// Set the left-hand side to `newval`.
    Lhs = -3,
    /// Mark the row redundant.
    Redundant = -4,
    /// Declare that the transaction depends on the row's coefficients.
    Locked = -5,
    /// Like `Locked`, and additionally forbid later transactions from
    /// touching the row this round.
    LockedStrong = -6,
    /// Drop the right-hand side to plus infinity.
    RhsInf = -7,
    /// Drop the left-hand side to minus infinity.
    LhsInf = -8,
    /// Cancel nonzeros of `newval` candidate rows with this equality row.
    Sparsify = -9,
}

impl RowReduction {
    /// Decode a negative column value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(Self::None),
            -2 => Some(Self::Rhs),
            -3 => Some(Self::Lhs),
            -4 => Some(Self::Redundant),
            -5 => Some(Self::Locked),
            -6 => Some(Self::LockedStrong),
            -7 => Some(Self::RhsInf),
            -8 => Some(Self::LhsInf),
            -9 => Some(Self::Sparsify),
            _ => None,
        }
    }
}

/// A contiguous range of reduction records forming one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRange {
    /// Index of the first record.
    pub start: usize,
    /// One past the last record.
    pub end: usize,
}

/// Builder for reduction sequences, used by presolve methods.
///
/// Records between `begin_transaction` and `end_transaction` form one
/// transaction; lock records must precede the modifications that depend on
/// them.
#[derive(Debug, Default)]
pub struct Reductions {
    reductions: Vec<Reduction>,
    transactions: Vec<TransactionRange>,
    open_transaction: Option<usize>,
}

impl Reductions {
    /// Create an empty reduction sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records pushed so far.
    pub fn reductions(&self) -> &[Reduction] {
        &self.reductions
    }

    /// All completed transactions.
    pub fn transactions(&self) -> &[TransactionRange] {
        &self.transactions
    }

    /// Drop all records and transactions.
    pub fn clear(&mut self) {
        self.reductions.clear();
        self.transactions.clear();
        self.open_transaction = None;
    }

    /// Start a transaction.
    pub fn begin_transaction(&mut self) {
        debug_assert!(self.open_transaction.is_none());
        self.open_transaction = Some(self.reductions.len());
    }

    /// Finish the open transaction and return its range.
    pub fn end_transaction(&mut self) -> TransactionRange {
        let start = self
            .open_transaction
            .take()
            .expect("end_transaction without begin_transaction");
        let range = TransactionRange {
            start,
            end: self.reductions.len(),
        };
        debug_assert!(range.start < range.end);
        self.transactions.push(range);
        range
    }

    fn push_col_op(&mut self, op: ColReduction, col: usize, newval: f64) {
        self.reductions.push(Reduction {
            row: op as i32,
            col: col as i32,
            newval,
        });
    }

    fn push_row_op(&mut self, op: RowReduction, row: usize, newval: f64) {
        self.reductions.push(Reduction {
            row: row as i32,
            col: op as i32,
            newval,
        });
    }

    /// Set the matrix coefficient at `(row, col)`.
    pub fn change_matrix_entry(&mut self, row: usize, col: usize, newval: f64) {
        self.reductions.push(Reduction {
            row: row as i32,
            col: col as i32,
            newval,
        });
    }

    /// Declare a read dependency on the column's coefficients.
    pub fn lock_col(&mut self, col: usize) {
        self.push_col_op(ColReduction::Locked, col, 0.0);
    }

    /// Lock the column against any later modification this round.
    pub fn lock_col_strong(&mut self, col: usize) {
        self.push_col_op(ColReduction::LockedStrong, col, 0.0);
    }

    /// Declare a read dependency on the column's bounds.
    pub fn lock_col_bounds(&mut self, col: usize) {
        self.push_col_op(ColReduction::BoundsLocked, col, 0.0);
    }

    /// Set the objective coefficient of `col`.
    pub fn change_obj_coeff(&mut self, col: usize, newval: f64) {
        self.push_col_op(ColReduction::Objective, col, newval);
    }

    /// Fix `col` to `val`.
    pub fn fix_col(&mut self, col: usize, val: f64) {
        self.push_col_op(ColReduction::Fixed, col, val);
    }

    /// Fix `col` at the infinity with the sign of `val`.
    pub fn fix_col_infinity(&mut self, col: usize, val: f64) {
        self.push_col_op(ColReduction::FixedInfinity, col, val);
    }

    /// Tighten the lower bound of `col`.
    pub fn change_col_lb(&mut self, col: usize, val: f64) {
        self.push_col_op(ColReduction::LowerBound, col, val);
    }

    /// Tighten the upper bound of `col`.
    pub fn change_col_ub(&mut self, col: usize, val: f64) {
        self.push_col_op(ColReduction::UpperBound, col, val);
    }

    /// Mark `col` implied integral.
    pub fn impl_int(&mut self, col: usize) {
        self.push_col_op(ColReduction::ImplInt, col, 0.0);
    }

    /// Substitute `col` through the equality row `eq_row`.
    pub fn substitute_col(&mut self, col: usize, eq_row: usize) {
        self.push_col_op(ColReduction::Substitute, col, eq_row as f64);
    }

    /// Substitute `col` in the objective only, through `eq_row`.
    pub fn substitute_col_in_obj(&mut self, col: usize, eq_row: usize) {
        self.push_col_op(ColReduction::SubstituteObj, col, eq_row as f64);
    }

    /// Merge `col1` into `col2` (they are parallel in the matrix).
    pub fn parallel_cols(&mut self, col1: usize, col2: usize) {
        self.push_col_op(ColReduction::Parallel, col1, col2 as f64);
    }

    /// Replace `col1` by `factor * col2 + offset`.
    pub fn replace_col(&mut self, col1: usize, factor: f64, col2: usize, offset: f64) {
        self.push_col_op(ColReduction::Replace, col1, factor);
        self.push_col_op(ColReduction::None, col2, offset);
    }

    /// Declare a read dependency on the row's coefficients.
    pub fn lock_row(&mut self, row: usize) {
        self.push_row_op(RowReduction::Locked, row, 0.0);
    }

    /// Lock the row against any later modification this round.
    pub fn lock_row_strong(&mut self, row: usize) {
        self.push_row_op(RowReduction::LockedStrong, row, 0.0);
    }

    /// Set the left-hand side of `row`.
    pub fn change_row_lhs(&mut self, row: usize, val: f64) {
        self.push_row_op(RowReduction::Lhs, row, val);
    }

    /// Set the right-hand side of `row`.
    pub fn change_row_rhs(&mut self, row: usize, val: f64) {
        self.push_row_op(RowReduction::Rhs, row, val);
    }

    /// Drop the left-hand side of `row` to minus infinity.
    pub fn change_row_lhs_inf(&mut self, row: usize) {
        self.push_row_op(RowReduction::LhsInf, row, 0.0);
    }

    /// Drop the right-hand side of `row` to plus infinity.
    pub fn change_row_rhs_inf(&mut self, row: usize) {
        self.push_row_op(RowReduction::RhsInf, row, 0.0);
    }

    /// Mark `row` redundant.
    pub fn mark_row_redundant(&mut self, row: usize) {
        self.push_row_op(RowReduction::Redundant, row, 0.0);
    }

    /// Cancel nonzeros in the candidate rows by adding multiples of the
    /// equality row `eq_row`.
    pub fn sparsify(&mut self, eq_row: usize, candidates: &[(usize, f64)]) {
        self.push_row_op(RowReduction::Sparsify, eq_row, candidates.len() as f64);
        for &(cand_row, scale) in candidates {
            self.push_row_op(RowReduction::None, cand_row, scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ranges() {
        let mut reductions = Reductions::new();

        reductions.begin_transaction();
        reductions.lock_col(3);
        reductions.fix_col(3, 1.5);
        let first = reductions.end_transaction();

        reductions.begin_transaction();
        reductions.change_row_rhs(0, 2.0);
        let second = reductions.end_transaction();

        assert_eq!(first, TransactionRange { start: 0, end: 2 });
        assert_eq!(second, TransactionRange { start: 2, end: 3 });
        assert_eq!(reductions.transactions().len(), 2);
    }

    #[test]
    fn test_encoding_roundtrip() {
        let mut reductions = Reductions::new();
        reductions.begin_transaction();
        reductions.fix_col(7, 2.5);
        reductions.change_row_lhs(4, -1.0);
        reductions.change_matrix_entry(1, 2, 0.5);
        reductions.end_transaction();

        let records = reductions.reductions();

        assert_eq!(ColReduction::from_i32(records[0].row), Some(ColReduction::Fixed));
        assert_eq!(records[0].col, 7);

        assert_eq!(RowReduction::from_i32(records[1].col), Some(RowReduction::Lhs));
        assert_eq!(records[1].row, 4);

        assert!(records[2].row >= 0 && records[2].col >= 0);
    }

    #[test]
    fn test_sparsify_layout() {
        let mut reductions = Reductions::new();
        reductions.begin_transaction();
        reductions.sparsify(5, &[(1, -2.0), (3, 0.5)]);
        let range = reductions.end_transaction();

        assert_eq!(range.end - range.start, 3);
        let records = reductions.reductions();
        assert_eq!(RowReduction::from_i32(records[0].col), Some(RowReduction::Sparsify));
        assert_eq!(records[0].newval, 2.0);
        assert_eq!(records[1].row, 1);
        assert_eq!(records[1].newval, -2.0);
    }
}
