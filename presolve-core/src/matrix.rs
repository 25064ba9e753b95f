//! Sparse constraint matrix with paired row- and column-major storage.
//!
//! Presolve reductions delete rows and columns, rewrite coefficients and
//! aggregate rows in place, so the matrix keeps both orientations explicitly
//! and a live nonzero count per row and column. A count of `-1` marks a
//! deleted row or column. Coefficient changes coming from reductions are not
//! applied immediately; they are collected in a [`MatrixBuffer`] and
//! materialized in one batched rewrite during flush.

use rustc_hash::FxHashMap;
use sprs::CsMat;

use crate::flags::{ColFlags, RowFlags};
use crate::num::Num;

/// A pending coefficient change.
#[derive(Debug, Clone, Copy)]
pub struct MatrixEntry {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// New coefficient value; zero deletes the entry.
    pub val: f64,
}

/// Buffer of pending coefficient changes.
///
/// A later entry for the same position overwrites the earlier one, so the
/// buffer always holds at most one change per matrix position.
#[derive(Debug, Default)]
pub struct MatrixBuffer {
    entries: Vec<MatrixEntry>,
    index: FxHashMap<(usize, usize), usize>,
}

impl MatrixBuffer {
    /// Record a coefficient change, overwriting any pending change for the
    /// same position.
    pub fn add_entry(&mut self, row: usize, col: usize, val: f64) {
        match self.index.get(&(row, col)) {
            Some(&pos) => self.entries[pos].val = val,
            None => {
                self.index.insert((row, col), self.entries.len());
                self.entries.push(MatrixEntry { row, col, val });
            }
        }
    }

    /// Whether no changes are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pending changes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop all pending changes.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn take(&mut self) -> Vec<MatrixEntry> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

/// Sparse constraint matrix together with the row sides and row flags.
#[derive(Debug, Clone)]
pub struct ConstraintMatrix {
    nrows: usize,
    ncols: usize,

    /// Row-major entries, each row sorted by column index.
    rows: Vec<Vec<(usize, f64)>>,
    /// Column-major entries, each column sorted by row index.
    cols: Vec<Vec<(usize, f64)>>,

    /// Live nonzero count per row; -1 marks a deleted row.
    rowsize: Vec<i64>,
    /// Live nonzero count per column; -1 marks a deleted column.
    colsize: Vec<i64>,

    lhs: Vec<f64>,
    rhs: Vec<f64>,
    rflags: Vec<RowFlags>,
}

impl ConstraintMatrix {
    /// Build the paired storage from a CSC matrix and row sides.
    ///
    /// `lhs`/`rhs` hold the finite side values; infinite sides are encoded in
    /// `rflags` and the corresponding value is ignored. Explicit zeros in the
    /// input are dropped.
    pub fn from_csc(a: &CsMat<f64>, lhs: Vec<f64>, rhs: Vec<f64>, rflags: Vec<RowFlags>) -> Self {
        assert!(a.is_csc());
        let nrows = a.rows();
        let ncols = a.cols();
        assert_eq!(lhs.len(), nrows);
        assert_eq!(rhs.len(), nrows);
        assert_eq!(rflags.len(), nrows);

        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); nrows];
        let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); ncols];

        for col in 0..ncols {
            if let Some(col_view) = a.outer_view(col) {
                for (row, &val) in col_view.iter() {
                    if val == 0.0 {
                        continue;
                    }
                    cols[col].push((row, val));
                    rows[row].push((col, val));
                }
            }
        }

        for row in rows.iter_mut() {
            row.sort_unstable_by_key(|&(col, _)| col);
        }

        let rowsize = rows.iter().map(|r| r.len() as i64).collect();
        let colsize = cols.iter().map(|c| c.len() as i64).collect();

        Self {
            nrows,
            ncols,
            rows,
            cols,
            rowsize,
            colsize,
            lhs,
            rhs,
            rflags,
        }
    }

    /// Number of rows (including deleted ones until the next compression).
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns (including deleted ones until the next compression).
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// The `(column, coefficient)` entries of a row.
    pub fn row(&self, row: usize) -> &[(usize, f64)] {
        &self.rows[row]
    }

    /// The `(row, coefficient)` entries of a column.
    pub fn col(&self, col: usize) -> &[(usize, f64)] {
        &self.cols[col]
    }

    /// Live nonzero counts per row (-1 for deleted rows).
    pub fn row_sizes(&self) -> &[i64] {
        &self.rowsize
    }

    /// Live nonzero counts per column (-1 for deleted columns).
    pub fn col_sizes(&self) -> &[i64] {
        &self.colsize
    }

    /// Left-hand sides.
    pub fn lhs(&self) -> &[f64] {
        &self.lhs
    }

    /// Right-hand sides.
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// Row flags.
    pub fn row_flags(&self) -> &[RowFlags] {
        &self.rflags
    }

    /// Whether the row is marked redundant.
    pub fn is_row_redundant(&self, row: usize) -> bool {
        self.rflags[row].test(RowFlags::REDUNDANT)
    }

    pub(crate) fn mark_row_redundant(&mut self, row: usize) {
        self.rflags[row].set(RowFlags::REDUNDANT);
    }

    /// Mark an empty row as deleted without routing it through the deletion
    /// worklists; there are no entries to unlink.
    pub(crate) fn mark_empty_row_deleted(&mut self, row: usize) {
        debug_assert!(self.rows[row].is_empty());
        self.rflags[row].set(RowFlags::REDUNDANT);
        self.rowsize[row] = -1;
    }

    /// Mark an empty column as deleted; there are no entries to unlink.
    pub(crate) fn mark_empty_col_deleted(&mut self, col: usize) {
        debug_assert!(self.cols[col].is_empty());
        self.colsize[col] = -1;
    }

    pub(crate) fn refresh_equation_flag(&mut self, row: usize) {
        let rflags = &mut self.rflags[row];
        if !rflags.test(RowFlags::LHS_INF | RowFlags::RHS_INF) && self.lhs[row] == self.rhs[row] {
            rflags.set(RowFlags::EQUATION);
        } else {
            rflags.unset(RowFlags::EQUATION);
        }
    }

    /// Set a finite left-hand side.
    pub(crate) fn modify_lhs(&mut self, row: usize, val: f64) {
        self.lhs[row] = val;
        self.rflags[row].unset(RowFlags::LHS_INF);
        self.refresh_equation_flag(row);
    }

    /// Drop the left-hand side to minus infinity.
    pub(crate) fn modify_lhs_inf(&mut self, row: usize) {
        self.lhs[row] = 0.0;
        self.rflags[row].set(RowFlags::LHS_INF);
        self.rflags[row].unset(RowFlags::EQUATION);
    }

    /// Set a finite right-hand side.
    pub(crate) fn modify_rhs(&mut self, row: usize, val: f64) {
        self.rhs[row] = val;
        self.rflags[row].unset(RowFlags::RHS_INF);
        self.refresh_equation_flag(row);
    }

    /// Drop the right-hand side to plus infinity.
    pub(crate) fn modify_rhs_inf(&mut self, row: usize) {
        self.rhs[row] = 0.0;
        self.rflags[row].set(RowFlags::RHS_INF);
        self.rflags[row].unset(RowFlags::EQUATION);
    }

    /// Shift both finite sides by `-delta` (used when removing a fixed
    /// column's constant contribution).
    pub(crate) fn shift_sides(&mut self, row: usize, delta: f64) {
        if !self.rflags[row].test(RowFlags::LHS_INF) {
            self.lhs[row] -= delta;
        }
        if !self.rflags[row].test(RowFlags::RHS_INF) {
            self.rhs[row] -= delta;
        }
        // a ranged row can collapse to an equation
        if !self.rflags[row].test(RowFlags::LHS_INF | RowFlags::RHS_INF | RowFlags::EQUATION)
            && self.lhs[row] == self.rhs[row]
        {
            self.rflags[row].set(RowFlags::EQUATION);
        }
    }

    /// The coefficient at `(row, col)`, zero if absent.
    pub fn coefficient(&self, row: usize, col: usize) -> f64 {
        match self.rows[row].binary_search_by_key(&col, |&(c, _)| c) {
            Ok(pos) => self.rows[row][pos].1,
            Err(_) => 0.0,
        }
    }

    fn set_row_entry(&mut self, row: usize, col: usize, val: f64) -> f64 {
        match self.rows[row].binary_search_by_key(&col, |&(c, _)| c) {
            Ok(pos) => {
                let old = self.rows[row][pos].1;
                if val == 0.0 {
                    self.rows[row].remove(pos);
                } else {
                    self.rows[row][pos].1 = val;
                }
                old
            }
            Err(pos) => {
                if val != 0.0 {
                    self.rows[row].insert(pos, (col, val));
                }
                0.0
            }
        }
    }

    fn set_col_entry(&mut self, col: usize, row: usize, val: f64) {
        match self.cols[col].binary_search_by_key(&row, |&(r, _)| r) {
            Ok(pos) => {
                if val == 0.0 {
                    self.cols[col].remove(pos);
                } else {
                    self.cols[col][pos].1 = val;
                }
            }
            Err(pos) => {
                if val != 0.0 {
                    self.cols[col].insert(pos, (row, val));
                }
            }
        }
    }

    fn note_colsize_change(
        col: usize,
        oldsize: i64,
        newsize: i64,
        singleton_cols: &mut Vec<usize>,
        empty_cols: &mut Vec<usize>,
    ) {
        if newsize == oldsize {
            return;
        }
        if newsize == 1 {
            singleton_cols.push(col);
        } else if newsize == 0 && oldsize > 0 {
            empty_cols.push(col);
        }
    }

    /// Apply all buffered coefficient changes in one batched rewrite.
    ///
    /// Newly singleton rows and newly singleton or empty columns are pushed
    /// to the worklists. `coeff_changed(row, col, oldval, newval)` is invoked
    /// for every materialized change so the caller can maintain activities
    /// and statistics.
    pub(crate) fn change_coefficients<F>(
        &mut self,
        buffer: &mut MatrixBuffer,
        singleton_rows: &mut Vec<usize>,
        singleton_cols: &mut Vec<usize>,
        empty_cols: &mut Vec<usize>,
        mut coeff_changed: F,
    ) where
        F: FnMut(usize, usize, f64, f64),
    {
        for entry in buffer.take() {
            let MatrixEntry { row, col, val } = entry;

            if self.rowsize[row] < 0 || self.colsize[col] < 0 {
                continue;
            }

            let old = self.set_row_entry(row, col, val);
            if old == val {
                continue;
            }
            self.set_col_entry(col, row, val);

            let old_rowsize = self.rowsize[row];
            let old_colsize = self.colsize[col];
            self.rowsize[row] = self.rows[row].len() as i64;
            self.colsize[col] = self.cols[col].len() as i64;

            if self.rowsize[row] == 1 && old_rowsize > 1 {
                singleton_rows.push(row);
            }
            Self::note_colsize_change(
                col,
                old_colsize,
                self.colsize[col],
                singleton_cols,
                empty_cols,
            );

            coeff_changed(row, col, old, val);
        }
    }

    /// Unlink all entries of the given redundant rows and fixed/substituted
    /// columns, rebuilding the singleton and empty worklists from the size
    /// transitions.
    pub(crate) fn delete_rows_and_cols(
        &mut self,
        redundant_rows: &mut Vec<usize>,
        deleted_cols: &mut Vec<usize>,
        singleton_rows: &mut Vec<usize>,
        singleton_cols: &mut Vec<usize>,
        empty_cols: &mut Vec<usize>,
    ) {
        for &row in redundant_rows.iter() {
            if self.rowsize[row] < 0 {
                continue;
            }
            let entries = std::mem::take(&mut self.rows[row]);
            for (col, _) in entries {
                if self.colsize[col] < 0 {
                    continue;
                }
                let old_colsize = self.colsize[col];
                self.set_col_entry(col, row, 0.0);
                self.colsize[col] = self.cols[col].len() as i64;
                Self::note_colsize_change(
                    col,
                    old_colsize,
                    self.colsize[col],
                    singleton_cols,
                    empty_cols,
                );
            }
            self.rowsize[row] = -1;
            self.lhs[row] = 0.0;
            self.rhs[row] = 0.0;
        }
        redundant_rows.clear();

        for &col in deleted_cols.iter() {
            if self.colsize[col] < 0 {
                continue;
            }
            let entries = std::mem::take(&mut self.cols[col]);
            for (row, _) in entries {
                if self.rowsize[row] < 0 {
                    continue;
                }
                self.set_row_entry(row, col, 0.0);
                let old_rowsize = self.rowsize[row];
                self.rowsize[row] = self.rows[row].len() as i64;
                if self.rowsize[row] == 1 && old_rowsize > 1 {
                    singleton_rows.push(row);
                }
            }
            self.colsize[col] = -1;
        }
        deleted_cols.clear();
    }

    /// Check whether substituting `col` through the equality `eq_entries`
    /// stays within the fill-in budgets.
    ///
    /// For every row containing `col`, the entries of the equality that are
    /// missing from the row become fill-in while the `col` entry cancels.
    /// The substitution is admissible if no single row gains more than
    /// `maxshiftperrow` entries and the net fill-in over all rows stays
    /// within `maxfillinpersubstitution`.
    pub fn check_aggregation_sparsity_condition(
        &self,
        col: usize,
        eq_entries: &[(usize, f64)],
        maxfillinpersubstitution: i64,
        maxshiftperrow: i64,
    ) -> bool {
        let mut total_fillin: i64 = 0;

        for &(row, _) in &self.cols[col] {
            let mut added: i64 = 0;
            for &(eqcol, _) in eq_entries {
                if eqcol == col {
                    continue;
                }
                if self.coefficient(row, eqcol) == 0.0 {
                    added += 1;
                }
            }

            if added > maxshiftperrow {
                return false;
            }

            // the entry of `col` itself always cancels
            total_fillin += added - 1;
            if total_fillin > maxfillinpersubstitution {
                return false;
            }
        }

        true
    }

    /// Eliminate `col` from every row it appears in using the equality
    /// `eq_entries · x = eq_rhs` (which must contain `col`).
    ///
    /// Rows are rewritten as `row - (a_rc / a_ec) · eq`; a row that cancels
    /// completely (in particular the equality row itself, when it is part of
    /// the matrix) is deleted with zeroed sides. Returns the indices of the
    /// rewritten rows that remain live so the caller can recompute their
    /// activities.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn aggregate(
        &mut self,
        num: &Num,
        col: usize,
        eq_entries: &[(usize, f64)],
        eq_rhs: f64,
        singleton_rows: &mut Vec<usize>,
        singleton_cols: &mut Vec<usize>,
        empty_cols: &mut Vec<usize>,
    ) -> Vec<usize> {
        let eq_coef = eq_entries
            .iter()
            .find(|&&(c, _)| c == col)
            .map(|&(_, v)| v)
            .expect("substituted column missing from equality");

        let col_entries = std::mem::take(&mut self.cols[col]);
        let mut live_rows = Vec::with_capacity(col_entries.len());

        for &(row, a_rc) in &col_entries {
            debug_assert!(self.rowsize[row] >= 0);
            let scale = a_rc / eq_coef;

            // remove the entry of `col` itself
            self.set_row_entry(row, col, 0.0);

            for &(eqcol, eqval) in eq_entries {
                if eqcol == col {
                    continue;
                }

                let old = self.coefficient(row, eqcol);
                let mut new = old - scale * eqval;
                if num.is_zero(new) {
                    new = 0.0;
                }
                if old == new {
                    continue;
                }

                let old_colsize = self.colsize[eqcol];
                self.set_row_entry(row, eqcol, new);
                self.set_col_entry(eqcol, row, new);
                self.colsize[eqcol] = self.cols[eqcol].len() as i64;
                Self::note_colsize_change(
                    eqcol,
                    old_colsize,
                    self.colsize[eqcol],
                    singleton_cols,
                    empty_cols,
                );
            }

            // adjust the sides by the shifted right hand side
            if scale != 0.0 && eq_rhs != 0.0 {
                if !self.rflags[row].test(RowFlags::LHS_INF) {
                    self.lhs[row] -= scale * eq_rhs;
                }
                if !self.rflags[row].test(RowFlags::RHS_INF) {
                    self.rhs[row] -= scale * eq_rhs;
                }
            }

            let old_rowsize = self.rowsize[row];
            self.rowsize[row] = self.rows[row].len() as i64;

            if self.rowsize[row] == 0 {
                // fully cancelled; this is the equality row itself or a
                // duplicate of it
                self.rowsize[row] = -1;
                self.lhs[row] = 0.0;
                self.rhs[row] = 0.0;
                self.rflags[row].set(RowFlags::REDUNDANT);
                self.rflags[row].unset(RowFlags::EQUATION);
                continue;
            }

            if self.rowsize[row] == 1 && old_rowsize > 1 {
                singleton_rows.push(row);
            }
            self.refresh_equation_flag(row);
            live_rows.push(row);
        }

        self.colsize[col] = -1;
        live_rows
    }

    /// Add `scale` times the equality row `eq_row` to `cand_row` if that
    /// cancels more nonzeros than it fills in.
    ///
    /// Returns the net number of cancelled entries (0 if the row was left
    /// unchanged). The caller recomputes the candidate row's activity.
    pub(crate) fn sparsify(
        &mut self,
        num: &Num,
        eq_row: usize,
        scale: f64,
        cand_row: usize,
        singleton_rows: &mut Vec<usize>,
        singleton_cols: &mut Vec<usize>,
        empty_cols: &mut Vec<usize>,
    ) -> i64 {
        debug_assert!(eq_row != cand_row);
        debug_assert!(self.rflags[eq_row].test(RowFlags::EQUATION));

        if scale == 0.0 || self.rowsize[eq_row] < 0 || self.rowsize[cand_row] < 0 {
            return 0;
        }

        let eq_entries = self.rows[eq_row].clone();

        let mut cancelled: i64 = 0;
        let mut fillin: i64 = 0;
        for &(col, eqval) in &eq_entries {
            let old = self.coefficient(cand_row, col);
            if old == 0.0 {
                fillin += 1;
                continue;
            }
            if num.is_zero(old + scale * eqval) {
                cancelled += 1;
            }
        }

        if cancelled - fillin <= 0 {
            return 0;
        }

        for &(col, eqval) in &eq_entries {
            let old = self.coefficient(cand_row, col);
            let mut new = old + scale * eqval;
            if num.is_zero(new) {
                new = 0.0;
            }
            if old == new {
                continue;
            }

            let old_colsize = self.colsize[col];
            self.set_row_entry(cand_row, col, new);
            self.set_col_entry(col, cand_row, new);
            self.colsize[col] = self.cols[col].len() as i64;
            Self::note_colsize_change(
                col,
                old_colsize,
                self.colsize[col],
                singleton_cols,
                empty_cols,
            );
        }

        let eq_rhs = self.rhs[eq_row];
        if eq_rhs != 0.0 {
            if !self.rflags[cand_row].test(RowFlags::LHS_INF) {
                self.lhs[cand_row] += scale * eq_rhs;
            }
            if !self.rflags[cand_row].test(RowFlags::RHS_INF) {
                self.rhs[cand_row] += scale * eq_rhs;
            }
            self.refresh_equation_flag(cand_row);
        }

        let old_rowsize = self.rowsize[cand_row];
        self.rowsize[cand_row] = self.rows[cand_row].len() as i64;
        if self.rowsize[cand_row] == 1 && old_rowsize > 1 {
            singleton_rows.push(cand_row);
        }

        cancelled - fillin
    }

    /// Renumber all live rows and columns contiguously.
    ///
    /// Returns the old-to-new mappings (`None` for deleted indices).
    pub(crate) fn compress(&mut self) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
        let mut row_map = vec![None; self.nrows];
        let mut new_row = 0usize;
        for row in 0..self.nrows {
            if self.rowsize[row] >= 0 {
                row_map[row] = Some(new_row);
                new_row += 1;
            }
        }

        let mut col_map = vec![None; self.ncols];
        let mut new_col = 0usize;
        for col in 0..self.ncols {
            if self.colsize[col] >= 0 {
                col_map[col] = Some(new_col);
                new_col += 1;
            }
        }

        let mut rows = vec![Vec::new(); new_row];
        let mut lhs = vec![0.0; new_row];
        let mut rhs = vec![0.0; new_row];
        let mut rflags = vec![RowFlags::default(); new_row];
        let mut rowsize = vec![0i64; new_row];
        for (old, map) in row_map.iter().enumerate() {
            if let Some(new) = *map {
                let mut entries = std::mem::take(&mut self.rows[old]);
                for entry in entries.iter_mut() {
                    entry.0 = col_map[entry.0].expect("live row references deleted column");
                }
                entries.sort_unstable_by_key(|&(c, _)| c);
                rowsize[new] = entries.len() as i64;
                rows[new] = entries;
                lhs[new] = self.lhs[old];
                rhs[new] = self.rhs[old];
                rflags[new] = self.rflags[old];
            }
        }

        let mut cols = vec![Vec::new(); new_col];
        let mut colsize = vec![0i64; new_col];
        for (old, map) in col_map.iter().enumerate() {
            if let Some(new) = *map {
                let mut entries = std::mem::take(&mut self.cols[old]);
                for entry in entries.iter_mut() {
                    entry.0 = row_map[entry.0].expect("live column references deleted row");
                }
                entries.sort_unstable_by_key(|&(r, _)| r);
                colsize[new] = entries.len() as i64;
                cols[new] = entries;
            }
        }

        self.nrows = new_row;
        self.ncols = new_col;
        self.rows = rows;
        self.cols = cols;
        self.rowsize = rowsize;
        self.colsize = colsize;
        self.lhs = lhs;
        self.rhs = rhs;
        self.rflags = rflags;

        (row_map, col_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn matrix_3x3() -> ConstraintMatrix {
        // row 0: x0 + x1
        // row 1: 2 x1 - x2
        // row 2: x0 + x2
        let mut tri = TriMat::new((3, 3));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 1, 2.0);
        tri.add_triplet(1, 2, -1.0);
        tri.add_triplet(2, 0, 1.0);
        tri.add_triplet(2, 2, 1.0);

        ConstraintMatrix::from_csc(
            &tri.to_csc(),
            vec![0.0; 3],
            vec![1.0; 3],
            vec![RowFlags::default(); 3],
        )
    }

    #[test]
    fn test_from_csc_dual_views() {
        let m = matrix_3x3();

        assert_eq!(m.row(0), &[(0, 1.0), (1, 1.0)]);
        assert_eq!(m.row(1), &[(1, 2.0), (2, -1.0)]);
        assert_eq!(m.col(2), &[(1, -1.0), (2, 1.0)]);
        assert_eq!(m.row_sizes(), &[2, 2, 2]);
        assert_eq!(m.col_sizes(), &[2, 2, 2]);
    }

    #[test]
    fn test_change_coefficients_worklists() {
        let mut m = matrix_3x3();
        let mut buffer = MatrixBuffer::default();
        buffer.add_entry(0, 1, 0.0); // row 0 becomes singleton, col 1 too
        buffer.add_entry(1, 2, 3.0); // plain value change

        let mut singleton_rows = Vec::new();
        let mut singleton_cols = Vec::new();
        let mut empty_cols = Vec::new();
        let mut changes = Vec::new();

        m.change_coefficients(
            &mut buffer,
            &mut singleton_rows,
            &mut singleton_cols,
            &mut empty_cols,
            |row, col, old, new| changes.push((row, col, old, new)),
        );

        assert_eq!(singleton_rows, vec![0]);
        assert_eq!(singleton_cols, vec![1]);
        assert!(empty_cols.is_empty());
        assert_eq!(m.coefficient(0, 1), 0.0);
        assert_eq!(m.coefficient(1, 2), 3.0);
        assert_eq!(changes, vec![(0, 1, 1.0, 0.0), (1, 2, -1.0, 3.0)]);
    }

    #[test]
    fn test_buffer_overwrites() {
        let mut buffer = MatrixBuffer::default();
        buffer.add_entry(0, 0, 1.0);
        buffer.add_entry(0, 0, 2.0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_delete_rows_and_cols() {
        let mut m = matrix_3x3();
        m.mark_row_redundant(1);

        let mut redundant_rows = vec![1];
        let mut deleted_cols = vec![0];
        let mut singleton_rows = Vec::new();
        let mut singleton_cols = Vec::new();
        let mut empty_cols = Vec::new();

        m.delete_rows_and_cols(
            &mut redundant_rows,
            &mut deleted_cols,
            &mut singleton_rows,
            &mut singleton_cols,
            &mut empty_cols,
        );

        assert_eq!(m.row_sizes()[1], -1);
        assert_eq!(m.col_sizes()[0], -1);
        // row 0 lost x0, row 2 lost x0: both become singletons
        assert_eq!(m.row_sizes()[0], 1);
        assert_eq!(m.row_sizes()[2], 1);
        assert!(singleton_rows.contains(&0));
        assert!(singleton_rows.contains(&2));
        // col 1 lost row 1, col 2 lost row 1
        assert_eq!(m.col_sizes()[1], 1);
        assert_eq!(m.col_sizes()[2], 1);
    }

    #[test]
    fn test_aggregate_eliminates_column() {
        // eq row 0: x0 + x1 = 1, substitute x0
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 0, 2.0);
        tri.add_triplet(1, 1, 1.0);
        let mut m = ConstraintMatrix::from_csc(
            &tri.to_csc(),
            vec![1.0, 0.0],
            vec![1.0, 4.0],
            vec![
                RowFlags::EQUATION,
                RowFlags::default(),
            ],
        );

        let num = Num::default();
        let eq = m.row(0).to_vec();
        let mut singleton_rows = Vec::new();
        let mut singleton_cols = Vec::new();
        let mut empty_cols = Vec::new();

        let live = m.aggregate(
            &num,
            0,
            &eq,
            1.0,
            &mut singleton_rows,
            &mut singleton_cols,
            &mut empty_cols,
        );

        // row 0 cancels completely, row 1 becomes x1 * (1 - 2) over [-2, 2]
        assert_eq!(m.row_sizes()[0], -1);
        assert_eq!(m.lhs()[0], 0.0);
        assert_eq!(m.coefficient(1, 0), 0.0);
        assert_eq!(m.coefficient(1, 1), -1.0);
        assert_eq!(m.lhs()[1], -2.0);
        assert_eq!(m.rhs()[1], 2.0);
        assert_eq!(m.col_sizes()[0], -1);
        assert_eq!(live, vec![1]);
        assert_eq!(singleton_rows, vec![1]);
    }

    #[test]
    fn test_sparsify_cancels() {
        // eq row 0: x0 + x1 = 2, cand row 1: x0 + x1 + x2 <= 5
        let mut tri = TriMat::new((2, 3));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 1, 1.0);
        tri.add_triplet(1, 0, 1.0);
        tri.add_triplet(1, 1, 1.0);
        tri.add_triplet(1, 2, 1.0);
        let mut m = ConstraintMatrix::from_csc(
            &tri.to_csc(),
            vec![2.0, 0.0],
            vec![2.0, 5.0],
            vec![RowFlags::EQUATION, RowFlags::LHS_INF],
        );

        let num = Num::default();
        let mut singleton_rows = Vec::new();
        let mut singleton_cols = Vec::new();
        let mut empty_cols = Vec::new();

        let cancelled = m.sparsify(
            &num,
            0,
            -1.0,
            1,
            &mut singleton_rows,
            &mut singleton_cols,
            &mut empty_cols,
        );

        assert_eq!(cancelled, 2);
        assert_eq!(m.row_sizes()[1], 1);
        assert_eq!(m.coefficient(1, 2), 1.0);
        assert_eq!(m.rhs()[1], 3.0);
        assert_eq!(singleton_rows, vec![1]);
        // cols 0 and 1 drop to singletons
        assert!(singleton_cols.contains(&0));
        assert!(singleton_cols.contains(&1));
    }

    #[test]
    fn test_compress_renumbers() {
        let mut m = matrix_3x3();
        m.mark_row_redundant(0);
        let mut redundant_rows = vec![0];
        let mut deleted_cols = vec![1];
        let mut sr = Vec::new();
        let mut sc = Vec::new();
        let mut ec = Vec::new();
        m.delete_rows_and_cols(&mut redundant_rows, &mut deleted_cols, &mut sr, &mut sc, &mut ec);

        let (row_map, col_map) = m.compress();

        assert_eq!(row_map, vec![None, Some(0), Some(1)]);
        assert_eq!(col_map, vec![Some(0), None, Some(1)]);
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 2);
        // old row 1 was 2 x1 - x2 -> new row 0 holds -x2 (x1 deleted)
        assert_eq!(m.row(0), &[(1, -1.0)]);
        // old row 2 was x0 + x2 -> new row 1
        assert_eq!(m.row(1), &[(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn test_sparsity_condition() {
        // col 0 appears in rows 0 and 2; eq has cols {0, 1}
        let m = matrix_3x3();
        let eq = m.row(0).to_vec();

        // row 0 already has col 1, row 2 gains it: net fill-in is -1
        assert!(m.check_aggregation_sparsity_condition(0, &eq, 0, 10));
        assert!(!m.check_aggregation_sparsity_condition(0, &eq, -1, 0));
    }
}
