//! The problem-update core.
//!
//! [`ProblemUpdate`] is the sole mutator of a [`Problem`] during presolve.
//! Presolve methods propose reductions against a read-only view; the update
//! core checks each transaction for conflicts with changes already accepted
//! this round, applies it atomically through the bound and fix mutators, and
//! keeps the derived state (activities, worklists, per-round state flags,
//! the postsolve trail) consistent with every primary change. Between rounds
//! `flush` materializes buffered coefficient changes and removes deleted
//! rows and columns, and `compress` renumbers the storage once enough of it
//! has died.

use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::activity::{
    compute_row_activity, update_activities_after_boundchange, update_activity_after_coeffchange,
    ActivityChange, BoundChange, RowActivity, RowStatus,
};
use crate::flags::{ColFlags, RowFlags};
use crate::matrix::{ConstraintMatrix, MatrixBuffer};
use crate::num::Num;
use crate::options::{PresolveOptions, Statistics};
use crate::postsolve::Postsolve;
use crate::problem::Problem;
use crate::reductions::{ColReduction, Reduction, RowReduction};

/// Outcome of a single presolve primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresolveStatus {
    /// Nothing changed.
    Unchanged,
    /// The problem was reduced.
    Reduced,
    /// A contradiction was certified.
    Infeasible,
    /// A dual argument shows the problem is unbounded or infeasible.
    UnbndOrInfeas,
}

/// Outcome of the conflict check of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// The transaction can be applied.
    NoConflict,
    /// The transaction contradicts changes accepted earlier this round.
    Conflict,
    /// The transaction must be replayed after substitutions are allowed.
    Postpone,
}

/// Outcome of applying a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// All records were applied.
    Applied,
    /// The transaction conflicted and had no effect.
    Rejected,
    /// The transaction was deferred; replay it later this round.
    Postponed,
    /// A mutator certified infeasibility.
    Infeasible,
}

/// Per-round conflict-detection state of a row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct StateFlags(u8);

impl StateFlags {
    const LOCKED: StateFlags = StateFlags(1 << 0);
    const MODIFIED: StateFlags = StateFlags(1 << 1);
    const BOUNDS_MODIFIED: StateFlags = StateFlags(1 << 2);

    fn set(&mut self, flags: StateFlags) {
        self.0 |= flags.0;
    }

    fn test(self, flags: StateFlags) -> bool {
        self.0 & flags.0 != 0
    }

    fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for StateFlags {
    type Output = StateFlags;

    fn bitor(self, rhs: StateFlags) -> StateFlags {
        StateFlags(self.0 | rhs.0)
    }
}

/// Observer notified with the old-to-new index maps after each compression.
pub type CompressObserver<'a> = Box<dyn FnMut(&[Option<usize>], &[Option<usize>]) + 'a>;

/// The update core. Owns mutable access to the problem, the postsolve trail
/// and the statistics for its lifetime.
pub struct ProblemUpdate<'a> {
    problem: &'a mut Problem,
    postsolve: &'a mut Postsolve,
    stats: &'a mut Statistics,
    options: &'a PresolveOptions,
    num: Num,

    postpone_substitutions: bool,

    dirty_row_states: Vec<usize>,
    dirty_col_states: Vec<usize>,
    row_state: Vec<StateFlags>,
    col_state: Vec<StateFlags>,

    deleted_cols: Vec<usize>,
    redundant_rows: Vec<usize>,

    changed_activities: Vec<usize>,
    singleton_rows: Vec<usize>,
    singleton_columns: Vec<usize>,
    empty_columns: Vec<usize>,
    first_new_singleton_col: usize,

    matrix_buffer: MatrixBuffer,

    compress_observers: Vec<CompressObserver<'a>>,

    random_row_perm: Vec<usize>,
    random_col_perm: Vec<usize>,

    lastcompress_ndelrows: usize,
    lastcompress_ndelcols: usize,
}

/// Enqueue a row for the redundancy/infeasibility check of this round.
///
/// Skipped when the row was already enqueued this round, is redundant, or the
/// touched side still has more than one infinite contribution (its real
/// bound has not entered a testable regime).
fn update_activity(
    change: ActivityChange,
    row: usize,
    activity: &mut RowActivity,
    matrix: &ConstraintMatrix,
    nrounds: i64,
    changed_activities: &mut Vec<usize>,
) {
    if activity.last_change == nrounds {
        return;
    }

    if change == ActivityChange::Min && activity.ninfmin > 1 {
        return;
    }

    if change == ActivityChange::Max && activity.ninfmax > 1 {
        return;
    }

    if matrix.is_row_redundant(row) {
        return;
    }

    activity.last_change = nrounds;
    changed_activities.push(row);
}

/// Remap a vector of indices through a compression map, dropping deleted
/// entries.
fn compress_index_vector(map: &[Option<usize>], vec: &mut Vec<usize>) {
    let mut kept = 0usize;
    for i in 0..vec.len() {
        if let Some(new) = map[vec[i]] {
            vec[kept] = new;
            kept += 1;
        }
    }
    vec.truncate(kept);
}

impl<'a> ProblemUpdate<'a> {
    /// Create the update core for a problem.
    pub fn new(
        problem: &'a mut Problem,
        postsolve: &'a mut Postsolve,
        stats: &'a mut Statistics,
        options: &'a PresolveOptions,
    ) -> Self {
        let nrows = problem.nrows();
        let ncols = problem.ncols();

        let mut rng = ChaCha8Rng::seed_from_u64(options.randomseed);
        let mut random_row_perm: Vec<usize> = (0..nrows).collect();
        random_row_perm.shuffle(&mut rng);
        let mut random_col_perm: Vec<usize> = (0..ncols).collect();
        random_col_perm.shuffle(&mut rng);

        Self {
            problem,
            postsolve,
            stats,
            options,
            num: Num::new(options.feastol, options.epsilon, options.hugeval),

            postpone_substitutions: true,

            dirty_row_states: Vec::new(),
            dirty_col_states: Vec::new(),
            row_state: vec![StateFlags::default(); nrows],
            col_state: vec![StateFlags::default(); ncols],

            deleted_cols: Vec::new(),
            redundant_rows: Vec::new(),

            changed_activities: Vec::new(),
            singleton_rows: Vec::new(),
            singleton_columns: Vec::new(),
            empty_columns: Vec::new(),
            first_new_singleton_col: 0,

            matrix_buffer: MatrixBuffer::default(),

            compress_observers: Vec::new(),

            random_row_perm,
            random_col_perm,

            lastcompress_ndelrows: 0,
            lastcompress_ndelcols: 0,
        }
    }

    /// Allow or postpone substitutions for the rest of the round.
    pub fn set_postpone_substitutions(&mut self, postpone: bool) {
        self.postpone_substitutions = postpone;
    }

    /// The numeric helper in use.
    pub fn num(&self) -> Num {
        self.num
    }

    /// The problem being presolved.
    pub fn problem(&self) -> &Problem {
        self.problem
    }

    /// The postsolve trail.
    pub fn postsolve(&self) -> &Postsolve {
        self.postsolve
    }

    /// Rows whose activity changed and is pending a redundancy check.
    pub fn changed_activities(&self) -> &[usize] {
        &self.changed_activities
    }

    /// Known singleton columns.
    pub fn singleton_cols(&self) -> &[usize] {
        &self.singleton_columns
    }

    /// Singleton rows pending removal at the next flush.
    pub fn singleton_rows(&self) -> &[usize] {
        &self.singleton_rows
    }

    /// Empty columns pending fixing at the next flush.
    pub fn empty_cols(&self) -> &[usize] {
        &self.empty_columns
    }

    /// Split index into `singleton_cols` separating previously-seen from
    /// newly-discovered singletons.
    pub fn first_new_singleton_col(&self) -> usize {
        self.first_new_singleton_col
    }

    /// Deterministic tie-breaking permutation over rows.
    pub fn random_row_perm(&self) -> &[usize] {
        &self.random_row_perm
    }

    /// Deterministic tie-breaking permutation over columns.
    pub fn random_col_perm(&self) -> &[usize] {
        &self.random_col_perm
    }

    /// Number of rows not yet deleted.
    pub fn n_active_rows(&self) -> usize {
        self.problem.nrows() - (self.stats.ndeletedrows - self.lastcompress_ndelrows)
    }

    /// Number of columns not yet deleted.
    pub fn n_active_cols(&self) -> usize {
        self.problem.ncols() - (self.stats.ndeletedcols - self.lastcompress_ndelcols)
    }

    /// Register an observer for index renumbering.
    pub fn observe_compress(&mut self, observer: CompressObserver<'a>) {
        self.compress_observers.push(observer);
    }

    /// Prefer the sparser column for substitution; break ties by a zero
    /// objective coefficient, then by the random column permutation.
    pub fn is_col_better_for_substitution(&self, col1: usize, col2: usize) -> bool {
        let col1size = self.problem.matrix().col_sizes()[col1];
        let col2size = self.problem.matrix().col_sizes()[col2];

        if col1size != col2size {
            return col1size < col2size;
        }

        let obj1zero = self.problem.objective().coefficients[col1] == 0.0;
        let obj2zero = self.problem.objective().coefficients[col2] == 0.0;

        if obj1zero != obj2zero {
            return obj1zero;
        }

        self.random_col_perm[col1] < self.random_col_perm[col2]
    }

    fn set_col_state(&mut self, col: usize, flags: StateFlags) {
        debug_assert!(col < self.problem.ncols());

        if self.col_state[col].is_empty() {
            self.dirty_col_states.push(col);
        }
        self.col_state[col].set(flags);
    }

    fn set_row_state(&mut self, row: usize, flags: StateFlags) {
        debug_assert!(row < self.problem.nrows());
        debug_assert!(self.equation_flag_consistent(row));

        if self.row_state[row].is_empty() {
            self.dirty_row_states.push(row);
        }
        self.row_state[row].set(flags);
    }

    #[cfg(debug_assertions)]
    fn equation_flag_consistent(&self, row: usize) -> bool {
        let matrix = self.problem.matrix();
        let rflags = matrix.row_flags()[row];
        if rflags.test(RowFlags::REDUNDANT) {
            return true;
        }
        let sides_equal = !rflags.test(RowFlags::LHS_INF | RowFlags::RHS_INF)
            && matrix.lhs()[row] == matrix.rhs()[row];
        rflags.test(RowFlags::EQUATION) == sides_equal
    }

    #[cfg(not(debug_assertions))]
    fn equation_flag_consistent(&self, _row: usize) -> bool {
        true
    }

    /// Mark a row redundant and schedule its deletion. Idempotent.
    pub fn mark_row_redundant(&mut self, row: usize) {
        if !self.problem.matrix().is_row_redundant(row) {
            self.redundant_rows.push(row);
            self.stats.ndeletedrows += 1;
            self.problem.matrix.mark_row_redundant(row);
        }
    }

    /// Mark a column fixed and schedule its deletion.
    fn mark_col_fixed(&mut self, col: usize) {
        debug_assert!(!self.problem.cflags[col].test(ColFlags::INACTIVE));
        self.problem.cflags[col].set(ColFlags::FIXED);
        self.deleted_cols.push(col);
        self.stats.ndeletedcols += 1;
        self.problem.count_col_deleted(col);
    }

    /// Fix a column to a value.
    ///
    /// Infeasible if the value violates a finite bound by more than the
    /// feasibility tolerance or is fractional for an integral column.
    pub fn fix_col(&mut self, col: usize, val: f64) -> PresolveStatus {
        let problem = &mut *self.problem;
        let cflags = &mut problem.cflags;

        if cflags[col].test(ColFlags::SUBSTITUTED) {
            return PresolveStatus::Unchanged;
        }

        let lbs = &mut problem.lower_bounds;
        let ubs = &mut problem.upper_bounds;

        let lbchanged = cflags[col].test(ColFlags::LB_INF) || val != lbs[col];
        let ubchanged = cflags[col].test(ColFlags::UB_INF) || val != ubs[col];

        if lbchanged {
            self.stats.nboundchgs += 1;
        }
        if ubchanged {
            self.stats.nboundchgs += 1;
        }

        if !lbchanged && !ubchanged {
            debug_assert!(cflags[col].test(ColFlags::FIXED));
            return PresolveStatus::Unchanged;
        }

        if (!cflags[col].test(ColFlags::LB_INF) && self.num.is_feas_lt(val, lbs[col]))
            || (!cflags[col].test(ColFlags::UB_INF) && self.num.is_feas_gt(val, ubs[col]))
            || (cflags[col].test(ColFlags::INTEGRAL) && !self.num.is_feas_integral(val))
        {
            debug!(
                "fixing col {} with bounds [{},{}] to value {} is infeasible",
                col, lbs[col], ubs[col], val
            );
            return PresolveStatus::Infeasible;
        }

        if cflags[col].test(ColFlags::FIXED) {
            return PresolveStatus::Unchanged;
        }

        let matrix = &problem.matrix;
        let activities = &mut problem.activities;
        let stats = &mut *self.stats;
        let changed_activities = &mut self.changed_activities;

        if lbchanged {
            update_activities_after_boundchange(
                matrix.col(col),
                BoundChange::Lower,
                lbs[col],
                val,
                cflags[col].test(ColFlags::LB_USELESS),
                false,
                activities,
                |change, row, activity| {
                    update_activity(change, row, activity, matrix, stats.nrounds, changed_activities)
                },
            );
            lbs[col] = val;
            cflags[col].unset(ColFlags::LB_USELESS);
        }

        if ubchanged {
            update_activities_after_boundchange(
                matrix.col(col),
                BoundChange::Upper,
                ubs[col],
                val,
                cflags[col].test(ColFlags::UB_USELESS),
                false,
                activities,
                |change, row, activity| {
                    update_activity(change, row, activity, matrix, stats.nrounds, changed_activities)
                },
            );
            ubs[col] = val;
            cflags[col].unset(ColFlags::UB_USELESS);
        }

        self.mark_col_fixed(col);
        self.set_col_state(col, StateFlags::BOUNDS_MODIFIED);

        PresolveStatus::Reduced
    }

    /// Mark a column fixed at plus or minus infinity (the sign of `val`).
    ///
    /// The activities are left untouched; the rows the column appears in are
    /// redundant or about to become so.
    pub fn fix_col_infinity(&mut self, col: usize, val: f64) -> PresolveStatus {
        let cflags = &self.problem.cflags;
        if cflags[col].test(ColFlags::INACTIVE) || val == 0.0 {
            return PresolveStatus::Unchanged;
        }

        self.mark_col_fixed(col);
        self.set_col_state(col, StateFlags::BOUNDS_MODIFIED);

        PresolveStatus::Reduced
    }

    /// Tighten a column's lower bound.
    pub fn change_lb(&mut self, col: usize, val: f64) -> PresolveStatus {
        self.change_bound(BoundChange::Lower, col, val)
    }

    /// Tighten a column's upper bound.
    pub fn change_ub(&mut self, col: usize, val: f64) -> PresolveStatus {
        self.change_bound(BoundChange::Upper, col, val)
    }

    fn change_bound(&mut self, side: BoundChange, col: usize, val: f64) -> PresolveStatus {
        let problem = &mut *self.problem;
        let cflags = &mut problem.cflags;

        if cflags[col].test(ColFlags::SUBSTITUTED) {
            return PresolveStatus::Unchanged;
        }

        let lbs = &mut problem.lower_bounds;
        let ubs = &mut problem.upper_bounds;

        let mut newbound = val;
        if cflags[col].test(ColFlags::INTEGRAL | ColFlags::IMPL_INT) {
            newbound = match side {
                BoundChange::Lower => self.num.feas_ceil(newbound),
                BoundChange::Upper => self.num.feas_floor(newbound),
            };
        }

        let (own_inf, own_useless, own_huge) = match side {
            BoundChange::Lower => (ColFlags::LB_INF, ColFlags::LB_USELESS, ColFlags::LB_HUGE),
            BoundChange::Upper => (ColFlags::UB_INF, ColFlags::UB_USELESS, ColFlags::UB_HUGE),
        };
        let opposite_inf = match side {
            BoundChange::Lower => ColFlags::UB_INF,
            BoundChange::Upper => ColFlags::LB_INF,
        };

        let improves = cflags[col].test(own_inf)
            || match side {
                BoundChange::Lower => newbound > lbs[col],
                BoundChange::Upper => newbound < ubs[col],
            };
        if !improves {
            return PresolveStatus::Unchanged;
        }

        self.stats.nboundchgs += 1;

        let opposite_bound = match side {
            BoundChange::Lower => ubs[col],
            BoundChange::Upper => lbs[col],
        };
        let crosses = !cflags[col].test(opposite_inf)
            && match side {
                BoundChange::Lower => newbound > opposite_bound,
                BoundChange::Upper => newbound < opposite_bound,
            };
        if crosses {
            let infeasible = match side {
                BoundChange::Lower => self.num.is_feas_gt(newbound, opposite_bound),
                BoundChange::Upper => self.num.is_feas_lt(newbound, opposite_bound),
            };
            if infeasible {
                debug!(
                    "changing bound of col {} with bounds [{},{}] to value {} is infeasible",
                    col, lbs[col], ubs[col], newbound
                );
                return PresolveStatus::Infeasible;
            }

            if !cflags[col].test(own_inf) && lbs[col] == ubs[col] {
                return PresolveStatus::Unchanged;
            }

            // clamp to the opposite bound; the column becomes fixed below
            newbound = opposite_bound;
        }

        let matrix = &problem.matrix;
        let activities = &mut problem.activities;
        let stats = &mut *self.stats;
        let changed_activities = &mut self.changed_activities;
        let oldbound = match side {
            BoundChange::Lower => lbs[col],
            BoundChange::Upper => ubs[col],
        };
        let old_useless = cflags[col].test(own_useless);

        if !self.num.is_huge(newbound) {
            update_activities_after_boundchange(
                matrix.col(col),
                side,
                oldbound,
                newbound,
                old_useless,
                false,
                activities,
                |change, row, activity| {
                    update_activity(change, row, activity, matrix, stats.nrounds, changed_activities)
                },
            );
            cflags[col].unset(own_useless);
        } else {
            // huge bounds stay out of the finite sums; their contribution
            // remains counted as infinite
            if !old_useless {
                update_activities_after_boundchange(
                    matrix.col(col),
                    side,
                    oldbound,
                    newbound,
                    false,
                    true,
                    activities,
                    |change, row, activity| {
                        update_activity(
                            change,
                            row,
                            activity,
                            matrix,
                            stats.nrounds,
                            changed_activities,
                        )
                    },
                );
            }
            cflags[col].unset(own_inf);
            cflags[col].set(own_huge);
        }

        match side {
            BoundChange::Lower => lbs[col] = newbound,
            BoundChange::Upper => ubs[col] = newbound,
        }

        if !cflags[col].test(opposite_inf) && lbs[col] == ubs[col] {
            cflags[col].set(ColFlags::FIXED);
            self.deleted_cols.push(col);
            self.stats.ndeletedcols += 1;
            self.problem.count_col_deleted(col);
        }

        self.set_col_state(col, StateFlags::BOUNDS_MODIFIED);

        PresolveStatus::Reduced
    }

    /// Remove the constant contribution of fixed columns from the sides and
    /// activities, and record each fix on the postsolve trail.
    pub fn remove_fixed_cols(&mut self) {
        let deleted = std::mem::take(&mut self.deleted_cols);

        for &col in &deleted {
            let cflags = self.problem.cflags[col];
            if !cflags.test(ColFlags::FIXED) {
                continue;
            }

            if cflags.test(ColFlags::LB_INF) {
                let bound = self.problem.upper_bounds[col];
                self.postsolve
                    .notify_fixed_inf_col(col, -1, bound, self.problem);
                continue;
            }
            if cflags.test(ColFlags::UB_INF) {
                let bound = self.problem.lower_bounds[col];
                self.postsolve
                    .notify_fixed_inf_col(col, 1, bound, self.problem);
                continue;
            }

            let val = self.problem.lower_bounds[col];
            debug_assert_eq!(val, self.problem.upper_bounds[col]);
            self.postsolve.notify_fixed_col(col, val);

            // a column fixed to zero contributes nothing
            if val == 0.0 {
                continue;
            }

            let obj = &mut self.problem.objective;
            if obj.coefficients[col] != 0.0 {
                obj.offset += val * obj.coefficients[col];
                obj.coefficients[col] = 0.0;
            }

            let col_entries = self.problem.matrix.col(col).to_vec();
            for (row, coef) in col_entries {
                if self.problem.matrix.is_row_redundant(row) {
                    continue;
                }

                let constant = val * coef;
                self.problem.activities[row].min -= constant;
                self.problem.activities[row].max -= constant;
                self.problem.matrix.shift_sides(row, constant);
            }
        }

        self.deleted_cols = deleted;
    }

    fn is_dualfix_enabled(&self, col: usize) -> bool {
        match self.options.dualreds {
            0 => false,
            1 => self.problem.objective.coefficients[col] != 0.0,
            _ => true,
        }
    }

    /// Fix a column whose locks permit moving it to one of its bounds
    /// without losing any optimal solution.
    fn apply_dualfix(&mut self, col: usize) -> PresolveStatus {
        if !self.is_dualfix_enabled(col) {
            return PresolveStatus::Unchanged;
        }

        let obj = self.problem.objective.coefficients[col];
        let locks = self.problem.locks[col];
        let cflags = &mut self.problem.cflags;

        if locks.down == 0 && obj >= 0.0 {
            if cflags[col].test(ColFlags::LB_INF) {
                if obj != 0.0 {
                    debug!("dual fixing detected unbounded or infeasible column {}", col);
                    return PresolveStatus::UnbndOrInfeas;
                }
            } else {
                self.problem.upper_bounds[col] = self.problem.lower_bounds[col];
                cflags[col].unset(ColFlags::UB_INF);
                self.stats.nboundchgs += 1;

                self.mark_col_fixed(col);
                return PresolveStatus::Reduced;
            }
        }

        let cflags = &mut self.problem.cflags;
        if locks.up == 0 && obj <= 0.0 {
            if cflags[col].test(ColFlags::UB_INF) {
                if obj != 0.0 {
                    debug!("dual fixing detected unbounded or infeasible column {}", col);
                    return PresolveStatus::UnbndOrInfeas;
                }
            } else {
                self.problem.lower_bounds[col] = self.problem.upper_bounds[col];
                cflags[col].unset(ColFlags::LB_INF);
                self.stats.nboundchgs += 1;

                self.mark_col_fixed(col);
                return PresolveStatus::Reduced;
            }
        }

        PresolveStatus::Unchanged
    }

    /// Scan all columns once: round integer bounds, flag huge bounds, detect
    /// conflicting or equal bound pairs, apply dual fixing and classify
    /// empty and singleton columns.
    pub fn trivial_column_presolve(&mut self) -> PresolveStatus {
        let mut status = PresolveStatus::Unchanged;

        for col in 0..self.problem.ncols() {
            if self.problem.cflags[col].test(ColFlags::INACTIVE) {
                continue;
            }

            // round bounds of integral columns to integral values
            if self.problem.cflags[col].test(ColFlags::INTEGRAL) {
                if !self.problem.cflags[col].test(ColFlags::LB_INF) {
                    let ceillb = self.problem.lower_bounds[col].ceil();
                    if ceillb != self.problem.lower_bounds[col] {
                        self.problem.lower_bounds[col] = ceillb;
                        self.stats.nboundchgs += 1;
                        status = PresolveStatus::Reduced;
                    }
                }
                if !self.problem.cflags[col].test(ColFlags::UB_INF) {
                    let floorub = self.problem.upper_bounds[col].floor();
                    if floorub != self.problem.upper_bounds[col] {
                        self.problem.upper_bounds[col] = floorub;
                        self.stats.nboundchgs += 1;
                        status = PresolveStatus::Reduced;
                    }
                }
            }

            let cflags = &mut self.problem.cflags;
            if !cflags[col].test(ColFlags::LB_INF) && self.num.is_huge(self.problem.lower_bounds[col])
            {
                cflags[col].set(ColFlags::LB_HUGE);
            }
            if !cflags[col].test(ColFlags::UB_INF) && self.num.is_huge(self.problem.upper_bounds[col])
            {
                cflags[col].set(ColFlags::UB_HUGE);
            }

            if !cflags[col].test(ColFlags::UNBOUNDED) {
                if self.problem.lower_bounds[col] > self.problem.upper_bounds[col] {
                    debug!("trivial presolve detected conflicting bounds of col {}", col);
                    return PresolveStatus::Infeasible;
                }

                if self.problem.lower_bounds[col] == self.problem.upper_bounds[col] {
                    self.mark_col_fixed(col);
                    status = PresolveStatus::Reduced;
                    continue;
                }
            }

            match self.apply_dualfix(col) {
                PresolveStatus::UnbndOrInfeas => return PresolveStatus::UnbndOrInfeas,
                PresolveStatus::Reduced => {
                    status = PresolveStatus::Reduced;
                    continue;
                }
                _ => {}
            }

            match self.problem.matrix.col_sizes()[col] {
                0 => self.empty_columns.push(col),
                1 => self.singleton_columns.push(col),
                _ => {}
            }
        }

        status
    }

    /// Scan all rows once: delete empty rows, turn singleton rows into bound
    /// changes, test activities against sides and clean up negligible
    /// coefficients.
    pub fn trivial_row_presolve(&mut self) -> PresolveStatus {
        let mut status = PresolveStatus::Unchanged;

        for row in 0..self.problem.nrows() {
            match self.problem.matrix.row_sizes()[row] {
                -1 => continue,
                0 => {
                    let rflags = self.problem.matrix.row_flags()[row];
                    let lhs = self.problem.matrix.lhs()[row];
                    let rhs = self.problem.matrix.rhs()[row];
                    if !rflags.test(RowFlags::LHS_INF) && self.num.is_feas_gt(lhs, 0.0) {
                        debug!("trivial presolve detected infeasible empty row {}", row);
                        return PresolveStatus::Infeasible;
                    }
                    if !rflags.test(RowFlags::RHS_INF) && self.num.is_feas_lt(rhs, 0.0) {
                        debug!("trivial presolve detected infeasible empty row {}", row);
                        return PresolveStatus::Infeasible;
                    }
                    self.problem.matrix.mark_empty_row_deleted(row);
                    status = PresolveStatus::Reduced;
                }
                1 => match self.remove_singleton_row(row) {
                    PresolveStatus::Infeasible => {
                        debug!("removing singleton row {} detected infeasibility", row);
                        return PresolveStatus::Infeasible;
                    }
                    PresolveStatus::Reduced => status = PresolveStatus::Reduced,
                    _ => {}
                },
                _ => {
                    let st = self.problem.activities[row].check_status(
                        &self.num,
                        self.problem.matrix.row_flags()[row],
                        self.problem.matrix.lhs()[row],
                        self.problem.matrix.rhs()[row],
                    );
                    match st {
                        RowStatus::Redundant => {
                            self.mark_row_redundant(row);
                            status = PresolveStatus::Reduced;
                        }
                        RowStatus::RedundantLhs => {
                            self.problem.matrix.modify_lhs_inf(row);
                            status = PresolveStatus::Reduced;
                            self.cleanup_small_coefficients(row);
                        }
                        RowStatus::RedundantRhs => {
                            self.problem.matrix.modify_rhs_inf(row);
                            status = PresolveStatus::Reduced;
                            self.cleanup_small_coefficients(row);
                        }
                        RowStatus::Infeasible => return PresolveStatus::Infeasible,
                        RowStatus::Unknown => {
                            // set the equation flag lazily
                            self.problem.matrix.refresh_equation_flag(row);
                            self.cleanup_small_coefficients(row);
                        }
                    }
                }
            }

            debug_assert!(self.equation_flag_consistent(row));
        }

        self.flush_changed_coeffs();

        status
    }

    /// Run the one-shot trivial presolve: locks, column pass, exact
    /// activities, row pass, then a full flush.
    pub fn trivial_presolve(&mut self) -> PresolveStatus {
        if self.options.dualreds != 0 {
            self.problem.recompute_locks();
        }

        let mut reduced = false;

        match self.trivial_column_presolve() {
            PresolveStatus::Infeasible => return PresolveStatus::Infeasible,
            PresolveStatus::UnbndOrInfeas => return PresolveStatus::UnbndOrInfeas,
            PresolveStatus::Reduced => reduced = true,
            PresolveStatus::Unchanged => {}
        }

        self.problem.recompute_all_activities();

        match self.trivial_row_presolve() {
            PresolveStatus::Infeasible => return PresolveStatus::Infeasible,
            PresolveStatus::UnbndOrInfeas => return PresolveStatus::UnbndOrInfeas,
            PresolveStatus::Reduced => reduced = true,
            PresolveStatus::Unchanged => {}
        }

        self.remove_fixed_cols();

        self.problem.matrix.delete_rows_and_cols(
            &mut self.redundant_rows,
            &mut self.deleted_cols,
            &mut self.singleton_rows,
            &mut self.singleton_columns,
            &mut self.empty_columns,
        );

        let singleton_rows = self.singleton_rows.clone();
        for row in singleton_rows {
            match self.remove_singleton_row(row) {
                PresolveStatus::Infeasible => {
                    debug!("removing singleton row {} detected infeasibility", row);
                    return PresolveStatus::Infeasible;
                }
                PresolveStatus::Reduced => reduced = true,
                _ => {}
            }
        }

        self.compact_singleton_columns();

        match self.check_changed_activities() {
            PresolveStatus::Infeasible => return PresolveStatus::Infeasible,
            PresolveStatus::UnbndOrInfeas => return PresolveStatus::UnbndOrInfeas,
            PresolveStatus::Reduced => reduced = true,
            PresolveStatus::Unchanged => {}
        }

        self.changed_activities.clear();

        for row in 0..self.problem.nrows() {
            let rflags = self.problem.matrix.row_flags()[row];
            if rflags.test(RowFlags::REDUNDANT) {
                continue;
            }

            let activity = self.problem.activities[row];
            if activity.ninfmin == 0
                || activity.ninfmax == 0
                || (activity.ninfmax == 1 && !rflags.test(RowFlags::LHS_INF))
                || (activity.ninfmin == 1 && !rflags.test(RowFlags::RHS_INF))
            {
                self.changed_activities.push(row);
            }
        }

        match self.flush() {
            PresolveStatus::Infeasible => PresolveStatus::Infeasible,
            PresolveStatus::UnbndOrInfeas => PresolveStatus::UnbndOrInfeas,
            _ if reduced => PresolveStatus::Reduced,
            _ => PresolveStatus::Unchanged,
        }
    }

    /// Convert a singleton row into a bound change or fix of its unique
    /// column and mark the row redundant.
    pub fn remove_singleton_row(&mut self, row: usize) -> PresolveStatus {
        let mut status = PresolveStatus::Unchanged;

        let matrix = self.problem.matrix();
        if matrix.row_sizes()[row] != 1 || matrix.is_row_redundant(row) {
            return status;
        }

        let (col, val) = matrix.row(row)[0];
        let rflags = matrix.row_flags()[row];
        let lhs = matrix.lhs()[row];
        let rhs = matrix.rhs()[row];

        if rflags.test(RowFlags::EQUATION) {
            status = self.fix_col(col, rhs / val);
        } else if val < 0.0 {
            if !rflags.test(RowFlags::LHS_INF) {
                status = self.change_ub(col, lhs / val);
            }
            if !rflags.test(RowFlags::RHS_INF) && status != PresolveStatus::Infeasible {
                status = self.change_lb(col, rhs / val);
            }
        } else {
            if !rflags.test(RowFlags::LHS_INF) {
                status = self.change_lb(col, lhs / val);
            }
            if !rflags.test(RowFlags::RHS_INF) && status != PresolveStatus::Infeasible {
                status = self.change_ub(col, rhs / val);
            }
        }

        self.mark_row_redundant(row);

        status
    }

    /// Buffer the removal of negligible coefficients of one row.
    ///
    /// Coefficients below `minabscoeff` are dropped outright. Larger but
    /// still tiny coefficients are dropped with a side compensation of
    /// `v · lb` as long as the accumulated worst-case distortion stays below
    /// a tenth of the feasibility tolerance.
    pub fn cleanup_small_coefficients(&mut self, row: usize) {
        let entries = self.problem.matrix.row(row).to_vec();
        let len = entries.len();

        let mut total_mod = 0.0f64;
        for (col, val) in entries {
            let cflags = self.problem.cflags[col];
            if cflags.test(ColFlags::UNBOUNDED | ColFlags::INACTIVE) {
                continue;
            }

            let lb = self.problem.lower_bounds[col];
            let ub = self.problem.upper_bounds[col];
            debug_assert!(ub > lb);

            let absval = val.abs();

            if absval < self.options.minabscoeff {
                self.matrix_buffer.add_entry(row, col, 0.0);
                debug!("removed tiny coefficient {} in row {}", val, row);
                continue;
            }

            if absval <= 1e-3 && absval * (ub - lb) * len as f64 <= 1e-2 * self.num.feas_tol() {
                let next_total_mod = total_mod + absval * (ub - lb);
                if next_total_mod <= 0.1 * self.num.feas_tol() {
                    self.matrix_buffer.add_entry(row, col, 0.0);
                    debug!("removed small coefficient {} in row {}", val, row);

                    if lb != 0.0 {
                        let rflags = self.problem.matrix.row_flags()[row];
                        if !rflags.test(RowFlags::RHS_INF) {
                            self.stats.nsidechgs += 1;
                        }
                        if !rflags.test(RowFlags::LHS_INF) {
                            self.stats.nsidechgs += 1;
                        }
                        self.problem.matrix.shift_sides(row, val * lb);
                    }

                    total_mod = next_total_mod;
                }
            }
        }
    }

    /// Fix empty columns at an optimal value, or report unboundedness when
    /// the improving direction is unbounded. Requires dual reductions.
    pub fn remove_empty_columns(&mut self) -> PresolveStatus {
        if self.options.dualreds == 0 || self.empty_columns.is_empty() {
            return PresolveStatus::Unchanged;
        }

        let empty = std::mem::take(&mut self.empty_columns);
        for &col in &empty {
            if self.problem.matrix.col_sizes()[col] != 0 {
                continue;
            }

            let obj = self.problem.objective.coefficients[col];
            if self.options.dualreds == 1 && obj == 0.0 {
                continue;
            }

            let cflags = self.problem.cflags[col];
            if !cflags.test(ColFlags::INACTIVE) {
                let fixval;
                if obj == 0.0 {
                    if !cflags.test(ColFlags::UB_INF) && self.problem.upper_bounds[col] < 0.0 {
                        fixval = self.problem.upper_bounds[col];
                    } else if !cflags.test(ColFlags::LB_INF) && self.problem.lower_bounds[col] > 0.0
                    {
                        fixval = self.problem.lower_bounds[col];
                    } else {
                        fixval = 0.0;
                    }
                } else if obj < 0.0 {
                    if cflags.test(ColFlags::UB_INF) {
                        self.empty_columns = empty;
                        return PresolveStatus::UnbndOrInfeas;
                    }
                    fixval = self.problem.upper_bounds[col];
                } else {
                    if cflags.test(ColFlags::LB_INF) {
                        self.empty_columns = empty;
                        return PresolveStatus::UnbndOrInfeas;
                    }
                    fixval = self.problem.lower_bounds[col];
                }

                if obj != 0.0 {
                    self.problem.objective.offset += obj * fixval;
                    self.problem.objective.coefficients[col] = 0.0;
                }

                self.postsolve.notify_fixed_col(col, fixval);
                self.problem.cflags[col].set(ColFlags::FIXED);
                self.stats.ndeletedcols += 1;
                self.problem.count_col_deleted(col);
            }

            debug_assert_eq!(self.problem.objective.coefficients[col], 0.0);
            self.problem.matrix.mark_empty_col_deleted(col);
        }

        PresolveStatus::Reduced
    }

    /// Check all enqueued rows for redundancy or infeasibility.
    pub fn check_changed_activities(&mut self) -> PresolveStatus {
        let mut status = PresolveStatus::Unchanged;

        for i in 0..self.changed_activities.len() {
            let row = self.changed_activities[i];
            if self.problem.matrix.is_row_redundant(row) {
                continue;
            }

            let st = self.problem.activities[row].check_status(
                &self.num,
                self.problem.matrix.row_flags()[row],
                self.problem.matrix.lhs()[row],
                self.problem.matrix.rhs()[row],
            );

            match st {
                RowStatus::Redundant => {
                    self.mark_row_redundant(row);
                    status = PresolveStatus::Reduced;
                }
                RowStatus::RedundantLhs => {
                    self.problem.matrix.modify_lhs_inf(row);
                    status = PresolveStatus::Reduced;
                }
                RowStatus::RedundantRhs => {
                    self.problem.matrix.modify_rhs_inf(row);
                    status = PresolveStatus::Reduced;
                }
                RowStatus::Infeasible => return PresolveStatus::Infeasible,
                RowStatus::Unknown => {}
            }
        }

        status
    }

    /// Materialize the buffered coefficient changes in one matrix rewrite
    /// and account their activity effects.
    pub fn flush_changed_coeffs(&mut self) {
        if self.matrix_buffer.is_empty() {
            return;
        }

        let mut changes = Vec::with_capacity(self.matrix_buffer.len());
        self.problem.matrix.change_coefficients(
            &mut self.matrix_buffer,
            &mut self.singleton_rows,
            &mut self.singleton_columns,
            &mut self.empty_columns,
            |row, col, oldval, newval| changes.push((row, col, oldval, newval)),
        );

        let problem = &mut *self.problem;
        let matrix = &problem.matrix;
        let activities = &mut problem.activities;
        let stats = &mut *self.stats;
        let changed_activities = &mut self.changed_activities;

        for (row, col, oldval, newval) in changes {
            update_activity_after_coeffchange(
                problem.lower_bounds[col],
                problem.upper_bounds[col],
                problem.cflags[col],
                oldval,
                newval,
                row,
                &mut activities[row],
                |change, row, activity| {
                    update_activity(change, row, activity, matrix, stats.nrounds, changed_activities)
                },
            );
            stats.ncoefchgs += 1;
        }
    }

    /// Drain all pending buffers: apply coefficient changes, remove singleton
    /// rows, test changed activities, strip fixed columns, physically delete
    /// marked rows and columns and fix empty columns.
    pub fn flush(&mut self) -> PresolveStatus {
        self.flush_changed_coeffs();

        let singleton_rows = std::mem::take(&mut self.singleton_rows);
        for row in singleton_rows {
            if self.remove_singleton_row(row) == PresolveStatus::Infeasible {
                debug!("removing singleton row {} detected infeasibility", row);
                return PresolveStatus::Infeasible;
            }
        }

        if self.check_changed_activities() == PresolveStatus::Infeasible {
            return PresolveStatus::Infeasible;
        }

        let matrix = &self.problem.matrix;
        self.changed_activities
            .retain(|&row| !matrix.is_row_redundant(row));

        self.remove_fixed_cols();

        self.problem.matrix.delete_rows_and_cols(
            &mut self.redundant_rows,
            &mut self.deleted_cols,
            &mut self.singleton_rows,
            &mut self.singleton_columns,
            &mut self.empty_columns,
        );

        self.compact_singleton_columns();

        if self.remove_empty_columns() == PresolveStatus::UnbndOrInfeas {
            return PresolveStatus::UnbndOrInfeas;
        }

        PresolveStatus::Reduced
    }

    /// Drop entries of `singleton_columns` that are no longer singletons,
    /// keeping the previously-seen/new split intact.
    fn compact_singleton_columns(&mut self) {
        if self.singleton_columns.is_empty() {
            return;
        }

        let colsizes = self.problem.matrix.col_sizes();
        let first_new = self.first_new_singleton_col;
        debug_assert!(first_new <= self.singleton_columns.len());

        let mut removed = 0usize;
        for i in 0..first_new {
            let col = self.singleton_columns[i];
            if colsizes[col] != 1 {
                removed += 1;
            } else if removed != 0 {
                self.singleton_columns[i - removed] = col;
            }
        }
        self.first_new_singleton_col = first_new - removed;

        for i in first_new..self.singleton_columns.len() {
            let col = self.singleton_columns[i];
            if colsizes[col] != 1 {
                removed += 1;
            } else if removed != 0 {
                self.singleton_columns[i - removed] = col;
            }
        }

        let len = self.singleton_columns.len() - removed;
        self.singleton_columns.truncate(len);

        debug_assert!(self.first_new_singleton_col <= self.singleton_columns.len());
        debug_assert!(self
            .singleton_columns
            .iter()
            .all(|&col| self.problem.matrix.col_sizes()[col] == 1));
    }

    /// Reset the per-round state flags and compress the storage when enough
    /// of it has died.
    pub fn clear_states(&mut self) {
        for row in self.dirty_row_states.drain(..) {
            self.row_state[row] = StateFlags::default();
        }
        debug_assert!(self.row_state.iter().all(|s| s.is_empty()));

        for col in self.dirty_col_states.drain(..) {
            self.col_state[col] = StateFlags::default();
        }
        debug_assert!(self.col_state.iter().all(|s| s.is_empty()));

        if self.options.compressfac != 0.0 {
            let ncols = self.problem.ncols();
            let nrows = self.problem.nrows();
            if (ncols > 100
                && (self.n_active_cols() as f64) < ncols as f64 * self.options.compressfac)
                || (nrows > 100
                    && (self.n_active_rows() as f64) < nrows as f64 * self.options.compressfac)
            {
                self.compress(false);
            }
        }
    }

    /// Forget the activity queue and the singleton split of the finished
    /// round.
    pub fn clear_change_info(&mut self) {
        self.changed_activities.clear();
        self.first_new_singleton_col = self.singleton_columns.len();
    }

    /// Renumber all storage to the live rows and columns, remapping every
    /// index vector held by the core, the postsolve trail and the registered
    /// observers.
    pub fn compress(&mut self, full: bool) {
        if self.problem.ncols() == self.n_active_cols()
            && self.problem.nrows() == self.n_active_rows()
            && !full
        {
            return;
        }

        debug!(
            "compressing problem ({} rows, {} cols) to active problem ({} rows, {} cols)",
            self.problem.nrows(),
            self.problem.ncols(),
            self.n_active_rows(),
            self.n_active_cols()
        );

        debug_assert!(self.redundant_rows.is_empty());
        debug_assert!(self.deleted_cols.is_empty());
        debug_assert!(self.dirty_row_states.is_empty());
        debug_assert!(self.dirty_col_states.is_empty());
        debug_assert!(self.matrix_buffer.is_empty());

        let (row_map, col_map) = self.problem.compress();

        self.row_state.clear();
        self.row_state
            .resize(self.problem.nrows(), StateFlags::default());
        self.col_state.clear();
        self.col_state
            .resize(self.problem.ncols(), StateFlags::default());

        let num_new_singleton_cols = self.singleton_columns.len() - self.first_new_singleton_col;

        {
            let row_map = &row_map;
            let col_map = &col_map;
            let random_row_perm = &mut self.random_row_perm;
            let random_col_perm = &mut self.random_col_perm;
            let changed_activities = &mut self.changed_activities;
            let singleton_rows = &mut self.singleton_rows;
            let singleton_columns = &mut self.singleton_columns;
            let empty_columns = &mut self.empty_columns;
            let postsolve = &mut *self.postsolve;

            rayon::scope(|scope| {
                scope.spawn(move |_| compress_index_vector(row_map, random_row_perm));
                scope.spawn(move |_| compress_index_vector(col_map, random_col_perm));
                scope.spawn(move |_| compress_index_vector(row_map, changed_activities));
                scope.spawn(move |_| compress_index_vector(row_map, singleton_rows));
                scope.spawn(move |_| compress_index_vector(col_map, singleton_columns));
                scope.spawn(move |_| compress_index_vector(col_map, empty_columns));
                scope.spawn(move |_| postsolve.compress(row_map, col_map));
            });
        }

        self.first_new_singleton_col = self
            .singleton_columns
            .len()
            .saturating_sub(num_new_singleton_cols);

        for observer in self.compress_observers.iter_mut() {
            observer(&row_map, &col_map);
        }

        self.lastcompress_ndelrows = self.stats.ndeletedrows;
        self.lastcompress_ndelcols = self.stats.ndeletedcols;
    }

    /// Recompute the activities of rewritten rows and enqueue them for the
    /// redundancy check.
    fn recompute_and_enqueue_activities(&mut self, rows: &[usize]) {
        for &row in rows {
            if self.problem.matrix.is_row_redundant(row) {
                continue;
            }

            let was_enqueued = self.problem.activities[row].last_change == self.stats.nrounds;
            let mut activity = compute_row_activity(
                self.problem.matrix.row(row),
                &self.problem.lower_bounds,
                &self.problem.upper_bounds,
                &self.problem.cflags,
            );
            activity.last_change = self.stats.nrounds;
            self.problem.activities[row] = activity;

            if !was_enqueued {
                self.changed_activities.push(row);
            }
        }
    }

    /// Check whether a transaction conflicts with the per-round state left
    /// by previously applied transactions.
    pub fn check_transaction_conflicts(&self, reductions: &[Reduction]) -> ConflictType {
        for reduction in reductions {
            if reduction.row >= 0 && reduction.col >= 0 {
                // a coefficient change requires that neither the row nor the
                // column is locked
                if self.col_state[reduction.col as usize].test(StateFlags::LOCKED)
                    || self.row_state[reduction.row as usize].test(StateFlags::LOCKED)
                {
                    return ConflictType::Conflict;
                }
            } else if reduction.row < 0 {
                let col = reduction.col as usize;
                match ColReduction::from_i32(reduction.row) {
                    Some(ColReduction::Locked) | Some(ColReduction::LockedStrong) => {
                        // locking requires the column to be unmodified
                        if self.col_state[col].test(StateFlags::MODIFIED) {
                            return ConflictType::Conflict;
                        }
                    }
                    Some(ColReduction::Objective) => {
                        if self.col_state[col].test(StateFlags::LOCKED) {
                            return ConflictType::Conflict;
                        }
                    }
                    Some(ColReduction::BoundsLocked) => {
                        if self.col_state[col].test(StateFlags::BOUNDS_MODIFIED) {
                            return ConflictType::Conflict;
                        }
                    }
                    Some(ColReduction::Substitute) | Some(ColReduction::Replace) => {
                        // substitutions are postponed to the end of the round
                        if self.postpone_substitutions {
                            return ConflictType::Postpone;
                        }
                    }
                    _ => {}
                }
            } else {
                debug_assert!(reduction.row >= 0 && reduction.col < 0);
                let row = reduction.row as usize;
                match RowReduction::from_i32(reduction.col) {
                    Some(RowReduction::Locked) | Some(RowReduction::LockedStrong) => {
                        if self.row_state[row]
                            .test(StateFlags::MODIFIED | StateFlags::BOUNDS_MODIFIED)
                        {
                            return ConflictType::Conflict;
                        }
                    }
                    Some(RowReduction::Lhs)
                    | Some(RowReduction::LhsInf)
                    | Some(RowReduction::Rhs)
                    | Some(RowReduction::RhsInf) => {
                        if self.row_state[row].test(StateFlags::LOCKED) {
                            return ConflictType::Conflict;
                        }
                    }
                    Some(RowReduction::Sparsify) => {
                        if self.postpone_substitutions {
                            return ConflictType::Postpone;
                        }
                    }
                    _ => {}
                }
            }
        }

        ConflictType::NoConflict
    }

    /// Apply a transaction after a successful conflict check.
    ///
    /// The first mutator that certifies infeasibility aborts the
    /// transaction; every completed mutation has already updated activities
    /// and flags atomically with the primary change, so no inconsistent
    /// state is observable.
    pub fn apply_transaction(&mut self, reductions: &[Reduction]) -> ApplyResult {
        match self.check_transaction_conflicts(reductions) {
            ConflictType::Conflict => return ApplyResult::Rejected,
            ConflictType::Postpone => return ApplyResult::Postponed,
            ConflictType::NoConflict => {}
        }

        let mut i = 0usize;
        while i < reductions.len() {
            let reduction = reductions[i];
            i += 1;

            if reduction.row >= 0 && reduction.col >= 0 {
                let row = reduction.row as usize;
                let col = reduction.col as usize;
                self.set_row_state(row, StateFlags::MODIFIED);
                self.set_col_state(col, StateFlags::MODIFIED);
                self.matrix_buffer.add_entry(row, col, reduction.newval);
            } else if reduction.row < 0 {
                let col = reduction.col as usize;
                match ColReduction::from_i32(reduction.row) {
                    Some(ColReduction::LockedStrong) => {
                        self.set_col_state(col, StateFlags::LOCKED);
                    }
                    Some(ColReduction::Objective) => {
                        self.set_col_state(col, StateFlags::MODIFIED);
                        self.problem.objective.coefficients[col] = reduction.newval;
                    }
                    Some(ColReduction::Fixed) => {
                        if self.fix_col(col, reduction.newval) == PresolveStatus::Infeasible {
                            return ApplyResult::Infeasible;
                        }
                    }
                    Some(ColReduction::FixedInfinity) => {
                        if self.fix_col_infinity(col, reduction.newval)
                            == PresolveStatus::Infeasible
                        {
                            return ApplyResult::Infeasible;
                        }
                    }
                    Some(ColReduction::LowerBound) => {
                        if self.change_lb(col, reduction.newval) == PresolveStatus::Infeasible {
                            return ApplyResult::Infeasible;
                        }
                    }
                    Some(ColReduction::UpperBound) => {
                        if self.change_ub(col, reduction.newval) == PresolveStatus::Infeasible {
                            return ApplyResult::Infeasible;
                        }
                    }
                    Some(ColReduction::ImplInt) => {
                        if !self.problem.cflags[col].test(ColFlags::INACTIVE) {
                            self.problem.cflags[col].set(ColFlags::IMPL_INT);

                            // re-issue the finite bounds so they are rounded
                            if !self.problem.cflags[col].test(ColFlags::LB_INF) {
                                let lb = self.problem.lower_bounds[col];
                                if self.change_lb(col, lb) == PresolveStatus::Infeasible {
                                    return ApplyResult::Infeasible;
                                }
                            }
                            if !self.problem.cflags[col].test(ColFlags::UB_INF) {
                                let ub = self.problem.upper_bounds[col];
                                if self.change_ub(col, ub) == PresolveStatus::Infeasible {
                                    return ApplyResult::Infeasible;
                                }
                            }
                        }
                    }
                    Some(ColReduction::Substitute) => {
                        match self.apply_substitution(col, reduction.newval as usize) {
                            ApplyResult::Applied => {}
                            other => return other,
                        }
                    }
                    Some(ColReduction::SubstituteObj) => {
                        self.apply_substitution_obj(col, reduction.newval as usize);
                    }
                    Some(ColReduction::Parallel) => {
                        match self.apply_parallel_cols(col, reduction.newval as usize) {
                            ApplyResult::Applied => {}
                            other => return other,
                        }
                    }
                    Some(ColReduction::Replace) => {
                        debug_assert!(i < reductions.len());
                        let second = reductions[i];
                        i += 1;
                        debug_assert_eq!(
                            ColReduction::from_i32(second.row),
                            Some(ColReduction::None)
                        );
                        let col2 = second.col as usize;
                        let factor = reduction.newval;
                        let offset = second.newval;
                        match self.apply_replace_col(col, factor, col2, offset) {
                            ApplyResult::Applied => {}
                            other => return other,
                        }
                    }
                    _ => {}
                }
            } else {
                debug_assert!(reduction.row >= 0 && reduction.col < 0);
                let row = reduction.row as usize;
                match RowReduction::from_i32(reduction.col) {
                    Some(RowReduction::LockedStrong) => {
                        self.set_row_state(row, StateFlags::LOCKED);
                    }
                    Some(RowReduction::Lhs) => {
                        self.set_row_state(row, StateFlags::BOUNDS_MODIFIED);

                        if self.problem.matrix.row_flags()[row].test(RowFlags::LHS_INF) {
                            let row_cols: Vec<usize> =
                                self.problem.matrix.row(row).iter().map(|&(c, _)| c).collect();
                            for col in row_cols {
                                self.set_col_state(col, StateFlags::MODIFIED);
                            }
                        }

                        self.problem.matrix.modify_lhs(row, reduction.newval);
                        self.stats.nsidechgs += 1;
                    }
                    Some(RowReduction::Rhs) => {
                        self.set_row_state(row, StateFlags::BOUNDS_MODIFIED);

                        if self.problem.matrix.row_flags()[row].test(RowFlags::RHS_INF) {
                            let row_cols: Vec<usize> =
                                self.problem.matrix.row(row).iter().map(|&(c, _)| c).collect();
                            for col in row_cols {
                                self.set_col_state(col, StateFlags::MODIFIED);
                            }
                        }

                        self.problem.matrix.modify_rhs(row, reduction.newval);
                        self.stats.nsidechgs += 1;
                    }
                    Some(RowReduction::LhsInf) => {
                        if !self.problem.matrix.row_flags()[row].test(RowFlags::LHS_INF) {
                            self.set_row_state(row, StateFlags::BOUNDS_MODIFIED);
                            self.problem.matrix.modify_lhs_inf(row);
                            self.stats.nsidechgs += 1;
                        }
                    }
                    Some(RowReduction::RhsInf) => {
                        if !self.problem.matrix.row_flags()[row].test(RowFlags::RHS_INF) {
                            self.set_row_state(row, StateFlags::BOUNDS_MODIFIED);
                            self.problem.matrix.modify_rhs_inf(row);
                            self.stats.nsidechgs += 1;
                        }
                    }
                    Some(RowReduction::Redundant) => {
                        if !self.problem.matrix.is_row_redundant(row) {
                            self.set_row_state(row, StateFlags::BOUNDS_MODIFIED);
                            self.mark_row_redundant(row);
                        }
                    }
                    Some(RowReduction::Sparsify) => {
                        let ncandidates = reduction.newval as usize;
                        debug_assert!(self.matrix_buffer.is_empty());
                        debug_assert!(i + ncandidates <= reductions.len());

                        let candidates: Vec<(usize, f64)> = reductions[i..i + ncandidates]
                            .iter()
                            .map(|r| (r.row as usize, r.newval))
                            .collect();
                        i += ncandidates;

                        self.apply_sparsify(row, &candidates);
                    }
                    _ => {}
                }
            }
        }

        ApplyResult::Applied
    }

    /// Eliminate `col` through the equality row `eq_row`.
    fn apply_substitution(&mut self, col: usize, eq_row: usize) -> ApplyResult {
        // a singleton equality degenerates to a fix
        if self.problem.matrix.row_sizes()[eq_row] == 1 {
            debug_assert!(!self.problem.matrix.row_flags()[eq_row]
                .test(RowFlags::LHS_INF | RowFlags::RHS_INF));
            let (_, coef) = self.problem.matrix.row(eq_row)[0];
            let val = self.problem.matrix.lhs()[eq_row] / coef;
            if self.fix_col(col, val) == PresolveStatus::Infeasible {
                return ApplyResult::Infeasible;
            }
            return ApplyResult::Applied;
        }

        debug_assert!(self.row_state[eq_row].is_empty());
        debug_assert!(!self.col_state[col].test(StateFlags::BOUNDS_MODIFIED));

        let eq_entries = self.problem.matrix.row(eq_row).to_vec();
        if !self.problem.matrix.check_aggregation_sparsity_condition(
            col,
            &eq_entries,
            self.options.maxfillinpersubstitution,
            self.options.maxshiftperrow,
        ) {
            return ApplyResult::Rejected;
        }

        let col_rows: Vec<usize> = self.problem.matrix.col(col).iter().map(|&(r, _)| r).collect();
        let nrelevant = col_rows.len();

        debug_assert!(!self.problem.cflags[col].test(ColFlags::INACTIVE));
        self.problem.cflags[col].set(ColFlags::SUBSTITUTED);

        self.problem.substitute_var_in_obj(&self.num, col, eq_row);

        for row in col_rows {
            self.set_row_state(row, StateFlags::MODIFIED);
        }
        for &(c, _) in &eq_entries {
            self.set_col_state(c, StateFlags::MODIFIED);
        }

        let eq_rhs = self.problem.matrix.lhs()[eq_row];
        self.postsolve.notify_substitution(col, &eq_entries, eq_rhs);

        let live_rows = self.problem.matrix.aggregate(
            &self.num,
            col,
            &eq_entries,
            eq_rhs,
            &mut self.singleton_rows,
            &mut self.singleton_columns,
            &mut self.empty_columns,
        );
        self.recompute_and_enqueue_activities(&live_rows);

        self.stats.ncoefchgs += (eq_entries.len() * nrelevant) as u64;
        self.stats.ndeletedcols += 1;
        self.stats.ndeletedrows += 1;
        self.problem.count_col_deleted(col);

        if eq_rhs != 0.0 {
            self.stats.nsidechgs += 2 * nrelevant as u64;
        }

        debug_assert_eq!(self.problem.matrix.row_sizes()[eq_row], -1);
        debug_assert_eq!(self.problem.matrix.col_sizes()[col], -1);
        debug_assert_eq!(self.problem.objective.coefficients[col], 0.0);

        ApplyResult::Applied
    }

    /// Substitute `col` in the objective only; the matrix keeps the column,
    /// but its bound contributions are zeroed so it behaves as fixed to 0.
    fn apply_substitution_obj(&mut self, col: usize, eq_row: usize) {
        debug_assert!(!self.problem.cflags[col].test(ColFlags::INACTIVE));
        self.problem.cflags[col].set(ColFlags::SUBSTITUTED);

        self.problem.substitute_var_in_obj(&self.num, col, eq_row);

        let problem = &mut *self.problem;
        let matrix = &problem.matrix;
        let activities = &mut problem.activities;
        let cflags = &mut problem.cflags;
        let lbs = &mut problem.lower_bounds;
        let ubs = &mut problem.upper_bounds;
        let stats = &mut *self.stats;
        let changed_activities = &mut self.changed_activities;

        if cflags[col].test(ColFlags::LB_USELESS) || lbs[col] != 0.0 {
            update_activities_after_boundchange(
                matrix.col(col),
                BoundChange::Lower,
                lbs[col],
                0.0,
                cflags[col].test(ColFlags::LB_USELESS),
                false,
                activities,
                |change, row, activity| {
                    update_activity(change, row, activity, matrix, stats.nrounds, changed_activities)
                },
            );
        }
        if cflags[col].test(ColFlags::UB_USELESS) || ubs[col] != 0.0 {
            update_activities_after_boundchange(
                matrix.col(col),
                BoundChange::Upper,
                ubs[col],
                0.0,
                cflags[col].test(ColFlags::UB_USELESS),
                false,
                activities,
                |change, row, activity| {
                    update_activity(change, row, activity, matrix, stats.nrounds, changed_activities)
                },
            );
        }

        cflags[col].unset(ColFlags::LB_USELESS | ColFlags::UB_USELESS);
        lbs[col] = 0.0;
        ubs[col] = 0.0;
        self.deleted_cols.push(col);

        let eq_entries = self.problem.matrix.row(eq_row).to_vec();
        let eq_rhs = self.problem.matrix.lhs()[eq_row];
        self.postsolve.notify_substitution(col, &eq_entries, eq_rhs);

        for (c, _) in eq_entries {
            self.set_col_state(c, StateFlags::MODIFIED);
        }

        self.stats.ndeletedcols += 1;
        self.problem.count_col_deleted(col);
    }

    /// Merge the parallel column `col1` into `col2` (`col1 = scale · col2`).
    fn apply_parallel_cols(&mut self, col1: usize, col2: usize) -> ApplyResult {
        let cflags = &self.problem.cflags;
        if cflags[col1].test(ColFlags::INACTIVE) || cflags[col2].test(ColFlags::INACTIVE) {
            return ApplyResult::Rejected;
        }

        self.set_col_state(col1, StateFlags::BOUNDS_MODIFIED);
        self.set_col_state(col2, StateFlags::BOUNDS_MODIFIED);

        let problem = &mut *self.problem;
        let matrix = &problem.matrix;
        let cflags = &mut problem.cflags;
        let lbs = &mut problem.lower_bounds;
        let ubs = &mut problem.upper_bounds;
        let activities = &mut problem.activities;
        let objective = &problem.objective;

        let col1_entries = matrix.col(col1);
        let col2_entries = matrix.col(col2);
        debug_assert!(!col1_entries.is_empty());
        debug_assert_eq!(col1_entries.len(), col2_entries.len());

        let scale = col1_entries[0].1 / col2_entries[0].1;
        debug_assert!(self.num.is_eq(
            objective.coefficients[col1],
            objective.coefficients[col2] * scale
        ));

        let col1_lbinf = cflags[col1].test(ColFlags::LB_INF);
        let col1_ubinf = cflags[col1].test(ColFlags::UB_INF);
        let col2_lbinf = cflags[col2].test(ColFlags::LB_INF);
        let col2_ubinf = cflags[col2].test(ColFlags::UB_INF);

        self.postsolve.notify_parallel_cols(
            col1,
            cflags[col1].test(ColFlags::INTEGRAL),
            (!col1_lbinf).then_some(lbs[col1]),
            (!col1_ubinf).then_some(ubs[col1]),
            col2,
            cflags[col2].test(ColFlags::INTEGRAL),
            (!col2_lbinf).then_some(lbs[col2]),
            (!col2_ubinf).then_some(ubs[col2]),
            scale,
        );
        self.stats.ndeletedcols += 1;

        // compute the merged domain of col2
        let mut newlb = 0.0;
        let mut newub = 0.0;
        let mut newflags = ColFlags::default();
        newflags.set(ColFlags::LB_INF | ColFlags::UB_INF);

        if cflags[col1].test(ColFlags::INTEGRAL) {
            problem.num_integral_cols -= 1;
            newflags.set(ColFlags::INTEGRAL);
        } else if cflags[col2].test(ColFlags::INTEGRAL) {
            problem.num_integral_cols -= 1;
        } else {
            problem.num_continuous_cols -= 1;
        }

        if scale < 0.0 {
            if !col2_lbinf && !col1_ubinf {
                newlb = lbs[col2] + scale * ubs[col1];
                newflags.unset(ColFlags::LB_INF);
                if cflags[col1].test(ColFlags::UB_HUGE) || cflags[col2].test(ColFlags::LB_HUGE) {
                    newflags.set(ColFlags::LB_HUGE);
                }
            }
            if !col2_ubinf && !col1_lbinf {
                newub = ubs[col2] + scale * lbs[col1];
                newflags.unset(ColFlags::UB_INF);
                if cflags[col1].test(ColFlags::LB_HUGE) || cflags[col2].test(ColFlags::UB_HUGE) {
                    newflags.set(ColFlags::UB_HUGE);
                }
            }
        } else {
            if !col2_lbinf && !col1_lbinf {
                newlb = lbs[col2] + scale * lbs[col1];
                newflags.unset(ColFlags::LB_INF);
                if cflags[col1].test(ColFlags::LB_HUGE) || cflags[col2].test(ColFlags::LB_HUGE) {
                    newflags.set(ColFlags::LB_HUGE);
                }
            }
            if !col2_ubinf && !col1_ubinf {
                newub = ubs[col2] + scale * ubs[col1];
                newflags.unset(ColFlags::UB_INF);
                if cflags[col1].test(ColFlags::UB_HUGE) || cflags[col2].test(ColFlags::UB_HUGE) {
                    newflags.set(ColFlags::UB_HUGE);
                }
            }
        }

        let stats = &mut *self.stats;
        let changed_activities = &mut self.changed_activities;

        // Keep the activities exact for the merged domain. When the merged
        // bound is finite, col2's entry contribution with the new bound
        // equals the sum of both old contributions and nothing changes.
        // When it is infinite, the infinite contribution is inherited from
        // whichever column supplied it; the other column's finite
        // contribution must be removed.
        if newflags.test(ColFlags::LB_USELESS) {
            if !cflags[col2].test(ColFlags::LB_USELESS) {
                if lbs[col2] != 0.0 {
                    update_activities_after_boundchange(
                        matrix.col(col2),
                        BoundChange::Lower,
                        lbs[col2],
                        0.0,
                        false,
                        false,
                        activities,
                        |_, _, _| {},
                    );
                }
            } else if scale < 0.0 {
                if cflags[col1].test(ColFlags::UB_USELESS) || ubs[col1] != 0.0 {
                    update_activities_after_boundchange(
                        matrix.col(col1),
                        BoundChange::Upper,
                        ubs[col1],
                        0.0,
                        cflags[col1].test(ColFlags::UB_USELESS),
                        false,
                        activities,
                        |_, _, _| {},
                    );
                }
            } else if cflags[col1].test(ColFlags::LB_USELESS) || lbs[col1] != 0.0 {
                update_activities_after_boundchange(
                    matrix.col(col1),
                    BoundChange::Lower,
                    lbs[col1],
                    0.0,
                    cflags[col1].test(ColFlags::LB_USELESS),
                    false,
                    activities,
                    |_, _, _| {},
                );
            }
        }

        if newflags.test(ColFlags::UB_USELESS) {
            if !cflags[col2].test(ColFlags::UB_USELESS) {
                if ubs[col2] != 0.0 {
                    update_activities_after_boundchange(
                        matrix.col(col2),
                        BoundChange::Upper,
                        ubs[col2],
                        0.0,
                        false,
                        false,
                        activities,
                        |change, row, activity| {
                            update_activity(
                                change,
                                row,
                                activity,
                                matrix,
                                stats.nrounds,
                                changed_activities,
                            )
                        },
                    );
                }
            } else if scale < 0.0 {
                if cflags[col1].test(ColFlags::LB_USELESS) || lbs[col1] != 0.0 {
                    update_activities_after_boundchange(
                        matrix.col(col1),
                        BoundChange::Lower,
                        lbs[col1],
                        0.0,
                        cflags[col1].test(ColFlags::LB_USELESS),
                        false,
                        activities,
                        |_, _, _| {},
                    );
                }
            } else if cflags[col1].test(ColFlags::UB_USELESS) || ubs[col1] != 0.0 {
                update_activities_after_boundchange(
                    matrix.col(col1),
                    BoundChange::Upper,
                    ubs[col1],
                    0.0,
                    cflags[col1].test(ColFlags::UB_USELESS),
                    false,
                    activities,
                    |_, _, _| {},
                );
            }
        }

        // col1 is now treated as fixed to zero, but flagged substituted to
        // select the parallel-column postsolve path
        lbs[col1] = 0.0;
        ubs[col1] = 0.0;
        cflags[col1].unset(ColFlags::LB_USELESS | ColFlags::UB_USELESS);
        cflags[col1].set(ColFlags::SUBSTITUTED);
        self.deleted_cols.push(col1);

        lbs[col2] = newlb;
        ubs[col2] = newub;
        cflags[col2] = newflags;

        ApplyResult::Applied
    }

    /// Apply a `REPLACE` pair `x1 = factor · x2 + offset`.
    fn apply_replace_col(
        &mut self,
        col1: usize,
        factor: f64,
        col2: usize,
        offset: f64,
    ) -> ApplyResult {
        let cflags = &self.problem.cflags;

        // one variable fixed: fix the other through the relation
        if cflags[col1].test(ColFlags::FIXED) || cflags[col2].test(ColFlags::FIXED) {
            if !cflags[col1].test(ColFlags::INACTIVE) {
                debug_assert!(cflags[col2].test(ColFlags::FIXED));
                let val = factor * self.problem.lower_bounds[col2] + offset;
                if self.fix_col(col1, val) == PresolveStatus::Infeasible {
                    return ApplyResult::Infeasible;
                }
            } else if !cflags[col2].test(ColFlags::INACTIVE) {
                debug_assert!(cflags[col1].test(ColFlags::FIXED));
                let val = (self.problem.lower_bounds[col1] - offset) / factor;
                if self.fix_col(col2, val) == PresolveStatus::Infeasible {
                    return ApplyResult::Infeasible;
                }
            }
            return ApplyResult::Applied;
        }

        // a substituted variable invalidates the relation
        if cflags[col1].test(ColFlags::INACTIVE) || cflags[col2].test(ColFlags::INACTIVE) {
            return ApplyResult::Applied;
        }

        debug_assert!(self.problem.matrix.col_sizes()[col1] > 0);
        debug_assert!(self.problem.matrix.col_sizes()[col2] > 0);

        // propagate the bounds implied on col2 by col1's domain
        let cflags = &self.problem.cflags;
        let col1_lb = (!cflags[col1].test(ColFlags::LB_INF)).then_some(self.problem.lower_bounds[col1]);
        let col1_ub = (!cflags[col1].test(ColFlags::UB_INF)).then_some(self.problem.upper_bounds[col1]);

        let (imp_lb, imp_ub) = if factor > 0.0 {
            (
                col1_lb.map(|lb| (lb - offset) / factor),
                col1_ub.map(|ub| (ub - offset) / factor),
            )
        } else {
            (
                col1_ub.map(|ub| (ub - offset) / factor),
                col1_lb.map(|lb| (lb - offset) / factor),
            )
        };

        let col2_lbinf = cflags[col2].test(ColFlags::LB_INF);
        let col2_ubinf = cflags[col2].test(ColFlags::UB_INF);
        let lb_tightens = imp_lb.filter(|&v| col2_lbinf || v > self.problem.lower_bounds[col2]);
        let ub_tightens = imp_ub.filter(|&v| col2_ubinf || v < self.problem.upper_bounds[col2]);
        if let Some(imp_lb) = lb_tightens {
            if self.change_lb(col2, imp_lb) == PresolveStatus::Infeasible {
                return ApplyResult::Infeasible;
            }
        } else if let Some(imp_ub) = ub_tightens {
            if self.change_ub(col2, imp_ub) == PresolveStatus::Infeasible {
                return ApplyResult::Infeasible;
            }
        }

        // synthesize the equality x1 - factor * x2 = offset
        let mut eq_entries = [(col1, 1.0), (col2, -factor)];
        if col1 > col2 {
            eq_entries.swap(0, 1);
        }

        if !self.problem.matrix.check_aggregation_sparsity_condition(
            col1,
            &eq_entries,
            self.options.maxfillinpersubstitution,
            self.options.maxshiftperrow,
        ) {
            return ApplyResult::Applied;
        }

        let col_rows: Vec<usize> = self.problem.matrix.col(col1).iter().map(|&(r, _)| r).collect();
        let nrelevant = col_rows.len();

        self.problem.cflags[col1].set(ColFlags::SUBSTITUTED);
        self.problem.count_col_deleted(col1);

        for row in col_rows {
            self.set_row_state(row, StateFlags::MODIFIED);
        }

        self.postsolve.notify_substitution(col1, &eq_entries, offset);

        let live_rows = self.problem.matrix.aggregate(
            &self.num,
            col1,
            &eq_entries,
            offset,
            &mut self.singleton_rows,
            &mut self.singleton_columns,
            &mut self.empty_columns,
        );
        self.recompute_and_enqueue_activities(&live_rows);

        self.set_col_state(col1, StateFlags::MODIFIED);
        self.set_col_state(col2, StateFlags::MODIFIED);

        // rewrite the objective through the relation
        let obj = &mut self.problem.objective;
        if obj.coefficients[col1] != 0.0 {
            let col1_coef = obj.coefficients[col1];
            obj.coefficients[col2] += col1_coef * factor;
            if self.num.is_zero(obj.coefficients[col2]) {
                obj.coefficients[col2] = 0.0;
            }
            obj.offset += col1_coef * offset;
            obj.coefficients[col1] = 0.0;
        }

        if offset != 0.0 {
            self.stats.nsidechgs += 2 * nrelevant as u64;
        }
        self.stats.ncoefchgs += 2 * nrelevant as u64;
        self.stats.ndeletedcols += 1;

        ApplyResult::Applied
    }

    /// Apply a sparsify operation: cancel nonzeros in the candidate rows by
    /// adding multiples of the equality row.
    fn apply_sparsify(&mut self, eq_row: usize, candidates: &[(usize, f64)]) {
        let eq_len = self.problem.matrix.row_sizes()[eq_row].max(0) as u64;
        let eq_rhs = self.problem.matrix.rhs()[eq_row];

        let mut ncancel = 0i64;
        let mut ncancelled_rows = 0u64;

        for &(cand_row, scale) in candidates {
            debug_assert_ne!(cand_row, eq_row);

            let cancelled = self.problem.matrix.sparsify(
                &self.num,
                eq_row,
                scale,
                cand_row,
                &mut self.singleton_rows,
                &mut self.singleton_columns,
                &mut self.empty_columns,
            );

            if cancelled != 0 {
                self.set_row_state(cand_row, StateFlags::MODIFIED);
                ncancelled_rows += 1;
                ncancel += cancelled;

                self.recompute_and_enqueue_activities(&[cand_row]);

                if eq_rhs != 0.0 {
                    let rflags = self.problem.matrix.row_flags()[cand_row];
                    if !rflags.test(RowFlags::LHS_INF) {
                        self.stats.nsidechgs += 1;
                    }
                    if !rflags.test(RowFlags::RHS_INF) {
                        self.stats.nsidechgs += 1;
                    }
                }
            }
        }

        if ncancel != 0 {
            self.stats.ncoefchgs += eq_len * ncancelled_rows;

            let eq_cols: Vec<usize> = self.problem.matrix.row(eq_row).iter().map(|&(c, _)| c).collect();
            for col in eq_cols {
                self.set_col_state(col, StateFlags::MODIFIED);
            }
        }
    }
}
