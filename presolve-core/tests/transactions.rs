//! Transaction application scenarios: conflicts, postponement, parallel
//! columns, replacements, side changes and sparsification.

use presolve_core::{
    ApplyResult, ColFlags, Postsolve, PresolveOptions, PresolveStatus, Problem, ProblemUpdate,
    Reductions, RowFlags, Statistics,
};
use sprs::TriMat;

struct Setup {
    problem: Problem,
    postsolve: Postsolve,
    stats: Statistics,
    options: PresolveOptions,
}

impl Setup {
    fn new(problem: Problem) -> Self {
        let nrows = problem.nrows();
        let ncols = problem.ncols();
        Self {
            problem,
            postsolve: Postsolve::new(nrows, ncols),
            stats: Statistics::default(),
            options: PresolveOptions::default(),
        }
    }

    fn update(&mut self) -> ProblemUpdate<'_> {
        ProblemUpdate::new(
            &mut self.problem,
            &mut self.postsolve,
            &mut self.stats,
            &self.options,
        )
    }
}

#[test]
fn test_parallel_columns_merge_and_split() {
    // min x + y, x + y <= 3, 0 <= x, y <= 2; the columns are parallel with
    // scale 1 and merge into one column with domain [0, 4]
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(3.0)],
        vec![1.0, 1.0],
        &[Some(0.0), Some(0.0)],
        &[Some(2.0), Some(2.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.parallel_cols(0, 1);
    reductions.end_transaction();

    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );

    let problem = update.problem();
    assert!(problem.col_flags()[0].test(ColFlags::SUBSTITUTED));
    assert_eq!(problem.lower_bounds()[1], 0.0);
    assert_eq!(problem.upper_bounds()[1], 4.0);
    // the merged contribution is unchanged
    assert_eq!(problem.activities()[0].min, 0.0);
    assert_eq!(problem.activities()[0].max, 4.0);

    assert_eq!(update.flush(), PresolveStatus::Reduced);
    update.clear_states();
    update.compress(true);

    assert_eq!(update.problem().ncols(), 1);

    // a fractional merged value splits into feasible components
    let lifted = update.postsolve().undo(&[2.5]);
    assert!((0.0..=2.0).contains(&lifted[0]));
    assert!((0.0..=2.0).contains(&lifted[1]));
    assert!((lifted[0] + lifted[1] - 2.5).abs() < 1e-9);
}

#[test]
fn test_parallel_columns_rejected_for_inactive_column() {
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(3.0)],
        vec![0.0, 0.0],
        &[Some(0.0), Some(0.0)],
        &[Some(2.0), Some(2.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    assert_eq!(update.fix_col(0, 1.0), PresolveStatus::Reduced);

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.parallel_cols(0, 1);
    reductions.end_transaction();

    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Rejected
    );
}

#[test]
fn test_replace_col_substitutes_through_relation() {
    // x0 = x1 (factor 1, offset 0), both in a shared row and x0 in one more
    let mut tri = TriMat::new((2, 3));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 2.0);
    tri.add_triplet(1, 0, 1.0);
    tri.add_triplet(1, 2, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None, None],
        &[Some(6.0), Some(4.0)],
        vec![1.0, 1.0, 0.0],
        &[Some(0.0), Some(0.0), Some(0.0)],
        &[Some(5.0), Some(3.0), Some(5.0)],
        &[false, false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();
    update.set_postpone_substitutions(false);

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.replace_col(0, 1.0, 1, 0.0);
    reductions.end_transaction();

    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );

    let problem = update.problem();
    assert!(problem.col_flags()[0].test(ColFlags::SUBSTITUTED));
    // x0's bounds imply 0 <= x1 <= 3 (already true); row 0 becomes 3 x1 <= 6,
    // row 1 becomes x1 + x2 <= 4
    assert_eq!(problem.matrix().coefficient(0, 0), 0.0);
    assert_eq!(problem.matrix().coefficient(0, 1), 3.0);
    assert_eq!(problem.matrix().coefficient(1, 1), 1.0);
    assert_eq!(problem.matrix().coefficient(1, 2), 1.0);
    // the objective of x0 moved onto x1
    assert_eq!(problem.objective().coefficients[1], 2.0);

    // a reduced solution maps back through x0 = x1
    assert_eq!(update.flush(), PresolveStatus::Reduced);
    update.clear_states();
    update.compress(true);
    let lifted = update.postsolve().undo(&[1.5, 2.0]);
    assert_eq!(lifted[0], 1.5);
    assert_eq!(lifted[1], 1.5);
    assert_eq!(lifted[2], 2.0);
}

#[test]
fn test_replace_col_with_fixed_partner() {
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(6.0)],
        vec![1.0, 1.0],
        &[Some(0.0), Some(0.0)],
        &[Some(5.0), Some(5.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();
    update.set_postpone_substitutions(false);

    assert_eq!(update.fix_col(1, 2.0), PresolveStatus::Reduced);

    // x0 = 2 x1 + 1 with x1 fixed to 2 fixes x0 to 5
    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.replace_col(0, 2.0, 1, 1.0);
    reductions.end_transaction();

    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );
    let problem = update.problem();
    assert!(problem.col_flags()[0].test(ColFlags::FIXED));
    assert_eq!(problem.lower_bounds()[0], 5.0);
}

#[test]
fn test_row_side_ops_maintain_equation_flag() {
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(1.0)],
        &[Some(4.0)],
        vec![0.0, 0.0],
        &[Some(0.0), Some(0.0)],
        &[Some(5.0), Some(5.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    // raising the lhs to the rhs turns the row into an equation
    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.change_row_lhs(0, 4.0);
    reductions.end_transaction();
    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );
    assert!(update.problem().matrix().row_flags()[0].test(RowFlags::EQUATION));

    update.clear_states();

    // dropping the rhs clears it again
    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.change_row_rhs_inf(0);
    reductions.end_transaction();
    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );
    let rflags = update.problem().matrix().row_flags()[0];
    assert!(rflags.test(RowFlags::RHS_INF));
    assert!(!rflags.test(RowFlags::EQUATION));

    drop(update);
    assert_eq!(setup.stats.nsidechgs, 2);
}

#[test]
fn test_redundant_row_op() {
    let mut tri = TriMat::new((1, 1));
    tri.add_triplet(0, 0, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(0.0)],
        &[Some(4.0)],
        vec![0.0],
        &[Some(0.0)],
        &[Some(5.0)],
        &[false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.mark_row_redundant(0);
    reductions.end_transaction();

    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );
    assert!(update.problem().matrix().is_row_redundant(0));

    drop(update);
    assert_eq!(setup.stats.ndeletedrows, 1);
}

#[test]
fn test_impl_int_rounds_bounds() {
    let mut tri = TriMat::new((1, 1));
    tri.add_triplet(0, 0, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(10.0)],
        vec![1.0],
        &[Some(0.5)],
        &[Some(3.5)],
        &[false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.impl_int(0);
    reductions.end_transaction();

    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );

    let problem = update.problem();
    assert!(problem.col_flags()[0].test(ColFlags::IMPL_INT));
    assert_eq!(problem.lower_bounds()[0], 1.0);
    assert_eq!(problem.upper_bounds()[0], 3.0);
}

#[test]
fn test_objective_op_respects_locks() {
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(3.0)],
        vec![1.0, 1.0],
        &[Some(0.0), Some(0.0)],
        &[Some(2.0), Some(2.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.lock_col_strong(0);
    reductions.change_matrix_entry(0, 0, 2.0);
    let first = reductions.end_transaction();

    reductions.begin_transaction();
    reductions.change_obj_coeff(0, 7.0);
    let second = reductions.end_transaction();

    let records = reductions.reductions();
    assert_eq!(
        update.apply_transaction(&records[first.start..first.end]),
        ApplyResult::Applied
    );
    // the objective change touches a locked column
    assert_eq!(
        update.apply_transaction(&records[second.start..second.end]),
        ApplyResult::Rejected
    );
    assert_eq!(update.problem().objective().coefficients[0], 1.0);

    update.clear_states();
    assert_eq!(
        update.apply_transaction(&records[second.start..second.end]),
        ApplyResult::Applied
    );
    assert_eq!(update.problem().objective().coefficients[0], 7.0);
}

#[test]
fn test_sparsify_cancels_against_equation() {
    // eq row: x0 + x1 = 2; cand row: x0 + x1 + x2 <= 5
    let mut tri = TriMat::new((2, 3));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    tri.add_triplet(1, 0, 1.0);
    tri.add_triplet(1, 1, 1.0);
    tri.add_triplet(1, 2, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(2.0), None],
        &[Some(2.0), Some(5.0)],
        vec![0.0, 0.0, 0.0],
        &[Some(0.0), Some(0.0), Some(0.0)],
        &[Some(4.0), Some(4.0), Some(4.0)],
        &[false, false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.sparsify(0, &[(1, -1.0)]);
    reductions.end_transaction();

    // sparsify is postponed like substitutions
    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Postponed
    );

    update.set_postpone_substitutions(false);
    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );

    let problem = update.problem();
    assert_eq!(problem.matrix().row_sizes()[1], 1);
    assert_eq!(problem.matrix().coefficient(1, 0), 0.0);
    assert_eq!(problem.matrix().coefficient(1, 1), 0.0);
    assert_eq!(problem.matrix().coefficient(1, 2), 1.0);
    assert_eq!(problem.matrix().rhs()[1], 3.0);

    drop(update);
    assert!(setup.stats.ncoefchgs > 0);
}

#[test]
fn test_fix_col_infinity_leaves_activities_alone() {
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(1.0)],
        &[None],
        vec![0.0, 1.0],
        &[Some(0.0), Some(0.0)],
        &[None, Some(2.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.problem.recompute_all_activities();
    let mut update = setup.update();

    // the row is satisfiable by pushing x0 up; mark it redundant and fix
    // x0 at plus infinity
    update.mark_row_redundant(0);

    let mut reductions = Reductions::new();
    reductions.begin_transaction();
    reductions.fix_col_infinity(0, 1.0);
    reductions.end_transaction();

    let before = update.problem().activities()[0];
    assert_eq!(
        update.apply_transaction(reductions.reductions()),
        ApplyResult::Applied
    );
    let after = update.problem().activities()[0];

    assert!(update.problem().col_flags()[0].test(ColFlags::FIXED));
    assert_eq!(before.ninfmax, after.ninfmax);
    assert_eq!(before.max, after.max);

    // postsolve picks a finite value beyond the recorded bound; the empty
    // column left behind is fixed as well, so the reduced problem is empty
    assert_eq!(update.flush(), PresolveStatus::Reduced);
    update.clear_states();
    update.compress(true);
    assert_eq!(update.problem().ncols(), 0);

    let lifted = update.postsolve().undo(&[]);
    assert!(lifted[0] >= 0.0);
    // the recorded row requires x0 + x1 >= 1
    assert!(lifted[0] + lifted[1] >= 1.0 - 1e-9);
}
