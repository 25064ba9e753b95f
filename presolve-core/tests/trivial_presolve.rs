//! End-to-end scenarios for the one-shot trivial presolve.

use presolve_core::{
    ColFlags, Postsolve, PresolveOptions, PresolveStatus, Problem, ProblemUpdate, Statistics,
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
fn test_already_reduced_problem_is_left_alone() {
    // min x + y, x + y >= 1, 0 <= x, y <= 2: nothing to do
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(1.0)],
        &[None],
        vec![1.0, 1.0],
        &[Some(0.0), Some(0.0)],
        &[Some(2.0), Some(2.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    let mut update = setup.update();

    assert_eq!(update.trivial_presolve(), PresolveStatus::Unchanged);

    // repeated flushes stay consistent
    let first = update.flush();
    let second = update.flush();
    assert!(matches!(
        first,
        PresolveStatus::Reduced | PresolveStatus::Unchanged
    ));
    assert_eq!(first, second);

    drop(update);
    assert_eq!(setup.stats.ndeletedrows, 0);
    assert_eq!(setup.stats.ndeletedcols, 0);
    assert_eq!(setup.problem.objective().offset, 0.0);
}

#[test]
fn test_singleton_equation_fixes_column() {
    // min x, 2 x = 4, 0 <= x <= 10
    let mut tri = TriMat::new((1, 1));
    tri.add_triplet(0, 0, 2.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(4.0)],
        &[Some(4.0)],
        vec![1.0],
        &[Some(0.0)],
        &[Some(10.0)],
        &[false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    let mut update = setup.update();

    assert_eq!(update.trivial_presolve(), PresolveStatus::Reduced);

    let problem = update.problem();
    assert!(problem.col_flags()[0].test(ColFlags::FIXED));
    assert_eq!(problem.lower_bounds()[0], 2.0);
    assert_eq!(problem.upper_bounds()[0], 2.0);
    assert!(problem.matrix().is_row_redundant(0));

    update.clear_states();
    update.compress(true);

    // the reduced problem is empty; postsolve recovers x = 2
    assert_eq!(update.problem().ncols(), 0);
    let lifted = update.postsolve().undo(&[]);
    assert_eq!(lifted, vec![2.0]);

    drop(update);
    assert_eq!(setup.stats.ndeletedcols, 1);
    assert_eq!(setup.stats.ndeletedrows, 1);
    assert_eq!(setup.problem.objective().offset, 2.0);
}

#[test]
fn test_dual_fixing_unlocked_column() {
    // min x, 0 <= x <= 5, x appears with +1 only in rows bounded from
    // above: nothing blocks pushing x down, so it is fixed to 0
    let mut tri = TriMat::new((2, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    tri.add_triplet(1, 0, 1.0);
    tri.add_triplet(1, 1, -1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None, None],
        &[Some(4.0), Some(2.0)],
        vec![1.0, 0.0],
        &[Some(0.0), Some(-3.0)],
        &[Some(5.0), Some(3.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.options = PresolveOptions::default().with_dualreds(2);
    let mut update = setup.update();

    let status = update.trivial_presolve();
    assert_ne!(status, PresolveStatus::Infeasible);
    assert_ne!(status, PresolveStatus::UnbndOrInfeas);

    let problem = update.problem();
    assert!(problem.col_flags()[0].test(ColFlags::FIXED));
    assert_eq!(problem.upper_bounds()[0], 0.0);
    assert_eq!(problem.lower_bounds()[0], 0.0);
}

#[test]
fn test_dual_fixing_disabled() {
    let mut tri = TriMat::new((1, 1));
    tri.add_triplet(0, 0, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(4.0)],
        vec![1.0],
        &[Some(0.0)],
        &[Some(5.0)],
        &[false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.options = PresolveOptions::default().with_dualreds(0);
    let mut update = setup.update();

    update.trivial_presolve();
    assert!(!update.problem().col_flags()[0].test(ColFlags::FIXED));
}

#[test]
fn test_singleton_inequality_tightens_bounds() {
    // -2 <= 2 x <= 6 tightens x from [-10, 10] to [-1, 3]
    let mut tri = TriMat::new((1, 1));
    tri.add_triplet(0, 0, 2.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(-2.0)],
        &[Some(6.0)],
        vec![0.0],
        &[Some(-10.0)],
        &[Some(10.0)],
        &[false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.options = PresolveOptions::default().with_dualreds(0);
    let mut update = setup.update();

    assert_eq!(update.trivial_presolve(), PresolveStatus::Reduced);

    let problem = update.problem();
    assert_eq!(problem.lower_bounds()[0], -1.0);
    assert_eq!(problem.upper_bounds()[0], 3.0);
    assert!(problem.matrix().is_row_redundant(0));
}

#[test]
fn test_infeasible_singleton_equation() {
    // 0 <= x <= 1 but 2 x = 4 requires x = 2
    let mut tri = TriMat::new((1, 1));
    tri.add_triplet(0, 0, 2.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(4.0)],
        &[Some(4.0)],
        vec![1.0],
        &[Some(0.0)],
        &[Some(1.0)],
        &[false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    let mut update = setup.update();

    assert_eq!(update.trivial_presolve(), PresolveStatus::Infeasible);
}

#[test]
fn test_redundant_row_is_removed() {
    // x + y <= 10 can never be violated for x, y in [0, 2]
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[None],
        &[Some(10.0)],
        vec![1.0, 1.0],
        &[Some(0.0), Some(0.0)],
        &[Some(2.0), Some(2.0)],
        &[false, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.options = PresolveOptions::default().with_dualreds(0);
    let mut update = setup.update();

    assert_eq!(update.trivial_presolve(), PresolveStatus::Reduced);
    assert!(update.problem().matrix().is_row_redundant(0));

    drop(update);
    assert_eq!(setup.stats.ndeletedrows, 1);
}

#[test]
fn test_integral_bounds_are_rounded() {
    let mut tri = TriMat::new((1, 2));
    tri.add_triplet(0, 0, 1.0);
    tri.add_triplet(0, 1, 1.0);
    let problem = Problem::new(
        &tri.to_csc(),
        &[Some(1.0)],
        &[None],
        vec![1.0, 1.0],
        &[Some(0.4), Some(0.0)],
        &[Some(3.7), Some(2.0)],
        &[true, false],
    )
    .unwrap();

    let mut setup = Setup::new(problem);
    setup.options = PresolveOptions::default().with_dualreds(0);
    let mut update = setup.update();

    assert_eq!(update.trivial_presolve(), PresolveStatus::Reduced);

    let problem = update.problem();
    assert_eq!(problem.lower_bounds()[0], 1.0);
    assert_eq!(problem.upper_bounds()[0], 3.0);

    drop(update);
    assert_eq!(setup.stats.nboundchgs, 2);
}
