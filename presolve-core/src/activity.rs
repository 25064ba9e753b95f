//! Row activity tracking.
//!
//! The activity of a row is the interval of attainable left-hand-side values
//! given the current column bounds. It is maintained incrementally: every
//! bound or coefficient change adjusts the finite sums and the counters of
//! infinite contributions instead of recomputing the row from scratch.

use crate::flags::{ColFlags, RowFlags};
use crate::num::Num;

/// Which end of a row activity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityChange {
    /// The minimal activity moved.
    Min,
    /// The maximal activity moved.
    Max,
}

/// Which column bound changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundChange {
    /// The lower bound changed.
    Lower,
    /// The upper bound changed.
    Upper,
}

/// Verdict of testing a row's activity against its sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Neither side can be decided from the activity bounds.
    Unknown,
    /// Both sides are satisfied by every point within the column bounds.
    Redundant,
    /// The left-hand side is always satisfied.
    RedundantLhs,
    /// The right-hand side is always satisfied.
    RedundantRhs,
    /// The activity bounds prove the row cannot be satisfied.
    Infeasible,
}

/// Activity bounds of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowActivity {
    /// Sum of the finite minimal contributions.
    pub min: f64,
    /// Sum of the finite maximal contributions.
    pub max: f64,
    /// Number of infinite contributions to the minimal activity.
    pub ninfmin: usize,
    /// Number of infinite contributions to the maximal activity.
    pub ninfmax: usize,
    /// Round in which the row was last enqueued for re-evaluation.
    pub last_change: i64,
}

impl Default for RowActivity {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            ninfmin: 0,
            ninfmax: 0,
            last_change: -1,
        }
    }
}

impl RowActivity {
    /// Test this activity against the row sides.
    pub fn check_status(&self, num: &Num, rflags: RowFlags, lhs: f64, rhs: f64) -> RowStatus {
        if !rflags.test(RowFlags::RHS_INF) && self.ninfmin == 0 && num.is_feas_gt(self.min, rhs) {
            return RowStatus::Infeasible;
        }

        if !rflags.test(RowFlags::LHS_INF) && self.ninfmax == 0 && num.is_feas_lt(self.max, lhs) {
            return RowStatus::Infeasible;
        }

        // a side is proven redundant when it is finite but can never be
        // violated; an infinite side imposes nothing to begin with
        let lhs_proven = !rflags.test(RowFlags::LHS_INF)
            && self.ninfmin == 0
            && num.is_feas_ge(self.min, lhs);
        let rhs_proven = !rflags.test(RowFlags::RHS_INF)
            && self.ninfmax == 0
            && num.is_feas_le(self.max, rhs);
        let lhs_slack = rflags.test(RowFlags::LHS_INF) || lhs_proven;
        let rhs_slack = rflags.test(RowFlags::RHS_INF) || rhs_proven;

        if lhs_slack && rhs_slack {
            RowStatus::Redundant
        } else if lhs_proven {
            RowStatus::RedundantLhs
        } else if rhs_proven {
            RowStatus::RedundantRhs
        } else {
            RowStatus::Unknown
        }
    }
}

/// Compute a row's activity from scratch.
///
/// `entries` are the `(column, coefficient)` pairs of the row.
pub fn compute_row_activity(
    entries: &[(usize, f64)],
    lbs: &[f64],
    ubs: &[f64],
    cflags: &[ColFlags],
) -> RowActivity {
    let mut activity = RowActivity::default();

    for &(col, val) in entries {
        let lb_useless = cflags[col].test(ColFlags::LB_USELESS);
        let ub_useless = cflags[col].test(ColFlags::UB_USELESS);

        if val > 0.0 {
            if lb_useless {
                activity.ninfmin += 1;
            } else {
                activity.min += val * lbs[col];
            }
            if ub_useless {
                activity.ninfmax += 1;
            } else {
                activity.max += val * ubs[col];
            }
        } else {
            if ub_useless {
                activity.ninfmin += 1;
            } else {
                activity.min += val * ubs[col];
            }
            if lb_useless {
                activity.ninfmax += 1;
            } else {
                activity.max += val * lbs[col];
            }
        }
    }

    activity
}

/// Incrementally update row activities after a column bound change.
///
/// `entries` are the `(row, coefficient)` pairs of the column. The four
/// transitions are handled explicitly: finite to finite adjusts by the
/// difference, infinite to finite trades a counter for a finite term, finite
/// to infinite trades the finite term back for a counter, and infinite to
/// infinite is a no-op on the sums. The callback is invoked for every row
/// whose activity was touched.
pub fn update_activities_after_boundchange<F>(
    entries: &[(usize, f64)],
    side: BoundChange,
    oldbound: f64,
    newbound: f64,
    old_useless: bool,
    new_useless: bool,
    activities: &mut [RowActivity],
    mut update: F,
) where
    F: FnMut(ActivityChange, usize, &mut RowActivity),
{
    for &(row, val) in entries {
        let activity = &mut activities[row];

        // a lower bound with a positive coefficient (or an upper bound with a
        // negative one) contributes to the minimal activity
        let affects_min = match side {
            BoundChange::Lower => val > 0.0,
            BoundChange::Upper => val < 0.0,
        };

        match (old_useless, new_useless) {
            (false, false) => {
                if affects_min {
                    activity.min += val * (newbound - oldbound);
                } else {
                    activity.max += val * (newbound - oldbound);
                }
            }
            (true, false) => {
                if affects_min {
                    activity.ninfmin -= 1;
                    activity.min += val * newbound;
                } else {
                    activity.ninfmax -= 1;
                    activity.max += val * newbound;
                }
            }
            (false, true) => {
                if affects_min {
                    activity.ninfmin += 1;
                    activity.min -= val * oldbound;
                } else {
                    activity.ninfmax += 1;
                    activity.max -= val * oldbound;
                }
            }
            (true, true) => continue,
        }

        let change = if affects_min {
            ActivityChange::Min
        } else {
            ActivityChange::Max
        };
        update(change, row, activity);
    }
}

/// Incrementally update one row's activity after a coefficient change.
///
/// The old coefficient's contribution is removed and the new coefficient's
/// contribution added, keeping the infinity counters consistent with the
/// column's bound flags.
pub fn update_activity_after_coeffchange<F>(
    lb: f64,
    ub: f64,
    cflags: ColFlags,
    oldval: f64,
    newval: f64,
    row: usize,
    activity: &mut RowActivity,
    mut update: F,
) where
    F: FnMut(ActivityChange, usize, &mut RowActivity),
{
    if oldval == newval {
        return;
    }

    let lb_useless = cflags.test(ColFlags::LB_USELESS);
    let ub_useless = cflags.test(ColFlags::UB_USELESS);

    // remove the old contribution
    if oldval != 0.0 {
        if oldval > 0.0 {
            if lb_useless {
                activity.ninfmin -= 1;
            } else {
                activity.min -= oldval * lb;
            }
            if ub_useless {
                activity.ninfmax -= 1;
            } else {
                activity.max -= oldval * ub;
            }
        } else {
            if ub_useless {
                activity.ninfmin -= 1;
            } else {
                activity.min -= oldval * ub;
            }
            if lb_useless {
                activity.ninfmax -= 1;
            } else {
                activity.max -= oldval * lb;
            }
        }
    }

    // add the new contribution
    if newval != 0.0 {
        if newval > 0.0 {
            if lb_useless {
                activity.ninfmin += 1;
            } else {
                activity.min += newval * lb;
            }
            if ub_useless {
                activity.ninfmax += 1;
            } else {
                activity.max += newval * ub;
            }
        } else {
            if ub_useless {
                activity.ninfmin += 1;
            } else {
                activity.min += newval * ub;
            }
            if lb_useless {
                activity.ninfmax += 1;
            } else {
                activity.max += newval * lb;
            }
        }
    }

    update(ActivityChange::Min, row, activity);
    update(ActivityChange::Max, row, activity);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_flags() -> ColFlags {
        ColFlags::LB_INF | ColFlags::UB_INF
    }

    #[test]
    fn test_compute_row_activity() {
        // 2 x0 - 3 x1, x0 in [0, 1], x1 in [1, 2]
        let lbs = vec![0.0, 1.0];
        let ubs = vec![1.0, 2.0];
        let cflags = vec![ColFlags::default(), ColFlags::default()];
        let entries = vec![(0, 2.0), (1, -3.0)];

        let activity = compute_row_activity(&entries, &lbs, &ubs, &cflags);
        assert_eq!(activity.min, -6.0);
        assert_eq!(activity.max, -1.0);
        assert_eq!(activity.ninfmin, 0);
        assert_eq!(activity.ninfmax, 0);
    }

    #[test]
    fn test_compute_row_activity_infinite() {
        // x0 free, coefficient 1: both ends infinite
        let lbs = vec![0.0];
        let ubs = vec![0.0];
        let cflags = vec![free_flags()];
        let entries = vec![(0, 1.0)];

        let activity = compute_row_activity(&entries, &lbs, &ubs, &cflags);
        assert_eq!(activity.ninfmin, 1);
        assert_eq!(activity.ninfmax, 1);
        assert_eq!(activity.min, 0.0);
        assert_eq!(activity.max, 0.0);
    }

    #[test]
    fn test_boundchange_finite_to_finite() {
        let mut activities = vec![RowActivity {
            min: 0.0,
            max: 2.0,
            ..RowActivity::default()
        }];
        let entries = vec![(0usize, 2.0)];

        let mut touched = Vec::new();
        update_activities_after_boundchange(
            &entries,
            BoundChange::Lower,
            0.0,
            1.0,
            false,
            false,
            &mut activities,
            |change, row, _| touched.push((change, row)),
        );

        assert_eq!(activities[0].min, 2.0);
        assert_eq!(activities[0].max, 2.0);
        assert_eq!(touched, vec![(ActivityChange::Min, 0)]);
    }

    #[test]
    fn test_boundchange_infinite_to_finite() {
        let mut activities = vec![RowActivity {
            ninfmax: 1,
            ..RowActivity::default()
        }];
        // negative coefficient: the lower bound feeds the maximal activity
        let entries = vec![(0usize, -1.0)];

        update_activities_after_boundchange(
            &entries,
            BoundChange::Lower,
            0.0,
            3.0,
            true,
            false,
            &mut activities,
            |_, _, _| {},
        );

        assert_eq!(activities[0].ninfmax, 0);
        assert_eq!(activities[0].max, -3.0);
    }

    #[test]
    fn test_coeffchange() {
        // x in [1, 2], coefficient 1 -> 4
        let mut activity = RowActivity {
            min: 1.0,
            max: 2.0,
            ..RowActivity::default()
        };

        update_activity_after_coeffchange(
            1.0,
            2.0,
            ColFlags::default(),
            1.0,
            4.0,
            0,
            &mut activity,
            |_, _, _| {},
        );

        assert_eq!(activity.min, 4.0);
        assert_eq!(activity.max, 8.0);
    }

    #[test]
    fn test_check_status_redundant() {
        let num = Num::default();
        let activity = RowActivity {
            min: 1.0,
            max: 2.0,
            ..RowActivity::default()
        };

        // 0 <= ax <= 3 always holds
        let st = activity.check_status(&num, RowFlags::default(), 0.0, 3.0);
        assert_eq!(st, RowStatus::Redundant);

        // ax >= 1.5 cannot be decided
        let st = activity.check_status(&num, RowFlags::RHS_INF, 1.5, 0.0);
        assert_eq!(st, RowStatus::Unknown);

        // ax <= 0.5 is violated by the minimal activity
        let st = activity.check_status(&num, RowFlags::LHS_INF, 0.0, 0.5);
        assert_eq!(st, RowStatus::Infeasible);
    }
}
