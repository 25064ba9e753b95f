//! Presolve core: the problem-update engine of a parallel presolver for
//! mixed-integer and linear optimization problems.
//!
//! Presolve methods run in parallel against an immutable snapshot of the
//! problem and propose *reductions* — bound changes, fixings, side changes,
//! substitutions, coefficient rewrites. This crate provides the stateful
//! core that consumes those reductions:
//!
//! - **Conflict detection**: reductions arrive in transactions; per-row and
//!   per-column state flags form an optimistic concurrency layer that
//!   rejects a transaction whose dependencies were invalidated by an
//!   earlier one in the same round.
//! - **Atomic application**: accepted transactions are applied through
//!   mutators that keep row activities, locks, nonzero counts and the
//!   equation/redundancy flags consistent with every primary change.
//! - **Postsolve trail**: every transformation is appended to a trail that,
//!   replayed in reverse, lifts a solution of the reduced problem back to a
//!   feasible solution of the original with equal objective value.
//! - **Flush and compress**: between rounds, buffered coefficient changes
//!   are materialized in one batched rewrite, deleted rows and columns are
//!   unlinked, and the storage is periodically renumbered with all index
//!   holders notified of the mapping.
//!
//! The individual presolver algorithms, the driver loop that schedules
//! them, and file I/O live outside this crate.
//!
//! # Example
//!
//! ```
//! use presolve_core::{
//!     Postsolve, PresolveOptions, PresolveStatus, Problem, ProblemUpdate, Statistics,
//! };
//! use sprs::TriMat;
//!
//! // min x  s.t.  2 x = 4,  0 <= x <= 10
//! let mut tri = TriMat::new((1, 1));
//! tri.add_triplet(0, 0, 2.0);
//! let mut problem = Problem::new(
//!     &tri.to_csc(),
//!     &[Some(4.0)],
//!     &[Some(4.0)],
//!     vec![1.0],
//!     &[Some(0.0)],
//!     &[Some(10.0)],
//!     &[false],
//! )
//! .unwrap();
//!
//! let mut postsolve = Postsolve::new(1, 1);
//! let mut stats = Statistics::default();
//! let options = PresolveOptions::default();
//! let mut update = ProblemUpdate::new(&mut problem, &mut postsolve, &mut stats, &options);
//!
//! assert_eq!(update.trivial_presolve(), PresolveStatus::Reduced);
//! drop(update);
//!
//! // x was fixed to 2 and the row removed
//! assert_eq!(stats.ndeletedcols, 1);
//! assert_eq!(stats.ndeletedrows, 1);
//! assert_eq!(problem.objective().offset, 2.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activity;
pub mod flags;
pub mod matrix;
pub mod num;
pub mod options;
pub mod postsolve;
pub mod problem;
pub mod reductions;
pub mod update;

pub use activity::{ActivityChange, BoundChange, RowActivity, RowStatus};
pub use flags::{ColFlags, RowFlags};
pub use matrix::{ConstraintMatrix, MatrixBuffer};
pub use num::Num;
pub use options::{PresolveOptions, Statistics};
pub use postsolve::Postsolve;
pub use problem::{Locks, Objective, Problem, ProblemError};
pub use reductions::{ColReduction, Reduction, Reductions, RowReduction, TransactionRange};
pub use update::{ApplyResult, CompressObserver, ConflictType, PresolveStatus, ProblemUpdate};
