//! Configuration settings for the presolve core.

/// Presolve options.
///
/// Passed explicitly to the update core; there is no global configuration
/// state.
#[derive(Debug, Clone)]
pub struct PresolveOptions {
    /// Seed for the deterministic row/column tie-breaking permutations.
    pub randomseed: u64,

    /// Strength of dual reductions: 0 = off, 1 = only for columns with a
    /// nonzero objective coefficient, 2 = always.
    pub dualreds: u8,

    /// Compress the problem storage when the fraction of live rows or columns
    /// drops below this value (0 disables compression).
    pub compressfac: f64,

    /// Coefficients with smaller absolute value are dropped outright.
    pub minabscoeff: f64,

    /// Feasibility tolerance for bound and side comparisons.
    pub feastol: f64,

    /// Zero tolerance for exact cancellation checks.
    pub epsilon: f64,

    /// Finite values at or above this magnitude are treated as infinite for
    /// activity purposes.
    pub hugeval: f64,

    /// Maximum net fill-in a single substitution may create.
    pub maxfillinpersubstitution: i64,

    /// Maximum number of entries a substitution may add to any single row.
    pub maxshiftperrow: i64,
}

impl Default for PresolveOptions {
    fn default() -> Self {
        Self {
            randomseed: 0,
            dualreds: 2,
            compressfac: 0.85,
            minabscoeff: 1e-10,
            feastol: 1e-6,
            epsilon: 1e-9,
            hugeval: 1e8,
            maxfillinpersubstitution: 10,
            maxshiftperrow: 10,
        }
    }
}

impl PresolveOptions {
    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.randomseed = seed;
        self
    }

    /// Set the dual reduction strength (0, 1 or 2).
    pub fn with_dualreds(mut self, dualreds: u8) -> Self {
        assert!(dualreds <= 2);
        self.dualreds = dualreds;
        self
    }

    /// Set the compression threshold.
    pub fn with_compressfac(mut self, compressfac: f64) -> Self {
        assert!((0.0..=1.0).contains(&compressfac));
        self.compressfac = compressfac;
        self
    }

    /// Set the substitution fill-in budget.
    pub fn with_max_fillin(mut self, maxfillin: i64) -> Self {
        self.maxfillinpersubstitution = maxfillin;
        self
    }
}

/// Counters for the reductions performed so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    /// Number of bound changes.
    pub nboundchgs: u64,

    /// Number of matrix coefficient changes.
    pub ncoefchgs: u64,

    /// Number of row side changes.
    pub nsidechgs: u64,

    /// Number of deleted columns.
    pub ndeletedcols: usize,

    /// Number of deleted rows.
    pub ndeletedrows: usize,

    /// Current presolve round.
    pub nrounds: i64,
}
