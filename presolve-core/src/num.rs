//! Feasibility-tolerant numeric predicates.
//!
//! All comparisons that involve data coming from floating-point computations
//! go through this helper so the tolerances are applied consistently. Exact
//! `==` comparisons are reserved for values that are synthesized to be exact
//! (e.g. a bound that was just assigned).

/// Numeric helper bundling the feasibility tolerance, the zero tolerance and
/// the huge-value threshold.
#[derive(Debug, Clone, Copy)]
pub struct Num {
    feastol: f64,
    epsilon: f64,
    hugeval: f64,
}

impl Default for Num {
    fn default() -> Self {
        Self {
            feastol: 1e-6,
            epsilon: 1e-9,
            hugeval: 1e8,
        }
    }
}

impl Num {
    /// Create a helper with explicit tolerances.
    pub fn new(feastol: f64, epsilon: f64, hugeval: f64) -> Self {
        Self {
            feastol,
            epsilon,
            hugeval,
        }
    }

    /// The feasibility tolerance.
    pub fn feas_tol(&self) -> f64 {
        self.feastol
    }

    /// `a < b` by more than the feasibility tolerance.
    pub fn is_feas_lt(&self, a: f64, b: f64) -> bool {
        b - a > self.feastol
    }

    /// `a > b` by more than the feasibility tolerance.
    pub fn is_feas_gt(&self, a: f64, b: f64) -> bool {
        a - b > self.feastol
    }

    /// `a <= b` within the feasibility tolerance.
    pub fn is_feas_le(&self, a: f64, b: f64) -> bool {
        !self.is_feas_gt(a, b)
    }

    /// `a >= b` within the feasibility tolerance.
    pub fn is_feas_ge(&self, a: f64, b: f64) -> bool {
        !self.is_feas_lt(a, b)
    }

    /// `a == b` within the feasibility tolerance.
    pub fn is_feas_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.feastol
    }

    /// `a == b` within the zero tolerance.
    pub fn is_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.epsilon
    }

    /// `v == 0` within the zero tolerance.
    pub fn is_zero(&self, v: f64) -> bool {
        v.abs() <= self.epsilon
    }

    /// Whether `v` is integral within the feasibility tolerance.
    pub fn is_feas_integral(&self, v: f64) -> bool {
        (v - v.round()).abs() <= self.feastol
    }

    /// Smallest integer not feasibly below `v`.
    pub fn feas_ceil(&self, v: f64) -> f64 {
        (v - self.feastol).ceil()
    }

    /// Largest integer not feasibly above `v`.
    pub fn feas_floor(&self, v: f64) -> f64 {
        (v + self.feastol).floor()
    }

    /// Whether `v` is finite but too large to be added to an activity.
    pub fn is_huge(&self, v: f64) -> bool {
        v.abs() >= self.hugeval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feas_comparisons() {
        let num = Num::default();

        assert!(num.is_feas_lt(0.0, 1.0));
        assert!(!num.is_feas_lt(1.0 - 1e-9, 1.0));
        assert!(num.is_feas_gt(1.0, 0.0));
        assert!(num.is_feas_eq(1.0, 1.0 + 1e-9));
        assert!(!num.is_feas_eq(1.0, 1.0 + 1e-3));
    }

    #[test]
    fn test_feas_rounding() {
        let num = Num::default();

        assert_eq!(num.feas_ceil(1.5), 2.0);
        assert_eq!(num.feas_ceil(2.0 - 1e-9), 2.0);
        assert_eq!(num.feas_floor(1.5), 1.0);
        assert_eq!(num.feas_floor(1.0 + 1e-9), 1.0);
        assert!(num.is_feas_integral(3.0 + 1e-8));
        assert!(!num.is_feas_integral(3.5));
    }

    #[test]
    fn test_huge() {
        let num = Num::default();

        assert!(num.is_huge(1e9));
        assert!(num.is_huge(-1e9));
        assert!(!num.is_huge(1e5));
    }
}
