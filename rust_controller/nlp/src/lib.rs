//! Nonlinear programming interface used by the controller.
//!
//! Problems are posed as
//!
//! ```text
//! minimise    sum_k r_k(x)^2
//! subject to  g_l <= g(x) <= g_u
//!             x_l <= x    <= x_u
//! ```
//!
//! where the residuals `r` and constraints `g` are evaluated by an [`NlpProblem`] over a generic
//! [`Scalar`] so derivatives can be taken with dual numbers.
#![allow(non_snake_case)]

#[macro_use]
extern crate log;

use prelude::*;
use std::time::Duration;

pub mod derivatives;

mod sqp;
pub use sqp::SqpSolver;

pub trait NlpProblem {
    fn n_vars(&self) -> usize;

    fn n_constraints(&self) -> usize;

    /// Number of least squares residuals making up the objective.
    fn n_residuals(&self) -> usize;

    /// Writes the objective residuals and the constraint values for `vars`.
    ///
    /// Must be a pure function of `vars`: the solver calls it many times per solve.
    fn eval<T: Scalar>(&self, vars: &[T], residuals: &mut [T], constraints: &mut [T]);

    fn objective(&self, vars: &[float]) -> float {
        let mut residuals = vec![0.0; self.n_residuals()];
        let mut constraints = vec![0.0; self.n_constraints()];
        self.eval(vars, &mut residuals, &mut constraints);
        residuals.iter().map(|r| r * r).sum()
    }

    /// Objective at `fg[0]` followed by constraint `i` at `fg[1 + i]`.
    fn fg_eval<T: Scalar>(&self, vars: &[T], fg: &mut [T]) {
        assert_eq!(fg.len(), 1 + self.n_constraints());
        let mut residuals = vec![T::zero(); self.n_residuals()];
        let (objective, constraints) = fg.split_at_mut(1);
        self.eval(vars, &mut residuals, constraints);
        objective[0] = residuals.iter().fold(T::zero(), |acc, &r| acc + r * r);
    }
}

/// Element-wise lower and upper limits.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    lower: Vec<float>,
    upper: Vec<float>,
}

impl Bounds {
    /// Panics if the lengths differ or any lower bound exceeds its upper bound.
    pub fn new(lower: Vec<float>, upper: Vec<float>) -> Bounds {
        assert_eq!(
            lower.len(),
            upper.len(),
            "lower and upper bounds have different lengths"
        );
        for (i, (&l, &u)) in lower.iter().zip(&upper).enumerate() {
            assert!(l <= u, "lower bound {} exceeds upper bound {} at {}", l, u, i);
        }
        Bounds { lower, upper }
    }

    pub fn lower(&self) -> &[float] {
        &self.lower
    }

    pub fn upper(&self) -> &[float] {
        &self.upper
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Sum of the distances of `values` outside the bounds. Non-finite values count as
    /// infinitely far outside.
    pub fn violation(&self, values: &[float]) -> float {
        self.violations(values).sum()
    }

    /// Largest distance of any element of `values` outside the bounds.
    pub fn max_violation(&self, values: &[float]) -> float {
        self.violations(values).fold(0.0, max)
    }

    pub fn project(&self, values: &mut [float]) {
        for ((v, &l), &u) in values.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.max(l).min(u);
        }
    }

    fn violations<'a>(&'a self, values: &'a [float]) -> impl Iterator<Item = float> + 'a {
        assert_eq!(values.len(), self.len());
        values
            .iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .map(|((&v, &l), &u)| {
                if v.is_finite() {
                    max(0.0, max(l - v, v - u))
                } else {
                    INFINITY
                }
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    MaxIterationsExceeded,
    TimeLimitExceeded,
    /// A quadratic subproblem could not be set up or was infeasible.
    SubproblemFailure,
    /// The problem evaluated to NaN or infinity.
    NotFinite,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveOptions {
    /// Wall clock budget. When it runs out the best iterate so far is returned.
    pub max_cpu_time: Duration,
}

impl Default for SolveOptions {
    fn default() -> SolveOptions {
        SolveOptions {
            max_cpu_time: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SolveResult {
    pub status: Status,
    /// Converged, or last accepted, decision vector.
    pub x: Vec<float>,
    pub obj_value: float,
    pub constraint_violation: float,
    pub iterations: u32,
    pub solve_time: Duration,
}

pub trait Solver {
    fn solve<P: NlpProblem>(
        &self,
        problem: &P,
        x0: &[float],
        var_bounds: &Bounds,
        constraint_bounds: &Bounds,
        options: &SolveOptions,
    ) -> SolveResult;
}
