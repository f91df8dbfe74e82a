use nalgebra::DVector;
use osqp_wrapper::{Problem, Settings, Status as QpStatus};
use prelude::*;
use std::time::{Duration, Instant};

use crate::derivatives::{linearise, Linearisation};
use crate::{Bounds, NlpProblem, SolveOptions, SolveResult, Solver, Status};

/// Bound value passed to OSQP for an unbounded row.
const QP_INFINITY: float = 1e30;

/// Sequential quadratic programming with a Gauss-Newton Hessian.
///
/// Each iteration linearises the constraints, builds a convex QP from the residual Jacobian and
/// solves it with OSQP. Steps are damped by a backtracking line search on an l1 merit function.
#[derive(Clone, Debug)]
pub struct SqpSolver {
    pub max_iterations: u32,
    /// Converged once the step satisfies `|d|_inf <= step_tolerance * (1 + |x|_inf)`...
    pub step_tolerance: float,
    /// ...and no constraint or bound is violated by more than this.
    pub constraint_tolerance: float,
    /// Added to the Hessian diagonal so every QP is strictly convex.
    pub regularisation: float,
    /// Bounds at or beyond this magnitude are treated as absent.
    pub infinity: float,
    pub qp_tolerance: float,
    pub qp_max_iterations: u32,
    /// Smallest line search step before the step is taken regardless.
    pub min_step: float,
}

impl Default for SqpSolver {
    fn default() -> SqpSolver {
        SqpSolver {
            max_iterations: 100,
            step_tolerance: 1e-5,
            constraint_tolerance: 1e-6,
            regularisation: 1e-8,
            infinity: 1e19,
            qp_tolerance: 1e-8,
            qp_max_iterations: 20_000,
            min_step: 1e-4,
        }
    }
}

struct Iterate {
    x: Vec<float>,
    objective: float,
    constraints: Vec<float>,
    violation: float,
}

impl SqpSolver {
    fn evaluate<P: NlpProblem>(
        &self,
        problem: &P,
        x: Vec<float>,
        constraint_bounds: &Bounds,
    ) -> Iterate {
        let mut residuals = vec![0.0; problem.n_residuals()];
        let mut constraints = vec![0.0; problem.n_constraints()];
        problem.eval(&x, &mut residuals, &mut constraints);
        let objective = residuals.iter().map(|r| r * r).sum();
        let violation = constraint_bounds.violation(&constraints);
        Iterate {
            x,
            objective,
            constraints,
            violation,
        }
    }

    fn qp_bound(&self, b: float) -> float {
        if b >= self.infinity {
            QP_INFINITY
        } else if b <= -self.infinity {
            -QP_INFINITY
        } else {
            b
        }
    }

    /// Solves the QP for the step `d` about `iterate`. Returns the step and the multipliers of the
    /// linearised constraints.
    fn solve_subproblem(
        &self,
        lin: &Linearisation,
        iterate: &Iterate,
        var_bounds: &Bounds,
        constraint_bounds: &Bounds,
        time_limit: Duration,
    ) -> Option<(DVector<float>, DVector<float>)> {
        let n = iterate.x.len();
        let m = iterate.constraints.len();

        // minimise 0.5 d'Hd + q'd
        let JtJ = lin.residual_jacobian.tr_mul(&lin.residual_jacobian);
        let P = (sparse::block(&JtJ) * 2.0 + sparse::eye(n) * self.regularisation)
            .upper_triangle()
            .build_csc();
        let q = lin.objective_gradient();

        // s.t. cl - g <= Jg d <= cu - g
        //      xl - x <=    d <= xu - x
        let A = sparse::vstack(&[sparse::block(&lin.constraint_jacobian), sparse::eye(n)])
            .build_csc();

        let mut l = Vec::with_capacity(m + n);
        let mut u = Vec::with_capacity(m + n);
        for (i, &g) in iterate.constraints.iter().enumerate() {
            l.push(self.qp_bound(constraint_bounds.lower()[i]) - g);
            u.push(self.qp_bound(constraint_bounds.upper()[i]) - g);
        }
        for (i, &x) in iterate.x.iter().enumerate() {
            l.push(self.qp_bound(var_bounds.lower()[i]) - x);
            u.push(self.qp_bound(var_bounds.upper()[i]) - x);
        }

        let settings = Settings::default()
            .verbose(false)
            .eps_abs(self.qp_tolerance)
            .eps_rel(self.qp_tolerance)
            .polish(true)
            .max_iter(self.qp_max_iterations)
            .time_limit(Some(time_limit));

        let mut qp = match Problem::new(&P, q.as_slice(), &A, &l, &u, &settings) {
            Ok(qp) => qp,
            Err(e) => {
                warn!("qp setup failed: {:?}", e);
                return None;
            }
        };

        match qp.solve() {
            QpStatus::Solved(solution)
            | QpStatus::SolvedInaccurate(solution)
            | QpStatus::MaxIterationsReached(solution)
            | QpStatus::TimeLimitReached(solution) => {
                let d = DVector::from_column_slice(solution.x());
                let y = DVector::from_iterator(m, solution.y().iter().take(m).cloned());
                Some((d, y))
            }
            QpStatus::PrimalInfeasible(_) | QpStatus::PrimalInfeasibleInaccurate(_) => {
                warn!("qp subproblem primal infeasible");
                None
            }
            QpStatus::DualInfeasible(_) | QpStatus::DualInfeasibleInaccurate(_) => {
                warn!("qp subproblem dual infeasible");
                None
            }
            _ => {
                warn!("qp subproblem failed");
                None
            }
        }
    }
}

impl Solver for SqpSolver {
    fn solve<P: NlpProblem>(
        &self,
        problem: &P,
        x0: &[float],
        var_bounds: &Bounds,
        constraint_bounds: &Bounds,
        options: &SolveOptions,
    ) -> SolveResult {
        let _guard = flame::start_guard("sqp solve");
        let start = Instant::now();

        let n = problem.n_vars();
        assert_eq!(x0.len(), n, "initial guess has the wrong length");
        assert_eq!(var_bounds.len(), n, "variable bounds have the wrong length");
        assert_eq!(
            constraint_bounds.len(),
            problem.n_constraints(),
            "constraint bounds have the wrong length"
        );

        let mut x = x0.to_vec();
        var_bounds.project(&mut x);
        let mut current = self.evaluate(problem, x, constraint_bounds);

        let finish = |status: Status, it: Iterate, iterations: u32| {
            let constraint_violation = max(
                var_bounds.max_violation(&it.x),
                constraint_bounds.max_violation(&it.constraints),
            );
            debug!(
                "sqp finished: {:?} after {} iterations, objective {}, violation {}",
                status, iterations, it.objective, constraint_violation
            );
            SolveResult {
                status,
                x: it.x,
                obj_value: it.objective,
                constraint_violation,
                iterations,
                solve_time: start.elapsed(),
            }
        };

        if !current.objective.is_finite() || !current.violation.is_finite() {
            return finish(Status::NotFinite, current, 0);
        }

        // l1 merit penalty, only ever increased
        let mut mu: float = 0.0;

        for iteration in 0..self.max_iterations {
            let remaining = match options.max_cpu_time.checked_sub(start.elapsed()) {
                Some(remaining) if remaining > Duration::from_secs(0) => remaining,
                _ => return finish(Status::TimeLimitExceeded, current, iteration),
            };

            let lin = linearise(problem, &current.x);
            if !lin.is_finite() {
                return finish(Status::NotFinite, current, iteration);
            }

            let (d, y) = match self.solve_subproblem(
                &lin,
                &current,
                var_bounds,
                constraint_bounds,
                remaining,
            ) {
                Some(step) => step,
                None => return finish(Status::SubproblemFailure, current, iteration),
            };
            if d.iter().any(|v| !v.is_finite()) {
                return finish(Status::NotFinite, current, iteration);
            }

            let x_norm = current.x.iter().fold(0.0, |acc, v| max(acc, v.abs()));
            let d_norm = d.iter().fold(0.0, |acc, v| max(acc, v.abs()));
            let step_small = d_norm <= self.step_tolerance * (1.0 + x_norm);
            let feasible = constraint_bounds.max_violation(&current.constraints)
                <= self.constraint_tolerance;

            mu = max(mu, 1.1 * y.iter().fold(0.0, |acc, v| max(acc, v.abs())));
            let merit = current.objective + mu * current.violation;
            // Directional derivative of the merit function along d
            let slope = lin.objective_gradient().dot(&d) - mu * current.violation;

            let mut alpha: float = 1.0;
            let next = loop {
                let mut x_new: Vec<float> = current
                    .x
                    .iter()
                    .zip(d.iter())
                    .map(|(x, d)| x + alpha * d)
                    .collect();
                var_bounds.project(&mut x_new);
                let candidate = self.evaluate(problem, x_new, constraint_bounds);
                let candidate_merit = candidate.objective + mu * candidate.violation;

                if candidate_merit.is_finite()
                    && candidate_merit <= merit + 1e-4 * alpha * min(slope, 0.0)
                {
                    break candidate;
                }
                if alpha * 0.5 < self.min_step {
                    trace!("line search hit minimum step");
                    break candidate;
                }
                alpha *= 0.5;
            };

            if !next.objective.is_finite() || !next.violation.is_finite() {
                return finish(Status::NotFinite, current, iteration + 1);
            }

            trace!(
                "sqp iteration {}: objective {} violation {} step {} alpha {}",
                iteration,
                next.objective,
                next.violation,
                d_norm,
                alpha
            );
            current = next;

            if step_small && feasible {
                return finish(Status::Success, current, iteration + 1);
            }
        }

        finish(Status::MaxIterationsExceeded, current, self.max_iterations)
    }
}
