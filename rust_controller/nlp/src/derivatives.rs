use nalgebra::{DMatrix, DVector};
use num_dual::Dual64;
use prelude::*;

use crate::NlpProblem;

/// First order expansion of a problem's residuals and constraints about a point.
#[derive(Clone, Debug)]
pub struct Linearisation {
    pub residuals: DVector<float>,
    pub constraints: DVector<float>,
    pub residual_jacobian: DMatrix<float>,
    pub constraint_jacobian: DMatrix<float>,
}

impl Linearisation {
    pub fn is_finite(&self) -> bool {
        self.residuals.iter().all(|v| v.is_finite())
            && self.constraints.iter().all(|v| v.is_finite())
            && self.residual_jacobian.iter().all(|v| v.is_finite())
            && self.constraint_jacobian.iter().all(|v| v.is_finite())
    }

    /// Gradient of the sum of squared residuals.
    pub fn objective_gradient(&self) -> DVector<float> {
        self.residual_jacobian.tr_mul(&self.residuals) * 2.0
    }
}

/// Evaluates the problem and its Jacobians at `x` using forward mode dual numbers, one
/// directional pass per variable.
pub fn linearise<P: NlpProblem>(problem: &P, x: &[float]) -> Linearisation {
    let _guard = flame::start_guard("linearise");

    let n = problem.n_vars();
    let m = problem.n_constraints();
    let nr = problem.n_residuals();
    assert_eq!(x.len(), n);

    let mut residuals = DVector::zeros(nr);
    let mut constraints = DVector::zeros(m);
    let mut residual_jacobian = DMatrix::zeros(nr, n);
    let mut constraint_jacobian = DMatrix::zeros(m, n);

    let mut vars: Vec<Dual64> = x.iter().cloned().map(Dual64::from).collect();
    let mut r = vec![Dual64::from(0.0); nr];
    let mut g = vec![Dual64::from(0.0); m];

    if n == 0 {
        let mut r = vec![0.0; nr];
        let mut g = vec![0.0; m];
        problem.eval(x, &mut r, &mut g);
        residuals.copy_from_slice(&r);
        constraints.copy_from_slice(&g);
    }

    for j in 0..n {
        vars[j].eps = 1.0;
        problem.eval(&vars, &mut r, &mut g);
        vars[j].eps = 0.0;

        for (i, ri) in r.iter().enumerate() {
            residual_jacobian[(i, j)] = ri.eps;
        }
        for (i, gi) in g.iter().enumerate() {
            constraint_jacobian[(i, j)] = gi.eps;
        }
        if j == 0 {
            residuals = DVector::from_iterator(nr, r.iter().map(|v| v.re));
            constraints = DVector::from_iterator(m, g.iter().map(|v| v.re));
        }
    }

    Linearisation {
        residuals,
        constraints,
        residual_jacobian,
        constraint_jacobian,
    }
}
