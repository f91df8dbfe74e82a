#![allow(non_snake_case)]

use osqp::Problem as InnerProblem;
use std::borrow::Cow;

pub use osqp::{SetupError, Settings, Status};

use prelude::*;

/// OSQP problem with profiling spans around every call into the C library.
pub struct Problem {
    inner: InnerProblem,
}

impl Problem {
    /// `P` must be upper triangular.
    pub fn new(
        P: &sparse::CscMatrix,
        q: &[float],
        A: &sparse::CscMatrix,
        l: &[float],
        u: &[float],
        settings: &Settings,
    ) -> Result<Problem, SetupError> {
        let _guard = flame::start_guard("osqp setup");
        let inner = InnerProblem::new(convert_sparse(P), q, convert_sparse(A), l, u, settings)?;
        Ok(Problem { inner })
    }

    pub fn solve(&mut self) -> Status {
        let _guard = flame::start_guard("osqp solve");
        self.inner.solve()
    }
}

pub fn convert_sparse(this: &sparse::CscMatrix) -> osqp::CscMatrix {
    let (nrows, ncols) = this.shape();
    osqp::CscMatrix {
        nrows,
        ncols,
        indptr: Cow::Borrowed(this.indptr()),
        indices: Cow::Borrowed(this.indices()),
        data: Cow::Borrowed(this.data()),
    }
}
