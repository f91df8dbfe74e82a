use nalgebra::{DMatrix, DVector};
use prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("x and y have different lengths ({0} and {1})")]
    LengthMismatch(usize, usize),
    #[error("a degree {order} fit needs at least {needed} points, got {got}")]
    TooFewPoints {
        order: usize,
        needed: usize,
        got: usize,
    },
    #[error("least squares solve failed: {0}")]
    Solve(&'static str),
}

/// Desired path as a polynomial in x, coefficients ordered from the constant term up.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceCurve {
    coeffs: Vec<float>,
}

impl ReferenceCurve {
    pub fn new(coeffs: Vec<float>) -> ReferenceCurve {
        assert!(!coeffs.is_empty(), "reference curve needs at least one coefficient");
        ReferenceCurve { coeffs }
    }

    /// Least squares polynomial fit of `order` through the points.
    pub fn fit(xs: &[float], ys: &[float], order: usize) -> Result<ReferenceCurve, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::LengthMismatch(xs.len(), ys.len()));
        }
        if xs.len() < order + 1 {
            return Err(FitError::TooFewPoints {
                order,
                needed: order + 1,
                got: xs.len(),
            });
        }

        let A = DMatrix::from_fn(xs.len(), order + 1, |r, c| xs[r].powi(c as i32));
        let b = DVector::from_column_slice(ys);
        let coeffs = A.svd(true, true).solve(&b, 1e-12).map_err(FitError::Solve)?;

        Ok(ReferenceCurve {
            coeffs: coeffs.iter().cloned().collect(),
        })
    }

    pub fn coeffs(&self) -> &[float] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn eval<T: Scalar>(&self, x: T) -> T {
        self.coeffs
            .iter()
            .rev()
            .fold(T::zero(), |acc, &c| acc * x + c)
    }

    /// First derivative with respect to x.
    pub fn slope<T: Scalar>(&self, x: T) -> T {
        self.coeffs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(T::zero(), |acc, (i, &c)| acc * x + c * i as float)
    }

    /// Tangent direction of the curve at x.
    pub fn desired_heading<T: Scalar>(&self, x: T) -> T {
        self.slope(x).atan()
    }
}

/// Expresses world frame points relative to a vehicle at (px, py) with heading psi.
pub fn to_vehicle_frame(
    points: &[(float, float)],
    px: float,
    py: float,
    psi: float,
) -> Vec<(float, float)> {
    let (sin_psi, cos_psi) = psi.sin_cos();
    points
        .iter()
        .map(|&(x, y)| {
            let dx = x - px;
            let dy = y - py;
            (dx * cos_psi + dy * sin_psi, -dx * sin_psi + dy * cos_psi)
        })
        .collect()
}
