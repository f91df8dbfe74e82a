pub use flame;
pub use nalgebra;
pub use num_dual;

use num_dual::DualNum;

#[allow(non_camel_case_types)]
pub type float = f64;
pub use std::f64::consts::PI;
pub use std::f64::{INFINITY, NEG_INFINITY};

/// Numeric types models and problems are evaluated over: `float` for values and dual numbers
/// for derivatives.
pub trait Scalar: DualNum<float> + Copy {}

impl<T: DualNum<float> + Copy> Scalar for T {}

pub fn min<T: Copy + PartialOrd>(a: T, b: T) -> T {
    *nalgebra::partial_min(&a, &b).expect("NaN")
}

pub fn max<T: Copy + PartialOrd>(a: T, b: T) -> T {
    *nalgebra::partial_max(&a, &b).expect("NaN")
}

/// Wraps an angle into (-PI, PI].
pub fn normalise_angle(mut a: float) -> float {
    if !a.is_finite() {
        return a;
    }
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Standard normal sample (Box-Muller).
pub fn randn() -> float {
    let u1: float = 1.0 - rand::random::<float>();
    let u2: float = rand::random::<float>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

pub fn duration_to_secs(d: std::time::Duration) -> float {
    d.as_secs() as float + float::from(d.subsec_nanos()) * 1e-9
}
