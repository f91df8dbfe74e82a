#![allow(non_snake_case)]

use prelude::*;

mod kinematic_bicycle;
pub use kinematic_bicycle::KinematicBicycle;

pub mod reference;
pub use reference::{FitError, ReferenceCurve};

/// Vehicle state in the frame the reference curve is expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KinematicState<T> {
    pub x: T,
    pub y: T,
    pub psi: T,
    pub v: T,
    /// Cross track error.
    pub cte: T,
    /// Heading error.
    pub epsi: T,
}

pub type State = KinematicState<float>;

impl<T: Copy> KinematicState<T> {
    pub const DIM: usize = 6;

    /// Components in decision vector block order.
    pub fn to_array(&self) -> [T; 6] {
        [self.x, self.y, self.psi, self.v, self.cte, self.epsi]
    }

    pub fn from_array([x, y, psi, v, cte, epsi]: [T; 6]) -> Self {
        KinematicState {
            x,
            y,
            psi,
            v,
            cte,
            epsi,
        }
    }
}

impl State {
    /// Panics if `s` does not hold exactly six values.
    pub fn from_slice(s: &[float]) -> State {
        assert_eq!(
            s.len(),
            State::DIM,
            "state must have {} components, got {}",
            State::DIM,
            s.len()
        );
        State::from_array([s[0], s[1], s[2], s[3], s[4], s[5]])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Actuators<T> {
    /// Steering angle in radians.
    pub delta: T,
    /// Normalised throttle (positive) or brake (negative).
    pub a: T,
}

pub type Control = Actuators<float>;

pub trait ControlModel {
    fn name() -> &'static str
    where
        Self: Sized;

    /// Advances `x` by one discrete step of length `dt` under input `u`.
    ///
    /// Implementations must be branch free in the state and input so that derivatives
    /// computed with dual numbers are exact.
    fn step<T: Scalar>(
        &self,
        dt: float,
        x: &KinematicState<T>,
        u: &Actuators<T>,
        curve: &ReferenceCurve,
    ) -> KinematicState<T>;

    /// Returns the mininum and maximum allowable input values.
    fn input_bounds(&self) -> (Control, Control);
}
