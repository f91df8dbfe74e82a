// Kinematic bicycle model with cross track and heading error states, Euler discretised.

use prelude::*;

use crate::{Actuators, Control, ControlModel, KinematicState, ReferenceCurve};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicBicycle {
    /// Distance from the front axle to the centre of gravity. Calibrated so the turning radius
    /// at constant steering matches the vehicle.
    pub Lf: float,
    /// Steering lock in radians before scaling by `Lf`.
    pub delta_max: float,
    pub a_max: float,
}

impl Default for KinematicBicycle {
    fn default() -> KinematicBicycle {
        KinematicBicycle {
            Lf: 2.67,
            delta_max: 0.436332,
            a_max: 0.7,
        }
    }
}

impl KinematicBicycle {
    pub fn new(Lf: float, delta_max: float, a_max: float) -> KinematicBicycle {
        assert!(Lf > 0.0, "Lf must be positive");
        assert!(delta_max > 0.0 && a_max > 0.0, "input limits must be positive");
        KinematicBicycle {
            Lf,
            delta_max,
            a_max,
        }
    }
}

impl ControlModel for KinematicBicycle {
    fn name() -> &'static str {
        "kinematic_bicycle"
    }

    fn step<T: Scalar>(
        &self,
        dt: float,
        x: &KinematicState<T>,
        u: &Actuators<T>,
        curve: &ReferenceCurve,
    ) -> KinematicState<T> {
        let KinematicState {
            x: px,
            y,
            psi,
            v,
            cte: _,
            epsi,
        } = *x;
        let Actuators { delta, a } = *u;

        let f = curve.eval(px);
        let psi_des = curve.desired_heading(px);
        let yaw_rate = v * delta / self.Lf;

        KinematicState {
            x: px + v * psi.cos() * dt,
            y: y + v * psi.sin() * dt,
            psi: psi + yaw_rate * dt,
            v: v + a * dt,
            cte: (f - y) + v * epsi.sin() * dt,
            epsi: (psi - psi_des) + yaw_rate * dt,
        }
    }

    fn input_bounds(&self) -> (Control, Control) {
        let delta_max = self.delta_max * self.Lf;
        let min = Control {
            delta: -delta_max,
            a: -self.a_max,
        };
        let max = Control {
            delta: delta_max,
            a: self.a_max,
        };
        (min, max)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::State;
    use approx::assert_relative_eq;
    use num_dual::Dual64;

    fn straight() -> ReferenceCurve {
        ReferenceCurve::new(vec![0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn straight_line_at_constant_speed() {
        let model = KinematicBicycle::default();
        let mut x = State {
            v: 10.0,
            ..State::default()
        };
        let u = Control::default();

        for i in 1..=10 {
            x = model.step(0.1, &x, &u, &straight());
            assert_relative_eq!(x.x, i as float, epsilon = 1e-12);
            assert_relative_eq!(x.y, 0.0);
            assert_relative_eq!(x.psi, 0.0);
            assert_relative_eq!(x.v, 10.0);
            assert_relative_eq!(x.cte, 0.0);
            assert_relative_eq!(x.epsi, 0.0);
        }
    }

    #[test]
    fn acceleration_integrates_speed() {
        let model = KinematicBicycle::default();
        let x = State {
            v: 5.0,
            ..State::default()
        };
        let u = Control { delta: 0.0, a: 0.5 };
        let next = model.step(0.1, &x, &u, &straight());
        assert_relative_eq!(next.v, 5.05, epsilon = 1e-12);
        assert_relative_eq!(next.x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn errors_follow_reference_offset() {
        let model = KinematicBicycle::default();
        // Reference line y = 1 + 0.5 x
        let curve = ReferenceCurve::new(vec![1.0, 0.5, 0.0, 0.0]);
        let x = State {
            x: 2.0,
            y: 0.5,
            psi: 0.1,
            v: 4.0,
            cte: 0.0,
            epsi: 0.2,
        };
        let u = Control { delta: 0.05, a: 0.0 };
        let next = model.step(0.1, &x, &u, &curve);

        let yaw_rate = 4.0 * 0.05 / model.Lf;
        assert_relative_eq!(
            next.cte,
            (2.0 - 0.5) + 4.0 * (0.2 as float).sin() * 0.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            next.epsi,
            0.1 - (0.5 as float).atan() + yaw_rate * 0.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(next.psi, 0.1 + yaw_rate * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn constant_steering_turning_radius() {
        // Integrating with a small step should trace a circle of radius Lf / delta
        let model = KinematicBicycle::default();
        let delta = 0.2;
        let u = Control { delta, a: 0.0 };
        let mut x = State {
            v: 2.0,
            ..State::default()
        };
        let radius = model.Lf / delta;
        let dt = 1e-4;
        let steps = (PI * radius / 2.0 / x.v / dt) as usize;
        for _ in 0..steps {
            x = model.step(dt, &x, &u, &straight());
        }
        // Centre of the circle is at (0, radius)
        let r = (x.x * x.x + (x.y - radius) * (x.y - radius)).sqrt();
        assert_relative_eq!(r, radius, max_relative = 1e-3);
    }

    #[test]
    fn dual_evaluation_matches_float() {
        let model = KinematicBicycle::default();
        let curve = ReferenceCurve::new(vec![0.3, -0.1, 0.02, 0.001]);
        let x = State {
            x: 1.0,
            y: 0.2,
            psi: -0.05,
            v: 7.0,
            cte: 0.1,
            epsi: 0.03,
        };
        let u = Control { delta: -0.1, a: 0.3 };
        let expected = model.step(0.1, &x, &u, &curve);

        // Seed the derivative on v and compare with central differences
        let mut x_dual = KinematicState::from_array(x.to_array().map(Dual64::from));
        x_dual.v = Dual64::new(x.v, 1.0);
        let u_dual = Actuators {
            delta: Dual64::from(u.delta),
            a: Dual64::from(u.a),
        };
        let next = model.step(0.1, &x_dual, &u_dual, &curve);

        let h = 1e-6;
        let plus = model.step(0.1, &State { v: x.v + h, ..x }, &u, &curve).to_array();
        let minus = model.step(0.1, &State { v: x.v - h, ..x }, &u, &curve).to_array();

        for (i, (d, e)) in next.to_array().iter().zip(expected.to_array().iter()).enumerate() {
            assert_relative_eq!(d.re, *e, epsilon = 1e-12);
            let fd = (plus[i] - minus[i]) / (2.0 * h);
            assert_relative_eq!(d.eps, fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn steering_bounds_scale_with_Lf() {
        let model = KinematicBicycle::default();
        let (min, max) = model.input_bounds();
        assert_relative_eq!(max.delta, 0.436332 * 2.67);
        assert_relative_eq!(min.delta, -0.436332 * 2.67);
        assert_relative_eq!(min.a, -0.7);
        assert_relative_eq!(max.a, 0.7);
    }
}
