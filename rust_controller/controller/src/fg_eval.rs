use control_model::{Actuators, ControlModel, KinematicState, ReferenceCurve};
use nlp::NlpProblem;
use prelude::*;

use crate::{MpcConfig, VariableLayout};

/// Square roots of the cost weights, so each cost term is the square of one residual.
#[derive(Clone, Copy, Debug)]
struct ResidualScales {
    cte: float,
    epsi: float,
    v: float,
    delta: float,
    a: float,
    delta_diff: float,
    a_diff: float,
}

impl ResidualScales {
    fn new(config: &MpcConfig) -> ResidualScales {
        ResidualScales {
            cte: config.w_cte.sqrt(),
            epsi: config.w_epsi.sqrt(),
            v: config.w_v.sqrt(),
            delta: config.w_delta.sqrt(),
            a: config.w_a.sqrt(),
            delta_diff: config.w_delta_diff.sqrt(),
            a_diff: config.w_a_diff.sqrt(),
        }
    }
}

/// Trajectory tracking cost and dynamics constraints over the horizon for one reference curve.
///
/// The cost is
///
/// ```text
/// sum_t  w_cte (cte_t - ref_cte)^2 + w_epsi (epsi_t - ref_epsi)^2 + w_v (v_t - ref_v)^2
/// + sum_t  w_delta delta_t^2 + w_a a_t^2
/// + sum_t  w_delta_diff (delta_t+1 - delta_t)^2 + w_a_diff (a_t+1 - a_t)^2
/// ```
///
/// The constraint rows at the state block offsets hold the first state of the horizon. Every other
/// row holds the difference between a state and the model's prediction of it from the previous
/// step, which is zero for a dynamically consistent trajectory.
pub struct FgEval<'a, M: ControlModel> {
    model: &'a M,
    config: &'a MpcConfig,
    layout: &'a VariableLayout,
    curve: ReferenceCurve,
    scales: ResidualScales,
}

impl<'a, M: ControlModel> FgEval<'a, M> {
    pub fn new(
        model: &'a M,
        config: &'a MpcConfig,
        layout: &'a VariableLayout,
        curve: ReferenceCurve,
    ) -> FgEval<'a, M> {
        assert_eq!(layout.N, config.N, "layout and config horizons differ");
        FgEval {
            model,
            config,
            layout,
            curve,
            scales: ResidualScales::new(config),
        }
    }

    fn state_at<T: Scalar>(&self, vars: &[T], t: usize) -> KinematicState<T> {
        KinematicState::from_array(self.layout.state_offsets().map(|offset| vars[offset + t]))
    }
}

impl<'a, M: ControlModel> NlpProblem for FgEval<'a, M> {
    fn n_vars(&self) -> usize {
        self.layout.n_vars()
    }

    fn n_constraints(&self) -> usize {
        self.layout.n_constraints()
    }

    fn n_residuals(&self) -> usize {
        let N = self.layout.N;
        3 * N + 2 * (N - 1) + 2 * (N - 2)
    }

    fn eval<T: Scalar>(&self, vars: &[T], residuals: &mut [T], constraints: &mut [T]) {
        let l = self.layout;
        let c = self.config;
        let s = &self.scales;
        let N = l.N;
        assert_eq!(vars.len(), l.n_vars());

        // Cost
        let mut k = 0;
        let mut push = |r: T| {
            residuals[k] = r;
            k += 1;
        };
        for t in 0..N {
            push((vars[l.cte + t] - c.ref_cte) * s.cte);
            push((vars[l.epsi + t] - c.ref_epsi) * s.epsi);
            push((vars[l.v + t] - c.ref_v) * s.v);
        }
        for t in 0..N - 1 {
            push(vars[l.delta + t] * s.delta);
            push(vars[l.a + t] * s.a);
        }
        for t in 0..N - 2 {
            push((vars[l.delta + t + 1] - vars[l.delta + t]) * s.delta_diff);
            push((vars[l.a + t + 1] - vars[l.a + t]) * s.a_diff);
        }

        // Initial state
        let offsets = l.state_offsets();
        for &offset in &offsets {
            constraints[offset] = vars[offset];
        }

        // Dynamics
        for t in 0..N - 1 {
            let x0 = self.state_at(vars, t);
            let u0 = Actuators {
                delta: vars[l.delta + t],
                a: vars[l.a + t],
            };
            let predicted = self.model.step(c.dt, &x0, &u0, &self.curve).to_array();
            let x1 = self.state_at(vars, t + 1).to_array();
            for i in 0..offsets.len() {
                constraints[offsets[i] + t + 1] = x1[i] - predicted[i];
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use control_model::{Control, KinematicBicycle, State};

    fn setup() -> (KinematicBicycle, MpcConfig, VariableLayout) {
        let config = MpcConfig::default();
        let layout = VariableLayout::new(config.N);
        (config.model(), config, layout)
    }

    fn curve() -> ReferenceCurve {
        ReferenceCurve::new(vec![0.5, 0.1, -0.01, 0.001])
    }

    /// Rolls the model forward from `x0` under `controls` and packs the result into a decision
    /// vector.
    fn rollout(
        model: &KinematicBicycle,
        layout: &VariableLayout,
        dt: float,
        x0: State,
        controls: &[Control],
    ) -> Vec<float> {
        let mut vars = vec![0.0; layout.n_vars()];
        let mut x = x0;
        for t in 0..layout.N {
            for (offset, value) in layout.state_offsets().iter().zip(x.to_array().iter()) {
                vars[offset + t] = *value;
            }
            if t < layout.N - 1 {
                vars[layout.delta + t] = controls[t].delta;
                vars[layout.a + t] = controls[t].a;
                x = model.step(dt, &x, &controls[t], &curve());
            }
        }
        vars
    }

    fn constraints(problem: &FgEval<KinematicBicycle>, vars: &[float]) -> Vec<float> {
        let mut r = vec![0.0; problem.n_residuals()];
        let mut g = vec![0.0; problem.n_constraints()];
        problem.eval(vars, &mut r, &mut g);
        g
    }

    #[test]
    fn consistent_trajectory_has_zero_dynamics_residuals() {
        let (model, config, layout) = setup();
        let problem = FgEval::new(&model, &config, &layout, curve());

        let x0 = State {
            x: 0.0,
            y: -0.3,
            psi: 0.05,
            v: 12.0,
            cte: 0.8,
            epsi: -0.05,
        };
        let controls: Vec<Control> = (0..layout.N - 1)
            .map(|t| Control {
                delta: 0.02 * t as float - 0.05,
                a: 0.3,
            })
            .collect();
        let vars = rollout(&model, &layout, config.dt, x0, &controls);
        let g = constraints(&problem, &vars);

        let offsets = layout.state_offsets();
        for (i, &value) in g.iter().enumerate() {
            if let Some(k) = offsets.iter().position(|&o| o == i) {
                assert_eq!(value, x0.to_array()[k]);
            } else {
                assert_relative_eq!(value, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn initial_rows_ignore_rest_of_vector() {
        let (model, config, layout) = setup();
        let problem = FgEval::new(&model, &config, &layout, curve());

        let mut vars: Vec<float> = (0..layout.n_vars())
            .map(|i| (i as float * 0.37).sin())
            .collect();
        let before = constraints(&problem, &vars);
        for i in layout.delta..layout.n_vars() {
            vars[i] += 1.0;
        }
        for &offset in &layout.state_offsets() {
            vars[offset + 1] -= 2.0;
        }
        let after = constraints(&problem, &vars);

        for &offset in &layout.state_offsets() {
            assert_eq!(before[offset], vars[offset]);
            assert_eq!(after[offset], vars[offset]);
        }
    }

    #[test]
    fn objective_matches_weighted_sum() {
        let (model, config, layout) = setup();
        let problem = FgEval::new(&model, &config, &layout, curve());
        let N = layout.N;

        let vars: Vec<float> = (0..layout.n_vars()).map(|i| (i as float * 0.11).cos()).collect();
        let mut expected = 0.0;
        for t in 0..N {
            expected += config.w_cte * (vars[layout.cte + t] - config.ref_cte).powi(2);
            expected += config.w_epsi * (vars[layout.epsi + t] - config.ref_epsi).powi(2);
            expected += config.w_v * (vars[layout.v + t] - config.ref_v).powi(2);
        }
        for t in 0..N - 1 {
            expected += config.w_delta * vars[layout.delta + t].powi(2);
            expected += config.w_a * vars[layout.a + t].powi(2);
        }
        for t in 0..N - 2 {
            expected +=
                config.w_delta_diff * (vars[layout.delta + t + 1] - vars[layout.delta + t]).powi(2);
            expected += config.w_a_diff * (vars[layout.a + t + 1] - vars[layout.a + t]).powi(2);
        }

        assert_relative_eq!(problem.objective(&vars), expected, max_relative = 1e-12);

        let mut fg = vec![0.0; 1 + layout.n_constraints()];
        problem.fg_eval(&vars, &mut fg);
        assert_relative_eq!(fg[0], expected, max_relative = 1e-12);
        assert_eq!(&fg[1..], &constraints(&problem, &vars)[..]);
    }

    #[test]
    fn objective_grows_with_tracking_error() {
        let (model, config, layout) = setup();
        let problem = FgEval::new(&model, &config, &layout, curve());

        let mut vars = vec![0.0; layout.n_vars()];
        let mut last = problem.objective(&vars);
        assert!(last >= 0.0);
        for &cte in &[0.1, -0.5, 1.0, -2.0] {
            vars[layout.cte + 3] = cte;
            let j = problem.objective(&vars);
            assert!(j > last);
            last = j;
        }
        for &epsi in &[0.1, -0.2, 0.4] {
            vars[layout.epsi + 7] = epsi;
            let j = problem.objective(&vars);
            assert!(j > last);
            last = j;
        }
    }

    #[test]
    fn residual_count() {
        let (model, config, layout) = setup();
        let problem = FgEval::new(&model, &config, &layout, curve());
        assert_eq!(problem.n_residuals(), 30 + 18 + 16);
        assert_eq!(problem.n_vars(), 78);
        assert_eq!(problem.n_constraints(), 60);
    }

    #[test]
    fn shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FgEval<KinematicBicycle>>();
    }
}
