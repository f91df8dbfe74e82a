use control_model::{Control, ControlModel, KinematicBicycle, ReferenceCurve, State};
use nlp::{Bounds, Solver, SqpSolver, Status};
use prelude::*;

use crate::{FgEval, MpcConfig, VariableLayout};

/// Result of one controller solve.
#[derive(Clone, Debug)]
pub struct MpcSolution {
    /// Whether the solver converged. When false the other fields hold the solver's last iterate.
    pub ok: bool,
    pub status: Status,
    /// First steering command.
    pub delta: float,
    /// First acceleration command.
    pub a: float,
    /// Predicted positions over the horizon, starting at the current state.
    pub predicted: Vec<(float, float)>,
    pub cost: float,
    pub vars: Vec<float>,
    layout: VariableLayout,
}

impl MpcSolution {
    pub fn control(&self) -> Control {
        Control {
            delta: self.delta,
            a: self.a,
        }
    }

    /// Decision vector advanced by one timestep, for seeding the next solve. Each block drops
    /// its first value and repeats its last.
    pub fn shifted_guess(&self) -> Vec<float> {
        let mut guess = self.vars.clone();
        for block in &self.layout.blocks() {
            let values = &mut guess[block.clone()];
            let n = values.len();
            if n > 1 {
                values.rotate_left(1);
                values[n - 1] = values[n - 2];
            }
        }
        guess
    }
}

/// Nonlinear model predictive controller.
pub struct Mpc<M: ControlModel, S: Solver> {
    config: MpcConfig,
    layout: VariableLayout,
    model: M,
    solver: S,
}

impl Mpc<KinematicBicycle, SqpSolver> {
    pub fn from_config(config: MpcConfig) -> Mpc<KinematicBicycle, SqpSolver> {
        let model = config.model();
        let solver = config.solver();
        Mpc::new(config, model, solver)
    }
}

impl<M: ControlModel, S: Solver> Mpc<M, S> {
    /// Panics if `config` does not validate.
    pub fn new(config: MpcConfig, model: M, solver: S) -> Mpc<M, S> {
        if let Err(e) = config.validate() {
            panic!("{}", e);
        }
        let layout = VariableLayout::new(config.N);
        Mpc {
            config,
            layout,
            model,
            solver,
        }
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Solves from an all zero initial guess.
    pub fn solve(&self, state: &State, coeffs: &[float]) -> MpcSolution {
        let guess = vec![0.0; self.layout.n_vars()];
        self.solve_from(state, coeffs, &guess)
    }

    /// Solves starting the solver from `guess`, usually the previous solution's
    /// [`MpcSolution::shifted_guess`].
    ///
    /// Panics if the coefficient count does not match the configured polynomial degree, if the
    /// state is not finite or if the guess has the wrong length.
    pub fn solve_from(&self, state: &State, coeffs: &[float], guess: &[float]) -> MpcSolution {
        let _guard = flame::start_guard("mpc solve");

        assert_eq!(
            coeffs.len(),
            self.config.poly_degree + 1,
            "expected {} polynomial coefficients, got {}",
            self.config.poly_degree + 1,
            coeffs.len()
        );
        assert!(
            coeffs.iter().all(|c| c.is_finite()),
            "polynomial coefficients must be finite: {:?}",
            coeffs
        );
        assert!(state.is_finite(), "state must be finite: {:?}", state);
        assert_eq!(
            guess.len(),
            self.layout.n_vars(),
            "initial guess has the wrong length"
        );

        let curve = ReferenceCurve::new(coeffs.to_vec());
        let problem = FgEval::new(&self.model, &self.config, &self.layout, curve);
        let var_bounds = self.variable_bounds();
        let constraint_bounds = self.constraint_bounds(state);

        let result = self.solver.solve(
            &problem,
            guess,
            &var_bounds,
            &constraint_bounds,
            &self.config.solve_options(),
        );

        let ok = result.status == Status::Success;
        debug!("Cost {}", result.obj_value);
        if !ok {
            warn!(
                "{} mpc solve did not converge: {:?} after {} iterations ({:.1} ms)",
                M::name(),
                result.status,
                result.iterations,
                duration_to_secs(result.solve_time) * 1e3
            );
        }

        let l = &self.layout;
        let x = &result.x;
        let predicted = (0..l.N).map(|t| (x[l.x + t], x[l.y + t])).collect();

        MpcSolution {
            ok,
            status: result.status,
            delta: x[l.delta],
            a: x[l.a],
            predicted,
            cost: result.obj_value,
            layout: self.layout,
            vars: result.x,
        }
    }

    /// States are unbounded up to the sentinel, actuators are limited by the model.
    pub fn variable_bounds(&self) -> Bounds {
        let n = self.layout.n_vars();
        let sentinel = self.config.bound_sentinel;
        let mut lower = vec![-sentinel; n];
        let mut upper = vec![sentinel; n];

        let (u_min, u_max) = self.model.input_bounds();
        for i in self.layout.delta_range() {
            lower[i] = u_min.delta;
            upper[i] = u_max.delta;
        }
        for i in self.layout.a_range() {
            lower[i] = u_min.a;
            upper[i] = u_max.a;
        }
        Bounds::new(lower, upper)
    }

    /// Every dynamics residual must be zero and the initial rows must equal `state`.
    pub fn constraint_bounds(&self, state: &State) -> Bounds {
        let n = self.layout.n_constraints();
        let mut lower = vec![0.0; n];
        let mut upper = vec![0.0; n];
        for (&offset, &value) in self.layout.state_offsets().iter().zip(&state.to_array()) {
            lower[offset] = value;
            upper[offset] = value;
        }
        Bounds::new(lower, upper)
    }
}
