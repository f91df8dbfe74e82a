use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use control_model::KinematicBicycle;
use nlp::{SolveOptions, SqpSolver};
use prelude::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("unable to deserialise controller config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid controller config: {0}")]
    Invalid(String),
}

/// Tunable parameters of the controller. Every field has a default so a config file only needs
/// to list the values it changes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MpcConfig {
    /// Number of timesteps in the horizon.
    pub N: usize,
    /// Length of each timestep in seconds.
    pub dt: float,
    pub Lf: float,

    pub ref_v: float,
    pub ref_cte: float,
    pub ref_epsi: float,

    pub w_cte: float,
    pub w_epsi: float,
    pub w_v: float,
    pub w_delta: float,
    pub w_a: float,
    pub w_delta_diff: float,
    pub w_a_diff: float,

    /// Steering limit in radians, scaled by `Lf` when applied.
    pub delta_max: float,
    pub a_max: float,

    /// Seconds the solver may spend per solve.
    pub max_cpu_time: float,
    /// Magnitude used as the bound of unconstrained variables.
    pub bound_sentinel: float,
    pub poly_degree: usize,

    pub max_iterations: u32,
    pub step_tolerance: float,
    pub constraint_tolerance: float,
}

impl Default for MpcConfig {
    fn default() -> MpcConfig {
        MpcConfig {
            N: 10,
            dt: 0.1,
            Lf: 2.67,

            ref_v: 110.0,
            ref_cte: 0.0,
            ref_epsi: 0.0,

            // Tracking errors dominate, actuator smoothness next
            w_cte: 2500.0,
            w_epsi: 2500.0,
            w_v: 1.0,
            w_delta: 1.0,
            w_a: 1.0,
            w_delta_diff: 200.0,
            w_a_diff: 10.0,

            delta_max: 0.436332,
            a_max: 0.7,

            max_cpu_time: 0.5,
            bound_sentinel: 1.0e19,
            poly_degree: 3,

            max_iterations: 100,
            step_tolerance: 1e-5,
            constraint_tolerance: 1e-6,
        }
    }
}

impl MpcConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MpcConfig, ConfigError> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        config_str.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.N < 2 {
            return Err(ConfigError::Invalid(format!(
                "N must be at least 2, got {}",
                self.N
            )));
        }

        let positive = [
            ("dt", self.dt),
            ("Lf", self.Lf),
            ("w_cte", self.w_cte),
            ("w_epsi", self.w_epsi),
            ("w_v", self.w_v),
            ("w_delta", self.w_delta),
            ("w_a", self.w_a),
            ("w_delta_diff", self.w_delta_diff),
            ("w_a_diff", self.w_a_diff),
            ("delta_max", self.delta_max),
            ("a_max", self.a_max),
            ("max_cpu_time", self.max_cpu_time),
            ("bound_sentinel", self.bound_sentinel),
            ("step_tolerance", self.step_tolerance),
            ("constraint_tolerance", self.constraint_tolerance),
        ];
        for &(name, value) in &positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }

        let finite = [
            ("ref_v", self.ref_v),
            ("ref_cte", self.ref_cte),
            ("ref_epsi", self.ref_epsi),
        ];
        for &(name, value) in &finite {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{} must be finite", name)));
            }
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be nonzero".into()));
        }
        Ok(())
    }

    pub fn model(&self) -> KinematicBicycle {
        KinematicBicycle::new(self.Lf, self.delta_max, self.a_max)
    }

    pub fn solver(&self) -> SqpSolver {
        SqpSolver {
            max_iterations: self.max_iterations,
            step_tolerance: self.step_tolerance,
            constraint_tolerance: self.constraint_tolerance,
            infinity: self.bound_sentinel,
            ..SqpSolver::default()
        }
    }

    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            max_cpu_time: Duration::from_secs_f64(self.max_cpu_time),
        }
    }
}

impl std::str::FromStr for MpcConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<MpcConfig, ConfigError> {
        let config: MpcConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
