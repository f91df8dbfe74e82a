//! Nonlinear model predictive control of a kinematic bicycle along a polynomial reference.
#![allow(non_snake_case)]

#[macro_use]
extern crate log;

mod config;
pub use config::{ConfigError, MpcConfig};

mod fg_eval;
pub use fg_eval::FgEval;

mod layout;
pub use layout::VariableLayout;

mod mpc;
pub use mpc::{Mpc, MpcSolution};

pub use nlp::{Solver, SqpSolver, Status};
