// Ignore this lint otherwise many warnings are generated for common mathematical notation
#![allow(non_snake_case)]

#[macro_use]
extern crate log;

mod config;
mod flame_merge;
mod simulation_model;
mod track;

use std::thread;
use std::time::{Duration, Instant};

use control_model::{reference, Control, ControlModel, ReferenceCurve, State};
use controller::{Mpc, MpcConfig};
use prelude::*;
use simulation_model::{KinematicSimulation, Pose, SimulationModel};
use track::Track;

fn main() {
    env_logger::init();

    let sim_config = config::SimulatorConfig::load();
    run(&sim_config);

    if let Some(path) = &sim_config.flame_graph {
        if let Err(e) = flame_merge::write_flame(path) {
            error!("unable to write flame graph to {}: {}", path, e);
        }
    }
}

/// Fits the reference curve to the waypoints ahead of the measured pose and returns the
/// controller state in the vehicle frame.
fn vehicle_frame_state(
    track: &Track,
    pose: &Pose,
    lookahead: usize,
    poly_degree: usize,
) -> Result<(State, ReferenceCurve), reference::FitError> {
    let ahead = track.waypoints_ahead(pose.x, pose.y, lookahead);
    let local = reference::to_vehicle_frame(ahead, pose.x, pose.y, pose.heading);
    let (xs, ys): (Vec<float>, Vec<float>) = local.into_iter().unzip();
    let curve = ReferenceCurve::fit(&xs, &ys, poly_degree)?;

    // The car sits at the origin facing along x
    let state = State {
        x: 0.0,
        y: 0.0,
        psi: 0.0,
        v: pose.v,
        cte: curve.eval(0.0),
        epsi: -curve.desired_heading(0.0),
    };
    Ok((state, curve))
}

fn run(sim_config: &config::SimulatorConfig) {
    let mpc_config = MpcConfig::load(&sim_config.controller_config)
        .unwrap_or_else(|e| panic!("{}", e));
    let poly_degree = mpc_config.poly_degree;
    let mpc = Mpc::from_config(mpc_config);

    let track = Track::from_config(&sim_config.track);
    let mut sim_model = KinematicSimulation::new(mpc.model().Lf);
    info!("simulating {}", KinematicSimulation::name());

    let (x0, y0) = track.waypoints()[0];
    let mut sim_state = sim_model.init_state(x0, y0, 0.0, sim_config.initial_speed);

    let dt = sim_config.dt;
    let dt_duration = Duration::from_secs_f64(dt);
    let n_steps = (sim_config.t / dt) as usize;

    let mut solve_stats = stats::OnlineStats::new();
    let mut cte_stats = stats::OnlineStats::new();
    let mut failures = 0;

    let mut control = Control::default();
    let mut guess = vec![0.0; mpc.layout().n_vars()];

    for i in 0..n_steps {
        let step_start = Instant::now();

        if track.finished(sim_state.x, sim_state.y) {
            info!("reached the end of the track after {:.1} s", i as float * dt);
            break;
        }

        // Add noise to measurement
        let measured = Pose {
            x: sim_state.x + randn() * sim_config.position_noise,
            y: sim_state.y + randn() * sim_config.position_noise,
            heading: sim_state.heading + randn() * sim_config.heading_noise,
            v: sim_state.v,
        };

        let controller_start = Instant::now();

        let (state, curve) =
            match vehicle_frame_state(&track, &measured, sim_config.lookahead, poly_degree) {
                Ok(fit) => fit,
                Err(e) => {
                    warn!("reference fit failed, holding previous control: {}", e);
                    sim_state = sim_model.step(dt, sim_state, &control);
                    continue;
                }
            };

        // Predict where the car will be when the new command takes effect
        let state = mpc.model().step(sim_config.latency, &state, &control, &curve);

        let solution = mpc.solve_from(&state, curve.coeffs(), &guess);
        if !solution.ok {
            failures += 1;
        }
        if sim_config.warm_start {
            guess = solution.shifted_guess();
        }

        let controller_millis = duration_to_secs(controller_start.elapsed()) * 1e3;
        solve_stats.add(controller_millis);

        // The previous command stays active until the latency has passed
        sim_state = sim_model.step(sim_config.latency, sim_state, &control);
        control = solution.control();
        sim_state = sim_model.step(dt - sim_config.latency, sim_state, &control);

        let tracking_error = track.distance(sim_state.x, sim_state.y);
        cte_stats.add(tracking_error);

        info!("Controller took {:.1} ms", controller_millis);
        info!("State {:?}", sim_state);
        info!("Control {:?}", control);
        debug!("Predicted {:?}", solution.predicted);

        let step_elapsed = step_start.elapsed();
        if let Some(step_remaining) = dt_duration.checked_sub(step_elapsed) {
            if sim_config.real_time {
                thread::sleep(step_remaining);
            }
        } else if sim_config.real_time {
            warn!(
                "step missed deadline. took {:.1}ms.",
                duration_to_secs(step_elapsed) * 1e3
            );
        }
    }

    println!("Solve time stats (mean/ms, stdev/ms): {:?}", solve_stats);
    println!("Tracking error stats (mean/m, stdev/m): {:?}", cte_stats);
    println!("Solves without convergence: {}", failures);
}
