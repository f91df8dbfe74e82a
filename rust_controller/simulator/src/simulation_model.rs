use control_model::Control;
use prelude::*;

/// Vehicle pose and speed in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub x: float,
    pub y: float,
    pub heading: float,
    pub v: float,
}

pub trait SimulationModel {
    fn name() -> &'static str
    where
        Self: Sized;

    fn init_state(&self, x: float, y: float, heading: float, v: float) -> Pose;

    fn step(&mut self, dt: float, state: Pose, control: &Control) -> Pose;
}

/// The controller's bicycle model integrated with a fixed number of substeps per call, so the
/// plant is resolved more finely than the controller's prediction.
pub struct KinematicSimulation {
    Lf: float,
    substeps: u32,
}

impl KinematicSimulation {
    pub fn new(Lf: float) -> KinematicSimulation {
        KinematicSimulation { Lf, substeps: 20 }
    }
}

impl SimulationModel for KinematicSimulation {
    fn name() -> &'static str {
        "kinematic_simulation"
    }

    fn init_state(&self, x: float, y: float, heading: float, v: float) -> Pose {
        Pose { x, y, heading, v }
    }

    fn step(&mut self, dt: float, mut state: Pose, control: &Control) -> Pose {
        if dt <= 0.0 {
            return state;
        }
        let h = dt / float::from(self.substeps);
        for _ in 0..self.substeps {
            let (sin, cos) = state.heading.sin_cos();
            state = Pose {
                x: state.x + state.v * cos * h,
                y: state.y + state.v * sin * h,
                heading: normalise_angle(state.heading + state.v * control.delta / self.Lf * h),
                v: max(0.0, state.v + control.a * h),
            };
        }
        state
    }
}
