use serde::Deserialize;
use std::fs::File;
use std::io::Read;

use prelude::*;

static CONFIG_FILE: &str = "simulator.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Simulated seconds.
    pub t: float,
    /// Control period.
    pub dt: float,
    /// Delay between measuring the state and the new command taking effect. At most `dt`.
    pub latency: float,
    pub real_time: bool,
    /// Seed each solve with the previous solution shifted by one step.
    pub warm_start: bool,
    pub initial_speed: float,
    /// Standard deviations of the measurement noise.
    pub position_noise: float,
    pub heading_noise: float,
    /// Number of waypoints ahead of the car used for each fit.
    pub lookahead: usize,
    pub controller_config: String,
    pub flame_graph: Option<String>,
    pub track: TrackConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackConfig {
    pub amplitude: float,
    pub wavelength: float,
    pub length: float,
    pub spacing: float,
}

impl SimulatorConfig {
    pub fn load() -> SimulatorConfig {
        let mut config_str = String::new();
        File::open(CONFIG_FILE)
            .expect("unable to open simulator.toml")
            .read_to_string(&mut config_str)
            .expect("unable to read simulator.toml as utf8");
        let config: SimulatorConfig =
            toml::from_str(&config_str[..]).expect("unable to deserialise simulator.toml");
        config.check();
        config
    }

    fn check(&self) {
        assert!(self.t > 0.0 && self.dt > 0.0, "t and dt must be positive");
        assert!(
            self.latency >= 0.0 && self.latency <= self.dt,
            "latency must be between 0 and dt"
        );
        assert!(self.lookahead >= 2, "lookahead must be at least 2 waypoints");
        assert!(
            self.track.spacing > 0.0 && self.track.wavelength > 0.0,
            "track spacing and wavelength must be positive"
        );
    }
}
