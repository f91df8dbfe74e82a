use prelude::*;

use crate::config::TrackConfig;

/// Centreline waypoints in world coordinates, ordered along the direction of travel.
pub struct Track {
    waypoints: Vec<(float, float)>,
}

impl Track {
    pub fn from_config(config: &TrackConfig) -> Track {
        Track::sinusoid(
            config.amplitude,
            config.wavelength,
            config.length,
            config.spacing,
        )
    }

    /// `y = amplitude * sin(2 pi x / wavelength)` sampled every `spacing` metres of x.
    pub fn sinusoid(amplitude: float, wavelength: float, length: float, spacing: float) -> Track {
        let n = (length / spacing).ceil() as usize + 1;
        let waypoints = (0..n)
            .map(|i| {
                let x = i as float * spacing;
                (x, amplitude * (2.0 * PI * x / wavelength).sin())
            })
            .collect();
        Track { waypoints }
    }

    pub fn waypoints(&self) -> &[(float, float)] {
        &self.waypoints
    }

    pub fn nearest(&self, px: float, py: float) -> usize {
        let dist2 = |&(x, y): &(float, float)| (x - px).powi(2) + (y - py).powi(2);
        self.waypoints
            .iter()
            .enumerate()
            .min_by(|a, b| {
                dist2(a.1)
                    .partial_cmp(&dist2(b.1))
                    .expect("waypoint distance is NaN")
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Up to `n` waypoints starting from the one before the nearest, so the fit covers the car's
    /// position. Fewer are returned near the end of the track.
    pub fn waypoints_ahead(&self, px: float, py: float, n: usize) -> &[(float, float)] {
        let start = self.nearest(px, py).saturating_sub(1);
        let end = (start + n).min(self.waypoints.len());
        &self.waypoints[start..end]
    }

    /// Distance from the point to the nearest centreline segment.
    pub fn distance(&self, px: float, py: float) -> float {
        let i = self.nearest(px, py);
        let segment_distance = |a: (float, float), b: (float, float)| {
            let (dx, dy) = (b.0 - a.0, b.1 - a.1);
            let len2 = dx * dx + dy * dy;
            let s = if len2 > 0.0 {
                (((px - a.0) * dx + (py - a.1) * dy) / len2).max(0.0).min(1.0)
            } else {
                0.0
            };
            ((a.0 + s * dx - px).powi(2) + (a.1 + s * dy - py).powi(2)).sqrt()
        };

        let mut d = INFINITY;
        if i > 0 {
            d = min(d, segment_distance(self.waypoints[i - 1], self.waypoints[i]));
        }
        if i + 1 < self.waypoints.len() {
            d = min(d, segment_distance(self.waypoints[i], self.waypoints[i + 1]));
        }
        if d.is_infinite() {
            let (x, y) = self.waypoints[i];
            d = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
        }
        d
    }

    /// Whether the car has passed the last waypoint.
    pub fn finished(&self, px: float, py: float) -> bool {
        self.nearest(px, py) + 1 >= self.waypoints.len()
    }
}
