//! Simulated sensor — cursor-driven gaze for development without eye
//! tracking hardware.
//!
//! Runs as a cooperative periodic task on the host tick (no thread of its
//! own): every fixed interval it takes the camera-through-pointer ray and
//! derives a plausible binocular geometry from a configured interpupillary
//! distance, then publishes through the same bus as the hardware variants
//! so downstream handling is identical.

use std::sync::Arc;
use tracing::debug;

use super::{ProviderKind, SensorProvider};
use crate::bus::GazeBus;
use crate::error::AcquireError;
use crate::math::{Ray, Vec3};
use crate::sample::{EyeState, GazeSample};

/// Configuration for the simulated provider.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedProviderConfig {
    /// Sampling interval in seconds.
    pub interval_s: f64,
    /// Interpupillary distance in metres.
    pub ipd_m: f32,
    /// Fixation distance assumed along the pointer ray, metres.
    pub gaze_distance_m: f32,
    /// Pupil diameter reported on every sample, millimetres.
    pub pupil_diameter_mm: f32,
}

impl Default for SimulatedProviderConfig {
    fn default() -> Self {
        Self {
            interval_s: 1.0 / 120.0,
            ipd_m: 0.063,
            gaze_distance_m: 2.0,
            pupil_diameter_mm: 4.0,
        }
    }
}

/// Cursor-driven simulated gaze provider.
pub struct SimulatedProvider {
    config: SimulatedProviderConfig,
    bus: Arc<GazeBus>,
    listening: bool,
    last_emit_s: Option<f64>,
    last_direction: Vec3,
    last: Option<GazeSample>,
}

impl SimulatedProvider {
    pub fn new(config: SimulatedProviderConfig, bus: Arc<GazeBus>) -> Self {
        Self {
            config,
            bus,
            listening: false,
            last_emit_s: None,
            last_direction: Vec3::new(0.0, 0.0, 1.0),
            last: None,
        }
    }

    /// Build one binocular sample looking along `pointer_ray`.
    fn synthesize(&self, now_s: f64, pointer_ray: &Ray) -> GazeSample {
        let fixation = Ray::new(Vec3::ZERO, pointer_ray.direction).at(self.config.gaze_distance_m);
        let half_ipd = self.config.ipd_m * 0.5;
        let left_origin = Vec3::new(-half_ipd, 0.0, 0.0);
        let right_origin = Vec3::new(half_ipd, 0.0, 0.0);

        let toward = |origin: Vec3| {
            Vec3::new(
                fixation.x - origin.x,
                fixation.y - origin.y,
                fixation.z - origin.z,
            )
        };

        let eye = EyeState {
            validity: true,
            openness: 1.0,
            pupil_diameter_mm: self.config.pupil_diameter_mm,
        };

        GazeSample {
            // The simulated sensor's own clock domain: microseconds of
            // host session time.
            device_timestamp: (now_s * 1_000_000.0) as i64,
            host_timestamp: 0.0,
            left_ray: Ray::new(left_origin, toward(left_origin)),
            right_ray: Ray::new(right_origin, toward(right_origin)),
            combined_ray: Ray::new(Vec3::ZERO, pointer_ray.direction),
            gaze_distance: self.config.gaze_distance_m,
            left_eye: eye,
            right_eye: eye,
        }
    }
}

impl SensorProvider for SimulatedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Simulated
    }

    fn initialize(&mut self) -> Result<(), AcquireError> {
        Ok(())
    }

    fn calibrate(&mut self) -> bool {
        // Nothing to calibrate against.
        debug!("simulated provider: calibration no-op");
        true
    }

    fn start_listening(&mut self) {
        self.listening = true;
        self.last_emit_s = None;
    }

    fn stop_listening(&mut self) {
        self.listening = false;
    }

    fn latest_sample(&self) -> Option<GazeSample> {
        self.last
    }

    fn drive(&mut self, now_s: f64, pointer_ray: Option<&Ray>) {
        if !self.listening {
            return;
        }
        if let Some(last) = self.last_emit_s {
            if now_s - last < self.config.interval_s {
                return;
            }
        }
        if let Some(ray) = pointer_ray {
            self.last_direction = ray.direction;
        }
        let ray = Ray::new(Vec3::ZERO, self.last_direction);
        let sample = self.synthesize(now_s, &ray);
        self.last_emit_s = Some(now_s);
        self.last = Some(sample);
        self.bus.publish(&sample);
    }
}
