//! Gaze sample data model — the immutable unit produced by a sensor
//! provider and fanned out through the event bus.
//!
//! Samples carry head-local rays only. World-space rays are derived on
//! read by applying the current head pose (see `GazeSnapshot`) and are
//! never stored or recorded.

use crate::math::{HeadPose, Ray};

// ── Per-eye state ───────────────────────────────────────────

/// Per-eye metrics attached to a sample.
///
/// `validity` is a coarse per-eye flag. Providers differ in how much
/// signal is behind it: the simulated provider always reports `true`,
/// vendor drivers map whatever coarse status their middleware exposes.
/// Consumers must not assume finer granularity than on/off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeState {
    pub validity: bool,
    /// Eye openness in [0, 1].
    pub openness: f32,
    /// Pupil diameter in millimetres.
    pub pupil_diameter_mm: f32,
}

impl EyeState {
    pub fn invalid() -> Self {
        Self {
            validity: false,
            openness: 0.0,
            pupil_diameter_mm: 0.0,
        }
    }
}

// ── Gaze sample ─────────────────────────────────────────────

/// One timestamped snapshot of binocular gaze, in head-local coordinates.
///
/// Immutable once produced, with a single exception: `host_timestamp` is
/// assigned exactly once by the acquisition service when the sample is
/// absorbed into host state. Producing threads leave it at zero because
/// they have no access to host-frame time.
#[derive(Debug, Clone, Copy)]
pub struct GazeSample {
    /// Monotonic clock value from the sensor's own clock domain. The unit
    /// is provider-defined and not comparable across providers.
    pub device_timestamp: i64,
    /// Seconds since host session start, stamped on absorption.
    pub host_timestamp: f64,
    /// Left-eye gaze ray, head-local.
    pub left_ray: Ray,
    /// Right-eye gaze ray, head-local.
    pub right_ray: Ray,
    /// Combined (cyclopean) gaze ray, head-local.
    pub combined_ray: Ray,
    /// Distance to the presumed fixation point, metres.
    pub gaze_distance: f32,
    pub left_eye: EyeState,
    pub right_eye: EyeState,
}

impl GazeSample {
    /// Copy of this sample with the host timestamp assigned.
    pub fn stamped(mut self, host_secs: f64) -> Self {
        self.host_timestamp = host_secs;
        self
    }
}

// ── Derived world-space view ────────────────────────────────

/// A sample paired with its world-space rays, recomputed from the head
/// pose at the moment of the read.
#[derive(Debug, Clone, Copy)]
pub struct GazeSnapshot {
    pub sample: GazeSample,
    pub world_left: Ray,
    pub world_right: Ray,
    pub world_combined: Ray,
}

impl GazeSnapshot {
    pub fn derive(sample: GazeSample, head: &HeadPose) -> Self {
        Self {
            world_left: head.transform_ray(&sample.left_ray),
            world_right: head.transform_ray(&sample.right_ray),
            world_combined: head.transform_ray(&sample.combined_ray),
            sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Quat, Vec3};

    pub(crate) fn forward_sample(device_timestamp: i64) -> GazeSample {
        let fwd = Vec3::new(0.0, 0.0, 1.0);
        GazeSample {
            device_timestamp,
            host_timestamp: 0.0,
            left_ray: Ray::new(Vec3::new(-0.031, 0.0, 0.0), fwd),
            right_ray: Ray::new(Vec3::new(0.031, 0.0, 0.0), fwd),
            combined_ray: Ray::new(Vec3::ZERO, fwd),
            gaze_distance: 2.0,
            left_eye: EyeState {
                validity: true,
                openness: 1.0,
                pupil_diameter_mm: 4.0,
            },
            right_eye: EyeState {
                validity: true,
                openness: 1.0,
                pupil_diameter_mm: 4.0,
            },
        }
    }

    #[test]
    fn test_stamped_sets_host_timestamp_only() {
        let s = forward_sample(42).stamped(1.25);
        assert_eq!(s.host_timestamp, 1.25);
        assert_eq!(s.device_timestamp, 42);
        assert_eq!(s.gaze_distance, 2.0);
    }

    #[test]
    fn test_snapshot_applies_head_pose() {
        let s = forward_sample(1);
        let head = HeadPose {
            position: Vec3::new(0.0, 1.6, 0.0),
            rotation: Quat::IDENTITY,
        };
        let snap = GazeSnapshot::derive(s, &head);
        assert!((snap.world_combined.origin.y - 1.6).abs() < 1e-6);
        // Local rays on the sample are untouched
        assert_eq!(snap.sample.combined_ray.origin, Vec3::ZERO);
    }

    #[test]
    fn test_snapshot_rotates_all_three_rays() {
        let s = forward_sample(1);
        let head = HeadPose {
            position: Vec3::ZERO,
            rotation: Quat::from_euler(std::f32::consts::FRAC_PI_2, 0.0, 0.0),
        };
        let snap = GazeSnapshot::derive(s, &head);
        for ray in [snap.world_left, snap.world_right, snap.world_combined] {
            assert!((ray.direction.x - 1.0).abs() < 1e-5, "got {:?}", ray);
        }
    }

    #[test]
    fn test_invalid_eye_state() {
        let e = EyeState::invalid();
        assert!(!e.validity);
        assert_eq!(e.openness, 0.0);
    }
}
