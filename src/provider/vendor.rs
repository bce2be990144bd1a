//! Vendor HMD sensor — binds a native eye-tracking middleware behind the
//! `VendorSdk` seam and plays its samples onto the bus from a dedicated
//! listener thread.
//!
//! The listener thread stands in for the driver's native callback: it
//! fires at the driver's cadence, not the host's, so everything it runs
//! must be non-blocking and free of I/O. Raw driver samples arrive in
//! millimetres with a mirrored X axis and are converted here into the
//! head-local metre convention the rest of the pipeline uses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProviderKind, SensorProvider};
use crate::bus::GazeBus;
use crate::error::AcquireError;
use crate::math::{Ray, Vec3};
use crate::sample::{EyeState, GazeSample};

// ── Raw driver sample ───────────────────────────────────────

/// Per-eye fields as the driver middleware reports them.
#[derive(Debug, Clone, Copy)]
pub struct RawEyeData {
    /// Eye origin in millimetres, driver axis convention.
    pub origin_mm: [f32; 3],
    /// Gaze direction, driver axis convention (unit-ish).
    pub direction: [f32; 3],
    pub openness: f32,
    pub pupil_diameter_mm: f32,
    /// Coarse validity flag. The middleware exposes a richer status word
    /// but only this bit is reliable across firmware revisions.
    pub valid: bool,
}

/// One raw sample from the vendor middleware.
#[derive(Debug, Clone, Copy)]
pub struct RawVendorSample {
    /// Driver clock, microseconds.
    pub timestamp_us: i64,
    pub left: RawEyeData,
    pub right: RawEyeData,
    pub combined_origin_mm: [f32; 3],
    pub combined_direction: [f32; 3],
    pub convergence_distance_mm: f32,
}

// ── SDK seam ────────────────────────────────────────────────

/// Minimal surface of a vendor eye-tracking middleware.
///
/// Concrete bindings live outside this crate; builds without a vendor
/// integration simply never construct a `VendorProvider`.
pub trait VendorSdk: Send {
    fn name(&self) -> &str;

    /// Bring the middleware up. Err carries the driver's reason.
    fn connect(&mut self) -> Result<(), String>;

    fn disconnect(&mut self);

    /// Non-blocking poll for the next raw sample.
    fn poll(&mut self) -> Option<RawVendorSample>;

    /// Hand off to the vendor's calibration UI. Returns false if refused.
    fn launch_calibration(&mut self) -> bool;

    /// Driver-determined sample cadence.
    fn cadence_hz(&self) -> f32 {
        120.0
    }
}

// ── Conversion ──────────────────────────────────────────────

fn convert_eye_ray(origin_mm: [f32; 3], direction: [f32; 3]) -> Ray {
    // mm -> m, and mirror X into the target coordinate convention.
    let origin = Vec3::new(
        -origin_mm[0] * 1e-3,
        origin_mm[1] * 1e-3,
        origin_mm[2] * 1e-3,
    );
    let dir = Vec3::new(-direction[0], direction[1], direction[2]);
    Ray::new(origin, dir)
}

/// Convert a raw driver sample into the pipeline's sample type.
///
/// `host_timestamp` is left at zero; the acquisition service stamps it
/// when the sample is absorbed.
pub fn convert(raw: &RawVendorSample) -> GazeSample {
    GazeSample {
        device_timestamp: raw.timestamp_us,
        host_timestamp: 0.0,
        left_ray: convert_eye_ray(raw.left.origin_mm, raw.left.direction),
        right_ray: convert_eye_ray(raw.right.origin_mm, raw.right.direction),
        combined_ray: convert_eye_ray(raw.combined_origin_mm, raw.combined_direction),
        gaze_distance: raw.convergence_distance_mm * 1e-3,
        left_eye: EyeState {
            validity: raw.left.valid,
            openness: raw.left.openness,
            pupil_diameter_mm: raw.left.pupil_diameter_mm,
        },
        right_eye: EyeState {
            validity: raw.right.valid,
            openness: raw.right.openness,
            pupil_diameter_mm: raw.right.pupil_diameter_mm,
        },
    }
}

// ── Provider ────────────────────────────────────────────────

/// Callback-thread provider over a vendor middleware.
pub struct VendorProvider {
    sdk: Arc<Mutex<Box<dyn VendorSdk>>>,
    bus: Arc<GazeBus>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    last: Arc<Mutex<Option<GazeSample>>>,
    initialized: bool,
}

impl VendorProvider {
    pub fn new(sdk: Box<dyn VendorSdk>, bus: Arc<GazeBus>) -> Self {
        Self {
            sdk: Arc::new(Mutex::new(sdk)),
            bus,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            last: Arc::new(Mutex::new(None)),
            initialized: false,
        }
    }
}

impl SensorProvider for VendorProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Vendor
    }

    fn initialize(&mut self) -> Result<(), AcquireError> {
        let mut sdk = self.sdk.lock().unwrap();
        let name = sdk.name().to_string();
        match sdk.connect() {
            Ok(()) => {
                info!("vendor provider: {} connected", name);
                self.initialized = true;
                Ok(())
            }
            Err(reason) => {
                warn!("vendor provider: {} failed to connect: {}", name, reason);
                Err(AcquireError::ProviderInit(reason))
            }
        }
    }

    fn calibrate(&mut self) -> bool {
        self.sdk.lock().unwrap().launch_calibration()
    }

    fn start_listening(&mut self) {
        if self.worker.is_some() || !self.initialized {
            return;
        }
        self.stop.store(false, Ordering::Release);

        let sdk = self.sdk.clone();
        let bus = self.bus.clone();
        let stop = self.stop.clone();
        let last = self.last.clone();
        let period = {
            let hz = sdk.lock().unwrap().cadence_hz().max(1.0);
            Duration::from_secs_f32(1.0 / hz)
        };

        self.worker = Some(std::thread::spawn(move || {
            debug!("vendor listener thread up ({:?} period)", period);
            while !stop.load(Ordering::Acquire) {
                let raw = sdk.lock().unwrap().poll();
                if let Some(raw) = raw {
                    let sample = convert(&raw);
                    *last.lock().unwrap() = Some(sample);
                    bus.publish(&sample);
                }
                std::thread::sleep(period);
            }
            debug!("vendor listener thread down");
        }));
    }

    fn stop_listening(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn latest_sample(&self) -> Option<GazeSample> {
        *self.last.lock().unwrap()
    }
}

impl Drop for VendorProvider {
    fn drop(&mut self) {
        self.stop_listening();
        self.sdk.lock().unwrap().disconnect();
    }
}

// ── Scripted SDK ────────────────────────────────────────────

/// Scripted middleware that replays a queue of raw samples. Exists so
/// integration tests can drive the vendor path without hardware.
pub struct ScriptedVendorSdk {
    samples: Mutex<VecDeque<RawVendorSample>>,
    connect_error: Option<String>,
    pub calibration_accepted: bool,
}

impl ScriptedVendorSdk {
    pub fn new(samples: Vec<RawVendorSample>) -> Self {
        Self {
            samples: Mutex::new(VecDeque::from(samples)),
            connect_error: None,
            calibration_accepted: true,
        }
    }

    /// An SDK whose `connect` fails with the given reason.
    pub fn failing(reason: &str) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            connect_error: Some(reason.to_string()),
            calibration_accepted: false,
        }
    }
}

impl VendorSdk for ScriptedVendorSdk {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(&mut self) -> Result<(), String> {
        match &self.connect_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn disconnect(&mut self) {}

    fn poll(&mut self) -> Option<RawVendorSample> {
        self.samples.lock().unwrap().pop_front()
    }

    fn launch_calibration(&mut self) -> bool {
        self.calibration_accepted
    }

    fn cadence_hz(&self) -> f32 {
        // Fast cadence keeps scripted queues draining quickly in tests.
        1000.0
    }
}
