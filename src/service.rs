//! Acquisition service — the orchestrator that owns provider selection,
//! holds the latest sample, runs recording sessions, and composes the
//! per-tick object stream.
//!
//! Constructed explicitly once per process and passed by handle to its
//! dependents; lifecycle is `new` .. `shutdown`, no ambient global.
//!
//! The bus callback this service registers may run on a vendor driver
//! thread, so it touches only the absorber state (atomics, the latest-
//! sample mutex, and the gaze queue sender) and never the session locks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use tracing::{info, warn};

use crate::bus::{GazeBus, SubscriberId};
use crate::clock::Clock;
use crate::error::AcquireError;
use crate::math::{HeadPose, Quat, Ray, Vec3};
use crate::provider::{self, ProviderKind, SensorProvider, SimulatedProviderConfig, VendorSdk};
use crate::recording::format::{self, RayHit, RecordSpace, TrackedElement};
use crate::recording::writer::{spawn_flush_schedule, FlushOutcome, FlushWorker};
use crate::recording::{SessionPaths, WriterConfig, WriterStatsSnapshot};
use crate::sample::{GazeSample, GazeSnapshot};

// ── Collaborator seams ──────────────────────────────────────

/// Supplies the current head pose for local→world ray conversion.
pub trait HeadPoseSource: Send + Sync {
    fn head_pose(&self) -> HeadPose;
}

/// Scene ray-cast service used for optional hit recording.
pub trait RayCaster: Send + Sync {
    fn cast(&self, ray: &Ray) -> Option<RayHit>;
}

// ── Configuration ───────────────────────────────────────────

/// Startup configuration for the acquisition service.
pub struct ServiceConfig {
    /// Requested provider; `None` = auto-select.
    pub provider: Option<ProviderKind>,
    pub simulated: SimulatedProviderConfig,
    pub writer: WriterConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider: None,
            simulated: SimulatedProviderConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

// ── Absorber ────────────────────────────────────────────────

/// State the bus callback writes into. Shared with the callback closure,
/// which may run off the host thread.
struct Absorber {
    /// Host-frame time cached once per tick, stored as f64 bits. The
    /// callback must not read host-frame time directly.
    frame_time_bits: AtomicU64,
    recording: AtomicBool,
    latest: Mutex<Option<GazeSample>>,
    gaze_tx: Sender<GazeSample>,
}

impl Absorber {
    fn absorb(&self, sample: &GazeSample) {
        let host_secs = f64::from_bits(self.frame_time_bits.load(Ordering::Acquire));
        let stamped = sample.stamped(host_secs);
        *self.latest.lock().unwrap() = Some(stamped);
        if self.recording.load(Ordering::Acquire) {
            // Receiver lives as long as the flush worker; a send can only
            // fail after teardown, where the row is moot anyway.
            let _ = self.gaze_tx.send(stamped);
        }
    }
}

// ── Session control ─────────────────────────────────────────

struct SessionCtl {
    output_dir: Option<PathBuf>,
    paths: Option<SessionPaths>,
    schedule: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

// ── Service ─────────────────────────────────────────────────

/// The acquisition orchestrator.
pub struct GazeService {
    clock: Arc<dyn Clock>,
    bus: Arc<GazeBus>,
    absorber: Arc<Absorber>,
    subscription: Mutex<Option<SubscriberId>>,
    provider: Mutex<Box<dyn SensorProvider>>,
    head_pose: Arc<dyn HeadPoseSource>,
    raycaster: Option<Arc<dyn RayCaster>>,
    worker: Arc<FlushWorker>,
    object_tx: Sender<String>,
    object_recording: AtomicBool,
    elements: Mutex<Vec<TrackedElement>>,
    message_slot: Mutex<Option<String>>,
    session: Mutex<SessionCtl>,
    writer_config: WriterConfig,
}

impl GazeService {
    /// Build the service: installs the configured provider (with vendor →
    /// simulated fallback), registers on the bus, and starts listening.
    pub fn new(
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
        bus: Arc<GazeBus>,
        head_pose: Arc<dyn HeadPoseSource>,
        raycaster: Option<Arc<dyn RayCaster>>,
        sdk: Option<Box<dyn VendorSdk>>,
    ) -> Self {
        let (object_tx, object_rx) = unbounded();
        let (gaze_tx, gaze_rx) = unbounded();
        let worker = Arc::new(FlushWorker::new(object_rx, gaze_rx));

        let absorber = Arc::new(Absorber {
            frame_time_bits: AtomicU64::new(0f64.to_bits()),
            recording: AtomicBool::new(false),
            latest: Mutex::new(None),
            gaze_tx,
        });

        let sub = {
            let absorber = absorber.clone();
            bus.subscribe(move |sample| absorber.absorb(sample))
        };

        let mut provider = provider::install(config.provider, bus.clone(), sdk, config.simulated);
        provider.start_listening();
        info!("acquisition service up ({})", provider.kind().as_str());

        Self {
            clock,
            bus,
            absorber,
            subscription: Mutex::new(Some(sub)),
            provider: Mutex::new(provider),
            head_pose,
            raycaster,
            worker,
            object_tx,
            object_recording: AtomicBool::new(true),
            elements: Mutex::new(Vec::new()),
            message_slot: Mutex::new(None),
            session: Mutex::new(SessionCtl {
                output_dir: None,
                paths: None,
                schedule: None,
            }),
            writer_config: config.writer,
        }
    }

    /// Which provider variant ended up installed.
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.lock().unwrap().kind()
    }

    // ── Per-tick path ───────────────────────────────────────

    /// Advance the host tick: cache host-frame time for the absorber,
    /// drive cooperative providers, and compose one tracking record when
    /// a session is active and object recording is on.
    pub fn tick(&self, pointer_ray: Option<&Ray>) {
        let now = self.clock.session_secs();
        self.absorber
            .frame_time_bits
            .store(now.to_bits(), Ordering::Release);

        self.provider.lock().unwrap().drive(now, pointer_ray);

        if self.absorber.recording.load(Ordering::Acquire)
            && self.object_recording.load(Ordering::Acquire)
        {
            self.compose_record(now);
        }
    }

    fn compose_record(&self, now: f64) {
        let latest = *self.absorber.latest.lock().unwrap();
        let device_timestamp = latest.map(|s| s.device_timestamp).unwrap_or(0);

        let hit = match (&self.raycaster, latest) {
            (Some(caster), Some(sample)) => {
                let snap = GazeSnapshot::derive(sample, &self.head_pose.head_pose());
                caster.cast(&snap.world_combined)
            }
            _ => None,
        };

        let message = self.message_slot.lock().unwrap().take();
        let elements = self.elements.lock().unwrap();
        let row = format::object_row(
            now,
            device_timestamp,
            &elements,
            self.raycaster.is_some(),
            hit.as_ref(),
            message.as_deref(),
        );
        drop(elements);
        let _ = self.object_tx.send(row);
    }

    // ── Pull interface ──────────────────────────────────────

    /// Latest sample with world-space rays recomputed from the current
    /// head pose at call time. Never cached.
    pub fn gaze_data(&self) -> Option<GazeSnapshot> {
        let sample = (*self.absorber.latest.lock().unwrap())?;
        Some(GazeSnapshot::derive(sample, &self.head_pose.head_pose()))
    }

    /// Delegate to the active provider's calibration procedure.
    pub fn calibrate(&self) -> bool {
        self.provider.lock().unwrap().calibrate()
    }

    // ── Tracked elements ────────────────────────────────────

    /// Register a scene element for the object stream. Registration
    /// order fixes the column order; register everything before
    /// `start_recording`.
    pub fn register_tracked(&self, name: &str, space: RecordSpace) {
        self.elements
            .lock()
            .unwrap()
            .push(TrackedElement::new(name, space));
    }

    /// Update a registered element's pose. Returns false if unknown.
    pub fn set_tracked_pose(&self, name: &str, position: Vec3, rotation: Quat) -> bool {
        let mut elements = self.elements.lock().unwrap();
        match elements.iter_mut().find(|e| e.name == name) {
            Some(e) => {
                e.position = position;
                e.rotation = rotation;
                true
            }
            None => false,
        }
    }

    /// Gate the object stream independently of the session flag.
    pub fn set_object_recording(&self, enabled: bool) {
        self.object_recording.store(enabled, Ordering::Release);
    }

    /// Tag the NEXT tracking record with a free-text message. A second
    /// call before a record is composed overwrites the first.
    pub fn write_message(&self, msg: &str) {
        *self.message_slot.lock().unwrap() = Some(msg.to_string());
    }

    // ── Recording sessions ──────────────────────────────────

    pub fn set_output_folder(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!("output folder set to {}", path.display());
        self.session.lock().unwrap().output_dir = Some(path);
    }

    /// Begin a recording session: resolve collision-safe file names,
    /// clear both queues, write both headers, and ensure the periodic
    /// flush schedule is running.
    pub fn start_recording(&self, name: &str) -> Result<SessionPaths, AcquireError> {
        let mut session = self.session.lock().unwrap();

        if self.absorber.recording.load(Ordering::Acquire) {
            warn!("start_recording(\"{}\") refused: session already active", name);
            return Err(AcquireError::RecordingActive);
        }
        let dir = session
            .output_dir
            .clone()
            .ok_or(AcquireError::OutputFolderUnset)?;

        let paths = format::session_paths(&dir, name);
        self.worker.clear_queues();

        let elements = self.elements.lock().unwrap();
        let object_header = format::object_header(&elements, self.raycaster.is_some());
        drop(elements);
        write_header(&paths.object, &object_header)?;
        write_header(&paths.gaze, &format::gaze_header())?;

        self.worker.set_paths(paths.clone());
        session.paths = Some(paths.clone());

        if session.schedule.is_none() {
            let stop = Arc::new(AtomicBool::new(false));
            match spawn_flush_schedule(
                self.worker.clone(),
                self.writer_config.flush_interval,
                stop.clone(),
            ) {
                Ok(handle) => session.schedule = Some((stop, handle)),
                Err(e) => {
                    warn!("could not spawn flush schedule ({e}); rows flush at teardown only")
                }
            }
        }

        self.absorber.recording.store(true, Ordering::Release);
        info!(
            "recording session started: {} / {}",
            paths.object.display(),
            paths.gaze.display()
        );
        Ok(paths)
    }

    /// End the session. Buffered rows flush at the next scheduled writer
    /// run and again at teardown; nothing is flushed here.
    pub fn stop_recording(&self) {
        self.absorber.recording.store(false, Ordering::Release);
        info!("recording session stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.absorber.recording.load(Ordering::Acquire)
    }

    /// File paths of the current (or last) session.
    pub fn session_paths(&self) -> Option<SessionPaths> {
        self.session.lock().unwrap().paths.clone()
    }

    /// Run one flush immediately on the calling thread.
    pub fn flush_now(&self) -> FlushOutcome {
        self.worker.run_once()
    }

    pub fn writer_stats(&self) -> WriterStatsSnapshot {
        self.worker.stats()
    }

    // ── Teardown ────────────────────────────────────────────

    /// Stop sample production, halt the flush schedule, and run the
    /// final synchronous flush.
    pub fn shutdown(&self) {
        self.provider.lock().unwrap().stop_listening();
        if let Some(id) = self.subscription.lock().unwrap().take() {
            self.bus.unsubscribe(id);
        }
        self.absorber.recording.store(false, Ordering::Release);

        let schedule = self.session.lock().unwrap().schedule.take();
        if let Some((stop, handle)) = schedule {
            stop.store(true, Ordering::Release);
            let _ = handle.join();
        }
        self.worker.run_once();
        info!("acquisition service torn down");
    }
}

fn write_header(path: &std::path::Path, header: &str) -> Result<(), AcquireError> {
    std::fs::write(path, format!("{}\n", header)).map_err(|source| AcquireError::SessionFile {
        path: path.to_path_buf(),
        source,
    })
}
