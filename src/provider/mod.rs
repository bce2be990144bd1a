//! Sensor provider abstraction — pluggable drivers producing gaze samples.
//!
//! Variants are mutually exclusive and selected once at startup by a
//! config-time factory; switching at runtime is unsupported. A vendor
//! driver that fails to come up falls back to the simulated provider so
//! the pipeline is never left without a source.

pub mod simulated;
pub mod vendor;

pub use simulated::{SimulatedProvider, SimulatedProviderConfig};
pub use vendor::{ScriptedVendorSdk, VendorProvider, VendorSdk};

use std::sync::Arc;
use tracing::{info, warn};

use crate::bus::GazeBus;
use crate::error::AcquireError;
use crate::math::Ray;
use crate::sample::GazeSample;

// ── Provider kind ───────────────────────────────────────────

/// Which sensor variant is producing gaze data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Cursor-driven simulated gaze for development/testing.
    Simulated,
    /// Vendor HMD eye-tracking driver (callback thread).
    Vendor,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulated => "simulated",
            Self::Vendor => "vendor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "simulated" => Some(Self::Simulated),
            "vendor" => Some(Self::Vendor),
            "auto" => None, // auto selection
            _ => None,
        }
    }
}

// ── Capability set ──────────────────────────────────────────

/// Capability set every sensor variant implements.
pub trait SensorProvider: Send {
    fn kind(&self) -> ProviderKind;

    /// Bring the driver up. Failure here triggers the factory's fallback.
    fn initialize(&mut self) -> Result<(), AcquireError>;

    /// Run the variant's calibration procedure. Returns false if the
    /// driver refused or has no calibration (the simulated provider
    /// accepts trivially).
    fn calibrate(&mut self) -> bool;

    /// Begin producing samples. Idempotent.
    fn start_listening(&mut self);

    /// Deterministically halt sample production before returning. A
    /// subsequent `start_listening` resumes cleanly.
    fn stop_listening(&mut self);

    /// One-shot pull of the provider's last known sample.
    fn latest_sample(&self) -> Option<GazeSample>;

    /// Cooperative per-tick drive for providers sampled on the host's own
    /// execution context. `pointer_ray` is the camera-through-pointer ray
    /// in head-local coordinates. Callback-driven providers ignore this.
    fn drive(&mut self, _now_s: f64, _pointer_ray: Option<&Ray>) {}
}

// ── Factory ─────────────────────────────────────────────────

/// Resolve the configured selection to a concrete provider.
///
/// `requested = None` means auto: vendor when an SDK binding is supplied,
/// simulated otherwise. A vendor driver that fails `initialize` is logged
/// and replaced by the simulated provider; the returned provider is always
/// initialized.
pub fn install(
    requested: Option<ProviderKind>,
    bus: Arc<GazeBus>,
    sdk: Option<Box<dyn VendorSdk>>,
    sim_config: SimulatedProviderConfig,
) -> Box<dyn SensorProvider> {
    let want_vendor = match requested {
        Some(ProviderKind::Vendor) => true,
        Some(ProviderKind::Simulated) => false,
        None => sdk.is_some(),
    };

    if want_vendor {
        match sdk {
            Some(sdk) => {
                let mut provider = VendorProvider::new(sdk, bus.clone());
                match provider.initialize() {
                    Ok(()) => {
                        info!("provider: vendor driver installed");
                        return Box::new(provider);
                    }
                    Err(e) => {
                        warn!("provider: vendor driver failed ({e}), falling back to simulated");
                    }
                }
            }
            None => {
                warn!("provider: vendor requested but no SDK binding linked, falling back to simulated");
            }
        }
    }

    let mut provider = SimulatedProvider::new(sim_config, bus);
    // Simulated initialization cannot fail.
    let _ = provider.initialize();
    info!("provider: simulated driver installed");
    Box::new(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        assert_eq!(
            ProviderKind::from_str("simulated"),
            Some(ProviderKind::Simulated)
        );
        assert_eq!(ProviderKind::from_str("vendor"), Some(ProviderKind::Vendor));
        assert_eq!(ProviderKind::from_str("auto"), None);
        assert_eq!(ProviderKind::from_str("bogus"), None);
        assert_eq!(ProviderKind::Vendor.as_str(), "vendor");
    }

    #[test]
    fn test_factory_defaults_to_simulated() {
        let bus = Arc::new(GazeBus::new());
        let p = install(None, bus, None, SimulatedProviderConfig::default());
        assert_eq!(p.kind(), ProviderKind::Simulated);
    }

    #[test]
    fn test_factory_auto_prefers_vendor_when_sdk_present() {
        let bus = Arc::new(GazeBus::new());
        let sdk = Box::new(ScriptedVendorSdk::new(vec![]));
        let p = install(None, bus, Some(sdk), SimulatedProviderConfig::default());
        assert_eq!(p.kind(), ProviderKind::Vendor);
    }

    #[test]
    fn test_factory_falls_back_on_vendor_failure() {
        let bus = Arc::new(GazeBus::new());
        let sdk = Box::new(ScriptedVendorSdk::failing("middleware not running"));
        let p = install(
            Some(ProviderKind::Vendor),
            bus,
            Some(sdk),
            SimulatedProviderConfig::default(),
        );
        assert_eq!(p.kind(), ProviderKind::Simulated);
    }

    #[test]
    fn test_factory_vendor_without_sdk_falls_back() {
        let bus = Arc::new(GazeBus::new());
        let p = install(
            Some(ProviderKind::Vendor),
            bus,
            None,
            SimulatedProviderConfig::default(),
        );
        assert_eq!(p.kind(), ProviderKind::Simulated);
    }
}
