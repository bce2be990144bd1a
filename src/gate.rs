//! Visibility gate — two-state controller that hides registered scene
//! groups when the combined gaze direction strays beyond an angular
//! threshold from the forward reference, and restores them when gaze
//! returns.
//!
//! Evaluated once per render tick against the latest sample's head-local
//! combined direction. Transitions are edge-triggered: a tick that lands
//! in the current state does nothing.

use std::sync::Arc;
use tracing::{debug, info};

use crate::math::Vec3;

// ── Config ──────────────────────────────────────────────────

/// Configuration for the visibility gate.
#[derive(Debug, Clone, Copy)]
pub struct GateConfig {
    /// Angular threshold in degrees; gaze inside the cone keeps content
    /// visible.
    pub threshold_deg: f32,
    /// Forward reference direction, head-local.
    pub forward: Vec3,
    /// Seconds after startup during which the gate is forced Visible,
    /// so unstabilized tracking cannot hide content spuriously.
    pub grace_period_s: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold_deg: 2.5,
            forward: Vec3::new(0.0, 0.0, 1.0),
            grace_period_s: 0.0,
        }
    }
}

// ── State ───────────────────────────────────────────────────

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Visible,
    Hidden,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }
}

/// Edge transition produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// Content was just hidden.
    Hid,
    /// Content was just restored.
    Shown,
}

// ── Collaborator seam ───────────────────────────────────────

/// External scene effects the gate drives on transitions.
pub trait SceneActions: Send + Sync {
    fn set_group_active(&self, name: &str, active: bool);
    /// Put the focal marker back in its original structural placement.
    fn restore_focal_marker(&self, name: &str);
    /// Ask the grid collaborator for a full rebuild; geometry may have
    /// drifted while hidden.
    fn force_grid_rebuild(&self);
    fn exit_focus_mode(&self);
}

// ── Gate ────────────────────────────────────────────────────

/// Gaze-driven visibility controller.
pub struct VisibilityGate {
    config: GateConfig,
    state: GateState,
    groups: Vec<String>,
    focal_marker: Option<String>,
    actions: Arc<dyn SceneActions>,
}

impl VisibilityGate {
    pub fn new(config: GateConfig, actions: Arc<dyn SceneActions>) -> Self {
        Self {
            config,
            state: GateState::Visible,
            groups: Vec::new(),
            focal_marker: None,
            actions,
        }
    }

    /// Register a toggle-target group.
    pub fn register_group(&mut self, name: &str) {
        self.groups.push(name.to_string());
    }

    /// Designate the always-visible focal marker. It is skipped when
    /// hiding and restored to its original placement when showing.
    pub fn set_focal_marker(&mut self, name: &str) {
        self.focal_marker = Some(name.to_string());
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Evaluate one render tick. `combined_dir` is the latest sample's
    /// head-local combined gaze direction; with no sample the state is
    /// left unchanged.
    pub fn tick(&mut self, now_s: f64, combined_dir: Option<Vec3>) -> Option<GateEvent> {
        let target = if now_s < self.config.grace_period_s {
            GateState::Visible
        } else {
            let dir = combined_dir?;
            let angle = self.config.forward.angle_to_deg(dir);
            if angle < self.config.threshold_deg {
                GateState::Visible
            } else {
                GateState::Hidden
            }
        };

        if target == self.state {
            return None;
        }
        self.state = target;

        match target {
            GateState::Hidden => {
                for group in &self.groups {
                    if Some(group) == self.focal_marker.as_ref() {
                        continue;
                    }
                    self.actions.set_group_active(group, false);
                }
                self.actions.exit_focus_mode();
                info!("visibility gate: content hidden");
                Some(GateEvent::Hid)
            }
            GateState::Visible => {
                for group in &self.groups {
                    self.actions.set_group_active(group, true);
                }
                if let Some(marker) = &self.focal_marker {
                    self.actions.restore_focal_marker(marker);
                }
                self.actions.force_grid_rebuild();
                debug!("visibility gate: content restored, rebuild requested");
                Some(GateEvent::Shown)
            }
        }
    }
}
