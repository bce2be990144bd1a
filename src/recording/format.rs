//! Row and header formats for the two recorded streams, plus session
//! file naming.
//!
//! Every column is comma-terminated and numeric fields carry exactly ten
//! fractional digits, so a session parses back bit-identically. Gaze rows
//! hold head-local coordinates only; world space is never persisted.

use std::path::{Path, PathBuf};

use crate::math::{Quat, Vec3};
use crate::sample::{EyeState, GazeSample};

// ── Tracked elements ────────────────────────────────────────

/// Which pose the object stream records for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSpace {
    Local,
    World,
}

impl RecordSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::World => "world",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "world" => Some(Self::World),
            _ => None,
        }
    }
}

/// A scene element whose pose is written once per render tick.
#[derive(Debug, Clone)]
pub struct TrackedElement {
    pub name: String,
    pub space: RecordSpace,
    pub position: Vec3,
    pub rotation: Quat,
}

impl TrackedElement {
    pub fn new(name: &str, space: RecordSpace) -> Self {
        Self {
            name: name.to_string(),
            space,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// A ray-cast hit appended to the object stream when a cast service is
/// wired in.
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    pub name: String,
    pub point: Vec3,
}

// ── Numeric formatting ──────────────────────────────────────

fn num(v: f32) -> String {
    format!("{:.10}", v)
}

fn time(v: f64) -> String {
    format!("{:.10}", v)
}

fn flag(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// ── Object stream ───────────────────────────────────────────

/// Header line for the object-pose stream.
pub fn object_header(elements: &[TrackedElement], with_hit: bool) -> String {
    let mut out = String::from("timestamp,eye_timestamp,");
    for e in elements {
        let (pos, rot) = match e.space {
            RecordSpace::Local => ("localPosition", "localRotation"),
            RecordSpace::World => ("position", "rotation"),
        };
        for axis in ["x", "y", "z"] {
            out.push_str(&format!("{}_{}.{},", e.name, pos, axis));
        }
        for axis in ["x", "y", "z", "w"] {
            out.push_str(&format!("{}_{}.{},", e.name, rot, axis));
        }
    }
    if with_hit {
        out.push_str("hit_object,hit_point.x,hit_point.y,hit_point.z,");
    }
    out.push_str("messages,");
    out
}

/// One object-stream row: host tick time, device timestamp of the latest
/// gaze sample, the per-element pose groups, the optional hit, the
/// optional message. A configured-but-missed cast writes empty hit
/// columns so the column count stays fixed.
pub fn object_row(
    host_secs: f64,
    device_timestamp: i64,
    elements: &[TrackedElement],
    with_hit: bool,
    hit: Option<&RayHit>,
    message: Option<&str>,
) -> String {
    let mut out = format!("{},{},", time(host_secs), device_timestamp);
    for e in elements {
        for v in [e.position.x, e.position.y, e.position.z] {
            out.push_str(&num(v));
            out.push(',');
        }
        for v in [e.rotation.x, e.rotation.y, e.rotation.z, e.rotation.w] {
            out.push_str(&num(v));
            out.push(',');
        }
    }
    if with_hit {
        match hit {
            Some(hit) => {
                out.push_str(&format!(
                    "{},{},{},{},",
                    hit.name,
                    num(hit.point.x),
                    num(hit.point.y),
                    num(hit.point.z)
                ));
            }
            None => out.push_str(",,,,"),
        }
    }
    out.push_str(message.unwrap_or(""));
    out.push(',');
    out
}

// ── Gaze stream ─────────────────────────────────────────────

/// Header line for the gaze stream.
pub fn gaze_header() -> String {
    let mut out = String::from("eye_timestamp,");
    for side in ["left", "right"] {
        out.push_str(&format!(
            "{side}_validity,{side}_eye_openness,{side}_eye_pupil_diameter,"
        ));
        for axis in ["x", "y", "z"] {
            out.push_str(&format!("{side}_eye_origin.{axis},"));
        }
        for axis in ["x", "y", "z"] {
            out.push_str(&format!("{side}_eye_gaze.{axis},"));
        }
    }
    for axis in ["x", "y", "z"] {
        out.push_str(&format!("combined_eye_origin.{axis},"));
    }
    for axis in ["x", "y", "z"] {
        out.push_str(&format!("combined_eye_gaze.{axis},"));
    }
    out.push_str("gaze_distance,");
    out
}

fn push_eye(out: &mut String, eye: &EyeState, origin: Vec3, gaze: Vec3) {
    out.push_str(&format!(
        "{},{},{},",
        flag(eye.validity),
        num(eye.openness),
        num(eye.pupil_diameter_mm)
    ));
    for v in [origin.x, origin.y, origin.z, gaze.x, gaze.y, gaze.z] {
        out.push_str(&num(v));
        out.push(',');
    }
}

/// One gaze-stream row, head-local coordinates.
pub fn gaze_row(s: &GazeSample) -> String {
    let mut out = format!("{},", s.device_timestamp);
    push_eye(
        &mut out,
        &s.left_eye,
        s.left_ray.origin,
        s.left_ray.direction,
    );
    push_eye(
        &mut out,
        &s.right_eye,
        s.right_ray.origin,
        s.right_ray.direction,
    );
    for v in [
        s.combined_ray.origin.x,
        s.combined_ray.origin.y,
        s.combined_ray.origin.z,
        s.combined_ray.direction.x,
        s.combined_ray.direction.y,
        s.combined_ray.direction.z,
    ] {
        out.push_str(&num(v));
        out.push(',');
    }
    out.push_str(&num(s.gaze_distance));
    out.push(',');
    out
}

// ── Session file naming ─────────────────────────────────────

/// Resolved output paths for one recording session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub object: PathBuf,
    pub gaze: PathBuf,
}

/// Derive `<name>_head.csv` / `<name>_gaze.csv` under `dir`, appending a
/// two-digit suffix to BOTH names together while either target exists.
pub fn session_paths(dir: &Path, name: &str) -> SessionPaths {
    let mut suffix = 0u32;
    loop {
        let base = if suffix == 0 {
            name.to_string()
        } else {
            format!("{}_{:02}", name, suffix)
        };
        let object = dir.join(format!("{}_head.csv", base));
        let gaze = dir.join(format!("{}_gaze.csv", base));
        if !object.exists() && !gaze.exists() {
            return SessionPaths { object, gaze };
        }
        suffix += 1;
    }
}
