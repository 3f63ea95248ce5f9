use log::debug;
use nalgebra::{IsometryMatrix3, Point3, Rotation3, Translation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{Mounting, TrajectoryMode};
use crate::frame::Coordinates;

/// Shortest usable target-to-entry distance in millimeters.
const MIN_DIRECTION_LENGTH: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("target and entry coincide, trajectory direction is undefined")]
    DegenerateTrajectory,

    #[error("trajectory target is not set")]
    InvalidTarget,

    #[error("trajectory entry is not set")]
    InvalidEntry,

    #[error("unknown mounting {0:?}")]
    UnknownMounting(String),
}

/// Fixed direction triple for a mounting, with the arc axis already tilted
/// by the ring angle (radians) in the plane perpendicular to the ring axis.
///
/// The four variants are mirror images of each other across the
/// patient's left-right and anterior-posterior axes.
fn mounting_directions(
    mounting: Mounting,
    ring: f64,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let (sin_ring, cos_ring) = ring.sin_cos();
    match mounting {
        Mounting::LateralRight => (
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, -sin_ring, cos_ring),
        ),
        Mounting::LateralLeft => (
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, sin_ring, cos_ring),
        ),
        Mounting::SagittalAnterior => (
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(sin_ring, 0.0, cos_ring),
        ),
        Mounting::SagittalPosterior => (
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(-sin_ring, 0.0, cos_ring),
        ),
    }
}

/// Trajectory transform from target point, mounting and the two arc system
/// angles (degrees). The target is in world (RAS) coordinates.
///
/// Composition order, rightmost applied first:
/// `Translate(target) ∘ Rot(arc) ∘ Rot(ring) ∘ Rot(90°, init)`.
/// The ring and arc angles are defined relative to the frame after the
/// initial 90 degree rotation, so the order is not interchangeable.
pub fn transform_from_target_mounting_ring_arc(
    target: &Point3<f64>,
    mounting: Mounting,
    ring_angle: f64,
    arc_angle: f64,
) -> IsometryMatrix3<f64> {
    let (init_direction, ring_direction, arc_direction) =
        mounting_directions(mounting, ring_angle.to_radians());

    let rotation = Rotation3::from_axis_angle(
        &Unit::new_normalize(arc_direction),
        arc_angle.to_radians(),
    ) * Rotation3::from_axis_angle(
        &Unit::new_normalize(ring_direction),
        ring_angle.to_radians(),
    ) * Rotation3::from_axis_angle(
        &Unit::new_normalize(init_direction),
        90f64.to_radians(),
    );

    IsometryMatrix3::from_parts(Translation3::from(target.coords), rotation)
}

/// Trajectory transform from target and entry points (world coordinates)
/// and a roll angle (degrees) about the probe axis.
///
/// # Errors
///
/// Returns [`TrajectoryError::DegenerateTrajectory`] when target and entry
/// coincide.
pub fn transform_from_target_entry_roll(
    target: &Point3<f64>,
    entry: &Point3<f64>,
    roll_angle: f64,
) -> Result<IsometryMatrix3<f64>, TrajectoryError> {
    let direction = Unit::try_new(entry - target, MIN_DIRECTION_LENGTH)
        .ok_or(TrajectoryError::DegenerateTrajectory)?;
    let superior = Vector3::z();

    let mut angle = direction.dot(&superior).clamp(-1.0, 1.0).acos();
    let cross = direction.cross(&superior);
    // Half-space convention disambiguating the rotation direction.
    if cross.dot(&superior) >= 0.0 {
        angle = -angle;
    }

    let alignment = match Unit::try_new(cross, MIN_DIRECTION_LENGTH) {
        Some(axis) => Rotation3::from_axis_angle(&axis, angle),
        None => {
            // Vertical trajectory: the aligning axis vanishes and the
            // rotation degenerates to the identity.
            debug!("vertical trajectory, skipping alignment rotation");
            Rotation3::identity()
        }
    };
    let rotation = alignment * Rotation3::from_axis_angle(&direction, roll_angle.to_radians());

    Ok(IsometryMatrix3::from_parts(
        Translation3::from(target.coords),
        rotation,
    ))
}

/// A planned probe trajectory.
///
/// The output transform is derived from the other fields on every call and
/// is never stored, so readers cannot observe a transform computed from a
/// half-updated parameter set.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Trajectory {
    pub name: String,
    pub mode: TrajectoryMode,
    pub entry: Option<Coordinates>,
    pub target: Option<Coordinates>,
    pub mounting: Mounting,
    pub ring_angle: f64,
    pub arc_angle: f64,
    pub roll_angle: f64,
}

impl Default for Trajectory {
    fn default() -> Self {
        Self {
            name: String::new(),
            mode: TrajectoryMode::default(),
            entry: None,
            target: None,
            mounting: Mounting::default(),
            ring_angle: 90.0,
            arc_angle: 90.0,
            roll_angle: 0.0,
        }
    }
}

impl Trajectory {
    /// Derive the rigid transform for this trajectory, converting any
    /// headring-tagged coordinates to world space first.
    ///
    /// # Errors
    ///
    /// Returns [`TrajectoryError::InvalidTarget`] when no target is set,
    /// [`TrajectoryError::InvalidEntry`] when the entry parameterization is
    /// selected without an entry point, and
    /// [`TrajectoryError::DegenerateTrajectory`] when target and entry
    /// coincide.
    pub fn output_transform(&self) -> Result<IsometryMatrix3<f64>, TrajectoryError> {
        let target = self.target.ok_or(TrajectoryError::InvalidTarget)?.ras();
        match self.mode {
            TrajectoryMode::TargetMountingRingArc => Ok(transform_from_target_mounting_ring_arc(
                &target,
                self.mounting,
                self.ring_angle,
                self.arc_angle,
            )),
            TrajectoryMode::TargetEntryRoll => {
                let entry = self.entry.ok_or(TrajectoryError::InvalidEntry)?.ras();
                transform_from_target_entry_roll(&target, &entry, self.roll_angle)
            }
        }
    }
}
