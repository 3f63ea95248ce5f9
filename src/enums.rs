use serde::{Deserialize, Serialize};

use crate::trajectory::TrajectoryError;

/// Coordinate system a point is expressed in.
///
/// A bare point is only meaningful together with its system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoordinateSystem {
    /// Right-Anterior-Superior anatomical world coordinates.
    #[default]
    Ras,
    /// Device-native headring coordinates of the stereotactic frame.
    Xyz,
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::Ras => write!(f, "RAS"),
            CoordinateSystem::Xyz => write!(f, "XYZ"),
        }
    }
}

/// Physical orientation in which the frame's arc is attached to the headring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mounting {
    #[default]
    LateralLeft,
    LateralRight,
    SagittalAnterior,
    SagittalPosterior,
}

impl Mounting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mounting::LateralLeft => "lateral-left",
            Mounting::LateralRight => "lateral-right",
            Mounting::SagittalAnterior => "sagittal-anterior",
            Mounting::SagittalPosterior => "sagittal-posterior",
        }
    }
}

impl std::fmt::Display for Mounting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mounting {
    type Err = TrajectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lateral-left" => Ok(Mounting::LateralLeft),
            "lateral-right" => Ok(Mounting::LateralRight),
            "sagittal-anterior" => Ok(Mounting::SagittalAnterior),
            "sagittal-posterior" => Ok(Mounting::SagittalPosterior),
            other => Err(TrajectoryError::UnknownMounting(other.to_string())),
        }
    }
}

/// Parameterization used to derive a trajectory's output transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrajectoryMode {
    #[default]
    TargetMountingRingArc,
    TargetEntryRoll,
}

/// Interpolation of the spread profile between bundle waypoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpreadModel {
    /// Piecewise-linear between waypoints.
    #[default]
    Linear,
    /// Natural cubic spline through the waypoints. Falls back to linear
    /// when fewer than three waypoints are given.
    Spline,
}

/// Spread evaluation outside the waypoint range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Extrapolation {
    /// Hold the first/last waypoint spread.
    #[default]
    Clamp,
    /// Continue the end segment with its end slope.
    Continue,
}

/// Random model for the per-fiber displacement vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplacementModel {
    /// Components drawn uniformly from [-1, 1].
    #[default]
    Uniform,
    /// Components drawn from a standard normal distribution.
    Normal,
}

/// Which side of an implicit surface a clipped bundle keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipPolicy {
    /// Keep samples with non-positive signed distance.
    KeepInterior,
    /// Keep samples with non-negative signed distance.
    KeepExterior,
}
