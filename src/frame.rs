use std::str::FromStr;

use nalgebra::{IsometryMatrix3, Matrix3, Point3, Rotation3, Translation3};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::enums::CoordinateSystem;

#[derive(Debug, Error)]
pub enum CoordinatesParseError {
    #[error("expected \"x,y,z;SYSTEM\", got {0:?}")]
    MalformedEntry(String),

    #[error("invalid coordinate component {0:?}")]
    InvalidComponent(String),

    #[error("unknown coordinate system {0:?}")]
    UnknownSystem(String),
}

/// Headring coordinates to anatomical world coordinates (matching center).
///
/// Fixed geometry of the supported frame model: a signed permutation plus a
/// translation placing the 100 mm frame center at the world origin.
///
/// ```text
/// [-1  0  0  100]
/// [ 0  1  0 -100]
/// [ 0  0 -1  100]
/// [ 0  0  0    1]
/// ```
pub fn frame_to_ras() -> IsometryMatrix3<f64> {
    IsometryMatrix3::from_parts(
        Translation3::new(100.0, -100.0, 100.0),
        Rotation3::from_matrix_unchecked(Matrix3::new(
            -1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, -1.0,
        )),
    )
}

/// Inverse of [`frame_to_ras`], mapping world coordinates back to the headring.
pub fn ras_to_frame() -> IsometryMatrix3<f64> {
    frame_to_ras().inverse()
}

/// Convert a headring (XYZ) point to world (RAS) coordinates.
pub fn to_ras(point: &Point3<f64>) -> Point3<f64> {
    frame_to_ras().transform_point(point)
}

/// Convert a world (RAS) point to headring (XYZ) coordinates.
pub fn to_xyz(point: &Point3<f64>) -> Point3<f64> {
    ras_to_frame().transform_point(point)
}

impl FromStr for CoordinateSystem {
    type Err = CoordinatesParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RAS" => Ok(CoordinateSystem::Ras),
            "XYZ" => Ok(CoordinateSystem::Xyz),
            other => Err(CoordinatesParseError::UnknownSystem(other.to_string())),
        }
    }
}

/// A point tagged with the coordinate system it is expressed in.
///
/// Hosts store these as `"x,y,z;SYSTEM"` strings; the [`FromStr`] and
/// [`std::fmt::Display`] implementations speak that format, and serde
/// serialization uses the same textual form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub point: Point3<f64>,
    pub system: CoordinateSystem,
}

impl Coordinates {
    pub fn new(x: f64, y: f64, z: f64, system: CoordinateSystem) -> Self {
        Self {
            point: Point3::new(x, y, z),
            system,
        }
    }

    pub fn from_point(point: Point3<f64>, system: CoordinateSystem) -> Self {
        Self { point, system }
    }

    /// The point in world (RAS) coordinates, converting if necessary.
    pub fn ras(&self) -> Point3<f64> {
        match self.system {
            CoordinateSystem::Ras => self.point,
            CoordinateSystem::Xyz => to_ras(&self.point),
        }
    }

    /// The point in headring (XYZ) coordinates, converting if necessary.
    pub fn xyz(&self) -> Point3<f64> {
        match self.system {
            CoordinateSystem::Ras => to_xyz(&self.point),
            CoordinateSystem::Xyz => self.point,
        }
    }

    pub fn in_system(&self, system: CoordinateSystem) -> Self {
        let point = match system {
            CoordinateSystem::Ras => self.ras(),
            CoordinateSystem::Xyz => self.xyz(),
        };
        Self { point, system }
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, CoordinateSystem::Ras)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{};{}",
            self.point.x, self.point.y, self.point.z, self.system
        )
    }
}

impl FromStr for Coordinates {
    type Err = CoordinatesParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (coords, system) = s
            .split_once(';')
            .ok_or_else(|| CoordinatesParseError::MalformedEntry(s.to_string()))?;

        let components: Vec<f64> = coords
            .split(',')
            .map(|c| {
                c.trim()
                    .parse::<f64>()
                    .map_err(|_| CoordinatesParseError::InvalidComponent(c.to_string()))
            })
            .collect::<Result<_, _>>()?;

        let [x, y, z] = components[..] else {
            return Err(CoordinatesParseError::MalformedEntry(s.to_string()));
        };

        Ok(Self::new(x, y, z, system.parse()?))
    }
}

impl Serialize for Coordinates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coordinates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn frame_center_maps_to_world_origin() {
        let center = to_ras(&Point3::new(100.0, 100.0, 100.0));
        assert_abs_diff_eq!(center, Point3::origin(), epsilon = 1e-12);
    }

    #[test]
    fn round_trip_is_identity() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(12.5, -40.0, 77.3),
            Point3::new(-3.2, 190.4, 0.001),
        ];
        for p in points {
            assert_abs_diff_eq!(to_xyz(&to_ras(&p)), p, epsilon = 1e-9);
            assert_abs_diff_eq!(to_ras(&to_xyz(&p)), p, epsilon = 1e-9);
        }
    }

    #[test]
    fn conversion_flips_lateral_and_vertical_axes() {
        let p = to_ras(&Point3::new(90.0, 120.0, 130.0));
        assert_abs_diff_eq!(p, Point3::new(10.0, 20.0, -30.0), epsilon = 1e-12);
    }

    #[test]
    fn coordinates_text_form_round_trips() {
        let parsed: Coordinates = "100.5,-3.25,0;XYZ".parse().unwrap();
        assert_eq!(parsed.system, CoordinateSystem::Xyz);
        assert_abs_diff_eq!(parsed.point, Point3::new(100.5, -3.25, 0.0));
        assert_eq!(parsed.to_string(), "100.5,-3.25,0;XYZ");
    }

    #[test]
    fn malformed_coordinate_entries_are_rejected() {
        assert!("1,2,3".parse::<Coordinates>().is_err());
        assert!("1,2;RAS".parse::<Coordinates>().is_err());
        assert!("1,2,three;RAS".parse::<Coordinates>().is_err());
        assert!("1,2,3;LPS".parse::<Coordinates>().is_err());
    }

    #[test]
    fn tagged_point_converts_between_systems() {
        let c = Coordinates::new(100.0, 100.0, 90.0, CoordinateSystem::Xyz);
        assert_abs_diff_eq!(c.ras(), Point3::new(0.0, 0.0, 10.0), epsilon = 1e-12);
        assert_abs_diff_eq!(
            c.in_system(CoordinateSystem::Ras).xyz(),
            c.point,
            epsilon = 1e-9
        );
    }
}
