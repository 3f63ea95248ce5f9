use log::debug;
use nalgebra::{IsometryMatrix3, Matrix3, Point3, Rotation3, Translation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::CoordinateSystem;
use crate::frame::Coordinates;

/// Minimum number of paired points for a rigid fit.
const MIN_LANDMARKS: usize = 3;

/// Relative singular value threshold below which the point sets are treated
/// as collinear and the rotation as underdetermined.
const COLLINEARITY_TOLERANCE: f64 = 1e-9;

/// Shortest usable AC-PC distance in millimeters.
const MIN_AXIS_LENGTH: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("degenerate landmark configuration: {0}")]
    DegenerateLandmarks(&'static str),

    #[error("degenerate anatomical configuration: {0}")]
    DegenerateAnatomy(&'static str),
}

/// Compute the rigid transform that best maps `moving` onto `fixed`,
/// minimizing the sum of squared residuals.
///
/// Closed-form Kabsch solution: demean both sets, decompose the
/// cross-covariance with an SVD and fix the sign so the result is a proper
/// rotation. Deterministic, no iteration.
///
/// # Errors
///
/// Returns [`RegistrationError::DegenerateLandmarks`] when the sets differ
/// in size, contain fewer than three pairs, or are collinear.
pub fn rigid_register(
    moving: &[Point3<f64>],
    fixed: &[Point3<f64>],
) -> Result<IsometryMatrix3<f64>, RegistrationError> {
    if moving.len() != fixed.len() {
        return Err(RegistrationError::DegenerateLandmarks(
            "point sets differ in size",
        ));
    }
    if moving.len() < MIN_LANDMARKS {
        return Err(RegistrationError::DegenerateLandmarks(
            "fewer than three point pairs",
        ));
    }

    let n = moving.len() as f64;
    let centroid_moving = moving
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / n;
    let centroid_fixed = fixed.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;

    let mut covariance = Matrix3::zeros();
    for (m, f) in moving.iter().zip(fixed) {
        covariance += (m.coords - centroid_moving) * (f.coords - centroid_fixed).transpose();
    }

    let svd = covariance.svd(true, true);
    let singular = svd.singular_values;
    if singular[1] <= singular[0] * COLLINEARITY_TOLERANCE {
        return Err(RegistrationError::DegenerateLandmarks(
            "points are collinear",
        ));
    }
    let u = svd
        .u
        .ok_or(RegistrationError::DegenerateLandmarks("decomposition failed"))?;
    let v = svd
        .v_t
        .ok_or(RegistrationError::DegenerateLandmarks("decomposition failed"))?
        .transpose();

    // Flip the smallest singular direction when the fit would be a reflection.
    let mut sign = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        sign[(2, 2)] = -1.0;
    }
    let rotation = Rotation3::from_matrix_unchecked(v * sign * u.transpose());
    let translation = centroid_fixed - rotation * centroid_moving;
    let transform = IsometryMatrix3::from_parts(Translation3::from(translation), rotation);

    let rms = (moving
        .iter()
        .zip(fixed)
        .map(|(m, f)| (transform.transform_point(m) - f).norm_squared())
        .sum::<f64>()
        / n)
        .sqrt();
    debug!("rigid fit over {} landmarks, rms residual {rms:.6}", moving.len());

    Ok(transform)
}

/// Build the AC-PC alignment transform from the three midline landmarks.
///
/// Anatomical convention: the PC-to-AC direction becomes the +Y (anterior)
/// axis, the AC-PC-MS plane becomes the midsagittal X = 0 plane with +X
/// pointing right, and the origin is anchored at the mid-commissural point.
///
/// # Errors
///
/// Returns [`RegistrationError::DegenerateAnatomy`] when AC and PC coincide
/// or MS lies on the AC-PC line.
pub fn acpc_align(
    ac: &Point3<f64>,
    pc: &Point3<f64>,
    ms: &Point3<f64>,
) -> Result<IsometryMatrix3<f64>, RegistrationError> {
    let anterior = Unit::try_new(ac - pc, MIN_AXIS_LENGTH)
        .ok_or(RegistrationError::DegenerateAnatomy("AC and PC coincide"))?;
    let lateral = Unit::try_new(anterior.cross(&(ms - pc)), MIN_AXIS_LENGTH).ok_or(
        RegistrationError::DegenerateAnatomy("MS lies on the AC-PC line"),
    )?;
    let superior = lateral.cross(&anterior);

    // Rows of the rotation express a world point in the AC-PC basis.
    let basis = Matrix3::from_columns(&[lateral.into_inner(), anterior.into_inner(), superior]);
    let rotation = Rotation3::from_matrix_unchecked(basis.transpose());
    let mid_commissural = Point3::from((ac.coords + pc.coords) / 2.0);
    let translation = Translation3::from(-(rotation * mid_commissural.coords));

    Ok(IsometryMatrix3::from_parts(translation, rotation))
}

/// The three anatomical landmarks used to derive a reference-to-frame
/// transform, each tagged with its coordinate system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    #[serde(rename = "AC")]
    pub ac: Coordinates,
    #[serde(rename = "PC")]
    pub pc: Coordinates,
    #[serde(rename = "MS")]
    pub ms: Coordinates,
}

impl LandmarkSet {
    pub fn new(ac: Coordinates, pc: Coordinates, ms: Coordinates) -> Self {
        Self { ac, pc, ms }
    }

    /// The landmarks as world (RAS) points, in AC, PC, MS order.
    pub fn points_ras(&self) -> [Point3<f64>; 3] {
        [self.ac.ras(), self.pc.ras(), self.ms.ras()]
    }

    /// Rigidly register this landmark set onto another one, e.g. patient
    /// imaging landmarks onto their idealized frame-space positions.
    pub fn register_to(
        &self,
        other: &LandmarkSet,
    ) -> Result<IsometryMatrix3<f64>, RegistrationError> {
        rigid_register(&self.points_ras(), &other.points_ras())
    }

    /// AC-PC convention alignment of this landmark set. See [`acpc_align`].
    pub fn acpc_align(&self) -> Result<IsometryMatrix3<f64>, RegistrationError> {
        let [ac, pc, ms] = self.points_ras();
        acpc_align(&ac, &pc, &ms)
    }

    pub fn in_system(&self, system: CoordinateSystem) -> Self {
        Self {
            ac: self.ac.in_system(system),
            pc: self.pc.in_system(system),
            ms: self.ms.in_system(system),
        }
    }
}
