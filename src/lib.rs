//! # Stereotactic-plan library
//!
//! This crate implements the geometric core of stereotactic neurosurgery
//! planning: converting points between the headring coordinate system of a
//! stereotactic frame and anatomical world (RAS) space, registering patient
//! image space to the frame from anatomical landmarks, and deriving full
//! rigid trajectory transforms for a probe.

//!
//! All computations are pure, synchronous functions over nalgebra points
//! and rigid transforms ([`nalgebra::IsometryMatrix3`], so no scale or
//! shear can ever enter a result). Host applications are expected to own
//! node storage, widgets and rendering, and call into this crate whenever
//! a trajectory parameter changes. Trajectories can be derived from either
//! parameterization used by arc systems:
//!  - Target, mounting, ring angle and arc angle
//!  - Target, entry and roll angle
//!
//! A secondary module generates simulated fiber bundles around a curve by
//! resampling it at fixed arc-length spacing, interpolating a spread
//! profile over control waypoints and displacing the curve by seeded
//! random offsets, optionally truncated against implicit surfaces.
//!
//! # Examples
//!
//! ## Deriving a trajectory transform from frame readings
//!
//! Convert a headring target to world space and build the transform for a
//! lateral-left mounting with the default ring and arc angles.
//!
//! ```
//! # use stereotactic_plan::enums::{CoordinateSystem, Mounting};
//! # use stereotactic_plan::frame::Coordinates;
//! # use stereotactic_plan::trajectory::Trajectory;
//! let trajectory = Trajectory {
//!     name: "STN left".to_string(),
//!     target: Some(Coordinates::new(100.0, 100.0, 90.0, CoordinateSystem::Xyz)),
//!     mounting: Mounting::LateralLeft,
//!     ring_angle: 110.0,
//!     arc_angle: 72.0,
//!     ..Trajectory::default()
//! };
//! let transform = trajectory
//!     .output_transform()
//!     .expect("trajectory has a target");
//! println!("{}", transform.to_homogeneous());
//! ```

pub mod bundle;
pub mod enums;
pub mod frame;
pub mod registration;
pub mod trajectory;
