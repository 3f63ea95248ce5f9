use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{ClipPolicy, DisplacementModel, Extrapolation, SpreadModel};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("input curve needs at least two points")]
    EmptyCurve,

    #[error("sample spacing must be positive")]
    InvalidSpacing,

    #[error("at least one spread waypoint is required")]
    NoWaypoints,
}

/// One simulated fiber polyline.
pub type Fiber = Vec<Point3<f64>>;

/// A spread control point along the curve: `position` is the percentage of
/// curve length in `[0, 100]`, `spread` the displacement scale there.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(rename = "value")]
    pub position: f64,
    pub spread: f64,
}

impl Waypoint {
    pub fn new(position: f64, spread: f64) -> Self {
        Self { position, spread }
    }
}

/// Spread profile interpolated over a sorted waypoint set.
#[derive(Clone, Debug)]
pub struct SpreadProfile {
    waypoints: Vec<Waypoint>,
    extrapolation: Extrapolation,
    /// Second derivatives at the waypoints; empty for piecewise-linear
    /// evaluation.
    curvature: Vec<f64>,
}

impl SpreadProfile {
    /// Build a profile, sorting the waypoints and collapsing duplicate
    /// positions. The spline model falls back to linear interpolation when
    /// fewer than three distinct waypoints remain.
    pub fn new(
        mut waypoints: Vec<Waypoint>,
        model: SpreadModel,
        extrapolation: Extrapolation,
    ) -> Result<Self, BundleError> {
        if waypoints.is_empty() {
            return Err(BundleError::NoWaypoints);
        }
        waypoints.sort_by(|a, b| a.position.total_cmp(&b.position));
        waypoints.dedup_by(|a, b| (a.position - b.position).abs() < f64::EPSILON);

        let curvature = match model {
            SpreadModel::Spline if waypoints.len() >= 3 => {
                natural_spline_curvature(&waypoints)
            }
            _ => Vec::new(),
        };

        Ok(Self {
            waypoints,
            extrapolation,
            curvature,
        })
    }

    /// Interpolated spread at `position` (percent along the curve).
    pub fn evaluate(&self, position: f64) -> f64 {
        let first = self.waypoints[0];
        let last = self.waypoints[self.waypoints.len() - 1];
        if self.waypoints.len() == 1 {
            return first.spread;
        }

        if position <= first.position {
            return match self.extrapolation {
                Extrapolation::Clamp => first.spread,
                Extrapolation::Continue => {
                    let next = self.waypoints[1];
                    first.spread + self.slope(first, next) * (position - first.position)
                }
            };
        }
        if position >= last.position {
            return match self.extrapolation {
                Extrapolation::Clamp => last.spread,
                Extrapolation::Continue => {
                    let previous = self.waypoints[self.waypoints.len() - 2];
                    last.spread + self.slope(previous, last) * (position - last.position)
                }
            };
        }

        let upper = self
            .waypoints
            .partition_point(|w| w.position < position)
            .max(1);
        let (a, b) = (self.waypoints[upper - 1], self.waypoints[upper]);
        let h = b.position - a.position;
        let t = (position - a.position) / h;

        if self.curvature.is_empty() {
            return a.spread + (b.spread - a.spread) * t;
        }

        let (wa, wb) = (1.0 - t, t);
        wa * a.spread
            + wb * b.spread
            + ((wa * wa * wa - wa) * self.curvature[upper - 1]
                + (wb * wb * wb - wb) * self.curvature[upper])
                * h
                * h
                / 6.0
    }

    fn slope(&self, a: Waypoint, b: Waypoint) -> f64 {
        (b.spread - a.spread) / (b.position - a.position)
    }
}

/// Natural cubic spline second derivatives over sorted waypoints, solved
/// with the standard tridiagonal sweep.
fn natural_spline_curvature(waypoints: &[Waypoint]) -> Vec<f64> {
    let n = waypoints.len();
    let mut curvature = vec![0.0; n];
    let mut scratch = vec![0.0; n];

    for i in 1..n - 1 {
        let (prev, here, next) = (waypoints[i - 1], waypoints[i], waypoints[i + 1]);
        let sig = (here.position - prev.position) / (next.position - prev.position);
        let p = sig * curvature[i - 1] + 2.0;
        curvature[i] = (sig - 1.0) / p;
        let delta = (next.spread - here.spread) / (next.position - here.position)
            - (here.spread - prev.spread) / (here.position - prev.position);
        scratch[i] = (6.0 * delta / (next.position - prev.position) - sig * scratch[i - 1]) / p;
    }
    for i in (0..n - 1).rev() {
        curvature[i] = curvature[i] * curvature[i + 1] + scratch[i];
    }
    curvature
}

/// Resample a polyline at a fixed arc-length spacing, keeping both ends.
pub fn resample_polyline(points: &[Point3<f64>], spacing: f64) -> Vec<Point3<f64>> {
    let Some(&start) = points.first() else {
        return Vec::new();
    };
    let mut resampled = vec![start];
    let mut remaining = spacing;

    for pair in points.windows(2) {
        let segment = pair[1] - pair[0];
        let length = segment.norm();
        if length == 0.0 {
            continue;
        }
        let direction = segment / length;
        let mut travelled = 0.0;
        while length - travelled >= remaining {
            travelled += remaining;
            resampled.push(pair[0] + direction * travelled);
            remaining = spacing;
        }
        remaining -= length - travelled;
    }

    // Keep the curve end so fibers reach the far landmark.
    if let Some(&end) = points.last() {
        if (end - resampled[resampled.len() - 1]).norm() > spacing * 1e-6 {
            resampled.push(end);
        }
    }
    resampled
}

/// A surface given by a signed distance function, negative inside.
pub trait ImplicitSurface: Sync {
    fn signed_distance(&self, point: &Point3<f64>) -> f64;
}

#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl ImplicitSurface for Sphere {
    fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        (point - self.center).norm() - self.radius
    }
}

#[derive(Clone, Debug)]
pub struct BundleOptions {
    pub fiber_count: usize,
    /// Arc-length resampling distance in millimeters.
    pub sample_spacing: f64,
    pub waypoints: Vec<Waypoint>,
    pub spread_model: SpreadModel,
    pub extrapolation: Extrapolation,
    pub displacement: DisplacementModel,
    /// Seed for the per-fiber random offsets; identical seeds yield
    /// identical bundles.
    pub seed: u64,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            fiber_count: 100,
            sample_spacing: 1.0,
            waypoints: vec![Waypoint::new(0.0, 5.0), Waypoint::new(100.0, 5.0)],
            spread_model: SpreadModel::default(),
            extrapolation: Extrapolation::default(),
            displacement: DisplacementModel::default(),
            seed: 0,
        }
    }
}

fn random_offset(model: DisplacementModel, rng: &mut StdRng) -> Vector3<f64> {
    match model {
        DisplacementModel::Uniform => Vector3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        ),
        DisplacementModel::Normal => Vector3::new(
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
            rng.sample(StandardNormal),
        ),
    }
}

/// Generate a simulated fiber bundle around a curve.
///
/// The curve is resampled at `sample_spacing`, the spread profile is
/// interpolated over the samples, and each fiber displaces the whole curve
/// by one random offset vector scaled by the local spread. Fibers are
/// generated in parallel; each draws from its own seeded generator, so the
/// output is reproducible for a given `seed`.
pub fn generate_bundle(
    curve: &[Point3<f64>],
    options: &BundleOptions,
) -> Result<Vec<Fiber>, BundleError> {
    if curve.len() < 2 {
        return Err(BundleError::EmptyCurve);
    }
    if !(options.sample_spacing > 0.0) {
        return Err(BundleError::InvalidSpacing);
    }
    let profile = SpreadProfile::new(
        options.waypoints.clone(),
        options.spread_model,
        options.extrapolation,
    )?;

    let samples = resample_polyline(curve, options.sample_spacing);
    let span = (samples.len() - 1).max(1) as f64;
    let spreads: Vec<f64> = (0..samples.len())
        .map(|i| profile.evaluate(100.0 * i as f64 / span))
        .collect();

    let fibers = (0..options.fiber_count)
        .into_par_iter()
        .map(|index| {
            let fiber_seed =
                options.seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let mut rng = StdRng::seed_from_u64(fiber_seed);
            let offset = random_offset(options.displacement, &mut rng);
            samples
                .iter()
                .zip(&spreads)
                .map(|(point, spread)| point + offset * *spread)
                .collect()
        })
        .collect();

    Ok(fibers)
}

/// Generate a bundle and truncate every fiber against an implicit surface.
///
/// Samples on the wrong side of the surface are dropped and each fiber is
/// split into its surviving contiguous runs; runs shorter than two points
/// are discarded.
pub fn generate_clipped_bundle(
    curve: &[Point3<f64>],
    options: &BundleOptions,
    surface: &dyn ImplicitSurface,
    policy: ClipPolicy,
) -> Result<Vec<Fiber>, BundleError> {
    let fibers = generate_bundle(curve, options)?;
    Ok(fibers
        .into_iter()
        .flat_map(|fiber| truncate_fiber(&fiber, surface, policy))
        .collect())
}

fn keeps(policy: ClipPolicy, signed_distance: f64) -> bool {
    match policy {
        ClipPolicy::KeepInterior => signed_distance <= 0.0,
        ClipPolicy::KeepExterior => signed_distance >= 0.0,
    }
}

fn truncate_fiber(
    fiber: &[Point3<f64>],
    surface: &dyn ImplicitSurface,
    policy: ClipPolicy,
) -> Vec<Fiber> {
    let mut runs = Vec::new();
    let mut current = Fiber::new();
    for point in fiber {
        if keeps(policy, surface.signed_distance(point)) {
            current.push(*point);
        } else if current.len() >= 2 {
            runs.push(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= 2 {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{ClipPolicy, DisplacementModel, Extrapolation, SpreadModel};
    use approx::assert_abs_diff_eq;

    fn straight_curve() -> Vec<Point3<f64>> {
        vec![Point3::origin(), Point3::new(20.0, 0.0, 0.0)]
    }

    #[test]
    fn resampling_respects_the_arc_length_spacing() {
        let samples = resample_polyline(&straight_curve(), 1.0);
        assert_eq!(samples.len(), 21);
        for pair in samples.windows(2) {
            assert_abs_diff_eq!((pair[1] - pair[0]).norm(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn resampling_keeps_the_curve_end() {
        let samples = resample_polyline(&straight_curve(), 3.0);
        assert_abs_diff_eq!(
            samples[samples.len() - 1],
            Point3::new(20.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn linear_profile_hits_waypoints_and_clamps_outside() {
        let profile = SpreadProfile::new(
            vec![Waypoint::new(80.0, 1.0), Waypoint::new(20.0, 4.0)],
            SpreadModel::Linear,
            Extrapolation::Clamp,
        )
        .unwrap();

        // Waypoints are sorted on construction.
        assert_abs_diff_eq!(profile.evaluate(20.0), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.evaluate(80.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.evaluate(50.0), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.evaluate(0.0), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.evaluate(100.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_profile_can_continue_past_the_ends() {
        let profile = SpreadProfile::new(
            vec![Waypoint::new(20.0, 4.0), Waypoint::new(80.0, 1.0)],
            SpreadModel::Linear,
            Extrapolation::Continue,
        )
        .unwrap();
        assert_abs_diff_eq!(profile.evaluate(0.0), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(profile.evaluate(100.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn spline_profile_interpolates_the_waypoints() {
        let waypoints = vec![
            Waypoint::new(0.0, 5.0),
            Waypoint::new(30.0, 1.0),
            Waypoint::new(60.0, 8.0),
            Waypoint::new(100.0, 2.0),
        ];
        let profile = SpreadProfile::new(
            waypoints.clone(),
            SpreadModel::Spline,
            Extrapolation::Clamp,
        )
        .unwrap();
        for w in &waypoints {
            assert_abs_diff_eq!(profile.evaluate(w.position), w.spread, epsilon = 1e-9);
        }
        // Between waypoints the spline stays smooth and finite.
        for i in 0..=100 {
            assert!(profile.evaluate(i as f64).is_finite());
        }
    }

    #[test]
    fn bundles_are_reproducible_per_seed() {
        let options = BundleOptions {
            fiber_count: 8,
            seed: 42,
            ..BundleOptions::default()
        };
        let a = generate_bundle(&straight_curve(), &options).unwrap();
        let b = generate_bundle(&straight_curve(), &options).unwrap();
        assert_eq!(a, b);

        let other = generate_bundle(
            &straight_curve(),
            &BundleOptions {
                seed: 43,
                ..options
            },
        )
        .unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn uniform_displacement_stays_within_the_spread() {
        let options = BundleOptions {
            fiber_count: 16,
            displacement: DisplacementModel::Uniform,
            waypoints: vec![Waypoint::new(0.0, 2.0), Waypoint::new(100.0, 2.0)],
            ..BundleOptions::default()
        };
        let curve = straight_curve();
        let samples = resample_polyline(&curve, options.sample_spacing);
        let fibers = generate_bundle(&curve, &options).unwrap();

        for fiber in &fibers {
            assert_eq!(fiber.len(), samples.len());
            for (point, sample) in fiber.iter().zip(&samples) {
                let offset = point - sample;
                assert!(offset.norm() <= 2.0 * 3f64.sqrt() + 1e-9);
            }
        }
    }

    #[test]
    fn clipping_splits_fibers_at_the_surface() {
        let curve = straight_curve();
        let options = BundleOptions {
            fiber_count: 3,
            // Zero spread keeps every fiber on the curve itself.
            waypoints: vec![Waypoint::new(0.0, 0.0), Waypoint::new(100.0, 0.0)],
            ..BundleOptions::default()
        };
        let sphere = Sphere {
            center: Point3::new(10.0, 0.0, 0.0),
            radius: 2.5,
        };

        let outside =
            generate_clipped_bundle(&curve, &options, &sphere, ClipPolicy::KeepExterior).unwrap();
        // Each fiber splits into the runs before and after the sphere.
        assert_eq!(outside.len(), 2 * options.fiber_count);
        for run in &outside {
            for point in run {
                assert!(sphere.signed_distance(point) >= 0.0);
            }
        }

        let inside =
            generate_clipped_bundle(&curve, &options, &sphere, ClipPolicy::KeepInterior).unwrap();
        assert_eq!(inside.len(), options.fiber_count);
        for run in &inside {
            for point in run {
                assert!(sphere.signed_distance(point) <= 0.0);
            }
        }
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(matches!(
            generate_bundle(&[Point3::origin()], &BundleOptions::default()),
            Err(BundleError::EmptyCurve)
        ));
        assert!(matches!(
            generate_bundle(
                &straight_curve(),
                &BundleOptions {
                    sample_spacing: 0.0,
                    ..BundleOptions::default()
                }
            ),
            Err(BundleError::InvalidSpacing)
        ));
        assert!(matches!(
            generate_bundle(
                &straight_curve(),
                &BundleOptions {
                    waypoints: Vec::new(),
                    ..BundleOptions::default()
                }
            ),
            Err(BundleError::NoWaypoints)
        ));
    }
}
