use stereotactic_plan::{
    enums::{CoordinateSystem, Mounting},
    frame::Coordinates,
    trajectory::Trajectory,
};

fn main() {
    let trajectory = Trajectory {
        name: "demo".to_string(),
        target: Some(Coordinates::new(100.0, 100.0, 90.0, CoordinateSystem::Xyz)),
        mounting: Mounting::LateralLeft,
        ring_angle: 110.0,
        arc_angle: 72.0,
        ..Trajectory::default()
    };
    let transform = trajectory
        .output_transform()
        .expect("should have derived a transform from the target");
    println!("{:.3}", transform.to_homogeneous());
}
