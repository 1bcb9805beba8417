use crate::geometry::ORBIT_RADIUS;
use crate::scene::{Entity, Scene, TransformTable};
use cgmath::{Deg, InnerSpace, Matrix4, SquareMatrix, Vector3};

/// Accumulated orbit angle and the rate it advances at.
#[derive(Clone, Debug, PartialEq)]
pub struct Orbit {
  /// Degrees, kept in [0, 360).
  pub angle: f32,
  /// Degrees per second.
  pub speed: f32,
}

impl Orbit {
  #[must_use]
  pub fn new(speed: f32) -> Self {
    Self { angle: 0.0, speed }
  }

  pub fn advance(&mut self, frame_time: f32) {
    self.angle = (self.angle + self.speed * frame_time).rem_euclid(360.0);
  }

  /// Overwrites every electron's transform from the current angle.
  pub fn place_electrons(&self, transforms: &mut TransformTable) {
    for electron in Entity::ELECTRONS {
      transforms[electron] = electron_transform(electron, self.angle);
    }
  }
}

/// Closed-form electron placement. The composition order differs per
/// electron and must stay as written.
#[must_use]
pub fn electron_transform(electron: Entity, angle: f32) -> Matrix4<f32> {
  match electron {
    Entity::Electron1 => {
      Matrix4::from_translation(Vector3::new(ORBIT_RADIUS, 0.0, 0.0))
        * Matrix4::from_angle_y(Deg(angle))
    }
    Entity::Electron2 => {
      Matrix4::from_axis_angle(Vector3::new(1.0, 1.0, 0.0).normalize(), Deg(-angle))
        * Matrix4::from_translation(Vector3::new(0.0, 0.0, -ORBIT_RADIUS))
    }
    Entity::Electron3 => {
      Matrix4::from_axis_angle(Vector3::new(-1.0, 1.0, 0.0).normalize(), Deg(angle))
        * Matrix4::from_translation(Vector3::new(0.0, 0.0, ORBIT_RADIUS))
    }
    _ => Matrix4::identity(),
  }
}

/// One kinematics step: advance the angle, then recompute the electrons.
pub fn update(scene: &mut Scene, frame_time: f32) {
  scene.orbit.advance(frame_time);
  scene.orbit.place_electrons(&mut scene.transforms);
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;
  use cgmath::{EuclideanSpace, Point3, Transform};

  fn assert_matrix_eq(a: Matrix4<f32>, b: Matrix4<f32>) {
    let a: [[f32; 4]; 4] = a.into();
    let b: [[f32; 4]; 4] = b.into();
    for (ca, cb) in a.iter().zip(&b) {
      for (x, y) in ca.iter().zip(cb) {
        assert_abs_diff_eq!(x, y, epsilon = 1e-4);
      }
    }
  }

  #[test]
  fn split_steps_reach_the_same_angle() {
    let mut whole = Orbit::new(47.0);
    let mut halves = Orbit::new(47.0);
    whole.advance(0.3);
    halves.advance(0.15);
    halves.advance(0.15);
    assert_abs_diff_eq!(whole.angle, halves.angle, epsilon = 1e-4);
  }

  #[test]
  fn angle_wraps_into_one_turn() {
    let mut orbit = Orbit::new(300.0);
    orbit.advance(1.5);
    assert_abs_diff_eq!(orbit.angle, 90.0, epsilon = 1e-3);
  }

  #[test]
  fn first_electron_crosses_the_orbit() {
    let start = electron_transform(Entity::Electron1, 0.0).transform_point(Point3::origin());
    assert_abs_diff_eq!(start.x, 1.5, epsilon = 1e-5);
    assert_abs_diff_eq!(start.y, 0.0, epsilon = 1e-5);
    assert_abs_diff_eq!(start.z, 0.0, epsilon = 1e-5);

    let half = electron_transform(Entity::Electron1, 180.0).transform_point(Point3::origin());
    // translate-then-rotate: the origin itself only moves by the translation,
    // a point offset along x swings round to the far side
    assert_abs_diff_eq!(half.x, 1.5, epsilon = 1e-5);
    let far = electron_transform(Entity::Electron1, 180.0).transform_point(Point3::new(1.0, 0.0, 0.0));
    assert_abs_diff_eq!(far.x, 0.5, epsilon = 1e-5);
  }

  #[test]
  fn outer_electrons_stay_on_orbit_radius() {
    for electron in [Entity::Electron2, Entity::Electron3] {
      for angle in [0.0f32, 33.0, 90.0, 211.5] {
        let p = electron_transform(electron, angle).transform_point(Point3::origin());
        assert_abs_diff_eq!(p.to_vec().magnitude(), 1.5, epsilon = 1e-4);
      }
    }
  }

  #[test]
  fn outer_electrons_rotate_in_opposite_directions() {
    let p2 = electron_transform(Entity::Electron2, 90.0).transform_point(Point3::origin());
    let p3 = electron_transform(Entity::Electron3, 90.0).transform_point(Point3::origin());
    // both start on the z axis; a quarter turn carries them off it
    assert!(p2.z.abs() < 1e-4);
    assert!(p3.z.abs() < 1e-4);
    assert_abs_diff_eq!(p2.x, p3.x, epsilon = 1e-4);
  }

  #[test]
  fn zero_speed_leaves_electrons_in_place() {
    let mut scene = Scene::new(1.0, 0.0);
    update(&mut scene, 0.25);
    let before = scene.transforms.clone();
    for _ in 0..120 {
      update(&mut scene, 1.0 / 60.0);
    }
    assert_eq!(scene.transforms, before);
  }

  #[test]
  fn one_second_at_thirty_degrees_per_second() {
    let mut scene = Scene::new(1.0, 30.0);
    for _ in 0..60 {
      update(&mut scene, 1.0 / 60.0);
    }
    assert_abs_diff_eq!(scene.orbit.angle, 30.0, epsilon = 1e-3);
    let expected = Matrix4::from_translation(Vector3::new(1.5, 0.0, 0.0)) * Matrix4::from_angle_y(Deg(30.0));
    assert_matrix_eq(scene.transforms[Entity::Electron1], expected);
  }

  #[test]
  fn paths_are_not_touched_by_updates() {
    let mut scene = Scene::new(1.0, 120.0);
    let before: Vec<_> = Entity::PATHS.iter().map(|&p| scene.transforms[p]).collect();
    update(&mut scene, 0.5);
    let after: Vec<_> = Entity::PATHS.iter().map(|&p| scene.transforms[p]).collect();
    assert_eq!(before, after);
  }
}
