use crate::camera::Camera;
use crate::geometry::OrbitPaths;
use crate::kinematics::Orbit;
use cgmath::{Deg, Matrix4, Point3, SquareMatrix, Vector3};
use std::ops::{Index, IndexMut};

/// Every transformable thing in the scene.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
  Nucleus,
  Electron1,
  Electron2,
  Electron3,
  Path1,
  Path2,
  Path3,
}

impl Entity {
  pub const ALL: [Entity; 7] = [
    Entity::Nucleus,
    Entity::Electron1,
    Entity::Electron2,
    Entity::Electron3,
    Entity::Path1,
    Entity::Path2,
    Entity::Path3,
  ];
  /// Lit spheres in draw order.
  pub const SOLIDS: [Entity; 4] = [
    Entity::Nucleus,
    Entity::Electron1,
    Entity::Electron2,
    Entity::Electron3,
  ];
  pub const ELECTRONS: [Entity; 3] = [Entity::Electron1, Entity::Electron2, Entity::Electron3];
  pub const PATHS: [Entity; 3] = [Entity::Path1, Entity::Path2, Entity::Path3];

  #[must_use]
  pub fn index(self) -> usize {
    self as usize
  }

  #[must_use]
  pub fn name(self) -> &'static str {
    match self {
      Entity::Nucleus => "NUCLEUS",
      Entity::Electron1 => "ELECTRON_1",
      Entity::Electron2 => "ELECTRON_2",
      Entity::Electron3 => "ELECTRON_3",
      Entity::Path1 => "PATH_1",
      Entity::Path2 => "PATH_2",
      Entity::Path3 => "PATH_3",
    }
  }

  #[must_use]
  pub fn material(self) -> MaterialId {
    match self {
      Entity::Nucleus => MaterialId::Pearl,
      _ => MaterialId::Jade,
    }
  }

  /// Uniform scale applied on top of the stored transform when drawing.
  #[must_use]
  pub fn draw_scale(self) -> f32 {
    match self {
      Entity::Nucleus => 0.7,
      Entity::Electron1 | Entity::Electron2 | Entity::Electron3 => 0.15,
      Entity::Path1 | Entity::Path2 | Entity::Path3 => 1.0,
    }
  }
}

/// Array-backed entity → model matrix table.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformTable([Matrix4<f32>; 7]);

impl TransformTable {
  #[must_use]
  pub fn identity() -> Self {
    Self([Matrix4::identity(); 7])
  }
}

impl Index<Entity> for TransformTable {
  type Output = Matrix4<f32>;

  fn index(&self, entity: Entity) -> &Self::Output {
    &self.0[entity.index()]
  }
}

impl IndexMut<Entity> for TransformTable {
  fn index_mut(&mut self, entity: Entity) -> &mut Self::Output {
    &mut self.0[entity.index()]
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
  pub position: Vector3<f32>,
  pub ambient: Vector3<f32>,
  pub diffuse: Vector3<f32>,
  pub specular: Vector3<f32>,
  /// Constant, linear and quadratic attenuation coefficients.
  pub attenuation: Vector3<f32>,
}

impl Default for Light {
  fn default() -> Self {
    Self {
      position: Vector3::new(10.0, 10.0, 10.0),
      ambient: Vector3::new(0.8, 0.8, 0.8),
      diffuse: Vector3::new(0.8, 0.8, 0.8),
      specular: Vector3::new(0.8, 0.8, 0.8),
      attenuation: Vector3::new(1.0, 0.0, 0.0),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
  pub ambient: Vector3<f32>,
  pub diffuse: Vector3<f32>,
  pub specular: Vector3<f32>,
  pub shininess: f32,
}

impl Material {
  #[must_use]
  pub fn pearl() -> Self {
    Self {
      ambient: Vector3::new(0.25, 0.25, 0.21),
      diffuse: Vector3::new(1.0, 0.83, 0.83),
      specular: Vector3::new(0.3, 0.3, 0.3),
      shininess: 11.3,
    }
  }

  #[must_use]
  pub fn jade() -> Self {
    Self {
      ambient: Vector3::new(0.14, 0.22, 0.16),
      diffuse: Vector3::new(0.54, 0.89, 0.63),
      specular: Vector3::new(0.32, 0.32, 0.32),
      shininess: 12.8,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MaterialId {
  Pearl,
  Jade,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialTable {
  pub pearl: Material,
  pub jade: Material,
}

impl Default for MaterialTable {
  fn default() -> Self {
    Self {
      pearl: Material::pearl(),
      jade: Material::jade(),
    }
  }
}

impl Index<MaterialId> for MaterialTable {
  type Output = Material;

  fn index(&self, id: MaterialId) -> &Material {
    match id {
      MaterialId::Pearl => &self.pearl,
      MaterialId::Jade => &self.jade,
    }
  }
}

impl IndexMut<MaterialId> for MaterialTable {
  fn index_mut(&mut self, id: MaterialId) -> &mut Material {
    match id {
      MaterialId::Pearl => &mut self.pearl,
      MaterialId::Jade => &mut self.jade,
    }
  }
}

/// Orbit plane orientations: every path circle is first stood up about X, the
/// second and third are then tilted either way about Z.
#[must_use]
pub fn path_transform(entity: Entity) -> Matrix4<f32> {
  let upright = Matrix4::from_angle_x(Deg(90.0));
  match entity {
    Entity::Path1 => upright,
    Entity::Path2 => Matrix4::from_angle_z(Deg(45.0)) * upright,
    Entity::Path3 => Matrix4::from_angle_z(Deg(-45.0)) * upright,
    _ => Matrix4::identity(),
  }
}

/// Everything the kinematics step mutates and the renderer reads.
#[derive(Clone, Debug)]
pub struct Scene {
  pub transforms: TransformTable,
  pub light: Light,
  pub materials: MaterialTable,
  pub camera: Camera,
  pub orbit: Orbit,
  pub paths: OrbitPaths,
  /// Eye position handed to the lit shader for specular highlights.
  pub viewpoint: Point3<f32>,
}

impl Scene {
  #[must_use]
  pub fn new(aspect: f32, orbit_speed: f32) -> Self {
    let mut transforms = TransformTable::identity();
    for path in Entity::PATHS {
      transforms[path] = path_transform(path);
    }
    let mut scene = Self {
      transforms,
      light: Light::default(),
      materials: MaterialTable::default(),
      camera: Camera::new(aspect),
      orbit: Orbit::new(orbit_speed),
      paths: OrbitPaths::generate(),
      viewpoint: Point3::new(0.0, 2.0, 4.0),
    };
    scene.orbit.place_electrons(&mut scene.transforms);
    scene
  }

  /// Stored transform with the entity's draw scale applied. The stored
  /// transform itself is left alone, so this may be called any number of
  /// times per frame.
  #[must_use]
  pub fn draw_transform(&self, entity: Entity) -> Matrix4<f32> {
    self.transforms[entity] * Matrix4::from_scale(entity.draw_scale())
  }

  #[must_use]
  pub fn material_for(&self, entity: Entity) -> &Material {
    &self.materials[entity.material()]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;
  use cgmath::{EuclideanSpace, Transform};

  #[test]
  fn entity_indices_are_unique() {
    let mut seen = [false; 7];
    for entity in Entity::ALL {
      assert!(!seen[entity.index()], "{} reused an index", entity.name());
      seen[entity.index()] = true;
    }
  }

  #[test]
  fn nucleus_uses_pearl_and_electrons_jade() {
    assert_eq!(Entity::Nucleus.material(), MaterialId::Pearl);
    for electron in Entity::ELECTRONS {
      assert_eq!(electron.material(), MaterialId::Jade);
    }
  }

  #[test]
  fn path_one_lies_in_xz_plane() {
    let m = path_transform(Entity::Path1);
    let p = m.transform_point(Point3::new(1.5, 0.0, 0.0));
    assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-6);
    let q = m.transform_point(Point3::new(0.0, 1.5, 0.0));
    assert_abs_diff_eq!(q.y, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(q.z.abs(), 1.5, epsilon = 1e-6);
  }

  #[test]
  fn tilted_paths_mirror_each_other() {
    let p2 = path_transform(Entity::Path2).transform_point(Point3::new(1.5, 0.0, 0.0));
    let p3 = path_transform(Entity::Path3).transform_point(Point3::new(1.5, 0.0, 0.0));
    assert_abs_diff_eq!(p2.x, p3.x, epsilon = 1e-6);
    assert_abs_diff_eq!(p2.y, -p3.y, epsilon = 1e-6);
    assert_abs_diff_eq!(p2.y, 1.5 * std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-5);
  }

  #[test]
  fn new_scene_uses_literal_constants() {
    let scene = Scene::new(1.0, 0.0);
    assert_eq!(scene.light.position, Vector3::new(10.0, 10.0, 10.0));
    assert_eq!(scene.light.attenuation, Vector3::new(1.0, 0.0, 0.0));
    assert_eq!(scene.materials.pearl.shininess, 11.3);
    assert_eq!(scene.materials.jade.shininess, 12.8);
    assert_eq!(scene.camera.eye, Point3::new(0.0, 1.0, 4.5));
    assert_eq!(scene.transforms[Entity::Nucleus], Matrix4::identity());
    for path in Entity::PATHS {
      assert_eq!(scene.transforms[path], path_transform(path));
    }
  }

  #[test]
  fn draw_transform_does_not_touch_stored_transform() {
    let scene = Scene::new(1.0, 0.0);
    let stored = scene.transforms[Entity::Electron1];
    let first = scene.draw_transform(Entity::Electron1);
    let second = scene.draw_transform(Entity::Electron1);
    assert_eq!(first, second);
    assert_eq!(scene.transforms[Entity::Electron1], stored);
    let centre = first.transform_point(Point3::origin());
    assert_abs_diff_eq!(centre.x, 1.5, epsilon = 1e-6);
  }

  #[test]
  fn nucleus_draws_at_fixed_scale() {
    let scene = Scene::new(1.0, 0.0);
    assert_eq!(scene.draw_transform(Entity::Nucleus), Matrix4::from_scale(0.7));
  }
}
