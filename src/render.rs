use crate::geometry::VertexRange;
use crate::scene::{Entity, Material, Scene};
use crate::{LightUniform, PathUniform};
use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};

pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
  r: 0.2,
  g: 0.2,
  b: 0.2,
  a: 1.0,
};

/// The two shader programs: flat-colour orbit lines and Phong-lit spheres.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Program {
  Path,
  Lit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PolygonMode {
  Fill,
  Line,
}

/// Pixel rectangle, origin at the top-left of the surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Viewport {
  /// Off-centre square the atom is drawn into: (400, 150, 600, 600) on a
  /// 1200x900 surface, scaled with the surface otherwise.
  #[must_use]
  pub fn orbit_view(width: u32, height: u32) -> Self {
    let (w, h) = (width as f32, height as f32);
    let side = (w / 2.0).min(h * 2.0 / 3.0);
    Self {
      x: w / 3.0,
      y: h / 6.0,
      width: side,
      height: side,
    }
  }

  #[must_use]
  pub fn aspect(&self) -> f32 {
    self.width / self.height
  }
}

/// Matrices handed to the lit program for one object.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ObjectTransforms {
  pub model: Matrix4<f32>,
  pub mvp: Matrix4<f32>,
  pub normal: Matrix3<f32>,
}

impl ObjectTransforms {
  #[must_use]
  pub fn new(model: Matrix4<f32>, view_projection: Matrix4<f32>) -> Self {
    Self {
      model,
      mvp: view_projection * model,
      normal: normal_matrix(&model),
    }
  }
}

/// Inverse-transpose of the upper 3x3 of `model`.
#[must_use]
pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix3<f32> {
  let linear = Matrix3::from_cols(model.x.truncate(), model.y.truncate(), model.z.truncate());
  linear.invert().unwrap_or_else(Matrix3::identity).transpose()
}

/// The graphics operations the renderer needs. Uniform state set through
/// these calls replaces whatever was set before it.
pub trait RenderBackend {
  fn clear(&mut self, color: wgpu::Color);
  fn use_program(&mut self, program: Program);
  fn set_viewport(&mut self, viewport: Viewport);
  fn set_polygon_mode(&mut self, mode: PolygonMode);
  fn set_path_uniform(&mut self, uniform: PathUniform);
  fn draw_line_loop(&mut self, range: VertexRange);
  fn set_light(&mut self, light: LightUniform);
  fn set_material(&mut self, material: &Material);
  fn set_object_transforms(&mut self, transforms: &ObjectTransforms);
  fn draw_mesh(&mut self, entity: Entity);
  fn flush(&mut self);
}

/// Issues one frame's draw sequence: orbit paths, then lit spheres.
#[derive(Clone, Debug)]
pub struct Renderer {
  pub clear_color: wgpu::Color,
  pub viewport: Viewport,
}

impl Renderer {
  #[must_use]
  pub fn new(viewport: Viewport) -> Self {
    Self {
      clear_color: CLEAR_COLOR,
      viewport,
    }
  }

  /// Reads the scene only, so calling it twice in a frame draws the same
  /// thing twice.
  pub fn render<B: RenderBackend + ?Sized>(&self, scene: &Scene, backend: &mut B) {
    let view_projection = scene.camera.view_projection();
    backend.clear(self.clear_color);

    backend.use_program(Program::Path);
    backend.set_viewport(self.viewport);
    for (path, range) in Entity::PATHS.iter().zip(&scene.paths.ranges) {
      let mvp = view_projection * scene.transforms[*path];
      backend.set_path_uniform(PathUniform { mvp: mvp.into() });
      backend.draw_line_loop(*range);
    }

    backend.use_program(Program::Lit);
    backend.set_light(LightUniform::new(&scene.light, scene.viewpoint));
    for entity in Entity::SOLIDS {
      backend.set_material(scene.material_for(entity));
      let transforms = ObjectTransforms::new(scene.draw_transform(entity), view_projection);
      backend.set_object_transforms(&transforms);
      backend.draw_mesh(entity);
    }

    backend.flush();
  }
}

/// Everything a [`RecordingBackend`] saw, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
  Clear,
  UseProgram(Program),
  SetViewport(Viewport),
  SetPolygonMode(PolygonMode),
  SetPathUniform(PathUniform),
  DrawLineLoop(VertexRange),
  SetLight(LightUniform),
  SetMaterial(Material),
  SetObjectTransforms(ObjectTransforms),
  DrawMesh { entity: Entity, mode: PolygonMode },
  Flush,
}

/// Backend that only records what it is asked to do. Used for headless runs.
#[derive(Debug)]
pub struct RecordingBackend {
  pub commands: Vec<Command>,
  polygon_mode: PolygonMode,
}

impl Default for RecordingBackend {
  fn default() -> Self {
    Self {
      commands: Vec::new(),
      polygon_mode: PolygonMode::Fill,
    }
  }
}

impl RecordingBackend {
  #[must_use]
  pub fn polygon_mode(&self) -> PolygonMode {
    self.polygon_mode
  }

  pub fn line_loops(&self) -> impl Iterator<Item = VertexRange> + '_ {
    self.commands.iter().filter_map(|c| match c {
      Command::DrawLineLoop(range) => Some(*range),
      _ => None,
    })
  }

  pub fn mesh_draws(&self) -> impl Iterator<Item = (Entity, PolygonMode)> + '_ {
    self.commands.iter().filter_map(|c| match c {
      Command::DrawMesh { entity, mode } => Some((*entity, *mode)),
      _ => None,
    })
  }
}

impl RenderBackend for RecordingBackend {
  fn clear(&mut self, _color: wgpu::Color) {
    self.commands.push(Command::Clear);
  }

  fn use_program(&mut self, program: Program) {
    self.commands.push(Command::UseProgram(program));
  }

  fn set_viewport(&mut self, viewport: Viewport) {
    self.commands.push(Command::SetViewport(viewport));
  }

  fn set_polygon_mode(&mut self, mode: PolygonMode) {
    self.polygon_mode = mode;
    self.commands.push(Command::SetPolygonMode(mode));
  }

  fn set_path_uniform(&mut self, uniform: PathUniform) {
    self.commands.push(Command::SetPathUniform(uniform));
  }

  fn draw_line_loop(&mut self, range: VertexRange) {
    log::trace!("line loop {}..{}", range.offset, range.end());
    self.commands.push(Command::DrawLineLoop(range));
  }

  fn set_light(&mut self, light: LightUniform) {
    self.commands.push(Command::SetLight(light));
  }

  fn set_material(&mut self, material: &Material) {
    self.commands.push(Command::SetMaterial(material.clone()));
  }

  fn set_object_transforms(&mut self, transforms: &ObjectTransforms) {
    self.commands.push(Command::SetObjectTransforms(*transforms));
  }

  fn draw_mesh(&mut self, entity: Entity) {
    log::trace!("mesh {} ({:?})", entity.name(), self.polygon_mode);
    self.commands.push(Command::DrawMesh {
      entity,
      mode: self.polygon_mode,
    });
  }

  fn flush(&mut self) {
    self.commands.push(Command::Flush);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kinematics;
  use approx::assert_abs_diff_eq;
  use cgmath::{Deg, Vector3};

  fn render_once(scene: &Scene) -> RecordingBackend {
    let mut backend = RecordingBackend::default();
    Renderer::new(Viewport::orbit_view(1200, 900)).render(scene, &mut backend);
    backend
  }

  #[test]
  fn viewport_stays_inside_smaller_surfaces() {
    for (width, height) in [(800, 600), (1200, 740), (640, 1000), (1, 1)] {
      let v = Viewport::orbit_view(width, height);
      assert!(v.x + v.width <= width as f32, "{width}x{height}: right edge {}", v.x + v.width);
      assert!(v.y + v.height <= height as f32, "{width}x{height}: bottom edge {}", v.y + v.height);
      assert_eq!(v.aspect(), 1.0);
    }
  }

  #[test]
  fn default_window_gets_the_classic_viewport() {
    let viewport = Viewport::orbit_view(1200, 900);
    assert_eq!(
      viewport,
      Viewport {
        x: 400.0,
        y: 150.0,
        width: 600.0,
        height: 600.0
      }
    );
    assert_eq!(viewport.aspect(), 1.0);
  }

  #[test]
  fn paths_cover_the_whole_vertex_buffer() {
    let scene = Scene::new(1.0, 0.0);
    let backend = render_once(&scene);
    let loops: Vec<_> = backend.line_loops().collect();
    assert_eq!(loops.iter().map(|r| r.offset).collect::<Vec<_>>(), vec![0, 35, 70]);
    assert_eq!(loops.iter().map(|r| r.count).sum::<u32>(), 105);
    assert_eq!(scene.paths.vertex_count(), 105);
  }

  #[test]
  fn draw_sequence_is_paths_then_solids() {
    let scene = Scene::new(1.0, 0.0);
    let backend = render_once(&scene);
    let commands = &backend.commands;
    assert_eq!(commands.first(), Some(&Command::Clear));
    assert_eq!(commands.last(), Some(&Command::Flush));
    let lit = commands
      .iter()
      .position(|c| *c == Command::UseProgram(Program::Lit))
      .expect("lit program used");
    let path = commands
      .iter()
      .position(|c| *c == Command::UseProgram(Program::Path))
      .expect("path program used");
    assert!(path < lit);
    assert!(commands[..lit].iter().all(|c| !matches!(c, Command::DrawMesh { .. })));
    assert!(commands[lit..].iter().all(|c| !matches!(c, Command::DrawLineLoop(_))));
    // light is set once, before any material
    let lights: Vec<_> = commands.iter().filter(|c| matches!(c, Command::SetLight(_))).collect();
    assert_eq!(lights.len(), 1);
    assert!(matches!(commands[lit + 1], Command::SetLight(_)));
    let meshes: Vec<_> = backend.mesh_draws().map(|(e, _)| e).collect();
    assert_eq!(meshes, Entity::SOLIDS.to_vec());
  }

  #[test]
  fn each_solid_gets_its_own_material() {
    let mut scene = Scene::new(1.0, 0.0);
    scene.materials.pearl.shininess = 42.0;
    let backend = render_once(&scene);
    let materials: Vec<_> = backend
      .commands
      .iter()
      .filter_map(|c| match c {
        Command::SetMaterial(m) => Some(m.shininess),
        _ => None,
      })
      .collect();
    assert_eq!(materials, vec![42.0, 12.8, 12.8, 12.8]);
  }

  #[test]
  fn rendering_twice_does_not_rescale_electrons() {
    let mut scene = Scene::new(1.0, 90.0);
    kinematics::update(&mut scene, 0.5);
    let stored = scene.transforms.clone();
    let first = render_once(&scene);
    let second = render_once(&scene);
    assert_eq!(first.commands, second.commands);
    assert_eq!(scene.transforms, stored);
  }

  #[test]
  fn electron_draw_transform_is_scaled_kinematics() {
    let mut scene = Scene::new(1.0, 30.0);
    kinematics::update(&mut scene, 1.0);
    let backend = render_once(&scene);
    let transforms: Vec<_> = backend
      .commands
      .iter()
      .filter_map(|c| match c {
        Command::SetObjectTransforms(t) => Some(*t),
        _ => None,
      })
      .collect();
    assert_eq!(transforms.len(), 4);
    let expected = Matrix4::from_translation(Vector3::new(1.5, 0.0, 0.0))
      * Matrix4::from_angle_y(Deg(30.0))
      * Matrix4::from_scale(0.15);
    let got: [[f32; 4]; 4] = transforms[1].model.into();
    let want: [[f32; 4]; 4] = expected.into();
    for (g, w) in got.iter().flatten().zip(want.iter().flatten()) {
      assert_abs_diff_eq!(g, w, epsilon = 1e-5);
    }
  }

  #[test]
  fn normal_matrix_undoes_non_uniform_scale() {
    let model = Matrix4::from_nonuniform_scale(2.0, 4.0, 0.5);
    let normal = normal_matrix(&model);
    assert_abs_diff_eq!(normal.x.x, 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(normal.y.y, 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(normal.z.z, 2.0, epsilon = 1e-6);
  }

  #[test]
  fn normal_matrix_of_rotation_is_the_rotation() {
    let model = Matrix4::from_angle_y(Deg(37.0));
    let normal = normal_matrix(&model);
    let rotation = Matrix3::from_angle_y(Deg(37.0));
    let got: [[f32; 3]; 3] = normal.into();
    let want: [[f32; 3]; 3] = rotation.into();
    for (g, w) in got.iter().flatten().zip(want.iter().flatten()) {
      assert_abs_diff_eq!(g, w, epsilon = 1e-5);
    }
  }
}
