pub mod camera;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod kinematics;
pub mod mesh;
pub mod panel;
pub mod render;
pub mod scene;
pub mod state;

use std::path::PathBuf;

pub use error::AppError;

/// Startup configuration for the viewer.
#[derive(Clone, Debug)]
pub struct AppConfig {
  pub width: u32,
  pub height: u32,
  pub title: String,
  /// Present in lockstep with the display refresh.
  pub vsync: bool,
  pub mesh_path: PathBuf,
  /// Initial electron orbit speed in degrees per second.
  pub orbit_speed: f32,
  /// Run this many simulated frames without a window instead of opening one.
  pub headless_frames: Option<u32>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      width: 1200,
      height: 900,
      title: "Atom".to_string(),
      vsync: true,
      mesh_path: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/models/sphere.obj")),
      orbit_speed: 0.0,
      headless_frames: None,
    }
  }
}

/// Point light as laid out in the lit shader's frame uniform, followed by the
/// viewpoint used for specular highlights.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
  pub position: [f32; 3],
  _pad0: f32,
  pub ambient: [f32; 3],
  _pad1: f32,
  pub diffuse: [f32; 3],
  _pad2: f32,
  pub specular: [f32; 3],
  _pad3: f32,
  pub attenuation: [f32; 3],
  _pad4: f32,
  pub viewpoint: [f32; 3],
  _pad5: f32,
}

impl LightUniform {
  #[must_use]
  pub fn new(light: &scene::Light, viewpoint: cgmath::Point3<f32>) -> Self {
    Self {
      position: light.position.into(),
      ambient: light.ambient.into(),
      diffuse: light.diffuse.into(),
      specular: light.specular.into(),
      attenuation: light.attenuation.into(),
      viewpoint: viewpoint.into(),
      ..bytemuck::Zeroable::zeroed()
    }
  }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
  pub ambient: [f32; 3],
  _pad0: f32,
  pub diffuse: [f32; 3],
  _pad1: f32,
  pub specular: [f32; 3],
  pub shininess: f32,
}

impl From<&scene::Material> for MaterialUniform {
  fn from(material: &scene::Material) -> Self {
    Self {
      ambient: material.ambient.into(),
      diffuse: material.diffuse.into(),
      specular: material.specular.into(),
      shininess: material.shininess,
      ..bytemuck::Zeroable::zeroed()
    }
  }
}

/// Per-object block of the lit shader: model, MVP and normal matrices plus the
/// material. The normal matrix is a mat3x3 whose columns are padded to vec4.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
  pub model: [[f32; 4]; 4],
  pub mvp: [[f32; 4]; 4],
  pub normal: [[f32; 4]; 3],
  pub material: MaterialUniform,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PathUniform {
  pub mvp: [[f32; 4]; 4],
}
