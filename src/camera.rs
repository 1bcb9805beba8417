use cgmath::{Deg, Matrix4, Point3, Vector3};

/// Column-major: halves clip z and adds half of w, taking OpenGL's -1..1
/// depth to wgpu's 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Fixed camera. View and projection are derived on demand; nothing moves it
/// at runtime.
#[derive(Clone, Debug)]
pub struct Camera {
  pub eye: Point3<f32>,
  pub target: Point3<f32>,
  pub up: Vector3<f32>,
  pub aspect: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
}

impl Camera {
  #[must_use]
  pub fn new(aspect: f32) -> Self {
    Self {
      // slightly above the orbit planes, looking at the nucleus
      eye: (0.0, 1.0, 4.5).into(),
      target: (0.0, 0.0, 0.0).into(),
      up: Vector3::unit_y(),
      aspect,
      fovy: 45.0,
      znear: 0.1,
      zfar: 10.0,
    }
  }

  #[must_use]
  pub fn view(&self) -> Matrix4<f32> {
    Matrix4::look_at_rh(self.eye, self.target, self.up)
  }

  /// Perspective projection remapped to wgpu's 0..1 clip depth.
  #[must_use]
  pub fn projection(&self) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(self.fovy), self.aspect, self.znear, self.zfar)
  }

  #[must_use]
  pub fn view_projection(&self) -> Matrix4<f32> {
    self.projection() * self.view()
  }
}
