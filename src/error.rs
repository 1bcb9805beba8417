use std::path::PathBuf;

/// Fatal failures while bringing the viewer up. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("failed to initialise the event loop: {0}")]
  EventLoop(#[from] winit::error::EventLoopError),
  #[error("failed to create window: {0}")]
  Window(#[from] winit::error::OsError),
  #[error("failed to create drawing surface: {0}")]
  Surface(#[from] wgpu::CreateSurfaceError),
  #[error("no compatible graphics adapter found")]
  NoAdapter,
  #[error("failed to acquire graphics device: {0}")]
  Device(#[from] wgpu::RequestDeviceError),
  #[error("surface is not supported by the selected adapter")]
  SurfaceUnsupported,
  #[error("shader `{label}` failed to compile: {message}")]
  Shader { label: &'static str, message: String },
  #[error("failed to load mesh `{}`: {source}", .path.display())]
  Mesh {
    path: PathBuf,
    #[source]
    source: tobj::LoadError,
  },
  #[error("mesh `{}` contains no triangles", .0.display())]
  EmptyMesh(PathBuf),
  #[error("failed to install close signal handler: {0}")]
  Signal(#[from] ctrlc::Error),
}
