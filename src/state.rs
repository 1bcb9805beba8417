use crate::error::AppError;
use crate::gpu::GpuRenderer;
use crate::kinematics;
use crate::panel::{Controls, Overlay, PanelTargets};
use crate::render::{PolygonMode, RecordingBackend, RenderBackend, Renderer, Viewport};
use crate::scene::Scene;
use crate::AppConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::{dpi::PhysicalSize, window::Window, window::WindowId};

/// Frame rate and frame time averaged over roughly one-second windows.
#[derive(Clone, Debug)]
pub struct FrameStats {
  pub frame_rate: f32,
  /// Seconds. Also the step the orbit advances by each frame.
  pub frame_time: f32,
  window_start: Instant,
  frame_count: u32,
}

impl Default for FrameStats {
  fn default() -> Self {
    Self::new(Instant::now())
  }
}

impl FrameStats {
  #[must_use]
  pub fn new(now: Instant) -> Self {
    Self {
      frame_rate: 60.0,
      frame_time: 1.0 / 60.0,
      window_start: now,
      frame_count: 0,
    }
  }

  /// Counts a finished frame. Once more than a second has gone by since the
  /// window opened, the averages are recomputed and the window restarts.
  /// Returns whether the averages changed.
  pub fn record_frame(&mut self, now: Instant) -> bool {
    self.frame_count += 1;
    let elapsed = now.duration_since(self.window_start);
    if elapsed <= Duration::from_secs(1) {
      return false;
    }
    self.frame_time = elapsed.as_secs_f32() / self.frame_count as f32;
    self.frame_rate = 1.0 / self.frame_time;
    self.window_start = now;
    self.frame_count = 0;
    log::debug!("{:.1} fps ({:.4}s per frame)", self.frame_rate, self.frame_time);
    true
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
  Running,
  Closing,
  Terminated,
}

/// Scene draw for one frame: pick the polygon mode, render, then put fill
/// mode back whatever the toggle says.
pub fn draw_scene<B: RenderBackend + ?Sized>(
  renderer: &Renderer,
  scene: &Scene,
  controls: &Controls,
  backend: &mut B,
) {
  let mode = if controls.wireframe {
    PolygonMode::Line
  } else {
    PolygonMode::Fill
  };
  backend.set_polygon_mode(mode);
  renderer.render(scene, backend);
  backend.set_polygon_mode(PolygonMode::Fill);
}

/// Simulation side of the viewer: everything that exists without a window.
pub struct Simulation {
  pub scene: Scene,
  pub renderer: Renderer,
  pub controls: Controls,
  pub stats: FrameStats,
}

impl Simulation {
  #[must_use]
  pub fn new(config: &AppConfig) -> Self {
    let viewport = Viewport::orbit_view(config.width, config.height);
    Self {
      scene: Scene::new(viewport.aspect(), config.orbit_speed),
      renderer: Renderer::new(viewport),
      controls: Controls::default(),
      stats: FrameStats::default(),
    }
  }

  /// Refits the orbit viewport and the projection aspect to a new surface.
  pub fn resize(&mut self, width: u32, height: u32) {
    let viewport = Viewport::orbit_view(width, height);
    self.renderer.viewport = viewport;
    self.scene.camera.aspect = viewport.aspect();
  }

  /// Kinematics then scene draw, one frame's worth.
  pub fn step<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
    kinematics::update(&mut self.scene, self.stats.frame_time);
    draw_scene(&self.renderer, &self.scene, &self.controls, backend);
  }
}

/// Summary of a headless run.
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessReport {
  pub frames: u32,
  pub angle: f32,
  pub line_loops: usize,
  pub mesh_draws: usize,
}

/// Steps the simulation `frames` times at a fixed 1/60 s without a window.
#[must_use]
pub fn run_headless(config: &AppConfig, frames: u32) -> HeadlessReport {
  let mut sim = Simulation::new(config);
  sim.stats.frame_time = 1.0 / 60.0;
  let mut backend = RecordingBackend::default();
  for _ in 0..frames {
    sim.step(&mut backend);
  }
  let report = HeadlessReport {
    frames,
    angle: sim.scene.orbit.angle,
    line_loops: backend.line_loops().count(),
    mesh_draws: backend.mesh_draws().count(),
  };
  log::info!(
    "headless: {} frames, orbit angle {:.3}°, {} line loops, {} mesh draws",
    report.frames,
    report.angle,
    report.line_loops,
    report.mesh_draws
  );
  report
}

struct SurfaceWrapper {
  surface: wgpu::Surface<'static>,
  config: wgpu::SurfaceConfiguration,
}

impl SurfaceWrapper {
  fn resume(
    context: &GpuContext,
    surface: wgpu::Surface<'static>,
    size: PhysicalSize<u32>,
    vsync: bool,
  ) -> Result<Self, AppError> {
    let width = size.width.max(1);
    let height = size.height.max(1);
    let mut config = surface
      .get_default_config(&context.adapter, width, height)
      .ok_or(AppError::SurfaceUnsupported)?;
    let view_format = config.format.add_srgb_suffix();
    config.view_formats.push(view_format);
    config.present_mode = if vsync {
      wgpu::PresentMode::AutoVsync
    } else {
      wgpu::PresentMode::AutoNoVsync
    };
    surface.configure(&context.device, &config);
    Ok(Self { surface, config })
  }

  fn resize(&mut self, context: &GpuContext, size: PhysicalSize<u32>) {
    self.config.width = size.width.max(1);
    self.config.height = size.height.max(1);
    self.surface.configure(&context.device, &self.config);
  }

  /// Next frame to draw into, or `None` if this frame should be skipped.
  fn acquire(&mut self, context: &GpuContext) -> Option<wgpu::SurfaceTexture> {
    match self.surface.get_current_texture() {
      Ok(frame) => Some(frame),
      Err(wgpu::SurfaceError::Timeout) => {
        log::warn!("timed out waiting for the next frame");
        None
      }
      Err(err @ (wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost)) => {
        log::warn!("surface {err}; reconfiguring");
        self.surface.configure(&context.device, &self.config);
        None
      }
      Err(wgpu::SurfaceError::OutOfMemory) => {
        log::error!("out of memory acquiring the next frame");
        None
      }
    }
  }

  fn size(&self) -> [u32; 2] {
    [self.config.width, self.config.height]
  }
}

struct GpuContext {
  adapter: wgpu::Adapter,
  device: wgpu::Device,
  queue: wgpu::Queue,
}

impl GpuContext {
  async fn init(instance: &wgpu::Instance, surface: &wgpu::Surface<'static>) -> Result<Self, AppError> {
    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: Some(surface),
        force_fallback_adapter: false,
      })
      .await
      .ok_or(AppError::NoAdapter)?;
    log::info!("using adapter {:?}", adapter.get_info().name);

    let required_features = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: None,
          required_features,
          required_limits: wgpu::Limits::default(),
          memory_hints: Default::default(),
        },
        None,
      )
      .await?;
    device.on_uncaptured_error(Box::new(|error: wgpu::Error| log::error!("graphics error: {error}")));
    Ok(Self {
      adapter,
      device,
      queue,
    })
  }
}

/// Everything that only exists while a window is open.
struct Viewer {
  window: Arc<Window>,
  surface: SurfaceWrapper,
  context: GpuContext,
  gpu: GpuRenderer,
  overlay: Overlay,
}

impl Viewer {
  fn init(event_loop: &ActiveEventLoop, config: &AppConfig, scene: &Scene) -> Result<Self, AppError> {
    let attributes = Window::default_attributes()
      .with_title(config.title.clone())
      .with_inner_size(PhysicalSize::new(config.width, config.height))
      .with_resizable(false);
    let window = Arc::new(event_loop.create_window(attributes)?);

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
      #[cfg(not(target_arch = "wasm32"))]
      backends: wgpu::Backends::PRIMARY,
      ..Default::default()
    });
    let surface = instance.create_surface(window.clone())?;
    let context = pollster::block_on(GpuContext::init(&instance, &surface))?;
    let surface = SurfaceWrapper::resume(&context, surface, window.inner_size(), config.vsync)?;

    let [width, height] = surface.size();
    let gpu = GpuRenderer::init(
      &context.device,
      surface.config.view_formats[0],
      (width, height),
      scene,
      &config.mesh_path,
    )?;
    let overlay = Overlay::init(&window, &context.device, surface.config.format);
    Ok(Self {
      window,
      surface,
      context,
      gpu,
      overlay,
    })
  }

  fn resize(&mut self, size: PhysicalSize<u32>) {
    self.surface.resize(&self.context, size);
    let [width, height] = self.surface.size();
    self.gpu.resize(&self.context.device, width, height);
  }

  fn redraw(&mut self, sim: &mut Simulation) {
    let Some(frame) = self.surface.acquire(&self.context) else {
      return;
    };
    let scene_view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
      format: Some(self.surface.config.view_formats[0]),
      ..wgpu::TextureViewDescriptor::default()
    });
    let overlay_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

    {
      let mut backend = self
        .gpu
        .frame(&self.context.device, &self.context.queue, &scene_view);
      sim.step(&mut backend);
    }

    let mut targets = PanelTargets {
      scene: &mut sim.scene,
      controls: &mut sim.controls,
      stats: &sim.stats,
    };
    self.overlay.draw(
      &self.window,
      &self.context.device,
      &self.context.queue,
      &overlay_view,
      self.surface.size(),
      &mut targets,
    );
    frame.present();
  }
}

struct App {
  config: AppConfig,
  sim: Simulation,
  viewer: Option<Viewer>,
  lifecycle: Lifecycle,
  interrupted: Arc<AtomicBool>,
  error: Option<AppError>,
}

impl App {
  fn new(config: AppConfig, interrupted: Arc<AtomicBool>) -> Self {
    let sim = Simulation::new(&config);
    Self {
      config,
      sim,
      viewer: None,
      lifecycle: Lifecycle::Running,
      interrupted,
      error: None,
    }
  }

  fn close(&mut self, event_loop: &ActiveEventLoop) {
    if self.lifecycle == Lifecycle::Running {
      log::info!("closing");
      self.lifecycle = Lifecycle::Closing;
    }
    event_loop.exit();
  }
}

impl ApplicationHandler for App {
  fn resumed(&mut self, event_loop: &ActiveEventLoop) {
    if self.viewer.is_some() || self.lifecycle != Lifecycle::Running {
      return;
    }
    match Viewer::init(event_loop, &self.config, &self.sim.scene) {
      Ok(viewer) => {
        let [width, height] = viewer.surface.size();
        self.sim.resize(width, height);
        self.sim.stats = FrameStats::default();
        self.viewer = Some(viewer);
      }
      Err(err) => {
        self.error = Some(err);
        self.close(event_loop);
      }
    }
  }

  fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
    let Some(viewer) = self.viewer.as_mut() else {
      return;
    };
    if window_id != viewer.window.id() {
      return;
    }
    match event {
      WindowEvent::CloseRequested
      | WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            state: ElementState::Pressed,
            physical_key: PhysicalKey::Code(KeyCode::Escape),
            ..
          },
        ..
      } => self.close(event_loop),
      WindowEvent::RedrawRequested => {
        if self.lifecycle != Lifecycle::Running {
          return;
        }
        viewer.redraw(&mut self.sim);
        self.sim.stats.record_frame(Instant::now());
        viewer.window.request_redraw();
      }
      event => {
        if let WindowEvent::Resized(size) = event {
          viewer.resize(size);
          let [width, height] = viewer.surface.size();
          self.sim.resize(width, height);
        }
        viewer.overlay.handle_event(&viewer.window, &event);
      }
    }
  }

  fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
    if self.interrupted.load(Ordering::SeqCst) {
      self.close(event_loop);
    }
  }

  fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
    // GPU, surface and overlay resources go before the window does
    self.viewer = None;
    self.lifecycle = Lifecycle::Terminated;
    log::info!("terminated");
  }
}

/// Opens the window and drives frames until a close signal arrives, or runs
/// headless when the config asks for it.
pub fn run(config: AppConfig) -> Result<(), AppError> {
  if let Some(frames) = config.headless_frames {
    let _report = run_headless(&config, frames);
    return Ok(());
  }

  let interrupted = Arc::new(AtomicBool::new(false));
  let flag = interrupted.clone();
  ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

  let event_loop = EventLoop::new()?;
  event_loop.set_control_flow(ControlFlow::Poll);
  let mut app = App::new(config, interrupted);
  event_loop.run_app(&mut app)?;
  match app.error {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render::Command;
  use approx::assert_abs_diff_eq;

  #[test]
  fn stats_hold_until_a_second_has_passed() {
    let start = Instant::now();
    let mut stats = FrameStats::new(start);
    for i in 1..=10 {
      assert!(!stats.record_frame(start + Duration::from_millis(100 * i)));
    }
    assert_eq!(stats.frame_rate, 60.0);
  }

  #[test]
  fn stats_average_over_the_window() {
    let start = Instant::now();
    let mut stats = FrameStats::new(start);
    for i in 1..=40 {
      assert!(!stats.record_frame(start + Duration::from_millis(25 * i)));
    }
    assert!(stats.record_frame(start + Duration::from_millis(1025)));
    assert_abs_diff_eq!(stats.frame_time, 0.025, epsilon = 1e-6);
    assert_abs_diff_eq!(stats.frame_rate, 40.0, epsilon = 1e-3);
    // the next window starts fresh
    assert!(!stats.record_frame(start + Duration::from_millis(1300)));
  }

  fn modes_around_draws(wireframe: bool) -> (Vec<PolygonMode>, PolygonMode) {
    let config = AppConfig::default();
    let mut sim = Simulation::new(&config);
    sim.controls.wireframe = wireframe;
    let mut backend = RecordingBackend::default();
    sim.step(&mut backend);
    let modes = backend.mesh_draws().map(|(_, mode)| mode).collect();
    (modes, backend.polygon_mode())
  }

  #[test]
  fn solid_draws_fill_without_wireframe() {
    let (modes, after) = modes_around_draws(false);
    assert_eq!(modes, vec![PolygonMode::Fill; 4]);
    assert_eq!(after, PolygonMode::Fill);
  }

  #[test]
  fn wireframe_applies_to_solids_and_is_restored() {
    let (modes, after) = modes_around_draws(true);
    assert_eq!(modes, vec![PolygonMode::Line; 4]);
    assert_eq!(after, PolygonMode::Fill);
  }

  #[test]
  fn fill_is_restored_after_the_flush() {
    let config = AppConfig::default();
    let mut sim = Simulation::new(&config);
    sim.controls.wireframe = true;
    let mut backend = RecordingBackend::default();
    sim.step(&mut backend);
    let flush = backend
      .commands
      .iter()
      .position(|c| *c == Command::Flush)
      .expect("flushed");
    assert_eq!(backend.commands[flush + 1], Command::SetPolygonMode(PolygonMode::Fill));
  }

  #[test]
  fn electrons_rest_until_the_speed_is_raised() {
    let mut sim = Simulation::new(&AppConfig::default());
    let before = sim.scene.transforms.clone();
    let mut backend = RecordingBackend::default();
    for _ in 0..30 {
      sim.step(&mut backend);
    }
    assert_eq!(sim.scene.orbit.angle, 0.0);
    assert_eq!(sim.scene.transforms, before);
  }

  #[test]
  fn resized_surface_keeps_the_viewport_inside() {
    let mut sim = Simulation::new(&AppConfig::default());
    sim.resize(1200, 740);
    let mut backend = RecordingBackend::default();
    sim.step(&mut backend);
    let viewport = backend
      .commands
      .iter()
      .find_map(|c| match c {
        Command::SetViewport(v) => Some(*v),
        _ => None,
      })
      .expect("viewport set");
    assert!(viewport.y + viewport.height <= 740.0, "bottom edge {}", viewport.y + viewport.height);
    assert!(viewport.x + viewport.width <= 1200.0);
    assert_eq!(sim.scene.camera.aspect, viewport.aspect());
  }

  #[test]
  fn headless_run_reports_angle_and_draws() {
    let config = AppConfig {
      orbit_speed: 30.0,
      ..AppConfig::default()
    };
    let report = run_headless(&config, 60);
    assert_eq!(report.frames, 60);
    assert_abs_diff_eq!(report.angle, 30.0, epsilon = 1e-3);
    assert_eq!(report.line_loops, 180);
    assert_eq!(report.mesh_draws, 240);
  }
}
