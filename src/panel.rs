use crate::scene::Scene;
use crate::state::FrameStats;
use std::sync::Arc;
use winit::{event::WindowEvent, window::Window};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
  ReadOnly,
  ReadWrite,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Kind {
  Bool,
  Float { min: f32, max: f32, step: f32 },
  Display { precision: usize },
  Color3,
}

/// Live value a binding reads or writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Param {
  Wireframe,
  FrameRate,
  FrameTime,
  LightX,
  LightY,
  LightZ,
  NucleusShininess,
  NucleusSpecular,
  OrbitSpeed,
  ElectronDiffuse,
}

#[derive(Copy, Clone, Debug)]
pub struct Binding {
  pub label: &'static str,
  pub group: &'static str,
  pub access: Access,
  pub kind: Kind,
  pub param: Param,
}

const LIGHT_RANGE: Kind = Kind::Float {
  min: -10.0,
  max: 10.0,
  step: 1.0,
};

#[rustfmt::skip]
pub const BINDINGS: [Binding; 10] = [
  Binding { label: "Wireframe", group: "Controls", access: Access::ReadWrite, kind: Kind::Bool, param: Param::Wireframe },
  Binding { label: "Frame Rate", group: "Frame Stats", access: Access::ReadOnly, kind: Kind::Display { precision: 2 }, param: Param::FrameRate },
  Binding { label: "Frame Time", group: "Frame Stats", access: Access::ReadOnly, kind: Kind::Display { precision: 4 }, param: Param::FrameTime },
  Binding { label: "Position X", group: "Light", access: Access::ReadWrite, kind: LIGHT_RANGE, param: Param::LightX },
  Binding { label: "Position Y", group: "Light", access: Access::ReadWrite, kind: LIGHT_RANGE, param: Param::LightY },
  Binding { label: "Position Z", group: "Light", access: Access::ReadWrite, kind: LIGHT_RANGE, param: Param::LightZ },
  Binding { label: "Shininess", group: "Nucleus", access: Access::ReadWrite, kind: Kind::Float { min: 1.0, max: 50.0, step: 1.0 }, param: Param::NucleusShininess },
  Binding { label: "Specular Colour", group: "Nucleus", access: Access::ReadWrite, kind: Kind::Color3, param: Param::NucleusSpecular },
  Binding { label: "Orbit Speed", group: "Electron", access: Access::ReadWrite, kind: Kind::Float { min: 0.0, max: 300.0, step: 10.0 }, param: Param::OrbitSpeed },
  Binding { label: "Diffuse Colour", group: "Electron", access: Access::ReadWrite, kind: Kind::Color3, param: Param::ElectronDiffuse },
];

/// Groups in first-appearance order.
#[must_use]
pub fn groups() -> Vec<&'static str> {
  let mut groups = Vec::new();
  for binding in &BINDINGS {
    if !groups.contains(&binding.group) {
      groups.push(binding.group);
    }
  }
  groups
}

/// Toggles owned by the panel rather than the scene.
#[derive(Clone, Debug, Default)]
pub struct Controls {
  pub wireframe: bool,
}

/// Borrowed view of all the memory the panel binds to for one frame.
pub struct PanelTargets<'a> {
  pub scene: &'a mut Scene,
  pub controls: &'a mut Controls,
  pub stats: &'a FrameStats,
}

impl PanelTargets<'_> {
  #[must_use]
  pub fn read_float(&self, param: Param) -> Option<f32> {
    match param {
      Param::FrameRate => Some(self.stats.frame_rate),
      Param::FrameTime => Some(self.stats.frame_time),
      Param::LightX => Some(self.scene.light.position.x),
      Param::LightY => Some(self.scene.light.position.y),
      Param::LightZ => Some(self.scene.light.position.z),
      Param::NucleusShininess => Some(self.scene.materials.pearl.shininess),
      Param::OrbitSpeed => Some(self.scene.orbit.speed),
      _ => None,
    }
  }

  /// Writable float for a read-write binding.
  pub fn float_mut(&mut self, param: Param) -> Option<&mut f32> {
    match param {
      Param::LightX => Some(&mut self.scene.light.position.x),
      Param::LightY => Some(&mut self.scene.light.position.y),
      Param::LightZ => Some(&mut self.scene.light.position.z),
      Param::NucleusShininess => Some(&mut self.scene.materials.pearl.shininess),
      Param::OrbitSpeed => Some(&mut self.scene.orbit.speed),
      _ => None,
    }
  }

  pub fn color_mut(&mut self, param: Param) -> Option<&mut [f32; 3]> {
    match param {
      Param::NucleusSpecular => Some(self.scene.materials.pearl.specular.as_mut()),
      Param::ElectronDiffuse => Some(self.scene.materials.jade.diffuse.as_mut()),
      _ => None,
    }
  }

  pub fn bool_mut(&mut self, param: Param) -> Option<&mut bool> {
    match param {
      Param::Wireframe => Some(&mut self.controls.wireframe),
      _ => None,
    }
  }

  /// Writes a float through a binding, clamped to its range. Read-only
  /// bindings are left alone. Returns whether anything was written.
  pub fn set_float(&mut self, binding: &Binding, value: f32) -> bool {
    let Kind::Float { min, max, .. } = binding.kind else {
      return false;
    };
    if binding.access == Access::ReadOnly {
      return false;
    }
    match self.float_mut(binding.param) {
      Some(target) => {
        *target = value.clamp(min, max);
        true
      }
      None => false,
    }
  }
}

/// Lays the bindings out as one collapsing section per group.
pub fn show(ctx: &egui::Context, targets: &mut PanelTargets<'_>) {
  egui::Window::new("User Interface")
    .default_width(220.0)
    .resizable(false)
    .show(ctx, |ui| {
      for group in groups() {
        egui::CollapsingHeader::new(group)
          .default_open(true)
          .show(ui, |ui| {
            for binding in BINDINGS.iter().filter(|b| b.group == group) {
              show_binding(ui, binding, targets);
            }
          });
      }
    });
}

fn show_binding(ui: &mut egui::Ui, binding: &Binding, targets: &mut PanelTargets<'_>) {
  match binding.kind {
    Kind::Bool => {
      if let Some(value) = targets.bool_mut(binding.param) {
        ui.checkbox(value, binding.label);
      }
    }
    Kind::Display { precision } => {
      if let Some(value) = targets.read_float(binding.param) {
        ui.label(format!("{}: {value:.precision$}", binding.label));
      }
    }
    Kind::Float { min, max, step } => {
      if let Some(value) = targets.float_mut(binding.param) {
        ui.add(
          egui::Slider::new(value, min..=max)
            .step_by(f64::from(step))
            .text(binding.label),
        );
      }
    }
    Kind::Color3 => {
      if let Some(value) = targets.color_mut(binding.param) {
        ui.horizontal(|ui| {
          ui.color_edit_button_rgb(value);
          ui.label(binding.label);
        });
      }
    }
  }
}

/// egui context, its winit input state and its wgpu renderer.
pub struct Overlay {
  ctx: egui::Context,
  state: egui_winit::State,
  renderer: egui_wgpu::Renderer,
}

impl Overlay {
  #[must_use]
  pub fn init(window: &Window, device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
    let ctx = egui::Context::default();
    let state = egui_winit::State::new(
      ctx.clone(),
      egui::ViewportId::ROOT,
      window,
      Some(window.scale_factor() as f32),
      None,
      None,
    );
    let renderer = egui_wgpu::Renderer::new(device, format, None, 1, false);
    Self { ctx, state, renderer }
  }

  /// Forwards pointer, button and resize events. Returns true when the panel
  /// consumed the event.
  pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
    self.state.on_window_event(window, event).consumed
  }

  /// Builds the panel for this frame and draws it over `view`.
  pub fn draw(
    &mut self,
    window: &Arc<Window>,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    view: &wgpu::TextureView,
    size_in_pixels: [u32; 2],
    targets: &mut PanelTargets<'_>,
  ) {
    let raw_input = self.state.take_egui_input(window);
    let full_output = self.ctx.run(raw_input, |ctx| show(ctx, targets));
    self
      .state
      .handle_platform_output(window, full_output.platform_output);

    let clipped_primitives = self
      .ctx
      .tessellate(full_output.shapes, full_output.pixels_per_point);
    let screen_descriptor = egui_wgpu::ScreenDescriptor {
      size_in_pixels,
      pixels_per_point: full_output.pixels_per_point,
    };
    for (id, image_delta) in &full_output.textures_delta.set {
      self.renderer.update_texture(device, queue, *id, image_delta);
    }

    let mut command_encoder =
      device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Overlay Encoder") });
    let extra = self.renderer.update_buffers(
      device,
      queue,
      &mut command_encoder,
      &clipped_primitives,
      &screen_descriptor,
    );
    {
      let mut rpass = command_encoder
        .begin_render_pass(&wgpu::RenderPassDescriptor {
          label: Some("Overlay Pass"),
          color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
              load: wgpu::LoadOp::Load,
              store: wgpu::StoreOp::Store,
            },
          })],
          depth_stencil_attachment: None,
          timestamp_writes: None,
          occlusion_query_set: None,
        })
        .forget_lifetime();
      self
        .renderer
        .render(&mut rpass, &clipped_primitives, &screen_descriptor);
    }
    for id in &full_output.textures_delta.free {
      self.renderer.free_texture(id);
    }
    queue.submit(extra.into_iter().chain(Some(command_encoder.finish())));
  }
}
