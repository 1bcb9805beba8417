use crate::error::AppError;
use crate::geometry::VertexRange;
use crate::mesh::{GpuMesh, MeshData, MeshVertex};
use crate::render::{ObjectTransforms, PolygonMode, Program, RenderBackend, Viewport};
use crate::scene::{Entity, Material, Scene};
use crate::{LightUniform, MaterialUniform, ObjectUniform, PathUniform};
use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;
use wgpu::{util::DeviceExt, PipelineCompilationOptions};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Uniform slots per frame for each per-draw buffer.
const MAX_DRAWS: u64 = 8;

/// Compiles WGSL inside a validation error scope so a bad shader is reported
/// instead of aborting the process.
pub fn create_shader(
  device: &wgpu::Device,
  label: &'static str,
  source: &'static str,
) -> Result<wgpu::ShaderModule, AppError> {
  device.push_error_scope(wgpu::ErrorFilter::Validation);
  let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
    label: Some(label),
    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
  });
  match pollster::block_on(device.pop_error_scope()) {
    Some(error) => Err(AppError::Shader {
      label,
      message: error.to_string(),
    }),
    None => Ok(module),
  }
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
  let texture = device.create_texture(&wgpu::TextureDescriptor {
    label: Some("Depth Texture"),
    size: wgpu::Extent3d {
      width: width.max(1),
      height: height.max(1),
      depth_or_array_layers: 1,
    },
    mip_level_count: 1,
    sample_count: 1,
    dimension: wgpu::TextureDimension::D2,
    format: DEPTH_FORMAT,
    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
    view_formats: &[],
  });
  texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn uniform_layout_entry(dynamic: bool, size: usize) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding: 0,
    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Uniform,
      has_dynamic_offset: dynamic,
      min_binding_size: wgpu::BufferSize::new(size as _),
    },
    count: None,
  }
}

/// Uniform buffer holding `MAX_DRAWS` values of `T`, one per draw, each at a
/// dynamic offset.
struct DrawUniforms {
  buffer: wgpu::Buffer,
  bind_group: wgpu::BindGroup,
  layout: wgpu::BindGroupLayout,
  stride: u64,
  size: usize,
}

impl DrawUniforms {
  fn new(device: &wgpu::Device, label: &str, size: usize) -> Self {
    let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
    let stride = wgpu::util::align_to(size as u64, alignment);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
      label: Some(&format!("{label} Uniform Buffer")),
      size: stride * MAX_DRAWS,
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some(&format!("{label} Bind Group Layout")),
      entries: &[uniform_layout_entry(true, size)],
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some(&format!("{label} Bind Group")),
      layout: &layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
          buffer: &buffer,
          offset: 0,
          size: wgpu::BufferSize::new(size as _),
        }),
      }],
    });
    Self {
      buffer,
      bind_group,
      layout,
      stride,
      size,
    }
  }

  fn write<T: bytemuck::Pod>(&self, queue: &wgpu::Queue, values: &[T]) {
    if values.is_empty() {
      return;
    }
    let mut bytes = vec![0u8; self.stride as usize * values.len()];
    for (slot, value) in values.iter().enumerate() {
      let start = slot * self.stride as usize;
      bytes[start..start + self.size].copy_from_slice(bytemuck::bytes_of(value));
    }
    queue.write_buffer(&self.buffer, 0, &bytes);
  }

  fn offset(&self, slot: u32) -> u32 {
    (u64::from(slot) * self.stride) as u32
  }
}

enum Draw {
  LineLoop { slot: u32, indices: Range<u32> },
  Mesh { slot: u32, entity: Entity, mode: PolygonMode },
}

/// State accumulated between `clear` and `flush`.
#[derive(Default)]
struct FrameRecord {
  clear: Option<wgpu::Color>,
  viewport: Option<Viewport>,
  program: Option<Program>,
  light: Option<LightUniform>,
  path_uniform: Option<PathUniform>,
  material: Option<MaterialUniform>,
  transforms: Option<ObjectTransforms>,
  path_uniforms: Vec<PathUniform>,
  object_uniforms: Vec<ObjectUniform>,
  draws: Vec<Draw>,
}

/// GPU resources for both shader programs, the orbit path buffer and the
/// sphere meshes.
pub struct GpuRenderer {
  path_pipeline: wgpu::RenderPipeline,
  fill_pipeline: wgpu::RenderPipeline,
  line_pipeline: Option<wgpu::RenderPipeline>,
  path_vertex_buffer: wgpu::Buffer,
  path_index_buffer: wgpu::Buffer,
  loops: Vec<(VertexRange, Range<u32>)>,
  path_uniforms: DrawUniforms,
  object_uniforms: DrawUniforms,
  light_buffer: wgpu::Buffer,
  light_bind_group: wgpu::BindGroup,
  meshes: Vec<GpuMesh>,
  depth_view: wgpu::TextureView,
  polygon_mode: PolygonMode,
  record: FrameRecord,
}

impl GpuRenderer {
  pub fn init(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: (u32, u32),
    scene: &Scene,
    mesh_path: &Path,
  ) -> Result<Self, AppError> {
    let path_shader = create_shader(device, "path.wgsl", include_str!("shaders/path.wgsl"))?;
    let lit_shader = create_shader(device, "phong.wgsl", include_str!("shaders/phong.wgsl"))?;

    let path_uniforms = DrawUniforms::new(device, "Path", std::mem::size_of::<PathUniform>());
    let object_uniforms = DrawUniforms::new(device, "Object", std::mem::size_of::<ObjectUniform>());

    let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Light Buffer"),
      contents: bytemuck::cast_slice(&[LightUniform::new(&scene.light, scene.viewpoint)]),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let light_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("light_bind_group_layout"),
      entries: &[uniform_layout_entry(false, std::mem::size_of::<LightUniform>())],
    });
    let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("light_bind_group"),
      layout: &light_bind_group_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: light_buffer.as_entire_binding(),
      }],
    });

    // ========================================================================
    // orbit path pipeline
    // ========================================================================

    let path_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("path"),
      bind_group_layouts: &[&path_uniforms.layout],
      push_constant_ranges: &[],
    });
    let path_vertex_layout = wgpu::VertexBufferLayout {
      array_stride: 3 * 4,
      step_mode: wgpu::VertexStepMode::Vertex,
      attributes: &wgpu::vertex_attr_array![0 => Float32x3],
    };
    let path_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
      label: Some("Path Pipeline"),
      layout: Some(&path_layout),
      vertex: wgpu::VertexState {
        module: &path_shader,
        entry_point: "main_vs",
        compilation_options: PipelineCompilationOptions::default(),
        buffers: &[path_vertex_layout],
      },
      fragment: Some(wgpu::FragmentState {
        module: &path_shader,
        entry_point: "main_fs",
        compilation_options: PipelineCompilationOptions::default(),
        targets: &[Some(format.into())],
      }),
      primitive: wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::LineStrip,
        strip_index_format: Some(wgpu::IndexFormat::Uint32),
        ..Default::default()
      },
      depth_stencil: Some(depth_state()),
      multisample: wgpu::MultisampleState::default(),
      multiview: None,
      cache: None,
    });

    // ========================================================================
    // lit pipelines
    // ========================================================================

    let lit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("lit"),
      bind_group_layouts: &[&light_bind_group_layout, &object_uniforms.layout],
      push_constant_ranges: &[],
    });
    let lit_pipeline = |polygon_mode: wgpu::PolygonMode, label: &str| {
      device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&lit_layout),
        vertex: wgpu::VertexState {
          module: &lit_shader,
          entry_point: "main_vs",
          compilation_options: PipelineCompilationOptions::default(),
          buffers: &[MeshVertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
          module: &lit_shader,
          entry_point: "main_fs",
          compilation_options: PipelineCompilationOptions::default(),
          targets: &[Some(format.into())],
        }),
        primitive: wgpu::PrimitiveState {
          polygon_mode,
          ..Default::default()
        },
        depth_stencil: Some(depth_state()),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
      })
    };
    let fill_pipeline = lit_pipeline(wgpu::PolygonMode::Fill, "Lit Pipeline");
    let line_pipeline = if device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
      Some(lit_pipeline(wgpu::PolygonMode::Line, "Lit Wireframe Pipeline"))
    } else {
      log::warn!("adapter lacks line polygon mode; wireframe will draw filled");
      None
    };

    // orbit paths are static: uploaded once, never written again
    let (indices, spans) = scene.paths.line_loop_indices();
    let path_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Orbit Path Vertex Buffer"),
      contents: bytemuck::cast_slice(&scene.paths.vertices),
      usage: wgpu::BufferUsages::VERTEX,
    });
    let path_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Orbit Path Index Buffer"),
      contents: bytemuck::cast_slice(&indices),
      usage: wgpu::BufferUsages::INDEX,
    });
    let loops = scene.paths.ranges.iter().copied().zip(spans).collect();

    // every solid gets its own copy of the mesh
    let meshes = Entity::SOLIDS
      .iter()
      .map(|entity| {
        let data = MeshData::load(mesh_path)?;
        Ok(GpuMesh::upload(device, entity.name(), &data))
      })
      .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Self {
      path_pipeline,
      fill_pipeline,
      line_pipeline,
      path_vertex_buffer,
      path_index_buffer,
      loops,
      path_uniforms,
      object_uniforms,
      light_buffer,
      light_bind_group,
      meshes,
      depth_view: create_depth_view(device, size.0, size.1),
      polygon_mode: PolygonMode::Fill,
      record: FrameRecord::default(),
    })
  }

  pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
    self.depth_view = create_depth_view(device, width, height);
  }

  /// Binds this renderer to one frame's target. Draws are encoded and
  /// submitted on `flush`.
  pub fn frame<'a>(
    &'a mut self,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    view: &'a wgpu::TextureView,
  ) -> GpuFrame<'a> {
    GpuFrame {
      renderer: self,
      device,
      queue,
      view,
    }
  }

  fn lit_pipeline(&self, mode: PolygonMode) -> &wgpu::RenderPipeline {
    match (mode, &self.line_pipeline) {
      (PolygonMode::Line, Some(pipeline)) => pipeline,
      _ => &self.fill_pipeline,
    }
  }
}

fn depth_state() -> wgpu::DepthStencilState {
  wgpu::DepthStencilState {
    format: DEPTH_FORMAT,
    depth_write_enabled: true,
    depth_compare: wgpu::CompareFunction::Less,
    stencil: wgpu::StencilState::default(),
    bias: wgpu::DepthBiasState::default(),
  }
}

/// [`RenderBackend`] over a [`GpuRenderer`] for a single frame.
pub struct GpuFrame<'a> {
  renderer: &'a mut GpuRenderer,
  device: &'a wgpu::Device,
  queue: &'a wgpu::Queue,
  view: &'a wgpu::TextureView,
}

impl GpuFrame<'_> {
  fn expect_program(&self, program: Program) -> bool {
    let current = self.renderer.record.program;
    if current != Some(program) {
      log::warn!("draw for {program:?} issued while {current:?} is active; skipped");
      return false;
    }
    true
  }
}

impl RenderBackend for GpuFrame<'_> {
  fn clear(&mut self, color: wgpu::Color) {
    self.renderer.record = FrameRecord {
      clear: Some(color),
      ..FrameRecord::default()
    };
  }

  fn use_program(&mut self, program: Program) {
    self.renderer.record.program = Some(program);
  }

  fn set_viewport(&mut self, viewport: Viewport) {
    self.renderer.record.viewport = Some(viewport);
  }

  fn set_polygon_mode(&mut self, mode: PolygonMode) {
    self.renderer.polygon_mode = mode;
  }

  fn set_path_uniform(&mut self, uniform: PathUniform) {
    self.renderer.record.path_uniform = Some(uniform);
  }

  fn draw_line_loop(&mut self, range: VertexRange) {
    if !self.expect_program(Program::Path) {
      return;
    }
    let renderer = &mut *self.renderer;
    let Some(indices) = renderer
      .loops
      .iter()
      .find(|(r, _)| *r == range)
      .map(|(_, span)| span.clone())
    else {
      log::warn!("no orbit path block at {}..{}", range.offset, range.end());
      return;
    };
    let record = &mut renderer.record;
    let (Some(uniform), true) = (record.path_uniform, (record.path_uniforms.len() as u64) < MAX_DRAWS)
    else {
      log::warn!("line loop dropped: no transform set or uniform slots exhausted");
      return;
    };
    record.path_uniforms.push(uniform);
    let slot = record.path_uniforms.len() as u32 - 1;
    record.draws.push(Draw::LineLoop { slot, indices });
  }

  fn set_light(&mut self, light: LightUniform) {
    self.renderer.record.light = Some(light);
  }

  fn set_material(&mut self, material: &Material) {
    self.renderer.record.material = Some(material.into());
  }

  fn set_object_transforms(&mut self, transforms: &ObjectTransforms) {
    self.renderer.record.transforms = Some(*transforms);
  }

  fn draw_mesh(&mut self, entity: Entity) {
    if !self.expect_program(Program::Lit) {
      return;
    }
    let mode = self.renderer.polygon_mode;
    let record = &mut self.renderer.record;
    let (Some(material), Some(transforms), true) = (
      record.material,
      record.transforms,
      (record.object_uniforms.len() as u64) < MAX_DRAWS,
    ) else {
      log::warn!("{} dropped: material or transforms missing", entity.name());
      return;
    };
    let normal: [[f32; 3]; 3] = transforms.normal.into();
    record.object_uniforms.push(ObjectUniform {
      model: transforms.model.into(),
      mvp: transforms.mvp.into(),
      normal: normal.map(|c| [c[0], c[1], c[2], 0.0]),
      material,
    });
    let slot = record.object_uniforms.len() as u32 - 1;
    record.draws.push(Draw::Mesh { slot, entity, mode });
  }

  fn flush(&mut self) {
    let record = std::mem::take(&mut self.renderer.record);
    let renderer = &*self.renderer;
    renderer.path_uniforms.write(self.queue, &record.path_uniforms);
    renderer.object_uniforms.write(self.queue, &record.object_uniforms);
    if let Some(light) = record.light {
      self.queue.write_buffer(&renderer.light_buffer, 0, bytemuck::bytes_of(&light));
    }

    let mut command_encoder = self
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Scene Encoder") });
    {
      let load = record.clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear);
      let mut rpass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Scene Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
          view: self.view,
          resolve_target: None,
          ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
          },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
          view: &renderer.depth_view,
          depth_ops: Some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
          }),
          stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
      });
      if let Some(v) = record.viewport {
        rpass.set_viewport(v.x, v.y, v.width, v.height, 0.0, 1.0);
      }
      for draw in &record.draws {
        match draw {
          Draw::LineLoop { slot, indices } => {
            rpass.set_pipeline(&renderer.path_pipeline);
            rpass.set_bind_group(0, &renderer.path_uniforms.bind_group, &[renderer.path_uniforms.offset(*slot)]);
            rpass.set_vertex_buffer(0, renderer.path_vertex_buffer.slice(..));
            rpass.set_index_buffer(renderer.path_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(indices.clone(), 0, 0..1);
          }
          Draw::Mesh { slot, entity, mode } => {
            rpass.set_pipeline(renderer.lit_pipeline(*mode));
            rpass.set_bind_group(0, &renderer.light_bind_group, &[]);
            rpass.set_bind_group(1, &renderer.object_uniforms.bind_group, &[renderer.object_uniforms.offset(*slot)]);
            renderer.meshes[entity.index()].draw(&mut rpass);
          }
        }
      }
    }
    self.queue.submit(Some(command_encoder.finish()));
  }
}
