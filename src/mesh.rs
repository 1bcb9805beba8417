use crate::error::AppError;
use cgmath::{InnerSpace, Vector3};
use std::path::Path;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
  pub position: [f32; 3],
  pub normal: [f32; 3],
}

impl MeshVertex {
  const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

  pub fn desc() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
      array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
      step_mode: wgpu::VertexStepMode::Vertex,
      attributes: &Self::ATTRIBS,
    }
  }
}

/// Triangle geometry as read from disk, before upload.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
  pub vertices: Vec<MeshVertex>,
  pub indices: Vec<u32>,
}

impl MeshData {
  /// Reads every object in a Wavefront OBJ file into one triangle list.
  pub fn load(path: &Path) -> Result<Self, AppError> {
    let (models, _materials) =
      tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| AppError::Mesh {
        path: path.to_path_buf(),
        source,
      })?;
    let data = Self::from_models(&models);
    if data.indices.is_empty() {
      return Err(AppError::EmptyMesh(path.to_path_buf()));
    }
    log::info!(
      "loaded {} ({} vertices, {} triangles)",
      path.display(),
      data.vertices.len(),
      data.indices.len() / 3
    );
    Ok(data)
  }

  /// Same as [`MeshData::load`] but from an in-memory OBJ; material libraries
  /// are ignored.
  #[cfg(test)]
  fn parse(reader: &mut impl std::io::BufRead) -> Result<Self, tobj::LoadError> {
    let (models, _materials) =
      tobj::load_obj_buf(reader, &tobj::GPU_LOAD_OPTIONS, |_| Err(tobj::LoadError::OpenFileFailed))?;
    Ok(Self::from_models(&models))
  }

  fn from_models(models: &[tobj::Model]) -> Self {
    let mut data = Self::default();
    for model in models {
      let mesh = &model.mesh;
      let base = data.vertices.len() as u32;
      let has_normals = mesh.normals.len() == mesh.positions.len();
      for (i, p) in mesh.positions.chunks_exact(3).enumerate() {
        let normal = if has_normals {
          [mesh.normals[3 * i], mesh.normals[3 * i + 1], mesh.normals[3 * i + 2]]
        } else {
          [0.0; 3]
        };
        data.vertices.push(MeshVertex {
          position: [p[0], p[1], p[2]],
          normal,
        });
      }
      data.indices.extend(mesh.indices.iter().map(|i| base + i));
      if !has_normals {
        data.smooth_normals(base as usize);
      }
    }
    data
  }

  /// Area-weighted vertex normals for vertices from `first` onwards.
  fn smooth_normals(&mut self, first: usize) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len() - first];
    for tri in self.indices.chunks_exact(3) {
      let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
      if a < first || b < first || c < first {
        continue;
      }
      let pa = Vector3::from(self.vertices[a].position);
      let pb = Vector3::from(self.vertices[b].position);
      let pc = Vector3::from(self.vertices[c].position);
      let face = (pb - pa).cross(pc - pa);
      for i in [a, b, c] {
        sums[i - first] += face;
      }
    }
    for (vertex, sum) in self.vertices[first..].iter_mut().zip(sums) {
      if sum.magnitude2() > 0.0 {
        vertex.normal = sum.normalize().into();
      }
    }
  }
}

/// Uploaded mesh. Owns its buffers for the life of the program.
pub struct GpuMesh {
  vertex_buffer: wgpu::Buffer,
  index_buffer: wgpu::Buffer,
  index_count: u32,
}

impl GpuMesh {
  #[must_use]
  pub fn upload(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some(&format!("{label} Vertex Buffer")),
      contents: bytemuck::cast_slice(&data.vertices),
      usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some(&format!("{label} Index Buffer")),
      contents: bytemuck::cast_slice(&data.indices),
      usage: wgpu::BufferUsages::INDEX,
    });
    Self {
      vertex_buffer,
      index_buffer,
      index_count: data.indices.len() as u32,
    }
  }

  pub fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
    rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
    rpass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    rpass.draw_indexed(0..self.index_count, 0, 0..1);
  }
}
