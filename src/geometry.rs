use std::f32::consts::PI;
use std::ops::Range;

/// Vertices per orbit circle.
pub const CIRCLE_SLICES: u32 = 35;
pub const ORBIT_RADIUS: f32 = 1.5;
pub const ORBIT_PATH_COUNT: usize = 3;

/// A contiguous block of vertices inside the orbit path buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexRange {
  pub offset: u32,
  pub count: u32,
}

impl VertexRange {
  #[must_use]
  pub fn end(&self) -> u32 {
    self.offset + self.count
  }
}

/// Appends `CIRCLE_SLICES` vertices of a circle in the XY plane, starting at
/// angle 0 and going counter-clockwise, and returns the block it wrote.
pub fn generate_circle(vertices: &mut Vec<f32>, radius: f32) -> VertexRange {
  let offset = (vertices.len() / 3) as u32;
  let slice_angle = 2.0 * PI / CIRCLE_SLICES as f32;
  vertices.reserve(3 * CIRCLE_SLICES as usize);
  for i in 0..CIRCLE_SLICES {
    let angle = slice_angle * i as f32;
    vertices.extend_from_slice(&[radius * angle.cos(), radius * angle.sin(), 0.0]);
  }
  VertexRange {
    offset,
    count: CIRCLE_SLICES,
  }
}

/// Flat xyz vertex data for every orbit path together with the block each
/// path occupies. Draw calls take their offsets from `ranges`.
#[derive(Clone, Debug)]
pub struct OrbitPaths {
  pub vertices: Vec<f32>,
  pub ranges: Vec<VertexRange>,
}

impl OrbitPaths {
  /// Three identical circles; each path is told apart only by its transform.
  #[must_use]
  pub fn generate() -> Self {
    let mut vertices = Vec::with_capacity(3 * CIRCLE_SLICES as usize * ORBIT_PATH_COUNT);
    let ranges = (0..ORBIT_PATH_COUNT)
      .map(|_| generate_circle(&mut vertices, ORBIT_RADIUS))
      .collect();
    Self { vertices, ranges }
  }

  #[must_use]
  pub fn vertex_count(&self) -> u32 {
    (self.vertices.len() / 3) as u32
  }

  /// Index data that draws every block as a closed loop with a line strip:
  /// the block's vertices in order followed by its first vertex again.
  /// Returns the indices and, per block, the span of indices to draw.
  #[must_use]
  pub fn line_loop_indices(&self) -> (Vec<u32>, Vec<Range<u32>>) {
    let mut indices = Vec::with_capacity(self.vertex_count() as usize + self.ranges.len());
    let mut spans = Vec::with_capacity(self.ranges.len());
    for range in &self.ranges {
      let start = indices.len() as u32;
      indices.extend(range.offset..range.end());
      indices.push(range.offset);
      spans.push(start..indices.len() as u32);
    }
    (indices, spans)
  }
}
