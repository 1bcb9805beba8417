use atom_viz::render::{Command, PolygonMode, RecordingBackend};
use atom_viz::scene::Entity;
use atom_viz::state::{run_headless, Simulation};
use atom_viz::AppConfig;

#[test]
fn a_second_of_frames_turns_the_orbit_by_its_speed() {
  let config = AppConfig {
    orbit_speed: 45.0,
    ..AppConfig::default()
  };
  let report = run_headless(&config, 120);
  assert!((report.angle - 90.0).abs() < 1e-2, "angle {}", report.angle);
}

#[test]
fn every_frame_draws_three_paths_and_four_spheres() {
  let mut sim = Simulation::new(&AppConfig::default());
  let mut backend = RecordingBackend::default();
  for _ in 0..3 {
    sim.step(&mut backend);
  }
  let frames: Vec<_> = backend
    .commands
    .split(|c| *c == Command::Flush)
    .filter(|frame| !frame.is_empty())
    .collect();
  // the trailing polygon-mode reset follows the final flush
  assert_eq!(frames.len(), 4);
  for frame in &frames[..3] {
    let loops = frame.iter().filter(|c| matches!(c, Command::DrawLineLoop(_))).count();
    let meshes: Vec<Entity> = frame
      .iter()
      .filter_map(|c| match c {
        Command::DrawMesh { entity, .. } => Some(*entity),
        _ => None,
      })
      .collect();
    assert_eq!(loops, 3);
    assert_eq!(meshes, Entity::SOLIDS.to_vec());
  }
  assert_eq!(backend.polygon_mode(), PolygonMode::Fill);
}

#[test]
fn toggling_wireframe_between_frames_switches_mesh_mode() {
  let mut sim = Simulation::new(&AppConfig::default());
  let mut backend = RecordingBackend::default();
  sim.step(&mut backend);
  sim.controls.wireframe = true;
  sim.step(&mut backend);
  sim.controls.wireframe = false;
  sim.step(&mut backend);
  let modes: Vec<_> = backend.mesh_draws().map(|(_, mode)| mode).collect();
  assert_eq!(&modes[..4], &[PolygonMode::Fill; 4]);
  assert_eq!(&modes[4..8], &[PolygonMode::Line; 4]);
  assert_eq!(&modes[8..], &[PolygonMode::Fill; 4]);
}
