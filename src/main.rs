use atom_viz::AppConfig;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Atom model: a nucleus with three orbiting electrons
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Window width in pixels
  #[arg(long, default_value_t = 1200)]
  width: u32,
  /// Window height in pixels
  #[arg(long, default_value_t = 900)]
  height: u32,
  /// Sphere mesh (Wavefront OBJ) used for the nucleus and electrons
  #[arg(short, long)]
  mesh: Option<PathBuf>,
  /// Initial electron orbit speed in degrees per second; the electrons rest
  /// until it is raised here or from the panel
  #[arg(short, long, default_value_t = 0.0)]
  orbit_speed: f32,
  /// Present frames as fast as possible instead of syncing to the display
  #[arg(long, default_value_t = false)]
  no_vsync: bool,
  /// Run in headless mode (no window)
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Frames to simulate in headless mode
  #[arg(long, default_value_t = 60)]
  frames: u32,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

impl Args {
  fn into_config(self) -> AppConfig {
    let defaults = AppConfig::default();
    AppConfig {
      width: self.width,
      height: self.height,
      vsync: !self.no_vsync,
      mesh_path: self.mesh.unwrap_or(defaults.mesh_path),
      orbit_speed: self.orbit_speed.clamp(0.0, 300.0),
      headless_frames: self.headless.then_some(self.frames),
      ..defaults
    }
  }
}

fn main() -> ExitCode {
  env_logger::init();
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return ExitCode::SUCCESS;
  }

  match atom_viz::state::run(args.into_config()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      log::error!("{err}");
      eprintln!("error: {err}");
      ExitCode::FAILURE
    }
  }
}
