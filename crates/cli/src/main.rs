mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use imbuild_lib::consts::{DEFAULT_LOG_FILE, DEFAULT_MANIFEST_URL, DEFAULT_PREFIX, DEFAULT_WORK_DIR, OS_RELEASE_PATH};
use tracing_subscriber::EnvFilter;

use crate::cmd::cmd_install;
use crate::output::{OutputFormat, print_error};

/// Build ImageMagick with HEIC and JPEG XL support from source
#[derive(Parser, Debug)]
#[command(name = "imbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  /// Rebuild every component regardless of installed versions
  #[arg(long, env = "IMBUILD_FORCE")]
  pub force: bool,

  /// Build this aom version instead of the published one
  #[arg(long, env = "IMBUILD_AOM_VERSION", value_name = "VERSION")]
  pub aom_version: Option<String>,

  /// Build this libheif version instead of the published one
  #[arg(long, env = "IMBUILD_LIBHEIF_VERSION", value_name = "VERSION")]
  pub libheif_version: Option<String>,

  /// Build this jpeg-xl version instead of the published one
  #[arg(long, env = "IMBUILD_JPEGXL_VERSION", value_name = "VERSION")]
  pub jpegxl_version: Option<String>,

  /// Build this ImageMagick version instead of the published one
  #[arg(long, env = "IMBUILD_IMAGEMAGICK_VERSION", value_name = "VERSION")]
  pub imagemagick_version: Option<String>,

  /// Never build aom
  #[arg(long, env = "IMBUILD_SKIP_AOM")]
  pub skip_aom: bool,

  /// Never build libheif
  #[arg(long, env = "IMBUILD_SKIP_LIBHEIF")]
  pub skip_libheif: bool,

  /// Never build jpeg-xl
  #[arg(long, env = "IMBUILD_SKIP_JPEGXL")]
  pub skip_jpegxl: bool,

  /// Never build ImageMagick
  #[arg(long, env = "IMBUILD_SKIP_IMAGEMAGICK")]
  pub skip_imagemagick: bool,

  /// Do not install system packages
  #[arg(long, env = "IMBUILD_SKIP_DEPENDENCIES")]
  pub skip_dependencies: bool,

  /// Build log location (recreated on every run)
  #[arg(long, env = "IMBUILD_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
  pub log_file: PathBuf,

  /// Directory for downloaded archives and build trees
  #[arg(long, env = "IMBUILD_WORK_DIR", default_value = DEFAULT_WORK_DIR)]
  pub work_dir: PathBuf,

  /// Installation prefix
  #[arg(long, visible_alias = "build-dir", env = "IMBUILD_PREFIX", default_value = DEFAULT_PREFIX)]
  pub prefix: PathBuf,

  /// Non-interactive mode: no update notice, no package index refresh
  #[arg(long, env = "IMBUILD_CI")]
  pub ci: bool,

  /// Skip the installer signature check
  #[arg(long, env = "IMBUILD_NO_SIG_VERIFY")]
  pub no_sig_verify: bool,

  /// ImageMagick quantum depth (8, 16 or 32)
  #[arg(long, env = "IMBUILD_IMAGEMAGICK_QUANTUM_DEPTH", default_value_t = 16, value_parser = parse_quantum_depth)]
  pub imagemagick_quantum_depth: u8,

  /// Build ImageMagick with OpenCL acceleration
  #[arg(long, env = "IMBUILD_IMAGEMAGICK_OPENCL")]
  pub imagemagick_opencl: bool,

  /// Build ImageMagick as static libraries
  #[arg(long, env = "IMBUILD_IMAGEMAGICK_STATIC")]
  pub imagemagick_static: bool,

  /// Show what would be built without building anything
  #[arg(long, env = "IMBUILD_DRY_RUN")]
  pub dry_run: bool,

  /// Base URL of the version manifest
  #[arg(long, env = "IMBUILD_MANIFEST_URL", default_value = DEFAULT_MANIFEST_URL)]
  pub manifest_url: String,

  /// Parallel build jobs (defaults to the number of CPUs)
  #[arg(short, long, env = "IMBUILD_JOBS")]
  pub jobs: Option<usize>,

  #[arg(long, env = "IMBUILD_OS_RELEASE", default_value = OS_RELEASE_PATH, hide = true)]
  pub os_release: PathBuf,

  /// Output format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  pub output: OutputFormat,

  /// Enable verbose output
  #[arg(short, long)]
  pub verbose: bool,
}

fn parse_quantum_depth(value: &str) -> Result<u8, String> {
  match value {
    "8" => Ok(8),
    "16" => Ok(16),
    "32" => Ok(32),
    other => Err(format!("'{other}' is not one of 8, 16, 32")),
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cmd_install(&cli) {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
