//! Component build recipes.
//!
//! A recipe is an ordered list of named steps, each a single command. The
//! steps are opaque to the pipeline: it only runs them in order and stops at
//! the first non-zero exit.

use std::path::Path;

use crate::component::Component;
use crate::config::RunConfig;
use crate::exec::CommandSpec;

/// One named command of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeStep {
  pub name: &'static str,
  pub command: CommandSpec,
}

impl RecipeStep {
  fn new(name: &'static str, command: CommandSpec) -> Self {
    Self { name, command }
  }
}

/// Steps to configure, compile and install `component` from `source_dir`.
pub fn recipe(component: Component, source_dir: &Path, config: &RunConfig) -> Vec<RecipeStep> {
  let build_dir = source_dir.join("build");
  let prefix = config.prefix.display().to_string();

  match component {
    Component::Aom => cmake_recipe(
      source_dir,
      &build_dir,
      config,
      &[
        format!("-DCMAKE_INSTALL_PREFIX={prefix}"),
        "-DCMAKE_BUILD_TYPE=Release".to_string(),
        "-DBUILD_SHARED_LIBS=1".to_string(),
        "-DENABLE_DOCS=0".to_string(),
        "-DENABLE_EXAMPLES=0".to_string(),
        "-DENABLE_TESTDATA=0".to_string(),
        "-DENABLE_TESTS=0".to_string(),
        "-DENABLE_TOOLS=0".to_string(),
      ],
    ),
    Component::Libheif => cmake_recipe(
      source_dir,
      &build_dir,
      config,
      &[
        format!("-DCMAKE_INSTALL_PREFIX={prefix}"),
        "-DCMAKE_BUILD_TYPE=Release".to_string(),
        "-DWITH_AOM_DECODER=ON".to_string(),
        "-DWITH_AOM_ENCODER=ON".to_string(),
        "-DWITH_EXAMPLES=OFF".to_string(),
        "-DBUILD_TESTING=OFF".to_string(),
        "-DENABLE_PLUGIN_LOADING=OFF".to_string(),
      ],
    ),
    Component::JpegXl => {
      let mut steps = vec![RecipeStep::new(
        "deps",
        CommandSpec::new("/bin/sh").arg("./deps.sh").cwd(source_dir),
      )];
      steps.extend(cmake_recipe(
        source_dir,
        &build_dir,
        config,
        &[
          format!("-DCMAKE_INSTALL_PREFIX={prefix}"),
          "-DCMAKE_BUILD_TYPE=Release".to_string(),
          "-DBUILD_TESTING=OFF".to_string(),
          "-DJPEGXL_ENABLE_BENCHMARK=OFF".to_string(),
          "-DJPEGXL_ENABLE_EXAMPLES=OFF".to_string(),
          "-DJPEGXL_ENABLE_MANPAGES=OFF".to_string(),
          "-DJPEGXL_ENABLE_SJPEG=OFF".to_string(),
          "-DJPEGXL_ENABLE_JPEGLI=OFF".to_string(),
          "-DJPEGXL_FORCE_SYSTEM_BROTLI=ON".to_string(),
        ],
      ));
      steps
    }
    Component::ImageMagick => imagemagick_recipe(source_dir, config),
  }
}

fn cmake_recipe(source_dir: &Path, build_dir: &Path, config: &RunConfig, defines: &[String]) -> Vec<RecipeStep> {
  let source = source_dir.display().to_string();
  let build = build_dir.display().to_string();
  let jobs = config.jobs.to_string();

  vec![
    RecipeStep::new(
      "configure",
      CommandSpec::new("cmake")
        .args(["-S", source.as_str(), "-B", build.as_str()])
        .args(defines.iter().cloned())
        .cwd(source_dir),
    ),
    RecipeStep::new(
      "compile",
      CommandSpec::new("cmake")
        .args(["--build", build.as_str(), "--parallel", jobs.as_str()])
        .cwd(source_dir),
    ),
    RecipeStep::new(
      "install",
      CommandSpec::new("cmake").args(["--install", build.as_str()]).cwd(source_dir),
    ),
  ]
}

fn imagemagick_recipe(source_dir: &Path, config: &RunConfig) -> Vec<RecipeStep> {
  let options = &config.imagemagick;
  let mut configure = CommandSpec::new("/bin/sh")
    .arg("./configure")
    .arg(format!("--prefix={}", config.prefix.display()))
    .arg(format!("--with-quantum-depth={}", options.quantum_depth))
    .args(["--with-heic=yes", "--with-jxl=yes", "--with-modules", "--without-perl"])
    .env("PKG_CONFIG_PATH", pkg_config_path(config))
    .cwd(source_dir);

  configure = if options.static_build {
    configure.args(["--enable-static", "--disable-shared"])
  } else {
    configure.args(["--enable-shared", "--disable-static"])
  };
  if options.opencl {
    configure = configure.arg("--enable-opencl");
  }

  vec![
    RecipeStep::new("configure", configure),
    RecipeStep::new(
      "compile",
      CommandSpec::new("make").arg(format!("-j{}", config.jobs)).cwd(source_dir),
    ),
    RecipeStep::new("install", CommandSpec::new("make").arg("install").cwd(source_dir)),
  ]
}

/// pkg-config search path covering libraries installed under the prefix.
fn pkg_config_path(config: &RunConfig) -> String {
  crate::consts::LIB_SUBDIRS
    .iter()
    .map(|dir| config.prefix.join(dir).join("pkgconfig").display().to_string())
    .collect::<Vec<_>>()
    .join(":")
}

/// Refresh the dynamic linker cache after an install.
pub fn ldconfig() -> RecipeStep {
  RecipeStep::new("ldconfig", CommandSpec::new("ldconfig"))
}
