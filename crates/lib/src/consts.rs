//! Fixed names, locations and remote endpoints.

/// Base URL of the remote manifest; per-component resources live below it.
pub const DEFAULT_MANIFEST_URL: &str = "https://dist.1-2.dev/imbuild";

pub const DEFAULT_PREFIX: &str = "/usr/local";
pub const DEFAULT_WORK_DIR: &str = "/usr/local/src/imbuild";
pub const DEFAULT_LOG_FILE: &str = "/var/log/imbuild.log";

/// Manifest directory holding the installer's own version, signature and key.
pub const INSTALLER_MANIFEST_NAME: &str = "imbuild";
pub const SIGNATURE_RESOURCE: &str = "imbuild.sig";
pub const PUBLIC_KEY_RESOURCE: &str = "public.pem";

pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Distribution identifiers accepted from `ID` / `ID_LIKE`.
pub const SUPPORTED_OS_IDS: &[&str] = &["debian", "ubuntu"];

/// Packages installed before any component is built.
pub const SYSTEM_PACKAGES: &[&str] = &[
  "autoconf",
  "automake",
  "build-essential",
  "ca-certificates",
  "cmake",
  "git",
  "libtool",
  "pkg-config",
  "libbrotli-dev",
  "libde265-dev",
  "libfftw3-dev",
  "libfreetype6-dev",
  "libgif-dev",
  "libgomp1",
  "libjpeg-dev",
  "liblcms2-dev",
  "liblqr-1-0-dev",
  "libltdl-dev",
  "libopenexr-dev",
  "libpng-dev",
  "libraw-dev",
  "librsvg2-dev",
  "libtiff-dev",
  "libwebp-dev",
  "libx265-dev",
  "libxml2-dev",
  "libzip-dev",
  "nasm",
  "yasm",
  "zlib1g-dev",
];

/// Host tools the build recipes rely on, with the package providing each.
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
  ("cmake", "cmake"),
  ("make", "make"),
  ("autoreconf", "autoconf"),
  ("pkg-config", "pkg-config"),
  ("ldconfig", "libc-bin"),
  ("git", "git"),
];

/// Library directories searched below the install prefix.
pub const LIB_SUBDIRS: &[&str] = &["lib", "lib64", "lib/x86_64-linux-gnu", "lib/aarch64-linux-gnu"];
