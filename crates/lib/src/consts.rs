use std::time::Duration;

pub const APP_NAME: &str = "zapper";

/// Extension appended to the source directory name when no archive name is given.
pub const ARCHIVE_EXTENSION: &str = "pyz";

/// First line of every archive unless the target overrides it.
pub const DEFAULT_SHEBANG: &str = "#!/usr/bin/env python";

/// File the interpreter runs when the archive is executed.
pub const LAUNCHER_FILE_NAME: &str = "__main__.py";

/// Compiled bytecode files removed before packaging.
pub const BYTECODE_EXTENSION: &str = "pyc";

pub const VENDOR_DIR_NAME: &str = "vendor";

pub const REQUIREMENTS_FILE_NAME: &str = "requirements.txt";

/// Generic virtualenv names kept out of archives by default.
pub const DEFAULT_IGNORE: &[&str] = &["venv", "env"];

#[cfg(windows)]
pub const DEFAULT_INSTALLER: &str = "pip.exe";

#[cfg(not(windows))]
pub const DEFAULT_INSTALLER: &str = "pip";

/// Environment variable that overrides the installer program.
pub const INSTALLER_ENV: &str = "ZAPPER_INSTALLER";

pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Root key of the build descriptor.
pub const DESCRIPTOR_ROOT_KEY: &str = "zapper";

/// Build descriptor names, searched in order.
pub const DESCRIPTOR_FILE_NAMES: &[&str] = &["build", "build.yml", "build.yaml"];
