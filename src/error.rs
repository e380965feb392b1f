// SPDX-License-Identifier: MPL-2.0

//! Errors raised while resolving and launching a boot, and the colored
//! message macros used to report them.

use std::{fmt, io, path::PathBuf};

use crate::util::Timeout;

/// The exit code of a usage or validation failure.
pub const EXIT_FAILURE: i32 = 1;
/// The exit code reported when the guest did not finish in time. It is the
/// same code `timeout(1)` uses.
pub const EXIT_TIMEOUT: i32 = 124;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// A bad or missing command line option.
    Usage(String),
    UnsupportedArchitecture(String),
    KernelNotFound(PathBuf),
    DeviceTreeNotFound {
        name: String,
        path: PathBuf,
    },
    RootfsNotFound(PathBuf),
    /// A required external program is not in `PATH`.
    MissingDependency(String),
    PortInUse(u16),
    TimeoutExpired(Timeout),
    /// The emulator exited unsuccessfully; carries its exit code verbatim.
    EmulatorLaunchFailure(i32),
    Config {
        path: PathBuf,
        message: String,
    },
    Io {
        context: String,
        source: io::Error,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TimeoutExpired(_) => EXIT_TIMEOUT,
            Self::EmulatorLaunchFailure(code) => *code,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "{}", msg),
            Self::UnsupportedArchitecture(arch) => {
                write!(f, "'{}' is not a supported architecture", arch)
            }
            Self::KernelNotFound(path) => {
                write!(f, "Kernel ('{}') does not exist!", path.display())
            }
            Self::DeviceTreeNotFound { name, path } => write!(
                f,
                "'{}' is required for booting but it could not be found at '{}'",
                name,
                path.display()
            ),
            Self::RootfsNotFound(path) => write!(
                f,
                "Root filesystem image ('{}') does not exist!",
                path.display()
            ),
            Self::MissingDependency(cmd) => write!(
                f,
                "The external command '{}' is needed but it could not be found in PATH, please install it!",
                cmd
            ),
            Self::PortInUse(port) => {
                write!(f, "Port {} is already in use, is QEMU running?", port)
            }
            Self::TimeoutExpired(timeout) => write!(f, "QEMU timed out after {}!", timeout),
            Self::EmulatorLaunchFailure(code) => {
                write!(f, "QEMU did not exit cleanly (exit code {})!", code)
            }
            Self::Config { path, message } => {
                write!(f, "Cannot parse '{}': {}", path.display(), message)
            }
            Self::Io { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Print an error message in bold red.
#[macro_export]
macro_rules! error_msg {
    ($($arg:tt)*) => {{
        use $crate::owo_colors::OwoColorize;
        std::eprintln!("\n{}", std::format!("ERROR: {}", std::format_args!($($arg)*)).red().bold());
    }};
}

/// Print a warning message in bold yellow.
#[macro_export]
macro_rules! warn_msg {
    ($($arg:tt)*) => {{
        use $crate::owo_colors::OwoColorize;
        std::eprintln!("\n{}", std::format!("WARNING: {}", std::format_args!($($arg)*)).yellow().bold());
    }};
}

/// Print a status message in bold green.
#[macro_export]
macro_rules! info_msg {
    ($($arg:tt)*) => {{
        use $crate::owo_colors::OwoColorize;
        std::println!("\n{}", std::format!($($arg)*).green().bold());
    }};
}
