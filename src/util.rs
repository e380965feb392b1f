// SPDX-License-Identifier: MPL-2.0

use std::{
    borrow::Cow,
    ffi::OsStr,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Resolve an external program in `PATH`, failing with
/// [`Error::MissingDependency`] when it is absent.
pub fn check_cmd(cmd: impl AsRef<OsStr>) -> Result<PathBuf> {
    let cmd = cmd.as_ref();
    which::which(cmd).map_err(|_| Error::MissingDependency(cmd.to_string_lossy().into_owned()))
}

/// The number of processors this process may run on.
pub fn usable_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Render a command so that it can be copied into a shell, similar to how
/// `set -x` prints it. Emulator binaries are shown by name only.
pub fn pretty_command<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            if let Some(name) = emulator_name(arg) {
                return Cow::Borrowed(name);
            }
            shlex::try_quote(arg).unwrap_or(Cow::Borrowed(arg))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn emulator_name(arg: &str) -> Option<&str> {
    let name = Path::new(arg).file_name()?.to_str()?;
    if name.starts_with("qemu-system-") && arg.contains('/') {
        Some(name)
    } else {
        None
    }
}

/// A duration in the syntax accepted by `timeout(1)`: a number with an
/// optional `s`, `m`, `h` or `d` suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeout {
    raw: String,
    duration: Duration,
}

impl Timeout {
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self {
            raw: "3m".to_owned(),
            duration: Duration::from_secs(180),
        }
    }
}

impl FromStr for Timeout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Usage(format!("'{}' is not a valid timeout duration", s));
        let (number, scale) = match s.char_indices().last() {
            Some((idx, 's')) => (&s[..idx], 1.0),
            Some((idx, 'm')) => (&s[..idx], 60.0),
            Some((idx, 'h')) => (&s[..idx], 3600.0),
            Some((idx, 'd')) => (&s[..idx], 86400.0),
            Some(_) => (s, 1.0),
            None => return Err(invalid()),
        };
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;
        let duration = Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())?;
        Ok(Self {
            raw: s.to_owned(),
            duration,
        })
    }
}

impl Display for Timeout {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for Timeout {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Used by clap to validate `--timeout` while parsing options.
pub fn parse_timeout(s: &str) -> std::result::Result<Timeout, String> {
    s.parse().map_err(|e: Error| e.to_string())
}
