// SPDX-License-Identifier: MPL-2.0

//! Running a [`ResolvedLaunch`] in timed batch or interactive mode.

use std::process::Command;

use super::{gdb, ExecutionMode, ResolvedLaunch};
use crate::{
    error::{Error, Result, EXIT_FAILURE, EXIT_TIMEOUT},
    info_msg,
    util::{pretty_command, Timeout},
    version, warn_msg,
};

/// How long `timeout(1)` waits after its signal before it kills the
/// emulator outright.
pub const KILL_GRACE: &str = "30s";
/// The exit code of `timeout(1)` when it had to kill the emulator after the
/// grace period.
const EXIT_TIMEOUT_KILLED: i32 = 128 + 9;

pub fn run(launch: &ResolvedLaunch) -> Result<()> {
    print_qemu_info(launch);
    match &launch.mode {
        ExecutionMode::TimedBatch { timeout } => {
            run_checked(&timed_command(&launch.argv, timeout), Some(timeout))
        }
        ExecutionMode::Interactive => run_checked(&launch.argv, None),
        ExecutionMode::DebuggerWait {
            port,
            gdb_bin,
            vmlinux,
        } => {
            let debugger = gdb::debugger_command(gdb_bin, vmlinux, *port);
            gdb::run_session(&launch.argv, &debugger, *port)
        }
    }
}

/// Print where the emulator comes from and its version.
fn print_qemu_info(launch: &ResolvedLaunch) {
    let emulator = launch.emulator();
    if let Some(dir) = emulator.parent() {
        info_msg!("QEMU location: {}", dir.display());
    }
    match version::qemu_version_string(emulator) {
        Ok(banner) => info_msg!("QEMU version: {}\n", banner),
        Err(err) => warn_msg!("{}", err),
    }
}

/// Wrap the emulator in `timeout(1)` and line-buffer its output so that the
/// console log is not lost when it is killed.
pub fn timed_command(argv: &[String], timeout: &Timeout) -> Vec<String> {
    let mut cmd = vec![
        "timeout".to_owned(),
        "--foreground".to_owned(),
        format!("--kill-after={}", KILL_GRACE),
        timeout.to_string(),
    ];
    cmd.extend(["stdbuf", "-oL", "-eL"].map(String::from));
    cmd.extend_from_slice(argv);
    cmd
}

/// Run `argv` to completion with inherited stdio.
///
/// A non-zero exit code is passed through, except that the `timeout(1)`
/// expiry code is reported as such when a timeout was set.
pub fn run_checked(argv: &[String], timeout: Option<&Timeout>) -> Result<()> {
    println!("$ {}", pretty_command(argv));
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::Usage("Empty emulator command".to_owned()));
    };
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|err| Error::io(format!("Failed to run {}", program), err))?;
    if status.success() {
        return Ok(());
    }

    let code = status.code().unwrap_or(EXIT_FAILURE);
    debug!("{} exited with {}", program, status);
    match timeout {
        Some(timeout) if code == EXIT_TIMEOUT || code == EXIT_TIMEOUT_KILLED => {
            Err(Error::TimeoutExpired(timeout.clone()))
        }
        _ => Err(Error::EmulatorLaunchFailure(code)),
    }
}
