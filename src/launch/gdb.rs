// SPDX-License-Identifier: MPL-2.0

//! The debugger session: the emulator is started halted with its GDB stub
//! listening, a debugger is attached in the foreground, and after the
//! debugger quits the user may start over.

use std::{
    io::{self, BufRead, ErrorKind, Write},
    net::{Ipv4Addr, TcpListener},
    path::Path,
    process::{Child, Command},
};

use crate::{
    error::{Error, Result},
    error_msg, info_msg,
    util::pretty_command,
};

/// The port QEMU's `-s` option opens its GDB stub on.
pub const GDB_PORT: u16 = 1234;

/// Fail with [`Error::PortInUse`] if something already listens on `port`,
/// on any address. QEMU binds its stub to all of them.
pub fn ensure_port_free(port: u16) -> Result<()> {
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AddrInUse => Err(Error::PortInUse(port)),
        Err(err) => Err(Error::io(format!("Cannot check port {}", port), err)),
    }
}

pub fn debugger_command(gdb_bin: &str, vmlinux: &Path, port: u16) -> Vec<String> {
    vec![
        gdb_bin.to_owned(),
        vmlinux.to_string_lossy().into_owned(),
        "-ex".to_owned(),
        format!("target remote :{}", port),
    ]
}

/// An emulator running in the background. It is killed and reaped when
/// dropped, whichever way the session ends.
struct Emulator(Child);

impl Drop for Emulator {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

enum State {
    Idle,
    EmulatorStarted(Emulator),
    DebuggerAttached(Emulator, Child),
    DebuggerExited(Emulator),
    PromptRerun,
    Done,
}

fn spawn(argv: &[String]) -> Result<Child> {
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::Usage("Empty command".to_owned()));
    };
    Command::new(program)
        .args(args)
        .spawn()
        .map_err(|err| Error::io(format!("Failed to run {}", program), err))
}

/// Run debugger sessions until the user declines another one.
pub fn run_session(emulator: &[String], debugger: &[String], port: u16) -> Result<()> {
    let stdin = io::stdin();
    run_session_with(emulator, debugger, port, &mut stdin.lock())
}

fn run_session_with(
    emulator: &[String],
    debugger: &[String],
    port: u16,
    answers: &mut impl BufRead,
) -> Result<()> {
    let mut state = State::Idle;
    loop {
        state = match state {
            State::Idle => {
                ensure_port_free(port)?;
                info_msg!("Starting QEMU with GDB connection on port {}...", port);
                println!("$ {}", pretty_command(emulator));
                State::EmulatorStarted(Emulator(spawn(emulator)?))
            }
            State::EmulatorStarted(qemu) => {
                info_msg!("Starting GDB...");
                println!("$ {}", pretty_command(debugger));
                State::DebuggerAttached(qemu, spawn(debugger)?)
            }
            State::DebuggerAttached(qemu, mut gdb) => {
                let status = gdb
                    .wait()
                    .map_err(|err| Error::io("Failed to wait for the debugger", err))?;
                debug!("Debugger exited with {}", status);
                State::DebuggerExited(qemu)
            }
            State::DebuggerExited(qemu) => {
                error_msg!("Killing QEMU...");
                drop(qemu);
                State::PromptRerun
            }
            State::PromptRerun => {
                print!("Re-run QEMU + gdb? [y/n] ");
                io::stdout()
                    .flush()
                    .map_err(|err| Error::io("Cannot write the prompt", err))?;
                let mut answer = String::new();
                let read = answers
                    .read_line(&mut answer)
                    .map_err(|err| Error::io("Cannot read the answer", err))?;
                if read == 0 || answer.trim().eq_ignore_ascii_case("n") {
                    State::Done
                } else {
                    State::Idle
                }
            }
            State::Done => return Ok(()),
        };
    }
}
