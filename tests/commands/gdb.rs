// SPDX-License-Identifier: MPL-2.0

//! Debugger sessions

use std::{
    net::TcpListener,
    sync::{Mutex, MutexGuard},
};

use crate::util::*;

/// Every debugger session checks port 1234 first, so these tests take
/// turns.
static GDB_PORT_USERS: Mutex<()> = Mutex::new(());

fn lock_gdb_port() -> MutexGuard<'static, ()> {
    GDB_PORT_USERS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn busy_gdb_port_fails_fast() {
    let _lock = lock_gdb_port();
    let workspace = WorkSpace::new("gdb_port_in_use");
    workspace.write("linux/arch/arm64/boot/Image.gz", "");
    workspace.add_initrd("arm64");

    // Whoever holds the port, it is taken while the guard lives.
    let _guard = TcpListener::bind(("127.0.0.1", 1234)).ok();
    let output = workspace
        .boot_qemu([
            "-a",
            "arm64",
            "-k",
            "linux",
            "-g",
            "--gdb-bin",
            "fake-gdb",
            "--no-kvm",
        ])
        .write_stdin("n\n")
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "Port 1234 is already in use");
    // Not even a version query, and the initrd stays compressed.
    assert!(!workspace.qemu_was_started(), "{:?}", workspace.qemu_args());
    assert!(!workspace.root().join("images/arm64/rootfs.cpio").exists());
}

#[test]
fn missing_debugger_is_a_missing_dependency() {
    let _lock = lock_gdb_port();
    let workspace = WorkSpace::new("gdb_missing_bin");
    workspace.write("linux/arch/arm64/boot/Image.gz", "");
    workspace.add_initrd("arm64");

    let output = workspace
        .boot_qemu([
            "-a",
            "arm64",
            "-k",
            "linux",
            "-g",
            "--gdb-bin",
            "no-such-gdb-binary",
        ])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "'no-such-gdb-binary'");
    assert!(!workspace.qemu_was_started());
}
