// SPDX-License-Identifier: MPL-2.0

//! The common utils for the integration tests.
//!
//! Every test runs inside its own [`WorkSpace`]: a scratch root folder with
//! an `images/` tree, a kernel build folder and a `bin/` folder of fake
//! external programs that is put first in `PATH`.

use std::{
    ffi::OsStr,
    fs::{self, create_dir_all, remove_dir_all},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Output,
};

use assert_cmd::Command;

/// The file the fake emulators record their arguments in.
pub const QEMU_LOG: &str = "qemu-args.log";

/// A fake `qemu-system-*`. It records the arguments of every call one per
/// line, `--version` queries included, answers `--version` and otherwise
/// exits with `$FAKE_QEMU_EXIT`.
const FAKE_QEMU: &str = r#"#!/bin/sh
for arg in "$@"; do
    echo "$arg" >> "$FAKE_QEMU_LOG"
done
if [ "$1" = "--version" ]; then
    echo "QEMU emulator version 8.2.0"
    exit 0
fi
exit "${FAKE_QEMU_EXIT:-0}"
"#;

/// A fake `zstd -q -d <archive> -o <target>` that only creates the target.
const FAKE_ZSTD: &str = r#"#!/bin/sh
touch "$5"
"#;

const FAKE_GDB: &str = r#"#!/bin/sh
exit 0
"#;

const EMULATORS: &[&str] = &[
    "qemu-system-arm",
    "qemu-system-aarch64",
    "qemu-system-m68k",
    "qemu-system-mips",
    "qemu-system-mipsel",
    "qemu-system-ppc",
    "qemu-system-ppc64",
    "qemu-system-riscv64",
    "qemu-system-s390x",
    "qemu-system-i386",
    "qemu-system-x86_64",
];

#[derive(Debug)]
pub struct WorkSpace {
    root: PathBuf,
}

impl WorkSpace {
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir()
            .join("boot-qemu-test")
            .join(format!("{}-{}", name, std::process::id()));
        if root.exists() {
            remove_dir_all(&root).unwrap();
        }
        create_dir_all(&root).unwrap();

        let workspace = Self { root };
        for emulator in EMULATORS {
            workspace.script(&format!("bin/{}", emulator), FAKE_QEMU);
        }
        workspace.script("bin/zstd", FAKE_ZSTD);
        workspace.script("bin/fake-gdb", FAKE_GDB);
        workspace
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, relpath: &str, content: &str) -> PathBuf {
        let path = self.root.join(relpath);
        create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write an executable shell script.
    pub fn script(&self, relpath: &str, content: &str) -> PathBuf {
        let path = self.write(relpath, content);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Ship a compressed initrd for the rootfs folder `dir`.
    pub fn add_initrd(&self, dir: &str) {
        self.write(&format!("images/{}/rootfs.cpio.zst", dir), "");
    }

    /// The arguments of every fake emulator call, in order.
    pub fn qemu_args(&self) -> Vec<String> {
        fs::read_to_string(self.root.join(QEMU_LOG))
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Whether any fake emulator ran, even if only to print its version.
    pub fn qemu_was_started(&self) -> bool {
        self.root.join(QEMU_LOG).exists()
    }

    fn path_env(&self) -> String {
        let bin = self.root.join("bin");
        match std::env::var("PATH") {
            Ok(path) => format!("{}:{}", bin.display(), path),
            Err(_) => bin.display().to_string(),
        }
    }

    /// The `boot-qemu` binary, running against this workspace.
    pub fn boot_qemu<T: AsRef<OsStr>, I: IntoIterator<Item = T>>(&self, args: I) -> Command {
        self.command("boot-qemu", args)
    }

    pub fn boot_uml<T: AsRef<OsStr>, I: IntoIterator<Item = T>>(&self, args: I) -> Command {
        self.command("boot-uml", args)
    }

    fn command<T: AsRef<OsStr>, I: IntoIterator<Item = T>>(&self, bin: &str, args: I) -> Command {
        let mut command = Command::cargo_bin(bin).unwrap();
        command
            .current_dir(&self.root)
            .env("PATH", self.path_env())
            .env("FAKE_QEMU_LOG", self.root.join(QEMU_LOG))
            .env("BOOT_UTILS_ROOT", &self.root)
            .env_remove("BIOS")
            .env_remove("GDB_BIN")
            .env_remove("FAKE_QEMU_EXIT")
            .args(args);
        command
    }
}

impl Drop for WorkSpace {
    fn drop(&mut self) {
        let _ = remove_dir_all(&self.root);
    }
}

/// The value following each occurrence of `key`.
pub fn values_of<'a>(args: &'a [String], key: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|pair| pair[0] == key)
        .map(|pair| pair[1].as_str())
        .collect()
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "Command output {:#?} seems failed, stderr:\n {}",
        output,
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn assert_exit_code(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "unexpected exit status, stderr:\n {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn assert_stdout_contains_msg(output: &Output, msg: &str) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(msg), "{:?} not in stdout:\n{}", msg, stdout)
}

pub fn assert_stderr_contains_msg(output: &Output, msg: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(msg), "{:?} not in stderr:\n{}", msg, stderr)
}
