// SPDX-License-Identifier: MPL-2.0

//! Resolving launches without running them

use serde_json::Value;

use crate::util::*;

fn dry_run(workspace: &WorkSpace, args: &[&str]) -> Value {
    let output = workspace.boot_qemu(args).output().unwrap();
    assert_success(&output);
    serde_json::from_slice(&output.stdout).unwrap()
}

fn argv(launch: &Value) -> Vec<String> {
    launch["argv"]
        .as_array()
        .unwrap()
        .iter()
        .map(|arg| arg.as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn ppc64le_bmc_and_firmware() {
    let workspace = WorkSpace::new("dry_run_ppc64le");
    workspace.write("linux/arch/powerpc/boot/zImage.epapr", "");

    let launch = dry_run(
        &workspace,
        &["-a", "ppc64le", "-k", "linux", "--dry-run"],
    );
    let args = argv(&launch);
    assert_eq!(
        values_of(&args, "-device"),
        ["ipmi-bmc-sim,id=bmc0", "isa-ipmi-bt,bmc=bmc0,irq=10"]
    );
    let bios = values_of(&args, "-bios");
    assert_eq!(bios.len(), 1);
    assert!(bios[0].ends_with("images/ppc64le/skiboot.lid"));
    assert_eq!(values_of(&args, "-m"), ["2G"]);
    assert_eq!(launch["mode"]["kind"], "timed_batch");
    assert_eq!(launch["mode"]["timeout"], "3m");
    assert!(!workspace.qemu_was_started());
}

#[test]
fn dry_run_skips_decompression() {
    let workspace = WorkSpace::new("dry_run_no_zstd");
    workspace.write("linux/vmlinux", "");

    let launch = dry_run(
        &workspace,
        &["-a", "mips", "-k", "linux", "--dry-run"],
    );
    assert!(launch["rootfs"]["initrd"]
        .as_str()
        .unwrap()
        .ends_with("images/mips/rootfs.cpio"));
    assert!(!workspace.root().join("images/mips/rootfs.cpio").exists());
    assert_eq!(launch["acceleration"]["enabled"], false);
    assert!(launch["smp"].is_null());
}

#[test]
fn manifest_settings_apply() {
    let workspace = WorkSpace::new("dry_run_manifest");
    workspace.write("linux/arch/riscv/boot/Image", "");
    workspace.write(
        "BootQemu.toml",
        r#"
[run]
timeout = "10m"
append = "loglevel=7"

[qemu]
args = "-device virtio-rng-pci"

[arch.riscv.firmware]
bios = "/opt/opensbi/fw_jump.elf"
"#,
    );

    let launch = dry_run(
        &workspace,
        &["-a", "riscv", "-k", "linux", "--dry-run", "--append", "debug"],
    );
    let args = argv(&launch);
    assert_eq!(values_of(&args, "-bios"), ["/opt/opensbi/fw_jump.elf"]);
    assert_eq!(values_of(&args, "-device"), ["virtio-rng-pci"]);
    assert_eq!(launch["cmdline"], "earlycon loglevel=7 debug");
    assert_eq!(launch["mode"]["timeout"], "10m");
}

#[test]
fn broken_manifest_is_reported() {
    let workspace = WorkSpace::new("dry_run_bad_manifest");
    workspace.write("linux/arch/riscv/boot/Image", "");
    workspace.write("BootQemu.toml", "[run]\ntimeot = \"1m\"\n");

    let output = workspace
        .boot_qemu(["-a", "riscv", "-k", "linux", "--dry-run"])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "BootQemu.toml");
}

#[test]
fn forbidden_qemu_args() {
    let workspace = WorkSpace::new("dry_run_forbidden_args");
    workspace.write("linux/arch/riscv/boot/Image", "");
    let output = workspace
        .boot_qemu([
            "-a",
            "riscv",
            "-k",
            "linux",
            "--dry-run",
            "--qemu-args",
            "-append quiet",
        ])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "not allowed");
}

fn riscv_gdb_workspace(name: &str) -> WorkSpace {
    let workspace = WorkSpace::new(name);
    workspace.write("linux/arch/riscv/boot/Image", "");
    workspace.write(
        "BootQemu.toml",
        r#"
[gdb]
bin = "manifest-gdb"

[arch.riscv.firmware]
bios = "/manifest/fw_jump.elf"
"#,
    );
    workspace
}

const RISCV_GDB: &[&str] = &["-a", "riscv", "-k", "linux", "-g", "--dry-run"];

fn bios_and_gdb(output: &std::process::Output) -> (String, String) {
    assert_success(output);
    let launch: Value = serde_json::from_slice(&output.stdout).unwrap();
    let bios = values_of(&argv(&launch), "-bios").concat();
    let gdb_bin = launch["mode"]["gdb_bin"].as_str().unwrap().to_owned();
    (bios, gdb_bin)
}

#[test]
fn manifest_applies_without_environment() {
    let workspace = riscv_gdb_workspace("dry_run_manifest_only");
    let output = workspace.boot_qemu(RISCV_GDB).output().unwrap();
    assert_eq!(
        bios_and_gdb(&output),
        ("/manifest/fw_jump.elf".to_owned(), "manifest-gdb".to_owned())
    );
}

#[test]
fn environment_overrides_manifest() {
    let workspace = riscv_gdb_workspace("dry_run_env_over_manifest");
    let output = workspace
        .boot_qemu(RISCV_GDB)
        .env("BIOS", "/env/fw_jump.elf")
        .env("GDB_BIN", "env-gdb")
        .output()
        .unwrap();
    assert_eq!(
        bios_and_gdb(&output),
        ("/env/fw_jump.elf".to_owned(), "env-gdb".to_owned())
    );
}

#[test]
fn command_line_overrides_environment() {
    let workspace = riscv_gdb_workspace("dry_run_cli_over_env");
    let mut args = RISCV_GDB.to_vec();
    args.extend(["--bios", "/cli/fw_jump.elf", "--gdb-bin", "cli-gdb"]);
    let output = workspace
        .boot_qemu(args)
        .env("BIOS", "/env/fw_jump.elf")
        .env("GDB_BIN", "env-gdb")
        .output()
        .unwrap();
    assert_eq!(
        bios_and_gdb(&output),
        ("/cli/fw_jump.elf".to_owned(), "cli-gdb".to_owned())
    );
}
