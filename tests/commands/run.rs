// SPDX-License-Identifier: MPL-2.0

//! Booting in timed batch and interactive mode

use crate::util::*;

fn x86_64_workspace(name: &str) -> WorkSpace {
    let workspace = WorkSpace::new(name);
    workspace.write("linux/arch/x86/boot/bzImage", "");
    workspace.add_initrd("x86_64");
    workspace
}

#[test]
fn x86_64_batch_boot() {
    let workspace = x86_64_workspace("x86_64_batch");
    let output = workspace
        .boot_qemu(["-a", "x86_64", "-k", "linux", "--no-kvm"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stdout_contains_msg(&output, "QEMU version: QEMU emulator version 8.2.0");
    assert_stdout_contains_msg(&output, "$ timeout --foreground ");
    assert_stdout_contains_msg(&output, " 3m stdbuf -oL -eL qemu-system-x86_64 ");

    let args = workspace.qemu_args();
    let cmdline = values_of(&args, "-append");
    assert_eq!(cmdline.len(), 1);
    assert!(cmdline[0].split(' ').any(|part| part == "console=ttyS0"));
    assert!(!cmdline[0].contains("rdinit"));
    assert!(!cmdline[0].contains("root="));
    assert_eq!(values_of(&args, "-m"), ["512m"]);
    assert_eq!(values_of(&args, "-serial"), ["mon:stdio"]);
    assert!(workspace.root().join("images/x86_64/rootfs.cpio").is_file());
}

#[test]
fn emulator_exit_code_is_passed_through() {
    let workspace = x86_64_workspace("x86_64_exit_code");
    let output = workspace
        .boot_qemu(["-a", "x86_64", "-k", "linux", "--no-kvm"])
        .env("FAKE_QEMU_EXIT", "3")
        .output()
        .unwrap();
    assert_exit_code(&output, 3);
    assert_stderr_contains_msg(&output, "QEMU did not exit cleanly");
}

#[test]
fn timeout_expiry_exits_124() {
    let workspace = x86_64_workspace("x86_64_timeout");
    let output = workspace
        .boot_qemu(["-a", "x86_64", "-k", "linux", "--no-kvm", "-t", "1m"])
        .env("FAKE_QEMU_EXIT", "124")
        .output()
        .unwrap();
    assert_exit_code(&output, 124);
    assert_stderr_contains_msg(&output, "QEMU timed out after 1m");
}

#[test]
fn arm32_v5_interactive_boot() {
    let workspace = WorkSpace::new("arm32_v5_interactive");
    workspace.write("linux/arch/arm/boot/zImage", "");
    let dtb = workspace.write(
        "linux/arch/arm/boot/dts/aspeed-bmc-opp-palmetto.dtb",
        "",
    );
    workspace.add_initrd("arm");

    let linux = workspace.root().join("linux");
    let output = workspace
        .boot_qemu(["-a", "arm32_v5", "-k", linux.to_str().unwrap(), "-i"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stdout_contains_msg(&output, "$ qemu-system-arm");

    let args = workspace.qemu_args();
    assert_eq!(values_of(&args, "-machine"), ["palmetto-bmc"]);
    assert_eq!(values_of(&args, "-dtb"), [dtb.to_str().unwrap()]);
    assert!(values_of(&args, "-append")[0]
        .split(' ')
        .any(|part| part == "rdinit=/bin/sh"));
}

#[test]
fn missing_device_tree() {
    let workspace = WorkSpace::new("arm32_v6_no_dtb");
    workspace.write("out/zImage", "");
    workspace.add_initrd("arm");

    let output = workspace
        .boot_qemu(["-a", "arm32_v6", "-k", "out/zImage"])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "out/dtbs/aspeed-bmc-opp-romulus.dtb");
    assert!(!workspace.qemu_was_started());
}

#[test]
fn missing_kernel() {
    let workspace = WorkSpace::new("missing_kernel");
    workspace.add_initrd("x86_64");
    let output = workspace
        .boot_qemu(["-a", "x86_64", "-k", "linux", "--no-kvm"])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "arch/x86/boot/bzImage') does not exist");
}

#[test]
fn unsupported_architecture() {
    let workspace = WorkSpace::new("unsupported_arch");
    let output = workspace
        .boot_qemu(["-a", "alpha", "-k", "linux"])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert!(!workspace.qemu_was_started());
}

#[test]
fn cbl_qemu_needs_s390() {
    let workspace = x86_64_workspace("cbl_qemu_x86");
    let output = workspace
        .boot_qemu(["-a", "x86_64", "-k", "linux", "--use-cbl-qemu"])
        .output()
        .unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "--use-cbl-qemu");
}

#[test]
fn help_and_version_succeed() {
    let workspace = WorkSpace::new("help_version");
    assert_success(&workspace.boot_qemu(["--help"]).output().unwrap());
    let output = workspace.boot_qemu(["-V"]).output().unwrap();
    assert_success(&output);
    assert_stdout_contains_msg(&output, env!("CARGO_PKG_VERSION"));
}
