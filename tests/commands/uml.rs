// SPDX-License-Identifier: MPL-2.0

//! Booting User Mode Linux

use crate::util::*;

const FAKE_UML: &str = r#"#!/bin/sh
for arg in "$@"; do
    echo "$arg" >> "$FAKE_QEMU_LOG"
done
"#;

#[test]
fn uml_interactive_boot() {
    let workspace = WorkSpace::new("uml_interactive");
    workspace.script("build/linux", FAKE_UML);
    workspace.write("images/x86_64/rootfs.ext4.zst", "");

    let output = workspace
        .boot_uml(["-k", "build", "-i"])
        .output()
        .unwrap();
    assert_success(&output);

    let rootfs = workspace.root().join("images/x86_64/rootfs.ext4");
    assert!(rootfs.is_file());
    let args = workspace.qemu_args();
    assert_eq!(
        args,
        [format!("ubd0={}", rootfs.display()), "init=/bin/sh".to_owned()]
    );
}

#[test]
fn uml_without_executable() {
    let workspace = WorkSpace::new("uml_missing");
    workspace.write("images/x86_64/rootfs.ext4.zst", "");
    let output = workspace.boot_uml(["-k", "build"]).output().unwrap();
    assert_exit_code(&output, 1);
    assert_stderr_contains_msg(&output, "does not exist");
}
