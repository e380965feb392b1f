// SPDX-License-Identifier: MPL-2.0

fn main() {
    boot_qemu::cli::main();
}
