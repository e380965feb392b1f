// SPDX-License-Identifier: MPL-2.0

//! The User Mode Linux launcher behind the `boot-uml` binary.

use std::path::{Path, PathBuf};

use clap::{crate_version, Parser};

use crate::{
    cli::init_logger,
    error::{Error, Result, EXIT_FAILURE},
    error_msg,
    launch::exec::run_checked,
    rootfs,
    util::check_cmd,
};

/// The name of the UML executable in a kernel build folder.
pub const UML_IMAGE: &str = "linux";

#[derive(Debug, Parser)]
#[command(name = "boot-uml", version = crate_version!())]
/// Boot a User Mode Linux kernel against a small root filesystem
pub struct UmlArgs {
    #[arg(
        short = 'k',
        long = "kernel-location",
        help = "Path to the UML executable or to a kernel build folder to search for it in",
        value_name = "PATH"
    )]
    pub kernel_location: PathBuf,
    #[arg(
        short = 'i',
        long,
        help = "Pass 'init=/bin/sh' to get a shell instead of shutting down after boot"
    )]
    pub interactive: bool,
    #[arg(
        long = "root-dir",
        visible_alias = "images-dir",
        env = "BOOT_UTILS_ROOT",
        default_value = ".",
        help = "The folder holding 'images/'",
        value_name = "PATH"
    )]
    pub root_dir: PathBuf,
    #[arg(short = 'd', long, help = "Show debug logs")]
    pub debug: bool,
}

pub fn main() {
    let args = match UmlArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_FAILURE } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logger(args.debug);

    if let Err(err) = execute(&args) {
        error_msg!("{}", err);
        std::process::exit(err.exit_code());
    }
}

pub fn execute(args: &UmlArgs) -> Result<()> {
    check_cmd("zstd")?;
    let kernel = locate_uml(&args.kernel_location)?;
    let rootfs = rootfs::uml_rootfs(&args.root_dir)?;
    run_checked(&uml_command(&kernel, &rootfs, args.interactive), None)
}

/// The UML executable is either given directly or sits in the root of the
/// build folder.
pub fn locate_uml(location: &Path) -> Result<PathBuf> {
    let kernel = if location.is_file() {
        location.to_path_buf()
    } else {
        location.join(UML_IMAGE)
    };
    if !kernel.is_file() {
        return Err(Error::KernelNotFound(kernel));
    }
    Ok(kernel)
}

pub fn uml_command(kernel: &Path, rootfs: &Path, interactive: bool) -> Vec<String> {
    let mut cmd = vec![
        kernel.to_string_lossy().into_owned(),
        format!("ubd0={}", rootfs.display()),
    ];
    if interactive {
        cmd.push("init=/bin/sh".to_owned());
    }
    cmd
}
