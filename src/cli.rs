// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use clap::{crate_version, Args, Parser};

use crate::{
    arch::Arch,
    config::RunRequest,
    error::{Result, EXIT_FAILURE},
    error_msg,
    launch::{self, exec},
    probe::SystemProbe,
    util::{parse_timeout, Timeout},
};

pub fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_FAILURE } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logger(cli.run_args.debug);

    if let Err(err) = execute(&cli.run_args) {
        error_msg!("{}", err);
        std::process::exit(err.exit_code());
    }
}

/// Logs go to stderr; `RUST_LOG` still applies unless `--debug` is given.
pub fn init_logger(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.format_timestamp(None).try_init();
}

pub fn execute(args: &RunArgs) -> Result<()> {
    let request = RunRequest::parse(args)?;
    debug!("{:#?}", request);

    let probe = SystemProbe::new(&request.root_dir);
    let launch = launch::resolve(&request, &probe)?;
    if request.dry_run {
        // Serializing plain strings, paths and integers cannot fail.
        let json = serde_json::to_string_pretty(&launch).unwrap_or_default();
        println!("{}", json);
        return Ok(());
    }
    exec::run(&launch)
}

#[derive(Debug, Parser)]
#[command(name = "boot-qemu", version = crate_version!())]
/// Boot a Linux kernel in QEMU against a small root filesystem
pub struct Cli {
    #[command(flatten)]
    pub run_args: RunArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(
        short = 'a',
        long = "arch",
        visible_alias = "architecture",
        help = "The architecture to boot",
        value_name = "ARCH"
    )]
    pub arch: Arch,
    #[arg(
        short = 'k',
        long = "kernel-location",
        help = "Path to the kernel image or to a kernel build folder to search for the image in",
        value_name = "PATH"
    )]
    pub kernel_location: PathBuf,
    #[arg(
        short = 'i',
        long,
        visible_alias = "shell",
        help = "Keep the guest running with a shell instead of shutting down after boot"
    )]
    pub interactive: bool,
    #[arg(
        short = 'g',
        long,
        help = "Start QEMU halted and attach a debugger to it, implies '--interactive'"
    )]
    pub gdb: bool,
    #[arg(
        long = "gdb-bin",
        env = "GDB_BIN",
        help = "The debugger to use with '--gdb' [default: gdb-multiarch]",
        value_name = "BIN"
    )]
    pub gdb_bin: Option<String>,
    #[arg(
        short = 't',
        long,
        value_parser = parse_timeout,
        help = "How long the guest may run before it is killed, in 'timeout' syntax [default: 3m]",
        value_name = "DURATION"
    )]
    pub timeout: Option<Timeout>,
    #[arg(
        short = 's',
        long,
        help = "Number of processors for the guest [default: host processors capped by CONFIG_NR_CPUS]",
        value_name = "N"
    )]
    pub smp: Option<usize>,
    #[arg(short = 'm', long, help = "Guest memory size", value_name = "SIZE")]
    pub memory: Option<String>,
    #[arg(long = "no-kvm", help = "Never use KVM, even when the host supports it")]
    pub no_kvm: bool,
    #[arg(
        long,
        help = "Boot the Debian disk image of the architecture instead of the initrd, implies '--interactive'"
    )]
    pub debian: bool,
    #[arg(
        long = "use-cbl-qemu",
        help = "Use the pre-built QEMU from the qemu-binaries folder (s390 only)"
    )]
    pub use_cbl_qemu: bool,
    #[arg(
        long,
        help = "Additional kernel command line arguments",
        value_name = "ARGS",
        allow_hyphen_values = true
    )]
    pub append: Option<String>,
    #[arg(
        long = "qemu-args",
        help = "Additional arguments for QEMU",
        value_name = "ARGS",
        allow_hyphen_values = true
    )]
    pub qemu_args: Vec<String>,
    #[arg(
        long,
        env = "BIOS",
        help = "Firmware to boot RISC-V guests with",
        value_name = "PATH"
    )]
    pub bios: Option<PathBuf>,
    #[arg(
        long = "root-dir",
        visible_alias = "images-dir",
        env = "BOOT_UTILS_ROOT",
        default_value = ".",
        help = "The folder holding 'images/' and 'utils/'",
        value_name = "PATH"
    )]
    pub root_dir: PathBuf,
    #[arg(
        long,
        help = "The manifest to load instead of '<root-dir>/BootQemu.toml'",
        value_name = "PATH"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long = "dry-run",
        help = "Print the resolved launch as JSON instead of running it"
    )]
    pub dry_run: bool,
    #[arg(short = 'd', long, help = "Show debug logs")]
    pub debug: bool,
}
