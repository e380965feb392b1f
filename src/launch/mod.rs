// SPDX-License-Identifier: MPL-2.0

//! Turning a [`RunRequest`] into an immutable [`ResolvedLaunch`].
//!
//! Resolution happens in a fixed order: the debugger port check, the
//! acceleration decision, the
//! eager dependency check, the kernel and device tree lookup, the root
//! filesystem, and finally the pure [`assemble`] step that builds the
//! emulator argument vector.

pub mod exec;
pub mod gdb;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    arch::Arch,
    config::{
        unix_args::{apply_kv_array, expand_kv_array, join_kv_array},
        RunRequest, MULTI_VALUE_KEYS,
    },
    error::Result,
    locate,
    probe::{self, AccelDecision, CapabilityProbe},
    profile::{Acceleration, ArchitectureProfile, ExtraArg},
    rootfs::{self, Rootfs},
    util::{check_cmd, usable_cpus, Timeout},
    version,
};

/// How the emulator is run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExecutionMode {
    /// Run under `timeout(1)` and report its expiry.
    TimedBatch { timeout: Timeout },
    Interactive,
    /// Start the emulator halted and attach a debugger, repeatedly.
    DebuggerWait {
        port: u16,
        gdb_bin: String,
        vmlinux: PathBuf,
    },
}

/// Everything needed to boot, fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLaunch {
    pub arch: Arch,
    pub kernel: PathBuf,
    pub dtb: Option<PathBuf>,
    pub rootfs: Rootfs,
    pub cmdline: String,
    pub acceleration: AccelDecision,
    pub smp: Option<usize>,
    /// The emulator program followed by its arguments.
    pub argv: Vec<String>,
    pub mode: ExecutionMode,
}

impl ResolvedLaunch {
    pub fn emulator(&self) -> &Path {
        Path::new(&self.argv[0])
    }
}

/// The host-dependent facts [`assemble`] needs, gathered beforehand.
#[derive(Debug, Clone)]
pub struct LaunchInputs {
    pub emulator: PathBuf,
    pub kernel: PathBuf,
    pub dtb: Option<PathBuf>,
    pub rootfs: Rootfs,
    pub bios: Option<PathBuf>,
    pub vmlinux: PathBuf,
    pub smp: Option<usize>,
    /// The CPU model under full software emulation.
    pub tcg_cpu: Option<String>,
}

/// Resolve `request` on the host described by `probe`.
pub fn resolve(request: &RunRequest, probe: &dyn CapabilityProbe) -> Result<ResolvedLaunch> {
    // Nothing may be spawned or unpacked while the stub port is taken.
    if request.gdb && !request.dry_run {
        gdb::ensure_port_free(gdb::GDB_PORT)?;
    }

    let profile = request.arch.profile();
    let accel = probe::decide(profile, probe, request.no_kvm);
    debug!("Acceleration for {}: {:?}", profile.arch, accel);

    let emulator = emulator_path(profile, request, accel)?;
    if !request.dry_run {
        for cmd in required_commands(request) {
            check_cmd(cmd)?;
        }
    }

    let kernel = locate::kernel(&request.kernel_location, profile)?;
    let dtb = profile
        .dtb
        .map(|name| locate::device_tree(&kernel, name))
        .transpose()?;
    let rootfs = rootfs::provision(request, !request.dry_run)?;
    let bios = profile
        .bios()
        .map(|firmware| rootfs::firmware(firmware, request));

    let tcg_cpu = if profile.version_tuned_cpu && !accel.enabled {
        Some(tuned_cpu(&emulator, &kernel, request.dry_run))
    } else {
        profile.cpu.map(str::to_owned)
    };

    let inputs = LaunchInputs {
        emulator,
        kernel,
        dtb,
        rootfs,
        bios,
        vmlinux: locate::vmlinux(&request.kernel_location),
        smp: smp(request, accel, usable_cpus()),
        tcg_cpu,
    };
    Ok(assemble(profile, inputs, request, accel))
}

fn emulator_path(
    profile: &ArchitectureProfile,
    request: &RunRequest,
    accel: AccelDecision,
) -> Result<PathBuf> {
    if let Some(path) = &request.qemu_path {
        return Ok(path.clone());
    }
    if request.use_cbl_qemu {
        return rootfs::cbl_qemu(&request.root_dir, !request.dry_run);
    }
    let emulator = match profile.acceleration {
        Acceleration::Kvm {
            emulator: Some(emulator),
            ..
        } if accel.enabled => emulator,
        _ => profile.emulator,
    };
    let binary = emulator.binary();
    if request.dry_run {
        return Ok(which::which(binary).unwrap_or_else(|_| PathBuf::from(binary)));
    }
    check_cmd(binary)
}

/// The external programs the chosen mode needs, besides the emulator.
pub fn required_commands(request: &RunRequest) -> Vec<&str> {
    let mut cmds = Vec::new();
    if !request.debian {
        cmds.push("zstd");
    }
    if request.gdb {
        cmds.push(request.gdb_bin.as_str());
    } else if !request.interactive {
        cmds.extend(["timeout", "stdbuf"]);
    }
    cmds
}

fn tuned_cpu(emulator: &Path, kernel: &Path, dry_run: bool) -> String {
    let qemu = if dry_run {
        None
    } else {
        match version::qemu_version_string(emulator) {
            Ok(banner) => version::parse_qemu_version(&banner),
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    };
    version::arm64_cpu(qemu, || match version::gzip_kernel_version(kernel) {
        Ok(linux) => linux,
        Err(err) => {
            warn!("{}", err);
            None
        }
    })
}

/// The `-smp` value, if one is passed at all.
///
/// With KVM the guest always gets several cores. Full software emulation is
/// slower with more cores, so it only gets them when asked.
pub fn smp(request: &RunRequest, accel: AccelDecision, host_cpus: usize) -> Option<usize> {
    if accel.enabled || request.smp.is_some() {
        Some(locate::smp_value(
            request.smp,
            &request.kernel_location,
            host_cpus,
        ))
    } else {
        None
    }
}

/// The kernel command line: console, early console, root filesystem
/// selection, `nokaslr` for debugging, then whatever the user appended.
pub fn kernel_cmdline(profile: &ArchitectureProfile, request: &RunRequest) -> String {
    let rootfs = if request.debian {
        Some("root=/dev/vda")
    } else if request.interactive {
        Some("rdinit=/bin/sh")
    } else {
        None
    };
    [
        profile.console,
        profile.earlycon,
        rootfs,
        request.gdb.then_some("nokaslr"),
        request.append.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

fn execution_mode(request: &RunRequest, vmlinux: PathBuf) -> ExecutionMode {
    if request.gdb {
        ExecutionMode::DebuggerWait {
            port: gdb::GDB_PORT,
            gdb_bin: request.gdb_bin.clone(),
            vmlinux,
        }
    } else if request.interactive {
        ExecutionMode::Interactive
    } else {
        ExecutionMode::TimedBatch {
            timeout: request.timeout.clone(),
        }
    }
}

/// Build the launch from already resolved inputs. Nothing here touches the
/// host.
pub fn assemble(
    profile: &ArchitectureProfile,
    inputs: LaunchInputs,
    request: &RunRequest,
    accel: AccelDecision,
) -> ResolvedLaunch {
    let mut args: Vec<String> = Vec::new();
    let mut push = |items: &[&str]| args.extend(items.iter().map(|item| item.to_string()));

    push(&["-machine", profile.machine]);
    if !accel.enabled {
        if let Some(cpu) = &inputs.tcg_cpu {
            push(&["-cpu", cpu]);
        }
    }
    for extra in profile.extra {
        match extra {
            ExtraArg::Args(extra) => push(extra),
            ExtraArg::TcgArgs(extra) if !accel.enabled => push(extra),
            ExtraArg::KvmArgs(extra) if accel.enabled => push(extra),
            ExtraArg::TcgArgs(_) | ExtraArg::KvmArgs(_) => {}
            ExtraArg::Bios(_) => {
                if let Some(bios) = &inputs.bios {
                    push(&["-bios", &bios.to_string_lossy()]);
                }
            }
        }
    }

    push(&["-kernel", &inputs.kernel.to_string_lossy()]);
    if let Some(dtb) = &inputs.dtb {
        push(&["-dtb", &dtb.to_string_lossy()]);
    }
    let cmdline = kernel_cmdline(profile, request);
    if !cmdline.is_empty() {
        push(&["-append", &cmdline]);
    }

    if let Acceleration::Kvm { cpu, .. } = profile.acceleration {
        if accel.enabled {
            push(&["-cpu", cpu, "-enable-kvm"]);
        }
    }
    if let Some(smp) = inputs.smp {
        push(&["-smp", &smp.to_string()]);
    }

    push(&["-display", "none"]);
    match &inputs.rootfs {
        Rootfs::Initrd(initrd) => push(&["-initrd", &initrd.to_string_lossy()]),
        Rootfs::Disk(image) => push(&[
            "-drive",
            &format!(
                "file={},format=raw,if=virtio,index=0,media=disk",
                image.display()
            ),
        ]),
    }
    let ram = request
        .memory
        .as_deref()
        .unwrap_or(profile.ram_or_default());
    push(&["-m", ram, "-nodefaults", "-no-reboot"]);
    if request.gdb {
        push(&["-s", "-S"]);
    } else {
        push(&["-serial", "mon:stdio"]);
    }

    if !request.qemu_args.is_empty() {
        let mut joined = join_kv_array(&args);
        apply_kv_array(&mut joined, &request.qemu_args, " ", MULTI_VALUE_KEYS);
        args = expand_kv_array(&joined);
    }

    let mut argv = vec![inputs.emulator.to_string_lossy().into_owned()];
    argv.append(&mut args);

    ResolvedLaunch {
        arch: profile.arch,
        kernel: inputs.kernel,
        dtb: inputs.dtb,
        rootfs: inputs.rootfs,
        cmdline,
        acceleration: accel,
        smp: inputs.smp,
        argv,
        mode: execution_mode(request, inputs.vmlinux),
    }
}
