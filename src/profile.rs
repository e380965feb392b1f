// SPDX-License-Identifier: MPL-2.0

//! The static per-architecture launch profiles.
//!
//! Every [`Arch`] maps to exactly one [`ArchitectureProfile`]. The table is
//! closed: profiles cannot be registered at runtime.

use serde::Serialize;

use crate::{
    arch::{Arch, HostArch},
    error::Result,
};

/// The memory size used when neither the caller nor the profile picks one.
pub const DEFAULT_RAM: &str = "512m";

/// The `qemu-system-*` program variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Emulator {
    Arm,
    Aarch64,
    M68k,
    Mips,
    Mipsel,
    Ppc,
    Ppc64,
    Riscv64,
    S390x,
    I386,
    X86_64,
}

impl Emulator {
    pub fn binary(&self) -> &'static str {
        match self {
            Emulator::Arm => "qemu-system-arm",
            Emulator::Aarch64 => "qemu-system-aarch64",
            Emulator::M68k => "qemu-system-m68k",
            Emulator::Mips => "qemu-system-mips",
            Emulator::Mipsel => "qemu-system-mipsel",
            Emulator::Ppc => "qemu-system-ppc",
            Emulator::Ppc64 => "qemu-system-ppc64",
            Emulator::Riscv64 => "qemu-system-riscv64",
            Emulator::S390x => "qemu-system-s390x",
            Emulator::I386 => "qemu-system-i386",
            Emulator::X86_64 => "qemu-system-x86_64",
        }
    }

    /// Pick the x86 emulator by guest bit width.
    pub const fn x86(bits: u32) -> Self {
        if bits == 64 {
            Emulator::X86_64
        } else {
            Emulator::I386
        }
    }
}

/// Where a kernel image lives relative to a build-output directory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum BootDirConvention {
    /// `<build>/<image>`, used for uncompressed `vmlinux` images.
    RootOfBuildTree,
    /// `<build>/arch/<kernel arch>/boot/<image>`.
    ArchBootSubdirectory,
}

/// The extra host check KVM needs beyond a matching host and `/dev/kvm`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum KvmCheck {
    None,
    /// `svm` or `vmx` must appear in `/proc/cpuinfo`.
    CpuVirtFlags,
    /// The host must be able to run 32-bit EL1 guests.
    Aarch32El1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Acceleration {
    Never,
    Kvm {
        host: HostArch,
        check: KvmCheck,
        /// The emulator to run instead when accelerated.
        emulator: Option<Emulator>,
        cpu: &'static str,
    },
}

/// Firmware handed to `-bios`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Firmware {
    /// A blob shipped beside the root filesystem in the images directory.
    ImagesDir(&'static str),
    /// The OpenSBI supervisor binary.
    OpenSbi,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ExtraArg {
    Args(&'static [&'static str]),
    /// Only passed with full software emulation.
    TcgArgs(&'static [&'static str]),
    /// Only passed with KVM.
    KvmArgs(&'static [&'static str]),
    Bios(Firmware),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchitectureProfile {
    pub arch: Arch,
    pub emulator: Emulator,
    pub machine: &'static str,
    /// The CPU model under full software emulation.
    pub cpu: Option<&'static str>,
    pub kernel_image: &'static str,
    /// The Kbuild architecture directory.
    pub kernel_arch: &'static str,
    pub boot_dir: BootDirConvention,
    pub dtb: Option<&'static str>,
    pub ram: Option<&'static str>,
    pub acceleration: Acceleration,
    pub extra: &'static [ExtraArg],
    pub console: Option<&'static str>,
    pub earlycon: Option<&'static str>,
    /// Whether the CPU model is tuned from the QEMU and Linux versions.
    pub version_tuned_cpu: bool,
    /// Whether a pre-built emulator distribution may replace the host's.
    pub alternate_emulator: bool,
}

impl ArchitectureProfile {
    pub const fn ram_or_default(&self) -> &'static str {
        match self.ram {
            Some(ram) => ram,
            None => DEFAULT_RAM,
        }
    }

    pub fn bios(&self) -> Option<Firmware> {
        self.extra.iter().find_map(|extra| match extra {
            ExtraArg::Bios(firmware) => Some(*firmware),
            _ => None,
        })
    }
}

/// Look up a profile by architecture name.
pub fn resolve(arch: &str) -> Result<&'static ArchitectureProfile> {
    Ok(arch.parse::<Arch>()?.profile())
}

const ZIMAGE_ARM: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Arm,
    emulator: Emulator::Arm,
    machine: "virt",
    cpu: None,
    kernel_image: "zImage",
    kernel_arch: "arm",
    boot_dir: BootDirConvention::ArchBootSubdirectory,
    dtb: None,
    ram: None,
    acceleration: Acceleration::Never,
    extra: &[],
    console: None,
    earlycon: None,
    version_tuned_cpu: false,
    alternate_emulator: false,
};

const ARM_VIRT_KVM: Acceleration = Acceleration::Kvm {
    host: HostArch::Aarch64,
    check: KvmCheck::Aarch32El1,
    emulator: Some(Emulator::Aarch64),
    cpu: "host,aarch64=off",
};

const ARM: ArchitectureProfile = ArchitectureProfile {
    acceleration: ARM_VIRT_KVM,
    console: Some("console=ttyAMA0"),
    earlycon: Some("earlycon"),
    ..ZIMAGE_ARM
};

const ARM32_V5: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Arm32V5,
    machine: "palmetto-bmc",
    dtb: Some("aspeed-bmc-opp-palmetto.dtb"),
    earlycon: Some("earlycon"),
    ..ZIMAGE_ARM
};

const ARM32_V6: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Arm32V6,
    machine: "romulus-bmc",
    dtb: Some("aspeed-bmc-opp-romulus.dtb"),
    ..ZIMAGE_ARM
};

const ARM32_V7: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Arm32V7,
    ..ARM
};

const ARM64: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Arm64,
    emulator: Emulator::Aarch64,
    machine: "virt,gic-version=max",
    cpu: Some("max"),
    kernel_image: "Image.gz",
    kernel_arch: "arm64",
    boot_dir: BootDirConvention::ArchBootSubdirectory,
    dtb: None,
    ram: None,
    acceleration: Acceleration::Kvm {
        host: HostArch::Aarch64,
        check: KvmCheck::None,
        emulator: None,
        cpu: "host",
    },
    extra: &[ExtraArg::TcgArgs(&["-machine", "virtualization=true"])],
    console: Some("console=ttyAMA0"),
    earlycon: Some("earlycon"),
    version_tuned_cpu: true,
    alternate_emulator: false,
};

const ARM64BE: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Arm64be,
    ..ARM64
};

const M68K: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::M68k,
    emulator: Emulator::M68k,
    machine: "q800",
    cpu: Some("m68040"),
    kernel_image: "vmlinux",
    kernel_arch: "m68k",
    boot_dir: BootDirConvention::RootOfBuildTree,
    dtb: None,
    ram: None,
    acceleration: Acceleration::Never,
    extra: &[],
    console: Some("console=ttyS0,115200"),
    earlycon: None,
    version_tuned_cpu: false,
    alternate_emulator: false,
};

const MIPS: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Mips,
    emulator: Emulator::Mips,
    machine: "malta",
    cpu: Some("24Kf"),
    kernel_image: "vmlinux",
    kernel_arch: "mips",
    console: None,
    ..M68K
};

const MIPSEL: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Mipsel,
    emulator: Emulator::Mipsel,
    ..MIPS
};

const PPC32: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Ppc32,
    emulator: Emulator::Ppc,
    machine: "bamboo",
    cpu: None,
    kernel_image: "uImage",
    kernel_arch: "powerpc",
    boot_dir: BootDirConvention::ArchBootSubdirectory,
    dtb: None,
    ram: Some("128m"),
    acceleration: Acceleration::Never,
    extra: &[],
    console: Some("console=ttyS0"),
    earlycon: None,
    version_tuned_cpu: false,
    alternate_emulator: false,
};

const PPC32_MAC: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Ppc32Mac,
    machine: "mac99",
    kernel_image: "vmlinux",
    boot_dir: BootDirConvention::RootOfBuildTree,
    ..PPC32
};

const PPC64: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Ppc64,
    emulator: Emulator::Ppc64,
    machine: "pseries",
    cpu: Some("power8"),
    kernel_image: "vmlinux",
    boot_dir: BootDirConvention::RootOfBuildTree,
    ram: Some("1G"),
    extra: &[ExtraArg::Args(&["-vga", "none"])],
    console: None,
    ..PPC32
};

const PPC64LE: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Ppc64le,
    emulator: Emulator::Ppc64,
    machine: "powernv",
    cpu: None,
    kernel_image: "zImage.epapr",
    boot_dir: BootDirConvention::ArchBootSubdirectory,
    ram: Some("2G"),
    extra: &[
        ExtraArg::Args(&["-device", "ipmi-bmc-sim,id=bmc0"]),
        ExtraArg::Args(&["-device", "isa-ipmi-bt,bmc=bmc0,irq=10"]),
        ExtraArg::Bios(Firmware::ImagesDir("skiboot.lid")),
    ],
    console: None,
    ..PPC32
};

const RISCV: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::Riscv,
    emulator: Emulator::Riscv64,
    machine: "virt",
    cpu: None,
    kernel_image: "Image",
    kernel_arch: "riscv",
    boot_dir: BootDirConvention::ArchBootSubdirectory,
    dtb: None,
    ram: None,
    acceleration: Acceleration::Never,
    extra: &[ExtraArg::Bios(Firmware::OpenSbi)],
    console: None,
    earlycon: Some("earlycon"),
    version_tuned_cpu: false,
    alternate_emulator: false,
};

const S390: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::S390,
    emulator: Emulator::S390x,
    machine: "s390-ccw-virtio",
    kernel_image: "bzImage",
    kernel_arch: "s390",
    extra: &[],
    earlycon: None,
    alternate_emulator: true,
    ..RISCV
};

const X86_KVM: Acceleration = Acceleration::Kvm {
    host: HostArch::X86_64,
    check: KvmCheck::CpuVirtFlags,
    emulator: None,
    cpu: "host",
};

const X86: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::X86,
    emulator: Emulator::x86(32),
    machine: "pc",
    cpu: None,
    kernel_image: "bzImage",
    kernel_arch: "x86",
    boot_dir: BootDirConvention::ArchBootSubdirectory,
    dtb: None,
    ram: None,
    acceleration: X86_KVM,
    extra: &[ExtraArg::KvmArgs(&["-d", "unimp,guest_errors"])],
    console: Some("console=ttyS0"),
    earlycon: Some("earlycon=uart8250,io,0x3f8"),
    version_tuned_cpu: false,
    alternate_emulator: false,
};

const X86_64: ArchitectureProfile = ArchitectureProfile {
    arch: Arch::X86_64,
    emulator: Emulator::x86(64),
    cpu: Some("Nehalem"),
    ..X86
};

impl Arch {
    pub fn profile(self) -> &'static ArchitectureProfile {
        match self {
            Arch::Arm => &ARM,
            Arch::Arm32V5 => &ARM32_V5,
            Arch::Arm32V6 => &ARM32_V6,
            Arch::Arm32V7 => &ARM32_V7,
            Arch::Arm64 => &ARM64,
            Arch::Arm64be => &ARM64BE,
            Arch::M68k => &M68K,
            Arch::Mips => &MIPS,
            Arch::Mipsel => &MIPSEL,
            Arch::Ppc32 => &PPC32,
            Arch::Ppc32Mac => &PPC32_MAC,
            Arch::Ppc64 => &PPC64,
            Arch::Ppc64le => &PPC64LE,
            Arch::Riscv => &RISCV,
            Arch::S390 => &S390,
            Arch::X86 => &X86,
            Arch::X86_64 => &X86_64,
        }
    }
}
