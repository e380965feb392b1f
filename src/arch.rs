// SPDX-License-Identifier: MPL-2.0

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use clap::{builder::PossibleValue, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The guest architectures that can be booted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Arm,
    Arm32V5,
    Arm32V6,
    Arm32V7,
    Arm64,
    Arm64be,
    M68k,
    Mips,
    Mipsel,
    Ppc32,
    Ppc32Mac,
    Ppc64,
    Ppc64le,
    Riscv,
    S390,
    X86,
    X86_64,
}

impl Arch {
    pub const ALL: &'static [Arch] = &[
        Arch::Arm,
        Arch::Arm32V5,
        Arch::Arm32V6,
        Arch::Arm32V7,
        Arch::Arm64,
        Arch::Arm64be,
        Arch::M68k,
        Arch::Mips,
        Arch::Mipsel,
        Arch::Ppc32,
        Arch::Ppc32Mac,
        Arch::Ppc64,
        Arch::Ppc64le,
        Arch::Riscv,
        Arch::S390,
        Arch::X86,
        Arch::X86_64,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Arm32V5 => "arm32_v5",
            Arch::Arm32V6 => "arm32_v6",
            Arch::Arm32V7 => "arm32_v7",
            Arch::Arm64 => "arm64",
            Arch::Arm64be => "arm64be",
            Arch::M68k => "m68k",
            Arch::Mips => "mips",
            Arch::Mipsel => "mipsel",
            Arch::Ppc32 => "ppc32",
            Arch::Ppc32Mac => "ppc32_mac",
            Arch::Ppc64 => "ppc64",
            Arch::Ppc64le => "ppc64le",
            Arch::Riscv => "riscv",
            Arch::S390 => "s390",
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
        }
    }

    /// The directory under the images root holding the root filesystem.
    ///
    /// The 32-bit ARM and PowerPC board variants share one image per family.
    pub fn rootfs_dir(&self) -> &'static str {
        let name = self.name();
        if name.starts_with("arm32") {
            "arm"
        } else if name.starts_with("ppc32") {
            "ppc32"
        } else {
            name
        }
    }
}

impl ValueEnum for Arch {
    fn value_variants<'a>() -> &'a [Self] {
        Arch::ALL
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(self.name()))
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .iter()
            .find(|arch| arch.name() == s)
            .copied()
            .ok_or_else(|| Error::UnsupportedArchitecture(s.to_owned()))
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Host machine architectures that matter for acceleration decisions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostArch {
    Aarch64,
    X86_64,
    Other,
}

impl HostArch {
    /// The architecture this program is running on.
    pub fn current() -> Self {
        Self::from_machine(std::env::consts::ARCH)
    }

    /// Classify a machine name as printed by `uname -m`.
    pub fn from_machine(machine: &str) -> Self {
        match machine {
            "aarch64" | "arm64" => HostArch::Aarch64,
            "x86_64" | "amd64" => HostArch::X86_64,
            _ => HostArch::Other,
        }
    }
}
